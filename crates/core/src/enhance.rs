//! Contrast-limited adaptive histogram equalisation (CLAHE).
//!
//! Frames are equalised before quality scoring and face detection so that
//! dim or washed-out webcam feeds still produce usable landmarks.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

/// Default clip limit, relative to a perfectly flat tile histogram.
pub const DEFAULT_CLIP_LIMIT: f64 = 3.0;

/// Default number of tiles along each axis.
pub const DEFAULT_TILE_GRID: u32 = 8;

const BINS: usize = 256;

/// CLAHE tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClaheParams {
    /// Histogram clip limit. Values `<= 0` disable clipping (plain
    /// per-tile equalisation).
    pub clip_limit: f64,
    pub tiles_x: u32,
    pub tiles_y: u32,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: DEFAULT_CLIP_LIMIT,
            tiles_x: DEFAULT_TILE_GRID,
            tiles_y: DEFAULT_TILE_GRID,
        }
    }
}

/// Equalise `gray` tile by tile, blending neighbouring tile mappings
/// bilinearly. The output has the same dimensions as the input.
pub fn equalize_adaptive(gray: &GrayImage, params: &ClaheParams) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let tiles_x = params.tiles_x.clamp(1, width);
    let tiles_y = params.tiles_y.clamp(1, height);
    let bounds_x = tile_bounds(width, tiles_x);
    let bounds_y = tile_bounds(height, tiles_y);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y as usize {
        for tx in 0..tiles_x as usize {
            luts.push(tile_lut(
                gray,
                (bounds_x[tx], bounds_x[tx + 1]),
                (bounds_y[ty], bounds_y[ty + 1]),
                params.clip_limit,
            ));
        }
    }

    let tile_w = f64::from(width) / f64::from(tiles_x);
    let tile_h = f64::from(height) / f64::from(tiles_y);

    GrayImage::from_fn(width, height, |x, y| {
        let (x0, x1, ax) = neighbours(x, tile_w, tiles_x);
        let (y0, y1, ay) = neighbours(y, tile_h, tiles_y);
        let v = gray.get_pixel(x, y).0[0] as usize;
        let lut = |tx: usize, ty: usize| f64::from(luts[ty * tiles_x as usize + tx][v]);

        let top = lut(x0, y0) * (1.0 - ax) + lut(x1, y0) * ax;
        let bottom = lut(x0, y1) * (1.0 - ax) + lut(x1, y1) * ax;
        let value = top * (1.0 - ay) + bottom * ay;
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// Split `len` pixels into `tiles` contiguous ranges; returns `tiles + 1`
/// boundaries.
fn tile_bounds(len: u32, tiles: u32) -> Vec<u32> {
    (0..=tiles)
        .map(|i| ((u64::from(i) * u64::from(len)) / u64::from(tiles)) as u32)
        .collect()
}

/// The two tile indices surrounding pixel `p` and the blend weight of the
/// second one.
fn neighbours(p: u32, tile_size: f64, tiles: u32) -> (usize, usize, f64) {
    let last = tiles as usize - 1;
    let pos = (f64::from(p) + 0.5) / tile_size - 0.5;
    if pos <= 0.0 {
        return (0, 0, 0.0);
    }
    let lower = (pos.floor() as usize).min(last);
    if lower == last {
        return (last, last, 0.0);
    }
    (lower, lower + 1, pos - lower as f64)
}

/// Clipped-histogram equalisation mapping for one tile.
fn tile_lut(
    gray: &GrayImage,
    (x_start, x_end): (u32, u32),
    (y_start, y_end): (u32, u32),
    clip_limit: f64,
) -> [u8; BINS] {
    let mut hist = [0u32; BINS];
    for y in y_start..y_end {
        for x in x_start..x_end {
            hist[gray.get_pixel(x, y).0[0] as usize] += 1;
        }
    }
    let area = (x_end - x_start) * (y_end - y_start);

    if clip_limit > 0.0 {
        let limit = ((clip_limit * f64::from(area) / BINS as f64) as u32).max(1);
        let mut excess = 0u32;
        for count in hist.iter_mut() {
            if *count > limit {
                excess += *count - limit;
                *count = limit;
            }
        }
        let batch = excess / BINS as u32;
        let residual = (excess % BINS as u32) as usize;
        for (i, count) in hist.iter_mut().enumerate() {
            *count += batch + u32::from(i < residual);
        }
    }

    let mut lut = [0u8; BINS];
    let scale = 255.0 / f64::from(area.max(1));
    let mut cumulative = 0u32;
    for (i, count) in hist.iter().enumerate() {
        cumulative += count;
        lut[i] = (f64::from(cumulative) * scale).round().min(255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_dimensions() {
        let img = GrayImage::from_fn(37, 21, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let out = equalize_adaptive(&img, &ClaheParams::default());
        assert_eq!(out.dimensions(), (37, 21));
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let img = GrayImage::from_pixel(64, 48, Luma([90]));
        let out = equalize_adaptive(&img, &ClaheParams::default());
        let first = out.get_pixel(0, 0).0[0];
        assert!(out.pixels().all(|p| p.0[0] == first));
    }

    #[test]
    fn low_contrast_checkerboard_gains_contrast() {
        let img = GrayImage::from_fn(256, 256, |x, y| {
            if (x + y) % 2 == 0 {
                Luma([120])
            } else {
                Luma([124])
            }
        });
        let out = equalize_adaptive(&img, &ClaheParams::default());
        let dark = out.get_pixel(0, 0).0[0];
        let light = out.get_pixel(1, 0).0[0];
        assert!(light > dark);
        assert!(light - dark > 4, "expected stretched contrast, got {dark}..{light}");
    }

    #[test]
    fn tiny_image_uses_fewer_tiles() {
        let img = GrayImage::from_fn(3, 2, |x, _| Luma([(x * 100) as u8]));
        let out = equalize_adaptive(&img, &ClaheParams::default());
        assert_eq!(out.dimensions(), (3, 2));
    }

    #[test]
    fn empty_image_is_returned_unchanged() {
        let img = GrayImage::new(0, 0);
        assert_eq!(equalize_adaptive(&img, &ClaheParams::default()).dimensions(), (0, 0));
    }

    #[test]
    fn tile_bounds_cover_whole_axis() {
        assert_eq!(tile_bounds(10, 3), vec![0, 3, 6, 10]);
    }
}
