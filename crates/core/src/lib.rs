//! Attention measurement engine.
//!
//! Turns a stream of webcam frames into per-frame attention verdicts and
//! per-session engagement summaries. Transport, storage backends and the
//! face detector implementation live in sibling crates; this crate owns the
//! geometry, image enhancement, classification, session aggregation and the
//! concurrent session table.

pub mod analyzer;
pub mod classifier;
pub mod detection;
pub mod enhance;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod landmarks;
pub mod manager;
pub mod session;
pub mod store;
pub mod types;
