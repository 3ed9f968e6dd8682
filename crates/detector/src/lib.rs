//! Face detection backed by an external HTTP detection service.
//!
//! Provides the REST client, adapters implementing both detector
//! capabilities from `attention-core`, and environment-driven selection of
//! the variant used for the lifetime of the process.

pub mod api;
pub mod config;
pub mod remote;
