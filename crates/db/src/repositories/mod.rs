//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod attention_session_repo;

pub use attention_session_repo::AttentionSessionRepo;
