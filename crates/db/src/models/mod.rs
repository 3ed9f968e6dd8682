//! Domain model structs and DTOs.

pub mod attention_session;
