//! Shared types.

pub mod config;
pub mod errors;
pub mod messages;
