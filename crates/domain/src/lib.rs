//! Shared types for the TabSession crates: the error type, configuration
//! sections and structured trace events.

pub mod config;
pub mod error;
pub mod trace;
