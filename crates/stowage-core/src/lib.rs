//! # stowage-core
//!
//! Foundational types shared by every Stowage crate:
//! - The error kinds surfaced by attachment and thumbnail operations
//! - The `StowResult` alias
//! - Application configuration loaded from the environment

pub mod config;
pub mod error;

pub use error::*;
