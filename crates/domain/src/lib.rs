//! # Bokio Domain
//!
//! Plain data types shared by the Bokio client crates.
//!
//! This crate contains:
//! - Client configuration and credential types
//! - Domain error types and Result definitions
//! - Default values and protocol constants
//!
//! ## Architecture
//! - No dependencies on other Bokio crates
//! - Only external dependencies allowed
//! - No I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
