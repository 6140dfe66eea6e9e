//! Infrastructure error plumbing
//!
//! Conversions from third-party errors into [`bokio_domain::BokioError`].

pub mod conversions;

pub use conversions::InfraError;
