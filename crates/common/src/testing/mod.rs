//! Testing utilities and helpers
//!
//! - **[`mocks`]**: Mock implementations of the token endpoint seam
//!
//! ## Usage
//!
//! ```rust
//! use bokio_common::auth::TokenManager;
//! use bokio_common::testing::MockOAuthClient;
//!
//! let client = MockOAuthClient::new();
//! let manager = TokenManager::new(client.clone(), 300);
//! assert!(!manager.is_authenticated());
//! assert_eq!(client.refresh_calls(), 0);
//! ```

pub mod mocks;

pub use mocks::MockOAuthClient;
