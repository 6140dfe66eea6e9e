//! OAuth 2.0 token lifecycle for the Bokio API
//!
//! Covers the interactive OAuth mode: authorization-code exchange, silent
//! refresh ahead of expiry, and the client credentials grant. The static
//! integration-token mode never reaches this module.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  TokenManager   │  Exchange / refresh / ensure-valid
//! └────────┬────────┘
//!          │
//!          ├──► OAuthClient        (POST {base}/token, Basic auth)
//!          │
//!          └──► TokenStoreTrait    (snapshot read / write, RwLock)
//! ```
//!
//! # State machine
//!
//! ```text
//! Unauthenticated ──exchange ok──► Authenticated ──now + skew > expiry──► Refreshing
//!                                        ▲                                   │
//!                                        └────────────refresh ok─────────────┘
//! ```
//!
//! A failed refresh leaves the previous tokens in place; the next call
//! tries again.
//!
//! # Usage Example
//!
//! ```no_run
//! use bokio_common::auth::{OAuthClient, OAuthConfig, TokenManager};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OAuthConfig::new(
//!         "https://api.bokio.se".to_string(),
//!         "your_client_id".to_string(),
//!         "your_client_secret".to_string(),
//!         "http://localhost:8080/callback".to_string(),
//!         vec!["accounting".to_string(), "invoices".to_string()],
//!     );
//!     let manager = TokenManager::new(OAuthClient::new(config)?, 300);
//!     let cancel = CancellationToken::new();
//!
//!     // Present this to the user; the callback delivers `code`
//!     let _url = manager.authorization_url("state-from-ui");
//!
//!     manager.exchange_code_for_token(&cancel, "code-from-callback").await?;
//!     let _bearer = manager.ensure_valid_token(&cancel).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - **[`types`]**: `TokenSet`, `TokenResponse`, `OAuthConfig`
//! - **[`token_store`]**: snapshot store behind a readers-writer lock
//! - **[`client`]**: token endpoint HTTP client
//! - **[`token_manager`]**: token lifecycle
//! - **[`traits`]**: seams for mocking

pub mod client;
pub mod token_manager;
pub mod token_store;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use client::{OAuthClient, OAuthClientError};
pub use token_manager::{TokenManager, TokenManagerError};
pub use token_store::MemoryTokenStore;
pub use traits::{OAuthClientTrait, TokenStoreTrait};
pub use types::{OAuthConfig, TokenResponse, TokenSet};
