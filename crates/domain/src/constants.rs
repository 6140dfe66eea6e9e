//! Client constants
//!
//! Defaults for every configurable knob plus the fixed protocol values
//! used by the token lifecycle.

// Configuration defaults
pub const DEFAULT_BASE_URL: &str = "https://api.bokio.se";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RATE_LIMIT: u32 = 10; // requests per second
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";
pub const DEFAULT_USER_AGENT: &str = "Bokio-MCP-Client/1.0";
pub const DEFAULT_SCOPES: &[&str] = &["accounting", "invoices"];

// Token lifecycle
pub const TOKEN_REFRESH_SKEW_SECS: i64 = 300;
pub const TOKEN_PATH: &str = "/token";
pub const AUTHORIZE_PATH: &str = "/authorize";

// Environment switch operators flip to leave read-only mode
pub const READ_ONLY_ENV_VAR: &str = "BOKIO_READ_ONLY";
