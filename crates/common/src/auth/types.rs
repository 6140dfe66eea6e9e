//! OAuth 2.0 types and structures
//!
//! Token snapshot, token endpoint response, and the client registration
//! used to talk to the Bokio authorization server.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the bearer credential and its tenant context
///
/// An empty `access_token` means "not authenticated". The default value is
/// the state a client starts in before any exchange.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer token attached to every resource request
    pub access_token: String,

    /// Optional because client-credentials grants never issue one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token type (always "Bearer" for Bokio)
    pub token_type: String,

    /// Access token lifetime in seconds, as reported by the server
    pub expires_in: i64,

    /// Absolute expiration timestamp (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Company the token was issued for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_type: Option<String>,
}

impl Default for TokenSet {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_in: 0,
            expires_at: None,
            tenant_id: None,
            tenant_type: None,
        }
    }
}

impl TokenSet {
    /// Create a new `TokenSet` with calculated expiration time
    ///
    /// `expires_at` is `now + expires_in`. A missing or non-positive
    /// lifetime counts as already expired.
    #[must_use]
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        let expires_in = expires_in.max(0);
        let expires_at = Some(Utc::now() + chrono::Duration::seconds(expires_in));

        Self { access_token, refresh_token, expires_in, expires_at, ..Self::default() }
    }

    /// Create a `TokenSet` with an explicit expiry, e.g. when importing
    /// tokens persisted by an external collaborator
    #[must_use]
    pub fn with_expiry(
        access_token: String,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let expires_in = (expires_at - Utc::now()).num_seconds().max(0);
        Self {
            access_token,
            refresh_token,
            expires_in,
            expires_at: Some(expires_at),
            ..Self::default()
        }
    }

    /// Attach tenant identifiers
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: Option<String>, tenant_type: Option<String>) -> Self {
        self.tenant_id = tenant_id;
        self.tenant_type = tenant_type;
        self
    }

    /// `true` when no access token is held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty()
    }

    /// `true` when a usable refresh token is held
    #[must_use]
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|token| !token.is_empty())
    }

    /// Check if the access token is expired or will expire within the given
    /// threshold
    ///
    /// Returns `false` if no expiry is set.
    #[must_use]
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let threshold = chrono::Duration::seconds(threshold_seconds);
                Utc::now() + threshold >= expires_at
            }
            None => false,
        }
    }

    /// Get seconds until token expiration
    #[must_use]
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - Utc::now()).num_seconds())
    }

    /// Combine a refresh response with the snapshot it replaces
    ///
    /// Servers may skip refresh-token rotation, so the previous refresh
    /// token survives when the response omits one. Tenant identifiers are
    /// carried over the same way.
    #[must_use]
    pub fn merged_over(mut self, previous: &Self) -> Self {
        if !self.has_refresh_token() {
            self.refresh_token.clone_from(&previous.refresh_token);
        }
        if self.tenant_id.is_none() {
            self.tenant_id.clone_from(&previous.tenant_id);
        }
        if self.tenant_type.is_none() {
            self.tenant_type.clone_from(&previous.tenant_type);
        }
        self
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &self.refresh_token.as_deref().map(redact))
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("tenant_id", &self.tenant_id)
            .field("tenant_type", &self.tenant_type)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

/// Token endpoint response
///
/// Bokio returns tenant identifiers next to the standard RFC 6749 fields.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub tenant_id: Option<String>,
    pub tenant_type: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl From<TokenResponse> for TokenSet {
    fn from(response: TokenResponse) -> Self {
        let mut tokens =
            Self::new(response.access_token, response.refresh_token, response.expires_in)
                .with_tenant(response.tenant_id, response.tenant_type);
        tokens.token_type = response.token_type;
        tokens
    }
}

/// OAuth client registration for the Bokio authorization server
#[derive(Clone)]
pub struct OAuthConfig {
    /// API root (e.g. "https://api.bokio.se"); `/authorize` and `/token`
    /// hang off it
    pub base_url: String,

    pub client_id: String,

    client_secret: String,

    /// Callback the authorization server redirects to with `code`
    pub redirect_uri: String,

    /// OAuth scopes to request (joined with spaces on the wire)
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Create a new OAuth configuration
    #[must_use]
    pub fn new(
        base_url: String,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        scopes: Vec<String>,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self { base_url, client_id, client_secret, redirect_uri, scopes }
    }

    /// Authorization endpoint, presented to the user by an external UI
    #[must_use]
    pub fn authorization_url(&self) -> String {
        format!("{}/authorize", self.base_url)
    }

    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/token", self.base_url)
    }

    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// `Authorization` header value: `Basic base64(client_id:client_secret)`
    #[must_use]
    pub fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", STANDARD.encode(credentials))
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}
