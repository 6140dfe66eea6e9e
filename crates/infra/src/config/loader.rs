//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If no credentials are set there, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `BOKIO_INTEGRATION_TOKEN`: Static integration token (selects token mode)
//! - `BOKIO_CLIENT_ID` / `BOKIO_CLIENT_SECRET`: OAuth client credentials
//! - `BOKIO_BASE_URL`: API root
//! - `BOKIO_REDIRECT_URL`: OAuth redirect URI
//! - `BOKIO_READ_ONLY`: Block mutating requests (true/false)
//! - `BOKIO_TIMEOUT_SECS`: Per-attempt HTTP timeout in seconds
//! - `BOKIO_MAX_RETRIES`: Retries after the first attempt
//! - `BOKIO_RATE_LIMIT`: Requests per second, `0` or less disables
//! - `BOKIO_SCOPES`: OAuth scopes, comma or whitespace separated
//! - `BOKIO_USER_AGENT`: `User-Agent` header value
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./bokio.toml`, `./bokio.json`, `./config.toml`, `./config.json`
//! 2. The same names in `../` and `../../`
//! 3. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use bokio_domain::constants::READ_ONLY_ENV_VAR;
use bokio_domain::{BokioError, ClientConfig, Config, Credentials, Result};

const CONFIG_FILE_NAMES: &[&str] = &["bokio.toml", "bokio.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If no credentials
/// are set there, falls back to loading from a config file.
///
/// # Errors
/// Returns `BokioError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Unset tunables keep their [`ClientConfig`] defaults. Credentials are
/// required: an integration token wins over OAuth variables when both are
/// present.
///
/// # Errors
/// Returns `BokioError::Config` if no credentials are set or a numeric
/// variable does not parse.
pub fn load_from_env() -> Result<Config> {
    let credentials = credentials_from_env()?;

    let mut client = ClientConfig::default();
    if let Some(base_url) = env_opt("BOKIO_BASE_URL") {
        client.base_url = base_url;
    }
    if let Some(redirect_uri) = env_opt("BOKIO_REDIRECT_URL") {
        client.redirect_uri = redirect_uri;
    }
    if let Some(user_agent) = env_opt("BOKIO_USER_AGENT") {
        client.user_agent = user_agent;
    }
    if let Some(scopes) = env_opt("BOKIO_SCOPES") {
        client.scopes = parse_scopes(&scopes);
    }
    if let Some(secs) = env_parse::<u64>("BOKIO_TIMEOUT_SECS")? {
        client.timeout = Duration::from_secs(secs);
    }
    if let Some(retries) = env_parse::<u32>("BOKIO_MAX_RETRIES")? {
        client.max_retries = retries;
    }
    if let Some(rate) = env_parse::<i64>("BOKIO_RATE_LIMIT")? {
        client.rate_limit = u32::try_from(rate.max(0)).map_err(|_| {
            BokioError::Config(format!("Invalid rate limit: {rate} exceeds {}", u32::MAX))
        })?;
    }
    client.read_only = env_bool(READ_ONLY_ENV_VAR, client.read_only);

    Ok(Config { client, credentials })
}

fn credentials_from_env() -> Result<Credentials> {
    if let Some(token) = env_opt("BOKIO_INTEGRATION_TOKEN") {
        return Ok(Credentials::IntegrationToken { token });
    }

    let client_id = env_var("BOKIO_CLIENT_ID")?;
    let client_secret = env_var("BOKIO_CLIENT_SECRET")?;
    Ok(Credentials::OAuth { client_id, client_secret })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Arguments
/// * `path` - Optional path to config file. If `None`, uses
///   [`probe_config_paths`].
///
/// # Errors
/// Returns `BokioError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(BokioError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            BokioError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| BokioError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Format is detected by file extension (`.json` or `.toml`)
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| BokioError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| BokioError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(BokioError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory, its two parents, then the same
/// three levels relative to the executable.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| [root.clone(), root.join(".."), root.join("../..")])
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Split on commas and whitespace, dropping empty entries
fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Get required environment variable
///
/// # Errors
/// Returns `BokioError::Config` if the variable is not set or empty.
fn env_var(key: &str) -> Result<String> {
    env_opt(key)
        .ok_or_else(|| BokioError::Config(format!("Missing required environment variable: {key}")))
}

/// Non-empty environment variable
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| BokioError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
///
/// # Returns
/// The parsed boolean value, or `default` if not set.
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: &[&str] = &[
        "BOKIO_INTEGRATION_TOKEN",
        "BOKIO_CLIENT_ID",
        "BOKIO_CLIENT_SECRET",
        "BOKIO_BASE_URL",
        "BOKIO_REDIRECT_URL",
        "BOKIO_READ_ONLY",
        "BOKIO_TIMEOUT_SECS",
        "BOKIO_MAX_RETRIES",
        "BOKIO_RATE_LIMIT",
        "BOKIO_SCOPES",
        "BOKIO_USER_AGENT",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for value in ["1", "true", "yes", "on", "TRUE"] {
            std::env::set_var("TEST_BOKIO_BOOL", value);
            assert!(env_bool("TEST_BOKIO_BOOL", false), "{value} should be true");
        }
        for value in ["0", "false", "no", "off", "maybe"] {
            std::env::set_var("TEST_BOKIO_BOOL", value);
            assert!(!env_bool("TEST_BOKIO_BOOL", true), "{value} should be false");
        }

        std::env::remove_var("TEST_BOKIO_BOOL");
        assert!(env_bool("TEST_BOKIO_BOOL", true));
        assert!(!env_bool("TEST_BOKIO_BOOL", false));
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!(parse_scopes("accounting,invoices"), vec!["accounting", "invoices"]);
        assert_eq!(parse_scopes(" accounting  invoices ,"), vec!["accounting", "invoices"]);
        assert!(parse_scopes(" , ").is_empty());
    }

    #[test]
    fn test_load_from_env_integration_token() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("BOKIO_INTEGRATION_TOKEN", "tok-123");
        std::env::set_var("BOKIO_CLIENT_ID", "ignored");
        std::env::set_var("BOKIO_BASE_URL", "http://localhost:9000");
        std::env::set_var("BOKIO_READ_ONLY", "yes");
        std::env::set_var("BOKIO_TIMEOUT_SECS", "5");
        std::env::set_var("BOKIO_MAX_RETRIES", "1");
        std::env::set_var("BOKIO_RATE_LIMIT", "-3");
        std::env::set_var("BOKIO_SCOPES", "accounting");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        assert_eq!(config.credentials, Credentials::IntegrationToken { token: "tok-123".into() });
        assert_eq!(config.client.base_url, "http://localhost:9000");
        assert!(config.client.read_only);
        assert_eq!(config.client.timeout, Duration::from_secs(5));
        assert_eq!(config.client.max_retries, 1);
        assert_eq!(config.client.rate_limit, 0);
        assert_eq!(config.client.scopes, vec!["accounting"]);
        assert_eq!(config.client.user_agent, "Bokio-MCP-Client/1.0");
    }

    #[test]
    fn test_load_from_env_oauth() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("BOKIO_CLIENT_ID", "client");
        std::env::set_var("BOKIO_CLIENT_SECRET", "secret");
        std::env::set_var("BOKIO_REDIRECT_URL", "http://localhost:3000/cb");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        assert_eq!(
            config.credentials,
            Credentials::OAuth { client_id: "client".into(), client_secret: "secret".into() }
        );
        assert_eq!(config.client.redirect_uri, "http://localhost:3000/cb");
        assert!(!config.client.read_only);
        assert_eq!(config.client.rate_limit, 10);
    }

    #[test]
    fn test_load_from_env_missing_credentials() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("BOKIO_CLIENT_ID", "client");
        let result = load_from_env();
        clear_env();

        let err = result.expect_err("secret is missing");
        assert!(matches!(err, BokioError::Config(ref msg) if msg.contains("BOKIO_CLIENT_SECRET")));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("BOKIO_INTEGRATION_TOKEN", "tok");
        std::env::set_var("BOKIO_TIMEOUT_SECS", "soon");
        let result = load_from_env();
        clear_env();

        let err = result.expect_err("timeout does not parse");
        assert!(matches!(err, BokioError::Config(ref msg) if msg.contains("BOKIO_TIMEOUT_SECS")));
    }

    #[test]
    fn test_load_from_file_toml() {
        let toml_content = r#"
[client]
base_url = "https://sandbox.bokio.se"
rate_limit = 2

[credentials]
mode = "oauth"
client_id = "id"
client_secret = "secret"
"#;
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(toml_content.as_bytes()).expect("write");
        let toml_path = file.path().with_extension("toml");
        std::fs::copy(file.path(), &toml_path).expect("copy");

        let result = load_from_file(Some(toml_path.clone()));
        std::fs::remove_file(&toml_path).ok();

        let config = result.expect("toml config");
        assert_eq!(config.client.base_url, "https://sandbox.bokio.se");
        assert_eq!(config.client.rate_limit, 2);
        assert_eq!(config.client.max_retries, 3);
        assert!(!config.credentials.is_integration_token());
    }

    #[test]
    fn test_load_from_file_json() {
        let json_content = r#"{
            "client": { "read_only": true, "timeout_secs": 12 },
            "credentials": { "mode": "integration_token", "token": "abc" }
        }"#;
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(json_content.as_bytes()).expect("write");
        let json_path = file.path().with_extension("json");
        std::fs::copy(file.path(), &json_path).expect("copy");

        let result = load_from_file(Some(json_path.clone()));
        std::fs::remove_file(&json_path).ok();

        let config = result.expect("json config");
        assert!(config.client.read_only);
        assert_eq!(config.client.timeout, Duration::from_secs(12));
        assert!(config.credentials.is_integration_token());
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/bokio.toml")));
        assert!(matches!(result, Err(BokioError::Config(msg)) if msg.contains("not found")));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = parse_config("{}", Path::new("config.yaml"));
        assert!(matches!(result, Err(BokioError::Config(msg)) if msg.contains("yaml")));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = parse_config("[client\nbase_url = ", Path::new("bokio.toml"));
        assert!(matches!(result, Err(BokioError::Config(msg)) if msg.contains("TOML")));
    }
}
