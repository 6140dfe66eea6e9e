//! Example: Listing recent journal entries
//!
//! Loads configuration from the environment, then fetches the five most
//! recent journal entries of one company.
//!
//! # Setup
//!
//! 1. Set credentials, either an integration token:
//!    ```bash
//!    export BOKIO_INTEGRATION_TOKEN=...
//!    ```
//!    or OAuth client credentials (`BOKIO_CLIENT_ID`, `BOKIO_CLIENT_SECRET`).
//!
//! 2. Set the company to query:
//!    ```bash
//!    export BOKIO_COMPANY_ID=...
//!    ```
//!
//! 3. Run this example:
//!    ```bash
//!    RUST_LOG=debug cargo run --example list_journal_entries
//!    ```

use bokio_infra::{config, BokioClient};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let company_id = std::env::var("BOKIO_COMPANY_ID")
        .map_err(|_| "BOKIO_COMPANY_ID environment variable is required")?;

    let config = config::load_from_env()?;
    let client = BokioClient::new(config.client, config.credentials)?;
    let cancel = CancellationToken::new();

    if !client.is_authenticated() {
        println!("Client is not authenticated. Visit:");
        println!("  {}", client.authorization_url("list-journal-entries")?);
        client.shutdown().await;
        return Ok(());
    }

    let path = format!("/companies/{company_id}/journal-entries?pageSize=5");
    let entries: serde_json::Value = client.get(&cancel, &path).await?;

    println!("{}", serde_json::to_string_pretty(&entries)?);

    client.shutdown().await;
    Ok(())
}
