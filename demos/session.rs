//! Interactive login against a running backend.
//!
//! SLOTH_API_URL=http://localhost:8000 cargo run --example session

use std::sync::Arc;

use sloth_client::{AuthenticatedHttpClient, ClientConfig, FileCredentialStore, SlothApi};
use text_io::read;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sloth_client=debug")),
        )
        .init();

    let config = ClientConfig::from_env()?;
    let path = std::env::temp_dir().join("sloth-demo-credentials.json");
    let store = Arc::new(FileCredentialStore::new(path));
    let client = AuthenticatedHttpClient::builder(config, store)
        .on_session_ended(|event| {
            eprintln!("Session ended ({}). Please log in again.", event.reason)
        })
        .build()?;
    let api = SlothApi::new(client);

    if !api.auth().is_authenticated().await? {
        println!("Email:");
        let email: String = read!("{}\n");
        println!("Password:");
        let password: String = read!("{}\n");
        api.auth().login(email.trim(), password.trim()).await?;
    }

    let fallback = api.mock_fallback();
    let profile = fallback.resolve(api.auth().profile().await, || {
        serde_json::json!({"email": "demo@salon.com", "salon_name": "Demo Salon", "is_trial": true})
    })?;
    println!("{}", serde_json::to_string_pretty(&profile)?);

    let status = fallback
        .resolve(api.agent().training_status().await, || serde_json::json!({"status": "idle"}))?;
    println!("Training: {status}");
    Ok(())
}
