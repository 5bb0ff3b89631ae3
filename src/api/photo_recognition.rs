use serde_json::Value;

use crate::client::AuthenticatedHttpClient;
use crate::error::Result;

const CONFIGURE_PATH: &str = "integrations/photo-recognition/configure/";

/// Third-party image recognition providers used when clients send photos.
#[derive(Debug, Clone)]
pub struct PhotoRecognitionApi {
    client: AuthenticatedHttpClient,
}

impl PhotoRecognitionApi {
    pub fn new(client: AuthenticatedHttpClient) -> Self {
        Self { client }
    }

    /// Providers available on the current subscription tier.
    pub async fn providers(&self) -> Result<Value> {
        self.client.get("integrations/photo-recognition/providers/").await
    }

    pub async fn configs(&self) -> Result<Value> {
        self.client.get(CONFIGURE_PATH).await
    }

    pub async fn configure(&self, config: &Value) -> Result<Value> {
        self.client.post(CONFIGURE_PATH, config).await
    }

    pub async fn delete_config(&self, config_id: u64) -> Result<Value> {
        self.client.delete(&format!("{CONFIGURE_PATH}{config_id}/")).await
    }

    pub async fn set_default(&self, config_id: u64) -> Result<Value> {
        self.client.patch_empty(&format!("{CONFIGURE_PATH}{config_id}/set-default/")).await
    }
}
