use serde::Serialize;
use serde_json::Value;

use crate::client::AuthenticatedHttpClient;
use crate::error::Result;

#[derive(Debug, Serialize)]
struct Page {
    limit: u32,
    offset: u32,
}

#[derive(Debug, Clone)]
pub struct NotificationsApi {
    client: AuthenticatedHttpClient,
}

impl NotificationsApi {
    pub fn new(client: AuthenticatedHttpClient) -> Self {
        Self { client }
    }

    pub async fn settings(&self) -> Result<Value> {
        self.client.get("notifications/settings/").await
    }

    pub async fn update_settings(&self, settings: &Value) -> Result<Value> {
        self.client.put("notifications/settings/", settings).await
    }

    pub async fn history(&self, limit: u32, offset: u32) -> Result<Value> {
        self.client.get_query("notifications/history/", &Page { limit, offset }).await
    }

    pub async fn send_test(&self) -> Result<Value> {
        self.client.post_empty("notifications/test/").await
    }
}
