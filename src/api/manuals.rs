use serde::Serialize;
use serde_json::Value;

use crate::client::AuthenticatedHttpClient;
use crate::error::Result;

/// Filters for the manuals listing. Unset fields are left out of the query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ManualQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
struct LanguageQuery<'a> {
    language: &'a str,
}

#[derive(Debug, Clone)]
pub struct ManualsApi {
    client: AuthenticatedHttpClient,
}

impl ManualsApi {
    pub fn new(client: AuthenticatedHttpClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, query: &ManualQuery) -> Result<Value> {
        self.client.get_query("manuals/", query).await
    }

    pub async fn get(&self, id: u64) -> Result<Value> {
        self.client.get(&format!("manuals/{id}/")).await
    }

    pub async fn featured(&self, language: &str) -> Result<Value> {
        self.client.get_query("manuals/featured/", &LanguageQuery { language }).await
    }

    pub async fn categories(&self) -> Result<Value> {
        self.client.get("manuals/categories/").await
    }

    pub async fn submit_feedback(&self, manual_id: u64, feedback: &Value) -> Result<Value> {
        self.client.post(&format!("manuals/{manual_id}/feedback/"), feedback).await
    }
}
