use serde_json::Value;

use crate::client::AuthenticatedHttpClient;
use crate::error::Result;

const PREFERENCES_PATH: &str = "auth/booking-preferences/";

#[derive(Debug, Clone)]
pub struct BookingPreferencesApi {
    client: AuthenticatedHttpClient,
}

impl BookingPreferencesApi {
    pub fn new(client: AuthenticatedHttpClient) -> Self {
        Self { client }
    }

    pub async fn get(&self) -> Result<Value> {
        self.client.get(PREFERENCES_PATH).await
    }

    pub async fn update(&self, preferences: &Value) -> Result<Value> {
        self.client.put(PREFERENCES_PATH, preferences).await
    }
}
