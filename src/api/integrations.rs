use serde::Serialize;
use serde_json::{Map, Value};

use crate::client::AuthenticatedHttpClient;
use crate::error::Result;

/// Integrations connected through a Google or Meta consent screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Calendar,
    Instagram,
    GoogleReviews,
}

impl OAuthProvider {
    fn segment(self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::Instagram => "instagram",
            Self::GoogleReviews => "google-reviews",
        }
    }
}

#[derive(Debug, Serialize)]
struct TelegramConnect<'a> {
    bot_token: &'a str,
}

#[derive(Debug, Serialize)]
struct WhatsAppConnect<'a> {
    phone_number_id: &'a str,
    access_token: &'a str,
}

#[derive(Debug, Serialize)]
struct AuthorizationCode<'a> {
    code: &'a str,
}

#[derive(Debug, Serialize)]
struct AccessToken<'a> {
    access_token: &'a str,
}

#[derive(Debug, Serialize)]
struct SheetsExport<'a> {
    export_type: &'a str,
}

#[derive(Debug, Serialize)]
struct Period<'a> {
    period: &'a str,
}

#[derive(Debug, Serialize)]
struct EmailConnect<'a> {
    provider: &'a str,
    #[serde(flatten)]
    credentials: &'a Map<String, Value>,
}

/// Messaging channels, Google services, Instagram, email and the website widget.
#[derive(Debug, Clone)]
pub struct IntegrationsApi {
    client: AuthenticatedHttpClient,
}

impl IntegrationsApi {
    pub fn new(client: AuthenticatedHttpClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Value> {
        self.client.get("integrations/").await
    }

    pub async fn disconnect(&self, integration_id: u64) -> Result<Value> {
        self.client.delete(&format!("integrations/{integration_id}/")).await
    }

    pub async fn connect_telegram(&self, bot_token: &str) -> Result<Value> {
        self.client.post("integrations/telegram/connect/", &TelegramConnect { bot_token }).await
    }

    pub async fn connect_whatsapp(
        &self,
        phone_number_id: &str,
        access_token: &str,
    ) -> Result<Value> {
        let body = WhatsAppConnect { phone_number_id, access_token };
        self.client.post("integrations/whatsapp/connect/", &body).await
    }

    /// URL of the provider's consent screen.
    pub async fn auth_url(&self, provider: OAuthProvider) -> Result<Value> {
        self.client.get(&format!("integrations/{}/auth/", provider.segment())).await
    }

    /// Hand the code from the consent redirect to the backend.
    pub async fn complete_oauth(&self, provider: OAuthProvider, code: &str) -> Result<Value> {
        let path = format!("integrations/{}/callback/", provider.segment());
        self.client.post(&path, &AuthorizationCode { code }).await
    }

    pub async fn reviews_summary(&self) -> Result<Value> {
        self.client.get("integrations/google-reviews/summary/").await
    }

    pub async fn disconnect_google_reviews(&self) -> Result<Value> {
        self.client.delete("integrations/google-reviews/disconnect/").await
    }

    pub async fn connect_sheets(&self) -> Result<Value> {
        self.client.post_empty("integrations/sheets/connect/").await
    }

    /// `export_type` is `all` for a full export.
    pub async fn export_to_sheets(&self, export_type: &str) -> Result<Value> {
        self.client.post("integrations/sheets/export/", &SheetsExport { export_type }).await
    }

    pub async fn setup_widget(&self, config: &Value) -> Result<Value> {
        self.client.post("integrations/widget/setup/", config).await
    }

    pub async fn widget_config(&self) -> Result<Value> {
        self.client.get("integrations/widget/config/").await
    }

    /// Connect Instagram with a long-lived token instead of the consent flow.
    pub async fn connect_instagram(&self, access_token: &str) -> Result<Value> {
        self.client.post("integrations/instagram/connect/", &AccessToken { access_token }).await
    }

    pub async fn create_instagram_embeddings(&self) -> Result<Value> {
        self.client.post_empty("integrations/instagram/create-embeddings/").await
    }

    pub async fn instagram_analytics(&self, period: &str) -> Result<Value> {
        self.client.get_query("integrations/instagram/analytics/", &Period { period }).await
    }

    pub async fn content_recommendations(&self) -> Result<Value> {
        self.client.get("integrations/instagram/content-recommendations/").await
    }

    pub async fn disconnect_instagram(&self) -> Result<Value> {
        self.client.delete("integrations/instagram/disconnect/").await
    }

    /// `credentials` fields are sent alongside `provider` at the top level.
    pub async fn connect_email(
        &self,
        provider: &str,
        credentials: &Map<String, Value>,
    ) -> Result<Value> {
        let body = EmailConnect { provider, credentials };
        self.client.post("integrations/email/connect/", &body).await
    }

    pub async fn email_analytics(&self) -> Result<Value> {
        self.client.get("integrations/email/analytics/").await
    }

    pub async fn disconnect_email(&self) -> Result<Value> {
        self.client.delete("integrations/email/disconnect/").await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn email_credentials_are_flattened() {
        let credentials = json!({"imap_host": "imap.salon.com", "password": "pw"});
        let credentials = credentials.as_object().unwrap();
        let body = serde_json::to_value(EmailConnect { provider: "imap", credentials }).unwrap();
        assert_eq!(
            body,
            json!({"provider": "imap", "imap_host": "imap.salon.com", "password": "pw"})
        );
    }
}
