use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::client::{AuthenticatedHttpClient, RequestOptions};
use crate::error::{ApiError, Result};
use crate::refresh::TokenEnvelope;
use crate::store::{clear_credentials, save_credentials, CredentialPair};
use crate::transport::Body;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Registration form. Extra backend fields go in `extra`.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Registration {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            organization_name: None,
            extra: Default::default(),
        }
    }

    pub fn organization(mut self, name: impl Into<String>) -> Self {
        self.organization_name = Some(name.into());
        self
    }
}

/// Session lifecycle: the endpoints that create and destroy the credential pair.
#[derive(Debug, Clone)]
pub struct AuthApi {
    client: AuthenticatedHttpClient,
}

impl AuthApi {
    pub fn new(client: AuthenticatedHttpClient) -> Self {
        Self { client }
    }

    /// Log in and store the issued tokens. Returns the response body.
    pub async fn login(&self, email: &str, password: &str) -> Result<Value> {
        let body = Body::json(&LoginRequest { email, password })?;
        let data = self.issue_tokens("auth/login/", body).await?;
        info!("logged in");
        Ok(data)
    }

    /// Register and store the issued tokens, which the backend nests under `tokens`.
    pub async fn register(&self, registration: &Registration) -> Result<Value> {
        let data = self.issue_tokens("auth/register/", Body::json(registration)?).await?;
        info!("registered new account");
        Ok(data)
    }

    pub async fn profile(&self) -> Result<Value> {
        self.client.get("auth/me/").await
    }

    /// Tell the backend, then drop local credentials. The server call is best-effort:
    /// the local session always ends.
    pub async fn logout(&self) -> Result<()> {
        if self.client.is_authenticated().await? {
            let options = RequestOptions::new().without_refresh();
            let result: Result<Value> = self
                .client
                .request(Method::POST, "auth/logout/", Body::Empty, options)
                .await;
            if let Err(err) = result {
                warn!(error = %err, "logout request failed");
            }
        }
        clear_credentials(self.client.store().as_ref()).await?;
        info!("logged out");
        Ok(())
    }

    pub async fn is_authenticated(&self) -> Result<bool> {
        self.client.is_authenticated().await
    }

    async fn issue_tokens(&self, path: &str, body: Body) -> Result<Value> {
        let data: Value = self
            .client
            .request(Method::POST, path, body, RequestOptions::new().without_refresh())
            .await?;
        let credentials = issued_credentials(&data)?;
        save_credentials(self.client.store().as_ref(), &credentials).await?;
        Ok(data)
    }
}

fn issued_credentials(data: &Value) -> Result<CredentialPair> {
    let envelope: TokenEnvelope = serde_json::from_value(data.clone())
        .map_err(|e| ApiError::Decode(format!("unexpected token response: {e}")))?;
    envelope.credentials().ok_or_else(|| {
        ApiError::Decode("response carried no access/refresh token pair".to_string())
    })
}
