use std::sync::Arc;

pub use api::{
    AgentApi, BillingCycle, BookingPreferencesApi, DocumentsApi, IntegrationsApi, ManualQuery,
    ManualsApi, NotificationsApi, OAuthProvider, PhotoRecognitionApi, SubscriptionApi,
};
pub use auth::{AuthApi, Registration};
pub use client::{
    AuthenticatedHttpClient, ClientBuilder, RefreshCallback, RefreshData, RequestOptions,
    SessionEnded, SessionEndedCallback,
};
pub use config::ClientConfig;
pub use error::{ApiError, Result};
pub use fallback::MockFallback;
pub use store::{
    clear_credentials, load_credentials, save_credentials, CredentialPair, CredentialStore,
    FileCredentialStore, MemoryCredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
pub use transport::{
    ApiRequest, ApiResponse, Body, FormPart, HttpTransport, MultipartForm, PartValue, Transport,
};

pub use reqwest::{Method, StatusCode, Url};

mod api;
mod auth;
mod client;
pub mod config;
mod error;
mod fallback;
mod refresh;
mod store;
mod transport;

/// The main entry point: one authenticated client shared by every endpoint group.
///
/// ```no_run
/// # async fn run() -> sloth_client::Result<()> {
/// use std::sync::Arc;
/// use sloth_client::{ClientConfig, MemoryCredentialStore, SlothApi};
///
/// let store = Arc::new(MemoryCredentialStore::new());
/// let api = SlothApi::connect(ClientConfig::from_env()?, store)?;
/// api.auth().login("owner@salon.com", "secret").await?;
/// let prompt = api.agent().prompt().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SlothApi {
    client: AuthenticatedHttpClient,
    auth: AuthApi,
    agent: AgentApi,
    manuals: ManualsApi,
    subscription: SubscriptionApi,
    notifications: NotificationsApi,
    integrations: IntegrationsApi,
    photo_recognition: PhotoRecognitionApi,
    booking_preferences: BookingPreferencesApi,
    documents: DocumentsApi,
}

impl SlothApi {
    pub fn new(client: AuthenticatedHttpClient) -> Self {
        Self {
            auth: AuthApi::new(client.clone()),
            agent: AgentApi::new(client.clone()),
            manuals: ManualsApi::new(client.clone()),
            subscription: SubscriptionApi::new(client.clone()),
            notifications: NotificationsApi::new(client.clone()),
            integrations: IntegrationsApi::new(client.clone()),
            photo_recognition: PhotoRecognitionApi::new(client.clone()),
            booking_preferences: BookingPreferencesApi::new(client.clone()),
            documents: DocumentsApi::new(client.clone()),
            client,
        }
    }

    /// Build a client over the default HTTP transport. Use
    /// [`AuthenticatedHttpClient::builder`] to install session callbacks.
    pub fn connect(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        Ok(Self::new(AuthenticatedHttpClient::new(config, store)?))
    }

    pub fn client(&self) -> &AuthenticatedHttpClient {
        &self.client
    }

    pub fn auth(&self) -> &AuthApi {
        &self.auth
    }

    pub fn agent(&self) -> &AgentApi {
        &self.agent
    }

    pub fn manuals(&self) -> &ManualsApi {
        &self.manuals
    }

    pub fn subscription(&self) -> &SubscriptionApi {
        &self.subscription
    }

    pub fn notifications(&self) -> &NotificationsApi {
        &self.notifications
    }

    pub fn integrations(&self) -> &IntegrationsApi {
        &self.integrations
    }

    pub fn photo_recognition(&self) -> &PhotoRecognitionApi {
        &self.photo_recognition
    }

    pub fn booking_preferences(&self) -> &BookingPreferencesApi {
        &self.booking_preferences
    }

    pub fn documents(&self) -> &DocumentsApi {
        &self.documents
    }

    pub fn mock_fallback(&self) -> MockFallback {
        MockFallback::from_config(self.client.config())
    }
}
