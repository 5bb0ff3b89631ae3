use std::fmt;
use std::sync::Arc;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{error_payload, ApiError, Result};
use crate::refresh::{
    Join, RefreshCoordinator, RefreshRequest, TokenEnvelope, WaveGuard, REFRESH_PATH,
};
use crate::store::{clear_credentials, CredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::transport::{
    ApiRequest, ApiResponse, Body, HttpTransport, MultipartForm, Transport,
};

/// Passed to the refresh callback after a new access token has been stored.
#[derive(Debug, Clone)]
pub struct RefreshData {
    pub access_token: String,
}

/// Emitted once when a failed refresh ends the session. The UI should return to its login screen.
#[derive(Debug, Clone)]
pub struct SessionEnded {
    pub reason: String,
}

pub type SessionEndedCallback = Arc<dyn Fn(SessionEnded) + Send + Sync>;
pub type RefreshCallback = Arc<dyn Fn(RefreshData) + Send + Sync>;

/// Per-request overrides.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    headers: HeaderMap,
    query: Option<String>,
    skip_refresh: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Encode `params` as the query string.
    pub fn query<Q: Serialize>(mut self, params: &Q) -> Result<Self> {
        let encoded = serde_qs::to_string(params)
            .map_err(|e| ApiError::InvalidRequest(format!("failed to encode query: {e}")))?;
        self.query = Some(encoded).filter(|q| !q.is_empty());
        Ok(self)
    }

    /// A 401 is returned to the caller as-is instead of starting a token refresh.
    /// Used by the endpoints that hand out tokens in the first place.
    pub fn without_refresh(mut self) -> Self {
        self.skip_refresh = true;
        self
    }
}

struct Inner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    refresh: RefreshCoordinator,
    on_session_ended: Option<SessionEndedCallback>,
    on_refresh: Option<RefreshCallback>,
}

/// HTTP client for the backend API.
///
/// Attaches the stored bearer token to every request. When the server answers
/// 401, the refresh token is exchanged once for all requests that failed in the
/// same wave, and each of them is retried once with the new token.
///
/// Cloning is cheap and every clone shares the same refresh state, so build
/// one at startup and hand clones to each API module.
#[derive(Clone)]
pub struct AuthenticatedHttpClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for AuthenticatedHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedHttpClient")
            .field("base_url", &self.inner.config.base_url().as_str())
            .field("refresh_in_flight", &self.inner.refresh.in_flight())
            .finish_non_exhaustive()
    }
}

pub struct ClientBuilder {
    config: ClientConfig,
    store: Arc<dyn CredentialStore>,
    transport: Option<Arc<dyn Transport>>,
    on_session_ended: Option<SessionEndedCallback>,
    on_refresh: Option<RefreshCallback>,
}

impl ClientBuilder {
    /// Defaults to [`HttpTransport`] when not set.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn on_session_ended(
        mut self,
        callback: impl Fn(SessionEnded) + Send + Sync + 'static,
    ) -> Self {
        self.on_session_ended = Some(Arc::new(callback));
        self
    }

    pub fn on_refresh(mut self, callback: impl Fn(RefreshData) + Send + Sync + 'static) -> Self {
        self.on_refresh = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> Result<AuthenticatedHttpClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config)?),
        };
        Ok(AuthenticatedHttpClient {
            inner: Arc::new(Inner {
                config: self.config,
                transport,
                store: self.store,
                refresh: RefreshCoordinator::default(),
                on_session_ended: self.on_session_ended,
                on_refresh: self.on_refresh,
            }),
        })
    }
}

impl AuthenticatedHttpClient {
    pub fn builder(config: ClientConfig, store: Arc<dyn CredentialStore>) -> ClientBuilder {
        ClientBuilder {
            config,
            store,
            transport: None,
            on_session_ended: None,
            on_refresh: None,
        }
    }

    /// Client over the default reqwest transport.
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        Self::builder(config, store).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.store
    }

    /// True when an access token is stored.
    pub async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.access_token().await?.is_some())
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, Body::Empty, RequestOptions::new()).await
    }

    pub async fn get_query<T, Q>(&self, path: &str, params: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize,
    {
        let options = RequestOptions::new().query(params)?;
        self.request(Method::GET, path, Body::Empty, options).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, Body::json(body)?, RequestOptions::new()).await
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::POST, path, Body::Empty, RequestOptions::new()).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PUT, path, Body::json(body)?, RequestOptions::new()).await
    }

    pub async fn patch_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::PATCH, path, Body::Empty, RequestOptions::new()).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::DELETE, path, Body::Empty, RequestOptions::new()).await
    }

    pub async fn upload<T: DeserializeOwned>(&self, path: &str, form: MultipartForm) -> Result<T> {
        self.request(Method::POST, path, Body::Multipart(form), RequestOptions::new()).await
    }

    /// Issue a request and parse the 2xx body as JSON.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Body,
        options: RequestOptions,
    ) -> Result<T> {
        self.execute(method, path, body, options).await?.json()
    }

    /// Issue a request and return the raw 2xx response.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Body,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let mut url = self.inner.config.endpoint(path)?;
        if let Some(query) = &options.query {
            url.set_query(Some(query));
        }

        let generation = self.inner.refresh.generation();
        let token = self.access_token().await?;
        let response = self.send(&method, &url, &body, &options, token.as_deref()).await?;
        if response.status != StatusCode::UNAUTHORIZED || options.skip_refresh {
            return into_success(response);
        }

        debug!(%method, path, "access token rejected");
        let fresh = self.refreshed_token(generation, token.as_deref()).await?;
        let retried = self.send(&method, &url, &body, &options, Some(&fresh)).await?;
        if retried.status == StatusCode::UNAUTHORIZED {
            // One retry per request. A second 401 is final.
            warn!(%method, path, "request rejected again after token refresh");
            return Err(ApiError::AuthorizationExpired { payload: error_payload(&retried.body) });
        }
        into_success(retried)
    }

    async fn access_token(&self) -> Result<Option<String>> {
        Ok(self.inner.store.get(ACCESS_TOKEN_KEY).await?.filter(|t| !t.is_empty()))
    }

    fn authorize(&self, headers: &mut HeaderMap, token: Option<&str>) -> Result<()> {
        match token {
            Some(token) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                    ApiError::InvalidRequest("access token is not a valid header value".to_string())
                })?;
                value.set_sensitive(true);
                headers.insert(header::AUTHORIZATION, value);
            }
            None => {
                headers.remove(header::AUTHORIZATION);
            }
        }
        Ok(())
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        body: &Body,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> Result<ApiResponse> {
        let mut request = ApiRequest::new(method.clone(), url.clone());
        if !body.is_multipart() {
            request.headers.insert(header::CONTENT_TYPE, json_content_type());
        }
        for (name, value) in &options.headers {
            request.headers.insert(name.clone(), value.clone());
        }
        if body.is_multipart() {
            // The transport writes the boundary into the content type.
            request.headers.remove(header::CONTENT_TYPE);
        }
        // An explicit Authorization override is only replaced when a token is stored.
        if token.is_some() || !options.headers.contains_key(header::AUTHORIZATION) {
            self.authorize(&mut request.headers, token)?;
        }
        request.body = body.clone();

        debug!(%method, url = %url, authorized = token.is_some(), "sending request");
        self.inner.transport.send(request).await
    }

    /// Get a usable access token after `stale` was rejected. `generation` is the
    /// refresh generation read before `stale` was loaded.
    async fn refreshed_token(&self, generation: u64, stale: Option<&str>) -> Result<String> {
        let ticket = match self.inner.refresh.join(generation, stale) {
            Join::Settled(outcome) => {
                debug!("token refresh settled while the request was in flight");
                return outcome;
            }
            Join::Wait(ticket) => ticket,
        };
        if ticket.leader {
            let client = self.clone();
            tokio::spawn(async move { client.run_refresh_wave().await });
        } else {
            debug!("token refresh already in flight, waiting");
        }
        ticket.outcome.await.unwrap_or_else(|_| {
            Err(ApiError::SessionInvalid("token refresh was aborted".to_string()))
        })
    }

    /// Callbacks fire before the waiters are released.
    async fn run_refresh_wave(self) {
        let inner = &self.inner;
        let guard = WaveGuard::new(&inner.refresh);
        let outcome = self.exchange_refresh_token().await;

        match &outcome {
            Ok(access_token) => {
                if let Some(callback) = &inner.on_refresh {
                    callback(RefreshData { access_token: access_token.clone() });
                }
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed, ending session");
                if let Err(e) = clear_credentials(inner.store.as_ref()).await {
                    warn!(error = %e, "failed to clear credentials");
                }
                if let Some(callback) = &inner.on_session_ended {
                    callback(SessionEnded { reason: err.to_string() });
                }
            }
        }

        let waiters = guard.settle(&outcome);
        if outcome.is_ok() {
            info!(waiters, "access token refreshed");
        }
    }

    /// Exchange the stored refresh token for a new access token. Every failure
    /// is `SessionInvalid`.
    async fn exchange_refresh_token(&self) -> Result<String> {
        self.try_exchange_refresh_token().await.map_err(|err| match err {
            ApiError::SessionInvalid(_) => err,
            other => ApiError::SessionInvalid(other.to_string()),
        })
    }

    async fn try_exchange_refresh_token(&self) -> Result<String> {
        let store = &self.inner.store;
        let refresh_token = store
            .get(REFRESH_TOKEN_KEY)
            .await?
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::SessionInvalid("no refresh token stored".to_string()))?;

        let mut request = ApiRequest::new(Method::POST, self.inner.config.endpoint(REFRESH_PATH)?);
        request.headers.insert(header::CONTENT_TYPE, json_content_type());
        request.body = Body::json(&RefreshRequest { refresh: &refresh_token })?;

        let response = into_success(self.inner.transport.send(request).await?)?;
        let tokens: TokenEnvelope = response.json()?;
        let access = tokens
            .access()
            .ok_or_else(|| {
                ApiError::Decode("refresh response carried no access token".to_string())
            })?
            .to_string();

        store.set(ACCESS_TOKEN_KEY, &access).await?;
        if let Some(rotated) = tokens.refresh() {
            store.set(REFRESH_TOKEN_KEY, rotated).await?;
        }
        Ok(access)
    }
}

fn json_content_type() -> HeaderValue {
    HeaderValue::from_static("application/json")
}

fn into_success(response: ApiResponse) -> Result<ApiResponse> {
    if response.status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::rejected(response.status, &response.body))
    }
}
