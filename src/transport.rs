//! The wire seam between the client and the backend.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{multipart, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};

/// Request body. Kept as plain data so a request can be replayed after a token refresh.
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartForm),
}

impl Body {
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| ApiError::InvalidRequest(format!("failed to serialize body: {e}")))
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }
}

/// A `multipart/form-data` payload for file, photo and audio uploads.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

#[derive(Debug, Clone)]
pub struct FormPart {
    pub name: String,
    pub value: PartValue,
}

#[derive(Debug, Clone)]
pub enum PartValue {
    Text(String),
    File { file_name: String, bytes: Vec<u8>, mime: Option<String> },
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart { name: name.into(), value: PartValue::Text(value.into()) });
        self
    }

    pub fn file(
        self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.push_file(name.into(), file_name.into(), bytes, None)
    }

    pub fn file_with_mime(
        self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        mime: impl Into<String>,
    ) -> Self {
        self.push_file(name.into(), file_name.into(), bytes, Some(mime.into()))
    }

    fn push_file(
        mut self,
        name: String,
        file_name: String,
        bytes: Vec<u8>,
        mime: Option<String>,
    ) -> Self {
        let value = PartValue::File { file_name, bytes, mime };
        self.parts.push(FormPart { name, value });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    fn to_form(&self) -> Result<multipart::Form> {
        let mut form = multipart::Form::new();
        for part in &self.parts {
            form = match &part.value {
                PartValue::Text(text) => form.text(part.name.clone(), text.clone()),
                PartValue::File { file_name, bytes, mime } => {
                    let mut file =
                        multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
                    if let Some(mime) = mime {
                        file = file.mime_str(mime).map_err(|e| {
                            ApiError::InvalidRequest(format!("invalid mime type {mime:?}: {e}"))
                        })?;
                    }
                    form.part(part.name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Body,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new(), body: Body::Empty }
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Parse the body as JSON. An empty body parses as `null`, so `()`,
    /// `Option<T>` and `Value` all accept a 204.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let parsed = if self.body.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_value(Value::Null)
        } else {
            serde_json::from_slice(&self.body)
        };
        parsed.map_err(|e| ApiError::Decode(format!("status {}: {e}", self.status.as_u16())))
    }
}

/// Sends one request and returns whatever the server answered.
///
/// Implementations must return `Ok` for every HTTP response, including 4xx and
/// 5xx. `Err` is reserved for requests that never got an answer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// [`Transport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let ApiRequest { method, url, headers, body } = request;
        let builder = self.client.request(method, url).headers(headers);
        let builder = match body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::Multipart(form) => builder.multipart(form.to_form()?),
        };
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(transport_error)?.to_vec();
        Ok(ApiResponse { status, headers, body })
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_builder() {
        ApiError::InvalidRequest(err.to_string())
    } else {
        ApiError::NetworkUnavailable(err.to_string())
    }
}
