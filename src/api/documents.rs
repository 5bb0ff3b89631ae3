use serde::Serialize;
use serde_json::Value;

use crate::client::AuthenticatedHttpClient;
use crate::error::Result;
use crate::transport::MultipartForm;

#[derive(Debug, Serialize)]
struct PageNumber {
    page: u32,
}

/// Salon documents the assistant can cite: price lists, policies, menus.
#[derive(Debug, Clone)]
pub struct DocumentsApi {
    client: AuthenticatedHttpClient,
}

impl DocumentsApi {
    pub fn new(client: AuthenticatedHttpClient) -> Self {
        Self { client }
    }

    /// Pages start at 1.
    pub async fn list(&self, page: u32) -> Result<Value> {
        self.client.get_query("documents/", &PageNumber { page }).await
    }

    /// Upload `bytes` as the `file` part, with each metadata pair as a text part.
    pub async fn upload<'a>(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        metadata: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Value> {
        let form = metadata
            .into_iter()
            .fold(MultipartForm::new().file("file", file_name, bytes), |form, (name, value)| {
                form.text(name, value)
            });
        self.client.upload("documents/upload/", form).await
    }

    pub async fn delete(&self, document_id: u64) -> Result<Value> {
        self.client.delete(&format!("documents/{document_id}/")).await
    }
}
