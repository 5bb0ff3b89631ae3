use serde::Serialize;
use serde_json::Value;

use crate::client::AuthenticatedHttpClient;
use crate::error::Result;
use crate::transport::MultipartForm;

#[derive(Debug, Serialize)]
struct PromptUpdate<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
struct LanguageQuery<'a> {
    language: &'a str,
}

#[derive(Debug, Serialize)]
struct Speech<'a> {
    text: &'a str,
    language: &'a str,
    voice_id: Option<&'a str>,
}

/// Training, sandbox and history endpoints for the salon's assistant.
#[derive(Debug, Clone)]
pub struct AgentApi {
    client: AuthenticatedHttpClient,
}

impl AgentApi {
    pub fn new(client: AuthenticatedHttpClient) -> Self {
        Self { client }
    }

    pub async fn prompt(&self) -> Result<Value> {
        self.client.get("agent/prompt/").await
    }

    pub async fn update_prompt(&self, prompt: &str) -> Result<Value> {
        self.client.put("agent/prompt/", &PromptUpdate { prompt }).await
    }

    pub async fn files(&self) -> Result<Value> {
        self.client.get("agent/files/").await
    }

    /// Upload a training document.
    pub async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<Value> {
        let form = MultipartForm::new().file("file", file_name, bytes);
        self.client.upload("agent/files/", form).await
    }

    pub async fn delete_file(&self, file_id: u64) -> Result<Value> {
        self.client.delete(&format!("agent/files/{file_id}/")).await
    }

    pub async fn start_training(&self) -> Result<Value> {
        self.client.post_empty("agent/train/").await
    }

    pub async fn training_status(&self) -> Result<Value> {
        self.client.get("agent/train/status/").await
    }

    /// Send a sandbox message, optionally with a photo for recognition.
    pub async fn test_chat(
        &self,
        message: &str,
        photo: Option<(&str, Vec<u8>)>,
    ) -> Result<Value> {
        let mut form = MultipartForm::new().text("message", message);
        if let Some((file_name, bytes)) = photo {
            form = form.file("photo", file_name, bytes);
        }
        self.client.upload("agent/test/", form).await
    }

    pub async fn chat_history(&self) -> Result<Value> {
        self.client.get("agent/history/").await
    }

    pub async fn chat_detail(&self, chat_id: u64) -> Result<Value> {
        self.client.get(&format!("agent/history/{chat_id}/")).await
    }

    pub async fn smart_insights(&self, language: &str) -> Result<Value> {
        self.client.get_query("agent/analytics/insights/", &LanguageQuery { language }).await
    }

    /// Synthesize `text` with the salon's voice, or `voice_id` when given.
    pub async fn text_to_speech(
        &self,
        text: &str,
        language: &str,
        voice_id: Option<&str>,
    ) -> Result<Value> {
        self.client.post("agent/tts/", &Speech { text, language, voice_id }).await
    }

    /// Transcribe a voice message.
    pub async fn speech_to_text(&self, file_name: &str, audio: Vec<u8>) -> Result<Value> {
        let form = MultipartForm::new().file("audio", file_name, audio);
        self.client.upload("agent/stt/", form).await
    }
}
