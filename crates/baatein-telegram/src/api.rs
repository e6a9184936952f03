//! Minimal Telegram Bot API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use baatein_core::config::TelegramConfig;
use baatein_core::error::BaateinError;
use baatein_core::types::ChatId;

use crate::error::{Result, TelegramError};

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice: Option<Voice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Voice {
    pub file_id: String,
    #[serde(default)]
    pub duration: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

impl BotCommand {
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
        }
    }
}

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (_, _) => Err(TelegramError::Api {
                code: self.error_code.unwrap_or_default(),
                description: self
                    .description
                    .unwrap_or_else(|| "no result in response".to_string()),
            }),
        }
    }
}

/// Parse a Bot API response body.
fn parse_response<T: DeserializeOwned>(body: &str) -> Result<T> {
    let response: ApiResponse<T> = serde_json::from_str(body).map_err(|e| TelegramError::Api {
        code: 0,
        description: format!("unexpected response: {}", e),
    })?;
    response.into_result()
}

#[derive(Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
}

#[derive(Serialize)]
struct GetFile<'a> {
    file_id: &'a str,
}

#[derive(Serialize)]
struct SetMyCommands<'a> {
    commands: &'a [BotCommand],
}

// =============================================================================
// Client
// =============================================================================

/// Downloads the bytes behind a Telegram file id.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn download(&self, file_id: &str) -> Result<Vec<u8>>;
}

#[derive(Clone)]
pub struct BotApi {
    api_base: String,
    token: String,
    poll_timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for BotApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotApi")
            .field("api_base", &self.api_base)
            .field("poll_timeout", &self.poll_timeout)
            .finish_non_exhaustive()
    }
}

impl BotApi {
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        poll_timeout: Duration,
    ) -> std::result::Result<Self, BaateinError> {
        // Long polls hold the connection for `poll_timeout`; leave headroom.
        let client = reqwest::Client::builder()
            .timeout(poll_timeout + Duration::from_secs(15))
            .build()
            .map_err(|e| BaateinError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            poll_timeout,
            client,
        })
    }

    pub fn from_config(
        config: &TelegramConfig,
        token: impl Into<String>,
    ) -> std::result::Result<Self, BaateinError> {
        Self::new(
            config.api_base.clone(),
            token,
            Duration::from_secs(config.poll_timeout_secs),
        )
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }

    async fn call<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await?;
        let body = response.text().await?;
        parse_response(&body)
    }

    /// Long-poll for message updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout: self.poll_timeout.as_secs(),
                allowed_updates: ["message"],
            },
        )
        .await
    }

    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        markdown: bool,
        reply_to: Option<i64>,
    ) -> Result<Message> {
        self.call(
            "sendMessage",
            &SendMessage {
                chat_id: chat_id.0,
                text,
                parse_mode: markdown.then_some("Markdown"),
                reply_to_message_id: reply_to,
            },
        )
        .await
    }

    /// Upload an MP3 reply as a voice message.
    pub async fn send_voice(
        &self,
        chat_id: ChatId,
        audio: Vec<u8>,
        caption: Option<&str>,
        reply_to: Option<i64>,
    ) -> Result<Message> {
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name("reply.mp3")
            .mime_str("audio/mpeg")?;
        let mut form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.0.to_string())
            .part("voice", part);
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }
        if let Some(reply_to) = reply_to {
            form = form.text("reply_to_message_id", reply_to.to_string());
        }

        let response = self
            .client
            .post(self.method_url("sendVoice"))
            .multipart(form)
            .send()
            .await?;
        let body = response.text().await?;
        parse_response(&body)
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File> {
        self.call("getFile", &GetFile { file_id }).await
    }

    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<()> {
        let _: bool = self
            .call("setMyCommands", &SetMyCommands { commands })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FileSource for BotApi {
    async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let file = self.get_file(file_id).await?;
        let path = file.file_path.ok_or_else(|| TelegramError::Api {
            code: 0,
            description: format!("file {} has no download path", file.file_id),
        })?;

        let response = self.client.get(self.file_url(&path)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TelegramError::Api {
                code: i64::from(status.as_u16()),
                description: "file download failed".to_string(),
            });
        }
        let bytes = response.bytes().await?;
        tracing::debug!(file_id, bytes = bytes.len(), "Voice note downloaded");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> BotApi {
        BotApi::new("https://api.telegram.org/", "123:abc", Duration::from_secs(30)).unwrap()
    }

    #[test]
    fn test_urls() {
        let api = api();
        assert_eq!(
            api.method_url("getUpdates"),
            "https://api.telegram.org/bot123:abc/getUpdates"
        );
        assert_eq!(
            api.file_url("voice/file_1.oga"),
            "https://api.telegram.org/file/bot123:abc/voice/file_1.oga"
        );
    }

    #[test]
    fn test_debug_hides_token() {
        assert!(!format!("{:?}", api()).contains("abc"));
    }

    #[test]
    fn test_parse_updates() {
        let body = r#"{"ok": true, "result": [
            {"update_id": 10, "message": {"message_id": 1, "chat": {"id": 42, "type": "private"},
                "date": 0, "text": "/start"}},
            {"update_id": 11, "message": {"message_id": 2, "chat": {"id": 42},
                "voice": {"file_id": "AwAD", "duration": 3, "mime_type": "audio/ogg"}}},
            {"update_id": 12, "edited_message": {"message_id": 1}}
        ]}"#;
        let updates: Vec<Update> = parse_response(body).unwrap();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("/start"));
        assert_eq!(
            updates[1].message.as_ref().unwrap().voice.as_ref().unwrap().file_id,
            "AwAD"
        );
        assert!(updates[2].message.is_none());
    }

    #[test]
    fn test_parse_api_error() {
        let body = r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let err = parse_response::<Vec<Update>>(body).unwrap_err();
        assert!(matches!(
            err,
            TelegramError::Api { code: 401, ref description } if description == "Unauthorized"
        ));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_response::<bool>("<html>"),
            Err(TelegramError::Api { code: 0, .. })
        ));
    }

    #[test]
    fn test_send_message_body() {
        let body = serde_json::to_value(SendMessage {
            chat_id: 42,
            text: "hi",
            parse_mode: Some("Markdown"),
            reply_to_message_id: None,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "chat_id": 42, "text": "hi", "parse_mode": "Markdown" })
        );
    }
}
