//! Blocking facade over the Telegram Bot API
//!
//! Requests run on an owned tokio runtime so the rest of the relay can stay
//! synchronous.

use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::debug;

use super::types::{ApiResponse, Chat, File, Message, Update, User};
use super::TelegramError;
use crate::config::TelegramSettings;

/// Extra time on top of the long-poll timeout before the HTTP request gives up
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Bot API client
pub struct TelegramClient {
    http: reqwest::Client,
    rt: Runtime,
    api_base: String,
    token: String,
}

impl TelegramClient {
    /// Create a client for the configured bot
    pub fn new(settings: &TelegramSettings) -> Result<Self, TelegramError> {
        let token = settings.bot_token.clone().ok_or(TelegramError::MissingToken)?;
        Self::with_base(&settings.api_base, token)
    }

    /// Create a client against a custom API base URL
    pub fn with_base(api_base: &str, token: impl Into<String>) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(TelegramError::http)?;
        let rt = Runtime::new()?;

        Ok(Self {
            http,
            rt,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Runtime the requests run on
    pub fn runtime(&self) -> &Runtime {
        &self.rt
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }

    async fn call<T, P>(&self, method: &str, params: &P, timeout: Option<Duration>) -> Result<T, TelegramError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let mut request = self.http.post(self.method_url(method)).json(params);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(TelegramError::http)?;
        let body: ApiResponse<T> = response.json().await.map_err(TelegramError::http)?;
        decode(method, body)
    }

    /// The bot's own account
    pub fn get_me(&self) -> Result<User, TelegramError> {
        self.rt.block_on(self.call("getMe", &json!({}), None))
    }

    /// Look up a chat by numeric id or @username
    pub fn get_chat(&self, chat: &str) -> Result<Chat, TelegramError> {
        self.rt.block_on(self.call("getChat", &json!({ "chat_id": chat }), None))
    }

    /// Long-poll for new messages
    pub fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>, TelegramError> {
        let mut params = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "channel_post"],
        });
        if let Some(offset) = offset {
            params["offset"] = json!(offset);
        }
        let timeout = Duration::from_secs(timeout_secs) + POLL_GRACE;
        self.rt.block_on(self.call("getUpdates", &params, Some(timeout)))
    }

    /// Download a file into `dest`, returning the server-side path
    pub fn download_file(&self, file_id: &str, dest: &mut impl Write) -> Result<String, TelegramError> {
        self.rt.block_on(async {
            let file: File = self.call("getFile", &json!({ "file_id": file_id }), None).await?;
            let file_path = file.file_path.ok_or(TelegramError::FileUnavailable)?;

            let response = self
                .http
                .get(self.file_url(&file_path))
                .send()
                .await
                .map_err(TelegramError::http)?;
            if !response.status().is_success() {
                return Err(TelegramError::Api {
                    code: i32::from(response.status().as_u16()),
                    description: format!("file download failed for {file_path}"),
                });
            }

            let mut written: u64 = 0;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(TelegramError::http)?;
                dest.write_all(&chunk)?;
                written += chunk.len() as u64;
            }
            dest.flush()?;

            debug!("Downloaded {} ({} bytes)", file_path, written);
            Ok(file_path)
        })
    }

    /// Forward an existing message
    pub fn forward_message(&self, to_chat: &str, from_chat: i64, message_id: i64) -> Result<Message, TelegramError> {
        let params = json!({
            "chat_id": to_chat,
            "from_chat_id": from_chat,
            "message_id": message_id,
        });
        self.rt.block_on(self.call("forwardMessage", &params, None))
    }

    /// Upload a local image as a new photo message
    pub fn send_photo(&self, to_chat: &str, path: &Path) -> Result<Message, TelegramError> {
        self.rt.block_on(async {
            let bytes = tokio::fs::read(path).await?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("screenshot.jpg")
                .to_string();

            let form = Form::new()
                .text("chat_id", to_chat.to_string())
                .part("photo", Part::bytes(bytes).file_name(file_name));

            let response = self
                .http
                .post(self.method_url("sendPhoto"))
                .multipart(form)
                .send()
                .await
                .map_err(TelegramError::http)?;
            let body: ApiResponse<Message> = response.json().await.map_err(TelegramError::http)?;
            decode("sendPhoto", body)
        })
    }
}

/// Unwrap a Bot API envelope
pub(crate) fn decode<T>(method: &str, body: ApiResponse<T>) -> Result<T, TelegramError> {
    if body.ok {
        if let Some(result) = body.result {
            return Ok(result);
        }
    }

    let code = body.error_code.unwrap_or(0);
    if code == 429 {
        let retry_after = body.parameters.and_then(|p| p.retry_after).unwrap_or(1);
        return Err(TelegramError::RateLimited { retry_after });
    }

    Err(TelegramError::Api {
        code,
        description: format!(
            "{}: {}",
            method,
            body.description.unwrap_or_else(|| "empty response".to_string())
        ),
    })
}
