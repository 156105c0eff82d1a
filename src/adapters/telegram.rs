use crate::domain::model::{InlineKeyboardMarkup, Message, ParseMode, Update, User};
use crate::domain::ports::BotApi;
use crate::utils::error::{BotError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;

/// 在 long polling timeout 之外再給 HTTP 請求的寬限時間
const REQUEST_GRACE_SECS: u64 = 15;
/// 上傳 50 MB 檔案可能需要較久
const UPLOAD_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// Telegram Bot API 的 HTTPS 客戶端
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_base: String,
    token: String,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str, poll_timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + REQUEST_GRACE_SECS))
            .build()
            .map_err(|e| BotError::HttpError(e.without_url()))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            poll_timeout_secs,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T> {
        tracing::debug!("Calling Telegram method {}", method);
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::HttpError(e.without_url()))?;

        Self::parse_response(method, response).await
    }

    async fn call_multipart<T: DeserializeOwned>(&self, method: &str, form: Form) -> Result<T> {
        tracing::debug!("Uploading via Telegram method {}", method);
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .multipart(form)
            .send()
            .await
            .map_err(|e| BotError::HttpError(e.without_url()))?;

        Self::parse_response(method, response).await
    }

    async fn parse_response<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BotError::HttpError(e.without_url()))?;

        // Telegram 在錯誤時也會回傳 JSON；非 JSON 通常代表代理或閘道錯誤
        let parsed: ApiResponse<T> = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => return Err(BotError::SerializationError(e)),
            Err(_) => {
                return Err(BotError::TelegramApiError {
                    code: Some(i64::from(status.as_u16())),
                    description: body.chars().take(200).collect(),
                })
            }
        };

        if parsed.ok {
            return parsed.result.ok_or_else(|| BotError::TelegramApiError {
                code: None,
                description: format!("{} returned ok without a result", method),
            });
        }

        if let Some(retry_after) = parsed.parameters.and_then(|p| p.retry_after) {
            return Err(BotError::RateLimited { retry_after });
        }

        Err(BotError::TelegramApiError {
            code: parsed.error_code.or(Some(i64::from(status.as_u16()))),
            description: parsed
                .description
                .unwrap_or_else(|| format!("{} failed", method)),
        })
    }

    /// 以串流方式上傳，不把整個檔案讀進記憶體
    async fn file_part(path: &Path) -> Result<Part> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("media")
            .to_string();
        Ok(Part::stream_with_length(Body::from(file), len).file_name(file_name))
    }
}

#[async_trait]
impl BotApi for TelegramClient {
    async fn get_me(&self) -> Result<User> {
        self.call("getMe", json!({})).await
    }

    async fn delete_webhook(&self) -> Result<()> {
        // 保留尚未處理的 update
        let _: bool = self
            .call("deleteWebhook", json!({ "drop_pending_updates": false }))
            .await?;
        Ok(())
    }

    async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let mut body = json!({
            "timeout": timeout_secs.min(self.poll_timeout_secs),
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", body).await
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message> {
        self.call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await
    }

    async fn send_message_with_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<Message> {
        self.call(
            "sendMessage",
            json!({ "chat_id": chat_id, "text": text, "reply_markup": keyboard }),
        )
        .await
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<()> {
        let mut body = json!({ "chat_id": chat_id, "message_id": message_id, "text": text });
        if let Some(mode) = parse_mode {
            body["parse_mode"] = serde_json::to_value(mode)?;
        }
        // editMessageText 回傳 Message 或 true，兩者都不需要
        let _: serde_json::Value = self.call("editMessageText", body).await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let _: bool = self
            .call(
                "deleteMessage",
                json!({ "chat_id": chat_id, "message_id": message_id }),
            )
            .await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                json!({ "callback_query_id": callback_query_id }),
            )
            .await?;
        Ok(())
    }

    async fn send_video(&self, chat_id: i64, path: &Path, caption: &str) -> Result<()> {
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .text("supports_streaming", "true")
            .part("video", Self::file_part(path).await?);
        let _: Message = self.call_multipart("sendVideo", form).await?;
        Ok(())
    }

    async fn send_audio(
        &self,
        chat_id: i64,
        path: &Path,
        title: &str,
        performer: &str,
    ) -> Result<()> {
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("title", title.to_string())
            .text("performer", performer.to_string())
            .part("audio", Self::file_part(path).await?);
        let _: Message = self.call_multipart("sendAudio", form).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const TOKEN: &str = "123:secret";

    fn client_for(server: &MockServer) -> TelegramClient {
        TelegramClient::new(&server.base_url(), TOKEN, 1).unwrap()
    }

    fn message_json(message_id: i64, chat_id: i64) -> serde_json::Value {
        serde_json::json!({
            "message_id": message_id,
            "date": 0,
            "chat": {"id": chat_id, "type": "private"}
        })
    }

    #[tokio::test]
    async fn test_get_me() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/bot123:secret/getMe");
            then.status(200).json_body(serde_json::json!({
                "ok": true,
                "result": {"id": 99, "is_bot": true, "first_name": "Relay", "username": "relay_bot"}
            }));
        });

        let me = client_for(&server).get_me().await.unwrap();

        mock.assert();
        assert_eq!(me.id, 99);
        assert_eq!(me.username.as_deref(), Some("relay_bot"));
    }

    #[tokio::test]
    async fn test_delete_webhook_keeps_pending_updates() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/bot123:secret/deleteWebhook")
                .json_body_partial(r#"{"drop_pending_updates": false}"#);
            then.status(200)
                .json_body(serde_json::json!({"ok": true, "result": true}));
        });

        client_for(&server).delete_webhook().await.unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn test_webhook_conflict_is_mapped() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/bot123:secret/getUpdates");
            then.status(409).json_body(serde_json::json!({
                "ok": false,
                "error_code": 409,
                "description": "Conflict: can't use getUpdates method while webhook is active; use deleteWebhook to delete the webhook first"
            }));
        });

        let err = client_for(&server).get_updates(None, 1).await.unwrap_err();
        assert!(matches!(err, BotError::TelegramApiError { code: Some(409), .. }));
    }

    #[tokio::test]
    async fn test_get_updates_sends_offset() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/bot123:secret/getUpdates")
                .json_body_partial(r#"{"offset": 11, "timeout": 1}"#);
            then.status(200).json_body(serde_json::json!({
                "ok": true,
                "result": [{"update_id": 11, "message": {
                    "message_id": 1, "date": 0, "chat": {"id": 5, "type": "private"}, "text": "hi"
                }}]
            }));
        });

        let updates = client_for(&server).get_updates(Some(11), 30).await.unwrap();

        mock.assert();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_send_message_returns_message() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/bot123:secret/sendMessage")
                .json_body_partial(r#"{"chat_id": 42, "text": "hello"}"#);
            then.status(200)
                .json_body(serde_json::json!({"ok": true, "result": message_json(7, 42)}));
        });

        let message = client_for(&server).send_message(42, "hello").await.unwrap();

        mock.assert();
        assert_eq!(message.message_id, 7);
        assert_eq!(message.chat.id, 42);
    }

    #[tokio::test]
    async fn test_edit_message_with_markdown() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/bot123:secret/editMessageText")
                .json_body_partial(r#"{"message_id": 7, "parse_mode": "Markdown"}"#);
            then.status(200)
                .json_body(serde_json::json!({"ok": true, "result": true}));
        });

        client_for(&server)
            .edit_message_text(42, 7, "*bold*", Some(ParseMode::Markdown))
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn test_api_error_is_mapped() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/bot123:secret/deleteMessage");
            then.status(400).json_body(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message to delete not found"
            }));
        });

        let err = client_for(&server).delete_message(42, 1).await.unwrap_err();

        match err {
            BotError::TelegramApiError { code, description } => {
                assert_eq!(code, Some(400));
                assert!(description.contains("not found"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_is_mapped() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/bot123:secret/sendMessage");
            then.status(429).json_body(serde_json::json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 3",
                "parameters": {"retry_after": 3}
            }));
        });

        let err = client_for(&server).send_message(1, "x").await.unwrap_err();
        assert!(matches!(err, BotError::RateLimited { retry_after: 3 }));
    }

    #[tokio::test]
    async fn test_non_json_gateway_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/bot123:secret/getMe");
            then.status(502).body("<html>Bad Gateway</html>");
        });

        let err = client_for(&server).get_me().await.unwrap_err();
        assert!(matches!(err, BotError::TelegramApiError { code: Some(502), .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_send_audio_uploads_multipart() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/bot123:secret/sendAudio")
                .body_contains("name=\"performer\"")
                .body_contains("Some Channel")
                .body_contains("fake-audio-bytes");
            then.status(200)
                .json_body(serde_json::json!({"ok": true, "result": message_json(8, 42)}));
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.m4a");
        std::fs::write(&path, b"fake-audio-bytes").unwrap();

        client_for(&server)
            .send_audio(42, &path, "Song", "Some Channel")
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn test_send_video_streams_file_with_caption() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/bot123:secret/sendVideo")
                .body_contains("name=\"supports_streaming\"")
                .body_contains("filename=\"clip.mp4\"")
                .body_contains("My Clip")
                .body_contains("fake-video-bytes");
            then.status(200)
                .json_body(serde_json::json!({"ok": true, "result": message_json(9, 42)}));
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"fake-video-bytes").unwrap();

        client_for(&server)
            .send_video(42, &path, "My Clip")
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn test_send_video_missing_file_is_io_error() {
        let server = MockServer::start();
        let err = client_for(&server)
            .send_video(42, Path::new("/nonexistent/clip.mp4"), "clip")
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::IoError(_)));
    }
}
