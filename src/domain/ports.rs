use crate::domain::model::{
    DownloadedMedia, InlineKeyboardMarkup, MediaInfo, MediaKind, Message, ParseMode, Update, User,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Telegram Bot API 的抽象，方便在測試中替換
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn get_me(&self) -> Result<User>;
    /// long polling 前必須移除 webhook，否則 getUpdates 會回 409
    async fn delete_webhook(&self) -> Result<()>;
    async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>>;
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message>;
    async fn send_message_with_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<Message>;
    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<()>;
    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()>;
    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()>;
    async fn send_video(&self, chat_id: i64, path: &Path, caption: &str) -> Result<()>;
    async fn send_audio(&self, chat_id: i64, path: &Path, title: &str, performer: &str)
        -> Result<()>;
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn probe(&self, url: &str, kind: MediaKind) -> Result<MediaInfo>;
    async fn download(&self, url: &str, kind: MediaKind) -> Result<DownloadedMedia>;
}

pub trait ConfigProvider: Send + Sync {
    fn bot_token(&self) -> &str;
    fn api_base(&self) -> &str;
    fn download_dir(&self) -> &str;
    fn cookies_file(&self) -> &str;
    fn yt_dlp_bin(&self) -> &str;
    fn max_file_size_mb(&self) -> u64;
    fn poll_timeout_secs(&self) -> u64;
    fn retry_delay_secs(&self) -> u64;
    fn max_concurrent_downloads(&self) -> usize;
    fn allowed_hosts(&self) -> &[String];

    fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb() * 1024 * 1024
    }
}
