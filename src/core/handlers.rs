use crate::core::delivery::MediaDelivery;
use crate::core::links::{self, PendingLinks};
use crate::domain::model::{
    CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, MediaKind, Message, Update,
};
use crate::domain::ports::{BotApi, MediaFetcher};
use crate::utils::error::Result;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const CHOICE_PROMPT: &str = "What would you like to download?";
pub const INVALID_LINK_REPLY: &str = "Please send a valid YouTube link.";
pub const EXPIRED_LINK_REPLY: &str = "This link has expired. Please send it again.";

/// 指令名稱，去掉開頭的 `/` 與 `@BotName`
fn command_name(text: &str) -> Option<String> {
    let first = text.split_whitespace().next()?;
    let command = first.strip_prefix('/')?;
    let command = command.split('@').next().unwrap_or(command);
    Some(command.to_ascii_lowercase())
}

fn choice_keyboard(key: u64) -> InlineKeyboardMarkup {
    let button = |kind: MediaKind| InlineKeyboardButton {
        text: format!("{} {}", kind.emoji(), kind.label()),
        callback_data: links::callback_data(kind, key),
    };
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![button(MediaKind::Video), button(MediaKind::Audio)]],
    }
}

/// 把 Update 分派到對應的處理函式
pub struct Dispatcher<B, F> {
    bot: Arc<B>,
    fetcher: Arc<F>,
    links: Arc<PendingLinks>,
    downloads: Arc<Semaphore>,
    limit_bytes: u64,
    allowed_hosts: Arc<Vec<String>>,
}

// 手動實作：derive 會要求 B、F 本身也是 Clone
impl<B, F> Clone for Dispatcher<B, F> {
    fn clone(&self) -> Self {
        Self {
            bot: Arc::clone(&self.bot),
            fetcher: Arc::clone(&self.fetcher),
            links: Arc::clone(&self.links),
            downloads: Arc::clone(&self.downloads),
            limit_bytes: self.limit_bytes,
            allowed_hosts: Arc::clone(&self.allowed_hosts),
        }
    }
}

impl<B, F> Dispatcher<B, F>
where
    B: BotApi + 'static,
    F: MediaFetcher + 'static,
{
    pub fn new(
        bot: Arc<B>,
        fetcher: Arc<F>,
        limit_bytes: u64,
        max_concurrent_downloads: usize,
        allowed_hosts: Vec<String>,
    ) -> Self {
        Self {
            bot,
            fetcher,
            links: Arc::new(PendingLinks::default()),
            downloads: Arc::new(Semaphore::new(max_concurrent_downloads.max(1))),
            limit_bytes,
            allowed_hosts: Arc::new(allowed_hosts),
        }
    }

    pub fn pending_links(&self) -> &PendingLinks {
        &self.links
    }

    /// 處理失敗只記錄，不讓單一 update 影響 polling
    pub async fn dispatch(&self, update: Update) {
        let update_id = update.update_id;
        if let Err(e) = self.handle_update(update).await {
            tracing::error!("Failed to handle update {}: {}", update_id, e);
        }
    }

    pub async fn handle_update(&self, update: Update) -> Result<()> {
        if let Some(query) = update.callback_query {
            return self.button_handler(query).await;
        }

        let Some(message) = update.message else {
            tracing::debug!("Ignoring update {} without message", update.update_id);
            return Ok(());
        };
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };

        match command_name(text).as_deref() {
            Some("start") => self.start_command(&message).await,
            Some("help") => self.help_command(&message).await,
            Some(other) => {
                tracing::debug!("Ignoring unknown command /{}", other);
                Ok(())
            }
            None => self.handle_message(&message, text).await,
        }
    }

    async fn start_command(&self, message: &Message) -> Result<()> {
        let name = message
            .from
            .as_ref()
            .map(|u| u.first_name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("there");
        let text = format!(
            "👋 Hi {}! Send me a YouTube link and I'll fetch the video or its audio for you.\n\n\
             Files larger than {} MB can't be sent through Telegram.",
            name,
            self.limit_mb()
        );
        self.bot.send_message(message.chat.id, &text).await?;
        Ok(())
    }

    async fn help_command(&self, message: &Message) -> Result<()> {
        let text = format!(
            "How to use this bot:\n\
             1. Send a YouTube link.\n\
             2. Choose 🎬 Video or 🎵 Audio.\n\
             3. Wait while I download and upload it.\n\n\
             Files up to {} MB are supported. Playlists are not.\n\n\
             /start - Welcome message\n\
             /help - Show this help",
            self.limit_mb()
        );
        self.bot.send_message(message.chat.id, &text).await?;
        Ok(())
    }

    async fn handle_message(&self, message: &Message, text: &str) -> Result<()> {
        let chat_id = message.chat.id;
        let Some(url) = links::extract_supported_url(text, &self.allowed_hosts) else {
            self.bot.send_message(chat_id, INVALID_LINK_REPLY).await?;
            return Ok(());
        };

        tracing::info!("Received link from chat {}: {}", chat_id, url);
        let key = self.links.insert(url);
        self.bot
            .send_message_with_keyboard(chat_id, CHOICE_PROMPT, choice_keyboard(key))
            .await?;
        Ok(())
    }

    async fn button_handler(&self, query: CallbackQuery) -> Result<()> {
        // 先回應 callback，避免按鈕一直顯示載入中
        if let Err(e) = self.bot.answer_callback_query(&query.id).await {
            tracing::warn!("Could not answer callback query {}: {}", query.id, e);
        }

        let Some(prompt) = query.message else {
            tracing::warn!("Callback query {} has no message", query.id);
            return Ok(());
        };
        let Some((kind, key)) = query.data.as_deref().and_then(links::parse_callback_data) else {
            tracing::warn!("Unrecognised callback data: {:?}", query.data);
            return Ok(());
        };
        let chat_id = prompt.chat.id;

        let Some(url) = self.links.take(key) else {
            self.bot
                .edit_message_text(chat_id, prompt.message_id, EXPIRED_LINK_REPLY, None)
                .await?;
            return Ok(());
        };

        self.bot
            .edit_message_text(
                chat_id,
                prompt.message_id,
                &format!("Selected: {} {}", kind.label(), kind.emoji()),
                None,
            )
            .await?;

        let Ok(_permit) = self.downloads.acquire().await else {
            tracing::warn!("Download slots closed, dropping {} request", kind);
            return Ok(());
        };
        let outcome = MediaDelivery::new(self.bot.as_ref(), self.fetcher.as_ref(), self.limit_bytes)
            .deliver(chat_id, &url, kind)
            .await;
        tracing::info!(
            "Finished {} request from {} for chat {}: {:?}",
            kind,
            query.from.id,
            chat_id,
            outcome
        );
        Ok(())
    }

    fn limit_mb(&self) -> u64 {
        self.limit_bytes / (1024 * 1024)
    }
}
