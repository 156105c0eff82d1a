use crate::domain::model::{DeliveryOutcome, DownloadedMedia, MediaKind, ParseMode};
use crate::domain::ports::{BotApi, MediaFetcher};
use crate::utils::error::Result;
use std::path::Path;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// 一次下載任務：檢查大小、下載、上傳，過程中以同一則狀態訊息回報進度
pub struct MediaDelivery<'a, B: ?Sized, F: ?Sized> {
    bot: &'a B,
    fetcher: &'a F,
    limit_bytes: u64,
}

impl<'a, B, F> MediaDelivery<'a, B, F>
where
    B: BotApi + ?Sized,
    F: MediaFetcher + ?Sized,
{
    pub fn new(bot: &'a B, fetcher: &'a F, limit_bytes: u64) -> Self {
        Self {
            bot,
            fetcher,
            limit_bytes,
        }
    }

    pub async fn deliver(&self, chat_id: i64, url: &str, kind: MediaKind) -> DeliveryOutcome {
        let status = match self
            .bot
            .send_message(chat_id, &format!("Checking {} details...", kind))
            .await
        {
            Ok(message) => message,
            Err(e) => {
                tracing::error!("Could not send status message to chat {}: {}", chat_id, e);
                return DeliveryOutcome::Failed;
            }
        };
        let status_id = status.message_id;

        let mut downloaded: Option<DownloadedMedia> = None;
        let outcome = match self
            .run(chat_id, status_id, url, kind, &mut downloaded)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    "Error downloading {}: {} (category: {:?})",
                    kind,
                    e,
                    e.category()
                );
                let text = format!(
                    "Sorry, an error occurred while processing the {}. 😔",
                    kind
                );
                if let Err(edit_err) = self
                    .bot
                    .edit_message_text(chat_id, status_id, &text, None)
                    .await
                {
                    tracing::warn!("Could not report failure to chat {}: {}", chat_id, edit_err);
                }
                DeliveryOutcome::Failed
            }
        };

        if let Some(media) = downloaded {
            cleanup(&media, kind).await;
        }
        outcome
    }

    async fn run(
        &self,
        chat_id: i64,
        status_id: i64,
        url: &str,
        kind: MediaKind,
        downloaded: &mut Option<DownloadedMedia>,
    ) -> Result<DeliveryOutcome> {
        let info = self.fetcher.probe(url, kind).await?;

        match info.size_bytes() {
            Some(size) if size > self.limit_bytes => {
                self.reject_too_large(chat_id, status_id, kind, size).await?;
                return Ok(DeliveryOutcome::TooLarge { size_bytes: size });
            }
            Some(_) => {}
            None => {
                let text = format!(
                    "❌ *Error:* Could not determine the {} size, so it may exceed the {} MB limit.",
                    kind,
                    self.limit_mb()
                );
                self.bot
                    .edit_message_text(chat_id, status_id, &text, Some(ParseMode::Markdown))
                    .await?;
                return Ok(DeliveryOutcome::UnknownSize);
            }
        }

        self.bot
            .edit_message_text(
                chat_id,
                status_id,
                &format!("Downloading {}... {}", kind, kind.emoji()),
                None,
            )
            .await?;
        let media = downloaded.insert(self.fetcher.download(url, kind).await?);

        // 實際檔案可能比 probe 時的估計值大
        let actual_size = tokio::fs::metadata(&media.path).await?.len();
        if actual_size > self.limit_bytes {
            self.reject_too_large(chat_id, status_id, kind, actual_size)
                .await?;
            return Ok(DeliveryOutcome::TooLarge {
                size_bytes: actual_size,
            });
        }

        self.bot
            .edit_message_text(
                chat_id,
                status_id,
                &format!("Uploading {}... 🚀", kind),
                None,
            )
            .await?;

        let title = media
            .info
            .title
            .clone()
            .unwrap_or_else(|| kind.default_title().to_string());
        match kind {
            MediaKind::Video => {
                self.bot.send_video(chat_id, &media.path, &title).await?;
            }
            MediaKind::Audio => {
                let performer = media
                    .info
                    .uploader
                    .clone()
                    .unwrap_or_else(|| "Uploader".to_string());
                self.bot
                    .send_audio(chat_id, &media.path, &title, &performer)
                    .await?;
            }
        }

        // 檔案已送達，刪除狀態訊息失敗不影響結果
        if let Err(e) = self.bot.delete_message(chat_id, status_id).await {
            tracing::warn!("Could not delete status message {}: {}", status_id, e);
        }
        tracing::info!("Sent {} '{}' to chat {}", kind, title, chat_id);
        Ok(DeliveryOutcome::Sent)
    }

    async fn reject_too_large(
        &self,
        chat_id: i64,
        status_id: i64,
        kind: MediaKind,
        size: u64,
    ) -> Result<()> {
        tracing::info!(
            "Rejecting {} for chat {}: {} bytes exceeds {} bytes",
            kind,
            chat_id,
            size,
            self.limit_bytes
        );
        let text = format!(
            "❌ *Error:* The {} is larger than {} MB. File size: {:.2} MB",
            kind,
            self.limit_mb(),
            size as f64 / BYTES_PER_MB
        );
        self.bot
            .edit_message_text(chat_id, status_id, &text, Some(ParseMode::Markdown))
            .await
    }

    fn limit_mb(&self) -> u64 {
        self.limit_bytes / (1024 * 1024)
    }
}

async fn cleanup(media: &DownloadedMedia, kind: MediaKind) {
    match tokio::fs::remove_file(&media.path).await {
        Ok(()) => tracing::info!("Cleaned up {} file: {}", kind, media.path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove {}: {}", media.path.display(), e),
    }
    remove_work_dir(&media.work_dir).await;
}

async fn remove_work_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => tracing::debug!("Removed work dir {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove {}: {}", dir.display(), e),
    }
}
