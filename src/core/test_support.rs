//! In-memory doubles for the ports, shared by the core unit tests.

use crate::domain::model::{
    Chat, DownloadedMedia, InlineKeyboardMarkup, MediaInfo, MediaKind, Message, ParseMode, Update,
    User,
};
use crate::domain::ports::{BotApi, MediaFetcher};
use crate::utils::error::{BotError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Send {
        chat_id: i64,
        text: String,
    },
    SendKeyboard {
        chat_id: i64,
        text: String,
        keyboard: InlineKeyboardMarkup,
    },
    Edit {
        chat_id: i64,
        message_id: i64,
        text: String,
        parse_mode: Option<ParseMode>,
    },
    Delete {
        chat_id: i64,
        message_id: i64,
    },
    Answer {
        id: String,
    },
    Video {
        chat_id: i64,
        caption: String,
        file_existed: bool,
    },
    Audio {
        chat_id: i64,
        title: String,
        performer: String,
        file_existed: bool,
    },
}

#[derive(Default)]
pub struct MockBot {
    pub calls: Mutex<Vec<Call>>,
    pub updates: Mutex<VecDeque<Result<Vec<Update>>>>,
    pub next_message_id: AtomicI64,
    pub webhook_deletes: AtomicUsize,
    pub fail_send: bool,
    /// 內容含有任一片段的 edit 會失敗
    pub fail_edits_containing: Vec<&'static str>,
    pub fail_delete: bool,
    pub fail_upload: bool,
    pub fail_get_me: bool,
    pub fail_delete_webhook: bool,
    /// 上傳前先等待，讓同時進行的下載有機會重疊
    pub upload_delay: Option<Duration>,
}

impl MockBot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_updates(batches: Vec<Result<Vec<Update>>>) -> Self {
        let bot = Self::new();
        *bot.updates.lock().unwrap() = batches.into();
        bot
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn webhook_deletes(&self) -> usize {
        self.webhook_deletes.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn before_upload(&self) -> Result<()> {
        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_upload {
            return Err(api_error("Request Entity Too Large"));
        }
        Ok(())
    }

    fn message(&self, chat_id: i64, text: &str) -> Message {
        Message {
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst) + 100,
            chat: Chat { id: chat_id },
            from: None,
            text: Some(text.to_string()),
        }
    }
}

fn api_error(description: &str) -> BotError {
    BotError::TelegramApiError {
        code: Some(400),
        description: description.to_string(),
    }
}

#[async_trait]
impl BotApi for MockBot {
    async fn get_me(&self) -> Result<User> {
        if self.fail_get_me {
            return Err(BotError::TelegramApiError {
                code: Some(401),
                description: "Unauthorized".to_string(),
            });
        }
        Ok(User {
            id: 1,
            first_name: "Relay".to_string(),
            username: Some("relay_bot".to_string()),
        })
    }

    async fn delete_webhook(&self) -> Result<()> {
        if self.fail_delete_webhook {
            return Err(api_error("Bad Request: webhook can't be removed"));
        }
        self.webhook_deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_updates(&self, _offset: Option<i64>, _timeout_secs: u64) -> Result<Vec<Update>> {
        let next = self.updates.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message> {
        if self.fail_send {
            return Err(api_error("chat not found"));
        }
        self.record(Call::Send {
            chat_id,
            text: text.to_string(),
        });
        Ok(self.message(chat_id, text))
    }

    async fn send_message_with_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<Message> {
        self.record(Call::SendKeyboard {
            chat_id,
            text: text.to_string(),
            keyboard,
        });
        Ok(self.message(chat_id, text))
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<()> {
        if self.fail_edits_containing.iter().any(|part| text.contains(part)) {
            return Err(api_error("Bad Request: message to edit not found"));
        }
        self.record(Call::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
            parse_mode,
        });
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        if self.fail_delete {
            return Err(api_error("Bad Request: message can't be deleted"));
        }
        self.record(Call::Delete {
            chat_id,
            message_id,
        });
        Ok(())
    }

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        self.record(Call::Answer {
            id: callback_query_id.to_string(),
        });
        Ok(())
    }

    async fn send_video(&self, chat_id: i64, path: &Path, caption: &str) -> Result<()> {
        self.before_upload().await?;
        self.record(Call::Video {
            chat_id,
            caption: caption.to_string(),
            file_existed: path.exists(),
        });
        Ok(())
    }

    async fn send_audio(
        &self,
        chat_id: i64,
        path: &Path,
        title: &str,
        performer: &str,
    ) -> Result<()> {
        self.before_upload().await?;
        self.record(Call::Audio {
            chat_id,
            title: title.to_string(),
            performer: performer.to_string(),
            file_existed: path.exists(),
        });
        Ok(())
    }
}

/// 把固定內容寫進暫存目錄來模擬下載
pub struct MockFetcher {
    pub info: MediaInfo,
    pub dir: PathBuf,
    pub file_len: usize,
    pub fail_probe: bool,
    pub fail_download: bool,
    downloaded: Mutex<Vec<PathBuf>>,
    next_job: AtomicUsize,
}

impl MockFetcher {
    pub fn new(dir: &Path, info: MediaInfo) -> Self {
        Self {
            info,
            dir: dir.to_path_buf(),
            file_len: 16,
            fail_probe: false,
            fail_download: false,
            downloaded: Mutex::new(Vec::new()),
            next_job: AtomicUsize::new(1),
        }
    }

    pub fn downloaded(&self) -> Vec<PathBuf> {
        self.downloaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn probe(&self, _url: &str, _kind: MediaKind) -> Result<MediaInfo> {
        if self.fail_probe {
            return Err(BotError::ExtractorError {
                message: "ERROR: Video unavailable".to_string(),
            });
        }
        Ok(self.info.clone())
    }

    async fn download(&self, _url: &str, kind: MediaKind) -> Result<DownloadedMedia> {
        if self.fail_download {
            return Err(BotError::ExtractorError {
                message: "ERROR: ffmpeg not found".to_string(),
            });
        }
        let ext = match kind {
            MediaKind::Video => "mp4",
            MediaKind::Audio => "m4a",
        };
        let work_dir = self
            .dir
            .join(format!("job-{}", self.next_job.fetch_add(1, Ordering::SeqCst)));
        tokio::fs::create_dir_all(&work_dir).await?;
        let path = work_dir.join(format!("{}.{}", self.info.id, ext));
        tokio::fs::write(&path, vec![0u8; self.file_len]).await?;
        self.downloaded.lock().unwrap().push(path.clone());
        Ok(DownloadedMedia {
            path,
            work_dir,
            info: self.info.clone(),
        })
    }
}

pub fn small_info() -> MediaInfo {
    MediaInfo {
        id: "abc123".to_string(),
        title: Some("Never Gonna".to_string()),
        uploader: Some("Rick".to_string()),
        ext: Some("mp4".to_string()),
        filesize: Some(1024),
        filesize_approx: None,
    }
}

pub fn text_update(update_id: i64, chat_id: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(Message {
            message_id: update_id,
            chat: Chat { id: chat_id },
            from: Some(User {
                id: chat_id,
                first_name: "Ann".to_string(),
                username: None,
            }),
            text: Some(text.to_string()),
        }),
        callback_query: None,
    }
}

pub fn callback_update(update_id: i64, chat_id: i64, prompt_id: i64, data: &str) -> Update {
    Update {
        update_id,
        message: None,
        callback_query: Some(crate::domain::model::CallbackQuery {
            id: format!("cb{}", update_id),
            from: User {
                id: chat_id,
                first_name: "Ann".to_string(),
                username: None,
            },
            message: Some(Message {
                message_id: prompt_id,
                chat: Chat { id: chat_id },
                from: None,
                text: Some("What would you like to download?".to_string()),
            }),
            data: Some(data.to_string()),
        }),
    }
}
