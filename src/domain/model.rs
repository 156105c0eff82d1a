use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;

// Telegram Bot API 物件，只保留 bot 用到的欄位

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    Markdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// 檢查大小時使用的格式，盡量挑選 Telegram 可直接播放的容器
    pub fn probe_format(&self) -> &'static str {
        match self {
            MediaKind::Video => "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
            MediaKind::Audio => "bestaudio[ext=m4a]/bestaudio",
        }
    }

    pub fn download_format(&self) -> &'static str {
        match self {
            MediaKind::Video => "bestvideo+bestaudio/best",
            MediaKind::Audio => "bestaudio[ext=m4a]/bestaudio",
        }
    }

    pub fn default_title(&self) -> &'static str {
        match self {
            MediaKind::Video => "YouTube Video",
            MediaKind::Audio => "YouTube Audio",
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Video => "Video",
            MediaKind::Audio => "Audio",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            MediaKind::Video => "🎬",
            MediaKind::Audio => "🎵",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "video" => Some(MediaKind::Video),
            "audio" => Some(MediaKind::Audio),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// yt-dlp info dict 的子集
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub filesize: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub filesize_approx: Option<u64>,
}

// extractor 有時會回傳浮點數大小（例如 filesize_approx 由 bitrate 推算）
fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let size = Option::<f64>::deserialize(deserializer)?;
    Ok(size
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| s.round() as u64))
}

impl MediaInfo {
    pub fn size_bytes(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }
}

/// 下載結果；`work_dir` 為這次下載專用的目錄，清理時整個移除
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub path: PathBuf,
    pub work_dir: PathBuf,
    pub info: MediaInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    TooLarge { size_bytes: u64 },
    UnknownSize,
    Failed,
}

impl DeliveryOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent)
    }
}
