// Adapters layer: concrete implementations for external systems (Telegram, yt-dlp, http health).

pub mod health;
pub mod telegram;
pub mod ytdlp;
