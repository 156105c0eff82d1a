use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Telegram API error ({code:?}): {description}")]
    TelegramApiError {
        code: Option<i64>,
        description: String,
    },

    #[error("Rate limited by Telegram, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("yt-dlp failed: {message}")]
    ExtractorError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Telegram,
    Configuration,
    Extraction,
    Filesystem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BotError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BotError::HttpError(_) => ErrorCategory::Network,
            BotError::TelegramApiError { .. } | BotError::RateLimited { .. } => {
                ErrorCategory::Telegram
            }
            BotError::ConfigError { .. }
            | BotError::MissingConfigError { .. }
            | BotError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            BotError::ExtractorError { .. } | BotError::SerializationError(_) => {
                ErrorCategory::Extraction
            }
            BotError::IoError(_) => ErrorCategory::Filesystem,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BotError::HttpError(_) | BotError::RateLimited { .. } => ErrorSeverity::Medium,
            BotError::TelegramApiError { code: Some(401), .. }
            | BotError::TelegramApiError { code: Some(404), .. } => ErrorSeverity::Critical,
            BotError::TelegramApiError { .. }
            | BotError::ExtractorError { .. }
            | BotError::SerializationError(_)
            | BotError::IoError(_) => ErrorSeverity::High,
            BotError::ConfigError { .. }
            | BotError::MissingConfigError { .. }
            | BotError::InvalidConfigValueError { .. } => ErrorSeverity::Critical,
        }
    }

    /// 網路抖動或限流屬於暫時性錯誤，polling 迴圈會等待後重試
    pub fn is_retryable(&self) -> bool {
        match self {
            BotError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            BotError::RateLimited { .. } => true,
            BotError::TelegramApiError { code: Some(code), .. } => *code >= 500,
            _ => false,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            BotError::HttpError(_) => "Could not reach the Telegram Bot API".to_string(),
            BotError::TelegramApiError { description, .. } => {
                format!("Telegram rejected the request: {}", description)
            }
            BotError::RateLimited { retry_after } => {
                format!("Too many requests, waiting {} seconds", retry_after)
            }
            BotError::MissingConfigError { field } => {
                format!("Missing required setting '{}'", field)
            }
            BotError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            BotError::ConfigError { message } => format!("Configuration problem: {}", message),
            BotError::ExtractorError { .. } => "The media could not be fetched".to_string(),
            BotError::IoError(e) => format!("File system error: {}", e),
            BotError::SerializationError(_) => "Unexpected response format".to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check network connectivity and the API base URL",
            ErrorCategory::Telegram => match self {
                BotError::TelegramApiError { code: Some(401), .. } => {
                    "Check that TELEGRAM_BOT_TOKEN is correct (ask @BotFather)"
                }
                _ => "Wait a moment and try again",
            },
            ErrorCategory::Configuration => {
                "Set TELEGRAM_BOT_TOKEN and review the other options with --help"
            }
            ErrorCategory::Extraction => {
                "Make sure yt-dlp and ffmpeg are installed and up to date; a cookies.txt may help"
            }
            ErrorCategory::Filesystem => "Check that the download directory is writable",
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
