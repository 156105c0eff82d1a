pub mod toml_config;

use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::Parser;
use std::fmt;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
pub const DEFAULT_COOKIES_FILE: &str = "cookies.txt";
pub const DEFAULT_YT_DLP_BIN: &str = "yt-dlp";
/// 公開 Bot API 的上傳上限
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 50;
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 2;
pub const DEFAULT_ALLOWED_HOSTS: &str =
    "youtube.com,www.youtube.com,m.youtube.com,music.youtube.com,youtu.be";

#[derive(Clone, Parser)]
#[command(name = "yt-relay-bot")]
#[command(about = "Telegram bot that fetches YouTube videos and audio with yt-dlp")]
pub struct BotConfig {
    /// Optional TOML configuration file; replaces flag and env values when given
    #[arg(short, long, env = "BOT_CONFIG")]
    pub config: Option<String>,

    #[arg(long, env = "TELEGRAM_BOT_TOKEN", default_value = "", hide_env_values = true)]
    pub telegram_bot_token: String,

    #[arg(long, env = "TELEGRAM_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Port of the health endpoint
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, env = "DOWNLOAD_DIR", default_value = DEFAULT_DOWNLOAD_DIR)]
    pub download_dir: String,

    /// Netscape cookies file handed to yt-dlp when it exists
    #[arg(long, env = "COOKIES_FILE", default_value = DEFAULT_COOKIES_FILE)]
    pub cookies_file: String,

    #[arg(long, env = "YT_DLP_BIN", default_value = DEFAULT_YT_DLP_BIN)]
    pub yt_dlp_bin: String,

    #[arg(long, env = "MAX_FILE_SIZE_MB", default_value_t = DEFAULT_MAX_FILE_SIZE_MB)]
    pub max_file_size_mb: u64,

    #[arg(long, env = "POLL_TIMEOUT_SECS", default_value_t = DEFAULT_POLL_TIMEOUT_SECS)]
    pub poll_timeout_secs: u64,

    #[arg(long, env = "RETRY_DELAY_SECS", default_value_t = DEFAULT_RETRY_DELAY_SECS)]
    pub retry_delay_secs: u64,

    #[arg(long, env = "MAX_CONCURRENT_DOWNLOADS", default_value_t = DEFAULT_MAX_CONCURRENT_DOWNLOADS)]
    pub max_concurrent_downloads: usize,

    #[arg(long, env = "ALLOWED_HOSTS", value_delimiter = ',', default_value = DEFAULT_ALLOWED_HOSTS)]
    pub allowed_hosts: Vec<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, env = "LOG_JSON", help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            config: None,
            telegram_bot_token: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            port: DEFAULT_PORT,
            download_dir: DEFAULT_DOWNLOAD_DIR.to_string(),
            cookies_file: DEFAULT_COOKIES_FILE.to_string(),
            yt_dlp_bin: DEFAULT_YT_DLP_BIN.to_string(),
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            allowed_hosts: DEFAULT_ALLOWED_HOSTS
                .split(',')
                .map(str::to_string)
                .collect(),
            verbose: false,
            log_json: false,
        }
    }
}

impl BotConfig {
    /// 去掉環境變數常見的前後空白，之後的驗證與 HTTP 呼叫都用同一份值
    pub fn normalized(mut self) -> Self {
        self.telegram_bot_token = self.telegram_bot_token.trim().to_string();
        self.allowed_hosts = self
            .allowed_hosts
            .iter()
            .map(|host| host.trim().to_string())
            .collect();
        self
    }
}

// token 不能出現在 debug 日誌中
impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.telegram_bot_token.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("BotConfig")
            .field("config", &self.config)
            .field("telegram_bot_token", &token)
            .field("api_base", &self.api_base)
            .field("port", &self.port)
            .field("download_dir", &self.download_dir)
            .field("cookies_file", &self.cookies_file)
            .field("yt_dlp_bin", &self.yt_dlp_bin)
            .field("max_file_size_mb", &self.max_file_size_mb)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("max_concurrent_downloads", &self.max_concurrent_downloads)
            .field("allowed_hosts", &self.allowed_hosts)
            .field("verbose", &self.verbose)
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl ConfigProvider for BotConfig {
    fn bot_token(&self) -> &str {
        &self.telegram_bot_token
    }

    fn api_base(&self) -> &str {
        &self.api_base
    }

    fn download_dir(&self) -> &str {
        &self.download_dir
    }

    fn cookies_file(&self) -> &str {
        &self.cookies_file
    }

    fn yt_dlp_bin(&self) -> &str {
        &self.yt_dlp_bin
    }

    fn max_file_size_mb(&self) -> u64 {
        self.max_file_size_mb
    }

    fn poll_timeout_secs(&self) -> u64 {
        self.poll_timeout_secs
    }

    fn retry_delay_secs(&self) -> u64 {
        self.retry_delay_secs
    }

    fn max_concurrent_downloads(&self) -> usize {
        self.max_concurrent_downloads
    }

    fn allowed_hosts(&self) -> &[String] {
        &self.allowed_hosts
    }
}

impl Validate for BotConfig {
    fn validate(&self) -> Result<()> {
        // token 最先檢查：沒有 token 什麼都做不了
        validation::validate_bot_token("telegram_bot_token", &self.telegram_bot_token)?;
        validation::validate_url("api_base", &self.api_base)?;
        validation::validate_path("download_dir", &self.download_dir)?;
        validation::validate_path("yt_dlp_bin", &self.yt_dlp_bin)?;
        validation::validate_range("max_file_size_mb", self.max_file_size_mb, 1, 2000)?;
        // Telegram 的 long polling timeout 上限為 50 秒
        validation::validate_range("poll_timeout_secs", self.poll_timeout_secs, 0, 50)?;
        // 0 秒會讓持續性錯誤變成對 Bot API 的忙碌迴圈
        validation::validate_range("retry_delay_secs", self.retry_delay_secs, 1, 3600)?;
        validation::validate_positive_number(
            "max_concurrent_downloads",
            self.max_concurrent_downloads,
            1,
        )?;
        validation::validate_hosts("allowed_hosts", &self.allowed_hosts)?;
        Ok(())
    }
}
