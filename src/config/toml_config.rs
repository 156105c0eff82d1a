use crate::config::{
    BotConfig, DEFAULT_API_BASE, DEFAULT_COOKIES_FILE, DEFAULT_DOWNLOAD_DIR,
    DEFAULT_MAX_CONCURRENT_DOWNLOADS, DEFAULT_MAX_FILE_SIZE_MB, DEFAULT_POLL_TIMEOUT_SECS,
    DEFAULT_PORT, DEFAULT_RETRY_DELAY_SECS, DEFAULT_YT_DLP_BIN,
};
use crate::utils::error::{BotError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub telegram: TelegramConfig,
    pub download: Option<DownloadConfig>,
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base: Option<String>,
    pub poll_timeout_secs: Option<u64>,
    pub retry_delay_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadConfig {
    pub dir: Option<String>,
    pub cookies_file: Option<String>,
    pub yt_dlp_bin: Option<String>,
    pub max_file_size_mb: Option<u64>,
    pub max_concurrent: Option<usize>,
    pub allowed_hosts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: Option<u16>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BotError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| BotError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${TELEGRAM_BOT_TOKEN})，未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| BotError::ConfigError {
            message: format!("Invalid placeholder pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 轉為執行期配置；日誌相關選項仍由命令列決定
    pub fn into_bot_config(self, verbose: bool, log_json: bool) -> BotConfig {
        let download = self.download.unwrap_or_default();
        let port = self
            .server
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_PORT);

        BotConfig {
            config: None,
            telegram_bot_token: self.telegram.bot_token,
            api_base: self
                .telegram
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            port,
            download_dir: download
                .dir
                .unwrap_or_else(|| DEFAULT_DOWNLOAD_DIR.to_string()),
            cookies_file: download
                .cookies_file
                .unwrap_or_else(|| DEFAULT_COOKIES_FILE.to_string()),
            yt_dlp_bin: download
                .yt_dlp_bin
                .unwrap_or_else(|| DEFAULT_YT_DLP_BIN.to_string()),
            max_file_size_mb: download.max_file_size_mb.unwrap_or(DEFAULT_MAX_FILE_SIZE_MB),
            poll_timeout_secs: self
                .telegram
                .poll_timeout_secs
                .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
            retry_delay_secs: self
                .telegram
                .retry_delay_secs
                .unwrap_or(DEFAULT_RETRY_DELAY_SECS),
            max_concurrent_downloads: download
                .max_concurrent
                .unwrap_or(DEFAULT_MAX_CONCURRENT_DOWNLOADS),
            allowed_hosts: download
                .allowed_hosts
                .unwrap_or_else(|| BotConfig::default().allowed_hosts),
            verbose,
            log_json,
        }
    }
}
