use crate::domain::model::{DownloadedMedia, MediaInfo, MediaKind};
use crate::domain::ports::MediaFetcher;
use crate::utils::error::{BotError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

const PROBE_TIMEOUT_SECS: u64 = 120;
const DOWNLOAD_TIMEOUT_SECS: u64 = 1800;
const OUTPUT_TEMPLATE: &str = "%(id)s.%(ext)s";

/// yt-dlp 的共用選項
#[derive(Debug, Clone, PartialEq)]
pub struct YdlOptions {
    pub format: String,
    pub quiet: bool,
    pub no_check_certificate: bool,
    pub no_progress: bool,
    pub cookies: Option<PathBuf>,
    pub output_template: Option<String>,
}

impl YdlOptions {
    /// cookies 檔案存在時才帶上
    pub fn new(format: &str, cookies_file: &Path, output_template: Option<String>) -> Self {
        let cookies = cookies_file.is_file().then(|| cookies_file.to_path_buf());

        Self {
            format: format.to_string(),
            quiet: true,
            no_check_certificate: true,
            no_progress: true,
            cookies,
            output_template,
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["-f".to_string(), self.format.clone()];
        if self.quiet {
            args.push("--quiet".to_string());
        }
        if self.no_check_certificate {
            args.push("--no-check-certificate".to_string());
        }
        if self.no_progress {
            args.push("--no-progress".to_string());
        }
        if let Some(cookies) = &self.cookies {
            args.push("--cookies".to_string());
            args.push(cookies.display().to_string());
        }
        if let Some(template) = &self.output_template {
            args.push("-o".to_string());
            args.push(template.clone());
        }
        args
    }
}

/// 下載完成後 yt-dlp 輸出的 info dict，多了最終檔案路徑
#[derive(Debug, Deserialize)]
struct FinishedInfo {
    #[serde(flatten)]
    info: MediaInfo,
    #[serde(default)]
    filepath: Option<PathBuf>,
    #[serde(default, rename = "_filename")]
    filename: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
    download_dir: PathBuf,
    cookies_file: PathBuf,
    next_job: Arc<AtomicU64>,
}

impl YtDlp {
    pub fn new(binary: &str, download_dir: &str, cookies_file: &str) -> Self {
        Self {
            binary: binary.to_string(),
            download_dir: PathBuf::from(download_dir),
            cookies_file: PathBuf::from(cookies_file),
            next_job: Arc::new(AtomicU64::new(1)),
        }
    }

    /// 每次下載各用一個子目錄，同一支影片同時被下載也不會互相覆蓋或刪除
    fn job_dir(&self) -> PathBuf {
        let job = self.next_job.fetch_add(1, Ordering::Relaxed);
        self.download_dir
            .join(format!("job-{}-{}", std::process::id(), job))
    }

    async fn run(&self, args: &[String], limit: Duration) -> Result<String> {
        tracing::debug!("Running {} {}", self.binary, args.join(" "));

        let output = timeout(
            limit,
            Command::new(&self.binary)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| BotError::ExtractorError {
            message: format!("timed out after {}s", limit.as_secs()),
        })?
        .map_err(|e| BotError::ExtractorError {
            message: format!("failed to start {}: {}", self.binary, e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BotError::ExtractorError {
                message: format!("{} ({})", stderr.trim(), output.status),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn last_json_line(stdout: &str) -> Result<&str> {
        stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| line.starts_with('{'))
            .ok_or_else(|| BotError::ExtractorError {
                message: "yt-dlp produced no metadata".to_string(),
            })
    }

    async fn download_into(
        &self,
        work_dir: &Path,
        url: &str,
        kind: MediaKind,
    ) -> Result<(PathBuf, MediaInfo)> {
        let template = work_dir.join(OUTPUT_TEMPLATE).display().to_string();
        let mut args =
            YdlOptions::new(kind.download_format(), &self.cookies_file, Some(template)).to_args();
        args.extend(
            ["--no-playlist", "--print", "after_move:%()j", "--", url].map(str::to_string),
        );

        let stdout = self
            .run(&args, Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .await?;
        let finished: FinishedInfo = serde_json::from_str(Self::last_json_line(&stdout)?)?;

        let path = finished
            .filepath
            .or(finished.filename)
            .ok_or_else(|| BotError::ExtractorError {
                message: "yt-dlp did not report the downloaded file".to_string(),
            })?;
        Ok((path, finished.info))
    }
}

#[async_trait]
impl MediaFetcher for YtDlp {
    async fn probe(&self, url: &str, kind: MediaKind) -> Result<MediaInfo> {
        let mut args = YdlOptions::new(kind.probe_format(), &self.cookies_file, None).to_args();
        args.extend(
            ["--dump-single-json", "--no-download", "--no-playlist", "--", url]
                .map(str::to_string),
        );

        let stdout = self.run(&args, Duration::from_secs(PROBE_TIMEOUT_SECS)).await?;
        let info: MediaInfo = serde_json::from_str(Self::last_json_line(&stdout)?)?;
        tracing::debug!(
            "Probed {} '{}': {:?} bytes",
            kind,
            info.id,
            info.size_bytes()
        );
        Ok(info)
    }

    async fn download(&self, url: &str, kind: MediaKind) -> Result<DownloadedMedia> {
        let work_dir = self.job_dir();
        tokio::fs::create_dir_all(&work_dir).await?;

        match self.download_into(&work_dir, url, kind).await {
            Ok((path, info)) => {
                tracing::info!("Downloaded {} to {}", kind, path.display());
                Ok(DownloadedMedia {
                    path,
                    work_dir,
                    info,
                })
            }
            Err(e) => {
                // 失敗時呼叫端拿不到目錄，殘留的 .part 檔在這裡清掉
                if let Err(rm_err) = tokio::fs::remove_dir_all(&work_dir).await {
                    tracing::warn!("Could not remove {}: {}", work_dir.display(), rm_err);
                }
                Err(e)
            }
        }
    }
}
