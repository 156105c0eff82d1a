use crate::domain::model::MediaKind;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use url::Url;

pub const DEFAULT_PENDING_CAPACITY: usize = 1024;

/// 等待使用者選擇影片或音訊的連結
///
/// Telegram 的 callback data 上限為 64 bytes，完整 URL 放不進去，
/// 所以按鈕只帶一個遞增的 key，URL 存在這裡。
/// 超過容量時最舊的連結會被淘汰。
#[derive(Debug)]
pub struct PendingLinks {
    inner: Mutex<PendingInner>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct PendingInner {
    next_key: u64,
    order: VecDeque<u64>,
    links: HashMap<u64, String>,
}

impl PendingLinks {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(PendingInner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn insert(&self, url: String) -> u64 {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.next_key += 1;
        let key = inner.next_key;

        inner.links.insert(key, url);
        inner.order.push_back(key);

        while inner.links.len() > self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.links.remove(&oldest);
                }
                None => break,
            }
        }
        key
    }

    /// 取出並移除；同一個按鈕只會生效一次
    pub fn take(&self, key: u64) -> Option<String> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let url = inner.links.remove(&key)?;
        inner.order.retain(|k| *k != key);
        Some(url)
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .links
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PendingLinks {
    fn default() -> Self {
        Self::new(DEFAULT_PENDING_CAPACITY)
    }
}

pub fn callback_data(kind: MediaKind, key: u64) -> String {
    format!("{}:{}", kind.tag(), key)
}

pub fn parse_callback_data(data: &str) -> Option<(MediaKind, u64)> {
    let (tag, key) = data.split_once(':')?;
    let kind = MediaKind::from_tag(tag)?;
    let key = key.parse().ok()?;
    Some((kind, key))
}

/// 從訊息中找出第一個屬於允許主機的 http(s) 連結
pub fn extract_supported_url(text: &str, allowed_hosts: &[String]) -> Option<String> {
    text.split_whitespace()
        .map(|token| token.trim_matches(|c: char| matches!(c, '<' | '>' | '(' | ')' | '"' | '\'')))
        .filter_map(|token| Url::parse(token).ok())
        .find(|url| {
            matches!(url.scheme(), "http" | "https")
                && url
                    .host_str()
                    .map(|host| is_allowed_host(host, allowed_hosts))
                    .unwrap_or(false)
        })
        .map(String::from)
}

fn is_allowed_host(host: &str, allowed_hosts: &[String]) -> bool {
    let host = host.to_ascii_lowercase();
    allowed_hosts.iter().any(|allowed| {
        let allowed = allowed.trim().to_ascii_lowercase();
        host == allowed || host.ends_with(&format!(".{}", allowed))
    })
}
