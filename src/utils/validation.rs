use crate::utils::error::{BotError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(BotError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(BotError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(BotError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(BotError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(BotError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(BotError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(BotError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Bot token 格式為 `<數字 bot id>:<secret>`，空字串代表尚未設定
pub fn validate_bot_token(field_name: &str, token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(BotError::MissingConfigError {
            field: field_name.to_string(),
        });
    }

    let valid = match token.split_once(':') {
        Some((id, secret)) => {
            !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) && !secret.is_empty()
        }
        None => false,
    };

    if !valid {
        return Err(BotError::InvalidConfigValueError {
            field: field_name.to_string(),
            // 不要把 token 寫進日誌
            value: "<redacted>".to_string(),
            reason: "Expected the form '<bot id>:<secret>' issued by @BotFather".to_string(),
        });
    }
    Ok(())
}

pub fn validate_hosts(field_name: &str, hosts: &[String]) -> Result<()> {
    if hosts.is_empty() {
        return Err(BotError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: String::new(),
            reason: "At least one host must be allowed".to_string(),
        });
    }

    for host in hosts {
        if host.trim().is_empty() || host.contains('/') || host.contains(char::is_whitespace) {
            return Err(BotError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: host.clone(),
                reason: "Expected a bare host name such as 'youtube.com'".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("api_base", "https://api.telegram.org").is_ok());
        assert!(validate_url("api_base", "http://127.0.0.1:8081").is_ok());
        assert!(validate_url("api_base", "").is_err());
        assert!(validate_url("api_base", "invalid-url").is_err());
        assert!(validate_url("api_base", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("max_concurrent_downloads", 2, 1).is_ok());
        assert!(validate_positive_number("max_concurrent_downloads", 0, 1).is_err());
    }

    #[test]
    fn test_validate_bot_token() {
        assert!(validate_bot_token("telegram_bot_token", "123456:ABC-def_ghi").is_ok());

        let missing = validate_bot_token("telegram_bot_token", "  ").unwrap_err();
        assert!(matches!(missing, BotError::MissingConfigError { .. }));

        assert!(validate_bot_token("telegram_bot_token", "no-colon").is_err());
        assert!(validate_bot_token("telegram_bot_token", "abc:secret").is_err());
        assert!(validate_bot_token("telegram_bot_token", "123:").is_err());
    }

    #[test]
    fn test_invalid_token_is_redacted() {
        let err = validate_bot_token("telegram_bot_token", "oops-secret").unwrap_err();
        assert!(!err.to_string().contains("oops-secret"));
    }

    #[test]
    fn test_validate_hosts() {
        let hosts = vec!["youtube.com".to_string(), "youtu.be".to_string()];
        assert!(validate_hosts("allowed_hosts", &hosts).is_ok());
        assert!(validate_hosts("allowed_hosts", &[]).is_err());
        assert!(validate_hosts("allowed_hosts", &["https://youtube.com/".to_string()]).is_err());
    }
}
