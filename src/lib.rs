pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{health::HealthState, telegram::TelegramClient, ytdlp::YtDlp};
pub use config::{toml_config::TomlConfig, BotConfig};
pub use core::{bot::BotRunner, delivery::MediaDelivery, handlers::Dispatcher};
pub use utils::error::{BotError, Result};
