pub mod bot;
pub mod delivery;
pub mod handlers;
pub mod links;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::domain::model::{DeliveryOutcome, MediaKind, Update};
pub use crate::domain::ports::{BotApi, ConfigProvider, MediaFetcher};
pub use crate::utils::error::Result;
