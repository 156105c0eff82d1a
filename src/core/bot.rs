use crate::adapters::health::HealthState;
use crate::core::handlers::Dispatcher;
use crate::domain::ports::{BotApi, ConfigProvider, MediaFetcher};
use crate::utils::error::{BotError, ErrorSeverity, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Long polling 迴圈：取得 update 並各自在獨立 task 中處理
pub struct BotRunner<B, F> {
    bot: Arc<B>,
    dispatcher: Dispatcher<B, F>,
    health: Arc<HealthState>,
    poll_timeout_secs: u64,
    retry_delay: Duration,
}

impl<B, F> BotRunner<B, F>
where
    B: BotApi + 'static,
    F: MediaFetcher + 'static,
{
    pub fn new<C: ConfigProvider>(
        bot: Arc<B>,
        fetcher: Arc<F>,
        config: &C,
        health: Arc<HealthState>,
    ) -> Self {
        let dispatcher = Dispatcher::new(
            Arc::clone(&bot),
            fetcher,
            config.max_file_size_bytes(),
            config.max_concurrent_downloads(),
            config.allowed_hosts().to_vec(),
        );

        Self {
            bot,
            dispatcher,
            health,
            poll_timeout_secs: config.poll_timeout_secs(),
            retry_delay: Duration::from_secs(config.retry_delay_secs()),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<B, F> {
        &self.dispatcher
    }

    /// 持續 polling 直到 `shutdown` 完成，並等待進行中的 task 結束
    pub async fn run_until<S>(&self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let me = self.bot.get_me().await?;
        tracing::info!(
            "🚀 Starting bot @{}",
            me.username.as_deref().unwrap_or(&me.first_name)
        );
        self.health.set_bot_username(me.username.clone());

        // 先前設定過 webhook 時 getUpdates 會一直回 409
        self.bot.delete_webhook().await?;

        tracing::info!("Bot is now polling for updates.");
        tokio::pin!(shutdown);

        let mut offset: Option<i64> = None;
        let mut tasks = JoinSet::new();

        loop {
            let delay = tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping polling");
                    break;
                }
                result = self.bot.get_updates(offset, self.poll_timeout_secs) => {
                    match result {
                        Ok(updates) => {
                            if !updates.is_empty() {
                                tracing::debug!("Received {} update(s)", updates.len());
                            }
                            for update in updates {
                                offset = Some(update.update_id + 1);
                                self.health.record_update();
                                let dispatcher = self.dispatcher.clone();
                                tasks.spawn(async move { dispatcher.dispatch(update).await });
                            }
                            None
                        }
                        Err(BotError::RateLimited { retry_after }) => {
                            tracing::warn!("Rate limited while polling, sleeping {}s", retry_after);
                            Some(Duration::from_secs(retry_after))
                        }
                        Err(BotError::TelegramApiError { code: Some(409), description }) => {
                            tracing::warn!("Polling conflict: {}; deleting webhook again", description);
                            if let Err(e) = self.bot.delete_webhook().await {
                                tracing::error!("❌ Could not delete webhook: {}", e);
                                return Err(e);
                            }
                            Some(self.retry_delay)
                        }
                        Err(e) if e.severity() == ErrorSeverity::Critical => {
                            tracing::error!("❌ Polling failed: {}", e);
                            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
                            return Err(e);
                        }
                        Err(e) if e.is_retryable() => {
                            tracing::warn!(
                                "Polling error: {} (retrying in {:?})",
                                e,
                                self.retry_delay
                            );
                            Some(self.retry_delay)
                        }
                        Err(e) => {
                            tracing::error!(
                                "Unexpected polling error: {} (Category: {:?}), retrying in {:?}",
                                e,
                                e.category(),
                                self.retry_delay
                            );
                            Some(self.retry_delay)
                        }
                    }
                }
            };

            if let Some(delay) = delay {
                tokio::select! {
                    _ = &mut shutdown => {
                        tracing::info!("Shutdown requested, stopping polling");
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    tracing::error!("Update handler task failed: {}", e);
                }
            }
        }

        if !tasks.is_empty() {
            tracing::info!("Waiting for {} in-flight update(s)", tasks.len());
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Update handler task failed: {}", e);
            }
        }
        Ok(())
    }
}
