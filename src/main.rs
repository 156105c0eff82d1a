use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use yt_relay_bot::adapters::health::serve_health;
use yt_relay_bot::domain::ports::ConfigProvider;
use yt_relay_bot::utils::error::ErrorSeverity;
use yt_relay_bot::utils::{logger, validation::Validate};
use yt_relay_bot::{BotConfig, BotError, BotRunner, HealthState, TelegramClient, TomlConfig, YtDlp};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn exit_code(severity: ErrorSeverity) -> i32 {
    match severity {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn report_and_exit(context: &str, e: &BotError) -> ! {
    tracing::error!(
        "❌ {}: {} (Category: {:?}, Severity: {:?})",
        context,
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(e.severity()).max(1));
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = BotConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    // 指定 TOML 檔時以檔案內容為準
    let config = if let Some(path) = cli.config.clone() {
        tracing::info!("📁 Loading configuration from: {}", path);
        match TomlConfig::from_file(&path) {
            Ok(file) => file.into_bot_config(cli.verbose, cli.log_json),
            Err(e) => report_and_exit("Failed to load config file", &e),
        }
    } else {
        cli
    }
    .normalized();
    tracing::debug!("Bot config: {:?}", config);

    if let Err(e) = config.validate() {
        if matches!(e, BotError::MissingConfigError { .. }) {
            tracing::error!(
                "FATAL ERROR: TELEGRAM_BOT_TOKEN is not defined in the environment variables."
            );
        }
        report_and_exit("Configuration validation failed", &e);
    }

    if let Err(e) = tokio::fs::create_dir_all(config.download_dir()).await {
        report_and_exit("Could not create download directory", &BotError::IoError(e));
    }

    let bot = match TelegramClient::new(
        config.api_base(),
        config.bot_token(),
        config.poll_timeout_secs(),
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => report_and_exit("Could not build Telegram client", &e),
    };
    let fetcher = Arc::new(YtDlp::new(
        config.yt_dlp_bin(),
        config.download_dir(),
        config.cookies_file(),
    ));
    let health = Arc::new(HealthState::new());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let health_server = match TcpListener::bind(("0.0.0.0", config.port)).await {
        Ok(listener) => Some(tokio::spawn(serve_health(
            listener,
            Arc::clone(&health),
            async move {
                let _ = stop_rx.await;
            },
        ))),
        Err(e) => {
            // health endpoint 非必要，bot 仍可運作
            tracing::warn!("Health endpoint disabled, cannot bind port {}: {}", config.port, e);
            None
        }
    };

    tracing::info!("Starting bot...");
    let runner = BotRunner::new(bot, fetcher, &config, health);
    let result = runner.run_until(shutdown_signal()).await;

    let _ = stop_tx.send(());
    if let Some(handle) = health_server {
        match handle.await {
            Ok(Err(e)) => tracing::warn!("Health endpoint stopped with error: {}", e),
            Err(e) => tracing::warn!("Health endpoint task failed: {}", e),
            Ok(Ok(())) => {}
        }
    }

    match result {
        Ok(()) => {
            tracing::info!("✅ Bot stopped");
            Ok(())
        }
        Err(e) => report_and_exit("Bot stopped with an error", &e),
    }
}
