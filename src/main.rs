use anyhow::{Context, Result};
use clap::Parser;
use mcbc_core::{version, BotSettings, ErrorReporter, RedditCredentials, DEFAULT_SETTINGS_PATH};
use reddit_client::RedditClient;
use reply_service::{ConfigStore, StreamConsumer};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Reply bot for cricket subreddits.
#[derive(Parser, Debug)]
#[command(name = "mcbc-bot")]
#[command(about = "Replies to cricket comments on Reddit")]
#[command(disable_version_flag = true)]
struct Cli {
    /// Start replying to new Reddit comments
    #[arg(long)]
    reddit: bool,

    /// Start the Twitter bot (not implemented)
    #[arg(long)]
    twitter: bool,

    /// Print the version and continue
    #[arg(long)]
    version: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to the bot settings file
    #[arg(long, default_value = DEFAULT_SETTINGS_PATH)]
    settings: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "mcbc_bot={default_level},reply_service={default_level},reddit_client={default_level}"
        ))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if cli.version {
        println!("mcbc-bot {}", version::version());
    }

    if cli.twitter {
        tracing::warn!("Twitter support is not implemented");
    }

    if cli.reddit {
        run_reddit(&cli.settings).await?;
    }

    Ok(())
}

async fn run_reddit(settings_path: &Path) -> Result<()> {
    let mut settings = BotSettings::load_or_default(settings_path)
        .with_context(|| format!("loading settings from {}", settings_path.display()))?;
    let credentials = RedditCredentials::from_env(&settings.reddit).map_err(|e| {
        tracing::error!("{}", e.user_friendly_message());
        e
    })?;
    settings.adopt_account(&credentials);

    tracing::info!(
        "Starting mcbc-bot {} as u/{} in r/{}",
        version::version(),
        credentials.username,
        settings.reddit.subreddits.join("+")
    );

    let reporter = ErrorReporter::new();
    let config = ConfigStore::new(&settings.pipeline);
    if let Err(e) = config.preload().await {
        reporter.report_error(&e);
        return Err(e.into());
    }

    let client = RedditClient::new(&settings, credentials)?;
    let consumer = StreamConsumer::from_settings(&settings, config);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, shutting down");
                shutdown.cancel();
            }
            Err(e) => tracing::error!("Unable to listen for Ctrl-C: {}", e),
        }
    });

    if let Err(e) = consumer.run(&client, cancel).await {
        reporter.report_error(&e);
        return Err(e.into());
    }
    Ok(())
}
