//! kadwatch: Kadoatery refresh watcher.
//!
//! Polls the Kadoatery page, detects refreshes by diffing the visible feed
//! links, and announces each refresh with a predicted next-refresh time.
//! With `--token` and `--channel` it runs as a chat bot (service mode) and
//! accepts `?status ok|stop|quit` operator commands in the channel;
//! otherwise it watches locally and only logs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::cookie::Jar;
use tracing::info;

use kadwatch::KADOATERY_URL;
use kadwatch::chat::ChatClient;
use kadwatch::config::{AppConfig, CONFIG_PATH};
use kadwatch::estimate;
use kadwatch::fetcher::PageFetcher;
use kadwatch::notify::Notifier;
use kadwatch::session::{Credentials, SessionProvider};
use kadwatch::status::{Status, StatusCell};
use kadwatch::watcher::{self, Watcher};

#[derive(Parser)]
#[command(name = "kadwatch", about = "Check the Kadoatery for refreshes")]
struct Args {
    /// Account username
    #[arg(short, long)]
    username: String,

    /// Account password; prompted with hidden input when omitted
    #[arg(short, long)]
    password: Option<String>,

    /// Chat bot token (service mode; falls back to KADWATCH_CHAT_TOKEN)
    #[arg(short, long)]
    token: Option<String>,

    /// Chat channel id to announce into (service mode)
    #[arg(short, long)]
    channel: Option<String>,

    /// Config file path; missing file means defaults
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::load_or_default(&args.config)?;
    let settings = config.settings;

    let password = match args.password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ").context("failed to read password")?,
    };

    // Both flags select service mode, neither selects interactive mode.
    let token = args
        .token
        .or_else(|| std::env::var("KADWATCH_CHAT_TOKEN").ok());
    let mode = match (token, args.channel) {
        (Some(token), Some(channel)) => Some((token, channel)),
        (None, None) => None,
        _ => anyhow::bail!(
            "service mode requires both --token and --channel (pass neither to run locally)"
        ),
    };

    let clock = estimate::site_offset(settings.clock_utc_offset_hours)
        .context("clock_utc_offset_hours is not a valid UTC offset")?;

    let jar = Arc::new(Jar::default());
    let fetcher = PageFetcher::new(jar.clone(), Duration::from_secs(settings.fetch_timeout_secs))?;
    let session = SessionProvider::new(
        Credentials {
            username: args.username,
            password,
        },
        settings.login_method,
        jar,
        Duration::from_secs(settings.login_timeout_secs),
        settings.max_login_attempts,
    )?;

    let status = Arc::new(StatusCell::new(Status::Running));
    let housekeeping_every = settings
        .housekeeping_every
        .unwrap_or(if mode.is_some() { 3600 } else { 10 });

    let notifier = mode
        .as_ref()
        .map(|(token, channel)| Notifier::new(ChatClient::new(token.clone()), channel.clone()));

    let mut watcher = Watcher::new(
        fetcher,
        session,
        status.clone(),
        notifier,
        KADOATERY_URL.to_string(),
        clock,
        Duration::from_secs(settings.poll_interval_secs),
        housekeeping_every,
    );

    if let Some((token, channel)) = mode {
        info!(channel = %channel, "running as a chat bot");
        tokio::spawn(watcher::command_listener(
            ChatClient::new(token),
            channel,
            status.clone(),
            Duration::from_secs(settings.command_poll_secs),
        ));
    } else {
        info!("running locally");
    }
    info!("press Ctrl+C to stop the bot");

    watcher.run().await
}
