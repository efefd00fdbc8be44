use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::FixedOffset;
use tracing::{debug, error, info, warn};

use crate::chat::ChatClient;
use crate::detector::RefreshDetector;
use crate::estimate::{self, RefreshEstimate};
use crate::extract;
use crate::fetcher::PageFetcher;
use crate::notify::{self, Notifier};
use crate::session::SessionProvider;
use crate::status::{Status, StatusCell};

/// What a single poll cycle produced.
#[derive(Debug, PartialEq, Eq)]
pub enum CycleReport {
    /// Fetched and compared; nothing new.
    NoChange,
    /// Refresh detected; the fresh kad ids.
    Refresh(BTreeSet<u64>),
    /// Transport failure; no data this cycle.
    NoData,
    /// The page kept coming back without feed links even after a re-login.
    Abandoned,
}

/// Runs the fetch→extract→detect cycle on a cadence governed by the shared
/// status cell, and announces detected refreshes.
pub struct Watcher {
    fetcher: PageFetcher,
    session: SessionProvider,
    detector: RefreshDetector,
    status: Arc<StatusCell>,
    notifier: Option<Notifier>,
    page_url: String,
    clock: FixedOffset,
    poll_interval: Duration,
    housekeeping_every: u64,
    ticks: u64,
    last_housekeeping: Instant,
}

impl Watcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher: PageFetcher,
        session: SessionProvider,
        status: Arc<StatusCell>,
        notifier: Option<Notifier>,
        page_url: String,
        clock: FixedOffset,
        poll_interval: Duration,
        housekeeping_every: u64,
    ) -> Self {
        Self {
            fetcher,
            session,
            detector: RefreshDetector::new(),
            status,
            notifier,
            page_url,
            clock,
            poll_interval,
            housekeeping_every,
            ticks: 0,
            last_housekeeping: Instant::now(),
        }
    }

    /// One fetch→extract→detect pass. An empty extraction means the session
    /// expired: re-login once and retry the pass once; a second empty result
    /// abandons the cycle.
    pub async fn poll_cycle(&mut self) -> CycleReport {
        for retried in [false, true] {
            let html = match self.fetcher.fetch(&self.page_url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(error = %e, "fetch failed, skipping cycle");
                    return CycleReport::NoData;
                }
            };

            let ids = extract::extract_ids(&html);
            if ids.is_empty() {
                info!("no feed links on the page, session looks expired");
                if retried {
                    warn!("still no feed links after re-login, abandoning cycle");
                    return CycleReport::Abandoned;
                }
                match self.session.login().await {
                    Ok(()) => {
                        // Fresh session: the next observation only seeds the
                        // baseline.
                        self.detector.reset();
                        continue;
                    }
                    Err(e) if e.is_fatal() => {
                        error!(error = %e, "login attempts exhausted, stopping");
                        self.status.stop();
                        return CycleReport::Abandoned;
                    }
                    Err(e) => {
                        warn!(error = %e, "re-login failed, abandoning cycle");
                        return CycleReport::Abandoned;
                    }
                }
            }

            return match self.detector.observe(ids) {
                Some(fresh) => CycleReport::Refresh(fresh),
                None => CycleReport::NoChange,
            };
        }
        CycleReport::Abandoned
    }

    /// Run until the status cell goes `Stopped`. Ctrl+C forces a stop from
    /// any state.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        match self.session.login().await {
            Ok(()) => info!("initial login complete"),
            Err(e) if e.is_fatal() => {
                error!(error = %e, "login attempts exhausted");
                self.status.stop();
            }
            Err(e) => warn!(error = %e, "initial login failed, will retry from the poll loop"),
        }

        info!(
            interval_secs = self.poll_interval.as_secs(),
            "starting to watch"
        );
        loop {
            match self.status.get() {
                Status::Stopped => {
                    info!(ticks = self.ticks, "watcher stopped");
                    return Ok(());
                }
                Status::Paused => debug!("paused, skipping cycle"),
                Status::Running => {
                    if let CycleReport::Refresh(fresh) = self.poll_cycle().await {
                        self.announce(&fresh).await;
                    }
                    self.housekeeping();
                    self.ticks += 1;
                }
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    warn!("kill combination received, stopping");
                    self.status.stop();
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn announce(&self, fresh: &BTreeSet<u64>) {
        let estimate = RefreshEstimate::project(estimate::site_now(self.clock));
        info!(
            count = fresh.len(),
            next = estimate::clock_label(estimate.primary),
            "it refreshed!"
        );
        if let Some(notifier) = &self.notifier {
            let content = notify::format_announcement(&self.page_url, &estimate, fresh);
            notifier.announce(&content).await;
        }
    }

    fn housekeeping(&mut self) {
        if self.ticks % self.housekeeping_every != 0 {
            return;
        }
        let elapsed = self.last_housekeeping.elapsed();
        info!(
            ticks = self.ticks,
            elapsed_secs = elapsed.as_secs_f64(),
            baseline = ?self.detector.baseline(),
            "housekeeping"
        );
        self.last_housekeeping = Instant::now();
    }
}

/// Service-mode operator commands: polls the channel for `?status ok|stop|quit`
/// messages and writes the shared status cell, the same scalar the kill
/// signal writes. The cursor is primed on the first poll so commands sent
/// before startup are never replayed.
pub async fn command_listener(
    chat: ChatClient,
    channel_id: String,
    status: Arc<StatusCell>,
    poll: Duration,
) {
    let mut cursor: Option<String> = None;
    let mut primed = false;

    loop {
        if status.is_stopped() {
            return;
        }
        tokio::time::sleep(poll).await;

        let batch = match chat.messages_after(&channel_id, cursor.as_deref(), 50).await {
            Ok(batch) => batch,
            Err(e) => {
                debug!(error = %e, "command poll failed");
                continue;
            }
        };

        if !primed {
            if let Some(last) = batch.last() {
                cursor = Some(last.id.clone());
            }
            primed = true;
            continue;
        }

        for message in batch {
            cursor = Some(message.id.clone());
            if message.author.bot {
                continue;
            }
            let Some(arg) = message.content.strip_prefix("?status") else {
                continue;
            };

            let reply = match arg.trim().parse::<Status>() {
                Ok(next) => {
                    if status.set(next) {
                        info!(status = next.command_word(), "operator changed status");
                        format!("Changed bot status to {}", next.command_word())
                    } else {
                        "Bot is already stopped".to_string()
                    }
                }
                Err(_) => "Invalid command".to_string(),
            };
            if let Err(e) = chat.send_message(&channel_id, &reply).await {
                warn!(error = %e, "failed to acknowledge command");
            }
        }
    }
}
