use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{Config, FetchRetry, MailRetry, STARTUP_MESSAGE};
use crate::db::MarketLedger;
use crate::detector::{debug_pick, detect_new, stamp};
use crate::error::Result;
use crate::fetcher::{MarketFetcher, MarketSource};
use crate::logging::critical;
use crate::notifier::mail::{init_session, MailRelay, MailSession};
use crate::notifier::notify_batch;
use crate::state::KnownMarkets;
use crate::types::{Termination, WatchState};

#[derive(Debug, Clone, Copy)]
pub struct WatchSettings {
    pub poll_interval: Duration,
    pub debug_mode: bool,
    pub fetch_retry: FetchRetry,
    pub mail_retry: MailRetry,
}

impl WatchSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            poll_interval: cfg.poll_interval(),
            debug_mode: cfg.debug_mode,
            fetch_retry: FetchRetry::default(),
            mail_retry: MailRetry::default(),
        }
    }
}

/// Result of one poll that did not end the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing new listed.
    Quiet,
    /// A batch was mailed and recorded.
    Recorded {
        detected: usize,
        mailed: usize,
        /// The batch was a debug pick rather than a genuinely new listing.
        forced: bool,
    },
}

/// Poll → detect → mail → record loop. Single-threaded; every wait is a
/// plain sleep.
pub struct MarketWatcher<S, R, L> {
    fetcher: MarketFetcher<S>,
    relay: R,
    ledger: L,
    known: KnownMarkets,
    settings: WatchSettings,
    state: WatchState,
}

impl<S, R, L> MarketWatcher<S, R, L>
where
    S: MarketSource,
    R: MailRelay,
    L: MarketLedger,
{
    /// Seeds the known set from the ledger. Fails if the ledger is unreadable.
    pub fn new(source: S, relay: R, ledger: L, settings: WatchSettings) -> Result<Self> {
        let known = KnownMarkets::new(ledger.known_ids()?);
        if known.is_empty() {
            warn!("Ledger has no rows; every listed market will be reported as new");
        } else {
            info!(known = known.len(), "Loaded known markets from ledger");
        }
        Ok(Self {
            fetcher: MarketFetcher::new(source, settings.fetch_retry),
            relay,
            ledger,
            known,
            settings,
            state: WatchState::Polling,
        })
    }

    pub fn known(&self) -> &KnownMarkets {
        &self.known
    }

    #[cfg(test)]
    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Send the startup notice, then poll until a fatal condition (or the end
    /// of a debug run). Always logs the termination at critical severity.
    pub async fn run(&mut self) -> Termination {
        let termination = self.run_until_terminated().await;
        self.transition(WatchState::Terminated);
        critical!(reason = %termination, "predictit-watch aborted: {termination}");
        termination
    }

    async fn run_until_terminated(&mut self) -> Termination {
        if let Err(t) = self.announce_start().await {
            return t;
        }
        info!("Starting program...");

        loop {
            match self.poll_once().await {
                Ok(CycleOutcome::Recorded { .. }) if self.settings.debug_mode => {
                    info!("Debug run complete");
                    return Termination::DebugComplete;
                }
                Ok(CycleOutcome::Recorded { detected, mailed, .. }) => {
                    info!(detected, mailed, "Continuing awaiting new markets...");
                }
                Ok(CycleOutcome::Quiet) => {}
                Err(t) => return t,
            }

            self.transition(WatchState::Waiting);
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    async fn announce_start(&mut self) -> std::result::Result<(), Termination> {
        let mut session = init_session(&self.relay, self.settings.mail_retry)
            .await
            .ok_or(Termination::MailUnavailable)?;
        if let Err(e) = session.send(STARTUP_MESSAGE).await {
            warn!("Startup notification failed to send: {e}");
        }
        session.close().await;
        Ok(())
    }

    /// One polling pass: fetch, detect, and for a non-empty batch mail every
    /// market then append the whole batch to the ledger. The known set only
    /// grows after the append succeeded.
    pub async fn poll_once(&mut self) -> std::result::Result<CycleOutcome, Termination> {
        self.transition(WatchState::Polling);
        let fetched = self.fetcher.fetch().await;

        let mut batch = detect_new(&fetched, self.known.ids());
        let mut forced = false;
        if !batch.is_empty() || self.settings.debug_mode {
            info!(fetched = fetched.len(), "Found {} new markets.", batch.len());
        }
        if batch.is_empty() && self.settings.debug_mode {
            if let Some(pick) = debug_pick(&fetched) {
                debug!(market_id = pick.id, "Debug mode: forcing most recent market");
                batch.push(pick);
                forced = true;
            }
        }
        if batch.is_empty() {
            debug!(fetched = fetched.len(), known = self.known.len(), "No new markets");
            return Ok(CycleOutcome::Quiet);
        }

        let batch = stamp(batch, Utc::now());

        self.transition(WatchState::Notifying);
        let mut session = init_session(&self.relay, self.settings.mail_retry)
            .await
            .ok_or(Termination::MailUnavailable)?;
        let mailed = notify_batch(&mut session, &batch).await;
        session.close().await;

        self.transition(WatchState::Recording);
        if let Err(e) = self.ledger.append(&batch) {
            critical!(markets = batch.len(), "Could NOT add new markets to CSV. Aborting. {e}");
            return Err(Termination::StoreWriteFailed(e));
        }
        info!(mailed, "Added {} new markets to CSV.", batch.len());

        // a forced pick is usually already known; recording it in the ledger
        // is enough
        if !forced {
            self.known.extend(batch.iter().map(|m| m.id));
        }

        Ok(CycleOutcome::Recorded {
            detected: batch.len(),
            mailed,
            forced,
        })
    }

    fn transition(&mut self, next: WatchState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Watch state change");
            self.state = next;
        }
    }
}
