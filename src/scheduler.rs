//! Scheduling coordinator.
//!
//! Drives the payment-code lifecycle and the feed watcher under two
//! external cadences: a tight foreground loop (per-second lifecycle
//! ticks, full refresh every couple of minutes) and a sparse,
//! externally-invoked background cycle that must answer before a
//! deadline. A single refresh gate serializes everything that touches
//! the persisted high-water-mark or counts as "a refresh in flight", so
//! the two cadences never overlap.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::error::Result;
use crate::notify::Notifier;
use crate::qr::{QrEvent, QrLifecycle, QrService};
use crate::storage::Storage;
use crate::sync::{ContextSync, SyncContext};
use crate::watcher::{FeedWatcher, NewTransactionEvent, TransactionFeed};

/// Notification title for a settled payment.
const SETTLED_TITLE: &str = "Payment successful";

/// Notification title for a newly posted transaction.
const TRANSACTION_TITLE: &str = "New transaction";

/// Notification title for a failed refresh.
const ERROR_TITLE: &str = "Refresh failed";

/// Coordinates the lifecycle and the watcher across both cadences.
#[derive(Debug)]
pub struct Coordinator<Q, F, S, N> {
    /// The payment-code lifecycle, behind an async mutex: ticks and
    /// refreshes are strictly sequential.
    lifecycle: tokio::sync::Mutex<QrLifecycle<Q>>,
    /// The transaction-feed watcher.
    watcher: FeedWatcher<F, Arc<S>>,
    /// Settings storage (session token, notifications flag).
    storage: Arc<S>,
    /// Sink for user-visible alerts.
    notifier: N,
    /// Optional paired-device propagation of the session token.
    sync: Option<Box<dyn ContextSync>>,
    /// Timing configuration.
    config: Config,
    /// Serializes refresh and poll cycles across cadences.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl<Q, F, S, N> Coordinator<Q, F, S, N>
where
    Q: QrService,
    F: TransactionFeed,
    S: Storage,
    N: Notifier,
{
    /// Assembles a coordinator.
    #[inline]
    #[must_use]
    pub fn new(
        lifecycle: QrLifecycle<Q>,
        watcher: FeedWatcher<F, Arc<S>>,
        storage: Arc<S>,
        notifier: N,
        sync: Option<Box<dyn ContextSync>>,
        config: Config,
    ) -> Self {
        Self {
            lifecycle: tokio::sync::Mutex::new(lifecycle),
            watcher,
            storage,
            notifier,
            sync,
            config,
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Runs the full refresh path: fresh session, balance, new code.
    ///
    /// The same operation a manual trigger performs. Failures are
    /// surfaced to the notifier and returned; nothing is retried.
    ///
    /// # Errors
    ///
    /// Propagates the lifecycle error that aborted the cycle.
    pub async fn refresh(&self) -> Result<QrEvent> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// One feed poll, honoring the notifications flag.
    ///
    /// # Errors
    ///
    /// Propagates feed and storage errors; the persisted mark is
    /// unchanged on failure.
    pub async fn poll_feed(&self) -> Result<Option<NewTransactionEvent>> {
        let _gate = self.refresh_gate.lock().await;
        self.poll_feed_locked().await
    }

    /// One full foreground firing: refresh, then poll.
    ///
    /// Errors are surfaced through the notifier and logs; the loop keeps
    /// its cadence regardless.
    pub async fn foreground_cycle(&self) {
        let _gate = self.refresh_gate.lock().await;
        if let Err(err) = self.refresh_locked().await {
            tracing::warn!(error = %err, "foreground refresh failed");
        }
        if let Err(err) = self.poll_feed_locked().await {
            tracing::warn!(error = %err, "foreground feed poll failed");
        }
    }

    /// One lifecycle tick at the current instant, with auto-renewal.
    ///
    /// Settlement surfaces a one-time notification and immediately
    /// requests a fresh code; expiry renews silently. A failed tick is
    /// logged and left for the next tick — no faster retry.
    pub async fn tick(&self) {
        let outcome = {
            let mut lifecycle = self.lifecycle.lock().await;
            lifecycle.tick(Utc::now()).await
        };
        match outcome {
            Ok(Some(QrEvent::Settled { amount })) => {
                self.notifier.notify(SETTLED_TITLE, &amount);
                if let Err(err) = self.refresh().await {
                    tracing::warn!(error = %err, "renewal after settlement failed");
                }
            }
            Ok(Some(QrEvent::Expired)) => {
                if let Err(err) = self.refresh().await {
                    tracing::warn!(error = %err, "renewal after expiry failed");
                }
            }
            Ok(Some(QrEvent::Renewed { .. }) | None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "redemption check failed");
            }
        }
    }

    /// Runs the foreground loop: a refresh firing every
    /// [`Config::refresh_interval`] and a lifecycle tick every
    /// [`Config::tick_interval`].
    ///
    /// The first refresh fires immediately. Ticks that would overlap an
    /// in-flight cycle are skipped, not queued. The loop never returns;
    /// drive it in its own task and drop the task to stop.
    pub async fn run_foreground(&self) {
        let mut refresh_timer = tokio::time::interval(self.config.refresh_interval);
        refresh_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = refresh_timer.tick() => self.foreground_cycle().await,
                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    /// Runs exactly one externally granted background cycle.
    ///
    /// Returns the completion signal for the external scheduler: `true`
    /// on a clean poll, `false` on error or when the configured deadline
    /// expires first. A deadline expiry abandons the in-flight cycle —
    /// the cancelled poll persists nothing, so the high-water-mark is
    /// never left half-updated.
    pub async fn run_background_cycle(&self) -> bool {
        let cycle = async {
            let _gate = self.refresh_gate.lock().await;
            self.poll_feed_locked().await
        };
        match tokio::time::timeout(self.config.background_deadline, cycle).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                tracing::error!(error = %err, "background cycle failed");
                false
            }
            Err(_elapsed) => {
                tracing::warn!("background cycle abandoned at deadline");
                false
            }
        }
    }

    /// Refresh path body; the caller holds the refresh gate.
    async fn refresh_locked(&self) -> Result<QrEvent> {
        let mut lifecycle = self.lifecycle.lock().await;
        match lifecycle.refresh().await {
            Ok(event) => {
                drop(lifecycle);
                self.propagate_session().await;
                Ok(event)
            }
            Err(err) => {
                self.notifier.notify(ERROR_TITLE, &err.to_string());
                Err(err)
            }
        }
    }

    /// Poll body; the caller holds the refresh gate.
    async fn poll_feed_locked(&self) -> Result<Option<NewTransactionEvent>> {
        if !self.storage.notifications_enabled().await? {
            tracing::debug!("transaction notifications disabled, poll skipped");
            return Ok(None);
        }
        let event = self.watcher.poll().await?;
        if let Some(new_transaction) = &event {
            self.notifier
                .notify(TRANSACTION_TITLE, &new_transaction.latest.short_description());
        }
        Ok(event)
    }

    /// Hands the current session token to the paired device, if a sync
    /// transport is configured. Failures are logged, never fatal.
    async fn propagate_session(&self) {
        let Some(sync) = &self.sync else { return };
        match self.storage.session_token().await {
            Ok(Some(session_token)) => {
                if let Err(err) = sync.push_context(&SyncContext { session_token }) {
                    tracing::warn!(error = %err, "session propagation failed");
                }
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, "could not read session token"),
        }
    }
}
