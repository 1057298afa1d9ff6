//! Transaction feed watcher.
//!
//! Polls the day's transaction history and surfaces newly posted
//! transactions exactly once, tracked by a persisted high-water-mark over
//! the records' serial numbers.

use core::future::Future;

use crate::error::Result;
use crate::models::{Transaction, TransactionSerial};
use crate::storage::Storage;

/// Source of today's transaction records.
///
/// The live implementation authenticates and queries the payment service
/// anew on every poll; tests substitute a scripted one.
pub trait TransactionFeed: core::fmt::Debug + Send + Sync {
    /// Fetches today's transactions, in server order.
    fn today(&self) -> impl Future<Output = Result<Vec<Transaction>>> + Send;
}

impl<F: TransactionFeed> TransactionFeed for std::sync::Arc<F> {
    #[inline]
    fn today(&self) -> impl Future<Output = Result<Vec<Transaction>>> + Send {
        (**self).today()
    }
}

/// A newly posted transaction, surfaced at most once per poll cycle.
///
/// When several records above the previous mark arrive in one batch, the
/// mark advances past all of them but only the record with the maximal
/// serial is surfaced; the rest are consumed silently. This mirrors the
/// service's observed "just tell me the latest" semantics; [`Self::skipped`]
/// counts the records the collapse swallowed so callers can see it happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransactionEvent {
    /// The record with the maximal new serial.
    pub latest: Transaction,
    /// The high-water-mark after this poll.
    pub mark: TransactionSerial,
    /// New records consumed into the mark but not surfaced.
    pub skipped: usize,
}

/// Watches the transaction feed against a persisted high-water-mark.
#[derive(Debug)]
pub struct FeedWatcher<F, S> {
    /// Source of today's records.
    feed: F,
    /// Persistence for the high-water-mark.
    storage: S,
}

impl<F: TransactionFeed, S: Storage> FeedWatcher<F, S> {
    /// Creates a watcher over the given feed and storage.
    #[inline]
    #[must_use]
    pub const fn new(feed: F, storage: S) -> Self {
        Self { feed, storage }
    }

    /// One poll cycle.
    ///
    /// Fetches today's records, finds the maximal serial strictly above
    /// the persisted mark, advances the mark to it, and emits one event
    /// for that record. With nothing new, the mark is untouched and no
    /// event is emitted: polling twice over identical remote data is a
    /// no-op the second time.
    ///
    /// Records whose serial does not parse are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Any feed or storage error aborts the cycle with the persisted
    /// mark unchanged.
    #[tracing::instrument(skip_all)]
    pub async fn poll(&self) -> Result<Option<NewTransactionEvent>> {
        let records = self.feed.today().await?;
        let mark = self.storage.high_water_mark().await?;

        let mut latest: Option<(TransactionSerial, Transaction)> = None;
        let mut fresh = 0_usize;
        for record in records {
            let Some(serial) = record.serial() else {
                tracing::warn!(serialno = %record.serial_no, "unparsable serial, record skipped");
                continue;
            };
            if mark.is_some_and(|m| serial <= m) {
                continue;
            }
            fresh += 1;
            if latest.as_ref().is_none_or(|(max, _)| serial > *max) {
                latest = Some((serial, record));
            }
        }

        let Some((serial, record)) = latest else {
            tracing::debug!("no new transactions");
            return Ok(None);
        };

        self.storage.set_high_water_mark(serial).await?;
        tracing::info!(mark = %serial, fresh, "new transaction observed");
        Ok(Some(NewTransactionEvent {
            latest: record,
            mark: serial,
            skipped: fresh - 1,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::XfbError;
    use crate::storage::InMemoryStorage;

    /// Builds a minimal record with the given serial string.
    fn record(serial: &str) -> Transaction {
        Transaction {
            kind: "CONSUME".to_owned(),
            time: "2025-05-08 12:01:30".to_owned(),
            deal_time: "2025-05-08 12:01:28".to_owned(),
            address: "No.2 Dining Hall".to_owned(),
            fee_name: "Meal".to_owned(),
            serial_no: serial.to_owned(),
            money: "12.5".to_owned(),
            business_name: "Campus Catering".to_owned(),
            business_num: "0017".to_owned(),
            fee_num: "301".to_owned(),
            account_name: "Zhang San".to_owned(),
            account_num: "20250001".to_owned(),
            person_code: "8811".to_owned(),
            e_wallet_id: "77001".to_owned(),
            card_balance: "100.90".to_owned(),
            balance_after: "88.40".to_owned(),
            concessions: "0.00".to_owned(),
        }
    }

    /// Scripted feed returning a fixed batch (or an error).
    #[derive(Debug, Default)]
    struct ScriptedFeed {
        /// The batch every poll returns.
        batch: Mutex<Vec<Transaction>>,
        /// Whether the next fetch fails.
        fail: Mutex<bool>,
    }

    impl TransactionFeed for ScriptedFeed {
        async fn today(&self) -> Result<Vec<Transaction>> {
            if *self.fail.lock().unwrap() {
                return Err(XfbError::HttpStatus { code: 503 });
            }
            Ok(self.batch.lock().unwrap().clone())
        }
    }

    /// Builds a watcher over a scripted batch and a mark.
    async fn watcher_with(
        serials: &[&str],
        mark: Option<i64>,
    ) -> FeedWatcher<ScriptedFeed, Arc<InMemoryStorage>> {
        let feed = ScriptedFeed::default();
        *feed.batch.lock().unwrap() = serials.iter().map(|s| record(s)).collect();
        let storage = Arc::new(InMemoryStorage::new());
        if let Some(value) = mark {
            storage
                .set_high_water_mark(TransactionSerial::new(value))
                .await
                .unwrap();
        }
        FeedWatcher::new(feed, storage)
    }

    #[tokio::test]
    async fn surfaces_only_the_maximal_new_serial() {
        let watcher = watcher_with(&["95", "101", "103", "99"], Some(100)).await;

        let event = watcher.poll().await.unwrap().unwrap();
        assert_eq!(event.mark, TransactionSerial::new(103));
        assert_eq!(event.latest.serial_no, "103");
        assert_eq!(event.skipped, 1); // serial 101 consumed, not surfaced
        assert_eq!(
            watcher.storage.high_water_mark().await.unwrap(),
            Some(TransactionSerial::new(103))
        );
    }

    #[tokio::test]
    async fn repeat_poll_is_idempotent() {
        let watcher = watcher_with(&["95", "101", "103", "99"], Some(100)).await;

        assert!(watcher.poll().await.unwrap().is_some());
        assert_eq!(watcher.poll().await.unwrap(), None);
        assert_eq!(watcher.poll().await.unwrap(), None);
        assert_eq!(
            watcher.storage.high_water_mark().await.unwrap(),
            Some(TransactionSerial::new(103))
        );
    }

    #[tokio::test]
    async fn nothing_new_means_no_event_and_no_mark_change() {
        let watcher = watcher_with(&["95", "99"], Some(100)).await;

        assert_eq!(watcher.poll().await.unwrap(), None);
        assert_eq!(
            watcher.storage.high_water_mark().await.unwrap(),
            Some(TransactionSerial::new(100))
        );
    }

    #[tokio::test]
    async fn first_poll_with_no_mark_sees_everything() {
        let watcher = watcher_with(&["7", "12", "9"], None).await;

        let event = watcher.poll().await.unwrap().unwrap();
        assert_eq!(event.mark, TransactionSerial::new(12));
        assert_eq!(event.skipped, 2);
    }

    #[tokio::test]
    async fn unparsable_serials_are_skipped() {
        let watcher = watcher_with(&["oops", "104"], Some(100)).await;

        let event = watcher.poll().await.unwrap().unwrap();
        assert_eq!(event.mark, TransactionSerial::new(104));
        assert_eq!(event.skipped, 0);
    }

    #[tokio::test]
    async fn feed_error_leaves_the_mark_unchanged() {
        let watcher = watcher_with(&["103"], Some(100)).await;
        *watcher.feed.fail.lock().unwrap() = true;

        assert!(matches!(
            watcher.poll().await,
            Err(XfbError::HttpStatus { code: 503 })
        ));
        assert_eq!(
            watcher.storage.high_water_mark().await.unwrap(),
            Some(TransactionSerial::new(100))
        );
    }
}
