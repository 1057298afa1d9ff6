//! Payment-code lifecycle state machine.
//!
//! One [`QrLifecycle`] owns the life of a single outstanding payment
//! code: issuance, validity window, settlement detection, expiry, and
//! renewal. The machine is a perpetual loop, not terminal — `Settled`
//! and `Expired` both lead back to `Requesting` on the next cycle.
//!
//! Temporal decisions are pure functions of the current state and an
//! explicit `now`, so the invariants (active exactly while
//! `created_at <= now < valid_until`, settlement wins at any tick) are
//! testable without a clock.

use core::future::Future;
use core::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::Result;
use crate::models::{RedemptionResult, Session};

/// An issued payment code together with its validity window.
///
/// The content is immutable for as long as the code is active; renewal
/// replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCode {
    /// The opaque payment-code string.
    pub content: String,
    /// When the code was issued.
    pub created_at: DateTime<Utc>,
    /// When the code stops being usable.
    pub valid_until: DateTime<Utc>,
}

impl ActiveCode {
    /// Builds a code valid for `validity` starting at `created_at`.
    #[inline]
    #[must_use]
    pub fn new(content: String, created_at: DateTime<Utc>, validity: Duration) -> Self {
        let window = TimeDelta::from_std(validity).unwrap_or(TimeDelta::MAX);
        Self {
            content,
            created_at,
            valid_until: created_at + window,
        }
    }

    /// Returns `true` once `now` has reached the end of the validity
    /// window. The boundary itself counts as expired.
    #[inline]
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.valid_until
    }

    /// Time left until expiry, saturating at zero.
    #[inline]
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.valid_until - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// The lifecycle states of one payment code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QrState {
    /// No code outstanding; nothing has been requested yet (or the last
    /// request failed).
    #[default]
    Empty,
    /// A refresh is in flight.
    Requesting,
    /// A code is outstanding and usable.
    Active(ActiveCode),
    /// The code was redeemed for the carried amount.
    Settled {
        /// The charged amount, verbatim from the redemption result.
        amount: String,
    },
    /// The validity window elapsed without a settlement.
    Expired,
}

impl QrState {
    /// Returns the outstanding code when the state is `Active`.
    #[inline]
    #[must_use]
    pub const fn active_code(&self) -> Option<&ActiveCode> {
        match self {
            Self::Active(code) => Some(code),
            Self::Empty | Self::Requesting | Self::Settled { .. } | Self::Expired => None,
        }
    }

    /// Returns `true` when a usable code is outstanding.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active_code().is_some()
    }
}

/// Everything a refresh cycle produces: a fresh session, the current
/// balance, and a newly issued code.
#[derive(Debug, Clone)]
pub struct QrRefresh {
    /// The freshly resolved session.
    pub session: Session,
    /// Raw balance string (the withheld sentinel passes through).
    pub balance: String,
    /// The newly issued payment-code string.
    pub code: String,
}

/// Remote operations the lifecycle depends on.
///
/// The live implementation re-authenticates and talks to the payment
/// service; tests substitute a scripted one.
pub trait QrService: core::fmt::Debug + Send + Sync {
    /// Re-authenticates, fetches the balance, and issues a new code.
    fn refresh(&self) -> impl Future<Output = Result<QrRefresh>> + Send;

    /// Queries the redemption status of an outstanding code.
    fn redemption(&self, code: &str) -> impl Future<Output = Result<RedemptionResult>> + Send;
}

impl<S: QrService> QrService for std::sync::Arc<S> {
    #[inline]
    fn refresh(&self) -> impl Future<Output = Result<QrRefresh>> + Send {
        (**self).refresh()
    }

    #[inline]
    fn redemption(&self, code: &str) -> impl Future<Output = Result<RedemptionResult>> + Send {
        (**self).redemption(code)
    }
}

/// Observable outcome of a lifecycle step, surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrEvent {
    /// A fresh code is active; carries the balance fetched alongside it.
    Renewed {
        /// Raw balance string from the refresh.
        balance: String,
    },
    /// The outstanding code was redeemed for the carried amount.
    Settled {
        /// The charged amount, surfaced exactly once.
        amount: String,
    },
    /// The outstanding code expired without a settlement.
    Expired,
}

/// Driver owning all mutable state of one payment-code lifecycle.
///
/// Ticks are strictly sequential: the driver takes `&mut self`, so a new
/// tick cannot start before the previous redemption check resolves, and
/// the coordinator skips (rather than queues) ticks that fire while one
/// is still in flight.
#[derive(Debug)]
pub struct QrLifecycle<S> {
    /// Remote operations.
    service: S,
    /// Validity window applied to newly issued codes.
    validity: Duration,
    /// Current state.
    state: QrState,
}

impl<S: QrService> QrLifecycle<S> {
    /// Creates an idle lifecycle.
    #[inline]
    #[must_use]
    pub const fn new(service: S, validity: Duration) -> Self {
        Self {
            service,
            validity,
            state: QrState::Empty,
        }
    }

    /// The current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> &QrState {
        &self.state
    }

    /// Requests a fresh session, balance, and code.
    ///
    /// On success the machine becomes `Active` with a new validity
    /// window. On failure it falls back to `Empty` and surfaces the
    /// error; it does not retry. Re-triggering is the caller's call.
    ///
    /// # Errors
    ///
    /// Propagates the service error that aborted the cycle.
    #[tracing::instrument(skip_all)]
    pub async fn refresh(&mut self) -> Result<QrEvent> {
        self.state = QrState::Requesting;
        match self.service.refresh().await {
            Ok(refresh) => {
                let code = ActiveCode::new(refresh.code, Utc::now(), self.validity);
                tracing::debug!(valid_until = %code.valid_until, "new code active");
                self.state = QrState::Active(code);
                Ok(QrEvent::Renewed {
                    balance: refresh.balance,
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, "refresh failed");
                self.state = QrState::Empty;
                Err(err)
            }
        }
    }

    /// One lifecycle tick at the given instant.
    ///
    /// A no-op unless a code is active. Expiry is checked first; an
    /// unexpired code gets exactly one redemption check, and a non-null
    /// settlement amount wins regardless of remaining window time.
    ///
    /// # Errors
    ///
    /// A failed redemption check aborts this tick with the state
    /// unchanged; the next tick simply tries again.
    #[tracing::instrument(skip_all)]
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<Option<QrEvent>> {
        let Some(code) = self.state.active_code() else {
            return Ok(None);
        };

        if code.is_expired(now) {
            tracing::debug!("code expired");
            self.state = QrState::Expired;
            return Ok(Some(QrEvent::Expired));
        }

        let content = code.content.clone();
        let redemption = self.service.redemption(&content).await?;
        if let Some(amount) = redemption.settled_amount {
            tracing::info!(amount = %amount, "code settled");
            self.state = QrState::Settled {
                amount: amount.clone(),
            };
            return Ok(Some(QrEvent::Settled { amount }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::XfbError;
    use crate::models::SessionToken;

    /// Builds a minimal session for scripted refreshes.
    fn test_session() -> Session {
        Session::new(
            SessionToken::new("tok-1"),
            "u-1".to_owned(),
            serde_json::Map::new(),
        )
    }

    /// Builds a redemption result with the given settlement.
    fn redemption(amount: Option<&str>) -> RedemptionResult {
        RedemptionResult {
            card_number: "20250001".to_owned(),
            real_name: "Zhang San".to_owned(),
            deal_time: String::new(),
            recognition_flag: "0".to_owned(),
            payment_type_name: "QR".to_owned(),
            settled_amount: amount.map(ToOwned::to_owned),
        }
    }

    /// Scripted service: issues sequentially numbered codes and settles
    /// when told to.
    #[derive(Debug, Default)]
    struct ScriptedService {
        /// Number of refreshes served so far.
        refreshes: Mutex<u32>,
        /// Settlement amount the next redemption check reports.
        settle_with: Mutex<Option<String>>,
        /// Whether the next refresh fails.
        fail_refresh: Mutex<bool>,
    }

    impl QrService for ScriptedService {
        async fn refresh(&self) -> Result<QrRefresh> {
            if *self.fail_refresh.lock().unwrap() {
                return Err(XfbError::HttpStatus { code: 502 });
            }
            let mut refreshes = self.refreshes.lock().unwrap();
            *refreshes += 1;
            Ok(QrRefresh {
                session: test_session(),
                balance: "88.40".to_owned(),
                code: format!("QR-{}", *refreshes),
            })
        }

        async fn redemption(&self, _code: &str) -> Result<RedemptionResult> {
            Ok(redemption(self.settle_with.lock().unwrap().as_deref()))
        }
    }

    /// Fixed validity used across the tests.
    const VALIDITY: Duration = Duration::from_secs(120);

    #[test]
    fn active_code_window_boundaries() {
        let created = Utc::now();
        let code = ActiveCode::new("QR-1".to_owned(), created, VALIDITY);

        assert!(!code.is_expired(created));
        assert!(!code.is_expired(created + TimeDelta::seconds(119)));
        assert!(
            !code.is_expired(created + TimeDelta::seconds(120) - TimeDelta::milliseconds(1)),
            "still active just before the boundary"
        );
        assert!(
            code.is_expired(created + TimeDelta::seconds(120)),
            "expired exactly at the boundary"
        );
        assert!(code.is_expired(created + TimeDelta::seconds(121)));
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let created = Utc::now();
        let code = ActiveCode::new("QR-1".to_owned(), created, VALIDITY);
        assert_eq!(
            code.remaining(created + TimeDelta::seconds(200)),
            Duration::ZERO
        );
        assert_eq!(
            code.remaining(created + TimeDelta::seconds(20)),
            Duration::from_secs(100)
        );
    }

    #[tokio::test]
    async fn refresh_activates_a_code() {
        let mut lifecycle = QrLifecycle::new(ScriptedService::default(), VALIDITY);
        assert_eq!(*lifecycle.state(), QrState::Empty);

        let event = lifecycle.refresh().await.unwrap();
        assert_eq!(
            event,
            QrEvent::Renewed {
                balance: "88.40".to_owned()
            }
        );
        let code = lifecycle.state().active_code().unwrap();
        assert_eq!(code.content, "QR-1");
        assert_eq!(code.valid_until - code.created_at, TimeDelta::seconds(120));
    }

    #[tokio::test]
    async fn refresh_failure_falls_back_to_empty() {
        let service = ScriptedService::default();
        *service.fail_refresh.lock().unwrap() = true;
        let mut lifecycle = QrLifecycle::new(service, VALIDITY);

        let result = lifecycle.refresh().await;
        assert!(matches!(result, Err(XfbError::HttpStatus { code: 502 })));
        assert_eq!(*lifecycle.state(), QrState::Empty);
    }

    #[tokio::test]
    async fn tick_is_a_noop_when_not_active() {
        let mut lifecycle = QrLifecycle::new(ScriptedService::default(), VALIDITY);
        assert_eq!(lifecycle.tick(Utc::now()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn tick_detects_settlement_with_exact_amount() {
        let service = ScriptedService::default();
        *service.settle_with.lock().unwrap() = Some("12.50".to_owned());
        let mut lifecycle = QrLifecycle::new(service, VALIDITY);
        let _renewed = lifecycle.refresh().await.unwrap();

        let event = lifecycle.tick(Utc::now()).await.unwrap();
        assert_eq!(
            event,
            Some(QrEvent::Settled {
                amount: "12.50".to_owned()
            })
        );
        assert_eq!(
            *lifecycle.state(),
            QrState::Settled {
                amount: "12.50".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn tick_expires_at_the_window_end() {
        let mut lifecycle = QrLifecycle::new(ScriptedService::default(), VALIDITY);
        let _renewed = lifecycle.refresh().await.unwrap();
        let valid_until = lifecycle.state().active_code().unwrap().valid_until;

        // Just inside the window: the unsettled check leaves it active.
        let inside = valid_until - TimeDelta::seconds(1);
        assert_eq!(lifecycle.tick(inside).await.unwrap(), None);
        assert!(lifecycle.state().is_active());

        // At the boundary: expired, no settlement surfaced.
        let event = lifecycle.tick(valid_until).await.unwrap();
        assert_eq!(event, Some(QrEvent::Expired));
        assert_eq!(*lifecycle.state(), QrState::Expired);
    }

    #[tokio::test]
    async fn failed_check_leaves_the_state_unchanged() {
        /// Service whose redemption check always fails.
        #[derive(Debug)]
        struct FailingCheck;

        impl QrService for FailingCheck {
            async fn refresh(&self) -> Result<QrRefresh> {
                Ok(QrRefresh {
                    session: test_session(),
                    balance: "0.00".to_owned(),
                    code: "QR-X".to_owned(),
                })
            }

            async fn redemption(&self, _code: &str) -> Result<RedemptionResult> {
                Err(XfbError::HttpStatus { code: 500 })
            }
        }

        let mut lifecycle = QrLifecycle::new(FailingCheck, VALIDITY);
        let _renewed = lifecycle.refresh().await.unwrap();
        let before = lifecycle.state().clone();

        assert!(lifecycle.tick(Utc::now()).await.is_err());
        assert_eq!(*lifecycle.state(), before);
    }

    #[tokio::test]
    async fn reissue_produces_a_distinct_code_and_window() {
        let mut lifecycle = QrLifecycle::new(ScriptedService::default(), VALIDITY);
        let _first_event = lifecycle.refresh().await.unwrap();
        let first = lifecycle.state().active_code().unwrap().clone();

        // Force expiry, then renew as the perpetual loop would.
        let expired = lifecycle.tick(first.valid_until).await.unwrap();
        assert_eq!(expired, Some(QrEvent::Expired));
        let _second_event = lifecycle.refresh().await.unwrap();
        let second = lifecycle.state().active_code().unwrap().clone();

        assert_ne!(first.content, second.content);
        assert!(second.created_at >= first.created_at);
        assert_eq!(
            second.valid_until - second.created_at,
            TimeDelta::seconds(120)
        );
    }
}
