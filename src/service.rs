//! Live service implementations backed by the session broker.
//!
//! [`XfbService`] is the production wiring of the [`QrService`] and
//! [`TransactionFeed`] seams: every refresh or poll resolves a fresh
//! session from the stored token (sessions are immutable; a new broker is
//! created per cycle), and redemption checks reuse the broker of the most
//! recent refresh so they run against the session that issued the code.

use std::sync::{Arc, Mutex, PoisonError};

use crate::broker::Broker;
use crate::client::XfbClient;
use crate::config::Config;
use crate::error::{Result, XfbError};
use crate::models::{RedemptionResult, SessionToken, Transaction};
use crate::qr::{QrRefresh, QrService};
use crate::storage::Storage;
use crate::watcher::TransactionFeed;

/// Production implementation of the lifecycle and watcher seams.
#[derive(Debug)]
pub struct XfbService<S> {
    /// Underlying HTTP client.
    client: XfbClient,
    /// Client configuration.
    config: Config,
    /// Settings storage holding the session token.
    storage: Arc<S>,
    /// Broker of the most recent refresh, for redemption checks.
    current: Mutex<Option<Broker>>,
}

impl<S: Storage> XfbService<S> {
    /// Creates a service over the given client, configuration, and
    /// storage.
    #[inline]
    #[must_use]
    pub const fn new(client: XfbClient, config: Config, storage: Arc<S>) -> Self {
        Self {
            client,
            config,
            storage,
            current: Mutex::new(None),
        }
    }

    /// Resolves a fresh broker from the stored session token.
    ///
    /// # Errors
    ///
    /// Returns [`XfbError::Config`] when no token is stored, or the
    /// login error.
    async fn fresh_broker(&self) -> Result<Broker> {
        let token = self
            .storage
            .session_token()
            .await?
            .ok_or_else(|| XfbError::Config("no session token stored".to_owned()))?;
        Broker::login(
            self.client.clone(),
            self.config.clone(),
            SessionToken::new(token),
        )
        .await
    }

    /// Replaces the remembered broker.
    fn remember(&self, broker: &Broker) -> Result<()> {
        let mut current = self.current.lock().map_err(|err| lock_error(&err))?;
        *current = Some(broker.clone());
        Ok(())
    }

    /// Returns the broker of the most recent refresh.
    fn remembered(&self) -> Result<Broker> {
        self.current
            .lock()
            .map_err(|err| lock_error(&err))?
            .clone()
            .ok_or_else(|| XfbError::Config("no active session; refresh first".to_owned()))
    }
}

/// Wraps a mutex poison error.
fn lock_error<T>(err: &PoisonError<T>) -> XfbError {
    XfbError::Storage(err.to_string().into())
}

impl<S: Storage> QrService for XfbService<S> {
    async fn refresh(&self) -> Result<QrRefresh> {
        let broker = self.fresh_broker().await?;
        let balance = broker.balance().await?;
        let code = broker.issue_qr_code().await?;
        self.remember(&broker)?;
        Ok(QrRefresh {
            session: broker.into_session(),
            balance,
            code,
        })
    }

    async fn redemption(&self, code: &str) -> Result<RedemptionResult> {
        let broker = self.remembered()?;
        broker.check_redemption(code).await
    }
}

impl<S: Storage> TransactionFeed for XfbService<S> {
    async fn today(&self) -> Result<Vec<Transaction>> {
        let broker = self.fresh_broker().await?;
        broker.list_transactions(None).await
    }
}
