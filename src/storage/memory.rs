//! In-memory storage backend.
//!
//! Provides [`InMemoryStorage`], a thread-safe in-memory implementation
//! of [`super::Storage`]. Ideal for tests and for hosts that persist
//! settings through their own facilities.

use core::future::{self, Future};
use std::sync::{Mutex, PoisonError};

use crate::error::{Result, XfbError};
use crate::models::TransactionSerial;

/// Thread-safe in-memory settings storage.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    /// All state behind a single mutex for interior mutability.
    inner: Mutex<Inner>,
}

/// Inner mutable state.
#[derive(Debug, Default)]
struct Inner {
    /// Persisted session token.
    session_token: Option<String>,
    /// Highest observed transaction serial.
    high_water_mark: Option<TransactionSerial>,
    /// Whether periodic transaction notifications are enabled.
    notifications_enabled: bool,
}

impl InMemoryStorage {
    /// Creates a new empty in-memory storage.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the inner lock and applies a closure.
    fn with_lock<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R> {
        let mut inner = self.inner.lock().map_err(|err| lock_error(&err))?;
        Ok(f(&mut inner))
    }
}

/// Wraps a mutex poison error.
fn lock_error<T>(err: &PoisonError<T>) -> XfbError {
    XfbError::Storage(err.to_string().into())
}

impl super::Storage for InMemoryStorage {
    #[inline]
    fn session_token(&self) -> impl Future<Output = Result<Option<String>>> + Send {
        future::ready(self.with_lock(|inner| inner.session_token.clone()))
    }

    #[inline]
    fn set_session_token(&self, token: String) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.with_lock(|inner| inner.session_token = Some(token)))
    }

    #[inline]
    fn high_water_mark(&self) -> impl Future<Output = Result<Option<TransactionSerial>>> + Send {
        future::ready(self.with_lock(|inner| inner.high_water_mark))
    }

    #[inline]
    fn set_high_water_mark(
        &self,
        serial: TransactionSerial,
    ) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.with_lock(|inner| {
            inner.high_water_mark = Some(inner.high_water_mark.map_or(serial, |m| m.max(serial)));
        }))
    }

    #[inline]
    fn notifications_enabled(&self) -> impl Future<Output = Result<bool>> + Send {
        future::ready(self.with_lock(|inner| inner.notifications_enabled))
    }

    #[inline]
    fn set_notifications_enabled(&self, enabled: bool) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.with_lock(|inner| inner.notifications_enabled = enabled))
    }
}
