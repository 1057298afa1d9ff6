//! Durable settings storage.
//!
//! The library persists exactly three things: the session token, the
//! transaction high-water-mark, and the user's "notify me about new
//! transactions" flag. The [`Storage`] trait abstracts the backend so the
//! host application can plug in whatever key/value facility it has;
//! [`InMemoryStorage`] serves tests and ephemeral use, and
//! [`FileStorage`] (feature `storage-file`) keeps a JSON settings file
//! under the platform data directory.

#[cfg(feature = "storage-file")]
mod file;
mod memory;

use std::sync::Arc;

use core::future::Future;

#[cfg(feature = "storage-file")]
pub use file::FileStorage;
pub use memory::InMemoryStorage;

use crate::error::Result;
use crate::models::TransactionSerial;

/// Async storage backend for the crate's persisted settings.
///
/// All methods take `&self` — implementations use interior mutability
/// (e.g. `Mutex`) for thread-safe mutation. The high-water-mark is
/// monotonically non-decreasing: implementations must ignore attempts to
/// lower it.
pub trait Storage: core::fmt::Debug + Send + Sync {
    /// Returns the persisted session token, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to read.
    fn session_token(&self) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Persists the session token.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to write.
    fn set_session_token(&self, token: String) -> impl Future<Output = Result<()>> + Send;

    /// Returns the highest transaction serial already observed, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to read.
    fn high_water_mark(&self) -> impl Future<Output = Result<Option<TransactionSerial>>> + Send;

    /// Raises the high-water-mark. Values at or below the current mark
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to write.
    fn set_high_water_mark(
        &self,
        serial: TransactionSerial,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Returns whether periodic transaction notifications are enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to read.
    fn notifications_enabled(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Persists the notifications flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to write.
    fn set_notifications_enabled(&self, enabled: bool) -> impl Future<Output = Result<()>> + Send;
}

impl<S: Storage> Storage for Arc<S> {
    #[inline]
    fn session_token(&self) -> impl Future<Output = Result<Option<String>>> + Send {
        (**self).session_token()
    }

    #[inline]
    fn set_session_token(&self, token: String) -> impl Future<Output = Result<()>> + Send {
        (**self).set_session_token(token)
    }

    #[inline]
    fn high_water_mark(&self) -> impl Future<Output = Result<Option<TransactionSerial>>> + Send {
        (**self).high_water_mark()
    }

    #[inline]
    fn set_high_water_mark(
        &self,
        serial: TransactionSerial,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).set_high_water_mark(serial)
    }

    #[inline]
    fn notifications_enabled(&self) -> impl Future<Output = Result<bool>> + Send {
        (**self).notifications_enabled()
    }

    #[inline]
    fn set_notifications_enabled(&self, enabled: bool) -> impl Future<Output = Result<()>> + Send {
        (**self).set_notifications_enabled(enabled)
    }
}
