//! Paired-device context sync.
//!
//! The session token can be propagated to a companion device (and read
//! back on the receiving side). The transport is an external
//! collaborator; the library only produces and consumes the context
//! through this narrow interface.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{Result, XfbError};

/// The context shared with a paired device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncContext {
    /// The session token to hand over.
    #[serde(rename = "sessionID")]
    pub session_token: String,
}

/// Push/pull interface to the paired-device transport.
pub trait ContextSync: core::fmt::Debug + Send + Sync {
    /// Propagates the context to the companion device.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects the context.
    fn push_context(&self, context: &SyncContext) -> Result<()>;

    /// Returns the last context received from the companion device.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be read.
    fn received_context(&self) -> Result<Option<SyncContext>>;
}

impl<C: ContextSync> ContextSync for std::sync::Arc<C> {
    #[inline]
    fn push_context(&self, context: &SyncContext) -> Result<()> {
        (**self).push_context(context)
    }

    #[inline]
    fn received_context(&self) -> Result<Option<SyncContext>> {
        (**self).received_context()
    }
}

/// Loopback implementation: what is pushed is what is received.
///
/// Stands in for the real transport in tests and single-device setups.
#[derive(Debug, Default)]
pub struct InMemoryContextSync {
    /// Last pushed context.
    inner: Mutex<Option<SyncContext>>,
}

impl InMemoryContextSync {
    /// Creates an empty loopback sync.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContextSync for InMemoryContextSync {
    #[inline]
    fn push_context(&self, context: &SyncContext) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|err| lock_error(&err))?;
        *inner = Some(context.clone());
        Ok(())
    }

    #[inline]
    fn received_context(&self) -> Result<Option<SyncContext>> {
        let inner = self.inner.lock().map_err(|err| lock_error(&err))?;
        Ok(inner.clone())
    }
}

/// Wraps a mutex poison error.
fn lock_error<T>(err: &PoisonError<T>) -> XfbError {
    XfbError::Storage(err.to_string().into())
}
