//! Notification sink.
//!
//! The actual delivery mechanism (system notification center, message
//! bus, ...) belongs to the host application; the library only hands over
//! a `(title, body)` pair.

/// One-shot user-visible alert sink.
pub trait Notifier: core::fmt::Debug + Send + Sync {
    /// Delivers a one-shot alert.
    fn notify(&self, title: &str, body: &str);
}

/// A [`Notifier`] that emits alerts through `tracing`.
///
/// Used by the CLI and as a sensible default where no real delivery
/// channel exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    #[inline]
    fn notify(&self, title: &str, body: &str) {
        tracing::info!(title, body, "notification");
    }
}
