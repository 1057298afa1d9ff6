//! Client configuration.
//!
//! All tunables live here, including the timing constants the rest of the
//! crate treats as configuration rather than magic numbers: the payment
//! code's validity window, the per-second redemption-check tick, the
//! foreground refresh cadence, and the background-cycle deadline.

use core::time::Duration;

/// Default base URL of the web-app API (balance, codes, transactions).
pub(crate) const WEBAPP_BASE_URL: &str = "https://webapp.xiaofubao.com";

/// Default base URL of the application API (authorization flow).
pub(crate) const APP_BASE_URL: &str = "https://application.xiaofubao.com";

/// Device identifier sent with the default-login call.
const DEVICE_ID: &str = "1234567890";

/// Platform tag the service expects from this client class.
const PLATFORM: &str = "WECHAT_H5";

/// How long an issued payment code stays valid.
const QR_VALIDITY: Duration = Duration::from_secs(120);

/// Cadence of redemption checks while a code is active.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Foreground refresh cadence (full balance + code renewal).
const REFRESH_INTERVAL: Duration = Duration::from_secs(120);

/// Deadline for one externally-invoked background cycle. The external
/// scheduler expects a completion signal well before it reclaims the
/// grant, so this is deliberately shorter than the grant itself.
const BACKGROUND_DEADLINE: Duration = Duration::from_secs(25);

/// Configuration for the client, broker, and coordinator.
///
/// [`Config::default`] matches the production service; tests override the
/// base URLs to point at a local mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the web-app API.
    pub webapp_base_url: String,
    /// Base URL of the application API (authorization flow).
    pub app_base_url: String,
    /// Device identifier sent with the default-login call.
    pub device_id: String,
    /// Platform tag sent with login and redemption calls.
    pub platform: String,
    /// Validity window of an issued payment code.
    pub qr_validity: Duration,
    /// Cadence of redemption checks while a code is active.
    pub tick_interval: Duration,
    /// Foreground refresh cadence.
    pub refresh_interval: Duration,
    /// Deadline for one background cycle.
    pub background_deadline: Duration,
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            webapp_base_url: WEBAPP_BASE_URL.to_owned(),
            app_base_url: APP_BASE_URL.to_owned(),
            device_id: DEVICE_ID.to_owned(),
            platform: PLATFORM.to_owned(),
            qr_validity: QR_VALIDITY,
            tick_interval: TICK_INTERVAL,
            refresh_interval: REFRESH_INTERVAL,
            background_deadline: BACKGROUND_DEADLINE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_production() {
        let config = Config::default();
        assert_eq!(config.webapp_base_url, "https://webapp.xiaofubao.com");
        assert_eq!(config.platform, "WECHAT_H5");
    }

    #[test]
    fn default_timing_constants() {
        let config = Config::default();
        assert_eq!(config.qr_validity, Duration::from_secs(120));
        assert_eq!(config.refresh_interval, Duration::from_secs(120));
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert!(config.background_deadline < Duration::from_secs(30));
    }
}
