//! Session broker for the Xiaofubao payment API.
//!
//! A [`Broker`] is created per refresh cycle: [`Broker::login`] exchanges
//! the session token for the user profile once, and every subsequent
//! operation reuses the resolved [`Session`] without mutating it.

use chrono::{Local, NaiveDate};
use serde_json::{Map, Value, json};

use crate::client::XfbClient;
use crate::config::Config;
use crate::envelope::{Envelope, Page};
use crate::error::{Result, XfbError};
use crate::models::{RedemptionResult, Session, SessionToken, Transaction};

/// Default-login endpoint; resolves the profile behind a session cookie.
const DEFAULT_LOGIN_PATH: &str = "/user/defaultLogin";

/// Balance query endpoint.
const CARD_MONEY_PATH: &str = "/card/getCardMoney";

/// Payment-code issuance endpoint.
const QR_CODE_PATH: &str = "/card/getQRCode";

/// Redemption-check endpoint.
const QR_CODE_RESULT_PATH: &str = "/card/getQRCodeResult";

/// Per-day transaction history endpoint.
const CARD_QUERY_PATH: &str = "/routeauth/auth/route/user/cardQuerynoPage";

/// Sentinel balance the server sends when the amount is intentionally
/// withheld. A valid, meaningful response, passed through verbatim.
pub const WITHHELD_BALANCE: &str = "- - -";

/// Date format of the history endpoint's `queryTime` parameter.
const QUERY_DATE_FORMAT: &str = "%Y%m%d";

/// An authenticated broker for one refresh cycle.
#[derive(Debug, Clone)]
pub struct Broker {
    /// Underlying HTTP client.
    client: XfbClient,
    /// The resolved, immutable session.
    session: Session,
    /// Client configuration (platform tag, timing constants).
    config: Config,
}

impl Broker {
    /// Exchanges a session token for an authenticated broker.
    ///
    /// Calls the default-login endpoint with the configured device
    /// identifier and platform tag, then extracts the member identifier
    /// from the returned profile's `id` field.
    ///
    /// # Errors
    ///
    /// Returns a request error per [`XfbClient::post`], or
    /// [`XfbError::Decode`] if the profile lacks an `id` field.
    #[tracing::instrument(skip_all)]
    pub async fn login(client: XfbClient, config: Config, token: SessionToken) -> Result<Self> {
        let body = json!({
            "deviceId": config.device_id,
            "platform": config.platform,
        });
        let envelope: Envelope<Map<String, Value>> = client
            .post(DEFAULT_LOGIN_PATH, &body, Some(&token))
            .await?;
        let profile = envelope.require_data()?;
        let member_id = member_id_from_profile(&profile)?;
        tracing::debug!(member_id = %member_id, "session resolved");

        Ok(Self {
            client,
            session: Session::new(token, member_id, profile),
            config,
        })
    }

    /// The resolved session.
    #[inline]
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Consumes the broker and returns its session.
    #[inline]
    #[must_use]
    pub fn into_session(self) -> Session {
        self.session
    }

    /// Returns the account balance as the raw decimal string the server
    /// provides.
    ///
    /// The sentinel [`WITHHELD_BALANCE`] (`"- - -"`) means the server is
    /// intentionally withholding the amount; it is passed through
    /// unchanged, not treated as an error.
    ///
    /// # Errors
    ///
    /// Returns a request error per [`XfbClient::post`].
    #[tracing::instrument(skip_all)]
    pub async fn balance(&self) -> Result<String> {
        let body = json!({ "ymId": self.session.member_id() });
        let envelope: Envelope<String> = self
            .client
            .post(CARD_MONEY_PATH, &body, Some(self.session.token()))
            .await?;
        let value = envelope.require_data()?;
        if value == WITHHELD_BALANCE {
            tracing::debug!("server withheld the balance");
        }
        Ok(value)
    }

    /// Issues a new single-use payment code.
    ///
    /// The returned string is opaque; rendering it as a QR image is the
    /// caller's concern.
    ///
    /// # Errors
    ///
    /// Returns a request error per [`XfbClient::post`].
    #[tracing::instrument(skip_all)]
    pub async fn issue_qr_code(&self) -> Result<String> {
        let envelope: Envelope<String> = self
            .client
            .post(QR_CODE_PATH, &Value::Null, Some(self.session.token()))
            .await?;
        envelope.require_data()
    }

    /// Queries the redemption status of a previously issued code.
    ///
    /// The result's settled amount stays `None` until the code is
    /// redeemed.
    ///
    /// # Errors
    ///
    /// Returns a request error per [`XfbClient::post`].
    #[tracing::instrument(skip_all)]
    pub async fn check_redemption(&self, code: &str) -> Result<RedemptionResult> {
        let body = json!({
            "qrCode": code,
            "platform": self.config.platform,
        });
        let envelope: Envelope<RedemptionResult> = self
            .client
            .post(QR_CODE_RESULT_PATH, &body, Some(self.session.token()))
            .await?;
        envelope.require_data()
    }

    /// Lists the transactions posted on the given calendar day
    /// (default: today, local time), in server order.
    ///
    /// # Errors
    ///
    /// Returns a request error per [`XfbClient::post`].
    #[tracing::instrument(skip_all)]
    pub async fn list_transactions(&self, on_date: Option<NaiveDate>) -> Result<Vec<Transaction>> {
        let date = on_date.unwrap_or_else(|| Local::now().date_naive());
        let body = json!({
            "ymId": self.session.member_id(),
            "queryTime": date.format(QUERY_DATE_FORMAT).to_string(),
        });
        let page: Page<Transaction> = self
            .client
            .post(CARD_QUERY_PATH, &body, Some(self.session.token()))
            .await?;
        tracing::debug!(total = page.total, rows = page.rows.len(), "history fetched");
        Ok(page.rows)
    }
}

/// Extracts the member identifier from a login profile.
fn member_id_from_profile(profile: &Map<String, Value>) -> Result<String> {
    match profile.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(XfbError::Decode {
            detail: "login profile is missing the `id` field".to_owned(),
        }),
    }
}
