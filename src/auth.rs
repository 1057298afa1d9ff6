//! Credential exchange against the authorization service.
//!
//! Obtaining a session is a redirect-capture dance: the authorization
//! entry point answers with a redirect whose destination carries a
//! `state` token; the user authorizes out-of-band and comes back with a
//! `code`; posting `(state, code)` at the callback endpoint yields the
//! session cookie. The needed parameters always travel in the redirect
//! destination or the response headers, never in a body, so this module
//! runs its own client with redirect following disabled.

use reqwest::header::{LOCATION, SET_COOKIE};
use reqwest::redirect;
use url::Url;

use crate::config::Config;
use crate::error::{Result, XfbError};
use crate::models::SessionToken;

/// Authorization entry point; answers with a redirect carrying `state`.
const AUTHORIZE_PATH: &str = "/wechat/auth/authorize";

/// Callback endpoint that exchanges `(state, code)` for a session.
const CALLBACK_PATH: &str = "/wechat/auth/callback";

/// Name of the session cookie the callback sets.
const SESSION_COOKIE: &str = "shiroJID";

/// Client for the authorization redirect flow.
///
/// Deliberately separate from [`crate::client::XfbClient`]: these
/// endpoints speak redirects and cookies rather than JSON envelopes.
#[derive(Debug)]
pub struct AuthFlow {
    /// HTTP client with redirect following disabled.
    http: reqwest::Client,
    /// Base URL of the application API.
    base_url: String,
}

impl AuthFlow {
    /// Creates a flow against the configured application API.
    ///
    /// # Errors
    ///
    /// Returns [`XfbError::Transport`] if the HTTP client fails to build.
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            base_url: config.app_base_url.clone(),
        })
    }

    /// Requests a fresh login `state` from the authorization entry point.
    ///
    /// # Errors
    ///
    /// Returns [`XfbError::AuthExchange`] if the endpoint does not
    /// redirect or the redirect destination carries no `state`.
    #[tracing::instrument(skip_all)]
    pub async fn obtain_login_state(&self) -> Result<String> {
        let url = format!("{}{AUTHORIZE_PATH}", self.base_url);
        let response = self.http.get(&url).send().await?;
        let destination = redirect_destination(&response)?;
        let state = state_from_redirect(&destination)?;
        tracing::debug!(state = %state, "captured login state");
        Ok(state)
    }

    /// Exchanges a captured `(state, code)` pair for a session token.
    ///
    /// The final redirect is not followed; the session cookie is read
    /// from the callback response itself (or, failing that, from the
    /// redirect destination's query).
    ///
    /// # Errors
    ///
    /// Returns [`XfbError::AuthExchange`] if no session credential can
    /// be extracted.
    #[tracing::instrument(skip_all)]
    pub async fn exchange_session(&self, state: &str, code: &str) -> Result<SessionToken> {
        let url = format!("{}{CALLBACK_PATH}", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("state", state), ("code", code)])
            .send()
            .await?;

        for cookie in response.headers().get_all(SET_COOKIE) {
            if let Ok(raw) = cookie.to_str()
                && let Some(token) = token_from_set_cookie(raw)
            {
                tracing::debug!("session cookie captured from callback");
                return Ok(SessionToken::new(token));
            }
        }

        if response.status().is_redirection() {
            let destination = redirect_destination(&response)?;
            if let Some((_, token)) = destination
                .query_pairs()
                .find(|(key, value)| key == SESSION_COOKIE && !value.is_empty())
            {
                tracing::debug!("session token captured from redirect destination");
                return Ok(SessionToken::new(token.into_owned()));
            }
        }

        Err(XfbError::AuthExchange(
            "callback yielded no session credential".to_owned(),
        ))
    }
}

/// Parses the `Location` header of a redirect response.
fn redirect_destination(response: &reqwest::Response) -> Result<Url> {
    if !response.status().is_redirection() {
        return Err(XfbError::AuthExchange(format!(
            "expected a redirect, got HTTP {}",
            response.status().as_u16()
        )));
    }
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| XfbError::AuthExchange("redirect carries no Location header".to_owned()))?;
    Url::parse(location)
        .map_err(|err| XfbError::AuthExchange(format!("unparsable redirect destination: {err}")))
}

/// Extracts the `state` query parameter from a captured redirect URL.
///
/// # Errors
///
/// Returns [`XfbError::AuthExchange`] when the parameter is missing or
/// empty.
#[inline]
pub fn state_from_redirect(url: &Url) -> Result<String> {
    url.query_pairs()
        .find(|(key, value)| key == "state" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| {
            XfbError::AuthExchange(format!("redirect carries no `state` parameter: {url}"))
        })
}

/// Pulls the session token out of a `Set-Cookie` header value.
fn token_from_set_cookie(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_owned())
}
