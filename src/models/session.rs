//! Session credential and resolved user profile.

use secrecy::{ExposeSecret as _, SecretString};
use serde_json::{Map, Value};

/// An opaque session credential for the remote payment system.
///
/// The raw token is held behind [`SecretString`] so it never shows up in
/// `Debug` output or logs; it is exposed only at the moment the cookie
/// header is built.
pub struct SessionToken(SecretString);

impl SessionToken {
    /// Wraps a raw token string.
    #[inline]
    #[must_use]
    pub fn new<T: Into<String>>(raw: T) -> Self {
        Self(SecretString::from(raw.into()))
    }

    /// Exposes the raw token for use in a credential header.
    #[inline]
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for SessionToken {
    #[inline]
    fn clone(&self) -> Self {
        Self::new(self.0.expose_secret().to_owned())
    }
}

impl core::fmt::Debug for SessionToken {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}

impl From<String> for SessionToken {
    #[inline]
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for SessionToken {
    #[inline]
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// An authenticated session, immutable once resolved.
///
/// Created by [`crate::broker::Broker::login`], which exchanges the
/// session token for the user profile and extracts the member identifier
/// from it. A new session is created per refresh cycle; existing sessions
/// are never mutated.
#[derive(Debug, Clone)]
pub struct Session {
    /// The session credential the profile was resolved with.
    token: SessionToken,
    /// Member identifier extracted from the profile's `id` field.
    member_id: String,
    /// The full profile map, verbatim from the server.
    profile: Map<String, Value>,
}

impl Session {
    /// Assembles a resolved session.
    #[inline]
    #[must_use]
    pub const fn new(token: SessionToken, member_id: String, profile: Map<String, Value>) -> Self {
        Self {
            token,
            member_id,
            profile,
        }
    }

    /// The session credential.
    #[inline]
    #[must_use]
    pub const fn token(&self) -> &SessionToken {
        &self.token
    }

    /// The member identifier the remote system keys this account by.
    #[inline]
    #[must_use]
    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    /// The raw profile map returned by the default-login call.
    #[inline]
    #[must_use]
    pub const fn profile(&self) -> &Map<String, Value> {
        &self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_the_token() {
        let token = SessionToken::new("super-secret");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn expose_returns_the_raw_token() {
        let token = SessionToken::new("abc123");
        assert_eq!(token.expose(), "abc123");
        assert_eq!(token.clone().expose(), "abc123");
    }

    #[test]
    fn session_carries_member_id_and_profile() {
        let mut profile = Map::new();
        let _old = profile.insert("id".to_owned(), Value::String("u-1".to_owned()));
        let session = Session::new(SessionToken::new("t"), "u-1".to_owned(), profile);
        assert_eq!(session.member_id(), "u-1");
        assert!(session.profile().contains_key("id"));
    }
}
