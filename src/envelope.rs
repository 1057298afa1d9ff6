//! Response envelope codec for the Xiaofubao API.
//!
//! Every endpoint wraps its payload in a uniform envelope carrying a
//! `statusCode` (0 on success), an optional human-readable `message`, and
//! the payload itself. Most endpoints nest the payload under `data`
//! ([`Envelope`]); the transaction-history endpoint inlines a paged result
//! next to the status fields ([`Page`]).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, XfbError};

/// The `statusCode` value the server uses for success.
const STATUS_OK: i32 = 0;

/// Wire contract shared by all envelope shapes.
///
/// The client uses this to run the semantic status check uniformly,
/// whatever the payload layout of the individual endpoint.
pub trait ApiResponse: DeserializeOwned {
    /// The remote `statusCode`; `0` means success.
    fn status_code(&self) -> i32;

    /// The server's human-readable message, if any.
    fn message(&self) -> Option<&str>;

    /// Returns `true` if the envelope signals success.
    #[inline]
    fn is_ok(&self) -> bool {
        self.status_code() == STATUS_OK
    }
}

/// Standard envelope with the payload nested under `data`.
///
/// `data` may be absent or `null` even on success, for endpoints that
/// carry no payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    /// Remote application status; `0` is success.
    pub status_code: i32,
    /// Human-readable (possibly localized) status message.
    #[serde(default)]
    pub message: Option<String>,
    /// The payload, when the endpoint returns one.
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T: DeserializeOwned> ApiResponse for Envelope<T> {
    #[inline]
    fn status_code(&self) -> i32 {
        self.status_code
    }

    #[inline]
    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Consumes the envelope and returns the payload.
    ///
    /// Payload access is refused unless `statusCode == 0`; an absent
    /// payload on success is a valid outcome (`Ok(None)`).
    ///
    /// # Errors
    ///
    /// Returns [`XfbError::Api`] if the envelope carries a non-zero status.
    #[inline]
    pub fn into_data(self) -> Result<Option<T>> {
        if self.status_code == STATUS_OK {
            Ok(self.data)
        } else {
            Err(XfbError::Api {
                code: self.status_code,
                message: self.message.unwrap_or_else(|| "(no message)".to_owned()),
            })
        }
    }

    /// Like [`Self::into_data`], but for endpoints whose success payload
    /// is mandatory.
    ///
    /// # Errors
    ///
    /// Returns [`XfbError::Api`] on a non-zero status, or
    /// [`XfbError::Decode`] if a successful envelope is missing `data`.
    #[inline]
    pub fn require_data(self) -> Result<T> {
        self.into_data()?.ok_or_else(|| XfbError::Decode {
            detail: "successful envelope is missing the `data` payload".to_owned(),
        })
    }
}

/// Flat paged envelope used by the transaction-history endpoint.
///
/// The status fields sit next to the page instead of wrapping a `data`
/// object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Remote application status; `0` is success.
    pub status_code: i32,
    /// Human-readable (possibly localized) status message.
    #[serde(default)]
    pub message: Option<String>,
    /// Total number of records the server holds for the query.
    pub total: i64,
    /// The records of this page, in server order.
    pub rows: Vec<T>,
}

impl<T: DeserializeOwned> ApiResponse for Page<T> {
    #[inline]
    fn status_code(&self) -> i32 {
        self.status_code
    }

    #[inline]
    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_envelope_with_data() {
        let json = r#"{"statusCode": 0, "message": null, "data": "88.40"}"#;
        let envelope: Envelope<String> = serde_json::from_str(json).unwrap();
        assert!(envelope.is_ok());
        assert_eq!(envelope.require_data().unwrap(), "88.40");
    }

    #[test]
    fn decode_envelope_without_data_field() {
        let json = r#"{"statusCode": 0, "message": "ok"}"#;
        let envelope: Envelope<String> = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.into_data().unwrap(), None);
    }

    #[test]
    fn require_data_rejects_missing_payload() {
        let json = r#"{"statusCode": 0}"#;
        let envelope: Envelope<String> = serde_json::from_str(json).unwrap();
        assert!(matches!(
            envelope.require_data(),
            Err(XfbError::Decode { .. })
        ));
    }

    #[test]
    fn non_zero_status_refuses_payload_access() {
        let json = r#"{"statusCode": 204, "message": "token expired", "data": "stale"}"#;
        let envelope: Envelope<String> = serde_json::from_str(json).unwrap();
        assert!(!envelope.is_ok());
        match envelope.into_data() {
            Err(XfbError::Api { code, message }) => {
                assert_eq!(code, 204);
                assert_eq!(message, "token expired");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn non_zero_status_without_message() {
        let json = r#"{"statusCode": 1}"#;
        let envelope: Envelope<String> = serde_json::from_str(json).unwrap();
        match envelope.into_data() {
            Err(XfbError::Api { code, message }) => {
                assert_eq!(code, 1);
                assert_eq!(message, "(no message)");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn missing_status_code_is_a_decode_error() {
        let err = serde_json::from_str::<Envelope<String>>(r#"{"data": "x"}"#).unwrap_err();
        assert!(err.to_string().contains("statusCode"));
    }

    #[test]
    fn decode_page() {
        let json = r#"{
            "statusCode": 0,
            "message": null,
            "total": 2,
            "rows": ["a", "b"]
        }"#;
        let page: Page<String> = serde_json::from_str(json).unwrap();
        assert!(page.is_ok());
        assert_eq!(page.total, 2);
        assert_eq!(page.rows, vec!["a".to_owned(), "b".to_owned()]);
    }
}
