//! Redemption-check result model.

use serde::{Deserialize, Serialize};

/// Current status of a previously issued payment code.
///
/// The presence of [`Self::settled_amount`] is the sole signal that the
/// code has been redeemed; every other field is display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionResult {
    /// Card number of the paying account.
    #[serde(rename = "userCard")]
    pub card_number: String,
    /// Real name of the account holder.
    #[serde(rename = "realName")]
    pub real_name: String,
    /// Deal timestamp, as formatted by the server.
    #[serde(rename = "dealTime")]
    pub deal_time: String,
    /// Recognition flag reported by the terminal.
    #[serde(rename = "recflag")]
    pub recognition_flag: String,
    /// Payment type display name.
    #[serde(rename = "payTypeName")]
    pub payment_type_name: String,
    /// Settled amount as a decimal string; `None` while unredeemed.
    #[serde(rename = "monDealCur")]
    pub settled_amount: Option<String>,
}

impl RedemptionResult {
    /// Returns the settled amount if the code has been redeemed.
    #[inline]
    #[must_use]
    pub fn settled(&self) -> Option<&str> {
        self.settled_amount.as_deref()
    }
}
