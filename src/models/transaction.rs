//! Transaction model.

use serde::{Deserialize, Serialize};

use super::TransactionSerial;

/// One posted transaction, exactly as the history feed returns it.
///
/// All monetary values are decimal strings; the record is immutable and
/// keyed by [`Transaction::serial`]. Field order and naming follow the
/// wire format, which mixes naming conventions, hence the explicit
/// renames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Posting timestamp, as formatted by the server.
    pub time: String,
    /// Deal timestamp, as formatted by the server.
    #[serde(rename = "dealtime")]
    pub deal_time: String,
    /// Merchant address (where the payment happened).
    pub address: String,
    /// Human-readable fee name.
    #[serde(rename = "feeName")]
    pub fee_name: String,
    /// Serial number as a numeric string; see [`Self::serial`].
    #[serde(rename = "serialno")]
    pub serial_no: String,
    /// Charged amount, decimal string.
    pub money: String,
    /// Merchant business name.
    #[serde(rename = "businessName")]
    pub business_name: String,
    /// Merchant business number.
    #[serde(rename = "businessNum")]
    pub business_num: String,
    /// Fee number.
    #[serde(rename = "feeNum")]
    pub fee_num: String,
    /// Account holder name.
    #[serde(rename = "accName")]
    pub account_name: String,
    /// Account number.
    #[serde(rename = "accNum")]
    pub account_num: String,
    /// Person code of the account holder.
    #[serde(rename = "perCode")]
    pub person_code: String,
    /// E-wallet identifier.
    #[serde(rename = "eWalletId")]
    pub e_wallet_id: String,
    /// Card balance before the transaction, decimal string.
    #[serde(rename = "monCard")]
    pub card_balance: String,
    /// Balance after the transaction, decimal string.
    #[serde(rename = "afterMon")]
    pub balance_after: String,
    /// Concession amount, decimal string.
    #[serde(rename = "concessionsMon")]
    pub concessions: String,
}

impl Transaction {
    /// Parses the numeric `serialno` string into a typed serial.
    ///
    /// Returns `None` when the server sends a non-numeric serial; such
    /// records cannot participate in high-water-mark tracking.
    #[inline]
    #[must_use]
    pub fn serial(&self) -> Option<TransactionSerial> {
        self.serial_no.parse().ok()
    }

    /// One-line summary used as a notification body.
    #[must_use]
    pub fn short_description(&self) -> String {
        format!(
            "{} at {}: {}, balance {}",
            self.fee_name,
            self.address,
            format_amount(&self.money),
            format_amount(&self.balance_after)
        )
    }
}

/// Renders a decimal-string amount as currency, falling back to the raw
/// string when it does not parse.
fn format_amount(raw: &str) -> String {
    raw.parse::<f64>()
        .map_or_else(|_| raw.to_owned(), |value| format!("\u{a5}{value:.2}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A record as the history endpoint returns it.
    fn sample_json() -> &'static str {
        r#"{
            "type": "CONSUME",
            "time": "2025-05-08 12:01:30",
            "dealtime": "2025-05-08 12:01:28",
            "address": "No.2 Dining Hall",
            "feeName": "Meal",
            "serialno": "103",
            "money": "12.5",
            "businessName": "Campus Catering",
            "businessNum": "0017",
            "feeNum": "301",
            "accName": "Zhang San",
            "accNum": "20250001",
            "perCode": "8811",
            "eWalletId": "77001",
            "monCard": "100.90",
            "afterMon": "88.40",
            "concessionsMon": "0.00"
        }"#
    }

    #[test]
    fn deserialize_wire_record() {
        let tx: Transaction = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(tx.kind, "CONSUME");
        assert_eq!(tx.fee_name, "Meal");
        assert_eq!(tx.serial_no, "103");
        assert_eq!(tx.balance_after, "88.40");
    }

    #[test]
    fn serial_parses_numeric_string() {
        let tx: Transaction = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(tx.serial(), Some(TransactionSerial::new(103)));
    }

    #[test]
    fn serial_is_none_for_garbage() {
        let mut tx: Transaction = serde_json::from_str(sample_json()).unwrap();
        tx.serial_no = "n/a".to_owned();
        assert_eq!(tx.serial(), None);
    }

    #[test]
    fn short_description_formats_amounts() {
        let tx: Transaction = serde_json::from_str(sample_json()).unwrap();
        let description = tx.short_description();
        assert_eq!(
            description,
            "Meal at No.2 Dining Hall: \u{a5}12.50, balance \u{a5}88.40"
        );
    }

    #[test]
    fn short_description_keeps_unparsable_amounts_verbatim() {
        let mut tx: Transaction = serde_json::from_str(sample_json()).unwrap();
        tx.money = "- - -".to_owned();
        assert!(tx.short_description().contains("- - -"));
    }

    #[test]
    fn serialize_roundtrip() {
        let tx: Transaction = serde_json::from_str(sample_json()).unwrap();
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
    }
}
