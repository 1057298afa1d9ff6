//! Newtype wrapper for transaction serial numbers.

use serde::{Deserialize, Serialize};

/// A transaction's serial number.
///
/// Serials are issued by the remote system as numeric strings and grow
/// monotonically, which makes them the natural high-water-mark key for
/// detecting new transactions. The newtype prevents mixing them up with
/// other integers at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionSerial(i64);

impl TransactionSerial {
    /// Creates a new serial from the given value.
    #[inline]
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Consumes the wrapper and returns the inner value.
    #[inline]
    #[must_use]
    pub const fn into_inner(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for TransactionSerial {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for TransactionSerial {
    #[inline]
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl core::str::FromStr for TransactionSerial {
    type Err = core::num::ParseIntError;

    #[inline]
    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        s.parse::<i64>().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serials_order_numerically() {
        assert!(TransactionSerial::new(103) > TransactionSerial::new(99));
        assert_eq!(
            TransactionSerial::new(100).max(TransactionSerial::new(101)),
            TransactionSerial::new(101)
        );
    }

    #[test]
    fn parses_from_numeric_string() {
        let serial: TransactionSerial = "1024".parse().unwrap();
        assert_eq!(serial.into_inner(), 1024);
        assert!("12a".parse::<TransactionSerial>().is_err());
    }

    #[test]
    fn serde_is_transparent() {
        let serial = TransactionSerial::new(42);
        assert_eq!(serde_json::to_string(&serial).unwrap(), "42");
        let back: TransactionSerial = serde_json::from_str("42").unwrap();
        assert_eq!(back, serial);
    }
}
