//! Data models for the Xiaofubao API.
//!
//! Strongly-typed representations of the wire entities: the immutable
//! [`Session`], the verbatim [`Transaction`] record with its
//! [`TransactionSerial`] key, and the [`RedemptionResult`] that signals
//! settlement of a payment code.

mod redemption;
mod serial;
mod session;
mod transaction;

pub use redemption::RedemptionResult;
pub use serial::TransactionSerial;
pub use session::{Session, SessionToken};
pub use transaction::Transaction;
