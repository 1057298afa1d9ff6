//! Rust client library for the Xiaofubao campus-payment service.
//!
//! The crate brokers an authenticated session, retrieves the account
//! balance, issues time-boxed single-use payment codes and watches them
//! for settlement, and polls the transaction history to surface newly
//! posted transactions exactly once.
//!
//! The moving parts:
//!
//! - [`client::XfbClient`]: authenticated JSON-over-HTTPS calls with the
//!   service's envelope conventions and failure taxonomy.
//! - [`broker::Broker`]: one immutable session per refresh cycle, with
//!   balance, code issuance, redemption checks, and history queries.
//! - [`qr::QrLifecycle`]: the payment-code state machine (issue, tick,
//!   settle or expire, renew).
//! - [`watcher::FeedWatcher`]: high-water-mark detection of new
//!   transactions.
//! - [`scheduler::Coordinator`]: the foreground and background cadences,
//!   serialized against each other.
//! - [`auth::AuthFlow`]: the redirect-capture credential exchange.
//!
//! Rendering (views, QR images), notification delivery, cross-device
//! transport, and OS background-task registration are external
//! collaborators behind the narrow traits in [`notify`], [`sync`], and
//! [`storage`].

pub mod auth;
pub mod broker;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod models;
pub mod notify;
pub mod qr;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod sync;
pub mod watcher;
