//! Cross-currency payment flow engine for an XRPL-style ledger.
//!
//! Given a source account, a destination account, a desired delivered
//! amount, an optional spending cap, and an optional set of explicit paths,
//! this crate determines how value flows through a graph of trust lines
//! (bilateral credit relationships) and order books (offer queues),
//! producing a deterministic set of ledger mutations and a terminal
//! [`error::ResultCode`].
//!
//! The engine is a pure function of its inputs and the [`ledger::LedgerView`]
//! it is handed: it never performs I/O, never spawns, and never yields. See
//! [`flow::flow`] and [`payment::ripple_calculate`] for the two entry
//! points.

pub mod account;
pub mod amount;
pub mod config;
pub mod error;
pub mod flow;
pub mod ledger;
pub mod payment;
pub mod sandbox;
pub mod step;
pub mod strand;

pub use account::{AccountId, Currency, Issue};
pub use amount::{Amount, Quality};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult, ResultCode};
pub use flow::{flow, FlowResult};
pub use ledger::LedgerView;
pub use payment::{ripple_calculate, RippleCalculateParams, RippleCalculateResult};
