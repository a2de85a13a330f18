//! Shared expense ledger: split validation, group balances and settlement
//! suggestions, served over HTTP.
//!
//! The engine modules (`money`, `split`, `balance`, `exchange`) are pure and
//! synchronous; `repository`, `service` and `routes` form the boundary that
//! stores expenses and serializes writes per group.

pub mod balance;
pub mod config;
pub mod error;
pub mod exchange;
pub mod money;
pub mod repository;
pub mod routes;
pub mod schemas;
pub mod service;
pub mod split;
pub mod telemetry;

pub use balance::{compute_balances, unpaid_total, Balance, BalanceSheet};
pub use error::{ServiceError, SettlementError, StorageError, ValidationError};
pub use exchange::{settle, settle_with_unpaid, Settlement};
pub use money::{Money, EPSILON};
pub use split::SplitValidator;
