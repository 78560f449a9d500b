//! # Domain Models
//!
//! In-memory types for securities, price histories and fundamentals.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Company`] | Issuer grouping one or more securities |
//! | [`Security`] | Tradable instrument with a derived ticker |
//! | [`SecurityKind`] | Generic security or exchange-listed stock |
//! | [`Price`] | One OHLCV observation |
//! | [`PriceHistory`] | Insertion-ordered prices for one security |
//! | [`FundamentalSnapshot`] | Statements reported for one fiscal period |
//! | [`FiscalPeriod`] | Fiscal quarter, Q1 through Q4 |
//! | [`IncomeStatement`], [`BalanceSheet`], [`CashFlowStatement`] | Named line items, zero by default |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Identity is checked at construction; line items are never validated.

mod company;
mod fundamentals;
mod price;
mod security;
mod statements;
mod timestamp;

pub use company::Company;
pub use fundamentals::{FiscalPeriod, FundamentalSnapshot, SnapshotBuilder};
pub use price::{Price, PriceHistory};
pub use security::{Security, SecurityKind, StockListing};
pub use statements::{BalanceSheet, CashFlowStatement, IncomeStatement, LineItems};
pub use timestamp::{format_date, parse_date, UtcDateTime};
