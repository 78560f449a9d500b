//! # QMJ Core
//!
//! Domain model for the Quality Minus Junk toolkit: companies, the
//! securities they issue, price histories, and quarterly fundamental
//! statements.
//!
//! The types here are plain data. Persistence lives in `qmj-warehouse`,
//! which maps these types onto relational rows.
//!
//! ## Quick Start
//!
//! ```rust
//! use qmj_core::{Company, FiscalPeriod, FundamentalSnapshot, Security};
//! use time::macros::date;
//!
//! # fn main() -> Result<(), qmj_core::ValidationError> {
//! let snapshot = FundamentalSnapshot::zeroed(date!(2024 - 06 - 30), FiscalPeriod::Q2);
//! let security = Security::new("AAP", "L", date!(1980 - 12 - 12), "us")?
//!     .with_fundamentals(vec![snapshot]);
//! assert_eq!(security.ticker(), "AAPL");
//!
//! let company = Company::new("Apple Inc.", "0000320193", "3571")?.with_security(security);
//! assert_eq!(company.fundamentals().count(), 1);
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod error;
pub mod logging;

pub use domain::{
    format_date, parse_date, BalanceSheet, CashFlowStatement, Company, FiscalPeriod,
    FundamentalSnapshot, IncomeStatement, LineItems, Price, PriceHistory, Security, SecurityKind,
    SnapshotBuilder, StockListing, UtcDateTime,
};
pub use error::{CoreError, ValidationError};
pub use logging::{init_logging, init_logging_from_env, LogConfig, LogFormat};
