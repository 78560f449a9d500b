//! # QMJ Warehouse
//!
//! DuckDB persistence for the `qmj-core` data model.
//!
//! ## Overview
//!
//! The warehouse maps companies, securities, price histories and fundamental
//! snapshots onto a normalized relational schema and back. Ownership follows
//! the domain model:
//!
//! - a company owns its securities (deleting a company is *restricted* while
//!   securities remain);
//! - a security owns its prices and snapshots (deleting it *cascades*);
//! - a snapshot owns exactly one income statement, balance sheet and cash flow
//!   statement (all written and deleted together).
//!
//! Every multi-row write runs in one transaction that is rolled back on any
//! error. Loads never fail because of one bad child row: such rows are
//! returned as [`RejectedRecord`]s next to the records that did map.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use qmj_core::{Company, Security};
//! use qmj_warehouse::Warehouse;
//! use time::macros::date;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!
//!     let company = Company::new("Apple Inc.", "0000320193", "3571")?
//!         .with_security(Security::new("AAPL", "", date!(1980 - 12 - 12), "us")?);
//!     let company_id = warehouse.insert_company(&company)?;
//!
//!     let loaded = warehouse.load_company(company_id)?.expect("just inserted");
//!     assert_eq!(loaded.company.securities[0].ticker(), "AAPL");
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `company` | Company identity |
//! | `security` | Securities, unique by ticker, with optional stock listing |
//! | `price` | OHLCV observations per security |
//! | `fundamental_snapshot` | Report date and fiscal period per security |
//! | `income_statement` | One row per snapshot |
//! | `balance_sheet` | One row per snapshot |
//! | `cash_flow_statement` | One row per snapshot |

pub mod duckdb;
pub mod mapping;
pub mod migrations;

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{params, Connection, ToSql};
use qmj_core::{
    format_date, BalanceSheet, CashFlowStatement, Company, FundamentalSnapshot, IncomeStatement,
    Price, PriceHistory, Security, UtcDateTime, ValidationError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::duckdb::{DatabaseLocation, DuckDbConnectionManager, PooledConnection};
pub use crate::mapping::{RowError, StatementTable};
pub use crate::migrations::TABLES;

use crate::mapping::{
    insert_statement, read_statement, PriceRow, SecurityParams, SecurityRow, SnapshotRow,
    INSERT_SECURITY, PRICE_COLUMNS, SECURITY_COLUMNS, SNAPSHOT_COLUMNS,
};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A value failed domain validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("ticker '{ticker}' already exists")]
    DuplicateTicker { ticker: String },

    #[error("company {0} not found")]
    CompanyNotFound(CompanyId),

    #[error("security {0} not found")]
    SecurityNotFound(SecurityId),

    /// Company deletes are restricted while the company owns securities.
    #[error("company {company_id} still owns {securities} securities; delete them first")]
    CompanyHasSecurities {
        company_id: CompanyId,
        securities: u64,
    },

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// A stored row that a single-entity load cannot map.
    #[error("invalid {table} row {id}: {reason}")]
    InvalidRow {
        table: &'static str,
        id: i64,
        reason: String,
    },
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for qmj data.
    pub qmj_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let qmj_home = resolve_qmj_home();
        let db_path = qmj_home.join("warehouse.duckdb");
        Self {
            qmj_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl WarehouseConfig {
    /// Default configuration with the database file moved to `db_path`.
    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }
}

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id! {
    /// Surrogate key of a `company` row.
    CompanyId
}
row_id! {
    /// Surrogate key of a `security` row.
    SecurityId
}
row_id! {
    /// Surrogate key of a `fundamental_snapshot` row.
    SnapshotId
}

/// A stored row skipped during a load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    pub table: &'static str,
    pub id: i64,
    /// Ticker of the owning security, when known.
    pub ticker: Option<String>,
    pub report_date: Option<String>,
    pub reason: String,
}

impl RejectedRecord {
    fn new(
        table: &'static str,
        id: i64,
        ticker: Option<String>,
        report_date: Option<String>,
        reason: String,
    ) -> Self {
        tracing::warn!(
            table,
            id,
            ticker = ticker.as_deref().unwrap_or(""),
            report_date = report_date.as_deref().unwrap_or(""),
            reason = reason.as_str(),
            "rejected stored row"
        );
        Self {
            table,
            id,
            ticker,
            report_date,
            reason,
        }
    }
}

/// Records that mapped cleanly plus the rows that did not.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport<T> {
    pub records: Vec<T>,
    pub rejected: Vec<RejectedRecord>,
}

impl<T> Default for LoadReport<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> LoadReport<T> {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// A snapshot together with its row id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSnapshot {
    pub id: SnapshotId,
    pub snapshot: FundamentalSnapshot,
}

/// A security loaded with its prices and fundamentals.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityLoad {
    pub id: SecurityId,
    pub company_id: CompanyId,
    pub security: Security,
    /// Row ids of `security.fundamentals`, index for index.
    pub snapshot_ids: Vec<SnapshotId>,
    pub rejected: Vec<RejectedRecord>,
}

/// A company loaded with every security that mapped cleanly.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyLoad {
    pub id: CompanyId,
    pub company: Company,
    /// Row ids of `company.securities`, index for index.
    pub security_ids: Vec<SecurityId>,
    pub rejected: Vec<RejectedRecord>,
}

/// Rows removed by a cascading security delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub security_id: SecurityId,
    pub ticker: String,
    pub prices: usize,
    pub snapshots: usize,
    pub statements: usize,
}

/// Column metadata for schema description.
#[derive(Debug, Clone, Serialize)]
pub struct SqlColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub r#type: String,
}

/// One schema table and its columns in declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<SqlColumn>,
}

/// The main warehouse interface for the qmj data model.
#[derive(Clone)]
pub struct Warehouse {
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::open(
            DatabaseLocation::File(config.db_path.clone()),
            config.max_pool_size,
        )?;
        let warehouse = Self { manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Open a private in-memory warehouse.
    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        let manager = DuckDbConnectionManager::open(DatabaseLocation::InMemory, 1)?;
        let warehouse = Self { manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Apply pending migrations, returning the versions applied.
    pub fn initialize(&self) -> Result<Vec<&'static str>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let applied = migrations::apply_migrations(&connection)?;
        tracing::debug!(
            location = %self.manager.location(),
            applied = applied.len(),
            "warehouse initialized"
        );
        Ok(applied)
    }

    /// Path to the database file, `None` for in-memory warehouses.
    pub fn db_path(&self) -> Option<&Path> {
        self.manager.db_path()
    }

    /// Applied schema versions, oldest first.
    pub fn schema_versions(&self) -> Result<Vec<String>, WarehouseError> {
        let connection = self.manager.acquire()?;
        Ok(migrations::applied_versions(&connection)?)
    }

    /// Every schema table with its columns.
    pub fn schema(&self) -> Result<Vec<TableSchema>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT column_name, data_type FROM information_schema.columns \
             WHERE table_name = ? ORDER BY ordinal_position",
        )?;

        let mut tables = Vec::with_capacity(TABLES.len());
        for table in TABLES {
            let columns = statement
                .query_map(params![table], |row| {
                    Ok(SqlColumn {
                        name: row.get(0)?,
                        r#type: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            tables.push(TableSchema {
                name: (*table).to_owned(),
                columns,
            });
        }
        Ok(tables)
    }

    /// Row count of one schema table.
    pub fn table_row_count(&self, table: &str) -> Result<u64, WarehouseError> {
        let Some(table) = TABLES.iter().find(|known| **known == table) else {
            return Err(WarehouseError::UnknownTable(table.to_owned()));
        };

        let connection = self.manager.acquire()?;
        let count: i64 =
            connection.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Insert a company with every security, price and snapshot it owns.
    ///
    /// Nothing is written unless the whole graph is.
    pub fn insert_company(&self, company: &Company) -> Result<CompanyId, WarehouseError> {
        let id = self.in_transaction(|connection| write_company(connection, company))?;
        tracing::debug!(
            company_id = id.0,
            cik = company.cik.as_str(),
            securities = company.securities.len(),
            "inserted company"
        );
        Ok(id)
    }

    /// Insert a security under an existing company, with its prices and snapshots.
    pub fn insert_security(
        &self,
        company_id: CompanyId,
        security: &Security,
    ) -> Result<SecurityId, WarehouseError> {
        let id = self.in_transaction(|connection| {
            ensure_company_exists(connection, company_id)?;
            write_security(connection, company_id, security)
        })?;
        tracing::debug!(
            security_id = id.0,
            company_id = company_id.0,
            ticker = security.ticker(),
            "inserted security"
        );
        Ok(id)
    }

    /// Append prices to a security in the given order.
    pub fn insert_prices(
        &self,
        security_id: SecurityId,
        prices: &[Price],
    ) -> Result<usize, WarehouseError> {
        let written = self.in_transaction(|connection| {
            ensure_security_exists(connection, security_id)?;
            write_prices(connection, security_id, prices)
        })?;
        tracing::debug!(security_id = security_id.0, written, "inserted prices");
        Ok(written)
    }

    /// Insert a snapshot and its three statements atomically.
    pub fn insert_snapshot(
        &self,
        security_id: SecurityId,
        snapshot: &FundamentalSnapshot,
    ) -> Result<SnapshotId, WarehouseError> {
        let id = self.in_transaction(|connection| {
            ensure_security_exists(connection, security_id)?;
            write_snapshot(connection, security_id, snapshot)
        })?;
        tracing::debug!(
            snapshot_id = id.0,
            security_id = security_id.0,
            fiscal_period = %snapshot.fiscal_period,
            "inserted snapshot"
        );
        Ok(id)
    }

    pub fn find_security_id(&self, ticker: &str) -> Result<Option<SecurityId>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare("SELECT id FROM security WHERE ticker = ?")?;
        let mut ids = statement.query_map(params![ticker], |row| row.get::<_, i64>(0))?;
        match ids.next() {
            Some(id) => Ok(Some(SecurityId(id?))),
            None => Ok(None),
        }
    }

    /// Load a company and the full graph beneath it.
    ///
    /// Securities, prices or snapshots that cannot be mapped are skipped and
    /// reported in [`CompanyLoad::rejected`]. A company row that fails
    /// validation is an [`WarehouseError::InvalidRow`].
    pub fn load_company(&self, id: CompanyId) -> Result<Option<CompanyLoad>, WarehouseError> {
        self.in_transaction(|connection| {
            let company_row = {
                let mut statement = connection
                    .prepare("SELECT company_name, cik, sic FROM company WHERE id = ?")?;
                let mut rows = statement.query_map(params![id.0], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?;
                rows.next().transpose()?
            };
            let Some((company_name, cik, sic)) = company_row else {
                return Ok(None);
            };
            let mut company =
                Company::new(company_name, cik, sic).map_err(|err| WarehouseError::InvalidRow {
                    table: "company",
                    id: id.0,
                    reason: err.to_string(),
                })?;

            let mut security_ids = Vec::new();
            let mut rejected = Vec::new();
            for row in read_security_rows(connection, "company_id", id.0)? {
                let security = match row.to_security() {
                    Ok(security) => security,
                    Err(err) => {
                        rejected.push(RejectedRecord::new(
                            "security",
                            row.id,
                            Some(row.ticker.clone()),
                            None,
                            err.to_string(),
                        ));
                        continue;
                    }
                };
                let graph = read_security_graph(connection, SecurityId(row.id), security)?;
                company.add_security(graph.security);
                security_ids.push(SecurityId(row.id));
                rejected.extend(graph.rejected);
            }

            tracing::debug!(
                company_id = id.0,
                securities = security_ids.len(),
                rejected = rejected.len(),
                "loaded company"
            );
            Ok(Some(CompanyLoad {
                id,
                company,
                security_ids,
                rejected,
            }))
        })
    }

    /// Load one security with its prices and snapshots.
    pub fn load_security(&self, id: SecurityId) -> Result<Option<SecurityLoad>, WarehouseError> {
        self.in_transaction(|connection| {
            let Some(row) = read_security_rows(connection, "id", id.0)?.into_iter().next() else {
                return Ok(None);
            };
            let security = row
                .to_security()
                .map_err(|err| WarehouseError::InvalidRow {
                    table: "security",
                    id: row.id,
                    reason: err.to_string(),
                })?;

            let graph = read_security_graph(connection, id, security)?;
            tracing::debug!(
                security_id = id.0,
                prices = graph.security.prices.len(),
                snapshots = graph.snapshot_ids.len(),
                rejected = graph.rejected.len(),
                "loaded security"
            );
            Ok(Some(SecurityLoad {
                id,
                company_id: CompanyId(row.company_id),
                security: graph.security,
                snapshot_ids: graph.snapshot_ids,
                rejected: graph.rejected,
            }))
        })
    }

    /// Prices of a security ordered by timestamp, then insertion.
    pub fn load_prices(&self, security_id: SecurityId) -> Result<PriceHistory, WarehouseError> {
        let connection = self.manager.acquire()?;
        ensure_security_exists(&connection, security_id)?;
        read_prices(&connection, security_id)
    }

    /// Snapshots of a security ordered by report date, then insertion.
    ///
    /// A snapshot with an out-of-range fiscal period or a missing statement
    /// is rejected on its own; the others still load.
    pub fn load_snapshots(
        &self,
        security_id: SecurityId,
    ) -> Result<LoadReport<StoredSnapshot>, WarehouseError> {
        self.in_transaction(|connection| {
            let ticker = security_ticker(connection, security_id)?
                .ok_or(WarehouseError::SecurityNotFound(security_id))?;
            read_snapshots(connection, security_id, &ticker)
        })
    }

    /// Update activity and delisting time.
    ///
    /// The only in-place update; identity columns are never rewritten.
    pub fn update_security_status(
        &self,
        id: SecurityId,
        is_active: bool,
        delisted_utc: Option<UtcDateTime>,
    ) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        let delisted_utc = delisted_utc.map(UtcDateTime::format_sql);
        let updated = connection.execute(
            "UPDATE security SET is_active = ?, delisted_utc = CAST(? AS TIMESTAMP) WHERE id = ?",
            params![is_active, delisted_utc, id.0],
        )?;
        if updated == 0 {
            return Err(WarehouseError::SecurityNotFound(id));
        }
        tracing::debug!(security_id = id.0, is_active, "updated security status");
        Ok(())
    }

    /// Delete a snapshot and its three statements. Returns whether it existed.
    pub fn delete_snapshot(&self, id: SnapshotId) -> Result<bool, WarehouseError> {
        let deleted = self.in_transaction(|connection| {
            for table in [
                IncomeStatement::TABLE,
                BalanceSheet::TABLE,
                CashFlowStatement::TABLE,
            ] {
                connection.execute(
                    &format!("DELETE FROM {table} WHERE snapshot_id = ?"),
                    params![id.0],
                )?;
            }
            let removed = connection.execute(
                "DELETE FROM fundamental_snapshot WHERE id = ?",
                params![id.0],
            )?;
            Ok(removed > 0)
        })?;
        tracing::debug!(snapshot_id = id.0, deleted, "deleted snapshot");
        Ok(deleted)
    }

    /// Delete a security with everything it owns, in one transaction.
    pub fn delete_security(&self, id: SecurityId) -> Result<CascadeReport, WarehouseError> {
        let report = self.in_transaction(|connection| {
            let ticker =
                security_ticker(connection, id)?.ok_or(WarehouseError::SecurityNotFound(id))?;

            let mut statements = 0;
            for table in [
                IncomeStatement::TABLE,
                BalanceSheet::TABLE,
                CashFlowStatement::TABLE,
            ] {
                statements += connection.execute(
                    &format!(
                        "DELETE FROM {table} WHERE snapshot_id IN \
                         (SELECT id FROM fundamental_snapshot WHERE security_id = ?)"
                    ),
                    params![id.0],
                )?;
            }
            let snapshots = connection.execute(
                "DELETE FROM fundamental_snapshot WHERE security_id = ?",
                params![id.0],
            )?;
            let prices =
                connection.execute("DELETE FROM price WHERE security_id = ?", params![id.0])?;
            connection.execute("DELETE FROM security WHERE id = ?", params![id.0])?;

            Ok(CascadeReport {
                security_id: id,
                ticker,
                prices,
                snapshots,
                statements,
            })
        })?;

        tracing::info!(
            security_id = id.0,
            ticker = report.ticker.as_str(),
            prices = report.prices,
            snapshots = report.snapshots,
            statements = report.statements,
            "deleted security"
        );
        Ok(report)
    }

    /// Delete a company that no longer owns any securities.
    pub fn delete_company(&self, id: CompanyId) -> Result<(), WarehouseError> {
        self.in_transaction(|connection| {
            ensure_company_exists(connection, id)?;
            let securities: i64 = connection.query_row(
                "SELECT COUNT(*) FROM security WHERE company_id = ?",
                params![id.0],
                |row| row.get(0),
            )?;
            if securities > 0 {
                return Err(WarehouseError::CompanyHasSecurities {
                    company_id: id,
                    securities: u64::try_from(securities).unwrap_or_default(),
                });
            }
            connection.execute("DELETE FROM company WHERE id = ?", params![id.0])?;
            Ok(())
        })?;
        tracing::info!(company_id = id.0, "deleted company");
        Ok(())
    }

    /// Run `work` inside one transaction on a pooled connection.
    fn in_transaction<T>(
        &self,
        work: impl FnOnce(&Connection) -> Result<T, WarehouseError>,
    ) -> Result<T, WarehouseError> {
        let connection = self.manager.acquire()?;
        let connection: &Connection = &connection;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = work(connection);
        finalize_transaction(connection, result)
    }
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn next_id(connection: &Connection, sequence: &str) -> Result<i64, WarehouseError> {
    Ok(connection.query_row(&format!("SELECT nextval('{sequence}')"), [], |row| {
        row.get(0)
    })?)
}

fn ensure_company_exists(connection: &Connection, id: CompanyId) -> Result<(), WarehouseError> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM company WHERE id = ?",
        params![id.0],
        |row| row.get(0),
    )?;
    if count == 0 {
        return Err(WarehouseError::CompanyNotFound(id));
    }
    Ok(())
}

fn ensure_security_exists(connection: &Connection, id: SecurityId) -> Result<(), WarehouseError> {
    match security_ticker(connection, id)? {
        Some(_) => Ok(()),
        None => Err(WarehouseError::SecurityNotFound(id)),
    }
}

fn security_ticker(
    connection: &Connection,
    id: SecurityId,
) -> Result<Option<String>, WarehouseError> {
    let mut statement = connection.prepare("SELECT ticker FROM security WHERE id = ?")?;
    let mut tickers = statement.query_map(params![id.0], |row| row.get::<_, String>(0))?;
    match tickers.next() {
        Some(ticker) => Ok(Some(ticker?)),
        None => Ok(None),
    }
}

fn write_company(connection: &Connection, company: &Company) -> Result<CompanyId, WarehouseError> {
    let id = CompanyId(next_id(connection, "seq_company")?);
    connection.execute(
        "INSERT INTO company (id, company_name, cik, sic) VALUES (?, ?, ?, ?)",
        params![id.0, company.company_name, company.cik, company.sic],
    )?;

    for security in &company.securities {
        write_security(connection, id, security)?;
    }
    Ok(id)
}

fn write_security(
    connection: &Connection,
    company_id: CompanyId,
    security: &Security,
) -> Result<SecurityId, WarehouseError> {
    let existing: i64 = connection.query_row(
        "SELECT COUNT(*) FROM security WHERE ticker = ?",
        params![security.ticker()],
        |row| row.get(0),
    )?;
    if existing > 0 {
        return Err(WarehouseError::DuplicateTicker {
            ticker: security.ticker().to_owned(),
        });
    }

    let id = SecurityId(next_id(connection, "seq_security")?);
    let row = SecurityParams::from_security(security);
    let params: [&dyn ToSql; 12] = [
        &id.0,
        &company_id.0,
        &row.ticker_root,
        &row.ticker_suffix,
        &row.ticker,
        &row.is_active,
        &row.list_date,
        &row.delisted_utc,
        &row.locale,
        &row.security_kind,
        &row.exchange,
        &row.currency,
    ];
    connection.execute(INSERT_SECURITY, params.as_slice())?;

    write_prices(connection, id, security.prices.as_slice())?;
    for snapshot in &security.fundamentals {
        write_snapshot(connection, id, snapshot)?;
    }
    Ok(id)
}

fn write_prices(
    connection: &Connection,
    security_id: SecurityId,
    prices: &[Price],
) -> Result<usize, WarehouseError> {
    if prices.is_empty() {
        return Ok(0);
    }

    let mut statement = connection.prepare(
        "INSERT INTO price (security_id, ts, open, high, low, close, volume) \
         VALUES (?, CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?)",
    )?;
    for price in prices {
        let ts = price.timestamp.format_sql();
        let params: [&dyn ToSql; 7] = [
            &security_id.0,
            &ts,
            &price.open,
            &price.high,
            &price.low,
            &price.close,
            &price.volume,
        ];
        statement.execute(params.as_slice())?;
    }
    Ok(prices.len())
}

fn write_snapshot(
    connection: &Connection,
    security_id: SecurityId,
    snapshot: &FundamentalSnapshot,
) -> Result<SnapshotId, WarehouseError> {
    let id = SnapshotId(next_id(connection, "seq_fundamental_snapshot")?);
    connection.execute(
        "INSERT INTO fundamental_snapshot (id, security_id, report_date, fiscal_period) \
         VALUES (?, ?, CAST(? AS DATE), ?)",
        params![
            id.0,
            security_id.0,
            format_date(snapshot.report_date),
            snapshot.fiscal_period.as_i32()
        ],
    )?;

    insert_statement(connection, id.0, &snapshot.income_statement)?;
    insert_statement(connection, id.0, &snapshot.balance_sheet)?;
    insert_statement(connection, id.0, &snapshot.cash_flow_statement)?;
    Ok(id)
}

/// `column` is one of the fixed key columns of `security`.
fn read_security_rows(
    connection: &Connection,
    column: &'static str,
    value: i64,
) -> Result<Vec<SecurityRow>, WarehouseError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {SECURITY_COLUMNS} FROM security WHERE {column} = ? ORDER BY id"
    ))?;
    let rows = statement
        .query_map(params![value], SecurityRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

struct SecurityGraph {
    security: Security,
    snapshot_ids: Vec<SnapshotId>,
    rejected: Vec<RejectedRecord>,
}

fn read_security_graph(
    connection: &Connection,
    id: SecurityId,
    security: Security,
) -> Result<SecurityGraph, WarehouseError> {
    let prices = read_prices(connection, id)?;
    let snapshots = read_snapshots(connection, id, security.ticker())?;

    let (snapshot_ids, fundamentals): (Vec<SnapshotId>, Vec<FundamentalSnapshot>) = snapshots
        .records
        .into_iter()
        .map(|stored| (stored.id, stored.snapshot))
        .unzip();

    Ok(SecurityGraph {
        security: security.with_prices(prices).with_fundamentals(fundamentals),
        snapshot_ids,
        rejected: snapshots.rejected,
    })
}

fn read_prices(
    connection: &Connection,
    security_id: SecurityId,
) -> Result<PriceHistory, WarehouseError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {PRICE_COLUMNS} FROM price WHERE security_id = ? ORDER BY ts, id"
    ))?;
    let rows = statement
        .query_map(params![security_id.0], PriceRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.iter()
        .map(|row| {
            row.to_price().map_err(|err| WarehouseError::InvalidRow {
                table: "price",
                id: row.id,
                reason: err.to_string(),
            })
        })
        .collect()
}

fn read_snapshots(
    connection: &Connection,
    security_id: SecurityId,
    ticker: &str,
) -> Result<LoadReport<StoredSnapshot>, WarehouseError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM fundamental_snapshot \
         WHERE security_id = ? ORDER BY report_date, id"
    ))?;
    let rows = statement
        .query_map(params![security_id.0], SnapshotRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut report = LoadReport::default();
    for row in rows {
        match read_snapshot(connection, &row) {
            Ok(snapshot) => report.records.push(StoredSnapshot {
                id: SnapshotId(row.id),
                snapshot,
            }),
            Err(WarehouseError::Validation(err)) => report.rejected.push(RejectedRecord::new(
                "fundamental_snapshot",
                row.id,
                Some(ticker.to_owned()),
                Some(row.report_date.clone()),
                err.to_string(),
            )),
            Err(err) => return Err(err),
        }
    }
    Ok(report)
}

fn read_snapshot(
    connection: &Connection,
    row: &SnapshotRow,
) -> Result<FundamentalSnapshot, WarehouseError> {
    let fiscal_period = row.fiscal_period()?;
    let report_date = qmj_core::parse_date(&row.report_date)?;

    let mut builder = FundamentalSnapshot::builder(report_date, fiscal_period);
    if let Some(statement) = read_statement::<IncomeStatement>(connection, row.id)? {
        builder = builder.income_statement(statement);
    }
    if let Some(statement) = read_statement::<BalanceSheet>(connection, row.id)? {
        builder = builder.balance_sheet(statement);
    }
    if let Some(statement) = read_statement::<CashFlowStatement>(connection, row.id)? {
        builder = builder.cash_flow_statement(statement);
    }
    Ok(builder.build()?)
}

/// Resolve the qmj home directory from environment or default.
fn resolve_qmj_home() -> PathBuf {
    if let Some(path) = env::var_os("QMJ_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".qmj");
    }

    PathBuf::from(".qmj")
}
