//! Row mapping between the relational schema and `qmj-core` types.
//!
//! Rows are first read into plain structs holding raw column values, then
//! converted to domain types outside the `DuckDB` row callback so that a bad
//! row can be rejected without aborting the rest of a load.

use ::duckdb::{params, Connection, Row, ToSql};
use qmj_core::{
    parse_date, BalanceSheet, CashFlowStatement, FiscalPeriod, IncomeStatement, LineItems, Price,
    Security, SecurityKind, StockListing, UtcDateTime, ValidationError,
};
use thiserror::Error;

use crate::WarehouseError;

/// A statement type persisted in its own table, one row per snapshot.
pub trait StatementTable: LineItems {
    const TABLE: &'static str;
}

impl StatementTable for IncomeStatement {
    const TABLE: &'static str = "income_statement";
}

impl StatementTable for BalanceSheet {
    const TABLE: &'static str = "balance_sheet";
}

impl StatementTable for CashFlowStatement {
    const TABLE: &'static str = "cash_flow_statement";
}

/// `CREATE TABLE` for a statement table, with one `DOUBLE` column per line item.
pub fn statement_ddl<S: StatementTable>() -> String {
    let mut ddl = format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    \
         id BIGINT PRIMARY KEY DEFAULT nextval('seq_{table}'),\n    \
         snapshot_id BIGINT NOT NULL UNIQUE",
        table = S::TABLE
    );
    for field in S::FIELDS {
        ddl.push_str(",\n    ");
        ddl.push_str(field);
        ddl.push_str(" DOUBLE NOT NULL DEFAULT 0.0");
    }
    ddl.push_str("\n);\n");
    ddl
}

pub(crate) fn insert_statement<S: StatementTable>(
    connection: &Connection,
    snapshot_id: i64,
    statement: &S,
) -> Result<(), WarehouseError> {
    let values = statement.values();
    let placeholders = vec!["?"; S::FIELDS.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} (snapshot_id, {}) VALUES (?, {})",
        S::TABLE,
        S::FIELDS.join(", "),
        placeholders
    );

    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(values.len() + 1);
    params.push(&snapshot_id);
    params.extend(values.iter().map(|value| value as &dyn ToSql));
    connection.execute(sql.as_str(), params.as_slice())?;
    Ok(())
}

/// Read the statement attached to `snapshot_id`, if present.
pub(crate) fn read_statement<S: StatementTable>(
    connection: &Connection,
    snapshot_id: i64,
) -> Result<Option<S>, WarehouseError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE snapshot_id = ?",
        S::FIELDS.join(", "),
        S::TABLE
    );
    let mut statement = connection.prepare(sql.as_str())?;
    let mut rows = statement.query_map(params![snapshot_id], |row| {
        (0..S::FIELDS.len())
            .map(|index| row.get::<_, f64>(index))
            .collect::<Result<Vec<f64>, _>>()
    })?;

    match rows.next() {
        Some(values) => Ok(Some(S::from_values(&values?)?)),
        None => Ok(None),
    }
}

/// Why a stored row could not be turned into a domain value.
#[derive(Debug, Error)]
pub enum RowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("unknown security kind '{0}'")]
    UnknownSecurityKind(String),
}

pub(crate) const SECURITY_COLUMNS: &str = "id, company_id, ticker_root, ticker_suffix, ticker, \
     is_active, CAST(list_date AS VARCHAR), \
     strftime(delisted_utc, '%Y-%m-%dT%H:%M:%S.%fZ'), \
     locale, security_kind, exchange, currency";

/// Raw `security` row.
#[derive(Debug, Clone)]
pub(crate) struct SecurityRow {
    pub id: i64,
    pub company_id: i64,
    pub ticker_root: String,
    pub ticker_suffix: String,
    pub ticker: String,
    pub is_active: bool,
    pub list_date: String,
    pub delisted_utc: Option<String>,
    pub locale: String,
    pub security_kind: String,
    pub exchange: Option<String>,
    pub currency: Option<String>,
}

impl SecurityRow {
    pub fn from_row(row: &Row<'_>) -> Result<Self, ::duckdb::Error> {
        Ok(Self {
            id: row.get(0)?,
            company_id: row.get(1)?,
            ticker_root: row.get(2)?,
            ticker_suffix: row.get(3)?,
            ticker: row.get(4)?,
            is_active: row.get(5)?,
            list_date: row.get(6)?,
            delisted_utc: row.get(7)?,
            locale: row.get(8)?,
            security_kind: row.get(9)?,
            exchange: row.get(10)?,
            currency: row.get(11)?,
        })
    }

    /// Rebuild the security without prices or fundamentals.
    ///
    /// The ticker is re-derived from root and suffix; a stored ticker that
    /// disagrees is rejected.
    pub fn to_security(&self) -> Result<Security, RowError> {
        let list_date = parse_date(&self.list_date)?;
        let security = Security::new(
            self.ticker_root.as_str(),
            self.ticker_suffix.as_str(),
            list_date,
            self.locale.as_str(),
        )?;
        if security.ticker() != self.ticker {
            return Err(ValidationError::TickerMismatch {
                supplied: self.ticker.clone(),
                derived: security.ticker().to_owned(),
            }
            .into());
        }

        let delisted_utc = self
            .delisted_utc
            .as_deref()
            .map(UtcDateTime::parse)
            .transpose()?;
        let kind = match self.security_kind.as_str() {
            "generic" => SecurityKind::Generic,
            "stock" => SecurityKind::Stock(StockListing::new(
                self.exchange.clone(),
                self.currency.clone(),
            )),
            other => return Err(RowError::UnknownSecurityKind(other.to_owned())),
        };

        Ok(security
            .with_active(self.is_active)
            .with_delisted_utc(delisted_utc)
            .with_kind(kind))
    }
}

/// Values bound for a `security` insert, in [`INSERT_SECURITY`] order after `id` and `company_id`.
pub(crate) struct SecurityParams {
    pub ticker_root: String,
    pub ticker_suffix: String,
    pub ticker: String,
    pub is_active: bool,
    pub list_date: String,
    pub delisted_utc: Option<String>,
    pub locale: String,
    pub security_kind: &'static str,
    pub exchange: Option<String>,
    pub currency: Option<String>,
}

impl SecurityParams {
    pub fn from_security(security: &Security) -> Self {
        let (exchange, currency) = match security.as_stock() {
            Some(listing) => (listing.exchange.clone(), listing.currency.clone()),
            None => (None, None),
        };
        Self {
            ticker_root: security.ticker_root().to_owned(),
            ticker_suffix: security.ticker_suffix().to_owned(),
            ticker: security.ticker().to_owned(),
            is_active: security.is_active,
            list_date: qmj_core::format_date(security.list_date),
            delisted_utc: security.delisted_utc.map(UtcDateTime::format_sql),
            locale: security.locale.clone(),
            security_kind: security.kind.label(),
            exchange,
            currency,
        }
    }
}

pub(crate) const INSERT_SECURITY: &str = "INSERT INTO security \
     (id, company_id, ticker_root, ticker_suffix, ticker, is_active, list_date, \
      delisted_utc, locale, security_kind, exchange, currency) \
     VALUES (?, ?, ?, ?, ?, ?, CAST(? AS DATE), CAST(? AS TIMESTAMP), ?, ?, ?, ?)";

pub(crate) const PRICE_COLUMNS: &str =
    "id, strftime(ts, '%Y-%m-%dT%H:%M:%S.%fZ'), open, high, low, close, volume";

/// Raw `price` row.
#[derive(Debug, Clone)]
pub(crate) struct PriceRow {
    pub id: i64,
    pub ts: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceRow {
    pub fn from_row(row: &Row<'_>) -> Result<Self, ::duckdb::Error> {
        Ok(Self {
            id: row.get(0)?,
            ts: row.get(1)?,
            open: row.get(2)?,
            high: row.get(3)?,
            low: row.get(4)?,
            close: row.get(5)?,
            volume: row.get(6)?,
        })
    }

    pub fn to_price(&self) -> Result<Price, RowError> {
        let timestamp = UtcDateTime::parse(&self.ts)?;
        Ok(Price::new(
            self.open, self.high, self.low, self.close, self.volume, timestamp,
        ))
    }
}

pub(crate) const SNAPSHOT_COLUMNS: &str =
    "id, CAST(report_date AS VARCHAR), CAST(fiscal_period AS BIGINT)";

/// Raw `fundamental_snapshot` row.
#[derive(Debug, Clone)]
pub(crate) struct SnapshotRow {
    pub id: i64,
    pub report_date: String,
    pub fiscal_period: i64,
}

impl SnapshotRow {
    pub fn from_row(row: &Row<'_>) -> Result<Self, ::duckdb::Error> {
        Ok(Self {
            id: row.get(0)?,
            report_date: row.get(1)?,
            fiscal_period: row.get(2)?,
        })
    }

    /// Integer column values outside 1..=4 are rejected here, not by the schema.
    pub fn fiscal_period(&self) -> Result<FiscalPeriod, ValidationError> {
        FiscalPeriod::try_from(self.fiscal_period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn security_row() -> SecurityRow {
        SecurityRow {
            id: 1,
            company_id: 1,
            ticker_root: String::from("BRK"),
            ticker_suffix: String::from(".B"),
            ticker: String::from("BRK.B"),
            is_active: true,
            list_date: String::from("1996-05-09"),
            delisted_utc: None,
            locale: String::from("us"),
            security_kind: String::from("stock"),
            exchange: Some(String::from("XNYS")),
            currency: Some(String::from("USD")),
        }
    }

    #[test]
    fn statement_ddl_lists_every_line_item() {
        let ddl = statement_ddl::<CashFlowStatement>();
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS cash_flow_statement"));
        assert!(ddl.contains("snapshot_id BIGINT NOT NULL UNIQUE"));
        for field in CashFlowStatement::FIELDS {
            assert!(ddl.contains(&format!("{field} DOUBLE NOT NULL DEFAULT 0.0")));
        }
    }

    #[test]
    fn converts_stock_row() {
        let security = security_row().to_security().expect("valid row");
        assert_eq!(security.ticker(), "BRK.B");
        assert_eq!(security.list_date, date!(1996 - 05 - 09));
        assert_eq!(
            security.as_stock().and_then(|listing| listing.currency.as_deref()),
            Some("USD")
        );
    }

    #[test]
    fn rejects_row_whose_ticker_disagrees_with_parts() {
        let mut row = security_row();
        row.ticker = String::from("BRKB");
        let err = row.to_security().expect_err("must fail");
        assert!(matches!(
            err,
            RowError::Validation(ValidationError::TickerMismatch { .. })
        ));
    }

    #[test]
    fn rejects_unknown_security_kind() {
        let mut row = security_row();
        row.security_kind = String::from("bond");
        assert!(matches!(
            row.to_security(),
            Err(RowError::UnknownSecurityKind(kind)) if kind == "bond"
        ));
    }

    #[test]
    fn round_trips_security_params() {
        let security = security_row().to_security().expect("valid row");
        let params = SecurityParams::from_security(&security);
        assert_eq!(params.security_kind, "stock");
        assert_eq!(params.list_date, "1996-05-09");
        assert_eq!(params.exchange.as_deref(), Some("XNYS"));
        assert!(params.delisted_utc.is_none());
    }

    #[test]
    fn snapshot_row_rejects_out_of_range_period() {
        let row = SnapshotRow {
            id: 9,
            report_date: String::from("2024-03-31"),
            fiscal_period: 5,
        };
        assert!(matches!(
            row.fiscal_period(),
            Err(ValidationError::InvalidFiscalPeriod { .. })
        ));
    }
}
