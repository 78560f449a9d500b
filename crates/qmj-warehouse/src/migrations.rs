use ::duckdb::{params, Connection};

use crate::mapping::{statement_ddl, StatementTable};
use qmj_core::{BalanceSheet, CashFlowStatement, IncomeStatement};

/// Every table owned by the schema, parents before children.
pub const TABLES: &[&str] = &[
    "company",
    "security",
    "price",
    "fundamental_snapshot",
    IncomeStatement::TABLE,
    BalanceSheet::TABLE,
    CashFlowStatement::TABLE,
];

struct Migration {
    version: &'static str,
    sql: String,
}

// Ownership edges are plain indexed BIGINT columns. Parent checks and
// cascading deletes live in the repository because DuckDB has no
// ON DELETE CASCADE and checks foreign keys eagerly inside a transaction.
const ENTITY_TABLES: &str = r#"
CREATE SEQUENCE IF NOT EXISTS seq_company START 1;
CREATE SEQUENCE IF NOT EXISTS seq_security START 1;
CREATE SEQUENCE IF NOT EXISTS seq_price START 1;
CREATE SEQUENCE IF NOT EXISTS seq_fundamental_snapshot START 1;

CREATE TABLE IF NOT EXISTS company (
    id BIGINT PRIMARY KEY DEFAULT nextval('seq_company'),
    company_name TEXT NOT NULL,
    cik TEXT NOT NULL,
    sic TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS security (
    id BIGINT PRIMARY KEY DEFAULT nextval('seq_security'),
    company_id BIGINT NOT NULL,
    ticker_root TEXT NOT NULL,
    ticker_suffix TEXT NOT NULL,
    ticker TEXT NOT NULL UNIQUE,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    list_date DATE NOT NULL,
    delisted_utc TIMESTAMP,
    locale TEXT NOT NULL,
    security_kind TEXT NOT NULL DEFAULT 'generic',
    exchange TEXT,
    currency TEXT
);

CREATE TABLE IF NOT EXISTS price (
    id BIGINT PRIMARY KEY DEFAULT nextval('seq_price'),
    security_id BIGINT NOT NULL,
    ts TIMESTAMP NOT NULL,
    open DOUBLE NOT NULL,
    high DOUBLE NOT NULL,
    low DOUBLE NOT NULL,
    close DOUBLE NOT NULL,
    volume DOUBLE NOT NULL
);

CREATE TABLE IF NOT EXISTS fundamental_snapshot (
    id BIGINT PRIMARY KEY DEFAULT nextval('seq_fundamental_snapshot'),
    security_id BIGINT NOT NULL,
    report_date DATE NOT NULL,
    fiscal_period INTEGER NOT NULL
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_security_company_id ON security(company_id);
CREATE INDEX IF NOT EXISTS idx_price_security_id_ts ON price(security_id, ts);
CREATE INDEX IF NOT EXISTS idx_fundamental_snapshot_security_id ON fundamental_snapshot(security_id);
"#;

fn statement_tables() -> String {
    let mut sql = String::new();
    for table in [
        IncomeStatement::TABLE,
        BalanceSheet::TABLE,
        CashFlowStatement::TABLE,
    ] {
        sql.push_str(&format!(
            "CREATE SEQUENCE IF NOT EXISTS seq_{table} START 1;\n"
        ));
    }
    sql.push_str(&statement_ddl::<IncomeStatement>());
    sql.push_str(&statement_ddl::<BalanceSheet>());
    sql.push_str(&statement_ddl::<CashFlowStatement>());
    sql
}

fn migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: "0001_entity_tables",
            sql: String::from(ENTITY_TABLES),
        },
        Migration {
            version: "0002_statement_tables",
            sql: statement_tables(),
        },
        Migration {
            version: "0003_reference_indexes",
            sql: String::from(INDEXES),
        },
    ]
}

/// Apply every migration not yet recorded in `schema_migrations`.
///
/// Returns the versions applied by this call.
pub fn apply_migrations(connection: &Connection) -> Result<Vec<&'static str>, ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    let mut applied = Vec::new();
    for migration in migrations() {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params![migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql.as_str())?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                params![migration.version],
            )?;
            tracing::info!(version = migration.version, "applied migration");
            applied.push(migration.version);
        }
    }

    Ok(applied)
}

/// Versions recorded in `schema_migrations`, oldest first.
pub fn applied_versions(connection: &Connection) -> Result<Vec<String>, ::duckdb::Error> {
    let mut statement =
        connection.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let versions = statement
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_each_migration_once() {
        let connection = Connection::open_in_memory().expect("connection");

        let first = apply_migrations(&connection).expect("first run");
        assert_eq!(
            first,
            vec![
                "0001_entity_tables",
                "0002_statement_tables",
                "0003_reference_indexes"
            ]
        );
        let second = apply_migrations(&connection).expect("second run");
        assert!(second.is_empty());

        assert_eq!(
            applied_versions(&connection).expect("versions"),
            vec![
                "0001_entity_tables",
                "0002_statement_tables",
                "0003_reference_indexes"
            ]
        );
    }

    #[test]
    fn creates_every_schema_table() {
        let connection = Connection::open_in_memory().expect("connection");
        apply_migrations(&connection).expect("migrate");

        for table in TABLES {
            let count: i64 = connection
                .query_row(
                    "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
                    params![table],
                    |row| row.get(0),
                )
                .expect("lookup");
            assert_eq!(count, 1, "missing table {table}");
        }
    }

    #[test]
    fn ticker_is_unique_in_the_store() {
        let connection = Connection::open_in_memory().expect("connection");
        apply_migrations(&connection).expect("migrate");

        let insert = "INSERT INTO security \
             (company_id, ticker_root, ticker_suffix, ticker, list_date, locale) \
             VALUES (1, 'IBM', '', 'IBM', DATE '1915-11-11', 'us')";
        connection.execute_batch(insert).expect("first insert");
        assert!(connection.execute_batch(insert).is_err());
    }
}
