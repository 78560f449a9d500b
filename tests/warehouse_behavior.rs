//! Behavior-driven tests for Warehouse behavior
//!
//! These tests verify HOW the warehouse persists and restores the domain
//! model: ownership, cascades, uniqueness and per-row rejection on load.

use std::path::{Path, PathBuf};

use qmj_core::{
    BalanceSheet, CashFlowStatement, Company, FiscalPeriod, FundamentalSnapshot, IncomeStatement,
    Price, PriceHistory, Security, StockListing, UtcDateTime,
};
use qmj_warehouse::{CompanyId, SecurityId, Warehouse, WarehouseConfig, WarehouseError, TABLES};
use tempfile::{tempdir, TempDir};
use time::macros::date;

fn config_in(temp: &TempDir) -> WarehouseConfig {
    WarehouseConfig {
        qmj_home: temp.path().to_path_buf(),
        db_path: temp.path().join("warehouse.duckdb"),
        max_pool_size: 2,
    }
}

fn open(temp: &TempDir) -> Warehouse {
    Warehouse::open(config_in(temp)).expect("warehouse open")
}

/// Write rows the mapping layer would never produce, bypassing the warehouse.
fn write_raw(db_path: &Path, sql: &str) {
    let connection = duckdb::Connection::open(db_path).expect("raw connection");
    connection.execute_batch(sql).expect("raw sql");
}

fn price(ts: &str, close: f64) -> Price {
    Price::new(
        close - 1.0,
        close + 1.0,
        close - 2.0,
        close,
        1_250_000.0,
        UtcDateTime::parse(ts).expect("timestamp"),
    )
}

fn q1_snapshot() -> FundamentalSnapshot {
    FundamentalSnapshot::new(
        date!(2024 - 03 - 30),
        FiscalPeriod::Q1,
        IncomeStatement {
            revenue: 90_753.0,
            cost_of_revenue: 48_482.0,
            gross_profit: 42_271.0,
            net_income_loss: 23_636.0,
            diluted_average_shares: 15_464.709,
            ..IncomeStatement::default()
        },
        BalanceSheet {
            assets: 337_411.0,
            liabilities: 263_217.0,
            equity: 74_194.0,
            liabilities_and_equity: 337_411.0,
            ..BalanceSheet::default()
        },
        CashFlowStatement {
            net_cash_flow_from_operating_activities: 22_690.0,
            net_cash_flow_from_investing_activities: -310.0,
            net_cash_flow_from_financing_activities: -30_433.0,
            net_cash_flow: -8_053.0,
        },
    )
}

fn apple() -> Company {
    let aapl = Security::stock(
        "AAP",
        "L",
        date!(1980 - 12 - 12),
        "us",
        StockListing::new(Some("XNAS".into()), Some("USD".into())),
    )
    .expect("valid")
    .with_prices(PriceHistory::from(vec![
        price("2024-04-01T20:00:00Z", 170.03),
        price("2024-04-02T20:00:00Z", 168.84),
    ]))
    .with_fundamentals(vec![q1_snapshot()]);

    Company::new("Apple Inc.", "0000320193", "3571")
        .expect("valid")
        .with_security(aapl)
}

// =============================================================================
// Warehouse: Round Trips
// =============================================================================

#[test]
fn when_user_stores_a_company_it_loads_back_structurally_equal() {
    // Given: A warehouse and a company with a stock, prices and a snapshot
    let temp = tempdir().expect("tempdir");
    let warehouse = open(&temp);
    let company = apple();

    // When: The company is inserted and reloaded
    let id = warehouse.insert_company(&company).expect("insert");
    let loaded = warehouse
        .load_company(id)
        .expect("load")
        .expect("company exists");

    // Then: The reloaded graph equals the original
    assert_eq!(loaded.company, company);
    assert!(loaded.rejected.is_empty());

    // And: The ticker is still root followed by suffix
    let security = &loaded.company.securities[0];
    assert_eq!(security.ticker(), "AAPL");
    assert_eq!(security.ticker_root(), "AAP");
    assert_eq!(security.ticker_suffix(), "L");
}

#[test]
fn when_user_stores_an_all_zero_q2_snapshot_it_reloads_equal() {
    // Given: A security and an all-zero Q2 snapshot
    let warehouse = Warehouse::open_in_memory().expect("warehouse");
    let company_id = warehouse
        .insert_company(&Company::new("Zero Corp", "0000000001", "9999").expect("valid"))
        .expect("company");
    let security_id = warehouse
        .insert_security(
            company_id,
            &Security::new("ZERO", "", date!(2010 - 01 - 04), "us").expect("valid"),
        )
        .expect("security");
    let snapshot = FundamentalSnapshot::zeroed(date!(2024 - 06 - 30), FiscalPeriod::Q2);

    // When: It is persisted and reloaded
    let snapshot_id = warehouse
        .insert_snapshot(security_id, &snapshot)
        .expect("insert snapshot");
    let report = warehouse.load_snapshots(security_id).expect("load");

    // Then: The reloaded snapshot is structurally equal to the original
    assert!(report.is_clean());
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].id, snapshot_id);
    assert_eq!(report.records[0].snapshot, snapshot);
}

#[test]
fn when_user_stores_each_fiscal_period_it_reloads_unchanged() {
    // Given: A security
    let warehouse = Warehouse::open_in_memory().expect("warehouse");
    let company_id = warehouse
        .insert_company(&Company::new("Quarterly Inc.", "0000000002", "7370").expect("valid"))
        .expect("company");
    let security_id = warehouse
        .insert_security(
            company_id,
            &Security::new("QTR", "", date!(2001 - 01 - 02), "us").expect("valid"),
        )
        .expect("security");

    // When: One snapshot per quarter is stored
    let report_dates = [
        date!(2023 - 03 - 31),
        date!(2023 - 06 - 30),
        date!(2023 - 09 - 30),
        date!(2023 - 12 - 31),
    ];
    for (period, report_date) in FiscalPeriod::ALL.into_iter().zip(report_dates) {
        warehouse
            .insert_snapshot(security_id, &FundamentalSnapshot::zeroed(report_date, period))
            .expect("insert");
    }

    // Then: Every period comes back as stored, ordered by report date
    let periods: Vec<FiscalPeriod> = warehouse
        .load_snapshots(security_id)
        .expect("load")
        .records
        .into_iter()
        .map(|stored| stored.snapshot.fiscal_period)
        .collect();
    assert_eq!(periods, FiscalPeriod::ALL.to_vec());
}

#[test]
fn when_prices_are_appended_out_of_order_they_load_in_time_order_with_duplicates() {
    // Given: A stored security
    let warehouse = Warehouse::open_in_memory().expect("warehouse");
    warehouse.insert_company(&apple()).expect("company");
    let security_id = warehouse
        .find_security_id("AAPL")
        .expect("lookup")
        .expect("security exists");

    // When: Later prices are appended with one step back and a duplicate
    let written = warehouse
        .insert_prices(
            security_id,
            &[
                price("2024-04-04T20:00:00Z", 168.82),
                price("2024-04-03T20:00:00Z", 169.65),
                price("2024-04-03T20:00:00Z", 169.65),
            ],
        )
        .expect("append");

    // Then: Loads are ordered by timestamp and keep the duplicate
    assert_eq!(written, 3);
    let history = warehouse.load_prices(security_id).expect("load prices");
    let closes: Vec<f64> = history.iter().map(|price| price.close).collect();
    assert_eq!(closes, vec![170.03, 168.84, 169.65, 169.65, 168.82]);
    assert!(history.is_chronological());
}

#[test]
fn when_a_price_carries_nanoseconds_it_still_reloads_equal() {
    // Given: A stored security without prices
    let warehouse = Warehouse::open_in_memory().expect("warehouse");
    let company_id = warehouse.insert_company(&apple()).expect("company");
    let security = Security::new("MSFT", "", date!(1986 - 03 - 13), "us").expect("valid");
    let security_id = warehouse
        .insert_security(company_id, &security)
        .expect("security");

    // When: A price parsed with nanosecond precision is written
    let precise = price("2024-04-03T20:00:00.123456789Z", 420.45);
    warehouse
        .insert_prices(security_id, &[precise])
        .expect("append");

    // Then: It loads back equal to the value held in memory
    let history = warehouse.load_prices(security_id).expect("load prices");
    assert_eq!(history.as_slice(), &[precise]);
}

#[test]
fn when_user_delists_a_security_only_its_status_changes() {
    // Given: A stored active security
    let warehouse = Warehouse::open_in_memory().expect("warehouse");
    warehouse.insert_company(&apple()).expect("company");
    let id = warehouse
        .find_security_id("AAPL")
        .expect("lookup")
        .expect("exists");
    let delisted = UtcDateTime::parse("2024-09-30T20:00:00Z").expect("timestamp");

    // When: It is marked inactive with a delisting time
    warehouse
        .update_security_status(id, false, Some(delisted))
        .expect("update");

    // Then: Status is persisted and identity is untouched
    let loaded = warehouse.load_security(id).expect("load").expect("exists");
    assert!(!loaded.security.is_active);
    assert_eq!(loaded.security.delisted_utc, Some(delisted));
    assert_eq!(loaded.security.ticker(), "AAPL");
    assert_eq!(loaded.security.prices.len(), 2);
}

// =============================================================================
// Warehouse: Ownership and Deletes
// =============================================================================

#[test]
fn when_user_deletes_a_security_its_prices_snapshots_and_statements_go_with_it() {
    // Given: A company with two securities, each with prices and a snapshot
    let warehouse = Warehouse::open_in_memory().expect("warehouse");
    let mut company = apple();
    company.add_security(
        Security::new("AAPL", ".MX", date!(2003 - 01 - 02), "mx")
            .expect("valid")
            .with_prices(PriceHistory::from(vec![price("2024-04-01T20:00:00Z", 2_820.0)]))
            .with_fundamentals(vec![q1_snapshot()]),
    );
    let company_id = warehouse.insert_company(&company).expect("insert");
    let doomed = warehouse
        .find_security_id("AAPL")
        .expect("lookup")
        .expect("exists");

    // When: One security is deleted
    let report = warehouse.delete_security(doomed).expect("delete");

    // Then: Exactly its owned rows are reported and removed
    assert_eq!(report.ticker, "AAPL");
    assert_eq!(report.prices, 2);
    assert_eq!(report.snapshots, 1);
    assert_eq!(report.statements, 3);
    assert!(warehouse.find_security_id("AAPL").expect("lookup").is_none());
    assert_eq!(warehouse.table_row_count("price").expect("count"), 1);
    assert_eq!(
        warehouse.table_row_count("fundamental_snapshot").expect("count"),
        1
    );
    for table in ["income_statement", "balance_sheet", "cash_flow_statement"] {
        assert_eq!(warehouse.table_row_count(table).expect("count"), 1);
    }

    // And: The sibling security is untouched
    let remaining = warehouse
        .load_company(company_id)
        .expect("load")
        .expect("company exists");
    assert_eq!(remaining.company.securities.len(), 1);
    assert_eq!(remaining.company.securities[0].ticker(), "AAPL.MX");
}

#[test]
fn when_user_deletes_a_company_that_owns_securities_nothing_is_removed() {
    // Given: A company with a stored security
    let warehouse = Warehouse::open_in_memory().expect("warehouse");
    let company_id = warehouse.insert_company(&apple()).expect("insert");

    // When: The company is deleted first
    let err = warehouse
        .delete_company(company_id)
        .expect_err("delete is restricted");

    // Then: The delete is refused and the security rows stay
    assert!(matches!(
        err,
        WarehouseError::CompanyHasSecurities { company_id: id, securities: 1 } if id == company_id
    ));
    assert_eq!(warehouse.table_row_count("company").expect("count"), 1);
    assert_eq!(warehouse.table_row_count("security").expect("count"), 1);
    assert_eq!(warehouse.table_row_count("price").expect("count"), 2);

    // And: Once its securities are gone, the company can be deleted
    let security_id = warehouse
        .find_security_id("AAPL")
        .expect("lookup")
        .expect("exists");
    warehouse.delete_security(security_id).expect("cascade");
    warehouse.delete_company(company_id).expect("now allowed");
    assert!(warehouse.load_company(company_id).expect("load").is_none());
    for table in TABLES {
        assert_eq!(warehouse.table_row_count(table).expect("count"), 0);
    }
}

#[test]
fn when_user_deletes_a_snapshot_its_three_statements_go_with_it() {
    // Given: A stored security with one snapshot
    let warehouse = Warehouse::open_in_memory().expect("warehouse");
    warehouse.insert_company(&apple()).expect("insert");
    let security_id = warehouse
        .find_security_id("AAPL")
        .expect("lookup")
        .expect("exists");
    let snapshot_id = warehouse.load_snapshots(security_id).expect("load").records[0].id;

    // When: The snapshot is deleted twice
    let first = warehouse.delete_snapshot(snapshot_id).expect("delete");
    let second = warehouse.delete_snapshot(snapshot_id).expect("delete again");

    // Then: Only the first delete found it, and no statements remain
    assert!(first);
    assert!(!second);
    for table in ["income_statement", "balance_sheet", "cash_flow_statement"] {
        assert_eq!(warehouse.table_row_count(table).expect("count"), 0);
    }
    assert_eq!(warehouse.table_row_count("price").expect("count"), 2);
}

#[test]
fn when_parent_rows_are_missing_inserts_are_refused() {
    // Given: An empty warehouse
    let warehouse = Warehouse::open_in_memory().expect("warehouse");
    let orphan = Security::new("ORPH", "", date!(2020 - 01 - 02), "us").expect("valid");

    // When / Then: Children cannot be attached to rows that do not exist
    assert!(matches!(
        warehouse.insert_security(CompanyId(99), &orphan),
        Err(WarehouseError::CompanyNotFound(CompanyId(99)))
    ));
    assert!(matches!(
        warehouse.insert_prices(SecurityId(99), &[price("2024-01-02T00:00:00Z", 1.0)]),
        Err(WarehouseError::SecurityNotFound(SecurityId(99)))
    ));
    assert!(matches!(
        warehouse.delete_security(SecurityId(99)),
        Err(WarehouseError::SecurityNotFound(SecurityId(99)))
    ));
    assert!(matches!(
        warehouse.delete_company(CompanyId(99)),
        Err(WarehouseError::CompanyNotFound(CompanyId(99)))
    ));
    assert_eq!(warehouse.table_row_count("security").expect("count"), 0);
}

// =============================================================================
// Warehouse: Uniqueness and Atomicity
// =============================================================================

#[test]
fn when_user_inserts_a_second_aapl_the_insert_fails() {
    // Given: A stored AAPL
    let warehouse = Warehouse::open_in_memory().expect("warehouse");
    let company_id = warehouse.insert_company(&apple()).expect("insert");

    // When: Another security deriving the same ticker is inserted
    let twin = Security::new("AAPL", "", date!(1980 - 12 - 12), "us").expect("valid");
    let err = warehouse
        .insert_security(company_id, &twin)
        .expect_err("duplicate ticker");

    // Then: The store refuses it
    assert!(matches!(
        err,
        WarehouseError::DuplicateTicker { ref ticker } if ticker == "AAPL"
    ));
    assert_eq!(warehouse.table_row_count("security").expect("count"), 1);
}

#[test]
fn when_any_part_of_a_company_write_fails_nothing_is_written() {
    // Given: A company whose second security repeats the first one's ticker
    let temp = tempdir().expect("tempdir");
    let warehouse = open(&temp);
    let mut company = apple();
    company.add_security(
        Security::new("AAPL", "", date!(1980 - 12 - 12), "us")
            .expect("valid")
            .with_fundamentals(vec![q1_snapshot()]),
    );
    assert_eq!(company.duplicate_tickers(), vec!["AAPL"]);

    // When: The company is inserted
    let err = warehouse
        .insert_company(&company)
        .expect_err("duplicate inside the company");

    // Then: The whole graph is rolled back
    assert!(matches!(err, WarehouseError::DuplicateTicker { .. }));
    for table in TABLES {
        assert_eq!(
            warehouse.table_row_count(table).expect("count"),
            0,
            "{table} should be empty after rollback"
        );
    }

    // And: The warehouse is still usable
    warehouse.insert_company(&apple()).expect("clean insert");
    assert_eq!(warehouse.table_row_count("security").expect("count"), 1);
}

// =============================================================================
// Warehouse: Rejecting Bad Stored Rows
// =============================================================================

fn seed_apple_on_disk(temp: &TempDir) -> (PathBuf, SecurityId) {
    let warehouse = open(temp);
    warehouse.insert_company(&apple()).expect("insert");
    let id = warehouse
        .find_security_id("AAPL")
        .expect("lookup")
        .expect("exists");
    let db_path = warehouse.db_path().expect("file backed").to_path_buf();
    drop(warehouse);
    (db_path, id)
}

#[test]
fn when_a_stored_fiscal_period_is_out_of_range_only_that_snapshot_is_rejected() {
    // Given: A store holding a valid snapshot and one written with fiscal period 7
    let temp = tempdir().expect("tempdir");
    let (db_path, security_id) = seed_apple_on_disk(&temp);
    write_raw(
        &db_path,
        &format!(
            "INSERT INTO fundamental_snapshot (security_id, report_date, fiscal_period) \
             VALUES ({}, DATE '2024-09-28', 7);",
            security_id.0
        ),
    );

    // When: Snapshots are loaded
    let warehouse = open(&temp);
    let report = warehouse.load_snapshots(security_id).expect("load");

    // Then: The valid snapshot loads and the bad one is reported on its own
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].snapshot, q1_snapshot());
    assert_eq!(report.rejected.len(), 1);
    let rejected = &report.rejected[0];
    assert_eq!(rejected.table, "fundamental_snapshot");
    assert_eq!(rejected.ticker.as_deref(), Some("AAPL"));
    assert_eq!(rejected.report_date.as_deref(), Some("2024-09-28"));
    assert!(rejected.reason.contains("'7'"), "reason: {}", rejected.reason);
}

#[test]
fn when_a_stored_snapshot_has_only_an_income_statement_it_is_rejected() {
    // Given: A snapshot row with an income statement but no other statements
    let temp = tempdir().expect("tempdir");
    let (db_path, security_id) = seed_apple_on_disk(&temp);
    write_raw(
        &db_path,
        &format!(
            "INSERT INTO fundamental_snapshot (security_id, report_date, fiscal_period) \
             VALUES ({}, DATE '2024-06-29', 3);\n\
             INSERT INTO income_statement (snapshot_id, revenue) \
             SELECT max(id), 85777.0 FROM fundamental_snapshot;",
            security_id.0
        ),
    );

    // When: The security is loaded
    let warehouse = open(&temp);
    let loaded = warehouse
        .load_security(security_id)
        .expect("load")
        .expect("exists");

    // Then: The incomplete snapshot is rejected for its missing balance sheet
    assert_eq!(loaded.security.fundamentals, vec![q1_snapshot()]);
    assert_eq!(loaded.snapshot_ids.len(), 1);
    assert_eq!(loaded.rejected.len(), 1);
    assert!(loaded.rejected[0].reason.contains("balance sheet"));
}

#[test]
fn when_a_stored_security_is_corrupt_the_company_still_loads() {
    // Given: A company with a second security whose stored ticker disagrees with its parts
    let temp = tempdir().expect("tempdir");
    let (db_path, security_id) = seed_apple_on_disk(&temp);
    write_raw(
        &db_path,
        "INSERT INTO security (company_id, ticker_root, ticker_suffix, ticker, list_date, locale) \
         SELECT company_id, 'AAPL', '.MX', 'AAPLMX', DATE '2003-01-02', 'mx' FROM security;",
    );

    // When: The company is loaded
    let warehouse = open(&temp);
    let company_id = warehouse
        .load_security(security_id)
        .expect("load")
        .expect("exists")
        .company_id;
    let loaded = warehouse
        .load_company(company_id)
        .expect("load")
        .expect("exists");

    // Then: The good security loads and the corrupt one is reported
    assert_eq!(loaded.company.securities.len(), 1);
    assert_eq!(loaded.security_ids, vec![security_id]);
    assert_eq!(loaded.rejected.len(), 1);
    assert_eq!(loaded.rejected[0].table, "security");
    assert_eq!(loaded.rejected[0].ticker.as_deref(), Some("AAPLMX"));

    // And: Loading the corrupt security directly is an error, not a silent skip
    let corrupt_id = SecurityId(loaded.rejected[0].id);
    assert!(matches!(
        warehouse.load_security(corrupt_id),
        Err(WarehouseError::InvalidRow { table: "security", .. })
    ));
}
