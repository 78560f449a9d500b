use qmj_warehouse::{SqlColumn, Warehouse};
use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;

#[derive(Debug, Serialize)]
struct TableResponseData {
    name: String,
    row_count: u64,
    columns: Vec<SqlColumn>,
}

pub fn run(warehouse: &Warehouse) -> Result<Value, CliError> {
    let mut tables = Vec::new();
    for table in warehouse.schema()? {
        tables.push(TableResponseData {
            row_count: warehouse.table_row_count(&table.name)?,
            name: table.name,
            columns: table.columns,
        });
    }
    Ok(serde_json::to_value(tables)?)
}
