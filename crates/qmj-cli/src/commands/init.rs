use qmj_warehouse::Warehouse;
use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;

#[derive(Debug, Serialize)]
struct InitResponseData {
    db_path: Option<String>,
    schema_versions: Vec<String>,
}

pub fn run(warehouse: &Warehouse) -> Result<Value, CliError> {
    let data = InitResponseData {
        db_path: warehouse.db_path().map(|path| path.display().to_string()),
        schema_versions: warehouse.schema_versions()?,
    };
    Ok(serde_json::to_value(data)?)
}
