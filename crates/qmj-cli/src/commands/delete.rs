use qmj_warehouse::{CompanyId, Warehouse};
use serde_json::{json, Value};

use crate::cli::{DeleteCompanyArgs, TickerArgs};
use crate::error::CliError;

use super::resolve_ticker;

pub fn security(args: &TickerArgs, warehouse: &Warehouse) -> Result<Value, CliError> {
    let id = resolve_ticker(warehouse, &args.ticker)?;
    let report = warehouse.delete_security(id)?;
    Ok(serde_json::to_value(report)?)
}

pub fn company(args: &DeleteCompanyArgs, warehouse: &Warehouse) -> Result<Value, CliError> {
    let id = CompanyId(args.id);
    warehouse.delete_company(id)?;
    Ok(json!({ "company_id": id, "deleted": true }))
}
