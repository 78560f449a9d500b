use qmj_warehouse::Warehouse;
use serde_json::Value;

use crate::cli::TickerArgs;
use crate::error::CliError;

use super::resolve_ticker;

pub fn run(args: &TickerArgs, warehouse: &Warehouse) -> Result<Value, CliError> {
    let id = resolve_ticker(warehouse, &args.ticker)?;
    let loaded = warehouse
        .load_security(id)?
        .ok_or_else(|| CliError::NotFound(format!("security {id} disappeared during load")))?;
    Ok(serde_json::to_value(loaded)?)
}
