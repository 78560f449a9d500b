use qmj_core::UtcDateTime;
use qmj_warehouse::Warehouse;
use serde_json::{json, Value};

use crate::cli::SetStatusArgs;
use crate::error::CliError;

use super::resolve_ticker;

pub fn run(args: &SetStatusArgs, warehouse: &Warehouse) -> Result<Value, CliError> {
    let delisted_utc = args
        .delisted_utc
        .as_deref()
        .map(UtcDateTime::parse)
        .transpose()?;
    let id = resolve_ticker(warehouse, &args.ticker)?;

    warehouse.update_security_status(id, !args.inactive, delisted_utc)?;
    Ok(json!({
        "security_id": id,
        "ticker": args.ticker,
        "is_active": !args.inactive,
        "delisted_utc": delisted_utc,
    }))
}
