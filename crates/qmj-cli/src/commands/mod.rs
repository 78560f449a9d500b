mod delete;
mod import;
mod init;
mod schema;
mod show;
mod status;

use qmj_warehouse::{SecurityId, Warehouse, WarehouseConfig};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub fn run(cli: &Cli) -> Result<Value, CliError> {
    let warehouse = open_warehouse(cli)?;

    match &cli.command {
        Command::Init => init::run(&warehouse),
        Command::Import(args) => import::run(args, &warehouse),
        Command::Show(args) => show::run(args, &warehouse),
        Command::SetStatus(args) => status::run(args, &warehouse),
        Command::DeleteSecurity(args) => delete::security(args, &warehouse),
        Command::DeleteCompany(args) => delete::company(args, &warehouse),
        Command::Schema => schema::run(&warehouse),
    }
}

fn open_warehouse(cli: &Cli) -> Result<Warehouse, CliError> {
    let mut config = WarehouseConfig::default();
    if let Some(db) = &cli.db {
        config = config.with_db_path(db);
    }
    tracing::debug!(db_path = %config.db_path.display(), "opening warehouse");
    Ok(Warehouse::open(config)?)
}

fn resolve_ticker(warehouse: &Warehouse, ticker: &str) -> Result<SecurityId, CliError> {
    warehouse
        .find_security_id(ticker)?
        .ok_or_else(|| CliError::NotFound(format!("no security with ticker '{ticker}'")))
}
