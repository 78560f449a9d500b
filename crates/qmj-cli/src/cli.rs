//! CLI argument definitions for `qmj`.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `init` | Create or migrate the warehouse |
//! | `import` | Insert companies from a JSON file |
//! | `show` | Print one security with prices and fundamentals |
//! | `set-status` | Mark a security active, inactive or delisted |
//! | `delete-security` | Delete a security and everything it owns |
//! | `delete-company` | Delete a company without securities |
//! | `schema` | Print tables, columns and row counts |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--db` | `$QMJ_HOME/warehouse.duckdb` | Warehouse database file |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--log-level` | `warn` | Log filter directive |
//! | `--log-format` | `compact` | Log format (pretty, json, compact) |

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use qmj_core::LogFormat;

#[derive(Debug, Parser)]
#[command(
    name = "qmj",
    author,
    version,
    about = "Inspect and maintain the qmj securities and fundamentals warehouse"
)]
pub struct Cli {
    /// Warehouse database file. Overrides QMJ_HOME.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Log filter directive, e.g. `info` or `qmj_warehouse=debug`. RUST_LOG wins when set.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Log output format. Logs are written to stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Compact)]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
            LogFormatArg::Compact => Self::Compact,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the warehouse if needed and apply pending migrations.
    Init,

    /// Insert companies, with their securities, prices and fundamentals, from JSON.
    ///
    /// The file holds one company object or an array of them. Each company
    /// is written in its own transaction.
    ///
    ///   qmj import companies.json
    Import(ImportArgs),

    /// Print one security with its prices, fundamentals and rejected rows.
    ///
    ///   qmj show AAPL --pretty
    Show(TickerArgs),

    /// Update activity and delisting time of a security.
    ///
    ///   qmj set-status LEHMQ --inactive --delisted-utc 2008-09-15T00:00:00Z
    SetStatus(SetStatusArgs),

    /// Delete a security with its prices, snapshots and statements.
    DeleteSecurity(TickerArgs),

    /// Delete a company. Fails while the company still owns securities.
    DeleteCompany(DeleteCompanyArgs),

    /// Print every table with its columns and row count.
    Schema,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// JSON file to import.
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct TickerArgs {
    /// Full ticker (root followed by suffix).
    pub ticker: String,
}

#[derive(Debug, Args)]
pub struct SetStatusArgs {
    pub ticker: String,

    /// Mark the security inactive. Without this flag it is marked active.
    #[arg(long, default_value_t = false)]
    pub inactive: bool,

    /// Delisting time, RFC3339 UTC.
    #[arg(long)]
    pub delisted_utc: Option<String>,
}

#[derive(Debug, Args)]
pub struct DeleteCompanyArgs {
    /// Company id as printed by `import`.
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "qmj",
            "show",
            "BRK.B",
            "--pretty",
            "--db",
            "/tmp/q.duckdb",
            "--log-format",
            "json",
        ])
        .expect("valid arguments");

        assert!(cli.pretty);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/q.duckdb")));
        assert_eq!(cli.log_format, LogFormatArg::Json);
        assert!(matches!(cli.command, Command::Show(TickerArgs { ref ticker }) if ticker == "BRK.B"));
    }

    #[test]
    fn delete_company_requires_numeric_id() {
        assert!(Cli::try_parse_from(["qmj", "delete-company", "apple"]).is_err());
        let cli = Cli::try_parse_from(["qmj", "delete-company", "12"]).expect("numeric id");
        assert!(matches!(
            cli.command,
            Command::DeleteCompany(DeleteCompanyArgs { id: 12 })
        ));
    }

    #[test]
    fn set_status_defaults_to_active() {
        let cli = Cli::try_parse_from(["qmj", "set-status", "IBM"]).expect("valid");
        let Command::SetStatus(args) = cli.command else {
            panic!("expected set-status");
        };
        assert!(!args.inactive);
        assert!(args.delisted_utc.is_none());
    }
}
