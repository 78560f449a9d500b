use std::fs;

use qmj_core::Company;
use qmj_warehouse::{CompanyId, Warehouse};
use serde::Serialize;
use serde_json::Value;

use crate::cli::ImportArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct ImportedCompany {
    company_id: CompanyId,
    company_name: String,
    tickers: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ImportResponseData {
    file: String,
    companies: Vec<ImportedCompany>,
}

pub fn run(args: &ImportArgs, warehouse: &Warehouse) -> Result<Value, CliError> {
    let content = fs::read_to_string(&args.file)?;
    let companies = Company::list_from_json(&content)?;

    let mut imported = Vec::with_capacity(companies.len());
    for company in &companies {
        let duplicates = company.duplicate_tickers();
        if !duplicates.is_empty() {
            tracing::warn!(
                company = company.company_name.as_str(),
                tickers = ?duplicates,
                "company lists a ticker more than once"
            );
        }

        let company_id = warehouse.insert_company(company)?;
        imported.push(ImportedCompany {
            company_id,
            company_name: company.company_name.clone(),
            tickers: company
                .securities
                .iter()
                .map(|security| security.ticker().to_owned())
                .collect(),
        });
    }

    tracing::info!(companies = imported.len(), "import complete");
    Ok(serde_json::to_value(ImportResponseData {
        file: args.file.display().to_string(),
        companies: imported,
    })?)
}
