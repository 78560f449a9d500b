use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{CoreError, FundamentalSnapshot, Security, ValidationError};

/// A publicly tracked business and the securities it has issued.
///
/// The company does not cross-check its securities: keeping tickers unique
/// and fundamentals attached to the right security is the caller's job, and
/// the warehouse enforces ticker uniqueness on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CompanyRecord")]
pub struct Company {
    pub company_name: String,
    pub cik: String,
    pub sic: String,
    pub securities: Vec<Security>,
}

impl Company {
    pub fn new(
        company_name: impl Into<String>,
        cik: impl Into<String>,
        sic: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let company_name = company_name.into();
        if company_name.trim().is_empty() {
            return Err(ValidationError::EmptyCompanyName);
        }
        let cik = cik.into();
        if cik.trim().is_empty() {
            return Err(ValidationError::EmptyCik);
        }

        Ok(Self {
            company_name,
            cik,
            sic: sic.into(),
            securities: Vec::new(),
        })
    }

    pub fn with_security(mut self, security: Security) -> Self {
        self.securities.push(security);
        self
    }

    pub fn add_security(&mut self, security: Security) {
        self.securities.push(security);
    }

    pub fn security(&self, ticker: &str) -> Option<&Security> {
        self.securities
            .iter()
            .find(|security| security.ticker() == ticker)
    }

    /// Reporting history across every security, in security order then snapshot order.
    pub fn fundamentals(&self) -> impl Iterator<Item = (&Security, &FundamentalSnapshot)> {
        self.securities.iter().flat_map(|security| {
            security
                .fundamentals
                .iter()
                .map(move |snapshot| (security, snapshot))
        })
    }

    /// Parse one company object or an array of them.
    pub fn list_from_json(input: &str) -> Result<Vec<Self>, CoreError> {
        let value: serde_json::Value = serde_json::from_str(input)?;
        let companies = match value {
            serde_json::Value::Array(_) => serde_json::from_value(value)?,
            other => vec![serde_json::from_value(other)?],
        };
        Ok(companies)
    }

    /// Tickers that appear more than once, in first-repeat order.
    pub fn duplicate_tickers(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for security in &self.securities {
            let ticker = security.ticker();
            if !seen.insert(ticker) && !duplicates.contains(&ticker) {
                duplicates.push(ticker);
            }
        }
        duplicates
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompanyRecord {
    company_name: String,
    cik: String,
    sic: String,
    #[serde(default)]
    securities: Vec<Security>,
    /// Accepted only empty; snapshots belong to a security.
    #[serde(default)]
    fundamentals: Vec<FundamentalSnapshot>,
}

impl TryFrom<CompanyRecord> for Company {
    type Error = ValidationError;

    fn try_from(record: CompanyRecord) -> Result<Self, Self::Error> {
        if !record.fundamentals.is_empty() {
            return Err(ValidationError::CompanyLevelFundamentals {
                company_name: record.company_name,
            });
        }
        let mut company = Company::new(record.company_name, record.cik, record.sic)?;
        company.securities = record.securities;
        Ok(company)
    }
}
