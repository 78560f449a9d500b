use thiserror::Error;

/// Validation and contract errors exposed by `qmj-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ticker root cannot be empty")]
    EmptyTickerRoot,
    #[error("ticker {part} contains whitespace: '{value}'")]
    TickerWhitespace { part: &'static str, value: String },
    #[error("ticker '{supplied}' does not match root+suffix '{derived}'")]
    TickerMismatch { supplied: String, derived: String },
    #[error("unknown security kind '{value}', expected generic or stock")]
    UnknownSecurityKind { value: String },
    #[error("security '{ticker}' is generic but carries exchange or currency")]
    ListingOnGenericSecurity { ticker: String },

    #[error("company name cannot be empty")]
    EmptyCompanyName,
    #[error("company CIK cannot be empty")]
    EmptyCik,
    #[error("company '{company_name}' lists fundamentals at company level; attach them to a security")]
    CompanyLevelFundamentals { company_name: String },

    #[error("invalid fiscal period '{value}', expected one of Q1, Q2, Q3, Q4 (1-4)")]
    InvalidFiscalPeriod { value: String },
    #[error("fundamental snapshot is missing its {statement}")]
    MissingStatement { statement: &'static str },
    #[error("{statement} expects {expected} line items, got {actual}")]
    LineItemCount {
        statement: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("date must be YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
