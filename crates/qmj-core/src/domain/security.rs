use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{FiscalPeriod, FundamentalSnapshot, PriceHistory, UtcDateTime, ValidationError};

/// Exchange listing details carried by a stock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockListing {
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl StockListing {
    pub fn new(exchange: Option<String>, currency: Option<String>) -> Self {
        Self { exchange, currency }
    }
}

/// What kind of instrument a security is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecurityKind {
    #[default]
    Generic,
    Stock(StockListing),
}

impl SecurityKind {
    /// Stable label used by the persisted `security_kind` column.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Stock(_) => "stock",
        }
    }
}

/// A tradable instrument issued by a company.
///
/// The ticker is derived from root and suffix once, at construction, and
/// cannot be changed afterwards. Fundamentals and prices belong to the
/// security; for a stock, `prices` is its daily price history.
///
/// The kind is written flat: `"kind": "stock"` next to `exchange` and
/// `currency`. On input `daily_prices` is accepted for `prices`, and a
/// record without `kind` that names an exchange or currency is a stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SecurityRecord")]
pub struct Security {
    ticker_root: String,
    ticker_suffix: String,
    ticker: String,
    pub is_active: bool,
    pub list_date: Date,
    pub delisted_utc: Option<UtcDateTime>,
    pub locale: String,
    #[serde(flatten)]
    pub kind: SecurityKind,
    pub prices: PriceHistory,
    pub fundamentals: Vec<FundamentalSnapshot>,
}

impl Security {
    /// Create an active security with no prices or fundamentals.
    pub fn new(
        ticker_root: impl Into<String>,
        ticker_suffix: impl Into<String>,
        list_date: Date,
        locale: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let ticker_root = ticker_root.into();
        let ticker_suffix = ticker_suffix.into();
        let ticker = derive_ticker(&ticker_root, &ticker_suffix)?;

        Ok(Self {
            ticker_root,
            ticker_suffix,
            ticker,
            is_active: true,
            list_date,
            delisted_utc: None,
            locale: locale.into(),
            kind: SecurityKind::Generic,
            prices: PriceHistory::default(),
            fundamentals: Vec::new(),
        })
    }

    /// Create a security listed on an exchange.
    pub fn stock(
        ticker_root: impl Into<String>,
        ticker_suffix: impl Into<String>,
        list_date: Date,
        locale: impl Into<String>,
        listing: StockListing,
    ) -> Result<Self, ValidationError> {
        Ok(Self::new(ticker_root, ticker_suffix, list_date, locale)?
            .with_kind(SecurityKind::Stock(listing)))
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn with_delisted_utc(mut self, delisted_utc: Option<UtcDateTime>) -> Self {
        self.delisted_utc = delisted_utc;
        self
    }

    pub fn with_kind(mut self, kind: SecurityKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_prices(mut self, prices: PriceHistory) -> Self {
        self.prices = prices;
        self
    }

    pub fn with_fundamentals(mut self, fundamentals: Vec<FundamentalSnapshot>) -> Self {
        self.fundamentals = fundamentals;
        self
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn ticker_root(&self) -> &str {
        &self.ticker_root
    }

    pub fn ticker_suffix(&self) -> &str {
        &self.ticker_suffix
    }

    pub fn as_stock(&self) -> Option<&StockListing> {
        match &self.kind {
            SecurityKind::Stock(listing) => Some(listing),
            SecurityKind::Generic => None,
        }
    }

    pub fn is_stock(&self) -> bool {
        self.as_stock().is_some()
    }

    /// Whether a snapshot for this report date and period is already held.
    pub fn has_fundamental_for(&self, report_date: Date, fiscal_period: FiscalPeriod) -> bool {
        self.fundamentals.iter().any(|snapshot| {
            snapshot.report_date == report_date && snapshot.fiscal_period == fiscal_period
        })
    }
}

impl Display for Security {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.ticker)
    }
}

fn derive_ticker(root: &str, suffix: &str) -> Result<String, ValidationError> {
    if root.is_empty() {
        return Err(ValidationError::EmptyTickerRoot);
    }
    reject_whitespace("root", root)?;
    reject_whitespace("suffix", suffix)?;

    let mut ticker = String::with_capacity(root.len() + suffix.len());
    ticker.push_str(root);
    ticker.push_str(suffix);
    Ok(ticker)
}

fn reject_whitespace(part: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.chars().any(char::is_whitespace) {
        return Err(ValidationError::TickerWhitespace {
            part,
            value: value.to_owned(),
        });
    }
    Ok(())
}

/// Wire form of [`Security`]; the ticker is recomputed rather than trusted.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SecurityRecord {
    ticker_root: String,
    #[serde(default)]
    ticker_suffix: String,
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default = "default_active", alias = "isActive")]
    is_active: bool,
    list_date: Date,
    #[serde(default)]
    delisted_utc: Option<UtcDateTime>,
    locale: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    exchange: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default, alias = "daily_prices")]
    prices: PriceHistory,
    #[serde(default)]
    fundamentals: Vec<FundamentalSnapshot>,
}

fn default_active() -> bool {
    true
}

impl TryFrom<SecurityRecord> for Security {
    type Error = ValidationError;

    fn try_from(record: SecurityRecord) -> Result<Self, Self::Error> {
        let security = Security::new(
            record.ticker_root,
            record.ticker_suffix,
            record.list_date,
            record.locale,
        )?;

        if let Some(supplied) = record.ticker {
            if supplied != security.ticker {
                return Err(ValidationError::TickerMismatch {
                    supplied,
                    derived: security.ticker,
                });
            }
        }

        let has_listing = record.exchange.is_some() || record.currency.is_some();
        let kind = match record.kind.as_deref() {
            Some("stock") => SecurityKind::Stock(StockListing::new(record.exchange, record.currency)),
            None if has_listing => {
                SecurityKind::Stock(StockListing::new(record.exchange, record.currency))
            }
            Some("generic") | None => {
                if has_listing {
                    return Err(ValidationError::ListingOnGenericSecurity {
                        ticker: security.ticker,
                    });
                }
                SecurityKind::Generic
            }
            Some(other) => {
                return Err(ValidationError::UnknownSecurityKind {
                    value: other.to_owned(),
                })
            }
        };

        Ok(security
            .with_active(record.is_active)
            .with_delisted_utc(record.delisted_utc)
            .with_kind(kind)
            .with_prices(record.prices)
            .with_fundamentals(record.fundamentals))
    }
}
