use serde::{Deserialize, Serialize};

use crate::UtcDateTime;

/// One OHLCV observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timestamp: UtcDateTime,
}

impl Price {
    pub fn new(
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        timestamp: UtcDateTime,
    ) -> Self {
        Self {
            open,
            high,
            low,
            close,
            volume,
            timestamp,
        }
    }
}

/// Price observations for one security, in insertion order.
///
/// Callers are expected to append chronologically; the history does not
/// sort, de-duplicate or fill gaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceHistory {
    prices: Vec<Price>,
}

impl PriceHistory {
    pub fn new(prices: Vec<Price>) -> Self {
        Self { prices }
    }

    pub fn push(&mut self, price: Price) {
        self.prices.push(price);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Price> {
        self.prices.iter()
    }

    pub fn as_slice(&self) -> &[Price] {
        &self.prices
    }

    pub fn first(&self) -> Option<&Price> {
        self.prices.first()
    }

    pub fn last(&self) -> Option<&Price> {
        self.prices.last()
    }

    /// True when timestamps never decrease. Equal timestamps are allowed.
    pub fn is_chronological(&self) -> bool {
        self.prices
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    }

    pub fn into_inner(self) -> Vec<Price> {
        self.prices
    }
}

impl From<Vec<Price>> for PriceHistory {
    fn from(prices: Vec<Price>) -> Self {
        Self::new(prices)
    }
}

impl Extend<Price> for PriceHistory {
    fn extend<I: IntoIterator<Item = Price>>(&mut self, iter: I) {
        self.prices.extend(iter);
    }
}

impl FromIterator<Price> for PriceHistory {
    fn from_iter<I: IntoIterator<Item = Price>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PriceHistory {
    type Item = &'a Price;
    type IntoIter = std::slice::Iter<'a, Price>;

    fn into_iter(self) -> Self::IntoIter {
        self.prices.iter()
    }
}
