//! Lookup abstractions and core result types

use anyhow::Result;
use async_trait::async_trait;

/// Outcome of a rate or quote lookup.
///
/// `unit` is the value as displayed on the page (an exchange rate for
/// currency lookups, a per-share price for stock lookups) and `converted`
/// is that value scaled by the requested amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub converted: f64,
    pub unit: f64,
}

impl Conversion {
    /// Sentinel returned whenever the page yields no usable number.
    ///
    /// Rates and prices are never negative, so `-1.0` is unambiguous.
    pub const FAILED: Conversion = Conversion {
        converted: -1.0,
        unit: -1.0,
    };

    pub fn new(unit: f64, amount: f64) -> Self {
        Conversion {
            converted: unit * amount,
            unit,
        }
    }

    /// True when the lookup collapsed to the failure sentinel.
    pub fn failed(&self) -> bool {
        *self == Self::FAILED
    }
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Converts `amount` units of `from` into `to`.
    async fn convert(&self, from: &str, to: &str, amount: f64) -> Result<Conversion>;

    /// Fetches the plain exchange rate, i.e. a conversion of 1.0 units.
    async fn rate(&self, from: &str, to: &str) -> Result<Conversion> {
        self.convert(from, to, 1.0).await
    }
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Values `amount` shares of `symbol` as listed on `exchange`.
    async fn quote_value(&self, symbol: &str, exchange: &str, amount: f64) -> Result<Conversion>;

    /// Fetches the price of a single share.
    async fn quote(&self, symbol: &str, exchange: &str) -> Result<Conversion> {
        self.quote_value(symbol, exchange, 1.0).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_scales_by_amount() {
        let conversion = Conversion::new(1.0787, 2.0);
        assert!((conversion.converted - 2.1574).abs() < 1e-9);
        assert_eq!(conversion.unit, 1.0787);
        assert!(!conversion.failed());
    }

    #[test]
    fn test_failed_sentinel() {
        assert!(Conversion::FAILED.failed());
        assert_eq!(Conversion::FAILED.converted, -1.0);
        assert_eq!(Conversion::FAILED.unit, -1.0);
    }

    #[test]
    fn test_zero_unit_is_not_a_failure() {
        assert!(!Conversion::new(0.0, 1.0).failed());
    }
}
