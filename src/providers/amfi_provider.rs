use crate::core::cache::{KeyValueCollection, Store};
use crate::core::{HistoricalPeriod, PriceProvider, PriceResult};
use crate::providers::util::{seconds_until, with_retry};
use crate::store::KeyValueStore;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct AmfiProvider {
    base_url: String,
    cache: Arc<dyn KeyValueCollection>,
}

impl AmfiProvider {
    pub fn new(base_url: &str, cache: Arc<KeyValueStore>) -> Self {
        let collection = cache.get_collection("amfi", true, true).unwrap();
        AmfiProvider {
            base_url: base_url.to_string(),
            cache: collection,
        }
    }

    #[cfg(test)]
    pub(crate) fn new_with_collection(base_url: &str, cache: Arc<dyn KeyValueCollection>) -> Self {
        Self {
            base_url: base_url.to_string(),
            cache,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AmfiResponse {
    nav: f64,
    date: String,
    name: Option<String>,
    #[serde(default)]
    historical_nav: Vec<(String, f64)>,
}

#[async_trait]
impl PriceProvider for AmfiProvider {
    async fn fetch_price(&self, identifier: &str) -> Result<PriceResult> {
        if let Some(cached) = self.cache.get(identifier.as_bytes()).await {
            return Ok(serde_json::from_slice(&cached)?);
        }

        let url = format!("{}/nav/{}", self.base_url, identifier);
        debug!("Requesting price data from {}", url);

        let client = reqwest::Client::builder().user_agent("xmf/1.0").build()?;
        let response = with_retry(|| async { client.get(&url).send().await }, 3, 500)
            .await
            .with_context(|| format!("Failed to send request for ISIN: {identifier}"))?;

        let response_text = response
            .text()
            .await
            .with_context(|| format!("Failed to get response text for ISIN: {identifier}"))?;

        // Check for empty or non-JSON responses before parsing
        if response_text.trim().is_empty() {
            return Err(anyhow!("Received empty response for ISIN: {}", identifier));
        }

        let amfi_response: AmfiResponse =
            serde_json::from_str(&response_text).with_context(|| {
                format!(
                    "Failed to parse AMFI response for ISIN: {identifier}. Response: '{response_text}'",
                )
            })?;

        debug!(
            "Successfully fetched price for ISIN {}: {:?}",
            identifier, amfi_response.nav
        );

        let current_price = amfi_response.nav;
        let currency = "INR".to_string();
        let short_name = amfi_response.name;

        let mut historical_prices = HashMap::new();

        if !amfi_response.historical_nav.is_empty() {
            let prices: Vec<_> = amfi_response
                .historical_nav
                .iter()
                .filter_map(|(date_str, price)| {
                    chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                        .ok()
                        .map(|date| (date, *price))
                })
                .collect();

            if !prices.is_empty() {
                let current_nav_date =
                    chrono::NaiveDate::parse_from_str(&amfi_response.date, "%Y-%m-%d")
                        .unwrap_or_else(|e| {
                            debug!(
                                "Could not parse date from AMFI response for ISIN {}: '{}' ({}). Falling back to current date.",
                                identifier, amfi_response.date, e
                            );
                            chrono::Utc::now().date_naive()
                        });
                for period in [
                    HistoricalPeriod::OneDay,
                    HistoricalPeriod::FiveDays,
                    HistoricalPeriod::OneMonth,
                    HistoricalPeriod::OneYear,
                    HistoricalPeriod::ThreeYears,
                    HistoricalPeriod::FiveYears,
                    HistoricalPeriod::TenYears,
                ] {
                    let period_start_date = current_nav_date - period.to_duration();

                    if let Some((_date, price)) = prices
                        .iter()
                        .rev()
                        .find(|(date, _)| *date <= period_start_date)
                        && *price > 0.0
                    {
                        historical_prices.insert(period, *price);
                    }
                }
            }
        }

        let mut daily_prices: Vec<(chrono::NaiveDate, f64)> = amfi_response
            .historical_nav
            .into_iter()
            .map(|(date_str, price)| {
                chrono::NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map(|date| (date, price))
            })
            .filter_map(Result::ok)
            .collect();

        // Add current day data
        if let Ok(current_date) = chrono::NaiveDate::parse_from_str(&amfi_response.date, "%Y-%m-%d")
        {
            daily_prices.push((current_date, current_price));
        }

        // Sort by date and remove duplicates (keep last occurrence for same date)
        daily_prices.sort_by_key(|(date, _)| *date);
        daily_prices.dedup_by_key(|(date, _)| *date);

        let result = PriceResult {
            price: current_price,
            currency,
            historical_prices,
            daily_prices,
            short_name,
        };

        // Calculate TTL until next refresh at 7PM UTC
        let ttl_seconds = match seconds_until(19, 0) {
            Ok(ttl) => ttl,
            Err(e) => {
                warn!(
                    "Failed calculating 7PM UTC refresh TTL: {}. Using fallback 1 day",
                    e
                );
                24 * 60 * 60 // Fallback to 1 day
            }
        };

        // Cache with TTL aligned to 7PM UTC refresh schedule
        self.cache
            .put(
                identifier.as_bytes(),
                &serde_json::to_vec(&result).unwrap(),
                Some(Duration::from_secs(ttl_seconds)),
            )
            .await;

        Ok(result)
    }
}
