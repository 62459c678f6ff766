use crate::currency_provider::{CurrencyRateProvider, Result as CurrencyResult};
use crate::price_provider::{PriceProvider, PriceResult, Result as PriceResultGen};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

// Caching for PriceProvider
#[derive(Clone)]
pub struct CachingPriceProvider<T: PriceProvider> {
    inner: T,
    cache: Arc<Mutex<HashMap<String, Result<PriceResult, String>>>>,
}

impl<T: PriceProvider> CachingPriceProvider<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl<T: PriceProvider + Send + Sync> PriceProvider for CachingPriceProvider<T> {
    async fn fetch_price(&self, symbol: &str) -> Result<PriceResult> {
        let mut cache = self.cache.lock().await;
        if let Some(cached_result) = cache.get(symbol) {
            debug!("Cache hit for price: {}", symbol);
            return match cached_result {
                Ok(price_result) => Ok(price_result.clone()),
                Err(e) => Err(anyhow!(e.clone())),
            };
        }
        debug!("Cache miss for price: {}", symbol);
        let result = self.inner.fetch_price(symbol).await;
        cache.insert(
            symbol.to_string(),
            result.clone().map_err(|e| e.to_string()),
        );
        result
    }
}

// Caching for CurrencyRateProvider
#[derive(Clone)]
pub struct CachingCurrencyRateProvider<T: CurrencyRateProvider> {
    inner: T,
    cache: Arc<Mutex<HashMap<String, Result<f64, String>>>>,
}

impl<T: CurrencyRateProvider> CachingCurrencyRateProvider<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl<T: CurrencyRateProvider + Send + Sync> CurrencyRateProvider for CachingCurrencyRateProvider<T> {
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
        let key = format!("{from}-{to}");
        let mut cache = self.cache.lock().await;
        if let Some(cached_result) = cache.get(&key) {
            debug!("Cache hit for currency rate: {}", key);
            return match cached_result {
                Ok(rate) => Ok(*rate),
                Err(e) => Err(anyhow!(e.clone())),
            };
        }
        debug!("Cache miss for currency rate: {}", key);
        let result = self.inner.get_rate(from, to).await;
        cache.insert(key, result.map_err(|e| e.to_string()));
        result
    }
}
