pub mod format;
pub mod source;

use crate::time::Clock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub use format::{currency_name, exchange_rate_text, format_exchange_rate};
pub use source::{ExchangeRateSource, HttpExchangeRateSource};

pub const DEFAULT_CACHE_TTL_SECS: i64 = 3600;
pub const DEFAULT_FAILURE_BACKOFF_SECS: i64 = 60;

/// Currency code -> units of that currency per 1 KRW.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRateTable(HashMap<String, f64>);

impl ExchangeRateTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Usable rate for `currency`; zero, negative and non-finite entries count as missing.
    pub fn get(&self, currency: &str) -> Option<f64> {
        self.0
            .get(currency)
            .copied()
            .filter(|r| r.is_finite() && *r > 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn insert(&mut self, currency: impl Into<String>, rate: f64) {
        self.0.insert(currency.into(), rate);
    }

    pub fn with(mut self, currency: impl Into<String>, rate: f64) -> Self {
        self.insert(currency, rate);
        self
    }
}

impl FromIterator<(String, f64)> for ExchangeRateTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What the `country` event tells the client about the selected currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRateInfo {
    pub currency: String,
    pub rate: f64,
    pub trend: RateTrend,
    pub display: String,
}

/// Rate history is not tracked, so every quote reports `stable`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateTrend {
    #[default]
    Stable,
}

impl ExchangeRateInfo {
    pub fn lookup(table: &ExchangeRateTable, currency: &str) -> Option<Self> {
        let rate = table.get(currency)?;
        Some(Self {
            currency: currency.to_string(),
            rate,
            trend: RateTrend::Stable,
            display: exchange_rate_text(currency, rate),
        })
    }
}

#[derive(Debug, Clone)]
struct CachedRates {
    table: Arc<ExchangeRateTable>,
    fetched_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct CacheState {
    rates: Option<CachedRates>,
    failed_at: Option<DateTime<Utc>>,
}

/// Time-guarded read-through cache over an [`ExchangeRateSource`]. Never fails: a failed
/// refresh yields an empty table, and further refreshes are held off for the failure
/// backoff window.
///
/// At most one refresh is in flight. Callers arriving during a refresh wait for it and
/// share its outcome instead of issuing their own request. The state lock is never held
/// across the network call.
pub struct ExchangeRateFetcher {
    source: Arc<dyn ExchangeRateSource>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    failure_backoff: chrono::Duration,
    state: RwLock<CacheState>,
    refresh: Mutex<()>,
}

impl ExchangeRateFetcher {
    pub fn new(source: Arc<dyn ExchangeRateSource>, clock: Arc<dyn Clock>) -> Self {
        let secs = |key: &str, default: i64| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .filter(|s| *s >= 0)
                .unwrap_or(default)
        };
        let ttl = secs("EXCHANGE_RATE_CACHE_SECS", DEFAULT_CACHE_TTL_SECS);
        let backoff = secs("EXCHANGE_RATE_FAILURE_BACKOFF_SECS", DEFAULT_FAILURE_BACKOFF_SECS);
        Self::with_ttl(source, clock, chrono::Duration::seconds(ttl))
            .with_failure_backoff(chrono::Duration::seconds(backoff))
    }

    pub fn with_ttl(
        source: Arc<dyn ExchangeRateSource>,
        clock: Arc<dyn Clock>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            source,
            clock,
            ttl,
            failure_backoff: chrono::Duration::seconds(DEFAULT_FAILURE_BACKOFF_SECS),
            state: RwLock::new(CacheState::default()),
            refresh: Mutex::new(()),
        }
    }

    pub fn with_failure_backoff(mut self, backoff: chrono::Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }

    /// Answer from memory: a fresh table, or an empty one while a recent failure is
    /// being backed off. `None` means a refresh is due.
    async fn cached(&self, now: DateTime<Utc>) -> Option<Arc<ExchangeRateTable>> {
        let state = self.state.read().await;
        if let Some(cached) = state.rates.as_ref() {
            if now.signed_duration_since(cached.fetched_at) < self.ttl {
                return Some(cached.table.clone());
            }
        }
        match state.failed_at {
            Some(at) if now.signed_duration_since(at) < self.failure_backoff => {
                Some(Arc::new(ExchangeRateTable::empty()))
            }
            _ => None,
        }
    }

    pub async fn get_exchange_rates(&self) -> Arc<ExchangeRateTable> {
        if let Some(table) = self.cached(self.clock.now()).await {
            return table;
        }

        let _refresh = self.refresh.lock().await;
        // A refresh that finished while we queued answers for us too.
        if let Some(table) = self.cached(self.clock.now()).await {
            return table;
        }

        let fetched = self.source.fetch_rates().await;
        let now = self.clock.now();
        let mut state = self.state.write().await;
        match fetched {
            Ok(table) => {
                tracing::debug!(
                    source = self.source.source_name(),
                    currencies = table.len(),
                    "exchange rates refreshed"
                );
                let table = Arc::new(table);
                state.rates = Some(CachedRates {
                    table: table.clone(),
                    fetched_at: now,
                });
                state.failed_at = None;
                table
            }
            Err(err) => {
                tracing::warn!(
                    source = self.source.source_name(),
                    error = %err,
                    backoff_secs = self.failure_backoff.num_seconds(),
                    "exchange rate fetch failed; scoring with neutral exchange data"
                );
                state.failed_at = Some(now);
                Arc::new(ExchangeRateTable::empty())
            }
        }
    }
}
