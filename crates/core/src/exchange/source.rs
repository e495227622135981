use crate::config::Settings;
use crate::exchange::ExchangeRateTable;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_URL: &str = "https://open.er-api.com/v6/latest/KRW";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RETRIES: u32 = 2;
const BACKOFF_BASE_MS: u64 = 250;

#[async_trait::async_trait]
pub trait ExchangeRateSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_rates(&self) -> Result<ExchangeRateTable>;
}

#[derive(Debug, Clone)]
pub struct HttpExchangeRateSource {
    http: reqwest::Client,
    url: String,
    retries: u32,
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    base_code: Option<String>,
    rates: HashMap<String, f64>,
}

impl HttpExchangeRateSource {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let url = settings
            .exchange_rate_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_URL.to_string());

        let timeout_secs = std::env::var("EXCHANGE_RATE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("EXCHANGE_RATE_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build exchange rate http client")?;

        Ok(Self { http, url, retries })
    }

    async fn fetch_once(&self) -> Result<ExchangeRateTable> {
        let res = self
            .http
            .get(&self.url)
            .send()
            .await
            .context("exchange rate request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read exchange rate response")?;

        if !status.is_success() {
            anyhow::bail!("exchange rate HTTP {status}: {text}");
        }

        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("exchange rate response is not valid JSON: {text}"))?;
        parse_latest_rates(raw_json)
    }
}

fn parse_latest_rates(raw_json: Value) -> Result<ExchangeRateTable> {
    let parsed = serde_json::from_value::<LatestRatesResponse>(raw_json)
        .context("failed to parse exchange rate response")?;

    if let Some(result) = parsed.result.as_deref() {
        anyhow::ensure!(result == "success", "exchange rate service reported result={result}");
    }
    if let Some(base) = parsed.base_code.as_deref() {
        anyhow::ensure!(base == "KRW", "unexpected base currency {base}");
    }
    anyhow::ensure!(!parsed.rates.is_empty(), "exchange rate response has no rates");

    Ok(parsed.rates.into_iter().collect())
}

#[async_trait::async_trait]
impl ExchangeRateSource for HttpExchangeRateSource {
    fn source_name(&self) -> &'static str {
        "http_json_rates"
    }

    async fn fetch_rates(&self) -> Result<ExchangeRateTable> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once().await {
                Ok(table) => return Ok(table),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_millis(BACKOFF_BASE_MS << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, error = %err, "exchange rate fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_rates_object() {
        let v = json!({
            "result": "success",
            "base_code": "KRW",
            "rates": {"KRW": 1, "USD": 0.00075, "JPY": 0.1176}
        });
        let table = parse_latest_rates(v).unwrap();
        assert_eq!(table.get("USD"), Some(0.00075));
        assert_eq!(table.get("KRW"), Some(1.0));
    }

    #[test]
    fn rejects_error_results_and_wrong_base() {
        assert!(parse_latest_rates(json!({"result": "error", "rates": {"USD": 1.0}})).is_err());
        assert!(parse_latest_rates(json!({"base_code": "USD", "rates": {"KRW": 1300.0}})).is_err());
        assert!(parse_latest_rates(json!({"rates": {}})).is_err());
        assert!(parse_latest_rates(json!({"rates": {"USD": "cheap"}})).is_err());
    }
}
