//! Per-user, per-day cap on recommendation requests.

use crate::time::{quota_date, Clock};
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_DAILY_LIMIT: u32 = 100;

#[async_trait::async_trait]
pub trait QuotaStore: Send + Sync {
    async fn used_count(&self, user_id: Uuid, date: NaiveDate) -> Result<u32>;

    /// Insert-or-increment the `(user_id, date)` counter unless it already reached `limit`.
    /// Returns the new count, or `None` when the counter was left untouched. Must be atomic.
    async fn increment_below(&self, user_id: Uuid, date: NaiveDate, limit: u32)
        -> Result<Option<u32>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub remaining_count: u32,
    pub daily_limit: u32,
    pub used_count: u32,
}

impl QuotaStatus {
    pub fn from_used(used_count: u32, daily_limit: u32) -> Self {
        Self {
            remaining_count: daily_limit.saturating_sub(used_count),
            daily_limit,
            used_count,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.used_count >= self.daily_limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaConsume {
    pub allowed: bool,
    pub new_count: u32,
}

#[derive(Clone)]
pub struct QuotaTracker {
    store: Arc<dyn QuotaStore>,
    clock: Arc<dyn Clock>,
    daily_limit: u32,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn QuotaStore>, clock: Arc<dyn Clock>, daily_limit: u32) -> Self {
        Self {
            store,
            clock,
            daily_limit,
        }
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    fn today(&self) -> NaiveDate {
        quota_date(self.clock.now())
    }

    /// Strict read; callers decide how to degrade.
    pub async fn status(&self, user_id: Uuid) -> Result<QuotaStatus> {
        let used = self.store.used_count(user_id, self.today()).await?;
        Ok(QuotaStatus::from_used(used, self.daily_limit))
    }

    /// Remaining allowance. A store outage reports a full allowance instead of blocking.
    pub async fn get_remaining(&self, user_id: Uuid) -> QuotaStatus {
        match self.status(user_id).await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "quota store unavailable; reporting permissive default");
                QuotaStatus::from_used(0, self.daily_limit)
            }
        }
    }

    pub async fn try_consume(&self, user_id: Uuid) -> Result<QuotaConsume> {
        let date = self.today();
        if self.daily_limit == 0 {
            return Ok(QuotaConsume {
                allowed: false,
                new_count: 0,
            });
        }

        match self
            .store
            .increment_below(user_id, date, self.daily_limit)
            .await?
        {
            Some(new_count) => Ok(QuotaConsume {
                allowed: true,
                new_count,
            }),
            None => {
                let used = self
                    .store
                    .used_count(user_id, date)
                    .await
                    .unwrap_or(self.daily_limit);
                Ok(QuotaConsume {
                    allowed: false,
                    new_count: used,
                })
            }
        }
    }
}

/// Mutex-guarded counters with the same semantics as the Postgres store.
#[derive(Debug, Default)]
pub struct InMemoryQuotaStore {
    counts: tokio::sync::Mutex<HashMap<(Uuid, NaiveDate), u32>>,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, user_id: Uuid, date: NaiveDate, count: u32) {
        self.counts.lock().await.insert((user_id, date), count);
    }
}

#[async_trait::async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn used_count(&self, user_id: Uuid, date: NaiveDate) -> Result<u32> {
        Ok(self
            .counts
            .lock()
            .await
            .get(&(user_id, date))
            .copied()
            .unwrap_or(0))
    }

    async fn increment_below(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        limit: u32,
    ) -> Result<Option<u32>> {
        let mut counts = self.counts.lock().await;
        let count = counts.entry((user_id, date)).or_insert(0);
        if *count >= limit {
            return Ok(None);
        }
        *count += 1;
        Ok(Some(*count))
    }
}
