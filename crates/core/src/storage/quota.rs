use crate::quota::QuotaStore;
use anyhow::Context;
use chrono::NaiveDate;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgQuotaStore {
    pool: sqlx::PgPool,
}

impl PgQuotaStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl QuotaStore for PgQuotaStore {
    async fn used_count(&self, user_id: Uuid, date: NaiveDate) -> anyhow::Result<u32> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT count FROM travel_recommendations WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .context("select travel_recommendations failed")?;

        Ok(row.map(|(count,)| count.max(0) as u32).unwrap_or(0))
    }

    async fn increment_below(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        limit: u32,
    ) -> anyhow::Result<Option<u32>> {
        let limit = i32::try_from(limit).context("daily limit does not fit in INTEGER")?;

        // Single statement: the row lock taken by ON CONFLICT serializes concurrent requests for
        // the same (user_id, date), and the WHERE clause refuses the increment at the cap.
        let row: Option<(i32,)> = sqlx::query_as(
            "INSERT INTO travel_recommendations (user_id, date, count, updated_at) \
             VALUES ($1, $2, 1, now()) \
             ON CONFLICT (user_id, date) DO UPDATE \
               SET count = travel_recommendations.count + 1, updated_at = now() \
               WHERE travel_recommendations.count < $3 \
             RETURNING count",
        )
        .persistent(false)
        .bind(user_id)
        .bind(date)
        .bind(limit)
        .fetch_optional(&self.pool)
        .await
        .context("upsert travel_recommendations failed")?;

        let new_count = row.map(|(count,)| count.max(0) as u32);
        tracing::debug!(%user_id, %date, ?new_count, "quota increment");
        Ok(new_count)
    }
}
