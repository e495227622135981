pub mod history;
pub mod quota;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub use history::{InMemoryTravelHistoryStore, PgTravelHistoryStore, TravelHistoryStore};
pub use quota::PgQuotaStore;

/// Pool that opens connections on first use. An unreachable database shows up as
/// per-query errors after `acquire_timeout` instead of failing startup.
pub fn lazy_pool(db_url: &str, acquire_timeout: Duration) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(acquire_timeout)
        .connect_lazy(db_url)
        .context("invalid DATABASE_URL")
}

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::QuotaStore;
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[tokio::test]
    async fn lazy_pool_defers_connection_errors_to_queries() {
        assert!(lazy_pool("not a url", Duration::from_millis(200)).is_err());

        let pool = lazy_pool(
            "postgres://tripdraw@127.0.0.1:1/tripdraw",
            Duration::from_millis(200),
        )
        .unwrap();
        let store = PgQuotaStore::new(pool);
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert!(store.used_count(Uuid::new_v4(), date).await.is_err());
    }
}
