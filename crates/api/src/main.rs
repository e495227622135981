mod routes;

use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tripdraw_core::auth::SupabaseAuthenticator;
use tripdraw_core::config::Settings;
use tripdraw_core::exchange::{ExchangeRateFetcher, HttpExchangeRateSource};
use tripdraw_core::quota::QuotaTracker;
use tripdraw_core::random::ThreadRandom;
use tripdraw_core::recommend::{RecommendOptions, Recommender};
use tripdraw_core::storage::{PgQuotaStore, PgTravelHistoryStore};
use tripdraw_core::time::SystemClock;

use routes::AppState;

const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 5;
const MIGRATION_RETRY_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match tripdraw_core::storage::lazy_pool(db_url, db_acquire_timeout()) {
            Ok(pool) => {
                if let Err(e) = tripdraw_core::storage::migrate(&pool).await {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; retrying in background");
                    tokio::spawn(retry_migrations(pool.clone()));
                }
                Some(pool)
            }
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "DATABASE_URL unusable; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let recommender = match pool {
        Some(pool) => match build_recommender(&settings, pool) {
            Ok(recommender) => Some(recommender),
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "recommender setup failed; starting API in degraded mode");
                None
            }
        },
        None => None,
    };

    let state = AppState {
        recommender,
        random: Arc::new(ThreadRandom),
    };
    let app = routes::app(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_recommender(settings: &Settings, pool: PgPool) -> anyhow::Result<Recommender> {
    let options = RecommendOptions::from_env();
    let clock = Arc::new(SystemClock);

    let auth = SupabaseAuthenticator::from_settings(settings).context("auth setup failed")?;
    let rate_source =
        HttpExchangeRateSource::from_settings(settings).context("exchange rate setup failed")?;
    let generator = tripdraw_core::llm::from_settings(settings).context("narrative setup failed")?;

    let quota = QuotaTracker::new(
        Arc::new(PgQuotaStore::new(pool.clone())),
        clock.clone(),
        options.daily_limit,
    );
    let rates = Arc::new(ExchangeRateFetcher::new(Arc::new(rate_source), clock.clone()));

    tracing::info!(
        daily_limit = options.daily_limit,
        top_n = options.top_n,
        narrative = generator.as_ref().map(|g| g.provider().as_str()).unwrap_or("fallback"),
        "recommender configured"
    );

    Ok(Recommender::new(
        Arc::new(auth),
        quota,
        Arc::new(PgTravelHistoryStore::new(pool)),
        rates,
        generator,
        options,
    )
    .with_clock(clock))
}

fn db_acquire_timeout() -> Duration {
    let secs = std::env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_DB_ACQUIRE_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

async fn retry_migrations(pool: PgPool) {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        tokio::time::sleep(MIGRATION_RETRY_INTERVAL).await;
        match tripdraw_core::storage::migrate(&pool).await {
            Ok(()) => {
                tracing::info!(attempt, "db migrations applied");
                return;
            }
            Err(e) => tracing::warn!(attempt, error = %e, "db migrations still failing"),
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
