use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use sqlx::PgPool;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tripdraw_core::auth::{AuthenticatedUser, StaticAuthenticator};
use tripdraw_core::catalog::all_countries;
use tripdraw_core::config::Settings;
use tripdraw_core::domain::recommendation::RecommendationResult;
use tripdraw_core::domain::travel::{TravelProfile, UserTravelHistory};
use tripdraw_core::exchange::{
    exchange_rate_text, ExchangeRateFetcher, ExchangeRateSource, HttpExchangeRateSource,
};
use tripdraw_core::quota::QuotaTracker;
use tripdraw_core::recommend::{RecommendOptions, Recommender};
use tripdraw_core::scoring::{score_all, top_n, ScoringContext};
use tripdraw_core::storage::{PgQuotaStore, PgTravelHistoryStore, TravelHistoryStore};
use tripdraw_core::time::{scoring_month, SystemClock};

#[derive(Debug, Parser)]
#[command(name = "tripdraw")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score every catalog country for a profile and print the ranking.
    Rank {
        /// Questionnaire answer as `key=value`. Repeatable.
        #[arg(long = "answer", value_parser = parse_answer)]
        answers: Vec<(String, String)>,

        /// Month to score for (1-12). Defaults to the current month.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,

        /// Load visits, ratings and stored preferences for this user.
        #[arg(long)]
        user_id: Option<Uuid>,
    },

    /// Run a full recommendation for a user and print the streamed events.
    Recommend {
        #[arg(long)]
        user_id: Uuid,

        #[arg(long = "answer", value_parser = parse_answer)]
        answers: Vec<(String, String)>,
    },

    /// Fetch and print exchange rates for the catalog currencies.
    Rates,

    /// Apply database migrations.
    Migrate,
}

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

    let args = Args::parse();

    let result = match args.command {
        Command::Rank {
            answers,
            month,
            user_id,
        } => rank(&settings, profile_from(answers), month, user_id).await,
        Command::Recommend { user_id, answers } => {
            recommend(&settings, user_id, profile_from(answers)).await
        }
        Command::Rates => rates(&settings).await,
        Command::Migrate => {
            let pool = connect(&settings).await?;
            tripdraw_core::storage::migrate(&pool).await?;
            tracing::info!("migrations applied");
            Ok(())
        }
    };

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
    }
    result
}

async fn rank(
    settings: &Settings,
    profile: TravelProfile,
    month: Option<u32>,
    user_id: Option<Uuid>,
) -> anyhow::Result<()> {
    let history = match user_id {
        Some(user_id) => {
            let pool = connect(settings).await?;
            PgTravelHistoryStore::new(pool)
                .load_history(user_id)
                .await
                .with_context(|| format!("load history for {user_id} failed"))?
        }
        None => UserTravelHistory::default(),
    };

    let source = HttpExchangeRateSource::from_settings(settings)?;
    let fetcher = ExchangeRateFetcher::new(Arc::new(source), Arc::new(SystemClock));
    let rates = fetcher.get_exchange_rates().await;
    if rates.is_empty() {
        tracing::warn!("no exchange rates available; exchange scores fall back to neutral");
    }

    let month = month.unwrap_or_else(|| scoring_month(chrono::Utc::now()));
    let options = RecommendOptions::from_env();
    let ctx = ScoringContext {
        month,
        profile: &profile,
        preferences: history.preferences.as_ref(),
        history: &history,
        rates: rates.as_ref(),
    };
    let scored = score_all(&ctx, &options.weights);
    let total = scored.len();
    let ranked = top_n(scored, total);

    println!("month={month} countries={total} top_n={}", options.top_n);
    for (idx, entry) in ranked.iter().enumerate() {
        let b = &entry.breakdown;
        let marker = if idx < options.top_n { "*" } else { " " };
        println!(
            "{marker}{:>3}. {} {} ({}) total={:.1} festival={:.1} season={:.1} preference={:.1} visited={:.1} exchange={:.1}",
            idx + 1,
            entry.country.flag_glyph,
            entry.country.display_name,
            entry.country.code,
            entry.total_score,
            b.festival,
            b.season,
            b.preference,
            b.visited,
            b.exchange,
        );
    }
    Ok(())
}

async fn recommend(settings: &Settings, user_id: Uuid, profile: TravelProfile) -> anyhow::Result<()> {
    if profile.is_empty() {
        anyhow::bail!("at least one --answer key=value is required");
    }

    let pool = connect(settings).await?;
    let options = RecommendOptions::from_env();
    let clock = Arc::new(SystemClock);

    let rate_source = HttpExchangeRateSource::from_settings(settings)?;
    let generator = tripdraw_core::llm::from_settings(settings)?;
    let quota = QuotaTracker::new(
        Arc::new(PgQuotaStore::new(pool.clone())),
        clock.clone(),
        options.daily_limit,
    );

    let recommender = Recommender::new(
        Arc::new(StaticAuthenticator::new()),
        quota,
        Arc::new(PgTravelHistoryStore::new(pool)),
        Arc::new(ExchangeRateFetcher::new(Arc::new(rate_source), clock.clone())),
        generator,
        options,
    )
    .with_clock(clock);

    let user = AuthenticatedUser { id: user_id, email: None };
    let mut stream = recommender.recommend_for_user(&user, profile).await?;

    let mut result = RecommendationResult::new();
    while let Some(event) = stream.next().await {
        println!("{}", serde_json::to_string(&event)?);
        result.apply(&event)?;
    }

    if !result.is_complete() {
        anyhow::bail!("stream ended before the done event");
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn rates(settings: &Settings) -> anyhow::Result<()> {
    let source = HttpExchangeRateSource::from_settings(settings)?;
    let table = source
        .fetch_rates()
        .await
        .with_context(|| format!("{} fetch failed", source.source_name()))?;

    let currencies: BTreeSet<&str> = all_countries().iter().map(|c| c.rate_currency()).collect();
    for currency in currencies {
        match table.get(currency) {
            Some(rate) => println!("{currency}: {}", exchange_rate_text(currency, rate)),
            None => println!("{currency}: unavailable"),
        }
    }
    Ok(())
}

async fn connect(settings: &Settings) -> anyhow::Result<PgPool> {
    let db_url = settings.require_database_url()?;
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")
}

fn profile_from(answers: Vec<(String, String)>) -> TravelProfile {
    answers
        .into_iter()
        .fold(TravelProfile::new(), |profile, (key, value)| profile.with(key, value))
}

fn parse_answer(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return Err(format!("expected key=value, got `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
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
