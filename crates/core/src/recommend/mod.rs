//! Request orchestration: auth, quota, scoring, then the event stream.

pub mod finalize;
pub mod prompt;

use crate::auth::{AuthenticatedUser, Authenticator};
use crate::catalog::{all_countries, CountryRecord};
use crate::domain::contract::RecommendationEvent;
use crate::domain::travel::{TravelProfile, UserTravelHistory};
use crate::exchange::{ExchangeRateFetcher, ExchangeRateInfo, ExchangeRateTable};
use crate::llm::{NarrativeGenerator, NarrativeRequest, NarrativeStream};
use crate::quota::{QuotaStatus, QuotaTracker, DEFAULT_DAILY_LIMIT};
use crate::random::{RandomSource, ThreadRandom};
use crate::scoring::select::DEFAULT_TOP_N;
use crate::scoring::{
    reason_tags, score_all, select_recommendation, ScoreWeights, ScoredCountry, ScoringContext,
};
use crate::storage::TravelHistoryStore;
use crate::time::{scoring_month, Clock, SystemClock};
use anyhow::anyhow;
use finalize::{finalize, unavailable_narrative, DEFAULT_MIN_NARRATIVE_CHARS, DEFAULT_SLOGAN};
use futures::StreamExt;
use prompt::{system_prompt, user_prompt, PromptInput};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

const EVENT_BUFFER: usize = 32;

pub type RecommendationStream = ReceiverStream<RecommendationEvent>;

/// Failures reported before any event is streamed.
#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("daily limit of {daily_limit} recommendations reached")]
    QuotaExceeded { daily_limit: u32 },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct RecommendOptions {
    pub top_n: usize,
    pub weights: ScoreWeights,
    pub daily_limit: u32,
    pub min_narrative_chars: usize,
    pub max_tokens: Option<u32>,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            weights: ScoreWeights::default(),
            daily_limit: DEFAULT_DAILY_LIMIT,
            min_narrative_chars: DEFAULT_MIN_NARRATIVE_CHARS,
            max_tokens: None,
        }
    }
}

impl RecommendOptions {
    pub fn from_env() -> Self {
        fn parse<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
        }

        let defaults = Self::default();
        Self {
            top_n: parse::<usize>("RECOMMEND_TOP_N")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.top_n),
            weights: ScoreWeights::from_env(),
            daily_limit: parse("RECOMMEND_DAILY_LIMIT").unwrap_or(defaults.daily_limit),
            min_narrative_chars: parse("RECOMMEND_MIN_NARRATIVE_CHARS")
                .unwrap_or(defaults.min_narrative_chars),
            max_tokens: parse("RECOMMEND_MAX_TOKENS"),
        }
    }
}

/// The country picked for one request, with everything the stream needs about it.
#[derive(Debug, Clone)]
pub struct Selection {
    pub scored: ScoredCountry,
    pub reasons: Vec<String>,
    pub exchange: Option<ExchangeRateInfo>,
}

impl Selection {
    pub fn country(&self) -> &'static CountryRecord {
        self.scored.country
    }
}

#[derive(Clone)]
pub struct Recommender {
    auth: Arc<dyn Authenticator>,
    quota: QuotaTracker,
    history: Arc<dyn TravelHistoryStore>,
    rates: Arc<ExchangeRateFetcher>,
    generator: Option<Arc<dyn NarrativeGenerator>>,
    rng: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
    options: RecommendOptions,
}

impl Recommender {
    pub fn new(
        auth: Arc<dyn Authenticator>,
        quota: QuotaTracker,
        history: Arc<dyn TravelHistoryStore>,
        rates: Arc<ExchangeRateFetcher>,
        generator: Option<Arc<dyn NarrativeGenerator>>,
        options: RecommendOptions,
    ) -> Self {
        Self {
            auth,
            quota,
            history,
            rates,
            generator,
            rng: Arc::new(ThreadRandom),
            clock: Arc::new(SystemClock),
            options,
        }
    }

    pub fn with_random(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn daily_limit(&self) -> u32 {
        self.quota.daily_limit()
    }

    pub async fn authenticate(
        &self,
        access_token: Option<&str>,
    ) -> Result<AuthenticatedUser, RecommendError> {
        let token = access_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(RecommendError::AuthenticationRequired)?;
        match self.auth.authenticate(token).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(RecommendError::AuthenticationRequired),
            Err(err) => {
                tracing::warn!(error = %err, "token validation failed");
                Err(RecommendError::AuthenticationRequired)
            }
        }
    }

    /// Remaining allowance for the token's user; store failures report a full allowance.
    pub async fn remaining(&self, access_token: Option<&str>) -> Result<QuotaStatus, RecommendError> {
        let user = self.authenticate(access_token).await?;
        Ok(self.quota.get_remaining(user.id).await)
    }

    pub async fn recommend(
        &self,
        access_token: Option<&str>,
        profile: TravelProfile,
    ) -> Result<RecommendationStream, RecommendError> {
        let user = self.authenticate(access_token).await?;
        self.recommend_for_user(&user, profile).await
    }

    /// Everything after authentication. Returns once the country is chosen and the quota
    /// unit is spent; the narrative is produced by a spawned task feeding the stream.
    pub async fn recommend_for_user(
        &self,
        user: &AuthenticatedUser,
        profile: TravelProfile,
    ) -> Result<RecommendationStream, RecommendError> {
        let daily_limit = self.quota.daily_limit();
        let used_before = match self.quota.status(user.id).await {
            Ok(status) if status.exhausted() => {
                tracing::info!(user_id = %user.id, daily_limit, "daily recommendation limit reached");
                return Err(RecommendError::QuotaExceeded { daily_limit });
            }
            Ok(status) => status.used_count,
            Err(err) => {
                tracing::warn!(user_id = %user.id, error = %err, "quota check failed; proceeding");
                0
            }
        };

        let history = self.load_history(user.id).await;
        let rates = self.rates.get_exchange_rates().await;
        let selection = self.select(&profile, &history, &rates)?;

        let new_count = match self.quota.try_consume(user.id).await {
            Ok(consume) if consume.allowed => consume.new_count,
            Ok(_) => return Err(RecommendError::QuotaExceeded { daily_limit }),
            Err(err) => {
                tracing::warn!(user_id = %user.id, error = %err, "quota increment failed; serving anyway");
                used_before.saturating_add(1)
            }
        };
        let remaining_count = daily_limit.saturating_sub(new_count);

        tracing::info!(
            user_id = %user.id,
            country = selection.country().code,
            total_score = selection.scored.total_score,
            remaining_count,
            "recommendation selected"
        );

        let request = NarrativeRequest {
            system: system_prompt(),
            user: user_prompt(&PromptInput {
                country: selection.country(),
                reasons: &selection.reasons,
                exchange: selection.exchange.as_ref(),
                profile: &profile,
                history: &history,
            }),
            max_tokens: self.options.max_tokens,
        };

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let relay = Relay {
            tx,
            selection,
            remaining_count,
            daily_limit,
            min_narrative_chars: self.options.min_narrative_chars,
        };
        tokio::spawn(relay.run(self.generator.clone(), request));

        Ok(ReceiverStream::new(rx))
    }

    async fn load_history(&self, user_id: Uuid) -> UserTravelHistory {
        match self.history.load_history(user_id).await {
            Ok(history) => history,
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "travel history unavailable; scoring without it");
                UserTravelHistory::default()
            }
        }
    }

    /// Scores the whole catalog and draws one of the top entries.
    pub fn select(
        &self,
        profile: &TravelProfile,
        history: &UserTravelHistory,
        rates: &ExchangeRateTable,
    ) -> anyhow::Result<Selection> {
        let ctx = ScoringContext {
            month: scoring_month(self.clock.now()),
            profile,
            preferences: history.preferences.as_ref(),
            history,
            rates,
        };
        let scored = score_all(&ctx, &self.options.weights);
        let scored = select_recommendation(scored, self.options.top_n, self.rng.as_ref())
            .ok_or_else(|| anyhow!("no country could be scored (catalog size {})", all_countries().len()))?;

        Ok(Selection {
            reasons: reason_tags(&scored.breakdown),
            exchange: ExchangeRateInfo::lookup(rates, scored.country.rate_currency()),
            scored,
        })
    }
}

/// Producer side of one recommendation stream.
struct Relay {
    tx: mpsc::Sender<RecommendationEvent>,
    selection: Selection,
    remaining_count: u32,
    daily_limit: u32,
    min_narrative_chars: usize,
}

impl Relay {
    async fn run(self, generator: Option<Arc<dyn NarrativeGenerator>>, request: NarrativeRequest) {
        let country = self.selection.country();
        let first = RecommendationEvent::Country {
            country,
            reasons: self.selection.reasons.clone(),
            exchange_rate: self.selection.exchange.clone(),
        };
        if self.tx.send(first).await.is_err() {
            return;
        }

        let stream = match generator {
            Some(generator) => match generator.open_stream(request).await {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::warn!(
                        provider = generator.provider().as_str(),
                        country = country.code,
                        error = %err,
                        "narrative stream unavailable; sending default narrative"
                    );
                    self.send_unavailable().await;
                    return;
                }
            },
            None => {
                self.send_unavailable().await;
                return;
            }
        };

        let Some(raw) = self.relay_fragments(stream).await else {
            tracing::debug!(country = country.code, "client disconnected mid-stream");
            return;
        };

        let finalized = finalize(
            &raw,
            country,
            self.selection.exchange.as_ref(),
            self.min_narrative_chars,
        );
        if let Some(content) = finalized.fallback_content {
            tracing::warn!(country = country.code, "narrative stream was empty; using fallback");
            if !self.send(RecommendationEvent::Content { content }).await {
                return;
            }
        }
        self.finish(finalized.slogan, finalized.narrative).await;
    }

    /// Forwards fragments as they arrive. Returns the raw text, or `None` if the client left.
    async fn relay_fragments(&self, mut stream: NarrativeStream) -> Option<String> {
        let mut raw = String::new();
        loop {
            let next = tokio::select! {
                _ = self.tx.closed() => return None,
                next = stream.next() => next,
            };
            match next {
                Some(Ok(fragment)) => {
                    raw.push_str(&fragment);
                    if !self.send(RecommendationEvent::Content { content: fragment }).await {
                        return None;
                    }
                }
                Some(Err(err)) => {
                    tracing::warn!(
                        country = self.selection.country().code,
                        received_chars = raw.chars().count(),
                        error = %err,
                        "narrative stream failed; finalizing partial text"
                    );
                    break;
                }
                None => break,
            }
        }
        Some(raw)
    }

    async fn send_unavailable(&self) {
        let narrative = unavailable_narrative(self.selection.country());
        if !self
            .send(RecommendationEvent::Content {
                content: narrative.clone(),
            })
            .await
        {
            return;
        }
        self.finish(DEFAULT_SLOGAN.to_string(), narrative).await;
    }

    async fn finish(&self, slogan: String, narrative: String) {
        if !self.send(RecommendationEvent::Slogan { slogan }).await {
            return;
        }
        self.send(RecommendationEvent::Done {
            remaining_count: self.remaining_count,
            daily_limit: self.daily_limit,
            narrative,
        })
        .await;
    }

    async fn send(&self, event: RecommendationEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }
}
