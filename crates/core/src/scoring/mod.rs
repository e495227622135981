//! Weighted multi-signal scoring of the country catalog.
//!
//! Five independent sub-scores are computed per country and combined with fixed weights.
//! Every catalog entry is scored on every request; the catalog is small enough that no
//! pruning is needed.

pub mod preference;
pub mod select;

use crate::catalog::{all_countries, CountryRecord};
use crate::domain::travel::{TravelPreferences, TravelProfile, UserTravelHistory};
use crate::exchange::ExchangeRateTable;
use serde::Serialize;

pub use preference::preference_score;
pub use select::{reason_tags, select_recommendation, top_n};

const FESTIVAL_SCORE: f64 = 90.0;
const NO_FESTIVAL_SCORE: f64 = 60.0;
const EQUATORIAL_SEASON_SCORE: f64 = 70.0;
const NEUTRAL_EXCHANGE_SCORE: f64 = 50.0;

/// Months with a well-known festival, per country code.
const FESTIVAL_CALENDAR: &[(&str, &[u32])] = &[
    ("JP", &[3, 4, 7, 8]),
    ("TH", &[4, 11]),
    ("BR", &[2, 6]),
    ("DE", &[9, 10]),
    ("ES", &[7, 8]),
];

/// Combiner weights. The defaults sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreWeights {
    pub festival: f64,
    pub season: f64,
    pub preference: f64,
    pub visited: f64,
    pub exchange: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            festival: 0.30,
            season: 0.20,
            preference: 0.20,
            visited: 0.15,
            exchange: 0.15,
        }
    }
}

impl ScoreWeights {
    pub fn from_env() -> Self {
        fn read(key: &str, default: f64) -> f64 {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|w| w.is_finite() && *w >= 0.0)
                .unwrap_or(default)
        }

        let d = Self::default();
        let out = Self {
            festival: read("SCORE_WEIGHT_FESTIVAL", d.festival),
            season: read("SCORE_WEIGHT_SEASON", d.season),
            preference: read("SCORE_WEIGHT_PREFERENCE", d.preference),
            visited: read("SCORE_WEIGHT_VISITED", d.visited),
            exchange: read("SCORE_WEIGHT_EXCHANGE", d.exchange),
        };
        if (out.sum() - 1.0).abs() > 1e-6 {
            tracing::warn!(sum = out.sum(), "score weights do not sum to 1.0");
        }
        out
    }

    pub fn sum(&self) -> f64 {
        self.festival + self.season + self.preference + self.visited + self.exchange
    }
}

/// Everything a sub-score may depend on for one request.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub month: u32,
    pub profile: &'a TravelProfile,
    pub preferences: Option<&'a TravelPreferences>,
    pub history: &'a UserTravelHistory,
    pub rates: &'a ExchangeRateTable,
}

/// Unweighted sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubScores {
    pub festival: f64,
    pub season: f64,
    pub preference: f64,
    pub visited: f64,
    pub exchange: f64,
}

/// Weighted contribution of each sub-score to the total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub festival: f64,
    pub season: f64,
    pub preference: f64,
    pub visited: f64,
    pub exchange: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCountry {
    pub country: &'static CountryRecord,
    pub total_score: f64,
    pub breakdown: ScoreBreakdown,
    pub sub_scores: SubScores,
}

pub fn festival_score(country: &CountryRecord, month: u32) -> f64 {
    let has_festival = FESTIVAL_CALENDAR
        .iter()
        .any(|(code, months)| *code == country.code && months.contains(&month));
    if has_festival {
        FESTIVAL_SCORE
    } else {
        NO_FESTIVAL_SCORE
    }
}

/// Hemisphere-aware season score; the south is shifted by two seasons.
pub fn season_score(country: &CountryRecord, month: u32) -> f64 {
    let lat = country.latitude;
    if lat > 0.0 {
        match month {
            3..=5 => 80.0,
            6..=8 => 70.0,
            9..=11 => 85.0,
            _ => 60.0,
        }
    } else if lat < 0.0 {
        match month {
            3..=5 => 70.0,
            6..=8 => 60.0,
            9..=11 => 85.0,
            _ => 80.0,
        }
    } else {
        EQUATORIAL_SEASON_SCORE
    }
}

/// Novelty reward, softened revisit penalty for highly rated countries.
pub fn visited_score(country_code: &str, history: &UserTravelHistory) -> f64 {
    let rating = history.rating(country_code).map(|r| r.rating);
    match history.visit_count(country_code) {
        0 => 80.0,
        1 => {
            if rating.is_some_and(|r| r >= 4) {
                50.0
            } else {
                40.0
            }
        }
        _ => {
            if rating == Some(5) {
                35.0
            } else {
                20.0
            }
        }
    }
}

/// Weaker won per unit of local currency scores higher. Missing data is neutral and is not
/// budget-adjusted.
pub fn exchange_score(
    country: &CountryRecord,
    rates: &ExchangeRateTable,
    budget: Option<&str>,
) -> f64 {
    let Some(rate) = rates.get(country.rate_currency()) else {
        return NEUTRAL_EXCHANGE_SCORE;
    };

    let mut score = (100.0 - rate * 10_000.0).max(0.0);
    match budget {
        Some("budget") => score *= 1.3,
        Some("luxury") => score *= 0.7,
        _ => {}
    }
    score.min(100.0)
}

pub fn sub_scores(country: &CountryRecord, ctx: &ScoringContext<'_>) -> SubScores {
    SubScores {
        festival: festival_score(country, ctx.month),
        season: season_score(country, ctx.month),
        preference: preference_score(country, ctx.profile, ctx.preferences),
        visited: visited_score(country.code, ctx.history),
        exchange: exchange_score(country, ctx.rates, ctx.profile.get("budget")),
    }
}

pub fn combine(sub: &SubScores, weights: &ScoreWeights) -> (f64, ScoreBreakdown) {
    let breakdown = ScoreBreakdown {
        festival: sub.festival * weights.festival,
        season: sub.season * weights.season,
        preference: sub.preference * weights.preference,
        visited: sub.visited * weights.visited,
        exchange: sub.exchange * weights.exchange,
    };
    let total = breakdown.festival
        + breakdown.season
        + breakdown.preference
        + breakdown.visited
        + breakdown.exchange;
    let total = if total.is_finite() { total.clamp(0.0, 100.0) } else { 0.0 };
    (total, breakdown)
}

pub fn score_country(
    country: &'static CountryRecord,
    ctx: &ScoringContext<'_>,
    weights: &ScoreWeights,
) -> ScoredCountry {
    let sub = sub_scores(country, ctx);
    let (total_score, breakdown) = combine(&sub, weights);
    ScoredCountry {
        country,
        total_score,
        breakdown,
        sub_scores: sub,
    }
}

/// Scores the whole catalog, in catalog order.
pub fn score_all(ctx: &ScoringContext<'_>, weights: &ScoreWeights) -> Vec<ScoredCountry> {
    all_countries()
        .iter()
        .map(|country| score_country(country, ctx, weights))
        .collect()
}
