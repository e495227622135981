use crate::random::RandomSource;
use crate::scoring::{ScoreBreakdown, ScoredCountry};

pub const DEFAULT_TOP_N: usize = 3;

// Thresholds on weighted contributions.
const FESTIVAL_REASON_MIN: f64 = 20.0;
const SEASON_REASON_MIN: f64 = 15.0;
const EXCHANGE_REASON_MIN: f64 = 12.0;
const VISITED_REASON_MIN: f64 = 10.0;

/// Highest `n` entries by total score, best first. Ties keep catalog order.
pub fn top_n(mut scored: Vec<ScoredCountry>, n: usize) -> Vec<ScoredCountry> {
    scored.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
    scored.truncate(n.max(1));
    scored
}

/// Uniform pick among the top `n`. `None` only when nothing was scored.
pub fn select_recommendation(
    scored: Vec<ScoredCountry>,
    n: usize,
    rng: &dyn RandomSource,
) -> Option<ScoredCountry> {
    let mut top = top_n(scored, n);
    if top.is_empty() {
        return None;
    }
    let idx = rng.pick_index(top.len());
    Some(top.swap_remove(idx))
}

/// Advisory tags shown next to the selected country.
pub fn reason_tags(breakdown: &ScoreBreakdown) -> Vec<String> {
    let mut reasons = Vec::new();
    if breakdown.festival > FESTIVAL_REASON_MIN {
        reasons.push("축제/이벤트".to_string());
    }
    if breakdown.season > SEASON_REASON_MIN {
        reasons.push("좋은 계절".to_string());
    }
    if breakdown.exchange > EXCHANGE_REASON_MIN {
        reasons.push("좋은 환율".to_string());
    }
    if breakdown.visited > VISITED_REASON_MIN {
        reasons.push("새로운 경험".to_string());
    }
    reasons
}
