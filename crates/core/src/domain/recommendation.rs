use crate::catalog::CountryRecord;
use crate::domain::contract::RecommendationEvent;
use crate::exchange::ExchangeRateInfo;
use anyhow::{bail, ensure};
use serde::Serialize;

/// Client-side view of a recommendation, assembled by applying stream events in order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResult {
    pub country: Option<&'static CountryRecord>,
    pub reasons: Vec<String>,
    pub exchange_rate_info: Option<ExchangeRateInfo>,
    pub narrative_text: String,
    pub slogan: Option<String>,
    pub remaining_count: Option<u32>,
    pub daily_limit: Option<u32>,
    #[serde(skip)]
    finished: bool,
}

impl RecommendationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects events that break the stream order (`country`, `content`*, `slogan`, `done`).
    pub fn apply(&mut self, event: &RecommendationEvent) -> anyhow::Result<()> {
        ensure!(!self.finished, "{} event after done", event.kind());
        match event {
            RecommendationEvent::Country {
                country,
                reasons,
                exchange_rate,
            } => {
                ensure!(self.country.is_none(), "duplicate country event");
                self.country = Some(*country);
                self.reasons = reasons.clone();
                self.exchange_rate_info = exchange_rate.clone();
            }
            RecommendationEvent::Content { content } => {
                ensure!(self.country.is_some(), "content event before country");
                ensure!(self.slogan.is_none(), "content event after slogan");
                self.narrative_text.push_str(content);
            }
            RecommendationEvent::Slogan { slogan } => {
                ensure!(self.country.is_some(), "slogan event before country");
                ensure!(self.slogan.is_none(), "duplicate slogan event");
                self.slogan = Some(slogan.clone());
            }
            RecommendationEvent::Done {
                remaining_count,
                daily_limit,
                narrative,
            } => {
                if self.country.is_none() {
                    bail!("done event before country");
                }
                ensure!(self.slogan.is_some(), "done event before slogan");
                self.remaining_count = Some(*remaining_count);
                self.daily_limit = Some(*daily_limit);
                self.narrative_text = narrative.clone();
                self.finished = true;
            }
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::find_country;

    fn country() -> RecommendationEvent {
        RecommendationEvent::Country {
            country: find_country("TH").unwrap(),
            reasons: vec!["새로운 경험".to_string()],
            exchange_rate: None,
        }
    }

    fn content(s: &str) -> RecommendationEvent {
        RecommendationEvent::Content {
            content: s.to_string(),
        }
    }

    fn slogan(s: &str) -> RecommendationEvent {
        RecommendationEvent::Slogan {
            slogan: s.to_string(),
        }
    }

    fn done() -> RecommendationEvent {
        RecommendationEvent::Done {
            remaining_count: 0,
            daily_limit: 1,
            narrative: String::new(),
        }
    }

    #[test]
    fn assembles_events_in_order() {
        let mut result = RecommendationResult::new();
        result.apply(&country()).unwrap();
        result.apply(&content("오늘은 ")).unwrap();
        result.apply(&content("태국!")).unwrap();
        assert_eq!(result.narrative_text, "오늘은 태국!");

        result
            .apply(&RecommendationEvent::Slogan {
                slogan: "s".to_string(),
            })
            .unwrap();
        result
            .apply(&RecommendationEvent::Done {
                remaining_count: 2,
                daily_limit: 3,
                narrative: "오늘은 태국! (final)".to_string(),
            })
            .unwrap();
        assert!(result.is_complete());
        assert_eq!(result.narrative_text, "오늘은 태국! (final)");
        assert_eq!(result.remaining_count, Some(2));
    }

    #[test]
    fn rejects_out_of_order_events() {
        let mut result = RecommendationResult::new();
        assert!(result.apply(&content("x")).is_err());

        result.apply(&country()).unwrap();
        assert!(result.apply(&country()).is_err());
        result.apply(&slogan("s")).unwrap();
        assert!(result.apply(&slogan("again")).is_err());
        result.apply(&done()).unwrap();
        assert!(result.apply(&content("late")).is_err());
    }

    #[test]
    fn done_requires_a_slogan_first() {
        let mut result = RecommendationResult::new();
        result.apply(&country()).unwrap();
        result.apply(&content("본문")).unwrap();

        let err = result.apply(&done()).unwrap_err();
        assert!(err.to_string().contains("before slogan"), "{err}");
        assert!(!result.is_complete());

        result.apply(&slogan("s")).unwrap();
        result.apply(&done()).unwrap();
        assert!(result.is_complete());
    }
}
