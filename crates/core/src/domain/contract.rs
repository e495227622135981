//! Wire shapes shared with clients: stream events and error bodies.

use crate::catalog::CountryRecord;
use crate::exchange::ExchangeRateInfo;
use serde::Serialize;

/// One frame of the recommendation stream. Serialized as `{"type": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecommendationEvent {
    Country {
        country: &'static CountryRecord,
        reasons: Vec<String>,
        #[serde(rename = "exchangeRate", skip_serializing_if = "Option::is_none")]
        exchange_rate: Option<ExchangeRateInfo>,
    },
    Content {
        content: String,
    },
    Slogan {
        slogan: String,
    },
    #[serde(rename_all = "camelCase")]
    Done {
        remaining_count: u32,
        daily_limit: u32,
        narrative: String,
    },
}

impl RecommendationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RecommendationEvent::Country { .. } => "country",
            RecommendationEvent::Content { .. } => "content",
            RecommendationEvent::Slogan { .. } => "slogan",
            RecommendationEvent::Done { .. } => "done",
        }
    }
}

/// JSON body of a non-streaming error response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_auth: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_reached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_limit: Option<u32>,
}

impl ErrorBody {
    pub fn message(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn auth_required() -> Self {
        Self {
            requires_auth: Some(true),
            ..Self::message("로그인하고 사용해!")
        }
    }

    pub fn limit_reached(daily_limit: u32) -> Self {
        Self {
            limit_reached: Some(true),
            remaining_count: Some(0),
            daily_limit: Some(daily_limit),
            ..Self::message(format!("하루 {daily_limit}회 제한에 도달했습니다."))
        }
    }

    /// Unauthenticated remaining-count query: no message, zero allowance.
    pub fn remaining_unauthenticated(daily_limit: u32) -> Self {
        Self {
            requires_auth: Some(true),
            remaining_count: Some(0),
            daily_limit: Some(daily_limit),
            ..Self::default()
        }
    }
}
