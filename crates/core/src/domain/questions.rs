//! Pool of profile questions. A session draws three of them without replacement.

use crate::random::RandomSource;
use serde::Serialize;

pub const QUESTIONS_PER_SESSION: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct TravelQuestion {
    pub id: &'static str,
    pub question: &'static str,
    pub options: &'static [QuestionOption],
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionOption {
    pub label: &'static str,
    pub value: &'static str,
}

const fn opt(label: &'static str, value: &'static str) -> QuestionOption {
    QuestionOption { label, value }
}

const ANY: QuestionOption = opt("둘다 상관없어", "both");

pub static TRAVEL_QUESTIONS: [TravelQuestion; 20] = [
    TravelQuestion {
        id: "difficulty",
        question: "이번 여행은 어떻게 가고 싶어?",
        options: &[
            opt("조금 고생하더라도 현지 감성 느끼기", "adventure"),
            opt("웬만하면 편하게 쉬기", "comfort"),
            ANY,
        ],
    },
    TravelQuestion {
        id: "distance",
        question: "거리 감각은?",
        options: &[
            opt("비행시간 따위... 난 상남자/상여자", "far"),
            opt("주말에도 다녀올 수 있을 정도로", "near"),
            ANY,
        ],
    },
    TravelQuestion {
        id: "budget",
        question: "예산은?",
        options: &[
            opt("최대한 가성비", "budget"),
            opt("적당히", "moderate"),
            opt("그래, 이번엔 플렉스", "luxury"),
            ANY,
        ],
    },
    TravelQuestion {
        id: "vacation_style",
        question: "휴양지 스타일은?",
        options: &[
            opt("🏖️ 휴양지에서 쉬기", "relax"),
            opt("🗺️ 모험과 탐험", "adventure"),
            ANY,
        ],
    },
    TravelQuestion {
        id: "accommodation",
        question: "숙박 스타일은?",
        options: &[
            opt("🏨 호화로운 숙박", "luxury"),
            opt("🛏️ 잠만 자면 됨", "simple"),
            ANY,
        ],
    },
    TravelQuestion {
        id: "food",
        question: "음식 중요도는?",
        options: &[
            opt("🍽️ 음식이 중요해", "important"),
            opt("🍱 간단하게", "simple"),
            ANY,
        ],
    },
    TravelQuestion {
        id: "activity",
        question: "활동 선호도는?",
        options: &[
            opt("🎯 계획된 일정", "planned"),
            opt("🎲 즉흥적인 여행", "spontaneous"),
            ANY,
        ],
    },
    TravelQuestion {
        id: "group_size",
        question: "여행 동반자는?",
        options: &[opt("👥 그룹 여행", "group"), opt("🚶 혼자 여행", "solo"), ANY],
    },
    TravelQuestion {
        id: "culture",
        question: "문화 체험은?",
        options: &[
            opt("🏛️ 문화 유적지", "historical"),
            opt("🎨 현대적 경험", "modern"),
            ANY,
        ],
    },
    TravelQuestion {
        id: "nature",
        question: "자연 vs 도시?",
        options: &[opt("🌲 자연 속에서", "nature"), opt("🏙️ 도시 탐험", "city"), ANY],
    },
    TravelQuestion {
        id: "nightlife",
        question: "야경/야생활은?",
        options: &[
            opt("🌃 밤 문화 즐기기", "active"),
            opt("🌙 일찍 자고 일찍 일어나기", "early"),
            ANY,
        ],
    },
    TravelQuestion {
        id: "transport",
        question: "교통 수단은?",
        options: &[
            opt("🚗 자유로운 이동", "flexible"),
            opt("🚌 대중교통", "public"),
            ANY,
        ],
    },
    TravelQuestion {
        id: "weather",
        question: "날씨 선호도는?",
        options: &[opt("☀️ 따뜻한 곳", "warm"), opt("❄️ 시원한 곳", "cool"), ANY],
    },
    TravelQuestion {
        id: "beach",
        question: "해변은 필수야?",
        options: &[
            opt("🏖️ 해변 필수!", "required"),
            opt("🏔️ 해변 없어도 OK", "optional"),
            ANY,
        ],
    },
    TravelQuestion {
        id: "shopping",
        question: "쇼핑은?",
        options: &[
            opt("🛍️ 쇼핑 필수!", "important"),
            opt("🎒 쇼핑 없어도 OK", "optional"),
            ANY,
        ],
    },
    TravelQuestion {
        id: "language",
        question: "언어 걱정은?",
        options: &[
            opt("🗣️ 영어 잘 통하는 곳", "english"),
            opt("🤷 언어 장벽 상관없어", "any"),
            ANY,
        ],
    },
    TravelQuestion {
        id: "safety",
        question: "안전도는?",
        options: &[
            opt("🛡️ 안전한 곳 우선", "safe"),
            opt("🌍 모험적인 곳도 OK", "adventure"),
            ANY,
        ],
    },
    TravelQuestion {
        id: "duration",
        question: "여행 기간은?",
        options: &[
            opt("⏰ 짧게 (3-5일)", "short"),
            opt("📅 길게 (1주일 이상)", "long"),
            ANY,
        ],
    },
    TravelQuestion {
        id: "photography",
        question: "사진 찍는 거 좋아해?",
        options: &[
            opt("📸 인스타 감성 필수!", "important"),
            opt("📱 사진은 부차적", "optional"),
            ANY,
        ],
    },
    TravelQuestion {
        id: "local_food",
        question: "현지 음식 도전은?",
        options: &[
            opt("🌶️ 현지 음식 도전!", "adventure"),
            opt("🍔 익숙한 음식 선호", "familiar"),
            ANY,
        ],
    },
];

pub fn find_question(id: &str) -> Option<&'static TravelQuestion> {
    TRAVEL_QUESTIONS.iter().find(|q| q.id == id)
}

/// Human-readable label of an answer, if the key/value pair is known.
pub fn answer_label(key: &str, value: &str) -> Option<&'static str> {
    find_question(key)?
        .options
        .iter()
        .find(|o| o.value == value)
        .map(|o| o.label)
}

/// Draws `count` distinct questions (partial Fisher-Yates over the pool).
pub fn random_questions(count: usize, rng: &dyn RandomSource) -> Vec<&'static TravelQuestion> {
    let mut pool: Vec<&'static TravelQuestion> = TRAVEL_QUESTIONS.iter().collect();
    let count = count.min(pool.len());
    for i in 0..count {
        let remaining = pool.len() - i;
        let j = i + rng.pick_index(remaining);
        pool.swap(i, j);
    }
    pool.truncate(count);
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandom;
    use std::collections::HashSet;

    #[test]
    fn draws_distinct_questions() {
        let rng = SeededRandom::new(7);
        for _ in 0..50 {
            let qs = random_questions(QUESTIONS_PER_SESSION, &rng);
            assert_eq!(qs.len(), 3);
            let ids: HashSet<_> = qs.iter().map(|q| q.id).collect();
            assert_eq!(ids.len(), 3);
        }
    }

    #[test]
    fn count_is_capped_at_pool_size() {
        let rng = SeededRandom::new(1);
        assert_eq!(random_questions(100, &rng).len(), TRAVEL_QUESTIONS.len());
    }

    #[test]
    fn every_question_offers_an_indifferent_answer() {
        for q in &TRAVEL_QUESTIONS {
            assert!(q.options.iter().any(|o| o.value == "both"), "{}", q.id);
        }
        assert_eq!(answer_label("budget", "luxury"), Some("그래, 이번엔 플렉스"));
        assert_eq!(answer_label("budget", "nope"), None);
    }
}
