use crate::catalog::CountryRecord;
use crate::domain::questions::answer_label;
use crate::domain::travel::{TravelProfile, UserTravelHistory};
use crate::exchange::ExchangeRateInfo;

const SYSTEM_PROMPT: &str = r#"당신은 "랜덤 여행 뽑기 머신"의 캐릭터입니다.
지구본 모양의 여행자 캐릭터로서, 약간 장난스럽고 알고 있는 듯한 말투로 대답하세요.

⚠️ 매우 중요: 반드시 최소 4-5줄 이상의 상세한 설명을 작성해야 합니다. 절대 짧게 끝내지 마세요!

추천 여행지를 설명할 때:
- 마구잡이 추천같지만 실제로는 미친 AI 알고리즘이 열심히 계산했다는 것을 강조
- 재치 있고 친근한 톤
- 가난한 개발자 서버비 드립 가끔 섞기 (예: "이 추천 생성하느라 서버비 0.03원 썼어… 😭")
- 이모지 적절히 사용
- 반드시 최소 4-5줄 이상의 상세한 설명 제공 (단순히 "다낭 추천!" 같은 짧은 문구 금지)

카피 스타일:
- "마구잡이 추천같지만, 사실은..."
- "미친 AI 알고리즘이 축제/환율/너 취향을 다 갈아 넣었어요"
- "그냥 '느낌'으로 뽑힌 것 같지? 알고리즘이 열일한 거야… 아마도…"
- 환율, 계절, 성향 등 구체적인 이유를 재미있게 설명

예시 (이 정도 길이는 최소한):
"오늘은 다낭 추천! 🇻🇳
지금 동(VND)이 지난달보다 약세라 분짜 두 그릇 더 먹고도 통장이 덜 아파.
너가 맛집 좋아하는 성향도 딱 맞고, 3월엔 야시장 감성 최고야.

슬로건: '돈은 줄이고 행복은 늘리는 여행'

(참고로 이 추천 생성하느라 서버비 0.03원 썼어… 😭)""#;

const FORMAT_RULES: &str = r#"⚠️ 매우 중요: 반드시 최소 4-5줄 이상의 상세한 설명을 작성해야 합니다. 절대 짧게 끝내지 마세요!

작성 형식 (반드시 이 순서대로):
1. 첫 줄: "오늘은 [국가명] 추천! [국기이모지]" 형식으로 시작
2. 환율 정보를 재미있게 설명 (반드시 "1 [통화] = [원화]원" 형식 포함)
   예: "지금 1달러에 1,300원이니까 여행하기 좋은 시기야!"
   예: "1,000엔에 8,500원이면 라멘 한 그릇 더 먹을 수 있어"
3. 사용자 성향과 맞는 이유 설명 (2-3줄)
   예: "너가 맛집 좋아하는 성향도 딱 맞고, 3월엔 야시장 감성 최고야"
   예: "편하게 가고 싶다고 했는데, 여기는 인프라도 좋고 안전해"
4. 계절/축제 정보가 있으면 포함
5. 슬로건 한 줄 추가 (예: "슬로건: 돈은 줄이고 행복은 늘리는 여행")
6. 서버비 드립 추가 (예: "참고로 이 추천 생성하느라 서버비 0.03원 썼어… 😭")

최소 길이: 4-5줄 이상
절대 금지: "다낭 추천!" 같은 1줄짜리 짧은 답변"#;

pub fn system_prompt() -> String {
    SYSTEM_PROMPT.to_string()
}

pub struct PromptInput<'a> {
    pub country: &'a CountryRecord,
    pub reasons: &'a [String],
    pub exchange: Option<&'a ExchangeRateInfo>,
    pub profile: &'a TravelProfile,
    pub history: &'a UserTravelHistory,
}

pub fn user_prompt(input: &PromptInput<'_>) -> String {
    let country = input.country;
    let exchange_line = match input.exchange {
        Some(info) => format!("현재 환율: {}", info.display),
        None => "환율 정보 없음".to_string(),
    };

    let rating_line = match input.history.rating(country.code) {
        Some(r) => match r.review.as_deref() {
            Some(review) => format!("이전 방문 시 별점: {}/5, 한줄평: \"{review}\"", r.rating),
            None => format!("이전 방문 시 별점: {}/5", r.rating),
        },
        None => "첫 방문 예정".to_string(),
    };

    let preferences_line = match &input.history.preferences {
        Some(prefs) => format!(
            "- 사용자 여행 성향 (마이페이지 설정): {}",
            serde_json::to_string(prefs).unwrap_or_default()
        ),
        None => "- 사용자 여행 성향: 설정되지 않음".to_string(),
    };

    let mut out = String::new();
    out.push_str(
        "다음 정보를 바탕으로 여행지 추천 멘트를 작성해주세요. 반드시 최소 4-5줄 이상, 상세하고 재미있게 작성해주세요.\n\n",
    );
    out.push_str(&format!(
        "추천 국가: {} ({})\n추천 이유: {}\n{exchange_line}\n\n사용자 프로필:\n",
        country.display_name,
        country.flag_glyph,
        input.reasons.join(", "),
    ));
    out.push_str(&profile_lines(input.profile));
    out.push_str(&format!(
        "\n- 방문한 국가 수: {}개\n- 이 국가 방문 이력: {rating_line}\n{preferences_line}\n",
        input.history.visited_country_count(),
    ));
    if !input.profile.is_empty() {
        out.push_str(&format!(
            "- 분기 질문 응답: {}\n",
            serde_json::to_string(input.profile).unwrap_or_default()
        ));
    }
    out.push('\n');
    out.push_str(FORMAT_RULES);
    out
}

fn profile_lines(profile: &TravelProfile) -> String {
    if profile.is_empty() {
        return "- 선호도 정보 없음 (모두 둘다 상관없어 선택)".to_string();
    }
    profile
        .iter()
        .map(|(key, value)| format!("- {key}: {}", answer_label(key, value).unwrap_or(value)))
        .collect::<Vec<_>>()
        .join("\n")
}
