use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use tripdraw_core::catalog::{countries_in, Continent, CountryRecord};
use tripdraw_core::domain::contract::ErrorBody;
use tripdraw_core::domain::questions::{
    random_questions, TravelQuestion, QUESTIONS_PER_SESSION, TRAVEL_QUESTIONS,
};
use tripdraw_core::domain::travel::TravelProfile;
use tripdraw_core::quota::QuotaStatus;
use tripdraw_core::random::RandomSource;
use tripdraw_core::recommend::{RecommendError, Recommender};

#[derive(Clone)]
pub struct AppState {
    /// `None` when the database is unavailable; dependent routes answer 503.
    pub recommender: Option<Recommender>,
    pub random: Arc<dyn RandomSource>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/travel/recommend", post(recommend))
        .route("/api/travel/recommend/remaining", get(remaining))
        .route("/api/travel/questions", get(questions))
        .route("/api/countries", get(countries))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, body: ErrorBody) -> Self {
        Self { status, body }
    }

    fn unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorBody::message("추천 서비스를 일시적으로 사용할 수 없습니다."),
        )
    }
}

impl From<RecommendError> for ApiError {
    fn from(err: RecommendError) -> Self {
        match err {
            RecommendError::AuthenticationRequired => {
                Self::new(StatusCode::UNAUTHORIZED, ErrorBody::auth_required())
            }
            RecommendError::QuotaExceeded { daily_limit } => Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody::limit_reached(daily_limit),
            ),
            RecommendError::Internal(err) => {
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "recommendation failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::message("서버 오류가 발생했습니다."),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
}

#[derive(Debug, Deserialize)]
struct RecommendBody {
    #[serde(default)]
    profile: Option<TravelProfile>,
}

async fn recommend(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RecommendBody>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let recommender = state.recommender.as_ref().ok_or_else(ApiError::unavailable)?;
    let user = recommender.authenticate(bearer_token(&headers)).await?;

    let profile = match body {
        Ok(Json(RecommendBody {
            profile: Some(profile),
        })) => profile,
        Ok(_) | Err(_) => {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                ErrorBody::message("프로필 정보가 필요합니다."),
            ))
        }
    };

    let events = recommender.recommend_for_user(&user, profile).await?;
    let frames = events.map(|event| Event::default().json_data(&event));
    Ok(Sse::new(frames).keep_alive(KeepAlive::default()))
}

async fn remaining(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<QuotaStatus>, ApiError> {
    let recommender = state.recommender.as_ref().ok_or_else(ApiError::unavailable)?;
    match recommender.remaining(bearer_token(&headers)).await {
        Ok(status) => Ok(Json(status)),
        Err(RecommendError::AuthenticationRequired) => Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            ErrorBody::remaining_unauthenticated(recommender.daily_limit()),
        )),
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, Deserialize)]
struct QuestionsQuery {
    count: Option<usize>,
}

async fn questions(
    State(state): State<AppState>,
    Query(query): Query<QuestionsQuery>,
) -> Json<Vec<&'static TravelQuestion>> {
    let count = query
        .count
        .unwrap_or(QUESTIONS_PER_SESSION)
        .clamp(1, TRAVEL_QUESTIONS.len());
    Json(random_questions(count, state.random.as_ref()))
}

#[derive(Debug, Serialize)]
struct ContinentGroup {
    continent: Continent,
    label: &'static str,
    countries: Vec<&'static CountryRecord>,
}

async fn countries() -> Json<Vec<ContinentGroup>> {
    let groups = Continent::ALL
        .into_iter()
        .map(|continent| ContinentGroup {
            continent,
            label: continent.label(),
            countries: countries_in(continent).collect(),
        })
        .collect();
    Json(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use tower::ServiceExt;
    use tripdraw_core::auth::{AuthenticatedUser, StaticAuthenticator};
    use tripdraw_core::exchange::{ExchangeRateFetcher, ExchangeRateSource, ExchangeRateTable};
    use tripdraw_core::quota::{InMemoryQuotaStore, QuotaStore, QuotaTracker};
    use tripdraw_core::random::SeededRandom;
    use tripdraw_core::recommend::RecommendOptions;
    use tripdraw_core::storage::{InMemoryTravelHistoryStore, PgQuotaStore};
    use tripdraw_core::time::{quota_date, Clock, ManualClock};
    use uuid::Uuid;

    struct NoRates;

    #[async_trait::async_trait]
    impl ExchangeRateSource for NoRates {
        fn source_name(&self) -> &'static str {
            "none"
        }

        async fn fetch_rates(&self) -> anyhow::Result<ExchangeRateTable> {
            anyhow::bail!("offline")
        }
    }

    struct Fixture {
        state: AppState,
        store: Arc<InMemoryQuotaStore>,
        user: AuthenticatedUser,
        clock: Arc<ManualClock>,
    }

    fn recommender_with(
        store: Arc<dyn QuotaStore>,
        user: &AuthenticatedUser,
        clock: Arc<ManualClock>,
        daily_limit: u32,
    ) -> Recommender {
        Recommender::new(
            Arc::new(StaticAuthenticator::new().with_user("tok", user.clone())),
            QuotaTracker::new(store, clock.clone(), daily_limit),
            Arc::new(InMemoryTravelHistoryStore::new()),
            Arc::new(ExchangeRateFetcher::with_ttl(
                Arc::new(NoRates),
                clock.clone(),
                chrono::Duration::hours(1),
            )),
            None,
            RecommendOptions {
                daily_limit,
                ..RecommendOptions::default()
            },
        )
        .with_clock(clock)
    }

    fn fixture(daily_limit: u32) -> Fixture {
        let user = AuthenticatedUser {
            id: Uuid::new_v4(),
            email: None,
        };
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 19, 3, 0, 0).unwrap(),
        ));
        let store = Arc::new(InMemoryQuotaStore::new());
        let recommender = recommender_with(store.clone(), &user, clock.clone(), daily_limit);

        Fixture {
            state: AppState {
                recommender: Some(recommender),
                random: Arc::new(SeededRandom::new(3)),
            },
            store,
            user,
            clock,
        }
    }

    fn get_remaining(token: Option<&str>) -> Request<Body> {
        let mut req = Request::get("/api/travel/recommend/remaining");
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        req.body(Body::empty()).unwrap()
    }

    async fn sse_frames(res: Response) -> Vec<Value> {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        text.split("\n\n")
            .filter_map(|frame| frame.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    fn post_recommend(token: Option<&str>, body: &str) -> Request<Body> {
        let mut req = Request::post("/api/travel/recommend").header("content-type", "application/json");
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let res = app(fixture(3).state)
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn recommend_requires_a_bearer_token() {
        let res = app(fixture(3).state)
            .oneshot(post_recommend(None, r#"{"profile":{}}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(res).await["requiresAuth"], true);
    }

    #[tokio::test]
    async fn recommend_without_profile_is_bad_request() {
        let f = fixture(3);
        for body in [r#"{}"#, "not json"] {
            let res = app(f.state.clone())
                .oneshot(post_recommend(Some("tok"), body))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn recommend_streams_sse_frames() {
        let f = fixture(3);
        let res = app(f.state.clone())
            .oneshot(post_recommend(Some("tok"), r#"{"profile":{"budget":"budget"}}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        let frames = sse_frames(res).await;
        let types: Vec<_> = frames.iter().map(|f| f["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["country", "content", "slogan", "done"]);
        assert!(frames[0].get("exchangeRate").is_none());
        assert_eq!(frames[3]["remainingCount"], 2);
        assert_eq!(frames[3]["dailyLimit"], 3);

        let used = f
            .store
            .used_count(f.user.id, quota_date(f.clock.now()))
            .await
            .unwrap();
        assert_eq!(used, 1);
    }

    #[tokio::test]
    async fn exhausted_quota_is_429() {
        let f = fixture(2);
        f.store.set(f.user.id, quota_date(f.clock.now()), 2).await;
        let res = app(f.state.clone())
            .oneshot(post_recommend(Some("tok"), r#"{"profile":{}}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(res).await;
        assert_eq!(body["limitReached"], true);
        assert_eq!(body["remainingCount"], 0);
        assert_eq!(body["dailyLimit"], 2);
    }

    #[tokio::test]
    async fn remaining_reports_quota_or_401() {
        let f = fixture(5);
        f.store.set(f.user.id, quota_date(f.clock.now()), 4).await;

        let res = app(f.state.clone())
            .oneshot(
                Request::get("/api/travel/recommend/remaining")
                    .header("authorization", "Bearer tok")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["remainingCount"], 1);
        assert_eq!(body["usedCount"], 4);

        let res = app(f.state.clone())
            .oneshot(
                Request::get("/api/travel/recommend/remaining")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(res).await;
        assert_eq!(body["remainingCount"], 0);
        assert_eq!(body["dailyLimit"], 5);
        assert_eq!(body["requiresAuth"], true);
    }

    #[tokio::test]
    async fn unconfigured_database_answers_503() {
        let state = AppState {
            recommender: None,
            random: Arc::new(SeededRandom::new(1)),
        };
        let res = app(state.clone())
            .oneshot(post_recommend(Some("tok"), r#"{"profile":{}}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

        let res = app(state.clone()).oneshot(get_remaining(Some("tok"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

        let res = app(state)
            .oneshot(Request::get("/api/countries").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unreachable_database_degrades_to_permissive_quota() {
        let pool = tripdraw_core::storage::lazy_pool(
            "postgres://tripdraw@127.0.0.1:1/tripdraw",
            std::time::Duration::from_millis(200),
        )
        .unwrap();
        let user = AuthenticatedUser {
            id: Uuid::new_v4(),
            email: None,
        };
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 19, 3, 0, 0).unwrap(),
        ));
        let state = AppState {
            recommender: Some(recommender_with(
                Arc::new(PgQuotaStore::new(pool)),
                &user,
                clock,
                5,
            )),
            random: Arc::new(SeededRandom::new(1)),
        };

        let res = app(state.clone()).oneshot(get_remaining(Some("tok"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["remainingCount"], 5);
        assert_eq!(body["dailyLimit"], 5);
        assert_eq!(body["usedCount"], 0);

        let res = app(state)
            .oneshot(post_recommend(Some("tok"), r#"{"profile":{}}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let frames = sse_frames(res).await;
        let done = frames.last().unwrap();
        assert_eq!(done["type"], "done");
        assert_eq!(done["remainingCount"], 4);
    }

    #[tokio::test]
    async fn questions_and_countries() {
        let f = fixture(3);
        let res = app(f.state.clone())
            .oneshot(
                Request::get("/api/travel/questions?count=5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(res).await;
        assert_eq!(body.as_array().unwrap().len(), 5);
        assert!(body[0]["options"].as_array().is_some());

        let res = app(f.state.clone())
            .oneshot(Request::get("/api/countries").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let groups = body_json(res).await;
        let groups = groups.as_array().unwrap();
        assert_eq!(groups.len(), 7);
        assert_eq!(groups[0]["continent"], "asia");
        assert_eq!(groups[0]["label"], "아시아");
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
