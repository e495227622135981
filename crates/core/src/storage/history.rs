use crate::domain::travel::{CountryRating, TravelPreferences, UserTravelHistory};
use anyhow::Context;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Read access to a user's visits, ratings and saved preferences.
#[async_trait::async_trait]
pub trait TravelHistoryStore: Send + Sync {
    async fn load_history(&self, user_id: Uuid) -> anyhow::Result<UserTravelHistory>;
}

#[derive(Debug, Clone)]
pub struct PgTravelHistoryStore {
    pool: sqlx::PgPool,
}

impl PgTravelHistoryStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    async fn visits(&self, user_id: Uuid) -> anyhow::Result<HashMap<String, u32>> {
        let rows: Vec<(String, i32)> = sqlx::query_as(
            "SELECT country_code, visits FROM visited_countries WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("select visited_countries failed")?;

        Ok(rows
            .into_iter()
            .map(|(code, visits)| (code, visits.max(0) as u32))
            .collect())
    }

    async fn ratings(&self, user_id: Uuid) -> anyhow::Result<HashMap<String, CountryRating>> {
        let rows: Vec<(String, i32, Option<String>)> = sqlx::query_as(
            "SELECT country_code, rating, review FROM country_ratings WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("select country_ratings failed")?;

        Ok(rows
            .into_iter()
            .map(|(code, rating, review)| {
                (
                    code,
                    CountryRating {
                        rating: rating.clamp(1, 5) as u8,
                        review: review.filter(|r| !r.trim().is_empty()),
                    },
                )
            })
            .collect())
    }

    async fn preferences(&self, user_id: Uuid) -> anyhow::Result<Option<TravelPreferences>> {
        let row: Option<(Option<Value>,)> = sqlx::query_as(
            "SELECT travel_preferences FROM user_preferences WHERE user_id = $1 LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("select user_preferences failed")?;

        Ok(row.and_then(|(v,)| v).and_then(preferences_from_json))
    }
}

/// Keeps string-valued entries of the stored JSON object; anything else is ignored.
pub fn preferences_from_json(value: Value) -> Option<TravelPreferences> {
    let Value::Object(map) = value else {
        return None;
    };
    let prefs: TravelPreferences = map
        .into_iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k, s)),
            _ => None,
        })
        .collect();
    (!prefs.is_empty()).then_some(prefs)
}

#[async_trait::async_trait]
impl TravelHistoryStore for PgTravelHistoryStore {
    async fn load_history(&self, user_id: Uuid) -> anyhow::Result<UserTravelHistory> {
        let (visits, ratings, preferences) = tokio::try_join!(
            self.visits(user_id),
            self.ratings(user_id),
            self.preferences(user_id),
        )?;
        Ok(UserTravelHistory {
            visits,
            ratings,
            preferences,
        })
    }
}

/// Fixed histories keyed by user id; unknown users have no history.
#[derive(Debug, Default)]
pub struct InMemoryTravelHistoryStore {
    histories: HashMap<Uuid, UserTravelHistory>,
}

impl InMemoryTravelHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(mut self, user_id: Uuid, history: UserTravelHistory) -> Self {
        self.histories.insert(user_id, history);
        self
    }
}

#[async_trait::async_trait]
impl TravelHistoryStore for InMemoryTravelHistoryStore {
    async fn load_history(&self, user_id: Uuid) -> anyhow::Result<UserTravelHistory> {
        Ok(self.histories.get(&user_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preferences_keep_only_string_answers() {
        let prefs = preferences_from_json(json!({
            "food": "important",
            "nature": "city",
            "stats": {"x": 1},
            "count": 3
        }))
        .unwrap();
        assert_eq!(prefs.len(), 2);
        assert!(prefs.is("food", "important"));
    }

    #[test]
    fn non_object_or_empty_preferences_are_absent() {
        assert!(preferences_from_json(json!(null)).is_none());
        assert!(preferences_from_json(json!(["food"])).is_none());
        assert!(preferences_from_json(json!({})).is_none());
    }

    #[tokio::test]
    async fn in_memory_store_defaults_to_empty_history() {
        let known = Uuid::new_v4();
        let store = InMemoryTravelHistoryStore::new()
            .with_history(known, UserTravelHistory::default().with_visits("JP", 1));
        assert_eq!(store.load_history(known).await.unwrap().visit_count("JP"), 1);
        assert_eq!(store.load_history(Uuid::new_v4()).await.unwrap().visit_count("JP"), 0);
    }
}
