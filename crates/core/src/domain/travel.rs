use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Answers collected for one recommendation session, keyed by question key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TravelProfile(BTreeMap<String, String>);

/// Persisted travel preferences share the profile's shape.
pub type TravelPreferences = TravelProfile;

impl TravelProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// True when `key` was answered with exactly `value`.
    pub fn is(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for TravelProfile {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryRating {
    pub rating: u8,
    pub review: Option<String>,
}

/// Read-only view of what the external store knows about a user.
#[derive(Debug, Clone, Default)]
pub struct UserTravelHistory {
    pub visits: HashMap<String, u32>,
    pub ratings: HashMap<String, CountryRating>,
    pub preferences: Option<TravelPreferences>,
}

impl UserTravelHistory {
    pub fn visit_count(&self, country_code: &str) -> u32 {
        self.visits.get(country_code).copied().unwrap_or(0)
    }

    pub fn rating(&self, country_code: &str) -> Option<&CountryRating> {
        self.ratings.get(country_code)
    }

    pub fn visited_country_count(&self) -> usize {
        self.visits.values().filter(|v| **v > 0).count()
    }

    pub fn with_visits(mut self, country_code: &str, visits: u32) -> Self {
        self.visits.insert(country_code.to_string(), visits);
        self
    }

    pub fn with_rating(mut self, country_code: &str, rating: u8, review: Option<&str>) -> Self {
        self.ratings.insert(
            country_code.to_string(),
            CountryRating {
                rating,
                review: review.map(str::to_string),
            },
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_deserializes_from_flat_object() {
        let p: TravelProfile =
            serde_json::from_str(r#"{"budget":"budget","distance":"near"}"#).unwrap();
        assert!(p.is("budget", "budget"));
        assert_eq!(p.get("distance"), Some("near"));
        assert_eq!(p.get("food"), None);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn history_counts_only_positive_visits() {
        let h = UserTravelHistory::default()
            .with_visits("JP", 2)
            .with_visits("TH", 0)
            .with_rating("JP", 5, Some("again"));
        assert_eq!(h.visit_count("JP"), 2);
        assert_eq!(h.visit_count("FR"), 0);
        assert_eq!(h.visited_country_count(), 1);
        assert_eq!(h.rating("JP").map(|r| r.rating), Some(5));
    }
}
