//! Preference sub-score: a base of 50 plus additive bonuses for curated country lists.
//!
//! Answers from the current session and persisted preferences contribute independently;
//! the result is capped at 100.

use crate::catalog::{Continent, CountryRecord};
use crate::domain::travel::{TravelPreferences, TravelProfile};

const BASE: f64 = 50.0;
const CAP: f64 = 100.0;

// Seoul, the reference point for "near" and "far".
const HOME_LAT: f64 = 37.5665;
const HOME_LNG: f64 = 126.9780;

const DEVELOPED: &[&str] = &["US", "JP", "GB", "FR", "DE", "AU", "CA", "KR", "SG", "HK"];
const DEVELOPING: &[&str] = &["TH", "VN", "ID", "PH", "MY", "IN", "KH", "LA"];
const BUDGET_FRIENDLY: &[&str] = &["TH", "VN", "ID", "PH", "MY", "IN", "KH", "LA", "CN"];
const LUXURY: &[&str] = &["US", "JP", "GB", "FR", "DE", "AU", "CA", "SG", "HK", "CH"];
const RESORT: &[&str] = &["TH", "VN", "PH", "ID", "MY", "MV", "US", "AU", "BR", "MX"];
const ADVENTURE: &[&str] = &["NZ", "NO", "IS", "CH", "NP", "PE", "CL"];
const NATURE: &[&str] = &["NZ", "NO", "IS", "CH", "AT", "FI", "CA"];
const CITY: &[&str] = &["US", "GB", "FR", "DE", "JP", "KR", "SG", "HK"];
const FOOD: &[&str] = &["JP", "KR", "TH", "VN", "IT", "FR", "ES", "CN", "TW"];
const BEACH: &[&str] = &[
    "TH", "VN", "PH", "ID", "MY", "MV", "US", "AU", "BR", "MX", "GR", "ES", "IT",
];
const SHOPPING: &[&str] = &["US", "JP", "KR", "SG", "HK", "GB", "FR", "IT", "AE"];

fn listed(list: &[&str], country: &CountryRecord) -> bool {
    list.contains(&country.code)
}

/// Rough planar distance from Seoul in degrees.
pub fn distance_from_home(country: &CountryRecord) -> f64 {
    ((country.latitude - HOME_LAT).powi(2) + (country.longitude - HOME_LNG).powi(2)).sqrt()
}

fn bonus(condition: bool, points: f64) -> f64 {
    if condition {
        points
    } else {
        0.0
    }
}

fn session_bonus(country: &CountryRecord, profile: &TravelProfile) -> f64 {
    let mut score = 0.0;
    let in_asia = country.continent == Continent::Asia;

    match profile.get("distance") {
        Some("near") => {
            if in_asia {
                score += 30.0;
            } else if distance_from_home(country) < 20.0 {
                score += 20.0;
            }
        }
        Some("far") => {
            if !in_asia {
                score += 30.0;
            } else if distance_from_home(country) > 30.0 {
                score += 20.0;
            }
        }
        _ => {}
    }

    match profile.get("difficulty") {
        Some("comfort") => score += bonus(listed(DEVELOPED, country), 20.0),
        Some("adventure") => score += bonus(listed(DEVELOPING, country), 20.0),
        _ => {}
    }

    match profile.get("budget") {
        Some("budget") => score += bonus(listed(BUDGET_FRIENDLY, country), 15.0),
        Some("luxury") => score += bonus(listed(LUXURY, country), 15.0),
        _ => {}
    }

    match profile.get("vacation_style") {
        Some("relax") => score += bonus(listed(RESORT, country), 15.0),
        Some("adventure") => score += bonus(listed(ADVENTURE, country), 15.0),
        _ => {}
    }

    match profile.get("nature") {
        Some("nature") => score += bonus(listed(NATURE, country), 10.0),
        Some("city") => score += bonus(listed(CITY, country), 10.0),
        _ => {}
    }

    score += bonus(profile.is("food", "important") && listed(FOOD, country), 10.0);
    score += bonus(profile.is("beach", "required") && listed(BEACH, country), 12.0);
    score += bonus(profile.is("shopping", "important") && listed(SHOPPING, country), 10.0);
    score
}

fn persisted_bonus(country: &CountryRecord, prefs: &TravelPreferences) -> f64 {
    let mut score = 0.0;

    match prefs.get("vacation_style") {
        Some("relax") => score += bonus(listed(RESORT, country), 10.0),
        Some("adventure") => score += bonus(listed(ADVENTURE, country), 10.0),
        _ => {}
    }

    match prefs.get("nature") {
        Some("nature") => score += bonus(listed(NATURE, country), 8.0),
        Some("city") => score += bonus(listed(CITY, country), 8.0),
        _ => {}
    }

    score += bonus(prefs.is("food", "important") && listed(FOOD, country), 8.0);
    score
}

pub fn preference_score(
    country: &CountryRecord,
    profile: &TravelProfile,
    preferences: Option<&TravelPreferences>,
) -> f64 {
    let mut score = BASE + session_bonus(country, profile);
    if let Some(prefs) = preferences {
        score += persisted_bonus(country, prefs);
    }
    score.min(CAP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::find_country;

    fn c(code: &str) -> &'static CountryRecord {
        find_country(code).unwrap()
    }

    #[test]
    fn empty_profile_is_base() {
        assert_eq!(preference_score(c("FR"), &TravelProfile::new(), None), 50.0);
    }

    #[test]
    fn distance_prefers_asia_when_near_and_elsewhere_when_far() {
        let near = TravelProfile::new().with("distance", "near");
        let far = TravelProfile::new().with("distance", "far");
        assert_eq!(preference_score(c("JP"), &near, None), 80.0);
        assert_eq!(preference_score(c("FR"), &near, None), 50.0);
        assert_eq!(preference_score(c("FR"), &far, None), 80.0);
        // India is in Asia but more than 30 degrees from Seoul.
        assert_eq!(preference_score(c("IN"), &far, None), 70.0);
        assert_eq!(preference_score(c("JP"), &far, None), 50.0);
    }

    #[test]
    fn session_and_persisted_bonuses_add_up() {
        let profile = TravelProfile::new()
            .with("food", "important")
            .with("nature", "city");
        let prefs = TravelPreferences::new().with("food", "important");
        // 50 + food 10 + city 10 + persisted food 8
        assert_eq!(preference_score(c("JP"), &profile, Some(&prefs)), 78.0);
        assert_eq!(preference_score(c("JP"), &profile, None), 70.0);
    }

    #[test]
    fn capped_at_one_hundred() {
        let profile = TravelProfile::new()
            .with("distance", "near")
            .with("difficulty", "adventure")
            .with("budget", "budget")
            .with("vacation_style", "relax")
            .with("food", "important")
            .with("beach", "required");
        let prefs = TravelPreferences::new().with("vacation_style", "relax");
        assert_eq!(preference_score(c("TH"), &profile, Some(&prefs)), 100.0);
    }
}
