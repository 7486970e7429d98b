use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod football_match;
pub mod team;
pub mod user;

pub use football_match::{Match, NewMatch};
pub use team::{NewTeam, NewTeamMember, Team, TeamMember};
pub use user::{NewUser, User};

/// A match as returned to clients, with the organizer's display name resolved
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchView {
    #[serde(flatten)]
    pub details: Match,
    pub organizer_name: Option<String>,
}

impl MatchView {
    pub fn new(details: Match, organizer: Option<&User>) -> Self {
        Self {
            organizer_name: organizer.and_then(|u| u.full_name.clone()),
            details,
        }
    }
}

/// One ranked recommendation in the response of `GET /recommendations`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResponse {
    pub match_id: i64,
    #[serde(rename = "match")]
    pub match_view: MatchView,
    /// Similarity in [0, 1], rounded to two decimals
    pub similarity_score: f64,
    pub reason: String,
}

/// Request body for joining a match
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub user_id: i64,
    /// Joining team, required for team matches
    #[serde(default)]
    pub team_id: Option<i64>,
}

/// Outcome of a delete: who should be told the match is cancelled
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DeletedMatch {
    pub match_id: i64,
    pub title: String,
    pub date: NaiveDate,
    pub notified_user_ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_match_view_flattens_details() {
        let details = Match {
            id: 12,
            title: "Friday 5v5".to_string(),
            description: None,
            city: Some("Sousse".to_string()),
            stadium: None,
            date: NaiveDate::from_ymd_opt(2026, 10, 23).unwrap(),
            start_time: None,
            match_type: Some("5v5".to_string()),
            capacity: Some(10),
            price_per_player: Some(5.0),
            is_team_match: false,
            team_a_id: None,
            team_b_id: None,
            min_age: 0,
            max_age: 100,
            organizer_id: 3,
            participants: BTreeSet::from([3, 1]),
        };
        let organizer = User {
            id: 3,
            email: "sami@example.com".to_string(),
            full_name: Some("Sami".to_string()),
            age: Some(30),
        };

        let view = MatchView::new(details, Some(&organizer));
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["id"], 12);
        assert_eq!(json["city"], "Sousse");
        assert_eq!(json["organizer_name"], "Sami");
        assert_eq!(json["participants"], serde_json::json!([1, 3]));
        assert_eq!(json["date"], "2026-10-23");
    }

    #[test]
    fn test_match_view_without_organizer() {
        let json = r#"{
            "id": 1, "title": "t", "description": null, "city": null, "stadium": null,
            "date": "2026-10-23", "start_time": null, "match_type": null, "capacity": null,
            "price_per_player": null, "is_team_match": false, "team_a_id": null,
            "team_b_id": null, "min_age": 0, "max_age": 100, "organizer_id": 9,
            "participants": [], "organizer_name": null
        }"#;

        let view: MatchView = serde_json::from_str(json).unwrap();
        assert_eq!(view.organizer_name, None);
        assert_eq!(view.details.organizer_id, 9);
    }
}
