use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_MIN_AGE: i32 = 0;
pub const DEFAULT_MAX_AGE: i32 = 100;

/// An amateur football match organized through the platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Match {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub city: Option<String>,
    pub stadium: Option<String>,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    /// Game format such as "5v5" or "11v11"
    pub match_type: Option<String>,
    /// Target number of players
    pub capacity: Option<i32>,
    pub price_per_player: Option<f64>,
    pub is_team_match: bool,
    pub team_a_id: Option<i64>,
    pub team_b_id: Option<i64>,
    pub min_age: i32,
    pub max_age: i32,
    pub organizer_id: i64,
    pub participants: BTreeSet<i64>,
}

impl Match {
    /// A team match is fully staffed once an opposing team has joined
    pub fn is_full_team_match(&self) -> bool {
        self.is_team_match && self.team_b_id.is_some()
    }

    /// Whether the age window admits the given age. Unknown ages are always admitted.
    pub fn admits_age(&self, age: Option<i32>) -> bool {
        match age {
            Some(age) => self.min_age <= age && age <= self.max_age,
            None => true,
        }
    }

    pub fn has_participant(&self, user_id: i64) -> bool {
        self.participants.contains(&user_id)
    }

    /// Individual matches are full when the participant count reaches capacity
    pub fn is_at_capacity(&self) -> bool {
        match self.capacity {
            Some(capacity) if capacity > 0 => self.participants.len() >= capacity as usize,
            _ => false,
        }
    }
}

/// Payload for creating a match
#[derive(Debug, Clone, Deserialize)]
pub struct NewMatch {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub stadium: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub match_type: Option<String>,
    #[serde(default)]
    pub capacity: Option<i32>,
    #[serde(default)]
    pub price_per_player: Option<f64>,
    #[serde(default = "default_min_age")]
    pub min_age: i32,
    #[serde(default = "default_max_age")]
    pub max_age: i32,
    #[serde(default)]
    pub is_team_match: bool,
    /// Team of the organizer, required for team matches
    #[serde(default)]
    pub team_id: Option<i64>,
    pub organizer_id: i64,
}

fn default_min_age() -> i32 {
    DEFAULT_MIN_AGE
}

fn default_max_age() -> i32 {
    DEFAULT_MAX_AGE
}
