use std::collections::HashMap;

use ndarray::{array, Array1, Array2};
use uuid::Uuid;

use crate::models::Match;

/// Number of features per match: city, stadium, capacity, type, team flag
pub const FEATURE_DIM: usize = 5;

/// Index assigned to a category value the vocabulary has never seen
pub const UNSEEN_CATEGORY: f64 = -1.0;

/// Capacity assumed when a match does not declare one
pub const DEFAULT_CAPACITY: f64 = 10.0;

/// `[city_index, stadium_index, capacity_or_default, type_index, team_flag]`
pub type FeatureVector = Array1<f64>;

/// Distinct values of one categorical field, indexed by first appearance
#[derive(Debug, Default, Clone)]
struct CategoryIndex {
    values: Vec<String>,
    positions: HashMap<String, usize>,
}

impl CategoryIndex {
    fn observe(&mut self, value: Option<&str>) {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return;
        };
        if !self.positions.contains_key(value) {
            self.positions.insert(value.to_string(), self.values.len());
            self.values.push(value.to_string());
        }
    }

    fn index_of(&self, value: Option<&str>) -> f64 {
        value
            .and_then(|v| self.positions.get(v))
            .map(|&i| i as f64)
            .unwrap_or(UNSEEN_CATEGORY)
    }
}

/// Request-scoped categorical vocabulary.
///
/// Built once per recommendation from the union of history and candidates.
/// Indices are only meaningful within the snapshot that produced them, so
/// every matrix remembers the snapshot id and the neighbor index refuses to
/// compare matrices from different snapshots.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    id: Uuid,
    cities: CategoryIndex,
    stadiums: CategoryIndex,
    types: CategoryIndex,
}

impl Vocabulary {
    pub fn build<'a>(matches: impl IntoIterator<Item = &'a Match>) -> Self {
        let mut vocabulary = Self {
            id: Uuid::new_v4(),
            cities: CategoryIndex::default(),
            stadiums: CategoryIndex::default(),
            types: CategoryIndex::default(),
        };

        for m in matches {
            vocabulary.cities.observe(m.city.as_deref());
            vocabulary.stadiums.observe(m.stadium.as_deref());
            vocabulary.types.observe(m.match_type.as_deref());
        }

        vocabulary
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cities(&self) -> &[String] {
        &self.cities.values
    }

    pub fn stadiums(&self) -> &[String] {
        &self.stadiums.values
    }

    pub fn types(&self) -> &[String] {
        &self.types.values
    }

    /// Encodes one match. Missing or unknown fields degrade to sentinel values.
    pub fn encode(&self, m: &Match) -> FeatureVector {
        let capacity = match m.capacity {
            Some(c) if c != 0 => c as f64,
            _ => DEFAULT_CAPACITY,
        };

        array![
            self.cities.index_of(m.city.as_deref()),
            self.stadiums.index_of(m.stadium.as_deref()),
            capacity,
            self.types.index_of(m.match_type.as_deref()),
            if m.is_team_match { 1.0 } else { 0.0 },
        ]
    }

    /// Encodes matches into an `n x FEATURE_DIM` matrix, one row per match
    pub fn encode_all<'a>(&self, matches: impl IntoIterator<Item = &'a Match>) -> FeatureMatrix {
        let matches: Vec<&Match> = matches.into_iter().collect();
        let mut rows = Array2::zeros((matches.len(), FEATURE_DIM));
        for (i, m) in matches.into_iter().enumerate() {
            rows.row_mut(i).assign(&self.encode(m));
        }

        FeatureMatrix {
            vocabulary_id: self.id,
            rows,
        }
    }
}

/// Feature rows produced by a single vocabulary snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub vocabulary_id: Uuid,
    pub rows: Array2<f64>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.nrows() == 0
    }
}
