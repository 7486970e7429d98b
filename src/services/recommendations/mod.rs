use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    db::MatchRepository,
    error::AppResult,
    models::{Match, MatchView, RecommendationResponse, User},
};

pub mod candidates;
pub mod encoder;
pub mod explanation;
pub mod similarity;

use encoder::Vocabulary;
use similarity::NeighborIndex;

/// Score given to every pick when the user has no history to compare against
pub const FALLBACK_SCORE: f64 = 0.5;

/// Error types for the recommendation core
#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("Feature vocabulary mismatch: index fitted with {fitted}, queried with {queried}")]
    VocabularyMismatch { fitted: Uuid, queried: Uuid },
    #[error("Cannot fit a neighbor index on an empty history")]
    EmptyHistory,
}

/// Tuning knobs for the recommender
#[derive(Debug, Clone, PartialEq)]
pub struct RecommenderSettings {
    /// Fixed neighbor count. The request limit is used when `None`.
    pub neighbors: Option<usize>,
    pub max_candidates: usize,
    pub max_history: usize,
}

impl Default for RecommenderSettings {
    fn default() -> Self {
        Self {
            neighbors: None,
            max_candidates: 500,
            max_history: 500,
        }
    }
}

/// A candidate match with its unrounded similarity and explanation
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub candidate: Match,
    pub similarity: f64,
    pub reason: String,
}

/// k-nearest-neighbor match recommender.
///
/// Stateless between calls: every call builds its own vocabulary and
/// neighbor index from the inputs it is given.
#[derive(Debug, Clone, Default)]
pub struct Recommender {
    settings: RecommenderSettings,
}

impl Recommender {
    pub fn new(settings: RecommenderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RecommenderSettings {
        &self.settings
    }

    /// Ranks the upcoming `pool` for `user` against their `history`.
    ///
    /// Pipeline:
    /// 1. Select eligible candidates not yet joined
    /// 2. Without history, return the first `limit` candidates at a neutral score
    /// 3. Encode history and candidates with one vocabulary snapshot
    /// 4. Score candidates by mean distance to their nearest history points
    /// 5. Sort, truncate to `limit` and explain each pick
    pub fn recommend(
        &self,
        user: &User,
        history: Vec<Match>,
        pool: &[Match],
        today: NaiveDate,
        limit: usize,
    ) -> Result<Vec<ScoredMatch>, RecommendError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let selected = candidates::select_candidates(pool, user, &history, today);
        let selected = candidates::bound_candidates(selected, self.settings.max_candidates);

        if history.is_empty() {
            tracing::debug!(user_id = user.id, "No history, using fallback picks");
            return Ok(selected
                .into_iter()
                .take(limit)
                .map(|m| ScoredMatch {
                    candidate: m.clone(),
                    similarity: FALLBACK_SCORE,
                    reason: explanation::NO_HISTORY_REASON.to_string(),
                })
                .collect());
        }

        if selected.is_empty() {
            return Ok(Vec::new());
        }

        // Only the neighbor index is bounded. Exclusion and explanations see the full history.
        let fitted = candidates::bound_history(&history, self.settings.max_history);
        let vocabulary =
            Vocabulary::build(fitted.iter().copied().chain(selected.iter().copied()));
        let history_features = vocabulary.encode_all(fitted.iter().copied());
        let candidate_features = vocabulary.encode_all(selected.iter().copied());

        let k = self.settings.neighbors.unwrap_or(limit);
        let index = NeighborIndex::fit(&history_features, k)?;
        let mean_distances = index.mean_distances(&candidate_features)?;
        let scores = similarity::similarity_scores(&mean_distances);

        tracing::debug!(
            user_id = user.id,
            history = history.len(),
            fitted = fitted.len(),
            candidates = selected.len(),
            k = index.k(),
            "Scored candidates"
        );

        Ok(similarity::rank(&scores)
            .into_iter()
            .take(limit)
            .map(|i| ScoredMatch {
                candidate: selected[i].clone(),
                similarity: scores[i],
                reason: explanation::explain(selected[i], &history),
            })
            .collect())
    }
}

/// Generates personalized match recommendations for a user.
///
/// Unknown users get an empty list rather than an error.
pub async fn get_recommendations(
    repository: Arc<dyn MatchRepository>,
    recommender: &Recommender,
    user_id: i64,
    limit: usize,
    today: NaiveDate,
) -> AppResult<Vec<RecommendationResponse>> {
    let start = Instant::now();

    let Some(user) = repository.find_user(user_id).await? else {
        tracing::info!(user_id, "Unknown user, nothing to recommend");
        return Ok(Vec::new());
    };

    let history = repository.joined_matches(user_id).await?;
    let pool = repository.upcoming_matches(today).await?;

    tracing::info!(
        user_id,
        history = history.len(),
        pool = pool.len(),
        limit,
        "Computing recommendations"
    );

    let scored = recommender.recommend(&user, history, &pool, today, limit)?;

    let mut organizers: HashMap<i64, Option<User>> = HashMap::new();
    let mut responses = Vec::with_capacity(scored.len());

    for pick in scored {
        let organizer_id = pick.candidate.organizer_id;
        if !organizers.contains_key(&organizer_id) {
            let organizer = repository.find_user(organizer_id).await?;
            organizers.insert(organizer_id, organizer);
        }
        let organizer = organizers.get(&organizer_id).and_then(Option::as_ref);

        responses.push(RecommendationResponse {
            match_id: pick.candidate.id,
            match_view: MatchView::new(pick.candidate, organizer),
            similarity_score: round_score(pick.similarity),
            reason: pick.reason,
        });
    }

    tracing::info!(
        user_id,
        returned = responses.len(),
        processing_time_ms = start.elapsed().as_millis(),
        "Recommendations completed"
    );

    Ok(responses)
}

fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    use crate::models::{Match, User};

    pub fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    pub fn match_with(
        id: i64,
        city: Option<&str>,
        match_type: Option<&str>,
        capacity: Option<i32>,
        is_team_match: bool,
    ) -> Match {
        Match {
            id,
            title: format!("Match {}", id),
            description: None,
            city: city.map(str::to_string),
            stadium: None,
            date: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            start_time: None,
            match_type: match_type.map(str::to_string),
            capacity,
            price_per_player: None,
            is_team_match,
            team_a_id: None,
            team_b_id: None,
            min_age: 0,
            max_age: 100,
            organizer_id: 100,
            participants: BTreeSet::new(),
        }
    }

    pub fn player(id: i64, age: Option<i32>) -> User {
        User {
            id,
            email: format!("player{}@example.com", id),
            full_name: Some(format!("Player {}", id)),
            age,
        }
    }
}
