use std::collections::HashSet;

use chrono::NaiveDate;

use crate::models::{Match, User};

/// Whether `m` can be offered to `user` on `today`, ignoring history
pub fn is_eligible(m: &Match, user: &User, today: NaiveDate) -> bool {
    m.date >= today && !m.is_full_team_match() && m.admits_age(user.age)
}

/// Selects the upcoming matches the user could still join.
///
/// Keeps pool order. Matches already in `history` are excluded.
pub fn select_candidates<'a>(
    pool: &'a [Match],
    user: &User,
    history: &[Match],
    today: NaiveDate,
) -> Vec<&'a Match> {
    let joined: HashSet<i64> = history.iter().map(|m| m.id).collect();

    pool.iter()
        .filter(|m| !joined.contains(&m.id) && !m.has_participant(user.id))
        .filter(|m| is_eligible(m, user, today))
        .collect()
}

/// The at most `max` most recent history entries the neighbor index is fitted on.
///
/// At least one entry is kept so a non-empty history never fits an empty index.
pub fn bound_history(history: &[Match], max: usize) -> Vec<&Match> {
    let max = max.max(1);
    let mut bounded: Vec<&Match> = history.iter().collect();
    if bounded.len() > max {
        tracing::warn!(
            history = bounded.len(),
            max,
            "History exceeds bound, fitting on most recent matches"
        );
        bounded.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
        bounded.truncate(max);
    }
    bounded
}

/// Keeps at most `max` candidates, preferring the earliest dates
pub fn bound_candidates(mut candidates: Vec<&Match>, max: usize) -> Vec<&Match> {
    if candidates.len() > max {
        tracing::warn!(
            candidates = candidates.len(),
            max,
            "Candidate pool exceeds bound, keeping earliest matches"
        );
        candidates.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        candidates.truncate(max);
    }
    candidates
}
