use crate::models::Match;

pub const GENERIC_REASON: &str = "Similar to your preferences";
pub const NO_HISTORY_REASON: &str = "Popular match (no history)";

/// Maximum distance from the user's average player count that still reads as similar
const PLAYER_COUNT_TOLERANCE: f64 = 2.0;

/// Explains why `candidate` was recommended given the user's history
pub fn explain(candidate: &Match, history: &[Match]) -> String {
    let mut reasons = Vec::new();

    if candidate.is_team_match {
        reasons.push("team match".to_string());
    }

    if let Some(city) = shared_value(candidate.city.as_deref(), history, |m| m.city.as_deref()) {
        reasons.push(format!("same city ({})", city));
    }

    if let Some(stadium) =
        shared_value(candidate.stadium.as_deref(), history, |m| m.stadium.as_deref())
    {
        reasons.push(format!("same stadium ({})", stadium));
    }

    if let Some(match_type) = shared_value(candidate.match_type.as_deref(), history, |m| {
        m.match_type.as_deref()
    }) {
        reasons.push(format!("same type ({})", match_type));
    }

    if !candidate.is_team_match && has_similar_player_count(candidate, history) {
        reasons.push("similar player count".to_string());
    }

    if reasons.is_empty() {
        GENERIC_REASON.to_string()
    } else {
        format!("Recommended: {}", reasons.join(", "))
    }
}

fn shared_value<'a>(
    value: Option<&'a str>,
    history: &[Match],
    field: impl Fn(&Match) -> Option<&str>,
) -> Option<&'a str> {
    let value = value.filter(|v| !v.is_empty())?;
    history
        .iter()
        .any(|m| field(m) == Some(value))
        .then_some(value)
}

fn has_similar_player_count(candidate: &Match, history: &[Match]) -> bool {
    let counts: Vec<f64> = history
        .iter()
        .filter(|m| !m.is_team_match)
        .filter_map(|m| m.capacity.filter(|&c| c != 0))
        .map(f64::from)
        .collect();

    if counts.is_empty() {
        return false;
    }

    let average = counts.iter().sum::<f64>() / counts.len() as f64;

    match candidate.capacity.filter(|&c| c != 0) {
        Some(capacity) => (f64::from(capacity) - average).abs() <= PLAYER_COUNT_TOLERANCE,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::recommendations::test_support::match_with;

    #[test]
    fn test_accumulates_all_matching_reasons() {
        let mut past = match_with(1, Some("Tunis"), Some("5v5"), Some(10), false);
        past.stadium = Some("El Menzah".to_string());
        let mut candidate = match_with(2, Some("Tunis"), Some("5v5"), Some(11), false);
        candidate.stadium = Some("El Menzah".to_string());

        assert_eq!(
            explain(&candidate, &[past]),
            "Recommended: same city (Tunis), same stadium (El Menzah), same type (5v5), similar player count"
        );
    }

    #[test]
    fn test_team_match_skips_player_count() {
        let past = match_with(1, Some("Sfax"), Some("11v11"), Some(22), false);
        let candidate = match_with(2, Some("Sfax"), Some("11v11"), Some(22), true);

        assert_eq!(
            explain(&candidate, &[past]),
            "Recommended: team match, same city (Sfax), same type (11v11)"
        );
    }

    #[test]
    fn test_player_count_ignores_team_history() {
        let team_history = match_with(1, None, None, Some(22), true);
        let candidate = match_with(2, None, None, Some(22), false);

        assert_eq!(explain(&candidate, &[team_history]), GENERIC_REASON);
    }

    #[test]
    fn test_player_count_uses_mean_of_history() {
        let history = vec![
            match_with(1, None, None, Some(10), false),
            match_with(2, None, None, Some(14), false),
        ];

        let near = match_with(3, None, None, Some(14), false);
        let far = match_with(4, None, None, Some(15), false);

        assert_eq!(explain(&near, &history), "Recommended: similar player count");
        assert_eq!(explain(&far, &history), GENERIC_REASON);
    }

    #[test]
    fn test_missing_fields_never_match() {
        let past = match_with(1, None, None, None, false);
        let candidate = match_with(2, None, None, None, false);

        assert_eq!(explain(&candidate, &[past]), GENERIC_REASON);
    }
}
