use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{db::MatchRepository, error::AppResult, models::Match};

/// What an external notifier needs to remind the players of one match
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReminderNotice {
    pub match_id: i64,
    pub title: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub city: Option<String>,
    pub stadium: Option<String>,
    pub participant_ids: Vec<i64>,
}

impl From<&Match> for ReminderNotice {
    fn from(m: &Match) -> Self {
        Self {
            match_id: m.id,
            title: m.title.clone(),
            date: m.date,
            start_time: m.start_time,
            city: m.city.clone(),
            stadium: m.stadium.clone(),
            participant_ids: m.participants.iter().copied().collect(),
        }
    }
}

/// Matches played on `today`
pub fn matches_due_today(matches: &[Match], today: NaiveDate) -> Vec<&Match> {
    matches.iter().filter(|m| m.date == today).collect()
}

/// Reminder notices for the matches played on `day`.
///
/// Delivery belongs to whatever timer calls this.
pub async fn due_reminders(
    repository: Arc<dyn MatchRepository>,
    day: NaiveDate,
) -> AppResult<Vec<ReminderNotice>> {
    let upcoming = repository.upcoming_matches(day).await?;
    let notices: Vec<ReminderNotice> = matches_due_today(&upcoming, day)
        .into_iter()
        .map(ReminderNotice::from)
        .collect();

    tracing::info!(
        day = %day,
        matches = notices.len(),
        players = notices.iter().map(|n| n.participant_ids.len()).sum::<usize>(),
        "Collected due reminders"
    );

    Ok(notices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockMatchRepository;
    use crate::services::recommendations::test_support::{match_with, today};
    use chrono::Duration;

    #[test]
    fn test_matches_due_today_keeps_only_same_day() {
        let mut yesterday = match_with(1, None, None, None, false);
        yesterday.date = today() - Duration::days(1);
        let mut now = match_with(2, None, None, None, false);
        now.date = today();
        let mut tomorrow = match_with(3, None, None, None, false);
        tomorrow.date = today() + Duration::days(1);

        let all = vec![yesterday, now, tomorrow];
        let due = matches_due_today(&all, today());

        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, 2);
    }

    #[tokio::test]
    async fn test_due_reminders_lists_participants() {
        let mut repository = MockMatchRepository::new();
        repository.expect_upcoming_matches().returning(|from| {
            let mut due = match_with(2, Some("Monastir"), None, None, false);
            due.date = from;
            due.participants.extend([5, 3]);
            let mut later = match_with(3, None, None, None, false);
            later.date = from + Duration::days(2);
            Ok(vec![due, later])
        });

        let notices = due_reminders(Arc::new(repository), today()).await.unwrap();

        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].match_id, 2);
        assert_eq!(notices[0].city.as_deref(), Some("Monastir"));
        assert_eq!(notices[0].participant_ids, vec![3, 5]);
    }
}
