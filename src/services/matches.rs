use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;

use crate::{
    db::{repository::NO_TEAM_B, MatchRepository},
    error::{AppError, AppResult},
    models::{DeletedMatch, JoinRequest, Match, MatchView, NewMatch, Team, User},
};

/// Attaches organizer names to a batch of matches, looking each organizer up once
pub async fn assemble_views(
    repository: &dyn MatchRepository,
    matches: Vec<Match>,
) -> AppResult<Vec<MatchView>> {
    let mut organizers: HashMap<i64, Option<User>> = HashMap::new();
    let mut views = Vec::with_capacity(matches.len());

    for m in matches {
        if !organizers.contains_key(&m.organizer_id) {
            let organizer = repository.find_user(m.organizer_id).await?;
            organizers.insert(m.organizer_id, organizer);
        }
        let organizer = organizers.get(&m.organizer_id).and_then(Option::as_ref);
        views.push(MatchView::new(m, organizer));
    }

    Ok(views)
}

/// Upcoming matches, narrowed to the user's age window when the user's age is known
pub async fn list_upcoming(
    repository: Arc<dyn MatchRepository>,
    user_id: Option<i64>,
    today: NaiveDate,
) -> AppResult<Vec<MatchView>> {
    let age = match user_id {
        Some(id) => repository.find_user(id).await?.and_then(|u| u.age),
        None => None,
    };

    let upcoming: Vec<Match> = repository
        .upcoming_matches(today)
        .await?
        .into_iter()
        .filter(|m| m.admits_age(age))
        .collect();

    assemble_views(repository.as_ref(), upcoming).await
}

/// Creates a match on behalf of its organizer.
///
/// A team match starts with the organizer's team as team A and its roster
/// enrolled. Only the team's captain may put it forward. An individual
/// match starts with the organizer as its first participant.
pub async fn create_match(
    repository: Arc<dyn MatchRepository>,
    new_match: NewMatch,
    today: NaiveDate,
) -> AppResult<MatchView> {
    if new_match.date < today {
        return Err(AppError::InvalidInput(
            "Match date cannot be in the past".to_string(),
        ));
    }

    if new_match.min_age > new_match.max_age {
        return Err(AppError::InvalidInput(format!(
            "Invalid age window: {} > {}",
            new_match.min_age, new_match.max_age
        )));
    }

    let organizer = require_user(repository.as_ref(), new_match.organizer_id).await?;

    let participants = if new_match.is_team_match {
        let team_id = new_match.team_id.ok_or_else(|| {
            AppError::InvalidInput("Team ID is required for team matches".to_string())
        })?;
        let team = require_team(repository.as_ref(), team_id).await?;
        if team.captain_id != organizer.id {
            return Err(AppError::Forbidden(
                "You are not the captain of this team".to_string(),
            ));
        }
        team.player_ids()
    } else {
        vec![organizer.id]
    };

    let created = repository.create_match(new_match, participants).await?;

    tracing::info!(
        match_id = created.id,
        organizer_id = organizer.id,
        team_match = created.is_team_match,
        players = created.participants.len(),
        date = %created.date,
        "Match created"
    );

    Ok(MatchView::new(created, Some(&organizer)))
}

/// Adds a player to a match, or an opposing team to a team match.
///
/// Room and slot checks happen in the repository together with the write.
pub async fn join_match(
    repository: Arc<dyn MatchRepository>,
    match_id: i64,
    request: JoinRequest,
) -> AppResult<&'static str> {
    let m = require_match(repository.as_ref(), match_id).await?;
    require_user(repository.as_ref(), request.user_id).await?;

    if m.is_team_match {
        let team_id = request.team_id.ok_or_else(|| {
            AppError::InvalidInput("Team ID is required to join a team match".to_string())
        })?;

        if m.team_a_id == Some(team_id) {
            return Err(AppError::InvalidInput(
                "Your team is already in this match".to_string(),
            ));
        }

        let team = require_team(repository.as_ref(), team_id).await?;
        if team.captain_id != request.user_id {
            return Err(AppError::Forbidden(
                "Only the team captain can join a match".to_string(),
            ));
        }

        let players = team.player_ids();
        let enrolled = players.len();
        repository.join_as_team_b(match_id, team_id, players).await?;

        tracing::info!(match_id, team_id, players = enrolled, "Team joined match");
        return Ok("Successfully joined match as team B");
    }

    repository.join_as_player(match_id, request.user_id).await?;

    tracing::info!(match_id, user_id = request.user_id, "Player joined match");
    Ok("Successfully joined match")
}

/// Removes a participant. Only the organizer may do so.
pub async fn remove_participant(
    repository: Arc<dyn MatchRepository>,
    match_id: i64,
    user_id: i64,
    requested_by: i64,
) -> AppResult<()> {
    let m = require_match(repository.as_ref(), match_id).await?;
    require_organizer(&m, requested_by, "remove participants")?;

    if !m.has_participant(user_id) {
        return Err(AppError::NotFound(
            "Participant not found in this match".to_string(),
        ));
    }

    repository.remove_participant(match_id, user_id).await?;
    tracing::info!(match_id, user_id, "Participant removed");
    Ok(())
}

/// Removes the opposing team of a team match along with its roster.
///
/// Players who are also on team A, and the organizer, stay in the match.
pub async fn remove_team_b(
    repository: Arc<dyn MatchRepository>,
    match_id: i64,
    requested_by: i64,
) -> AppResult<()> {
    let m = require_match(repository.as_ref(), match_id).await?;
    require_organizer(&m, requested_by, "remove the opposing team")?;

    if !m.is_team_match {
        return Err(AppError::InvalidInput(
            "This is not a team match".to_string(),
        ));
    }

    let Some(team_b_id) = m.team_b_id else {
        return Err(AppError::NotFound(NO_TEAM_B.to_string()));
    };

    let team_a = match m.team_a_id {
        Some(id) => repository.find_team(id).await?,
        None => None,
    };
    let staying: BTreeSet<i64> = team_a
        .map(|t| t.player_ids())
        .unwrap_or_default()
        .into_iter()
        .chain([m.organizer_id])
        .collect();

    let leaving: Vec<i64> = repository
        .find_team(team_b_id)
        .await?
        .map(|t| t.player_ids())
        .unwrap_or_default()
        .into_iter()
        .filter(|id| !staying.contains(id))
        .collect();
    let removed = leaving.len();

    repository.remove_team_b(match_id, team_b_id, leaving).await?;

    tracing::info!(match_id, team_id = team_b_id, removed, "Opposing team removed");
    Ok(())
}

/// Deletes a match and reports who should be told about the cancellation.
///
/// Everyone enrolled or on either team's roster is notified, except the
/// organizer who deleted it.
pub async fn delete_match(
    repository: Arc<dyn MatchRepository>,
    match_id: i64,
    requested_by: i64,
) -> AppResult<DeletedMatch> {
    let m = require_match(repository.as_ref(), match_id).await?;
    require_organizer(&m, requested_by, "delete the match")?;

    let mut to_notify: BTreeSet<i64> = m.participants.clone();
    if m.is_team_match {
        for team_id in [m.team_a_id, m.team_b_id].into_iter().flatten() {
            if let Some(team) = repository.find_team(team_id).await? {
                to_notify.extend(team.player_ids());
            }
        }
    }
    to_notify.remove(&requested_by);

    repository.delete_match(match_id).await?;

    let notified_user_ids: Vec<i64> = to_notify.into_iter().collect();

    tracing::info!(
        match_id,
        to_notify = notified_user_ids.len(),
        "Match deleted"
    );

    Ok(DeletedMatch {
        match_id,
        title: m.title,
        date: m.date,
        notified_user_ids,
    })
}

async fn require_match(repository: &dyn MatchRepository, match_id: i64) -> AppResult<Match> {
    repository
        .find_match(match_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Match not found".to_string()))
}

pub(crate) async fn require_user(
    repository: &dyn MatchRepository,
    user_id: i64,
) -> AppResult<User> {
    repository
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
}

pub(crate) async fn require_team(
    repository: &dyn MatchRepository,
    team_id: i64,
) -> AppResult<Team> {
    repository
        .find_team(team_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Team not found".to_string()))
}

fn require_organizer(m: &Match, requested_by: i64, action: &str) -> AppResult<()> {
    if m.organizer_id != requested_by {
        return Err(AppError::Forbidden(format!(
            "Only the organizer can {}",
            action
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryRepository, MockMatchRepository};
    use crate::models::{NewUser, TeamMember};
    use crate::services::recommendations::test_support::today;
    use chrono::Duration;
    use mockall::predicate::eq;

    async fn seeded() -> (Arc<InMemoryRepository>, User, User) {
        let repo = Arc::new(InMemoryRepository::new());
        let organizer = user(&repo, "organizer@example.com", Some("Organizer"), Some(30)).await;
        let player = user(&repo, "player@example.com", Some("Player"), Some(17)).await;
        (repo, organizer, player)
    }

    async fn user(
        repo: &InMemoryRepository,
        email: &str,
        full_name: Option<&str>,
        age: Option<i32>,
    ) -> User {
        repo.create_user(NewUser {
            email: email.to_string(),
            full_name: full_name.map(str::to_string),
            age,
        })
        .await
        .unwrap()
    }

    async fn team(repo: &InMemoryRepository, name: &str, captain: i64, others: &[i64]) -> Team {
        let members = std::iter::once(captain)
            .chain(others.iter().copied())
            .map(|id| TeamMember {
                user_id: Some(id),
                name: format!("player {}", id),
            })
            .collect();
        repo.create_team(name.to_string(), captain, members)
            .await
            .unwrap()
    }

    fn new_match(organizer_id: i64) -> NewMatch {
        NewMatch {
            title: "Thursday 5v5".to_string(),
            description: None,
            city: Some("Tunis".to_string()),
            stadium: Some("El Menzah".to_string()),
            date: today() + Duration::days(3),
            start_time: None,
            match_type: Some("5v5".to_string()),
            capacity: Some(2),
            price_per_player: Some(5.0),
            min_age: 0,
            max_age: 100,
            is_team_match: false,
            team_id: None,
            organizer_id,
        }
    }

    fn team_match(organizer_id: i64, team_id: i64) -> NewMatch {
        NewMatch {
            is_team_match: true,
            team_id: Some(team_id),
            capacity: Some(10),
            ..new_match(organizer_id)
        }
    }

    #[tokio::test]
    async fn test_create_match_adds_organizer() {
        let (repo, organizer, _) = seeded().await;

        let view = create_match(repo.clone(), new_match(organizer.id), today())
            .await
            .unwrap();

        assert_eq!(view.organizer_name.as_deref(), Some("Organizer"));
        assert!(view.details.has_participant(organizer.id));
    }

    #[tokio::test]
    async fn test_create_match_rejects_past_dates_and_bad_windows() {
        let (repo, organizer, _) = seeded().await;

        let mut past = new_match(organizer.id);
        past.date = today() - Duration::days(1);
        assert!(matches!(
            create_match(repo.clone(), past, today()).await,
            Err(AppError::InvalidInput(_))
        ));

        let mut window = new_match(organizer.id);
        window.min_age = 40;
        window.max_age = 20;
        assert!(matches!(
            create_match(repo.clone(), window, today()).await,
            Err(AppError::InvalidInput(_))
        ));

        let mut no_team = new_match(organizer.id);
        no_team.is_team_match = true;
        assert!(matches!(
            create_match(repo, no_team, today()).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_team_match_needs_the_organizers_own_team() {
        let (repo, organizer, player) = seeded().await;
        let theirs = team(&repo, "Espoir", player.id, &[]).await;

        assert!(matches!(
            create_match(repo.clone(), team_match(organizer.id, 99), today()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            create_match(repo.clone(), team_match(organizer.id, theirs.id), today()).await,
            Err(AppError::Forbidden(_))
        ));

        let ours = team(&repo, "Etoile", organizer.id, &[player.id]).await;
        let view = create_match(repo, team_match(organizer.id, ours.id), today())
            .await
            .unwrap();

        assert_eq!(view.details.team_a_id, Some(ours.id));
        assert!(view.details.has_participant(organizer.id));
        assert!(view.details.has_participant(player.id));
    }

    #[tokio::test]
    async fn test_join_rejects_duplicates_and_full_matches() {
        let (repo, organizer, player) = seeded().await;
        let view = create_match(repo.clone(), new_match(organizer.id), today())
            .await
            .unwrap();
        let match_id = view.details.id;

        let join = |user_id| JoinRequest {
            user_id,
            team_id: None,
        };

        assert!(matches!(
            join_match(repo.clone(), match_id, join(organizer.id)).await,
            Err(AppError::InvalidInput(_))
        ));

        join_match(repo.clone(), match_id, join(player.id))
            .await
            .unwrap();

        let late = user(&repo, "late@example.com", None, None).await;
        let result = join_match(repo.clone(), match_id, join(late.id)).await;
        assert!(matches!(result, Err(AppError::InvalidInput(msg)) if msg == "Match is full"));
    }

    #[tokio::test]
    async fn test_team_join_enrolls_and_removes_the_roster() {
        let (repo, organizer, player) = seeded().await;
        let winger = user(&repo, "winger@example.com", None, None).await;
        let keeper = user(&repo, "keeper@example.com", None, None).await;
        let home = team(&repo, "Etoile", organizer.id, &[keeper.id]).await;
        let away = team(&repo, "Espoir", player.id, &[winger.id, keeper.id]).await;
        let match_id = create_match(repo.clone(), team_match(organizer.id, home.id), today())
            .await
            .unwrap()
            .details
            .id;

        let missing_team = JoinRequest {
            user_id: player.id,
            team_id: None,
        };
        assert!(join_match(repo.clone(), match_id, missing_team).await.is_err());

        let own_team = JoinRequest {
            user_id: organizer.id,
            team_id: Some(home.id),
        };
        assert!(join_match(repo.clone(), match_id, own_team).await.is_err());

        let not_captain = JoinRequest {
            user_id: winger.id,
            team_id: Some(away.id),
        };
        assert!(matches!(
            join_match(repo.clone(), match_id, not_captain).await,
            Err(AppError::Forbidden(_))
        ));

        let captain = JoinRequest {
            user_id: player.id,
            team_id: Some(away.id),
        };
        join_match(repo.clone(), match_id, captain).await.unwrap();

        let stored = repo.find_match(match_id).await.unwrap().unwrap();
        assert_eq!(stored.team_b_id, Some(away.id));
        assert!(stored.is_full_team_match());
        assert!(stored.has_participant(player.id));
        assert!(stored.has_participant(winger.id));

        remove_team_b(repo.clone(), match_id, organizer.id)
            .await
            .unwrap();
        let stored = repo.find_match(match_id).await.unwrap().unwrap();
        assert_eq!(stored.team_b_id, None);
        assert!(!stored.has_participant(player.id));
        assert!(!stored.has_participant(winger.id));
        // On both rosters, so stays with team A
        assert!(stored.has_participant(keeper.id));
        assert!(stored.has_participant(organizer.id));

        assert!(matches!(
            remove_team_b(repo, match_id, organizer.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_notifies_both_rosters() {
        let (repo, organizer, player) = seeded().await;
        let guest = user(&repo, "guest@example.com", None, None).await;
        let home = team(&repo, "Etoile", organizer.id, &[]).await;
        let away = team(&repo, "Espoir", player.id, &[guest.id]).await;
        let match_id = create_match(repo.clone(), team_match(organizer.id, home.id), today())
            .await
            .unwrap()
            .details
            .id;
        join_match(
            repo.clone(),
            match_id,
            JoinRequest {
                user_id: player.id,
                team_id: Some(away.id),
            },
        )
        .await
        .unwrap();

        let deleted = delete_match(repo, match_id, organizer.id).await.unwrap();

        assert_eq!(deleted.notified_user_ids, vec![player.id, guest.id]);
    }

    #[tokio::test]
    async fn test_only_organizer_removes_and_deletes() {
        let (repo, organizer, player) = seeded().await;
        let match_id = create_match(repo.clone(), new_match(organizer.id), today())
            .await
            .unwrap()
            .details
            .id;
        join_match(
            repo.clone(),
            match_id,
            JoinRequest {
                user_id: player.id,
                team_id: None,
            },
        )
        .await
        .unwrap();

        assert!(matches!(
            remove_participant(repo.clone(), match_id, organizer.id, player.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            delete_match(repo.clone(), match_id, player.id).await,
            Err(AppError::Forbidden(_))
        ));

        let deleted = delete_match(repo.clone(), match_id, organizer.id)
            .await
            .unwrap();
        assert_eq!(deleted.notified_user_ids, vec![player.id]);
        assert_eq!(repo.find_match(match_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_unknown_participant_is_not_found() {
        let (repo, organizer, player) = seeded().await;
        let match_id = create_match(repo.clone(), new_match(organizer.id), today())
            .await
            .unwrap()
            .details
            .id;

        assert!(matches!(
            remove_participant(repo, match_id, player.id, organizer.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_upcoming_filters_by_age() {
        let (repo, organizer, player) = seeded().await;
        let mut adults = new_match(organizer.id);
        adults.min_age = 18;
        create_match(repo.clone(), adults, today()).await.unwrap();
        create_match(repo.clone(), new_match(organizer.id), today())
            .await
            .unwrap();

        assert_eq!(
            list_upcoming(repo.clone(), Some(player.id), today())
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(list_upcoming(repo, None, today()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_join_unknown_match_skips_writes() {
        let mut repository = MockMatchRepository::new();
        repository
            .expect_find_match()
            .with(eq(5))
            .returning(|_| Ok(None));
        repository.expect_join_as_player().never();

        let result = join_match(
            Arc::new(repository),
            5,
            JoinRequest {
                user_id: 1,
                team_id: None,
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    /// Storage whose match lookups take a while, so concurrent joins all
    /// pass the service checks before any of them writes.
    struct SlowLookups(InMemoryRepository);

    #[async_trait::async_trait]
    impl MatchRepository for SlowLookups {
        async fn find_user(&self, user_id: i64) -> AppResult<Option<User>> {
            self.0.find_user(user_id).await
        }

        async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
            self.0.find_user_by_email(email).await
        }

        async fn create_user(&self, new_user: NewUser) -> AppResult<User> {
            self.0.create_user(new_user).await
        }

        async fn joined_matches(&self, user_id: i64) -> AppResult<Vec<Match>> {
            self.0.joined_matches(user_id).await
        }

        async fn upcoming_matches(&self, from: NaiveDate) -> AppResult<Vec<Match>> {
            self.0.upcoming_matches(from).await
        }

        async fn find_match(&self, match_id: i64) -> AppResult<Option<Match>> {
            let found = self.0.find_match(match_id).await;
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            found
        }

        async fn create_match(
            &self,
            new_match: NewMatch,
            participants: Vec<i64>,
        ) -> AppResult<Match> {
            self.0.create_match(new_match, participants).await
        }

        async fn join_as_player(&self, match_id: i64, user_id: i64) -> AppResult<()> {
            self.0.join_as_player(match_id, user_id).await
        }

        async fn join_as_team_b(
            &self,
            match_id: i64,
            team_id: i64,
            players: Vec<i64>,
        ) -> AppResult<()> {
            self.0.join_as_team_b(match_id, team_id, players).await
        }

        async fn remove_participant(&self, match_id: i64, user_id: i64) -> AppResult<()> {
            self.0.remove_participant(match_id, user_id).await
        }

        async fn remove_team_b(
            &self,
            match_id: i64,
            team_id: i64,
            players: Vec<i64>,
        ) -> AppResult<()> {
            self.0.remove_team_b(match_id, team_id, players).await
        }

        async fn delete_match(&self, match_id: i64) -> AppResult<()> {
            self.0.delete_match(match_id).await
        }

        async fn create_team(
            &self,
            name: String,
            captain_id: i64,
            members: Vec<TeamMember>,
        ) -> AppResult<Team> {
            self.0.create_team(name, captain_id, members).await
        }

        async fn find_team(&self, team_id: i64) -> AppResult<Option<Team>> {
            self.0.find_team(team_id).await
        }

        async fn teams_for_user(&self, user_id: i64) -> AppResult<Vec<Team>> {
            self.0.teams_for_user(user_id).await
        }

        async fn delete_team(&self, team_id: i64) -> AppResult<()> {
            self.0.delete_team(team_id).await
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_concurrent_joins_never_overfill() {
        let repo = Arc::new(SlowLookups(InMemoryRepository::new()));
        let organizer = user(&repo.0, "organizer@example.com", None, None).await;
        let match_id = repo
            .create_match(new_match(organizer.id), vec![organizer.id])
            .await
            .unwrap()
            .id;

        let mut players = Vec::new();
        for i in 0..5 {
            players.push(user(&repo.0, &format!("p{}@example.com", i), None, None).await);
        }

        let handles: Vec<_> = players
            .iter()
            .map(|p| {
                let repository: Arc<dyn MatchRepository> = repo.clone();
                let request = JoinRequest {
                    user_id: p.id,
                    team_id: None,
                };
                tokio::spawn(async move { join_match(repository, match_id, request).await })
            })
            .collect();

        let mut joined = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                joined += 1;
            }
        }

        let stored = repo.find_match(match_id).await.unwrap().unwrap();
        assert_eq!(joined, 1);
        assert_eq!(stored.participants.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_team_joins_take_one_slot() {
        let repo = Arc::new(SlowLookups(InMemoryRepository::new()));
        let organizer = user(&repo.0, "organizer@example.com", None, None).await;
        let home = team(&repo.0, "Etoile", organizer.id, &[]).await;
        let match_id = repo
            .create_match(team_match(organizer.id, home.id), vec![organizer.id])
            .await
            .unwrap()
            .id;

        let mut captains = Vec::new();
        for i in 0..5 {
            let captain = user(&repo.0, &format!("c{}@example.com", i), None, None).await;
            let mate = user(&repo.0, &format!("m{}@example.com", i), None, None).await;
            let squad = team(&repo.0, &format!("Squad {}", i), captain.id, &[mate.id]).await;
            captains.push((captain.id, squad));
        }

        let handles: Vec<_> = captains
            .iter()
            .map(|(captain_id, squad)| {
                let repository: Arc<dyn MatchRepository> = repo.clone();
                let request = JoinRequest {
                    user_id: *captain_id,
                    team_id: Some(squad.id),
                };
                tokio::spawn(async move { join_match(repository, match_id, request).await })
            })
            .collect();

        let mut joined = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                joined += 1;
            }
        }
        assert_eq!(joined, 1);

        let stored = repo.find_match(match_id).await.unwrap().unwrap();
        let winner = captains
            .iter()
            .map(|(_, squad)| squad)
            .find(|squad| Some(squad.id) == stored.team_b_id)
            .unwrap();
        let mut expected: Vec<i64> = std::iter::once(organizer.id)
            .chain(winner.player_ids())
            .collect();
        expected.sort_unstable();
        assert_eq!(stored.participants.iter().copied().collect::<Vec<_>>(), expected);
    }
}
