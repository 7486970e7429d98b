use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{Match, NewMatch, NewUser, Team, TeamMember, User},
};

use super::repository::{ALREADY_JOINED, MATCH_FULL, NO_TEAM_B, TEAM_B_TAKEN};
use super::MatchRepository;

/// In-process storage used when no database is configured.
///
/// Every write takes the store's write lock for its whole check-and-update.
#[derive(Default)]
pub struct InMemoryRepository {
    inner: RwLock<Store>,
}

#[derive(Default)]
struct Store {
    users: BTreeMap<i64, User>,
    matches: BTreeMap<i64, Match>,
    teams: BTreeMap<i64, Team>,
    next_user_id: i64,
    next_match_id: i64,
    next_team_id: i64,
}

impl Store {
    fn match_mut(&mut self, match_id: i64) -> AppResult<&mut Match> {
        self.matches
            .get_mut(&match_id)
            .ok_or_else(|| AppError::NotFound(format!("Match {} not found", match_id)))
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl MatchRepository for InMemoryRepository {
    async fn find_user(&self, user_id: i64) -> AppResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let store = self.inner.read().await;
        Ok(store.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> AppResult<User> {
        let mut store = self.inner.write().await;

        if store.users.values().any(|u| u.email == new_user.email) {
            return Err(AppError::InvalidInput(format!(
                "Email {} is already registered",
                new_user.email
            )));
        }

        store.next_user_id += 1;
        let user = User {
            id: store.next_user_id,
            email: new_user.email,
            full_name: new_user.full_name,
            age: new_user.age,
        };
        store.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn joined_matches(&self, user_id: i64) -> AppResult<Vec<Match>> {
        let store = self.inner.read().await;
        Ok(store
            .matches
            .values()
            .filter(|m| m.has_participant(user_id))
            .cloned()
            .collect())
    }

    async fn upcoming_matches(&self, from: NaiveDate) -> AppResult<Vec<Match>> {
        let store = self.inner.read().await;
        let mut upcoming: Vec<Match> = store
            .matches
            .values()
            .filter(|m| m.date >= from)
            .cloned()
            .collect();
        upcoming.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        Ok(upcoming)
    }

    async fn find_match(&self, match_id: i64) -> AppResult<Option<Match>> {
        Ok(self.inner.read().await.matches.get(&match_id).cloned())
    }

    async fn create_match(&self, new_match: NewMatch, participants: Vec<i64>) -> AppResult<Match> {
        let mut store = self.inner.write().await;
        store.next_match_id += 1;

        let created = Match {
            id: store.next_match_id,
            title: new_match.title,
            description: new_match.description,
            city: new_match.city,
            stadium: new_match.stadium,
            date: new_match.date,
            start_time: new_match.start_time,
            match_type: new_match.match_type,
            capacity: new_match.capacity,
            price_per_player: new_match.price_per_player,
            is_team_match: new_match.is_team_match,
            team_a_id: new_match.team_id.filter(|_| new_match.is_team_match),
            team_b_id: None,
            min_age: new_match.min_age,
            max_age: new_match.max_age,
            organizer_id: new_match.organizer_id,
            participants: participants.into_iter().collect::<BTreeSet<_>>(),
        };
        store.matches.insert(created.id, created.clone());
        Ok(created)
    }

    async fn join_as_player(&self, match_id: i64, user_id: i64) -> AppResult<()> {
        let mut store = self.inner.write().await;
        let m = store.match_mut(match_id)?;

        if m.has_participant(user_id) {
            return Err(AppError::InvalidInput(ALREADY_JOINED.to_string()));
        }
        if m.is_at_capacity() {
            return Err(AppError::InvalidInput(MATCH_FULL.to_string()));
        }

        m.participants.insert(user_id);
        Ok(())
    }

    async fn join_as_team_b(
        &self,
        match_id: i64,
        team_id: i64,
        players: Vec<i64>,
    ) -> AppResult<()> {
        let mut store = self.inner.write().await;
        let m = store.match_mut(match_id)?;

        if m.team_b_id.is_some() {
            return Err(AppError::InvalidInput(TEAM_B_TAKEN.to_string()));
        }

        m.team_b_id = Some(team_id);
        m.participants.extend(players);
        Ok(())
    }

    async fn remove_participant(&self, match_id: i64, user_id: i64) -> AppResult<()> {
        let mut store = self.inner.write().await;
        store.match_mut(match_id)?.participants.remove(&user_id);
        Ok(())
    }

    async fn remove_team_b(
        &self,
        match_id: i64,
        team_id: i64,
        players: Vec<i64>,
    ) -> AppResult<()> {
        let mut store = self.inner.write().await;
        let m = store.match_mut(match_id)?;

        if m.team_b_id != Some(team_id) {
            return Err(AppError::NotFound(NO_TEAM_B.to_string()));
        }

        m.team_b_id = None;
        for player in players {
            m.participants.remove(&player);
        }
        Ok(())
    }

    async fn delete_match(&self, match_id: i64) -> AppResult<()> {
        let mut store = self.inner.write().await;
        store
            .matches
            .remove(&match_id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Match {} not found", match_id)))
    }

    async fn create_team(
        &self,
        name: String,
        captain_id: i64,
        members: Vec<TeamMember>,
    ) -> AppResult<Team> {
        let mut store = self.inner.write().await;
        store.next_team_id += 1;

        let team = Team {
            id: store.next_team_id,
            name,
            captain_id,
            members,
        };
        store.teams.insert(team.id, team.clone());
        Ok(team)
    }

    async fn find_team(&self, team_id: i64) -> AppResult<Option<Team>> {
        Ok(self.inner.read().await.teams.get(&team_id).cloned())
    }

    async fn teams_for_user(&self, user_id: i64) -> AppResult<Vec<Team>> {
        let store = self.inner.read().await;
        Ok(store
            .teams
            .values()
            .filter(|t| t.includes(user_id))
            .cloned()
            .collect())
    }

    async fn delete_team(&self, team_id: i64) -> AppResult<()> {
        let mut store = self.inner.write().await;

        if !store.teams.contains_key(&team_id) {
            return Err(AppError::NotFound("Team not found".to_string()));
        }

        let registered = store
            .matches
            .values()
            .filter(|m| m.team_a_id == Some(team_id) || m.team_b_id == Some(team_id))
            .count();
        if registered > 0 {
            return Err(AppError::InvalidInput(format!(
                "Cannot delete team. It is registered in {} match(es)",
                registered
            )));
        }

        store.teams.remove(&team_id);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
