use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::{
    cached,
    error::AppResult,
    models::{Match, NewMatch, NewUser, Team, TeamMember, User},
};

use super::{Cache, CacheKey, MatchRepository};

/// Read-through Redis cache in front of another repository.
///
/// Only today's upcoming-match pool is cached, since it is the one read
/// shared by every recommendation request. Match writes evict it and return
/// only once Redis has dropped the key.
pub struct CachedRepository {
    inner: Arc<dyn MatchRepository>,
    cache: Cache,
    ttl: u64,
    /// Bumped by every match write, see [`cached!`]
    generation: Mutex<u64>,
}

impl CachedRepository {
    pub fn new(inner: Arc<dyn MatchRepository>, cache: Cache, ttl: u64) -> Self {
        Self {
            inner,
            cache,
            ttl,
            generation: Mutex::new(0),
        }
    }

    /// Must run after the inner write has committed.
    ///
    /// A failed eviction is logged but not returned, since the write itself
    /// went through. The stale pool then lives until its TTL.
    async fn evict_upcoming(&self) {
        let key = CacheKey::UpcomingMatches(Utc::now().date_naive());
        let mut generation = self.generation.lock().await;
        *generation += 1;

        if let Err(e) = self.cache.evict(&key).await {
            tracing::error!(
                key = %key,
                error = %e,
                "Failed to evict upcoming matches after a write"
            );
        }
    }
}

#[async_trait::async_trait]
impl MatchRepository for CachedRepository {
    async fn find_user(&self, user_id: i64) -> AppResult<Option<User>> {
        self.inner.find_user(user_id).await
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn create_user(&self, new_user: NewUser) -> AppResult<User> {
        self.inner.create_user(new_user).await
    }

    async fn joined_matches(&self, user_id: i64) -> AppResult<Vec<Match>> {
        self.inner.joined_matches(user_id).await
    }

    async fn upcoming_matches(&self, from: NaiveDate) -> AppResult<Vec<Match>> {
        // Only today's key is evicted on writes
        if from != Utc::now().date_naive() {
            return self.inner.upcoming_matches(from).await;
        }

        let key = CacheKey::UpcomingMatches(from);
        cached!(
            self.cache,
            key,
            self.ttl,
            self.generation,
            self.inner.upcoming_matches(from)
        )
    }

    async fn find_match(&self, match_id: i64) -> AppResult<Option<Match>> {
        self.inner.find_match(match_id).await
    }

    async fn create_match(&self, new_match: NewMatch, participants: Vec<i64>) -> AppResult<Match> {
        let created = self.inner.create_match(new_match, participants).await?;
        self.evict_upcoming().await;
        Ok(created)
    }

    async fn join_as_player(&self, match_id: i64, user_id: i64) -> AppResult<()> {
        self.inner.join_as_player(match_id, user_id).await?;
        self.evict_upcoming().await;
        Ok(())
    }

    async fn join_as_team_b(
        &self,
        match_id: i64,
        team_id: i64,
        players: Vec<i64>,
    ) -> AppResult<()> {
        self.inner.join_as_team_b(match_id, team_id, players).await?;
        self.evict_upcoming().await;
        Ok(())
    }

    async fn remove_participant(&self, match_id: i64, user_id: i64) -> AppResult<()> {
        self.inner.remove_participant(match_id, user_id).await?;
        self.evict_upcoming().await;
        Ok(())
    }

    async fn remove_team_b(
        &self,
        match_id: i64,
        team_id: i64,
        players: Vec<i64>,
    ) -> AppResult<()> {
        self.inner.remove_team_b(match_id, team_id, players).await?;
        self.evict_upcoming().await;
        Ok(())
    }

    async fn delete_match(&self, match_id: i64) -> AppResult<()> {
        self.inner.delete_match(match_id).await?;
        self.evict_upcoming().await;
        Ok(())
    }

    // Teams are not part of the cached pool

    async fn create_team(
        &self,
        name: String,
        captain_id: i64,
        members: Vec<TeamMember>,
    ) -> AppResult<Team> {
        self.inner.create_team(name, captain_id, members).await
    }

    async fn find_team(&self, team_id: i64) -> AppResult<Option<Team>> {
        self.inner.find_team(team_id).await
    }

    async fn teams_for_user(&self, user_id: i64) -> AppResult<Vec<Team>> {
        self.inner.teams_for_user(user_id).await
    }

    async fn delete_team(&self, team_id: i64) -> AppResult<()> {
        self.inner.delete_team(team_id).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
