use chrono::NaiveDate;

use crate::{
    error::AppResult,
    models::{Match, NewMatch, NewUser, Team, TeamMember, User},
};

pub const ALREADY_JOINED: &str = "Already joined this match";
pub const MATCH_FULL: &str = "Match is full";
pub const TEAM_B_TAKEN: &str = "Match is already full (team B already joined)";
pub const NO_TEAM_B: &str = "No opposing team to remove";

/// Storage abstraction for users, teams and matches
///
/// The recommender only reads through this trait (user lookup, history and
/// the upcoming pool). The match and team services also write through it.
/// Rules that depend on the current state of a match (room left, team B
/// slot free) are checked by the storage in the same step as the write so
/// concurrent joins cannot overfill a match. Every other rule lives in the
/// services.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MatchRepository: Send + Sync {
    async fn find_user(&self, user_id: i64) -> AppResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn create_user(&self, new_user: NewUser) -> AppResult<User>;

    /// Matches the user has joined, whatever their date
    async fn joined_matches(&self, user_id: i64) -> AppResult<Vec<Match>>;

    /// All matches dated `from` or later, ordered by date then id
    async fn upcoming_matches(&self, from: NaiveDate) -> AppResult<Vec<Match>>;

    async fn find_match(&self, match_id: i64) -> AppResult<Option<Match>>;

    /// Persists a match with its initial participants
    async fn create_match(&self, new_match: NewMatch, participants: Vec<i64>) -> AppResult<Match>;

    /// Adds a player to an individual match if they are not in it yet and it
    /// still has room.
    ///
    /// Fails with `InvalidInput` ("Already joined this match" or "Match is
    /// full") and leaves the match untouched otherwise.
    async fn join_as_player(&self, match_id: i64, user_id: i64) -> AppResult<()>;

    /// Takes the free team B slot of a team match and enrolls the roster.
    ///
    /// Fails with `InvalidInput` when another team already holds the slot.
    async fn join_as_team_b(&self, match_id: i64, team_id: i64, players: Vec<i64>)
        -> AppResult<()>;

    async fn remove_participant(&self, match_id: i64, user_id: i64) -> AppResult<()>;

    /// Frees the team B slot and removes `players`, provided `team_id` still
    /// holds the slot. Fails with `NotFound` otherwise.
    async fn remove_team_b(&self, match_id: i64, team_id: i64, players: Vec<i64>)
        -> AppResult<()>;

    async fn delete_match(&self, match_id: i64) -> AppResult<()>;

    async fn create_team(
        &self,
        name: String,
        captain_id: i64,
        members: Vec<TeamMember>,
    ) -> AppResult<Team>;

    async fn find_team(&self, team_id: i64) -> AppResult<Option<Team>>;

    /// Teams the user captains or is listed on, ordered by id
    async fn teams_for_user(&self, user_id: i64) -> AppResult<Vec<Team>>;

    /// Deletes a team and its roster.
    ///
    /// Fails with `InvalidInput` while the team is still on a side of any match.
    async fn delete_team(&self, team_id: i64) -> AppResult<()>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}
