use chrono::{NaiveDate, NaiveTime};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use std::collections::BTreeMap;

use crate::{
    error::{AppError, AppResult},
    models::{Match, NewMatch, NewUser, Team, TeamMember, User},
};

use super::repository::{ALREADY_JOINED, MATCH_FULL, NO_TEAM_B, TEAM_B_TAKEN};
use super::MatchRepository;

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the embedded migrations under `migrations/`
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const MATCH_COLUMNS: &str = r#"
    m.id, m.title, m.description, m.city, m.stadium, m.date, m.start_time,
    m.match_type, m.capacity, m.price_per_player, m.is_team_match,
    m.team_a_id, m.team_b_id, m.min_age, m.max_age, m.organizer_id,
    COALESCE(
        ARRAY_AGG(p.user_id ORDER BY p.user_id) FILTER (WHERE p.user_id IS NOT NULL),
        '{}'
    ) AS participants
"#;

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    email: String,
    full_name: Option<String>,
    age: Option<i32>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            age: row.age,
        }
    }
}

#[derive(Debug, FromRow)]
struct MatchRow {
    id: i64,
    title: String,
    description: Option<String>,
    city: Option<String>,
    stadium: Option<String>,
    date: NaiveDate,
    start_time: Option<NaiveTime>,
    match_type: Option<String>,
    capacity: Option<i32>,
    price_per_player: Option<f64>,
    is_team_match: bool,
    team_a_id: Option<i64>,
    team_b_id: Option<i64>,
    min_age: i32,
    max_age: i32,
    organizer_id: i64,
    participants: Vec<i64>,
}

impl From<MatchRow> for Match {
    fn from(row: MatchRow) -> Self {
        Match {
            id: row.id,
            title: row.title,
            description: row.description,
            city: row.city,
            stadium: row.stadium,
            date: row.date,
            start_time: row.start_time,
            match_type: row.match_type,
            capacity: row.capacity,
            price_per_player: row.price_per_player,
            is_team_match: row.is_team_match,
            team_a_id: row.team_a_id,
            team_b_id: row.team_b_id,
            min_age: row.min_age,
            max_age: row.max_age,
            organizer_id: row.organizer_id,
            participants: row.participants.into_iter().collect(),
        }
    }
}

#[derive(Debug, FromRow)]
struct TeamRow {
    id: i64,
    name: String,
    captain_id: i64,
}

#[derive(Debug, FromRow)]
struct TeamMemberRow {
    team_id: i64,
    user_id: Option<i64>,
    name: String,
}

/// Match storage backed by PostgreSQL
#[derive(Clone)]
pub struct PgMatchRepository {
    pool: PgPool,
}

impl PgMatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_matches(&self, filter: &str, bind: MatchFilter) -> AppResult<Vec<Match>> {
        let sql = format!(
            "SELECT {} FROM matches m \
             LEFT JOIN match_participants p ON p.match_id = m.id \
             {} GROUP BY m.id ORDER BY m.date, m.id",
            MATCH_COLUMNS, filter
        );

        let query = sqlx::query_as::<_, MatchRow>(&sql);
        let rows = match bind {
            MatchFilter::Id(id) => query.bind(id).fetch_all(&self.pool).await?,
            MatchFilter::Date(date) => query.bind(date).fetch_all(&self.pool).await?,
        };

        Ok(rows.into_iter().map(Match::from).collect())
    }

    /// Loads teams matching `filter` (bound to `$1`) with their rosters
    async fn fetch_teams(&self, filter: &str, id: i64) -> AppResult<Vec<Team>> {
        let sql = format!(
            "SELECT t.id, t.name, t.captain_id FROM teams t {} ORDER BY t.id",
            filter
        );
        let rows = sqlx::query_as::<_, TeamRow>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let members = sqlx::query_as::<_, TeamMemberRow>(
            "SELECT team_id, user_id, name FROM team_members \
             WHERE team_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut rosters: BTreeMap<i64, Vec<TeamMember>> = BTreeMap::new();
        for member in members {
            rosters.entry(member.team_id).or_default().push(TeamMember {
                user_id: member.user_id,
                name: member.name,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| Team {
                members: rosters.remove(&row.id).unwrap_or_default(),
                id: row.id,
                name: row.name,
                captain_id: row.captain_id,
            })
            .collect())
    }

    async fn ensure_match_exists(&self, match_id: i64) -> AppResult<()> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM matches WHERE id = $1")
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await?;

        match found {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!("Match {} not found", match_id))),
        }
    }
}

enum MatchFilter {
    Id(i64),
    Date(NaiveDate),
}

#[async_trait::async_trait]
impl MatchRepository for PgMatchRepository {
    async fn find_user(&self, user_id: i64) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, full_name, age FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, full_name, age FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn create_user(&self, new_user: NewUser) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, full_name, age)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, email, full_name, age
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.full_name)
        .bind(new_user.age)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::from).ok_or_else(|| {
            AppError::InvalidInput(format!("Email {} is already registered", new_user.email))
        })
    }

    async fn joined_matches(&self, user_id: i64) -> AppResult<Vec<Match>> {
        self.fetch_matches(
            "WHERE m.id IN (SELECT match_id FROM match_participants WHERE user_id = $1)",
            MatchFilter::Id(user_id),
        )
        .await
    }

    async fn upcoming_matches(&self, from: NaiveDate) -> AppResult<Vec<Match>> {
        self.fetch_matches("WHERE m.date >= $1", MatchFilter::Date(from))
            .await
    }

    async fn find_match(&self, match_id: i64) -> AppResult<Option<Match>> {
        let mut rows = self
            .fetch_matches("WHERE m.id = $1", MatchFilter::Id(match_id))
            .await?;
        Ok(rows.pop())
    }

    async fn create_match(&self, new_match: NewMatch, participants: Vec<i64>) -> AppResult<Match> {
        let mut tx = self.pool.begin().await?;

        let team_a_id = new_match.team_id.filter(|_| new_match.is_team_match);
        let (match_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO matches (
                title, description, city, stadium, date, start_time, match_type,
                capacity, price_per_player, is_team_match, team_a_id, min_age, max_age,
                organizer_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            "#,
        )
        .bind(&new_match.title)
        .bind(&new_match.description)
        .bind(&new_match.city)
        .bind(&new_match.stadium)
        .bind(new_match.date)
        .bind(new_match.start_time)
        .bind(&new_match.match_type)
        .bind(new_match.capacity)
        .bind(new_match.price_per_player)
        .bind(new_match.is_team_match)
        .bind(team_a_id)
        .bind(new_match.min_age)
        .bind(new_match.max_age)
        .bind(new_match.organizer_id)
        .fetch_one(&mut *tx)
        .await?;

        for user_id in participants {
            sqlx::query(
                "INSERT INTO match_participants (user_id, match_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(match_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.find_match(match_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Match {} vanished after insert", match_id)))
    }

    async fn join_as_player(&self, match_id: i64, user_id: i64) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent joins on the same match
        let locked: Option<(Option<i32>,)> =
            sqlx::query_as("SELECT capacity FROM matches WHERE id = $1 FOR UPDATE")
                .bind(match_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((capacity,)) = locked else {
            return Err(AppError::NotFound(format!("Match {} not found", match_id)));
        };

        let (joined, already_in): (i64, bool) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(BOOL_OR(user_id = $2), FALSE) \
             FROM match_participants WHERE match_id = $1",
        )
        .bind(match_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if already_in {
            return Err(AppError::InvalidInput(ALREADY_JOINED.to_string()));
        }
        if let Some(capacity) = capacity.filter(|c| *c > 0) {
            if joined >= i64::from(capacity) {
                return Err(AppError::InvalidInput(MATCH_FULL.to_string()));
            }
        }

        sqlx::query("INSERT INTO match_participants (user_id, match_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(match_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn join_as_team_b(
        &self,
        match_id: i64,
        team_id: i64,
        players: Vec<i64>,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let claimed =
            sqlx::query("UPDATE matches SET team_b_id = $1 WHERE id = $2 AND team_b_id IS NULL")
                .bind(team_id)
                .bind(match_id)
                .execute(&mut *tx)
                .await?;

        if claimed.rows_affected() == 0 {
            drop(tx);
            self.ensure_match_exists(match_id).await?;
            return Err(AppError::InvalidInput(TEAM_B_TAKEN.to_string()));
        }

        sqlx::query(
            "INSERT INTO match_participants (user_id, match_id) \
             SELECT UNNEST($1::BIGINT[]), $2 ON CONFLICT DO NOTHING",
        )
        .bind(&players)
        .bind(match_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove_participant(&self, match_id: i64, user_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM match_participants WHERE user_id = $1 AND match_id = $2")
            .bind(user_id)
            .bind(match_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_team_b(
        &self,
        match_id: i64,
        team_id: i64,
        players: Vec<i64>,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let released =
            sqlx::query("UPDATE matches SET team_b_id = NULL WHERE id = $1 AND team_b_id = $2")
                .bind(match_id)
                .bind(team_id)
                .execute(&mut *tx)
                .await?;

        if released.rows_affected() == 0 {
            drop(tx);
            self.ensure_match_exists(match_id).await?;
            return Err(AppError::NotFound(NO_TEAM_B.to_string()));
        }

        sqlx::query("DELETE FROM match_participants WHERE match_id = $1 AND user_id = ANY($2)")
            .bind(match_id)
            .bind(&players)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_match(&self, match_id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM matches WHERE id = $1")
            .bind(match_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Match {} not found", match_id)));
        }
        Ok(())
    }

    async fn create_team(
        &self,
        name: String,
        captain_id: i64,
        members: Vec<TeamMember>,
    ) -> AppResult<Team> {
        let mut tx = self.pool.begin().await?;

        let (team_id,): (i64,) =
            sqlx::query_as("INSERT INTO teams (name, captain_id) VALUES ($1, $2) RETURNING id")
                .bind(&name)
                .bind(captain_id)
                .fetch_one(&mut *tx)
                .await?;

        for member in &members {
            sqlx::query("INSERT INTO team_members (team_id, user_id, name) VALUES ($1, $2, $3)")
                .bind(team_id)
                .bind(member.user_id)
                .bind(&member.name)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(Team {
            id: team_id,
            name,
            captain_id,
            members,
        })
    }

    async fn find_team(&self, team_id: i64) -> AppResult<Option<Team>> {
        let mut teams = self.fetch_teams("WHERE t.id = $1", team_id).await?;
        Ok(teams.pop())
    }

    async fn teams_for_user(&self, user_id: i64) -> AppResult<Vec<Team>> {
        self.fetch_teams(
            "WHERE t.captain_id = $1 \
             OR t.id IN (SELECT team_id FROM team_members WHERE user_id = $1)",
            user_id,
        )
        .await
    }

    async fn delete_team(&self, team_id: i64) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<(i64,)> = sqlx::query_as("SELECT id FROM teams WHERE id = $1 FOR UPDATE")
            .bind(team_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(AppError::NotFound("Team not found".to_string()));
        }

        let (registered,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM matches WHERE team_a_id = $1 OR team_b_id = $1",
        )
        .bind(team_id)
        .fetch_one(&mut *tx)
        .await?;
        if registered > 0 {
            return Err(AppError::InvalidInput(format!(
                "Cannot delete team. It is registered in {} match(es)",
                registered
            )));
        }

        sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
