use std::sync::Arc;

use crate::{
    db::MatchRepository,
    error::{AppError, AppResult},
    models::{NewTeam, Team, TeamMember, User},
    services::matches::{require_team, require_user},
};

/// Creates a team with its captain as the first roster entry.
///
/// A member whose email belongs to a registered user is linked to that
/// account and listed under the account's name. Only linked members are
/// enrolled when the team plays. Other members stay on the roster by name.
pub async fn create_team(
    repository: Arc<dyn MatchRepository>,
    new_team: NewTeam,
) -> AppResult<Team> {
    let name = new_team.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("Team name is required".to_string()));
    }

    let captain = require_user(repository.as_ref(), new_team.captain_id).await?;

    let mut members = vec![TeamMember {
        user_id: Some(captain.id),
        name: display_name(&captain),
    }];

    for member in new_team.members {
        let account = match member.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => repository.find_user_by_email(email).await?,
            _ => None,
        };

        if let Some(user) = &account {
            if members.iter().any(|m| m.user_id == Some(user.id)) {
                tracing::debug!(user_id = user.id, "Skipping repeated roster entry");
                continue;
            }
        }

        members.push(match account {
            Some(user) => TeamMember {
                user_id: Some(user.id),
                name: display_name(&user),
            },
            None => TeamMember {
                user_id: None,
                name: member.name,
            },
        });
    }

    let team = repository
        .create_team(name.to_string(), captain.id, members)
        .await?;

    tracing::info!(
        team_id = team.id,
        captain_id = captain.id,
        members = team.members.len(),
        linked = team.player_ids().len(),
        "Team created"
    );

    Ok(team)
}

fn display_name(user: &User) -> String {
    user.full_name.clone().unwrap_or_else(|| user.email.clone())
}

/// Teams the user captains or plays for
pub async fn teams_for_user(
    repository: Arc<dyn MatchRepository>,
    user_id: i64,
) -> AppResult<Vec<Team>> {
    require_user(repository.as_ref(), user_id).await?;
    repository.teams_for_user(user_id).await
}

pub async fn get_team(repository: Arc<dyn MatchRepository>, team_id: i64) -> AppResult<Team> {
    require_team(repository.as_ref(), team_id).await
}

/// Deletes a team. Only its captain may, and only while it plays no match.
pub async fn delete_team(
    repository: Arc<dyn MatchRepository>,
    team_id: i64,
    requested_by: i64,
) -> AppResult<()> {
    let team = require_team(repository.as_ref(), team_id).await?;
    if team.captain_id != requested_by {
        return Err(AppError::Forbidden(
            "Only the team captain can delete the team".to_string(),
        ));
    }

    repository.delete_team(team_id).await?;
    tracing::info!(team_id, "Team deleted");
    Ok(())
}
