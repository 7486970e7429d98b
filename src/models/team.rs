use serde::{Deserialize, Serialize};

/// One line of a team roster. Members without an account only have a name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamMember {
    pub user_id: Option<i64>,
    pub name: String,
}

/// A standing team led by its captain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub captain_id: i64,
    pub members: Vec<TeamMember>,
}

impl Team {
    /// Account ids on the roster, in roster order and without repeats.
    ///
    /// These are the players enrolled in a match when the team takes a side.
    pub fn player_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = Vec::with_capacity(self.members.len());
        for id in self.members.iter().filter_map(|m| m.user_id) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Whether the user captains the team or is on its roster
    pub fn includes(&self, user_id: i64) -> bool {
        self.captain_id == user_id || self.members.iter().any(|m| m.user_id == Some(user_id))
    }
}

/// Roster entry submitted when creating a team.
///
/// A registered email links the entry to that account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTeamMember {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Payload for creating a team
#[derive(Debug, Clone, Deserialize)]
pub struct NewTeam {
    pub name: String,
    pub captain_id: i64,
    #[serde(default)]
    pub members: Vec<NewTeamMember>,
}
