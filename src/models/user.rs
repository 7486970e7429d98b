use serde::{Deserialize, Serialize};

/// A registered player
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub age: Option<i32>,
}

/// Payload for registering a player
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
}
