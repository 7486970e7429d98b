use serde::Deserialize;

use crate::services::recommendations::RecommenderSettings;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// PostgreSQL connection URL; matches are kept in memory when unset
    #[serde(default)]
    pub database_url: Option<String>,

    /// Redis connection URL; enables the upcoming-match cache when set
    #[serde(default)]
    pub redis_url: Option<String>,

    /// TTL of the cached upcoming-match pool, in seconds
    #[serde(default = "default_upcoming_cache_ttl_secs")]
    pub upcoming_cache_ttl_secs: u64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of recommendations returned when the request names no limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Fixed neighbor count for the similarity search. Follows the request limit when unset.
    #[serde(default)]
    pub recommend_neighbors: Option<usize>,

    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_upcoming_cache_ttl_secs() -> u64 {
    30
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_limit() -> usize {
    5
}

fn default_max_candidates() -> usize {
    500
}

fn default_max_history() -> usize {
    500
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Socket address the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn recommender_settings(&self) -> RecommenderSettings {
        RecommenderSettings {
            neighbors: self.recommend_neighbors,
            max_candidates: self.max_candidates,
            max_history: self.max_history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_environment() {
        let config: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();

        assert_eq!(config.database_url, None);
        assert_eq!(config.redis_url, None);
        assert_eq!(config.upcoming_cache_ttl_secs, 30);
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        assert_eq!(config.default_limit, 5);
        assert_eq!(config.recommend_neighbors, None);
        assert_eq!(config.max_candidates, 500);
        assert_eq!(config.max_history, 500);
    }

    #[test]
    fn test_overrides_from_environment() {
        let vars = vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/kickoff".to_string()),
            ("PORT".to_string(), "8080".to_string()),
            ("RECOMMEND_NEIGHBORS".to_string(), "3".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();

        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/kickoff")
        );
        assert_eq!(config.port, 8080);

        let settings = config.recommender_settings();
        assert_eq!(settings.neighbors, Some(3));
        assert_eq!(settings.max_candidates, 500);
    }
}
