//! API token lookup: an explicit value wins, then the environment.

use crate::error::{Result, StatsError};

pub const TOKEN_ENV_VAR: &str = "GITHUB_API_TOKEN";

/// Lenient lookup. Empty values count as absent.
pub fn resolve_token(explicit: Option<&str>) -> Option<String> {
    resolve_token_from(explicit, std::env::var(TOKEN_ENV_VAR).ok())
}

/// Strict lookup used by commands that cannot work unauthenticated.
pub fn require_token(explicit: Option<&str>) -> Result<String> {
    resolve_token(explicit).ok_or_else(|| StatsError::MissingToken(TOKEN_ENV_VAR.to_string()))
}

fn resolve_token_from(explicit: Option<&str>, env_value: Option<String>) -> Option<String> {
    explicit
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or(env_value.filter(|t| !t.is_empty()))
}
