//! Command-line helpers around the GitHub REST API: release download counts
//! per file extension and contributor commit statistics across repositories.

pub mod config;
pub mod contributors;
pub mod downloads;
pub mod error;
pub mod github;
pub mod logging;
pub mod output;
pub mod repo_list;
pub mod retry;
pub mod token;

pub use error::{Result, StatsError};
pub use github::GithubClient;
