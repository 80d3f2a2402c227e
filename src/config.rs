use crate::error::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Owner login mapped to the repositories to process, in file order.
///
/// ```yaml
/// rust-lang:
///   - cargo
///   - rust
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoConfig {
    owners: IndexMap<String, Vec<String>>,
}

impl RepoConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn insert(&mut self, owner: impl Into<String>, repos: Vec<String>) {
        self.owners.insert(owner.into(), repos);
    }

    /// Every `(owner, repo)` pair in configuration order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.owners
            .iter()
            .flat_map(|(owner, repos)| repos.iter().map(move |r| (owner.as_str(), r.as_str())))
    }

    pub fn repo_count(&self) -> usize {
        self.owners.values().map(Vec::len).sum()
    }
}
