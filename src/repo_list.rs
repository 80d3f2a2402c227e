use crate::config::RepoConfig;
use crate::error::Result;
use crate::github::GithubClient;
use std::collections::BTreeSet;
use std::io::Write;
use tracing::info;

/// Every repository name under `owner`, deduplicated and sorted.
///
/// With `progress` set a dot is printed to stdout per page.
pub async fn fetch_repo_names(
    client: &GithubClient,
    owner: &str,
    progress: bool,
) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    let pages = client
        .org_repos(owner, |repos| {
            names.extend(repos.into_iter().map(|r| r.name));
            if progress {
                print!(".");
                let _ = std::io::stdout().flush();
            }
        })
        .await?;
    if progress {
        println!();
    }
    info!(owner, pages, repos = names.len(), "fetched repository list");
    Ok(names)
}

/// The list as a configuration document usable by `download` and `generate`.
pub fn repo_list_config(owner: &str, names: BTreeSet<String>) -> RepoConfig {
    let mut config = RepoConfig::default();
    config.insert(owner, names.into_iter().collect());
    config
}
