//! Release download counts summed per file extension.

use crate::error::Result;
use crate::github::{Asset, GithubClient, Release};
use indexmap::IndexMap;
use tracing::debug;

/// `"tar.gz"`, `".tar.gz"` and `"..tar.gz"` all become `".tar.gz"`.
pub fn normalize_extension(ext: &str) -> String {
    format!(".{}", ext.trim_start_matches('.'))
}

/// Running download totals keyed by extension, in the order given.
#[derive(Debug, Clone, Default)]
pub struct ExtensionCounts {
    counts: IndexMap<String, u64>,
}

impl ExtensionCounts {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let counts = extensions
            .into_iter()
            .map(|ext| (normalize_extension(ext.as_ref()), 0))
            .collect();
        Self { counts }
    }

    /// Add every asset of `release`, unless it is a prerelease that was not asked for.
    pub fn record_release(&mut self, release: &Release, include_prereleases: bool) {
        if release.prerelease && !include_prereleases {
            return;
        }
        for asset in &release.assets {
            self.record_asset(asset);
        }
    }

    /// Credit the asset to the first extension its URL ends with. Returns that extension.
    pub fn record_asset(&mut self, asset: &Asset) -> Option<&str> {
        let (ext, count) = self
            .counts
            .iter_mut()
            .find(|(ext, _)| asset.browser_download_url.ends_with(ext.as_str()))?;
        *count += asset.download_count;
        Some(ext.as_str())
    }

    pub fn get(&self, ext: &str) -> Option<u64> {
        self.counts.get(ext).copied()
    }

    /// Highest count first; ties keep the order the extensions were given in.
    pub fn sorted(&self) -> Vec<(&str, u64)> {
        let mut rows: Vec<_> = self.counts.iter().map(|(e, c)| (e.as_str(), *c)).collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows
    }

    /// Text report, one `ext - count` line per extension padded to the longest extension.
    pub fn report(&self) -> String {
        let width = self.counts.keys().map(String::len).max().unwrap_or(0);
        self.sorted()
            .into_iter()
            .map(|(ext, count)| format!("{ext:<width$} - {count}\n"))
            .collect()
    }
}

/// Page through every release of `owner/repo` and total the matching assets.
pub async fn fetch_download_counts<S: AsRef<str>>(
    client: &GithubClient,
    owner: &str,
    repo: &str,
    extensions: &[S],
    include_prereleases: bool,
) -> Result<ExtensionCounts> {
    let mut counts = ExtensionCounts::new(extensions);
    let pages = client
        .releases(owner, repo, |releases| {
            for release in &releases {
                counts.record_release(release, include_prereleases);
            }
        })
        .await?;
    debug!(owner, repo, pages, "release pages read");
    Ok(counts)
}
