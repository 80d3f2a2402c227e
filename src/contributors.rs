//! Contributor commit statistics: downloading the per-repository JSON and
//! folding it into per-contributor totals.

use crate::config::RepoConfig;
use crate::error::{Result, StatsError};
use crate::github::{ContributorActivity, GithubClient, is_empty_sentinel};
use crate::retry::{RetryPolicy, Sleeper};
use clap::ValueEnum;
use indexmap::IndexMap;
use reqwest::StatusCode;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bodies GitHub returns for a repository that does not exist or is not visible.
/// The download phase stores them like any other answer.
pub const NOT_FOUND_PAYLOADS: [&str; 2] = [
    r#"{"message":"Not Found","documentation_url":"https://docs.github.com/rest/metrics/statistics#get-all-contributor-commit-activity"}"#,
    r#"{"message":"Not Found","documentation_url":"https://docs.github.com/rest/metrics/statistics#get-all-contributor-commit-activity","status":"404"}"#,
];

pub const CSV_HEADER: &str = "Contributor,Commits,Added,Deleted,Repos";

/// `<dir>/<owner>/<repo>.json`
pub fn stats_path(dir: &Path, owner: &str, repo: &str) -> PathBuf {
    dir.join(owner).join(format!("{repo}.json"))
}

/// Request contributor statistics until GitHub stops answering with a
/// placeholder, sleeping `policy.wait` between attempts.
///
/// A 404 body is returned as is so it ends up on disk; any other error status fails.
/// A 204 (repository without commits) comes back as `[]`.
pub async fn fetch_when_ready<S: Sleeper>(
    client: &GithubClient,
    owner: &str,
    repo: &str,
    policy: &RetryPolicy,
    sleeper: &S,
) -> Result<String> {
    let mut attempts: u32 = 0;
    loop {
        let resp = client.contributor_activity(owner, repo).await?;
        attempts += 1;

        if resp.status == StatusCode::NO_CONTENT {
            return Ok("[]".to_string());
        }
        let pending = resp.status == StatusCode::ACCEPTED || is_empty_sentinel(&resp.body);
        if !pending {
            if resp.status.is_success() || resp.status == StatusCode::NOT_FOUND {
                return Ok(resp.body);
            }
            return Err(StatsError::Status {
                status: resp.status.as_u16(),
                url: resp.url,
                body: resp.body,
            });
        }

        if !policy.should_retry(attempts) {
            return Err(StatsError::RetriesExhausted {
                url: resp.url,
                attempts,
            });
        }
        debug!(owner, repo, attempts, "statistics not ready yet");
        print!(".");
        let _ = std::io::stdout().flush();
        sleeper.sleep(policy.wait).await;
    }
}

/// Download phase: fetch every configured repository and write its raw body
/// under `dir`. Returns the written paths in configuration order.
pub async fn download<S: Sleeper>(
    client: &GithubClient,
    config: &RepoConfig,
    dir: &Path,
    policy: &RetryPolicy,
    sleeper: &S,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(config.repo_count());
    for (owner, repo) in config.pairs() {
        print!("Getting info on {owner}/{repo} ..");
        let _ = std::io::stdout().flush();

        let body = fetch_when_ready(client, owner, repo, policy, sleeper).await?;
        println!(".. done");

        let path = stats_path(dir, owner, repo);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, body)?;
        info!(path = %path.display(), "saved contributor statistics");
        written.push(path);
    }
    Ok(written)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortField {
    #[default]
    Commits,
    Added,
    Deleted,
    Repos,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContributorStats {
    pub commits: u64,
    pub added: u64,
    pub deleted: u64,
    pub repos: u64,
}

impl ContributorStats {
    pub fn field(&self, field: SortField) -> u64 {
        match field {
            SortField::Commits => self.commits,
            SortField::Added => self.added,
            SortField::Deleted => self.deleted,
            SortField::Repos => self.repos,
        }
    }
}

/// Totals keyed by login, in the order contributors were first seen.
#[derive(Debug, Clone, Default)]
pub struct ContributorTotals {
    by_login: IndexMap<String, ContributorStats>,
}

impl ContributorTotals {
    /// Fold one repository's statistics in. Entries without an author are skipped.
    pub fn add_repository(&mut self, activity: &[ContributorActivity]) {
        for entry in activity {
            let Some(author) = &entry.author else {
                debug!(total = entry.total, "skipping contributor without a login");
                continue;
            };
            let stats = self.by_login.entry(author.login.clone()).or_default();
            stats.commits += entry.total;
            for week in &entry.weeks {
                stats.added += week.a;
                stats.deleted += week.d;
            }
            stats.repos += 1;
        }
    }

    pub fn get(&self, login: &str) -> Option<&ContributorStats> {
        self.by_login.get(login)
    }

    pub fn len(&self) -> usize {
        self.by_login.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_login.is_empty()
    }

    /// Ascending by `field`, or descending when `reverse`. Ties keep encounter order.
    pub fn sorted(&self, field: SortField, reverse: bool) -> Vec<(&str, &ContributorStats)> {
        let mut rows: Vec<_> = self.by_login.iter().map(|(l, s)| (l.as_str(), s)).collect();
        if reverse {
            rows.sort_by(|a, b| b.1.field(field).cmp(&a.1.field(field)));
        } else {
            rows.sort_by_key(|(_, s)| s.field(field));
        }
        rows
    }

    pub fn to_csv(&self, field: SortField, reverse: bool) -> String {
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for (login, s) in self.sorted(field, reverse) {
            out.push_str(&format!(
                "{},{},{},{},{}\n",
                csv_field(login),
                s.commits,
                s.added,
                s.deleted,
                s.repos
            ));
        }
        out
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Missing,
    NotFound,
    Invalid,
}

impl SkipReason {
    fn describe(self) -> &'static str {
        match self {
            SkipReason::Missing => "does not exist",
            SkipReason::NotFound => "contains a Not Found response",
            SkipReason::Invalid => "is not valid contributor data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRepo {
    pub owner: String,
    pub repo: String,
    pub reason: SkipReason,
}

pub enum RepoActivity {
    Loaded(Vec<ContributorActivity>),
    Skipped(SkipReason),
    /// Present but not decodable, e.g. truncated or empty.
    Invalid(serde_json::Error),
}

/// Read one stored repository file written by [`download`].
pub fn load_activity(dir: &Path, owner: &str, repo: &str) -> Result<RepoActivity> {
    let path = stats_path(dir, owner, repo);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Ok(RepoActivity::Skipped(SkipReason::Missing));
        }
        Err(e) => return Err(e.into()),
    };
    if NOT_FOUND_PAYLOADS.contains(&text.as_str()) {
        return Ok(RepoActivity::Skipped(SkipReason::NotFound));
    }
    match serde_json::from_str(&text) {
        Ok(activity) => Ok(RepoActivity::Loaded(activity)),
        Err(e) => Ok(RepoActivity::Invalid(e)),
    }
}

#[derive(Debug, Default)]
pub struct Aggregation {
    pub totals: ContributorTotals,
    pub skipped: Vec<SkippedRepo>,
}

/// Generate phase: sum every configured repository found under `dir`.
/// Missing, "Not Found" and undecodable repositories are reported on stderr
/// and skipped.
pub fn aggregate(config: &RepoConfig, dir: &Path) -> Result<Aggregation> {
    let mut result = Aggregation::default();
    for (owner, repo) in config.pairs() {
        let path = stats_path(dir, owner, repo);
        let reason = match load_activity(dir, owner, repo)? {
            RepoActivity::Loaded(activity) => {
                result.totals.add_repository(&activity);
                continue;
            }
            RepoActivity::Skipped(reason) => {
                eprintln!("Warning: {} {}, skipping", path.display(), reason.describe());
                reason
            }
            RepoActivity::Invalid(e) => {
                eprintln!(
                    "Warning: {} {} ({e}), skipping",
                    path.display(),
                    SkipReason::Invalid.describe()
                );
                SkipReason::Invalid
            }
        };
        debug!(owner, repo, ?reason, "repository skipped");
        result.skipped.push(SkippedRepo {
            owner: owner.to_string(),
            repo: repo.to_string(),
            reason,
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::testing::RecordingSleeper;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn activity_json(entries: &[(&str, u64, &[(u64, u64)])]) -> String {
        let items: Vec<_> = entries
            .iter()
            .map(|(login, total, weeks)| {
                let weeks: Vec<_> = weeks
                    .iter()
                    .map(|(a, d)| serde_json::json!({"w": 0, "a": a, "d": d, "c": 1}))
                    .collect();
                serde_json::json!({"author": {"login": login}, "total": total, "weeks": weeks})
            })
            .collect();
        serde_json::to_string(&items).unwrap()
    }

    fn parse(text: &str) -> Vec<ContributorActivity> {
        serde_json::from_str(text).unwrap()
    }

    fn write_repo(dir: &Path, owner: &str, repo: &str, body: &str) {
        let path = stats_path(dir, owner, repo);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn sums_one_contributor_across_three_repositories() {
        let mut totals = ContributorTotals::default();
        totals.add_repository(&parse(&activity_json(&[("octo", 10, &[(1, 0)])])));
        totals.add_repository(&parse(&activity_json(&[("octo", 20, &[(1, 0), (1, 1)])])));
        totals.add_repository(&parse(&activity_json(&[("octo", 30, &[(3, 2)])])));

        assert_eq!(
            totals.get("octo"),
            Some(&ContributorStats {
                commits: 60,
                added: 6,
                deleted: 3,
                repos: 3
            })
        );
    }

    #[test]
    fn repository_order_does_not_change_totals() {
        let repos = [
            activity_json(&[("a", 1, &[(5, 1)]), ("b", 2, &[(1, 1)])]),
            activity_json(&[("b", 4, &[(2, 0)]), ("c", 8, &[])]),
            activity_json(&[("a", 16, &[(0, 9)])]),
        ];
        let mut forward = ContributorTotals::default();
        let mut backward = ContributorTotals::default();
        for r in &repos {
            forward.add_repository(&parse(r));
        }
        for r in repos.iter().rev() {
            backward.add_repository(&parse(r));
        }
        for login in ["a", "b", "c"] {
            assert_eq!(forward.get(login), backward.get(login));
        }
        assert_eq!(forward.len(), 3);
    }

    #[test]
    fn repos_counted_even_without_weeks() {
        let mut totals = ContributorTotals::default();
        totals.add_repository(&parse(&activity_json(&[("solo", 2, &[])])));
        assert_eq!(totals.get("solo").unwrap().repos, 1);
        assert_eq!(totals.get("solo").unwrap().added, 0);
    }

    #[test]
    fn null_author_is_ignored() {
        let mut totals = ContributorTotals::default();
        totals.add_repository(&parse(r#"[{"author": null, "total": 5, "weeks": []}]"#));
        assert!(totals.is_empty());
    }

    #[test]
    fn descending_sort_is_stable() {
        let mut totals = ContributorTotals::default();
        totals.add_repository(&parse(&activity_json(&[
            ("first", 1, &[(5, 0)]),
            ("second", 1, &[(9, 0)]),
            ("third", 1, &[(5, 0)]),
            ("fourth", 1, &[(1, 0)]),
        ])));

        let order: Vec<_> = totals
            .sorted(SortField::Added, true)
            .into_iter()
            .map(|(l, _)| l)
            .collect();
        assert_eq!(order, vec!["second", "first", "third", "fourth"]);

        let order: Vec<_> = totals
            .sorted(SortField::Added, false)
            .into_iter()
            .map(|(l, _)| l)
            .collect();
        assert_eq!(order, vec!["fourth", "first", "third", "second"]);
    }

    #[test]
    fn csv_has_header_and_quotes_when_needed() {
        let mut totals = ContributorTotals::default();
        totals.add_repository(&parse(&activity_json(&[
            ("plain", 3, &[(4, 5)]),
            ("we,ird", 1, &[]),
        ])));
        assert_eq!(
            totals.to_csv(SortField::Commits, true),
            "Contributor,Commits,Added,Deleted,Repos\nplain,3,4,5,1\n\"we,ird\",1,0,0,1\n"
        );
    }

    #[test]
    fn aggregate_skips_missing_and_not_found_files() {
        let dir = tempdir().unwrap();
        let config = RepoConfig::from_yaml_str("acme:\n- one\n- gone\n- private\n- two\n").unwrap();
        write_repo(dir.path(), "acme", "one", &activity_json(&[("octo", 1, &[(1, 1)])]));
        write_repo(dir.path(), "acme", "private", NOT_FOUND_PAYLOADS[0]);
        write_repo(dir.path(), "acme", "two", &activity_json(&[("octo", 2, &[(2, 2)])]));

        let result = aggregate(&config, dir.path()).unwrap();

        assert_eq!(
            result.skipped,
            vec![
                SkippedRepo {
                    owner: "acme".into(),
                    repo: "gone".into(),
                    reason: SkipReason::Missing
                },
                SkippedRepo {
                    owner: "acme".into(),
                    repo: "private".into(),
                    reason: SkipReason::NotFound
                },
            ]
        );
        let octo = result.totals.get("octo").unwrap();
        assert_eq!((octo.commits, octo.repos), (3, 2));
    }

    #[test]
    fn undecodable_files_are_skipped_and_the_rest_still_counted() {
        let dir = tempdir().unwrap();
        let config = RepoConfig::from_yaml_str("acme:\n- empty\n- cut\n- good\n").unwrap();
        write_repo(dir.path(), "acme", "empty", "");
        write_repo(dir.path(), "acme", "cut", r#"[{"author": {"login": "oc"#);
        write_repo(dir.path(), "acme", "good", &activity_json(&[("octo", 4, &[(2, 1)])]));

        let result = aggregate(&config, dir.path()).unwrap();

        let reasons: Vec<_> = result
            .skipped
            .iter()
            .map(|s| (s.repo.as_str(), s.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![("empty", SkipReason::Invalid), ("cut", SkipReason::Invalid)]
        );
        assert_eq!(
            result.totals.get("octo"),
            Some(&ContributorStats {
                commits: 4,
                added: 2,
                deleted: 1,
                repos: 1
            })
        );
    }

    #[tokio::test]
    async fn download_polls_until_ready_and_writes_body() {
        let server = MockServer::start().await;
        let ready = activity_json(&[("octo", 1, &[(1, 0)])]);
        Mock::given(method("GET"))
            .and(path("/repos/acme/slow/stats/contributors"))
            .respond_with(ResponseTemplate::new(202).set_body_string("{}"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/slow/stats/contributors"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/slow/stats/contributors"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ready.clone()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/other/missing/stats/contributors"))
            .respond_with(ResponseTemplate::new(404).set_body_string(NOT_FOUND_PAYLOADS[1]))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let config = RepoConfig::from_yaml_str("acme:\n- slow\nother:\n- missing\n").unwrap();
        let client = GithubClient::new(Some("t")).unwrap().with_base_url(&server.uri());
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::fixed(Duration::from_secs(3));

        let written = download(&client, &config, dir.path(), &policy, &sleeper)
            .await
            .unwrap();

        assert_eq!(
            written,
            vec![
                dir.path().join("acme").join("slow.json"),
                dir.path().join("other").join("missing.json"),
            ]
        );
        assert_eq!(fs::read_to_string(&written[0]).unwrap(), ready);
        assert_eq!(fs::read_to_string(&written[1]).unwrap(), NOT_FOUND_PAYLOADS[1]);
        assert_eq!(sleeper.calls(), vec![Duration::from_secs(3); 2]);
    }

    #[tokio::test]
    async fn bounded_policy_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/never/stats/contributors"))
            .respond_with(ResponseTemplate::new(202).set_body_string("{}"))
            .mount(&server)
            .await;

        let client = GithubClient::new(None).unwrap().with_base_url(&server.uri());
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::fixed(Duration::from_millis(1)).with_max_attempts(Some(3));

        let err = fetch_when_ready(&client, "acme", "never", &policy, &sleeper)
            .await
            .unwrap_err();
        assert!(matches!(err, StatsError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(sleeper.calls().len(), 2);
    }

    #[tokio::test]
    async fn server_error_is_not_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let client = GithubClient::new(None).unwrap().with_base_url(&server.uri());
        let err = fetch_when_ready(
            &client,
            "acme",
            "broken",
            &RetryPolicy::default(),
            &RecordingSleeper::default(),
        )
        .await
        .unwrap_err();
        match err {
            StatsError::Status { status, url, .. } => {
                assert_eq!(status, 500);
                assert_eq!(
                    url,
                    format!("{}/repos/acme/broken/stats/contributors", server.uri())
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn exhausted_retries_name_the_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let client = GithubClient::new(None).unwrap().with_base_url(&server.uri());
        let policy = RetryPolicy::fixed(Duration::ZERO).with_max_attempts(Some(1));
        let err = fetch_when_ready(&client, "acme", "idle", &policy, &RecordingSleeper::default())
            .await
            .unwrap_err();
        assert!(
            err.to_string()
                .contains(&format!("{}/repos/acme/idle/stats/contributors", server.uri()))
        );
    }

    #[tokio::test]
    async fn no_content_is_stored_as_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/fresh/stats/contributors"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let config = RepoConfig::from_yaml_str("acme:\n- fresh\n").unwrap();
        let client = GithubClient::new(None).unwrap().with_base_url(&server.uri());
        let sleeper = RecordingSleeper::default();

        let written = download(&client, &config, dir.path(), &RetryPolicy::default(), &sleeper)
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(&written[0]).unwrap(), "[]");
        assert!(sleeper.calls().is_empty());
        let result = aggregate(&config, dir.path()).unwrap();
        assert!(result.totals.is_empty());
        assert!(result.skipped.is_empty());
    }
}
