use crate::error::{Result, StatsError};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, trace};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const API_VERSION: &str = "2022-11-28";
pub const PER_PAGE: u32 = 100;

/// Bodies GitHub sends for an empty page or for statistics that are still
/// being computed.
pub const EMPTY_SENTINELS: [&str; 2] = ["[]", "{}"];

/// True only when the raw body is textually one of [`EMPTY_SENTINELS`].
pub fn is_empty_sentinel(body: &str) -> bool {
    EMPTY_SENTINELS.contains(&body)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub prerelease: bool,
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub browser_download_url: String,
    pub download_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,
}

/// One entry of `/repos/{owner}/{repo}/stats/contributors`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContributorActivity {
    /// `null` for accounts that no longer exist.
    pub author: Option<Author>,
    pub total: u64,
    pub weeks: Vec<Week>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub login: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Week {
    /// Start of the week, unix seconds.
    pub w: i64,
    pub a: u64,
    pub d: u64,
    pub c: u64,
}

/// Raw answer to a single request, kept as text so callers can inspect the
/// sentinel bodies before decoding.
#[derive(Debug)]
pub struct ApiResponse {
    pub url: String,
    pub status: StatusCode,
    pub body: String,
}

#[derive(Clone)]
pub struct GithubClient {
    http: Arc<Client>,
    base_url: Arc<String>,
    max_pages: Option<u32>,
}

impl GithubClient {
    /// Create a REST client. Without a token requests go out unauthenticated.
    pub fn new(token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        headers.insert(USER_AGENT, HeaderValue::from_static("github-repo-stats"));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| StatsError::InvalidToken)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            http: Arc::new(http),
            base_url: Arc::new(DEFAULT_API_URL.to_string()),
            max_pages: None,
        })
    }

    /// Point the client at another API root (GitHub Enterprise, a mock server).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Arc::new(base_url.trim_end_matches('/').to_string());
        self
    }

    /// Fail when a page beyond this many still has data.
    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Single GET returning status and body text. Redirects are followed.
    pub async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<ApiResponse> {
        trace!(url, ?query, "GET");
        let resp = self.http.get(url).query(query).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        debug!(url, status = status.as_u16(), bytes = body.len(), "response");
        Ok(ApiResponse {
            url: url.to_string(),
            status,
            body,
        })
    }

    /// Request `page = 1, 2, ...` until the body is an empty sentinel, handing
    /// every decoded page to `on_page`. Returns the number of non-empty pages.
    pub async fn paginate<T, F>(
        &self,
        url: &str,
        params: &[(&str, String)],
        mut on_page: F,
    ) -> Result<u32>
    where
        T: DeserializeOwned,
        F: FnMut(Vec<T>),
    {
        let mut page: u32 = 1;
        loop {
            let mut query: Vec<(&str, String)> = params.to_vec();
            query.push(("per_page", PER_PAGE.to_string()));
            query.push(("page", page.to_string()));

            let resp = self.get(url, &query).await?;
            if is_empty_sentinel(&resp.body) {
                return Ok(page - 1);
            }
            if !resp.status.is_success() {
                return Err(StatsError::Status {
                    status: resp.status.as_u16(),
                    url: url.to_string(),
                    body: resp.body,
                });
            }

            if self.max_pages.is_some_and(|max| page > max) {
                return Err(StatsError::PageLimit {
                    url: url.to_string(),
                    pages: page - 1,
                });
            }

            let items: Vec<T> = serde_json::from_str(&resp.body)
                .map_err(|e| StatsError::json(format!("{url} (page {page})"), e))?;
            on_page(items);
            page += 1;
        }
    }

    /// Walk every page of a repository's releases.
    pub async fn releases<F>(&self, owner: &str, repo: &str, on_page: F) -> Result<u32>
    where
        F: FnMut(Vec<Release>),
    {
        let url = format!("{}/repos/{owner}/{repo}/releases", self.base_url);
        self.paginate(&url, &[], on_page).await
    }

    /// Walk every page of an organization's repositories, sorted by full name.
    pub async fn org_repos<F>(&self, owner: &str, on_page: F) -> Result<u32>
    where
        F: FnMut(Vec<Repository>),
    {
        let url = format!("{}/orgs/{owner}/repos", self.base_url);
        self.paginate(&url, &[("sort", "full_name".to_string())], on_page)
            .await
    }

    /// One request for contributor commit activity. Not paginated; the body
    /// may be a placeholder while GitHub computes the statistics.
    pub async fn contributor_activity(&self, owner: &str, repo: &str) -> Result<ApiResponse> {
        let url = format!("{}/repos/{owner}/{repo}/stats/contributors", self.base_url);
        self.get(&url, &[]).await
    }
}
