use thiserror::Error;

pub type Result<T> = std::result::Result<T, StatsError>;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitHub API returned HTTP {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode JSON from {origin}: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Must pass token from --token option or {0} environment variable")]
    MissingToken(String),
    #[error("API token contains characters not allowed in an HTTP header")]
    InvalidToken,
    #[error("Gave up on {url} after {pages} pages")]
    PageLimit { url: String, pages: u32 },
    #[error("Statistics for {url} still not computed after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },
}

impl StatsError {
    pub(crate) fn json(origin: impl Into<String>, source: serde_json::Error) -> Self {
        StatsError::Json {
            origin: origin.into(),
            source,
        }
    }
}
