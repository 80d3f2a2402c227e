use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use github_repo_stats::downloads::fetch_download_counts;
use github_repo_stats::github::{DEFAULT_API_URL, GithubClient};
use github_repo_stats::{logging, token};

/// Sum release download counts of a GitHub repository per file extension.
#[derive(Parser)]
#[command(name = "download-stats", version)]
struct Cli {
    /// Name of user or organization
    #[arg(value_name = "OWNER")]
    owner: String,

    /// Name of repository
    #[arg(value_name = "REPO")]
    repo: String,

    /// File extension of download artifact, i.e., '.tar.gz'
    #[arg(value_name = "EXTENSIONS", required = true, num_args = 1..)]
    extensions: Vec<String>,

    /// Include pre-release downloads
    #[arg(short, long)]
    include_prereleases: bool,

    /// Sets API token, otherwise read from GITHUB_API_TOKEN environment variable
    #[arg(short, long, value_name = "TOKEN")]
    token: Option<String>,

    /// Fail instead of reading more than this many release pages
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Base URL of the GitHub REST API
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// More log output on stderr (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let token = token::resolve_token(cli.token.as_deref());
    let client = GithubClient::new(token.as_deref())?
        .with_base_url(&cli.api_url)
        .with_max_pages(cli.max_pages);

    let counts = fetch_download_counts(
        &client,
        &cli.owner,
        &cli.repo,
        &cli.extensions,
        cli.include_prereleases,
    )
    .await
    .with_context(|| format!("Failed to fetch releases of {}/{}", cli.owner, cli.repo))?;

    print!("{}", counts.report());
    Ok(())
}
