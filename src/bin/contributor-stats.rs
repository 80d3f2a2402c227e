use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use github_repo_stats::config::RepoConfig;
use github_repo_stats::contributors::{self, SortField};
use github_repo_stats::github::{DEFAULT_API_URL, GithubClient};
use github_repo_stats::retry::{RetryPolicy, TokioSleeper};
use github_repo_stats::{logging, output, repo_list, token};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Process GitHub contributor stats
#[derive(Parser)]
#[command(name = "contributor-stats", version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Base URL of the GitHub REST API
    #[arg(long, global = true, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// More log output on stderr (repeatable)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the repositories of an organization as an input file
    FetchRepoList {
        /// Name of user or organization
        #[arg(value_name = "OWNER")]
        owner: String,

        /// Sets API token, otherwise read from GITHUB_API_TOKEN environment variable
        #[arg(short, long, value_name = "TOKEN")]
        token: Option<String>,

        /// Output file, printed to stdout when omitted
        #[arg(short, long, value_name = "OUTFILE")]
        outfile: Option<PathBuf>,

        /// Fail instead of reading more than this many pages
        #[arg(long, value_name = "N")]
        max_pages: Option<u32>,
    },
    /// Download contributor statistics for every repository in the input file
    Download {
        /// File containing repos under a user or organization
        #[arg(value_name = "INPUT_FILE")]
        input_file: PathBuf,

        /// Directory to write repo data files to
        #[arg(short, long, value_name = "DIRECTORY", default_value = ".")]
        directory: PathBuf,

        /// Sets API token, otherwise read from GITHUB_API_TOKEN environment variable
        #[arg(short, long, value_name = "TOKEN")]
        token: Option<String>,

        /// Seconds between API call retries
        #[arg(short, long, value_name = "WAIT", default_value = "3", value_parser = parse_wait)]
        wait: Duration,

        /// Give up on a repository after this many requests (default: never)
        #[arg(long, value_name = "N")]
        max_attempts: Option<u32>,
    },
    /// Sum downloaded statistics per contributor into a CSV report
    Generate {
        /// File containing repos under a user or organization
        #[arg(value_name = "INPUT_FILE")]
        input_file: PathBuf,

        /// Directory holding the downloaded repo data files
        #[arg(short, long, value_name = "DIRECTORY", default_value = ".")]
        directory: PathBuf,

        /// Output file, printed to stdout when omitted
        #[arg(short, long, value_name = "OUTFILE")]
        outfile: Option<PathBuf>,

        /// Column to order rows by
        #[arg(short, long, value_enum, default_value_t = SortField::Commits)]
        sort_by: SortField,

        /// Order rows from highest to lowest
        #[arg(short, long)]
        reverse: bool,
    },
}

fn parse_wait(s: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{e}"))
}

fn load_config(path: &Path) -> Result<RepoConfig> {
    RepoConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.common.verbose);

    match cli.command {
        Commands::FetchRepoList {
            owner,
            token: explicit,
            outfile,
            max_pages,
        } => {
            let token = token::resolve_token(explicit.as_deref());
            let client = GithubClient::new(token.as_deref())?
                .with_base_url(&cli.common.api_url)
                .with_max_pages(max_pages);
            let names = repo_list::fetch_repo_names(&client, &owner, outfile.is_some())
                .await
                .with_context(|| format!("Failed to list repositories of {owner}"))?;
            let document = repo_list::repo_list_config(&owner, names).to_yaml_string()?;
            output::emit(outfile.as_deref(), &document)?;
        }
        Commands::Download {
            input_file,
            directory,
            token: explicit,
            wait,
            max_attempts,
        } => {
            let token = token::require_token(explicit.as_deref())?;
            let config = load_config(&input_file)?;
            let client = GithubClient::new(Some(&token))?.with_base_url(&cli.common.api_url);
            let policy = RetryPolicy::fixed(wait).with_max_attempts(max_attempts);
            contributors::download(&client, &config, &directory, &policy, &TokioSleeper).await?;
        }
        Commands::Generate {
            input_file,
            directory,
            outfile,
            sort_by,
            reverse,
        } => {
            let config = load_config(&input_file)?;
            let aggregation = contributors::aggregate(&config, &directory)?;
            let csv = aggregation.totals.to_csv(sort_by, reverse);
            output::emit(outfile.as_deref(), &csv)?;
        }
    }

    Ok(())
}
