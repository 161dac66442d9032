use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use subscene::types::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECONDS};
use subscene::{
    CandidateId, RetrieveOutcome, SearchOutcome, SearchQuery, Subscene, SubsceneError,
    SubsceneOptions, SubtitleCandidate, SubtitleFile,
};

#[derive(Parser)]
#[command(name = "subscene")]
#[command(version, about = "Search and download movie and TV subtitles from Subscene")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Subtitle site root
    #[arg(long, global = true, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    timeout: u64,

    /// Custom User-Agent string
    #[arg(long, global = true)]
    user_agent: Option<String>,

    /// Proxy URL (http://proxy:port)
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// TMDB API key used to resolve canonical titles from --imdb ids
    #[arg(long, global = true, env = "TMDB_API_KEY", hide_env_values = true)]
    tmdb_api_key: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List subtitles for a movie or a TV episode
    Search(SearchArgs),
    /// Download a subtitle by the id printed by `search`
    Download(DownloadArgs),
}

#[derive(Args)]
struct SearchArgs {
    /// Movie title, or series title with --tv
    #[arg(value_name = "TITLE")]
    title: String,

    /// Release year of the movie
    #[arg(short, long)]
    year: Option<i32>,

    /// Subtitle language (e.g., en, fa, per, pt-br)
    #[arg(short, long, default_value = "eng")]
    language: String,

    /// Search for a TV episode instead of a movie
    #[arg(long, requires_all = ["season", "episode"])]
    tv: bool,

    /// Season number (with --tv)
    #[arg(short, long, requires = "tv")]
    season: Option<u32>,

    /// Episode number (with --tv)
    #[arg(short, long, requires = "tv")]
    episode: Option<u32>,

    /// IMDB id of the movie or episode
    #[arg(long)]
    imdb: Option<String>,

    /// Print candidates as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct DownloadArgs {
    /// Candidate id from `search`
    #[arg(value_name = "ID")]
    id: String,

    /// Output file path (default: auto-generated)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output directory (default: current directory)
    #[arg(short = 'D', long)]
    output_dir: Option<PathBuf>,

    /// Force overwrite existing files
    #[arg(long)]
    force: bool,

    /// Transcode the subtitle to UTF-8 before saving
    #[arg(long)]
    utf8: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let client = Subscene::new(build_options(&cli)).context("Failed to create Subscene client")?;

    match &cli.command {
        Command::Search(args) => search(&client, args).await,
        Command::Download(args) => download(&client, args).await,
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "subscene_cli=debug,subscene=debug".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "subscene_cli=info,subscene=info".into())
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .with(env_filter)
        .init();
}

/// Build SubsceneOptions from CLI arguments
fn build_options(cli: &Cli) -> SubsceneOptions {
    let mut options = SubsceneOptions::new()
        .base_url(&cli.base_url)
        .timeout(cli.timeout);

    if let Some(user_agent) = &cli.user_agent {
        options = options.user_agent(user_agent);
    }

    if let Some(proxy) = &cli.proxy {
        options = options.proxy(proxy);
    }

    if let Some(key) = &cli.tmdb_api_key {
        options = options.tmdb_api_key(key);
    }

    options
}

fn build_query(args: &SearchArgs) -> SearchQuery {
    let mut query = match (args.tv, args.season, args.episode) {
        (true, Some(season), Some(episode)) => SearchQuery::episode(&args.title, season, episode),
        _ => SearchQuery::movie(&args.title),
    };

    query = query.language(&args.language);

    if let Some(year) = args.year {
        query = query.year(year);
    }

    if let Some(id) = &args.imdb {
        query = query.external_id(id);
    }

    query
}

/// Search and print the candidate table
async fn search(client: &Subscene, args: &SearchArgs) -> Result<()> {
    let query = build_query(args);

    let candidates = match client.search(&query).await {
        SearchOutcome::Found(candidates) => candidates,
        SearchOutcome::NotFound => {
            eprintln!("❌ No subtitles found for \"{}\"", query.title);
            std::process::exit(1);
        }
        SearchOutcome::Failed(e) => {
            handle_error(&e);
            std::process::exit(1);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
    } else {
        print_candidates(&candidates);
    }

    info!("Listed {} candidates", candidates.len());
    Ok(())
}

fn print_candidates(candidates: &[SubtitleCandidate]) {
    println!("\n{:<48} {:<6} {:<24}", "Name", "Lang", "Id");
    println!("{}", "─".repeat(80));

    for candidate in candidates {
        println!(
            "{:<48} {:<6} {}",
            truncate(&candidate.name, 48),
            candidate.language,
            candidate.id
        );
    }
}

/// Retrieve a subtitle and write it to disk
async fn download(client: &Subscene, args: &DownloadArgs) -> Result<()> {
    let candidate = match CandidateId::decode(&args.id) {
        Ok(candidate) => candidate,
        Err(e) => {
            handle_error(&e);
            std::process::exit(1);
        }
    };

    println!("Downloading subtitle: {}", candidate.path);

    let file = match client.retrieve(&args.id).await {
        RetrieveOutcome::Found(file) => file,
        RetrieveOutcome::NotFound => {
            eprintln!("❌ No downloadable subtitle archive for {}", candidate.path);
            std::process::exit(1);
        }
        RetrieveOutcome::Failed(e) => {
            handle_error(&e);
            std::process::exit(1);
        }
    };

    let output_path = determine_output_path(&candidate, &file, args);
    let content = if args.utf8 {
        file.to_utf8().into_bytes()
    } else {
        file.bytes
    };

    write_subtitle_file(&output_path, &content, args.force).await?;

    println!("Successfully saved subtitle to: {}", output_path.display());
    info!("Wrote {} bytes", content.len());
    Ok(())
}

/// `<last path segment>.<language>.<format>` unless an explicit path is given
fn determine_output_path(candidate: &CandidateId, file: &SubtitleFile, args: &DownloadArgs) -> PathBuf {
    if let Some(output) = &args.output {
        return output.clone();
    }

    let stem = candidate
        .path
        .trim_end_matches('/')
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("subtitle");
    let language = file.language.as_deref().unwrap_or(&candidate.language);
    let format = file.format.as_deref().unwrap_or("srt");
    let filename = format!("{}.{}.{}", stem, language, format);

    match &args.output_dir {
        Some(dir) => dir.join(filename),
        None => PathBuf::from(filename),
    }
}

/// Write subtitle content to file
async fn write_subtitle_file(path: &Path, content: &[u8], force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "File already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    debug!("Written {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Print library errors with user-friendly hints
fn handle_error(error: &SubsceneError) {
    match error {
        SubsceneError::InvalidCandidateId { id } => {
            eprintln!("❌ Not a subtitle id: {}", id);
            eprintln!("   Use the id column printed by `subscene search`.");
        }
        SubsceneError::Network { source } => {
            eprintln!("❌ Network error: {}", source);
            eprintln!("   Check your internet connection and try again.");
        }
        SubsceneError::InvalidUrl { url } => {
            eprintln!("❌ Invalid URL: {}", url);
        }
        SubsceneError::Archive { source } => {
            eprintln!("❌ The downloaded archive could not be read: {}", source);
        }
        _ => {
            eprintln!("❌ Error: {}", error);
        }
    }
}

/// Truncate string to specified length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
