//! socialdash - CRUD dashboard for Twitter/X, Instagram, Reddit and YouTube

mod pages;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use libsocialdash::config::{resolve_config_path, Config};
use libsocialdash::credentials::{load_dotenv, missing_variables, EnvSource};
use libsocialdash::logging::{LogFormat, LoggingConfig};
use libsocialdash::platforms::google_oauth::TokenCache;
use libsocialdash::{DashError, PlatformKind};
use serde::Serialize;

use pages::instagram::InstagramCommand;
use pages::reddit::RedditCommand;
use pages::twitter::TwitterCommand;
use pages::youtube::YouTubeCommand;
use pages::{OutputFormat, Page};

#[derive(Parser, Debug)]
#[command(name = "socialdash")]
#[command(
    version,
    about = "Create, read, update and delete posts on Twitter/X, Instagram, Reddit and YouTube"
)]
#[command(long_about = r#"Create, read, update and delete posts on Twitter/X, Instagram, Reddit and
YouTube through their official APIs. Each command performs one action on one
platform.

EXAMPLES:
    # Which platforms have complete credentials?
    socialdash status

    # Twitter/X
    socialdash twitter create "Hello from socialdash"
    socialdash twitter recent --limit 5
    echo "Corrected text" | socialdash twitter update 1460323737035677698

    # Instagram (the image must be publicly reachable)
    socialdash instagram publish https://example.com/sunset.jpg --caption "Golden hour"

    # Reddit
    socialdash reddit create -r test -t Hello World
    socialdash reddit update --title Hello --content "Edited body"

    # YouTube (first use prints a code to enter at google.com/device)
    socialdash youtube login
    socialdash youtube upload clip.mp4 --title "Launch day" --privacy unlisted
    socialdash youtube delete --title "Launch day" --yes

    # JSON output for scripting
    socialdash --format json reddit recent | jq '.[].title'

CREDENTIALS:
    Read from the environment or a .env file in the working directory:
    TWITTER_CLIENT_ID, TWITTER_CLIENT_SECRET, TWITTER_BEARER_TOKEN,
    TWITTER_ACCESS_TOKEN, TWITTER_ACCESS_TOKEN_SECRET,
    INSTAGRAM_ACCESS_TOKEN, INSTAGRAM_ACCOUNT_ID,
    REDDIT_CLIENT_ID, REDDIT_CLIENT_SECRET, REDDIT_USERNAME,
    REDDIT_PASSWORD, REDDIT_USER_AGENT,
    YOUTUBE_CLIENT_ID, YOUTUBE_CLIENT_SECRET

EXIT CODES:
    0 - Success
    1 - Platform or configuration error
    2 - Authentication failed or credentials missing
    3 - Invalid input
    4 - Rate limit exceeded
"#)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output format
    #[arg(short, long, global = true, default_value = "text", value_name = "FORMAT")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (overrides SOCIALDASH_LOG_FORMAT)
    #[arg(long, global = true, value_name = "FORMAT")]
    #[arg(value_parser = ["text", "json", "pretty"])]
    log_format: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show which platforms are configured (makes no network calls)
    Status,

    /// Twitter/X tweets
    #[command(subcommand)]
    Twitter(TwitterCommand),

    /// Instagram business account posts
    #[command(subcommand)]
    Instagram(InstagramCommand),

    /// Reddit submissions
    #[command(subcommand)]
    Reddit(RedditCommand),

    /// YouTube videos
    #[command(name = "youtube")]
    #[command(subcommand)]
    YouTube(YouTubeCommand),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // .env may set SOCIALDASH_LOG_FORMAT and SOCIALDASH_LOG_LEVEL
    load_dotenv();

    let log_format = cli
        .log_format
        .as_deref()
        .and_then(|f| f.parse::<LogFormat>().ok());
    LoggingConfig::from_env(cli.verbose)
        .with_format(log_format)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        let code = e
            .downcast_ref::<DashError>()
            .map(DashError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let format: OutputFormat = cli
        .format
        .parse()
        .map_err(DashError::InvalidInput)?;
    let config = Config::load()?;
    let page = Page::new(config, format);

    match cli.command {
        Command::Status => status(&page)?,
        Command::Twitter(command) => pages::twitter::run(command, &page).await?,
        Command::Instagram(command) => pages::instagram::run(command, &page).await?,
        Command::Reddit(command) => pages::reddit::run(command, &page).await?,
        Command::YouTube(command) => pages::youtube::run(command, &page).await?,
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct PlatformStatus {
    platform: PlatformKind,
    configured: bool,
    missing: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DashboardStatus {
    config_file: String,
    config_file_exists: bool,
    platforms: Vec<PlatformStatus>,
    youtube_token_cached: bool,
}

fn status(page: &Page) -> Result<()> {
    let config_path = resolve_config_path().context("Failed to resolve config path")?;
    let youtube_token = TokenCache::new(page.config.youtube.token_path());

    let status = DashboardStatus {
        config_file: config_path.display().to_string(),
        config_file_exists: config_path.exists(),
        platforms: PlatformKind::ALL
            .iter()
            .map(|&platform| {
                let missing = missing_variables(platform, &EnvSource);
                PlatformStatus {
                    platform,
                    configured: missing.is_empty(),
                    missing,
                }
            })
            .collect(),
        youtube_token_cached: youtube_token.load().is_some(),
    };

    page.render(&status, || {
        let mut lines = vec![format!(
            "Config file: {}{}",
            status.config_file,
            if status.config_file_exists { "" } else { " (not found, using defaults)" }
        )];
        for platform in &status.platforms {
            if platform.configured {
                lines.push(format!("  ✓ {}", platform.platform.display_name()));
            } else {
                lines.push(format!(
                    "  ✗ {} (missing {})",
                    platform.platform.display_name(),
                    platform.missing.join(", ")
                ));
            }
        }
        lines.push(format!(
            "YouTube authorization cached: {}",
            if status.youtube_token_cached { "yes" } else { "no" }
        ));
        lines.join("\n")
    })?;

    Ok(())
}
