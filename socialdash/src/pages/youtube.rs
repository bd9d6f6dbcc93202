//! YouTube page
//!
//! Every command first makes sure there is a usable OAuth token. On first
//! use that means a device-code consent: the code and the URL to enter it at
//! are printed to stderr and the command waits for approval.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use libsocialdash::error::{DashError, Result};
use libsocialdash::platforms::google_oauth::DeviceCode;
use libsocialdash::platforms::youtube::YouTubeOperations;
use libsocialdash::types::{PrivacyStatus, Video, VideoMetadata};

use super::{missing_selection, select_by_title, Page};

/// How many recent videos `--title` searches
const RECENT_FOR_SELECTION: u32 = 5;

#[derive(Args, Debug)]
pub struct VideoSelector {
    /// Video ID
    id: Option<String>,

    /// Pick the video by title from your recent uploads
    #[arg(long, conflicts_with = "id")]
    title: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum YouTubeCommand {
    /// Authorize socialdash for your channel
    Login {
        /// Discard the cached authorization and ask for consent again
        #[arg(long)]
        fresh: bool,
    },

    /// Upload a video
    Upload {
        /// Video file (reads the video from stdin if not provided)
        file: Option<PathBuf>,

        /// Video title
        #[arg(short, long)]
        title: String,

        /// Video description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Privacy status: public, unlisted or private
        #[arg(short, long, default_value = "private")]
        privacy: PrivacyStatus,

        /// Container format of stdin input
        #[arg(long, default_value = "mp4")]
        extension: String,
    },

    /// List your most recent uploads
    List {
        /// Number of videos to show (1-50)
        #[arg(short, long, default_value = "5")]
        #[arg(value_parser = clap::value_parser!(u32).range(1..=50))]
        limit: u32,
    },

    /// Show one video's details and statistics
    Read {
        #[command(flatten)]
        video: VideoSelector,
    },

    /// Change a video's title and description
    Update {
        #[command(flatten)]
        video: VideoSelector,

        /// New title (keeps the current title if omitted)
        #[arg(long)]
        set_title: Option<String>,

        /// New description (keeps the current description if omitted)
        #[arg(long)]
        set_description: Option<String>,
    },

    /// Delete a video
    Delete {
        #[command(flatten)]
        video: VideoSelector,

        /// Confirm that the deletion cannot be undone
        #[arg(short, long)]
        yes: bool,
    },

    /// Show which channel the authorization belongs to
    Whoami,
}

pub async fn run(command: YouTubeCommand, page: &Page) -> Result<()> {
    let mut youtube = YouTubeOperations::from_env(&page.config)?;

    if let YouTubeCommand::Login { fresh: true } = command {
        youtube.logout()?;
    }
    let me = youtube.authenticate(show_device_code).await?;

    match command {
        YouTubeCommand::Login { .. } | YouTubeCommand::Whoami => page.render_identity(&me, None),
        YouTubeCommand::Upload {
            file,
            title,
            description,
            privacy,
            extension,
        } => {
            let metadata = VideoMetadata {
                title,
                description,
                privacy,
            };
            let video = match file {
                Some(path) => {
                    let extension = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or(&extension)
                        .to_string();
                    let reader = tokio::fs::File::open(&path).await?;
                    youtube
                        .create_video_from_reader(&metadata, reader, &extension)
                        .await?
                }
                None => {
                    youtube
                        .create_video_from_reader(&metadata, tokio::io::stdin(), &extension)
                        .await?
                }
            };
            render_video(page, &video, "Video uploaded successfully!")
        }
        YouTubeCommand::List { limit } => {
            let list = page.with_wait(|| youtube.list_my_videos(limit)).await?;
            let titles = list.titles();
            page.render(&list, || {
                if titles.is_empty() {
                    return "No videos found in your channel.".to_string();
                }
                titles
                    .iter()
                    .map(|(title, id)| format!("{}  {}", id, title))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        YouTubeCommand::Read { video } => {
            let video_id = select_video(&youtube, page, video).await?;
            match page.with_wait(|| youtube.read_video(&video_id)).await? {
                Some(video) => render_video(page, &video, "Video details:"),
                None => page.render(&serde_json::Value::Null, || {
                    format!("Video {} not found", video_id)
                }),
            }
        }
        YouTubeCommand::Update {
            video,
            set_title,
            set_description,
        } => {
            let video_id = select_video(&youtube, page, video).await?;
            let (title, description) = match (set_title, set_description) {
                (Some(title), Some(description)) => (title, description),
                (title, description) => {
                    let current = youtube.video_snippet(&video_id).await?.ok_or_else(|| {
                        DashError::InvalidInput(format!("Video {} not found", video_id))
                    })?;
                    (
                        title.or(current.title).unwrap_or_default(),
                        description.or(current.description).unwrap_or_default(),
                    )
                }
            };

            let video = page
                .with_wait(|| youtube.update_video(&video_id, &title, &description))
                .await?;
            render_video(page, &video, "Video updated successfully!")
        }
        YouTubeCommand::Delete { video, yes } => {
            let video_id = select_video(&youtube, page, video).await?;
            if !yes {
                return Err(DashError::InvalidInput(format!(
                    "Deleting video {} cannot be undone; pass --yes to confirm",
                    video_id
                )));
            }

            let deleted = page.with_wait(|| youtube.delete_video(&video_id)).await?;
            page.render(
                &serde_json::json!({ "id": video_id, "deleted": deleted }),
                || format!("Video {} deleted successfully!", video_id),
            )
        }
    }
}

fn show_device_code(code: &DeviceCode) {
    eprintln!(
        "To authorize socialdash, open {} and enter the code {}",
        code.verification_url, code.user_code
    );
    eprintln!("Waiting for approval...");
}

async fn select_video(
    youtube: &YouTubeOperations,
    page: &Page,
    selector: VideoSelector,
) -> Result<String> {
    match (selector.id, selector.title) {
        (Some(id), _) => Ok(id),
        (None, Some(title)) => {
            let list = page
                .with_wait(|| youtube.list_my_videos(RECENT_FOR_SELECTION))
                .await?;
            select_by_title(&list.titles(), &title)
        }
        (None, None) => Err(missing_selection()),
    }
}

fn render_video(page: &Page, video: &Video, headline: &str) -> Result<()> {
    page.render(video, || {
        let mut lines = vec![headline.to_string(), format!("  ID: {}", video.id)];
        if let Some(snippet) = &video.snippet {
            if let Some(title) = &snippet.title {
                lines.push(format!("  Title: {}", title));
            }
            if let Some(description) = snippet.description.as_deref().filter(|d| !d.is_empty()) {
                lines.push(format!("  Description: {}", description));
            }
            if let Some(published_at) = &snippet.published_at {
                lines.push(format!("  Published: {}", published_at));
            }
        }
        if let Some(privacy) = video
            .status
            .as_ref()
            .and_then(|s| s.get("privacyStatus"))
            .and_then(|p| p.as_str())
        {
            lines.push(format!("  Privacy: {}", privacy));
        }
        if let Some(statistics) = &video.statistics {
            lines.push(format!("  Statistics: {}", statistics));
        }
        lines.push(format!("  URL: {}", video.url()));
        lines.join("\n")
    })
}
