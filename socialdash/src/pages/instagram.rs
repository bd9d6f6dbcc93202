//! Instagram page

use std::time::Duration;

use clap::Subcommand;
use libsocialdash::error::Result;
use libsocialdash::platforms::instagram::InstagramApi;
use libsocialdash::platforms::Platform;
use libsocialdash::types::InstagramMedia;

use super::Page;

#[derive(Subcommand, Debug)]
pub enum InstagramCommand {
    /// Show the business account's profile
    Account,

    /// Publish an image post
    Publish {
        /// Public URL of the image (Instagram downloads it)
        image_url: String,

        /// Post caption
        #[arg(short, long, default_value = "")]
        caption: String,
    },

    /// List recent media posts
    Media {
        /// Number of posts to show (1-25)
        #[arg(short, long, default_value = "5")]
        #[arg(value_parser = clap::value_parser!(u32).range(1..=25))]
        limit: u32,
    },

    /// Show which account the credentials belong to
    Whoami,
}

pub async fn run(command: InstagramCommand, page: &Page) -> Result<()> {
    let instagram = InstagramApi::from_env(&page.config).await?;

    match command {
        InstagramCommand::Account => {
            let account = page.with_wait(|| instagram.get_account_info()).await?;
            page.render(&account, || {
                let mut lines = vec![format!(
                    "@{} (id {})",
                    account.username.as_deref().unwrap_or("?"),
                    account.id
                )];
                for (field, value) in &account.extra {
                    lines.push(format!("  {}: {}", field, value));
                }
                if let Some(picture) = &account.profile_picture_url {
                    lines.push(format!("  Profile picture: {}", picture));
                }
                lines.join("\n")
            })
        }
        InstagramCommand::Publish { image_url, caption } => {
            let media_id = page
                .with_wait(|| instagram.create_post(&image_url, &caption))
                .await?;

            // The new media is not always readable right after publishing
            let delay = Duration::from_secs(page.config.instagram.permalink_delay_secs);
            tokio::time::sleep(delay).await;

            let permalink = match instagram.get_media(&media_id, &["permalink"]).await {
                Ok(media) => media.permalink,
                Err(e) => {
                    tracing::warn!(
                        "Post {} is published but its permalink is unavailable: {}",
                        media_id,
                        e
                    );
                    None
                }
            };

            page.render(
                &serde_json::json!({ "id": media_id, "permalink": permalink }),
                || match &permalink {
                    Some(url) => format!(
                        "Post published successfully! Media ID: {}\nView it at {}",
                        media_id, url
                    ),
                    None => format!(
                        "Post published successfully! Media ID: {}\n\
                         Failed to retrieve the permalink for the new post.",
                        media_id
                    ),
                },
            )
        }
        InstagramCommand::Media { limit } => {
            let media = page.with_wait(|| instagram.get_media_list(limit)).await?;
            page.render(&media, || {
                if media.data.is_empty() {
                    return "No media found.".to_string();
                }
                media
                    .data
                    .iter()
                    .map(describe_media)
                    .collect::<Vec<_>>()
                    .join("\n---\n")
            })
        }
        InstagramCommand::Whoami => {
            let me = instagram.verify().await?;
            page.render_identity(&me, None)
        }
    }
}

fn describe_media(media: &InstagramMedia) -> String {
    let mut lines = vec![
        format!("Post ID: {}", media.id),
        format!("  Caption: {}", media.caption.as_deref().unwrap_or("No caption")),
        format!("  Media type: {}", media.media_type.as_deref().unwrap_or("unknown")),
    ];
    if let Some(timestamp) = &media.timestamp {
        lines.push(format!("  Posted on: {}", timestamp));
    }
    if let Some(preview) = media.preview_url() {
        lines.push(format!("  Preview: {}", preview));
    }
    if let Some(permalink) = &media.permalink {
        lines.push(format!("  View on Instagram: {}", permalink));
    }
    lines.join("\n")
}
