//! Reddit page
//!
//! Commands that act on an existing post take either its id or `--title`,
//! which picks the post from your recent submissions.

use clap::{Args, Subcommand};
use libsocialdash::error::Result;
use libsocialdash::platforms::reddit::{normalize_subreddit, RedditManager};
use libsocialdash::platforms::Platform;
use libsocialdash::types::{reddit_post_url, RedditPost, RedditPostKind};

use super::{content_or_stdin, missing_selection, select_by_title, Page};

/// How many recent submissions `--title` searches
const RECENT_FOR_SELECTION: u32 = 10;

#[derive(Args, Debug)]
pub struct PostSelector {
    /// Post ID (with or without the t3_ prefix)
    id: Option<String>,

    /// Pick the post by title from your recent submissions
    #[arg(long, conflicts_with = "id")]
    title: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum RedditCommand {
    /// Submit a new post
    Create {
        /// Subreddit name (with or without r/)
        #[arg(short = 'r', long)]
        subreddit: String,

        /// Post title
        #[arg(short, long)]
        title: String,

        /// Body for text posts, URL for link and image posts (reads from
        /// stdin if not provided)
        content: Option<String>,

        /// Post type: text, link or image
        #[arg(short, long, default_value = "text")]
        kind: RedditPostKind,
    },

    /// Show one post
    Read {
        #[command(flatten)]
        post: PostSelector,
    },

    /// Replace the body of a text post
    Update {
        #[command(flatten)]
        post: PostSelector,

        /// New body (reads from stdin if not provided)
        #[arg(short, long)]
        content: Option<String>,
    },

    /// Delete a post
    Delete {
        #[command(flatten)]
        post: PostSelector,
    },

    /// List your most recent submissions
    Recent {
        /// Number of posts to show
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Show which account the credentials belong to
    Whoami,
}

pub async fn run(command: RedditCommand, page: &Page) -> Result<()> {
    let reddit = RedditManager::from_env(&page.config).await?;

    match command {
        RedditCommand::Create {
            subreddit,
            title,
            content,
            kind,
        } => {
            let content = content_or_stdin(content)?;
            let post_id = page
                .with_wait(|| reddit.create_post(&subreddit, &title, &content, kind))
                .await?;
            let url = reddit_post_url(normalize_subreddit(&subreddit)?, &post_id);

            page.render(&serde_json::json!({ "id": post_id, "url": url }), || {
                format!(
                    "Post created successfully! Post ID: {}\nView it at {}",
                    post_id, url
                )
            })
        }
        RedditCommand::Read { post } => {
            let post_id = select_post(&reddit, page, post).await?;
            match page.with_wait(|| reddit.read_post(&post_id)).await? {
                Some(post) => page.render(&post, || describe_post(&post)),
                None => page.render(&serde_json::Value::Null, || {
                    format!("Post {} not found", post_id)
                }),
            }
        }
        RedditCommand::Update { post, content } => {
            let post_id = select_post(&reddit, page, post).await?;
            let content = content_or_stdin(content)?;
            let updated = page
                .with_wait(|| reddit.update_post(&post_id, &content))
                .await?;

            // Only the post itself knows its subreddit
            let url = if updated {
                reddit.read_post(&post_id).await?.map(|p| p.url_on_reddit())
            } else {
                None
            };

            page.render(
                &serde_json::json!({ "id": post_id, "updated": updated, "url": url }),
                || match (updated, &url) {
                    (true, Some(url)) => {
                        format!("Post updated successfully!\nView it at {}", url)
                    }
                    (true, None) => "Post updated successfully!".to_string(),
                    (false, _) => format!("Failed to update post {}", post_id),
                },
            )
        }
        RedditCommand::Delete { post } => {
            let post_id = select_post(&reddit, page, post).await?;
            let deleted = page.with_wait(|| reddit.delete_post(&post_id)).await?;
            page.render(
                &serde_json::json!({ "id": post_id, "deleted": deleted }),
                || {
                    if deleted {
                        "Post deleted successfully! It is no longer available on Reddit."
                            .to_string()
                    } else {
                        format!("Failed to delete post {}", post_id)
                    }
                },
            )
        }
        RedditCommand::Recent { limit } => {
            let posts = page.with_wait(|| reddit.get_recent_posts(limit)).await?;
            page.render(&posts, || {
                if posts.is_empty() {
                    return "No recent posts found.".to_string();
                }
                posts
                    .iter()
                    .map(|p| format!("{}  r/{}  {}", p.id, p.subreddit, p.title))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        RedditCommand::Whoami => {
            let me = reddit.verify().await?;
            page.render_identity(&me, Some(reddit.quotas()))
        }
    }
}

async fn select_post(
    reddit: &RedditManager,
    page: &Page,
    selector: PostSelector,
) -> Result<String> {
    match (selector.id, selector.title) {
        (Some(id), _) => Ok(id),
        (None, Some(title)) => {
            let posts = page
                .with_wait(|| reddit.get_recent_posts(RECENT_FOR_SELECTION))
                .await?;
            let options: Vec<(String, String)> = posts
                .into_iter()
                .map(|p| (p.title, p.id))
                .collect();
            select_by_title(&options, &title)
        }
        (None, None) => Err(missing_selection()),
    }
}

fn describe_post(post: &RedditPost) -> String {
    let mut lines = vec![
        format!("{} (r/{})", post.title, post.subreddit),
        format!("  ID: {}", post.id),
    ];
    if let Some(score) = post.score {
        lines.push(format!("  Score: {}", score));
    }
    if let Some(comments) = post.num_comments {
        lines.push(format!("  Comments: {}", comments));
    }
    match (&post.selftext, &post.url) {
        (Some(text), _) if !text.is_empty() => lines.push(format!("\n{}\n", text)),
        (_, Some(url)) => lines.push(format!("  Link: {}", url)),
        _ => {}
    }
    lines.push(format!("  URL: {}", post.url_on_reddit()));
    lines.join("\n")
}
