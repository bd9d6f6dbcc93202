//! Twitter/X page

use clap::Subcommand;
use libsocialdash::error::Result;
use libsocialdash::platforms::twitter::{
    TwitterManager, CREATE_TWEET, DELETE_TWEET, GET_TWEET, USER_TWEETS,
};
use libsocialdash::platforms::Platform;
use libsocialdash::types::Tweet;

use super::{content_or_stdin, countdown, Page};

#[derive(Subcommand, Debug)]
pub enum TwitterCommand {
    /// Post a new tweet
    Create {
        /// Tweet text (reads from stdin if not provided)
        text: Option<String>,
    },

    /// Show one tweet with its metrics
    Read {
        /// Tweet ID
        id: String,
    },

    /// List your most recent tweets
    Recent {
        /// Number of tweets to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Replace a tweet's text (deletes it and posts the new text)
    Update {
        /// Tweet ID
        id: String,

        /// New text (reads from stdin if not provided)
        text: Option<String>,
    },

    /// Delete a tweet
    Delete {
        /// Tweet ID
        id: String,
    },

    /// Show which account the credentials belong to
    Whoami,
}

pub async fn run(command: TwitterCommand, page: &Page) -> Result<()> {
    let twitter = TwitterManager::from_env(&page.config).await?;

    match command {
        TwitterCommand::Create { text } => {
            let text = content_or_stdin(text)?;
            match page.with_wait(|| twitter.create_tweet(&text)).await? {
                Some(tweet) => render_tweet(page, &tweet, "Tweet created successfully!"),
                None => not_done(page, &twitter, &[CREATE_TWEET], || {
                    "Tweet was not created".to_string()
                }),
            }
        }
        TwitterCommand::Read { id } => match page.with_wait(|| twitter.get_tweet(&id)).await? {
            Some(tweet) => render_tweet(page, &tweet, "Tweet details:"),
            None => not_done(page, &twitter, &[GET_TWEET], || {
                format!("Tweet {} not found", id)
            }),
        },
        TwitterCommand::Recent { limit } => {
            let tweets = page.with_wait(|| twitter.get_my_tweets(limit)).await?;
            if tweets.is_empty() {
                return not_done(page, &twitter, &[USER_TWEETS], || {
                    "No tweets found.".to_string()
                });
            }
            page.render(&tweets, || {
                tweets
                    .iter()
                    .map(|t| format!("{}  {}", t.id, t.text.replace('\n', " ")))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        TwitterCommand::Update { id, text } => {
            let text = content_or_stdin(text)?;
            // Waits per step: a retried update must not delete the tweet twice
            let updated = twitter
                .update_tweet(&id, &text, &page.wait_policy(), countdown)
                .await?;
            match updated {
                Some(tweet) => render_tweet(page, &tweet, "Tweet updated successfully!"),
                None => not_done(page, &twitter, &[DELETE_TWEET, CREATE_TWEET], || {
                    format!("Tweet {} was not deleted, so nothing was reposted", id)
                }),
            }
        }
        TwitterCommand::Delete { id } => {
            if page.with_wait(|| twitter.delete_tweet(&id)).await? {
                page.render(&serde_json::json!({ "deleted": true, "id": id }), || {
                    format!("Tweet {} deleted successfully", id)
                })
            } else {
                not_done(page, &twitter, &[DELETE_TWEET], || {
                    format!("Twitter did not confirm deletion of tweet {}", id)
                })
            }
        }
        TwitterCommand::Whoami => {
            let me = twitter.verify().await?;
            page.render_identity(&me, Some(twitter.quotas()))
        }
    }
}

/// Render an empty or negative result, or the skip notice if one of
/// `endpoints` has no quota left (which is why the manager did nothing)
fn not_done<F>(page: &Page, twitter: &TwitterManager, endpoints: &[&str], message: F) -> Result<()>
where
    F: FnOnce() -> String,
{
    let now = chrono::Utc::now().timestamp();
    let exhausted = endpoints
        .iter()
        .find_map(|endpoint| Some((*endpoint, twitter.quotas().check(endpoint, now)?)));

    match exhausted {
        Some((endpoint, reset_at)) => page.render_skipped(endpoint, reset_at),
        None => page.render(&serde_json::Value::Null, message),
    }
}

fn render_tweet(page: &Page, tweet: &Tweet, headline: &str) -> Result<()> {
    page.render(tweet, || {
        let mut lines = vec![
            headline.to_string(),
            format!("  ID:   {}", tweet.id),
            format!("  Text: {}", tweet.text),
        ];
        if let Some(created_at) = &tweet.created_at {
            lines.push(format!("  Date: {}", created_at));
        }
        if let Some(metrics) = &tweet.public_metrics {
            lines.push(format!("  Metrics: {}", metrics));
        }
        lines.push(format!("  URL:  {}", tweet.url()));
        lines.join("\n")
    })
}
