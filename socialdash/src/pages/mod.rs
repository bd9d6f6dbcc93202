//! One page per platform
//!
//! A page turns a parsed subcommand into exactly one manager call and renders
//! what came back. Everything shared between pages lives here: the output
//! format, the rate-limit countdown and small input helpers.

use std::future::Future;
use std::io::Read;
use std::str::FromStr;
use std::time::Duration;

use libsocialdash::error::{DashError, Result};
use libsocialdash::rate_limit::{
    format_reset_time, run_with_rate_limit_wait, QuotaTable, QuotaWindow, WaitPolicy,
};
use libsocialdash::{Config, Identity};
use serde::Serialize;

pub mod instagram;
pub mod reddit;
pub mod twitter;
pub mod youtube;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!(
                "Invalid output format: '{}'. Valid options: text, json",
                s
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct QuotaEntry {
    endpoint: String,
    #[serde(flatten)]
    window: QuotaWindow,
}

#[derive(Debug, Serialize)]
struct WhoAmI<'a> {
    #[serde(flatten)]
    identity: &'a Identity,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rate_limits: Vec<QuotaEntry>,
}

/// What every page needs besides its manager
pub struct Page {
    pub config: Config,
    pub format: OutputFormat,
}

impl Page {
    pub fn new(config: Config, format: OutputFormat) -> Self {
        Self { config, format }
    }

    /// Print `value` as JSON, or the text produced by `text`
    pub fn render<T, F>(&self, value: &T, text: F) -> Result<()>
    where
        T: Serialize + ?Sized,
        F: FnOnce() -> String,
    {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
                println!("{}", json);
            }
            OutputFormat::Text => println!("{}", text()),
        }
        Ok(())
    }

    /// Report a call the manager skipped because its quota was used up
    pub fn render_skipped(&self, endpoint: &str, reset_at: i64) -> Result<()> {
        self.render(
            &serde_json::json!({
                "skipped": true,
                "endpoint": endpoint,
                "reset_at": reset_at,
            }),
            || {
                format!(
                    "Skipped: rate limit for {} is used up until {}",
                    endpoint,
                    format_reset_time(reset_at)
                )
            },
        )
    }

    /// Render who the credentials belong to, with the quota windows the
    /// manager has seen that are still current
    pub fn render_identity(&self, identity: &Identity, quotas: Option<&QuotaTable>) -> Result<()> {
        let rate_limits: Vec<QuotaEntry> = quotas
            .map(|table| {
                table.clear_expired(chrono::Utc::now().timestamp());
                table.snapshot()
            })
            .unwrap_or_default()
            .into_iter()
            .map(|(endpoint, window)| QuotaEntry { endpoint, window })
            .collect();

        let whoami = WhoAmI {
            identity,
            rate_limits,
        };
        self.render(&whoami, || {
            let mut lines = vec![format!(
                "Signed in to {} as {} (id {})",
                identity.platform.display_name(),
                identity.username.as_deref().unwrap_or("?"),
                identity.id
            )];
            for entry in &whoami.rate_limits {
                let limit = entry
                    .window
                    .limit
                    .map(|l| format!("/{}", l))
                    .unwrap_or_default();
                lines.push(format!(
                    "  {}: {}{} left, resets {}",
                    entry.endpoint,
                    entry.window.remaining,
                    limit,
                    format_reset_time(entry.window.reset_at)
                ));
            }
            lines.join("\n")
        })
    }

    /// Run one manager call, waiting out a vendor rate limit once
    ///
    /// The countdown goes to stderr so stdout only carries the result.
    pub async fn with_wait<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        run_with_rate_limit_wait(&self.wait_policy(), operation, countdown).await
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::from(&self.config.rate_limit)
    }
}

/// Print how long a rate-limit wait has left
pub fn countdown(remaining: Duration) {
    if remaining.is_zero() {
        eprintln!("Retrying now...");
    } else {
        eprintln!(
            "Rate limit reached. Retrying in {}",
            humantime::format_duration(remaining)
        );
    }
}

/// Use the given text, or read it from stdin when absent
pub fn content_or_stdin(content: Option<String>) -> Result<String> {
    match content {
        Some(text) => Ok(text),
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer.trim_end_matches(['\r', '\n']).to_string())
        }
    }
}

/// Pick an id from `(title, id)` pairs by exact title, falling back to a
/// case-insensitive match
pub fn select_by_title(options: &[(String, String)], title: &str) -> Result<String> {
    options
        .iter()
        .find(|(t, _)| t == title)
        .or_else(|| options.iter().find(|(t, _)| t.eq_ignore_ascii_case(title)))
        .map(|(_, id)| id.clone())
        .ok_or_else(|| {
            let available: Vec<&str> = options.iter().map(|(t, _)| t.as_str()).collect();
            DashError::InvalidInput(if available.is_empty() {
                format!("No recent item titled '{}' (nothing found)", title)
            } else {
                format!(
                    "No recent item titled '{}'. Recent titles: {}",
                    title,
                    available.join(" | ")
                )
            })
        })
}

/// Error for a command that needs an id or `--title` and got neither
pub fn missing_selection() -> DashError {
    DashError::InvalidInput("Pass an id or --title to choose an item".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<(String, String)> {
        vec![
            ("Launch day".to_string(), "a1".to_string()),
            ("Behind the scenes".to_string(), "b2".to_string()),
        ]
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("csv".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_select_by_title() {
        assert_eq!(select_by_title(&options(), "Launch day").unwrap(), "a1");
        assert_eq!(select_by_title(&options(), "behind the SCENES").unwrap(), "b2");

        let err = select_by_title(&options(), "Missing").unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("Launch day | Behind the scenes"));
    }
}
