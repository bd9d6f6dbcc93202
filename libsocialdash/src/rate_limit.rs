//! Rate-limit bookkeeping
//!
//! Vendors report their quota on (almost) every response. [`QuotaTable`]
//! remembers the last reported window per endpoint so a manager can check the
//! endpoint it is about to call before calling it, instead of guessing from a
//! single hardcoded endpoint.
//!
//! A table can be saved to and loaded from a JSON file, so windows outlive
//! the process that observed them.
//!
//! [`run_with_rate_limit_wait`] is the other half: when a vendor rejects a
//! call with a rate-limit error anyway, it sleeps until the reported reset
//! and lets the operation continue once.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::RateLimitConfig;
use crate::error::{DashError, PlatformError, Result};
use crate::transport::ApiResponse;

/// One vendor-reported quota window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaWindow {
    pub limit: Option<u64>,
    pub remaining: u64,
    /// Unix timestamp at which the window resets
    pub reset_at: i64,
}

impl QuotaWindow {
    /// No calls left and the window has not rolled over yet
    pub fn is_exhausted(&self, now: i64) -> bool {
        self.remaining == 0 && self.reset_at > now
    }
}

/// How a vendor spells its rate-limit headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderScheme {
    /// `x-rate-limit-{limit,remaining,reset}`, reset as a Unix timestamp
    Twitter,
    /// `x-ratelimit-{used,remaining,reset}`, remaining as a float and reset
    /// as seconds from now
    Reddit,
}

impl HeaderScheme {
    /// Extract a window from response headers, if the vendor sent one
    pub fn parse(&self, response: &ApiResponse, now: i64) -> Option<QuotaWindow> {
        match self {
            HeaderScheme::Twitter => {
                let remaining = response.header("x-rate-limit-remaining")?.trim().parse().ok()?;
                let reset_at = response.header("x-rate-limit-reset")?.trim().parse().ok()?;
                let limit = response
                    .header("x-rate-limit-limit")
                    .and_then(|v| v.trim().parse().ok());
                Some(QuotaWindow {
                    limit,
                    remaining,
                    reset_at,
                })
            }
            HeaderScheme::Reddit => {
                let remaining: f64 = response.header("x-ratelimit-remaining")?.trim().parse().ok()?;
                let reset_in: i64 = response.header("x-ratelimit-reset")?.trim().parse().ok()?;
                let used: Option<u64> = response
                    .header("x-ratelimit-used")
                    .and_then(|v| v.trim().parse().ok());
                let remaining = remaining.max(0.0).floor() as u64;
                Some(QuotaWindow {
                    limit: used.map(|u| u + remaining),
                    remaining,
                    reset_at: now + reset_in,
                })
            }
        }
    }
}

/// Last known quota per endpoint
#[derive(Debug, Default)]
pub struct QuotaTable {
    windows: Mutex<HashMap<String, QuotaWindow>>,
}

impl QuotaTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, endpoint: &str, window: QuotaWindow) {
        tracing::debug!(
            endpoint,
            remaining = window.remaining,
            reset_at = window.reset_at,
            "Recorded quota window"
        );
        self.lock().insert(endpoint.to_string(), window);
    }

    /// Record whatever window `response` reports for `endpoint`; `true` if
    /// it reported one
    pub fn observe(
        &self,
        endpoint: &str,
        scheme: HeaderScheme,
        response: &ApiResponse,
        now: i64,
    ) -> bool {
        match scheme.parse(response, now) {
            Some(window) => {
                self.record(endpoint, window);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, endpoint: &str) -> Option<QuotaWindow> {
        self.lock().get(endpoint).copied()
    }

    /// Reset time for `endpoint` if its quota is exhausted, `None` if a call
    /// may proceed. Unknown endpoints may always proceed.
    pub fn check(&self, endpoint: &str, now: i64) -> Option<i64> {
        self.get(endpoint)
            .filter(|window| window.is_exhausted(now))
            .map(|window| window.reset_at)
    }

    /// All known windows, sorted by endpoint
    pub fn snapshot(&self) -> Vec<(String, QuotaWindow)> {
        let mut windows: Vec<_> = self
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        windows.sort_by(|a, b| a.0.cmp(&b.0));
        windows
    }

    /// Forget windows whose reset time has passed
    pub fn clear_expired(&self, now: i64) {
        self.lock().retain(|_, window| window.reset_at > now);
    }

    /// Table saved by [`QuotaTable::save`]
    ///
    /// A missing, unreadable or corrupted file gives an empty table; the last
    /// two are logged.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::new(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable rate-limit state {}: {}", path.display(), e);
                return Self::new();
            }
        };

        match serde_json::from_str::<HashMap<String, QuotaWindow>>(&content) {
            Ok(windows) => Self {
                windows: Mutex::new(windows),
            },
            Err(e) => {
                tracing::warn!("Ignoring corrupted rate-limit state {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    /// Write the windows that have not reset by `now`, creating parent
    /// directories
    pub fn save(&self, path: &Path, now: i64) -> Result<()> {
        let current: BTreeMap<String, QuotaWindow> = self
            .snapshot()
            .into_iter()
            .filter(|(_, window)| window.reset_at > now)
            .collect();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&current).map_err(std::io::Error::from)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, QuotaWindow>> {
        // A poisoned table only means a panic elsewhere mid-insert; the map
        // itself is still usable.
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Format a Unix timestamp in local time for user-facing messages
pub fn format_reset_time(reset_at: i64) -> String {
    chrono::DateTime::from_timestamp(reset_at, 0)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| reset_at.to_string())
}

/// How long to wait out a rate limit
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    pub max_wait: Duration,
    pub default_wait: Duration,
    pub tick: Duration,
}

impl From<&RateLimitConfig> for WaitPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            max_wait: config.max_wait(),
            default_wait: config.default_wait(),
            tick: config.tick(),
        }
    }
}

impl WaitPolicy {
    /// Time until `reset_at`, or the default wait when the vendor gave none
    pub fn wait_for(&self, reset_at: Option<i64>, now: i64) -> Duration {
        match reset_at {
            Some(reset) => Duration::from_secs(reset.saturating_sub(now).max(0) as u64),
            None => self.default_wait,
        }
    }
}

/// Run `operation`; if the vendor rejects it with a rate limit, sleep until
/// the window resets and run it once more.
///
/// `on_wait` is called before sleeping and then after every `tick` with the
/// time still left, so callers can show a countdown. Waits longer than
/// `policy.max_wait` are not attempted: the rate-limit error is returned
/// as is.
pub async fn run_with_rate_limit_wait<T, F, Fut, W>(
    policy: &WaitPolicy,
    mut operation: F,
    mut on_wait: W,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    W: FnMut(Duration),
{
    let wait = match operation().await {
        Err(DashError::Platform(PlatformError::RateLimit { reset_at, message })) => {
            tracing::warn!("Rate limit hit: {}", message);
            let wait = policy.wait_for(reset_at, chrono::Utc::now().timestamp());
            if wait > policy.max_wait {
                tracing::warn!(
                    "Reset is {} away, longer than the {} wait limit",
                    humantime::format_duration(wait),
                    humantime::format_duration(policy.max_wait)
                );
                return Err(PlatformError::RateLimit { message, reset_at }.into());
            }
            wait
        }
        other => return other,
    };

    let mut remaining = wait;
    on_wait(remaining);
    while !remaining.is_zero() {
        let step = remaining.min(policy.tick);
        tokio::time::sleep(step).await;
        remaining -= step;
        on_wait(remaining);
    }

    tracing::info!("Rate limit window reset, continuing");
    operation().await
}
