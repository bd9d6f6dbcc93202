//! Socialdash - a small CRUD dashboard over social platform APIs
//!
//! This library provides one manager per platform (Twitter/X, Instagram,
//! Reddit, YouTube), each a thin wrapper over the vendor's HTTP API, plus the
//! shared configuration, credential, error and rate-limit plumbing the
//! `socialdash` binary builds on.

pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod rate_limit;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{ConfigError, DashError, PlatformError, Result};
pub use platforms::Platform;
pub use transport::{HttpTransport, Transport};
pub use types::{Identity, PlatformKind};
