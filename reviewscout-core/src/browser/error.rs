use std::fmt;

use thiserror::Error;

pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Why an authentication attempt was refused by the site. Terminal: none of
/// these are retried automatically, they need operator intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    Captcha,
    TwoFactor,
    InvalidCredentials,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BlockReason::Captcha => "captcha",
            BlockReason::TwoFactor => "two_factor",
            BlockReason::InvalidCredentials => "invalid_credentials",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("chromium launch failed: {0}")]
    Launch(String),
    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("navigation failed for {0}")]
    Navigation(String),
    #[error("timeout waiting for {0}")]
    Timeout(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("session state error: {0}")]
    SessionState(String),
    #[error("authentication blocked: {0}")]
    AuthBlocked(BlockReason),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<tokio::task::JoinError> for ScrapeError {
    fn from(err: tokio::task::JoinError) -> Self {
        ScrapeError::Unexpected(err.to_string())
    }
}
