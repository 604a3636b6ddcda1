use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::{ScrapeError, ScrapeResult};

/// One cookie as persisted between processes. Mirrors the subset of the CDP
/// cookie shape the pipeline needs to restore a signed-in session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    #[serde(default)]
    pub expires: Option<f64>,
}

/// Snapshot of a browser cookie jar plus the moment it was captured.
/// Written only by the authenticator after a confirmed login; read only at
/// session bootstrap. A replacement overwrites the whole document, so
/// concurrent writers degrade to last-writer-wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub cookies: Vec<StoredCookie>,
    pub captured_at: DateTime<Utc>,
}

impl SessionState {
    pub fn capture(cookies: Vec<StoredCookie>) -> Self {
        Self {
            cookies,
            captured_at: Utc::now(),
        }
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.captured_at);
        match age.to_std() {
            Ok(age) => age <= ttl,
            // Clock skew put the capture in the future; treat as fresh.
            Err(_) => true,
        }
    }
}

/// File-backed store for the persisted [`SessionState`] document.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    ttl: Duration,
}

impl SessionStore {
    pub fn new<P: AsRef<Path>>(path: P, ttl: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn load(&self) -> ScrapeResult<Option<SessionState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let state: SessionState = serde_json::from_str(&content).map_err(|err| {
            ScrapeError::SessionState(format!(
                "failed to parse {}: {err}",
                self.path.display()
            ))
        })?;
        Ok(Some(state))
    }

    /// Bootstrap read: a corrupt or stale document is worth at most a
    /// warning, never a failed session. Stale state falls back to the
    /// slow-path login.
    pub fn load_fresh(&self) -> Option<SessionState> {
        match self.load() {
            Ok(Some(state)) if state.is_fresh(self.ttl) => Some(state),
            Ok(Some(state)) => {
                debug!(
                    captured_at = %state.captured_at,
                    "persisted session state is stale, ignoring"
                );
                None
            }
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "failed to load persisted session state");
                None
            }
        }
    }

    pub fn save(&self, state: &SessionState) -> ScrapeResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(state).map_err(|err| {
            ScrapeError::SessionState(format!("failed to serialize session state: {err}"))
        })?;
        std::fs::write(&self.path, content)?;
        debug!(path = %self.path.display(), cookies = state.cookies.len(), "session state persisted");
        Ok(())
    }
}
