mod auth;
mod cookies;
mod error;
mod human;
mod metrics;
mod session;
mod stealth;

pub use auth::{AuthOutcome, AuthState, Authenticator};
pub use cookies::{SessionState, SessionStore, StoredCookie};
pub use error::{BlockReason, ScrapeError, ScrapeResult};
pub use human::Humanizer;
pub use metrics::SessionMetrics;
pub use session::{
    release, ChromiumSession, ChromiumSessionFactory, Identity, ScrapeSession, SessionFactory,
    SessionLauncher,
};
pub use stealth::StealthMasker;
