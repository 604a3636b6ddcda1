use std::sync::Arc;
use std::time::Duration;

use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;

use super::cookies::{SessionState, SessionStore};
use super::error::{BlockReason, ScrapeError, ScrapeResult};
use super::human::Humanizer;
use super::session::ScrapeSession;

/// States of the login machine. `Blocked` and the two resolved outcomes are
/// terminal; everything else advances monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    NavigatingHome,
    LocatingSignIn,
    FillingCredentials,
    AwaitingConfirmation,
    Authenticated,
    Blocked(BlockReason),
    Failed,
}

/// Resolved outcome of an authentication attempt. A block is reported
/// through `ScrapeError::AuthBlocked` instead, so callers can distinguish
/// "needs operator intervention" from a plain failed login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Anonymous,
    Authenticated,
    Failed,
}

const CAPTCHA_MARKERS: &[&str] = &[
    "captcha",
    "enter the characters you see",
    "type the characters you see",
];
const TWO_FACTOR_MARKERS: &[&str] = &[
    "two-step verification",
    "two-factor authentication",
    "enter the otp",
    "verification code",
];
const INVALID_CREDENTIAL_MARKERS: &[&str] = &[
    "your password is incorrect",
    "we cannot find an account",
    "invalid email or password",
];

/// Drives the sign-in flow for one session. Login surfaces render
/// differently per session, so every locate step walks an ordered candidate
/// list and accepts the first match.
pub struct Authenticator {
    config: Arc<ScraperConfig>,
    store: Option<Arc<SessionStore>>,
}

impl Authenticator {
    pub fn new(config: Arc<ScraperConfig>, store: Option<Arc<SessionStore>>) -> Self {
        Self { config, store }
    }

    /// Run the machine to a terminal state. `state_preloaded` says whether a
    /// fresh persisted cookie jar was injected at session bootstrap, which
    /// unlocks the lightweight confirmation-only fast path.
    pub async fn run(
        &self,
        session: &mut dyn ScrapeSession,
        humanizer: &Humanizer,
        state_preloaded: bool,
    ) -> ScrapeResult<AuthOutcome> {
        let auth = &self.config.auth;
        if !auth.enabled || !auth.has_credentials() {
            debug!("authentication disabled or credentials absent, staying anonymous");
            return Ok(AuthOutcome::Anonymous);
        }

        let mut state = AuthState::NavigatingHome;
        debug!(?state, "starting authentication");
        session.goto(&self.config.site.base_url).await?;
        humanizer.settle().await;

        if state_preloaded {
            let html = session.content().await?;
            if let Some(name) = self.signed_in_name(&html) {
                state = AuthState::Authenticated;
                info!(?state, account = %name, "persisted session still signed in");
                return Ok(AuthOutcome::Authenticated);
            }
            debug!("persisted session no longer signed in, continuing with credentials");
        }

        state = AuthState::LocatingSignIn;
        debug!(?state, "locating sign-in affordance");
        let selectors = &self.config.selectors;
        let Some(matched) = session.click_first(&selectors.sign_in_links).await? else {
            warn!("no sign-in affordance matched, giving up on authentication");
            return Ok(AuthOutcome::Failed);
        };
        debug!(selector = %matched, "sign-in affordance clicked");
        humanizer.pause().await;

        state = AuthState::FillingCredentials;
        debug!(?state, "filling credentials");
        if session
            .fill_first(&selectors.email_fields, &auth.email)
            .await?
            .is_none()
        {
            warn!("email field not found on sign-in surface");
            return Ok(AuthOutcome::Failed);
        }
        humanizer.pause().await;

        // Some renditions split email and password across a continue step.
        if session
            .click_first(&selectors.continue_buttons)
            .await?
            .is_some()
        {
            humanizer.pause().await;
        }

        if session
            .fill_first(&selectors.password_fields, &auth.password)
            .await?
            .is_none()
        {
            // A missing password field frequently means a challenge got in
            // the way; classify it before resolving to a plain failure.
            let html = session.content().await?;
            if let Some(reason) = detect_block(&html) {
                state = AuthState::Blocked(reason);
                warn!(?state, "challenge interrupted credential entry");
                return Err(ScrapeError::AuthBlocked(reason));
            }
            warn!("password field not found on sign-in surface");
            return Ok(AuthOutcome::Failed);
        }
        humanizer.pause().await;

        if session
            .click_first(&selectors.submit_buttons)
            .await?
            .is_none()
        {
            warn!("submit control not found on sign-in surface");
            return Ok(AuthOutcome::Failed);
        }

        state = AuthState::AwaitingConfirmation;
        debug!(?state, "awaiting confirmation");
        let interval = Duration::from_millis(auth.confirm_poll_interval_ms);
        for attempt in 0..auth.confirm_poll_attempts {
            tokio::time::sleep(interval).await;
            let html = session.content().await?;
            if let Some(reason) = detect_block(&html) {
                state = AuthState::Blocked(reason);
                warn!(?state, attempt, "authentication blocked by the site");
                return Err(ScrapeError::AuthBlocked(reason));
            }
            if let Some(name) = self.signed_in_name(&html) {
                state = AuthState::Authenticated;
                info!(?state, account = %name, attempt, "authentication confirmed");
                self.persist(session).await;
                return Ok(AuthOutcome::Authenticated);
            }
        }

        state = AuthState::Failed;
        warn!(?state, "confirmation polling budget exhausted");
        Ok(AuthOutcome::Failed)
    }

    /// The signed-in display name from the account-indicator region, if the
    /// page shows one.
    fn signed_in_name(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        for selector in &self.config.selectors.account_indicators {
            let Ok(parsed) = Selector::parse(selector) else {
                continue;
            };
            if let Some(element) = document.select(&parsed).next() {
                let text = element.text().collect::<String>().trim().to_string();
                if text.is_empty() {
                    continue;
                }
                let lower = text.to_lowercase();
                if lower.contains("sign in") || lower.contains("sign-in") {
                    continue;
                }
                return Some(text);
            }
        }
        None
    }

    /// Capture the cookie jar into the persisted session document. Failure
    /// here costs one extra slow-path login later, nothing more.
    async fn persist(&self, session: &mut dyn ScrapeSession) {
        if !self.config.auth.persist_session {
            return;
        }
        let Some(store) = &self.store else {
            return;
        };
        match session.cookies().await {
            Ok(cookies) => {
                let state = SessionState::capture(cookies);
                if let Err(err) = store.save(&state) {
                    warn!(error = %err, "failed to persist session state");
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to capture cookies for persistence");
            }
        }
    }
}

/// Classify a block page. Captcha outranks two-factor outranks
/// invalid-credential phrasing when a page matches more than one family.
fn detect_block(html: &str) -> Option<BlockReason> {
    let lower = html.to_lowercase();
    if CAPTCHA_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return Some(BlockReason::Captcha);
    }
    if TWO_FACTOR_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
    {
        return Some(BlockReason::TwoFactor);
    }
    if INVALID_CREDENTIAL_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
    {
        return Some(BlockReason::InvalidCredentials);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captcha_outranks_other_markers() {
        let html = "<html><body>Enter the characters you see. \
                    Your password is incorrect.</body></html>";
        assert_eq!(detect_block(html), Some(BlockReason::Captcha));
    }

    #[test]
    fn invalid_credentials_detected() {
        let html = "<html><body>We cannot find an account with that email address</body></html>";
        assert_eq!(detect_block(html), Some(BlockReason::InvalidCredentials));
    }

    #[test]
    fn two_factor_detected() {
        let html = "<html><body>Two-Step Verification: enter the OTP sent to your phone</body></html>";
        assert_eq!(detect_block(html), Some(BlockReason::TwoFactor));
    }

    #[test]
    fn clean_page_is_not_a_block() {
        assert_eq!(detect_block("<html><body>Welcome back</body></html>"), None);
    }
}
