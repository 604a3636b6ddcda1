use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Top-level scraper configuration. Every section carries defaults so the
/// library is usable without a config file; a TOML document can override any
/// subset of them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub site: SiteSection,
    pub chromium: ChromiumSection,
    pub flags: FlagsSection,
    pub user_agents: UserAgentSection,
    pub viewport: ViewportSection,
    pub locales: LocaleSection,
    pub stealth: StealthSection,
    pub human: HumanSection,
    pub auth: AuthSection,
    pub selectors: SelectorSection,
    pub pagination: PaginationSection,
    pub limits: LimitsSection,
    pub session: SessionSection,
}

impl ScraperConfig {
    /// Administrative replacement of the credential block. Whole-document
    /// swap, never in-place mutation, so concurrent readers of a previously
    /// cloned config are unaffected.
    pub fn with_auth(mut self, auth: AuthSection) -> Self {
        self.auth = auth;
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteSection {
    pub base_url: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            base_url: "https://www.amazon.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromiumSection {
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub request_timeout_seconds: u64,
    pub navigation_timeout_seconds: u64,
}

impl Default for ChromiumSection {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: true,
            sandbox: false,
            disable_gpu: true,
            request_timeout_seconds: 30,
            navigation_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlagsSection {
    pub no_first_run: bool,
    pub disable_automation_controlled: bool,
    pub disable_blink_features: Vec<String>,
    pub lang: Option<String>,
    pub accept_language: Option<String>,
    pub extra_args: Vec<String>,
}

impl Default for FlagsSection {
    fn default() -> Self {
        Self {
            no_first_run: true,
            disable_automation_controlled: true,
            disable_blink_features: vec!["AutomationControlled".to_string()],
            lang: Some("en-US".to_string()),
            accept_language: Some("en-US,en;q=0.9".to_string()),
            extra_args: vec![
                "--disable-dev-shm-usage".to_string(),
                "--disable-extensions".to_string(),
                "--disable-background-timer-throttling".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentSection {
    pub pool: Vec<String>,
}

impl Default for UserAgentSection {
    fn default() -> Self {
        Self {
            pool: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36"
                    .to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36"
                    .to_string(),
                "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:123.0) \
                 Gecko/20100101 Firefox/123.0"
                    .to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewportSection {
    pub resolutions: Vec<[u32; 2]>,
    pub jitter_pixels: u32,
}

impl Default for ViewportSection {
    fn default() -> Self {
        Self {
            resolutions: vec![[1280, 720], [1366, 768], [1536, 864], [1920, 1080]],
            jitter_pixels: 48,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocaleEntry {
    pub locale: String,
    pub timezone: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocaleSection {
    pub pool: Vec<LocaleEntry>,
}

impl Default for LocaleSection {
    fn default() -> Self {
        Self {
            pool: vec![
                LocaleEntry {
                    locale: "en-US".to_string(),
                    timezone: "America/New_York".to_string(),
                },
                LocaleEntry {
                    locale: "en-US".to_string(),
                    timezone: "America/Chicago".to_string(),
                },
                LocaleEntry {
                    locale: "en-CA".to_string(),
                    timezone: "America/Toronto".to_string(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StealthSection {
    pub mask_webdriver: bool,
    pub normalize_plugins: bool,
    pub normalize_languages: bool,
    pub chrome_runtime_stub: bool,
}

impl Default for StealthSection {
    fn default() -> Self {
        Self {
            mask_webdriver: true,
            normalize_plugins: true,
            normalize_languages: true,
            chrome_runtime_stub: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HumanSection {
    pub max_scrolls: u32,
    pub scroll_step_px: [u32; 2],
    pub smooth_scroll_pause_ms: [u64; 2],
    pub instant_scroll_pause_ms: [u64; 2],
    pub reading_pause_ms: [u64; 2],
    pub scroll_back_px: [u32; 2],
    pub scroll_back_pause_ms: [u64; 2],
    pub page_settle_ms: [u64; 2],
    pub action_pause_ms: [u64; 2],
    pub nav_backoff_ms: [u64; 2],
}

impl Default for HumanSection {
    fn default() -> Self {
        Self {
            max_scrolls: 3,
            scroll_step_px: [300, 800],
            smooth_scroll_pause_ms: [800, 1500],
            instant_scroll_pause_ms: [300, 800],
            reading_pause_ms: [1000, 3000],
            scroll_back_px: [100, 300],
            scroll_back_pause_ms: [500, 1000],
            page_settle_ms: [2000, 4000],
            action_pause_ms: [500, 1500],
            nav_backoff_ms: [2000, 5000],
        }
    }
}

/// Credential block. Read-only during a session; replaced wholesale through
/// `ScraperConfig::with_auth`. The `Debug` impl redacts the password so the
/// section can appear in logs without leaking the credential pair.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub enabled: bool,
    pub email: String,
    pub password: String,
    pub persist_session: bool,
    pub confirm_poll_attempts: u32,
    pub confirm_poll_interval_ms: u64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            enabled: false,
            email: String::new(),
            password: String::new(),
            persist_session: true,
            confirm_poll_attempts: 10,
            confirm_poll_interval_ms: 1000,
        }
    }
}

impl AuthSection {
    pub fn has_credentials(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for AuthSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSection")
            .field("enabled", &self.enabled)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("persist_session", &self.persist_session)
            .field("confirm_poll_attempts", &self.confirm_poll_attempts)
            .field("confirm_poll_interval_ms", &self.confirm_poll_interval_ms)
            .finish()
    }
}

/// Interaction locators, each an ordered candidate list tried front to back.
/// Sign-in surfaces render differently per session, so every step carries
/// fallbacks rather than one fixed selector.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorSection {
    pub sign_in_links: Vec<String>,
    pub email_fields: Vec<String>,
    pub continue_buttons: Vec<String>,
    pub password_fields: Vec<String>,
    pub submit_buttons: Vec<String>,
    pub account_indicators: Vec<String>,
    pub next_page: Vec<String>,
}

impl Default for SelectorSection {
    fn default() -> Self {
        Self {
            sign_in_links: vec![
                "#nav-link-accountList".to_string(),
                "a[data-nav-role='signin']".to_string(),
                "#nav-signin-tooltip a.nav-action-signin-button".to_string(),
                "a[href*='/ap/signin']".to_string(),
            ],
            email_fields: vec![
                "input#ap_email".to_string(),
                "input[name='email']".to_string(),
                "input[type='email']".to_string(),
            ],
            continue_buttons: vec![
                "input#continue".to_string(),
                "#continue input[type='submit']".to_string(),
                "button[type='submit']".to_string(),
            ],
            password_fields: vec![
                "input#ap_password".to_string(),
                "input[name='password']".to_string(),
                "input[type='password']".to_string(),
            ],
            submit_buttons: vec![
                "input#signInSubmit".to_string(),
                "#auth-signin-button input".to_string(),
                "input[type='submit']".to_string(),
            ],
            account_indicators: vec![
                "#nav-link-accountList-nav-line-1".to_string(),
                "#nav-link-accountList .nav-line-1".to_string(),
                "#nav-tools a#nav-link-accountList span".to_string(),
            ],
            next_page: vec![
                "ul.a-pagination li.a-last a".to_string(),
                ".a-pagination .a-last a".to_string(),
                "a[data-hook='pagination-next']".to_string(),
                "a.s-pagination-next".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationSection {
    pub nav_retries: u32,
}

impl Default for PaginationSection {
    fn default() -> Self {
        Self { nav_retries: 2 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    /// Hard ceiling for concurrent product tasks; requests above it clamp.
    pub product_ceiling: usize,
    pub default_max_products: usize,
    pub default_max_pages: u32,
    pub default_max_reviews_per_page: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            product_ceiling: 10,
            default_max_products: 3,
            default_max_pages: 1,
            default_max_reviews_per_page: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub state_path: String,
    pub ttl_hours: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            state_path: "session_state.json".to_string(),
            ttl_hours: 24,
        }
    }
}

pub fn load_scraper_config<P: AsRef<Path>>(path: P) -> Result<ScraperConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
