use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, GetCookiesParams, SetCookiesParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::handler::viewport::Viewport as ChromiumViewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use rand::{seq::SliceRandom, thread_rng, Rng};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ScraperConfig;

use super::cookies::{SessionStore, StoredCookie};
use super::error::{ScrapeError, ScrapeResult};
use super::metrics::SessionMetrics;
use super::stealth::StealthMasker;

/// Fingerprint identity assigned to one session: user agent, viewport and
/// locale/timezone. Picked at acquisition, immutable for the session's
/// lifetime, never shared between concurrent sessions.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_agent: String,
    pub width: u32,
    pub height: u32,
    pub locale: String,
    pub timezone: String,
}

/// Abstract browsing session the pipeline drives. The production
/// implementation wraps a Chromium page; tests substitute scripted mocks.
#[async_trait]
pub trait ScrapeSession: Send {
    async fn goto(&mut self, url: &str) -> ScrapeResult<()>;
    async fn current_url(&mut self) -> ScrapeResult<String>;
    async fn content(&mut self) -> ScrapeResult<String>;
    async fn evaluate(&mut self, script: &str) -> ScrapeResult<serde_json::Value>;
    /// Try each selector in order; click the first element found. Returns
    /// the matched selector, or `None` when the whole list missed.
    async fn click_first(&mut self, selectors: &[String]) -> ScrapeResult<Option<String>>;
    /// Try each selector in order; focus the first matching field and type
    /// into it. Returns the matched selector, or `None` on a full miss.
    async fn fill_first(&mut self, selectors: &[String], text: &str)
        -> ScrapeResult<Option<String>>;
    async fn cookies(&mut self) -> ScrapeResult<Vec<StoredCookie>>;
    async fn close(&mut self) -> ScrapeResult<()>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self, headless: bool) -> ScrapeResult<Box<dyn ScrapeSession>>;
}

/// Best-effort teardown: close errors are logged, never propagated, so a
/// cleanup failure cannot mask the primary outcome of the session's work.
pub async fn release(mut session: Box<dyn ScrapeSession>) {
    if let Err(err) = session.close().await {
        warn!(error = %err, "failed to close browser session cleanly");
    }
}

/// Launches isolated, fingerprint-randomized Chromium sessions.
#[derive(Clone)]
pub struct SessionLauncher {
    config: Arc<ScraperConfig>,
    store: Option<Arc<SessionStore>>,
    stealth: Arc<StealthMasker>,
}

impl SessionLauncher {
    pub fn new(config: Arc<ScraperConfig>, store: Option<Arc<SessionStore>>) -> Self {
        let stealth = Arc::new(StealthMasker::new(config.stealth.clone()));
        Self {
            config,
            store,
            stealth,
        }
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub async fn launch(&self, headless: bool) -> ScrapeResult<ChromiumSession> {
        let identity = self.select_identity();
        let chromium_config = self.build_chromium_config(&identity, headless)?;
        let id = Uuid::new_v4().to_string();
        info!(
            session = %id,
            ua = %identity.user_agent,
            width = identity.width,
            height = identity.height,
            timezone = %identity.timezone,
            headless,
            "launching chromium session"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| ScrapeError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "chromium handler reported error");
                }
            }
        });

        let page = browser
            .new_page(CreateTargetParams::new("about:blank"))
            .await?;
        self.configure_page(&page, &identity).await?;

        let mut session = ChromiumSession {
            id,
            browser,
            page,
            handler_task: Some(handler_task),
            identity,
            nav_timeout: Duration::from_secs(self.config.chromium.navigation_timeout_seconds),
            metrics: SessionMetrics::default(),
        };
        self.preload_session_state(&mut session).await;
        Ok(session)
    }

    fn select_identity(&self) -> Identity {
        let mut rng = thread_rng();
        let user_agent = self
            .config
            .user_agents
            .pool
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36"
                    .to_string()
            });
        let base = self
            .config
            .viewport
            .resolutions
            .choose(&mut rng)
            .copied()
            .unwrap_or([1366, 768]);
        let jitter = self.config.viewport.jitter_pixels as i32;
        let width = (base[0] as i32 + rng.gen_range(-jitter..=jitter)).clamp(800, 2560) as u32;
        let height = (base[1] as i32 + rng.gen_range(-jitter..=jitter)).clamp(600, 1600) as u32;
        let (locale, timezone) = self
            .config
            .locales
            .pool
            .choose(&mut rng)
            .map(|entry| (entry.locale.clone(), entry.timezone.clone()))
            .unwrap_or_else(|| ("en-US".to_string(), "America/New_York".to_string()));
        Identity {
            user_agent,
            width,
            height,
            locale,
            timezone,
        }
    }

    fn build_chromium_config(
        &self,
        identity: &Identity,
        headless: bool,
    ) -> ScrapeResult<ChromiumConfig> {
        let mut builder = ChromiumConfig::builder().viewport(ChromiumViewport {
            width: identity.width,
            height: identity.height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: identity.width >= identity.height,
            has_touch: false,
        });

        if let Some(executable) = &self.config.chromium.executable_path {
            builder = builder.chrome_executable(executable);
        }
        if !headless {
            builder = builder.with_head();
        }
        if !self.config.chromium.sandbox {
            builder = builder.no_sandbox();
        }
        builder =
            builder.request_timeout(Duration::from_secs(self.config.chromium.request_timeout_seconds));

        let mut args = vec![
            format!("--user-agent={}", identity.user_agent),
            format!("--window-size={},{}", identity.width, identity.height),
        ];
        if self.config.chromium.disable_gpu {
            args.push("--disable-gpu".into());
        }
        if self.config.flags.no_first_run {
            args.push("--no-first-run".into());
        }
        for feature in &self.config.flags.disable_blink_features {
            args.push(format!("--disable-blink-features={feature}"));
        }
        if self.config.flags.disable_automation_controlled {
            args.push("--disable-features=AutomationControlled".into());
        }
        if let Some(lang) = &self.config.flags.lang {
            args.push(format!("--lang={lang}"));
        }
        if let Some(accept) = &self.config.flags.accept_language {
            args.push(format!("--accept-lang={accept}"));
        }
        args.extend(self.config.flags.extra_args.iter().cloned());

        builder = builder.args(args);
        builder.build().map_err(ScrapeError::Configuration)
    }

    async fn configure_page(&self, page: &Page, identity: &Identity) -> ScrapeResult<()> {
        page.enable_stealth_mode_with_agent(&identity.user_agent)
            .await?;

        let mut params = SetUserAgentOverrideParams::builder().user_agent(&identity.user_agent);
        if let Some(accept) = &self.config.flags.accept_language {
            params = params.accept_language(accept.clone());
        }
        page.set_user_agent(params.build().map_err(ScrapeError::Configuration)?)
            .await?;

        page.execute(SetTimezoneOverrideParams::new(identity.timezone.clone()))
            .await?;

        self.stealth.apply(page, identity).await?;
        Ok(())
    }

    /// Inject a fresh persisted cookie jar before the first navigation.
    /// Anything short of a clean load falls back to an anonymous start.
    async fn preload_session_state(&self, session: &mut ChromiumSession) {
        let Some(store) = &self.store else {
            return;
        };
        if !self.config.auth.persist_session {
            return;
        }
        let Some(state) = store.load_fresh() else {
            return;
        };
        let count = state.cookies.len() as u64;
        match session.inject_cookies(&state.cookies).await {
            Ok(()) => {
                session.metrics.record_cookies_injected(count);
                debug!(session = %session.id, cookies = count, "restored persisted session cookies");
            }
            Err(err) => {
                warn!(session = %session.id, error = %err, "failed to inject persisted cookies");
            }
        }
    }
}

/// One isolated Chromium instance plus the page the pipeline drives.
pub struct ChromiumSession {
    id: String,
    browser: Browser,
    page: Page,
    handler_task: Option<JoinHandle<()>>,
    identity: Identity,
    nav_timeout: Duration,
    metrics: SessionMetrics,
}

impl ChromiumSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    async fn inject_cookies(&mut self, cookies: &[StoredCookie]) -> ScrapeResult<()> {
        let mut params = Vec::with_capacity(cookies.len());
        for cookie in cookies {
            let param = CookieParam::builder()
                .name(&cookie.name)
                .value(&cookie.value)
                .domain(&cookie.domain)
                .path(&cookie.path)
                .secure(cookie.secure)
                .http_only(cookie.http_only)
                .build()
                .map_err(ScrapeError::Configuration)?;
            params.push(param);
        }
        self.page.execute(SetCookiesParams::new(params)).await?;
        Ok(())
    }
}

#[async_trait]
impl ScrapeSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> ScrapeResult<()> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(ScrapeError::Configuration)?;
        let page = &self.page;
        let navigation = async move {
            page.goto(params).await?;
            page.wait_for_navigation().await?;
            Ok::<_, ScrapeError>(())
        };
        let outcome = tokio::time::timeout(self.nav_timeout, navigation).await;
        match outcome {
            Ok(Ok(())) => {
                self.metrics.record_page_open();
                Ok(())
            }
            Ok(Err(err)) => {
                self.metrics.record_navigation_failure();
                Err(ScrapeError::Navigation(format!("{url}: {err}")))
            }
            Err(_) => {
                self.metrics.record_navigation_failure();
                Err(ScrapeError::Timeout(format!("navigation to {url}")))
            }
        }
    }

    async fn current_url(&mut self) -> ScrapeResult<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn content(&mut self) -> ScrapeResult<String> {
        Ok(self.page.content().await?)
    }

    async fn evaluate(&mut self, script: &str) -> ScrapeResult<serde_json::Value> {
        let result = self.page.evaluate(script).await?;
        self.metrics.record_script_evaluated();
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn click_first(&mut self, selectors: &[String]) -> ScrapeResult<Option<String>> {
        for selector in selectors {
            let Ok(element) = self.page.find_element(selector.clone()).await else {
                continue;
            };
            element.click().await.map_err(|err| {
                ScrapeError::Unexpected(format!("failed to click {selector}: {err}"))
            })?;
            self.metrics.record_element_clicked();
            return Ok(Some(selector.clone()));
        }
        Ok(None)
    }

    async fn fill_first(
        &mut self,
        selectors: &[String],
        text: &str,
    ) -> ScrapeResult<Option<String>> {
        for selector in selectors {
            let Ok(element) = self.page.find_element(selector.clone()).await else {
                continue;
            };
            element.click().await.map_err(|err| {
                ScrapeError::Unexpected(format!("failed to focus {selector}: {err}"))
            })?;
            element.type_str(text).await.map_err(|err| {
                ScrapeError::Unexpected(format!("failed to type into {selector}: {err}"))
            })?;
            self.metrics.record_field_filled();
            return Ok(Some(selector.clone()));
        }
        Ok(None)
    }

    async fn cookies(&mut self) -> ScrapeResult<Vec<StoredCookie>> {
        let response = self.page.execute(GetCookiesParams { urls: None }).await?;
        Ok(response
            .result
            .cookies
            .into_iter()
            .map(|cookie| StoredCookie {
                name: cookie.name,
                value: cookie.value,
                domain: cookie.domain,
                path: cookie.path,
                secure: cookie.secure,
                http_only: cookie.http_only,
                expires: None,
            })
            .collect())
    }

    async fn close(&mut self) -> ScrapeResult<()> {
        info!(
            session = %self.id,
            pages = self.metrics.pages_opened,
            nav_failures = self.metrics.navigation_failures,
            "shutting down chromium session"
        );
        self.browser.close().await?;
        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "browser handler join error");
            }
        }
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(handle) = &self.handler_task {
            if !handle.is_finished() {
                warn!(session = %self.id, "chromium session dropped without explicit release");
            }
        }
    }
}

/// Production [`SessionFactory`]: every created session is a fully isolated
/// browser instance with its own identity. Sessions are never pooled.
#[derive(Clone)]
pub struct ChromiumSessionFactory {
    launcher: SessionLauncher,
}

impl ChromiumSessionFactory {
    pub fn new(launcher: SessionLauncher) -> Self {
        Self { launcher }
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn create(&self, headless: bool) -> ScrapeResult<Box<dyn ScrapeSession>> {
        let session = self.launcher.launch(headless).await?;
        Ok(Box::new(session))
    }
}
