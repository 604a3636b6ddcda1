use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::browser::{
    release, Authenticator, ChromiumSessionFactory, Humanizer, ScrapeError, ScrapeResult,
    ScrapeSession, SessionFactory, SessionLauncher, SessionStore,
};
use crate::config::{LimitsSection, ScraperConfig};
use crate::extract::extract_product_details;

use super::paginate::{navigate_with_retry, PageBudget, ReviewPaginator};
use super::search;
use super::{BatchReport, ProductRecord, ProductReport};

/// Caps and flags for one batch, supplied by the request layer.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_products: usize,
    pub max_pages: u32,
    pub max_reviews_per_page: usize,
    pub min_rating: Option<f64>,
    pub headless: bool,
}

impl BatchOptions {
    pub fn from_limits(limits: &LimitsSection) -> Self {
        Self {
            max_products: limits.default_max_products,
            max_pages: limits.default_max_pages,
            max_reviews_per_page: limits.default_max_reviews_per_page,
            min_rating: None,
            headless: true,
        }
    }
}

/// Fans product targets out over isolated sessions and folds the outcomes
/// into one report. A failing target never cancels or delays its siblings;
/// its failure is captured as a degraded record.
#[derive(Clone)]
pub struct ScrapeCoordinator {
    config: Arc<ScraperConfig>,
    factory: Arc<dyn SessionFactory>,
    store: Option<Arc<SessionStore>>,
}

impl ScrapeCoordinator {
    pub fn new(config: Arc<ScraperConfig>, factory: Arc<dyn SessionFactory>) -> Self {
        let store = derive_store(&config);
        Self {
            config,
            factory,
            store,
        }
    }

    /// Production wiring: every task launches its own stealth-configured
    /// Chromium instance.
    pub fn with_chromium(config: Arc<ScraperConfig>) -> Self {
        let store = derive_store(&config);
        let launcher = SessionLauncher::new(Arc::clone(&config), store.clone());
        let factory: Arc<dyn SessionFactory> = Arc::new(ChromiumSessionFactory::new(launcher));
        Self {
            config,
            factory,
            store,
        }
    }

    /// Discover product targets for a keyword, then scrape them.
    pub async fn scrape_keyword(
        &self,
        keyword: &str,
        options: &BatchOptions,
    ) -> ScrapeResult<BatchReport> {
        let limit = self.clamp_products(options.max_products);
        let humanizer = Humanizer::new(self.config.human.clone());
        let mut session = self.factory.create(options.headless).await?;
        let discovered =
            search::discover(session.as_mut(), &humanizer, &self.config, keyword, limit).await;
        release(session).await;
        let targets = discovered?;
        let urls = targets.into_iter().map(|target| target.url).collect();
        Ok(self.scrape_urls(urls, options).await)
    }

    /// Scrape each target concurrently and aggregate, preserving input
    /// order. Always returns a report, even when every product failed.
    pub async fn scrape_urls(&self, targets: Vec<String>, options: &BatchOptions) -> BatchReport {
        let limit = self.clamp_products(options.max_products);
        if targets.len() > limit {
            warn!(
                requested = targets.len(),
                limit, "clamping product targets to the configured ceiling"
            );
        }
        let targets: Vec<String> = targets.into_iter().take(limit).collect();
        info!(products = targets.len(), "starting batch extraction");

        let mut handles = Vec::with_capacity(targets.len());
        for url in &targets {
            let coordinator = self.clone();
            let url = url.clone();
            let options = options.clone();
            handles.push(tokio::spawn(async move {
                coordinator.scrape_one(url, &options).await
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (handle, url) in handles.into_iter().zip(targets) {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    warn!(url = %url, error = %err, "product task aborted");
                    reports.push(ProductReport::degraded(url, format!("task aborted: {err}")));
                }
            }
        }
        self.aggregate(reports, options.min_rating)
    }

    /// One product target, with every failure converted into a degraded
    /// record so the batch is never poisoned.
    async fn scrape_one(&self, url: String, options: &BatchOptions) -> ProductReport {
        match self.try_scrape(&url, options).await {
            Ok(report) => report,
            Err(err) => {
                warn!(url = %url, error = %err, "product extraction failed");
                ProductReport::degraded(url, err.to_string())
            }
        }
    }

    async fn try_scrape(&self, url: &str, options: &BatchOptions) -> ScrapeResult<ProductReport> {
        let humanizer = Humanizer::new(self.config.human.clone());
        let state_preloaded = self.config.auth.persist_session
            && self
                .store
                .as_ref()
                .is_some_and(|store| store.load_fresh().is_some());
        let mut session = self.factory.create(options.headless).await?;
        let outcome = self
            .run_pipeline(session.as_mut(), &humanizer, url, options, state_preloaded)
            .await;
        release(session).await;
        outcome
    }

    async fn run_pipeline(
        &self,
        session: &mut dyn ScrapeSession,
        humanizer: &Humanizer,
        url: &str,
        options: &BatchOptions,
        state_preloaded: bool,
    ) -> ScrapeResult<ProductReport> {
        let authenticator = Authenticator::new(Arc::clone(&self.config), self.store.clone());
        match authenticator.run(session, humanizer, state_preloaded).await {
            Ok(outcome) => debug!(?outcome, "authentication resolved"),
            Err(ScrapeError::AuthBlocked(reason)) => {
                warn!(%reason, "authentication blocked, continuing anonymously");
            }
            Err(err) => {
                warn!(error = %err, "authentication errored, continuing anonymously");
            }
        }

        info!(url, "extracting product");
        navigate_with_retry(session, humanizer, url, self.config.pagination.nav_retries).await?;
        humanizer.scroll(session, self.config.human.max_scrolls).await;
        let html = session.content().await?;
        let details = extract_product_details(&html);

        let budget = PageBudget {
            max_pages: options.max_pages.max(1),
            max_reviews_per_page: options.max_reviews_per_page.max(1),
        };
        let paginator = ReviewPaginator::new(&self.config, humanizer);
        let extraction = paginator.collect(session, url, &html, &budget).await;

        let product = ProductRecord {
            url: url.to_string(),
            title: details.title,
            price: details.price,
            rating: details.rating,
            review_count: details.review_count,
            success: extraction.success,
            error: extraction.error.clone(),
        };
        Ok(ProductReport {
            product,
            extraction,
        })
    }

    fn aggregate(&self, reports: Vec<ProductReport>, min_rating: Option<f64>) -> BatchReport {
        let products = match min_rating {
            Some(min) if min > 0.0 => {
                let before = reports.len();
                let kept: Vec<ProductReport> = reports
                    .into_iter()
                    .filter(|report| report.product.rating.is_some_and(|rating| rating >= min))
                    .collect();
                debug!(min, before, after = kept.len(), "applied minimum-rating filter");
                kept
            }
            _ => reports,
        };
        let total_reviews = products.iter().map(ProductReport::total_reviews_found).sum();
        BatchReport {
            total_products: products.len(),
            total_reviews,
            products,
        }
    }

    fn clamp_products(&self, requested: usize) -> usize {
        requested.max(1).min(self.config.limits.product_ceiling)
    }
}

fn derive_store(config: &Arc<ScraperConfig>) -> Option<Arc<SessionStore>> {
    config.auth.persist_session.then(|| {
        Arc::new(SessionStore::new(
            &config.session.state_path,
            Duration::from_secs(config.session.ttl_hours * 60 * 60),
        ))
    })
}
