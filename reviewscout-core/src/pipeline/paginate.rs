use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{Humanizer, ScrapeResult, ScrapeSession};
use crate::config::ScraperConfig;
use crate::extract::extract_reviews;

use super::{ExtractionResult, ReviewSource, TerminalReason};

/// Page and per-page review caps for one walk.
#[derive(Debug, Clone, Copy)]
pub struct PageBudget {
    pub max_pages: u32,
    pub max_reviews_per_page: usize,
}

fn product_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"/(?:dp|gp/product|product-reviews)/([A-Z0-9]{10})")
            .expect("valid product id pattern")
    })
}

/// Canonical reviews-view URL for a product target. Derived from the
/// identifier embedded in the URL because duplicate-ID markup on the detail
/// page makes clicking the in-page reviews link unreliable.
pub fn derive_reviews_url(product_url: &str) -> Option<String> {
    let captures = product_id_re().captures(product_url)?;
    let id = captures.get(1)?.as_str();
    let parsed = Url::parse(product_url).ok()?;
    let host = parsed.host_str()?;
    Some(format!("{}://{host}/product-reviews/{id}/", parsed.scheme()))
}

/// Navigate with a bounded retry and humanized backoff between attempts.
pub(crate) async fn navigate_with_retry(
    session: &mut dyn ScrapeSession,
    humanizer: &Humanizer,
    url: &str,
    retries: u32,
) -> ScrapeResult<()> {
    let mut attempt = 0u32;
    loop {
        match session.goto(url).await {
            Ok(()) => {
                humanizer.settle().await;
                return Ok(());
            }
            Err(err) if attempt < retries => {
                warn!(url, attempt, error = %err, "navigation failed, backing off before retry");
                attempt += 1;
                humanizer.backoff().await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Walks review pages for one product:
/// FetchPage -> ExtractReviews -> LocateNext -> {NavigateNext | Terminal}.
pub struct ReviewPaginator<'a> {
    config: &'a ScraperConfig,
    humanizer: &'a Humanizer,
}

impl<'a> ReviewPaginator<'a> {
    pub fn new(config: &'a ScraperConfig, humanizer: &'a Humanizer) -> Self {
        Self { config, humanizer }
    }

    /// Collect reviews for `product_url`. The caller has already navigated
    /// to the product detail page and passes its rendered HTML, so the
    /// single-page fast path costs no extra navigation.
    pub async fn collect(
        &self,
        session: &mut dyn ScrapeSession,
        product_url: &str,
        product_page_html: &str,
        budget: &PageBudget,
    ) -> ExtractionResult {
        let max_pages = budget.max_pages.max(1);
        let per_page = budget.max_reviews_per_page.max(1);

        if max_pages == 1 {
            let reviews = extract_reviews(product_page_html, per_page);
            if !reviews.is_empty() {
                info!(
                    url = product_url,
                    reviews = reviews.len(),
                    "reviews satisfied from the product detail page"
                );
                return ExtractionResult::completed(
                    reviews,
                    1,
                    ReviewSource::ProductPage,
                    TerminalReason::EndOfResults,
                );
            }
            debug!(url = product_url, "no reviews on detail page, using reviews view");
        }

        let Some(reviews_url) = derive_reviews_url(product_url) else {
            warn!(url = product_url, "no product identifier in url, cannot reach reviews view");
            return ExtractionResult::failed(
                Vec::new(),
                0,
                ReviewSource::ReviewsPage,
                format!("no product identifier found in {product_url}"),
            );
        };

        let mut reviews = Vec::new();
        let mut pages_scraped = 0u32;
        let mut next_url = reviews_url;

        loop {
            if let Err(err) = navigate_with_retry(
                session,
                self.humanizer,
                &next_url,
                self.config.pagination.nav_retries,
            )
            .await
            {
                warn!(url = %next_url, error = %err, "review page unreachable, keeping partial results");
                return ExtractionResult::failed(
                    reviews,
                    pages_scraped,
                    ReviewSource::ReviewsPage,
                    err.to_string(),
                );
            }

            self.humanizer
                .scroll(session, self.config.human.max_scrolls)
                .await;

            let html = match session.content().await {
                Ok(html) => html,
                Err(err) => {
                    warn!(url = %next_url, error = %err, "failed to read review page content");
                    return ExtractionResult::failed(
                        reviews,
                        pages_scraped,
                        ReviewSource::ReviewsPage,
                        err.to_string(),
                    );
                }
            };

            let mut page_reviews = extract_reviews(&html, per_page);
            pages_scraped += 1;
            debug!(
                page = pages_scraped,
                found = page_reviews.len(),
                total = reviews.len() + page_reviews.len(),
                "review page extracted"
            );
            reviews.append(&mut page_reviews);

            let Some(href) = find_next_href(&html, &self.config.selectors.next_page) else {
                info!(pages = pages_scraped, "no enabled next control, walk complete");
                return ExtractionResult::completed(
                    reviews,
                    pages_scraped,
                    ReviewSource::ReviewsPage,
                    TerminalReason::EndOfResults,
                );
            };
            if pages_scraped >= max_pages {
                info!(pages = pages_scraped, "page budget reached, walk complete");
                return ExtractionResult::completed(
                    reviews,
                    pages_scraped,
                    ReviewSource::ReviewsPage,
                    TerminalReason::MaxPagesReached,
                );
            }
            next_url = absolutize(&href, &next_url);
        }
    }
}

/// Locate the next-page control. The first selector that matches settles
/// the question: an enabled control yields its href, a disabled one means
/// the walk is over.
fn find_next_href(html: &str, selectors: &[String]) -> Option<String> {
    let document = Html::parse_document(html);
    for selector in selectors {
        let Ok(parsed) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&parsed).next() {
            if is_disabled(element) {
                return None;
            }
            return element.value().attr("href").map(|href| href.to_string());
        }
    }
    None
}

fn is_disabled(element: ElementRef<'_>) -> bool {
    if element.value().attr("aria-disabled") == Some("true") {
        return true;
    }
    if element.value().classes().any(|class| class == "a-disabled") {
        return true;
    }
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().classes().any(|class| class == "a-disabled"))
}

fn absolutize(href: &str, base: &str) -> String {
    if href.starts_with("http") {
        return href.to_string();
    }
    match Url::parse(base).and_then(|base| base.join(href)) {
        Ok(joined) => joined.to_string(),
        Err(_) => href.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_reviews_url_from_detail_url() {
        assert_eq!(
            derive_reviews_url("https://www.amazon.com/dp/B08N5WRWNW?th=1").as_deref(),
            Some("https://www.amazon.com/product-reviews/B08N5WRWNW/")
        );
        assert_eq!(
            derive_reviews_url("https://www.amazon.com/gp/product/B000000001/ref=x").as_deref(),
            Some("https://www.amazon.com/product-reviews/B000000001/")
        );
        assert!(derive_reviews_url("https://www.amazon.com/s?k=widgets").is_none());
    }

    fn next_selectors() -> Vec<String> {
        crate::config::SelectorSection::default().next_page
    }

    #[test]
    fn enabled_next_control_yields_href() {
        let html = r#"<html><body>
            <ul class="a-pagination"><li class="a-last"><a href="/product-reviews/B08N5WRWNW/?pageNumber=2">Next</a></li></ul>
        </body></html>"#;
        assert_eq!(
            find_next_href(html, &next_selectors()).as_deref(),
            Some("/product-reviews/B08N5WRWNW/?pageNumber=2")
        );
    }

    #[test]
    fn disabled_next_control_ends_the_walk() {
        let html = r##"<html><body>
            <ul class="a-pagination"><li class="a-last a-disabled"><a href="#">Next</a></li></ul>
        </body></html>"##;
        assert!(find_next_href(html, &next_selectors()).is_none());
    }

    #[test]
    fn aria_disabled_control_ends_the_walk() {
        let html = r##"<html><body>
            <ul class="a-pagination"><li class="a-last"><a aria-disabled="true" href="#">Next</a></li></ul>
        </body></html>"##;
        assert!(find_next_href(html, &next_selectors()).is_none());
    }

    #[test]
    fn absent_control_ends_the_walk() {
        assert!(find_next_href("<html><body></body></html>", &next_selectors()).is_none());
    }

    #[test]
    fn relative_next_links_resolve_against_the_current_page() {
        assert_eq!(
            absolutize(
                "/product-reviews/B08N5WRWNW/?pageNumber=2",
                "https://www.amazon.com/product-reviews/B08N5WRWNW/"
            ),
            "https://www.amazon.com/product-reviews/B08N5WRWNW/?pageNumber=2"
        );
        assert_eq!(
            absolutize("https://example.com/p2", "https://www.amazon.com/"),
            "https://example.com/p2"
        );
    }
}
