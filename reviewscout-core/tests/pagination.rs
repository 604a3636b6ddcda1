use std::collections::HashMap;

use async_trait::async_trait;
use reviewscout_core::browser::{
    Humanizer, ScrapeError, ScrapeResult, ScrapeSession, StoredCookie,
};
use reviewscout_core::config::{HumanSection, ScraperConfig};
use reviewscout_core::pipeline::{PageBudget, ReviewPaginator, ReviewSource, TerminalReason};

const PRODUCT_URL: &str = "https://www.amazon.com/dp/B08N5WRWNW";
const REVIEWS_URL: &str = "https://www.amazon.com/product-reviews/B08N5WRWNW/";

fn fast_config() -> ScraperConfig {
    let mut config = ScraperConfig::default();
    config.human = HumanSection {
        max_scrolls: 1,
        scroll_step_px: [300, 800],
        smooth_scroll_pause_ms: [0, 0],
        instant_scroll_pause_ms: [0, 0],
        reading_pause_ms: [0, 0],
        scroll_back_px: [100, 300],
        scroll_back_pause_ms: [0, 0],
        page_settle_ms: [0, 0],
        action_pause_ms: [0, 0],
        nav_backoff_ms: [0, 0],
    };
    config
}

fn review_blocks(count: usize, prefix: &str) -> String {
    (0..count)
        .map(|i| {
            format!(
                r#"<li data-hook="review">
                    <span class="a-profile-name">{prefix} reviewer {i}</span>
                    <i data-hook="review-star-rating"><span>4.0 out of 5 stars</span></i>
                    <span data-hook="review-date">Reviewed on May {i}, 2025</span>
                    <span data-hook="review-body"><span>{prefix} body {i}</span></span>
                </li>"#
            )
        })
        .collect()
}

fn review_page(count: usize, prefix: &str, next: Option<&str>) -> String {
    let pagination = match next {
        Some(href) => format!(
            r#"<ul class="a-pagination"><li class="a-last"><a href="{href}">Next</a></li></ul>"#
        ),
        None => String::new(),
    };
    format!(
        "<html><body><ul>{}</ul>{pagination}</body></html>",
        review_blocks(count, prefix)
    )
}

fn review_page_disabled_next(count: usize, prefix: &str) -> String {
    format!(
        r##"<html><body><ul>{}</ul>
        <ul class="a-pagination"><li class="a-last a-disabled"><a href="#">Next</a></li></ul>
        </body></html>"##,
        review_blocks(count, prefix)
    )
}

struct MockSession {
    pages: HashMap<String, String>,
    failures: HashMap<String, usize>,
    visited: Vec<String>,
    current: String,
}

impl MockSession {
    fn new(pages: HashMap<String, String>) -> Self {
        Self {
            pages,
            failures: HashMap::new(),
            visited: Vec::new(),
            current: String::new(),
        }
    }

    fn failing(mut self, url: &str, times: usize) -> Self {
        self.failures.insert(url.to_string(), times);
        self
    }
}

#[async_trait]
impl ScrapeSession for MockSession {
    async fn goto(&mut self, url: &str) -> ScrapeResult<()> {
        if let Some(remaining) = self.failures.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ScrapeError::Navigation(format!("{url}: connection reset")));
            }
        }
        if !self.pages.contains_key(url) {
            return Err(ScrapeError::Navigation(format!("{url}: not found")));
        }
        self.visited.push(url.to_string());
        self.current = url.to_string();
        Ok(())
    }

    async fn current_url(&mut self) -> ScrapeResult<String> {
        Ok(self.current.clone())
    }

    async fn content(&mut self) -> ScrapeResult<String> {
        self.pages
            .get(&self.current)
            .cloned()
            .ok_or_else(|| ScrapeError::Unexpected("no page loaded".to_string()))
    }

    async fn evaluate(&mut self, _script: &str) -> ScrapeResult<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    async fn click_first(&mut self, _selectors: &[String]) -> ScrapeResult<Option<String>> {
        Ok(None)
    }

    async fn fill_first(
        &mut self,
        _selectors: &[String],
        _text: &str,
    ) -> ScrapeResult<Option<String>> {
        Ok(None)
    }

    async fn cookies(&mut self) -> ScrapeResult<Vec<StoredCookie>> {
        Ok(Vec::new())
    }

    async fn close(&mut self) -> ScrapeResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn single_page_request_is_satisfied_from_the_product_page() {
    let config = fast_config();
    let humanizer = Humanizer::new(config.human.clone());
    let paginator = ReviewPaginator::new(&config, &humanizer);
    let product_html = format!(
        "<html><body><ul>{}</ul></body></html>",
        review_blocks(5, "detail")
    );
    let mut session = MockSession::new(HashMap::new());

    let budget = PageBudget {
        max_pages: 1,
        max_reviews_per_page: 10,
    };
    let result = paginator
        .collect(&mut session, PRODUCT_URL, &product_html, &budget)
        .await;

    assert!(result.success);
    assert_eq!(result.reviews.len(), 5);
    assert_eq!(result.pages_scraped, 1);
    assert_eq!(result.source, ReviewSource::ProductPage);
    // The whole point of the fast path: no navigation to the reviews view.
    assert!(session.visited.is_empty());
}

#[tokio::test]
async fn single_page_falls_back_to_reviews_view_when_detail_page_is_bare() {
    let config = fast_config();
    let humanizer = Humanizer::new(config.human.clone());
    let paginator = ReviewPaginator::new(&config, &humanizer);
    let mut pages = HashMap::new();
    pages.insert(REVIEWS_URL.to_string(), review_page(4, "page1", None));
    let mut session = MockSession::new(pages);

    let budget = PageBudget {
        max_pages: 1,
        max_reviews_per_page: 10,
    };
    let result = paginator
        .collect(&mut session, PRODUCT_URL, "<html><body></body></html>", &budget)
        .await;

    assert!(result.success);
    assert_eq!(result.reviews.len(), 4);
    assert_eq!(result.source, ReviewSource::ReviewsPage);
    assert_eq!(session.visited, vec![REVIEWS_URL.to_string()]);
}

#[tokio::test]
async fn disabled_next_control_terminates_after_two_pages() {
    let config = fast_config();
    let humanizer = Humanizer::new(config.human.clone());
    let paginator = ReviewPaginator::new(&config, &humanizer);
    let page2_url = format!("{REVIEWS_URL}?pageNumber=2");
    let mut pages = HashMap::new();
    pages.insert(
        REVIEWS_URL.to_string(),
        review_page(10, "page1", Some("/product-reviews/B08N5WRWNW/?pageNumber=2")),
    );
    pages.insert(page2_url.clone(), review_page_disabled_next(10, "page2"));
    let mut session = MockSession::new(pages);

    let budget = PageBudget {
        max_pages: 3,
        max_reviews_per_page: 10,
    };
    let result = paginator
        .collect(&mut session, PRODUCT_URL, "<html></html>", &budget)
        .await;

    assert!(result.success);
    assert_eq!(result.pages_scraped, 2);
    assert_eq!(result.reviews.len(), 20);
    assert_eq!(result.terminal, TerminalReason::EndOfResults);
    assert_eq!(session.visited, vec![REVIEWS_URL.to_string(), page2_url]);
}

#[tokio::test]
async fn chain_shorter_than_budget_ends_with_end_of_results() {
    let config = fast_config();
    let humanizer = Humanizer::new(config.human.clone());
    let paginator = ReviewPaginator::new(&config, &humanizer);
    let page2_url = format!("{REVIEWS_URL}?pageNumber=2");
    let mut pages = HashMap::new();
    pages.insert(
        REVIEWS_URL.to_string(),
        review_page(3, "page1", Some("/product-reviews/B08N5WRWNW/?pageNumber=2")),
    );
    pages.insert(page2_url, review_page(3, "page2", None));
    let mut session = MockSession::new(pages);

    let budget = PageBudget {
        max_pages: 5,
        max_reviews_per_page: 10,
    };
    let result = paginator
        .collect(&mut session, PRODUCT_URL, "<html></html>", &budget)
        .await;

    assert!(result.success);
    assert_eq!(result.pages_scraped, 2);
    assert_eq!(result.terminal, TerminalReason::EndOfResults);
}

#[tokio::test]
async fn walk_never_exceeds_the_page_budget() {
    let config = fast_config();
    let humanizer = Humanizer::new(config.human.clone());
    let paginator = ReviewPaginator::new(&config, &humanizer);
    let mut pages = HashMap::new();
    pages.insert(
        REVIEWS_URL.to_string(),
        review_page(2, "page1", Some("/product-reviews/B08N5WRWNW/?pageNumber=2")),
    );
    pages.insert(
        format!("{REVIEWS_URL}?pageNumber=2"),
        review_page(2, "page2", Some("/product-reviews/B08N5WRWNW/?pageNumber=3")),
    );
    pages.insert(
        format!("{REVIEWS_URL}?pageNumber=3"),
        review_page(2, "page3", Some("/product-reviews/B08N5WRWNW/?pageNumber=4")),
    );
    pages.insert(
        format!("{REVIEWS_URL}?pageNumber=4"),
        review_page(2, "page4", Some("/product-reviews/B08N5WRWNW/?pageNumber=5")),
    );
    let mut session = MockSession::new(pages);

    let budget = PageBudget {
        max_pages: 3,
        max_reviews_per_page: 10,
    };
    let result = paginator
        .collect(&mut session, PRODUCT_URL, "<html></html>", &budget)
        .await;

    assert!(result.success);
    assert_eq!(result.pages_scraped, 3);
    assert_eq!(result.reviews.len(), 6);
    assert_eq!(result.terminal, TerminalReason::MaxPagesReached);
    assert_eq!(session.visited.len(), 3);
}

#[tokio::test]
async fn navigation_failure_preserves_partial_reviews() {
    let config = fast_config();
    let humanizer = Humanizer::new(config.human.clone());
    let paginator = ReviewPaginator::new(&config, &humanizer);
    let page2_url = format!("{REVIEWS_URL}?pageNumber=2");
    let mut pages = HashMap::new();
    pages.insert(
        REVIEWS_URL.to_string(),
        review_page(10, "page1", Some("/product-reviews/B08N5WRWNW/?pageNumber=2")),
    );
    // Page 2 fails on every attempt, outlasting the retry budget.
    let mut session = MockSession::new(pages).failing(&page2_url, 10);

    let budget = PageBudget {
        max_pages: 3,
        max_reviews_per_page: 10,
    };
    let result = paginator
        .collect(&mut session, PRODUCT_URL, "<html></html>", &budget)
        .await;

    assert!(!result.success);
    assert_eq!(result.terminal, TerminalReason::Failed);
    assert_eq!(result.reviews.len(), 10);
    assert_eq!(result.pages_scraped, 1);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn transient_navigation_failure_is_retried() {
    let config = fast_config();
    let humanizer = Humanizer::new(config.human.clone());
    let paginator = ReviewPaginator::new(&config, &humanizer);
    let mut pages = HashMap::new();
    pages.insert(REVIEWS_URL.to_string(), review_page(4, "page1", None));
    // One transient failure, within the retry budget of two.
    let mut session = MockSession::new(pages).failing(REVIEWS_URL, 1);

    let budget = PageBudget {
        max_pages: 2,
        max_reviews_per_page: 10,
    };
    let result = paginator
        .collect(&mut session, PRODUCT_URL, "<html></html>", &budget)
        .await;

    assert!(result.success);
    assert_eq!(result.reviews.len(), 4);
    assert_eq!(result.pages_scraped, 1);
}

#[tokio::test]
async fn missing_product_identifier_fails_without_guessing() {
    let config = fast_config();
    let humanizer = Humanizer::new(config.human.clone());
    let paginator = ReviewPaginator::new(&config, &humanizer);
    let mut session = MockSession::new(HashMap::new());

    let budget = PageBudget {
        max_pages: 2,
        max_reviews_per_page: 10,
    };
    let result = paginator
        .collect(
            &mut session,
            "https://www.amazon.com/s?k=widgets",
            "<html></html>",
            &budget,
        )
        .await;

    assert!(!result.success);
    assert!(session.visited.is_empty());
}

#[test]
fn review_source_serializes_as_snake_case() {
    assert_eq!(
        serde_json::to_value(ReviewSource::ProductPage).unwrap(),
        serde_json::json!("product_page")
    );
    assert_eq!(
        serde_json::to_value(TerminalReason::EndOfResults).unwrap(),
        serde_json::json!("end_of_results")
    );
}
