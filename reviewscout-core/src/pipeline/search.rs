use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::browser::{Humanizer, ScrapeResult, ScrapeSession};
use crate::config::ScraperConfig;

/// A product discovered on a search results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductTarget {
    pub title: String,
    pub url: String,
}

/// Result-container families on the search surface, in preference order.
const CONTAINER_SELECTORS: &[&str] = &[
    "div[data-component-type='s-search-result']",
    "[data-asin][data-index]",
    ".s-result-item",
];

const TITLE_SELECTORS: &[&str] = &["h2 a span", "h2 span", ".a-text-normal"];

const LINK_SELECTORS: &[&str] = &["h2 a", "a.a-link-normal", "a[href*='/dp/']"];

pub fn build_search_url(base_url: &str, keyword: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
    format!("{}/s?k={encoded}", base_url.trim_end_matches('/'))
}

/// Parse product targets out of a rendered search page. Containers, titles
/// and links each resolve through their own candidate list; a container
/// missing either a title or a link is skipped.
pub fn parse_search_results(html: &str, base_url: &str, limit: usize) -> Vec<ProductTarget> {
    let document = Html::parse_document(html);

    let mut containers = Vec::new();
    for selector in CONTAINER_SELECTORS {
        let Ok(parsed) = Selector::parse(selector) else {
            continue;
        };
        containers = document.select(&parsed).collect();
        if !containers.is_empty() {
            debug!(selector = %selector, matches = containers.len(), "search container family chosen");
            break;
        }
    }

    let mut targets = Vec::new();
    for container in containers {
        if targets.len() >= limit {
            break;
        }
        let title = TITLE_SELECTORS.iter().find_map(|selector| {
            let parsed = Selector::parse(selector).ok()?;
            let element = container.select(&parsed).next()?;
            let text = element.text().collect::<String>().trim().to_string();
            (!text.is_empty()).then_some(text)
        });
        let href = LINK_SELECTORS.iter().find_map(|selector| {
            let parsed = Selector::parse(selector).ok()?;
            let element = container.select(&parsed).next()?;
            element.value().attr("href").map(|href| href.to_string())
        });
        let (Some(title), Some(href)) = (title, href) else {
            continue;
        };
        targets.push(ProductTarget {
            title,
            url: absolutize(&href, base_url),
        });
    }
    targets
}

/// Drive a session through a keyword search and return the top product
/// targets.
pub async fn discover(
    session: &mut dyn ScrapeSession,
    humanizer: &Humanizer,
    config: &ScraperConfig,
    keyword: &str,
    limit: usize,
) -> ScrapeResult<Vec<ProductTarget>> {
    let url = build_search_url(&config.site.base_url, keyword);
    info!(keyword, url = %url, "searching for product targets");
    session.goto(&url).await?;
    humanizer.settle().await;
    humanizer.scroll(session, 1).await;
    let html = session.content().await?;
    let targets = parse_search_results(&html, &config.site.base_url, limit);
    info!(keyword, found = targets.len(), "search targets discovered");
    Ok(targets)
}

fn absolutize(href: &str, base_url: &str) -> String {
    if href.starts_with("http") {
        return href.to_string();
    }
    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(joined) => joined.to_string(),
        Err(_) => href.to_string(),
    }
}
