use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cascade::{resolve_fragment, Candidate, TextFilter};

/// One customer review in page-render order. All fields are site-provided
/// free text; there is no stable review id, so no cross-page de-duplication
/// is attempted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewRecord {
    pub reviewer_name: String,
    pub rating: String,
    pub date: String,
    pub text: String,
    pub helpful_votes: String,
}

/// Container families, tried in order. The first selector with at least one
/// match owns the whole page; families are never mixed within one page.
const CONTAINER_SELECTORS: &[&str] = &[
    "li[data-hook='review']",
    "div[data-hook='review']",
    ".a-section.review",
    ".review",
];

const AUTHOR_CASCADE: &[Candidate] = &[
    Candidate {
        selector: "span.a-profile-name",
        filter: TextFilter::Any,
    },
    Candidate {
        selector: ".a-profile-name",
        filter: TextFilter::Any,
    },
];

const RATING_CASCADE: &[Candidate] = &[
    Candidate {
        selector: "i[data-hook='review-star-rating'] span",
        filter: TextFilter::Decimal,
    },
    Candidate {
        selector: "i[data-hook='cmps-review-star-rating'] span",
        filter: TextFilter::Decimal,
    },
    Candidate {
        selector: ".review-rating",
        filter: TextFilter::Decimal,
    },
];

const DATE_CASCADE: &[Candidate] = &[Candidate {
    selector: "span[data-hook='review-date']",
    filter: TextFilter::Any,
}];

const BODY_CASCADE: &[Candidate] = &[
    Candidate {
        selector: "span[data-hook='review-body'] span",
        filter: TextFilter::Any,
    },
    Candidate {
        selector: "span[data-hook='review-body']",
        filter: TextFilter::Any,
    },
    Candidate {
        selector: ".review-text-content span",
        filter: TextFilter::Any,
    },
    Candidate {
        selector: ".review-text",
        filter: TextFilter::Any,
    },
];

const HELPFUL_CASCADE: &[Candidate] = &[Candidate {
    selector: "span[data-hook='helpful-vote-statement']",
    filter: TextFilter::Any,
}];

/// Extract up to `max_reviews` reviews from a rendered page. A container
/// whose body text resolves empty is markup noise, not a zero-content
/// review, and is dropped. Deterministic on a static document.
pub fn extract_reviews(html: &str, max_reviews: usize) -> Vec<ReviewRecord> {
    let document = Html::parse_document(html);

    let mut blocks = Vec::new();
    for container in CONTAINER_SELECTORS {
        let Ok(selector) = Selector::parse(container) else {
            continue;
        };
        blocks = document.select(&selector).collect();
        if !blocks.is_empty() {
            debug!(selector = %container, matches = blocks.len(), "review container family chosen");
            break;
        }
    }

    let mut reviews = Vec::new();
    for block in blocks {
        if reviews.len() >= max_reviews {
            break;
        }
        let text = resolve_fragment(block, BODY_CASCADE);
        if text.is_empty() {
            continue;
        }
        reviews.push(ReviewRecord {
            reviewer_name: resolve_fragment(block, AUTHOR_CASCADE),
            rating: resolve_fragment(block, RATING_CASCADE),
            date: resolve_fragment(block, DATE_CASCADE),
            text,
            helpful_votes: resolve_fragment(block, HELPFUL_CASCADE),
        });
    }
    reviews
}
