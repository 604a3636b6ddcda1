mod coordinator;
mod paginate;
mod search;

use serde::{Deserialize, Serialize};

use crate::extract::ReviewRecord;

pub use coordinator::{BatchOptions, ScrapeCoordinator};
pub use paginate::{derive_reviews_url, PageBudget, ReviewPaginator};
pub use search::{build_search_url, parse_search_results, ProductTarget};

/// Where a product's reviews were taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSource {
    ProductPage,
    ReviewsPage,
}

/// Why a pagination walk stopped. `EndOfResults` and `MaxPagesReached` are
/// expected exits; only `Failed` marks an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    EndOfResults,
    MaxPagesReached,
    Failed,
}

/// Structured fields for one product target. Created once per target,
/// immutable after the extraction pass that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub url: String,
    pub title: String,
    pub price: String,
    pub rating: Option<f64>,
    pub review_count: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Outcome of one review-pagination walk. Reviews gathered before a failure
/// are preserved here rather than discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub reviews: Vec<ReviewRecord>,
    pub pages_scraped: u32,
    pub source: ReviewSource,
    pub terminal: TerminalReason,
    pub success: bool,
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn completed(
        reviews: Vec<ReviewRecord>,
        pages_scraped: u32,
        source: ReviewSource,
        terminal: TerminalReason,
    ) -> Self {
        Self {
            reviews,
            pages_scraped,
            source,
            terminal,
            success: true,
            error: None,
        }
    }

    pub fn failed(
        reviews: Vec<ReviewRecord>,
        pages_scraped: u32,
        source: ReviewSource,
        cause: String,
    ) -> Self {
        Self {
            reviews,
            pages_scraped,
            source,
            terminal: TerminalReason::Failed,
            success: false,
            error: Some(cause),
        }
    }
}

/// Everything gathered for one product target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductReport {
    pub product: ProductRecord,
    pub extraction: ExtractionResult,
}

impl ProductReport {
    pub fn total_reviews_found(&self) -> usize {
        self.extraction.reviews.len()
    }

    /// A record for a target whose pipeline failed before producing data.
    pub fn degraded(url: String, cause: String) -> Self {
        Self {
            product: ProductRecord {
                url,
                title: String::new(),
                price: String::new(),
                rating: None,
                review_count: String::new(),
                success: false,
                error: Some(cause.clone()),
            },
            extraction: ExtractionResult::failed(
                Vec::new(),
                0,
                ReviewSource::ProductPage,
                cause,
            ),
        }
    }
}

/// Aggregate over one batch, preserving input ordering. Returned even when
/// every product failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub total_products: usize,
    pub total_reviews: usize,
    pub products: Vec<ProductReport>,
}
