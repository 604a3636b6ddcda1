pub mod browser;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;

pub use browser::{
    AuthOutcome, Authenticator, BlockReason, ChromiumSessionFactory, Humanizer, Identity,
    ScrapeError, ScrapeResult, ScrapeSession, SessionFactory, SessionLauncher, SessionState,
    SessionStore, StoredCookie,
};
pub use config::{load_scraper_config, AuthSection, ScraperConfig};
pub use error::ConfigError;
pub use extract::{extract_product_details, extract_reviews, ProductDetails, ReviewRecord};
pub use pipeline::{
    BatchOptions, BatchReport, ExtractionResult, ProductRecord, ProductReport, ProductTarget,
    ReviewSource, ScrapeCoordinator, TerminalReason,
};
