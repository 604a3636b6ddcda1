mod cascade;
mod product;
mod review;

pub use cascade::{apply_filter, parse_decimal, resolve_document, resolve_fragment, Candidate, TextFilter};
pub use product::{extract_product_details, ProductDetails};
pub use review::{extract_reviews, ReviewRecord};
