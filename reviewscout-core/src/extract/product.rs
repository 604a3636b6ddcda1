use scraper::Html;

use super::cascade::{parse_decimal, resolve_document, Candidate, TextFilter};

/// Structured fields pulled from one product detail page. Every field is a
/// best-effort cascade resolution; misses are empty/absent, never errors.
#[derive(Debug, Clone, Default)]
pub struct ProductDetails {
    pub title: String,
    pub price: String,
    pub rating: Option<f64>,
    pub review_count: String,
}

const TITLE_CASCADE: &[Candidate] = &[
    Candidate {
        selector: "#productTitle",
        filter: TextFilter::Any,
    },
    Candidate {
        selector: "#title",
        filter: TextFilter::Any,
    },
    Candidate {
        selector: ".a-size-large.product-title-word-break",
        filter: TextFilter::Any,
    },
    Candidate {
        selector: "h1.a-size-large",
        filter: TextFilter::Any,
    },
];

const PRICE_CASCADE: &[Candidate] = &[
    Candidate {
        selector: ".a-price .a-offscreen",
        filter: TextFilter::Currency,
    },
    Candidate {
        selector: "#priceblock_ourprice",
        filter: TextFilter::Currency,
    },
    Candidate {
        selector: "#priceblock_dealprice",
        filter: TextFilter::Currency,
    },
    Candidate {
        selector: "#corePrice_feature_div .a-price .a-offscreen",
        filter: TextFilter::Currency,
    },
    Candidate {
        selector: "#corePriceDisplay_desktop_feature_div .a-price-whole",
        filter: TextFilter::Currency,
    },
    Candidate {
        selector: "#snsPrice .a-price .a-offscreen",
        filter: TextFilter::Currency,
    },
    Candidate {
        selector: ".apexPriceToPay .a-offscreen",
        filter: TextFilter::Currency,
    },
    Candidate {
        selector: ".a-color-price",
        filter: TextFilter::Currency,
    },
];

const RATING_CASCADE: &[Candidate] = &[
    Candidate {
        selector: "#acrPopover .a-icon-alt",
        filter: TextFilter::Decimal,
    },
    Candidate {
        selector: ".a-icon-star-small .a-icon-alt",
        filter: TextFilter::Decimal,
    },
    Candidate {
        selector: ".a-icon-star .a-icon-alt",
        filter: TextFilter::Decimal,
    },
    Candidate {
        selector: "#averageCustomerReviews .a-icon-alt",
        filter: TextFilter::Decimal,
    },
    Candidate {
        selector: ".review-rating",
        filter: TextFilter::Decimal,
    },
];

const REVIEW_COUNT_CASCADE: &[Candidate] = &[
    Candidate {
        selector: "#acrCustomerReviewText",
        filter: TextFilter::Count,
    },
    Candidate {
        selector: "#acrCustomerReviewLink",
        filter: TextFilter::Count,
    },
    Candidate {
        selector: "a[href*='customerReviews']",
        filter: TextFilter::Count,
    },
    Candidate {
        selector: "[data-cy='reviews-ratings-count']",
        filter: TextFilter::Count,
    },
];

pub fn extract_product_details(html: &str) -> ProductDetails {
    let document = Html::parse_document(html);
    let rating_text = resolve_document(&document, RATING_CASCADE);
    ProductDetails {
        title: resolve_document(&document, TITLE_CASCADE),
        price: resolve_document(&document, PRICE_CASCADE),
        rating: parse_decimal(&rating_text),
        review_count: resolve_document(&document, REVIEW_COUNT_CASCADE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_all_fields_from_detail_page() {
        let html = r#"<html><body>
            <span id="productTitle"> Widget Deluxe, 2-pack </span>
            <span class="a-price"><span class="a-offscreen">$19.99</span></span>
            <div id="acrPopover"><span class="a-icon-alt">4.5 out of 5 stars</span></div>
            <span id="acrCustomerReviewText">1,234 ratings</span>
        </body></html>"#;
        let details = extract_product_details(html);
        assert_eq!(details.title, "Widget Deluxe, 2-pack");
        assert_eq!(details.price, "$19.99");
        assert_eq!(details.rating, Some(4.5));
        assert_eq!(details.review_count, "1,234");
    }

    #[test]
    fn price_without_currency_marker_is_rejected() {
        let html = r#"<html><body>
            <span class="a-price"><span class="a-offscreen">19.99</span></span>
            <span class="a-color-price">CDN$ 24.99</span>
        </body></html>"#;
        let details = extract_product_details(html);
        assert_eq!(details.price, "CDN$ 24.99");
    }

    #[test]
    fn nth_candidate_is_honored() {
        let first = extract_product_details(
            r#"<html><body><span id="productTitle">From Primary</span></body></html>"#,
        );
        assert_eq!(first.title, "From Primary");

        let fallback = extract_product_details(
            r#"<html><body><h1 class="a-size-large">From Fallback</h1></body></html>"#,
        );
        assert_eq!(fallback.title, "From Fallback");
    }

    #[test]
    fn missing_fields_resolve_to_empty_or_absent() {
        let details = extract_product_details("<html><body><p>bare page</p></body></html>");
        assert_eq!(details.title, "");
        assert_eq!(details.price, "");
        assert_eq!(details.rating, None);
        assert_eq!(details.review_count, "");
    }
}
