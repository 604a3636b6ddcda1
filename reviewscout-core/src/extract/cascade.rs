use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Validation applied to a candidate's matched text before it is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFilter {
    /// Any non-empty trimmed text.
    Any,
    /// Text must carry a currency marker; returned verbatim.
    Currency,
    /// The first decimal number found in the text.
    Decimal,
    /// The first digit/comma run found in the text.
    Count,
}

/// One entry of an ordered field cascade: a CSS locator plus the validation
/// its match must pass.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub selector: &'static str,
    pub filter: TextFilter,
}

const CURRENCY_MARKERS: &[&str] = &["$", "€", "£", "CDN", "USD", "EUR", "GBP"];

fn decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid decimal pattern"))
}

fn count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\d,]*\d[\d,]*").expect("valid count pattern"))
}

/// Resolve a field against a whole document: the first candidate whose first
/// match validates wins. A full miss is an empty string, never an error.
pub fn resolve_document(document: &Html, cascade: &[Candidate]) -> String {
    for candidate in cascade {
        let Ok(selector) = Selector::parse(candidate.selector) else {
            debug!(selector = candidate.selector, "skipping unparseable selector");
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            if let Some(value) = validate(element, candidate.filter) {
                return value;
            }
        }
    }
    String::new()
}

/// Same resolution scoped to one element subtree (e.g. a review block).
pub fn resolve_fragment(fragment: ElementRef<'_>, cascade: &[Candidate]) -> String {
    for candidate in cascade {
        let Ok(selector) = Selector::parse(candidate.selector) else {
            debug!(selector = candidate.selector, "skipping unparseable selector");
            continue;
        };
        if let Some(element) = fragment.select(&selector).next() {
            if let Some(value) = validate(element, candidate.filter) {
                return value;
            }
        }
    }
    String::new()
}

fn validate(element: ElementRef<'_>, filter: TextFilter) -> Option<String> {
    let text = element.text().collect::<String>();
    apply_filter(&text, filter)
}

pub fn apply_filter(text: &str, filter: TextFilter) -> Option<String> {
    let trimmed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if trimmed.is_empty() {
        return None;
    }
    match filter {
        TextFilter::Any => Some(trimmed),
        TextFilter::Currency => CURRENCY_MARKERS
            .iter()
            .any(|marker| trimmed.contains(marker))
            .then_some(trimmed),
        TextFilter::Decimal => decimal_re()
            .find(&trimmed)
            .map(|m| m.as_str().to_string()),
        TextFilter::Count => count_re().find(&trimmed).map(|m| m.as_str().to_string()),
    }
}

/// Parse the leading decimal out of already-resolved text, for fields that
/// need a numeric reading (product rating).
pub fn parse_decimal(text: &str) -> Option<f64> {
    decimal_re().find(text).and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_validated_candidate_wins() {
        let html = Html::parse_document(
            r#"<html><body>
                <span class="primary"></span>
                <span class="secondary">Widget Deluxe</span>
                <span class="tertiary">Widget Basic</span>
            </body></html>"#,
        );
        let cascade = [
            Candidate {
                selector: ".primary",
                filter: TextFilter::Any,
            },
            Candidate {
                selector: ".secondary",
                filter: TextFilter::Any,
            },
            Candidate {
                selector: ".tertiary",
                filter: TextFilter::Any,
            },
        ];
        assert_eq!(resolve_document(&html, &cascade), "Widget Deluxe");
    }

    #[test]
    fn invalid_match_falls_through_to_later_candidate() {
        let html = Html::parse_document(
            r#"<html><body>
                <span class="price-whole">29</span>
                <span class="offscreen">$29.99</span>
            </body></html>"#,
        );
        let cascade = [
            Candidate {
                selector: ".price-whole",
                filter: TextFilter::Currency,
            },
            Candidate {
                selector: ".offscreen",
                filter: TextFilter::Currency,
            },
        ];
        assert_eq!(resolve_document(&html, &cascade), "$29.99");
    }

    #[test]
    fn full_miss_resolves_to_empty() {
        let html = Html::parse_document("<html><body><p>nothing here</p></body></html>");
        let cascade = [Candidate {
            selector: ".absent",
            filter: TextFilter::Any,
        }];
        assert_eq!(resolve_document(&html, &cascade), "");
    }

    #[test]
    fn decimal_filter_extracts_leading_number() {
        assert_eq!(
            apply_filter("4.5 out of 5 stars", TextFilter::Decimal),
            Some("4.5".to_string())
        );
        assert_eq!(
            apply_filter("Rated 3 stars", TextFilter::Decimal),
            Some("3".to_string())
        );
        assert_eq!(apply_filter("no numbers", TextFilter::Decimal), None);
    }

    #[test]
    fn count_filter_keeps_digits_and_commas() {
        assert_eq!(
            apply_filter("12,847 ratings", TextFilter::Count),
            Some("12,847".to_string())
        );
        assert_eq!(apply_filter("ratings", TextFilter::Count), None);
    }

    #[test]
    fn parse_decimal_handles_rating_phrases() {
        assert_eq!(parse_decimal("4.5"), Some(4.5));
        assert_eq!(parse_decimal("4.5 out of 5 stars"), Some(4.5));
        assert_eq!(parse_decimal(""), None);
    }
}
