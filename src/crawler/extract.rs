//! Detail page extraction
//!
//! Maps an item detail page to an [`ExtractedBook`]. The category comes from
//! the breadcrumb trail and is optional at this stage; only a book with a
//! category can be turned into a storable [`BookRecord`].

use crate::storage::BookRecord;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// Breadcrumb segments expected on a detail page: Home, Books, Category, Title
const BREADCRUMB_SEGMENTS: usize = 4;

/// Position of the category inside the breadcrumb
const BREADCRUMB_CATEGORY_INDEX: usize = 2;

/// Errors raised while extracting a detail page
///
/// All of these are content defects; refetching the same page will not fix
/// them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    #[error("required field '{0}' not found")]
    MissingField(&'static str),

    #[error("malformed price '{0}'")]
    MalformedPrice(String),
}

/// Fields read from a detail page
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedBook {
    pub title: String,
    pub price: f64,
    pub upc: String,
    pub product_type: Option<String>,
    pub availability: String,
    pub number_of_reviews: Option<u32>,
    pub description: String,
    /// Absent when the breadcrumb is shorter than expected
    pub category_name: Option<String>,
    pub url: String,
}

impl ExtractedBook {
    /// Converts into a storable record, or None when the category is absent
    pub fn into_record(self) -> Option<BookRecord> {
        let category_name = self.category_name?;
        Some(BookRecord {
            title: self.title,
            price: self.price,
            upc: self.upc,
            product_type: self.product_type,
            availability: self.availability,
            number_of_reviews: self.number_of_reviews,
            description: self.description,
            category_name,
            url: self.url,
        })
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = selector(css)?;
    document
        .select(&selector)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
}

fn all_text(document: &Html, css: &str) -> Vec<String> {
    selector(css)
        .map(|selector| document.select(&selector).map(element_text).collect())
        .unwrap_or_default()
}

/// Currency symbols accepted in front of a price
const CURRENCY_SYMBOLS: &[char] = &['£', '$', '€'];

/// Parses a price such as `£51.77` or `£1,299.00`
///
/// A leading currency symbol, surrounding whitespace and thousands
/// separators are dropped. What remains must be an unsigned decimal number;
/// anything else is [`ExtractError::MalformedPrice`].
pub fn parse_price(raw: &str) -> Result<f64, ExtractError> {
    let malformed = || ExtractError::MalformedPrice(raw.to_string());

    let amount: String = raw
        .trim()
        .trim_start_matches(CURRENCY_SYMBOLS)
        .trim_start()
        .chars()
        .filter(|c| *c != ',')
        .collect();

    let well_formed = amount.chars().any(|c| c.is_ascii_digit())
        && amount.chars().all(|c| c.is_ascii_digit() || c == '.')
        && amount.matches('.').count() <= 1;
    if !well_formed {
        return Err(malformed());
    }

    amount
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .ok_or_else(malformed)
}

/// Extracts a book from a detail page
///
/// # Arguments
///
/// * `html` - The detail page body
/// * `page_url` - The URL the page was fetched from (stored as the source URL)
///
/// # Returns
///
/// * `Ok(ExtractedBook)` - All required fields present; category may be absent
/// * `Err(ExtractError)` - Title, price or UPC missing, or the price is malformed
pub fn extract_book(html: &str, page_url: &Url) -> Result<ExtractedBook, ExtractError> {
    let document = Html::parse_document(html);

    let title =
        first_text(&document, "div.product_main h1").ok_or(ExtractError::MissingField("title"))?;

    let raw_price = first_text(&document, "div.product_main p.price_color")
        .ok_or(ExtractError::MissingField("price"))?;
    let price = parse_price(&raw_price)?;

    let mut upc = None;
    let mut product_type = None;
    let mut availability = None;
    let mut number_of_reviews = None;

    if let (Some(rows), Some(th), Some(td)) =
        (selector("table tr"), selector("th"), selector("td"))
    {
        for row in document.select(&rows) {
            let (Some(label), Some(value)) = (row.select(&th).next(), row.select(&td).next())
            else {
                continue;
            };
            let value = element_text(value);

            match element_text(label).as_str() {
                "UPC" => upc = Some(value),
                "Product Type" => product_type = Some(value),
                "Availability" => availability = Some(value),
                "Number of reviews" => match value.parse::<u32>() {
                    Ok(n) => number_of_reviews = Some(n),
                    Err(_) => {
                        tracing::warn!(url = %page_url, "Unparseable review count '{}'", value);
                    }
                },
                _ => {}
            }
        }
    }

    let upc = upc
        .filter(|u| !u.is_empty())
        .ok_or(ExtractError::MissingField("upc"))?;

    let description = first_text(&document, "#product_description + p").unwrap_or_default();

    let breadcrumb = all_text(&document, "ul.breadcrumb li");
    let category_name = if breadcrumb.len() >= BREADCRUMB_SEGMENTS {
        Some(breadcrumb[BREADCRUMB_CATEGORY_INDEX].clone()).filter(|c| !c.is_empty())
    } else {
        None
    };

    Ok(ExtractedBook {
        title,
        price,
        upc,
        product_type,
        availability: availability.unwrap_or_default(),
        number_of_reviews,
        description,
        category_name,
        url: page_url.to_string(),
    })
}
