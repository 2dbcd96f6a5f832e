//! HTML parser for category index and listing pages
//!
//! This module handles parsing HTML content to extract:
//! - The category taxonomy from the index sidebar
//! - Item detail links from a listing page
//! - The "next page" link of a listing page
//!
//! All links are resolved against the URL of the page they were found on.

use crate::url::{listing_path, resolve_link};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

const CATEGORY_LINK_SELECTOR: &str = "div.side_categories ul.nav-list li ul li a[href]";
const ITEM_LINK_SELECTOR: &str = "article.product_pod h3 a[href]";
const NEXT_LINK_SELECTOR: &str = "li.next a[href]";

/// A category found on the index page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCategory {
    /// Trimmed display name
    pub name: String,

    /// Site-relative listing path (path plus query)
    pub listing_path: String,
}

/// Extracted information from a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    /// Absolute item detail URLs, in page order
    pub item_urls: Vec<Url>,

    /// Absolute URL of the next listing page, if any
    pub next_url: Option<Url>,
}

/// Parses the category sidebar of the index page
///
/// Entries with an empty name or an unresolvable href are dropped. A name
/// that appears twice keeps its first link.
///
/// # Example
///
/// ```
/// use catalog_crawler::crawler::parse_category_index;
/// use url::Url;
///
/// let html = r##"<div class="side_categories"><ul class="nav-list"><li><a href="#">Books</a>
///   <ul><li><a href="catalogue/category/books/travel_2/index.html"> Travel </a></li></ul>
/// </li></ul></div>"##;
/// let page = Url::parse("https://books.example.com/index.html").unwrap();
/// let categories = parse_category_index(html, &page);
/// assert_eq!(categories[0].name, "Travel");
/// assert_eq!(categories[0].listing_path, "/catalogue/category/books/travel_2/index.html");
/// ```
pub fn parse_category_index(html: &str, page_url: &Url) -> Vec<DiscoveredCategory> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut categories = Vec::new();

    let Ok(selector) = Selector::parse(CATEGORY_LINK_SELECTOR) else {
        return categories;
    };

    for element in document.select(&selector) {
        let name = element.text().collect::<String>().trim().to_string();
        if name.is_empty() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Some(absolute) = resolve_link(href, page_url) else {
            tracing::debug!("Skipping category '{}' with unusable href '{}'", name, href);
            continue;
        };

        if seen.insert(name.clone()) {
            categories.push(DiscoveredCategory {
                name,
                listing_path: listing_path(&absolute),
            });
        }
    }

    categories
}

/// Parses a listing page into its item links and next-page link
///
/// # Arguments
///
/// * `html` - The listing page body
/// * `page_url` - The URL the listing page was fetched from
pub fn parse_listing_page(html: &str, page_url: &Url) -> ListingPage {
    let document = Html::parse_document(html);

    let item_urls = Selector::parse(ITEM_LINK_SELECTOR)
        .map(|selector| {
            document
                .select(&selector)
                .filter_map(|element| element.value().attr("href"))
                .filter_map(|href| resolve_link(href, page_url))
                .collect()
        })
        .unwrap_or_default();

    let next_url = Selector::parse(NEXT_LINK_SELECTOR).ok().and_then(|selector| {
        document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .find_map(|href| resolve_link(href, page_url))
    });

    ListingPage {
        item_urls,
        next_url,
    }
}
