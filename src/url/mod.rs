//! URL helpers for the crawl engine
//!
//! Every link found on a page is resolved against the URL of the page it was
//! found on. Relative hrefs on catalog sites are routinely `../../` chains, so
//! nothing here assumes a fixed directory layout.

use url::Url;

/// Resolves a link href to an absolute http(s) URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only hrefs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
///
/// # Examples
///
/// ```
/// use catalog_crawler::url::resolve_link;
/// use url::Url;
///
/// let page = Url::parse("https://books.example.com/catalogue/category/books/travel_2/index.html").unwrap();
/// let item = resolve_link("../../../its-only-the-himalayas_981/index.html", &page).unwrap();
/// assert_eq!(item.as_str(), "https://books.example.com/catalogue/its-only-the-himalayas_981/index.html");
/// ```
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url)
        }
        _ => None,
    }
}

/// Key used to recognize a listing page that was already visited
///
/// Fragments never change the fetched document, so they are dropped.
pub fn visit_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_fragment(None);
    key.to_string()
}

/// The site-relative listing path stored for a category (path plus query)
pub fn listing_path(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}
