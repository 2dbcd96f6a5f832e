//! Integration tests for the crawler
//!
//! The HTTP fetcher and full runs are exercised against wiremock servers.
//! Engine properties that need precise control over responses use an
//! in-memory site instead.

use async_trait::async_trait;
use catalog_crawler::config::{Config, CrawlerConfig, OutputConfig, SiteConfig};
use catalog_crawler::CrawlerError;
use catalog_crawler::crawler::{
    flush_batch, run_crawl, Coordinator, Exhaustion, FetchError, FetchErrorKind, FetchedPage,
    HttpFetcher, ListingWalker, PageFetcher,
};
use catalog_crawler::storage::{
    BookRecord, BookRow, CategoryRecord, CategoryUpsert, InsertOutcome, RunRecord, RunStatus,
    RunTotals, SqliteStorage, Storage, StorageError, StorageResult,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ===== Page builders =====

fn index_html(categories: &[(&str, &str)]) -> String {
    let links: String = categories
        .iter()
        .map(|(name, href)| format!(r#"<li><a href="{}">{}</a></li>"#, href, name))
        .collect();
    format!(
        r#"<html><body><div class="side_categories"><ul class="nav-list">
        <li><a href="/catalogue/category/books_1/index.html">Books</a><ul>{}</ul></li>
        </ul></div></body></html>"#,
        links
    )
}

fn listing_html(items: &[&str], next: Option<&str>) -> String {
    let mut html = String::from("<html><body><ol class=\"row\">");
    for item in items {
        html.push_str(&format!(
            r#"<li><article class="product_pod"><h3><a href="{}">item</a></h3></article></li>"#,
            item
        ));
    }
    html.push_str("</ol>");
    if let Some(next) = next {
        html.push_str(&format!(
            r#"<ul class="pager"><li class="next"><a href="{}">next</a></li></ul>"#,
            next
        ));
    }
    html.push_str("</body></html>");
    html
}

fn detail_html(upc: &str, category: Option<&str>) -> String {
    let breadcrumb = match category {
        Some(category) => format!(
            r#"<li><a href="/index.html">Home</a></li><li><a href="/books">Books</a></li>
            <li><a href="/cat">{}</a></li><li class="active">Book {}</li>"#,
            category, upc
        ),
        None => format!(
            r#"<li><a href="/index.html">Home</a></li><li class="active">Book {}</li>"#,
            upc
        ),
    };
    format!(
        r#"<html><body><ul class="breadcrumb">{}</ul>
        <div class="product_main"><h1>Book {}</h1><p class="price_color">£23.88</p></div>
        <div id="product_description"><h2>Product Description</h2></div><p>About book {}.</p>
        <table class="table table-striped">
          <tr><th>UPC</th><td>{}</td></tr>
          <tr><th>Product Type</th><td>Books</td></tr>
          <tr><th>Availability</th><td>In stock (3 available)</td></tr>
          <tr><th>Number of reviews</th><td>2</td></tr>
        </table></body></html>"#,
        breadcrumb, upc, upc, upc
    )
}

fn book(upc: &str, price: f64) -> BookRecord {
    BookRecord {
        title: format!("Book {}", upc),
        price,
        upc: upc.to_string(),
        product_type: None,
        availability: "In stock".to_string(),
        number_of_reviews: None,
        description: String::new(),
        category_name: "Travel".to_string(),
        url: format!("https://books.example.com/{}", upc),
    }
}

/// Creates a test configuration with no pacing delays
fn create_test_config(base_url: &str, db_path: &Path) -> Config {
    Config {
        site: SiteConfig {
            base_url: base_url.to_string(),
            start_path: "/".to_string(),
        },
        crawler: CrawlerConfig {
            item_delay_min_ms: 0,
            item_delay_max_ms: 0,
            page_delay_min_ms: 0,
            page_delay_max_ms: 0,
            ..Default::default()
        },
        output: OutputConfig {
            database_path: db_path.to_string_lossy().into_owned(),
        },
        ..Default::default()
    }
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

// ===== In-memory collaborators =====

/// Serves bodies by path; unknown paths answer NotFound
#[derive(Default)]
struct ScriptedSite {
    pages: HashMap<String, String>,
    log: Mutex<Vec<String>>,
}

impl ScriptedSite {
    fn with_page(mut self, page_path: &str, body: String) -> Self {
        self.pages.insert(page_path.to_string(), body);
        self
    }

    fn fetches_of(&self, page_path: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|p| *p == page_path)
            .count()
    }
}

#[async_trait]
impl PageFetcher for ScriptedSite {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        self.log.lock().unwrap().push(url.path().to_string());
        match self.pages.get(url.path()) {
            Some(body) => Ok(FetchedPage {
                url: url.clone(),
                body: body.clone(),
            }),
            None => Err(FetchError::new(FetchErrorKind::NotFound, url, "HTTP 404")),
        }
    }
}

/// SQLite storage whose Nth batch insert fails
struct FailingStorage {
    inner: SqliteStorage,
    fail_on_batch: usize,
    batches: usize,
}

impl Storage for FailingStorage {
    fn upsert_category(&mut self, name: &str, listing_path: &str) -> StorageResult<CategoryUpsert> {
        self.inner.upsert_category(name, listing_path)
    }

    fn list_categories(&self) -> StorageResult<Vec<CategoryRecord>> {
        self.inner.list_categories()
    }

    fn get_category_by_name(&self, name: &str) -> StorageResult<Option<CategoryRecord>> {
        self.inner.get_category_by_name(name)
    }

    fn count_categories(&self) -> StorageResult<u64> {
        self.inner.count_categories()
    }

    fn insert_books(&mut self, books: &[BookRecord]) -> StorageResult<Vec<InsertOutcome>> {
        self.batches += 1;
        if self.batches == self.fail_on_batch {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.insert_books(books)
    }

    fn list_books(&self) -> StorageResult<Vec<BookRow>> {
        self.inner.list_books()
    }

    fn get_book_by_upc(&self, upc: &str) -> StorageResult<Option<BookRow>> {
        self.inner.get_book_by_upc(upc)
    }

    fn list_books_by_category(&self, category_name: &str) -> StorageResult<Vec<BookRow>> {
        self.inner.list_books_by_category(category_name)
    }

    fn count_books(&self) -> StorageResult<u64> {
        self.inner.count_books()
    }

    fn count_books_by_category(&self, category_name: &str) -> StorageResult<u64> {
        self.inner.count_books_by_category(category_name)
    }

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        self.inner.create_run(config_hash)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus, totals: &RunTotals) -> StorageResult<()> {
        self.inner.finish_run(run_id, status, totals)
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.inner.get_run(run_id)
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        self.inner.get_latest_run()
    }
}

fn quiet_crawler_config() -> CrawlerConfig {
    CrawlerConfig {
        item_delay_min_ms: 0,
        item_delay_max_ms: 0,
        page_delay_min_ms: 0,
        page_delay_max_ms: 0,
        ..Default::default()
    }
}

// ===== HTTP fetcher =====

#[tokio::test]
async fn test_http_fetcher_returns_body() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/index.html", "<html>hello</html>".to_string()).await;

    let fetcher = HttpFetcher::new(&Config::default()).unwrap();
    let url = Url::parse(&format!("{}/index.html", mock_server.uri())).unwrap();
    let page = fetcher.fetch(&url).await.unwrap();

    assert_eq!(page.body, "<html>hello</html>");
    assert_eq!(page.url, url);
}

#[tokio::test]
async fn test_http_fetcher_classifies_status_codes() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new(&Config::default()).unwrap();

    let missing = Url::parse(&format!("{}/missing", mock_server.uri())).unwrap();
    let err = fetcher.fetch(&missing).await.unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::NotFound);
    assert!(err.is_transient());

    let broken = Url::parse(&format!("{}/broken", mock_server.uri())).unwrap();
    let err = fetcher.fetch(&broken).await.unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Other);
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_http_fetcher_timeout() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let mut config = Config::default();
    config.crawler.fetch_timeout_secs = 1;
    let fetcher = HttpFetcher::new(&config).unwrap();

    let url = Url::parse(&format!("{}/slow", mock_server.uri())).unwrap();
    let err = fetcher.fetch(&url).await.unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Timeout);
}

#[tokio::test]
async fn test_http_fetcher_connection_refused() {
    let fetcher = HttpFetcher::new(&Config::default()).unwrap();
    let url = Url::parse("http://127.0.0.1:1/").unwrap();
    let err = fetcher.fetch(&url).await.unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::ConnectionClosed);
}

// ===== Full runs over HTTP =====

#[tokio::test]
async fn test_end_to_end_category_scenario() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("catalog.db");

    mount_page(
        &mock_server,
        "/",
        index_html(&[("Travel", "catalogue/category/books/travel_2/index.html")]),
    )
    .await;
    mount_page(
        &mock_server,
        "/catalogue/category/books/travel_2/index.html",
        listing_html(
            &["/catalogue/a_1/index.html", "/catalogue/b_2/index.html", "/catalogue/orphan_3/index.html"],
            Some("page-2.html"),
        ),
    )
    .await;
    mount_page(
        &mock_server,
        "/catalogue/category/books/travel_2/page-2.html",
        listing_html(&["/catalogue/a-reprint_4/index.html"], None),
    )
    .await;
    mount_page(&mock_server, "/catalogue/a_1/index.html", detail_html("upc-a", Some("Travel"))).await;
    mount_page(&mock_server, "/catalogue/b_2/index.html", detail_html("upc-b", Some("Travel"))).await;
    mount_page(&mock_server, "/catalogue/orphan_3/index.html", detail_html("upc-o", None)).await;
    mount_page(
        &mock_server,
        "/catalogue/a-reprint_4/index.html",
        detail_html("upc-a", Some("Travel")),
    )
    .await;

    let config = create_test_config(&mock_server.uri(), &db_path);
    let summary = run_crawl(&config, "test-hash", None).await.expect("crawl failed");

    assert_eq!(summary.categories.len(), 1);
    let travel = &summary.categories[0];
    assert_eq!(travel.category, "Travel");
    assert_eq!(travel.pages_visited, 2);
    assert_eq!(travel.inserted, 2);
    assert_eq!(travel.duplicates, 1);
    assert_eq!(travel.skipped, 1);
    assert_eq!(travel.errored, 0);
    assert_eq!(travel.exhaustion, Exhaustion::NoNextPage);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_books().unwrap(), 2);
    assert!(storage.get_book_by_upc("upc-o").unwrap().is_none());

    let stored = storage.get_book_by_upc("upc-a").unwrap().unwrap();
    assert_eq!(stored.book.url, format!("{}/catalogue/a_1/index.html", mock_server.uri()));
    assert_eq!(stored.book.price, 23.88);
    assert_eq!(stored.book.number_of_reviews, Some(2));
    assert_eq!(stored.book.description, "About book upc-a.");

    let categories = storage.list_categories().unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].listing_path, "/catalogue/category/books/travel_2/index.html");

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!((run.inserted, run.duplicates, run.skipped), (2, 1, 1));
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("catalog.db");

    mount_page(
        &mock_server,
        "/",
        index_html(&[("Poetry", "/poetry/index.html"), ("History", "/history/index.html")]),
    )
    .await;
    mount_page(&mock_server, "/poetry/index.html", listing_html(&["/p/1", "/p/2"], Some("page-2.html"))).await;
    mount_page(&mock_server, "/poetry/page-2.html", listing_html(&["/p/3"], None)).await;
    mount_page(&mock_server, "/history/index.html", listing_html(&["/h/1"], None)).await;
    mount_page(&mock_server, "/p/1", detail_html("p1", Some("Poetry"))).await;
    mount_page(&mock_server, "/p/2", detail_html("p2", Some("Poetry"))).await;
    mount_page(&mock_server, "/p/3", detail_html("p3", Some("Poetry"))).await;
    mount_page(&mock_server, "/h/1", detail_html("h1", Some("History"))).await;

    let config = create_test_config(&mock_server.uri(), &db_path);
    let first = run_crawl(&config, "h", None).await.unwrap();
    let second = run_crawl(&config, "h", None).await.unwrap();

    assert_eq!(first.totals.inserted, 4);
    assert_eq!(second.totals.inserted, 0);
    assert_eq!(second.totals.duplicates, first.totals.inserted);
    for (a, b) in first.categories.iter().zip(&second.categories) {
        assert_eq!(a.category, b.category);
        assert_eq!(b.inserted, 0);
        assert_eq!(b.duplicates, a.inserted);
    }

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_books().unwrap(), 4);
    assert_eq!(storage.count_categories().unwrap(), 2);
}

#[tokio::test]
async fn test_single_category_run_over_http() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("catalog.db");

    mount_page(
        &mock_server,
        "/",
        index_html(&[("Poetry", "/poetry/index.html"), ("History", "/history/index.html")]),
    )
    .await;
    mount_page(&mock_server, "/poetry/index.html", listing_html(&["/p/1", "/p/2"], None)).await;
    mount_page(&mock_server, "/p/1", detail_html("p1", Some("Poetry"))).await;
    mount_page(&mock_server, "/p/2", detail_html("p2", Some("Poetry"))).await;
    Mock::given(method("GET"))
        .and(path("/history/index.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(&["/h/1"], None)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), &db_path);
    let summary = run_crawl(&config, "h", Some("Poetry")).await.unwrap();

    assert_eq!(summary.categories.len(), 1);
    assert_eq!(summary.totals.inserted, 2);

    let unknown = run_crawl(&config, "h", Some("Horror")).await;
    assert!(matches!(unknown, Err(CrawlerError::UnknownCategory(_))));

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_categories().unwrap(), 2);
    let poetry: Vec<_> = storage
        .list_books_by_category("Poetry")
        .unwrap()
        .into_iter()
        .map(|row| row.book.upc)
        .collect();
    assert_eq!(poetry, vec!["p1", "p2"]);
    assert_eq!(storage.count_books_by_category("History").unwrap(), 0);
    assert_eq!(
        storage.get_latest_run().unwrap().unwrap().status,
        RunStatus::Failed
    );
    mock_server.verify().await;
}

#[tokio::test]
async fn test_retry_bound_over_http() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("catalog.db");

    mount_page(&mock_server, "/", index_html(&[("Travel", "/travel/index.html")])).await;

    // one initial load plus one reload before each of the two retries
    Mock::given(method("GET"))
        .and(path("/travel/index.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(&["/gone"], None)))
        .expect(3)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), &db_path);
    let summary = run_crawl(&config, "h", None).await.unwrap();

    assert_eq!(summary.totals.errored, 1);
    assert_eq!(summary.totals.inserted, 0);
    mock_server.verify().await;
}

#[tokio::test]
async fn test_unreachable_start_page_still_closes_cleanly() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("catalog.db");

    let config = create_test_config(&mock_server.uri(), &db_path);
    let summary = run_crawl(&config, "h", None).await.unwrap();

    assert!(summary.categories.is_empty());
    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(
        storage.get_latest_run().unwrap().unwrap().status,
        RunStatus::Completed
    );
}

// ===== Engine properties =====

#[tokio::test]
async fn test_category_upsert_across_runs() {
    let config = create_test_config("https://books.example.com/", Path::new(":memory:"));
    let mut storage = SqliteStorage::new_in_memory().unwrap();

    for listing in ["/old/index.html", "/new/index.html"] {
        let site = ScriptedSite::default()
            .with_page("/", index_html(&[("Travel", listing), ("Poetry", "/poetry/index.html")]));
        let mut coordinator = Coordinator::new(&config, site, storage).unwrap();
        coordinator.discover_categories().await;
        storage = coordinator.into_storage();
    }

    let categories = storage.list_categories().unwrap();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0].name, "Travel");
    assert_eq!(categories[0].listing_path, "/new/index.html");
}

#[tokio::test]
async fn test_failed_batch_leaves_earlier_pages_committed() {
    let site = ScriptedSite::default()
        .with_page("/cat/index.html", listing_html(&["/i/1", "/i/2"], Some("page-2.html")))
        .with_page("/cat/page-2.html", listing_html(&["/i/3", "/i/4"], Some("page-3.html")))
        .with_page("/cat/page-3.html", listing_html(&["/i/5"], None))
        .with_page("/i/1", detail_html("1", Some("Travel")))
        .with_page("/i/2", detail_html("2", Some("Travel")))
        .with_page("/i/3", detail_html("3", Some("Travel")))
        .with_page("/i/4", detail_html("4", Some("Travel")))
        .with_page("/i/5", detail_html("5", Some("Travel")));
    let mut storage = FailingStorage {
        inner: SqliteStorage::new_in_memory().unwrap(),
        fail_on_batch: 2,
        batches: 0,
    };

    let start = Url::parse("https://books.example.com/cat/index.html").unwrap();
    let report = ListingWalker::new(&site, &quiet_crawler_config())
        .walk(&mut storage, "Travel", start)
        .await;

    assert_eq!(report.pages_visited, 3);
    assert_eq!(report.failed_flushes, 1);
    assert_eq!(report.inserted, 3);
    assert_eq!(report.exhaustion, Exhaustion::NoNextPage);

    let upcs: Vec<_> = storage
        .list_books()
        .unwrap()
        .into_iter()
        .map(|row| row.book.upc)
        .collect();
    assert_eq!(upcs, vec!["1", "2", "5"]);
}

#[tokio::test]
async fn test_storage_error_rolls_back_whole_batch() {
    let mut storage = SqliteStorage::new_in_memory().unwrap();

    let first = flush_batch(&mut storage, "page-1", &[book("a", 1.0), book("b", 2.0)]);
    assert!(first.committed);

    let second = flush_batch(
        &mut storage,
        "page-2",
        &[book("c", 3.0), book("d", -1.0), book("e", 5.0)],
    );
    assert!(!second.committed);
    assert_eq!((second.inserted, second.duplicates), (0, 0));

    assert_eq!(storage.count_books().unwrap(), 2);
    assert!(storage.get_book_by_upc("c").unwrap().is_none());
}

#[tokio::test]
async fn test_walker_fetch_cycles_match_page_count() {
    let site = ScriptedSite::default()
        .with_page("/cat/index.html", listing_html(&["/i/1"], Some("page-2.html")))
        .with_page("/cat/page-2.html", listing_html(&["/i/2"], Some("page-3.html")))
        .with_page("/cat/page-3.html", listing_html(&["/i/3"], Some("page-4.html")))
        .with_page("/cat/page-4.html", listing_html(&["/i/4"], None))
        .with_page("/i/1", detail_html("1", Some("Travel")))
        .with_page("/i/2", detail_html("2", Some("Travel")))
        .with_page("/i/3", detail_html("3", Some("Travel")))
        .with_page("/i/4", detail_html("4", Some("Travel")));
    let mut storage = SqliteStorage::new_in_memory().unwrap();

    let start = Url::parse("https://books.example.com/cat/index.html").unwrap();
    let report = ListingWalker::new(&site, &quiet_crawler_config())
        .walk(&mut storage, "Travel", start)
        .await;

    assert_eq!(report.pages_visited, 4);
    for listing in ["/cat/index.html", "/cat/page-2.html", "/cat/page-3.html", "/cat/page-4.html"] {
        assert_eq!(site.fetches_of(listing), 1);
    }
}

#[tokio::test]
async fn test_walker_stops_on_empty_first_page() {
    let site = ScriptedSite::default()
        .with_page("/cat/index.html", listing_html(&[], Some("page-2.html")))
        .with_page("/cat/page-2.html", listing_html(&["/i/1"], None));
    let mut storage = SqliteStorage::new_in_memory().unwrap();

    let start = Url::parse("https://books.example.com/cat/index.html").unwrap();
    let report = ListingWalker::new(&site, &quiet_crawler_config())
        .walk(&mut storage, "Travel", start)
        .await;

    assert_eq!(report.pages_visited, 1);
    assert_eq!(report.exhaustion, Exhaustion::EmptyListing);
    assert_eq!(site.fetches_of("/cat/page-2.html"), 0);
}

#[tokio::test]
async fn test_structural_skip_never_reaches_storage() {
    let site = ScriptedSite::default()
        .with_page("/cat/index.html", listing_html(&["/i/1", "/i/2"], None))
        .with_page("/i/1", detail_html("orphan", None))
        .with_page("/i/2", detail_html("kept", Some("Travel")));
    let mut storage = SqliteStorage::new_in_memory().unwrap();

    let start = Url::parse("https://books.example.com/cat/index.html").unwrap();
    let report = ListingWalker::new(&site, &quiet_crawler_config())
        .walk(&mut storage, "Travel", start)
        .await;

    assert_eq!(report.skipped, 1);
    assert_eq!(report.inserted, 1);
    // skipped without a retry
    assert_eq!(site.fetches_of("/i/1"), 1);
    assert!(storage.get_book_by_upc("orphan").unwrap().is_none());
}
