//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run whole crawls
//! end-to-end against an in-memory SQLite index.

use docsearch_scraper::config::{parse_config, CrawlConfig, FetchConfig};
use docsearch_scraper::crawler::{Coordinator, HttpFetcher};
use docsearch_scraper::index::{IndexStore, SqliteIndexStore};
use docsearch_scraper::output::WebhookNotifier;
use docsearch_scraper::ScraperError;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration; `extra` holds top-level keys and tables
fn create_test_config(base_url: &str, extra: &str) -> CrawlConfig {
    parse_config(&format!(
        r#"
index-name = "docs"
start-urls = ["{base}/"]
{extra}

[fetch]
max-retries = 1
retry-delay-ms = 0
timeout-secs = 5
"#,
        base = base_url,
        extra = extra
    ))
    .expect("Failed to parse test config")
}

fn html_page(title: &str, body: &str) -> String {
    format!(
        r#"<html lang="en"><head><title>{title}</title></head><body>
        <h1>{title}</h1>
        <p>Content of {title}</p>
        {body}
        </body></html>"#,
        title = title,
        body = body
    )
}

async fn mount_page(server: &MockServer, route: &str, body: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .expect(expected)
        .mount(server)
        .await;
}

fn fetcher() -> Arc<HttpFetcher> {
    let config = FetchConfig {
        timeout_secs: 5,
        ..FetchConfig::default()
    };
    Arc::new(HttpFetcher::new(&config, None).expect("Failed to build fetcher"))
}

fn production_urls(store: &SqliteIndexStore) -> HashSet<String> {
    store
        .all_objects("docs")
        .expect("Failed to read production index")
        .iter()
        .filter_map(|r| r["url_without_anchor"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        html_page(
            "Home",
            &format!(
                r#"<a href="/page1">Page 1</a>
                   <a href="{}/page1#section">Page 1 again</a>
                   <a href="/page2">Page 2</a>
                   <a href="https://elsewhere.example.org/">Elsewhere</a>"#,
                base
            ),
        ),
        1,
    )
    .await;
    mount_page(&server, "/page1", html_page("Page 1", ""), 1).await;
    mount_page(&server, "/page2", html_page("Page 2", ""), 0).await;

    let config = create_test_config(&base, &format!(r#"stop-urls = ["{}/page2"]"#, base));
    let store = Arc::new(SqliteIndexStore::open_in_memory().unwrap());

    let report = Coordinator::new(Arc::new(config), store.clone(), fetcher())
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(report.strategy, "full-crawl");
    assert_eq!(report.stats.succeeded, 2);
    assert_eq!(report.stats.failed, 0);
    assert_eq!(
        production_urls(&store),
        HashSet::from([format!("{}/", base), format!("{}/page1", base)])
    );
    assert!(!store.index_exists("docs_tmp").unwrap());
}

#[tokio::test]
async fn test_stop_url_matches_across_schemes() {
    let server = MockServer::start().await;
    let base = server.uri();
    let https_base = base.replacen("http://", "https://", 1);

    mount_page(
        &server,
        "/",
        html_page("Home", r#"<a href="/archive/old">Old</a><a href="/guide">Guide</a>"#),
        1,
    )
    .await;
    mount_page(&server, "/archive/old", html_page("Old", ""), 0).await;
    mount_page(&server, "/guide", html_page("Guide", ""), 1).await;

    let config = create_test_config(
        &base,
        &format!(r#"stop-urls = ["{}/archive"]"#, https_base),
    );
    let store = Arc::new(SqliteIndexStore::open_in_memory().unwrap());

    Coordinator::new(Arc::new(config), store.clone(), fetcher())
        .unwrap()
        .run()
        .await
        .expect("Crawl failed");

    let urls = production_urls(&store);
    assert!(urls.contains(&format!("{}/guide", base)));
    assert!(!urls.contains(&format!("{}/archive/old", base)));
}

#[tokio::test]
async fn test_file_diff_removes_and_recrawls() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/en/articles/foo", html_page("Foo", ""), 1).await;
    Mock::given(method("GET"))
        .and(path("/en/docs/tutorials/bar"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({
            "file_path": "guides/en/articles/foo.md",
            "status": "200"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    // the http URL and its unreachable https alternative
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({
            "file_path": "guides/en/tutorials/bar.mdx",
            "status": "404"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let store = Arc::new(SqliteIndexStore::open_in_memory().unwrap());
    store
        .save_objects(
            "docs",
            &[
                json!({"objectID": "bar-1", "slug": "bar", "language": "en"}),
                json!({"objectID": "bar-fr", "slug": "bar", "language": "fr"}),
                json!({"objectID": "kept", "slug": "kept", "language": "en"}),
            ],
        )
        .await
        .unwrap();

    let config = create_test_config(
        &base,
        r#"
is-file-update = true
added-files = "guides/en/articles/foo.md, guides/en/img/logo.png"
updated-files = "guides/en/tutorials/bar.mdx"
"#,
    );
    let notifier = Arc::new(WebhookNotifier::new(&format!("{}/hook", base)).unwrap());

    let report = Coordinator::new(Arc::new(config), store.clone(), fetcher())
        .unwrap()
        .with_notifier(notifier)
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(report.strategy, "file-diff");
    assert_eq!(report.records_removed, 1);
    assert_eq!(report.stats.total_processed, 2);
    assert_eq!(report.stats.failed_404, 1);
    assert_eq!(report.stats.urls_404.len(), 2);
    assert_eq!(
        report.stats.file_paths_404,
        vec!["guides/en/tutorials/bar.mdx".to_string()]
    );

    assert!(store.get_object("docs", "bar-1").unwrap().is_none());
    assert!(store.get_object("docs", "bar-fr").unwrap().is_some());
    assert!(store.get_object("docs", "kept").unwrap().is_some());
    assert!(production_urls(&store).contains(&format!("{}/en/articles/foo", base)));
}

#[tokio::test]
async fn test_sitemap_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();

    let index = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <sitemap><loc>{}/sitemap-docs.xml</loc></sitemap>
        </sitemapindex>"#,
        base
    );
    let urlset = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>{base}/docs/a</loc></url>
          <url><loc>{base}/docs/b</loc></url>
          <url><loc>{base}/blog/c</loc></url>
        </urlset>"#,
        base = base
    );

    mount_page(&server, "/sitemap.xml", index, 1).await;
    mount_page(&server, "/sitemap-docs.xml", urlset, 1).await;
    mount_page(
        &server,
        "/docs/a",
        html_page("A", r#"<a href="/docs/linked">not followed</a>"#),
        1,
    )
    .await;
    mount_page(&server, "/docs/b", html_page("B", ""), 1).await;
    mount_page(&server, "/blog/c", html_page("C", ""), 0).await;
    mount_page(&server, "/docs/linked", html_page("Linked", ""), 0).await;

    let config = create_test_config(
        &base,
        &format!(
            r#"
sitemap-urls = ["{base}/sitemap.xml"]
sitemap-urls-regexs = ["/docs/"]
stop-urls = ["{base}/docs/b"]
"#,
            base = base
        ),
    );
    let store = Arc::new(SqliteIndexStore::open_in_memory().unwrap());

    let report = Coordinator::new(Arc::new(config), store.clone(), fetcher())
        .unwrap()
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(report.strategy, "sitemap");
    assert_eq!(report.stats.succeeded, 4);
    assert_eq!(
        production_urls(&store),
        HashSet::from([format!("{}/docs/a", base)])
    );
}

#[tokio::test]
async fn test_force_sitemap_urls_crawling_ignores_rules() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/sitemap.xml",
        format!(
            r#"<urlset><url><loc>{}/docs/b</loc></url></urlset>"#,
            base
        ),
        1,
    )
    .await;
    mount_page(&server, "/docs/b", html_page("B", ""), 1).await;

    let config = create_test_config(
        &base,
        &format!(
            r#"
sitemap-urls = ["{base}/sitemap.xml"]
stop-urls = ["{base}/docs/b"]
force-sitemap-urls-crawling = true
"#,
            base = base
        ),
    );
    let store = Arc::new(SqliteIndexStore::open_in_memory().unwrap());

    Coordinator::new(Arc::new(config), store.clone(), fetcher())
        .unwrap()
        .run()
        .await
        .expect("Crawl failed");

    assert!(production_urls(&store).contains(&format!("{}/docs/b", base)));
}

#[tokio::test]
async fn test_circuit_breaker_keeps_production_untouched() {
    let server = MockServer::start().await;
    let base = server.uri();

    let many_paragraphs: String = (0..20).map(|i| format!("<p>Paragraph {}</p>", i)).collect();
    mount_page(&server, "/", html_page("Home", &many_paragraphs), 1).await;

    let store = Arc::new(SqliteIndexStore::open_in_memory().unwrap());
    store
        .save_objects("docs", &[json!({"objectID": "live", "content": "live"})])
        .await
        .unwrap();

    let config = create_test_config(&base, "nb-hits-max = 5\nclear-index = true");

    let result = Coordinator::new(Arc::new(config), store.clone(), fetcher())
        .unwrap()
        .run()
        .await;

    assert!(matches!(
        result,
        Err(ScraperError::CircuitBreakerTripped { limit: 5, .. })
    ));
    let production = store.all_objects("docs").unwrap();
    assert_eq!(production.len(), 1);
    assert_eq!(production[0]["objectID"], "live");
}
