//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run direct,
//! paginated, recursive and in-memory crawls end-to-end.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use sumi_harvest::crawler::{Engine, Fetcher, HttpFetcher, ItemResult, ItemStream, ScrapContext};
use sumi_harvest::{FieldRule, JobState, MemoryStore, ScrapData, ScrapSelector, Scraper, SelectorType};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates an engine over an in-memory store and a plain HTTP fetcher
fn create_test_engine(max_connections: usize, max_depth: usize) -> Engine {
    let data = ScrapData::new(Arc::new(MemoryStore::new()));
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::with_client(reqwest::Client::new()));
    Engine::new(ScrapContext::new(fetcher, data, max_connections, 16), max_depth)
}

async fn collect(mut items: ItemStream) -> Vec<ItemResult> {
    let mut out = Vec::new();
    while let Some(result) = items.recv().await {
        out.push(result);
    }
    out
}

/// Waits for the job's finish mark, written right after its output closes
async fn wait_finished(data: &ScrapData, job_id: &str) -> JobState {
    for _ in 0..50 {
        if let Ok(report) = data.scrap_job(job_id).await {
            if report.state() == JobState::Finished {
                return JobState::Finished;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    data.scrap_job(job_id)
        .await
        .map(|r| r.state())
        .unwrap_or(JobState::Created)
}

fn list_page(links: &[&str]) -> String {
    let items: String = links
        .iter()
        .enumerate()
        .map(|(i, href)| format!(r#"<li class="item"><a href="{}">Entry {}</a></li>"#, href, i))
        .collect();
    format!("<html><body><ul>{}</ul></body></html>", items)
}

fn detail_page(n: usize) -> String {
    format!(
        r#"<html><body><div class="product">
            <h1>Product {n}</h1>
            <span class="sku">SKU-{n}</span>
            <span class="price">£{n}9.99</span>
        </div></body></html>"#
    )
}

async fn mount_page(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn detail_selector(server: &MockServer) -> ScrapSelector {
    ScrapSelector {
        url: format!("{}/p/0", server.uri()),
        base: ".product".to_string(),
        stype: Some(SelectorType::Detail),
        id: FieldRule::text(".sku"),
        title: FieldRule::text("h1"),
        price: FieldRule::text(".price"),
        ..Default::default()
    }
}

fn list_selector(server: &MockServer) -> ScrapSelector {
    ScrapSelector {
        url: format!("{}/list", server.uri()),
        base: ".item".to_string(),
        stype: Some(SelectorType::List),
        recursive: true,
        id: FieldRule::text("a"),
        link: FieldRule::attr("a", "href"),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_recursive_list_to_detail() {
    let server = MockServer::start().await;
    mount_page(&server, "/list", list_page(&["/p/1", "/p/2", "/p/3"])).await;
    for n in 1..=3 {
        mount_page(&server, &format!("/p/{}", n), detail_page(n)).await;
    }

    let engine = create_test_engine(10, 2);
    engine
        .data()
        .save_selector(&detail_selector(&server))
        .await
        .unwrap();

    let (job_id, items) = engine
        .recursive_scraper()
        .scrap(list_selector(&server))
        .await
        .unwrap();
    assert!(job_id.starts_with('R'));

    let results = collect(items).await;
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.job_id == job_id));
    assert!(results.iter().all(|r| r.error.is_none()));

    let ids: BTreeSet<_> = results.iter().map(|r| r.item.id.clone()).collect();
    assert_eq!(
        ids,
        ["SKU-1", "SKU-2", "SKU-3"].iter().map(|s| s.to_string()).collect()
    );

    let first = results.iter().find(|r| r.item.id == "SKU-1").unwrap();
    assert_eq!(first.item.title, "Product 1");
    assert_eq!(first.item.price, 19.99);
    assert_eq!(first.item.currency, "£");
    assert_eq!(first.item.scrap_url, format!("{}/p/1", server.uri()));

    assert_eq!(wait_finished(engine.data(), &job_id).await, JobState::Finished);
}

#[tokio::test]
async fn test_recursive_skips_links_without_detail_selector() {
    let server = MockServer::start().await;
    let elsewhere = MockServer::start().await;
    let foreign = format!("{}/p/9", elsewhere.uri());
    mount_page(&server, "/list", list_page(&["/p/1", &foreign])).await;
    mount_page(&server, "/p/1", detail_page(1)).await;

    let engine = create_test_engine(10, 2);
    engine
        .data()
        .save_selector(&detail_selector(&server))
        .await
        .unwrap();

    let (_, items) = engine
        .recursive_scraper()
        .scrap(list_selector(&server))
        .await
        .unwrap();

    let results = collect(items).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].item.id, "SKU-1");
}

#[tokio::test]
async fn test_recursive_resolves_stored_list_selector() {
    let server = MockServer::start().await;
    mount_page(&server, "/list", list_page(&["/p/2"])).await;
    mount_page(&server, "/p/2", detail_page(2)).await;

    let engine = create_test_engine(10, 2);
    engine
        .data()
        .save_selector(&detail_selector(&server))
        .await
        .unwrap();
    engine
        .data()
        .save_selector(&list_selector(&server))
        .await
        .unwrap();

    let bare = ScrapSelector {
        url: format!("{}/list", server.uri()),
        ..Default::default()
    };
    let (_, items) = engine.recursive_scraper().scrap(bare).await.unwrap();

    let results = collect(items).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].item.id, "SKU-2");
}

#[tokio::test]
async fn test_paginated_crawl() {
    let server = MockServer::start().await;
    for page in 1..=3 {
        Mock::given(method("GET"))
            .and(path("/list"))
            .and(query_param("page", page.to_string()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(list_page(&[&format!("/p/{}", page)])),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let engine = create_test_engine(2, 2);
    let mut selector = list_selector(&server);
    selector.recursive = false;
    selector.url = format!("{}/list?page=1", server.uri());
    selector.page_param = "page".to_string();
    selector.page_start = 1;
    selector.page_incr = 1;
    selector.page_limit = 4;

    let (job_id, items) = engine.scraper().scrap(selector).await.unwrap();
    assert!(job_id.starts_with('D'));

    let results = collect(items).await;
    let links: BTreeSet<_> = results.iter().map(|r| r.item.link.clone()).collect();
    assert_eq!(links.len(), 3);
    assert!(links.contains(&format!("{}/p/3", server.uri())));
    assert_eq!(wait_finished(engine.data(), &job_id).await, JobState::Finished);
}

#[tokio::test]
async fn test_failed_page_does_not_stop_the_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_page(&["/a", "/b"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let engine = create_test_engine(4, 2);
    let mut selector = list_selector(&server);
    selector.recursive = false;
    selector.page_param = "page".to_string();
    selector.page_limit = 2;
    selector.page_incr = 1;

    let (job_id, items) = engine.scraper().scrap(selector).await.unwrap();
    let results = collect(items).await;
    assert_eq!(results.len(), 2);
    assert_eq!(wait_finished(engine.data(), &job_id).await, JobState::Finished);
}

#[tokio::test]
async fn test_bad_css_is_logged() {
    let server = MockServer::start().await;
    mount_page(&server, "/list", list_page(&["/a"])).await;

    let engine = create_test_engine(4, 2);
    let mut selector = list_selector(&server);
    selector.recursive = false;
    selector.title = FieldRule::text("h1[");

    let (job_id, items) = engine.scraper().scrap(selector).await.unwrap();
    assert!(collect(items).await.is_empty());
    wait_finished(engine.data(), &job_id).await;

    let log = engine.data().scrap_log().await.unwrap();
    assert!(log
        .iter()
        .any(|line| line == sumi_harvest::crawler::BAD_CSS_LOG_LINE));
}

#[tokio::test]
async fn test_reader_end_to_end() {
    let engine = create_test_engine(4, 2);
    let body = list_page(&["http://shop.example/x/1", "http://shop.example/x/2"]);

    let selector = ScrapSelector {
        url: "http://shop.example/x".to_string(),
        base: ".item".to_string(),
        link: FieldRule::attr("a", "href"),
        id_from: sumi_harvest::IdSource::FromLink,
        id_extractor: sumi_harvest::IdExtractor {
            url_path_index: -1,
            ..Default::default()
        },
        id_prefix: "X".to_string(),
        ..Default::default()
    };

    let (job_id, items) = engine.reader_scraper(body).scrap(selector).await.unwrap();
    assert!(job_id.starts_with("READER"));

    let ids: Vec<_> = collect(items).await.into_iter().map(|r| r.item.id).collect();
    assert_eq!(ids, vec!["X1", "X2"]);
}

#[tokio::test]
async fn test_invalid_selector_is_rejected_before_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let engine = create_test_engine(4, 2);
    let mut selector = list_selector(&server);
    selector.base = String::new();
    selector.recursive = false;

    assert!(engine.scraper().scrap(selector).await.is_err());
}
