//! Integration tests for storing crawled records
//!
//! A wiremock server plays the crawled site, a second one the search index.
//! Records fan out to the index, a temporary directory and the in-memory
//! job store.

use std::sync::Arc;
use std::time::Duration;
use sumi_harvest::crawler::{Engine, Fetcher, HttpFetcher, ScrapContext};
use sumi_harvest::output::{ElasticOutput, FileOutput, ItemSink, KvOutput};
use sumi_harvest::{FieldRule, IdExtractor, IdSource, Item, MemoryStore, ScrapData, ScrapSelector, SelectorType};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_engine(data: ScrapData) -> Engine {
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::with_client(reqwest::Client::new()));
    Engine::new(ScrapContext::new(fetcher, data, 8, 16), 2)
}

async fn mount_site(site: &MockServer) {
    let list = r#"<html><body>
        <div class="item"><a href="/p/10.html">Ten</a></div>
        <div class="item"><a href="/p/11.html">Eleven</a></div>
    </body></html>"#;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list))
        .mount(site)
        .await;

    for n in [10, 11] {
        let body = format!(
            r#"<div class="product"><h1>Item {n}</h1><p class="desc">About {n}</p></div>"#
        );
        Mock::given(method("GET"))
            .and(path(format!("/p/{}.html", n)))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(site)
            .await;
    }
}

fn detail_selector(site: &MockServer) -> ScrapSelector {
    ScrapSelector {
        url: format!("{}/p/0.html", site.uri()),
        base: ".product".to_string(),
        stype: Some(SelectorType::Detail),
        id_from: IdSource::FromUrl,
        id_extractor: IdExtractor {
            url_path_index: -1,
            split_string: ".".to_string(),
            split_index: 0,
        },
        id_prefix: "P".to_string(),
        title: FieldRule::text("h1"),
        description: FieldRule::text(".desc"),
        scrap_tags: "shop,test".to_string(),
        ..Default::default()
    }
}

fn list_selector(site: &MockServer) -> ScrapSelector {
    ScrapSelector {
        url: format!("{}/list", site.uri()),
        base: ".item".to_string(),
        stype: Some(SelectorType::List),
        recursive: true,
        link: FieldRule::attr("a", "href"),
        title: FieldRule::text("a"),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_scrap_and_store_fans_out_to_every_sink() {
    let site = MockServer::start().await;
    mount_site(&site).await;

    let index = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/harvest/127\.0\.0\.1:\d+/P1[01]$"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "_index": "harvest", "_type": "site", "_id": "P10"
        })))
        .expect(2)
        .mount(&index)
        .await;

    let dir = TempDir::new().unwrap();
    let data = ScrapData::new(Arc::new(MemoryStore::new()));
    data.save_selector(&detail_selector(&site)).await.unwrap();

    let sinks: Vec<Arc<dyn ItemSink>> = vec![
        Arc::new(ElasticOutput::new(reqwest::Client::new(), &index.uri(), "harvest")),
        Arc::new(FileOutput::new(dir.path())),
        Arc::new(KvOutput::new(data.clone())),
    ];
    let engine = create_test_engine(data.clone()).with_sinks(sinks);

    let (job_id, handle) = engine.scrap_and_store(list_selector(&site)).await.unwrap();
    assert!(job_id.starts_with('R'));

    let summary = handle.await.unwrap();
    assert_eq!(summary.records, 2);
    assert_eq!(summary.stored, 6);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.item_errors, 0);

    let written = std::fs::read_to_string(dir.path().join("P10.json")).unwrap();
    let item: Item = serde_json::from_str(&written).unwrap();
    assert_eq!(item.title, "Item 10");
    assert_eq!(item.description, "About 10");
    assert_eq!(item.scrap_tags, "shop,test");
    assert!(item.index.ends_with("/P10"));

    let report = data.scrap_job(&job_id).await.unwrap();
    assert_eq!(report.item_count(), 2);
    assert_eq!(report.items.len(), 2);

    // the list selector was saved on the way in
    let stored = data
        .selector(&format!("{}/other", site.uri()), SelectorType::List)
        .await
        .unwrap();
    assert!(stored.recursive);
}

#[tokio::test]
async fn test_failing_sink_does_not_block_others() {
    let site = MockServer::start().await;
    mount_site(&site).await;

    let index = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&index)
        .await;

    let dir = TempDir::new().unwrap();
    let data = ScrapData::new(Arc::new(MemoryStore::new()));
    data.save_selector(&detail_selector(&site)).await.unwrap();

    let sinks: Vec<Arc<dyn ItemSink>> = vec![
        Arc::new(ElasticOutput::new(reqwest::Client::new(), &index.uri(), "harvest")),
        Arc::new(FileOutput::new(dir.path())),
    ];
    let engine = create_test_engine(data).with_sinks(sinks);

    let (_, handle) = engine.scrap_and_store(list_selector(&site)).await.unwrap();
    let summary = handle.await.unwrap();

    assert_eq!(summary.records, 2);
    assert_eq!(summary.stored, 2);
    assert_eq!(summary.failed, 2);
    assert!(dir.path().join("P11.json").exists());
}

#[tokio::test]
async fn test_record_errors_are_counted_on_the_job() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="item"><a href="/a">A</a></div><div class="item"><a href="/b">B</a></div>"#,
        ))
        .mount(&site)
        .await;

    let data = ScrapData::new(Arc::new(MemoryStore::new()));
    let engine = create_test_engine(data.clone())
        .with_sinks(vec![Arc::new(KvOutput::new(data.clone())) as Arc<dyn ItemSink>]);

    // path index 5 does not exist in "/list"
    let selector = ScrapSelector {
        url: format!("{}/list", site.uri()),
        base: ".item".to_string(),
        id_from: IdSource::FromUrl,
        id_extractor: IdExtractor {
            url_path_index: 5,
            ..Default::default()
        },
        ..Default::default()
    };

    let (job_id, handle) = engine.scrap_and_store(selector).await.unwrap();
    let summary = handle.await.unwrap();
    assert_eq!(summary.item_errors, 2);
    assert_eq!(summary.records, 0);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let report = data.scrap_job(&job_id).await.unwrap();
    assert_eq!(report.error_count(), 2);
    assert_eq!(report.item_count(), 0);
    assert!(report.meta["lastError"].contains("out of bounds"));

    let log = data.scrap_log().await.unwrap();
    assert!(log.iter().any(|line| line.contains(&job_id) && line.contains("started")));
}
