//! Integration tests for Binix Shields
//!
//! These tests drive whole pages through the runtime with the shim enabled
//! and check what reaches the host.

use binix_shields::channel::{SecurityToken, host_channel};
use binix_shields::host::StatsCollector;
use binix_shields::page::{BlockListLoader, OpenArgs, PageFixture, Window};
use binix_shields::shields::{ResourceReport, ResourceType};
use binix_shields::{ShieldsConfig, TrackingProtectionStats};
use proptest::prelude::*;
use std::rc::Rc;

const HANDLER: &str = "trackingProtectionStats";

fn replay(fixture: &PageFixture) -> StatsCollector {
    let window = fixture.build().unwrap();
    let (sender, mut receiver) = host_channel();
    let stats = TrackingProtectionStats::new(
        Rc::clone(&window),
        Rc::new(sender),
        SecurityToken::generate().unwrap(),
        ShieldsConfig::default(),
    );
    stats.set_enabled(true).unwrap();
    fixture.replay(&window);

    let mut collector = StatsCollector::new(HANDLER);
    collector.drain(&mut receiver);
    collector
}

#[test]
fn test_demo_page_statistics() {
    let fixture = PageFixture::demo();
    let collector = replay(&fixture);
    let page = collector.page("https://news.example/article").unwrap();

    // Parser-inserted scripts are seen by the watcher and again by the load scan
    assert_eq!(page.count(ResourceType::Script), 6);
    assert_eq!(page.count(ResourceType::Image), 2);
    assert_eq!(page.count(ResourceType::XmlHttpRequest), 1);
    assert!(page.resources().contains(&(
        "https://tracker.test/collect?sync=1".to_string(),
        ResourceType::XmlHttpRequest
    )));
    assert!(page.resources().contains(&(
        "https://tracker.test/pixel.gif".to_string(),
        ResourceType::Image
    )));
    assert!(!page.resources().iter().any(|(url, _)| url.contains("async=1")));
}

#[test]
fn test_clean_page_reports_nothing() {
    let fixture = PageFixture::from_json(
        r#"{
            "url": "https://clean.test/",
            "images": ["/a.png"],
            "sync_xhrs": ["/api"]
        }"#,
    )
    .unwrap();
    let collector = replay(&fixture);
    assert_eq!(collector.total(), 0);
}

#[test]
fn test_reports_carry_the_page_token() {
    let loader = BlockListLoader::new().block_host("tracker.test");
    let window = Window::open("https://site.test/", Rc::new(loader)).unwrap();
    let (sender, mut receiver) = host_channel();
    let token = SecurityToken::generate().unwrap();
    assert_eq!(token.as_str().len(), 43);

    let stats = TrackingProtectionStats::new(
        Rc::clone(&window),
        Rc::new(sender),
        token.clone(),
        ShieldsConfig::default(),
    );
    stats.set_enabled(true).unwrap();

    let xhr = window.new_xhr();
    xhr.open(OpenArgs::new("GET", "https://tracker.test/x").with_async(false))
        .unwrap();
    assert!(xhr.send(None).is_err());

    let message = receiver.try_recv().unwrap();
    assert_eq!(message.handler, HANDLER);
    let decoded = message.decode().unwrap();
    assert_eq!(decoded.security_token, token);
    assert_eq!(decoded.data.source_url(), "https://site.test/");
}

#[test]
fn test_wire_format() {
    let (sender, mut receiver) = host_channel();
    let window = Window::open(
        "https://site.test/page",
        Rc::new(BlockListLoader::new().block_host("tracker.test")),
    )
    .unwrap();
    let stats = TrackingProtectionStats::new(
        Rc::clone(&window),
        Rc::new(sender),
        SecurityToken::new("abc"),
        ShieldsConfig::default(),
    );
    stats.set_enabled(true).unwrap();

    let img = window.new_image();
    window.set_image_src(&img, "/px.gif?u=1");
    window.set_image_src(&img, "https://tracker.test/px.gif");
    window.run_until_idle();

    let body: serde_json::Value = serde_json::from_str(&receiver.try_recv().unwrap().body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "securityToken": "abc",
            "data": {
                "resourceURL": "https://tracker.test/px.gif",
                "sourceURL": "https://site.test/page",
                "resourceType": "image"
            }
        })
    );
    assert!(receiver.try_recv().is_none());
}

#[tokio::test]
async fn test_host_collects_asynchronously() {
    let (sender, receiver) = host_channel();
    let collector = tokio::spawn(StatsCollector::new(HANDLER).run(receiver));

    // The page side is !Send; build and drop it before awaiting
    {
        let fixture = PageFixture::demo();
        let window = fixture.build().unwrap();
        let stats = TrackingProtectionStats::new(
            Rc::clone(&window),
            Rc::new(sender),
            SecurityToken::new("tok"),
            ShieldsConfig::default(),
        );
        stats.set_enabled(true).unwrap();
        fixture.replay(&window);
    }

    let collector = collector.await.unwrap();
    assert_eq!(collector.total(), 9);
}

proptest! {
    /// Resolving arbitrary resource strings never panics
    #[test]
    fn test_resolution_never_panics(resource in "\\PC*") {
        let _ = ResourceReport::resolve(
            &resource,
            "https://site.test/dir/page",
            ResourceType::Script,
        );
    }

    /// Relative paths always resolve onto the page origin
    #[test]
    fn test_relative_paths_stay_on_origin(path in "[a-z0-9][a-z0-9/]{0,23}") {
        let report =
            ResourceReport::resolve(&path, "https://site.test/dir/page", ResourceType::Image)
                .unwrap();
        prop_assert!(report.resource_url().starts_with("https://site.test/"));
    }
}
