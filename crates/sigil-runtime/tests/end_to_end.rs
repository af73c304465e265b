//! Full-pipeline tests: store → resolver service → page session.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use sigil_dom::{Document, Element, MemoryDocument, NavigationKind};
use sigil_engine::MANAGED_CLASS;
use sigil_model::ColorScheme;
use sigil_runtime::bootstrap;
use sigil_store::MemoryStore;
use sigil_test_support::fixtures::{emoji_rule, icon_rule, set_theme_toggles, upload_rule};

const WAIT_BUDGET: Duration = Duration::from_secs(5);

fn managed_links(doc: &MemoryDocument) -> Vec<Element> {
    doc.head()
        .into_iter()
        .filter(|element| element.has_class(MANAGED_CLASS))
        .collect()
}

async fn wait_for_href(doc: &MemoryDocument, href: &str) {
    timeout(WAIT_BUDGET, async {
        loop {
            if managed_links(doc)
                .first()
                .is_some_and(|link| link.attribute("href") == Some(href))
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("favicon applied within budget");
}

#[tokio::test(start_paused = true)]
async fn matching_rule_is_enforced_on_the_page() {
    let store = MemoryStore::new();
    let (_config, data_uri) = upload_rule(&store, "example.com");

    let runtime = bootstrap(Arc::new(store));
    let doc = Arc::new(MemoryDocument::new("https://shop.example.com/cart"));
    let _page = runtime
        .supervisor
        .attach(doc.clone())
        .expect("attach page");

    wait_for_href(&doc, &data_uri).await;
    let links = managed_links(&doc);
    assert_eq!(links.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn unmatched_page_is_left_alone() {
    let store = MemoryStore::new();
    let _ = emoji_rule(&store, "example.com", "https://emoji.test/a.png");

    let runtime = bootstrap(Arc::new(store));
    let doc = Arc::new(MemoryDocument::new("https://other.test/"));
    let _page = runtime
        .supervisor
        .attach(doc.clone())
        .expect("attach page");

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(doc.head().is_empty());
}

#[tokio::test(start_paused = true)]
async fn spa_navigation_switches_rules() {
    let store = MemoryStore::new();
    let _ = emoji_rule(&store, "alpha.test", "https://emoji.test/alpha.png");
    let _ = emoji_rule(&store, "beta.test", "https://emoji.test/beta.png");

    let runtime = bootstrap(Arc::new(store));
    let doc = Arc::new(MemoryDocument::new("https://alpha.test/"));
    let _page = runtime
        .supervisor
        .attach(doc.clone())
        .expect("attach page");

    wait_for_href(&doc, "https://emoji.test/alpha.png").await;

    doc.navigate("https://beta.test/app", NavigationKind::PopState);
    wait_for_href(&doc, "https://emoji.test/beta.png").await;
}

#[tokio::test(start_paused = true)]
async fn theme_flip_switches_icon_variant() {
    let store = MemoryStore::new();
    let _ = icon_rule(
        &store,
        "example.com",
        Some("data:light"),
        Some("data:dark"),
        None,
    );
    set_theme_toggles(&store, true, true).await;

    let runtime = bootstrap(Arc::new(store));
    let doc = Arc::new(MemoryDocument::with_color_scheme(
        "https://example.com/",
        ColorScheme::Light,
    ));
    let _page = runtime
        .supervisor
        .attach(doc.clone())
        .expect("attach page");

    wait_for_href(&doc, "data:light").await;

    doc.set_color_scheme(ColorScheme::Dark);
    wait_for_href(&doc, "data:dark").await;
}

#[tokio::test(start_paused = true)]
async fn tampering_is_repaired_end_to_end() {
    let store = MemoryStore::new();
    let (_config, data_uri) = upload_rule(&store, "example.com");

    let runtime = bootstrap(Arc::new(store));
    let doc = Arc::new(MemoryDocument::new("https://example.com/"));
    let _page = runtime
        .supervisor
        .attach(doc.clone())
        .expect("attach page");

    wait_for_href(&doc, &data_uri).await;

    // A page script swaps the href back; the observer repairs it.
    let tampered = managed_links(&doc)[0].id;
    doc.set_attribute(tampered, "href", "/favicon.ico");
    wait_for_href(&doc, &data_uri).await;
}

#[tokio::test(start_paused = true)]
async fn detached_page_stops_receiving_enforcement() {
    let store = MemoryStore::new();
    let (_config, data_uri) = upload_rule(&store, "example.com");

    let runtime = bootstrap(Arc::new(store));
    let doc = Arc::new(MemoryDocument::new("https://example.com/"));
    let page = runtime
        .supervisor
        .attach(doc.clone())
        .expect("attach page");

    wait_for_href(&doc, &data_uri).await;
    drop(page);

    // With the session gone, tampering goes unanswered.
    let tampered = managed_links(&doc)[0].id;
    doc.set_attribute(tampered, "href", "/favicon.ico");
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        managed_links(&doc)[0].attribute("href"),
        Some("/favicon.ico")
    );
}
