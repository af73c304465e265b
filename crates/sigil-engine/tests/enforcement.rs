//! End-to-end enforcement behavior against a memory page, driving the
//! resolver side of the channel by hand.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use sigil_dom::{Document, Element, LinkInit, MemoryDocument, NavigationKind};
use sigil_engine::{EngineError, MANAGED_CLASS, PageSession};
use sigil_model::{ColorScheme, EnforcementPolicy};
use sigil_proto::{EngineRequest, Inbound, PageId, ResolverPort, ResolverPush, channel};
use sigil_test_support::fixtures::fast_policy;

const WAIT_BUDGET: Duration = Duration::from_secs(5);

struct Page {
    doc: Arc<MemoryDocument>,
    port: ResolverPort,
    _handle: sigil_engine::SessionHandle,
}

/// Spawn a session on `url` and wait for its first resolution request.
async fn spawn_page(url: &str) -> (Page, Inbound) {
    let doc = Arc::new(MemoryDocument::new(url));
    let (hub, mut port) = channel();
    let (sender, receiver) = hub.register_page(PageId::new());
    let handle = PageSession::spawn(doc.clone(), Arc::new(sender), receiver).expect("spawn session");
    let inbound = timeout(WAIT_BUDGET, port.recv())
        .await
        .expect("request within budget")
        .expect("request");
    (
        Page {
            doc,
            port,
            _handle: handle,
        },
        inbound,
    )
}

fn respond(page: &Page, inbound: &Inbound, img_url: Option<&str>, policy: &EnforcementPolicy) {
    page.port
        .push(
            inbound.page_id,
            inbound.token,
            ResolverPush::SetFavicon {
                img_url: img_url.map(Into::into),
                replace_strategy: Some(policy.clone()),
            },
        )
        .expect("push response");
}

fn managed_links(doc: &MemoryDocument) -> Vec<Element> {
    doc.head()
        .into_iter()
        .filter(|element| element.has_class(MANAGED_CLASS))
        .collect()
}

/// Poll until the condition holds, bounded by the wait budget.
async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(WAIT_BUDGET, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition within budget");
}

/// Poll for a fixed window and assert the condition never becomes true.
async fn assert_never(window: Duration, mut condition: impl FnMut() -> bool) {
    let outcome = timeout(window, async {
        loop {
            if condition() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(outcome.is_err(), "condition unexpectedly became true");
}

#[tokio::test(start_paused = true)]
async fn applying_the_same_resolution_twice_is_idempotent() {
    let (page, inbound) = spawn_page("https://example.com/").await;
    let policy = EnforcementPolicy::default();

    respond(&page, &inbound, Some("data:image/png;base64,AA"), &policy);
    wait_until(|| managed_links(&page.doc).len() == policy.expected_tag_count()).await;

    // The same token is still the latest; a duplicate push re-applies.
    respond(&page, &inbound, Some("data:image/png;base64,AA"), &policy);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let links = managed_links(&page.doc);
    assert_eq!(links.len(), policy.expected_tag_count());
    let rels: Vec<&str> = links
        .iter()
        .filter_map(|link| link.attribute("rel"))
        .collect();
    assert!(rels.contains(&"icon"));
    assert!(rels.contains(&"shortcut icon"));
    assert!(
        links
            .iter()
            .all(|link| link.attribute("href") == Some("data:image/png;base64,AA"))
    );
}

#[tokio::test(start_paused = true)]
async fn stand_down_touches_nothing_and_goes_dormant() {
    let (page, inbound) = spawn_page("https://example.com/").await;
    let original = page
        .doc
        .append_link(LinkInit::new("icon", "/favicon.ico"));
    let before = page.doc.head();

    respond(&page, &inbound, None, &fast_policy());
    tokio::time::sleep(Duration::from_millis(200)).await;

    // The pre-existing favicon is untouched and nothing was injected.
    assert_eq!(page.doc.head(), before);
    assert!(page.doc.contains(original));

    // Dormant: tampering draws no reaction.
    page.doc.set_attribute(original, "href", "/other.ico");
    assert_never(Duration::from_millis(500), || {
        !managed_links(&page.doc).is_empty()
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn mutations_trigger_one_reapply_per_batch() {
    let (page, inbound) = spawn_page("https://example.com/").await;
    let mut policy = fast_policy();
    policy.persistence.check_interval_time = 0;

    respond(&page, &inbound, Some("data:genuine"), &policy);
    wait_until(|| managed_links(&page.doc).len() == 1).await;
    let initial_id = managed_links(&page.doc)[0].id;

    // Five tamper batches; each must produce exactly one re-apply.
    // Node ids are monotonic, so the managed link's id advancing by one
    // per round proves one injection per batch and no runaway growth.
    let mut last_id = initial_id;
    for round in 1..=5 {
        page.doc.set_attribute(last_id, "href", "data:evil");
        wait_until(|| {
            managed_links(&page.doc)
                .first()
                .is_some_and(|link| link.id > last_id)
        })
        .await;

        let links = managed_links(&page.doc);
        assert_eq!(links.len(), 1, "round {round} grew the managed set");
        assert_eq!(links[0].attribute("href"), Some("data:genuine"));
        last_id = links[0].id;
    }
    assert_eq!(last_id.0, initial_id.0 + 5);

    // Self-mutation immunity: with the observer connected and no
    // further tampering, the engine's own writes must not loop.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(managed_links(&page.doc)[0].id, last_id);
}

#[tokio::test(start_paused = true)]
async fn persistence_retries_are_bounded_then_stop_permanently() {
    let (page, inbound) = spawn_page("https://example.com/").await;
    let mut policy = fast_policy();
    policy.observe_mutations.enabled = false;
    policy.persistence.retry_limit = Some(2);

    respond(&page, &inbound, Some("data:genuine"), &policy);

    // Adversary: remove the managed link each time it shows up. Initial
    // setup plus two retries means exactly three applications.
    for _ in 0..3 {
        wait_until(|| !managed_links(&page.doc).is_empty()).await;
        let link = managed_links(&page.doc)[0].id;
        page.doc.remove(link);
    }

    // Retry budget exhausted: enforcement stops for this page load.
    assert_never(Duration::from_secs(3), || {
        !managed_links(&page.doc).is_empty()
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn url_change_triggers_fresh_resolution() {
    let (page, first) = spawn_page("https://alpha.test/").await;
    let EngineRequest::ReplaceFavicon { url, .. } = &first.request;
    assert_eq!(url, "https://alpha.test/");

    respond(&page, &first, Some("data:alpha"), &fast_policy());
    wait_until(|| !managed_links(&page.doc).is_empty()).await;

    let mut page = page;
    page.doc
        .navigate("https://beta.test/", NavigationKind::PopState);

    let second = timeout(WAIT_BUDGET, page.port.recv())
        .await
        .expect("second request within budget")
        .expect("second request");
    let EngineRequest::ReplaceFavicon { url, .. } = &second.request;
    assert_eq!(url, "https://beta.test/");
    assert!(second.token > first.token);

    respond(&page, &second, Some("data:beta"), &fast_policy());
    wait_until(|| {
        managed_links(&page.doc)
            .first()
            .is_some_and(|link| link.attribute("href") == Some("data:beta"))
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn stale_resolution_response_is_discarded() {
    let (page, first) = spawn_page("https://alpha.test/").await;
    let mut page = page;

    // Navigate before the first response lands; a second request goes out.
    page.doc
        .navigate("https://alpha.test/#spa", NavigationKind::HashChange);
    let second = timeout(WAIT_BUDGET, page.port.recv())
        .await
        .expect("second request within budget")
        .expect("second request");

    // The late response for the superseded request must be ignored.
    respond(&page, &first, Some("data:outdated"), &fast_policy());
    respond(&page, &second, Some("data:current"), &fast_policy());

    wait_until(|| !managed_links(&page.doc).is_empty()).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let links = managed_links(&page.doc);
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].attribute("href"), Some("data:current"));
}

#[tokio::test(start_paused = true)]
async fn theme_change_forces_reinitialization() {
    let (page, first) = spawn_page("https://example.com/").await;
    let EngineRequest::ReplaceFavicon { color_scheme, .. } = &first.request;
    assert_eq!(*color_scheme, Some(ColorScheme::Light));

    respond(&page, &first, Some("data:light"), &fast_policy());
    wait_until(|| !managed_links(&page.doc).is_empty()).await;

    let mut page = page;
    page.doc.set_color_scheme(ColorScheme::Dark);

    let second = timeout(WAIT_BUDGET, page.port.recv())
        .await
        .expect("second request within budget")
        .expect("second request");
    let EngineRequest::ReplaceFavicon { color_scheme, .. } = &second.request;
    assert_eq!(*color_scheme, Some(ColorScheme::Dark));

    respond(&page, &second, Some("data:dark"), &fast_policy());
    wait_until(|| {
        managed_links(&page.doc)
            .first()
            .is_some_and(|link| link.attribute("href") == Some("data:dark"))
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn css_hiding_style_is_injected_once() {
    let (page, inbound) = spawn_page("https://example.com/").await;
    let mut policy = fast_policy();
    policy.add_css_hiding = true;

    respond(&page, &inbound, Some("data:a"), &policy);
    wait_until(|| !managed_links(&page.doc).is_empty()).await;

    // A second resolution must not duplicate the style tag.
    respond(&page, &inbound, Some("data:a"), &policy);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let styles = page
        .doc
        .head()
        .into_iter()
        .filter(|element| element.attribute("id") == Some(sigil_engine::HIDING_STYLE_ID))
        .count();
    assert_eq!(styles, 1);
}

#[tokio::test]
async fn demo_host_is_excluded() {
    let doc = Arc::new(MemoryDocument::new(format!(
        "https://{}/gallery",
        sigil_engine::EXCLUDED_HOST
    )));
    let (hub, _port) = channel();
    let (sender, receiver) = hub.register_page(PageId::new());

    let result = PageSession::spawn(doc, Arc::new(sender), receiver);
    assert!(matches!(result, Err(EngineError::ExcludedHost { host }) if host == sigil_engine::EXCLUDED_HOST));
}

#[tokio::test(start_paused = true)]
async fn existing_declarations_are_stripped_per_policy() {
    let (page, inbound) = spawn_page("https://example.com/").await;
    page.doc.append_link(LinkInit::new("icon", "/favicon.ico"));
    page.doc
        .append_link(LinkInit::new("apple-touch-icon", "/touch.png"));
    let _tile = page.doc.append_meta("msapplication-TileColor", "#ffffff");
    let stylesheet = page.doc.append_link(LinkInit::new("stylesheet", "/app.css"));

    respond(&page, &inbound, Some("data:mine"), &EnforcementPolicy::default());
    wait_until(|| managed_links(&page.doc).len() == 2).await;

    let head = page.doc.head();
    // Only the managed tags, the hiding style, and unrelated tags remain.
    assert!(head.iter().any(|element| element.id == stylesheet));
    assert_eq!(
        head.iter()
            .filter(|element| !element.has_class(MANAGED_CLASS))
            .filter(|element| element.attribute("rel").is_some_and(|rel| rel.contains("icon")))
            .count(),
        0
    );
}
