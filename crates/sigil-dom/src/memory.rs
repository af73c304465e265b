//! In-memory page host.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::debug;

use sigil_model::ColorScheme;

use crate::element::{Element, LinkInit, NodeId, TagName};
use crate::observe::{MutationBatch, MutationKind, MutationRecord, MutationSink, ObserveOptions, ObserverId};
use crate::{Document, NavigationEvent, NavigationKind};

struct Observer {
    id: ObserverId,
    options: ObserveOptions,
    sink: MutationSink,
}

struct Inner {
    url: String,
    scheme: ColorScheme,
    head: Vec<Element>,
    observers: Vec<Observer>,
    nav_subscribers: Vec<mpsc::UnboundedSender<NavigationEvent>>,
    theme_subscribers: Vec<mpsc::UnboundedSender<ColorScheme>>,
    next_node: u64,
    next_observer: u64,
}

/// Reference [`Document`] implementation backed by plain memory.
///
/// Every mutation — the engine's own or a test's tamper call — is
/// reported to the observers connected at that moment, which is exactly
/// the contract the engine's observer bracket depends on. The memory
/// host always observes the whole head; a configured target selector is
/// accepted and recorded but does not narrow the subtree.
#[derive(Clone)]
pub struct MemoryDocument {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDocument {
    /// Create a page at the given location preferring the light scheme.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_color_scheme(url, ColorScheme::Light)
    }

    /// Create a page at the given location with an explicit scheme.
    #[must_use]
    pub fn with_color_scheme(url: impl Into<String>, scheme: ColorScheme) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                url: url.into(),
                scheme,
                head: Vec::new(),
                observers: Vec::new(),
                nav_subscribers: Vec::new(),
                theme_subscribers: Vec::new(),
                next_node: 1,
                next_observer: 1,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("document mutex poisoned")
    }

    /// Simulate an SPA navigation, notifying navigation subscribers.
    pub fn navigate(&self, url: impl Into<String>, kind: NavigationKind) {
        let url = url.into();
        let mut inner = self.lock();
        inner.url.clone_from(&url);
        let event = NavigationEvent { kind, url };
        inner
            .nav_subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Simulate an OS theme flip, notifying scheme subscribers.
    pub fn set_color_scheme(&self, scheme: ColorScheme) {
        let mut inner = self.lock();
        inner.scheme = scheme;
        inner
            .theme_subscribers
            .retain(|subscriber| subscriber.send(scheme).is_ok());
    }

    /// Tamper helper: append a `<meta>` the way a page script would.
    #[must_use = "the node id is the only handle for later tampering"]
    pub fn append_meta(&self, name: &str, content: &str) -> NodeId {
        let mut inner = self.lock();
        let id = NodeId(inner.next_node);
        inner.next_node += 1;

        let mut element = Element::new(id, TagName::Meta);
        element.attributes.insert("name".into(), name.into());
        element.attributes.insert("content".into(), content.into());
        inner.head.push(element);

        notify(
            &mut inner,
            vec![MutationRecord {
                target: id,
                kind: MutationKind::ChildList,
            }],
        );
        id
    }

    /// Tamper helper: change an attribute the way a page script would.
    pub fn set_attribute(&self, id: NodeId, name: &str, value: &str) {
        let mut inner = self.lock();
        if let Some(element) = inner.head.iter_mut().find(|element| element.id == id) {
            element.attributes.insert(name.into(), value.into());
            notify(
                &mut inner,
                vec![MutationRecord {
                    target: id,
                    kind: MutationKind::Attributes {
                        attribute: name.into(),
                    },
                }],
            );
        }
    }

    /// Tamper helper: change text content the way a page script would.
    pub fn set_text(&self, id: NodeId, text: &str) {
        let mut inner = self.lock();
        if let Some(element) = inner.head.iter_mut().find(|element| element.id == id) {
            element.text = Some(text.into());
            notify(
                &mut inner,
                vec![MutationRecord {
                    target: id,
                    kind: MutationKind::CharacterData,
                }],
            );
        }
    }
}

fn notify(inner: &mut Inner, records: MutationBatch) {
    inner.observers.retain(|observer| {
        let visible: MutationBatch = records
            .iter()
            .filter(|record| match &record.kind {
                MutationKind::Attributes { attribute } => {
                    observer.options.observes_attribute(attribute)
                }
                MutationKind::ChildList | MutationKind::CharacterData => true,
            })
            .cloned()
            .collect();
        if visible.is_empty() {
            return true;
        }
        observer.sink.send(visible).is_ok()
    });
}

impl Document for MemoryDocument {
    fn url(&self) -> String {
        self.lock().url.clone()
    }

    fn color_scheme(&self) -> ColorScheme {
        self.lock().scheme
    }

    fn head(&self) -> Vec<Element> {
        self.lock().head.clone()
    }

    fn contains(&self, id: NodeId) -> bool {
        self.lock().head.iter().any(|element| element.id == id)
    }

    fn remove(&self, id: NodeId) -> bool {
        let mut inner = self.lock();
        let before = inner.head.len();
        inner.head.retain(|element| element.id != id);
        let removed = inner.head.len() != before;
        if removed {
            notify(
                &mut inner,
                vec![MutationRecord {
                    target: id,
                    kind: MutationKind::ChildList,
                }],
            );
        }
        removed
    }

    fn append_link(&self, link: LinkInit) -> NodeId {
        let mut inner = self.lock();
        let id = NodeId(inner.next_node);
        inner.next_node += 1;

        let mut element = Element::new(id, TagName::Link);
        element.attributes.insert("rel".into(), link.rel);
        element.attributes.insert("href".into(), link.href);
        if let Some(link_type) = link.link_type {
            element.attributes.insert("type".into(), link_type);
        }
        element.classes.extend(link.classes);
        inner.head.push(element);

        notify(
            &mut inner,
            vec![MutationRecord {
                target: id,
                kind: MutationKind::ChildList,
            }],
        );
        id
    }

    fn append_style(&self, style_id: &str, css: &str) -> NodeId {
        let mut inner = self.lock();
        let id = NodeId(inner.next_node);
        inner.next_node += 1;

        let mut element = Element::new(id, TagName::Style);
        element.attributes.insert("id".into(), style_id.into());
        element.text = Some(css.into());
        inner.head.push(element);

        notify(
            &mut inner,
            vec![MutationRecord {
                target: id,
                kind: MutationKind::ChildList,
            }],
        );
        id
    }

    fn observe(&self, options: ObserveOptions, sink: MutationSink) -> ObserverId {
        let mut inner = self.lock();
        let id = ObserverId(inner.next_observer);
        inner.next_observer += 1;
        if let Some(selector) = &options.target_selector {
            debug!(selector, "memory document observes the whole head");
        }
        inner.observers.push(Observer { id, options, sink });
        id
    }

    fn disconnect(&self, observer: ObserverId) {
        self.lock().observers.retain(|entry| entry.id != observer);
    }

    fn navigations(&self) -> mpsc::UnboundedReceiver<NavigationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().nav_subscribers.push(tx);
        rx
    }

    fn color_scheme_changes(&self) -> mpsc::UnboundedReceiver<ColorScheme> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().theme_subscribers.push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn favicon_link(href: &str) -> LinkInit {
        LinkInit::new("icon", href).with_type("image/png")
    }

    #[tokio::test]
    async fn append_and_remove_report_child_list_mutations() {
        let doc = MemoryDocument::new("https://example.com/");
        let (sink, mut records) = mpsc::unbounded_channel();
        doc.observe(ObserveOptions::default(), sink);

        let id = doc.append_link(favicon_link("data:a"));
        let batch = records.recv().await.expect("append reported");
        assert_eq!(batch[0].target, id);
        assert_eq!(batch[0].kind, MutationKind::ChildList);

        assert!(doc.remove(id));
        let batch = records.recv().await.expect("remove reported");
        assert_eq!(batch[0].kind, MutationKind::ChildList);
        assert!(!doc.contains(id));
        assert!(!doc.remove(id));
    }

    #[tokio::test]
    async fn disconnected_observer_sees_nothing() {
        let doc = MemoryDocument::new("https://example.com/");
        let (sink, mut records) = mpsc::unbounded_channel();
        let observer = doc.observe(ObserveOptions::default(), sink);

        doc.disconnect(observer);
        doc.append_link(favicon_link("data:a"));

        assert!(records.try_recv().is_err());
    }

    #[tokio::test]
    async fn attribute_filter_limits_reports() {
        let doc = MemoryDocument::new("https://example.com/");
        let id = doc.append_link(favicon_link("data:a"));

        let (sink, mut records) = mpsc::unbounded_channel();
        doc.observe(
            ObserveOptions {
                attribute_filter: vec!["href".into()],
                target_selector: None,
            },
            sink,
        );

        doc.set_attribute(id, "media", "print");
        doc.set_attribute(id, "href", "data:b");

        let batch = records.recv().await.expect("filtered attribute reported");
        assert_eq!(
            batch[0].kind,
            MutationKind::Attributes {
                attribute: "href".into()
            }
        );
        assert!(records.try_recv().is_err());
    }

    #[tokio::test]
    async fn character_data_changes_are_reported() {
        let doc = MemoryDocument::new("https://example.com/");
        let style = doc.append_style("page-style", "body { color: red; }");

        let (sink, mut records) = mpsc::unbounded_channel();
        doc.observe(ObserveOptions::default(), sink);

        doc.set_text(style, "body { color: blue; }");
        let batch = records.recv().await.expect("text change reported");
        assert_eq!(batch[0].kind, MutationKind::CharacterData);
        assert_eq!(batch[0].target, style);
    }

    #[tokio::test]
    async fn navigation_and_theme_events_reach_subscribers() {
        let doc = MemoryDocument::new("https://example.com/");
        let mut navs = doc.navigations();
        let mut themes = doc.color_scheme_changes();

        doc.navigate("https://example.com/#section", NavigationKind::HashChange);
        let event = navs.recv().await.expect("navigation event");
        assert_eq!(event.kind, NavigationKind::HashChange);
        assert_eq!(doc.url(), "https://example.com/#section");

        doc.set_color_scheme(ColorScheme::Dark);
        assert_eq!(themes.recv().await, Some(ColorScheme::Dark));
        assert_eq!(doc.color_scheme(), ColorScheme::Dark);
    }
}
