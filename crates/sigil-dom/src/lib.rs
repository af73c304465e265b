#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Page document abstraction the enforcement engine operates on.
//!
//! The engine never touches a real browser API directly: it reads and
//! mutates the page head, observes mutations, and subscribes to
//! navigation/theme changes through the [`Document`] trait. Host
//! adapters bind the trait to an actual page; [`MemoryDocument`] is the
//! in-repo host used by the runtime wiring and tests, and its tamper
//! helpers behave like a page script would — every mutation is reported
//! to connected observers.

use tokio::sync::mpsc;

use sigil_model::ColorScheme;

pub mod element;
pub mod memory;
pub mod observe;

pub use element::{Element, LinkInit, NodeId, TagName};
pub use memory::MemoryDocument;
pub use observe::{
    MutationBatch, MutationKind, MutationRecord, MutationSink, ObserveOptions, ObserverId,
};

/// How a navigation was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// History traversal (back/forward).
    PopState,
    /// Fragment-only change.
    HashChange,
}

/// A navigation reported by the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    /// Detection mechanism.
    pub kind: NavigationKind,
    /// Location after the navigation.
    pub url: String,
}

/// The page surface the enforcement engine reads and mutates.
///
/// Implementations must deliver mutation records only to observers
/// connected at the time of the mutation; records are never replayed to
/// an observer connected later. That contract is what makes the engine's
/// disconnect/write/reconnect bracket sufficient to ignore its own
/// edits.
pub trait Document: Send + Sync {
    /// Current page location.
    fn url(&self) -> String;

    /// Effective color scheme the page prefers.
    fn color_scheme(&self) -> ColorScheme;

    /// Snapshot of the head's elements in document order.
    fn head(&self) -> Vec<Element>;

    /// Whether the node is still attached to the head.
    fn contains(&self, id: NodeId) -> bool;

    /// Detach a node; returns `false` when it was already gone.
    fn remove(&self, id: NodeId) -> bool;

    /// Append a `<link>` to the head.
    fn append_link(&self, link: LinkInit) -> NodeId;

    /// Append a `<style>` with the given element id to the head.
    fn append_style(&self, style_id: &str, css: &str) -> NodeId;

    /// Connect a mutation observer; records flow into `sink` until
    /// disconnected.
    fn observe(&self, options: ObserveOptions, sink: MutationSink) -> ObserverId;

    /// Disconnect a mutation observer. Pending undelivered records are
    /// discarded with it.
    fn disconnect(&self, observer: ObserverId);

    /// Subscribe to navigation events (history traversal, hash changes).
    fn navigations(&self) -> mpsc::UnboundedReceiver<NavigationEvent>;

    /// Subscribe to color-scheme changes.
    fn color_scheme_changes(&self) -> mpsc::UnboundedReceiver<ColorScheme>;
}
