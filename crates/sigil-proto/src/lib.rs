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

//! Message protocol between the page-side enforcement engine and the
//! privileged policy resolver, plus the in-process transport that carries
//! it.
//!
//! Two wire shapes exist: the engine asks `replaceFavicon` with the page
//! URL and color scheme; the resolver pushes back `setFavicon` with the
//! resolved image (or `null` to stand down) and an optional enforcement
//! policy override. Request/response correlation travels as envelope
//! metadata — a per-page monotonic [`RequestToken`] — so the JSON shapes
//! stay exactly as they always were.

use serde::{Deserialize, Serialize};
use sigil_model::{ColorScheme, EnforcementPolicy};
use uuid::Uuid;

pub mod error;
pub mod transport;

pub use error::{TransportError, TransportResult};
pub use transport::{
    Inbound, MessageHub, PageReceiver, PageSender, RequestSink, ResolverPort, channel,
    send_with_retry,
};

/// Identifier of a page context attached to the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub Uuid);

impl PageId {
    /// Allocate a fresh page identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Correlation token assigned to each request by the page's sender.
///
/// Monotonically increasing per page; the engine keeps the latest issued
/// token and discards responses correlated to an older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(pub u64);

impl std::fmt::Display for RequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Messages sent from the enforcement engine to the policy resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum EngineRequest {
    /// Ask which favicon (if any) applies to the given page.
    #[serde(rename_all = "camelCase")]
    ReplaceFavicon {
        /// Effective color scheme on the page, when known.
        color_scheme: Option<ColorScheme>,
        /// Full page URL to match against site rules.
        url: String,
    },
}

/// Messages pushed from the policy resolver to a page's engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ResolverPush {
    /// Apply (or stand down from) a favicon replacement.
    #[serde(rename_all = "camelCase")]
    SetFavicon {
        /// Resolved image URL; `None` tells the engine to stand down.
        img_url: Option<String>,
        /// Policy override from the matched rule, when present.
        #[serde(skip_serializing_if = "Option::is_none")]
        replace_strategy: Option<EnforcementPolicy>,
    },
}
