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

//! Page-side favicon enforcement.
//!
//! One [`PageSession`] runs per page context. It asks the resolver which
//! favicon applies, injects it into the page head, and then defends it:
//! a mutation observer re-applies on any observed change, a jittered
//! persistence interval audits the head and retries within a bounded
//! budget, and URL/theme changes trigger a fresh resolution. Every
//! stimulus arrives as a message on the session's event loop, so only
//! one operation ever mutates the page at a time.

pub mod apply;
pub mod defense;
pub mod error;
pub mod session;
pub mod state;

pub use error::{EngineError, EngineResult};
pub use session::{PageSession, SessionHandle};
pub use state::EngineState;

/// Class marking the link tags this engine manages.
pub const MANAGED_CLASS: &str = "sigil-managed-favicon";

/// Element id of the injected style that hides competing favicon links.
pub const HIDING_STYLE_ID: &str = "sigil-favicon-style";

/// Host the engine refuses to run on: the product's own demo pages
/// showcase original favicons next to replaced ones.
pub const EXCLUDED_HOST: &str = "sigilfavicons.com";
