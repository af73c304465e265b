//! Head inspection and cleanup helpers used by the apply step.

use sigil_dom::{Document, Element, TagName};
use tracing::debug;

use crate::{HIDING_STYLE_ID, MANAGED_CLASS};

/// Rel substrings that identify a favicon-bearing `<link>`.
const FAVICON_REL_MARKERS: [&str; 5] = ["icon", "shortcut", "apple-touch", "mask-icon", "fluid-icon"];

/// Whether an element declares a favicon in any of the ways pages do:
/// icon-flavored `<link>` rels, manifest links, or msapplication metas.
#[must_use]
pub fn is_favicon_related(element: &Element) -> bool {
    match element.tag {
        TagName::Link => {
            let rel = element.attribute("rel").unwrap_or_default().to_ascii_lowercase();
            FAVICON_REL_MARKERS.iter().any(|marker| rel.contains(marker)) || rel == "manifest"
        }
        TagName::Meta => element
            .attribute("name")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .contains("msapplication"),
        TagName::Style => false,
    }
}

/// Whether an element is an icon-rel `<link>` (managed or not).
#[must_use]
pub fn is_favicon_link(element: &Element) -> bool {
    element.tag == TagName::Link
        && element
            .attribute("rel")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .contains("icon")
}

/// Whether the hiding style is present in the head.
#[must_use]
pub fn hiding_style_present(head: &[Element]) -> bool {
    head.iter()
        .any(|element| element.tag == TagName::Style && element.attribute("id") == Some(HIDING_STYLE_ID))
}

/// CSS hiding any favicon-flavored link that is not engine-managed.
#[must_use]
pub fn hiding_css() -> String {
    format!(
        "link[rel*=\"icon\"]:not(.{MANAGED_CLASS}), \
         link[rel*=\"shortcut\"]:not(.{MANAGED_CLASS}), \
         link[rel*=\"apple-touch\"]:not(.{MANAGED_CLASS}), \
         link[rel*=\"mask-icon\"]:not(.{MANAGED_CLASS}) \
         {{ display: none !important; }}"
    )
}

/// Strip pre-existing favicon declarations, leaving managed tags alone.
pub fn cleanup_existing_icons(document: &dyn Document) {
    for element in document.head() {
        if element.has_class(MANAGED_CLASS) {
            continue;
        }
        if is_favicon_related(&element) {
            debug!(node = %element.id, "removing competing favicon declaration");
            document.remove(element.id);
        }
    }
}
