//! Persistence-check predicates and interval jitter.

use std::time::Duration;

use rand::Rng;
use sigil_dom::{Element, NodeId};
use sigil_model::{EnforcementPolicy, PersistencePolicy};

use crate::MANAGED_CLASS;
use crate::apply::{hiding_style_present, is_favicon_link};

/// Lower bound for the jittered check interval.
const MIN_CHECK_INTERVAL_MS: f64 = 50.0;

/// Audit a head snapshot against the expected enforcement outcome.
///
/// Returns the first violated condition, or `None` when the head is
/// healthy. Violations are expected steady-state events, not errors.
#[must_use]
pub fn persistence_violation(
    head: &[Element],
    managed_nodes: &[NodeId],
    expected_href: &str,
    policy: &EnforcementPolicy,
) -> Option<&'static str> {
    let managed: Vec<&Element> = head
        .iter()
        .filter(|element| element.has_class(MANAGED_CLASS))
        .collect();
    let expected = policy.expected_tag_count();

    if managed.len() != expected {
        return Some("managed tag count drifted");
    }
    if policy.add_css_hiding && !hiding_style_present(head) {
        return Some("hiding style removed");
    }
    if managed
        .iter()
        .any(|element| element.attribute("href") != Some(expected_href))
    {
        return Some("managed href tampered");
    }
    if managed_nodes
        .iter()
        .any(|id| !head.iter().any(|element| element.id == *id))
    {
        return Some("managed tag detached");
    }
    if policy.remove_existing_icons {
        let favicon_links = head
            .iter()
            .filter(|element| is_favicon_link(element))
            .count();
        if favicon_links > expected {
            return Some("foreign favicon tags reappeared");
        }
    }
    None
}

/// Compute the next check interval, jittered by the configured factor
/// and floored at 50ms. `None` disables checking entirely.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn jittered_interval(persistence: &PersistencePolicy) -> Option<Duration> {
    if !persistence.enabled || persistence.check_interval_time == 0 {
        return None;
    }

    let base = persistence.check_interval_time as f64;
    let mut interval = base;
    if persistence.randomization_factor > 0.0 {
        let offset = rand::rng().random_range(-1.0..1.0) * persistence.randomization_factor * base;
        interval = (base + offset).max(MIN_CHECK_INTERVAL_MS);
    }
    if interval <= 0.0 {
        return None;
    }
    Some(Duration::from_millis(interval as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HIDING_STYLE_ID;
    use crate::apply::hiding_css;
    use sigil_dom::{Document, LinkInit, MemoryDocument};

    fn applied_document(policy: &EnforcementPolicy) -> (MemoryDocument, Vec<NodeId>, String) {
        let doc = MemoryDocument::new("https://example.com/");
        let href = "data:image/png;base64,AAAA".to_string();
        let mut nodes = Vec::new();
        if policy.add_shortcut_link {
            nodes.push(doc.append_link(
                LinkInit::new("shortcut icon", href.clone()).with_class(MANAGED_CLASS),
            ));
        }
        nodes.push(doc.append_link(LinkInit::new("icon", href.clone()).with_class(MANAGED_CLASS)));
        if policy.add_css_hiding {
            doc.append_style(HIDING_STYLE_ID, &hiding_css());
        }
        (doc, nodes, href)
    }

    #[test]
    fn healthy_head_passes() {
        let policy = EnforcementPolicy::default();
        let (doc, nodes, href) = applied_document(&policy);
        assert_eq!(
            persistence_violation(&doc.head(), &nodes, &href, &policy),
            None
        );
    }

    #[test]
    fn missing_managed_tag_is_flagged() {
        let policy = EnforcementPolicy::default();
        let (doc, nodes, href) = applied_document(&policy);
        doc.remove(nodes[0]);
        assert_eq!(
            persistence_violation(&doc.head(), &nodes, &href, &policy),
            Some("managed tag count drifted")
        );
    }

    #[test]
    fn tampered_href_is_flagged() {
        let policy = EnforcementPolicy::default();
        let (doc, nodes, href) = applied_document(&policy);
        doc.set_attribute(nodes[0], "href", "https://attacker.example/favicon.ico");
        assert_eq!(
            persistence_violation(&doc.head(), &nodes, &href, &policy),
            Some("managed href tampered")
        );
    }

    #[test]
    fn removed_style_is_flagged_only_when_hiding_enabled() {
        let policy = EnforcementPolicy {
            add_css_hiding: false,
            ..EnforcementPolicy::default()
        };
        let (doc, nodes, href) = applied_document(&policy);
        assert_eq!(
            persistence_violation(&doc.head(), &nodes, &href, &policy),
            None
        );

        let policy = EnforcementPolicy::default();
        let (doc, nodes, href) = applied_document(&policy);
        let style = doc
            .head()
            .into_iter()
            .find(|element| element.attribute("id") == Some(HIDING_STYLE_ID))
            .expect("style present");
        doc.remove(style.id);
        assert_eq!(
            persistence_violation(&doc.head(), &nodes, &href, &policy),
            Some("hiding style removed")
        );
    }

    #[test]
    fn foreign_favicon_is_flagged_when_removal_enabled() {
        let policy = EnforcementPolicy::default();
        let (doc, nodes, href) = applied_document(&policy);
        doc.append_link(LinkInit::new("icon", "/favicon.ico"));
        assert_eq!(
            persistence_violation(&doc.head(), &nodes, &href, &policy),
            Some("foreign favicon tags reappeared")
        );

        let tolerant = EnforcementPolicy {
            remove_existing_icons: false,
            ..EnforcementPolicy::default()
        };
        let (doc, nodes, href) = applied_document(&tolerant);
        doc.append_link(LinkInit::new("icon", "/favicon.ico"));
        assert_eq!(
            persistence_violation(&doc.head(), &nodes, &href, &tolerant),
            None
        );
    }

    #[test]
    fn jitter_respects_bounds_and_disable_switches() {
        let mut persistence = PersistencePolicy::default();
        for _ in 0..64 {
            let interval = jittered_interval(&persistence).expect("enabled interval");
            let millis = interval.as_millis();
            assert!((320..=480).contains(&millis), "jitter out of range: {millis}");
        }

        persistence.check_interval_time = 0;
        assert!(jittered_interval(&persistence).is_none());

        persistence.check_interval_time = 60;
        persistence.randomization_factor = 1.0;
        for _ in 0..64 {
            let interval = jittered_interval(&persistence).expect("enabled interval");
            assert!(interval.as_millis() >= 50);
        }

        persistence.enabled = false;
        assert!(jittered_interval(&persistence).is_none());
    }
}
