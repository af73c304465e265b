//! Mutation observation types.

use tokio::sync::mpsc;

use sigil_model::MutationWatch;

use crate::element::NodeId;

/// Identifier of a connected observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// What changed in an observed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// A node was attached or detached.
    ChildList,
    /// An attribute changed.
    Attributes {
        /// Name of the changed attribute.
        attribute: String,
    },
    /// Text content changed.
    CharacterData,
}

/// One observed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Node the mutation targeted.
    pub target: NodeId,
    /// What changed.
    pub kind: MutationKind,
}

/// Records delivered together in one observer callback.
pub type MutationBatch = Vec<MutationRecord>;

/// Channel an observer's batches are delivered on.
pub type MutationSink = mpsc::UnboundedSender<MutationBatch>;

/// Observation settings.
///
/// Child-list and character-data changes are always reported; attribute
/// changes are limited to `attribute_filter` when it is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Attribute names whose changes are reported; empty reports all.
    pub attribute_filter: Vec<String>,
    /// Optional selector narrowing the observed subtree.
    pub target_selector: Option<String>,
}

impl ObserveOptions {
    /// Derive observation settings from an enforcement policy's watch
    /// block.
    #[must_use]
    pub fn from_watch(watch: &MutationWatch) -> Self {
        Self {
            attribute_filter: watch.attribute_filter.clone(),
            target_selector: watch.target_selector.clone(),
        }
    }

    /// Whether a change to `attribute` passes the filter.
    #[must_use]
    pub fn observes_attribute(&self, attribute: &str) -> bool {
        self.attribute_filter.is_empty()
            || self
                .attribute_filter
                .iter()
                .any(|name| name == attribute)
    }
}
