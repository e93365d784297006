//! # Corvus Graph
//!
//! The property-graph contract the executor runs against:
//! - [`GraphModel`] - read methods plus a single-commit write surface
//! - [`WriteJournal`] - buffered mutations, applied atomically at commit
//! - [`InMemoryGraph`] - the reference implementation used by tests and demos
//!
//! Read methods are snapshot-consistent within a single query: buffered
//! writes become visible only after `commit`.

pub mod journal;
pub mod memory;

pub use journal::{CommitSummary, WriteJournal, WriteOp};
pub use memory::{GraphBuilder, InMemoryGraph};

use corvus_core::{Direction, Label, NodeId, PropertyValue, RelId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors surfaced by a graph model.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Node id not present in the graph
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// Relationship id not present in the graph
    #[error("unknown relationship: {0}")]
    UnknownRel(RelId),

    /// A write violated a structural constraint
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Backend I/O failure
    #[error("graph I/O error: {0}")]
    Io(String),
}

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// A node as read from the graph: id, labels, and a property map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub labels: Vec<Label>,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl NodeRecord {
    /// Looks up a property by key.
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Returns true if the node carries the label.
    pub fn has_label(&self, label: &Label) -> bool {
        self.labels.contains(label)
    }
}

/// A relationship as read from the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelRecord {
    pub id: RelId,
    pub start: NodeId,
    pub end: NodeId,
    pub rel_type: Option<Label>,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl RelRecord {
    /// Looks up a property by key.
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// The endpoint opposite to `node`.
    pub fn other_end(&self, node: NodeId) -> NodeId {
        if self.start == node {
            self.end
        } else {
            self.start
        }
    }
}

/// The abstract property-graph store the executor reads from and commits to.
///
/// Implementations must keep read methods cheap to call repeatedly; the
/// executor re-scans freely. All mutation goes through a [`WriteJournal`]
/// handed to `commit` exactly once per successful query run.
pub trait GraphModel {
    /// All nodes carrying every given label and matching every property
    /// filter. Empty filters match everything.
    fn nodes<'a>(
        &'a self,
        labels: &'a [Label],
        props: &'a [(String, PropertyValue)],
    ) -> Box<dyn Iterator<Item = NodeRecord> + 'a>;

    /// All relationships whose type is in `types` (any type when empty).
    fn relationships<'a>(&'a self, types: &'a [Label])
        -> Box<dyn Iterator<Item = RelRecord> + 'a>;

    /// Relationships incident to `from` in the given direction whose type is
    /// in `types` (any when empty), paired with the node at the far end.
    fn expand<'a>(
        &'a self,
        from: NodeId,
        direction: Direction,
        types: &'a [Label],
    ) -> Box<dyn Iterator<Item = (RelRecord, NodeRecord)> + 'a>;

    /// Direct node lookup.
    fn node_by_id(&self, id: NodeId) -> Option<NodeRecord>;

    /// Direct relationship lookup.
    fn rel_by_id(&self, id: RelId) -> Option<RelRecord>;

    /// True if any node carries the label. Scans that name an unknown label
    /// are legal (they produce no rows); callers may warn.
    fn has_label(&self, label: &Label) -> bool;

    /// True if any relationship carries the type.
    fn has_rel_type(&self, rel_type: &Label) -> bool;

    /// The smallest id not yet assigned to a node. Seeds journal allocation
    /// so created entities are observable before commit.
    fn next_node_id(&self) -> u64;

    /// The smallest id not yet assigned to a relationship.
    fn next_rel_id(&self) -> u64;

    /// Applies every buffered write atomically from the query's point of
    /// view. Called at most once per run; an error leaves the graph
    /// untouched.
    fn commit(&mut self, journal: WriteJournal) -> Result<CommitSummary>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64) -> NodeRecord {
        NodeRecord {
            id: NodeId::new(id),
            labels: vec![Label::new("Person")],
            properties: BTreeMap::new(),
        }
    }

    #[test]
    fn test_node_record_labels() {
        let n = node(1);
        assert!(n.has_label(&Label::new("Person")));
        assert!(!n.has_label(&Label::new("Animal")));
    }

    #[test]
    fn test_rel_other_end() {
        let r = RelRecord {
            id: RelId::new(0),
            start: NodeId::new(1),
            end: NodeId::new(2),
            rel_type: Some(Label::new("KNOWS")),
            properties: BTreeMap::new(),
        };
        assert_eq!(r.other_end(NodeId::new(1)), NodeId::new(2));
        assert_eq!(r.other_end(NodeId::new(2)), NodeId::new(1));
    }
}
