//! The write journal.
//!
//! Mutation operators never touch the graph directly. They append to a
//! journal owned by the running query; the runner hands the journal to
//! [`GraphModel::commit`](crate::GraphModel::commit) exactly once after the
//! root operator is drained. On error the journal is dropped and no write
//! becomes visible.

use crate::{NodeRecord, RelRecord};
use corvus_core::{Label, NodeId, PropertyValue, RelId};
use std::collections::BTreeMap;

/// A single buffered write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create a node with a pre-allocated id
    CreateNode {
        id: NodeId,
        labels: Vec<Label>,
        properties: BTreeMap<String, PropertyValue>,
    },
    /// Create a relationship with a pre-allocated id
    CreateRel {
        id: RelId,
        start: NodeId,
        end: NodeId,
        rel_type: Option<Label>,
        properties: BTreeMap<String, PropertyValue>,
    },
    /// Set (or overwrite) a node property
    SetNodeProperty {
        id: NodeId,
        key: String,
        value: PropertyValue,
    },
    /// Set (or overwrite) a relationship property
    SetRelProperty {
        id: RelId,
        key: String,
        value: PropertyValue,
    },
    /// Delete a node; `detach` removes incident relationships first
    DeleteNode { id: NodeId, detach: bool },
    /// Delete a relationship
    DeleteRel { id: RelId },
}

/// Buffered writes plus the id allocator for entities created this query.
///
/// Ids are allocated eagerly so mutation operators can emit the entities
/// they created, even though the graph will not contain them until commit.
#[derive(Debug, Clone, Default)]
pub struct WriteJournal {
    next_node_id: u64,
    next_rel_id: u64,
    ops: Vec<WriteOp>,
}

impl WriteJournal {
    /// Creates a journal whose id allocation starts at the graph's current
    /// ceilings.
    pub fn new(next_node_id: u64, next_rel_id: u64) -> Self {
        Self {
            next_node_id,
            next_rel_id,
            ops: Vec::new(),
        }
    }

    /// Buffers a node creation and returns the created record.
    pub fn create_node(
        &mut self,
        labels: Vec<Label>,
        properties: BTreeMap<String, PropertyValue>,
    ) -> NodeRecord {
        let id = NodeId::new(self.next_node_id);
        self.next_node_id += 1;
        self.ops.push(WriteOp::CreateNode {
            id,
            labels: labels.clone(),
            properties: properties.clone(),
        });
        NodeRecord {
            id,
            labels,
            properties,
        }
    }

    /// Buffers a relationship creation and returns the created record.
    pub fn create_rel(
        &mut self,
        start: NodeId,
        end: NodeId,
        rel_type: Option<Label>,
        properties: BTreeMap<String, PropertyValue>,
    ) -> RelRecord {
        let id = RelId::new(self.next_rel_id);
        self.next_rel_id += 1;
        self.ops.push(WriteOp::CreateRel {
            id,
            start,
            end,
            rel_type: rel_type.clone(),
            properties: properties.clone(),
        });
        RelRecord {
            id,
            start,
            end,
            rel_type,
            properties,
        }
    }

    /// Buffers a node property write.
    pub fn set_node_property(&mut self, id: NodeId, key: impl Into<String>, value: PropertyValue) {
        self.ops.push(WriteOp::SetNodeProperty {
            id,
            key: key.into(),
            value,
        });
    }

    /// Buffers a relationship property write.
    pub fn set_rel_property(&mut self, id: RelId, key: impl Into<String>, value: PropertyValue) {
        self.ops.push(WriteOp::SetRelProperty {
            id,
            key: key.into(),
            value,
        });
    }

    /// Buffers a node deletion.
    pub fn delete_node(&mut self, id: NodeId, detach: bool) {
        self.ops.push(WriteOp::DeleteNode { id, detach });
    }

    /// Buffers a relationship deletion.
    pub fn delete_rel(&mut self, id: RelId) {
        self.ops.push(WriteOp::DeleteRel { id });
    }

    /// Number of buffered writes.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when nothing was buffered.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The buffered writes in application order.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Consumes the journal into its writes.
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// What a commit changed, for logging and result statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub nodes_created: usize,
    pub rels_created: usize,
    pub properties_set: usize,
    pub nodes_deleted: usize,
    pub rels_deleted: usize,
}

impl CommitSummary {
    /// True when the commit was a no-op.
    pub fn is_empty(&self) -> bool {
        *self == CommitSummary::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_allocates_sequential_ids() {
        let mut journal = WriteJournal::new(10, 0);
        let a = journal.create_node(vec![Label::new("Person")], BTreeMap::new());
        let b = journal.create_node(vec![], BTreeMap::new());
        assert_eq!(a.id, NodeId::new(10));
        assert_eq!(b.id, NodeId::new(11));
        assert_eq!(journal.len(), 2);
    }

    #[test]
    fn test_journal_created_rel_record() {
        let mut journal = WriteJournal::new(0, 5);
        let rel = journal.create_rel(
            NodeId::new(1),
            NodeId::new(2),
            Some(Label::new("KNOWS")),
            BTreeMap::new(),
        );
        assert_eq!(rel.id, RelId::new(5));
        assert_eq!(rel.start, NodeId::new(1));
        assert_eq!(rel.end, NodeId::new(2));
        assert!(matches!(journal.ops()[0], WriteOp::CreateRel { .. }));
    }
}
