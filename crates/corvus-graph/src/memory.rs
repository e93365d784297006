//! In-memory reference graph.
//!
//! Backs the test suites and any embedded use that does not need
//! persistence. Scans are linear; this implementation optimizes for
//! obviousness, not throughput.

use crate::journal::{CommitSummary, WriteJournal, WriteOp};
use crate::{GraphError, GraphModel, NodeRecord, RelRecord, Result};
use corvus_core::{Direction, Label, NodeId, PropertyValue, RelId};
use std::collections::BTreeMap;
use tracing::debug;

/// A whole-graph-in-memory implementation of [`GraphModel`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    nodes: BTreeMap<NodeId, NodeRecord>,
    rels: BTreeMap<RelId, RelRecord>,
}

impl InMemoryGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a builder for test and demo graphs.
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of relationships in the graph.
    pub fn rel_count(&self) -> usize {
        self.rels.len()
    }

    fn matches_filters(
        record: &NodeRecord,
        labels: &[Label],
        props: &[(String, PropertyValue)],
    ) -> bool {
        labels.iter().all(|l| record.labels.contains(l))
            && props
                .iter()
                .all(|(k, v)| record.properties.get(k) == Some(v))
    }
}

impl GraphModel for InMemoryGraph {
    fn nodes<'a>(
        &'a self,
        labels: &'a [Label],
        props: &'a [(String, PropertyValue)],
    ) -> Box<dyn Iterator<Item = NodeRecord> + 'a> {
        Box::new(
            self.nodes
                .values()
                .filter(move |n| Self::matches_filters(n, labels, props))
                .cloned(),
        )
    }

    fn relationships<'a>(
        &'a self,
        types: &'a [Label],
    ) -> Box<dyn Iterator<Item = RelRecord> + 'a> {
        Box::new(
            self.rels
                .values()
                .filter(move |r| {
                    types.is_empty() || r.rel_type.as_ref().is_some_and(|t| types.contains(t))
                })
                .cloned(),
        )
    }

    fn expand<'a>(
        &'a self,
        from: NodeId,
        direction: Direction,
        types: &'a [Label],
    ) -> Box<dyn Iterator<Item = (RelRecord, NodeRecord)> + 'a> {
        Box::new(
            self.rels
                .values()
                .filter(move |r| match direction {
                    Direction::Outgoing => r.start == from,
                    Direction::Incoming => r.end == from,
                    Direction::Both => r.start == from || r.end == from,
                })
                .filter(move |r| {
                    types.is_empty() || r.rel_type.as_ref().is_some_and(|t| types.contains(t))
                })
                .filter_map(move |r| {
                    let other = r.other_end(from);
                    self.nodes.get(&other).map(|n| (r.clone(), n.clone()))
                }),
        )
    }

    fn node_by_id(&self, id: NodeId) -> Option<NodeRecord> {
        self.nodes.get(&id).cloned()
    }

    fn rel_by_id(&self, id: RelId) -> Option<RelRecord> {
        self.rels.get(&id).cloned()
    }

    fn has_label(&self, label: &Label) -> bool {
        self.nodes.values().any(|n| n.labels.contains(label))
    }

    fn has_rel_type(&self, rel_type: &Label) -> bool {
        self.rels
            .values()
            .any(|r| r.rel_type.as_ref() == Some(rel_type))
    }

    fn next_node_id(&self) -> u64 {
        self.nodes
            .keys()
            .next_back()
            .map(|id| id.as_u64() + 1)
            .unwrap_or(0)
    }

    fn next_rel_id(&self) -> u64 {
        self.rels
            .keys()
            .next_back()
            .map(|id| id.as_u64() + 1)
            .unwrap_or(0)
    }

    fn commit(&mut self, journal: WriteJournal) -> Result<CommitSummary> {
        // Validate against a scratch copy first so a failed commit leaves
        // the graph untouched.
        let mut staged = self.clone();
        let mut summary = CommitSummary::default();

        for op in journal.into_ops() {
            match op {
                WriteOp::CreateNode {
                    id,
                    labels,
                    properties,
                } => {
                    staged.nodes.insert(
                        id,
                        NodeRecord {
                            id,
                            labels,
                            properties,
                        },
                    );
                    summary.nodes_created += 1;
                }
                WriteOp::CreateRel {
                    id,
                    start,
                    end,
                    rel_type,
                    properties,
                } => {
                    if !staged.nodes.contains_key(&start) {
                        return Err(GraphError::UnknownNode(start));
                    }
                    if !staged.nodes.contains_key(&end) {
                        return Err(GraphError::UnknownNode(end));
                    }
                    staged.rels.insert(
                        id,
                        RelRecord {
                            id,
                            start,
                            end,
                            rel_type,
                            properties,
                        },
                    );
                    summary.rels_created += 1;
                }
                WriteOp::SetNodeProperty { id, key, value } => {
                    let node = staged
                        .nodes
                        .get_mut(&id)
                        .ok_or(GraphError::UnknownNode(id))?;
                    if value.is_null() {
                        node.properties.remove(&key);
                    } else {
                        node.properties.insert(key, value);
                    }
                    summary.properties_set += 1;
                }
                WriteOp::SetRelProperty { id, key, value } => {
                    let rel = staged.rels.get_mut(&id).ok_or(GraphError::UnknownRel(id))?;
                    if value.is_null() {
                        rel.properties.remove(&key);
                    } else {
                        rel.properties.insert(key, value);
                    }
                    summary.properties_set += 1;
                }
                WriteOp::DeleteNode { id, detach } => {
                    if !staged.nodes.contains_key(&id) {
                        return Err(GraphError::UnknownNode(id));
                    }
                    let incident: Vec<RelId> = staged
                        .rels
                        .values()
                        .filter(|r| r.start == id || r.end == id)
                        .map(|r| r.id)
                        .collect();
                    if !incident.is_empty() {
                        if !detach {
                            return Err(GraphError::ConstraintViolation(format!(
                                "cannot delete {} with {} incident relationship(s); use DETACH DELETE",
                                id,
                                incident.len()
                            )));
                        }
                        for rid in incident {
                            staged.rels.remove(&rid);
                            summary.rels_deleted += 1;
                        }
                    }
                    staged.nodes.remove(&id);
                    summary.nodes_deleted += 1;
                }
                WriteOp::DeleteRel { id } => {
                    if staged.rels.remove(&id).is_none() {
                        return Err(GraphError::UnknownRel(id));
                    }
                    summary.rels_deleted += 1;
                }
            }
        }

        *self = staged;
        debug!(
            nodes_created = summary.nodes_created,
            rels_created = summary.rels_created,
            properties_set = summary.properties_set,
            nodes_deleted = summary.nodes_deleted,
            rels_deleted = summary.rels_deleted,
            "graph commit applied"
        );
        Ok(summary)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Fluent construction of in-memory graphs for tests and demos.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: InMemoryGraph,
    next_rel: u64,
}

impl GraphBuilder {
    /// Adds a node with no labels.
    pub fn add_node<K, V, P>(self, id: u64, props: P) -> Self
    where
        K: Into<String>,
        V: Into<PropertyValue>,
        P: IntoIterator<Item = (K, V)>,
    {
        self.add_labeled_node(id, Vec::<String>::new(), props)
    }

    /// Adds a node with labels and properties.
    pub fn add_labeled_node<L, K, V, P>(mut self, id: u64, labels: L, props: P) -> Self
    where
        L: IntoLabels,
        K: Into<String>,
        V: Into<PropertyValue>,
        P: IntoIterator<Item = (K, V)>,
    {
        let id = NodeId::new(id);
        self.graph.nodes.insert(
            id,
            NodeRecord {
                id,
                labels: labels.into_labels(),
                properties: props
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            },
        );
        self
    }

    /// Adds a relationship between existing nodes.
    pub fn add_rel(mut self, start: u64, end: u64, rel_type: impl Into<String>) -> Self {
        let id = RelId::new(self.next_rel);
        self.next_rel += 1;
        self.graph.rels.insert(
            id,
            RelRecord {
                id,
                start: NodeId::new(start),
                end: NodeId::new(end),
                rel_type: Some(Label::new(rel_type)),
                properties: BTreeMap::new(),
            },
        );
        self
    }

    /// Finishes the build.
    pub fn build(self) -> InMemoryGraph {
        self.graph
    }
}

/// Label sugar for the builder: a single label or a list of them.
pub trait IntoLabels {
    fn into_labels(self) -> Vec<Label>;
}

impl IntoLabels for &str {
    fn into_labels(self) -> Vec<Label> {
        vec![Label::new(self)]
    }
}

impl IntoLabels for Vec<String> {
    fn into_labels(self) -> Vec<Label> {
        self.into_iter().map(Label::new).collect()
    }
}

impl IntoLabels for Vec<&str> {
    fn into_labels(self) -> Vec<Label> {
        self.into_iter().map(Label::new).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InMemoryGraph {
        InMemoryGraph::builder()
            .add_labeled_node(0, "Person", [("name", "Alice")])
            .add_labeled_node(1, "Person", [("name", "Bob")])
            .add_labeled_node(2, "City", [("name", "Oslo")])
            .add_rel(0, 1, "KNOWS")
            .add_rel(0, 2, "LIVES_IN")
            .build()
    }

    #[test]
    fn test_scan_by_label() {
        let g = sample();
        let people: Vec<_> = g.nodes(&[Label::new("Person")], &[]).collect();
        assert_eq!(people.len(), 2);
        assert_eq!(g.nodes(&[Label::new("Robot")], &[]).count(), 0);
    }

    #[test]
    fn test_scan_by_property() {
        let g = sample();
        let filter = [("name".to_string(), PropertyValue::from("Alice"))];
        let hits: Vec<_> = g.nodes(&[], &filter).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, NodeId::new(0));
    }

    #[test]
    fn test_expand_directions() {
        let g = sample();
        let out: Vec<_> = g.expand(NodeId::new(0), Direction::Outgoing, &[]).collect();
        assert_eq!(out.len(), 2);

        let typed: Vec<_> = g
            .expand(NodeId::new(0), Direction::Outgoing, &[Label::new("KNOWS")])
            .collect();
        assert_eq!(typed.len(), 1);
        assert_eq!(typed[0].1.id, NodeId::new(1));

        let incoming: Vec<_> = g.expand(NodeId::new(1), Direction::Incoming, &[]).collect();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].1.id, NodeId::new(0));

        let both: Vec<_> = g.expand(NodeId::new(1), Direction::Both, &[]).collect();
        assert_eq!(both.len(), 1);
    }

    #[test]
    fn test_commit_create_and_set() {
        let mut g = sample();
        let mut journal = WriteJournal::new(g.next_node_id(), g.next_rel_id());
        let created = journal.create_node(vec![Label::new("Person")], BTreeMap::new());
        journal.set_node_property(created.id, "name", PropertyValue::from("Cid"));
        journal.set_node_property(NodeId::new(0), "age", PropertyValue::from(40i64));

        let summary = g.commit(journal).unwrap();
        assert_eq!(summary.nodes_created, 1);
        assert_eq!(summary.properties_set, 2);
        assert_eq!(
            g.node_by_id(created.id).unwrap().property("name"),
            Some(&PropertyValue::from("Cid"))
        );
    }

    #[test]
    fn test_commit_delete_requires_detach() {
        let mut g = sample();
        let mut journal = WriteJournal::new(g.next_node_id(), g.next_rel_id());
        journal.delete_node(NodeId::new(0), false);
        assert!(matches!(
            g.commit(journal),
            Err(GraphError::ConstraintViolation(_))
        ));
        // Failed commit left everything in place.
        assert_eq!(g.node_count(), 3);

        let mut journal = WriteJournal::new(g.next_node_id(), g.next_rel_id());
        journal.delete_node(NodeId::new(0), true);
        let summary = g.commit(journal).unwrap();
        assert_eq!(summary.nodes_deleted, 1);
        assert_eq!(summary.rels_deleted, 2);
        assert_eq!(g.rel_count(), 0);
    }

    #[test]
    fn test_setting_null_clears_property() {
        let mut g = sample();
        let mut journal = WriteJournal::new(g.next_node_id(), g.next_rel_id());
        journal.set_node_property(NodeId::new(0), "name", PropertyValue::Null);
        g.commit(journal).unwrap();
        assert_eq!(g.node_by_id(NodeId::new(0)).unwrap().property("name"), None);
    }
}
