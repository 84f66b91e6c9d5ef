//! Graph projection
//!
//! One node per entity and one edge per present relation reference. Edges
//! whose target is not in the store are kept and flagged
//! [`EdgeState::Unresolved`].

use im::{HashMap, Vector};
use petgraph::graphmap::DiGraphMap;
use std::sync::Arc;
use triview_model::{Entity, EntityId, EntityKind, RelationRole};
use triview_store::{SelectionSet, StoreReadGuard};

/// Whether an edge target exists in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeState {
    /// Target present
    Resolved,
    /// Target absent (dangling reference)
    Unresolved,
}

/// One graph node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// Entity id
    pub id: EntityId,
    /// Kind tag
    pub kind: EntityKind,
    /// Display label
    pub label: String,
    /// Whether the id is in the selection snapshot of this view
    pub selected: bool,
}

impl GraphNode {
    fn from_entity(entity: &Entity, selected: bool) -> Self {
        Self {
            id: entity.id.clone(),
            kind: entity.kind(),
            label: entity.label().to_string(),
            selected,
        }
    }
}

/// One directed edge, from the referencing entity to the referenced id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    /// Referencing entity
    pub source: EntityId,
    /// Referenced id
    pub target: EntityId,
    /// Relation role the reference was found under
    pub role: RelationRole,
    /// Resolution state of `target`
    pub state: EdgeState,
}

impl GraphEdge {
    /// Check if the target is dangling
    #[inline]
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        self.state == EdgeState::Unresolved
    }
}

/// Graph view model
#[derive(Debug, Clone)]
pub struct GraphView {
    store_version: u64,
    selection: Arc<SelectionSet>,
    nodes: Vector<GraphNode>,
    edges: Vector<GraphEdge>,
    index: HashMap<EntityId, usize>,
}

impl GraphView {
    pub(crate) fn build(store: &StoreReadGuard<'_>, selection: &Arc<SelectionSet>) -> Self {
        let mut nodes = Vector::new();
        let mut edges = Vector::new();
        let mut index = HashMap::new();

        for entity in store.iter() {
            index.insert(entity.id.clone(), nodes.len());
            nodes.push_back(GraphNode::from_entity(entity, selection.contains(entity.id.as_str())));

            for (role, target) in entity.relations() {
                let state = if store.contains(target.as_str()) {
                    EdgeState::Resolved
                } else {
                    EdgeState::Unresolved
                };
                edges.push_back(GraphEdge {
                    source: entity.id.clone(),
                    target: target.clone(),
                    role,
                    state,
                });
            }
        }

        Self {
            store_version: store.version(),
            selection: Arc::clone(selection),
            nodes,
            edges,
            index,
        }
    }

    /// Refresh labels of `ids` in place
    ///
    /// Only valid for non-structural changes: no node appears and no edge
    /// changes. Returns the number of nodes touched.
    pub(crate) fn apply_attribute_changes(
        &mut self,
        store: &StoreReadGuard<'_>,
        ids: &[EntityId],
    ) -> usize {
        let mut touched = 0;
        for id in ids {
            let (Some(&pos), Some(entity)) = (self.index.get(id), store.get(id.as_str())) else {
                continue;
            };
            if let Some(node) = self.nodes.get_mut(pos) {
                node.label = entity.label().to_string();
                touched += 1;
            }
        }
        self.store_version = store.version();
        touched
    }

    /// Store version this view was computed at
    #[inline]
    #[must_use]
    pub fn store_version(&self) -> u64 {
        self.store_version
    }

    /// Selection revision this view was computed at
    #[inline]
    #[must_use]
    pub fn selection_revision(&self) -> u64 {
        self.selection.revision()
    }

    /// Selection snapshot used to mark nodes
    #[inline]
    #[must_use]
    pub fn selection(&self) -> &Arc<SelectionSet> {
        &self.selection
    }

    /// Nodes in store order
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &Vector<GraphNode> {
        &self.nodes
    }

    /// Edges grouped by source in store order
    #[inline]
    #[must_use]
    pub fn edges(&self) -> &Vector<GraphEdge> {
        &self.edges
    }

    /// Node for `id`
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).and_then(|&pos| self.nodes.get(pos))
    }

    /// Outgoing edges of `id`
    pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.source.as_str() == id)
    }

    /// Incoming edges of `id`
    pub fn edges_to<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.target.as_str() == id)
    }

    /// Edges whose target is dangling
    pub fn unresolved_edges(&self) -> impl Iterator<Item = &GraphEdge> + '_ {
        self.edges.iter().filter(|e| e.is_unresolved())
    }

    /// Present entities linked to `id` by a resolved edge in either direction
    ///
    /// Order follows edge order; each neighbor appears once.
    #[must_use]
    pub fn neighbors(&self, id: &str) -> Vec<&EntityId> {
        let mut seen: Vec<&EntityId> = Vec::new();
        for edge in self.edges.iter().filter(|e| e.state == EdgeState::Resolved) {
            let other = if edge.source.as_str() == id {
                &edge.target
            } else if edge.target.as_str() == id {
                &edge.source
            } else {
                continue;
            };
            if other.as_str() != id && !seen.contains(&other) {
                seen.push(other);
            }
        }
        seen
    }

    /// Ids of nodes marked selected
    #[must_use]
    pub fn selected_ids(&self) -> Vec<EntityId> {
        self.nodes
            .iter()
            .filter(|n| n.selected)
            .map(|n| n.id.clone())
            .collect()
    }

    /// Export for layout: every node, resolved edges only
    ///
    /// A graph map holds one edge per ordered pair, so two relations between
    /// the same pair collapse into the later one.
    #[must_use]
    pub fn to_petgraph(&self) -> DiGraphMap<&str, RelationRole> {
        let mut graph = DiGraphMap::with_capacity(self.nodes.len(), self.edges.len());
        for node in &self.nodes {
            graph.add_node(node.id.as_str());
        }
        for edge in self.edges.iter().filter(|e| e.state == EdgeState::Resolved) {
            graph.add_edge(edge.source.as_str(), edge.target.as_str(), edge.role);
        }
        graph
    }
}
