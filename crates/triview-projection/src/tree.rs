//! Tree projection
//!
//! Definitions are roots; usages hang under the definition their `of`
//! relation points to. Usages whose `of` is absent, dangling, or points at a
//! non-definition go under one synthetic unassigned root. Dependencies are
//! collected under a second synthetic root so every entity has a node. The
//! synthetic roots follow the definitions, unassigned first, and only exist
//! when they have children.

use im::{HashMap, Vector};
use std::collections::HashMap as StdHashMap;
use std::fmt;
use std::sync::Arc;
use triview_model::{Entity, EntityId, EntityKind, RelationRole, Status};
use triview_store::{SelectionSet, StoreReadGuard};

use crate::engine::EntityComparator;

/// Label of the synthetic root collecting orphaned usages
pub const UNASSIGNED_LABEL: &str = "Unassigned";

/// Label of the synthetic root collecting dependencies
pub const DEPENDENCIES_LABEL: &str = "Dependencies";

/// Identity of a tree node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TreeKey {
    /// Node backed by an entity
    Entity(EntityId),
    /// Synthetic unassigned root
    Unassigned,
    /// Synthetic dependencies root
    Dependencies,
}

impl TreeKey {
    /// Entity id, if the node is backed by one
    #[must_use]
    pub fn entity_id(&self) -> Option<&EntityId> {
        match self {
            Self::Entity(id) => Some(id),
            Self::Unassigned | Self::Dependencies => None,
        }
    }
}

impl fmt::Display for TreeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(id) => write!(f, "{id}"),
            Self::Unassigned => f.write_str(UNASSIGNED_LABEL),
            Self::Dependencies => f.write_str(DEPENDENCIES_LABEL),
        }
    }
}

/// One node of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Node identity
    pub key: TreeKey,
    /// Entity kind, `None` for synthetic roots
    pub kind: Option<EntityKind>,
    /// Display label
    pub label: String,
    /// Entity status
    pub status: Option<Status>,
    /// Whether the id is in the selection snapshot of this view
    pub selected: bool,
    /// Child nodes in display order
    pub children: Vector<TreeNode>,
}

impl TreeNode {
    fn from_entity(entity: &Entity, selected: bool) -> Self {
        Self {
            key: TreeKey::Entity(entity.id.clone()),
            kind: Some(entity.kind()),
            label: entity.label().to_string(),
            status: entity.attributes.status,
            selected,
            children: Vector::new(),
        }
    }

    fn synthetic(key: TreeKey, children: Vector<TreeNode>) -> Self {
        Self {
            label: key.to_string(),
            key,
            kind: None,
            status: None,
            selected: false,
            children,
        }
    }

    /// Entity id, if the node is backed by one
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<&EntityId> {
        self.key.entity_id()
    }

    fn refresh_from(&mut self, entity: &Entity) {
        self.label = entity.label().to_string();
        self.status = entity.attributes.status;
    }
}

/// Position of an entity node: root index, then child index
type NodePath = (usize, Option<usize>);

/// Tree view model
#[derive(Debug, Clone)]
pub struct TreeView {
    store_version: u64,
    selection: Arc<SelectionSet>,
    roots: Vector<TreeNode>,
    paths: HashMap<EntityId, NodePath>,
}

impl TreeView {
    pub(crate) fn build(
        store: &StoreReadGuard<'_>,
        selection: &Arc<SelectionSet>,
        comparator: Option<&EntityComparator>,
    ) -> Self {
        let mut definitions: Vec<&Arc<Entity>> = Vec::new();
        let mut grouped: StdHashMap<&str, Vec<&Arc<Entity>>> = StdHashMap::new();
        let mut orphans: Vec<&Arc<Entity>> = Vec::new();
        let mut dependencies: Vec<&Arc<Entity>> = Vec::new();

        for entity in store.iter() {
            match entity.kind() {
                EntityKind::Definition => definitions.push(entity),
                EntityKind::Usage => {
                    let parent = entity
                        .relation(RelationRole::Of)
                        .filter(|of| {
                            store
                                .get(of.as_str())
                                .is_some_and(|p| p.kind() == EntityKind::Definition)
                        });
                    match parent {
                        Some(of) => grouped.entry(of.as_str()).or_default().push(entity),
                        None => orphans.push(entity),
                    }
                }
                EntityKind::Dependency => dependencies.push(entity),
            }
        }

        if let Some(cmp) = comparator {
            definitions.sort_by(|a, b| cmp(a, b));
            orphans.sort_by(|a, b| cmp(a, b));
            dependencies.sort_by(|a, b| cmp(a, b));
            for children in grouped.values_mut() {
                children.sort_by(|a, b| cmp(a, b));
            }
        }

        let mut roots = Vector::new();
        let mut paths = HashMap::new();
        let node = |e: &Entity| TreeNode::from_entity(e, selection.contains(e.id.as_str()));

        for def in definitions {
            let root_idx = roots.len();
            let mut root = node(def);
            if let Some(children) = grouped.get(def.id.as_str()) {
                for (child_idx, usage) in children.iter().enumerate() {
                    paths.insert(usage.id.clone(), (root_idx, Some(child_idx)));
                    root.children.push_back(node(usage));
                }
            }
            paths.insert(def.id.clone(), (root_idx, None));
            roots.push_back(root);
        }

        for (key, members) in [
            (TreeKey::Unassigned, orphans),
            (TreeKey::Dependencies, dependencies),
        ] {
            if members.is_empty() {
                continue;
            }
            let root_idx = roots.len();
            let mut children = Vector::new();
            for (child_idx, entity) in members.iter().enumerate() {
                paths.insert(entity.id.clone(), (root_idx, Some(child_idx)));
                children.push_back(node(entity));
            }
            roots.push_back(TreeNode::synthetic(key, children));
        }

        Self {
            store_version: store.version(),
            selection: Arc::clone(selection),
            roots,
            paths,
        }
    }

    /// Refresh labels and statuses of `ids` in place
    ///
    /// Only valid for non-structural changes without a comparator: node
    /// positions cannot move. Returns the number of nodes touched.
    pub(crate) fn apply_attribute_changes(
        &mut self,
        store: &StoreReadGuard<'_>,
        ids: &[EntityId],
    ) -> usize {
        let mut touched = 0;
        for id in ids {
            let (Some(&(root_idx, child_idx)), Some(entity)) =
                (self.paths.get(id), store.get(id.as_str()))
            else {
                continue;
            };
            let Some(root) = self.roots.get_mut(root_idx) else {
                continue;
            };
            let node = match child_idx {
                None => Some(root),
                Some(c) => root.children.get_mut(c),
            };
            if let Some(node) = node {
                node.refresh_from(entity);
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

    /// Root nodes in display order
    #[inline]
    #[must_use]
    pub fn roots(&self) -> &Vector<TreeNode> {
        &self.roots
    }

    /// Root backed by entity `id`
    #[must_use]
    pub fn root(&self, id: &str) -> Option<&TreeNode> {
        match self.paths.get(id) {
            Some(&(root_idx, None)) => self.roots.get(root_idx),
            _ => None,
        }
    }

    /// Synthetic unassigned root, if any usage is orphaned
    #[must_use]
    pub fn unassigned(&self) -> Option<&TreeNode> {
        self.synthetic_root(&TreeKey::Unassigned)
    }

    /// Synthetic dependencies root, if the store holds any dependency
    #[must_use]
    pub fn dependencies(&self) -> Option<&TreeNode> {
        self.synthetic_root(&TreeKey::Dependencies)
    }

    fn synthetic_root(&self, key: &TreeKey) -> Option<&TreeNode> {
        // Synthetic roots trail the definitions
        self.roots.iter().rev().take(2).find(|root| &root.key == key)
    }

    /// Node backed by entity `id`, root or child
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&TreeNode> {
        let &(root_idx, child_idx) = self.paths.get(id)?;
        let root = self.roots.get(root_idx)?;
        match child_idx {
            None => Some(root),
            Some(c) => root.children.get(c),
        }
    }

    /// Key of the parent of entity `id`, `None` for roots and absent ids
    #[must_use]
    pub fn parent_of(&self, id: &str) -> Option<&TreeKey> {
        match self.paths.get(id) {
            Some(&(root_idx, Some(_))) => self.roots.get(root_idx).map(|r| &r.key),
            _ => None,
        }
    }

    /// Number of entity-backed nodes
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.paths.len()
    }

    /// Depth-first walk over every node
    pub fn walk(&self) -> impl Iterator<Item = &TreeNode> + '_ {
        self.roots
            .iter()
            .flat_map(|root| std::iter::once(root).chain(root.children.iter()))
    }

    /// Ids of nodes marked selected
    #[must_use]
    pub fn selected_ids(&self) -> Vec<EntityId> {
        self.walk()
            .filter(|n| n.selected)
            .filter_map(|n| n.id().cloned())
            .collect()
    }
}
