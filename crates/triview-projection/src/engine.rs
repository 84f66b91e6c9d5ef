//! Memoized projection engine
//!
//! [`ProjectionEngine`] keeps the last computed [`ProjectionSet`] keyed on
//! `(store version, selection revision)`. A read with an unchanged key is a
//! cache hit. When only the store moved and the selection snapshot is the
//! same, the engine asks the store's change log what changed and touches
//! only those rows and nodes; a selection change, a removal or a truncated
//! log forces a full recompute.
//!
//! # Locking
//!
//! A refresh takes the engine cache lock, then the store read lock, then
//! reads the selection snapshot. Store and selection mutators never take the
//! engine lock, so the order cannot invert.

use crate::graph::GraphView;
use crate::table::TableView;
use crate::tree::TreeView;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Weak};
use triview_model::{Entity, EntityId};
use triview_store::{
    Delta, NormalizedStore, SelectionCoordinator, SelectionSet, StoreEvent, StoreReadGuard,
    Subscribers, Subscription,
};

/// Explicit ordering for tree roots and children
pub type EntityComparator = Arc<dyn Fn(&Entity, &Entity) -> Ordering + Send + Sync>;

/// Signal that previously read views are stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Invalidation {
    /// Store version at the time of the signal
    pub store_version: u64,
    /// Selection revision at the time of the signal
    pub selection_revision: u64,
}

/// All three views computed from one store read and one selection snapshot
#[derive(Debug, Clone)]
pub struct ProjectionSet {
    /// Tree view
    pub tree: TreeView,
    /// Table view
    pub table: TableView,
    /// Graph view
    pub graph: GraphView,
}

impl ProjectionSet {
    fn build(
        store: &StoreReadGuard<'_>,
        selection: &Arc<SelectionSet>,
        comparator: Option<&EntityComparator>,
    ) -> Self {
        Self {
            tree: TreeView::build(store, selection, comparator),
            table: TableView::build(store, selection),
            graph: GraphView::build(store, selection),
        }
    }

    /// Store version of the set
    #[inline]
    #[must_use]
    pub fn store_version(&self) -> u64 {
        self.table.store_version()
    }

    /// Selection revision of the set
    #[inline]
    #[must_use]
    pub fn selection_revision(&self) -> u64 {
        self.table.selection_revision()
    }

    /// Memo key of the set
    #[must_use]
    pub fn key(&self) -> Invalidation {
        Invalidation {
            store_version: self.store_version(),
            selection_revision: self.selection_revision(),
        }
    }
}

/// Recompute counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionStats {
    /// Reads that rebuilt every view
    pub full_recomputes: u64,
    /// Reads that patched views from the change log
    pub incremental_recomputes: u64,
    /// Reads served from the memoized set
    pub cache_hits: u64,
    /// Rows and nodes patched by incremental reads
    pub rows_touched: u64,
}

/// Derives tree, table and graph views from a store and a selection
pub struct ProjectionEngine {
    store: Arc<NormalizedStore>,
    selection: Arc<SelectionCoordinator>,
    comparator: Option<EntityComparator>,
    cache: Mutex<Option<ProjectionSet>>,
    stats: Mutex<ProjectionStats>,
    subscribers: Arc<Subscribers<Invalidation>>,
    _store_sub: Subscription,
    _selection_sub: Subscription,
}

impl ProjectionEngine {
    /// Create engine over `store` and `selection`
    ///
    /// `selection` must be bound to the same store.
    #[must_use]
    pub fn new(store: Arc<NormalizedStore>, selection: Arc<SelectionCoordinator>) -> Self {
        let subscribers: Arc<Subscribers<Invalidation>> = Arc::new(Subscribers::new());

        let listeners = Arc::downgrade(&subscribers);
        let weak_selection: Weak<SelectionCoordinator> = Arc::downgrade(&selection);
        let store_sub = store.subscribe(move |event| {
            let unchanged = match event {
                StoreEvent::Merged { changed, .. } => changed.is_empty(),
                StoreEvent::Removed { removed, .. } => removed.is_empty(),
            };
            if unchanged {
                return;
            }
            let (Some(listeners), Some(selection)) = (listeners.upgrade(), weak_selection.upgrade())
            else {
                return;
            };
            listeners.notify(&Invalidation {
                store_version: event.version(),
                selection_revision: selection.revision(),
            });
        });

        let listeners = Arc::downgrade(&subscribers);
        let weak_store: Weak<NormalizedStore> = Arc::downgrade(&store);
        let selection_sub = selection.subscribe(move |set| {
            let (Some(listeners), Some(store)) = (listeners.upgrade(), weak_store.upgrade()) else {
                return;
            };
            listeners.notify(&Invalidation {
                store_version: store.version(),
                selection_revision: set.revision(),
            });
        });

        Self {
            store,
            selection,
            comparator: None,
            cache: Mutex::new(None),
            stats: Mutex::new(ProjectionStats::default()),
            subscribers,
            _store_sub: store_sub,
            _selection_sub: selection_sub,
        }
    }

    /// With explicit ordering for tree roots and children
    ///
    /// Without a comparator both follow store insertion order.
    #[must_use]
    pub fn with_comparator<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&Entity, &Entity) -> Ordering + Send + Sync + 'static,
    {
        self.comparator = Some(Arc::new(comparator));
        *self.cache.get_mut() = None;
        self
    }

    /// All three views at the current memo key
    pub fn views(&self) -> ProjectionSet {
        self.refresh()
    }

    /// Tree view at the current memo key
    pub fn tree_view(&self) -> TreeView {
        self.refresh().tree
    }

    /// Table view at the current memo key
    pub fn table_view(&self) -> TableView {
        self.refresh().table
    }

    /// Graph view at the current memo key
    pub fn graph_view(&self) -> GraphView {
        self.refresh().graph
    }

    /// Register a listener told whenever views become stale
    ///
    /// Fires after every effective store change and every selection change.
    /// Listeners typically schedule a read; they may call [`Self::views`].
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Invalidation) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(listener)
    }

    /// Recompute counters since construction
    #[must_use]
    pub fn stats(&self) -> ProjectionStats {
        *self.stats.lock()
    }

    /// Store the engine reads
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<NormalizedStore> {
        &self.store
    }

    /// Selection the engine marks
    #[inline]
    #[must_use]
    pub fn selection(&self) -> &Arc<SelectionCoordinator> {
        &self.selection
    }

    fn refresh(&self) -> ProjectionSet {
        let mut cache = self.cache.lock();
        let store = self.store.read();
        let selection = self.selection.current();
        let version = store.version();

        let next = match cache.take() {
            Some(prev)
                if prev.store_version() == version
                    && prev.selection_revision() == selection.revision() =>
            {
                self.stats.lock().cache_hits += 1;
                prev
            }
            Some(prev) if prev.selection_revision() == selection.revision() => {
                match store.changes_since(prev.store_version()) {
                    Delta::Upserted { ids, structural } => {
                        let ids: Vec<EntityId> = ids.into_iter().collect();
                        self.patch(prev, &store, &selection, &ids, structural)
                    }
                    Delta::Unchanged | Delta::Full => self.rebuild(&store, &selection),
                }
            }
            _ => self.rebuild(&store, &selection),
        };

        *cache = Some(next.clone());
        next
    }

    fn rebuild(&self, store: &StoreReadGuard<'_>, selection: &Arc<SelectionSet>) -> ProjectionSet {
        let set = ProjectionSet::build(store, selection, self.comparator.as_ref());
        self.stats.lock().full_recomputes += 1;
        tracing::debug!(
            store = %self.store.name(),
            version = store.version(),
            selection_revision = selection.revision(),
            entities = store.len(),
            "full projection recompute"
        );
        set
    }

    fn patch(
        &self,
        mut set: ProjectionSet,
        store: &StoreReadGuard<'_>,
        selection: &Arc<SelectionSet>,
        ids: &[EntityId],
        structural: bool,
    ) -> ProjectionSet {
        let mut touched = set.table.apply_upserts(store, ids);

        // A comparator may reorder on any attribute, so it needs a full tree
        if structural || self.comparator.is_some() {
            set.tree = TreeView::build(store, selection, self.comparator.as_ref());
        } else {
            touched += set.tree.apply_attribute_changes(store, ids);
        }

        if structural {
            set.graph = GraphView::build(store, selection);
        } else {
            touched += set.graph.apply_attribute_changes(store, ids);
        }

        {
            let mut stats = self.stats.lock();
            stats.incremental_recomputes += 1;
            stats.rows_touched += touched as u64;
        }
        tracing::debug!(
            store = %self.store.name(),
            version = store.version(),
            changed = ids.len(),
            structural,
            touched,
            "incremental projection recompute"
        );
        set
    }
}

impl fmt::Debug for ProjectionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionEngine")
            .field("store", &self.store.name())
            .field("comparator", &self.comparator.is_some())
            .field("stats", &*self.stats.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeKey;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use triview_model::{RelationRole, Status};
    use triview_store::SelectionMode;

    fn setup() -> (Arc<NormalizedStore>, Arc<SelectionCoordinator>, ProjectionEngine) {
        let store = Arc::new(NormalizedStore::new());
        let selection = Arc::new(SelectionCoordinator::new(Arc::clone(&store)));
        let engine = ProjectionEngine::new(Arc::clone(&store), Arc::clone(&selection));
        (store, selection, engine)
    }

    fn assert_same_views(a: &ProjectionSet, b: &ProjectionSet) {
        assert_eq!(a.tree.roots(), b.tree.roots());
        assert_eq!(a.table.rows(), b.table.rows());
        assert_eq!(a.graph.nodes(), b.graph.nodes());
        assert_eq!(a.graph.edges(), b.graph.edges());
    }

    #[test]
    fn scenario_merge_select_remove() {
        let (store, selection, engine) = setup();

        store.merge(vec![Entity::definition("R-1")]);
        store.merge(vec![Entity::usage("U-1", "R-1")]);
        let views = engine.views();
        let root = views.tree.root("R-1").unwrap();
        assert_eq!(views.tree.roots().len(), 1);
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].id().unwrap().as_str(), "U-1");

        selection.select("U-1", SelectionMode::Replace);
        let views = engine.views();
        assert!(views.table.row("U-1").unwrap().selected);
        assert!(!views.table.row("R-1").unwrap().selected);

        store.remove(["R-1"]);
        let views = engine.views();
        assert_eq!(views.tree.parent_of("U-1"), Some(&TreeKey::Unassigned));
        let edge = views.graph.edges_from("U-1").next().unwrap();
        assert_eq!(edge.role, RelationRole::Of);
        assert!(edge.is_unresolved());
        assert!(selection.is_selected("U-1"));
        assert!(views.tree.node("U-1").unwrap().selected);
    }

    #[test]
    fn unchanged_key_is_a_cache_hit() {
        let (store, _selection, engine) = setup();
        store.merge(vec![Entity::definition("R-1")]);

        engine.views();
        engine.tree_view();
        engine.graph_view();

        let stats = engine.stats();
        assert_eq!(stats.full_recomputes, 1);
        assert_eq!(stats.cache_hits, 2);
    }

    #[test]
    fn noop_merge_keeps_memo() {
        let (store, _selection, engine) = setup();
        store.merge(vec![Entity::definition("R-1")]);
        engine.views();

        store.merge(vec![Entity::definition("R-1")]);
        engine.views();

        assert_eq!(engine.stats().cache_hits, 1);
    }

    #[test]
    fn attribute_change_is_incremental() {
        let (store, _selection, engine) = setup();
        store.merge((0..20).map(|i| Entity::definition(format!("R-{i}"))));
        engine.views();

        store.merge(vec![Entity::definition("R-3").with_status(Status::Approved)]);
        let views = engine.views();

        let stats = engine.stats();
        assert_eq!(stats.full_recomputes, 1);
        assert_eq!(stats.incremental_recomputes, 1);
        assert_eq!(stats.rows_touched, 3);
        assert_eq!(views.table.row("R-3").unwrap().status, "approved");
        assert_eq!(views.tree.node("R-3").unwrap().status, Some(Status::Approved));
    }

    #[test]
    fn dependency_attribute_change_reaches_every_view() {
        let (store, _selection, engine) = setup();
        store.merge(vec![
            Entity::definition("R-1"),
            Entity::usage("U-1", "R-1"),
            Entity::dependency("D-1", "U-1", "R-1"),
        ]);
        engine.views();

        store.merge(vec![Entity::dependency("D-1", "U-1", "R-1").with_name("needs")]);
        let views = engine.views();

        assert_eq!(engine.stats().incremental_recomputes, 1);
        assert_eq!(engine.stats().rows_touched, 3);
        assert_eq!(views.tree.node("D-1").unwrap().label, "needs");
        assert_eq!(views.tree.parent_of("D-1"), Some(&TreeKey::Dependencies));
        assert_eq!(views.graph.node("D-1").unwrap().label, "needs");
    }

    #[test]
    fn new_entity_patches_table_and_rebuilds_shape() {
        let (store, _selection, engine) = setup();
        store.merge(vec![Entity::usage("U-1", "R-1")]);
        let before = engine.views();
        assert!(before.graph.edges()[0].is_unresolved());

        store.merge(vec![Entity::definition("R-1")]);
        let after = engine.views();

        assert_eq!(engine.stats().incremental_recomputes, 1);
        assert_eq!(after.table.len(), 2);
        assert!(!after.graph.edges()[0].is_unresolved());
        assert_eq!(after.tree.parent_of("U-1"), Some(&TreeKey::Entity("R-1".into())));
    }

    #[test]
    fn selection_change_forces_full_recompute() {
        let (store, selection, engine) = setup();
        store.merge(vec![Entity::definition("R-1")]);
        engine.views();

        selection.select("R-1", SelectionMode::Replace);
        let views = engine.views();

        assert_eq!(engine.stats().full_recomputes, 2);
        assert_eq!(views.selection_revision(), selection.revision());
    }

    #[test]
    fn removal_forces_full_recompute() {
        let (store, _selection, engine) = setup();
        store.merge(vec![Entity::definition("R-1"), Entity::definition("R-2")]);
        engine.views();

        store.remove(["R-2"]);
        let views = engine.views();

        assert_eq!(engine.stats().full_recomputes, 2);
        assert_eq!(views.table.len(), 1);
    }

    #[test]
    fn views_share_one_selection_snapshot() {
        let (store, selection, engine) = setup();
        store.merge(vec![Entity::definition("R-1"), Entity::usage("U-1", "R-1")]);
        selection.select_many(["R-1", "U-1"], SelectionMode::Extend);

        let views = engine.views();
        assert!(Arc::ptr_eq(views.tree.selection(), views.table.selection()));
        assert!(Arc::ptr_eq(views.table.selection(), views.graph.selection()));
        assert_eq!(views.tree.selected_ids().len(), 2);
    }

    #[test]
    fn comparator_reorders_after_attribute_change() {
        let (store, _selection, engine) = setup();
        let engine = engine.with_comparator(|a, b| a.label().cmp(b.label()));
        store.merge(vec![
            Entity::definition("R-1").with_name("Alpha"),
            Entity::definition("R-2").with_name("Beta"),
        ]);
        engine.views();

        store.merge(vec![Entity::definition("R-1").with_name("Zulu")]);
        let views = engine.views();

        let labels: Vec<&str> = views.tree.roots().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Beta", "Zulu"]);
    }

    #[test]
    fn invalidation_fires_for_store_and_selection() {
        let (store, selection, engine) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in = Arc::clone(&seen);
        let _sub = engine.subscribe(move |inv| seen_in.lock().push(*inv));

        store.merge(vec![Entity::definition("R-1")]);
        store.merge(vec![Entity::definition("R-1")]);
        selection.select("R-1", SelectionMode::Replace);

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![
                Invalidation {
                    store_version: 1,
                    selection_revision: 0
                },
                Invalidation {
                    store_version: 1,
                    selection_revision: 1
                },
            ]
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Merge(Vec<Entity>),
        Remove(String),
        Select(String, SelectionMode),
        Read,
    }

    fn id_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            (0..4u8).prop_map(|i| format!("R-{i}")),
            (0..4u8).prop_map(|i| format!("U-{i}")),
            (0..2u8).prop_map(|i| format!("D-{i}")),
        ]
    }

    fn entity_strategy() -> impl Strategy<Value = Entity> {
        (id_strategy(), id_strategy(), id_strategy(), any::<bool>()).prop_map(|(id, a, b, named)| {
            let entity = match id.chars().next() {
                Some('R') => Entity::definition(id.as_str()),
                Some('U') => Entity::usage(id.as_str(), a),
                _ => Entity::dependency(id.as_str(), a, b),
            };
            if named {
                entity.with_name(format!("{id} named"))
            } else {
                entity
            }
        })
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        let mode = prop_oneof![
            Just(SelectionMode::Replace),
            Just(SelectionMode::Toggle),
            Just(SelectionMode::Extend),
        ];
        prop_oneof![
            4 => prop::collection::vec(entity_strategy(), 1..4).prop_map(Op::Merge),
            1 => id_strategy().prop_map(Op::Remove),
            2 => (id_strategy(), mode).prop_map(|(id, m)| Op::Select(id, m)),
            2 => Just(Op::Read),
        ]
    }

    proptest! {
        #[test]
        fn incremental_views_match_full_rebuild(ops in prop::collection::vec(op_strategy(), 1..30)) {
            let (store, selection, engine) = setup();

            for op in ops {
                match op {
                    Op::Merge(batch) => { store.merge(batch); }
                    Op::Remove(id) => { store.remove([id]); }
                    Op::Select(id, mode) => { selection.select(id, mode); }
                    Op::Read => { engine.views(); }
                }
            }

            let memoized = engine.views();
            let fresh = ProjectionEngine::new(Arc::clone(&store), Arc::clone(&selection)).views();
            assert_same_views(&memoized, &fresh);
        }

        #[test]
        fn all_views_agree_with_selection(ops in prop::collection::vec(op_strategy(), 1..30)) {
            let (store, selection, engine) = setup();

            for op in ops {
                match op {
                    Op::Merge(batch) => { store.merge(batch); }
                    Op::Remove(id) => { store.remove([id]); }
                    Op::Select(id, mode) => { selection.select(id, mode); }
                    Op::Read => { engine.views(); }
                }

                let views = engine.views();
                let current = selection.current();
                let mut expected: Vec<EntityId> = current.ids().iter().cloned().collect();
                expected.sort();

                let mut table = views.table.selected_ids();
                table.sort();
                let mut graph = views.graph.selected_ids();
                graph.sort();
                let mut tree = views.tree.selected_ids();
                tree.sort();

                prop_assert_eq!(&table, &expected);
                prop_assert_eq!(&graph, &expected);
                prop_assert_eq!(&tree, &expected);
                prop_assert_eq!(views.tree.node_count(), store.len());
            }
        }
    }
}
