//! Cross-view selection
//!
//! [`SelectionCoordinator`] owns the one selection set every view reads.
//! Membership is checked against the store under its read lock, and the set
//! is pruned from inside the store's removal step, so a selected id always
//! refers to an entity that exists.

use crate::store::{NormalizedStore, StoreEvent};
use crate::subscribers::{Subscribers, Subscription};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use triview_model::EntityId;

/// How a selection gesture combines with the current set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionMode {
    /// Clear, then select only the given id
    Replace,
    /// Flip membership of the given id
    Toggle,
    /// Add the given id to the set
    Extend,
}

/// Immutable selection snapshot
///
/// Projections mark membership from one shared `Arc<SelectionSet>`, so every
/// view computed from the same snapshot agrees on what is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: HashSet<EntityId>,
    order: Vec<EntityId>,
    revision: u64,
}

impl SelectionSet {
    /// Check membership
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Member ids, unordered
    #[inline]
    #[must_use]
    pub fn ids(&self) -> &HashSet<EntityId> {
        &self.ids
    }

    /// Member ids in the order they were selected
    #[inline]
    #[must_use]
    pub fn order(&self) -> &[EntityId] {
        &self.order
    }

    /// Most recently selected id still in the set
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&EntityId> {
        self.order.last()
    }

    /// Number of selected ids
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if nothing is selected
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Revision at which this snapshot was produced
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn insert(&mut self, id: EntityId) -> bool {
        if self.ids.insert(id.clone()) {
            self.order.push(id);
            true
        } else {
            false
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            self.order.retain(|existing| existing.as_str() != id);
            true
        } else {
            false
        }
    }

    fn clear(&mut self) -> bool {
        if self.ids.is_empty() {
            return false;
        }
        self.ids.clear();
        self.order.clear();
        true
    }

    /// Apply one gesture
    fn apply(&mut self, id: &EntityId, mode: SelectionMode) {
        match mode {
            SelectionMode::Replace => {
                if self.ids.len() != 1 || !self.ids.contains(id) {
                    self.clear();
                    self.insert(id.clone());
                }
            }
            SelectionMode::Toggle => {
                if !self.remove(id.as_str()) {
                    self.insert(id.clone());
                }
            }
            SelectionMode::Extend => {
                self.insert(id.clone());
            }
        }
    }

    /// Same members in the same selection order, ignoring revision
    fn same_members(&self, other: &Self) -> bool {
        self.ids == other.ids && self.order == other.order
    }
}

#[derive(Debug, Default)]
struct SelectionState {
    current: Arc<SelectionSet>,
    revision: u64,
    /// Snapshot produced by a prune, delivered once the store lock is gone
    pending_prune: Option<Arc<SelectionSet>>,
}

impl SelectionState {
    fn publish(&mut self, mut next: SelectionSet) -> Arc<SelectionSet> {
        self.revision += 1;
        next.revision = self.revision;
        self.current = Arc::new(next);
        Arc::clone(&self.current)
    }
}

/// Owner of the single selection set
pub struct SelectionCoordinator {
    store: Arc<NormalizedStore>,
    state: Arc<Mutex<SelectionState>>,
    subscribers: Arc<Subscribers<Arc<SelectionSet>>>,
    _prune_hook: Subscription,
    _store_sub: Subscription,
}

impl SelectionCoordinator {
    /// Create coordinator bound to `store`
    ///
    /// Registers a removal hook on the store so removed ids leave the
    /// selection in the same step that removes them.
    #[must_use]
    pub fn new(store: Arc<NormalizedStore>) -> Self {
        let state = Arc::new(Mutex::new(SelectionState::default()));
        let subscribers: Arc<Subscribers<Arc<SelectionSet>>> = Arc::new(Subscribers::new());

        let hook_state = Arc::downgrade(&state);
        let prune_hook = store.on_remove(move |removed| {
            let Some(state) = hook_state.upgrade() else {
                return;
            };
            let mut state = state.lock();
            let mut next = (*state.current).clone();
            let mut changed = false;
            for id in removed {
                changed |= next.remove(id.as_str());
            }
            if changed {
                let published = state.publish(next);
                tracing::debug!(
                    revision = published.revision(),
                    remaining = published.len(),
                    "pruned selection after removal"
                );
                state.pending_prune = Some(published);
            }
        });

        // Prune notifications go out after the store has released its lock
        let sub_state = Arc::downgrade(&state);
        let sub_listeners = Arc::downgrade(&subscribers);
        let store_sub = store.subscribe(move |event| {
            if !matches!(event, StoreEvent::Removed { .. }) {
                return;
            }
            let (Some(state), Some(listeners)) = (sub_state.upgrade(), sub_listeners.upgrade())
            else {
                return;
            };
            let pending = state.lock().pending_prune.take();
            if let Some(set) = pending {
                listeners.notify(&set);
            }
        });

        Self {
            store,
            state,
            subscribers,
            _prune_hook: prune_hook,
            _store_sub: store_sub,
        }
    }

    /// Apply a selection gesture to `id`
    ///
    /// Ids absent from the store are rejected as a no-op. Returns whether
    /// the selection changed.
    pub fn select(&self, id: impl Into<EntityId>, mode: SelectionMode) -> bool {
        self.select_many([id.into()], mode)
    }

    /// Apply a selection gesture to several ids at once
    ///
    /// `Replace` selects exactly the present ids; `Toggle` flips each;
    /// `Extend` adds each. Ids absent from the store are skipped.
    pub fn select_many<I>(&self, ids: I, mode: SelectionMode) -> bool
    where
        I: IntoIterator,
        I::Item: Into<EntityId>,
    {
        let published = {
            let store = self.store.read();
            let present: Vec<EntityId> = ids
                .into_iter()
                .map(Into::into)
                .filter(|id| {
                    let found = store.contains(id.as_str());
                    if !found {
                        tracing::debug!(id = %id, "ignoring selection of absent entity");
                    }
                    found
                })
                .collect();

            if present.is_empty() {
                return false;
            }

            let mut state = self.state.lock();
            let next = match mode {
                SelectionMode::Replace if present.len() > 1 => {
                    let mut replaced = SelectionSet::default();
                    for id in present {
                        replaced.insert(id);
                    }
                    replaced
                }
                _ => {
                    let mut next = (*state.current).clone();
                    for id in &present {
                        next.apply(id, mode);
                    }
                    next
                }
            };

            // Gestures that cancel out within one call are not a change
            if next.same_members(&state.current) {
                return false;
            }
            state.publish(next)
        };

        tracing::debug!(
            revision = published.revision(),
            selected = published.len(),
            ?mode,
            "selection changed"
        );
        self.subscribers.notify(&published);
        true
    }

    /// Empty the selection
    pub fn clear(&self) {
        let published = {
            let mut state = self.state.lock();
            if state.current.is_empty() {
                return;
            }
            let mut next = (*state.current).clone();
            next.clear();
            state.publish(next)
        };
        tracing::debug!(revision = published.revision(), "selection cleared");
        self.subscribers.notify(&published);
    }

    /// Current selection snapshot
    #[must_use]
    pub fn current(&self) -> Arc<SelectionSet> {
        Arc::clone(&self.state.lock().current)
    }

    /// Number of selected ids
    #[must_use]
    pub fn count(&self) -> usize {
        self.state.lock().current.len()
    }

    /// Check membership
    #[must_use]
    pub fn is_selected(&self, id: &str) -> bool {
        self.state.lock().current.contains(id)
    }

    /// Monotonic revision, bumped on every effective change
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.state.lock().revision
    }

    /// Store this coordinator validates against
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<NormalizedStore> {
        &self.store
    }

    /// Register a listener invoked with each new selection snapshot
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<SelectionSet>) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(listener)
    }
}

impl fmt::Debug for SelectionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SelectionCoordinator")
            .field("selected", &state.current.len())
            .field("revision", &state.revision)
            .finish()
    }
}
