//! Normalized entity store
//!
//! Provides [`NormalizedStore`]: one canonical snapshot per entity id, a
//! strictly increasing version, and a bounded change log that lets
//! projections recompute in proportion to what changed.
//!
//! # Locking
//!
//! All state sits behind one `RwLock`. Readers that need a consistent view
//! across several lookups take [`NormalizedStore::read`]. Removal hooks run
//! while the write lock is held; subscribers run after it is released.

use crate::config::StoreConfig;
use crate::subscribers::{Subscribers, Subscription};
use indexmap::{IndexMap, IndexSet};
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use triview_model::{Entity, EntityId};

/// Outcome of a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// Ids whose content actually changed, in batch order
    pub changed_ids: Vec<EntityId>,
    /// Whether any change added an entity or altered kind/relations
    pub structural: bool,
    /// Store version after the merge
    pub version: u64,
}

impl MergeResult {
    /// Check if the merge changed nothing
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.changed_ids.is_empty()
    }
}

/// Outcome of a removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveResult {
    /// Ids that were present and are now gone
    pub removed_ids: Vec<EntityId>,
    /// Store version after the removal
    pub version: u64,
}

/// Event delivered to store subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A merge call completed (possibly with zero changes)
    Merged {
        /// Version after the merge
        version: u64,
        /// Ids whose content changed
        changed: Arc<[EntityId]>,
    },
    /// A removal call completed (possibly with zero removals)
    Removed {
        /// Version after the removal
        version: u64,
        /// Ids that were removed
        removed: Arc<[EntityId]>,
    },
}

impl StoreEvent {
    /// Store version carried by the event
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        match self {
            Self::Merged { version, .. } | Self::Removed { version, .. } => *version,
        }
    }
}

/// What changed between a consumer's last seen version and now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// Nothing changed
    Unchanged,
    /// Only upserts happened
    Upserted {
        /// Upserted ids, first-change order
        ids: IndexSet<EntityId>,
        /// Whether any upsert added an entity or altered kind/relations
        structural: bool,
    },
    /// Log no longer covers the range, or a removal happened
    Full,
}

#[derive(Debug, Clone)]
enum Change {
    Upserted { ids: Vec<EntityId>, structural: bool },
    Removed,
}

#[derive(Debug)]
struct ChangeLog {
    capacity: usize,
    records: VecDeque<(u64, Change)>,
}

impl ChangeLog {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    fn push(&mut self, version: u64, change: Change) {
        if self.capacity == 0 {
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back((version, change));
    }

    fn since(&self, since: u64, current: u64) -> Delta {
        if since == current {
            return Delta::Unchanged;
        }
        if since > current {
            return Delta::Full;
        }

        // Records are contiguous, so coverage only depends on the oldest one
        match self.records.front() {
            Some((oldest, _)) if *oldest <= since + 1 => {}
            _ => return Delta::Full,
        }

        let mut ids = IndexSet::new();
        let mut structural = false;
        for (version, change) in &self.records {
            if *version <= since {
                continue;
            }
            match change {
                Change::Removed => return Delta::Full,
                Change::Upserted {
                    ids: changed,
                    structural: s,
                } => {
                    ids.extend(changed.iter().cloned());
                    structural |= *s;
                }
            }
        }
        Delta::Upserted { ids, structural }
    }
}

#[derive(Debug)]
struct StoreInner {
    entities: IndexMap<EntityId, Arc<Entity>>,
    version: u64,
    changelog: ChangeLog,
}

/// Canonical, deduplicated entity store
///
/// Upserts keep an entity's first insertion position, so iteration order is
/// the order in which ids were first merged.
pub struct NormalizedStore {
    name: String,
    inner: RwLock<StoreInner>,
    subscribers: Subscribers<StoreEvent>,
    removal_hooks: Subscribers<[EntityId]>,
}

impl NormalizedStore {
    /// Create empty store with default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create empty store with configuration
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            name: "default".to_string(),
            inner: RwLock::new(StoreInner {
                entities: IndexMap::new(),
                version: 0,
                changelog: ChangeLog::new(config.changelog_capacity),
            }),
            subscribers: Subscribers::new(),
            removal_hooks: Subscribers::new(),
        }
    }

    /// With instance name, used in log fields
    #[inline]
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Instance name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Upsert every entity of `batch` by id
    ///
    /// Later occurrences of an id within one batch win. An id whose incoming
    /// snapshot equals the stored one is not reported as changed. The version
    /// advances by one when at least one id changed: it counts effective
    /// merge calls, not entities, so a batch changing many ids bumps it once.
    /// Subscribers are notified exactly once per call, even when nothing
    /// changed.
    pub fn merge(&self, batch: impl IntoIterator<Item = Entity>) -> MergeResult {
        let mut incoming: IndexMap<EntityId, Entity> = IndexMap::new();
        for entity in batch {
            incoming.insert(entity.id.clone(), entity);
        }

        let result = {
            let mut inner = self.inner.write();
            let mut changed_ids = Vec::new();
            let mut structural = false;

            for (id, entity) in incoming {
                match inner.entities.get(&id) {
                    Some(existing) if **existing == entity => continue,
                    Some(existing) => structural |= !existing.same_shape(&entity),
                    None => structural = true,
                }
                inner.entities.insert(id.clone(), Arc::new(entity));
                changed_ids.push(id);
            }

            if !changed_ids.is_empty() {
                inner.version += 1;
                let version = inner.version;
                inner.changelog.push(
                    version,
                    Change::Upserted {
                        ids: changed_ids.clone(),
                        structural,
                    },
                );
            }

            MergeResult {
                changed_ids,
                structural,
                version: inner.version,
            }
        };

        tracing::debug!(
            store = %self.name,
            version = result.version,
            changed = result.changed_ids.len(),
            structural = result.structural,
            "merged batch"
        );

        self.subscribers.notify(&StoreEvent::Merged {
            version: result.version,
            changed: result.changed_ids.clone().into(),
        });

        result
    }

    /// Remove entities by id
    ///
    /// Ids that are not present are ignored; the version advances by one when
    /// at least one id was removed. Subscribers are notified once per call.
    /// Removal hooks (selection
    /// pruning) run before the write lock is released, so no reader can see
    /// the store without the entity but the selection still holding it.
    pub fn remove<I, K>(&self, ids: I) -> RemoveResult
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let result = {
            let mut inner = self.inner.write();
            let mut removed_ids = Vec::new();

            for id in ids {
                if let Some((key, _)) = inner.entities.shift_remove_entry(id.as_ref()) {
                    removed_ids.push(key);
                }
            }

            if !removed_ids.is_empty() {
                inner.version += 1;
                let version = inner.version;
                inner.changelog.push(version, Change::Removed);
                self.removal_hooks.notify(&removed_ids);
            }

            RemoveResult {
                removed_ids,
                version: inner.version,
            }
        };

        tracing::debug!(
            store = %self.name,
            version = result.version,
            removed = result.removed_ids.len(),
            "removed entities"
        );

        self.subscribers.notify(&StoreEvent::Removed {
            version: result.version,
            removed: result.removed_ids.clone().into(),
        });

        result
    }

    /// Lookup entity by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Entity>> {
        self.inner.read().entities.get(id).cloned()
    }

    /// Check if id is present
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().entities.contains_key(id)
    }

    /// Current version
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Number of entities
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entities.len()
    }

    /// Check if store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entities in insertion order
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Entity>> {
        self.inner.read().entities.values().cloned().collect()
    }

    /// Consistent read access across several lookups
    ///
    /// Holding the guard blocks writers; do not call back into mutating
    /// store or selection methods while holding it.
    #[must_use]
    pub fn read(&self) -> StoreReadGuard<'_> {
        StoreReadGuard {
            inner: self.inner.read(),
        }
    }

    /// Register a listener invoked after every merge and removal call
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(listener)
    }

    /// Register a hook invoked with removed ids while the write lock is held
    ///
    /// The hook must not call back into the store.
    pub(crate) fn on_remove<F>(&self, hook: F) -> Subscription
    where
        F: Fn(&[EntityId]) + Send + Sync + 'static,
    {
        self.removal_hooks.subscribe(hook)
    }
}

impl Default for NormalizedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NormalizedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("NormalizedStore")
            .field("name", &self.name)
            .field("entities", &inner.entities.len())
            .field("version", &inner.version)
            .finish()
    }
}

/// Read guard over the store
pub struct StoreReadGuard<'a> {
    inner: RwLockReadGuard<'a, StoreInner>,
}

impl StoreReadGuard<'_> {
    /// Lookup entity by id
    #[inline]
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<Entity>> {
        self.inner.entities.get(id)
    }

    /// Check if id is present
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.inner.entities.contains_key(id)
    }

    /// Entities in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Entity>> + '_ {
        self.inner.entities.values()
    }

    /// Insertion position of id
    #[inline]
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.inner.entities.get_index_of(id)
    }

    /// Number of entities
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entities.len()
    }

    /// Check if store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entities.is_empty()
    }

    /// Version this guard observes
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version
    }

    /// Changes between `since` and the observed version
    #[must_use]
    pub fn changes_since(&self, since: u64) -> Delta {
        self.inner.changelog.since(since, self.inner.version)
    }
}
