//! Query coordinator
//!
//! [`QueryCoordinator`] turns caller parameters into page requests, calls the
//! query service, and merges successful pages into the store. Failures are
//! classified and returned without touching the store.
//!
//! # Epochs
//!
//! Every load takes a fresh epoch. [`QueryCoordinator::cancel_pending`]
//! abandons every load issued so far; an abandoned load still completes its
//! service call but its page is discarded with [`QueryError::Cancelled`].
//! Dropping a load future abandons it as well, because the merge happens
//! inside the future after the response arrives. Completions are applied in
//! completion order; callers wanting latest-wins check
//! [`QueryCoordinator::is_latest`].
//!
//! The abandon check and the merge run under one gate that
//! [`QueryCoordinator::cancel_pending`] also takes, so once `cancel_pending`
//! returns no load it covered can still reach the store. The gate is
//! reentrant: store subscribers may cancel from inside a merge.

use crate::config::QueryConfig;
use crate::error::{QueryError, Result};
use crate::service::QueryService;
use dashmap::DashMap;
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use triview_model::{Entity, EntityKind, Filter, PageRequest, SortSpec, Status};
use triview_store::{MergeResult, NormalizedStore, RemoveResult};

/// Caller-facing load parameters; absent fields take configured defaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadParams {
    /// Page index
    pub page: Option<u32>,
    /// Page size
    pub size: Option<u32>,
    /// Ordered sort keys
    pub sort: Vec<SortSpec>,
    /// Conjunctive predicates
    pub filter: BTreeSet<Filter>,
    /// Search term; blank terms are dropped
    pub search: Option<String>,
}

impl LoadParams {
    /// Create empty params
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With page index
    #[inline]
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// With page size
    #[inline]
    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// With an additional sort key
    #[inline]
    #[must_use]
    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort.push(sort);
        self
    }

    /// With an additional filter predicate
    #[inline]
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter.insert(filter);
        self
    }

    /// With search term
    #[inline]
    #[must_use]
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Resolve into a request using `config` defaults
    #[must_use]
    pub fn resolve(self, config: &QueryConfig) -> PageRequest {
        PageRequest {
            page: self.page.unwrap_or(config.default_page),
            size: self.size.unwrap_or(config.default_page_size),
            sort: self.sort,
            filter: self.filter,
            search: self
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }
}

/// Outcome of a successful load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    /// Epoch of the load
    pub epoch: u64,
    /// Page index, verbatim from the server
    pub page: u32,
    /// Page size, verbatim from the server
    pub size: u32,
    /// Total matching entities, verbatim from the server
    pub total_elements: u64,
    /// Total pages, verbatim from the server
    pub total_pages: u32,
    /// First page flag, verbatim from the server
    pub first: bool,
    /// Last page flag, verbatim from the server
    pub last: bool,
    /// Entities received on the page
    pub received: usize,
    /// What the merge changed
    pub merge: MergeResult,
}

/// Pagination and query state from the most recent applied load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    /// Request of the most recent applied load
    pub request: PageRequest,
    /// Total matching entities last reported
    pub total_elements: u64,
    /// Total pages last reported
    pub total_pages: u32,
    /// Whether the last applied page was the final one
    pub last: bool,
    /// Epoch of the most recent applied load, 0 before any
    pub epoch: u64,
}

impl QueryState {
    fn initial(config: &QueryConfig) -> Self {
        Self {
            request: PageRequest::new(config.default_page, config.default_page_size),
            total_elements: 0,
            total_pages: 0,
            last: false,
            epoch: 0,
        }
    }
}

/// Removes a pending entry when the load finishes or its future is dropped
struct PendingGuard<'a> {
    pending: &'a DashMap<u64, PageRequest>,
    epoch: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.epoch);
    }
}

/// Loads pages from a query service into the store
pub struct QueryCoordinator {
    service: Arc<dyn QueryService>,
    store: Arc<NormalizedStore>,
    config: QueryConfig,
    state: Mutex<QueryState>,
    next_epoch: AtomicU64,
    /// Loads with an epoch at or below this are abandoned
    cancelled_through: AtomicU64,
    /// Held across abandon check plus merge, and across cancellation
    apply_gate: ReentrantMutex<()>,
    pending: DashMap<u64, PageRequest>,
}

impl QueryCoordinator {
    /// Create coordinator with default config
    #[must_use]
    pub fn new(service: Arc<dyn QueryService>, store: Arc<NormalizedStore>) -> Self {
        Self::with_config(service, store, QueryConfig::default())
    }

    /// Create coordinator with config
    #[must_use]
    pub fn with_config(
        service: Arc<dyn QueryService>,
        store: Arc<NormalizedStore>,
        config: QueryConfig,
    ) -> Self {
        Self {
            service,
            store,
            state: Mutex::new(QueryState::initial(&config)),
            config,
            next_epoch: AtomicU64::new(0),
            cancelled_through: AtomicU64::new(0),
            apply_gate: ReentrantMutex::new(()),
            pending: DashMap::new(),
        }
    }

    /// Load one page and merge it
    pub async fn load_page(&self, params: LoadParams) -> Result<PageResult> {
        self.execute(params.resolve(&self.config)).await
    }

    /// Load entities of one kind
    pub async fn load_by_type(&self, kind: EntityKind, params: LoadParams) -> Result<PageResult> {
        self.load_page(params.with_filter(Filter::new("kind", kind.as_str())))
            .await
    }

    /// Load entities matching a search term
    pub async fn search(&self, term: impl Into<String>, params: LoadParams) -> Result<PageResult> {
        self.load_page(params.with_search(term)).await
    }

    /// Load approved entities
    pub async fn load_approved(&self, params: LoadParams) -> Result<PageResult> {
        self.load_page(params.with_filter(Filter::new("status", Status::Approved.as_str())))
            .await
    }

    /// Load the page after the most recent applied one
    ///
    /// Returns `Ok(None)` when the most recent applied page was the last.
    pub async fn load_next_page(&self) -> Result<Option<PageResult>> {
        let request = {
            let state = self.state.lock();
            if state.epoch > 0 && state.last {
                return Ok(None);
            }
            let mut request = state.request.clone();
            if state.epoch > 0 {
                request.page = request.page.saturating_add(1);
            }
            request
        };
        self.execute(request).await.map(Some)
    }

    /// Re-issue the most recent applied request
    pub async fn reload(&self) -> Result<PageResult> {
        let request = self.state.lock().request.clone();
        self.execute(request).await
    }

    /// Abandon every load issued so far
    ///
    /// Returns the number of loads that were still in flight.
    pub fn cancel_pending(&self) -> usize {
        let through = {
            let _gate = self.apply_gate.lock();
            let through = self.next_epoch.load(Ordering::SeqCst);
            self.cancelled_through.fetch_max(through, Ordering::SeqCst);
            through
        };
        let in_flight = self.pending.len();
        tracing::debug!(through, in_flight, "cancelled pending loads");
        in_flight
    }

    /// Whether `epoch` is the most recently issued, unabandoned load
    #[must_use]
    pub fn is_latest(&self, epoch: u64) -> bool {
        epoch != 0
            && epoch == self.next_epoch.load(Ordering::SeqCst)
            && epoch > self.cancelled_through.load(Ordering::SeqCst)
    }

    /// Most recently issued epoch, 0 before any load
    #[must_use]
    pub fn current_epoch(&self) -> u64 {
        self.next_epoch.load(Ordering::SeqCst)
    }

    /// Epochs of loads still waiting on the service, ascending
    #[must_use]
    pub fn pending(&self) -> Vec<u64> {
        let mut epochs: Vec<u64> = self.pending.iter().map(|e| *e.key()).collect();
        epochs.sort_unstable();
        epochs
    }

    /// Snapshot of pagination and query state
    #[must_use]
    pub fn query_state(&self) -> QueryState {
        self.state.lock().clone()
    }

    /// Merge locally created or updated entities
    pub fn apply_upserts(&self, entities: impl IntoIterator<Item = Entity>) -> MergeResult {
        self.store.merge(entities)
    }

    /// Remove locally deleted entities; the selection is pruned in the same step
    pub fn apply_removals<I, K>(&self, ids: I) -> RemoveResult
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.store.remove(ids)
    }

    /// Store the coordinator merges into
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<NormalizedStore> {
        &self.store
    }

    /// Config in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    async fn execute(&self, request: PageRequest) -> Result<PageResult> {
        if request.size == 0 {
            return Err(QueryError::invalid("page size must be positive"));
        }

        let epoch = self.next_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.pending.insert(epoch, request.clone());
        let guard = PendingGuard {
            pending: &self.pending,
            epoch,
        };
        tracing::debug!(epoch, page = request.page, size = request.size, "issuing query");

        let response = self.service.query(request.clone()).await;
        drop(guard);

        let page = match response {
            Ok(page) => page,
            Err(error) => {
                let error = QueryError::from(error);
                if self.is_abandoned(epoch) {
                    return Err(QueryError::Cancelled { epoch });
                }
                tracing::warn!(
                    epoch,
                    page = request.page,
                    kind = %error.kind(),
                    error = %error,
                    "query failed"
                );
                return Err(error);
            }
        };

        let received = page.content.len();
        let merge = {
            let _gate = self.apply_gate.lock();
            if self.is_abandoned(epoch) {
                tracing::debug!(epoch, received, "discarding abandoned load");
                return Err(QueryError::Cancelled { epoch });
            }
            let merge = self.store.merge(page.content);

            let mut state = self.state.lock();
            if epoch > state.epoch {
                *state = QueryState {
                    request,
                    total_elements: page.total_elements,
                    total_pages: page.total_pages,
                    last: page.last,
                    epoch,
                };
            }
            merge
        };

        tracing::debug!(
            epoch,
            page = page.page,
            received,
            changed = merge.changed_ids.len(),
            version = merge.version,
            "query applied"
        );

        Ok(PageResult {
            epoch,
            page: page.page,
            size: page.size,
            total_elements: page.total_elements,
            total_pages: page.total_pages,
            first: page.first,
            last: page.last,
            received,
            merge,
        })
    }

    fn is_abandoned(&self, epoch: u64) -> bool {
        epoch <= self.cancelled_through.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for QueryCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCoordinator")
            .field("store", &self.store.name())
            .field("epoch", &self.current_epoch())
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::service::{MockQueryService, ServiceError};
    use mockall::predicate::function;
    use pretty_assertions::assert_eq;
    use triview_model::Page;

    fn page_of(entities: Vec<Entity>, page: u32, last: bool) -> Page {
        Page {
            total_elements: entities.len() as u64,
            content: entities,
            page,
            size: 50,
            total_pages: page + 1,
            first: page == 0,
            last,
        }
    }

    fn coordinator(mock: MockQueryService) -> QueryCoordinator {
        QueryCoordinator::new(Arc::new(mock), Arc::new(NormalizedStore::new()))
    }

    #[test]
    fn resolve_applies_defaults_and_drops_blank_search() {
        let request = LoadParams::new()
            .with_search("   ")
            .resolve(&QueryConfig::default());
        assert_eq!(request, PageRequest::new(0, 50));

        let request = LoadParams::new()
            .with_page(3)
            .with_search("  brake ")
            .resolve(&QueryConfig::default().with_default_page_size(20));
        assert_eq!(request.page, 3);
        assert_eq!(request.size, 20);
        assert_eq!(request.search.as_deref(), Some("brake"));
    }

    #[tokio::test]
    async fn load_page_merges_and_reports_server_counts() {
        let mut mock = MockQueryService::new();
        mock.expect_query()
            .withf(|req| req.page == 0 && req.size == 50)
            .times(1)
            .returning(|_| {
                Ok(Page {
                    content: vec![Entity::definition("R-1"), Entity::usage("U-1", "R-1")],
                    page: 0,
                    size: 50,
                    total_elements: 120,
                    total_pages: 3,
                    first: true,
                    last: false,
                })
            });
        let coord = coordinator(mock);

        let result = coord.load_page(LoadParams::new()).await.unwrap();

        assert_eq!(result.total_elements, 120);
        assert_eq!(result.total_pages, 3);
        assert!(result.first && !result.last);
        assert_eq!(result.received, 2);
        assert_eq!(coord.store().len(), 2);
        assert_eq!(coord.query_state().total_pages, 3);
        assert!(coord.pending().is_empty());
    }

    #[tokio::test]
    async fn failed_load_leaves_store_untouched() {
        let mut mock = MockQueryService::new();
        mock.expect_query()
            .returning(|_| Err(ServiceError::status(500, "boom")));
        let coord = coordinator(mock);
        coord.apply_upserts(vec![Entity::definition("R-1")]);
        let version = coord.store().version();

        let err = coord.load_page(LoadParams::new()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.status(), Some(500));
        assert_eq!(coord.store().version(), version);
        assert_eq!(coord.query_state().epoch, 0);
    }

    #[tokio::test]
    async fn zero_size_fails_locally() {
        let mut mock = MockQueryService::new();
        mock.expect_query().never();
        let coord = coordinator(mock);

        let err = coord
            .load_page(LoadParams::new().with_size(0))
            .await
            .unwrap_err();

        assert_eq!(err, QueryError::invalid("page size must be positive"));
        assert_eq!(coord.current_epoch(), 0);
    }

    #[tokio::test]
    async fn sugar_injects_constraints_without_overriding_paging() {
        let mut mock = MockQueryService::new();
        mock.expect_query()
            .with(function(|req: &PageRequest| {
                req.page == 2
                    && req.size == 10
                    && req.sort == vec![SortSpec::desc("declaredName")]
                    && req.filter.contains(&Filter::new("kind", "usage"))
            }))
            .times(1)
            .returning(|_| Ok(page_of(vec![], 2, true)));
        mock.expect_query()
            .with(function(|req: &PageRequest| {
                req.filter.contains(&Filter::new("status", "approved"))
                    && req.filter.contains(&Filter::new("kind", "definition"))
            }))
            .times(1)
            .returning(|_| Ok(page_of(vec![], 0, true)));
        mock.expect_query()
            .with(function(|req: &PageRequest| req.search.as_deref() == Some("brake")))
            .times(1)
            .returning(|_| Ok(page_of(vec![], 0, true)));
        let coord = coordinator(mock);

        let paging = LoadParams::new()
            .with_page(2)
            .with_size(10)
            .with_sort(SortSpec::desc("declaredName"));
        coord.load_by_type(EntityKind::Usage, paging).await.unwrap();
        coord
            .load_approved(LoadParams::new().with_filter(Filter::new("kind", "definition")))
            .await
            .unwrap();
        coord.search("brake", LoadParams::new()).await.unwrap();
    }

    #[tokio::test]
    async fn next_page_follows_state_until_last() {
        let mut mock = MockQueryService::new();
        mock.expect_query()
            .returning(|req| Ok(page_of(vec![Entity::definition(format!("R-{}", req.page))], req.page, req.page == 1)));
        let coord = coordinator(mock);

        let first = coord.load_next_page().await.unwrap().unwrap();
        let second = coord.load_next_page().await.unwrap().unwrap();
        let third = coord.load_next_page().await.unwrap();

        assert_eq!(first.page, 0);
        assert_eq!(second.page, 1);
        assert!(third.is_none());
        // Pages accumulate in the store
        assert_eq!(coord.store().len(), 2);
    }

    #[tokio::test]
    async fn reload_reissues_last_request() {
        let mut mock = MockQueryService::new();
        mock.expect_query()
            .withf(|req| req.search.as_deref() == Some("pedal"))
            .times(2)
            .returning(|_| Ok(page_of(vec![], 0, true)));
        let coord = coordinator(mock);

        coord.search("pedal", LoadParams::new()).await.unwrap();
        let again = coord.reload().await.unwrap();

        assert_eq!(again.epoch, 2);
        assert!(coord.is_latest(2));
        assert!(!coord.is_latest(1));
    }

    #[tokio::test]
    async fn local_patches_go_through_store() {
        let coord = coordinator(MockQueryService::new());

        let merged = coord.apply_upserts(vec![Entity::definition("R-1"), Entity::definition("R-2")]);
        let removed = coord.apply_removals(["R-1", "missing"]);

        assert_eq!(merged.changed_ids.len(), 2);
        assert_eq!(removed.removed_ids.len(), 1);
        assert!(coord.store().contains("R-2"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancel_is_ordered_with_merge_across_threads() {
        let mut mock = MockQueryService::new();
        mock.expect_query().returning(|req| {
            Ok(page_of(vec![Entity::definition(format!("R-{}", req.page))], req.page, true))
        });
        let coord = Arc::new(coordinator(mock));

        for i in 0..200u32 {
            let loader = Arc::clone(&coord);
            let load =
                tokio::spawn(async move { loader.load_page(LoadParams::new().with_page(i)).await });
            let canceller = Arc::clone(&coord);
            let cancel = tokio::spawn(async move {
                let issued = canceller.current_epoch();
                canceller.cancel_pending();
                (issued, canceller.store().contains(&format!("R-{i}")))
            });

            let result = load.await.unwrap();
            let (issued, present_after_cancel) = cancel.await.unwrap();
            let id = format!("R-{i}");
            match result {
                // Covered by the cancel, so it must have merged before it returned
                Ok(page) if page.epoch <= issued => assert!(present_after_cancel, "{id} merged late"),
                Ok(_) => assert!(coord.store().contains(&id)),
                Err(QueryError::Cancelled { .. }) => assert!(!coord.store().contains(&id)),
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn store_subscriber_may_cancel_during_merge() {
        let mut mock = MockQueryService::new();
        mock.expect_query()
            .returning(|_| Ok(page_of(vec![Entity::definition("R-1")], 0, true)));
        let coord = Arc::new(coordinator(mock));

        let inner = Arc::downgrade(&coord);
        let _sub = coord.store().subscribe(move |_| {
            if let Some(coord) = inner.upgrade() {
                coord.cancel_pending();
            }
        });

        let page = coord.load_page(LoadParams::new()).await.unwrap();

        assert_eq!(page.epoch, 1);
        assert!(coord.store().contains("R-1"));
        assert!(!coord.is_latest(1));
    }

    #[tokio::test]
    async fn cancel_marks_issued_epochs_stale() {
        let mut mock = MockQueryService::new();
        mock.expect_query()
            .returning(|_| Ok(page_of(vec![Entity::definition("R-1")], 0, true)));
        let coord = coordinator(mock);

        coord.load_page(LoadParams::new()).await.unwrap();
        assert_eq!(coord.cancel_pending(), 0);
        assert!(!coord.is_latest(1));

        let after = coord.load_page(LoadParams::new()).await.unwrap();
        assert_eq!(after.epoch, 2);
        assert!(coord.is_latest(2));
    }
}
