//! Workspace facade
//!
//! A [`Workspace`] owns one store and wires the selection, projection and
//! query components to it. Independent workspaces share nothing.

use crate::config::{ConfigError, TriviewConfig};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use triview_model::{Entity, EntityId};
use triview_projection::{GraphView, ProjectionEngine, ProjectionSet, TableView, TreeView};
use triview_query::{ErrorRecoveryPolicy, QueryCoordinator, QueryService, RetryingService};
use triview_store::{NormalizedStore, SelectionCoordinator, SelectionMode, SelectionSet};

type Comparator = Box<dyn Fn(&Entity, &Entity) -> Ordering + Send + Sync>;

/// Builder for [`Workspace`]
pub struct WorkspaceBuilder {
    service: Arc<dyn QueryService>,
    config: TriviewConfig,
    comparator: Option<Comparator>,
}

impl WorkspaceBuilder {
    /// With configuration
    #[inline]
    #[must_use]
    pub fn config(mut self, config: TriviewConfig) -> Self {
        self.config = config;
        self
    }

    /// With explicit tree ordering
    #[inline]
    #[must_use]
    pub fn comparator<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&Entity, &Entity) -> Ordering + Send + Sync + 'static,
    {
        self.comparator = Some(Box::new(comparator));
        self
    }

    /// Validate the config and wire every component
    pub fn build(self) -> Result<Workspace, ConfigError> {
        self.config.validate()?;
        let config = self.config;

        let store = Arc::new(NormalizedStore::with_config(config.store).named(config.name.clone()));
        let selection = Arc::new(SelectionCoordinator::new(Arc::clone(&store)));

        let mut projections = ProjectionEngine::new(Arc::clone(&store), Arc::clone(&selection));
        if let Some(comparator) = self.comparator {
            projections = projections.with_comparator(comparator);
        }

        let service: Arc<dyn QueryService> = if config.retry.max_retries > 0 {
            Arc::new(RetryingService::new(
                self.service,
                ErrorRecoveryPolicy::new(config.retry.clone()),
            ))
        } else {
            self.service
        };
        let queries = QueryCoordinator::with_config(service, Arc::clone(&store), config.query.clone());

        tracing::info!(
            name = %config.name,
            page_size = config.query.default_page_size,
            max_retries = config.retry.max_retries,
            changelog_capacity = config.store.changelog_capacity,
            "workspace ready"
        );

        Ok(Workspace {
            config,
            store,
            selection,
            projections: Arc::new(projections),
            queries: Arc::new(queries),
        })
    }
}

/// One independent store with its selection, projections and queries
pub struct Workspace {
    config: TriviewConfig,
    store: Arc<NormalizedStore>,
    selection: Arc<SelectionCoordinator>,
    projections: Arc<ProjectionEngine>,
    queries: Arc<QueryCoordinator>,
}

impl Workspace {
    /// Start building a workspace over `service`
    #[must_use]
    pub fn builder(service: Arc<dyn QueryService>) -> WorkspaceBuilder {
        WorkspaceBuilder {
            service,
            config: TriviewConfig::default(),
            comparator: None,
        }
    }

    /// Workspace with `config` and insertion-order trees
    pub fn new(service: Arc<dyn QueryService>, config: TriviewConfig) -> Result<Self, ConfigError> {
        Self::builder(service).config(config).build()
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &TriviewConfig {
        &self.config
    }

    /// The store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<NormalizedStore> {
        &self.store
    }

    /// The selection
    #[inline]
    #[must_use]
    pub fn selection(&self) -> &Arc<SelectionCoordinator> {
        &self.selection
    }

    /// The projection engine
    #[inline]
    #[must_use]
    pub fn projections(&self) -> &Arc<ProjectionEngine> {
        &self.projections
    }

    /// The query coordinator
    #[inline]
    #[must_use]
    pub fn queries(&self) -> &Arc<QueryCoordinator> {
        &self.queries
    }

    /// Apply a selection gesture
    pub fn select(&self, id: impl Into<EntityId>, mode: SelectionMode) -> bool {
        self.selection.select(id, mode)
    }

    /// Empty the selection
    pub fn clear_selection(&self) {
        self.selection.clear();
    }

    /// Current selection snapshot
    #[must_use]
    pub fn current_selection(&self) -> Arc<SelectionSet> {
        self.selection.current()
    }

    /// All three views from one consistent read
    pub fn views(&self) -> ProjectionSet {
        self.projections.views()
    }

    /// Tree view
    pub fn tree_view(&self) -> TreeView {
        self.projections.tree_view()
    }

    /// Table view
    pub fn table_view(&self) -> TableView {
        self.projections.table_view()
    }

    /// Graph view
    pub fn graph_view(&self) -> GraphView {
        self.projections.graph_view()
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("name", &self.config.name)
            .field("store", &self.store)
            .field("selection", &self.selection)
            .field("queries", &self.queries)
            .finish()
    }
}
