//! Table projection
//!
//! One flat row per entity regardless of kind, in store insertion order.
//! Absent attributes render as empty cells.

use im::{HashMap, Vector};
use std::sync::Arc;
use triview_model::{Direction, Entity, EntityId, EntityKind};
use triview_store::{SelectionSet, StoreReadGuard};

/// Stable column set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableColumn {
    /// Entity id
    Id,
    /// Kind tag
    Kind,
    /// Declared name
    DeclaredName,
    /// Declared short name
    DeclaredShortName,
    /// Status
    Status,
    /// Free text
    Text,
}

impl TableColumn {
    /// Every column in display order
    pub const ALL: [TableColumn; 6] = [
        Self::Id,
        Self::Kind,
        Self::DeclaredName,
        Self::DeclaredShortName,
        Self::Status,
        Self::Text,
    ];

    /// Column header
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Id => "Id",
            Self::Kind => "Kind",
            Self::DeclaredName => "Name",
            Self::DeclaredShortName => "Short Name",
            Self::Status => "Status",
            Self::Text => "Text",
        }
    }
}

/// One table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    /// Entity id
    pub id: EntityId,
    /// Kind tag
    pub kind: EntityKind,
    /// Declared name, empty if absent
    pub declared_name: String,
    /// Declared short name, empty if absent
    pub declared_short_name: String,
    /// Status, empty if absent
    pub status: String,
    /// Free text, empty if absent
    pub text: String,
    /// Whether the id is in the selection snapshot of this view
    pub selected: bool,
}

impl TableRow {
    pub(crate) fn from_entity(entity: &Entity, selected: bool) -> Self {
        let attrs = &entity.attributes;
        Self {
            id: entity.id.clone(),
            kind: entity.kind(),
            declared_name: attrs.declared_name.clone().unwrap_or_default(),
            declared_short_name: attrs.declared_short_name.clone().unwrap_or_default(),
            status: attrs
                .status
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            text: attrs.text.clone().unwrap_or_default(),
            selected,
        }
    }

    /// Cell text for `column`
    #[must_use]
    pub fn cell(&self, column: TableColumn) -> &str {
        match column {
            TableColumn::Id => self.id.as_str(),
            TableColumn::Kind => self.kind.as_str(),
            TableColumn::DeclaredName => &self.declared_name,
            TableColumn::DeclaredShortName => &self.declared_short_name,
            TableColumn::Status => &self.status,
            TableColumn::Text => &self.text,
        }
    }
}

/// Table view model
#[derive(Debug, Clone)]
pub struct TableView {
    store_version: u64,
    selection: Arc<SelectionSet>,
    rows: Vector<TableRow>,
    index: HashMap<EntityId, usize>,
}

impl TableView {
    pub(crate) fn build(store: &StoreReadGuard<'_>, selection: &Arc<SelectionSet>) -> Self {
        let mut rows = Vector::new();
        let mut index = HashMap::new();
        for entity in store.iter() {
            index.insert(entity.id.clone(), rows.len());
            rows.push_back(TableRow::from_entity(entity, selection.contains(entity.id.as_str())));
        }
        Self {
            store_version: store.version(),
            selection: Arc::clone(selection),
            rows,
            index,
        }
    }

    /// Rebuild only the rows of `ids`; returns the number of rows touched
    ///
    /// New ids are appended, which matches store insertion order because
    /// the store appends first-seen ids too.
    pub(crate) fn apply_upserts(&mut self, store: &StoreReadGuard<'_>, ids: &[EntityId]) -> usize {
        let mut touched = 0;
        for id in ids {
            let Some(entity) = store.get(id.as_str()) else {
                continue;
            };
            let row = TableRow::from_entity(entity, self.selection.contains(id.as_str()));
            match self.index.get(id) {
                Some(&pos) => {
                    self.rows.set(pos, row);
                }
                None => {
                    self.index.insert(id.clone(), self.rows.len());
                    self.rows.push_back(row);
                }
            }
            touched += 1;
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

    /// Selection snapshot used to mark rows
    #[inline]
    #[must_use]
    pub fn selection(&self) -> &Arc<SelectionSet> {
        &self.selection
    }

    /// Rows in store order
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &Vector<TableRow> {
        &self.rows
    }

    /// Row for `id`
    #[must_use]
    pub fn row(&self, id: &str) -> Option<&TableRow> {
        self.index.get(id).and_then(|&pos| self.rows.get(pos))
    }

    /// Number of rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if table has no rows
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Ids of rows marked selected
    #[must_use]
    pub fn selected_ids(&self) -> Vec<EntityId> {
        self.rows
            .iter()
            .filter(|r| r.selected)
            .map(|r| r.id.clone())
            .collect()
    }

    /// Rows ordered by one column, ties kept in store order
    #[must_use]
    pub fn sorted_by(&self, column: TableColumn, direction: Direction) -> Vec<&TableRow> {
        let mut rows: Vec<&TableRow> = self.rows.iter().collect();
        rows.sort_by(|a, b| {
            let ord = a.cell(column).cmp(b.cell(column));
            match direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        });
        rows
    }

    /// Rows whose `column` contains `needle`, case-insensitively
    #[must_use]
    pub fn filtered(&self, column: TableColumn, needle: &str) -> Vec<&TableRow> {
        let needle = needle.to_lowercase();
        self.rows
            .iter()
            .filter(|r| r.cell(column).to_lowercase().contains(&needle))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use triview_model::Status;
    use triview_store::NormalizedStore;

    fn build(store: &NormalizedStore) -> TableView {
        TableView::build(&store.read(), &Arc::new(SelectionSet::default()))
    }

    #[test]
    fn absent_attributes_render_empty() {
        let store = NormalizedStore::new();
        store.merge(vec![Entity::usage("U-1", "R-1")]);

        let table = build(&store);
        let row = table.row("U-1").unwrap();
        assert_eq!(row.kind, EntityKind::Usage);
        for column in [
            TableColumn::DeclaredName,
            TableColumn::DeclaredShortName,
            TableColumn::Status,
            TableColumn::Text,
        ] {
            assert_eq!(row.cell(column), "");
        }
    }

    #[test]
    fn one_row_per_entity_of_every_kind() {
        let store = NormalizedStore::new();
        store.merge(vec![
            Entity::definition("R-1"),
            Entity::usage("U-1", "R-1"),
            Entity::dependency("D-1", "U-1", "R-1"),
        ]);

        let table = build(&store);
        let ids: Vec<&str> = table.rows().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["R-1", "U-1", "D-1"]);
    }

    #[test]
    fn apply_upserts_replaces_and_appends() {
        let store = NormalizedStore::new();
        store.merge(vec![Entity::definition("R-1"), Entity::definition("R-2")]);
        let mut table = build(&store);

        store.merge(vec![
            Entity::definition("R-1").with_status(Status::Approved),
            Entity::definition("R-3"),
        ]);
        let touched = table.apply_upserts(
            &store.read(),
            &[EntityId::from("R-1"), EntityId::from("R-3")],
        );

        assert_eq!(touched, 2);
        assert_eq!(table.len(), 3);
        assert_eq!(table.row("R-1").unwrap().status, "approved");
        assert_eq!(table.rows().back().unwrap().id.as_str(), "R-3");
        assert_eq!(table.store_version(), store.version());
    }

    #[test]
    fn sorted_and_filtered_rows() {
        let store = NormalizedStore::new();
        store.merge(vec![
            Entity::definition("R-1").with_name("Braking"),
            Entity::definition("R-2").with_name("Acceleration"),
            Entity::definition("R-3").with_name("Steering"),
        ]);
        let table = build(&store);

        let names: Vec<&str> = table
            .sorted_by(TableColumn::DeclaredName, Direction::Desc)
            .iter()
            .map(|r| r.declared_name.as_str())
            .collect();
        assert_eq!(names, vec!["Steering", "Braking", "Acceleration"]);

        let hits = table.filtered(TableColumn::DeclaredName, "ING");
        assert_eq!(hits.len(), 2);
    }
}
