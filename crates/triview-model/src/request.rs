//! Paging, sort, filter and search shapes exchanged with a query service

use crate::entity::Entity;
use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending
    #[default]
    Asc,
    /// Descending
    Desc,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        })
    }
}

impl FromStr for Direction {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(ModelError::UnknownDirection(other.to_string())),
        }
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    /// Field name, see [`Entity::field_value`]
    pub field: String,
    /// Direction
    #[serde(default)]
    pub direction: Direction,
}

impl SortSpec {
    /// Ascending sort on `field`
    #[inline]
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    /// Descending sort on `field`
    #[inline]
    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

impl Display for SortSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.field, self.direction)
    }
}

/// Equality predicate; a filter set is conjunctive
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Filter {
    /// Field name, see [`Entity::field_value`]
    pub field: String,
    /// Required value
    pub value: String,
}

impl Filter {
    /// Create predicate `field == value`
    #[inline]
    #[must_use]
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether `entity` satisfies the predicate
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        entity
            .field_value(&self.field)
            .is_some_and(|v| v.eq_ignore_ascii_case(&self.value))
    }
}

/// Fully resolved page request sent to a query service
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageRequest {
    /// Zero-based page index
    pub page: u32,
    /// Page size
    pub size: u32,
    /// Ordered sort keys
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortSpec>,
    /// Conjunctive predicates
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub filter: BTreeSet<Filter>,
    /// Search term, never blank
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl PageRequest {
    /// Create request for one page
    #[inline]
    #[must_use]
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            ..Self::default()
        }
    }

    /// Whether `entity` satisfies every filter and the search term
    ///
    /// Search matches case-insensitively against id, names and text.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        if !self.filter.iter().all(|f| f.matches(entity)) {
            return false;
        }
        match &self.search {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                let attrs = &entity.attributes;
                std::iter::once(Some(entity.id.as_str()))
                    .chain([
                        attrs.declared_name.as_deref(),
                        attrs.declared_short_name.as_deref(),
                        attrs.text.as_deref(),
                    ])
                    .flatten()
                    .any(|s| s.to_lowercase().contains(&term))
            }
        }
    }
}

/// One page of entities as returned by the service
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Entities on this page
    pub content: Vec<Entity>,
    /// Page index
    pub page: u32,
    /// Page size
    pub size: u32,
    /// Total matching entities on the server
    pub total_elements: u64,
    /// Total pages on the server
    pub total_pages: u32,
    /// First page flag
    pub first: bool,
    /// Last page flag
    pub last: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Status;

    #[test]
    fn filter_matches_case_insensitively() {
        let e = Entity::definition("R-1").with_status(Status::Approved);
        assert!(Filter::new("status", "APPROVED").matches(&e));
        assert!(!Filter::new("status", "draft").matches(&e));
        assert!(!Filter::new("declaredName", "x").matches(&e));
    }

    #[test]
    fn request_search_looks_at_names_and_text() {
        let e = Entity::definition("R-1")
            .with_name("Braking distance")
            .with_text("The vehicle shall stop within 40 m");

        let mut req = PageRequest::new(0, 10);
        req.search = Some("BRAKING".into());
        assert!(req.matches(&e));

        req.search = Some("40 m".into());
        assert!(req.matches(&e));

        req.search = Some("steering".into());
        assert!(!req.matches(&e));
    }

    #[test]
    fn request_filters_are_conjunctive() {
        let e = Entity::usage("U-1", "R-1").with_status(Status::Draft);
        let mut req = PageRequest::new(0, 10);
        req.filter.insert(Filter::new("kind", "usage"));
        assert!(req.matches(&e));

        req.filter.insert(Filter::new("status", "approved"));
        assert!(!req.matches(&e));
    }

    #[test]
    fn sort_spec_display() {
        assert_eq!(SortSpec::desc("declaredName").to_string(), "declaredName,desc");
        assert_eq!("DESC".parse::<Direction>().unwrap(), Direction::Desc);
    }
}
