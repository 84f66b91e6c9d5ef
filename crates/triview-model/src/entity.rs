//! Entity - the canonical unit held by the store
//!
//! An [`Entity`] is an immutable snapshot. A later fetch of the same id
//! replaces the earlier snapshot wholesale, so nothing here is mutated in
//! place once it has been handed to the store.

use crate::error::ModelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Globally unique, immutable entity identity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create identity from any string-like value
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&EntityId> for EntityId {
    fn from(value: &EntityId) -> Self {
        value.clone()
    }
}

impl std::borrow::Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Closed set of entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Requirement definition
    Definition,
    /// Requirement usage, bound to a definition through `of`
    Usage,
    /// Dependency link between two entities
    Dependency,
}

impl EntityKind {
    /// Wire name of the kind
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Definition => "definition",
            Self::Usage => "usage",
            Self::Dependency => "dependency",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "definition" => Ok(Self::Definition),
            "usage" => Ok(Self::Usage),
            "dependency" => Ok(Self::Dependency),
            other => Err(ModelError::UnknownKind(other.to_string())),
        }
    }
}

/// Role of a relation reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationRole {
    /// Usage -> definition it instantiates
    Of,
    /// Dependency -> client end
    Source,
    /// Dependency -> supplier end
    Target,
}

impl RelationRole {
    /// Wire name of the role
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Of => "of",
            Self::Source => "source",
            Self::Target => "target",
        }
    }
}

impl Display for RelationRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationRole {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "of" => Ok(Self::Of),
            "source" => Ok(Self::Source),
            "target" => Ok(Self::Target),
            other => Err(ModelError::UnknownRole(other.to_string())),
        }
    }
}

/// Requirement lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Being written
    Draft,
    /// Submitted for review
    Proposed,
    /// Accepted baseline
    Approved,
    /// Declined in review
    Rejected,
    /// Superseded or withdrawn
    Obsolete,
}

impl Status {
    /// Wire name of the status
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Proposed => "proposed",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Obsolete => "obsolete",
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "proposed" => Ok(Self::Proposed),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "obsolete" => Ok(Self::Obsolete),
            other => Err(ModelError::UnknownStatus(other.to_string())),
        }
    }
}

/// Kind-specific payload of an entity
///
/// Relations live on the variant that owns them, so a definition can never
/// carry a `source` and a usage can never carry a `target`. Every relation is
/// optional and may dangle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityBody {
    /// Requirement definition (no outgoing relations)
    Definition {},

    /// Requirement usage
    Usage {
        /// Definition this usage instantiates
        #[serde(default, skip_serializing_if = "Option::is_none")]
        of: Option<EntityId>,
    },

    /// Dependency link
    Dependency {
        /// Client end
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<EntityId>,
        /// Supplier end
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<EntityId>,
    },
}

impl EntityBody {
    /// Kind tag of this body
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Definition {} => EntityKind::Definition,
            Self::Usage { .. } => EntityKind::Usage,
            Self::Dependency { .. } => EntityKind::Dependency,
        }
    }
}

/// Typed attribute mapping
///
/// Attributes the model does not know about are kept verbatim in
/// `extensions` so a fetch/merge cycle never loses data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    /// Declared name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_name: Option<String>,

    /// Declared short name (requirement id such as `REQ-12`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_short_name: Option<String>,

    /// Free requirement text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Lifecycle status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Last modification timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Unknown attributes, preserved as received
    #[serde(flatten)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

/// Canonical entity snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Identity
    pub id: EntityId,

    /// Kind tag and relations
    #[serde(flatten)]
    pub body: EntityBody,

    /// Attribute mapping
    #[serde(default)]
    pub attributes: Attributes,
}

impl Entity {
    /// Create entity from id and body with empty attributes
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<EntityId>, body: EntityBody) -> Self {
        Self {
            id: id.into(),
            body,
            attributes: Attributes::default(),
        }
    }

    /// Create a requirement definition
    #[inline]
    #[must_use]
    pub fn definition(id: impl Into<EntityId>) -> Self {
        Self::new(id, EntityBody::Definition {})
    }

    /// Create a requirement usage of `of`
    #[inline]
    #[must_use]
    pub fn usage(id: impl Into<EntityId>, of: impl Into<EntityId>) -> Self {
        Self::new(id, EntityBody::Usage { of: Some(of.into()) })
    }

    /// Create a requirement usage with no `of` relation
    #[inline]
    #[must_use]
    pub fn unbound_usage(id: impl Into<EntityId>) -> Self {
        Self::new(id, EntityBody::Usage { of: None })
    }

    /// Create a dependency from `source` to `target`
    #[inline]
    #[must_use]
    pub fn dependency(
        id: impl Into<EntityId>,
        source: impl Into<EntityId>,
        target: impl Into<EntityId>,
    ) -> Self {
        Self::new(
            id,
            EntityBody::Dependency {
                source: Some(source.into()),
                target: Some(target.into()),
            },
        )
    }

    /// With declared name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.attributes.declared_name = Some(name.into());
        self
    }

    /// With declared short name
    #[inline]
    #[must_use]
    pub fn with_short_name(mut self, short_name: impl Into<String>) -> Self {
        self.attributes.declared_short_name = Some(short_name.into());
        self
    }

    /// With free text
    #[inline]
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.attributes.text = Some(text.into());
        self
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.attributes.status = Some(status);
        self
    }

    /// With timestamps
    #[inline]
    #[must_use]
    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.attributes.created_at = Some(created_at);
        self.attributes.updated_at = Some(updated_at);
        self
    }

    /// With an extension attribute
    #[inline]
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.extensions.insert(key.into(), value);
        self
    }

    /// Kind tag
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.body.kind()
    }

    /// Target of the relation with `role`, if present
    #[must_use]
    pub fn relation(&self, role: RelationRole) -> Option<&EntityId> {
        match (&self.body, role) {
            (EntityBody::Usage { of }, RelationRole::Of) => of.as_ref(),
            (EntityBody::Dependency { source, .. }, RelationRole::Source) => source.as_ref(),
            (EntityBody::Dependency { target, .. }, RelationRole::Target) => target.as_ref(),
            _ => None,
        }
    }

    /// Every present relation as `(role, target)`
    #[must_use]
    pub fn relations(&self) -> Vec<(RelationRole, &EntityId)> {
        match &self.body {
            EntityBody::Definition {} => Vec::new(),
            EntityBody::Usage { of } => of.iter().map(|id| (RelationRole::Of, id)).collect(),
            EntityBody::Dependency { source, target } => source
                .iter()
                .map(|id| (RelationRole::Source, id))
                .chain(target.iter().map(|id| (RelationRole::Target, id)))
                .collect(),
        }
    }

    /// Whether kind and relations match `other`
    ///
    /// Two snapshots with the same shape differ at most in attributes, which
    /// never moves an entity within a tree or graph.
    #[inline]
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        self.body == other.body
    }

    /// Display label: declared name, then short name, then id
    #[must_use]
    pub fn label(&self) -> &str {
        self.attributes
            .declared_name
            .as_deref()
            .or(self.attributes.declared_short_name.as_deref())
            .unwrap_or_else(|| self.id.as_str())
    }

    /// Value of a named field as a string, for sorting and filtering
    ///
    /// Recognises `id`, `kind`, `declaredName`, `declaredShortName`, `text`,
    /// `status`, `createdAt`, `updatedAt`, the relation roles and any
    /// extension key.
    #[must_use]
    pub fn field_value(&self, field: &str) -> Option<String> {
        let attrs = &self.attributes;
        match field {
            "id" => Some(self.id.to_string()),
            "kind" => Some(self.kind().as_str().to_string()),
            "declaredName" => attrs.declared_name.clone(),
            "declaredShortName" => attrs.declared_short_name.clone(),
            "text" => attrs.text.clone(),
            "status" => attrs.status.map(|s| s.as_str().to_string()),
            "createdAt" => attrs.created_at.map(|t| t.to_rfc3339()),
            "updatedAt" => attrs.updated_at.map(|t| t.to_rfc3339()),
            other => match other.parse::<RelationRole>() {
                Ok(role) => self.relation(role).map(ToString::to_string),
                Err(_) => attrs.extensions.get(other).map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    v => v.to_string(),
                }),
            },
        }
    }
}
