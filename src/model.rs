// Graph vocabulary - closed enumerations of entity and relationship kinds
//
// Nothing outside these enums ever reaches the store as a label or
// relationship kind. External strings are parsed into them first.

use crate::error::{OrgChartError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ENTITY TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Government,
    Minister,
    Department,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [
        EntityType::Government,
        EntityType::Minister,
        EntityType::Department,
    ];

    /// Label stored on the node
    pub fn label(&self) -> &'static str {
        match self {
            EntityType::Government => "Government",
            EntityType::Minister => "Minister",
            EntityType::Department => "Department",
        }
    }

    /// Canonical abbreviation used in generated identifiers
    pub fn abbreviation(&self) -> &'static str {
        match self {
            EntityType::Government => "gov",
            EntityType::Minister => "min",
            EntityType::Department => "dep",
        }
    }

    /// Type an entity of this type reports to
    pub fn parent(&self) -> Option<EntityType> {
        match self {
            EntityType::Government => None,
            EntityType::Minister => Some(EntityType::Government),
            EntityType::Department => Some(EntityType::Minister),
        }
    }

    /// Edge kind from the parent to this entity
    pub fn upstream_kind(&self) -> Option<RelationshipType> {
        match self {
            EntityType::Government => None,
            EntityType::Minister => Some(RelationshipType::HasMinister),
            EntityType::Department => Some(RelationshipType::HasDepartment),
        }
    }

    /// Edge kind from this entity to its children
    pub fn downstream_kind(&self) -> Option<RelationshipType> {
        match self {
            EntityType::Government => Some(RelationshipType::HasMinister),
            EntityType::Minister => Some(RelationshipType::HasDepartment),
            EntityType::Department => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityType {
    type Err = OrgChartError;

    /// Accepts the label in any case ("Minister", "minister", "MINISTER")
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "government" => Ok(EntityType::Government),
            "minister" => Ok(EntityType::Minister),
            "department" => Ok(EntityType::Department),
            _ => Err(OrgChartError::UnknownEntityType(s.to_string())),
        }
    }
}

// ============================================================================
// RELATIONSHIP TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    HasMinister,
    HasDepartment,
    RenamedTo,
    MergedInto,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::HasMinister => "HAS_MINISTER",
            RelationshipType::HasDepartment => "HAS_DEPARTMENT",
            RelationshipType::RenamedTo => "RENAMED_TO",
            RelationshipType::MergedInto => "MERGED_INTO",
        }
    }

    /// Structural edges carry a validity interval and can be closed.
    /// Historical markers are written once and never closed.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            RelationshipType::HasMinister | RelationshipType::HasDepartment
        )
    }

    /// (parent, child) endpoint types for structural kinds
    pub fn endpoints(&self) -> Option<(EntityType, EntityType)> {
        match self {
            RelationshipType::HasMinister => Some((EntityType::Government, EntityType::Minister)),
            RelationshipType::HasDepartment => {
                Some((EntityType::Minister, EntityType::Department))
            }
            RelationshipType::RenamedTo | RelationshipType::MergedInto => None,
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = OrgChartError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HAS_MINISTER" => Ok(RelationshipType::HasMinister),
            "HAS_DEPARTMENT" => Ok(RelationshipType::HasDepartment),
            "RENAMED_TO" => Ok(RelationshipType::RenamedTo),
            "MERGED_INTO" => Ok(RelationshipType::MergedInto),
            _ => Err(OrgChartError::UnknownRelationshipType(s.to_string())),
        }
    }
}

// ============================================================================
// ENTITY REFERENCE
// ============================================================================

/// Handle to a node inside the store.
///
/// `key` is the store's internal row key; `id` is the stable business
/// identifier and is `None` only between creation and id assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub key: i64,
    pub entity_type: EntityType,
    pub name: String,
    pub id: Option<String>,
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.entity_type, self.name)
    }
}

// ============================================================================
// DATES
// ============================================================================

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// Parse a calendar date, trying ISO first
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Parse an end date from a snapshot or legacy source.
/// Blank and the legacy `-1` sentinel both mean "still open".
pub fn parse_end_date(value: Option<&str>) -> std::result::Result<Option<NaiveDate>, String> {
    match value.map(str::trim) {
        None | Some("") | Some("-1") => Ok(None),
        Some(raw) => parse_date(raw)
            .map(Some)
            .ok_or_else(|| format!("`{}` is not a calendar date", raw)),
    }
}
