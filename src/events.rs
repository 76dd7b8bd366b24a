// Event Model - one typed value per row of the change log
//
// Rows arrive as loosely-typed CSV records (`RawEvent`) tagged with the
// kind of file they came from. `Event::from_raw` validates every field the
// kind needs and produces a tagged variant; nothing here touches the graph.

use crate::error::{OrgChartError, Result};
use crate::model::{parse_date, EntityType, RelationshipType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// EVENT KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    Add,
    Rename,
    Move,
    Terminate,
    Merge,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Rename,
        EventKind::Move,
        EventKind::Add,
        EventKind::Terminate,
        EventKind::Merge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Add => "Add",
            EventKind::Rename => "Rename",
            EventKind::Move => "Move",
            EventKind::Terminate => "Terminate",
            EventKind::Merge => "Merge",
        }
    }

    /// Source file holding events of this kind
    pub fn file_name(&self) -> &'static str {
        match self {
            EventKind::Add => "ADD.csv",
            EventKind::Rename => "RENAME.csv",
            EventKind::Move => "MOVE.csv",
            EventKind::Terminate => "TERMINATE.csv",
            EventKind::Merge => "MERGE.csv",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RAW ROW
// ============================================================================

/// Union of the columns used by every event file.
/// Columns a file does not carry stay `None`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawEvent {
    pub transaction_id: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub old: Option<String>,
    pub new: Option<String>,
    pub old_parent: Option<String>,
    pub new_parent: Option<String>,
    pub parent: Option<String>,
    pub child: Option<String>,
    pub date: Option<String>,
    pub parent_type: Option<String>,
    pub child_type: Option<String>,
    pub rel_type: Option<String>,
}

// ============================================================================
// TYPED EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddEntity {
    pub parent: String,
    pub child: String,
    pub parent_type: EntityType,
    pub child_type: EntityType,
    pub relationship: RelationshipType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameEntity {
    pub entity_type: EntityType,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveEntity {
    pub entity_type: EntityType,
    pub old_parent: String,
    pub new_parent: String,
    pub child: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminateRelationship {
    pub parent: String,
    pub child: String,
    pub parent_type: EntityType,
    pub child_type: EntityType,
    pub relationship: RelationshipType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeEntities {
    pub entity_type: EntityType,
    pub old: Vec<String>,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    Add(AddEntity),
    Rename(RenameEntity),
    Move(MoveEntity),
    Terminate(TerminateRelationship),
    Merge(MergeEntities),
}

/// One validated structural change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub transaction_id: u64,
    pub date: NaiveDate,
    pub change: Change,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self.change {
            Change::Add(_) => EventKind::Add,
            Change::Rename(_) => EventKind::Rename,
            Change::Move(_) => EventKind::Move,
            Change::Terminate(_) => EventKind::Terminate,
            Change::Merge(_) => EventKind::Merge,
        }
    }

    /// Validate a raw row of the given kind.
    ///
    /// Errors found after the transaction id is known are wrapped in
    /// `EventFailed` so the caller can tell which row was rejected.
    pub fn from_raw(kind: EventKind, raw: &RawEvent) -> Result<Event> {
        let transaction_id = parse_transaction_id(raw)?;

        build(kind, transaction_id, raw).map_err(|e| OrgChartError::EventFailed {
            transaction_id,
            source: Box::new(e),
        })
    }
}

fn build(kind: EventKind, transaction_id: u64, raw: &RawEvent) -> Result<Event> {
    let tx = transaction_id;
    let date_text = required(tx, "date", &raw.date)?;
    let date = parse_date(&date_text).ok_or_else(|| {
        OrgChartError::malformed(tx, "date", format!("`{}` is not a calendar date", date_text))
    })?;

    let change = match kind {
        EventKind::Add => {
            let (parent_type, child_type, relationship) = structural_types(tx, raw)?;
            Change::Add(AddEntity {
                parent: required(tx, "parent", &raw.parent)?,
                child: required(tx, "child", &raw.child)?,
                parent_type,
                child_type,
                relationship,
            })
        }
        EventKind::Terminate => {
            let (parent_type, child_type, relationship) = structural_types(tx, raw)?;
            Change::Terminate(TerminateRelationship {
                parent: required(tx, "parent", &raw.parent)?,
                child: required(tx, "child", &raw.child)?,
                parent_type,
                child_type,
                relationship,
            })
        }
        EventKind::Rename => {
            let entity_type = reportable_type(tx, raw)?;
            let old = required(tx, "old", &raw.old)?;
            let new = required(tx, "new", &raw.new)?;
            if old == new {
                return Err(OrgChartError::malformed(tx, "new", "must differ from `old`"));
            }
            Change::Rename(RenameEntity { entity_type, old, new })
        }
        EventKind::Move => {
            let entity_type = reportable_type(tx, raw)?;
            let old_parent = required(tx, "old_parent", &raw.old_parent)?;
            let new_parent = required(tx, "new_parent", &raw.new_parent)?;
            if old_parent == new_parent {
                return Err(OrgChartError::malformed(
                    tx,
                    "new_parent",
                    "must differ from `old_parent`",
                ));
            }
            Change::Move(MoveEntity {
                entity_type,
                old_parent,
                new_parent,
                child: required(tx, "child", &raw.child)?,
            })
        }
        EventKind::Merge => {
            let entity_type = reportable_type(tx, raw)?;
            let old_text = required(tx, "old", &raw.old)?;
            let old = parse_name_list(&old_text).map_err(|reason| OrgChartError::malformed(tx, "old", reason))?;
            let new = required(tx, "new", &raw.new)?;

            if old.is_empty() {
                return Err(OrgChartError::malformed(tx, "old", "must name at least one entity"));
            }
            if old.contains(&new) {
                return Err(OrgChartError::malformed(tx, "old", "must not contain `new`"));
            }
            for (i, name) in old.iter().enumerate() {
                if old[..i].contains(name) {
                    return Err(OrgChartError::malformed(
                        tx,
                        "old",
                        format!("`{}` listed twice", name),
                    ));
                }
            }
            Change::Merge(MergeEntities { entity_type, old, new })
        }
    };

    Ok(Event {
        transaction_id,
        date,
        change,
    })
}

// ============================================================================
// FIELD HELPERS
// ============================================================================

fn parse_transaction_id(raw: &RawEvent) -> Result<u64> {
    let text = raw
        .transaction_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OrgChartError::malformed("?", "transaction_id", "missing"))?;

    text.parse::<u64>().map_err(|_| {
        OrgChartError::malformed(text, "transaction_id", format!("`{}` is not numeric", text))
    })
}

fn required(tx: u64, field: &str, value: &Option<String>) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| OrgChartError::malformed(tx, field, "missing"))
}

/// Parent type, child type and relationship for Add/Terminate rows.
/// The relationship must be structural and match the endpoint types.
fn structural_types(tx: u64, raw: &RawEvent) -> Result<(EntityType, EntityType, RelationshipType)> {
    let parent_type: EntityType = required(tx, "parent_type", &raw.parent_type)?.parse()?;
    let child_type: EntityType = required(tx, "child_type", &raw.child_type)?.parse()?;
    let relationship: RelationshipType = required(tx, "rel_type", &raw.rel_type)?.parse()?;

    if !relationship.is_structural() {
        return Err(OrgChartError::malformed(
            tx,
            "rel_type",
            format!("{} is a history marker and cannot be added or terminated", relationship),
        ));
    }
    if relationship.endpoints() != Some((parent_type, child_type)) {
        return Err(OrgChartError::malformed(
            tx,
            "rel_type",
            format!(
                "{} does not connect {} -> {}",
                relationship, parent_type, child_type
            ),
        ));
    }

    Ok((parent_type, child_type, relationship))
}

/// `type` column for Rename/Move/Merge: anything that reports to a parent
fn reportable_type(tx: u64, raw: &RawEvent) -> Result<EntityType> {
    let entity_type: EntityType = required(tx, "type", &raw.entity_type)?.parse()?;
    if entity_type.parent().is_none() {
        return Err(OrgChartError::malformed(
            tx,
            "type",
            format!("{} has no parent", entity_type),
        ));
    }
    Ok(entity_type)
}

/// Parse a bracketed list of quoted names: `['A', "B, Ltd"]`.
/// A bare unbracketed value is a single name.
pub fn parse_name_list(text: &str) -> std::result::Result<Vec<String>, String> {
    let text = text.trim();
    let inner = match (text.strip_prefix('['), text.ends_with(']')) {
        (Some(rest), true) => &rest[..rest.len() - 1],
        (None, false) => return Ok(vec![text.to_string()]),
        _ => return Err(format!("unbalanced brackets in `{}`", text)),
    };

    let mut names = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.peek().map_or(false, |c| c.is_whitespace()) {
            chars.next();
        }
        let quote = match chars.next() {
            None => break,
            Some(q @ ('\'' | '"')) => q,
            Some(c) => return Err(format!("expected a quoted name, found `{}`", c)),
        };

        let mut name = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        name.push(escaped);
                    }
                }
                c if c == quote => {
                    closed = true;
                    break;
                }
                c => name.push(c),
            }
        }
        if !closed {
            return Err(format!("unterminated name `{}`", name));
        }

        let name = name.trim().to_string();
        if name.is_empty() {
            return Err("empty name in list".to_string());
        }
        names.push(name);

        while chars.peek().map_or(false, |c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(c) => return Err(format!("expected `,` between names, found `{}`", c)),
        }
    }

    Ok(names)
}
