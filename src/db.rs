// 🗄️ Graph store - property graph persisted in SQLite
//
// Nodes carry a label (entity type), a natural key (name) and a stable id.
// Relationships carry a kind and a validity interval; a NULL end_date is
// the only representation of "open".

use crate::allocator::{id_suffix, EntityStats};
use crate::error::{OrgChartError, Result};
use crate::graph::{Finish, GraphStore, GraphTx, OpenEdgeConflict};
use crate::model::{EntityRef, EntityType, RelationshipType};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use tracing::{debug, warn};

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;

    // ==========================================================================
    // Nodes (one row per entity, natural key unique per label)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS nodes (
            node_key INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL,
            name TEXT NOT NULL,
            id TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (label, name)
        )",
        [],
    )?;

    // ==========================================================================
    // Relationships (validity interval, NULL end_date = open)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS relationships (
            rel_key INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            from_node INTEGER NOT NULL REFERENCES nodes(node_key),
            to_node INTEGER NOT NULL REFERENCES nodes(node_key),
            start_date TEXT NOT NULL,
            end_date TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_id ON nodes(label, id) WHERE id IS NOT NULL",
        [],
    )?;

    // At most one open structural edge per (from, to, kind)
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_open_structural
         ON relationships(from_node, to_node, kind)
         WHERE end_date IS NULL AND kind IN ('HAS_MINISTER', 'HAS_DEPARTMENT')",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_relationships_from ON relationships(from_node, kind)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_relationships_to ON relationships(to_node, kind)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// STORE
// ============================================================================

pub struct SqliteGraph {
    conn: Connection,
}

impl SqliteGraph {
    /// Open (or create) a graph database file
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL for crash recovery; in-memory databases report "memory"
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;

        setup_schema(&conn)?;
        Ok(SqliteGraph { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_schema(&conn)?;
        Ok(SqliteGraph { conn })
    }
}

impl GraphStore for SqliteGraph {
    fn with_transaction_mode<T, F>(&mut self, finish: Finish, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn GraphTx) -> Result<T>,
    {
        // Dropping an unfinished rusqlite transaction rolls it back, so the
        // transaction is released on every exit path including unwinding.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let outcome = {
            let mut handle = SqliteTx { conn: &tx };
            f(&mut handle)
        };

        match (outcome, finish) {
            (Ok(value), Finish::Commit) => {
                tx.commit()?;
                debug!("transaction committed");
                Ok(value)
            }
            (Ok(value), Finish::Rollback) => {
                tx.rollback()?;
                debug!("transaction rolled back (dry run)");
                Ok(value)
            }
            (Err(err), _) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

// ============================================================================
// TRANSACTION HANDLE
// ============================================================================

struct SqliteTx<'c> {
    conn: &'c Connection,
}

type NodeRow = (i64, String, String, Option<String>);

fn node_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NodeRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn to_entity((key, label, name, id): NodeRow) -> Result<EntityRef> {
    Ok(EntityRef {
        key,
        entity_type: label.parse()?,
        name,
        id,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn date_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl GraphTx for SqliteTx<'_> {
    fn find_entity(&mut self, entity_type: EntityType, name: &str) -> Result<Option<EntityRef>> {
        self.conn
            .query_row(
                "SELECT node_key, label, name, id FROM nodes WHERE label = ?1 AND name = ?2",
                params![entity_type.label(), name],
                node_row,
            )
            .optional()?
            .map(to_entity)
            .transpose()
    }

    fn find_entity_by_id(&mut self, entity_type: EntityType, id: &str) -> Result<Option<EntityRef>> {
        self.conn
            .query_row(
                "SELECT node_key, label, name, id FROM nodes WHERE label = ?1 AND id = ?2",
                params![entity_type.label(), id],
                node_row,
            )
            .optional()?
            .map(to_entity)
            .transpose()
    }

    fn find_or_create_entity(
        &mut self,
        entity_type: EntityType,
        name: &str,
    ) -> Result<(EntityRef, bool)> {
        if let Some(existing) = self.find_entity(entity_type, name)? {
            return Ok((existing, false));
        }

        self.conn.execute(
            "INSERT INTO nodes (label, name) VALUES (?1, ?2)",
            params![entity_type.label(), name],
        )?;

        let entity = EntityRef {
            key: self.conn.last_insert_rowid(),
            entity_type,
            name: name.to_string(),
            id: None,
        };
        Ok((entity, true))
    }

    fn set_entity_id(&mut self, entity: &EntityRef, id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE nodes SET id = ?1 WHERE node_key = ?2",
            params![id, entity.key],
        )?;
        Ok(())
    }

    fn create_relationship(
        &mut self,
        from: &EntityRef,
        to: &EntityRef,
        kind: RelationshipType,
        start: NaiveDate,
    ) -> Result<()> {
        let result = self.conn.execute(
            "INSERT INTO relationships (kind, from_node, to_node, start_date, end_date)
             VALUES (?1, ?2, ?3, ?4, NULL)",
            params![kind.as_str(), from.key, to.key, date_text(start)],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(OrgChartError::DuplicateOpenRelationship {
                kind: kind.to_string(),
                from: from.name.clone(),
                to: to.name.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn create_closed_relationship(
        &mut self,
        from: &EntityRef,
        to: &EntityRef,
        kind: RelationshipType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO relationships (kind, from_node, to_node, start_date, end_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![kind.as_str(), from.key, to.key, date_text(start), date_text(end)],
        )?;
        Ok(())
    }

    fn close_open_relationship(
        &mut self,
        from_type: EntityType,
        from_name: &str,
        to_type: EntityType,
        to_name: &str,
        kind: RelationshipType,
        end: NaiveDate,
    ) -> Result<usize> {
        const MATCH_OPEN: &str = "kind = ?1 AND end_date IS NULL
             AND from_node = (SELECT node_key FROM nodes WHERE label = ?2 AND name = ?3)
             AND to_node = (SELECT node_key FROM nodes WHERE label = ?4 AND name = ?5)";

        let matched: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM relationships WHERE {}", MATCH_OPEN),
            params![kind.as_str(), from_type.label(), from_name, to_type.label(), to_name],
            |row| row.get(0),
        )?;

        if matched > 1 {
            return Err(OrgChartError::DuplicateOpenRelationship {
                kind: kind.to_string(),
                from: from_name.to_string(),
                to: to_name.to_string(),
            });
        }
        if matched == 0 {
            return Ok(0);
        }

        let closed = self.conn.execute(
            &format!("UPDATE relationships SET end_date = ?6 WHERE {}", MATCH_OPEN),
            params![
                kind.as_str(),
                from_type.label(),
                from_name,
                to_type.label(),
                to_name,
                date_text(end)
            ],
        )?;
        Ok(closed)
    }

    fn close_open_incoming(
        &mut self,
        to: &EntityRef,
        kind: RelationshipType,
        end: NaiveDate,
    ) -> Result<usize> {
        let closed = self.conn.execute(
            "UPDATE relationships SET end_date = ?1
             WHERE to_node = ?2 AND kind = ?3 AND end_date IS NULL",
            params![date_text(end), to.key, kind.as_str()],
        )?;
        Ok(closed)
    }

    fn close_open_outgoing(
        &mut self,
        from: &EntityRef,
        kind: RelationshipType,
        end: NaiveDate,
    ) -> Result<usize> {
        let closed = self.conn.execute(
            "UPDATE relationships SET end_date = ?1
             WHERE from_node = ?2 AND kind = ?3 AND end_date IS NULL",
            params![date_text(end), from.key, kind.as_str()],
        )?;
        Ok(closed)
    }

    fn transfer_open_relationships(
        &mut self,
        from: &EntityRef,
        to: &EntityRef,
        kind: RelationshipType,
        start: NaiveDate,
    ) -> Result<usize> {
        let created = self.conn.execute(
            "INSERT INTO relationships (kind, from_node, to_node, start_date, end_date)
             SELECT r.kind, ?2, r.to_node, ?4, NULL
             FROM relationships r
             WHERE r.from_node = ?1 AND r.kind = ?3 AND r.end_date IS NULL
               AND NOT EXISTS (
                   SELECT 1 FROM relationships x
                   WHERE x.from_node = ?2 AND x.to_node = r.to_node
                     AND x.kind = r.kind AND x.end_date IS NULL
               )",
            params![from.key, to.key, kind.as_str(), date_text(start)],
        )?;
        Ok(created)
    }

    fn open_parent(&mut self, child: &EntityRef, kind: RelationshipType) -> Result<Option<EntityRef>> {
        let mut stmt = self.conn.prepare(
            "SELECT n.node_key, n.label, n.name, n.id
             FROM relationships r JOIN nodes n ON n.node_key = r.from_node
             WHERE r.to_node = ?1 AND r.kind = ?2 AND r.end_date IS NULL",
        )?;

        let mut parents = stmt
            .query_map(params![child.key, kind.as_str()], node_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        match parents.len() {
            0 => Ok(None),
            1 => parents.pop().map(to_entity).transpose(),
            _ => Err(OrgChartError::DuplicateOpenRelationship {
                kind: kind.to_string(),
                from: parents
                    .iter()
                    .map(|(_, _, name, _)| name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                to: child.name.clone(),
            }),
        }
    }

    fn entity_stats(&mut self, entity_type: EntityType, id_prefix: &str) -> Result<EntityStats> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM nodes WHERE label = ?1")?;

        let ids = stmt
            .query_map(params![entity_type.label()], |row| row.get::<_, Option<String>>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let highest_suffix = ids
            .iter()
            .flatten()
            .filter_map(|id| id_suffix(id_prefix, id))
            .max()
            .unwrap_or(0);

        Ok(EntityStats {
            count: ids.len() as u64,
            highest_suffix,
        })
    }

    fn verify_open_edges(&mut self) -> Result<Vec<OpenEdgeConflict>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.kind, n.name, COUNT(*)
             FROM relationships r JOIN nodes n ON n.node_key = r.to_node
             WHERE r.end_date IS NULL AND r.kind IN ('HAS_MINISTER', 'HAS_DEPARTMENT')
             GROUP BY r.kind, r.to_node
             HAVING COUNT(*) > 1",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(kind, child, open_parents)| {
                Ok(OpenEdgeConflict {
                    kind: kind.parse()?,
                    child,
                    open_parents: open_parents as usize,
                })
            })
            .collect()
    }
}

// ============================================================================
// TEST SUPPORT
// ============================================================================

/// One relationship as seen by tests: (kind, from, to, start, end)
#[cfg(test)]
pub(crate) type EdgeRow = (String, String, String, String, Option<String>);

/// Full content of the graph, ordered, for before/after comparisons
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GraphDump {
    pub nodes: Vec<(String, String, Option<String>)>,
    pub relationships: Vec<EdgeRow>,
}

#[cfg(test)]
impl SqliteGraph {
    pub(crate) fn dump(&self) -> GraphDump {
        let mut stmt = self
            .conn
            .prepare("SELECT label, name, id FROM nodes ORDER BY label, name")
            .unwrap();
        let nodes: Vec<(String, String, Option<String>)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();

        let mut stmt = self
            .conn
            .prepare(
                "SELECT r.kind, f.name, t.name, r.start_date, r.end_date
                 FROM relationships r
                 JOIN nodes f ON f.node_key = r.from_node
                 JOIN nodes t ON t.node_key = r.to_node
                 ORDER BY r.kind, f.name, t.name, r.start_date",
            )
            .unwrap();
        let relationships: Vec<EdgeRow> = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();

        GraphDump {
            nodes,
            relationships,
        }
    }

    /// Validity intervals of every `kind` edge from `from` to `to`
    pub(crate) fn edges(
        &self,
        kind: RelationshipType,
        from: &str,
        to: &str,
    ) -> Vec<(String, Option<String>)> {
        self.dump()
            .relationships
            .into_iter()
            .filter(|(k, f, t, _, _)| k == kind.as_str() && f == from && t == to)
            .map(|(_, _, _, start, end)| (start, end))
            .collect()
    }

    pub(crate) fn entity_id(&self, entity_type: EntityType, name: &str) -> Option<String> {
        self.conn
            .query_row(
                "SELECT id FROM nodes WHERE label = ?1 AND name = ?2",
                params![entity_type.label(), name],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .unwrap()
            .flatten()
    }

    /// Open edges of a structural kind leaving any node, grouped by child
    pub(crate) fn open_parent_counts(&self) -> Vec<(String, String, i64)> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT kind, to_node, COUNT(*) FROM relationships
                 WHERE end_date IS NULL AND kind IN ('HAS_MINISTER', 'HAS_DEPARTMENT')
                 GROUP BY kind, to_node",
            )
            .unwrap();
        stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get::<_, i64>(1)?.to_string(), row.get(2)?))
        })
        .unwrap()
        .collect::<rusqlite::Result<Vec<_>>>()
        .unwrap()
    }
}
