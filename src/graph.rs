// Graph Adapter - the narrow surface the engine uses against the store
//
// `GraphTx` is every operation available inside an open transaction.
// `GraphStore` owns transaction scoping: the closure runs against one
// transaction which is committed on success and rolled back on error.

use crate::allocator::EntityStats;
use crate::error::Result;
use crate::model::{EntityRef, EntityType, RelationshipType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How a successful transaction scope ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    Commit,
    /// Discard the work even though it succeeded (dry runs)
    Rollback,
}

/// A node with more than one open parent edge of the same kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenEdgeConflict {
    pub kind: RelationshipType,
    pub child: String,
    pub open_parents: usize,
}

pub trait GraphTx {
    /// Look up an entity by natural key
    fn find_entity(&mut self, entity_type: EntityType, name: &str) -> Result<Option<EntityRef>>;

    /// Look up an entity by its stable id
    fn find_entity_by_id(&mut self, entity_type: EntityType, id: &str) -> Result<Option<EntityRef>>;

    /// Get-or-create by natural key. `true` when the node was created here;
    /// the caller then owes it an id via `set_entity_id`.
    fn find_or_create_entity(
        &mut self,
        entity_type: EntityType,
        name: &str,
    ) -> Result<(EntityRef, bool)>;

    fn set_entity_id(&mut self, entity: &EntityRef, id: &str) -> Result<()>;

    /// Create an open edge. Fails with `DuplicateOpenRelationship` when an
    /// open structural edge of the same kind already joins the pair.
    fn create_relationship(
        &mut self,
        from: &EntityRef,
        to: &EntityRef,
        kind: RelationshipType,
        start: NaiveDate,
    ) -> Result<()>;

    /// Record an edge whose whole validity interval is already known.
    /// Closed edges never conflict with open ones.
    fn create_closed_relationship(
        &mut self,
        from: &EntityRef,
        to: &EntityRef,
        kind: RelationshipType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<()>;

    /// Close the open edge matching the pattern. Returns how many were
    /// closed (0 or 1); more than one match is `DuplicateOpenRelationship`.
    fn close_open_relationship(
        &mut self,
        from_type: EntityType,
        from_name: &str,
        to_type: EntityType,
        to_name: &str,
        kind: RelationshipType,
        end: NaiveDate,
    ) -> Result<usize>;

    /// Close every open edge of `kind` ending at `to`
    fn close_open_incoming(
        &mut self,
        to: &EntityRef,
        kind: RelationshipType,
        end: NaiveDate,
    ) -> Result<usize>;

    /// Close every open edge of `kind` leaving `from`
    fn close_open_outgoing(
        &mut self,
        from: &EntityRef,
        kind: RelationshipType,
        end: NaiveDate,
    ) -> Result<usize>;

    /// For every open `kind` edge leaving `from`, open an equivalent edge
    /// leaving `to`. Old edges are left untouched; targets already joined
    /// to `to` by an open edge are skipped. Returns the number created.
    fn transfer_open_relationships(
        &mut self,
        from: &EntityRef,
        to: &EntityRef,
        kind: RelationshipType,
        start: NaiveDate,
    ) -> Result<usize>;

    /// Current parent of `child` through an open `kind` edge
    fn open_parent(&mut self, child: &EntityRef, kind: RelationshipType) -> Result<Option<EntityRef>>;

    fn entity_stats(&mut self, entity_type: EntityType, id_prefix: &str) -> Result<EntityStats>;

    /// Children holding more than one open parent edge of a structural kind
    fn verify_open_edges(&mut self) -> Result<Vec<OpenEdgeConflict>>;
}

pub trait GraphStore {
    /// Run `f` inside one transaction and end it per `finish`. On error the
    /// transaction is rolled back and the error propagated.
    fn with_transaction_mode<T, F>(&mut self, finish: Finish, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn GraphTx) -> Result<T>;

    fn with_transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn GraphTx) -> Result<T>,
    {
        self.with_transaction_mode(Finish::Commit, f)
    }
}
