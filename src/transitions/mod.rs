// Transition Handlers - one graph-mutation sequence per event kind
//
// Every handler works through the same transaction handle as the rest of
// the batch. Handlers may leave a child with two open parents only inside
// their own body; by the time they return, each child has at most one.

pub mod add_entity;
pub mod merge;
pub mod move_entity;
pub mod rename;
pub mod terminate;

use crate::allocator::IdAllocator;
use crate::config::EngineConfig;
use crate::error::{OrgChartError, Result};
use crate::events::{Change, Event};
use crate::graph::GraphTx;
use crate::model::{EntityRef, EntityType, RelationshipType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Counts of what one handler (or a whole batch) changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub nodes_created: usize,
    pub relationships_created: usize,
    pub relationships_closed: usize,
    /// Ids handed out to newly created entities, in order
    pub allocated: Vec<String>,
}

impl TransitionOutcome {
    pub fn absorb(&mut self, other: TransitionOutcome) {
        self.nodes_created += other.nodes_created;
        self.relationships_created += other.relationships_created;
        self.relationships_closed += other.relationships_closed;
        self.allocated.extend(other.allocated);
    }
}

/// What to do when the child already sits under the intended parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attach {
    /// Any existing open parent edge is an error
    Strict,
    /// An open edge from the same parent is kept as is
    Reuse,
}

pub struct TransitionContext<'a> {
    pub tx: &'a mut dyn GraphTx,
    pub allocator: &'a mut IdAllocator,
    pub config: &'a EngineConfig,
}

/// Dispatch one event to its handler
pub fn apply(ctx: &mut TransitionContext<'_>, event: &Event) -> Result<TransitionOutcome> {
    match &event.change {
        Change::Add(add) => add_entity::apply(ctx, add, event.date),
        Change::Rename(rename) => rename::apply(ctx, rename, event.date),
        Change::Move(movement) => move_entity::apply(ctx, movement, event.date),
        Change::Terminate(terminate) => terminate::apply(ctx, terminate, event.date),
        Change::Merge(merge) => merge::apply(ctx, merge, event.transaction_id, event.date),
    }
}

// ============================================================================
// SHARED STEPS
// ============================================================================

/// Edge kind from an entity's parent to the entity
pub(crate) fn upstream_kind(entity_type: EntityType) -> Result<RelationshipType> {
    entity_type.upstream_kind().ok_or_else(|| {
        OrgChartError::UnknownRelationshipType(format!("{} has no parent", entity_type))
    })
}

impl TransitionContext<'_> {
    pub fn find_entity(&mut self, entity_type: EntityType, name: &str) -> Result<EntityRef> {
        self.tx
            .find_entity(entity_type, name)?
            .ok_or_else(|| OrgChartError::EntityNotFound {
                entity_type: entity_type.to_string(),
                name: name.to_string(),
            })
    }

    pub fn find_parent(&mut self, entity_type: EntityType, name: &str) -> Result<EntityRef> {
        self.tx
            .find_entity(entity_type, name)?
            .ok_or_else(|| OrgChartError::ParentNotFound {
                entity_type: entity_type.to_string(),
                name: name.to_string(),
            })
    }

    /// Get-or-create by natural key; new entities get a freshly allocated id
    pub fn find_or_create_with_id(
        &mut self,
        entity_type: EntityType,
        name: &str,
        outcome: &mut TransitionOutcome,
    ) -> Result<EntityRef> {
        let (mut entity, created) = self.tx.find_or_create_entity(entity_type, name)?;

        if created {
            let id = self.allocator.allocate(entity_type)?;
            self.tx.set_entity_id(&entity, &id)?;
            entity.id = Some(id.clone());
            outcome.nodes_created += 1;
            outcome.allocated.push(id.clone());
            info!("Created {} `{}` as {}: 1 node(s) created", entity_type, name, id);
        } else {
            info!("Found existing {} `{}`: 0 node(s) created", entity_type, name);
        }

        Ok(entity)
    }

    /// Parent a reporting entity hangs under: the root government for
    /// ministers, the current parent of `anchor` otherwise
    pub fn reporting_parent(&mut self, entity_type: EntityType, anchor: &EntityRef) -> Result<EntityRef> {
        match entity_type {
            EntityType::Minister => {
                let government = self.config.government.clone();
                self.find_parent(EntityType::Government, &government)
            }
            _ => {
                let kind = upstream_kind(entity_type)?;
                self.tx
                    .open_parent(anchor, kind)?
                    .ok_or_else(|| OrgChartError::NoOpenRelationship {
                        kind: kind.to_string(),
                        from: format!("any {}", entity_type.parent().map_or("parent", |p| p.label())),
                        to: anchor.name.clone(),
                    })
            }
        }
    }

    /// Open `kind` from `parent` to `child`
    pub fn attach(
        &mut self,
        parent: &EntityRef,
        child: &EntityRef,
        kind: RelationshipType,
        date: NaiveDate,
        policy: Attach,
        outcome: &mut TransitionOutcome,
    ) -> Result<()> {
        if let Some(current) = self.tx.open_parent(child, kind)? {
            if policy == Attach::Reuse && current.key == parent.key {
                info!("{} already open {} -> {}: 0 relationship(s) created", kind, parent.name, child.name);
                return Ok(());
            }
            return Err(OrgChartError::DuplicateOpenRelationship {
                kind: kind.to_string(),
                from: current.name,
                to: child.name.clone(),
            });
        }

        self.tx.create_relationship(parent, child, kind, date)?;
        outcome.relationships_created += 1;
        info!("Created {} {} -> {}: 1 relationship(s) created", kind, parent.name, child.name);
        Ok(())
    }

    /// Close the single open `kind` edge `parent -> child`; none is an error
    pub fn close_exactly_one(
        &mut self,
        parent: &EntityRef,
        child: &EntityRef,
        kind: RelationshipType,
        date: NaiveDate,
        outcome: &mut TransitionOutcome,
    ) -> Result<()> {
        let closed = self.tx.close_open_relationship(
            parent.entity_type,
            &parent.name,
            child.entity_type,
            &child.name,
            kind,
            date,
        )?;

        info!("Terminated {} {} -> {}: {} relationship(s) closed", kind, parent.name, child.name, closed);
        if closed == 0 {
            return Err(OrgChartError::NoOpenRelationship {
                kind: kind.to_string(),
                from: parent.name.clone(),
                to: child.name.clone(),
            });
        }

        outcome.relationships_closed += closed;
        Ok(())
    }

    /// Hand every open child of `old` over to `new`, then close the old edges
    pub fn hand_over_children(
        &mut self,
        old: &EntityRef,
        new: &EntityRef,
        date: NaiveDate,
        outcome: &mut TransitionOutcome,
    ) -> Result<()> {
        let Some(kind) = old.entity_type.downstream_kind() else {
            return Ok(());
        };

        let transferred = self.tx.transfer_open_relationships(old, new, kind, date)?;
        outcome.relationships_created += transferred;
        info!("Transferred {} from {} to {}: {} relationship(s) created", kind, old.name, new.name, transferred);

        let closed = self.tx.close_open_outgoing(old, kind, date)?;
        outcome.relationships_closed += closed;
        info!("Terminated {} from {}: {} relationship(s) closed", kind, old.name, closed);
        Ok(())
    }

    /// Permanent historical marker (RENAMED_TO / MERGED_INTO)
    pub fn mark_history(
        &mut self,
        old: &EntityRef,
        new: &EntityRef,
        kind: RelationshipType,
        date: NaiveDate,
        outcome: &mut TransitionOutcome,
    ) -> Result<()> {
        self.tx.create_relationship(old, new, kind, date)?;
        outcome.relationships_created += 1;
        info!("Created {} {} -> {}: 1 relationship(s) created", kind, old.name, new.name);
        Ok(())
    }
}

// ============================================================================
// TEST SUPPORT
// ============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use super::{TransitionContext, TransitionOutcome};
    use crate::allocator::IdAllocator;
    use crate::config::EngineConfig;
    use crate::db::SqliteGraph;
    use crate::engine::TransactionEngine;
    use crate::error::Result;
    use crate::events::{Change, Event};
    use crate::graph::GraphStore;
    use crate::model::{EntityType, RelationshipType};
    use chrono::NaiveDate;

    pub const GOV: &str = "Government of Sri Lanka";

    pub fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub fn event(transaction_id: u64, on: &str, change: Change) -> Event {
        Event {
            transaction_id,
            date: date(on),
            change,
        }
    }

    /// Government with ministers and their departments, all open since `since`
    pub fn seeded_graph(since: &str, layout: &[(&str, &[&str])]) -> SqliteGraph {
        let mut graph = SqliteGraph::open_in_memory().unwrap();
        graph
            .with_transaction(|tx| {
                let (gov, _) = tx.find_or_create_entity(EntityType::Government, GOV)?;
                tx.set_entity_id(&gov, "gzt_gov_1")?;
                let mut departments = 0;
                for (i, (minister, deps)) in layout.iter().enumerate() {
                    let (m, _) = tx.find_or_create_entity(EntityType::Minister, minister)?;
                    tx.set_entity_id(&m, &format!("gzt_min_{}", i + 1))?;
                    tx.create_relationship(&gov, &m, RelationshipType::HasMinister, date(since))?;
                    for dep in deps.iter() {
                        let (d, _) = tx.find_or_create_entity(EntityType::Department, dep)?;
                        departments += 1;
                        tx.set_entity_id(&d, &format!("gzt_dep_{}", departments))?;
                        tx.create_relationship(&m, &d, RelationshipType::HasDepartment, date(since))?;
                    }
                }
                Ok(())
            })
            .unwrap();
        graph
    }

    pub fn allocator_for(graph: &mut SqliteGraph) -> IdAllocator {
        TransactionEngine::new(EngineConfig::default())
            .seed_allocator(graph)
            .unwrap()
    }

    /// Apply a single event in its own transaction
    pub fn run(
        graph: &mut SqliteGraph,
        allocator: &mut IdAllocator,
        event: &Event,
    ) -> Result<TransitionOutcome> {
        let config = EngineConfig::default();
        graph.with_transaction(|tx| {
            let mut ctx = TransitionContext {
                tx,
                allocator,
                config: &config,
            };
            super::apply(&mut ctx, event)
        })
    }

    pub fn open(s: &str) -> Vec<(String, Option<String>)> {
        vec![(s.to_string(), None)]
    }

    pub fn closed(from: &str, to: &str) -> Vec<(String, Option<String>)> {
        vec![(from.to_string(), Some(to.to_string()))]
    }
}
