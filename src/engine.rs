// ⚙️ Transaction Engine - apply an ordered batch of changes atomically
//
// One batch = one store transaction. Events run strictly in ascending
// transaction id order; the first failure rolls back every event in the
// batch and restores the allocator, so a rerun starts from a clean slate.

use crate::allocator::{prefix_for, IdAllocator};
use crate::config::EngineConfig;
use crate::error::{OrgChartError, Result};
use crate::events::{Event, EventKind};
use crate::graph::{Finish, GraphStore};
use crate::model::EntityType;
use crate::transitions::{self, TransitionContext, TransitionOutcome};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{error, info, info_span};

// ============================================================================
// BATCH REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Unique id of this run, also attached to every log line
    pub run_id: String,
    pub events_applied: usize,
    pub by_kind: BTreeMap<EventKind, usize>,
    pub totals: TransitionOutcome,
    /// False for dry runs
    pub committed: bool,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        format!(
            "{} event(s) {}: {} node(s) created, {} relationship(s) created, {} relationship(s) closed",
            self.events_applied,
            if self.committed { "committed" } else { "rolled back (dry run)" },
            self.totals.nodes_created,
            self.totals.relationships_created,
            self.totals.relationships_closed,
        )
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct TransactionEngine {
    config: EngineConfig,
}

impl TransactionEngine {
    pub fn new(config: EngineConfig) -> Self {
        TransactionEngine { config }
    }

    /// Build an allocator seeded from the store's current entities.
    /// Call at the start of every run; counters are never persisted.
    pub fn seed_allocator<S: GraphStore>(&self, store: &mut S) -> Result<IdAllocator> {
        let namespace = self.config.id_namespace.clone();
        let stats = store.with_transaction(|tx| {
            let mut stats = HashMap::new();
            for entity_type in EntityType::ALL {
                let s = tx.entity_stats(entity_type, &prefix_for(&namespace, entity_type))?;
                info!(
                    entity_type = %entity_type,
                    count = s.count,
                    highest_suffix = s.highest_suffix,
                    "seeded id counter"
                );
                stats.insert(entity_type, s);
            }
            Ok(stats)
        })?;
        Ok(IdAllocator::seeded(&namespace, &stats))
    }

    /// Apply `events` as one atomic batch and commit
    pub fn run<S: GraphStore>(
        &self,
        store: &mut S,
        allocator: &mut IdAllocator,
        events: &[Event],
    ) -> Result<BatchReport> {
        self.run_with(store, allocator, events, Finish::Commit)
    }

    /// Apply `events` as one batch, then commit or discard per `finish`.
    ///
    /// On error nothing is applied, the allocator is restored and the
    /// returned error names the failing transaction id when there is one.
    pub fn run_with<S: GraphStore>(
        &self,
        store: &mut S,
        allocator: &mut IdAllocator,
        events: &[Event],
        finish: Finish,
    ) -> Result<BatchReport> {
        let ordered = order_events(events)?;
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("batch", run_id = %run_id, events = ordered.len());
        let _guard = span.enter();

        let checkpoint = allocator.clone();
        let config = &self.config;

        let result = store.with_transaction_mode(finish, |tx| {
            let mut ctx = TransitionContext {
                tx,
                allocator: &mut *allocator,
                config,
            };
            let mut totals = TransitionOutcome::default();
            let mut by_kind = BTreeMap::new();

            for event in &ordered {
                let kind = event.kind();
                let _event_span =
                    info_span!("event", transaction_id = event.transaction_id, kind = %kind).entered();

                let outcome = transitions::apply(&mut ctx, event).map_err(|e| {
                    OrgChartError::EventFailed {
                        transaction_id: event.transaction_id,
                        source: Box::new(e),
                    }
                })?;

                info!("Processed {} transaction: {}", kind, event.transaction_id);
                totals.absorb(outcome);
                *by_kind.entry(kind).or_insert(0) += 1;
            }

            // Last line of defense before commit
            if let Some(conflict) = ctx.tx.verify_open_edges()?.into_iter().next() {
                return Err(OrgChartError::DuplicateOpenRelationship {
                    kind: conflict.kind.to_string(),
                    from: format!("{} open parents", conflict.open_parents),
                    to: conflict.child,
                });
            }

            Ok((totals, by_kind))
        });

        match result {
            Ok((totals, by_kind)) => {
                let committed = finish == Finish::Commit;
                if !committed {
                    *allocator = checkpoint;
                }
                let report = BatchReport {
                    run_id,
                    events_applied: ordered.len(),
                    by_kind,
                    totals,
                    committed,
                };
                info!("{}", report.summary());
                Ok(report)
            }
            Err(err) => {
                *allocator = checkpoint;
                error!(
                    transaction_id = err.failed_transaction(),
                    error = %err,
                    "batch rolled back"
                );
                Err(err)
            }
        }
    }
}

/// Sort by transaction id; ids must be unique across the batch
pub fn order_events(events: &[Event]) -> Result<Vec<&Event>> {
    let mut ordered: Vec<&Event> = events.iter().collect();
    ordered.sort_by_key(|e| e.transaction_id);

    if let Some(pair) = ordered
        .windows(2)
        .find(|pair| pair[0].transaction_id == pair[1].transaction_id)
    {
        return Err(OrgChartError::malformed(
            pair[0].transaction_id,
            "transaction_id",
            "appears more than once in the batch",
        ));
    }

    Ok(ordered)
}
