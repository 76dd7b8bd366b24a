// Org Chart Ledger - Core Library
// Temporal org-chart engine: ordered change events applied atomically to a graph store

pub mod allocator;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod loader;
pub mod model;
pub mod seed;
pub mod transitions;

// Re-export commonly used types
pub use allocator::{EntityStats, IdAllocator};
pub use config::EngineConfig;
pub use db::SqliteGraph;
pub use engine::{BatchReport, TransactionEngine};
pub use error::{OrgChartError, Result};
pub use events::{Change, Event, EventKind, RawEvent};
pub use graph::{Finish, GraphStore, GraphTx};
pub use loader::load_events;
pub use model::{EntityRef, EntityType, RelationshipType};
pub use seed::{seed_from_dir, SeedReport};
pub use transitions::TransitionOutcome;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
