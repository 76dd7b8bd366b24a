// Identifier Allocator - stable `<namespace>_<abbrev>_<n>` ids per entity type
//
// Counters live in memory only. They are seeded once per run from the
// store and never consult it again.

use crate::error::{OrgChartError, Result};
use crate::model::EntityType;
use std::collections::HashMap;

/// Starting point for one entity type's counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityStats {
    /// Number of entities of the type
    pub count: u64,
    /// Highest numeric suffix among ids carrying this type's prefix
    pub highest_suffix: u64,
}

impl EntityStats {
    /// Counter value already used; the next id is one above it.
    /// Taking the max keeps seeded ids that skip numbers from colliding.
    pub fn floor(&self) -> u64 {
        self.count.max(self.highest_suffix)
    }
}

#[derive(Debug, Clone)]
pub struct IdAllocator {
    namespace: String,
    counters: HashMap<EntityType, u64>,
}

impl IdAllocator {
    /// Create an allocator with no seeded types
    pub fn new(namespace: &str) -> Self {
        IdAllocator {
            namespace: namespace.to_string(),
            counters: HashMap::new(),
        }
    }

    /// Seed every type present in `stats`
    pub fn seeded(namespace: &str, stats: &HashMap<EntityType, EntityStats>) -> Self {
        let mut allocator = IdAllocator::new(namespace);
        for (entity_type, s) in stats {
            allocator.seed(*entity_type, s.floor());
        }
        allocator
    }

    pub fn seed(&mut self, entity_type: EntityType, used: u64) {
        self.counters.insert(entity_type, used);
    }

    /// Prefix shared by every id of the type, without the trailing counter
    pub fn prefix(&self, entity_type: EntityType) -> String {
        prefix_for(&self.namespace, entity_type)
    }

    /// Hand out the next id for `entity_type`.
    /// Call once per newly created entity, never for existing ones.
    pub fn allocate(&mut self, entity_type: EntityType) -> Result<String> {
        let prefix = self.prefix(entity_type);
        let counter = self
            .counters
            .get_mut(&entity_type)
            .ok_or_else(|| OrgChartError::UnknownEntityType(entity_type.label().to_string()))?;

        *counter += 1;
        Ok(format!("{}_{}", prefix, counter))
    }

    /// Last counter value handed out (or seeded) for the type
    pub fn current(&self, entity_type: EntityType) -> Option<u64> {
        self.counters.get(&entity_type).copied()
    }
}

pub fn prefix_for(namespace: &str, entity_type: EntityType) -> String {
    format!("{}_{}", namespace, entity_type.abbreviation())
}

/// Numeric suffix of `id` when it is `<prefix>_<digits>`
pub fn id_suffix(prefix: &str, id: &str) -> Option<u64> {
    id.strip_prefix(prefix)?
        .strip_prefix('_')?
        .parse::<u64>()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_formats_and_increments() {
        let mut allocator = IdAllocator::new("gzt");
        allocator.seed(EntityType::Minister, 4);

        assert_eq!(allocator.allocate(EntityType::Minister).unwrap(), "gzt_min_5");
        assert_eq!(allocator.allocate(EntityType::Minister).unwrap(), "gzt_min_6");
        assert_eq!(allocator.current(EntityType::Minister), Some(6));
    }

    #[test]
    fn test_types_have_independent_counters_and_prefixes() {
        let mut allocator = IdAllocator::new("gzt");
        allocator.seed(EntityType::Minister, 0);
        allocator.seed(EntityType::Department, 0);

        let minister = allocator.allocate(EntityType::Minister).unwrap();
        let department = allocator.allocate(EntityType::Department).unwrap();

        assert_eq!(minister, "gzt_min_1");
        assert_eq!(department, "gzt_dep_1");
        assert_ne!(minister, department);
    }

    #[test]
    fn test_unseeded_type_is_rejected() {
        let mut allocator = IdAllocator::new("gzt");

        assert!(matches!(
            allocator.allocate(EntityType::Government),
            Err(OrgChartError::UnknownEntityType(_))
        ));
    }

    #[test]
    fn test_seeding_uses_highest_suffix_when_ids_are_sparse() {
        let mut stats = HashMap::new();
        stats.insert(
            EntityType::Department,
            EntityStats {
                count: 2,
                highest_suffix: 40,
            },
        );

        let mut allocator = IdAllocator::seeded("gzt", &stats);

        assert_eq!(allocator.allocate(EntityType::Department).unwrap(), "gzt_dep_41");
    }

    #[test]
    fn test_id_suffix() {
        assert_eq!(id_suffix("gzt_min", "gzt_min_12"), Some(12));
        assert_eq!(id_suffix("gzt_min", "gzt_dep_12"), None);
        assert_eq!(id_suffix("gzt_min", "gzt_min_x"), None);
        assert_eq!(id_suffix("gzt_min", "gzt_min12"), None);
    }
}
