//! Per-batch entity cache.
//!
//! One [`EntityCache`] exists per entity kind for the lifetime of a batch. A
//! miss reads through to the durable store exactly once per id; the answer,
//! including "absent", is remembered for the rest of the batch.

use std::collections::HashMap;

use crate::db::{DbError, EntityStore};
use crate::types::entities::{Entity, Record};

#[derive(Debug, Clone)]
enum Slot<E> {
    Absent,
    Loaded(E),
    Written(E),
}

impl<E> Slot<E> {
    fn entity(&self) -> Option<&E> {
        match self {
            Slot::Absent => None,
            Slot::Loaded(entity) | Slot::Written(entity) => Some(entity),
        }
    }
}

#[derive(Debug)]
pub struct EntityCache<E> {
    slots: HashMap<String, Slot<E>>,
}

impl<E: Entity> EntityCache<E> {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// Look up `id`, consulting the store only when the batch has not seen it.
    pub async fn resolve(
        &mut self,
        store: &dyn EntityStore,
        id: &str,
    ) -> Result<Option<E>, DbError> {
        if let Some(slot) = self.slots.get(id) {
            return Ok(slot.entity().cloned());
        }

        let loaded = store.get(E::KIND, id).await?.and_then(E::from_record);
        let slot = match &loaded {
            Some(entity) => Slot::Loaded(entity.clone()),
            None => Slot::Absent,
        };
        self.slots.insert(id.to_string(), slot);
        Ok(loaded)
    }

    /// Replace the batch's copy of the entity. Persisted when the batch commits.
    pub fn put(&mut self, entity: E) {
        self.slots
            .insert(entity.id().to_string(), Slot::Written(entity));
    }

    pub fn written_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Written(_)))
            .count()
    }

    /// Entities written during the batch, ordered by id.
    pub fn into_written(self) -> Vec<Record> {
        let mut written: Vec<(String, E)> = self
            .slots
            .into_iter()
            .filter_map(|(id, slot)| match slot {
                Slot::Written(entity) => Some((id, entity)),
                _ => None,
            })
            .collect();
        written.sort_by(|a, b| a.0.cmp(&b.0));
        written.into_iter().map(|(_, e)| e.into_record()).collect()
    }
}

impl<E: Entity> Default for EntityCache<E> {
    fn default() -> Self {
        Self::new()
    }
}
