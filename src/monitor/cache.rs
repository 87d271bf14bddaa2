use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::providers::types::DefinitionId;

use super::snapshot::PipelineStatusSnapshot;

/// Latest snapshot per pipeline id, plus the flag recording whether a full
/// poll has populated it yet.
pub trait StatusCache: Send + Sync {
    fn get(&self, id: DefinitionId) -> Option<PipelineStatusSnapshot>;

    /// Stores `snapshot` unconditionally and returns the entry it replaced.
    fn insert(&self, snapshot: PipelineStatusSnapshot) -> Option<PipelineStatusSnapshot>;

    fn is_seeded(&self) -> bool;

    fn mark_seeded(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-lifetime cache held in memory. Entries are never evicted.
#[derive(Debug, Default)]
pub struct MemoryStatusCache {
    snapshots: Mutex<HashMap<DefinitionId, PipelineStatusSnapshot>>,
    seeded: AtomicBool,
}

impl MemoryStatusCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusCache for MemoryStatusCache {
    fn get(&self, id: DefinitionId) -> Option<PipelineStatusSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    fn insert(&self, snapshot: PipelineStatusSnapshot) -> Option<PipelineStatusSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(snapshot.id, snapshot)
    }

    fn is_seeded(&self) -> bool {
        self.seeded.load(Ordering::Acquire)
    }

    fn mark_seeded(&self) {
        self.seeded.store(true, Ordering::Release);
    }

    fn len(&self) -> usize {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
