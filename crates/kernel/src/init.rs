//! Per-world construction records.

use crate::episode::EpisodeCounter;
use hideseek_assets::ObjectStore;
use std::sync::Arc;

/// Everything one world needs at construction. Consumed by the backend.
#[derive(Debug, Clone)]
pub struct WorldInit {
    pub episodes: Arc<EpisodeCounter>,
    pub objects: Arc<ObjectStore>,
    pub min_entities: u32,
    pub max_entities: u32,
}

pub struct WorldInitTable;

impl WorldInitTable {
    /// One record per world. Records differ only in identity: they share the
    /// same counter and object storage.
    pub fn build(
        count: usize,
        min_entities: u32,
        max_entities: u32,
        episodes: &Arc<EpisodeCounter>,
        objects: &Arc<ObjectStore>,
    ) -> Vec<WorldInit> {
        (0..count)
            .map(|_| WorldInit {
                episodes: Arc::clone(episodes),
                objects: Arc::clone(objects),
                min_entities,
                max_entities,
            })
            .collect()
    }
}
