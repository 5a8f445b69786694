use std::sync::atomic::{AtomicU32, Ordering};

/// Episode identity shared by every world of a manager.
///
/// Only backend execution advances it. Each world reset claims the next id.
#[derive(Debug, Default)]
pub struct EpisodeCounter {
    cur_episode: AtomicU32,
}

impl EpisodeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an episode id. Ids are unique across worlds and threads.
    pub fn next_episode(&self) -> u32 {
        self.cur_episode.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of episodes started so far.
    pub fn current(&self) -> u32 {
        self.cur_episode.load(Ordering::Relaxed)
    }

    /// Overwrite the count, e.g. after reading it back from device memory.
    pub fn store(&self, value: u32) {
        self.cur_episode.store(value, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn starts_at_zero() {
        assert_eq!(EpisodeCounter::new().current(), 0);
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let counter = Arc::new(EpisodeCounter::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&counter);
                std::thread::spawn(move || (0..100).map(|_| c.next_episode()).collect::<Vec<_>>())
            })
            .collect();
        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id), "episode id {id} handed out twice");
            }
        }
        assert_eq!(counter.current(), 400);
    }
}
