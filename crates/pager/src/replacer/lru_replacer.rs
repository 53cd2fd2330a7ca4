use crate::config::Algorithm;
use crate::typedef::{FrameId, PageKey, Pid};
use std::collections::{BTreeSet, HashMap};

use super::{pick_candidate, Replacer};

struct LruNode {
    frame_id: FrameId,
    last_accessed_timestamp: u64,
}

/// Evicts the page whose last load or access is oldest. Equal timestamps
/// fall back to the lower (pid, page).
pub(crate) struct LruReplacer {
    node_store: HashMap<PageKey, LruNode>,
    recency: BTreeSet<(u64, PageKey)>,
    current_timestamp: u64,
}

impl LruReplacer {
    pub(crate) fn new() -> Self {
        LruReplacer {
            node_store: HashMap::new(),
            recency: BTreeSet::new(),
            current_timestamp: 0,
        }
    }

    fn current_timestamp(&mut self) -> u64 {
        let old_timestamp = self.current_timestamp;
        self.current_timestamp += 1;
        old_timestamp
    }
}

impl Replacer for LruReplacer {
    fn record_load(&mut self, key: PageKey, frame_id: FrameId) {
        self.remove(key);
        let timestamp = self.current_timestamp();
        self.node_store.insert(
            key,
            LruNode {
                frame_id,
                last_accessed_timestamp: timestamp,
            },
        );
        self.recency.insert((timestamp, key));
    }

    /// Moves the page to the most recently used end.
    fn record_access(&mut self, key: PageKey) {
        let new_timestamp = self.current_timestamp();
        if let Some(node) = self.node_store.get_mut(&key) {
            self.recency.remove(&(node.last_accessed_timestamp, key));
            node.last_accessed_timestamp = new_timestamp;
            self.recency.insert((new_timestamp, key));
        }
    }

    /// Evicts the least recently used page.
    fn select_victim(&mut self, faulting: Pid) -> Option<(PageKey, FrameId)> {
        let ordered = self.recency.iter().map(|entry| (entry, entry.1));
        let (_, key) = *pick_candidate(ordered, faulting)?;
        self.remove(key).map(|frame_id| (key, frame_id))
    }

    fn remove(&mut self, key: PageKey) -> Option<FrameId> {
        let node = self.node_store.remove(&key)?;
        self.recency.remove(&(node.last_accessed_timestamp, key));
        Some(node.frame_id)
    }

    fn contains(&self, key: PageKey) -> bool {
        self.node_store.contains_key(&key)
    }

    fn len(&self) -> usize {
        self.node_store.len()
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::Lru
    }
}
