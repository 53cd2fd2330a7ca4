use crate::config::Algorithm;
use crate::typedef::{FrameId, PageKey, Pid};
use std::collections::{BTreeMap, HashMap};

use super::{pick_candidate, Replacer};

struct FifoEntry {
    key: PageKey,
    frame_id: FrameId,
}

/// Evicts in load order. Accesses never reorder the queue.
pub(crate) struct FifoReplacer {
    queue: BTreeMap<u64, FifoEntry>,
    position: HashMap<PageKey, u64>,
    next_sequence: u64,
}

impl FifoReplacer {
    pub(crate) fn new() -> Self {
        FifoReplacer {
            queue: BTreeMap::new(),
            position: HashMap::new(),
            next_sequence: 0,
        }
    }
}

impl Replacer for FifoReplacer {
    fn record_load(&mut self, key: PageKey, frame_id: FrameId) {
        self.remove(key);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queue.insert(sequence, FifoEntry { key, frame_id });
        self.position.insert(key, sequence);
    }

    fn record_access(&mut self, _key: PageKey) {}

    fn select_victim(&mut self, faulting: Pid) -> Option<(PageKey, FrameId)> {
        let ordered = self.queue.iter().map(|(sequence, entry)| (sequence, entry.key));
        let sequence = *pick_candidate(ordered, faulting)?;
        let entry = self.queue.remove(&sequence)?;
        self.position.remove(&entry.key);
        Some((entry.key, entry.frame_id))
    }

    fn remove(&mut self, key: PageKey) -> Option<FrameId> {
        let sequence = self.position.remove(&key)?;
        self.queue.remove(&sequence).map(|entry| entry.frame_id)
    }

    fn contains(&self, key: PageKey) -> bool {
        self.position.contains_key(&key)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::Fifo
    }
}
