pub(crate) mod fifo_replacer;
pub(crate) mod lru_replacer;

use crate::config::Algorithm;
use crate::typedef::{FrameId, PageKey, Pid};
use fifo_replacer::FifoReplacer;
use lru_replacer::LruReplacer;

/// Eviction ordering over resident pages.
///
/// Both implementations keep an ordered index next to a hash map, so loads,
/// accesses and removals are O(log n). Victim selection is O(log n) plus the
/// number of leading entries skipped because they belong to the faulting
/// process.
pub(crate) trait Replacer: Send + Sync {
    /// Record that `key` was just loaded into `frame_id`.
    fn record_load(&mut self, key: PageKey, frame_id: FrameId);

    /// Record a hit on a resident page. Unknown keys are ignored.
    fn record_access(&mut self, key: PageKey);

    /// Remove and return the next victim. Pages of `faulting` are skipped
    /// unless they are the only candidates left.
    fn select_victim(&mut self, faulting: Pid) -> Option<(PageKey, FrameId)>;

    /// Stop tracking `key`, returning the frame it was recorded in.
    fn remove(&mut self, key: PageKey) -> Option<FrameId>;

    fn contains(&self, key: PageKey) -> bool;

    /// Returns the number of tracked resident pages.
    fn len(&self) -> usize;

    fn algorithm(&self) -> Algorithm;
}

pub(crate) fn new_replacer(algorithm: Algorithm) -> Box<dyn Replacer> {
    match algorithm {
        Algorithm::Fifo => Box::new(FifoReplacer::new()),
        Algorithm::Lru => Box::new(LruReplacer::new()),
    }
}

/// First entry not owned by `faulting`, falling back to the very first entry.
pub(crate) fn pick_candidate<'a, T: 'a>(
    mut ordered: impl Iterator<Item = (&'a T, PageKey)> + Clone,
    faulting: Pid,
) -> Option<&'a T> {
    ordered
        .clone()
        .find(|(_, key)| key.pid != faulting)
        .or_else(|| ordered.next())
        .map(|(slot, _)| slot)
}
