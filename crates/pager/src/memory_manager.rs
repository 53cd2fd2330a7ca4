use crate::config::{Algorithm, Config};
use crate::frame_table::FrameTable;
use crate::process_table::ProcessTable;
use crate::replacer::{new_replacer, Replacer};
use crate::typedef::{FrameId, PageIndex, PageKey, Pid, Tick};
use crate::view::{FrameView, StateView};
use crate::Result;
use log::{debug, error, info};
use memsim_error::{errinvariant, erroom, errsize, Error};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Page range used for processes spawned by [`MemoryManager::step`].
const SYNTHETIC_PAGES: std::ops::RangeInclusive<usize> = 2..=8;

/// Monotonic event counters. Only a configuration reset zeroes them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub page_faults: u64,
    pub allocations: u64,
    pub deallocations: u64,
    pub hits: u64,
}

/// Result of touching a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Hit {
        key: PageKey,
        frame: FrameId,
    },
    Fault {
        key: PageKey,
        frame: FrameId,
        evicted: Option<PageKey>,
    },
}

impl Access {
    pub fn key(&self) -> PageKey {
        match self {
            Access::Hit { key, .. } | Access::Fault { key, .. } => *key,
        }
    }

    pub fn frame(&self) -> FrameId {
        match self {
            Access::Hit { frame, .. } | Access::Fault { frame, .. } => *frame,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Access::Fault { .. })
    }
}

/// One unit of simulated progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// No process was alive, so a synthetic one was created.
    Spawned(Pid),
    Accessed(Access),
}

/// The pager state machine.
///
/// Starts unconfigured; [`MemoryManager::apply_config`] is the only way into
/// the ready state and doubles as a hard reset. A mutation that reports a
/// broken invariant poisons the manager, after which only a new
/// configuration is accepted.
pub struct MemoryManager {
    config: Option<Config>,
    frames: FrameTable,
    processes: ProcessTable,
    replacer: Box<dyn Replacer>,
    counters: Counters,
    clock: Tick,
    rng: StdRng,
    poisoned: bool,
}

impl MemoryManager {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// A manager whose random choices are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        MemoryManager {
            config: None,
            frames: FrameTable::default(),
            processes: ProcessTable::new(1),
            replacer: new_replacer(Algorithm::default()),
            counters: Counters::default(),
            clock: 0,
            rng,
            poisoned: false,
        }
    }

    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn algorithm(&self) -> Algorithm {
        self.replacer.algorithm()
    }

    pub fn used_frames(&self) -> usize {
        self.frames.used()
    }

    pub fn total_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.processes.pids()
    }

    pub fn page_count(&self, pid: Pid) -> Result<usize> {
        Ok(self.processes.get(pid)?.page_count())
    }

    /// Size the process was created with, before rounding up to pages.
    pub fn size_kb(&self, pid: Pid) -> Result<u64> {
        Ok(self.processes.get(pid)?.size_kb())
    }

    pub fn page_exists(&self, pid: Pid, page: PageIndex) -> bool {
        self.processes.page_exists(pid, page)
    }

    /// Frame holding the page, or `None` if it is not resident.
    pub fn frame_of(&self, pid: Pid, page: PageIndex) -> Result<Option<FrameId>> {
        Ok(self.processes.entry(pid, page)?.frame())
    }

    /// Occupant of a frame, `None` if free or out of range.
    pub fn occupant(&self, frame_id: FrameId) -> Option<PageKey> {
        self.frames.get(frame_id)?.occupant()
    }

    /// Validates and applies a configuration, discarding every process,
    /// frame and counter. Also clears a poisoned state.
    pub fn apply_config(&mut self, config: Config) -> Result<()> {
        config.validate()?;

        self.frames = FrameTable::new(config.total_frames());
        self.processes = ProcessTable::new(config.frame_kb);
        self.replacer = new_replacer(config.algorithm);
        self.counters = Counters::default();
        self.clock = 0;
        self.poisoned = false;
        self.config = Some(config);

        info!(
            "applied config: {} KB in {} frames of {} KB, mode {}, algorithm {}",
            config.total_kb,
            config.total_frames(),
            config.frame_kb,
            config.mode,
            config.algorithm
        );
        Ok(())
    }

    /// Replaces the replacement policy without touching residency. Current
    /// resident pages are replayed into the new policy in load order.
    pub fn set_algorithm(&mut self, algorithm: Algorithm) -> Result<()> {
        self.mutate(|mm| {
            let mut config = *mm.ready()?;

            let mut replacer = new_replacer(algorithm);
            for (frame_id, key) in mm.frames.occupied_in_load_order() {
                replacer.record_load(key, frame_id);
            }
            mm.frames.rewind();
            mm.replacer = replacer;

            config.algorithm = algorithm;
            mm.config = Some(config);
            info!("switched replacement algorithm to {algorithm}");
            Ok(())
        })
    }

    /// Creates a process and eagerly loads all of its pages. Loading into a
    /// free frame is not a fault; a load that needs an eviction is.
    pub fn create_process(&mut self, size_kb: u64) -> Result<Pid> {
        self.mutate(|mm| {
            let total_frames = mm.ready()?.total_frames();
            if size_kb == 0 {
                return errsize!("process size must be positive");
            }
            let pages = mm.processes.pages_for(size_kb);
            if pages > total_frames {
                return erroom!(
                    "{size_kb} KB needs {pages} pages but memory only has {total_frames} frames"
                );
            }

            let pid = mm.processes.create_process(size_kb)?;
            mm.counters.allocations += 1;
            for page in 0..pages {
                let key = PageKey::new(pid, page);
                let (_, evicted) = mm.place(key)?;
                if evicted.is_some() {
                    mm.counters.page_faults += 1;
                }
            }

            info!("created {pid}: {size_kb} KB in {pages} pages");
            Ok(pid)
        })
    }

    /// Frees every frame owned by `pid` and forgets the process.
    pub fn deallocate(&mut self, pid: Pid) -> Result<()> {
        self.mutate(|mm| {
            mm.ready()?;
            let resident = mm.processes.remove_process(pid)?;

            for (key, frame_id) in resident {
                let occupant = mm.frames.free(frame_id)?;
                if occupant != key {
                    return errinvariant!("frame {frame_id} held {occupant}, expected {key}");
                }
                if mm.replacer.remove(key) != Some(frame_id) {
                    return errinvariant!("replacer lost track of {key} in frame {frame_id}");
                }
            }
            mm.counters.deallocations += 1;

            info!("deallocated {pid}");
            Ok(())
        })
    }

    /// Touches one page: a hit refreshes its recency, a miss is a page
    /// fault that loads the page, evicting a victim when memory is full.
    pub fn touch(&mut self, pid: Pid, page: PageIndex) -> Result<Access> {
        self.mutate(|mm| {
            mm.ready()?;
            mm.access(PageKey::new(pid, page))
        })
    }

    /// Touches a uniformly random page of a uniformly random live process.
    /// Returns `None` when no process is alive.
    pub fn random_access(&mut self) -> Result<Option<Access>> {
        self.mutate(|mm| {
            mm.ready()?;
            mm.random_access_inner()
        })
    }

    /// Performs `count` random accesses in one critical section.
    pub fn random_access_burst(&mut self, count: usize) -> Result<Vec<Access>> {
        self.mutate(|mm| {
            mm.ready()?;
            let mut accesses = Vec::with_capacity(count);
            for _ in 0..count {
                match mm.random_access_inner()? {
                    Some(access) => accesses.push(access),
                    None => break,
                }
            }
            Ok(accesses)
        })
    }

    /// Advances the simulation by one tick: a random access, or a new
    /// synthetic process of 2 to 8 pages when none is alive.
    pub fn step(&mut self) -> Result<StepOutcome> {
        self.mutate(|mm| {
            let config = *mm.ready()?;
            if mm.processes.is_empty() {
                let pages = mm.rng.gen_range(SYNTHETIC_PAGES).min(config.total_frames());
                let pid = mm.create_process(pages as u64 * config.frame_kb)?;
                return Ok(StepOutcome::Spawned(pid));
            }

            match mm.random_access_inner()? {
                Some(access) => Ok(StepOutcome::Accessed(access)),
                None => errinvariant!("no process to access although the table is not empty"),
            }
        })
    }

    /// Projects the current state for display. Never mutates.
    pub fn snapshot(&self) -> StateView {
        let algorithm = self.algorithm();
        let frames = self
            .frames
            .iter()
            .map(|(idx, frame)| FrameView {
                idx,
                pid: frame.occupant().map(|key| key.pid.to_string()),
                label: frame.label(algorithm),
            })
            .collect();

        StateView {
            used: self.frames.used(),
            total: self.frames.len(),
            page_faults: self.counters.page_faults,
            allocations: self.counters.allocations,
            deallocations: self.counters.deallocations,
            hits: self.counters.hits,
            pids: self.pids().iter().map(Pid::to_string).collect(),
            frames,
            algorithm: self.config.map(|config| config.algorithm.to_string()),
            mode: self.config.map(|config| config.mode.to_string()),
            system_mem: None,
        }
    }

    /// Audits the frame table, process table and replacer against each other.
    pub fn verify(&self) -> Result<()> {
        if self.frames.used() > self.frames.len() {
            return errinvariant!("{} used frames of {}", self.frames.used(), self.frames.len());
        }

        for (frame_id, frame) in self.frames.iter() {
            let Some(key) = frame.occupant() else {
                continue;
            };
            let entry = match self.processes.entry(key.pid, key.page) {
                Ok(entry) => entry,
                Err(_) => return errinvariant!("frame {frame_id} holds dead page {key}"),
            };
            if entry.frame() != Some(frame_id) {
                return errinvariant!(
                    "frame {frame_id} holds {key}, but the page points at {:?}",
                    entry.frame()
                );
            }
            if !self.replacer.contains(key) {
                return errinvariant!("{key} in frame {frame_id} is not tracked by the replacer");
            }
        }

        for (&pid, process) in self.processes.iter() {
            for (page, entry) in process.pages().iter().enumerate() {
                let Some(frame_id) = entry.frame() else {
                    continue;
                };
                let key = PageKey::new(pid, page);
                if self.occupant(frame_id) != Some(key) {
                    return errinvariant!(
                        "{key} points at frame {frame_id}, which does not hold it"
                    );
                }
            }
        }

        let resident = self.processes.resident_count();
        if resident != self.frames.used() || self.replacer.len() != resident {
            return errinvariant!(
                "{resident} resident pages, {} used frames, {} tracked by the replacer",
                self.frames.used(),
                self.replacer.len()
            );
        }
        Ok(())
    }

    /// Runs a mutation, poisoning the manager if it reports a broken
    /// invariant. A poisoned manager accepts nothing but a new configuration.
    fn mutate<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.poisoned {
            return errinvariant!(
                "state poisoned by an earlier invariant violation, reapply the configuration"
            );
        }
        let result = f(self);
        if let Err(err) = &result {
            if err.is_fatal() {
                error!("memory manager poisoned: {err}");
                self.poisoned = true;
            }
        }
        result
    }

    fn ready(&self) -> Result<&Config> {
        self.config.as_ref().ok_or(Error::Unconfigured)
    }

    fn tick(&mut self) -> Tick {
        self.clock += 1;
        self.clock
    }

    fn access(&mut self, key: PageKey) -> Result<Access> {
        if let Some(frame) = self.processes.entry(key.pid, key.page)?.frame() {
            let tick = self.tick();
            self.frames.touch(frame, tick)?;
            self.replacer.record_access(key);
            self.counters.hits += 1;
            debug!("hit {key} in frame {frame}");
            return Ok(Access::Hit { key, frame });
        }

        self.counters.page_faults += 1;
        let (frame, evicted) = self.place(key)?;
        debug!("fault {key} loaded into frame {frame}, evicted {evicted:?}");
        Ok(Access::Fault { key, frame, evicted })
    }

    fn random_access_inner(&mut self) -> Result<Option<Access>> {
        let pids = self.processes.pids();
        let Some(&pid) = pids.choose(&mut self.rng) else {
            debug!("random access skipped, no live process");
            return Ok(None);
        };
        let pages = self.processes.get(pid)?.page_count();
        let page = self.rng.gen_range(0..pages);
        self.access(PageKey::new(pid, page)).map(Some)
    }

    /// Loads a non-resident page into the lowest free frame, evicting the
    /// replacer's victim first if no frame is free.
    fn place(&mut self, key: PageKey) -> Result<(FrameId, Option<PageKey>)> {
        let (frame_id, evicted) = match self.frames.find_free() {
            Some(frame_id) => (frame_id, None),
            None => {
                let (victim, frame_id) = self.evict(key.pid)?;
                (frame_id, Some(victim))
            }
        };

        let tick = self.tick();
        self.frames.allocate(frame_id, key, tick)?;
        self.processes.mark_resident(key.pid, key.page, frame_id)?;
        self.replacer.record_load(key, frame_id);
        Ok((frame_id, evicted))
    }

    fn evict(&mut self, faulting: Pid) -> Result<(PageKey, FrameId)> {
        let Some((victim, frame_id)) = self.replacer.select_victim(faulting) else {
            return errinvariant!("memory is full but the replacer has no victim");
        };

        let occupant = self.frames.free(frame_id)?;
        if occupant != victim {
            return errinvariant!("victim {victim} expected in frame {frame_id}, found {occupant}");
        }
        if self.processes.mark_evicted(victim.pid, victim.page)? != Some(frame_id) {
            return errinvariant!("victim {victim} was not resident in frame {frame_id}");
        }

        debug!("evicted {victim} from frame {frame_id}");
        Ok((victim, frame_id))
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(total_kb: u64, frame_kb: u64, algorithm: Algorithm) -> MemoryManager {
        let mut mm = MemoryManager::with_seed(7);
        mm.apply_config(Config::new(total_kb, frame_kb, algorithm)).unwrap();
        mm
    }

    #[test]
    fn test_unconfigured() {
        let mut mm = MemoryManager::with_seed(1);

        assert_eq!(Err(Error::Unconfigured), mm.create_process(10));
        assert_eq!(Err(Error::Unconfigured), mm.step());
        assert_eq!(Err(Error::Unconfigured), mm.random_access());
        assert_eq!(0, mm.snapshot().total);
        assert!(!mm.is_poisoned());
    }

    #[test]
    fn test_apply_config_rejects_without_mutation() {
        let mut mm = manager(40, 10, Algorithm::Fifo);
        mm.create_process(25).unwrap();
        let before = mm.snapshot();

        assert!(matches!(
            mm.apply_config(Config::new(40, 0, Algorithm::Fifo)),
            Err(Error::InvalidConfig(_))
        ));
        assert_eq!(before, mm.snapshot());
    }

    #[test]
    fn test_create_process_eager_load() {
        let mut mm = manager(40, 10, Algorithm::Fifo);
        let pid = mm.create_process(25).unwrap();

        assert_eq!(3, mm.page_count(pid).unwrap());
        assert_eq!(25, mm.size_kb(pid).unwrap());
        assert!(mm.page_exists(pid, 2));
        assert!(!mm.page_exists(pid, 3));
        assert_eq!(3, mm.used_frames());
        assert_eq!(0, mm.counters().page_faults);
        assert_eq!(1, mm.counters().allocations);
        for page in 0..3 {
            assert_eq!(Some(page), mm.frame_of(pid, page).unwrap());
        }
        mm.verify().unwrap();
    }

    #[test]
    fn test_create_process_out_of_memory() {
        let mut mm = manager(40, 10, Algorithm::Fifo);
        let before = mm.snapshot();

        assert!(matches!(mm.create_process(41), Err(Error::OutOfMemory(_))));
        assert!(matches!(mm.create_process(0), Err(Error::InvalidSize(_))));
        assert_eq!(before, mm.snapshot());
    }

    #[test]
    fn test_touch_hit_and_fault() {
        let mut mm = manager(20, 10, Algorithm::Lru);
        let p1 = mm.create_process(20).unwrap();

        let access = mm.touch(p1, 1).unwrap();
        assert_eq!(Access::Hit { key: PageKey::new(p1, 1), frame: 1 }, access);
        assert_eq!(1, mm.counters().hits);
        assert_eq!(0, mm.counters().page_faults);

        // p1:0 is now least recently used
        let p2 = mm.create_process(10).unwrap();
        assert_eq!(None, mm.frame_of(p1, 0).unwrap());
        assert_eq!(Some(0), mm.frame_of(p2, 0).unwrap());

        let access = mm.touch(p1, 0).unwrap();
        assert!(access.is_fault());
        assert_eq!(2, mm.counters().page_faults);
        mm.verify().unwrap();
    }

    #[test]
    fn test_touch_bad_target() {
        let mut mm = manager(40, 10, Algorithm::Fifo);
        let pid = mm.create_process(10).unwrap();
        let before = mm.snapshot();

        assert_eq!(
            Err(Error::InvalidPage { pid: pid.to_string(), page: 1 }),
            mm.touch(pid, 1)
        );
        assert_eq!(Err(Error::UnknownPid("P9".into())), mm.touch(Pid::new(9), 0));
        assert_eq!(before, mm.snapshot());
        assert!(!mm.is_poisoned());
    }

    #[test]
    fn test_deallocate_frees_frames() {
        let mut mm = manager(40, 10, Algorithm::Fifo);
        let p1 = mm.create_process(20).unwrap();
        let p2 = mm.create_process(10).unwrap();

        mm.deallocate(p1).unwrap();

        assert_eq!(1, mm.used_frames());
        assert_eq!(vec![p2], mm.pids());
        assert_eq!(1, mm.counters().deallocations);
        assert_eq!(Some(PageKey::new(p2, 0)), mm.occupant(2));
        assert_eq!(None, mm.occupant(0));
        mm.verify().unwrap();

        assert_eq!(Err(Error::UnknownPid(p1.to_string())), mm.deallocate(p1));
        assert_eq!(1, mm.counters().deallocations);
    }

    #[test]
    fn test_random_access_without_processes() {
        let mut mm = manager(40, 10, Algorithm::Fifo);
        let before = mm.snapshot();

        assert_eq!(Ok(None), mm.random_access());
        assert_eq!(before, mm.snapshot());
    }

    #[test]
    fn test_step_spawns_then_accesses() {
        let mut mm = manager(1024, 64, Algorithm::Fifo);

        let StepOutcome::Spawned(pid) = mm.step().unwrap() else {
            panic!("first step should spawn a process");
        };
        let pages = mm.page_count(pid).unwrap();
        assert!((2..=8).contains(&pages));
        assert_eq!(pages, mm.used_frames());

        let StepOutcome::Accessed(access) = mm.step().unwrap() else {
            panic!("second step should access a page");
        };
        assert_eq!(pid, access.key().pid);
        assert!(!access.is_fault());
    }

    #[test]
    fn test_step_spawn_capped_by_frames() {
        let mut mm = manager(10, 10, Algorithm::Fifo);

        let StepOutcome::Spawned(pid) = mm.step().unwrap() else {
            panic!("first step should spawn a process");
        };
        assert_eq!(1, mm.page_count(pid).unwrap());
    }

    #[test]
    fn test_random_access_burst() {
        let mut mm = manager(30, 10, Algorithm::Lru);
        mm.create_process(30).unwrap();
        mm.create_process(30).unwrap();

        let accesses = mm.random_access_burst(5).unwrap();
        assert_eq!(5, accesses.len());
        assert_eq!(5, mm.counters().hits + mm.counters().page_faults - 3);
        mm.verify().unwrap();
    }

    #[test]
    fn test_set_algorithm_keeps_residency() {
        let mut mm = manager(30, 10, Algorithm::Lru);
        let p1 = mm.create_process(10).unwrap();
        let p2 = mm.create_process(10).unwrap();
        mm.create_process(10).unwrap();
        mm.touch(p1, 0).unwrap();

        mm.set_algorithm(Algorithm::Fifo).unwrap();
        assert_eq!(3, mm.used_frames());
        assert_eq!(Algorithm::Fifo, mm.algorithm());
        assert_eq!(Some(Algorithm::Fifo), mm.config().map(|c| c.algorithm));
        mm.verify().unwrap();

        // load order wins again: p1 was loaded first
        let p4 = mm.create_process(10).unwrap();
        assert_eq!(None, mm.frame_of(p1, 0).unwrap());
        assert_eq!(Some(1), mm.frame_of(p2, 0).unwrap());
        assert_eq!(Some(0), mm.frame_of(p4, 0).unwrap());
    }

    #[test]
    fn test_snapshot_labels() {
        let mut mm = manager(30, 10, Algorithm::Lru);
        let pid = mm.create_process(20).unwrap();
        mm.touch(pid, 0).unwrap();

        let view = mm.snapshot();
        assert_eq!(Some("P1".to_string()), view.frames[0].pid);
        assert_eq!(Some("p0@3".to_string()), view.frames[0].label);
        assert_eq!(Some("p1@2".to_string()), view.frames[1].label);
        assert_eq!(None, view.frames[2].pid);
        assert_eq!(Some("LRU".to_string()), view.algorithm);
    }

    #[test]
    fn test_poisoned_manager_refuses_mutations() {
        let mut mm = manager(20, 10, Algorithm::Fifo);
        let pid = mm.create_process(10).unwrap();

        // desynchronize the replacer behind the manager's back
        mm.replacer.remove(PageKey::new(pid, 0));
        assert!(mm.verify().is_err());
        assert!(matches!(mm.deallocate(pid), Err(Error::Invariant(_))));
        assert!(mm.is_poisoned());
        assert!(matches!(mm.create_process(10), Err(Error::Invariant(_))));

        mm.apply_config(Config::new(20, 10, Algorithm::Fifo)).unwrap();
        assert!(!mm.is_poisoned());
        assert!(mm.create_process(10).is_ok());
    }
}
