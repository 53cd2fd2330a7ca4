use crate::typedef::{FrameId, PageIndex, PageKey, Pid};
use crate::Result;
use memsim_error::{erroom, errsize, Error};
use std::collections::BTreeMap;

/// Residency record of one page. A page is resident exactly when it holds a
/// frame index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct PageEntry {
    frame: Option<FrameId>,
}

impl PageEntry {
    pub(crate) fn is_resident(&self) -> bool {
        self.frame.is_some()
    }

    pub(crate) fn frame(&self) -> Option<FrameId> {
        self.frame
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Process {
    size_kb: u64,
    pages: Vec<PageEntry>,
}

impl Process {
    pub(crate) fn size_kb(&self) -> u64 {
        self.size_kb
    }

    pub(crate) fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub(crate) fn pages(&self) -> &[PageEntry] {
        &self.pages
    }

    pub(crate) fn resident_count(&self) -> usize {
        self.pages.iter().filter(|entry| entry.is_resident()).count()
    }
}

/// Live processes keyed by pid. Pids come from a counter that only resets
/// together with the whole table, so a pid is never reused while alive.
#[derive(Debug)]
pub(crate) struct ProcessTable {
    processes: BTreeMap<Pid, Process>,
    frame_kb: u64,
    next_pid: u32,
}

impl ProcessTable {
    pub(crate) fn new(frame_kb: u64) -> Self {
        Self {
            processes: BTreeMap::new(),
            frame_kb,
            next_pid: 1,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Live pids in ascending order.
    pub(crate) fn pids(&self) -> Vec<Pid> {
        self.processes.keys().copied().collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Pid, &Process)> {
        self.processes.iter()
    }

    pub(crate) fn get(&self, pid: Pid) -> Result<&Process> {
        self.processes
            .get(&pid)
            .ok_or_else(|| Error::UnknownPid(pid.to_string()))
    }

    pub(crate) fn pages_for(&self, size_kb: u64) -> usize {
        size_kb.div_ceil(self.frame_kb) as usize
    }

    /// Registers a process with every page non-resident.
    pub(crate) fn create_process(&mut self, size_kb: u64) -> Result<Pid> {
        if size_kb == 0 {
            return errsize!("process size must be positive");
        }
        let Some(next_pid) = self.next_pid.checked_add(1) else {
            return erroom!("pid space exhausted, reapply the configuration");
        };
        let pid = Pid::new(self.next_pid);
        self.next_pid = next_pid;

        let pages = vec![PageEntry::default(); self.pages_for(size_kb)];
        self.processes.insert(pid, Process { size_kb, pages });
        Ok(pid)
    }

    /// Removes a process, returning the frames its resident pages held.
    pub(crate) fn remove_process(&mut self, pid: Pid) -> Result<Vec<(PageKey, FrameId)>> {
        let process = self
            .processes
            .remove(&pid)
            .ok_or_else(|| Error::UnknownPid(pid.to_string()))?;

        Ok(process
            .pages
            .iter()
            .enumerate()
            .filter_map(|(page, entry)| entry.frame.map(|frame| (PageKey::new(pid, page), frame)))
            .collect())
    }

    pub(crate) fn page_exists(&self, pid: Pid, page: PageIndex) -> bool {
        self.processes
            .get(&pid)
            .is_some_and(|process| page < process.page_count())
    }

    pub(crate) fn entry(&self, pid: Pid, page: PageIndex) -> Result<PageEntry> {
        let process = self.get(pid)?;
        process
            .pages
            .get(page)
            .copied()
            .ok_or_else(|| Error::InvalidPage { pid: pid.to_string(), page })
    }

    pub(crate) fn mark_resident(
        &mut self,
        pid: Pid,
        page: PageIndex,
        frame: FrameId,
    ) -> Result<()> {
        self.entry_mut(pid, page)?.frame = Some(frame);
        Ok(())
    }

    /// Marks a page non-resident, returning the frame it held.
    pub(crate) fn mark_evicted(&mut self, pid: Pid, page: PageIndex) -> Result<Option<FrameId>> {
        Ok(self.entry_mut(pid, page)?.frame.take())
    }

    pub(crate) fn resident_count(&self) -> usize {
        self.processes.values().map(Process::resident_count).sum()
    }

    fn entry_mut(&mut self, pid: Pid, page: PageIndex) -> Result<&mut PageEntry> {
        let process = self
            .processes
            .get_mut(&pid)
            .ok_or_else(|| Error::UnknownPid(pid.to_string()))?;
        process
            .pages
            .get_mut(page)
            .ok_or_else(|| Error::InvalidPage { pid: pid.to_string(), page })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_process() {
        let mut table = ProcessTable::new(10);
        let pid = table.create_process(25).unwrap();

        assert_eq!("P1", pid.to_string());
        assert_eq!(3, table.get(pid).unwrap().page_count());
        assert_eq!(25, table.get(pid).unwrap().size_kb());
        assert_eq!(0, table.resident_count());
        assert!(table.page_exists(pid, 2));
        assert!(!table.page_exists(pid, 3));
    }

    #[test]
    fn test_create_process_zero_size() {
        let mut table = ProcessTable::new(10);
        assert!(matches!(table.create_process(0), Err(Error::InvalidSize(_))));
        assert!(table.is_empty());
    }

    #[test]
    fn test_pids_not_reused() {
        let mut table = ProcessTable::new(10);
        let p1 = table.create_process(10).unwrap();
        table.remove_process(p1).unwrap();
        let p2 = table.create_process(10).unwrap();

        assert_ne!(p1, p2);
        assert_eq!(vec![p2], table.pids());
    }

    #[test]
    fn test_pid_exhaustion() {
        let mut table = ProcessTable::new(10);
        table.next_pid = u32::MAX - 1;

        assert_eq!(Pid::new(u32::MAX - 1), table.create_process(10).unwrap());
        assert!(matches!(table.create_process(10), Err(Error::OutOfMemory(_))));
        assert_eq!(vec![Pid::new(u32::MAX - 1)], table.pids());
    }

    #[test]
    fn test_residency() {
        let mut table = ProcessTable::new(10);
        let pid = table.create_process(20).unwrap();

        table.mark_resident(pid, 1, 7).unwrap();
        assert_eq!(Some(7), table.entry(pid, 1).unwrap().frame());
        assert!(!table.entry(pid, 0).unwrap().is_resident());
        assert_eq!(1, table.resident_count());

        assert_eq!(Some(7), table.mark_evicted(pid, 1).unwrap());
        assert_eq!(None, table.mark_evicted(pid, 1).unwrap());
        assert_eq!(0, table.resident_count());
    }

    #[test]
    fn test_bad_targets() {
        let mut table = ProcessTable::new(10);
        let pid = table.create_process(10).unwrap();
        let ghost = Pid::new(99);

        assert_eq!(
            Err(Error::InvalidPage { pid: "P1".into(), page: 1 }),
            table.mark_resident(pid, 1, 0)
        );
        assert_eq!(Err(Error::UnknownPid("P99".into())), table.mark_evicted(ghost, 0));
        assert_eq!(
            Err(Error::UnknownPid("P99".into())),
            table.remove_process(ghost).map(|_| ())
        );
    }

    #[test]
    fn test_remove_process_returns_frames() {
        let mut table = ProcessTable::new(10);
        let pid = table.create_process(30).unwrap();
        table.mark_resident(pid, 0, 4).unwrap();
        table.mark_resident(pid, 2, 1).unwrap();

        let frames = table.remove_process(pid).unwrap();
        assert_eq!(
            vec![(PageKey::new(pid, 0), 4), (PageKey::new(pid, 2), 1)],
            frames
        );
        assert!(table.get(pid).is_err());
    }
}
