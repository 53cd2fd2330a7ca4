use memsim_error::Error;
use std::fmt::Display;
use std::str::FromStr;

pub type FrameId = usize;
pub type PageIndex = usize;
pub type Tick = u64;

/// Process identifier. Rendered as `P<n>` at the boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(u32);

impl Pid {
    pub(crate) const fn new(id: u32) -> Self {
        Pid(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Display for Pid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl FromStr for Pid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .strip_prefix('P')
            .and_then(|n| n.parse::<u32>().ok())
            .map(Pid)
            .ok_or_else(|| Error::UnknownPid(s.to_string()))
    }
}

/// A single page of a single process. The derived ordering (pid, then page)
/// is the deterministic tie-break used by the replacement policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageKey {
    pub pid: Pid,
    pub page: PageIndex,
}

impl PageKey {
    pub fn new(pid: Pid, page: PageIndex) -> Self {
        PageKey { pid, page }
    }
}

impl Display for PageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:p{}", self.pid, self.page)
    }
}
