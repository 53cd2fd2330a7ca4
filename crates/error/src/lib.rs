use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// memsim errors. All command-level errors are recoverable at the simulator
/// boundary; the `Invariant` class signals a bookkeeping bug and poisons the
/// memory manager until the next configuration reset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    /// Bad configuration arithmetic or an unknown mode/algorithm name.
    InvalidConfig(String),
    /// A process size that is zero or otherwise unusable.
    InvalidSize(String),
    /// A process that needs more pages than there are frames.
    OutOfMemory(String),
    /// A command arrived before any configuration was applied.
    Unconfigured,
    /// No live process with the given pid.
    UnknownPid(String),
    /// The page index is outside the process' page range.
    InvalidPage { pid: String, page: usize },
    /// Attempted to occupy a frame that already has an occupant.
    FrameBusy(usize),
    /// Attempted to free a frame that has no occupant.
    FrameAlreadyFree(usize),
    /// Frame/process/policy bookkeeping desynchronized.
    Invariant(String),
}

/// Coarse error taxonomy used for reporting and for deciding whether an
/// error is fatal to the simulation state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    Validation,
    NotFound,
    Invariant,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::InvalidConfig(_)
            | Error::InvalidSize(_)
            | Error::OutOfMemory(_)
            | Error::Unconfigured => ErrorClass::Validation,
            Error::UnknownPid(_) | Error::InvalidPage { .. } => ErrorClass::NotFound,
            Error::FrameBusy(_) | Error::FrameAlreadyFree(_) | Error::Invariant(_) => {
                ErrorClass::Invariant
            }
        }
    }

    /// Fatal errors must never be reachable through the public contract.
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Invariant
    }
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Error::InvalidSize(msg) => write!(f, "invalid size: {msg}"),
            Error::OutOfMemory(msg) => write!(f, "out of memory: {msg}"),
            Error::Unconfigured => write!(f, "memory is not configured"),
            Error::UnknownPid(pid) => write!(f, "PID not found: {pid}"),
            Error::InvalidPage { pid, page } => write!(f, "invalid page {page} for {pid}"),
            Error::FrameBusy(idx) => write!(f, "frame {idx} is already occupied"),
            Error::FrameAlreadyFree(idx) => write!(f, "frame {idx} is already free"),
            Error::Invariant(msg) => write!(f, "invariant violation: {msg}"),
        }
    }
}

/// Constructs an Error::InvalidConfig via format!() and into().
#[macro_export]
macro_rules! errconfig {
    ($($args:tt)*) => { $crate::Error::InvalidConfig(format!($($args)*)).into() };
}

/// Constructs an Error::InvalidSize via format!() and into().
#[macro_export]
macro_rules! errsize {
    ($($args:tt)*) => { $crate::Error::InvalidSize(format!($($args)*)).into() };
}

/// Constructs an Error::OutOfMemory via format!() and into().
#[macro_export]
macro_rules! erroom {
    ($($args:tt)*) => { $crate::Error::OutOfMemory(format!($($args)*)).into() };
}

/// Constructs an Error::Invariant via format!() and into().
#[macro_export]
macro_rules! errinvariant {
    ($($args:tt)*) => { $crate::Error::Invariant(format!($($args)*)).into() };
}

/// A memsim Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<Error> for Result<T> {
    fn from(error: Error) -> Self {
        Err(error)
    }
}
