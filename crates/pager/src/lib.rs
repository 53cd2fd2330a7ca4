//! Paged memory simulator core: a frame table, a process table, FIFO/LRU
//! page replacement and the memory manager that ties them together behind a
//! single lock.

mod config;
mod frame;
mod frame_table;
mod memory_manager;
mod process_table;
mod replacer;
mod simulator;
mod ticker;
mod typedef;
mod view;

pub use config::{Algorithm, Config, Mode, DEFAULT_FRAME_KB, DEFAULT_TOTAL_KB, MAX_FRAMES};
pub use memory_manager::{Access, Counters, MemoryManager, StepOutcome};
pub use memsim_error::{Error, ErrorClass};
pub use simulator::{NullSink, Simulator, StateSink, SystemMemorySource, DEFAULT_BURST};
pub use ticker::{Ticker, TickerConfig, DEFAULT_INTERVAL};
pub use typedef::{FrameId, PageIndex, PageKey, Pid, Tick};
pub use view::{
    ActionResult, ApplyConfig, CreateProcess, Deallocate, FrameView, SetAlgorithm, StateView,
    SystemMemory, ToggleRun,
};

pub type Result<T> = std::result::Result<T, memsim_error::Error>;
