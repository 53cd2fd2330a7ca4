use crate::config::{Algorithm, Config};
use crate::memory_manager::{MemoryManager, StepOutcome};
use crate::typedef::Pid;
use crate::view::{
    ActionResult, ApplyConfig, CreateProcess, Deallocate, SetAlgorithm, StateView, SystemMemory,
};
use crate::Result;
use log::warn;
use memsim_error::errsize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Accesses fired per burst by the UI's random access button.
pub const DEFAULT_BURST: usize = 5;

/// Receives every state broadcast. Implemented by the UI transport.
pub trait StateSink: Send + Sync {
    fn publish(&self, state: &StateView);
}

/// Samples host RAM for display. The figures are never interpreted.
pub trait SystemMemorySource: Send + Sync {
    fn sample(&self) -> Option<SystemMemory>;
}

/// Sink that drops every broadcast.
pub struct NullSink;

impl StateSink for NullSink {
    fn publish(&self, _state: &StateView) {}
}

/// Shared handle to one memory manager.
///
/// Every mutating command takes the write lock for its whole duration, so
/// commands from the UI and from the [`crate::Ticker`] are applied in lock
/// acquisition order and never interleave. Snapshots share the read lock.
/// The broadcast after a command is taken after the write lock is released.
#[derive(Clone)]
pub struct Simulator {
    manager: Arc<RwLock<MemoryManager>>,
    sink: Arc<dyn StateSink>,
    system_memory: Option<Arc<dyn SystemMemorySource>>,
}

impl Simulator {
    pub fn new(manager: MemoryManager, sink: Arc<dyn StateSink>) -> Self {
        Simulator {
            manager: Arc::new(RwLock::new(manager)),
            sink,
            system_memory: None,
        }
    }

    pub fn with_system_memory(mut self, source: Arc<dyn SystemMemorySource>) -> Self {
        self.system_memory = Some(source);
        self
    }

    /// The manager's own poisoned flag guards against half-applied state, so
    /// a panicked holder of the lock does not make the lock unusable.
    fn write(&self) -> RwLockWriteGuard<'_, MemoryManager> {
        self.manager.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryManager> {
        self.manager.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` under the write lock and broadcasts on success.
    fn command<T>(&self, f: impl FnOnce(&mut MemoryManager) -> Result<T>) -> Result<T> {
        let result = {
            let mut manager = self.write();
            f(&mut *manager)
        };
        match &result {
            Ok(_) => self.broadcast(),
            Err(err) => warn!("command rejected: {err}"),
        }
        result
    }

    pub fn apply_config(&self, request: &ApplyConfig) -> ActionResult {
        self.command(|mm| {
            let config = Config::try_from(request)?;
            mm.apply_config(config)?;
            Ok(format!(
                "Configured {} frames of {} KB ({}, {})",
                config.total_frames(),
                config.frame_kb,
                config.mode,
                config.algorithm
            ))
        })
        .into()
    }

    pub fn create_process(&self, request: &CreateProcess) -> ActionResult {
        let result = self.command(|mm| {
            let Ok(size_kb) = u64::try_from(request.size) else {
                return errsize!("process size must be positive, got {}", request.size);
            };
            let pid = mm.create_process(size_kb)?;
            Ok((pid, mm.page_count(pid)?))
        });
        match result {
            Ok((pid, pages)) => ActionResult::ok(format!("Created {pid} with {pages} pages"))
                .with_pid(pid.to_string()),
            Err(err) => err.into(),
        }
    }

    pub fn deallocate(&self, request: &Deallocate) -> ActionResult {
        if request.pid.trim().is_empty() {
            return ActionResult::err("No PID");
        }
        self.command(|mm| {
            let pid: Pid = request.pid.parse()?;
            mm.deallocate(pid)?;
            Ok(format!("Deallocated {pid}"))
        })
        .into()
    }

    pub fn set_algorithm(&self, request: &SetAlgorithm) -> ActionResult {
        self.command(|mm| {
            let algorithm: Algorithm = request.algorithm.parse()?;
            mm.set_algorithm(algorithm)?;
            Ok(format!("Replacement algorithm is now {algorithm}"))
        })
        .into()
    }

    pub fn step(&self) -> ActionResult {
        self.command(|mm| {
            Ok(match mm.step()? {
                StepOutcome::Spawned(pid) => format!("Spawned {pid}"),
                StepOutcome::Accessed(access) if access.is_fault() => {
                    format!("Page fault on {}", access.key())
                }
                StepOutcome::Accessed(access) => format!("Hit on {}", access.key()),
            })
        })
        .into()
    }

    pub fn random_access(&self) -> ActionResult {
        self.command(|mm| {
            Ok(match mm.random_access()? {
                Some(access) if access.is_fault() => format!("Page fault on {}", access.key()),
                Some(access) => format!("Hit on {}", access.key()),
                None => "No processes to access".to_string(),
            })
        })
        .into()
    }

    pub fn random_access_burst(&self, count: usize) -> ActionResult {
        self.command(|mm| {
            let accesses = mm.random_access_burst(count)?;
            let faults = accesses.iter().filter(|access| access.is_fault()).count();
            Ok(format!("{} accesses, {faults} page faults", accesses.len()))
        })
        .into()
    }

    /// Current state, including host RAM figures when a source is attached.
    pub fn state(&self) -> StateView {
        let mut state = self.read().snapshot();
        state.system_mem = self.system_memory.as_ref().and_then(|source| source.sample());
        state
    }

    /// Pushes the current state to the sink.
    pub fn broadcast(&self) {
        self.sink.publish(&self.state());
    }

    /// Runs the invariant audit under the read lock.
    pub fn verify(&self) -> Result<()> {
        self.read().verify()
    }

    pub fn is_poisoned(&self) -> bool {
        self.read().is_poisoned()
    }
}
