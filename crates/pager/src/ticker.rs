//! Background task that animates the simulation.
//!
//! The ticker calls [`Simulator::step`] once per interval while running, and
//! pushes a plain state broadcast while paused. It goes through the same
//! write lock as every UI command, so it never interleaves with one.

use crate::simulator::Simulator;
use crate::view::{ActionResult, ToggleRun};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(600);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickerConfig {
    pub interval: Duration,
    pub start_running: bool,
}

impl Default for TickerConfig {
    fn default() -> Self {
        TickerConfig {
            interval: DEFAULT_INTERVAL,
            start_running: false,
        }
    }
}

enum Command {
    Interval(Duration),
    Stop,
}

pub struct Ticker {
    commands: Sender<Command>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn spawn(simulator: Simulator, config: TickerConfig) -> Ticker {
        let (commands, receiver) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(config.start_running));
        let flag = Arc::clone(&running);

        let handle = thread::spawn(move || {
            let mut interval = config.interval;
            loop {
                match receiver.recv_timeout(interval) {
                    Ok(Command::Interval(next)) => {
                        debug!("ticker interval set to {next:?}");
                        interval = next;
                    }
                    Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) if flag.load(Ordering::Acquire) => {
                        let result = simulator.step();
                        if !result.ok {
                            warn!("background step failed: {}", result.msg.unwrap_or_default());
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => simulator.broadcast(),
                }
            }
            debug!("ticker stopped");
        });

        Ticker {
            commands,
            running,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
        info!("ticker running: {running}");
    }

    pub fn set_interval(&self, interval: Duration) {
        // a send error means the thread is gone, nothing left to configure
        let _ = self.commands.send(Command::Interval(interval));
    }

    /// Boundary form of [`Ticker::set_running`] plus an optional interval in
    /// seconds.
    pub fn toggle(&self, request: &ToggleRun) -> ActionResult {
        if let Some(seconds) = request.interval {
            match Duration::try_from_secs_f64(seconds) {
                Ok(interval) if !interval.is_zero() => self.set_interval(interval),
                _ => return ActionResult::err(format!("invalid interval {seconds}")),
            }
        }
        self.set_running(request.start);
        ActionResult::ok(format!("Running={}", request.start))
    }

    /// Stops the thread and waits for it to finish its current tick.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.commands.send(Command::Stop);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("ticker thread panicked");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
