//! Request, response and broadcast shapes exchanged with the UI transport.

use crate::config::{Config, DEFAULT_FRAME_KB, DEFAULT_TOTAL_KB};
use crate::Result;
use memsim_error::{errconfig, Error};
use serde::{Deserialize, Serialize};

/// One frame slot as shown to the UI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameView {
    pub idx: usize,
    pub pid: Option<String>,
    pub label: Option<String>,
}

/// Host RAM figures from an external monitor, passed through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemMemory {
    pub total_kb: u64,
    pub used_kb: u64,
    pub available_kb: u64,
    pub percent: f64,
}

/// Read-only projection of the simulation, pushed after every mutation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateView {
    pub used: usize,
    pub total: usize,
    pub page_faults: u64,
    pub allocations: u64,
    pub deallocations: u64,
    pub hits: u64,
    pub pids: Vec<String>,
    pub frames: Vec<FrameView>,
    pub algorithm: Option<String>,
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_mem: Option<SystemMemory>,
}

/// Outcome of a boundary command. Errors never cross the boundary as
/// anything other than `ok: false` plus a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl ActionResult {
    pub fn ok(msg: impl Into<String>) -> Self {
        ActionResult {
            ok: true,
            pid: None,
            msg: Some(msg.into()),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        ActionResult {
            ok: false,
            pid: None,
            msg: Some(msg.into()),
        }
    }

    pub fn with_pid(mut self, pid: impl Into<String>) -> Self {
        self.pid = Some(pid.into());
        self
    }
}

impl From<Error> for ActionResult {
    fn from(error: Error) -> Self {
        ActionResult::err(error.to_string())
    }
}

impl From<Result<String>> for ActionResult {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(msg) => ActionResult::ok(msg),
            Err(error) => error.into(),
        }
    }
}

fn default_total_kb() -> i64 {
    DEFAULT_TOTAL_KB as i64
}

fn default_frame_kb() -> i64 {
    DEFAULT_FRAME_KB as i64
}

fn default_mode() -> String {
    "Paging".to_string()
}

fn default_algorithm() -> String {
    "FIFO".to_string()
}

fn default_size() -> i64 {
    200
}

fn default_start() -> bool {
    true
}

/// `apply_config` request. Integers are signed so that negative input
/// reaches validation instead of failing deserialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyConfig {
    #[serde(default = "default_total_kb")]
    pub total_kb: i64,
    #[serde(default = "default_frame_kb")]
    pub frame_kb: i64,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        ApplyConfig {
            total_kb: default_total_kb(),
            frame_kb: default_frame_kb(),
            mode: default_mode(),
            algorithm: default_algorithm(),
        }
    }
}

impl TryFrom<&ApplyConfig> for Config {
    type Error = memsim_error::Error;

    fn try_from(request: &ApplyConfig) -> Result<Config> {
        let Ok(total_kb) = u64::try_from(request.total_kb) else {
            return errconfig!("total_kb must be positive, got {}", request.total_kb);
        };
        let Ok(frame_kb) = u64::try_from(request.frame_kb) else {
            return errconfig!("frame_kb must be positive, got {}", request.frame_kb);
        };
        let config = Config {
            total_kb,
            frame_kb,
            mode: request.mode.parse()?,
            algorithm: request.algorithm.parse()?,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProcess {
    #[serde(default = "default_size")]
    pub size: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deallocate {
    #[serde(default)]
    pub pid: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAlgorithm {
    pub algorithm: String,
}

/// Starts or pauses the background ticker. `interval` is in seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToggleRun {
    #[serde(default = "default_start")]
    pub start: bool,
    #[serde(default)]
    pub interval: Option<f64>,
}
