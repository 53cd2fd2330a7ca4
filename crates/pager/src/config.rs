use crate::Result;
use memsim_error::{errconfig, Error};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

pub const DEFAULT_TOTAL_KB: u64 = 1024;
pub const DEFAULT_FRAME_KB: u64 = 64;
/// Upper bound on `total_kb / frame_kb`; the frame table is allocated up front.
pub const MAX_FRAMES: u64 = 1 << 16;

/// Page replacement algorithm used when no free frame is left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    #[serde(rename = "FIFO")]
    Fifo,
    #[serde(rename = "LRU")]
    Lru,
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::Fifo => write!(f, "FIFO"),
            Algorithm::Lru => write!(f, "LRU"),
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FIFO" => Ok(Algorithm::Fifo),
            "LRU" => Ok(Algorithm::Lru),
            _ => errconfig!("unknown algorithm {s:?}, expected FIFO or LRU"),
        }
    }
}

/// Allocation mode. Only paging is simulated; segmentation is accepted and
/// reported so a UI can offer it, but memory still behaves as paged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Paging,
    Segmentation,
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Paging => write!(f, "Paging"),
            Mode::Segmentation => write!(f, "Segmentation"),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paging" => Ok(Mode::Paging),
            "segmentation" => Ok(Mode::Segmentation),
            _ => errconfig!("unknown mode {s:?}, expected Paging or Segmentation"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub total_kb: u64,
    pub frame_kb: u64,
    pub mode: Mode,
    pub algorithm: Algorithm,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            total_kb: DEFAULT_TOTAL_KB,
            frame_kb: DEFAULT_FRAME_KB,
            mode: Mode::Paging,
            algorithm: Algorithm::Fifo,
        }
    }
}

impl Config {
    pub fn new(total_kb: u64, frame_kb: u64, algorithm: Algorithm) -> Self {
        Config {
            total_kb,
            frame_kb,
            algorithm,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_kb == 0 {
            return errconfig!("frame_kb must be positive");
        }
        if self.total_kb == 0 {
            return errconfig!("total_kb must be positive");
        }
        if self.total_kb < self.frame_kb {
            return errconfig!(
                "total_kb ({}) must be at least frame_kb ({})",
                self.total_kb,
                self.frame_kb
            );
        }
        if self.total_kb / self.frame_kb > MAX_FRAMES {
            return errconfig!(
                "{} KB in {} KB frames exceeds the limit of {MAX_FRAMES} frames",
                self.total_kb,
                self.frame_kb
            );
        }
        Ok(())
    }

    /// Number of whole frames; a remainder smaller than a frame is unusable.
    pub fn total_frames(&self) -> usize {
        (self.total_kb / self.frame_kb) as usize
    }
}
