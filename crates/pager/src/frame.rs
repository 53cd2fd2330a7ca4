use crate::config::Algorithm;
use crate::typedef::{PageKey, Tick};

/// One physical frame slot. A frame is either free or holds exactly one page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Frame {
    occupant: Option<PageKey>,
    loaded_at: Tick,
    last_used: Tick,
}

impl Frame {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn occupant(&self) -> Option<PageKey> {
        self.occupant
    }

    pub(crate) fn is_free(&self) -> bool {
        self.occupant.is_none()
    }

    pub(crate) fn loaded_at(&self) -> Tick {
        self.loaded_at
    }

    pub(crate) fn load(&mut self, key: PageKey, tick: Tick) {
        self.occupant = Some(key);
        self.loaded_at = tick;
        self.last_used = tick;
    }

    pub(crate) fn touch(&mut self, tick: Tick) {
        self.last_used = tick;
    }

    /// Forget access history, so the frame looks freshly loaded.
    pub(crate) fn rewind(&mut self) {
        self.last_used = self.loaded_at;
    }

    pub(crate) fn reset(&mut self) -> Option<PageKey> {
        let occupant = self.occupant.take();
        self.loaded_at = 0;
        self.last_used = 0;
        occupant
    }

    /// Display annotation: page index plus the tick the active policy orders by.
    pub(crate) fn label(&self, algorithm: Algorithm) -> Option<String> {
        let key = self.occupant?;
        let tick = match algorithm {
            Algorithm::Fifo => self.loaded_at,
            Algorithm::Lru => self.last_used,
        };
        Some(format!("p{}@{}", key.page, tick))
    }
}
