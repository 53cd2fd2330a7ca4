use crate::frame::Frame;
use crate::typedef::{FrameId, PageKey, Tick};
use crate::Result;
use memsim_error::{errinvariant, Error};
use std::collections::BTreeSet;

/// Fixed-length table of frame slots.
///
/// Free frames are kept in an ordered set so that [`FrameTable::find_free`]
/// always hands out the lowest free index, which keeps simulations
/// reproducible.
#[derive(Debug, Default)]
pub(crate) struct FrameTable {
    frames: Vec<Frame>,
    free_list: BTreeSet<FrameId>,
}

impl FrameTable {
    pub(crate) fn new(total_frames: usize) -> Self {
        let mut frames = Vec::with_capacity(total_frames);
        frames.resize_with(total_frames, Frame::new);

        Self {
            frames,
            free_list: (0..total_frames).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn used(&self) -> usize {
        self.frames.len() - self.free_list.len()
    }

    pub(crate) fn get(&self, frame_id: FrameId) -> Option<&Frame> {
        self.frames.get(frame_id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (FrameId, &Frame)> {
        self.frames.iter().enumerate()
    }

    /// Lowest-index free frame, if any.
    pub(crate) fn find_free(&self) -> Option<FrameId> {
        self.free_list.first().copied()
    }

    /// Occupies a free frame with `key`.
    pub(crate) fn allocate(&mut self, frame_id: FrameId, key: PageKey, tick: Tick) -> Result<()> {
        let frame = self.frame_mut(frame_id)?;
        if !frame.is_free() {
            return Err(Error::FrameBusy(frame_id));
        }
        frame.load(key, tick);
        self.free_list.remove(&frame_id);
        Ok(())
    }

    /// Clears a frame and returns its prior occupant.
    pub(crate) fn free(&mut self, frame_id: FrameId) -> Result<PageKey> {
        let occupant = self
            .frame_mut(frame_id)?
            .reset()
            .ok_or(Error::FrameAlreadyFree(frame_id))?;
        self.free_list.insert(frame_id);
        Ok(occupant)
    }

    /// Records a use of an occupied frame.
    pub(crate) fn touch(&mut self, frame_id: FrameId, tick: Tick) -> Result<()> {
        let frame = self.frame_mut(frame_id)?;
        if frame.is_free() {
            return errinvariant!("touched frame {frame_id} has no occupant");
        }
        frame.touch(tick);
        Ok(())
    }

    /// Drops access history on every frame.
    pub(crate) fn rewind(&mut self) {
        self.frames.iter_mut().for_each(Frame::rewind);
    }

    /// Occupied frames ordered by load tick, oldest first.
    pub(crate) fn occupied_in_load_order(&self) -> Vec<(FrameId, PageKey)> {
        let mut occupied: Vec<_> = self
            .iter()
            .filter_map(|(frame_id, frame)| {
                frame
                    .occupant()
                    .map(|key| (frame.loaded_at(), frame_id, key))
            })
            .collect();
        occupied.sort_unstable();
        occupied
            .into_iter()
            .map(|(_, frame_id, key)| (frame_id, key))
            .collect()
    }

    fn frame_mut(&mut self, frame_id: FrameId) -> Result<&mut Frame> {
        let total = self.frames.len();
        match self.frames.get_mut(frame_id) {
            Some(frame) => Ok(frame),
            None => errinvariant!("frame {frame_id} out of range, table has {total} frames"),
        }
    }
}
