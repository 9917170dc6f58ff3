use crate::sample::InputSample;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How many frames behind the cursor are kept before pruning.
const RETAIN_BEHIND: u64 = 120;

/// Per-player store of captured input keyed by simulation frame.
///
/// Tolerates network jitter: frames may arrive out of order, duplicated, or
/// not at all. Lookup never fails; a missing frame yields the neutral sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameBuffer {
    frames: BTreeMap<u64, InputSample>,
    current_frame: u64,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Store a sample for a frame. Newer data for the same frame wins.
    pub fn insert(&mut self, frame: u64, sample: InputSample) {
        self.frames.insert(frame, sample);
    }

    /// Merge a window of samples received from the network.
    pub fn merge(&mut self, window: impl IntoIterator<Item = (u64, InputSample)>) {
        for (frame, sample) in window {
            self.frames.insert(frame, sample);
        }
    }

    /// The sample at the current frame, or the neutral default if absent.
    pub fn sample(&self) -> InputSample {
        self.sample_at(self.current_frame)
    }

    pub fn sample_at(&self, frame: u64) -> InputSample {
        self.frames.get(&frame).copied().unwrap_or(InputSample::NEUTRAL)
    }

    /// True when no stored frame is at or past the cursor: the simulation
    /// has outrun received input.
    pub fn is_stale(&self) -> bool {
        self.frames
            .last_key_value()
            .is_none_or(|(frame, _)| *frame < self.current_frame)
    }

    /// Advance the cursor one frame and prune entries far behind it.
    pub fn advance(&mut self) {
        self.current_frame += 1;
        let cutoff = self.current_frame.saturating_sub(RETAIN_BEHIND);
        self.frames = self.frames.split_off(&cutoff);
    }

    /// Move the cursor to an absolute frame (snapshot restore).
    pub fn seek(&mut self, frame: u64) {
        self.current_frame = self.current_frame.max(frame);
    }

    /// The most recent stored frames, newest last, for transmission.
    pub fn recent_window(&self, count: usize) -> Vec<(u64, InputSample)> {
        let skip = self.frames.len().saturating_sub(count);
        self.frames
            .iter()
            .skip(skip)
            .map(|(f, s)| (*f, *s))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{Key, KeyState};
    use glam::Vec2;

    fn fire_sample() -> InputSample {
        let mut s = InputSample::default();
        s.set_key(
            Key::Fire,
            KeyState {
                pressed: true,
                changed: true,
            },
        );
        s.accelerate = Vec2::X;
        s
    }

    #[test]
    fn missing_frame_yields_neutral_default() {
        let buf = FrameBuffer::new();
        assert_eq!(buf.sample_at(17), InputSample::NEUTRAL);
    }

    #[test]
    fn inserted_frame_is_returned_exactly() {
        let mut buf = FrameBuffer::new();
        let s = fire_sample();
        buf.insert(0, s);
        assert_eq!(buf.sample(), s);
    }

    #[test]
    fn stale_when_cursor_passes_highest_stored_frame() {
        let mut buf = FrameBuffer::new();
        buf.insert(0, fire_sample());
        buf.insert(1, fire_sample());
        assert!(!buf.is_stale());

        buf.advance(); // cursor = 1, frame 1 exists
        assert!(!buf.is_stale());

        buf.advance(); // cursor = 2, nothing stored there or later
        assert!(buf.is_stale());
    }

    #[test]
    fn empty_buffer_is_stale() {
        assert!(FrameBuffer::new().is_stale());
    }

    #[test]
    fn merge_tolerates_out_of_order_and_duplicates() {
        let mut buf = FrameBuffer::new();
        let s = fire_sample();
        buf.merge([(5, InputSample::NEUTRAL), (3, s), (5, s)]);
        assert_eq!(buf.sample_at(3), s);
        assert_eq!(buf.sample_at(5), s);
    }

    #[test]
    fn old_frames_are_pruned() {
        let mut buf = FrameBuffer::new();
        buf.insert(0, fire_sample());
        for _ in 0..(RETAIN_BEHIND + 10) {
            buf.advance();
        }
        assert_eq!(buf.sample_at(0), InputSample::NEUTRAL);
    }

    #[test]
    fn recent_window_returns_newest() {
        let mut buf = FrameBuffer::new();
        for f in 0..10 {
            buf.insert(f, fire_sample());
        }
        let window = buf.recent_window(3);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].0, 7);
        assert_eq!(window[2].0, 9);
    }
}
