//! Frame-buffered player input.
//!
//! # Invariants
//! - A lookup at the current frame always yields a usable sample; absence
//!   falls back to the neutral default (covers startup and packet loss).
//! - The frame cursor only moves forward.
//! - Key edges (just pressed / just released) are derived from the 2-bit
//!   {pressed, changed} flags, never from history.

pub mod buffer;
pub mod sample;

pub use buffer::FrameBuffer;
pub use sample::{InputSample, Key, KeyState};
