//! Frame timing.
//!
//! - one [`FrameClock`] per window produces clamped frame deltas
//! - a [`TickPacer`] turns those deltas into fixed-rate logic ticks
//!
//! Neither type decides when a frame happens; the runtime calls them once
//! per redraw.

mod frame_clock;
mod tick_pacer;

pub use frame_clock::{FrameClock, FrameTime, DEFAULT_DT_MAX, DEFAULT_DT_MIN};
pub use tick_pacer::{PacerConfig, TickPacer};
