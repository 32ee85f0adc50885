use std::time::{Duration, Instant};

/// Smallest delta a tick reports.
pub const DEFAULT_DT_MIN: Duration = Duration::from_micros(100);
/// Largest delta a tick reports; longer stalls are treated as this long.
pub const DEFAULT_DT_MAX: Duration = Duration::from_millis(250);

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Clamped seconds since the previous tick.
    pub dt: f32,
    pub now: Instant,
    /// Monotonic frame counter, starting at 0.
    pub frame_index: u64,
}

/// Per-window clock producing clamped [`FrameTime`] snapshots.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(DEFAULT_DT_MIN, DEFAULT_DT_MAX)
    }

    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            last: Instant::now(),
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Resets the baseline, e.g. after the window was resumed.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// Advances the clock to `now`.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);
        self.last = now;

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            now,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }

    #[inline]
    pub fn dt_bounds(&self) -> (Duration, Duration) {
        (self.dt_min, self.dt_max)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_stall_is_clamped() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        clock.tick_at(start);
        let ft = clock.tick_at(start + Duration::from_secs(5));
        assert_eq!(ft.dt, DEFAULT_DT_MAX.as_secs_f32());
    }

    #[test]
    fn zero_delta_is_raised_to_minimum() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        clock.tick_at(start);
        let ft = clock.tick_at(start);
        assert_eq!(ft.dt, DEFAULT_DT_MIN.as_secs_f32());
    }

    #[test]
    fn frame_index_counts_ticks() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        assert_eq!(clock.tick_at(start).frame_index, 0);
        assert_eq!(clock.tick_at(start + Duration::from_millis(16)).frame_index, 1);
    }
}
