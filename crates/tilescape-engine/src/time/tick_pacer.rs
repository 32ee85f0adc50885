use super::{DEFAULT_DT_MAX, DEFAULT_DT_MIN};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PacerConfig {
    /// Logic ticks per second.
    pub target_rate: f32,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self { target_rate: 60.0 }
    }
}

/// Fixed-rate tick generator fed by real frame deltas.
///
/// At most one tick fires per [`advance`](Self::advance); the leftover time
/// carries over but never exceeds one threshold, so a slow display drops
/// ticks instead of bursting to catch up.
#[derive(Debug, Clone)]
pub struct TickPacer {
    threshold: f32,
    accumulator: f32,
    ticks: u64,
}

impl TickPacer {
    pub fn new(config: PacerConfig) -> Self {
        let rate = if config.target_rate.is_finite() && config.target_rate > 0.0 {
            config.target_rate
        } else {
            log::warn!(
                "invalid tick rate {}; using {}",
                config.target_rate,
                PacerConfig::default().target_rate
            );
            PacerConfig::default().target_rate
        };
        Self {
            threshold: 1.0 / rate,
            accumulator: 0.0,
            ticks: 0,
        }
    }

    /// Seconds per tick.
    #[inline]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Adds `dt` seconds and reports whether a tick fires.
    pub fn advance(&mut self, dt: f32) -> bool {
        let dt = if dt.is_finite() {
            dt.clamp(DEFAULT_DT_MIN.as_secs_f32(), DEFAULT_DT_MAX.as_secs_f32())
        } else {
            DEFAULT_DT_MIN.as_secs_f32()
        };
        self.accumulator += dt;

        if self.accumulator < self.threshold {
            return false;
        }
        self.accumulator = (self.accumulator - self.threshold).min(self.threshold);
        self.ticks += 1;
        true
    }

    /// Drops accumulated time, e.g. after the window was hidden.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

impl Default for TickPacer {
    fn default() -> Self {
        Self::new(PacerConfig::default())
    }
}
