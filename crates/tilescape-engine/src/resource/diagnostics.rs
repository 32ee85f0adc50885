use crate::error::RenderError;

/// Upper bound on retained entries; counters keep counting past it.
const MAX_RETAINED: usize = 256;

/// Per-kind totals since the context was created.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct DiagnosticCounts {
    pub pool_violations: u64,
    pub allocation_failures: u64,
    pub context_losses: u64,
    pub decode_out_of_range: u64,
}

/// Collects non-fatal render errors for the host to drain.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<RenderError>,
    counts: DiagnosticCounts,
    dropped: u64,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, err: RenderError) {
        match &err {
            RenderError::PoolContractViolation { .. } => {
                self.counts.pool_violations += 1;
                log::error!("{err}");
            }
            RenderError::AllocationFailed { .. } => {
                self.counts.allocation_failures += 1;
                log::warn!("{err}; using placeholder");
            }
            RenderError::ContextLost => {
                self.counts.context_losses += 1;
                log::warn!("{err}; resources will be re-created on use");
            }
            RenderError::DecodeOutOfRange { .. } => {
                self.counts.decode_out_of_range += 1;
                log::debug!("{err}");
            }
        }

        if self.entries.len() < MAX_RETAINED {
            self.entries.push(err);
        } else {
            self.dropped += 1;
        }
    }

    /// Takes every retained entry.
    pub fn drain(&mut self) -> Vec<RenderError> {
        if self.dropped > 0 {
            log::debug!("{} diagnostics dropped since last drain", self.dropped);
            self.dropped = 0;
        }
        std::mem::take(&mut self.entries)
    }

    #[inline]
    pub fn counts(&self) -> DiagnosticCounts {
        self.counts
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
