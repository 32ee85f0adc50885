/// What the runtime does after a failed frame acquisition.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface reconfigured; retry next frame.
    Reconfigured,
    /// Transient; skip this frame.
    SkipFrame,
    /// Out of memory; shut down.
    Fatal,
}
