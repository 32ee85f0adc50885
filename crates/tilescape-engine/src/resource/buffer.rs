use crate::device::{BufferKind, RawBuffer};
use crate::pool::Poolable;

/// Device-side bookkeeping of one buffer.
#[derive(Debug, Clone, Default)]
pub(crate) struct GpuBufferState {
    pub raw: Option<RawBuffer>,
    pub capacity: u64,
    pub uploaded_version: u64,
    pub generation: u64,
}

/// CPU bytes plus the device buffer they are mirrored into.
///
/// `version` only grows; a reset buffer keeps its device storage and the
/// next sync writes into it.
#[derive(Debug, Default)]
pub struct GpuBuffer {
    kind: BufferKind,
    data: Vec<u8>,
    version: u64,
    /// Start of the bytes changed since the last sync.
    dirty_from: usize,
    pub(crate) gpu: GpuBufferState,
}

impl GpuBuffer {
    pub fn new(kind: BufferKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    #[inline]
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set_data(&mut self, bytes: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(bytes);
        self.dirty_from = 0;
        self.version += 1;
    }

    /// Appends without invalidating bytes already synced.
    pub fn append(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if self.uploaded_is_current() {
            self.dirty_from = self.data.len();
        }
        self.data.extend_from_slice(bytes);
        self.version += 1;
    }

    pub fn clear(&mut self) {
        if !self.data.is_empty() {
            self.data.clear();
            self.dirty_from = 0;
            self.version += 1;
        }
    }

    #[inline]
    pub(crate) fn dirty_from(&self) -> usize {
        self.dirty_from.min(self.data.len())
    }

    #[inline]
    fn uploaded_is_current(&self) -> bool {
        self.gpu.uploaded_version == self.version
    }

    pub(crate) fn mark_synced(&mut self) {
        self.gpu.uploaded_version = self.version;
        self.dirty_from = self.data.len();
    }
}

impl Poolable for GpuBuffer {
    fn reset(&mut self) {
        self.clear();
    }
}

/// Vertex and index buffer bound together.
#[derive(Debug)]
pub struct Geometry {
    pub vertices: GpuBuffer,
    pub indices: GpuBuffer,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            vertices: GpuBuffer::new(BufferKind::Vertex),
            indices: GpuBuffer::new(BufferKind::Index),
        }
    }
}

impl Geometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// Number of `u32` indices.
    #[inline]
    pub fn index_count(&self) -> u32 {
        (self.indices.len() / 4) as u32
    }
}

impl Poolable for Geometry {
    fn reset(&mut self) {
        self.clear();
    }
}
