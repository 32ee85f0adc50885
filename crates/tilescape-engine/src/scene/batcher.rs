use crate::device::{DrawCall, GpuBackend, Program, RawTexture, Vertex, QUAD_INDICES};
use crate::resource::{Binder, Diagnostics, Geometry, TextureId, TextureStore};

/// Texture a batched quad samples.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum BatchTexture {
    Texture(TextureId),
    /// Storage owned by the caller (render target colors).
    Raw(RawTexture),
    /// No sampling; vertices carry `FLAT_PAGE`.
    Flat,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct BatchStats {
    pub quads: u64,
    pub draws: u64,
}

/// Accumulates quads and draws each run of equal texture and program with
/// one call.
///
/// The geometry is append-only within a frame: a flush writes only the new
/// tail, so draws already issued keep reading the bytes they were issued
/// with.
#[derive(Debug, Default)]
pub struct QuadBatcher {
    geometry: Geometry,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    key: Option<(BatchTexture, Program)>,
    stats: BatchStats,
}

impl QuadBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_frame(&mut self) {
        self.geometry.clear();
        self.vertices.clear();
        self.indices.clear();
        self.key = None;
        self.stats = BatchStats::default();
    }

    #[inline]
    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// `true` if pushing with this key would flush first.
    #[inline]
    pub fn breaks_run(&self, texture: BatchTexture, program: Program) -> bool {
        !self.vertices.is_empty() && self.key != Some((texture, program))
    }

    /// Queues a quad. The caller flushes first when [`breaks_run`](Self::breaks_run).
    pub fn push(&mut self, texture: BatchTexture, program: Program, quad: [Vertex; 4]) {
        debug_assert!(!self.breaks_run(texture, program), "batch run not flushed");
        self.key = Some((texture, program));
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&quad);
        self.indices.extend(QUAD_INDICES.iter().map(|i| base + i));
        self.stats.quads += 1;
    }

    /// Draws the pending run. Binds on texture unit 0.
    pub fn flush<B: GpuBackend>(
        &mut self,
        binder: &mut Binder<B>,
        textures: &mut TextureStore,
        diag: &mut Diagnostics,
    ) {
        let Some((texture, program)) = self.key.take() else {
            return;
        };
        if self.vertices.is_empty() {
            return;
        }

        let base_vertex = (self.geometry.vertices.len() / size_of::<Vertex>()) as i32;
        let first_index = self.geometry.index_count();
        self.geometry.vertices.append(bytemuck::cast_slice(&self.vertices));
        self.geometry.indices.append(bytemuck::cast_slice(&self.indices));
        let end_index = self.geometry.index_count();
        self.vertices.clear();
        self.indices.clear();

        match texture {
            BatchTexture::Texture(id) => {
                binder.bind_texture(0, textures, Some(id), diag);
            }
            BatchTexture::Raw(raw) => binder.bind_raw(0, raw),
            BatchTexture::Flat => {
                binder.bind_placeholder(0, diag);
            }
        }
        if !binder.bind_geometry(&mut self.geometry, diag) {
            return;
        }
        binder.set_program(program);
        binder.draw(DrawCall {
            indices: first_index..end_index,
            base_vertex,
            translate: [0.0, 0.0],
        });
        self.stats.draws += 1;
    }

    /// Drops device storage references after a context loss.
    pub(crate) fn forget_storage(&mut self) {
        self.geometry.vertices.gpu = Default::default();
        self.geometry.indices.gpu = Default::default();
    }

    pub(crate) fn release_storage<B: GpuBackend>(&mut self, binder: &mut Binder<B>) {
        binder.release_buffer(&mut self.geometry.vertices);
        binder.release_buffer(&mut self.geometry.indices);
    }
}
