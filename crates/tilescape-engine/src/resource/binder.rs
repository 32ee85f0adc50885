use crate::coords::{Rect, Viewport};
use crate::device::{
    DrawCall, GpuBackend, Program, RawBuffer, RawFramebuffer, RawTexture, StencilState,
    TexelRegion,
};

use super::{Diagnostics, Geometry, GpuBuffer, TextureId, TextureStore};

/// Texture units tracked by the binder.
pub const TEXTURE_UNITS: usize = 4;

/// Smallest device buffer; growth is power-of-two from here.
const MIN_BUFFER_CAPACITY: u64 = 256;

/// What a texture bind ended up binding.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Bound {
    Texture(RawTexture),
    Placeholder,
    /// Not even the placeholder could be allocated.
    Nothing,
}

/// Counters of device calls issued, for tests and frame stats.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct BinderStats {
    pub texture_allocations: u64,
    pub storage_reuses: u64,
    pub full_uploads: u64,
    pub sub_uploads: u64,
    pub style_applies: u64,
    pub texture_binds: u64,
    pub buffer_allocations: u64,
    pub buffer_writes: u64,
    pub geometry_binds: u64,
    pub framebuffer_binds: u64,
    pub program_changes: u64,
    pub stencil_changes: u64,
    pub draws: u64,
}

/// Sole writer of device binding state.
///
/// Every setter compares against the cached value first and only reaches
/// the backend on change. Caches are reset at frame start because the
/// backend starts each frame from a clean state.
pub struct Binder<B: GpuBackend> {
    backend: B,
    generation: u64,
    units: [Option<RawTexture>; TEXTURE_UNITS],
    geometry: Option<(RawBuffer, RawBuffer)>,
    framebuffer: Option<(Option<RawFramebuffer>, Rect)>,
    program: Option<Program>,
    stencil: Option<StencilState>,
    placeholder: Option<RawTexture>,
    stats: BinderStats,
}

impl<B: GpuBackend> Binder<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            generation: 0,
            units: [None; TEXTURE_UNITS],
            geometry: None,
            framebuffer: None,
            program: None,
            stencil: None,
            placeholder: None,
            stats: BinderStats::default(),
        }
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub(crate) fn into_backend(self) -> B {
        self.backend
    }

    /// Swaps in a backend for a new device. Callers invalidate first.
    pub(crate) fn replace_backend(&mut self, backend: B) -> B {
        std::mem::replace(&mut self.backend, backend)
    }

    /// Context generation; bumped on every loss.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn stats(&self) -> BinderStats {
        self.stats
    }

    pub fn begin_frame(&mut self, screen: Viewport) {
        self.forget_bindings();
        self.backend.begin_frame(screen);
    }

    pub fn end_frame(&mut self) {
        self.backend.end_frame();
    }

    #[inline]
    pub fn is_context_lost(&self) -> bool {
        self.backend.is_context_lost()
    }

    /// Starts a new context generation. No device calls are made for the
    /// old storage; owners notice the generation change on next use.
    pub(crate) fn invalidate_all(&mut self) {
        self.generation += 1;
        self.placeholder = None;
        self.forget_bindings();
        self.backend.forget_resources();
    }

    fn forget_bindings(&mut self) {
        self.units = [None; TEXTURE_UNITS];
        self.geometry = None;
        self.framebuffer = None;
        self.program = None;
        self.stencil = None;
    }

    // ── textures ──────────────────────────────────────────────────────────

    /// Binds `id` to `unit`, allocating or uploading first as needed.
    ///
    /// Order: placeholder for missing/pending/invalid handles; storage for
    /// the current generation; content upload (style included); style-only
    /// update; bind.
    pub fn bind_texture(
        &mut self,
        unit: u32,
        store: &mut TextureStore,
        id: Option<TextureId>,
        diag: &mut Diagnostics,
    ) -> Bound {
        let generation = self.generation;

        let needs_storage = match id.and_then(|id| store.get(id)) {
            Some(t) if !t.is_pending() && t.is_valid(generation) => !t.is_resident(generation),
            _ => return self.bind_placeholder(unit, diag),
        };
        let reused = if needs_storage {
            store.take_retired(generation)
        } else {
            None
        };
        let Some(tex) = id.and_then(|id| store.get_mut(id)) else {
            return self.bind_placeholder(unit, diag);
        };
        let (width, height) = (tex.width(), tex.height());
        let mut fresh = false;

        if needs_storage {
            tex.gpu = Default::default();
            tex.gpu.generation = generation;
            match reused {
                Some(r) => {
                    tex.gpu.raw = Some(r.raw);
                    tex.gpu.storage = (r.width, r.height);
                    self.stats.storage_reuses += 1;
                }
                None => match self.backend.create_texture(width, height) {
                    Ok(raw) => {
                        tex.gpu.raw = Some(raw);
                        tex.gpu.storage = (width, height);
                        self.stats.texture_allocations += 1;
                        fresh = true;
                    }
                    Err(err) => {
                        tex.gpu.failed = Some((tex.content_version(), generation));
                        diag.report(err);
                        return self.bind_placeholder(unit, diag);
                    }
                },
            }
        }

        let Some(mut raw) = tex.gpu.raw else {
            return self.bind_placeholder(unit, diag);
        };

        if tex.gpu.uploaded_version != tex.content_version() {
            let (sw, sh) = tex.gpu.storage;
            if width > sw || height > sh {
                // The old storage survives a failed grow.
                match self.backend.create_texture(width, height) {
                    Ok(new_raw) => {
                        self.backend.destroy_texture(raw);
                        self.forget_texture(raw);
                        raw = new_raw;
                        tex.gpu.raw = Some(raw);
                        tex.gpu.storage = (width, height);
                        self.stats.texture_allocations += 1;
                        fresh = true;
                    }
                    Err(err) => {
                        tex.gpu.failed = Some((tex.content_version(), generation));
                        diag.report(err);
                        return self.bind_placeholder(unit, diag);
                    }
                }
            }
            if fresh {
                self.stats.full_uploads += 1;
            } else {
                self.stats.sub_uploads += 1;
            }

            if let Some(source) = tex.source() {
                self.backend
                    .upload_texture(raw, TexelRegion::full(width, height), &source.pixels);
            }
            self.backend.apply_sampler(raw, tex.sampler());
            tex.gpu.uploaded_version = tex.content_version();
            tex.gpu.applied_style = tex.style_version();
        } else if tex.gpu.applied_style != tex.style_version() {
            self.backend.apply_sampler(raw, tex.sampler());
            tex.gpu.applied_style = tex.style_version();
            self.stats.style_applies += 1;
        }

        self.bind_raw(unit, raw);
        Bound::Texture(raw)
    }

    /// Binds the shared 1x1 transparent texture.
    pub fn bind_placeholder(&mut self, unit: u32, diag: &mut Diagnostics) -> Bound {
        let raw = match self.placeholder {
            Some(raw) => raw,
            None => match self.backend.create_texture(1, 1) {
                Ok(raw) => {
                    self.backend.upload_texture(raw, TexelRegion::full(1, 1), &[0, 0, 0, 0]);
                    self.placeholder = Some(raw);
                    raw
                }
                Err(err) => {
                    diag.report(err);
                    return Bound::Nothing;
                }
            },
        };
        self.bind_raw(unit, raw);
        Bound::Placeholder
    }

    pub(crate) fn release_placeholder(&mut self) {
        if let Some(raw) = self.placeholder.take() {
            self.destroy_texture(raw);
        }
    }

    /// Binds storage the caller owns (render target color textures).
    pub fn bind_raw(&mut self, unit: u32, raw: RawTexture) {
        let Some(slot) = self.units.get_mut(unit as usize) else {
            log::warn!("texture unit {unit} out of range");
            return;
        };
        if *slot != Some(raw) {
            *slot = Some(raw);
            self.backend.bind_texture(unit, raw);
            self.stats.texture_binds += 1;
        }
    }

    pub(crate) fn destroy_texture(&mut self, raw: RawTexture) {
        self.forget_texture(raw);
        self.backend.destroy_texture(raw);
    }

    fn forget_texture(&mut self, raw: RawTexture) {
        for slot in &mut self.units {
            if *slot == Some(raw) {
                *slot = None;
            }
        }
    }

    // ── buffers ───────────────────────────────────────────────────────────

    /// Mirrors `buffer` into device storage. `None` when empty or when
    /// allocation failed.
    pub fn sync_buffer(&mut self, buffer: &mut GpuBuffer, diag: &mut Diagnostics) -> Option<RawBuffer> {
        if buffer.is_empty() {
            return None;
        }
        let generation = self.generation;
        let len = buffer.len() as u64;
        let current = buffer.gpu.raw.filter(|_| buffer.gpu.generation == generation);

        match current {
            Some(raw) if buffer.gpu.capacity >= len => {
                if buffer.gpu.uploaded_version != buffer.version() {
                    let from = buffer.dirty_from();
                    self.backend
                        .write_buffer(raw, from as u64, &buffer.data()[from..]);
                    self.stats.buffer_writes += 1;
                    buffer.mark_synced();
                }
                Some(raw)
            }
            _ => {
                if let Some(old) = current {
                    self.forget_buffer(old);
                    self.backend.destroy_buffer(old);
                }
                buffer.gpu = Default::default();
                let capacity = len.next_power_of_two().max(MIN_BUFFER_CAPACITY);
                match self.backend.create_buffer(buffer.kind(), capacity) {
                    Ok(raw) => {
                        buffer.gpu.raw = Some(raw);
                        buffer.gpu.capacity = capacity;
                        buffer.gpu.generation = generation;
                        self.stats.buffer_allocations += 1;
                        self.backend.write_buffer(raw, 0, buffer.data());
                        self.stats.buffer_writes += 1;
                        buffer.mark_synced();
                        Some(raw)
                    }
                    Err(err) => {
                        diag.report(err);
                        None
                    }
                }
            }
        }
    }

    /// Syncs and binds both buffers. `false` if either is unavailable.
    pub fn bind_geometry(&mut self, geometry: &mut Geometry, diag: &mut Diagnostics) -> bool {
        let vertices = self.sync_buffer(&mut geometry.vertices, diag);
        let indices = self.sync_buffer(&mut geometry.indices, diag);
        let (Some(vertices), Some(indices)) = (vertices, indices) else {
            return false;
        };
        if self.geometry != Some((vertices, indices)) {
            self.geometry = Some((vertices, indices));
            self.backend.bind_geometry(vertices, indices);
            self.stats.geometry_binds += 1;
        }
        true
    }

    /// Destroys the buffer's device storage immediately.
    pub(crate) fn release_buffer(&mut self, buffer: &mut GpuBuffer) {
        if let Some(raw) = buffer.gpu.raw.take() {
            if buffer.gpu.generation == self.generation {
                self.forget_buffer(raw);
                self.backend.destroy_buffer(raw);
            }
        }
        buffer.gpu = Default::default();
    }

    fn forget_buffer(&mut self, raw: RawBuffer) {
        if self.geometry.is_some_and(|(v, i)| v == raw || i == raw) {
            self.geometry = None;
        }
    }

    // ── framebuffers ──────────────────────────────────────────────────────

    pub(crate) fn create_framebuffer(
        &mut self,
        width: u32,
        height: u32,
        diag: &mut Diagnostics,
    ) -> Option<(RawFramebuffer, RawTexture)> {
        match self.backend.create_framebuffer(width, height) {
            Ok(pair) => Some(pair),
            Err(err) => {
                diag.report(err);
                None
            }
        }
    }

    pub(crate) fn destroy_framebuffer(&mut self, framebuffer: RawFramebuffer, texture: RawTexture) {
        if self.framebuffer.is_some_and(|(fb, _)| fb == Some(framebuffer)) {
            self.framebuffer = None;
        }
        self.forget_texture(texture);
        self.backend.destroy_framebuffer(framebuffer);
    }

    /// Targets `framebuffer` (`None` = screen) with `area` mapped onto it.
    pub fn bind_framebuffer(&mut self, framebuffer: Option<RawFramebuffer>, area: Rect) {
        if self.framebuffer != Some((framebuffer, area)) {
            self.framebuffer = Some((framebuffer, area));
            self.backend.bind_framebuffer(framebuffer, area);
            self.stats.framebuffer_binds += 1;
        }
    }

    pub fn clear_color(&mut self, color: crate::paint::Color) {
        self.backend.clear_color(color);
    }

    // ── pipeline state ────────────────────────────────────────────────────

    pub fn set_program(&mut self, program: Program) {
        if self.program != Some(program) {
            self.program = Some(program);
            self.backend.set_program(program);
            self.stats.program_changes += 1;
        }
    }

    pub fn set_stencil(&mut self, state: StencilState) {
        if self.stencil != Some(state) {
            self.stencil = Some(state);
            self.backend.set_stencil(state);
            self.stats.stencil_changes += 1;
        }
    }

    pub fn clear_stencil(&mut self) {
        self.backend.clear_stencil();
    }

    pub fn draw(&mut self, call: DrawCall) {
        if call.indices.is_empty() {
            return;
        }
        self.backend.draw(call);
        self.stats.draws += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::recording::{Call, RecordingBackend};
    use crate::device::{FilterMode, SamplerStyle};
    use crate::resource::ImageData;

    fn setup() -> (Binder<RecordingBackend>, TextureStore, Diagnostics) {
        (Binder::new(RecordingBackend::new()), TextureStore::new(), Diagnostics::new())
    }

    fn img(w: u32, h: u32) -> ImageData {
        ImageData::filled(w, h, [10, 20, 30, 255])
    }

    fn uploads(b: &Binder<RecordingBackend>) -> usize {
        b.backend().count(|c| matches!(c, Call::UploadTexture { .. }))
    }

    // ── bind order ────────────────────────────────────────────────────────

    #[test]
    fn missing_handle_binds_placeholder() {
        let (mut b, mut store, mut diag) = setup();
        assert_eq!(b.bind_texture(0, &mut store, None, &mut diag), Bound::Placeholder);
    }

    #[test]
    fn pending_handle_binds_placeholder_without_allocating_for_it() {
        let (mut b, mut store, mut diag) = setup();
        let id = store.create_pending();
        assert_eq!(b.bind_texture(0, &mut store, Some(id), &mut diag), Bound::Placeholder);
        // Only the 1x1 placeholder itself.
        assert_eq!(
            b.backend().count(|c| matches!(c, Call::CreateTexture { width: 1, height: 1, .. })),
            1
        );
        assert_eq!(b.stats().texture_allocations, 0);
    }

    #[test]
    fn first_bind_allocates_uploads_and_binds() {
        let (mut b, mut store, mut diag) = setup();
        let id = store.create_from_image(img(8, 4));
        let bound = b.bind_texture(0, &mut store, Some(id), &mut diag);

        let Bound::Texture(raw) = bound else {
            panic!("expected texture, got {bound:?}");
        };
        let calls = b.backend().calls.clone();
        assert_eq!(
            calls,
            vec![
                Call::CreateTexture { texture: raw, width: 8, height: 4 },
                Call::UploadTexture { texture: raw, region: TexelRegion::full(8, 4) },
                Call::ApplySampler { texture: raw, style: SamplerStyle::default() },
                Call::BindTexture { unit: 0, texture: raw },
            ]
        );
    }

    #[test]
    fn unchanged_texture_is_never_uploaded_twice() {
        let (mut b, mut store, mut diag) = setup();
        let id = store.create_from_image(img(4, 4));
        for _ in 0..10 {
            b.bind_texture(0, &mut store, Some(id), &mut diag);
        }
        assert_eq!(uploads(&b), 1);
        assert_eq!(b.stats().texture_binds, 1);
    }

    #[test]
    fn content_change_uploads_exactly_once() {
        let (mut b, mut store, mut diag) = setup();
        let id = store.create_from_image(img(4, 4));
        b.bind_texture(0, &mut store, Some(id), &mut diag);
        store.update_pixels(id, img(4, 4));
        b.bind_texture(0, &mut store, Some(id), &mut diag);
        b.bind_texture(0, &mut store, Some(id), &mut diag);
        assert_eq!(uploads(&b), 2);
        assert_eq!(b.stats().sub_uploads, 1);
        assert_eq!(b.stats().texture_allocations, 1);
    }

    #[test]
    fn growth_reallocates_storage() {
        let (mut b, mut store, mut diag) = setup();
        let id = store.create_from_image(img(4, 4));
        b.bind_texture(0, &mut store, Some(id), &mut diag);
        store.update_pixels(id, img(16, 4));
        b.bind_texture(0, &mut store, Some(id), &mut diag);

        assert_eq!(b.backend().count(|c| matches!(c, Call::DestroyTexture(_))), 1);
        assert_eq!(b.stats().texture_allocations, 2);
        assert_eq!(b.stats().full_uploads, 2);
        assert_eq!(b.stats().sub_uploads, 0);
    }

    #[test]
    fn failed_growth_keeps_the_old_storage() {
        let (mut b, mut store, mut diag) = setup();
        let id = store.create_from_image(img(4, 4));
        let Bound::Texture(raw) = b.bind_texture(0, &mut store, Some(id), &mut diag) else {
            panic!("bind failed");
        };
        b.backend_mut().max_texture_size = 8;
        store.update_pixels(id, img(16, 4));

        assert_eq!(b.bind_texture(0, &mut store, Some(id), &mut diag), Bound::Placeholder);
        assert_eq!(diag.counts().allocation_failures, 1);
        assert_eq!(b.backend().count(|c| matches!(c, Call::DestroyTexture(_))), 0);
        assert!(store.get(id).is_some_and(|t| t.is_resident(b.generation())));

        // Content that fits goes back into the surviving storage.
        store.update_pixels(id, img(4, 4));
        assert_eq!(b.bind_texture(0, &mut store, Some(id), &mut diag), Bound::Texture(raw));
        assert_eq!(b.stats().texture_allocations, 1);
    }

    #[test]
    fn style_change_only_reapplies_sampler() {
        let (mut b, mut store, mut diag) = setup();
        let id = store.create_from_image(img(4, 4));
        b.bind_texture(0, &mut store, Some(id), &mut diag);
        let nearest = SamplerStyle {
            filter: FilterMode::Nearest,
            ..Default::default()
        };
        store.set_sampler(id, nearest);
        b.backend_mut().take();

        b.bind_texture(0, &mut store, Some(id), &mut diag);
        assert!(matches!(
            b.backend().calls.as_slice(),
            [Call::ApplySampler { style, .. }] if *style == nearest
        ));
    }

    #[test]
    fn released_storage_is_reused_by_the_next_texture() {
        let (mut b, mut store, mut diag) = setup();
        let a = store.create_from_image(img(8, 8));
        let Bound::Texture(raw_a) = b.bind_texture(0, &mut store, Some(a), &mut diag) else {
            panic!("bind failed");
        };
        store.release(a);

        let c = store.create_from_image(img(8, 8));
        let bound = b.bind_texture(1, &mut store, Some(c), &mut diag);
        assert_eq!(bound, Bound::Texture(raw_a));
        assert_eq!(b.stats().storage_reuses, 1);
        assert_eq!(b.stats().texture_allocations, 1);
    }

    // ── failure ───────────────────────────────────────────────────────────

    #[test]
    fn allocation_failure_falls_back_and_reports() {
        let (mut b, mut store, mut diag) = setup();
        b.backend_mut().max_texture_size = 64;
        let id = store.create_from_image(img(128, 8));

        assert_eq!(b.bind_texture(0, &mut store, Some(id), &mut diag), Bound::Placeholder);
        assert_eq!(diag.counts().allocation_failures, 1);
        assert!(store.get(id).is_some_and(|t| !t.is_valid(b.generation())));

        // Stays on the placeholder without retrying.
        b.bind_texture(0, &mut store, Some(id), &mut diag);
        assert_eq!(diag.counts().allocation_failures, 1);
    }

    #[test]
    fn failure_leaves_bound_state_untouched() {
        let (mut b, mut store, mut diag) = setup();
        let good = store.create_from_image(img(4, 4));
        let Bound::Texture(raw) = b.bind_texture(0, &mut store, Some(good), &mut diag) else {
            panic!("bind failed");
        };
        b.backend_mut().fail_allocations = true;
        let bad = store.create_from_image(img(4, 4));
        b.bind_texture(1, &mut store, Some(bad), &mut diag);

        assert_eq!(b.units[0], Some(raw));
        assert_eq!(b.units[1], None);
    }

    #[test]
    fn new_content_retries_after_failure() {
        let (mut b, mut store, mut diag) = setup();
        b.backend_mut().fail_allocations = true;
        let id = store.create_from_image(img(4, 4));
        b.bind_texture(0, &mut store, Some(id), &mut diag);

        b.backend_mut().fail_allocations = false;
        store.update_pixels(id, img(4, 4));
        assert!(matches!(b.bind_texture(0, &mut store, Some(id), &mut diag), Bound::Texture(_)));
    }

    // ── context loss ──────────────────────────────────────────────────────

    #[test]
    fn invalidate_forgets_without_device_calls_and_reallocates_lazily() {
        let (mut b, mut store, mut diag) = setup();
        let id = store.create_from_image(img(4, 4));
        b.bind_texture(0, &mut store, Some(id), &mut diag);
        b.backend_mut().take();

        b.invalidate_all();
        assert!(b.backend().calls.is_empty());

        b.bind_texture(0, &mut store, Some(id), &mut diag);
        assert_eq!(b.backend().count(|c| matches!(c, Call::CreateTexture { .. })), 1);
        assert_eq!(uploads(&b), 1);
    }

    // ── buffers / state ───────────────────────────────────────────────────

    #[test]
    fn sync_buffer_grows_by_power_of_two_and_writes_tails() {
        let (mut b, _, mut diag) = setup();
        let mut buf = GpuBuffer::new(crate::device::BufferKind::Vertex);
        buf.set_data(&[0; 100]);
        b.sync_buffer(&mut buf, &mut diag);
        assert_eq!(buf.gpu.capacity, 256);

        buf.append(&[0; 100]);
        b.sync_buffer(&mut buf, &mut diag);
        assert!(b
            .backend()
            .calls
            .contains(&Call::WriteBuffer { buffer: RawBuffer(1), offset: 100, len: 100 }));

        buf.append(&[0; 100]);
        b.sync_buffer(&mut buf, &mut diag);
        assert_eq!(buf.gpu.capacity, 512);
        assert_eq!(b.stats().buffer_allocations, 2);
    }

    #[test]
    fn unchanged_buffer_is_not_rewritten() {
        let (mut b, _, mut diag) = setup();
        let mut g = Geometry::new();
        g.vertices.set_data(&[0; 52]);
        g.indices.set_data(&[0; 24]);
        assert!(b.bind_geometry(&mut g, &mut diag));
        assert!(b.bind_geometry(&mut g, &mut diag));
        assert_eq!(b.stats().buffer_writes, 2);
        assert_eq!(b.stats().geometry_binds, 1);
    }

    #[test]
    fn setters_skip_redundant_calls() {
        let (mut b, _, _) = setup();
        b.set_program(Program::Textured);
        b.set_program(Program::Textured);
        b.set_stencil(StencilState::TestEqual(1));
        b.set_stencil(StencilState::TestEqual(1));
        b.bind_framebuffer(None, Rect::new(0.0, 0.0, 10.0, 10.0));
        b.bind_framebuffer(None, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(b.backend().calls.len(), 3);
    }

    #[test]
    fn begin_frame_resets_cached_bindings() {
        let (mut b, _, _) = setup();
        b.set_program(Program::Textured);
        b.begin_frame(Viewport::new(10.0, 10.0));
        b.set_program(Program::Textured);
        assert_eq!(b.stats().program_changes, 2);
    }
}
