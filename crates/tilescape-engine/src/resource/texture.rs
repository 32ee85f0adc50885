use slotmap::{new_key_type, SlotMap};

use crate::device::{RawTexture, SamplerStyle};

new_key_type! {
    /// Handle to a texture in a [`TextureStore`].
    pub struct TextureId;
}

/// Decoded RGBA8 pixels, straight alpha, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// `None` if `pixels` does not hold exactly `width * height` texels.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * 4;
        (width > 0 && height > 0 && pixels.len() == expected).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let texels = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: rgba.repeat(texels),
        }
    }

    /// Writes `rgba` into the texel rectangle, clipped to the image.
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, rgba: [u8; 4]) {
        let x1 = (x + w).min(self.width);
        let y1 = (y + h).min(self.height);
        for row in y.min(y1)..y1 {
            for col in x.min(x1)..x1 {
                let i = (row as usize * self.width as usize + col as usize) * 4;
                self.pixels[i..i + 4].copy_from_slice(&rgba);
            }
        }
    }
}

/// Device-side bookkeeping of one texture.
#[derive(Debug, Clone, Default)]
pub(crate) struct GpuTextureState {
    pub raw: Option<RawTexture>,
    pub storage: (u32, u32),
    /// Content version last uploaded; 0 = never.
    pub uploaded_version: u64,
    pub applied_style: u64,
    pub generation: u64,
    /// `(content_version, generation)` of the last failed allocation.
    pub failed: Option<(u64, u64)>,
}

/// A texture: CPU source, versions and device state.
#[derive(Debug)]
pub struct Texture {
    source: Option<ImageData>,
    sampler: SamplerStyle,
    content_version: u64,
    style_version: u64,
    pub(crate) gpu: GpuTextureState,
}

impl Texture {
    fn new(source: Option<ImageData>) -> Self {
        Self {
            content_version: u64::from(source.is_some()),
            source,
            sampler: SamplerStyle::default(),
            style_version: 0,
            gpu: GpuTextureState::default(),
        }
    }

    /// Pending textures have no pixels yet and render as the placeholder.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.source.is_none()
    }

    pub fn width(&self) -> u32 {
        self.source.as_ref().map_or(0, |s| s.width)
    }

    pub fn height(&self) -> u32 {
        self.source.as_ref().map_or(0, |s| s.height)
    }

    pub fn source(&self) -> Option<&ImageData> {
        self.source.as_ref()
    }

    #[inline]
    pub fn content_version(&self) -> u64 {
        self.content_version
    }

    #[inline]
    pub fn style_version(&self) -> u64 {
        self.style_version
    }

    #[inline]
    pub fn sampler(&self) -> SamplerStyle {
        self.sampler
    }

    /// `false` while the current content failed to allocate in `generation`.
    #[inline]
    pub fn is_valid(&self, generation: u64) -> bool {
        self.gpu.failed != Some((self.content_version, generation))
    }

    /// Device storage exists for `generation`.
    #[inline]
    pub fn is_resident(&self, generation: u64) -> bool {
        self.gpu.raw.is_some() && self.gpu.generation == generation
    }
}

/// Released device storage kept for the next allocation.
#[derive(Debug, Copy, Clone)]
pub(crate) struct RetiredStorage {
    pub raw: RawTexture,
    pub width: u32,
    pub height: u32,
    pub generation: u64,
}

/// Owner of every texture handle.
#[derive(Debug, Default)]
pub struct TextureStore {
    textures: SlotMap<TextureId, Texture>,
    retired: Vec<RetiredStorage>,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle whose pixels arrive later through [`complete`](Self::complete).
    pub fn create_pending(&mut self) -> TextureId {
        self.textures.insert(Texture::new(None))
    }

    pub fn create_from_image(&mut self, image: ImageData) -> TextureId {
        self.textures.insert(Texture::new(Some(image)))
    }

    /// Asset completion. Initializes a pending texture once; later calls
    /// and unknown handles are ignored.
    pub fn complete(&mut self, id: TextureId, image: ImageData) -> bool {
        match self.textures.get_mut(id) {
            Some(t) if t.is_pending() => {
                t.source = Some(image);
                t.content_version += 1;
                true
            }
            Some(_) => {
                log::debug!("texture {id:?} already complete; ignoring");
                false
            }
            None => false,
        }
    }

    /// Replaces the pixels and schedules a re-upload.
    pub fn update_pixels(&mut self, id: TextureId, image: ImageData) -> bool {
        let Some(t) = self.textures.get_mut(id) else {
            return false;
        };
        t.source = Some(image);
        t.content_version += 1;
        true
    }

    /// Edits pixels in place and schedules a re-upload.
    pub fn modify_pixels(&mut self, id: TextureId, edit: impl FnOnce(&mut ImageData)) -> bool {
        let Some(t) = self.textures.get_mut(id) else {
            return false;
        };
        let Some(source) = t.source.as_mut() else {
            return false;
        };
        edit(source);
        t.content_version += 1;
        true
    }

    pub fn set_sampler(&mut self, id: TextureId, style: SamplerStyle) {
        if let Some(t) = self.textures.get_mut(id) {
            if t.sampler != style {
                t.sampler = style;
                t.style_version += 1;
            }
        }
    }

    /// Drops the handle; its device storage is kept for reuse.
    pub fn release(&mut self, id: TextureId) {
        let Some(t) = self.textures.remove(id) else {
            return;
        };
        if let Some(raw) = t.gpu.raw {
            self.retired.push(RetiredStorage {
                raw,
                width: t.gpu.storage.0,
                height: t.gpu.storage.1,
                generation: t.gpu.generation,
            });
        }
    }

    pub fn get(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: TextureId) -> Option<&mut Texture> {
        self.textures.get_mut(id)
    }

    pub fn contains(&self, id: TextureId) -> bool {
        self.textures.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }

    /// Most recently retired storage of `generation`. Older generations'
    /// entries are discarded on the way.
    pub(crate) fn take_retired(&mut self, generation: u64) -> Option<RetiredStorage> {
        while let Some(r) = self.retired.pop() {
            if r.generation == generation {
                return Some(r);
            }
        }
        None
    }

    pub(crate) fn drain_retired(&mut self) -> Vec<RetiredStorage> {
        std::mem::take(&mut self.retired)
    }

    /// Forgets every storage id; used after a context loss.
    pub(crate) fn forget_storage(&mut self) {
        self.retired.clear();
        for t in self.textures.values_mut() {
            t.gpu = GpuTextureState::default();
        }
    }

    /// Detaches all device storage, live and retired, with its generation.
    pub(crate) fn take_all_storage(&mut self) -> Vec<(RawTexture, u64)> {
        let mut out: Vec<_> = self.retired.drain(..).map(|r| (r.raw, r.generation)).collect();
        for t in self.textures.values_mut() {
            if let Some(raw) = t.gpu.raw.take() {
                out.push((raw, t.gpu.generation));
            }
            t.gpu = GpuTextureState::default();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::FilterMode;

    fn img(w: u32, h: u32) -> ImageData {
        ImageData::filled(w, h, [255, 0, 0, 255])
    }

    #[test]
    fn image_new_checks_length() {
        assert!(ImageData::new(2, 2, vec![0; 16]).is_some());
        assert!(ImageData::new(2, 2, vec![0; 15]).is_none());
        assert!(ImageData::new(0, 2, vec![]).is_none());
    }

    #[test]
    fn fill_rect_clips_to_image() {
        let mut i = ImageData::filled(4, 4, [0; 4]);
        i.fill_rect(3, 3, 5, 5, [9; 4]);
        assert_eq!(&i.pixels[(3 * 4 + 3) * 4..], &[9, 9, 9, 9]);
        assert_eq!(&i.pixels[0..4], &[0, 0, 0, 0]);
    }

    #[test]
    fn pending_texture_completes_once() {
        let mut store = TextureStore::new();
        let id = store.create_pending();
        assert!(store.get(id).is_some_and(Texture::is_pending));
        assert_eq!(store.get(id).map(Texture::content_version), Some(0));

        assert!(store.complete(id, img(4, 4)));
        assert!(!store.complete(id, img(8, 8)));
        assert_eq!(store.get(id).map(Texture::width), Some(4));
        assert_eq!(store.get(id).map(Texture::content_version), Some(1));
    }

    #[test]
    fn pixel_and_style_changes_bump_their_own_versions() {
        let mut store = TextureStore::new();
        let id = store.create_from_image(img(2, 2));
        store.update_pixels(id, img(2, 2));
        store.set_sampler(
            id,
            SamplerStyle {
                filter: FilterMode::Nearest,
                ..Default::default()
            },
        );
        let t = store.get(id).map(|t| (t.content_version(), t.style_version()));
        assert_eq!(t, Some((2, 1)));
    }

    #[test]
    fn setting_the_same_sampler_is_not_a_change() {
        let mut store = TextureStore::new();
        let id = store.create_from_image(img(2, 2));
        store.set_sampler(id, SamplerStyle::default());
        assert_eq!(store.get(id).map(Texture::style_version), Some(0));
    }

    #[test]
    fn released_storage_is_retired_not_destroyed() {
        let mut store = TextureStore::new();
        let id = store.create_from_image(img(2, 2));
        if let Some(t) = store.get_mut(id) {
            t.gpu.raw = Some(RawTexture(5));
            t.gpu.storage = (2, 2);
            t.gpu.generation = 0;
        }
        store.release(id);
        assert!(!store.contains(id));
        assert_eq!(store.retired_len(), 1);
        assert_eq!(store.take_retired(0).map(|r| r.raw), Some(RawTexture(5)));
    }

    #[test]
    fn take_retired_skips_stale_generations() {
        let mut store = TextureStore::new();
        store.retired.push(RetiredStorage { raw: RawTexture(1), width: 1, height: 1, generation: 0 });
        store.retired.push(RetiredStorage { raw: RawTexture(2), width: 1, height: 1, generation: 1 });
        store.retired.push(RetiredStorage { raw: RawTexture(3), width: 1, height: 1, generation: 0 });
        assert_eq!(store.take_retired(1).map(|r| r.raw), Some(RawTexture(2)));
        assert_eq!(store.take_retired(1).map(|r| r.raw), None);
    }
}
