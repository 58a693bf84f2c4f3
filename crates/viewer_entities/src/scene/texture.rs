//! Texture store
//!
//! Every texture the entity renderer creates lives here until it is
//! disposed. Keeping them in one arena makes the ownership rules checkable:
//! the number of live textures must return to its previous value once an
//! entity and its attachments are gone.

use crate::foundation::math::Vec2;
use crate::render::nametag::NameTagCanvas;
use slotmap::{new_key_type, SlotMap};
use std::sync::Arc;

new_key_type! {
    /// Handle to a texture in a [`TextureStore`]
    pub struct TextureId;
}

/// Shared texture atlas owned by the world renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtlasKind {
    /// Item sprite atlas
    Items,
    /// Block texture atlas
    Blocks,
}

/// Decoded RGBA pixels
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl From<image::RgbaImage> for ImageData {
    fn from(image: image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
        }
    }
}

/// Where the pixels of a texture come from
#[derive(Debug, Clone, PartialEq)]
pub enum TextureSource {
    /// Fetched by the renderer from a URL or asset path
    Url(String),
    /// Already decoded pixels
    Image(Arc<ImageData>),
    /// A view into a shared atlas
    Atlas(AtlasKind),
    /// Text drawn by the renderer's canvas backend
    NameTag(NameTagCanvas),
}

/// Texture with sampling parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    /// Pixel source
    pub source: TextureSource,
    /// UV offset
    pub offset: Vec2,
    /// UV repeat (negative values mirror)
    pub repeat: Vec2,
    /// Flip rows on upload
    pub flip_y: bool,
    /// Nearest-neighbour filtering for both minification and magnification
    pub nearest: bool,
    /// Mirrored repeat wrapping on both axes
    pub mirrored_wrap: bool,
    /// Upload requested
    pub needs_update: bool,
}

impl Texture {
    /// Texture with default sampling for `source`
    pub fn new(source: TextureSource) -> Self {
        Self {
            source,
            offset: Vec2::zeros(),
            repeat: Vec2::new(1.0, 1.0),
            flip_y: true,
            nearest: false,
            mirrored_wrap: false,
            needs_update: true,
        }
    }

    /// Pixel-art texture: nearest filtering
    pub fn pixelated(source: TextureSource) -> Self {
        Self {
            nearest: true,
            ..Self::new(source)
        }
    }
}

/// Arena of live textures
#[derive(Default)]
pub struct TextureStore {
    textures: SlotMap<TextureId, Texture>,
    disposed: usize,
}

impl TextureStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a texture
    pub fn insert(&mut self, texture: Texture) -> TextureId {
        self.textures.insert(texture)
    }

    /// Register a copy of an existing texture
    pub fn clone_texture(&mut self, id: TextureId) -> Option<TextureId> {
        let copy = self.textures.get(id)?.clone();
        Some(self.textures.insert(copy))
    }

    /// Look up a texture
    pub fn get(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }

    /// Look up a texture for modification
    pub fn get_mut(&mut self, id: TextureId) -> Option<&mut Texture> {
        self.textures.get_mut(id)
    }

    /// Whether the texture is still alive
    pub fn contains(&self, id: TextureId) -> bool {
        self.textures.contains_key(id)
    }

    /// Release a texture. Disposing twice is a no-op.
    pub fn dispose(&mut self, id: TextureId) -> bool {
        if self.textures.remove(id).is_some() {
            self.disposed += 1;
            true
        } else {
            false
        }
    }

    /// Release every texture in `ids`
    pub fn dispose_all(&mut self, ids: impl IntoIterator<Item = TextureId>) {
        for id in ids {
            self.dispose(id);
        }
    }

    /// Number of live textures
    pub fn live_count(&self) -> usize {
        self.textures.len()
    }

    /// Number of textures released so far
    pub fn disposed_count(&self) -> usize {
        self.disposed
    }
}
