//! Skin, cape and ears image handling
//!
//! Fetching is done by the host: the manager queues [`SkinRequest`]s and the
//! host answers with URLs or decoded images. The functions here only look
//! at pixels.

use crate::data::EntityId;
use crate::error::EntityError;
use base64::Engine;
use image::{imageops, Rgba, RgbaImage};

/// Bundled default skin
pub const STEVE_SKIN_URL: &str = "entity/player/wide/steve.png";

/// Bundled elytra texture
pub const ELYTRA_TEXTURE: &str = "entity/elytra.png";

/// Player arm width variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkinModel {
    /// Four pixel wide arms
    #[default]
    Default,
    /// Three pixel wide arms
    Slim,
}

/// Where a skin or cape should come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkinSource {
    /// A known texture URL
    Url(String),
    /// Look the texture up by username
    Lookup,
}

/// Work the host has to perform for the skin pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkinRequest {
    /// Resolve the skin URL of `username`, answer with `complete_skin_url`
    SkinUrl {
        /// Player entity
        entity: EntityId,
        /// Account name
        username: String,
    },
    /// Resolve the cape URL of `username`, answer with `complete_cape_url`
    CapeUrl {
        /// Player entity
        entity: EntityId,
        /// Account name
        username: String,
    },
    /// Download and decode a skin, answer with `apply_skin_image`
    SkinImage {
        /// Player entity
        entity: EntityId,
        /// Texture URL
        url: String,
        /// Whether ears should be extracted from the image
        render_ears: bool,
    },
    /// Download and decode a cape, answer with `apply_cape_image`
    CapeImage {
        /// Player entity
        entity: EntityId,
        /// Texture URL
        url: String,
    },
}

impl SkinRequest {
    /// Entity the request belongs to
    pub fn entity(&self) -> EntityId {
        match self {
            SkinRequest::SkinUrl { entity, .. }
            | SkinRequest::CapeUrl { entity, .. }
            | SkinRequest::SkinImage { entity, .. }
            | SkinRequest::CapeImage { entity, .. } => *entity,
        }
    }
}

fn skin_scale(image: &RgbaImage) -> u32 {
    (image.width() / 64).max(1)
}

/// Check a rectangle in 64x64 skin coordinates
fn area_matches(image: &RgbaImage, x: u32, y: u32, w: u32, h: u32, pred: impl Fn(&Rgba<u8>) -> bool) -> bool {
    let scale = skin_scale(image);
    (y * scale..(y + h) * scale).all(|py| (x * scale..(x + w) * scale).all(|px| pred(image.get_pixel(px, py))))
}

fn is_slim_marker(image: &RgbaImage, x: u32, y: u32, w: u32, h: u32) -> bool {
    let has_transparency = !area_matches(image, x, y, w, h, |p| p[3] == 255);
    has_transparency
        || area_matches(image, x, y, w, h, |p| p[0] == 0 && p[1] == 0 && p[2] == 0 && p[3] == 255)
        || area_matches(image, x, y, w, h, |p| p[0] == 255 && p[1] == 255 && p[2] == 255 && p[3] == 255)
}

/// Guess whether a skin uses slim arms.
///
/// The pixel columns a wide arm uses and a slim arm leaves empty are
/// checked on both arms; transparent, all black or all white columns mean
/// slim. Legacy 64x32 skins have no separate left arm and are always wide.
pub fn infer_model_type(skin: &RgbaImage) -> SkinModel {
    let scale = skin_scale(skin);
    if skin.width() < 64 || skin.height() < 64 * scale {
        return SkinModel::Default;
    }
    let slim = [(50, 16, 2, 4), (54, 20, 2, 12), (42, 48, 2, 4), (46, 52, 2, 12)]
        .iter()
        .any(|&(x, y, w, h)| is_slim_marker(skin, x, y, w, h));
    if slim {
        SkinModel::Slim
    } else {
        SkinModel::Default
    }
}

/// Cut the 14x7 ears texture out of a skin, `None` for legacy skins
pub fn extract_ears(skin: &RgbaImage) -> Option<RgbaImage> {
    let scale = skin_scale(skin);
    if skin.width() < 38 * scale || skin.height() < 7 * scale {
        return None;
    }
    Some(imageops::crop_imm(skin, 24 * scale, 0, 14 * scale, 7 * scale).to_image())
}

/// Whether every channel of every pixel is zero
pub fn is_blank(image: &RgbaImage) -> bool {
    image.as_raw().iter().all(|&c| c == 0)
}

/// Copy a cape image onto a 64x32 (scaled) canvas.
///
/// Accepts the current 2:1 layout, the legacy 22x17 layout and the 46x22
/// layout used by some third party capes.
pub fn normalize_cape(cape: &RgbaImage) -> Result<RgbaImage, EntityError> {
    let (width, height) = cape.dimensions();
    let scale = if width == 2 * height {
        width / 64
    } else if width * 17 == height * 22 {
        width / 22
    } else if width * 11 == height * 23 {
        width / 46
    } else {
        0
    };
    if scale == 0 {
        return Err(EntityError::TextureSize { width, height });
    }

    let mut canvas = RgbaImage::new(64 * scale, 32 * scale);
    imageops::replace(&mut canvas, cape, 0, 0);
    Ok(canvas)
}

/// Decode a `data:image/...;base64,` URI
pub fn decode_data_uri(uri: &str) -> Result<RgbaImage, EntityError> {
    let Some(rest) = uri.strip_prefix("data:") else {
        return Err(EntityError::DataUri("missing data: scheme".into()));
    };
    let Some((header, payload)) = rest.split_once(',') else {
        return Err(EntityError::DataUri("missing payload separator".into()));
    };
    if !header.ends_with(";base64") {
        return Err(EntityError::DataUri(format!("unsupported encoding '{header}'")));
    }
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}
