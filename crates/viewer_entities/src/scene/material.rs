//! Colours, materials and geometry descriptions attached to scene nodes

use super::texture::TextureId;
use crate::foundation::math::Vec3;

/// Linear RGB colour with components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
}

impl Color {
    /// Pure white
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };
    /// Pure black
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0 };
    /// Pure red
    pub const RED: Color = Color { r: 1.0, g: 0.0, b: 0.0 };

    /// Create from float components
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Create from a `0xRRGGBB` value
    pub fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    /// Pack into a `0xRRGGBB` value
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_hex(&self) -> u32 {
        let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }

    /// Linear interpolation towards `other`
    pub fn lerp(&self, other: &Color, t: f32) -> Color {
        Color {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
        }
    }
}

/// 8-bit colour with a fractional alpha, as used for name tag backgrounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
    /// Alpha in `0.0..=1.0`
    pub a: f32,
}

impl Rgba {
    /// Fully transparent black
    pub const TRANSPARENT: Rgba = Rgba { r: 0, g: 0, b: 0, a: 0.0 };

    /// Create a colour
    pub fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// Shading model of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    /// Unlit
    Basic,
    /// Diffuse lit
    Lambert,
    /// PBR lit
    Standard,
    /// Camera facing sprite
    Sprite,
}

/// Surface description of a mesh or sprite
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Shading model
    pub kind: MaterialKind,
    /// Base colour multiplied with the map
    pub color: Color,
    /// Colour texture
    pub map: Option<TextureId>,
    /// Alpha blended
    pub transparent: bool,
    /// Fragments below this alpha are discarded
    pub alpha_test: f32,
    /// Render both faces
    pub double_sided: bool,
}

impl Material {
    /// Material of the given kind with white colour and no map
    pub fn new(kind: MaterialKind) -> Self {
        Self {
            kind,
            color: Color::WHITE,
            map: None,
            transparent: false,
            alpha_test: 0.0,
            double_sided: false,
        }
    }

    /// Unlit single-colour material
    pub fn basic(color: Color) -> Self {
        Self {
            color,
            ..Self::new(MaterialKind::Basic)
        }
    }

    /// Unlit, transparent material showing `map`
    pub fn basic_textured(map: TextureId) -> Self {
        Self {
            map: Some(map),
            transparent: true,
            ..Self::new(MaterialKind::Basic)
        }
    }

    /// Cut-out material of the given kind (alpha test 0.1)
    pub fn cutout(kind: MaterialKind, map: Option<TextureId>) -> Self {
        Self {
            map,
            transparent: true,
            alpha_test: 0.1,
            ..Self::new(kind)
        }
    }
}

/// Shape of a mesh node
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Box centred on `offset`
    Box {
        /// Size along X
        width: f32,
        /// Size along Y
        height: f32,
        /// Size along Z
        depth: f32,
        /// Translation baked into the vertices
        offset: Vec3,
    },
    /// Plane in the XY plane centred on the origin
    Plane {
        /// Size along X
        width: f32,
        /// Size along Y
        height: f32,
    },
    /// Geometry produced by the resource provider (block or entity model part)
    Model {
        /// Model identifier
        name: String,
    },
}

impl Geometry {
    /// Unit plane
    pub fn unit_plane() -> Self {
        Geometry::Plane { width: 1.0, height: 1.0 }
    }

    /// Box without a baked offset
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        Geometry::Box { width, height, depth, offset: Vec3::zeros() }
    }
}
