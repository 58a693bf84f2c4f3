//! Name tags
//!
//! A name tag is a canvas texture with one line of text per row, shown
//! either as a camera facing sprite above the entity or, for text displays,
//! as a fixed plane oriented like the entity. The canvas itself is only
//! described here ([`NameTagCanvas`]); the renderer's 2D backend draws it.

use super::RenderContext;
use crate::data::text::component_to_plain;
use crate::foundation::math::{Quat, Vec3};
use crate::scene::{Geometry, Material, MaterialKind, NodeId, NodeKind, Rgba, SceneNode, Texture, TextureSource};
use serde_json::Value;
use std::f32::consts::PI;

/// Node name of every name tag
pub const NAME_TAG_NODE: &str = "nametag";

/// Padding around text in canvas pixels
pub const NAME_TAG_PADDING: f32 = 5.0;

/// World units per canvas pixel
pub const NAME_TAG_SCALE: f32 = 0.005;

/// Draw order of name tags, above everything else
pub const NAME_TAG_RENDER_ORDER: i32 = 1000;

/// Default name tag background, `rgba(0, 0, 0, 0.3)`
pub const DEFAULT_BACKGROUND: Rgba = Rgba { r: 0, g: 0, b: 0, a: 0.3 };

/// Canvas the renderer rasterises for a name tag
#[derive(Debug, Clone, PartialEq)]
pub struct NameTagCanvas {
    /// Chat component to draw
    pub component: Value,
    /// Plain text rows
    pub lines: Vec<String>,
    /// Font family
    pub font_family: String,
    /// Font size in pixels
    pub font_size: f32,
    /// Canvas width in pixels
    pub width: f32,
    /// Canvas height in pixels
    pub height: f32,
    /// Background fill
    pub background: Rgba,
    /// Text alpha in `0.0..=1.0`
    pub text_opacity: f32,
}

/// Placement and style of a name tag
#[derive(Debug, Clone, PartialEq)]
pub struct NameTagOptions {
    /// Text as a chat component (a JSON string for plain text)
    pub text: Value,
    /// Background colour, [`DEFAULT_BACKGROUND`] when unset
    pub background: Option<Rgba>,
    /// Text opacity `0..=255`, opaque when unset
    pub text_opacity: Option<u8>,
    /// Plane oriented with the entity instead of a billboard sprite
    pub fixed: bool,
    /// Entity height, the tag floats above it
    pub height: f32,
    /// Entity pitch in radians, used by fixed tags
    pub pitch: f32,
    /// Entity yaw in radians, used by fixed tags
    pub yaw: f32,
    /// Applied first
    pub rotation_right: Option<Quat>,
    /// Multiplied into the scale after the right rotation
    pub scale: Option<Vec3>,
    /// Applied after scaling
    pub rotation_left: Option<Quat>,
    /// Added to the position last
    pub translation: Option<Vec3>,
}

impl NameTagOptions {
    /// Billboard tag with default style
    pub fn billboard(text: impl Into<String>, height: f32) -> Self {
        Self {
            text: Value::String(text.into()),
            background: None,
            text_opacity: None,
            fixed: false,
            height,
            pitch: 0.0,
            yaw: 0.0,
            rotation_right: None,
            scale: None,
            rotation_left: None,
            translation: None,
        }
    }
}

/// Lay out the canvas for `text`
pub fn layout_canvas(
    ctx: &RenderContext<'_>,
    text: &Value,
    background: Rgba,
    text_opacity: u8,
) -> NameTagCanvas {
    let font_size = ctx.config.name_tag_font_size;
    let font_family = ctx.config.font_family.clone();
    let lines: Vec<String> = component_to_plain(text).split('\n').map(str::to_string).collect();

    let width = lines
        .iter()
        .map(|line| ctx.measure.measure(line, font_size, &font_family) + NAME_TAG_PADDING * 2.0)
        .fold(0.0, f32::max);
    let height = (font_size + NAME_TAG_PADDING) * lines.len() as f32;

    NameTagCanvas {
        component: text.clone(),
        lines,
        font_family,
        font_size,
        width,
        height,
        background,
        text_opacity: f32::from(text_opacity) / 255.0,
    }
}

/// Remove every name tag directly below `parent`
pub fn remove_name_tags(ctx: &mut RenderContext<'_>, parent: NodeId) {
    let tags: Vec<NodeId> = ctx
        .graph
        .children(parent)
        .iter()
        .copied()
        .filter(|&c| ctx.graph.get(c).is_some_and(|n| n.name == NAME_TAG_NODE))
        .collect();
    for tag in tags {
        ctx.destroy_node(tag);
    }
}

/// Replace the name tags of `parent` with a new one
pub fn add_name_tag(ctx: &mut RenderContext<'_>, parent: NodeId, options: &NameTagOptions) -> NodeId {
    remove_name_tags(ctx, parent);

    let canvas = layout_canvas(
        ctx,
        &options.text,
        options.background.unwrap_or(DEFAULT_BACKGROUND),
        options.text_opacity.unwrap_or(u8::MAX),
    );
    let (width, height) = (canvas.width, canvas.height);
    let texture = ctx.textures.insert(Texture::new(TextureSource::NameTag(canvas)));

    let mut node = if options.fixed {
        let mut plane = SceneNode::mesh(NAME_TAG_NODE, Geometry::unit_plane(), vec![Material::basic_textured(texture)]);
        plane.transform.rotation.set(options.pitch, options.yaw + PI, 0.0, plane.transform.rotation.order);
        plane.transform.position.y += options.height + 0.3;
        plane
    } else {
        let material = Material {
            map: Some(texture),
            ..Material::new(MaterialKind::Sprite)
        };
        let mut sprite = SceneNode::new(NAME_TAG_NODE, NodeKind::Sprite { material });
        sprite.transform.position.y += options.height + 0.6;
        sprite
    };
    node.render_order = NAME_TAG_RENDER_ORDER;
    node.owned_textures.push(texture);
    node.transform.scale = Vec3::new(width * NAME_TAG_SCALE, height * NAME_TAG_SCALE, 1.0);

    if let Some(q) = &options.rotation_right {
        node.transform.apply_quaternion(q);
    }
    if let Some(scale) = &options.scale {
        node.transform.scale.component_mul_assign(scale);
    }
    if let Some(q) = &options.rotation_left {
        node.transform.apply_quaternion(q);
    }
    if let Some(translation) = &options.translation {
        node.transform.position += translation;
    }

    ctx.graph.spawn(parent, node)
}

/// Sprite name tag of a player rig, `world_height` units tall
pub fn add_player_name_tag(ctx: &mut RenderContext<'_>, parent: NodeId, username: &str, y: f32, world_height: f32) -> NodeId {
    remove_name_tags(ctx, parent);

    let canvas = layout_canvas(ctx, &Value::String(username.to_string()), Rgba::new(0, 0, 0, 0.25), u8::MAX);
    let aspect = if canvas.height > 0.0 { canvas.width / canvas.height } else { 1.0 };
    let texture = ctx.textures.insert(Texture::new(TextureSource::NameTag(canvas)));

    let material = Material {
        map: Some(texture),
        transparent: true,
        ..Material::new(MaterialKind::Sprite)
    };
    let mut sprite = SceneNode::new(NAME_TAG_NODE, NodeKind::Sprite { material });
    sprite.transform.position.y = y;
    sprite.transform.scale = Vec3::new(aspect * world_height, world_height, 1.0);
    sprite.render_order = NAME_TAG_RENDER_ORDER;
    sprite.owned_textures.push(texture);
    ctx.graph.spawn(parent, sprite)
}

/// Convert a signed 32-bit ARGB integer string into a colour.
///
/// `"0"` is fully transparent; values without an alpha byte are opaque.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_rgba(color: &str) -> Option<Rgba> {
    let value: i64 = color.trim().parse().ok()?;
    if value == 0 {
        return Some(Rgba::TRANSPARENT);
    }
    // two's complement of negative ARGB values
    let argb = (value as i32) as u32;
    let channel = |shift: u32| ((argb >> shift) & 0xff) as u8;
    let alpha = if argb > 0x00ff_ffff { f32::from(channel(24)) / 255.0 } else { 1.0 };
    Some(Rgba::new(channel(16), channel(8), channel(0), alpha))
}

/// Text opacity from the signed `text_opacity` byte; zero means unset
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn text_opacity_from_byte(raw: i64) -> Option<u8> {
    match raw {
        0 => None,
        r if r > 0 => Some(r.min(255) as u8),
        r => Some((256 + r).clamp(0, 255) as u8),
    }
}
