//! Item frames and maps
//!
//! A frame shows either a map plane or an item model. Map images arrive
//! independently of the frames showing them, so [`MapRegistry`] keeps the
//! latest image per map id together with every plane displaying it.

use super::item_mesh::get_item_mesh;
use super::player::skin::decode_data_uri;
use super::RenderContext;
use crate::data::{DisplayContext, Item};
use crate::foundation::math::Vec3;
use crate::scene::{Geometry, Material, MaterialKind, NodeId, SceneGraph, SceneNode, Texture, TextureId, TextureSource, TextureStore};
use std::collections::HashMap;
use std::f32::consts::PI;
use std::sync::Arc;

/// Node name of item frame content that is not a map
pub const FRAME_ITEM_NODE: &str = "item";

/// Map depth in front of a visible frame
pub const MAP_OFFSET_FRAMED: f32 = 0.437;

/// Map depth when the frame itself is invisible
pub const MAP_OFFSET_FRAMELESS: f32 = 0.499;

/// Node name of a map plane
pub fn map_node_name(map_id: i32) -> String {
    format!("map_{map_id}")
}

fn map_id_from_node_name(name: &str) -> Option<i32> {
    name.strip_prefix("map_")?.parse().ok()
}

/// Texture for a map image: data URIs are decoded, anything else is a URL
pub fn load_map(textures: &mut TextureStore, data: &str) -> TextureId {
    let source = if data.starts_with("data:") {
        match decode_data_uri(data) {
            Ok(image) => TextureSource::Image(Arc::new(image.into())),
            Err(err) => {
                log::warn!("Failed to decode map image: {}", err);
                TextureSource::Url(data.to_string())
            }
        }
    } else {
        TextureSource::Url(data.to_string())
    };
    textures.insert(Texture::pixelated(source))
}

/// Cached map images and the planes showing them
#[derive(Debug, Default)]
pub struct MapRegistry {
    images: HashMap<i32, String>,
    planes: HashMap<i32, Vec<NodeId>>,
}

impl MapRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Last image received for `map_id`
    pub fn image(&self, map_id: i32) -> Option<&str> {
        self.images.get(&map_id).map(String::as_str)
    }

    /// Planes currently registered for `map_id`
    pub fn planes(&self, map_id: i32) -> &[NodeId] {
        self.planes.get(&map_id).map_or(&[], Vec::as_slice)
    }

    fn register(&mut self, map_id: i32, plane: NodeId) {
        self.planes.entry(map_id).or_default().push(plane);
    }

    fn unregister(&mut self, map_id: i32, plane: NodeId) {
        if let Some(planes) = self.planes.get_mut(&map_id) {
            planes.retain(|&p| p != plane);
        }
    }

    /// Drop planes that were destroyed or lost their frame
    pub fn prune(&mut self, graph: &SceneGraph) {
        for planes in self.planes.values_mut() {
            planes.retain(|&p| is_live_plane(graph, p));
        }
        self.planes.retain(|_, planes| !planes.is_empty());
    }

    /// Forget every plane, keeping cached images
    pub fn clear_planes(&mut self) {
        self.planes.clear();
    }

    /// Store a new image for `map_id` and show it on every attached plane
    pub fn update_map(&mut self, graph: &mut SceneGraph, textures: &mut TextureStore, map_id: i32, data: &str) {
        self.images.insert(map_id, data.to_string());
        let Some(planes) = self.planes.get_mut(&map_id) else {
            return;
        };
        planes.retain(|&p| is_live_plane(graph, p));

        for &plane in planes.iter() {
            let texture = load_map(textures, data);
            let Some(node) = graph.get_mut(plane) else {
                textures.dispose(texture);
                continue;
            };
            let old = std::mem::replace(&mut node.owned_textures, vec![texture]);
            for material in node.materials_mut() {
                material.map = Some(texture);
            }
            node.visible = true;
            textures.dispose_all(old);
        }
    }
}

/// A plane stays registered while it exists and hangs off its frame, even when
/// the entity container is detached from the scene root
fn is_live_plane(graph: &SceneGraph, plane: NodeId) -> bool {
    graph.contains(plane) && graph.parent(plane).is_some()
}

/// Remove map planes and item models from a frame
pub fn clear_frame_content(ctx: &mut RenderContext<'_>, maps: &mut MapRegistry, entity: NodeId) {
    let content: Vec<(NodeId, Option<i32>)> = ctx
        .graph
        .children(entity)
        .iter()
        .filter_map(|&c| {
            let name = &ctx.graph.get(c)?.name;
            if let Some(map_id) = map_id_from_node_name(name) {
                Some((c, Some(map_id)))
            } else {
                (name == FRAME_ITEM_NODE).then_some((c, None))
            }
        })
        .collect();

    for (node, map_id) in content {
        if let Some(map_id) = map_id {
            maps.unregister(map_id, node);
        }
        ctx.destroy_node(node);
    }
}

/// Add a map plane to a frame; hidden until the map image is known
pub fn add_map_model(ctx: &mut RenderContext<'_>, maps: &mut MapRegistry, entity: NodeId, map_id: i32, rotation: i64) -> NodeId {
    let texture = maps.image(map_id).map(|data| load_map(ctx.textures, data));

    let has_visible_frame = ctx
        .graph
        .traverse_visible(entity)
        .into_iter()
        .any(|id| ctx.graph.get(id).is_some_and(|n| n.name == "geometry_frame"));
    let depth = if has_visible_frame { MAP_OFFSET_FRAMED } else { MAP_OFFSET_FRAMELESS };

    let material = Material::cutout(MaterialKind::Lambert, texture);
    let mut plane = SceneNode::mesh(map_node_name(map_id), Geometry::unit_plane(), vec![material]).at(Vec3::new(0.0, 0.0, depth));
    plane.transform.rotation.y = PI;
    plane.transform.rotate_z(PI * 2.0 - rotation as f32 * PI / 2.0);
    plane.visible = texture.is_some();
    plane.owned_textures.extend(texture);

    let plane = ctx.graph.spawn(entity, plane);
    maps.register(map_id, plane);
    plane
}

/// Rebuild the content of an item frame.
///
/// `mesh` is the frame model below `entity`. `rotation` counts 90° steps for
/// maps and 45° steps for items.
pub fn apply_item_frame(
    ctx: &mut RenderContext<'_>,
    maps: &mut MapRegistry,
    entity: NodeId,
    mesh: Option<NodeId>,
    pitch: f32,
    item: Option<&Item>,
    rotation: i64,
) {
    if let Some(node) = mesh.and_then(|m| ctx.graph.get_mut(m)) {
        node.transform.set_uniform_scale(1.0);
        node.transform.position = Vec3::new(0.0, 0.0, -0.5);
    }
    if let Some(node) = ctx.graph.get_mut(entity) {
        node.transform.rotation.x = -pitch;
    }
    clear_frame_content(ctx, maps, entity);

    let Some(item) = item.filter(|i| i.is_present()) else {
        return;
    };

    if let Some(map_id) = item.map_id() {
        if let Some(node) = mesh.and_then(|m| ctx.graph.get_mut(m)) {
            node.transform.scale = Vec3::new(16.0 / 12.0, 16.0 / 12.0, 1.0);
        }
        add_map_model(ctx, maps, entity, map_id, rotation);
        return;
    }

    let Some(item_mesh) = get_item_mesh(ctx, item, DisplayContext::Fixed, false, None) else {
        return;
    };
    if let Some(node) = ctx.graph.get_mut(item_mesh.node) {
        node.name = FRAME_ITEM_NODE.to_string();
        node.transform.position = Vec3::new(0.0, 0.0, -0.05);
        node.transform.set_uniform_scale(if item_mesh.is_block { 0.25 } else { 0.5 });
        node.transform.rotate_y(PI);
        node.transform.rotate_z(-(rotation as f32) * PI / 4.0);
    }
    ctx.graph.add_child(entity, item_mesh.node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ItemComponent, MeshOverrides};
    use crate::render::tests::Fixture;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn frame(ctx: &mut RenderContext<'_>) -> (NodeId, NodeId) {
        let model = ctx
            .provider
            .entity_model("item_frame", &MeshOverrides::default())
            .unwrap()
            .unwrap();
        let root = ctx.graph.root();
        let entity = ctx.graph.spawn(root, SceneNode::group("entity"));
        let mesh = ctx.instantiate_model(entity, &model);
        (entity, mesh)
    }

    fn map_item(id: i32) -> Item {
        Item {
            item_id: Some(1000),
            nbt: Some(json!({ "map": id })),
            ..Item::named("filled_map")
        }
    }

    #[test]
    fn test_map_hidden_until_image_arrives() {
        let mut fixture = Fixture::new();
        let mut maps = MapRegistry::new();
        let mut ctx = fixture.ctx();
        let (entity, mesh) = frame(&mut ctx);

        apply_item_frame(&mut ctx, &mut maps, entity, Some(mesh), 0.3, Some(&map_item(7)), 1);
        let plane = ctx.graph.find_child(entity, "map_7").unwrap();
        let node = ctx.graph.get(plane).unwrap();
        assert!(!node.visible);
        assert_relative_eq!(node.transform.position.z, MAP_OFFSET_FRAMED);
        assert_relative_eq!(ctx.graph.get(mesh).unwrap().transform.scale.x, 16.0 / 12.0);
        assert_relative_eq!(ctx.graph.get(entity).unwrap().transform.rotation.x, -0.3);
        assert_eq!(maps.planes(7), &[plane]);

        maps.update_map(ctx.graph, ctx.textures, 7, "maps/7.png");
        let node = ctx.graph.get(plane).unwrap();
        assert!(node.visible);
        let texture = ctx.textures.get(node.materials()[0].map.unwrap()).unwrap();
        assert_eq!(texture.source, TextureSource::Url("maps/7.png".into()));
        assert!(texture.nearest);
    }

    #[test]
    fn test_cached_map_image_used_immediately() {
        let mut fixture = Fixture::new();
        let mut maps = MapRegistry::new();
        let mut ctx = fixture.ctx();
        maps.update_map(ctx.graph, ctx.textures, 3, "maps/3.png");

        let (entity, _) = frame(&mut ctx);
        let frame_mesh = ctx.graph.find_descendant(entity, "geometry_frame").unwrap();
        ctx.graph.get_mut(frame_mesh).unwrap().visible = false;

        let mut item = Item::named("filled_map");
        item.item_id = Some(1000);
        item.components = vec![ItemComponent { kind: "map_id".into(), data: json!(3) }];
        let plane = add_map_model(&mut ctx, &mut maps, entity, item.map_id().unwrap(), 0);
        let node = ctx.graph.get(plane).unwrap();
        assert!(node.visible);
        assert_relative_eq!(node.transform.position.z, MAP_OFFSET_FRAMELESS);
    }

    #[test]
    fn test_replacing_content_disposes_previous() {
        let mut fixture = Fixture::new();
        let mut maps = MapRegistry::new();
        let mut ctx = fixture.ctx();
        let (entity, mesh) = frame(&mut ctx);
        let live = ctx.textures.live_count();

        let mut apple = Item::named("apple");
        apple.item_id = Some(5);
        apply_item_frame(&mut ctx, &mut maps, entity, Some(mesh), 0.0, Some(&apple), 2);
        let item = ctx.graph.find_child(entity, FRAME_ITEM_NODE).unwrap();
        assert_relative_eq!(ctx.graph.get(item).unwrap().transform.scale.x, 0.5);
        assert_eq!(ctx.textures.live_count(), live + 2);

        maps.update_map(ctx.graph, ctx.textures, 9, "maps/9.png");
        apply_item_frame(&mut ctx, &mut maps, entity, Some(mesh), 0.0, Some(&map_item(9)), 0);
        assert!(ctx.graph.find_child(entity, FRAME_ITEM_NODE).is_none());
        assert_eq!(ctx.textures.live_count(), live + 1);

        apply_item_frame(&mut ctx, &mut maps, entity, Some(mesh), 0.0, None, 0);
        assert!(ctx.graph.find_child(entity, "map_9").is_none());
        assert!(maps.planes(9).is_empty());
        assert_eq!(ctx.textures.live_count(), live);
        assert_relative_eq!(ctx.graph.get(mesh).unwrap().transform.scale.x, 1.0);
    }

    #[test]
    fn test_block_item_rotation_steps() {
        let mut fixture = Fixture::new();
        let mut maps = MapRegistry::new();
        let mut ctx = fixture.ctx();
        let (entity, mesh) = frame(&mut ctx);

        let mut stone = Item::named("stone");
        stone.block_id = Some(1);
        apply_item_frame(&mut ctx, &mut maps, entity, Some(mesh), 0.0, Some(&stone), 2);
        let item = ctx.graph.get(ctx.graph.find_child(entity, FRAME_ITEM_NODE).unwrap()).unwrap();
        assert_relative_eq!(item.transform.scale.x, 0.25);
        let expected = crate::foundation::math::Quat::from_axis_angle(&Vec3::y_axis(), PI)
            * crate::foundation::math::Quat::from_axis_angle(&Vec3::z_axis(), -PI / 2.0);
        assert!(item.transform.quaternion().dot(&expected).abs() > 0.9999);
    }

    #[test]
    fn test_stale_planes_pruned() {
        let mut fixture = Fixture::new();
        let mut maps = MapRegistry::new();
        let mut ctx = fixture.ctx();
        let (entity, mesh) = frame(&mut ctx);
        apply_item_frame(&mut ctx, &mut maps, entity, Some(mesh), 0.0, Some(&map_item(4)), 0);
        ctx.destroy_node(entity);

        maps.update_map(ctx.graph, ctx.textures, 4, "maps/4.png");
        assert!(maps.planes(4).is_empty());
        assert_eq!(maps.image(4), Some("maps/4.png"));
    }
}
