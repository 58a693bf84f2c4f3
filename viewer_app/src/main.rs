//! Entity renderer demo
//!
//! Plays a short scripted scene through the entity manager without a GPU:
//! a zombie walking past, a player whose skin is resolved through the
//! request queue, a dropped item and a named armor stand. Scene statistics
//! are logged every second of simulated time.
//!
//! Usage: `entities_demo [config.toml|config.ron]`

use image::{Rgba, RgbaImage};
use viewer_entities::prelude::*;
use viewer_entities::providers::{ArmorSlot, ModelTexture};
use viewer_entities::data::DisplayContext;
use viewer_entities::scene::{AtlasKind, Geometry};

const FRAME_TIME: f32 = 1.0 / 60.0;
const FRAMES: u32 = 240;

/// Scripted updates as `(frame, snapshot)` pairs, in the client's JSON format
const SCRIPT: &str = r#"[
    [0, { "id": 1, "name": "zombie", "type": "hostile", "position": [0.0, 64.0, 4.0], "width": 0.6, "height": 1.95 }],
    [0, { "id": 2, "name": "player", "type": "player", "username": "Alex", "uuid": "ec561538f3fd461daff5086b22154bce",
          "position": [3.0, 64.0, 0.0], "width": 0.6, "height": 1.8 }],
    [0, { "id": 3, "name": "item", "type": "object", "position": [-2.0, 64.0, 1.0], "width": 0.25, "height": 0.25,
          "metadata": [null, null, null, null, null, null, null, null,
                       { "item": { "name": "diamond", "itemId": 800, "itemCount": 1 } }] }],
    [0, { "id": 4, "name": "armor_stand", "type": "object", "position": [1.0, 64.0, -3.0], "width": 0.5, "height": 1.975,
          "metadata": [null, null, { "string": "Welcome" }, { "bool": true }] }],
    [30, { "id": 1, "name": "zombie", "type": "hostile", "position": [1.0, 64.0, 4.0], "yaw": 1.2, "width": 0.6, "height": 1.95 }],
    [60, { "id": 1, "name": "zombie", "type": "hostile", "position": [2.0, 64.0, 4.0], "yaw": 1.4, "width": 0.6, "height": 1.95,
           "equipment": [{ "name": "iron_sword", "itemId": 750, "itemCount": 1 }, null, null, null, null,
                         { "name": "iron_helmet", "itemId": 760, "itemCount": 1 }] }],
    [120, { "id": 3, "name": "item", "delete": true }],
    [180, { "id": 1, "name": "zombie", "type": "hostile", "position": [3.0, 64.0, 4.0], "width": 0.6, "height": 1.95 }]
]"#;

/// Block-shaped stand-ins for every model
struct DemoProvider;

impl ResourceProvider for DemoProvider {
    fn item_render_data(&self, item: &Item, _context: DisplayContext) -> Option<ItemRenderData> {
        if item.name.is_empty() || item.name == "air" {
            return None;
        }
        Some(ItemRenderData::Flat {
            model_name: format!("item/{}", item.name),
            atlas: AtlasKind::Items,
            u: 0.0,
            v: 0.0,
            su: 1.0 / 16.0,
            sv: 1.0 / 16.0,
        })
    }

    fn entity_model(&self, entity_name: &str, _overrides: &MeshOverrides) -> Result<Option<ModelNode>, EntityError> {
        let bone = |name: &str, size: f32| {
            ModelNode::shape(
                name,
                Geometry::cuboid(size, size, size),
                ModelTexture::Url(format!("entity/{entity_name}.png")),
            )
        };
        let model = match entity_name {
            "zombie" => ModelNode::group("model")
                .with_child(bone("bone_head", 0.5))
                .with_child(bone("bone_body", 0.75))
                .with_child(ModelNode::group("bone_rightitem"))
                .with_child(ModelNode::group("bone_leftitem")),
            "armor_stand" => ModelNode::group("model")
                .with_child(bone("bone_baseplate", 0.75))
                .with_child(bone("bone_body", 0.25)),
            _ => return Ok(None),
        };
        Ok(Some(model))
    }

    fn armor_model(&self, slot: ArmorSlot) -> Option<ModelNode> {
        let part = ModelNode::shape("part", Geometry::cuboid(0.55, 0.55, 0.55), ModelTexture::None);
        Some(ModelNode::group(format!("armor_{}", slot.as_str())).with_child(ModelNode::group("parts").with_child(part)))
    }

    fn custom_armor_texture(&self, _texture_name: &str) -> Option<String> {
        None
    }

    fn default_armor_texture(&self, texture_name: &str) -> Option<String> {
        Some(format!("textures/models/armor/{texture_name}.png"))
    }
}

/// Metadata layout of the few entity types the script uses
struct DemoSchema {
    armor_stand: Vec<String>,
    item: Vec<String>,
}

impl DemoSchema {
    fn new() -> Self {
        let keys = |names: &[&str]| names.iter().map(|n| (*n).to_string()).collect();
        Self {
            armor_stand: keys(&["shared_flags", "air", "custom_name", "custom_name_visible"]),
            item: keys(&["shared_flags", "air", "custom_name", "custom_name_visible", "silent", "no_gravity", "pose", "ticks_frozen", "item"]),
        }
    }
}

impl EntitySchema for DemoSchema {
    fn metadata_keys(&self, entity_name: &str) -> Option<&[String]> {
        match entity_name {
            "armor_stand" => Some(&self.armor_stand),
            "item" => Some(&self.item),
            _ => None,
        }
    }

    fn is_attackable(&self, entity: &EntitySnapshot) -> bool {
        matches!(entity.kind, EntityKind::Hostile | EntityKind::Mob | EntityKind::Player)
    }
}

/// Answer queued skin work with generated images
fn serve_skin_requests(entities: &mut Entities) {
    for request in entities.drain_skin_requests() {
        log::info!("Skin request: {:?}", request);
        match request {
            SkinRequest::SkinUrl { entity, username } => {
                entities.complete_skin_url(entity, Some(format!("https://skins.example/{username}.png")));
            }
            SkinRequest::SkinImage { entity, .. } => {
                let skin = RgbaImage::from_pixel(64, 64, Rgba([140, 100, 70, 255]));
                entities.apply_skin_image(entity, &skin);
            }
            SkinRequest::CapeUrl { entity, .. } => entities.complete_cape_url(entity, None),
            SkinRequest::CapeImage { entity, .. } => {
                if let Err(err) = entities.apply_cape_image(entity, &RgbaImage::new(64, 32)) {
                    log::warn!("Cape rejected: {}", err);
                }
            }
        }
    }
}

fn load_config() -> EntitiesConfig {
    let Some(path) = std::env::args().nth(1) else {
        return EntitiesConfig::default();
    };
    match EntitiesConfig::load_from_file(&path) {
        Ok(config) => {
            log::info!("Loaded config from {}", path);
            config
        }
        Err(err) => {
            log::warn!("Failed to load config {}: {}, using defaults", path, err);
            EntitiesConfig::default()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    viewer_entities::foundation::logging::init();
    log::info!("Starting entity renderer demo...");

    let script: Vec<(u32, EntitySnapshot)> = serde_json::from_str(SCRIPT)?;
    log::info!("Loaded {} scripted updates", script.len());

    let mut entities = Entities::new(load_config(), Box::new(DemoProvider), Box::new(DemoSchema::new()));
    {
        let viewer = entities.viewer_mut();
        viewer.camera_position = Vec3::new(0.0, 65.62, 10.0);
        viewer.viewer_chunk_position = Some(Vec3::new(0.0, 64.0, 10.0));
        viewer.eye_height = 1.62;
        viewer.view_distance = 8;
    }
    entities.handle_player_entity(EntitySnapshot {
        username: Some("Viewer".into()),
        position: Some(Vec3::new(0.0, 64.0, 10.0)),
        ..EntitySnapshot::new(100, "player")
    });

    for frame in 0..FRAMES {
        for (_, snapshot) in script.iter().filter(|(at, _)| *at == frame) {
            entities.update(snapshot.clone(), MeshOverrides::default());
        }
        if frame == 90 {
            entities.handle_damage_event(EntityId(1), 3.0);
            entities.play_animation(AnimationTarget::Entity(EntityId(2)), PlayerAnimation::Walking);
        }
        if frame == 150 {
            entities.viewer_mut().third_person = true;
        }

        entities.render_with_delta(FRAME_TIME);
        serve_skin_requests(&mut entities);
        for event in entities.drain_events() {
            log::info!("Entity event: {:?}", event);
        }

        if frame % 60 == 0 {
            log::info!(
                "Frame {}: entities {} | scene nodes {} | live textures {}",
                frame,
                entities.get_debug_string(),
                entities.graph().len(),
                entities.textures().live_count()
            );
            if let Some(hit) = entities.raycast_scene_debug() {
                log::info!("Looking at entity {} ({:.2} blocks)", hit.entity, hit.distance);
            }
        }
    }

    for (name, ids) in entities.entities_by_name() {
        log::info!("{}: {:?}", name, ids);
    }
    entities.clear();
    log::info!("Demo finished, {} textures still live", entities.textures().live_count());
    Ok(())
}
