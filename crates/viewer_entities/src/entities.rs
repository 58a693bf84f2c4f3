//! Entity manager
//!
//! [`Entities`] keeps one scene subtree per live entity in sync with the
//! snapshots the game client delivers. It builds the model when an entity
//! first shows up, refreshes equipment, name tags and poses on every update,
//! interpolates movement, and drives the player skin pipeline.
//!
//! Skin, cape and map images are never fetched here. The manager queues
//! [`SkinRequest`]s, the host performs them and answers through the
//! `complete_*` and `apply_*` methods. Answers for entities that have been
//! removed in the meantime are dropped.

use crate::config::{DebugMode, EntitiesConfig};
use crate::data::text::{label_component, strip_formatting};
use crate::data::{
    DisplayContext, EntityFlags, EntityId, EntityKind, EntityMetadata, EntitySchema, EntitySnapshot, EquipmentSlot, Item,
    MeshOverrides, MetadataValue, NameTagVisibility, Team, TextDisplayFlags, Username,
};
use crate::error::EntityError;
use crate::foundation::math::Vec3;
use crate::foundation::time::Clock;
use crate::providers::{ArmorSlot, MonospaceMeasure, ResourceProvider, TextMeasure, ViewerState};
use crate::render::armor::{add_armor_model, add_item_model, sync_armor_to_rig, Hand};
use crate::render::armor_stand::apply_armor_stand_pose;
use crate::render::item_frame::{apply_item_frame, MapRegistry};
use crate::render::item_mesh::get_item_mesh;
use crate::render::nametag::{
    add_name_tag, add_player_name_tag, text_opacity_from_byte, to_rgba, NameTagOptions, NAME_TAG_NODE,
};
use crate::render::player::skin::{extract_ears, infer_model_type, is_blank, normalize_cape};
use crate::render::player::{
    BackEquipment, PlayerAnimation, PlayerRig, SkinModel, SkinRequest, SkinSource, ELYTRA_TEXTURE, STEVE_SKIN_URL,
};
use crate::render::pose::to_quaternion;
use crate::render::{Atlases, RenderContext};
use crate::scene::{
    Aabb, Color, Geometry, ImageData, Material, NodeId, NodeKind, SceneGraph, SceneNode, TextureSource, TextureStore,
    TweenSet,
};
use image::RgbaImage;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::f32::consts::TAU;
use std::sync::Arc;

/// Entity types drawn with an item model
pub const ITEM_LIKE_ENTITIES: [&str; 9] = [
    "item",
    "tnt",
    "falling_block",
    "snowball",
    "egg",
    "ender_pearl",
    "experience_bottle",
    "splash_potion",
    "lingering_potion",
];

/// Fallback boxes of one type stop getting name tags after this many
const FALLBACK_NAME_TAG_LIMIT: u32 = 5;

/// Colour of the fallback box
const FALLBACK_COLOR: u32 = 0xFF_00_FF;

/// Dropped items turn at one radian per second
const ITEM_SPIN_RATE: f32 = 1.0;

/// Height of a player name tag in rig pixels
const PLAYER_NAME_TAG_HEIGHT: f32 = 4.0;

/// Lifecycle notification for the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityEvent {
    /// An entity got a scene model
    Added(EntityId),
    /// An entity and its model are gone
    Removed(EntityId),
    /// A player's skin, ears or cape texture changed
    SkinUpdated(EntityId),
}

/// Resource manager notifications that invalidate built models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourcesEvent {
    /// Block and item textures were replaced
    TexturesUpdated,
    /// Item models finished loading
    InventoryReady,
}

/// Whose animation [`Entities::play_animation`] changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationTarget {
    /// The third person model of the local player
    LocalPlayer,
    /// A player entity; falls back to the local player when unknown
    Entity(EntityId),
}

/// Closest entity hit by [`Entities::raycast_scene_debug`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    /// Entity that was hit
    pub entity: EntityId,
    /// Its model node
    pub node: NodeId,
    /// Distance from the camera
    pub distance: f32,
}

/// One entity in the scene
#[derive(Debug, Clone)]
pub struct SceneEntity {
    /// Group positioned and turned like the entity
    pub root: NodeId,

    /// Model below `root`, named `mesh`
    pub mesh: NodeId,

    /// Bounding box helper, named `debug`
    pub debug_box: Option<NodeId>,

    /// Latest snapshot
    pub original: EntitySnapshot,

    /// Player model of player-like entities
    pub rig: Option<PlayerRig>,

    /// Last username the entity reported
    pub username: Option<Username>,

    /// Entity type name at creation
    pub real_name: String,
}

#[derive(Debug, Clone, Default)]
struct CachedSkinUrls {
    skin_url: Option<String>,
    cape_url: Option<String>,
}

/// Skin work waiting for the host
#[derive(Debug, Clone, Default)]
struct PendingSkin {
    username: Option<String>,
    render_ears: bool,
    cape: Option<SkinSource>,
}

/// Scene state and collaborators a [`RenderContext`] borrows
struct Stage {
    graph: SceneGraph,
    textures: TextureStore,
    atlases: Atlases,
    provider: Box<dyn ResourceProvider>,
    measure: Box<dyn TextMeasure>,
    config: EntitiesConfig,
}

impl Stage {
    fn ctx(&mut self) -> RenderContext<'_> {
        RenderContext {
            graph: &mut self.graph,
            textures: &mut self.textures,
            atlases: self.atlases,
            provider: self.provider.as_ref(),
            measure: self.measure.as_ref(),
            config: &self.config,
        }
    }
}

/// Scene side of every entity the viewer knows about
pub struct Entities {
    stage: Stage,
    schema: Box<dyn EntitySchema>,
    viewer: ViewerState,

    /// Live entities by network id
    entities: BTreeMap<EntityId, SceneEntity>,

    /// Third person model of the local player
    proxy: Option<SceneEntity>,

    maps: MapRegistry,
    skin_urls: HashMap<String, CachedSkinUrls>,
    loaded_skin_ids: HashSet<EntityId>,
    pending_skins: HashMap<EntityId, PendingSkin>,
    fallback_tag_counts: HashMap<String, u32>,
    tweens: TweenSet,
    clock: Clock,
    debug_mode: DebugMode,
    rendering: bool,
    skin_requests: Vec<SkinRequest>,
    events: Vec<EntityEvent>,
}

impl Entities {
    /// Create a manager measuring name tags with [`MonospaceMeasure`]
    pub fn new(config: EntitiesConfig, provider: Box<dyn ResourceProvider>, schema: Box<dyn EntitySchema>) -> Self {
        Self::with_measure(config, provider, schema, Box::new(MonospaceMeasure))
    }

    /// Create a manager with host supplied font metrics
    pub fn with_measure(
        config: EntitiesConfig,
        provider: Box<dyn ResourceProvider>,
        schema: Box<dyn EntitySchema>,
        measure: Box<dyn TextMeasure>,
    ) -> Self {
        let mut textures = TextureStore::new();
        let atlases = Atlases::register(&mut textures);
        let debug_mode = config.debug_mode;
        Self {
            stage: Stage {
                graph: SceneGraph::new(),
                textures,
                atlases,
                provider,
                measure,
                config,
            },
            schema,
            viewer: ViewerState::default(),
            entities: BTreeMap::new(),
            proxy: None,
            maps: MapRegistry::new(),
            skin_urls: HashMap::new(),
            loaded_skin_ids: HashSet::new(),
            pending_skins: HashMap::new(),
            fallback_tag_counts: HashMap::new(),
            tweens: TweenSet::new(),
            clock: Clock::new(),
            debug_mode,
            rendering: true,
            skin_requests: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Scene graph holding every entity model
    pub fn graph(&self) -> &SceneGraph {
        &self.stage.graph
    }

    /// Textures created for entity models
    pub fn textures(&self) -> &TextureStore {
        &self.stage.textures
    }

    /// Shared atlases registered at creation
    pub fn atlases(&self) -> Atlases {
        self.stage.atlases
    }

    /// Renderer options
    pub fn config(&self) -> &EntitiesConfig {
        &self.stage.config
    }

    /// Renderer options, read again on the next frame
    pub fn config_mut(&mut self) -> &mut EntitiesConfig {
        &mut self.stage.config
    }

    /// Camera and world state
    pub fn viewer(&self) -> &ViewerState {
        &self.viewer
    }

    /// Camera and world state, updated by the host before rendering
    pub fn viewer_mut(&mut self) -> &mut ViewerState {
        &mut self.viewer
    }

    /// Map image cache and planes
    pub fn maps(&self) -> &MapRegistry {
        &self.maps
    }

    /// Scene entity by id
    pub fn entity(&self, id: EntityId) -> Option<&SceneEntity> {
        self.entities.get(&id)
    }

    /// Third person model of the local player
    pub fn player_entity(&self) -> Option<&SceneEntity> {
        self.proxy.as_ref()
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no entity is live
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Current debug overlay mode
    pub fn debug_mode(&self) -> DebugMode {
        self.debug_mode
    }

    /// Whether entity models are attached to the scene
    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    /// Create, refresh or (with the delete flag) destroy an entity
    pub fn update(&mut self, snapshot: EntitySnapshot, overrides: MeshOverrides) {
        let mut overrides = overrides;
        apply_builtin_overrides(&snapshot.name, &mut overrides);

        if snapshot.delete {
            self.remove(snapshot.id);
            return;
        }

        let id = snapshot.id;
        let just_added = !self.entities.contains_key(&id);
        if just_added && !self.create_entity(&snapshot, &overrides) {
            return;
        }
        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };
        entity.original = snapshot.clone();
        let (root, mesh) = (entity.root, entity.mesh);

        let rig = entity.rig.as_mut();
        if refresh_equipment(&mut self.stage.ctx(), root, rig, &snapshot) {
            self.loaded_skin_ids.remove(&id);
        }

        let flags = EntityFlags::from_bits_truncate(snapshot.metadata_at(0).map_or(0, MetadataValue::as_flags));
        let invisible = flags.contains(EntityFlags::INVISIBLE) || self.viewer.is_spectating(id);
        let graph = &mut self.stage.graph;
        for child in graph.children(mesh).to_vec() {
            if let Some(node) = graph.get_mut(child) {
                if node.name != NAME_TAG_NODE {
                    node.visible = !invisible;
                }
            }
        }

        let schema = self.schema.as_ref();
        let meta = EntityMetadata::general(schema, &snapshot);
        if let Some(node) = graph.get_mut(root) {
            node.transform.set_uniform_scale(if meta.flag("baby") { 0.5 } else { 1.0 });
        }

        if snapshot.name != "player" {
            let text_display = EntityMetadata::specific(schema, &snapshot, "text_display");
            let raw = text_display
                .as_ref()
                .and_then(|m| m.get("text"))
                .filter(|v| v.is_truthy())
                .or_else(|| meta.get("custom_name").filter(|_| meta.flag("custom_name_visible")));
            if let Some(text) = raw.and_then(label_component) {
                let options = label_options(text, text_display.as_ref(), &snapshot);
                add_name_tag(&mut self.stage.ctx(), mesh, &options);
            }
        }

        if let Some(stand) = EntityMetadata::specific(schema, &snapshot, "armor_stand") {
            apply_armor_stand_pose(&mut self.stage.graph, root, Some(mesh), &stand);
        }

        let frame = EntityMetadata::specific(schema, &snapshot, "item_frame")
            .or_else(|| EntityMetadata::specific(schema, &snapshot, "glow_item_frame"));
        if let Some(frame) = frame {
            // older schemas have no key for the framed item
            let item = frame
                .get("item")
                .and_then(MetadataValue::as_item)
                .or_else(|| snapshot.metadata_at(8).and_then(MetadataValue::as_item));
            let rotation = frame.int("rotation").unwrap_or(0);
            apply_item_frame(&mut self.stage.ctx(), &mut self.maps, root, Some(mesh), snapshot.pitch, item, rotation);
        }

        if let Some(entity) = self.entities.get_mut(&id) {
            if snapshot.username.is_some() {
                entity.username.clone_from(&snapshot.username);
            }
        }
        self.update_name_tag_visibility(id);
        self.update_entity_position(&snapshot, just_added, &overrides);
    }

    fn create_entity(&mut self, snapshot: &EntitySnapshot, overrides: &MeshOverrides) -> bool {
        let id = snapshot.id;
        let root = self.stage.graph.create(SceneNode::group("entity"));
        let Some((mesh, rig)) = self.build_mesh(root, snapshot, overrides) else {
            self.stage.ctx().destroy_node(root);
            return false;
        };

        let graph = &mut self.stage.graph;
        if let Some(node) = graph.get_mut(mesh) {
            node.name = "mesh".to_string();
        }
        if let Some(node) = graph.get_mut(root) {
            node.transform.position = snapshot.spawn_position();
        }
        let mut helper = SceneNode::new(
            "debug",
            NodeKind::BoxHelper {
                color: Color::from_hex(debug_color(snapshot.kind)),
                bounds: Aabb::entity_box(snapshot.width, snapshot.height),
            },
        );
        helper.visible = false;
        let debug_box = graph.spawn(root, helper);
        let scene_root = graph.root();
        graph.add_child(scene_root, root);

        let is_player = rig.is_some();
        self.entities.insert(
            id,
            SceneEntity {
                root,
                mesh,
                debug_box: Some(debug_box),
                original: snapshot.clone(),
                rig,
                username: snapshot.username.clone(),
                real_name: snapshot.name.clone(),
            },
        );
        self.events.push(EntityEvent::Added(id));
        log::debug!("Added entity {} ({})", id, snapshot.name);

        if is_player {
            let username = snapshot.username.as_ref().and_then(Username::as_lookup_name).map(str::to_string);
            let (uuid, skin) = match &overrides.texture {
                Some(texture) => (snapshot.uuid.clone(), SkinSource::Url(texture.clone())),
                None => (None, SkinSource::Url(STEVE_SKIN_URL.to_string())),
            };
            self.update_player_skin(id, username.as_deref(), uuid.as_deref(), skin, None);
        }
        if let Some(entity) = self.entities.get(&id) {
            show_debug_box(&mut self.stage.graph, entity, self.debug_mode);
        }
        attach_to_scene(&mut self.stage.graph, root, self.rendering);
        true
    }

    /// Build the model of a new entity below `root`
    fn build_mesh(
        &mut self,
        root: NodeId,
        snapshot: &EntitySnapshot,
        overrides: &MeshOverrides,
    ) -> Option<(NodeId, Option<PlayerRig>)> {
        let mut ctx = self.stage.ctx();

        if ITEM_LIKE_ENTITIES.contains(&snapshot.name.as_str()) {
            return build_item_entity(&mut ctx, root, snapshot).map(|mesh| (mesh, None));
        }

        if snapshot.name == "player" {
            let username = snapshot.username.as_ref().and_then(Username::as_lookup_name).unwrap_or_default();
            let rig = PlayerRig::build(ctx.graph, root, snapshot.uuid.as_deref().unwrap_or_default(), username);
            if let Some(name) = snapshot.plain_username() {
                let y = rig.name_tag_height(ctx.graph);
                add_player_name_tag(&mut ctx, rig.bones.wrapper, &name, y, PLAYER_NAME_TAG_HEIGHT);
            }
            return Some((rig.bones.wrapper, Some(rig)));
        }

        let model_name = entity_model_name(&snapshot.name);
        match ctx.provider.entity_model(&model_name, overrides) {
            Ok(Some(model)) => {
                let mesh = ctx.instantiate_model(root, &model);
                if let Some(username) = &snapshot.username {
                    let options = NameTagOptions {
                        text: username_component(username),
                        ..NameTagOptions::billboard(String::new(), snapshot.height)
                    };
                    add_name_tag(&mut ctx, mesh, &options);
                }
                return Some((mesh, None));
            }
            Ok(None) => {}
            Err(err) => log::error!("Failed to build model for '{}': {}", model_name, err),
        }

        if !self.schema.is_attackable(snapshot) {
            return None;
        }
        let (width, height) = (snapshot.width, snapshot.height);
        let cube = ctx.graph.spawn(
            root,
            SceneNode::mesh(
                model_name,
                Geometry::Box {
                    width,
                    height,
                    depth: width,
                    offset: Vec3::new(0.0, height / 2.0, 0.0),
                },
                vec![Material::basic(Color::from_hex(FALLBACK_COLOR))],
            ),
        );
        let count = self.fallback_tag_counts.entry(snapshot.name.clone()).or_insert(0);
        *count += 1;
        if *count <= FALLBACK_NAME_TAG_LIMIT {
            add_name_tag(&mut ctx, cube, &NameTagOptions::billboard(snapshot.name.clone(), height));
        }
        Some((cube, None))
    }

    fn update_entity_position(&mut self, snapshot: &EntitySnapshot, just_added: bool, overrides: &MeshOverrides) {
        let Some(entity) = self.entities.get(&snapshot.id) else {
            return;
        };
        let duration = if just_added { 0.0 } else { self.stage.config.tween_duration_ms };
        let graph = &mut self.stage.graph;

        if let Some(position) = snapshot.position {
            self.tweens.tween_position(graph, entity.root, position, duration);
        }
        if snapshot.yaw.abs() > f32::EPSILON {
            let current = graph.get(entity.root).map_or(0.0, |n| n.transform.rotation.y);
            let target = current + shortest_yaw_delta(current, snapshot.yaw);
            self.tweens.tween_rotation_y(graph, entity.root, target, duration);
        }

        let head = overrides.rotation.and_then(|r| r.head);
        if let (Some(rig), Some(head)) = (&entity.rig, head) {
            if let Some(node) = graph.get_mut(rig.bones.head) {
                let diff = if head.y.abs() > f32::EPSILON { head.y - snapshot.yaw } else { 0.0 };
                node.transform.rotation.y = -diff;
                node.transform.rotation.x = -head.x;
            }
        }
    }

    /// Destroy an entity; unknown ids are ignored. Returns whether it existed.
    pub fn remove(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.remove(&id) else {
            return false;
        };
        self.stage.ctx().destroy_node(entity.root);
        self.maps.prune(&self.stage.graph);
        self.loaded_skin_ids.remove(&id);
        self.pending_skins.remove(&id);
        self.events.push(EntityEvent::Removed(id));
        log::debug!("Removed entity {} ({})", id, entity.real_name);
        true
    }

    /// Destroy every entity and the local player model
    pub fn clear(&mut self) {
        let roots: Vec<NodeId> = self
            .entities
            .values()
            .chain(self.proxy.as_ref())
            .map(|e| e.root)
            .collect();
        let mut ctx = self.stage.ctx();
        for root in roots {
            ctx.destroy_node(root);
        }
        self.entities.clear();
        self.proxy = None;
        self.maps.clear_planes();
        self.loaded_skin_ids.clear();
        self.pending_skins.clear();
        self.tweens.clear();
    }

    /// Rebuild every entity from its last snapshot
    pub fn reload_entities(&mut self) {
        let snapshots: Vec<EntitySnapshot> = self.entities.values().map(|e| e.original.clone()).collect();
        log::debug!("Reloading {} entities", snapshots.len());
        for snapshot in snapshots {
            self.update(snapshot.as_deleted(), MeshOverrides::default());
            self.update(snapshot, MeshOverrides::default());
        }
    }

    /// React to resource manager changes
    pub fn on_resources_event(&mut self, event: ResourcesEvent) {
        log::debug!("Resources changed: {:?}", event);
        self.reload_entities();
    }

    /// Create or move the third person model of the local player
    pub fn handle_player_entity(&mut self, snapshot: EntitySnapshot) {
        if self.proxy.is_none() {
            let graph = &mut self.stage.graph;
            let scene_root = graph.root();
            let root = graph.spawn(scene_root, SceneNode::group("player_entity"));
            let username = snapshot
                .username
                .as_ref()
                .and_then(Username::as_lookup_name)
                .map(str::to_string);
            let uuid = snapshot.uuid.clone();
            let rig = PlayerRig::build(
                graph,
                root,
                uuid.as_deref().unwrap_or_default(),
                username.as_deref().unwrap_or_default(),
            );
            self.proxy = Some(SceneEntity {
                root,
                mesh: rig.bones.wrapper,
                debug_box: None,
                original: EntitySnapshot {
                    name: "player".to_string(),
                    ..snapshot.clone()
                },
                rig: Some(rig),
                username: snapshot.username.clone(),
                real_name: "player".to_string(),
            });
            log::debug!("Created local player model for {}", snapshot.id);
            self.update_player_skin(
                snapshot.id,
                username.as_deref(),
                uuid.as_deref(),
                SkinSource::Url(STEVE_SKIN_URL.to_string()),
                None,
            );
        }

        let Some(proxy) = self.proxy.as_mut() else {
            return;
        };
        proxy.original = EntitySnapshot {
            name: "player".to_string(),
            ..snapshot.clone()
        };
        if let Some(node) = self.stage.graph.get_mut(proxy.root) {
            if let Some(position) = snapshot.position {
                node.transform.position = position;
            }
            node.transform.rotation.y = snapshot.yaw;
        }
        let root = proxy.root;
        if refresh_equipment(&mut self.stage.ctx(), root, proxy.rig.as_mut(), &snapshot) {
            self.loaded_skin_ids.remove(&snapshot.id);
        }
    }

    /// Advance by the time since the previous call
    pub fn render(&mut self) {
        let dt = self.clock.get_delta();
        self.render_with_delta(dt);
    }

    /// Advance tweens and animations by `dt` seconds and refresh visibility
    pub fn render_with_delta(&mut self, dt: f32) {
        if self.stage.config.render_entities != self.rendering {
            self.set_rendering(self.stage.config.render_entities);
        }
        self.tweens.update(&mut self.stage.graph, dt * 1000.0);

        let visible_distance = self.stage.config.visible_distance;
        let ids: Vec<EntityId> = self.entities.keys().copied().collect();
        for id in ids {
            let culled = match self.entities.get_mut(&id) {
                Some(entity) => advance_entity(&mut self.stage.graph, entity, &self.viewer, visible_distance, dt),
                None => continue,
            };
            if culled {
                self.maybe_render_skin(id, false);
            }
            if let Some(entity) = self.entities.get(&id) {
                sync_entity(&mut self.stage.graph, entity, dt);
            }
        }

        let Some(proxy) = self.proxy.as_mut() else {
            return;
        };
        let id = proxy.original.id;
        if advance_entity(&mut self.stage.graph, proxy, &self.viewer, visible_distance, dt) {
            self.maybe_render_skin(id, true);
        }
        let Some(proxy) = self.proxy.as_ref() else {
            return;
        };
        sync_entity(&mut self.stage.graph, proxy, dt);
        self.place_player_proxy();
    }

    /// Follow the camera with the local player model in third person
    fn place_player_proxy(&mut self) {
        let Some(proxy) = self.proxy.as_ref() else {
            return;
        };
        let graph = &mut self.stage.graph;
        let visible = self.viewer.third_person;
        let Some(node) = graph.get_mut(proxy.root) else {
            return;
        };
        node.visible = visible;
        if !visible {
            return;
        }
        node.transform.position = self.viewer.camera_position - Vec3::new(0.0, self.viewer.eye_height, 0.0);
        node.transform.rotation.set(0.0, self.viewer.camera_yaw, 0.0, node.transform.rotation.order);
        if let Some(head) = proxy.rig.as_ref().and_then(|r| graph.get_mut(r.bones.head)) {
            head.transform.rotation.set(-self.viewer.camera_pitch, 0.0, 0.0, head.transform.rotation.order);
        }
    }

    /// Ask for the real skin once a player is close enough
    fn maybe_render_skin(&mut self, id: EntityId, is_proxy: bool) {
        let entity = if is_proxy { self.proxy.as_ref() } else { self.entities.get(&id) };
        let Some(entity) = entity else {
            return;
        };
        let Some(rig) = &entity.rig else {
            return;
        };
        let Some(node) = self.stage.graph.get(entity.root) else {
            return;
        };
        if !node.visible {
            return;
        }

        let distance = (node.transform.position - self.viewer.camera_position).norm();
        let view_limit = self.viewer.view_distance as f32 * 16.0;
        if distance >= self.stage.config.max_skin_load_distance || distance >= view_limit {
            return;
        }
        if !self.loaded_skin_ids.insert(id) {
            return;
        }
        let username = rig.real_username.clone();
        let uuid = rig.real_uuid.clone();
        self.update_player_skin(
            id,
            Some(username.as_str()).filter(|s| !s.is_empty()),
            Some(uuid.as_str()).filter(|s| !s.is_empty()),
            SkinSource::Lookup,
            Some(SkinSource::Lookup),
        );
    }

    /// Show or hide the bounding box helpers
    pub fn set_debug_mode(&mut self, mode: DebugMode) {
        self.debug_mode = mode;
        for entity in self.entities.values() {
            show_debug_box(&mut self.stage.graph, entity, mode);
        }
    }

    /// Attach entity models to the scene, or detach them all
    pub fn set_rendering(&mut self, rendering: bool) {
        self.rendering = rendering;
        for entity in self.entities.values() {
            attach_to_scene(&mut self.stage.graph, entity.root, rendering);
        }
    }

    /// `visible/total visiblePlayers/players`
    pub fn get_debug_string(&self) -> String {
        let is_visible = |e: &&SceneEntity| self.stage.graph.get(e.root).is_some_and(|n| n.visible);
        let total = self.entities.len();
        let visible = self.entities.values().filter(is_visible).count();
        let players: Vec<&SceneEntity> = self.entities.values().filter(|e| e.rig.is_some()).collect();
        let visible_players = players.iter().copied().filter(is_visible).count();
        format!("{}/{} {}/{}", visible, total, visible_players, players.len())
    }

    /// Entity ids grouped by entity type name
    pub fn entities_by_name(&self) -> BTreeMap<String, Vec<EntityId>> {
        let mut by_name: BTreeMap<String, Vec<EntityId>> = BTreeMap::new();
        for (&id, entity) in &self.entities {
            if entity.real_name.is_empty() {
                continue;
            }
            by_name.entry(entity.real_name.clone()).or_default().push(id);
        }
        by_name
    }

    /// Number of entities currently visible
    pub fn entities_rendering_count(&self) -> usize {
        self.entities
            .values()
            .filter(|e| self.stage.graph.get(e.root).is_some_and(|n| n.visible))
            .count()
    }

    /// Player rig of an entity, or of the local player model when `id` is its id
    pub fn get_player_rig(&self, id: EntityId) -> Option<&PlayerRig> {
        if let Some(proxy) = self.proxy.as_ref().filter(|p| p.original.id == id) {
            return proxy.rig.as_ref();
        }
        self.entities.get(&id)?.rig.as_ref()
    }

    /// Start loading a player's skin and cape.
    ///
    /// With `uuid_cache` set, explicit URLs are remembered for that UUID and
    /// [`SkinSource::Lookup`] uses a remembered URL when there is one. A
    /// `None` cape removes the current cape.
    pub fn update_player_skin(
        &mut self,
        id: EntityId,
        username: Option<&str>,
        uuid_cache: Option<&str>,
        skin: SkinSource,
        cape: Option<SkinSource>,
    ) {
        let (mut skin, mut cape) = (skin, cape);
        if let Some(uuid) = uuid_cache {
            let skin_url = url_of(Some(&skin));
            let cape_url = url_of(cape.as_ref());
            if skin_url.is_some() || cape_url.is_some() {
                self.skin_urls.insert(uuid.to_string(), CachedSkinUrls { skin_url, cape_url });
            }
            let cached = self.skin_urls.get(uuid);
            if skin == SkinSource::Lookup {
                if let Some(url) = cached.and_then(|c| c.skin_url.clone()) {
                    skin = SkinSource::Url(url);
                }
            }
            if cape.is_none() {
                cape = cached.and_then(|c| c.cape_url.clone()).map(SkinSource::Url);
            }
        }

        if skin == SkinSource::Lookup && username.is_none() {
            return;
        }
        let render_ears = self.stage.config.render_ears || username == Some("deadmau5");
        let Some(rig) = rig_mut(&mut self.entities, &mut self.proxy, id) else {
            return;
        };
        let (graph, textures) = (&mut self.stage.graph, &mut self.stage.textures);
        rig.hide_cape(graph);
        if cape.is_none() {
            rig.clear_cape(graph, textures);
        }

        let pending = PendingSkin {
            username: username.map(str::to_string),
            render_ears,
            cape,
        };
        match skin {
            SkinSource::Url(url) if url == STEVE_SKIN_URL => {
                rig.set_skin(graph, textures, TextureSource::Url(url), SkinModel::Default);
                rig.set_ears(graph, textures, None);
                self.events.push(EntityEvent::SkinUpdated(id));
                self.request_cape(id, pending);
            }
            SkinSource::Url(url) => {
                self.skin_requests.push(SkinRequest::SkinImage { entity: id, url, render_ears });
                self.pending_skins.insert(id, pending);
            }
            SkinSource::Lookup => {
                let Some(username) = pending.username.clone() else {
                    return;
                };
                self.skin_requests.push(SkinRequest::SkinUrl { entity: id, username });
                self.pending_skins.insert(id, pending);
            }
        }
    }

    fn request_cape(&mut self, id: EntityId, pending: PendingSkin) {
        match pending.cape {
            Some(SkinSource::Url(url)) => self.skin_requests.push(SkinRequest::CapeImage { entity: id, url }),
            Some(SkinSource::Lookup) => {
                if let Some(username) = pending.username {
                    self.skin_requests.push(SkinRequest::CapeUrl { entity: id, username });
                }
            }
            None => {}
        }
    }

    /// Answer a [`SkinRequest::SkinUrl`]; `None` when the player has no skin
    pub fn complete_skin_url(&mut self, id: EntityId, url: Option<String>) {
        let Some(render_ears) = self.pending_skins.get(&id).map(|p| p.render_ears) else {
            return;
        };
        let has_rig = self.get_player_rig(id).is_some();
        match url.filter(|_| has_rig) {
            Some(url) => self.skin_requests.push(SkinRequest::SkinImage { entity: id, url, render_ears }),
            None => {
                self.pending_skins.remove(&id);
            }
        }
    }

    /// Answer a [`SkinRequest::SkinImage`] with the decoded skin
    pub fn apply_skin_image(&mut self, id: EntityId, image: &RgbaImage) {
        let pending = self.pending_skins.remove(&id).unwrap_or_default();
        let Some(rig) = rig_mut(&mut self.entities, &mut self.proxy, id) else {
            log::debug!("Dropping skin of removed entity {}", id);
            return;
        };
        let (graph, textures) = (&mut self.stage.graph, &mut self.stage.textures);

        let ears = if pending.render_ears {
            extract_ears(image).filter(|ears| !is_blank(ears))
        } else {
            None
        };
        rig.set_skin(graph, textures, image_source(image.clone()), infer_model_type(image));
        rig.set_ears(graph, textures, ears.map(image_source));
        self.events.push(EntityEvent::SkinUpdated(id));
        self.request_cape(id, pending);
    }

    /// Answer a [`SkinRequest::CapeUrl`]; `None` when the player has no cape
    pub fn complete_cape_url(&mut self, id: EntityId, url: Option<String>) {
        let Some(url) = url else {
            return;
        };
        if rig_mut(&mut self.entities, &mut self.proxy, id).is_some() {
            self.skin_requests.push(SkinRequest::CapeImage { entity: id, url });
        }
    }

    /// Answer a [`SkinRequest::CapeImage`] with the decoded cape
    pub fn apply_cape_image(&mut self, id: EntityId, image: &RgbaImage) -> Result<(), EntityError> {
        let Some(rig) = rig_mut(&mut self.entities, &mut self.proxy, id) else {
            log::debug!("Dropping cape of removed entity {}", id);
            return Ok(());
        };
        let canvas = normalize_cape(image)?;
        rig.set_cape(&mut self.stage.graph, &mut self.stage.textures, image_source(canvas));
        self.events.push(EntityEvent::SkinUpdated(id));
        Ok(())
    }

    /// Swing an arm once or switch the movement animation of a player
    pub fn play_animation(&mut self, target: AnimationTarget, animation: PlayerAnimation) {
        let entity = match target {
            AnimationTarget::Entity(id) if self.get_player_rig(id).is_some() => Some(id),
            _ => None,
        };
        let rig = match entity {
            Some(id) => rig_mut(&mut self.entities, &mut self.proxy, id),
            None => self.proxy.as_mut().and_then(|p| p.rig.as_mut()),
        };
        let Some(rig) = rig else {
            return;
        };
        if animation == PlayerAnimation::OneSwing {
            rig.animation.swing_arm();
        } else {
            rig.animation.request_switch(animation.into());
        }
    }

    /// Swing the arm of the first player entity
    pub fn debug_swing_arm(&mut self) {
        if let Some(rig) = self.entities.values_mut().find_map(|e| e.rig.as_mut()) {
            rig.animation.swing_arm();
        }
    }

    /// Store a map image and show it on every frame holding that map
    pub fn update_map(&mut self, map_id: i32, data: &str) {
        self.maps.update_map(&mut self.stage.graph, &mut self.stage.textures, map_id, data);
    }

    /// Apply the team name tag rule of an entity
    pub fn update_name_tag_visibility(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        let show = name_tag_visible(entity.original.team.as_ref(), self.viewer.team.as_ref());
        let graph = &mut self.stage.graph;
        for tag in graph.descendants_named(entity.root, NAME_TAG_NODE) {
            if let Some(node) = graph.get_mut(tag) {
                node.visible = show;
            }
        }
    }

    /// Flash the model red and fade back
    pub fn handle_damage_event(&mut self, id: EntityId, amount: f32) {
        let Some(mesh) = self.entities.get(&id).map(|e| e.mesh) else {
            return;
        };
        log::debug!("Entity {} took {} damage", id, amount);
        let duration = self.stage.config.damage_flash_ms;
        let graph = &mut self.stage.graph;
        for node_id in graph.traverse(mesh) {
            let colors: Vec<Color> = match graph.get(node_id).map(|n| &n.kind) {
                Some(NodeKind::Mesh { materials, .. }) => materials.iter().map(|m| m.color).collect(),
                _ => continue,
            };
            for (index, color) in colors.into_iter().enumerate() {
                // a flash still fading keeps its original colour
                let original = self.tweens.color_target(node_id, index).unwrap_or(color);
                self.tweens.tween_color(graph, node_id, index, Color::RED, original, duration);
            }
        }
    }

    /// Closest visible entity along the camera's view direction
    pub fn raycast_scene_debug(&self) -> Option<RaycastHit> {
        let graph = &self.stage.graph;
        let origin = self.viewer.camera_position;
        let direction = self.viewer.camera_direction();
        self.entities
            .iter()
            .filter_map(|(&id, entity)| {
                if !graph.is_attached(entity.root) || !graph.get(entity.root)?.visible {
                    return None;
                }
                let position = graph.world_position(entity.root)?;
                let bounds = Aabb::entity_box(entity.original.width, entity.original.height).translated(position);
                let distance = bounds.intersect_ray(origin, direction)?;
                Some(RaycastHit {
                    entity: id,
                    node: entity.mesh,
                    distance,
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Take the queued skin work
    pub fn drain_skin_requests(&mut self) -> Vec<SkinRequest> {
        std::mem::take(&mut self.skin_requests)
    }

    /// Take the queued lifecycle events
    pub fn drain_events(&mut self) -> Vec<EntityEvent> {
        std::mem::take(&mut self.events)
    }
}

fn rig_mut<'a>(
    entities: &'a mut BTreeMap<EntityId, SceneEntity>,
    proxy: &'a mut Option<SceneEntity>,
    id: EntityId,
) -> Option<&'a mut PlayerRig> {
    if let Some(proxy) = proxy.as_mut().filter(|p| p.original.id == id) {
        return proxy.rig.as_mut();
    }
    entities.get_mut(&id)?.rig.as_mut()
}

fn apply_builtin_overrides(name: &str, overrides: &mut MeshOverrides) {
    match name {
        "zombie_villager" => {
            overrides.texture = Some("textures/1.16.4/entity/zombie_villager/zombie_villager.png".to_string());
        }
        "husk" => overrides.texture = Some("textures/1.16.4/entity/zombie/husk.png".to_string()),
        "glow_item_frame" => {
            overrides
                .textures
                .insert("background".to_string(), "block:glow_item_frame".to_string());
        }
        _ => {}
    }
}

/// Model name of an entity type; `PascalCase` names become `snake_case`
pub fn entity_model_name(name: &str) -> String {
    if !name.starts_with(char::is_uppercase) {
        return name.to_lowercase();
    }
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn debug_color(kind: EntityKind) -> u32 {
    match kind {
        EntityKind::Hostile => 0xFF_00_00,
        EntityKind::Mob => 0x00_FF_00,
        EntityKind::Player => 0x00_00_FF,
        _ => 0xFF_A5_00,
    }
}

/// Yaw change towards `target` taking the shorter way around
pub fn shortest_yaw_delta(current: f32, target: f32) -> f32 {
    let da = (target - current) % TAU;
    (2.0 * da) % TAU - da
}

fn username_component(username: &Username) -> Value {
    match username {
        Username::Plain(s) => Value::String(strip_formatting(s)),
        Username::Component(component) => component.clone(),
    }
}

fn url_of(source: Option<&SkinSource>) -> Option<String> {
    match source {
        Some(SkinSource::Url(url)) => Some(url.clone()),
        _ => None,
    }
}

fn image_source(image: RgbaImage) -> TextureSource {
    TextureSource::Image(Arc::new(ImageData::from(image)))
}

fn as_vec3(value: &MetadataValue) -> Option<Vec3> {
    match value {
        MetadataValue::Vector { x, y, z } => Some(Vec3::new(*x, *y, *z)),
        MetadataValue::Array(v) if v.len() >= 3 => Some(Vec3::new(v[0], v[1], v[2])),
        _ => None,
    }
}

/// Name tag options of a custom name or a text display
fn label_options(text: Value, display: Option<&EntityMetadata<'_>>, snapshot: &EntitySnapshot) -> NameTagOptions {
    let mut options = NameTagOptions {
        text,
        pitch: snapshot.pitch,
        yaw: snapshot.yaw,
        ..NameTagOptions::billboard(String::new(), snapshot.height)
    };
    let Some(display) = display else {
        return options;
    };

    options.fixed = display
        .get("billboard_render_constraints")
        .map_or(true, |c| c.as_str() == Some("fixed") || !c.is_truthy());
    let style = TextDisplayFlags::from_bits_truncate(display.get("style_flags").map_or(0, MetadataValue::as_flags));
    if !style.contains(TextDisplayFlags::DEFAULT_BACKGROUND) {
        options.background = display.int("background_color").and_then(|c| to_rgba(&c.to_string()));
    }
    options.text_opacity = display.int("text_opacity").and_then(text_opacity_from_byte);
    options.scale = display.get("scale").and_then(as_vec3);
    options.translation = Some(display.get("translation").and_then(as_vec3).unwrap_or_else(Vec3::zeros));
    options.rotation_left = display.get("left_rotation").and_then(to_quaternion);
    options.rotation_right = display.get("right_rotation").and_then(to_quaternion);
    options
}

/// Whether the local player may see the name tag of an entity in `entity_team`
pub fn name_tag_visible(entity_team: Option<&Team>, player_team: Option<&Team>) -> bool {
    let entity_name = entity_team.map(|t| t.team.as_str());
    let player_name = player_team.map(|t| t.team.as_str());
    match entity_team.map_or(NameTagVisibility::Always, |t| t.name_tag_visibility) {
        NameTagVisibility::Always => true,
        NameTagVisibility::Never => false,
        NameTagVisibility::HideForOwnTeam => entity_name != player_name,
        NameTagVisibility::HideForOtherTeams => entity_name == player_name || player_team.is_none(),
    }
}

fn show_debug_box(graph: &mut SceneGraph, entity: &SceneEntity, mode: DebugMode) {
    // advanced mode has no overlay yet
    if let Some(node) = entity.debug_box.and_then(|id| graph.get_mut(id)) {
        node.visible = mode == DebugMode::Basic;
    }
}

fn attach_to_scene(graph: &mut SceneGraph, root: NodeId, rendering: bool) {
    let scene_root = graph.root();
    if !rendering {
        graph.detach(root);
    } else if graph.parent(root) != Some(scene_root) {
        graph.add_child(scene_root, root);
    }
}

/// Item model of an item-like entity below `root`
fn build_item_entity(ctx: &mut RenderContext<'_>, root: NodeId, snapshot: &EntitySnapshot) -> Option<NodeId> {
    let is_projectile = snapshot.kind == EntityKind::Projectile;
    let is_dropped_item = snapshot.name == "item";
    let item = if snapshot.name == "tnt" || is_projectile {
        Some(Item::named(snapshot.name.clone()))
    } else if snapshot.name == "falling_block" {
        snapshot.object_data.map(Item::from_block_state)
    } else {
        snapshot
            .metadata
            .iter()
            .flatten()
            .find_map(|value| value.as_item().filter(|item| item.item_count > 0))
            .cloned()
    };
    let item = item?;

    let item_mesh = get_item_mesh(ctx, &item, DisplayContext::Ground, is_projectile, None)?;
    ctx.graph.add_child(root, item_mesh.node);
    let node = ctx.graph.get_mut(item_mesh.node)?;
    if is_dropped_item || is_projectile {
        node.transform.set_uniform_scale(0.5);
        node.transform.position = Vec3::new(0.0, if is_dropped_item { 0.2 } else { 0.1 }, 0.0);
    } else {
        node.transform.set_uniform_scale(2.0);
        node.transform.position = Vec3::new(0.0, 0.5, 0.0);
    }
    if is_dropped_item {
        node.spin_rate = Some(ITEM_SPIN_RATE);
    }
    Some(item_mesh.node)
}

/// Hand items, armor and back equipment.
///
/// Returns true when the elytra came off and the real cape has to be loaded
/// again.
fn refresh_equipment(
    ctx: &mut RenderContext<'_>,
    root: NodeId,
    rig: Option<&mut PlayerRig>,
    snapshot: &EntitySnapshot,
) -> bool {
    let Some(equipment) = &snapshot.equipment else {
        return false;
    };
    let is_player = snapshot.kind == EntityKind::Player;
    let (main_hand, off_hand) = if is_player { (Hand::Right, Hand::Left) } else { (Hand::Left, Hand::Right) };

    add_item_model(ctx, root, main_hand, snapshot.equipment_item(EquipmentSlot::MainHand), is_player);
    add_item_model(ctx, root, off_hand, snapshot.equipment_item(EquipmentSlot::OffHand), is_player);
    add_armor_model(ctx, root, ArmorSlot::Feet, snapshot.equipment_item(EquipmentSlot::Feet), 1, false);
    add_armor_model(ctx, root, ArmorSlot::Legs, snapshot.equipment_item(EquipmentSlot::Legs), 2, false);
    add_armor_model(ctx, root, ArmorSlot::Chest, snapshot.equipment_item(EquipmentSlot::Chest), 1, false);
    add_armor_model(ctx, root, ArmorSlot::Head, snapshot.equipment_item(EquipmentSlot::Head), 1, false);

    let Some(rig) = rig.filter(|_| is_player) else {
        return false;
    };
    let wears_elytra = equipment.iter().flatten().any(|item| item.name == "elytra");
    let had_elytra = rig.back_equipment == Some(BackEquipment::Elytra);
    if wears_elytra {
        rig.set_back_equipment(ctx.graph, Some(BackEquipment::Elytra));
        if !had_elytra {
            rig.set_cape(ctx.graph, ctx.textures, TextureSource::Url(ELYTRA_TEXTURE.to_string()));
        }
        return false;
    }
    if had_elytra {
        rig.clear_cape(ctx.graph, ctx.textures);
    }
    rig.set_back_equipment(ctx.graph, Some(BackEquipment::Cape));
    had_elytra
}

/// Animation and distance culling; returns whether culling ran
fn advance_entity(
    graph: &mut SceneGraph,
    entity: &mut SceneEntity,
    viewer: &ViewerState,
    visible_distance: f32,
    dt: f32,
) -> bool {
    if let Some(rig) = entity.rig.as_mut() {
        rig.animate(graph, dt);
    }
    let Some(anchor) = viewer.viewer_chunk_position else {
        return false;
    };
    let Some(node) = graph.get_mut(entity.root) else {
        return false;
    };
    let position = node.transform.position;
    node.visible = (position - anchor).norm_squared() < visible_distance * visible_distance
        || viewer.is_chunk_finished(position);
    true
}

/// Armor follows the rig, dropped items spin
fn sync_entity(graph: &mut SceneGraph, entity: &SceneEntity, dt: f32) {
    if !graph.get(entity.root).is_some_and(|n| n.visible) {
        return;
    }
    if let Some(rig) = &entity.rig {
        sync_armor_to_rig(graph, entity.root, rig);
    }
    if let Some(mesh) = graph.get_mut(entity.mesh) {
        if let Some(rate) = mesh.spin_rate {
            mesh.transform.rotation.y += rate * dt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::metadata::tests::TableSchema;
    use crate::data::{HeadRotation, ItemComponent, RotationOverride};
    use crate::render::tests::FakeProvider;
    use crate::scene::Rgba;
    use approx::assert_relative_eq;
    use image::Rgba as Pixel;
    use serde_json::json;
    use std::f32::consts::PI;

    fn manager(schema: TableSchema) -> Entities {
        Entities::new(EntitiesConfig::default(), Box::new(FakeProvider), Box::new(schema))
    }

    fn zombie(id: i32) -> EntitySnapshot {
        EntitySnapshot {
            kind: EntityKind::Hostile,
            position: Some(Vec3::new(1.0, 64.0, 2.0)),
            ..EntitySnapshot::new(id, "zombie")
        }
    }

    fn player(id: i32, username: &str) -> EntitySnapshot {
        EntitySnapshot {
            kind: EntityKind::Player,
            username: Some(username.into()),
            uuid: Some(format!("uuid-{id}")),
            position: Some(Vec3::new(3.0, 0.0, 0.0)),
            ..EntitySnapshot::new(id, "player")
        }
    }

    fn equipment(items: [Option<Item>; 6]) -> Option<[Option<Item>; 6]> {
        Some(items)
    }

    fn node(entities: &Entities, id: NodeId) -> &SceneNode {
        entities.graph().get(id).unwrap()
    }

    fn root_of(entities: &Entities, id: i32) -> NodeId {
        entities.entity(EntityId(id)).unwrap().root
    }

    #[test]
    fn test_mob_created_with_debug_box() {
        let mut entities = manager(TableSchema::default());
        entities.update(zombie(1), MeshOverrides::default());

        let entity = entities.entity(EntityId(1)).unwrap();
        assert_eq!(node(&entities, entity.root).transform.position, Vec3::new(1.0, 64.0, 2.0));
        assert_eq!(node(&entities, entity.mesh).name, "mesh");
        assert!(entities.graph().find_child(entity.mesh, "bone_head").is_some());

        let debug = node(&entities, entity.debug_box.unwrap());
        assert!(!debug.visible);
        match &debug.kind {
            NodeKind::BoxHelper { color, bounds } => {
                assert_eq!(color.to_hex(), 0xFF_00_00);
                assert_relative_eq!(bounds.max.y, 1.8);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(entities.drain_events(), vec![EntityEvent::Added(EntityId(1))]);
        assert_eq!(entities.entities_by_name().get("zombie"), Some(&vec![EntityId(1)]));
    }

    #[test]
    fn test_position_is_tweened_after_creation() {
        let mut entities = manager(TableSchema::default());
        entities.update(zombie(1), MeshOverrides::default());

        let mut moved = zombie(1);
        moved.position = Some(Vec3::new(2.0, 64.0, 2.0));
        entities.update(moved, MeshOverrides::default());
        let root = root_of(&entities, 1);
        assert_relative_eq!(node(&entities, root).transform.position.x, 1.0);

        entities.render_with_delta(0.06);
        assert_relative_eq!(node(&entities, root).transform.position.x, 1.5, epsilon = 1e-3);
        entities.render_with_delta(0.1);
        assert_relative_eq!(node(&entities, root).transform.position.x, 2.0);
    }

    #[test]
    fn test_yaw_takes_shortest_path() {
        assert_relative_eq!(shortest_yaw_delta(0.0, PI / 2.0), PI / 2.0, epsilon = 1e-5);
        assert_relative_eq!(shortest_yaw_delta(0.0, 1.5 * PI), -PI / 2.0, epsilon = 1e-5);
        assert_relative_eq!(shortest_yaw_delta(0.2, -0.2), -0.4, epsilon = 1e-5);

        let mut entities = manager(TableSchema::default());
        let mut turned = zombie(1);
        turned.yaw = 1.0;
        entities.update(turned, MeshOverrides::default());
        assert_relative_eq!(node(&entities, root_of(&entities, 1)).transform.rotation.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_delete_is_idempotent_and_releases_textures() {
        let mut entities = manager(TableSchema::default());
        let baseline = entities.textures().live_count();
        entities.update(zombie(1), MeshOverrides::default());
        assert!(entities.textures().live_count() > baseline);

        entities.update(zombie(1).as_deleted(), MeshOverrides::default());
        assert!(!entities.remove(EntityId(1)));
        entities.update(zombie(1).as_deleted(), MeshOverrides::default());

        assert!(entities.is_empty());
        assert!(entities.graph().is_empty());
        assert_eq!(entities.textures().live_count(), baseline);
        assert_eq!(
            entities.drain_events(),
            vec![EntityEvent::Added(EntityId(1)), EntityEvent::Removed(EntityId(1))]
        );
    }

    #[test]
    fn test_fallback_box_for_attackable_entities() {
        let schema = TableSchema {
            attackable: vec!["mystery".to_string(), "broken".to_string()],
            ..TableSchema::default()
        };
        let mut entities = manager(schema);
        for id in 1..=6 {
            entities.update(EntitySnapshot::new(id, "mystery"), MeshOverrides::default());
        }
        let mesh = entities.entity(EntityId(1)).unwrap().mesh;
        match &node(&entities, mesh).kind {
            NodeKind::Mesh { geometry: Geometry::Box { height, offset, .. }, materials } => {
                assert_relative_eq!(*height, 1.8);
                assert_relative_eq!(offset.y, 0.9);
                assert_eq!(materials[0].color.to_hex(), FALLBACK_COLOR);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        let tagged = (1..=6)
            .filter(|&id| {
                let mesh = entities.entity(EntityId(id)).unwrap().mesh;
                entities.graph().find_child(mesh, NAME_TAG_NODE).is_some()
            })
            .count();
        assert_eq!(tagged, 5);

        // a failing provider model still gets the fallback
        entities.update(EntitySnapshot::new(7, "broken"), MeshOverrides::default());
        assert!(entities.entity(EntityId(7)).is_some());

        entities.drain_events();
        entities.update(EntitySnapshot::new(8, "ghost"), MeshOverrides::default());
        assert!(entities.entity(EntityId(8)).is_none());
        assert!(entities.drain_events().is_empty());
    }

    #[test]
    fn test_pascal_case_names_are_snake_cased() {
        assert_eq!(entity_model_name("ArmorStand"), "armor_stand");
        assert_eq!(entity_model_name("zombie"), "zombie");

        let mut entities = manager(TableSchema::default());
        entities.update(EntitySnapshot::new(1, "ArmorStand"), MeshOverrides::default());
        let mesh = entities.entity(EntityId(1)).unwrap().mesh;
        assert!(entities.graph().find_child(mesh, "bone_baseplate").is_some());
    }

    #[test]
    fn test_item_like_entities() {
        let mut entities = manager(TableSchema::default());

        let mut dropped = EntitySnapshot::new(1, "item");
        dropped.kind = EntityKind::Object;
        dropped.metadata = vec![Some(MetadataValue::Int(0)), None, Some(MetadataValue::Item(Item::named("diamond")))];
        entities.update(dropped, MeshOverrides::default());
        let mesh = entities.entity(EntityId(1)).unwrap().mesh;
        let item = node(&entities, mesh);
        assert_relative_eq!(item.transform.scale.x, 0.5);
        assert_relative_eq!(item.transform.position.y, 0.2);
        assert_eq!(item.spin_rate, Some(ITEM_SPIN_RATE));

        entities.update(EntitySnapshot::new(2, "tnt"), MeshOverrides::default());
        let tnt = node(&entities, entities.entity(EntityId(2)).unwrap().mesh);
        assert_relative_eq!(tnt.transform.scale.x, 2.0);
        assert_relative_eq!(tnt.transform.position.y, 0.5);
        assert_eq!(tnt.spin_rate, None);

        let mut snowball = EntitySnapshot::new(3, "snowball");
        snowball.kind = EntityKind::Projectile;
        entities.update(snowball, MeshOverrides::default());
        let ball = node(&entities, entities.entity(EntityId(3)).unwrap().mesh);
        assert_relative_eq!(ball.transform.position.y, 0.1);

        let mut falling = EntitySnapshot::new(4, "falling_block");
        falling.object_data = Some(12);
        entities.update(falling.clone(), MeshOverrides::default());
        assert!(entities.entity(EntityId(4)).is_some());
        falling.id = EntityId(5);
        falling.object_data = None;
        entities.update(falling, MeshOverrides::default());
        assert!(entities.entity(EntityId(5)).is_none());

        let before = node(&entities, mesh).transform.rotation.y;
        entities.render_with_delta(0.5);
        assert_relative_eq!(node(&entities, mesh).transform.rotation.y, before + 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_player_gets_rig_name_tag_and_default_skin() {
        let mut entities = manager(TableSchema::default());
        entities.update(player(1, "Steve"), MeshOverrides::default());

        let entity = entities.entity(EntityId(1)).unwrap();
        let rig = entity.rig.as_ref().unwrap();
        assert_eq!(entity.mesh, rig.bones.wrapper);
        let tag = entities.graph().find_child(rig.bones.wrapper, NAME_TAG_NODE).unwrap();
        assert_relative_eq!(node(&entities, tag).transform.position.y, 35.0);

        let skin = entities.textures().get(rig.skin_texture().unwrap()).unwrap();
        assert_eq!(skin.source, TextureSource::Url(STEVE_SKIN_URL.to_string()));
        assert!(entities.drain_skin_requests().is_empty());
        assert_eq!(
            entities.drain_events(),
            vec![EntityEvent::Added(EntityId(1)), EntityEvent::SkinUpdated(EntityId(1))]
        );
        assert_eq!(entities.get_debug_string(), "1/1 1/1");
    }

    fn slim_skin() -> RgbaImage {
        let mut skin = RgbaImage::from_pixel(64, 64, Pixel([90, 60, 30, 255]));
        for y in 16..20 {
            for x in 50..52 {
                skin.put_pixel(x, y, Pixel([0, 0, 0, 0]));
            }
        }
        skin
    }

    #[test]
    fn test_skin_pipeline_loads_once_nearby() {
        let mut entities = manager(TableSchema::default());
        let viewer = entities.viewer_mut();
        viewer.viewer_chunk_position = Some(Vec3::zeros());
        viewer.view_distance = 8;
        entities.update(player(1, "Alex"), MeshOverrides::default());
        entities.drain_events();

        entities.render_with_delta(0.016);
        let id = EntityId(1);
        assert_eq!(
            entities.drain_skin_requests(),
            vec![SkinRequest::SkinUrl { entity: id, username: "Alex".into() }]
        );

        entities.complete_skin_url(id, Some("http://skins/alex.png".into()));
        assert_eq!(
            entities.drain_skin_requests(),
            vec![SkinRequest::SkinImage { entity: id, url: "http://skins/alex.png".into(), render_ears: false }]
        );

        entities.apply_skin_image(id, &slim_skin());
        assert_eq!(entities.get_player_rig(id).unwrap().model_type, SkinModel::Slim);
        assert_eq!(entities.drain_events(), vec![EntityEvent::SkinUpdated(id)]);
        assert_eq!(
            entities.drain_skin_requests(),
            vec![SkinRequest::CapeUrl { entity: id, username: "Alex".into() }]
        );

        entities.complete_cape_url(id, Some("http://capes/alex.png".into()));
        assert_eq!(
            entities.drain_skin_requests(),
            vec![SkinRequest::CapeImage { entity: id, url: "http://capes/alex.png".into() }]
        );
        entities.apply_cape_image(id, &RgbaImage::new(22, 17)).unwrap();
        let rig = entities.get_player_rig(id).unwrap();
        assert_eq!(rig.back_equipment, Some(BackEquipment::Cape));
        assert!(node(&entities, rig.bones.cape).visible);

        entities.render_with_delta(0.016);
        assert!(entities.drain_skin_requests().is_empty());
        assert!(matches!(
            entities.apply_cape_image(id, &RgbaImage::new(10, 10)),
            Err(EntityError::TextureSize { .. })
        ));
    }

    #[test]
    fn test_far_players_do_not_load_skins() {
        let mut entities = manager(TableSchema::default());
        let viewer = entities.viewer_mut();
        viewer.viewer_chunk_position = Some(Vec3::zeros());
        viewer.view_distance = 2;
        let mut far = player(1, "Alex");
        far.position = Some(Vec3::new(40.0, 0.0, 0.0));
        entities.update(far, MeshOverrides::default());
        entities.viewer_mut().mark_chunk_finished(Vec3::new(40.0, 0.0, 0.0));

        entities.render_with_delta(0.016);
        assert!(node(&entities, root_of(&entities, 1)).visible);
        assert!(entities.drain_skin_requests().is_empty());
    }

    #[test]
    fn test_stale_skin_work_is_dropped() {
        let mut entities = manager(TableSchema::default());
        entities.update(player(1, "Alex"), MeshOverrides::default());
        let baseline = entities.textures().live_count();
        let id = EntityId(1);
        entities.update_player_skin(id, Some("Alex"), None, SkinSource::Lookup, None);
        assert_eq!(entities.drain_skin_requests().len(), 1);

        entities.remove(id);
        entities.drain_events();
        entities.complete_skin_url(id, Some("http://skins/alex.png".into()));
        entities.apply_skin_image(id, &slim_skin());
        entities.complete_cape_url(id, Some("http://capes/alex.png".into()));
        entities.apply_cape_image(id, &RgbaImage::new(64, 32)).unwrap();

        assert!(entities.drain_skin_requests().is_empty());
        assert!(entities.drain_events().is_empty());
        assert!(entities.textures().live_count() < baseline);
    }

    #[test]
    fn test_uuid_cache_reuses_urls() {
        let mut entities = manager(TableSchema::default());
        entities.update(player(1, "Alex"), MeshOverrides::default());
        let id = EntityId(1);
        entities.update_player_skin(
            id,
            Some("Alex"),
            Some("uuid-1"),
            SkinSource::Url("http://a/skin.png".into()),
            Some(SkinSource::Url("http://a/cape.png".into())),
        );
        entities.drain_skin_requests();

        entities.update_player_skin(id, Some("Alex"), Some("uuid-1"), SkinSource::Lookup, None);
        assert_eq!(
            entities.drain_skin_requests(),
            vec![SkinRequest::SkinImage { entity: id, url: "http://a/skin.png".into(), render_ears: false }]
        );
        entities.apply_skin_image(id, &slim_skin());
        assert_eq!(
            entities.drain_skin_requests(),
            vec![SkinRequest::CapeImage { entity: id, url: "http://a/cape.png".into() }]
        );
    }

    #[test]
    fn test_lookup_without_username_keeps_cape() {
        let mut entities = manager(TableSchema::default());
        entities.update(player(1, "Alex"), MeshOverrides::default());
        let id = EntityId(1);
        entities.update_player_skin(
            id,
            Some("Alex"),
            None,
            SkinSource::Url("http://s/alex.png".into()),
            Some(SkinSource::Url("http://c/alex.png".into())),
        );
        entities.apply_skin_image(id, &slim_skin());
        entities.apply_cape_image(id, &RgbaImage::new(64, 32)).unwrap();
        entities.drain_skin_requests();
        let cape = entities.get_player_rig(id).unwrap().cape_texture();
        assert!(cape.is_some());

        entities.update_player_skin(id, None, None, SkinSource::Lookup, None);
        let rig = entities.get_player_rig(id).unwrap();
        assert_eq!(rig.cape_texture(), cape);
        assert!(node(&entities, rig.bones.cape).visible);
        assert!(entities.drain_skin_requests().is_empty());
    }

    #[test]
    fn test_deadmau5_always_gets_ears() {
        let mut entities = manager(TableSchema::default());
        entities.update(player(1, "deadmau5"), MeshOverrides::default());
        let id = EntityId(1);
        entities.update_player_skin(id, Some("deadmau5"), None, SkinSource::Url("http://s/d.png".into()), None);
        assert_eq!(
            entities.drain_skin_requests(),
            vec![SkinRequest::SkinImage { entity: id, url: "http://s/d.png".into(), render_ears: true }]
        );

        let mut skin = slim_skin();
        skin.put_pixel(30, 3, Pixel([200, 0, 0, 255]));
        entities.apply_skin_image(id, &skin);
        let rig = entities.get_player_rig(id).unwrap();
        assert!(rig.ears_texture().is_some());
        assert!(node(&entities, rig.bones.ears).visible);
    }

    #[test]
    fn test_equipment_attaches_items_and_armor() {
        let mut entities = manager(TableSchema::default());
        let mut armed = zombie(1);
        armed.equipment = equipment([
            Some(Item::named("iron_sword")),
            None,
            None,
            None,
            None,
            Some(Item::named("gold_helmet")),
        ]);
        entities.update(armed.clone(), MeshOverrides::default());

        let root = root_of(&entities, 1);
        let graph = entities.graph();
        let bone = graph.find_descendant(root, "bone_leftitem").unwrap();
        assert!(graph.find_child(bone, "custom_item_left").is_some());
        assert!(graph.find_child(root, "geometry_armor_head").is_some());

        armed.equipment = equipment([None, None, None, None, None, None]);
        entities.update(armed, MeshOverrides::default());
        let graph = entities.graph();
        assert!(graph.descendants_named(root, "custom_item_left").is_empty());
        assert!(graph.find_child(root, "geometry_armor_head").is_none());
    }

    #[test]
    fn test_elytra_replaces_cape() {
        let mut entities = manager(TableSchema::default());
        let mut flyer = player(1, "Alex");
        flyer.equipment = equipment([None, None, None, None, Some(Item::named("elytra")), None]);
        entities.update(flyer.clone(), MeshOverrides::default());

        let rig = entities.get_player_rig(EntityId(1)).unwrap();
        assert_eq!(rig.back_equipment, Some(BackEquipment::Elytra));
        assert!(node(&entities, rig.bones.elytra).visible);
        let cape = entities.textures().get(rig.cape_texture().unwrap()).unwrap();
        assert_eq!(cape.source, TextureSource::Url(ELYTRA_TEXTURE.to_string()));

        flyer.equipment = equipment([None, None, None, None, None, None]);
        entities.update(flyer, MeshOverrides::default());
        let rig = entities.get_player_rig(EntityId(1)).unwrap();
        assert_eq!(rig.back_equipment, Some(BackEquipment::Cape));
        assert!(rig.cape_texture().is_none());
        assert!(!node(&entities, rig.bones.cape).visible);
    }

    #[test]
    fn test_cape_arriving_after_elytra_textures_the_wings() {
        let mut entities = manager(TableSchema::default());
        let mut flyer = player(1, "Alex");
        flyer.equipment = equipment([None, None, None, None, Some(Item::named("elytra")), None]);
        entities.update(flyer.clone(), MeshOverrides::default());

        let id = EntityId(1);
        entities.apply_cape_image(id, &RgbaImage::new(64, 32)).unwrap();
        entities.update(flyer, MeshOverrides::default());

        let rig = entities.get_player_rig(id).unwrap();
        assert_eq!(rig.back_equipment, Some(BackEquipment::Elytra));
        let cape = rig.cape_texture().unwrap();
        let source = &entities.textures().get(cape).unwrap().source;
        assert!(matches!(source, TextureSource::Image(_)));
        let wing = entities.graph().child_at(rig.bones.elytra, 0).unwrap();
        assert_eq!(node(&entities, wing).materials()[0].map, Some(cape));
    }

    #[test]
    fn test_invisible_entities_keep_name_tags() {
        let schema = TableSchema::default().with("zombie", &["shared_flags", "custom_name", "custom_name_visible"]);
        let mut entities = manager(schema);
        let mut ghost = zombie(1);
        ghost.metadata = vec![
            Some(MetadataValue::Int(0x20)),
            Some(MetadataValue::String("Grumpy".into())),
            Some(MetadataValue::Bool(true)),
        ];
        entities.update(ghost, MeshOverrides::default());

        let mesh = entities.entity(EntityId(1)).unwrap().mesh;
        let graph = entities.graph();
        for &child in graph.children(mesh) {
            let child = graph.get(child).unwrap();
            assert_eq!(child.visible, child.name == NAME_TAG_NODE, "{}", child.name);
        }
        let tag = graph.find_child(mesh, NAME_TAG_NODE).unwrap();
        assert!(matches!(graph.get(tag).unwrap().kind, NodeKind::Sprite { .. }));
        assert_relative_eq!(graph.get(tag).unwrap().transform.position.y, 1.8 + 0.6);
    }

    #[test]
    fn test_spectated_entity_is_hidden() {
        let mut entities = manager(TableSchema::default());
        let viewer = entities.viewer_mut();
        viewer.spectator = true;
        viewer.spectating_entity = Some(EntityId(1));
        entities.update(zombie(1), MeshOverrides::default());

        let mesh = entities.entity(EntityId(1)).unwrap().mesh;
        let head = entities.graph().find_child(mesh, "bone_head").unwrap();
        assert!(!node(&entities, head).visible);
    }

    #[test]
    fn test_baby_scale() {
        let schema = TableSchema::default().with("zombie", &["shared_flags", "baby"]);
        let mut entities = manager(schema);
        let mut baby = zombie(1);
        baby.metadata = vec![None, Some(MetadataValue::Bool(true))];
        entities.update(baby.clone(), MeshOverrides::default());
        assert_relative_eq!(node(&entities, root_of(&entities, 1)).transform.scale.x, 0.5);

        baby.metadata = vec![None, Some(MetadataValue::Bool(false))];
        entities.update(baby, MeshOverrides::default());
        assert_relative_eq!(node(&entities, root_of(&entities, 1)).transform.scale.x, 1.0);
    }

    #[test]
    fn test_text_display_tag() {
        let schema = TableSchema::default().with(
            "text_display",
            &[
                "shared_flags",
                "text",
                "billboard_render_constraints",
                "style_flags",
                "background_color",
                "text_opacity",
                "translation",
            ],
        );
        let mut entities = manager(schema);
        let mut display = EntitySnapshot::new(1, "text_display");
        display.height = 0.0;
        display.metadata = vec![
            None,
            Some(MetadataValue::Nbt(json!({ "type": "string", "value": "Hello" }))),
            Some(MetadataValue::Int(0)),
            Some(MetadataValue::Int(0)),
            Some(MetadataValue::Int(-16_777_216)),
            Some(MetadataValue::Int(-1)),
            Some(MetadataValue::Vector { x: 0.0, y: 1.0, z: 0.0 }),
        ];
        entities.update(display, MeshOverrides::default());

        let mesh = entities.entity(EntityId(1)).unwrap().mesh;
        let tag = node(&entities, entities.graph().find_child(mesh, NAME_TAG_NODE).unwrap());
        assert!(matches!(tag.kind, NodeKind::Mesh { .. }));
        assert_relative_eq!(tag.transform.position.y, 1.3, epsilon = 1e-5);

        let texture = entities.textures().get(tag.materials()[0].map.unwrap()).unwrap();
        match &texture.source {
            TextureSource::NameTag(canvas) => {
                assert_eq!(canvas.background, Rgba::new(0, 0, 0, 1.0));
                assert_relative_eq!(canvas.text_opacity, 1.0);
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_armor_stand_and_item_frame_metadata() {
        let schema = TableSchema::default()
            .with("armor_stand", &["shared_flags", "client_flags"])
            .with("item_frame", &["shared_flags", "item", "rotation"]);
        let mut entities = manager(schema);

        let mut stand = EntitySnapshot::new(1, "armor_stand");
        stand.metadata = vec![None, Some(MetadataValue::Int(0x01))];
        entities.update(stand, MeshOverrides::default());
        assert_relative_eq!(node(&entities, root_of(&entities, 1)).transform.scale.x, 0.5);

        let map = Item {
            item_id: Some(5),
            components: vec![ItemComponent { kind: "map_id".into(), data: json!(7) }],
            ..Item::named("filled_map")
        };
        let mut frame = EntitySnapshot::new(2, "item_frame");
        frame.metadata = vec![None, Some(MetadataValue::Item(map)), Some(MetadataValue::Int(1))];
        entities.update(frame, MeshOverrides::default());

        let root = root_of(&entities, 2);
        let plane = entities.graph().find_child(root, "map_7").unwrap();
        assert!(!node(&entities, plane).visible);
        entities.update_map(7, "http://maps/7.png");
        assert!(node(&entities, plane).visible);
        assert_eq!(entities.maps().image(7), Some("http://maps/7.png"));
    }

    #[test]
    fn test_map_planes_survive_while_not_rendering() {
        let schema = TableSchema::default().with("item_frame", &["shared_flags", "item", "rotation"]);
        let mut entities = manager(schema);
        let map = Item {
            item_id: Some(5),
            components: vec![ItemComponent { kind: "map_id".into(), data: json!(7) }],
            ..Item::named("filled_map")
        };
        let mut frame = EntitySnapshot::new(1, "item_frame");
        frame.metadata = vec![None, Some(MetadataValue::Item(map)), Some(MetadataValue::Int(0))];
        entities.update(frame, MeshOverrides::default());
        entities.update(zombie(2), MeshOverrides::default());
        let plane = entities.graph().find_child(root_of(&entities, 1), "map_7").unwrap();

        entities.set_rendering(false);
        entities.update_map(7, "http://maps/7a.png");
        assert_eq!(entities.maps().planes(7), &[plane]);
        assert!(node(&entities, plane).visible);

        entities.remove(EntityId(2));
        assert_eq!(entities.maps().planes(7), &[plane]);

        entities.set_rendering(true);
        entities.update_map(7, "http://maps/7b.png");
        assert!(node(&entities, plane).visible);
        let texture = node(&entities, plane).materials()[0].map.unwrap();
        assert_eq!(
            entities.textures().get(texture).unwrap().source,
            TextureSource::Url("http://maps/7b.png".into())
        );

        entities.remove(EntityId(1));
        assert!(entities.maps().planes(7).is_empty());
    }

    #[test]
    fn test_head_rotation_override() {
        let mut entities = manager(TableSchema::default());
        let mut looking = player(1, "Alex");
        looking.yaw = 1.0;
        let overrides = MeshOverrides {
            rotation: Some(RotationOverride { head: Some(HeadRotation { x: 0.3, y: 1.2 }) }),
            ..MeshOverrides::default()
        };
        entities.update(looking, overrides);

        let head = entities.get_player_rig(EntityId(1)).unwrap().bones.head;
        let rotation = node(&entities, head).transform.rotation;
        assert_relative_eq!(rotation.y, -0.2, epsilon = 1e-5);
        assert_relative_eq!(rotation.x, -0.3);
    }

    #[test]
    fn test_name_tag_visibility_rules() {
        let team = |name: &str, visibility| Team {
            team: name.to_string(),
            name_tag_visibility: visibility,
        };
        let red_own = team("red", NameTagVisibility::HideForOwnTeam);
        let red_other = team("red", NameTagVisibility::HideForOtherTeams);
        let red = team("red", NameTagVisibility::Always);
        let blue = team("blue", NameTagVisibility::Always);

        assert!(name_tag_visible(None, Some(&red)));
        assert!(!name_tag_visible(Some(&team("red", NameTagVisibility::Never)), None));
        assert!(!name_tag_visible(Some(&red_own), Some(&red)));
        assert!(name_tag_visible(Some(&red_own), Some(&blue)));
        assert!(name_tag_visible(Some(&red_other), Some(&red)));
        assert!(name_tag_visible(Some(&red_other), None));
        assert!(!name_tag_visible(Some(&red_other), Some(&blue)));

        let mut entities = manager(TableSchema::default());
        entities.viewer_mut().team = Some(red);
        let mut teammate = player(1, "Alex");
        teammate.team = Some(red_own);
        entities.update(teammate, MeshOverrides::default());
        let wrapper = entities.entity(EntityId(1)).unwrap().mesh;
        let tag = entities.graph().find_child(wrapper, NAME_TAG_NODE).unwrap();
        assert!(!node(&entities, tag).visible);
    }

    #[test]
    fn test_rendering_toggle_detaches_models() {
        let mut entities = manager(TableSchema::default());
        entities.update(zombie(1), MeshOverrides::default());
        entities.set_rendering(false);
        entities.update(zombie(2), MeshOverrides::default());
        assert!(!entities.graph().is_attached(root_of(&entities, 1)));
        assert!(!entities.graph().is_attached(root_of(&entities, 2)));

        // the config wins on the next frame
        entities.render_with_delta(0.016);
        assert!(entities.is_rendering());
        assert!(entities.graph().is_attached(root_of(&entities, 1)));
        assert!(entities.graph().is_attached(root_of(&entities, 2)));

        entities.config_mut().render_entities = false;
        entities.render_with_delta(0.016);
        assert!(!entities.graph().is_attached(root_of(&entities, 1)));
    }

    #[test]
    fn test_distance_and_chunk_visibility() {
        let mut entities = manager(TableSchema::default());
        entities.viewer_mut().viewer_chunk_position = Some(Vec3::new(1.0, 64.0, 2.0));
        entities.update(zombie(1), MeshOverrides::default());
        let mut far = zombie(2);
        far.position = Some(Vec3::new(100.0, 64.0, 2.0));
        entities.update(far, MeshOverrides::default());

        entities.render_with_delta(0.016);
        assert_eq!(entities.entities_rendering_count(), 1);
        assert_eq!(entities.get_debug_string(), "1/2 0/0");

        entities.viewer_mut().mark_chunk_finished(Vec3::new(100.0, 64.0, 2.0));
        entities.render_with_delta(0.016);
        assert_eq!(entities.entities_rendering_count(), 2);
    }

    #[test]
    fn test_debug_mode_applies_to_new_entities() {
        let mut entities = manager(TableSchema::default());
        entities.update(zombie(1), MeshOverrides::default());
        entities.set_debug_mode(DebugMode::Basic);
        entities.update(zombie(2), MeshOverrides::default());
        for id in [1, 2] {
            let debug = entities.entity(EntityId(id)).unwrap().debug_box.unwrap();
            assert!(node(&entities, debug).visible);
        }
        entities.set_debug_mode(DebugMode::Advanced);
        let debug = entities.entity(EntityId(1)).unwrap().debug_box.unwrap();
        assert!(!node(&entities, debug).visible);
    }

    #[test]
    fn test_local_player_follows_camera() {
        let mut entities = manager(TableSchema::default());
        let mut me = player(1, "Me");
        me.position = Some(Vec3::new(0.0, 64.0, 0.0));
        me.yaw = 0.5;
        entities.handle_player_entity(me.clone());
        entities.handle_player_entity(me);

        let proxy = entities.player_entity().unwrap();
        assert_eq!(node(&entities, proxy.root).name, "player_entity");
        assert_relative_eq!(node(&entities, proxy.root).transform.rotation.y, 0.5);
        assert!(entities.get_player_rig(EntityId(1)).is_some());
        assert!(entities.is_empty());

        entities.render_with_delta(0.016);
        let root = entities.player_entity().unwrap().root;
        assert!(!node(&entities, root).visible);

        let viewer = entities.viewer_mut();
        viewer.third_person = true;
        viewer.camera_position = Vec3::new(0.0, 65.62, 0.0);
        viewer.eye_height = 1.62;
        viewer.camera_yaw = 0.3;
        viewer.camera_pitch = 0.2;
        entities.render_with_delta(0.016);

        let root = node(&entities, root);
        assert!(root.visible);
        assert_relative_eq!(root.transform.position.y, 64.0, epsilon = 1e-4);
        assert_relative_eq!(root.transform.rotation.y, 0.3);
        let head = entities.get_player_rig(EntityId(1)).unwrap().bones.head;
        assert_relative_eq!(node(&entities, head).transform.rotation.x, -0.2);
    }

    #[test]
    fn test_play_animation_targets() {
        let mut entities = manager(TableSchema::default());
        entities.update(player(2, "Alex"), MeshOverrides::default());
        entities.handle_player_entity(player(1, "Me"));

        entities.play_animation(AnimationTarget::Entity(EntityId(2)), PlayerAnimation::OneSwing);
        assert!(entities.get_player_rig(EntityId(2)).unwrap().animation.is_swinging());

        // unknown ids fall back to the local player
        entities.play_animation(AnimationTarget::Entity(EntityId(99)), PlayerAnimation::Running);
        let local = entities.get_player_rig(EntityId(1)).unwrap();
        assert!(local.animation.pending_switch().is_some_and(|s| s.running));

        entities.play_animation(AnimationTarget::LocalPlayer, PlayerAnimation::OneSwing);
        assert!(entities.get_player_rig(EntityId(1)).unwrap().animation.is_swinging());
    }

    #[test]
    fn test_debug_swing_arm_picks_a_player() {
        let mut entities = manager(TableSchema::default());
        entities.update(zombie(1), MeshOverrides::default());
        entities.update(player(2, "Alex"), MeshOverrides::default());
        entities.debug_swing_arm();
        assert!(entities.get_player_rig(EntityId(2)).unwrap().animation.is_swinging());
    }

    #[test]
    fn test_damage_flash_fades_back() {
        let mut entities = manager(TableSchema::default());
        entities.update(zombie(1), MeshOverrides::default());
        let mesh = entities.entity(EntityId(1)).unwrap().mesh;
        let head = entities.graph().find_child(mesh, "bone_head").unwrap();

        entities.handle_damage_event(EntityId(1), 2.0);
        assert_eq!(node(&entities, head).materials()[0].color, Color::RED);

        entities.render_with_delta(0.25);
        entities.handle_damage_event(EntityId(1), 2.0);
        entities.render_with_delta(0.5);
        assert_eq!(node(&entities, head).materials()[0].color, Color::WHITE);
    }

    #[test]
    fn test_raycast_finds_entity_in_view() {
        let mut entities = manager(TableSchema::default());
        let mut target = zombie(1);
        target.position = Some(Vec3::zeros());
        entities.update(target, MeshOverrides::default());
        entities.viewer_mut().camera_position = Vec3::new(0.0, 1.0, 5.0);

        let hit = entities.raycast_scene_debug().unwrap();
        assert_eq!(hit.entity, EntityId(1));
        assert_relative_eq!(hit.distance, 4.7, epsilon = 1e-4);

        entities.viewer_mut().camera_yaw = PI;
        assert!(entities.raycast_scene_debug().is_none());
    }

    #[test]
    fn test_reload_and_clear() {
        let mut entities = manager(TableSchema::default());
        entities.update(zombie(1), MeshOverrides::default());
        entities.handle_player_entity(player(5, "Me"));
        let before = root_of(&entities, 1);
        entities.drain_events();

        entities.on_resources_event(ResourcesEvent::TexturesUpdated);
        assert_ne!(root_of(&entities, 1), before);
        assert_eq!(
            entities.drain_events(),
            vec![EntityEvent::Removed(EntityId(1)), EntityEvent::Added(EntityId(1))]
        );

        let atlases = entities.textures().live_count();
        entities.clear();
        assert!(entities.is_empty());
        assert!(entities.player_entity().is_none());
        assert!(entities.graph().is_empty());
        assert!(entities.textures().live_count() < atlases);
    }
}
