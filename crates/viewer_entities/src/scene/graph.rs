//! Retained scene graph
//!
//! Nodes live in a slotmap arena and reference each other by [`NodeId`].
//! The graph owns one permanent root; everything the entity renderer shows
//! hangs below it. Destroying a node removes its whole subtree and hands
//! back the textures the subtree owned so the caller can dispose them.

use super::bounds::Aabb;
use super::material::{Color, Geometry, Material};
use super::texture::TextureId;
use crate::foundation::math::{Transform, Vec3};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a node in a [`SceneGraph`]
    pub struct NodeId;
}

/// What a node draws
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Pure transform node
    Group,
    /// Geometry with one material per face group
    Mesh {
        /// Shape
        geometry: Geometry,
        /// Materials (a box uses six)
        materials: Vec<Material>,
    },
    /// Camera facing quad
    Sprite {
        /// Sprite material
        material: Material,
    },
    /// Wireframe bounds
    BoxHelper {
        /// Line colour
        color: Color,
        /// Local bounds
        bounds: Aabb,
    },
}

/// A node in the scene graph
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Name used for lookups
    pub name: String,
    /// Drawable payload
    pub kind: NodeKind,
    /// Local transform
    pub transform: Transform,
    /// Hidden nodes hide their subtree
    pub visible: bool,
    /// Draw order override
    pub render_order: i32,
    /// Casts shadows
    pub cast_shadow: bool,
    /// Receives shadows
    pub receive_shadow: bool,
    /// Continuous Y rotation in radians per second
    pub spin_rate: Option<f32>,
    /// Textures released together with this node
    pub owned_textures: Vec<TextureId>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    /// Create a detached node
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: Transform::identity(),
            visible: true,
            render_order: 0,
            cast_shadow: false,
            receive_shadow: false,
            spin_rate: None,
            owned_textures: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Create an empty group
    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    /// Create a mesh
    pub fn mesh(name: impl Into<String>, geometry: Geometry, materials: Vec<Material>) -> Self {
        Self::new(name, NodeKind::Mesh { geometry, materials })
    }

    /// Builder style position setter
    pub fn at(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    /// Materials of a mesh or sprite
    pub fn materials(&self) -> Vec<&Material> {
        match &self.kind {
            NodeKind::Mesh { materials, .. } => materials.iter().collect(),
            NodeKind::Sprite { material } => vec![material],
            _ => Vec::new(),
        }
    }

    /// Mutable materials of a mesh or sprite
    pub fn materials_mut(&mut self) -> Vec<&mut Material> {
        match &mut self.kind {
            NodeKind::Mesh { materials, .. } => materials.iter_mut().collect(),
            NodeKind::Sprite { material } => vec![material],
            _ => Vec::new(),
        }
    }

    /// Parent node, if attached
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena of scene nodes with a permanent root
pub struct SceneGraph {
    nodes: SlotMap<NodeId, SceneNode>,
    root: NodeId,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Create a graph containing only the root
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::group("scene"));
        Self { nodes, root }
    }

    /// The root node
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Insert a detached node
    pub fn create(&mut self, node: SceneNode) -> NodeId {
        self.nodes.insert(node)
    }

    /// Insert a node directly below `parent`
    pub fn spawn(&mut self, parent: NodeId, node: SceneNode) -> NodeId {
        let id = self.create(node);
        self.add_child(parent, id);
        id
    }

    /// Attach `child` below `parent`, detaching it from its previous parent.
    ///
    /// Returns false when either node is missing or the move would create a
    /// cycle.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            return false;
        }
        if self.is_ancestor_or_self(child, parent) {
            log::warn!("Refusing to attach {:?} below its own descendant {:?}", child, parent);
            return false;
        }

        self.detach(child);
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
        true
    }

    /// Remove a node from its parent without destroying it
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes.get_mut(id).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.retain(|&c| c != id);
        }
    }

    /// Destroy a node and its subtree, returning the textures they owned
    pub fn destroy(&mut self, id: NodeId) -> Vec<TextureId> {
        if id == self.root || !self.nodes.contains_key(id) {
            return Vec::new();
        }
        self.detach(id);

        let mut textures = Vec::new();
        for node_id in self.traverse(id) {
            if let Some(node) = self.nodes.remove(node_id) {
                textures.extend(node.owned_textures);
            }
        }
        textures
    }

    /// Look up a node
    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Look up a node for modification
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// Whether the node still exists
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes including the root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether only the root is left
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Parent of a node
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// Children of a node (empty for missing nodes)
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Child at `index`
    pub fn child_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).get(index).copied()
    }

    /// First direct child called `name`
    pub fn find_child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.nodes.get(c).is_some_and(|n| n.name == name))
    }

    /// Last direct child called `name`
    pub fn find_last_child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .rev()
            .copied()
            .find(|&c| self.nodes.get(c).is_some_and(|n| n.name == name))
    }

    /// First node called `name` below `id` in depth-first order
    pub fn find_descendant(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.traverse(id)
            .into_iter()
            .skip(1)
            .find(|&c| self.nodes.get(c).is_some_and(|n| n.name == name))
    }

    /// Every node called `name` below `id`
    pub fn descendants_named(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.traverse(id)
            .into_iter()
            .skip(1)
            .filter(|&c| self.nodes.get(c).is_some_and(|n| n.name == name))
            .collect()
    }

    /// `id` and its subtree in depth-first pre-order
    pub fn traverse(&self, id: NodeId) -> Vec<NodeId> {
        self.collect(id, false)
    }

    /// Like [`traverse`](Self::traverse) but skipping hidden subtrees
    pub fn traverse_visible(&self, id: NodeId) -> Vec<NodeId> {
        self.collect(id, true)
    }

    fn collect(&self, id: NodeId, visible_only: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if visible_only && !node.visible {
                continue;
            }
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Position of the node origin in root space
    pub fn world_position(&self, id: NodeId) -> Option<Vec3> {
        let mut position = self.nodes.get(id)?.transform.position;
        let mut current = self.parent(id);
        while let Some(parent_id) = current {
            let parent = self.nodes.get(parent_id)?;
            position = parent.transform.transform_point(position);
            current = parent.parent;
        }
        Some(position)
    }

    /// Whether the node is connected to the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.is_ancestor_or_self(self.root, id)
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }
}
