//! Item stacks carried in equipment slots and metadata

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A data component attached to an item (1.20.5+ item format)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemComponent {
    /// Component type, e.g. `map_id`
    #[serde(rename = "type")]
    pub kind: String,
    /// Component payload
    pub data: Value,
}

/// An item stack
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Item {
    /// Registry name without namespace, e.g. `leather_helmet`
    pub name: String,
    /// Numeric item id
    pub item_id: Option<i32>,
    /// Numeric block id for block items
    pub block_id: Option<i32>,
    /// Stack size
    pub item_count: u32,
    /// Simplified NBT compound
    pub nbt: Option<Value>,
    /// Data components
    pub components: Vec<ItemComponent>,
    /// Block state id (falling blocks)
    pub block_state: Option<i32>,
}

impl Item {
    /// Item with only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            item_count: 1,
            ..Default::default()
        }
    }

    /// Item standing for a block state
    pub fn from_block_state(state: i32) -> Self {
        Self {
            block_state: Some(state),
            ..Default::default()
        }
    }

    /// Whether the stack refers to a real item (`item_id`, else `block_id`, is non zero)
    pub fn is_present(&self) -> bool {
        self.item_id.or(self.block_id).unwrap_or(0) != 0
    }

    /// Component payload of the given type
    pub fn component(&self, kind: &str) -> Option<&Value> {
        self.components.iter().find(|c| c.kind == kind).map(|c| &c.data)
    }

    /// Material prefix of the registry name (`diamond` for `diamond_chestplate`)
    pub fn material(&self) -> &str {
        self.name.split('_').next().unwrap_or_default()
    }

    /// Map id from legacy NBT or the `map_id` component
    #[allow(clippy::cast_possible_truncation)]
    pub fn map_id(&self) -> Option<i32> {
        let from_nbt = self.nbt.as_ref().and_then(|n| n.get("map")).and_then(Value::as_i64);
        let id = from_nbt.or_else(|| self.component("map_id").and_then(Value::as_i64))?;
        // zero means "no map", same as a missing id
        (id != 0).then_some(id as i32)
    }
}

/// Where an item model is displayed, selects its scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayContext {
    /// Dropped on the ground
    Ground,
    /// Held by an entity
    Thirdperson,
    /// Inside an item frame
    Fixed,
}

impl DisplayContext {
    /// Uniform model scale for the context
    pub fn scale(self) -> f32 {
        match self {
            DisplayContext::Ground => 0.5,
            DisplayContext::Thirdperson => 6.0,
            DisplayContext::Fixed => 1.0,
        }
    }
}
