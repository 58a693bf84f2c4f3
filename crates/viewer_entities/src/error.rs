//! Error types for the entity renderer

use crate::data::EntityId;
use thiserror::Error;

/// Errors raised while building or updating scene entities
#[derive(Error, Debug)]
pub enum EntityError {
    /// The resource provider failed to build a model
    #[error("Model build failed for '{name}': {reason}")]
    ModelBuild {
        /// Entity or model name
        name: String,
        /// Provider supplied reason
        reason: String,
    },

    /// A label or SNBT string could not be parsed
    #[error("Label parse error at offset {offset}: {message}")]
    Label {
        /// Byte offset of the failure
        offset: usize,
        /// What went wrong
        message: String,
    },

    /// Image decoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Base64 payload was malformed
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// JSON payload was malformed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A data URI did not have the expected shape
    #[error("Invalid data URI: {0}")]
    DataUri(String),

    /// A skin or cape image has dimensions no known layout uses
    #[error("Unsupported texture size {width}x{height}")]
    TextureSize {
        /// Image width in pixels
        width: u32,
        /// Image height in pixels
        height: u32,
    },

    /// The referenced entity is not in the scene
    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityId),
}
