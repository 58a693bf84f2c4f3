//! Player models: rig, limb animation and skin handling

pub mod animation;
pub mod rig;
pub mod skin;

pub use animation::{MovementState, PlayerAnimation, WalkingGeneralSwing};
pub use rig::{BackEquipment, PlayerRig, RigBones};
pub use skin::{SkinModel, SkinRequest, SkinSource, ELYTRA_TEXTURE, STEVE_SKIN_URL};
