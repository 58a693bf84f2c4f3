//! Player limb animation
//!
//! One animation drives every player: walking, running and crouching share
//! the same limb swing with different speeds and amplitudes, plus a one-shot
//! arm swing that can overlap any of them.

use super::rig::RigBones;
use crate::foundation::math::Euler;
use crate::scene::{NodeId, SceneGraph};
use std::f32::consts::PI;

/// Named animation requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAnimation {
    /// Standing still
    Idle,
    /// Walking
    Walking,
    /// Sprinting
    Running,
    /// Single arm swing, plays on top of the current animation
    OneSwing,
    /// Sneaking in place
    Crouch,
    /// Sneaking while moving
    CrouchWalking,
}

/// Movement state the swing animation is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MovementState {
    /// Limbs swing
    pub moving: bool,
    /// Faster, wider swing
    pub running: bool,
    /// Sneaking pose
    pub crouched: bool,
}

impl From<PlayerAnimation> for MovementState {
    fn from(animation: PlayerAnimation) -> Self {
        Self {
            moving: matches!(
                animation,
                PlayerAnimation::Walking | PlayerAnimation::Running | PlayerAnimation::CrouchWalking
            ),
            running: animation == PlayerAnimation::Running,
            crouched: matches!(animation, PlayerAnimation::Crouch | PlayerAnimation::CrouchWalking),
        }
    }
}

/// Walking/running/crouching limb swing with a one-shot arm swing
#[derive(Debug, Clone, Default)]
pub struct WalkingGeneralSwing {
    /// Seconds of animation played since the last phase reset
    pub progress: f32,
    /// Current movement state
    pub state: MovementState,
    /// State to switch to at the next phase boundary
    pending: Option<MovementState>,
    arm_swing_start: Option<f32>,
}

impl WalkingGeneralSwing {
    /// Idle animation
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a single arm swing from the current progress
    pub fn swing_arm(&mut self) {
        self.arm_swing_start = Some(self.progress);
    }

    /// Whether an arm swing is playing
    pub fn is_swinging(&self) -> bool {
        self.arm_swing_start.is_some()
    }

    /// Switch to `state` once the limbs pass their neutral position
    pub fn request_switch(&mut self, state: MovementState) {
        self.pending = Some(state);
    }

    /// Switch requested but not applied yet
    pub fn pending_switch(&self) -> Option<MovementState> {
        self.pending
    }

    fn phase(&self) -> f32 {
        if !self.state.moving {
            0.0
        } else if self.state.running {
            self.progress * 10.0 + PI * 0.5
        } else {
            self.progress * 8.0
        }
    }

    /// Advance by `dt` seconds and pose the bones
    pub fn update(&mut self, graph: &mut SceneGraph, bones: &RigBones, dt: f32) {
        self.progress += dt;
        let mut t = self.phase();

        let wave = if self.state.running { t.cos() } else { t.sin() };
        let reset = self.pending.is_some() && wave < 0.01;
        if reset {
            self.progress = 0.0;
            t = self.phase();
        }

        let mut set = |id: NodeId, f: &dyn Fn(&mut Euler)| {
            if let Some(node) = graph.get_mut(id) {
                f(&mut node.transform.rotation);
            }
        };

        let crouched = self.state.crouched;
        set(bones.body, &|r| r.x = if crouched { 0.5 } else { 0.0 });

        let (left_leg, right_leg) = if self.state.running {
            ((t + PI).cos() * 1.3, t.cos() * 1.3)
        } else {
            (t.sin() * 0.5, (t + PI).sin() * 0.5)
        };
        set(bones.left_leg, &|r| r.x = left_leg);
        set(bones.right_leg, &|r| r.x = right_leg);

        let base_arm_z = PI * 0.02;
        set(bones.left_arm, &|r| r.z = t.cos() * 0.03 + base_arm_z);

        if let Some(start) = self.arm_swing_start {
            let t_hand = (self.progress - start) * 18.0 + PI * 0.5;
            let swing_z = (t + PI).cos() * 0.3 - PI * 0.1;
            let done = t_hand > PI * 1.5;
            set(bones.right_arm, &|r| {
                r.x = t_hand.cos() * 1.5;
                r.z = if done { 0.0 } else { swing_z };
            });
            if done {
                self.arm_swing_start = None;
            }
        } else {
            let (left_arm, right_arm) = if self.state.running {
                ((t + PI).cos() * 1.5, t.cos() * 1.5)
            } else {
                ((t + PI).sin() * 0.5, t.sin() * 0.5)
            };
            set(bones.left_arm, &|r| r.x = left_arm);
            set(bones.right_arm, &|r| {
                r.x = right_arm;
                r.z = (t + PI).cos() * 0.03 - base_arm_z;
            });
        }

        set(bones.head, &|r| {
            r.y = (t / 4.0).sin() * 0.2;
            r.x = (t / 5.0).sin() * 0.1;
        });
        set(bones.cape, &|r| r.x = (t / 1.5).sin() * 0.06 + PI * 0.06);

        if reset {
            if let Some(next) = self.pending.take() {
                self.state = next;
            }
        }
    }
}
