//! Plain-data views of a body's physics state.
//!
//! Both spatial modes are expressed in 3D: planar bodies live in the z = 0 plane and only rotate around z.
use bevy_math::{Quat, Vec3};
use bevy_reflect::Reflect;
use serde::{Deserialize, Serialize};

/// Pose of a shadow entity captured at one simulation step
#[derive(Debug, Clone, Copy, Default, PartialEq, Reflect, Serialize, Deserialize)]
pub struct Snapshot {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Snapshot {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }
}

impl From<BodyState> for Snapshot {
    fn from(state: BodyState) -> Self {
        Self {
            position: state.position,
            rotation: state.rotation,
        }
    }
}

/// Everything that anchoring copies from an authoritative entity to its shadow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Vec3,
    pub rotation: Quat,
    /// Only present if the entity is a rigid body
    pub velocity: Option<Velocity>,
}

impl BodyState {
    /// A pose without velocity
    pub fn at(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            velocity: None,
        }
    }

    pub fn with_velocity(mut self, velocity: Velocity) -> Self {
        self.velocity = Some(velocity);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Reflect, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec3,
    /// Scaled axis. Planar bodies only use the z component.
    pub angular: Vec3,
}
