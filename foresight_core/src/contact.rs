use bevy_math::Vec3;
use bevy_reflect::Reflect;
use smallvec::SmallVec;

/// A single point of contact between two colliders, in world space
#[derive(Debug, Clone, Copy, Default, PartialEq, Reflect)]
pub struct ContactPoint {
    pub point: Vec3,
    /// Unit normal pointing from the first body towards the second body
    pub normal: Vec3,
    pub penetration: f32,
}

/// Contact points of one colliding pair. Our shapes produce at most a couple of points per pair.
pub type ContactManifold = SmallVec<[ContactPoint; 2]>;
