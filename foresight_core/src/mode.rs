//! Spatial mode of a predicted entity (2D or 3D physics)
use bevy_reflect::Reflect;
use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

/// The physics space an entity is simulated in.
///
/// An entity is simulated either in 2D or in 3D, never both. Each mode gets its own isolated
/// shadow world.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect, Serialize, Deserialize,
)]
pub enum SpatialMode {
    Physics2d,
    Physics3d,
}

impl SpatialMode {
    /// All modes, in the order in which their shadow worlds are stepped
    pub const ALL: [SpatialMode; 2] = [SpatialMode::Physics2d, SpatialMode::Physics3d];

    pub(crate) const fn index(self) -> usize {
        match self {
            SpatialMode::Physics2d => 0,
            SpatialMode::Physics3d => 1,
        }
    }

    /// Returns true if the z axis is locked for this mode
    pub const fn is_planar(self) -> bool {
        matches!(self, SpatialMode::Physics2d)
    }
}

impl Display for SpatialMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            SpatialMode::Physics2d => write!(f, "2D"),
            SpatialMode::Physics3d => write!(f, "3D"),
        }
    }
}

/// Array indexed by [`SpatialMode`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerMode<T>([T; 2]);

impl<T> PerMode<T> {
    pub fn new(physics_2d: T, physics_3d: T) -> Self {
        Self([physics_2d, physics_3d])
    }

    pub fn get(&self, mode: SpatialMode) -> &T {
        &self.0[mode.index()]
    }

    pub fn get_mut(&mut self, mode: SpatialMode) -> &mut T {
        &mut self.0[mode.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpatialMode, &T)> {
        SpatialMode::ALL.into_iter().zip(self.0.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SpatialMode, &mut T)> {
        SpatialMode::ALL.into_iter().zip(self.0.iter_mut())
    }
}
