//! Contains a set of shared types

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod contact;
pub mod mode;
pub mod shadow;
pub mod state;
pub mod timeline;

pub mod prelude {
    pub use crate::contact::{ContactManifold, ContactPoint};
    pub use crate::mode::{PerMode, SpatialMode};
    pub use crate::shadow::{Dormant, Frozen, Shadow, SpawnSlotId};
    pub use crate::state::{BodyState, Snapshot, Velocity};
    pub use crate::timeline::{CollisionRecord, CollisionTarget, Timeline};
}
