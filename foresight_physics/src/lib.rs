//! # Foresight Physics
//!
//! Isolated simulation spaces ("shadow worlds") in which copies of authoritative entities are stepped
//! ahead of time. Each [`SpatialMode`](foresight_core::prelude::SpatialMode) gets at most one shadow world,
//! stepped by a [`PhysicsBackend`](backend::PhysicsBackend). The default backends run avian2d and avian3d.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod avian_2d;
pub mod avian_3d;
pub mod backend;
pub mod events;
pub mod world;

pub mod prelude {
    pub use crate::avian_2d::Avian2dBackend;
    pub use crate::avian_3d::Avian3dBackend;
    pub use crate::backend::{PhysicsBackend, ShadowPhysicsStep};
    pub use crate::events::{CollisionEvents, ContactEvent, ContactKind};
    pub use crate::world::{ShadowWorld, ShadowWorldError, ShadowWorlds};
}
