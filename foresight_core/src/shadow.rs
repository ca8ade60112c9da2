//! Components that only exist on shadow entities
use bevy_ecs::component::Component;
use bevy_ecs::entity::Entity;
use bevy_ecs::reflect::ReflectComponent;
use bevy_reflect::Reflect;
use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

/// Component added to the shadow copy of an authoritative entity.
///
/// The shadow entity lives in a separate [`World`](bevy_ecs::world::World) from its original,
/// so `original` is only valid in the authoritative world.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct Shadow {
    pub original: Entity,
}

/// Shadow bodies with this marker are not integrated by the physics step.
///
/// They still act as immovable colliders. Shadow entities are frozen between prediction runs so that
/// they can't drift away from their authoritative counterpart, and when they hit a blocker.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct Frozen;

/// Shadow entities with this marker are excluded from the physics step entirely.
///
/// Used for spawn slot instances outside of a run, and for shadows whose original is disabled.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct Dormant;

/// Identifies a spawn slot
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect, Serialize, Deserialize,
)]
pub struct SpawnSlotId(pub u32);

impl Display for SpawnSlotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "SpawnSlot({})", self.0)
    }
}
