use bevy_app::App;
use bevy_ecs::schedule::ScheduleLabel;
use bevy_ecs::world::{EntityRef, EntityWorldMut, World};
use bevy_time::Time;
use core::time::Duration;
use foresight_core::state::BodyState;
use tracing::warn;

/// Schedule that holds the physics engine of a shadow world.
///
/// It is only ever run manually, once per shadow step.
#[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShadowPhysicsStep;

/// The physics engine of a shadow world.
///
/// The engine is treated as a black box: it advances rigid-body integration, collision detection
/// and contact resolution for exactly one isolated [`World`]. The backend also knows which components
/// make up a body in its engine, so that the rest of the crate can stay engine-agnostic.
///
/// Implementations must:
/// - not integrate bodies that have the [`Frozen`](foresight_core::prelude::Frozen) marker (they can still act as immovable colliders)
/// - ignore entities that have the [`Dormant`](foresight_core::prelude::Dormant) marker
/// - report contacts in the [`CollisionEvents`](crate::events::CollisionEvents) resource of the world
pub trait PhysicsBackend: Send + Sync + 'static {
    /// Add the physics engine to the app that builds a new shadow world.
    ///
    /// Systems that step the simulation must be added to the [`ShadowPhysicsStep`] schedule.
    fn build(&self, app: &mut App);

    /// Returns true if the entity has a collider of this engine
    fn is_collider(&self, entity: &EntityRef) -> bool;

    /// Returns true if the entity is a rigid body of this engine
    fn is_body(&self, entity: &EntityRef) -> bool;

    /// Read the state of an entity. Returns `None` if the entity has no position.
    fn read_state(&self, entity: &EntityRef) -> Option<BodyState>;

    /// Overwrite the state of `target`. The velocity is only written if the state has one.
    fn write_state(&self, state: &BodyState, target: &mut EntityWorldMut);

    /// Advance the world by exactly one step of `delta`
    fn step(&mut self, world: &mut World, delta: Duration);
}

/// Advance the clock of the shadow world by `delta` and run the [`ShadowPhysicsStep`] schedule once.
pub fn run_physics_step(world: &mut World, delta: Duration) {
    if let Some(mut time) = world.get_resource_mut::<Time>() {
        time.advance_by(delta);
    }
    if let Err(e) = world.try_run_schedule(ShadowPhysicsStep) {
        warn!(?e, "The shadow world has no physics schedule");
    }
}
