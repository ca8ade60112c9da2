//! Shadow worlds simulated by avian3d
use crate::backend::{PhysicsBackend, ShadowPhysicsStep, run_physics_step};
use crate::events::CollisionEvents;
use alloc::vec::Vec;
use avian3d::prelude::{
    AngularVelocity, Collider, ColliderDisabled, ContactGraph, Gravity, LinearVelocity,
    PhysicsInterpolationPlugin, PhysicsPlugins, PhysicsTransformPlugin, Position, RigidBody,
    RigidBodyDisabled, Rotation, IslandSleepingPlugin,
};
use bevy_app::{App, PluginGroup};
use bevy_ecs::component::Component;
use bevy_ecs::entity::{Entity, EntityHashMap};
use bevy_ecs::query::{With, Without};
use bevy_ecs::world::{EntityRef, EntityWorldMut, World};
use bevy_math::{Quat, Vec3};
use core::time::Duration;
use foresight_core::contact::{ContactManifold, ContactPoint};
use foresight_core::shadow::{Dormant, Frozen, Shadow};
use foresight_core::state::{BodyState, Velocity};
use tracing::trace;

/// Body type of a [`Frozen`] shadow, restored when the marker is removed
#[derive(Component, Debug, Clone, Copy)]
struct FrozenBody(RigidBody);

/// Steps 3D shadow worlds with avian3d.
///
/// Frozen bodies are turned into [`RigidBody::Static`] for as long as they stay frozen.
/// Dormant entities get [`RigidBodyDisabled`] and [`ColliderDisabled`].
#[derive(Debug, Clone)]
pub struct Avian3dBackend {
    pub gravity: Vec3,
}

impl Default for Avian3dBackend {
    fn default() -> Self {
        Self {
            gravity: Vec3::NEG_Y * 9.81,
        }
    }
}

impl Avian3dBackend {
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    fn sync_markers(world: &mut World) {
        let mut freeze = world
            .query_filtered::<(Entity, &RigidBody), (With<Frozen>, Without<FrozenBody>)>();
        let frozen: Vec<(Entity, RigidBody)> =
            freeze.iter(world).map(|(e, body)| (e, *body)).collect();
        for (entity, body) in frozen {
            world.entity_mut(entity).insert((
                FrozenBody(body),
                RigidBody::Static,
                LinearVelocity::ZERO,
                AngularVelocity::ZERO,
            ));
        }

        let mut thaw = world.query_filtered::<(Entity, &FrozenBody), Without<Frozen>>();
        let thawed: Vec<(Entity, RigidBody)> =
            thaw.iter(world).map(|(e, body)| (e, body.0)).collect();
        for (entity, body) in thawed {
            world
                .entity_mut(entity)
                .insert(body)
                .remove::<FrozenBody>();
        }

        let mut sleep =
            world.query_filtered::<Entity, (With<Dormant>, Without<ColliderDisabled>)>();
        let dormant: Vec<Entity> = sleep.iter(world).collect();
        for entity in dormant {
            world
                .entity_mut(entity)
                .insert((RigidBodyDisabled, ColliderDisabled));
        }

        let mut wake = world.query_filtered::<Entity, (
            With<Shadow>,
            With<ColliderDisabled>,
            Without<Dormant>,
        )>();
        let awake: Vec<Entity> = wake.iter(world).collect();
        for entity in awake {
            world
                .entity_mut(entity)
                .remove::<(RigidBodyDisabled, ColliderDisabled)>();
        }
    }

    fn report_contacts(world: &mut World, velocities: &EntityHashMap<Vec3>) {
        let velocity = |entity: Entity| velocities.get(&entity).copied().unwrap_or_default();
        let mut reports = Vec::new();
        if let Some(graph) = world.get_resource::<ContactGraph>() {
            for pair in graph
                .iter_active_touching()
                .chain(graph.iter_sleeping_touching())
            {
                let mut contacts = ContactManifold::new();
                let mut impulse = Vec3::ZERO;
                for manifold in &pair.manifolds {
                    let mut magnitude = 0.0;
                    for point in &manifold.points {
                        contacts.push(ContactPoint {
                            point: point.point,
                            normal: manifold.normal,
                            penetration: point.penetration,
                        });
                        magnitude += point.normal_impulse;
                    }
                    impulse += manifold.normal * magnitude;
                }
                reports.push((
                    pair.collider1,
                    pair.collider2,
                    contacts,
                    impulse,
                    velocity(pair.collider2) - velocity(pair.collider1),
                ));
            }
        }
        let mut events = world.get_resource_or_init::<CollisionEvents>();
        events.begin_step();
        for (entity1, entity2, contacts, impulse, relative_velocity) in reports {
            trace!(?entity1, ?entity2, "Contact");
            events.report(entity1, entity2, contacts, impulse, relative_velocity);
        }
    }
}

impl PhysicsBackend for Avian3dBackend {
    fn build(&self, app: &mut App) {
        app.add_plugins(
            PhysicsPlugins::new(ShadowPhysicsStep)
                .build()
                // shadows are never rendered: Position and Rotation are the only source of truth
                .disable::<PhysicsTransformPlugin>()
                .disable::<PhysicsInterpolationPlugin>()
                // anchoring teleports bodies, which must never be put to sleep
                .disable::<IslandSleepingPlugin>(),
        )
        .insert_resource(Gravity(self.gravity));
    }

    fn is_collider(&self, entity: &EntityRef) -> bool {
        entity.contains::<Collider>()
    }

    fn is_body(&self, entity: &EntityRef) -> bool {
        entity.contains::<RigidBody>()
    }

    fn read_state(&self, entity: &EntityRef) -> Option<BodyState> {
        let position = entity.get::<Position>()?.0;
        let rotation = entity.get::<Rotation>().map_or(Quat::IDENTITY, |r| r.0);
        let state = BodyState::at(position, rotation);
        if !self.is_body(entity) {
            return Some(state);
        }
        Some(state.with_velocity(Velocity {
            linear: entity.get::<LinearVelocity>().map_or(Vec3::ZERO, |v| v.0),
            angular: entity.get::<AngularVelocity>().map_or(Vec3::ZERO, |v| v.0),
        }))
    }

    fn write_state(&self, state: &BodyState, target: &mut EntityWorldMut) {
        target.insert((Position(state.position), Rotation(state.rotation)));
        if let Some(velocity) = state.velocity {
            target.insert((
                LinearVelocity(velocity.linear),
                AngularVelocity(velocity.angular),
            ));
        }
    }

    fn step(&mut self, world: &mut World, delta: Duration) {
        Self::sync_markers(world);
        let mut query = world.query::<(Entity, &LinearVelocity)>();
        let velocities: EntityHashMap<Vec3> = query.iter(world).map(|(e, v)| (e, v.0)).collect();
        run_physics_step(world, delta);
        Self::report_contacts(world, &velocities);
    }
}
