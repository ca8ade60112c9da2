//! Shadow worlds simulated by avian2d.
//!
//! Planar states are expressed in 3D: positions lie in the z = 0 plane and rotations are around z.
use crate::backend::{PhysicsBackend, ShadowPhysicsStep, run_physics_step};
use crate::events::CollisionEvents;
use alloc::vec::Vec;
use avian2d::prelude::{
    AngularVelocity, Collider, ColliderDisabled, ContactGraph, Gravity, LinearVelocity,
    PhysicsInterpolationPlugin, PhysicsPlugins, PhysicsTransformPlugin, Position, RigidBody,
    RigidBodyDisabled, Rotation, IslandSleepingPlugin,
};
use bevy_app::{App, PluginGroup};
use bevy_ecs::component::Component;
use bevy_ecs::entity::{Entity, EntityHashMap};
use bevy_ecs::query::{With, Without};
use bevy_ecs::world::{EntityRef, EntityWorldMut, World};
use bevy_math::{EulerRot, Quat, Vec2, Vec3};
use core::time::Duration;
use foresight_core::contact::{ContactManifold, ContactPoint};
use foresight_core::shadow::{Dormant, Frozen, Shadow};
use foresight_core::state::{BodyState, Velocity};
use tracing::trace;

#[derive(Component, Debug, Clone, Copy)]
struct FrozenBody(RigidBody);

/// Steps 2D shadow worlds with avian2d.
///
/// Markers are mapped the same way as in [`Avian3dBackend`](crate::avian_3d::Avian3dBackend).
#[derive(Debug, Clone)]
pub struct Avian2dBackend {
    pub gravity: Vec2,
}

impl Default for Avian2dBackend {
    fn default() -> Self {
        Self {
            gravity: Vec2::NEG_Y * 9.81,
        }
    }
}

fn angle_of(rotation: Quat) -> f32 {
    let (z, _, _) = rotation.to_euler(EulerRot::ZYX);
    z
}

impl Avian2dBackend {
    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
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

    fn report_contacts(world: &mut World, velocities: &EntityHashMap<Vec2>) {
        let velocity = |entity: Entity| velocities.get(&entity).copied().unwrap_or_default();
        let mut reports = Vec::new();
        if let Some(graph) = world.get_resource::<ContactGraph>() {
            for pair in graph
                .iter_active_touching()
                .chain(graph.iter_sleeping_touching())
            {
                let mut contacts = ContactManifold::new();
                let mut impulse = Vec2::ZERO;
                for manifold in &pair.manifolds {
                    let mut magnitude = 0.0;
                    for point in &manifold.points {
                        contacts.push(ContactPoint {
                            point: point.point.extend(0.0),
                            normal: manifold.normal.extend(0.0),
                            penetration: point.penetration,
                        });
                        magnitude += point.normal_impulse;
                    }
                    impulse += manifold.normal * magnitude;
                }
                let relative_velocity = velocity(pair.collider2) - velocity(pair.collider1);
                reports.push((
                    pair.collider1,
                    pair.collider2,
                    contacts,
                    impulse.extend(0.0),
                    relative_velocity.extend(0.0),
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

impl PhysicsBackend for Avian2dBackend {
    fn build(&self, app: &mut App) {
        app.add_plugins(
            PhysicsPlugins::new(ShadowPhysicsStep)
                .build()
                .disable::<PhysicsTransformPlugin>()
                .disable::<PhysicsInterpolationPlugin>()
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
        let position = entity.get::<Position>()?.0.extend(0.0);
        let rotation = entity
            .get::<Rotation>()
            .map_or(Quat::IDENTITY, |r| Quat::from_rotation_z(r.as_radians()));
        let state = BodyState::at(position, rotation);
        if !self.is_body(entity) {
            return Some(state);
        }
        Some(state.with_velocity(Velocity {
            linear: entity
                .get::<LinearVelocity>()
                .map_or(Vec3::ZERO, |v| v.0.extend(0.0)),
            angular: Vec3::Z * entity.get::<AngularVelocity>().map_or(0.0, |v| v.0),
        }))
    }

    fn write_state(&self, state: &BodyState, target: &mut EntityWorldMut) {
        target.insert((
            Position(state.position.truncate()),
            Rotation::radians(angle_of(state.rotation)),
        ));
        if let Some(velocity) = state.velocity {
            target.insert((
                LinearVelocity(velocity.linear.truncate()),
                AngularVelocity(velocity.angular.z),
            ));
        }
    }

    fn step(&mut self, world: &mut World, delta: Duration) {
        Self::sync_markers(world);
        let mut query = world.query::<(Entity, &LinearVelocity)>();
        let velocities: EntityHashMap<Vec2> = query.iter(world).map(|(e, v)| (e, v.0)).collect();
        run_physics_step(world, delta);
        Self::report_contacts(world, &velocities);
    }
}
