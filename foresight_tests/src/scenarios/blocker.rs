use crate::stepper::*;
use approx::assert_relative_eq;
use avian3d::prelude::{Collider, LinearVelocity, Position, RigidBody};
use bevy_ecs::entity::Entity;
use bevy_ecs::entity_disabling::Disabled;
use bevy_ecs::world::Mut;
use bevy_math::Vec3;
use core::time::Duration;
use foresight::prelude::*;
use test_log::test;

const DT: Duration = Duration::from_nanos(16_666_667);

/// Static slab whose top face is at y = 0
fn ground() -> (Position, RigidBody, Collider) {
    (
        Position(Vec3::new(0.0, -0.5, 0.0)),
        RigidBody::Static,
        Collider::cuboid(100.0, 1.0, 100.0),
    )
}

fn ball(stepper: &mut PredictionStepper) -> Entity {
    stepper.spawn((
        Position(Vec3::new(0.0, 2.0, 0.0)),
        RigidBody::Dynamic,
        Collider::sphere(0.5),
        PredictionObject::default(),
        PredictionRecorder::default(),
    ))
}

/// Touching a blocker stops the recording at the pose of the contact
#[test]
fn test_blocker_stops_recording() {
    let mut stepper = PredictionStepper::with_timestep(DT);
    let ball = ball(&mut stepper);
    let ground = stepper.spawn((
        ground(),
        PredictionObject::default(),
        PredictionBlocker,
    ));
    assert!(stepper.context().registry().get(ground).unwrap().capabilities.blocker);

    let report = stepper.simulate(120);
    assert_eq!(report.halted, vec![Tracked::Object(ball)]);

    let timeline = stepper.timeline(ball);
    assert!(timeline.len() < 120);
    assert_eq!(timeline.halted_at(), Some(timeline.len() - 1));
    assert_relative_eq!(timeline.last().unwrap().position.y, 0.5, epsilon = 0.02);

    let collisions = timeline.collisions();
    assert_eq!(collisions.len(), 1);
    let collision = &collisions[0];
    assert_eq!(collision.step, timeline.len() - 1);
    assert_eq!(collision.target, CollisionTarget::Object(ground));
    // the normal points from the ball towards the ground
    assert_relative_eq!(collision.contacts[0].normal.y, -1.0, epsilon = 1e-3);
    // the ground can only push the ball up
    assert!(collision.impulse.y >= 0.0);
}

/// Without a blocker, the body keeps being recorded after the contact
#[test]
fn test_contact_without_blocker() {
    let mut stepper = PredictionStepper::with_timestep(DT);
    let ball = ball(&mut stepper);
    let ground = stepper.spawn((
        ground(),
        PredictionObject::default(),
    ));

    let report = stepper.simulate(120);
    assert!(report.halted.is_empty());
    let timeline = stepper.timeline(ball);
    assert_eq!(timeline.len(), 120);
    assert!(!timeline.is_halted());
    assert!(!timeline.collisions().is_empty());
    assert_eq!(timeline.collisions()[0].target, CollisionTarget::Object(ground));
    assert_relative_eq!(timeline.last().unwrap().position.y, 0.5, epsilon = 0.02);
}

/// Recorders can opt out of blockers and of collision recording
#[test]
fn test_recorder_settings() {
    let mut stepper = PredictionStepper::with_timestep(DT);
    let ball = stepper.spawn((
        Position(Vec3::new(0.0, 2.0, 0.0)),
        RigidBody::Dynamic,
        Collider::sphere(0.5),
        PredictionObject::default(),
        PredictionRecorder {
            collisions: false,
            stop_on_blocker: false,
        },
    ));
    stepper.spawn((
        ground(),
        PredictionObject::default(),
        PredictionBlocker,
    ));

    stepper.simulate(120);
    let timeline = stepper.timeline(ball);
    assert_eq!(timeline.len(), 120);
    assert!(timeline.collisions().is_empty());
}

/// A projectile spawned from a slot stops at the first wall it hits
#[test]
fn test_spawn_slot_hits_blocker() {
    let timestep = Duration::from_secs_f64(1.0 / 30.0);
    let mut stepper = PredictionStepper::with_timestep(timestep);
    let template = stepper.spawn((
        Position(Vec3::new(0.0, 1.0, 0.0)),
        RigidBody::Dynamic,
        Collider::sphere(0.1),
        Disabled,
    ));
    let wall = stepper.spawn((
        Position(Vec3::new(3.0, 0.0, 0.0)),
        RigidBody::Static,
        Collider::cuboid(1.0, 10.0, 10.0),
        PredictionObject::default(),
        PredictionBlocker,
    ));
    let slot = stepper
        .world_mut()
        .resource_scope(|world, mut context: Mut<PredictionContext>| {
            context.add_spawn_slot(world, template, |instance| {
                instance.insert(LinearVelocity(Vec3::new(10.0, 0.0, 0.0)));
            })
        })
        .unwrap();

    let report = stepper.simulate(30);
    assert_eq!(report.halted, vec![Tracked::Slot(slot)]);
    let timeline = stepper.slot_timeline(slot);
    assert!(timeline.len() < 30);
    assert_relative_eq!(timeline.last().unwrap().position.x, 2.4, epsilon = 0.02);
    assert_eq!(timeline.collisions()[0].target, CollisionTarget::Object(wall));
    assert_relative_eq!(timeline.collisions()[0].contacts[0].normal.x, 1.0, epsilon = 1e-3);

    // the slot can be removed, along with its timeline
    assert!(stepper.context_mut().remove_spawn_slot(slot));
    assert!(stepper.context().slot_timeline(slot).is_none());
    assert!(!stepper.context_mut().remove_spawn_slot(slot));
}

/// Contacts with shadows that are neither registered nor spawn slots are skipped
#[test]
fn test_unknown_contact_is_skipped() {
    let mut stepper = PredictionStepper::with_timestep(DT);
    let ball = ball(&mut stepper);
    stepper
        .context_mut()
        .shadow_world_mut(SpatialMode::Physics3d)
        .unwrap()
        .world_mut()
        .spawn(ground());

    stepper.simulate(120);
    let timeline = stepper.timeline(ball);
    assert_eq!(timeline.len(), 120);
    assert!(timeline.collisions().is_empty());
    // the contact still happened in the shadow world
    assert_relative_eq!(timeline.last().unwrap().position.y, 0.5, epsilon = 0.02);
}
