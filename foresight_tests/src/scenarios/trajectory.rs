use crate::stepper::*;
use approx::assert_relative_eq;
use avian3d::prelude::*;
use bevy_ecs::entity::Entity;
use bevy_ecs::entity_disabling::Disabled;
use bevy_math::{Quat, Vec3};
use core::time::Duration;
use foresight::prelude::{
    Avian3dBackend, BodyState, Dormant, Frozen, PhysicsBackend, PredictionConfig,
    PredictionContext, PredictionObject, PredictionRecorder,
};
use test_log::test;

fn falling_ball(stepper: &mut PredictionStepper, height: f32) -> Entity {
    stepper.spawn((
        Position(Vec3::new(0.0, height, 0.0)),
        RigidBody::Dynamic,
        Collider::sphere(0.5),
        PredictionObject::default(),
        PredictionRecorder::default(),
    ))
}

fn ground(stepper: &mut PredictionStepper) -> Entity {
    stepper.spawn((
        Position(Vec3::new(0.0, -0.5, 0.0)),
        RigidBody::Static,
        Collider::cuboid(100.0, 1.0, 100.0),
        PredictionObject::default(),
    ))
}

fn state(stepper: &PredictionStepper, entity: Entity) -> Option<BodyState> {
    Avian3dBackend::default().read_state(&stepper.world().entity(entity))
}

/// A body falling under gravity moves down in its predicted timeline
#[test]
fn test_falling_body() {
    let mut stepper = PredictionStepper::default();
    let entity = falling_ball(&mut stepper, 10.0);
    stepper.frame_step(1);

    let report = stepper.simulate(10);
    assert_eq!(report.iterations, 10);
    let timeline = stepper.timeline(entity);
    assert_eq!(timeline.len(), 10);
    assert!(timeline.get(9).unwrap().position.y < timeline.get(0).unwrap().position.y);
    assert!(!timeline.is_halted());
}

/// A projectile launched from a spawn slot follows a parabola
#[test]
fn test_projectile_spawn_slot() {
    let timestep = Duration::from_secs_f64(1.0 / 30.0);
    let mut stepper = PredictionStepper::with_timestep(timestep);
    let template = stepper.spawn((
        Position::default(),
        RigidBody::Dynamic,
        Collider::sphere(0.1),
        Disabled,
    ));
    let world = stepper.app.world_mut();
    let slot = world
        .resource_scope(|world, mut context: bevy_ecs::world::Mut<PredictionContext>| {
            context.add_spawn_slot(world, template, |instance| {
                instance.insert(LinearVelocity(Vec3::new(3.0, 5.0, 0.0)));
            })
        })
        .unwrap();

    let report = stepper.simulate(30);
    assert_eq!(report.timestep, timestep);
    let timeline = stepper.slot_timeline(slot);
    assert_eq!(timeline.len(), 30);

    let heights: Vec<f32> = timeline.positions().map(|p| p.y).collect();
    let apex = heights
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    // the apex is reached around t = 5 / 9.81 s, in the middle of the run
    assert!((13..=16).contains(&apex));

    // constant horizontal speed, constant vertical acceleration
    let dt = timestep.as_secs_f32();
    for (i, position) in timeline.positions().enumerate() {
        assert_relative_eq!(position.x, 3.0 * dt * (i + 1) as f32, epsilon = 1e-3);
    }
    for window in heights.windows(3) {
        let second_difference = window[2] - 2.0 * window[1] + window[0];
        assert_relative_eq!(second_difference, -9.81 * dt * dt, epsilon = 1e-3);
    }

    // the instance went back to sleep, and the template was never touched
    let instance = stepper.context().slots().get(slot).unwrap().instance;
    let shadow_world = stepper.context().shadow_world(instance.mode).unwrap().world();
    assert!(shadow_world.entity(instance.entity).contains::<Dormant>());
    assert_eq!(
        stepper.world().get::<Position>(template),
        Some(&Position::default())
    );
}

/// Running a prediction never modifies the authoritative world
#[test]
fn test_isolation() {
    let mut stepper = PredictionStepper::default();
    let entity = stepper.spawn((
        Position(Vec3::new(1.0, 4.0, -2.0)),
        Rotation(Quat::from_rotation_x(0.2)),
        LinearVelocity(Vec3::new(1.0, 2.0, 0.5)),
        AngularVelocity(Vec3::new(0.0, 3.0, 0.0)),
        RigidBody::Dynamic,
        Collider::sphere(0.5),
        PredictionObject::default(),
        PredictionRecorder::default(),
    ));
    let ground = ground(&mut stepper);
    stepper.frame_step(1);

    let before = state(&stepper, entity).unwrap();
    let ground_before = state(&stepper, ground).unwrap();
    stepper.simulate(200);
    assert_eq!(state(&stepper, entity), Some(before));
    assert_eq!(state(&stepper, ground), Some(ground_before));
    // the shadow has moved during the run, but is anchored back afterwards
    let last = stepper.timeline(entity).last().unwrap().position;
    assert_ne!(last, before.position);
    assert_eq!(
        stepper.shadow_get::<Position>(entity),
        Some(Position(before.position))
    );
}

/// Identical inputs give identical timelines
#[test]
fn test_rerun_independence() {
    let mut stepper = PredictionStepper::default();
    let entity = stepper.spawn((
        Position(Vec3::new(0.0, 3.0, 0.0)),
        LinearVelocity(Vec3::new(2.0, 0.0, 0.0)),
        RigidBody::Dynamic,
        Restitution::new(0.5),
        Collider::sphere(0.5),
        PredictionObject::default(),
        PredictionRecorder::default(),
    ));
    ground(&mut stepper);
    stepper.frame_step(1);

    stepper.simulate(120);
    let first = stepper.timeline(entity).clone();
    assert!(!first.collisions().is_empty());
    stepper.frame_step(3);
    stepper.simulate(120);

    let second = stepper.timeline(entity);
    assert_eq!(second.len(), first.len());
    assert_eq!(second.collisions().len(), first.collisions().len());
    for (a, b) in first.positions().zip(second.positions()) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-4);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-4);
    }
}

/// Authoritative changes are picked up by the next run
#[test]
fn test_anchoring_between_runs() {
    let mut stepper = PredictionStepper::default();
    let entity = falling_ball(&mut stepper, 10.0);
    stepper.frame_step(1);

    stepper
        .world_mut()
        .entity_mut(entity)
        .insert(Position(Vec3::new(5.0, 20.0, 0.0)));
    stepper.frame_step(1);
    // the idle anchoring pass already moved the shadow
    assert_eq!(
        stepper.shadow_get::<Position>(entity),
        Some(Position(Vec3::new(5.0, 20.0, 0.0)))
    );
    assert!(stepper.shadow_get::<Frozen>(entity).is_some());

    stepper.simulate(1);
    let first = stepper.timeline(entity).first().unwrap().position;
    assert_relative_eq!(first.x, 5.0);
    assert!(first.y < 20.0 && first.y > 19.9);
}

#[test]
fn test_no_idle_anchoring() {
    let mut stepper = PredictionStepper::new(PredictionConfig {
        anchor_between_runs: false,
        ..Default::default()
    });
    let entity = falling_ball(&mut stepper, 10.0);
    stepper.frame_step(1);
    stepper
        .world_mut()
        .entity_mut(entity)
        .insert(Position(Vec3::new(5.0, 20.0, 0.0)));
    stepper.frame_step(1);
    assert_eq!(
        stepper.shadow_get::<Position>(entity),
        Some(Position(Vec3::new(0.0, 10.0, 0.0)))
    );
    // runs always anchor
    stepper.simulate(1);
    assert_relative_eq!(stepper.timeline(entity).first().unwrap().position.x, 5.0);
}

/// The timestep of the runs follows the fixed timestep of the app
#[test]
fn test_timestep_follows_fixed_time() {
    let mut stepper = PredictionStepper::default();
    falling_ball(&mut stepper, 10.0);
    stepper
        .world_mut()
        .resource_mut::<bevy_time::Time<bevy_time::Fixed>>()
        .set_timestep(Duration::from_millis(50));
    let report = stepper.simulate(2);
    assert_eq!(report.timestep, Duration::from_millis(50));
    assert_eq!(stepper.context().config.timestep, Duration::from_millis(50));
}
