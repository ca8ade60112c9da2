use crate::stepper::*;
use avian3d::prelude::{Collider, Position, RigidBody};
use bevy_ecs::entity::Entity;
use bevy_ecs::entity_disabling::Disabled;
use bevy_ecs::observer::On;
use bevy_ecs::prelude::{ResMut, Resource};
use bevy_math::{Vec2, Vec3};
use foresight::prelude::*;
use test_log::test;

fn recorded_ball(stepper: &mut PredictionStepper, position: Vec3) -> Entity {
    stepper.spawn((
        Position(position),
        RigidBody::Dynamic,
        Collider::sphere(0.5),
        PredictionObject::default(),
        PredictionRecorder::default(),
    ))
}

/// Adding `PredictionObject` registers the entity and spawns its shadow
#[test]
fn test_register_on_add() {
    let mut stepper = PredictionStepper::default();
    let entity = recorded_ball(&mut stepper, Vec3::new(1.0, 2.0, 3.0));

    let handle = stepper.context().shadow_of(entity).unwrap();
    assert_eq!(handle.mode, SpatialMode::Physics3d);
    assert_eq!(stepper.shadow_count(SpatialMode::Physics3d), 1);
    let pair = stepper.context().registry().get(entity).unwrap();
    assert_eq!(pair.capabilities.recorder, Some(PredictionRecorder::default()));
    assert!(!pair.capabilities.blocker);

    // the shadow is a frozen copy of the original
    assert_eq!(
        stepper.shadow_get::<Position>(entity),
        Some(Position(Vec3::new(1.0, 2.0, 3.0)))
    );
    assert_eq!(stepper.shadow_get::<Frozen>(entity), Some(Frozen));
    assert_eq!(
        stepper.shadow_get::<Shadow>(entity),
        Some(Shadow { original: entity })
    );

    // registering again returns the same shadow
    let again = stepper
        .world_mut()
        .resource_scope(|world, mut context: bevy_ecs::world::Mut<PredictionContext>| {
            context.register(world, entity)
        })
        .unwrap();
    assert_eq!(again, handle);
    assert_eq!(stepper.shadow_count(SpatialMode::Physics3d), 1);
}

/// Despawning the original destroys its shadow and its timeline
#[test]
fn test_despawn_unregisters() {
    let mut stepper = PredictionStepper::default();
    let entity = recorded_ball(&mut stepper, Vec3::Y);
    stepper.simulate(3);
    assert!(stepper.context().timeline(entity).is_some());

    stepper.world_mut().despawn(entity);
    assert_eq!(stepper.shadow_count(SpatialMode::Physics3d), 0);
    assert!(stepper.context().shadow_of(entity).is_none());
    assert!(stepper.context().timeline(entity).is_none());
    assert!(!stepper.context_mut().unregister(entity));
}

/// Removing `PredictionObject` destroys the shadow but leaves the original untouched
#[test]
fn test_remove_component_unregisters() {
    let mut stepper = PredictionStepper::default();
    let entity = recorded_ball(&mut stepper, Vec3::Y);

    stepper.world_mut().entity_mut(entity).remove::<PredictionObject>();
    assert_eq!(stepper.shadow_count(SpatialMode::Physics3d), 0);
    assert!(stepper.context().registry().is_empty());
    assert_eq!(
        stepper.world().get::<Position>(entity),
        Some(&Position(Vec3::Y))
    );

    // runs without any registered entity are valid
    let report = stepper.simulate(3);
    assert_eq!(report.iterations, 3);
    assert!(stepper.context().timeline(entity).is_none());
}

/// Entities with different spatial modes live in separate shadow worlds
#[test]
fn test_pairs_across_modes() {
    let mut stepper = PredictionStepper::default();
    let body_3d = recorded_ball(&mut stepper, Vec3::ZERO);
    let body_2d = stepper.spawn((
        avian2d::prelude::Position(Vec2::ZERO),
        avian2d::prelude::RigidBody::Dynamic,
        avian2d::prelude::Collider::circle(0.5),
        PredictionObject::default(),
    ));

    let handle_3d = stepper.context().shadow_of(body_3d).unwrap();
    let handle_2d = stepper.context().shadow_of(body_2d).unwrap();
    assert_eq!(handle_3d.mode, SpatialMode::Physics3d);
    assert_eq!(handle_2d.mode, SpatialMode::Physics2d);
    assert_eq!(stepper.context().original_of(handle_3d), Some(body_3d));
    assert_eq!(stepper.context().original_of(handle_2d), Some(body_2d));
    assert_eq!(stepper.context().registry().len(), 2);

    // the two bodies overlap, but can't collide since they are in different worlds
    stepper.simulate(5);
    assert!(stepper.timeline(body_3d).collisions().is_empty());
    assert_eq!(stepper.shadow_count(SpatialMode::Physics3d), 1);
    assert_eq!(stepper.shadow_count(SpatialMode::Physics2d), 1);

    // unloading a world drops every pair that lived in it
    assert!(stepper.context_mut().unload_world(SpatialMode::Physics2d));
    assert!(stepper.context().shadow_of(body_2d).is_none());
    assert!(stepper.context().shadow_of(body_3d).is_some());
    assert!(!stepper.context_mut().unload_world(SpatialMode::Physics2d));
}

/// Entities without a collider use the mode of `PredictionObject`
#[test]
fn test_explicit_mode() {
    let mut stepper = PredictionStepper::default();
    let entity = stepper.spawn((
        avian2d::prelude::Position(Vec2::new(1.0, 1.0)),
        PredictionObject::new(SpatialMode::Physics2d),
    ));
    assert_eq!(
        stepper.context().shadow_of(entity).unwrap().mode,
        SpatialMode::Physics2d
    );
}

/// Registration failures are logged and leave no shadow behind
#[test]
fn test_register_without_transform() {
    let mut stepper = PredictionStepper::default();
    let entity = stepper.spawn(PredictionObject::new(SpatialMode::Physics3d));
    assert!(stepper.context().shadow_of(entity).is_none());

    let error = stepper
        .world_mut()
        .resource_scope(|world, mut context: bevy_ecs::world::Mut<PredictionContext>| {
            context.register(world, entity)
        })
        .unwrap_err();
    assert!(matches!(error, PredictionError::MissingTransform(e) if e == entity));
}

/// The shadow of a disabled entity doesn't take part in the simulation
#[test]
fn test_disabled_original_is_dormant() {
    let mut stepper = PredictionStepper::default();
    let entity = stepper.spawn((
        Position(Vec3::new(0.0, 5.0, 0.0)),
        RigidBody::Dynamic,
        Collider::sphere(0.5),
        PredictionObject::default(),
        PredictionRecorder::default(),
        Disabled,
    ));
    assert_eq!(stepper.shadow_get::<Dormant>(entity), Some(Dormant));

    stepper.simulate(10);
    let timeline = stepper.timeline(entity);
    assert_eq!(timeline.len(), 10);
    assert!(timeline.positions().all(|p| p == Vec3::new(0.0, 5.0, 0.0)));

    // once enabled again, the shadow falls
    stepper.world_mut().entity_mut(entity).remove::<Disabled>();
    stepper.simulate(10);
    assert!(stepper.context().timeline(entity).unwrap().last().unwrap().position.y < 5.0);
    assert_eq!(stepper.shadow_get::<Dormant>(entity), None);
}

/// Spawn slots need a rigid body
#[test]
fn test_spawn_slot_errors() {
    let mut stepper = PredictionStepper::default();
    let static_template = stepper.spawn((
        avian2d::prelude::Position::default(),
        avian2d::prelude::Collider::rectangle(1.0, 1.0),
    ));
    let missing = Entity::from_raw_u32(1000).unwrap();

    stepper
        .world_mut()
        .resource_scope(|world, mut context: bevy_ecs::world::Mut<PredictionContext>| {
            assert!(matches!(
                context.add_spawn_slot(world, static_template, |_| {}),
                Err(PredictionError::MissingBody(_))
            ));
            assert!(matches!(
                context.add_spawn_slot(world, missing, |_| {}),
                Err(PredictionError::EntityNotFound(_))
            ));
            assert!(context.slots().is_empty());
        });
}

#[derive(Resource, Default)]
struct Completed(Vec<PredictionCompleted>);

/// Runs queued with commands trigger `PredictionCompleted`
#[test]
fn test_completed_event() {
    let mut stepper = PredictionStepper::default();
    stepper.app.init_resource::<Completed>();
    stepper.app.add_observer(
        |trigger: On<PredictionCompleted>, mut completed: ResMut<Completed>| {
            completed.0.push(trigger.event().clone());
        },
    );
    recorded_ball(&mut stepper, Vec3::Y);

    stepper.world_mut().commands().simulate_prediction(5);
    stepper.world_mut().flush();

    let completed = &stepper.world().resource::<Completed>().0;
    assert_eq!(
        completed,
        &vec![PredictionCompleted {
            iterations: 5,
            halted: vec![],
        }]
    );
    assert_eq!(stepper.context().state(), RunState::Idle);
}
