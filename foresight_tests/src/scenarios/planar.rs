use crate::stepper::*;
use approx::assert_relative_eq;
use avian2d::prelude::{Collider, LinearVelocity, Position, RigidBody};
use bevy_math::Vec2;
use foresight::prelude::*;
use test_log::test;

/// Planar bodies roll on a planar ground and never leave the z = 0 plane
#[test]
fn test_planar_slide() {
    let mut stepper = PredictionStepper::default();
    let disc = stepper.spawn((
        Position(Vec2::new(0.0, 0.5)),
        LinearVelocity(Vec2::new(2.0, 0.0)),
        RigidBody::Dynamic,
        Collider::circle(0.5),
        PredictionObject::default(),
        PredictionRecorder::default(),
    ));
    let ground = stepper.spawn((
        Position(Vec2::new(0.0, -0.5)),
        RigidBody::Static,
        Collider::rectangle(100.0, 1.0),
        PredictionObject::default(),
    ));

    assert_eq!(
        stepper.context().shadow_of(disc).unwrap().mode,
        SpatialMode::Physics2d
    );
    assert!(stepper.context().shadow_world(SpatialMode::Physics3d).is_none());

    stepper.simulate(60);
    let timeline = stepper.timeline(disc);
    assert_eq!(timeline.len(), 60);
    assert!(timeline.positions().all(|p| p.z == 0.0));
    let xs: Vec<f32> = timeline.positions().map(|p| p.x).collect();
    assert!(xs.windows(2).all(|w| w[1] > w[0]));
    assert_relative_eq!(timeline.last().unwrap().position.y, 0.5, epsilon = 0.02);
    assert!(!timeline.collisions().is_empty());
    assert_eq!(
        timeline.collisions()[0].target,
        CollisionTarget::Object(ground)
    );

    // the 3d world was never needed
    assert!(stepper.context().shadow_world(SpatialMode::Physics3d).is_none());
}
