use crate::stepper::*;
use avian3d::prelude::{Collider, Position, RigidBody};
use bevy_math::Vec3;
use foresight::prelude::*;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use metrics_util::{CompositeKey, MetricKind};
use test_log::test;

type Entry = (
    CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
);

fn counter(snapshot: &[Entry], name: &str) -> u64 {
    snapshot
        .iter()
        .find(|(key, ..)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(.., value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .unwrap_or(0)
}

/// Every run increments the prediction counters
#[test]
fn test_run_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let mut stepper = PredictionStepper::default();
        stepper.spawn((
            Position(Vec3::new(0.0, 1.0, 0.0)),
            RigidBody::Dynamic,
            Collider::sphere(0.5),
            PredictionObject::default(),
            PredictionRecorder::default(),
        ));
        stepper.spawn((
            Position(Vec3::new(0.0, -0.5, 0.0)),
            RigidBody::Static,
            Collider::cuboid(100.0, 1.0, 100.0),
            PredictionObject::default(),
            PredictionBlocker,
        ));
        stepper.simulate(100);
        stepper.simulate(30);
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter(&snapshot, "prediction::runs"), 2);
    assert_eq!(counter(&snapshot, "prediction::steps"), 130);
    assert_eq!(counter(&snapshot, "prediction::halted"), 2);
}
