//! Predicts the arc of a projectile launched towards a wall, without ever simulating the real projectile.
//!
//! ```text
//! RUST_LOG=foresight_prediction=debug cargo run -p trajectory -- --velocity 6 8 --wall 9
//! ```
use avian3d::prelude::{Collider, LinearVelocity, Position, RigidBody};
use bevy_ecs::entity_disabling::Disabled;
use bevy_ecs::world::{Mut, World};
use bevy_math::Vec3;
use clap::Parser;
use core::time::Duration;
use foresight::prelude::*;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Print the predicted trajectory of a projectile
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Launch velocity (x, y)
    #[arg(short, long, num_args = 2, default_values_t = [4.0, 6.0])]
    velocity: Vec<f32>,
    /// Number of prediction steps
    #[arg(short, long, default_value_t = 120)]
    steps: usize,
    /// Timestep in Hz
    #[arg(short, long, default_value_t = 64.0, value_parser = positive_frequency)]
    frequency: f64,
    /// X coordinate of a wall that stops the prediction
    #[arg(short, long)]
    wall: Option<f32>,
    /// Print the trajectory as json
    #[arg(long)]
    json: bool,
}

fn positive_frequency(s: &str) -> Result<f64, String> {
    let frequency: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !frequency.is_finite() || frequency <= 0.0 {
        return Err(format!("the frequency must be a positive number of Hz, got {s}"));
    }
    Ok(frequency)
}

#[derive(Serialize)]
struct Point {
    step: usize,
    x: f32,
    y: f32,
}

fn main() -> Result<(), PredictionError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();

    let config = PredictionConfig::default()
        .with_timestep(Duration::from_secs_f64(1.0 / cli.frequency));
    let mut world = World::new();
    world.insert_resource(PredictionContext::new(config));

    world.spawn((
        Position(Vec3::new(0.0, -0.5, 0.0)),
        RigidBody::Static,
        Collider::cuboid(1000.0, 1.0, 1000.0),
        PredictionObject::default(),
        PredictionBlocker,
    ));
    if let Some(x) = cli.wall {
        world.spawn((
            Position(Vec3::new(x + 0.5, 0.0, 0.0)),
            RigidBody::Static,
            Collider::cuboid(1.0, 100.0, 100.0),
            PredictionObject::default(),
            PredictionBlocker,
        ));
    }
    // prefab of the projectile: it never exists in the simulated world
    let template = world
        .spawn((
            Position(Vec3::new(0.0, 0.5, 0.0)),
            RigidBody::Dynamic,
            Collider::sphere(0.2),
            Disabled,
        ))
        .id();
    world.flush();

    let launch = Vec3::new(cli.velocity[0], cli.velocity[1], 0.0);
    let slot = world.resource_scope(|world, mut context: Mut<PredictionContext>| {
        context.add_spawn_slot(world, template, move |instance| {
            instance.insert(LinearVelocity(launch));
        })
    })?;

    let report = run_prediction(&mut world, cli.steps)?;
    info!(?report, "Prediction completed");

    let context = world.resource::<PredictionContext>();
    let Some(timeline) = context.slot_timeline(slot) else {
        return Ok(());
    };
    let points: Vec<Point> = timeline
        .positions()
        .enumerate()
        .map(|(step, p)| Point {
            step,
            x: p.x,
            y: p.y,
        })
        .collect();
    if cli.json {
        match serde_json::to_string_pretty(&points) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!(?e, "Could not serialize the trajectory"),
        }
    } else {
        for point in &points {
            println!("{:>4} {:>8.3} {:>8.3}", point.step, point.x, point.y);
        }
    }
    if let Some(collision) = timeline.collisions().first() {
        println!(
            "hit {:?} at step {} (impulse {})",
            collision.target, collision.step, collision.impulse
        );
    }
    Ok(())
}
