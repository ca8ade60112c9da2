use crate::config::PredictionConfig;
use crate::context::{PredictionContext, RunReport};
use crate::error::PredictionError;
use crate::recorder::Tracked;
use alloc::vec::Vec;
use bevy_app::prelude::*;
use bevy_ecs::prelude::*;
use bevy_time::{Fixed, Time};
use tracing::error;

/// Plugin that adds the [`PredictionContext`] resource and keeps shadows anchored every frame
#[derive(Default)]
pub struct PredictionPlugin {
    pub config: PredictionConfig,
}

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum PredictionSystems {
    /// Anchor every shadow to its authoritative entity. Runs in `PostUpdate`
    Anchor,
}

/// Triggered when a prediction run queued with [`PredictionCommandsExt::simulate_prediction`] completes
#[derive(Event, Debug, Clone, PartialEq)]
pub struct PredictionCompleted {
    pub iterations: usize,
    pub halted: Vec<Tracked>,
}

impl From<&RunReport> for PredictionCompleted {
    fn from(report: &RunReport) -> Self {
        Self {
            iterations: report.iterations,
            halted: report.halted.clone(),
        }
    }
}

fn sync_timestep(world: &World, prediction: &mut PredictionContext) {
    if let Some(time) = world.get_resource::<Time<Fixed>>() {
        prediction.config.timestep = time.timestep();
    }
}

/// Anchor every shadow to its authoritative entity, outside of prediction runs
pub(crate) fn anchor_shadow_objects(world: &mut World) {
    world.try_resource_scope(|world, mut prediction: Mut<PredictionContext>| {
        sync_timestep(world, &mut prediction);
        if prediction.config.anchor_between_runs {
            prediction.anchor(world);
        }
    });
}

/// Run a prediction of `iterations` steps with the [`PredictionContext`] of the world,
/// then trigger [`PredictionCompleted`].
pub fn run_prediction(world: &mut World, iterations: usize) -> Result<RunReport, PredictionError> {
    let report = world
        .try_resource_scope(|world, mut prediction: Mut<PredictionContext>| {
            sync_timestep(world, &mut prediction);
            prediction.simulate(world, iterations)
        })
        .ok_or(PredictionError::MissingContext)??;
    world.trigger(PredictionCompleted::from(&report));
    Ok(report)
}

pub trait PredictionCommandsExt {
    /// Queue a prediction run of `iterations` steps. [`PredictionCompleted`] is triggered when it completes.
    fn simulate_prediction(&mut self, iterations: usize);
}

impl PredictionCommandsExt for Commands<'_, '_> {
    fn simulate_prediction(&mut self, iterations: usize) {
        self.queue(move |world: &mut World| {
            if let Err(e) = run_prediction(world, iterations) {
                error!(?e, "Prediction run failed");
            }
        });
    }
}

impl Plugin for PredictionPlugin {
    fn build(&self, app: &mut App) {
        // RESOURCES
        app.insert_resource(PredictionContext::new(self.config.clone()));

        // SYSTEMS
        app.configure_sets(PostUpdate, PredictionSystems::Anchor);
        app.add_systems(
            PostUpdate,
            anchor_shadow_objects.in_set(PredictionSystems::Anchor),
        );
    }
}
