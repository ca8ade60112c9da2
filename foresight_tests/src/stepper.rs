use bevy_app::{App, TaskPoolPlugin};
use bevy_ecs::bundle::Bundle;
use bevy_ecs::entity::Entity;
use bevy_ecs::world::{Mut, World};
use bevy_time::{Fixed, Time, TimePlugin, TimeUpdateStrategy};
use core::time::Duration;
use foresight::prelude::*;
use tracing::info;

/// Stepper with a single App running the [`PredictionPlugin`].
///
/// Time is advanced manually by one fixed timestep per frame.
pub struct PredictionStepper {
    pub app: App,
    pub frame_duration: Duration,
    pub frame: usize,
}

impl Default for PredictionStepper {
    fn default() -> Self {
        Self::new(PredictionConfig::default())
    }
}

impl PredictionStepper {
    pub fn new(config: PredictionConfig) -> Self {
        let frame_duration = config.timestep;
        let mut app = App::new();
        app.add_plugins(TaskPoolPlugin::default());
        app.add_plugins(TimePlugin);
        app.insert_resource(Time::<Fixed>::from_duration(frame_duration));
        app.insert_resource(TimeUpdateStrategy::ManualDuration(frame_duration));
        app.add_plugins(PredictionPlugin { config });
        app.finish();
        app.cleanup();
        Self {
            app,
            frame_duration,
            frame: 0,
        }
    }

    pub fn with_timestep(timestep: Duration) -> Self {
        Self::new(PredictionConfig::default().with_timestep(timestep))
    }

    pub fn world(&self) -> &World {
        self.app.world()
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }

    pub fn context(&self) -> &PredictionContext {
        self.app.world().resource::<PredictionContext>()
    }

    pub fn context_mut(&mut self) -> Mut<'_, PredictionContext> {
        self.app.world_mut().resource_mut::<PredictionContext>()
    }

    /// Spawn an entity in the authoritative world and apply the commands queued by its hooks
    pub fn spawn(&mut self, bundle: impl Bundle) -> Entity {
        let world = self.app.world_mut();
        let entity = world.spawn(bundle).id();
        world.flush();
        entity
    }

    /// Run the app for `n` frames
    pub fn frame_step(&mut self, n: usize) {
        for _ in 0..n {
            self.frame += 1;
            info!(frame = self.frame, "Frame step");
            self.app.update();
        }
    }

    /// Run a prediction of `iterations` steps
    pub fn simulate(&mut self, iterations: usize) -> RunReport {
        run_prediction(self.app.world_mut(), iterations).expect("prediction run failed")
    }

    pub fn timeline(&self, entity: Entity) -> &Timeline {
        self.context()
            .timeline(entity)
            .expect("entity has no timeline")
    }

    pub fn slot_timeline(&self, slot: SpawnSlotId) -> &Timeline {
        self.context()
            .slot_timeline(slot)
            .expect("spawn slot has no timeline")
    }

    /// Read a component on the shadow of `entity`
    pub fn shadow_get<C: bevy_ecs::component::Component + Clone>(&self, entity: Entity) -> Option<C> {
        let context = self.context();
        let handle = context.shadow_of(entity)?;
        context
            .shadow_world(handle.mode)?
            .world()
            .get::<C>(handle.entity)
            .cloned()
    }

    /// Number of shadow entities in the shadow world of `mode`
    pub fn shadow_count(&mut self, mode: SpatialMode) -> usize {
        let mut context = self.context_mut();
        let Some(shadow_world) = context.shadow_world_mut(mode) else {
            return 0;
        };
        let world = shadow_world.world_mut();
        world.query::<&Shadow>().iter(world).count()
    }
}
