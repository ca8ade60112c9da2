//! The prediction engine: owns the shadow worlds and drives prediction runs
use crate::PredictionObject;
use crate::anchor::{anchor_all, anchor_entity, set_frozen};
use crate::config::PredictionConfig;
use crate::error::PredictionError;
use crate::manifest::ComponentManifest;
use crate::recorder::{Recorder, Tracked};
use crate::registry::{Capabilities, ObjectRegistry, PredictionPair, ShadowHandle};
use crate::spawn::{SpawnSlots, slot_capabilities};
use alloc::boxed::Box;
use alloc::vec::Vec;
use bevy_ecs::entity::Entity;
use bevy_ecs::resource::Resource;
use bevy_ecs::world::{EntityRef, EntityWorldMut, World};
use core::time::Duration;
use foresight_core::prelude::*;
use foresight_physics::backend::PhysicsBackend;
use foresight_physics::world::{ShadowWorld, ShadowWorlds};
use tracing::{debug, trace};

/// Phase of the prediction driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Anchoring,
    Stepping {
        step: usize,
        of: usize,
    },
    Finalizing,
}

/// Summary of a completed prediction run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub iterations: usize,
    pub timestep: Duration,
    /// Entries whose recording was stopped early by a blocker
    pub halted: Vec<Tracked>,
}

pub type RunObserver = Box<dyn FnMut(&RunReport, &Recorder) + Send + Sync>;

/// Predicts future physics outcomes by stepping shadow copies of authoritative entities
/// in isolated [`ShadowWorld`]s.
///
/// The authoritative world is only ever borrowed immutably.
#[derive(Resource)]
pub struct PredictionContext {
    pub config: PredictionConfig,
    worlds: ShadowWorlds,
    registry: ObjectRegistry,
    manifest: ComponentManifest,
    slots: SpawnSlots,
    recorder: Recorder,
    state: RunState,
    observers: Vec<RunObserver>,
}

impl core::fmt::Debug for PredictionContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PredictionContext")
            .field("config", &self.config)
            .field("worlds", &self.worlds)
            .field("registry", &self.registry)
            .field("slots", &self.slots)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Default for PredictionContext {
    fn default() -> Self {
        Self::new(PredictionConfig::default())
    }
}

impl PredictionContext {
    pub fn new(config: PredictionConfig) -> Self {
        Self {
            config,
            worlds: ShadowWorlds::default(),
            registry: ObjectRegistry::default(),
            manifest: ComponentManifest::default(),
            slots: SpawnSlots::default(),
            recorder: Recorder::default(),
            state: RunState::Idle,
            observers: Vec::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn slots(&self) -> &SpawnSlots {
        &self.slots
    }

    pub fn manifest(&self) -> &ComponentManifest {
        &self.manifest
    }

    /// Register components to copy onto shadows. Only affects shadows created afterwards.
    pub fn manifest_mut(&mut self) -> &mut ComponentManifest {
        &mut self.manifest
    }

    /// Replace the physics backend of a mode. Must be called before the shadow world of that mode is loaded.
    pub fn set_backend(&mut self, mode: SpatialMode, backend: impl PhysicsBackend) {
        self.worlds.set_backend(mode, backend);
    }

    /// Add a function called at the end of every run
    pub fn add_observer(
        &mut self,
        observer: impl FnMut(&RunReport, &Recorder) + Send + Sync + 'static,
    ) {
        self.observers.push(Box::new(observer));
    }

    pub fn shadow_world(&self, mode: SpatialMode) -> Option<&ShadowWorld> {
        self.worlds.get(mode)
    }

    pub fn shadow_world_mut(&mut self, mode: SpatialMode) -> Option<&mut ShadowWorld> {
        self.worlds.get_mut(mode)
    }

    /// Explicitly create the shadow world of `mode`.
    ///
    /// Errors if it is already loaded. Registration loads worlds lazily, so this is rarely needed.
    pub fn load_world(&mut self, mode: SpatialMode) -> Result<&mut ShadowWorld, PredictionError> {
        Ok(self.worlds.load(mode)?)
    }

    /// Drop the shadow world of `mode`, along with every pair, spawn slot and timeline that refers to it.
    ///
    /// Returns false if the world was not loaded.
    pub fn unload_world(&mut self, mode: SpatialMode) -> bool {
        if !self.worlds.unload(mode) {
            return false;
        }
        for pair in self.registry.remove_mode(mode) {
            self.recorder.remove(Tracked::Object(pair.original));
        }
        for id in self.slots.remove_mode(mode) {
            self.recorder.remove(Tracked::Slot(id));
        }
        true
    }

    /// The [`SpatialMode`] of an authoritative entity: the one set on its [`PredictionObject`],
    /// otherwise the one inferred from its collider, otherwise [`PredictionConfig::fallback_mode`].
    fn resolve_mode(&self, source: &EntityRef) -> Result<SpatialMode, PredictionError> {
        source
            .get::<PredictionObject>()
            .and_then(|object| object.mode)
            .or_else(|| self.worlds.infer_mode(source, self.config.fallback_mode))
            .ok_or(PredictionError::UnknownSpatialMode(source.id()))
    }

    /// Read the capabilities of every registered entity again, so that markers added or removed
    /// since registration are taken into account.
    fn refresh_capabilities(&mut self, world: &World) {
        for pair in self.registry.iter_mut() {
            if let Ok(source) = world.get_entity(pair.original) {
                pair.capabilities = Capabilities::of(&source);
            }
        }
    }

    /// Create the shadow counterpart of `entity`.
    ///
    /// The shadow world of the entity's [`SpatialMode`] is loaded if needed. The shadow only keeps the
    /// components listed in the [`ComponentManifest`]. Registering an entity twice returns the existing shadow.
    pub fn register(
        &mut self,
        world: &World,
        entity: Entity,
    ) -> Result<ShadowHandle, PredictionError> {
        if let Some(pair) = self.registry.get(entity) {
            trace!(?entity, "Entity is already registered");
            return Ok(pair.shadow);
        }
        let source = world
            .get_entity(entity)
            .map_err(|_| PredictionError::EntityNotFound(entity))?;
        let mode = self.resolve_mode(&source)?;
        if self.worlds.backend(mode).read_state(&source).is_none() {
            return Err(PredictionError::MissingTransform(entity));
        }
        let capabilities = Capabilities::of(&source);

        let (backend, shadow_world) = self.worlds.validate_with_backend(mode);
        let mut shadow = shadow_world
            .world_mut()
            .spawn((Shadow { original: entity }, Frozen));
        self.manifest.apply(&source, &mut shadow);
        anchor_entity(backend, &source, &mut shadow);
        let handle = ShadowHandle::new(mode, shadow.id());

        self.registry.insert(PredictionPair {
            original: entity,
            shadow: handle,
            capabilities,
        });
        debug!(?entity, shadow = ?handle, ?capabilities, "Registered prediction object");
        Ok(handle)
    }

    /// Despawn the shadow counterpart of `entity` and drop its timeline.
    ///
    /// Returns false if the entity was not registered.
    pub fn unregister(&mut self, entity: Entity) -> bool {
        let Some(pair) = self.registry.remove(entity) else {
            return false;
        };
        if let Some(shadow_world) = self.worlds.get_mut(pair.shadow.mode) {
            shadow_world.world_mut().despawn(pair.shadow.entity);
        }
        self.recorder.remove(Tracked::Object(entity));
        debug!(?entity, shadow = ?pair.shadow, "Unregistered prediction object");
        true
    }

    /// Create a spawn slot from the `template` entity of the authoritative world.
    ///
    /// The slot instance is simulated and recorded during every run. `on_activate` is called
    /// on the instance at the start of each run, for example to apply a launch velocity.
    pub fn add_spawn_slot(
        &mut self,
        world: &World,
        template: Entity,
        on_activate: impl FnMut(&mut EntityWorldMut) + Send + Sync + 'static,
    ) -> Result<SpawnSlotId, PredictionError> {
        let source = world
            .get_entity(template)
            .map_err(|_| PredictionError::EntityNotFound(template))?;
        let mode = self.resolve_mode(&source)?;
        let backend = self.worlds.backend(mode);
        if !backend.is_body(&source) {
            return Err(PredictionError::MissingBody(template));
        }
        if backend.read_state(&source).is_none() {
            return Err(PredictionError::MissingTransform(template));
        }

        let shadow_world = self.worlds.validate(mode);
        let mut instance = shadow_world
            .world_mut()
            .spawn((Shadow { original: template }, Dormant, Frozen));
        self.manifest.apply(&source, &mut instance);
        let handle = ShadowHandle::new(mode, instance.id());
        let id = self.slots.insert(
            template,
            handle,
            slot_capabilities(&source),
            Box::new(on_activate),
        );
        debug!(slot = %id, ?template, instance = ?handle, "Added spawn slot");
        Ok(id)
    }

    /// Despawn the instance of a spawn slot and drop its timeline.
    ///
    /// Returns false if the slot doesn't exist.
    pub fn remove_spawn_slot(&mut self, id: SpawnSlotId) -> bool {
        let Some(slot) = self.slots.remove(id) else {
            return false;
        };
        if let Some(shadow_world) = self.worlds.get_mut(slot.instance.mode) {
            shadow_world.world_mut().despawn(slot.instance.entity);
        }
        self.recorder.remove(Tracked::Slot(id));
        debug!(slot = %id, "Removed spawn slot");
        true
    }

    /// Copy the state of every authoritative entity onto its shadow.
    ///
    /// Does nothing while a run is in progress.
    pub fn anchor(&mut self, world: &World) {
        if self.state != RunState::Idle {
            trace!(state = ?self.state, "Skipping anchoring during a prediction run");
            return;
        }
        anchor_all(world, &self.registry, &mut self.worlds);
    }

    /// Run a prediction of `iterations` steps of [`PredictionConfig::timestep`].
    ///
    /// The shadows are anchored to the current state of `world`, every loaded shadow world is stepped
    /// `iterations` times and the pose of every tracked shadow is recorded after each step.
    /// `world` is never modified.
    pub fn simulate(
        &mut self,
        world: &World,
        iterations: usize,
    ) -> Result<RunReport, PredictionError> {
        if self.state != RunState::Idle {
            return Err(PredictionError::RunInProgress);
        }
        let timestep = self.config.timestep;
        debug!(?iterations, ?timestep, "Starting prediction run");

        self.state = RunState::Anchoring;
        self.refresh_capabilities(world);
        anchor_all(world, &self.registry, &mut self.worlds);
        set_frozen(&self.registry, &mut self.worlds, false);
        self.recorder
            .prepare(&self.registry, &self.slots, &mut self.worlds);
        self.slots.activate(world, &mut self.worlds);

        let mut halted = Vec::new();
        for step in 0..iterations {
            self.state = RunState::Stepping {
                step,
                of: iterations,
            };
            self.worlds.simulate_all(timestep);
            halted.extend(self.recorder.iterate(
                step,
                &self.registry,
                &self.slots,
                &mut self.worlds,
                self.config.freeze_on_block,
            ));
        }

        self.state = RunState::Finalizing;
        self.recorder.finish(&self.slots, &mut self.worlds);
        set_frozen(&self.registry, &mut self.worlds, true);
        anchor_all(world, &self.registry, &mut self.worlds);
        self.state = RunState::Idle;

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("prediction::runs").increment(1);
            metrics::counter!("prediction::steps").increment(iterations as u64);
            metrics::counter!("prediction::halted").increment(halted.len() as u64);
        }

        let report = RunReport {
            iterations,
            timestep,
            halted,
        };
        let mut observers = core::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            observer(&report, &self.recorder);
        }
        self.observers = observers;
        debug!(?iterations, halted = report.halted.len(), "Prediction run completed");
        Ok(report)
    }

    pub fn shadow_of(&self, original: Entity) -> Option<ShadowHandle> {
        self.registry.shadow_of(original)
    }

    pub fn original_of(&self, shadow: ShadowHandle) -> Option<Entity> {
        self.registry.original_of(shadow)
    }

    /// Timeline of a registered entity during the last run
    pub fn timeline(&self, original: Entity) -> Option<&Timeline> {
        self.recorder.timeline(Tracked::Object(original))
    }

    /// Timeline of a spawn slot instance during the last run
    pub fn slot_timeline(&self, id: SpawnSlotId) -> Option<&Timeline> {
        self.recorder.timeline(Tracked::Slot(id))
    }
}
