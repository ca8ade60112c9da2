//! Manages the isolated simulation spaces that hold shadow entities
use crate::avian_2d::Avian2dBackend;
use crate::avian_3d::Avian3dBackend;
use crate::backend::PhysicsBackend;
use crate::events::CollisionEvents;
use alloc::boxed::Box;
use bevy_app::App;
use bevy_ecs::world::{EntityRef, World};
use bevy_time::TimePlugin;
use core::time::Duration;
use foresight_core::mode::{PerMode, SpatialMode};
use tracing::{debug, trace, warn};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowWorldError {
    #[error("the {0} shadow world is already loaded")]
    AlreadyLoaded(SpatialMode),
}

/// An isolated simulation space holding only shadow entities.
///
/// Stepping it never touches the authoritative world.
pub struct ShadowWorld {
    mode: SpatialMode,
    world: World,
    steps: u64,
}

impl core::fmt::Debug for ShadowWorld {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShadowWorld")
            .field("mode", &self.mode)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl ShadowWorld {
    fn new(mode: SpatialMode, backend: &dyn PhysicsBackend) -> Self {
        let mut app = App::new();
        app.add_plugins(TimePlugin);
        app.init_resource::<CollisionEvents>();
        backend.build(&mut app);
        app.finish();
        app.cleanup();
        // schedules and observers live in the world, the app is only needed to build it
        let world = core::mem::take(app.world_mut());
        Self {
            mode,
            world,
            steps: 0,
        }
    }

    pub fn mode(&self) -> SpatialMode {
        self.mode
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Total number of steps simulated since the world was loaded
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Forget the contact pairs of previous steps, and drop pending events.
    pub fn reset_contacts(&mut self) {
        if let Some(mut events) = self.world.get_resource_mut::<CollisionEvents>() {
            events.reset();
        }
    }
}

/// Holds at most one [`ShadowWorld`] per [`SpatialMode`], along with the physics backend that steps it.
///
/// Worlds are created lazily, the first time an entity of that mode needs one.
pub struct ShadowWorlds {
    worlds: PerMode<Option<ShadowWorld>>,
    backends: PerMode<Box<dyn PhysicsBackend>>,
}

impl Default for ShadowWorlds {
    fn default() -> Self {
        Self {
            worlds: PerMode::default(),
            backends: PerMode::new(
                Box::new(Avian2dBackend::default()),
                Box::new(Avian3dBackend::default()),
            ),
        }
    }
}

impl core::fmt::Debug for ShadowWorlds {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShadowWorlds")
            .field("worlds", &self.worlds)
            .finish_non_exhaustive()
    }
}

impl ShadowWorlds {
    /// Replace the physics backend used for a mode.
    ///
    /// The backend only builds the world when it gets loaded, so this should be called
    /// before any entity of that mode is registered.
    pub fn set_backend(&mut self, mode: SpatialMode, backend: impl PhysicsBackend) {
        if self.is_loaded(mode) {
            warn!(
                ?mode,
                "Replacing the physics backend of a shadow world that is already loaded"
            );
        }
        *self.backends.get_mut(mode) = Box::new(backend);
    }

    pub fn backend(&self, mode: SpatialMode) -> &dyn PhysicsBackend {
        &**self.backends.get(mode)
    }

    /// Infer the [`SpatialMode`] of an entity from its collider.
    ///
    /// A collider of the 3D backend means 3D, a collider of the 2D backend means 2D.
    /// If the entity has neither, the `fallback` is used. Returns `None` if no mode can be determined.
    pub fn infer_mode(
        &self,
        entity: &EntityRef,
        fallback: Option<SpatialMode>,
    ) -> Option<SpatialMode> {
        [SpatialMode::Physics3d, SpatialMode::Physics2d]
            .into_iter()
            .find(|mode| self.backend(*mode).is_collider(entity))
            .or(fallback)
    }

    pub fn is_loaded(&self, mode: SpatialMode) -> bool {
        self.worlds.get(mode).is_some()
    }

    /// Modes for which a shadow world is loaded
    pub fn loaded_modes(&self) -> impl Iterator<Item = SpatialMode> + '_ {
        self.worlds
            .iter()
            .filter_map(|(mode, world)| world.as_ref().map(|_| mode))
    }

    pub fn get(&self, mode: SpatialMode) -> Option<&ShadowWorld> {
        self.worlds.get(mode).as_ref()
    }

    pub fn get_mut(&mut self, mode: SpatialMode) -> Option<&mut ShadowWorld> {
        self.worlds.get_mut(mode).as_mut()
    }

    /// The shadow world of this mode along with its backend, to read or write body states
    pub fn get_with_backend_mut(
        &mut self,
        mode: SpatialMode,
    ) -> Option<(&dyn PhysicsBackend, &mut ShadowWorld)> {
        let world = self.worlds.get_mut(mode).as_mut()?;
        Some((&**self.backends.get(mode), world))
    }

    /// Create the shadow world for this mode.
    ///
    /// Errors if the world is already loaded.
    pub fn load(&mut self, mode: SpatialMode) -> Result<&mut ShadowWorld, ShadowWorldError> {
        if self.is_loaded(mode) {
            return Err(ShadowWorldError::AlreadyLoaded(mode));
        }
        debug!(?mode, "Loading shadow world");
        let world = ShadowWorld::new(mode, &**self.backends.get(mode));
        Ok(self.worlds.get_mut(mode).insert(world))
    }

    /// Returns the shadow world for this mode, creating it if needed
    pub fn validate(&mut self, mode: SpatialMode) -> &mut ShadowWorld {
        self.validate_with_backend(mode).1
    }

    /// Same as [`ShadowWorlds::validate`], also returning the backend of the world
    pub fn validate_with_backend(
        &mut self,
        mode: SpatialMode,
    ) -> (&dyn PhysicsBackend, &mut ShadowWorld) {
        let backend = &**self.backends.get(mode);
        let world = self.worlds.get_mut(mode).get_or_insert_with(|| {
            debug!(?mode, "Loading shadow world");
            ShadowWorld::new(mode, backend)
        });
        (backend, world)
    }

    /// Drop the shadow world for this mode, along with all the shadow entities it contains.
    ///
    /// Returns false if the world was not loaded.
    pub fn unload(&mut self, mode: SpatialMode) -> bool {
        let unloaded = self.worlds.get_mut(mode).take().is_some();
        if unloaded {
            debug!(?mode, "Unloaded shadow world");
        }
        unloaded
    }

    /// Advance the shadow world of this mode by one step. Does nothing if the world is not loaded.
    pub fn simulate(&mut self, mode: SpatialMode, delta: Duration) {
        let Some(shadow) = self.worlds.get_mut(mode).as_mut() else {
            return;
        };
        trace!(?mode, step = shadow.steps, "Simulate shadow world");
        self.backends
            .get_mut(mode)
            .step(&mut shadow.world, delta);
        shadow.steps += 1;
    }

    /// Advance every loaded shadow world by one step
    pub fn simulate_all(&mut self, delta: Duration) {
        for mode in SpatialMode::ALL {
            self.simulate(mode, delta);
        }
    }
}
