//! Speculative prediction of physics outcomes.
//!
//! Entities marked with [`PredictionObject`] get a shadow copy in an isolated physics world.
//! A prediction run steps the shadow worlds ahead of time and records the pose of the shadows at
//! every step, without ever touching the authoritative world.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use crate::context::PredictionContext;
use bevy_ecs::component::Component;
use bevy_ecs::lifecycle::HookContext;
use bevy_ecs::reflect::ReflectComponent;
use bevy_ecs::world::{DeferredWorld, Mut, World};
use bevy_reflect::Reflect;
use foresight_core::mode::SpatialMode;
use tracing::error;

pub(crate) mod anchor;
pub mod config;
pub mod context;
pub mod error;
pub mod manifest;
pub mod plugin;
pub mod recorder;
pub mod registry;
pub mod spawn;

pub mod prelude {
    pub use crate::config::PredictionConfig;
    pub use crate::context::{PredictionContext, RunReport, RunState};
    pub use crate::error::PredictionError;
    pub use crate::manifest::{ComponentKind, ComponentManifest, Persistence};
    pub use crate::plugin::{
        PredictionCommandsExt, PredictionCompleted, PredictionPlugin, PredictionSystems,
        run_prediction,
    };
    pub use crate::recorder::{Recorder, Tracked};
    pub use crate::registry::{Capabilities, ShadowHandle};
    pub use crate::{PredictionBlocker, PredictionObject, PredictionRecorder};
}

/// Marks an entity of the authoritative world for prediction.
///
/// When the component is added, the entity gets registered in the [`PredictionContext`] resource
/// (if present) and a shadow copy is created. When it is removed or the entity is despawned,
/// the shadow is destroyed.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Reflect)]
#[component(on_add = PredictionObject::on_add, on_remove = PredictionObject::on_remove)]
#[reflect(Component)]
pub struct PredictionObject {
    /// Spatial mode of the entity. If `None`, the mode is inferred from the entity's collider.
    pub mode: Option<SpatialMode>,
}

impl PredictionObject {
    pub fn new(mode: SpatialMode) -> Self {
        Self { mode: Some(mode) }
    }

    fn on_add(mut world: DeferredWorld, context: HookContext) {
        let entity = context.entity;
        if !world.contains_resource::<PredictionContext>() {
            return;
        }
        // registration needs to read every component of the entity, so wait until it is fully inserted
        world.commands().queue(move |world: &mut World| {
            world.try_resource_scope(|world, mut prediction: Mut<PredictionContext>| {
                if let Err(e) = prediction.register(world, entity) {
                    error!(?entity, ?e, "Failed to register prediction object");
                }
            });
        });
    }

    fn on_remove(mut world: DeferredWorld, context: HookContext) {
        let Some(mut prediction) = world.get_resource_mut::<PredictionContext>() else {
            return;
        };
        prediction.unregister(context.entity);
    }
}

/// Record the pose of this entity's shadow during prediction runs
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct PredictionRecorder {
    /// Record the contacts that start on the shadow
    pub collisions: bool,
    /// Stop recording when the shadow touches a [`PredictionBlocker`]
    pub stop_on_blocker: bool,
}

impl Default for PredictionRecorder {
    fn default() -> Self {
        Self {
            collisions: true,
            stop_on_blocker: true,
        }
    }
}

/// Contact with the shadow of this entity stops the recording of [`PredictionRecorder`] shadows
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct PredictionBlocker;
