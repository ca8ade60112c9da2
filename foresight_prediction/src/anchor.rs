//! Anchoring: synchronizing shadow entities with their authoritative counterparts
use crate::registry::{ObjectRegistry, PredictionPair};
use bevy_ecs::entity_disabling::Disabled;
use bevy_ecs::world::{EntityRef, EntityWorldMut, World};
use foresight_core::prelude::*;
use foresight_physics::backend::PhysicsBackend;
use foresight_physics::world::ShadowWorlds;
use tracing::{trace, warn};

/// Copy the [`BodyState`] of `source` onto `target`, as read and written by `backend`.
///
/// A disabled source makes its shadow [`Dormant`]. Returns false if `source` has no position.
pub fn anchor_entity(
    backend: &dyn PhysicsBackend,
    source: &EntityRef,
    target: &mut EntityWorldMut,
) -> bool {
    let Some(state) = backend.read_state(source) else {
        return false;
    };
    backend.write_state(&state, target);
    if source.contains::<Disabled>() {
        target.insert(Dormant);
    } else {
        target.remove::<Dormant>();
    }
    true
}

/// Anchor every registered shadow to its original.
///
/// Pairs whose original or shadow can't be found are skipped.
pub(crate) fn anchor_all(authoritative: &World, registry: &ObjectRegistry, worlds: &mut ShadowWorlds) {
    for pair in registry.iter() {
        anchor_pair(authoritative, pair, worlds);
    }
}

fn anchor_pair(authoritative: &World, pair: &PredictionPair, worlds: &mut ShadowWorlds) {
    let Ok(source) = authoritative.get_entity(pair.original) else {
        warn!(original = ?pair.original, "Cannot anchor shadow: the original entity does not exist");
        return;
    };
    let Some((backend, shadow_world)) = worlds.get_with_backend_mut(pair.shadow.mode) else {
        warn!(mode = ?pair.shadow.mode, "Cannot anchor shadow: the shadow world is not loaded");
        return;
    };
    let Ok(mut target) = shadow_world.world_mut().get_entity_mut(pair.shadow.entity) else {
        warn!(shadow = ?pair.shadow, "Cannot anchor shadow: the shadow entity does not exist");
        return;
    };
    if !anchor_entity(backend, &source, &mut target) {
        warn!(original = ?pair.original, "Cannot anchor shadow: the original entity has no position");
        return;
    }
    trace!(original = ?pair.original, shadow = ?pair.shadow, "Anchored shadow");
}

/// Freeze or release every registered shadow
pub(crate) fn set_frozen(registry: &ObjectRegistry, worlds: &mut ShadowWorlds, frozen: bool) {
    for pair in registry.iter() {
        let Some(shadow_world) = worlds.get_mut(pair.shadow.mode) else {
            continue;
        };
        let Ok(mut target) = shadow_world.world_mut().get_entity_mut(pair.shadow.entity) else {
            continue;
        };
        if frozen {
            target.insert(Frozen);
        } else {
            target.remove::<Frozen>();
        }
    }
}
