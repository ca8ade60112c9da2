//! Tracks the (authoritative entity, shadow entity) pairs
use crate::{PredictionBlocker, PredictionRecorder};
use alloc::vec::Vec;
use bevy_ecs::entity::{Entity, EntityHashMap};
use bevy_ecs::world::EntityRef;
use bevy_platform::collections::HashMap;
use foresight_core::mode::SpatialMode;

/// Identifies a shadow entity.
///
/// Entities of different shadow worlds can share the same id, so the mode is part of the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShadowHandle {
    pub mode: SpatialMode,
    pub entity: Entity,
}

impl ShadowHandle {
    pub fn new(mode: SpatialMode, entity: Entity) -> Self {
        Self { mode, entity }
    }
}

/// What the engine needs to know about an authoritative entity, read from its prediction markers.
///
/// Shadows don't need to carry the markers themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Settings used to record the shadow's pose during prediction runs, if it is recorded
    pub recorder: Option<PredictionRecorder>,
    /// Contact with the shadow can stop the recording of other bodies
    pub blocker: bool,
}

impl Capabilities {
    pub fn of(entity: &EntityRef) -> Self {
        Self {
            recorder: entity.get::<PredictionRecorder>().copied(),
            blocker: entity.contains::<PredictionBlocker>(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionPair {
    pub original: Entity,
    pub shadow: ShadowHandle,
    pub capabilities: Capabilities,
}

#[derive(Debug, Default)]
pub struct ObjectRegistry {
    pairs: EntityHashMap<PredictionPair>,
    originals: HashMap<ShadowHandle, Entity>,
}

impl ObjectRegistry {
    pub(crate) fn insert(&mut self, pair: PredictionPair) {
        self.originals.insert(pair.shadow, pair.original);
        self.pairs.insert(pair.original, pair);
    }

    pub(crate) fn remove(&mut self, original: Entity) -> Option<PredictionPair> {
        let pair = self.pairs.remove(&original)?;
        self.originals.remove(&pair.shadow);
        Some(pair)
    }

    /// Remove every pair whose shadow lives in the shadow world of `mode`
    pub(crate) fn remove_mode(&mut self, mode: SpatialMode) -> Vec<PredictionPair> {
        let originals: Vec<Entity> = self
            .pairs
            .values()
            .filter(|pair| pair.shadow.mode == mode)
            .map(|pair| pair.original)
            .collect();
        originals
            .into_iter()
            .filter_map(|original| self.remove(original))
            .collect()
    }

    pub fn get(&self, original: Entity) -> Option<&PredictionPair> {
        self.pairs.get(&original)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut PredictionPair> {
        self.pairs.values_mut()
    }

    pub fn contains(&self, original: Entity) -> bool {
        self.pairs.contains_key(&original)
    }

    pub fn shadow_of(&self, original: Entity) -> Option<ShadowHandle> {
        self.pairs.get(&original).map(|pair| pair.shadow)
    }

    pub fn original_of(&self, shadow: ShadowHandle) -> Option<Entity> {
        self.originals.get(&shadow).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PredictionPair> {
        self.pairs.values()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
