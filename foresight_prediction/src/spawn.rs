//! Spawn slots: shadow instances of entities that don't exist yet in the authoritative world.
//!
//! A slot is created from a template entity (usually a disabled prefab in the authoritative world).
//! Its shadow instance is spawned once and reused across runs. The instance stays [`Dormant`]
//! outside of prediction runs.
use crate::anchor::anchor_entity;
use crate::registry::{Capabilities, ShadowHandle};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use bevy_ecs::entity::Entity;
use bevy_ecs::world::{EntityRef, EntityWorldMut, World};
use bevy_platform::collections::HashMap;
use foresight_core::prelude::*;
use foresight_physics::world::ShadowWorlds;
use tracing::{trace, warn};

/// Called on the slot instance at the start of every run, after it was anchored to its template.
pub type ActivationCallback = Box<dyn FnMut(&mut EntityWorldMut) + Send + Sync>;

pub struct SpawnSlot {
    pub template: Entity,
    pub instance: ShadowHandle,
    /// Read from the template. The instance is always recorded.
    pub capabilities: Capabilities,
    on_activate: ActivationCallback,
}

impl core::fmt::Debug for SpawnSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpawnSlot")
            .field("template", &self.template)
            .field("instance", &self.instance)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct SpawnSlots {
    // ordered so that slots are activated in creation order
    slots: BTreeMap<SpawnSlotId, SpawnSlot>,
    instances: HashMap<ShadowHandle, SpawnSlotId>,
    next_id: u32,
}

/// Capabilities of a slot instance created from `template`
pub(crate) fn slot_capabilities(template: &EntityRef) -> Capabilities {
    let capabilities = Capabilities::of(template);
    Capabilities {
        recorder: Some(capabilities.recorder.unwrap_or_default()),
        ..capabilities
    }
}

impl SpawnSlots {
    pub(crate) fn insert(
        &mut self,
        template: Entity,
        instance: ShadowHandle,
        capabilities: Capabilities,
        on_activate: ActivationCallback,
    ) -> SpawnSlotId {
        let id = SpawnSlotId(self.next_id);
        self.next_id += 1;
        self.instances.insert(instance, id);
        self.slots.insert(
            id,
            SpawnSlot {
                template,
                instance,
                capabilities,
                on_activate,
            },
        );
        id
    }

    pub(crate) fn remove(&mut self, id: SpawnSlotId) -> Option<SpawnSlot> {
        let slot = self.slots.remove(&id)?;
        self.instances.remove(&slot.instance);
        Some(slot)
    }

    /// Remove every slot whose instance lives in the shadow world of `mode`
    pub(crate) fn remove_mode(&mut self, mode: SpatialMode) -> Vec<SpawnSlotId> {
        let ids: Vec<SpawnSlotId> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.instance.mode == mode)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            self.remove(*id);
        }
        ids
    }

    pub fn get(&self, id: SpawnSlotId) -> Option<&SpawnSlot> {
        self.slots.get(&id)
    }

    /// Returns the slot that owns this shadow instance
    pub fn slot_of(&self, instance: ShadowHandle) -> Option<SpawnSlotId> {
        self.instances.get(&instance).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpawnSlotId, &SpawnSlot)> {
        self.slots.iter().map(|(id, slot)| (*id, slot))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Re-anchor every instance to its template, wake it up and run its activation callback.
    ///
    /// The capabilities of the slot are read again from the template.
    pub(crate) fn activate(&mut self, authoritative: &World, worlds: &mut ShadowWorlds) {
        for (id, slot) in self.slots.iter_mut() {
            let Ok(template) = authoritative.get_entity(slot.template) else {
                warn!(slot = %id, template = ?slot.template, "Cannot activate spawn slot: the template entity does not exist");
                continue;
            };
            let Some((backend, shadow_world)) = worlds.get_with_backend_mut(slot.instance.mode)
            else {
                warn!(slot = %id, "Cannot activate spawn slot: the shadow world is not loaded");
                continue;
            };
            let Ok(mut instance) = shadow_world.world_mut().get_entity_mut(slot.instance.entity)
            else {
                warn!(slot = %id, "Cannot activate spawn slot: the instance does not exist");
                continue;
            };
            slot.capabilities = slot_capabilities(&template);
            anchor_entity(backend, &template, &mut instance);
            // the template is usually disabled, but the instance must be simulated during the run
            instance.remove::<(Dormant, Frozen)>();
            (slot.on_activate)(&mut instance);
            trace!(slot = %id, "Activated spawn slot");
        }
    }

    /// Put every instance back to sleep
    pub(crate) fn deactivate(&self, worlds: &mut ShadowWorlds) {
        for (id, slot) in self.slots.iter() {
            let Some(shadow_world) = worlds.get_mut(slot.instance.mode) else {
                continue;
            };
            if let Ok(mut instance) = shadow_world.world_mut().get_entity_mut(slot.instance.entity)
            {
                instance.insert((Dormant, Frozen));
            }
        }
    }
}
