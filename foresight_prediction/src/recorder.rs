//! Records the pose of tracked shadow entities at every step of a prediction run
use crate::registry::{ObjectRegistry, ShadowHandle};
use crate::spawn::SpawnSlots;
use crate::PredictionRecorder;
use alloc::vec::Vec;
use bevy_platform::collections::HashMap;
use foresight_core::prelude::*;
use foresight_physics::events::{CollisionEvents, ContactEvent, ContactKind};
use foresight_physics::world::ShadowWorlds;
use tracing::{debug, trace, warn};

/// An entry whose shadow is recorded: a registered entity with a [`PredictionRecorder`], or a spawn slot
pub type Tracked = CollisionTarget;

#[derive(Debug, Default)]
pub struct Recorder {
    timelines: HashMap<Tracked, Timeline>,
}

/// A tracked shadow, with its recording settings for the current run
struct TrackedShadow {
    tracked: Tracked,
    shadow: ShadowHandle,
    settings: PredictionRecorder,
}

impl Recorder {
    pub fn timeline(&self, tracked: Tracked) -> Option<&Timeline> {
        self.timelines.get(&tracked)
    }

    pub fn timelines(&self) -> impl Iterator<Item = (Tracked, &Timeline)> {
        self.timelines.iter().map(|(tracked, timeline)| (*tracked, timeline))
    }

    pub(crate) fn remove(&mut self, tracked: Tracked) -> Option<Timeline> {
        self.timelines.remove(&tracked)
    }

    /// Start a new run: clear every timeline and reset the contact state of the shadow worlds.
    ///
    /// Spawn slots must be activated right after.
    pub(crate) fn prepare(
        &mut self,
        registry: &ObjectRegistry,
        slots: &SpawnSlots,
        worlds: &mut ShadowWorlds,
    ) {
        self.timelines.clear();
        for pair in registry
            .iter()
            .filter(|pair| pair.capabilities.recorder.is_some())
        {
            self.timelines
                .insert(Tracked::Object(pair.original), Timeline::default());
        }
        for (id, _) in slots.iter() {
            self.timelines.insert(Tracked::Slot(id), Timeline::default());
        }
        for mode in SpatialMode::ALL {
            if let Some(shadow_world) = worlds.get_mut(mode) {
                shadow_world.reset_contacts();
            }
        }
        debug!(tracked = self.timelines.len(), "Recorder prepared");
    }

    /// Record the state of every tracked shadow after the step `step` (0-indexed).
    ///
    /// Returns the entries that got halted during this step.
    pub(crate) fn iterate(
        &mut self,
        step: usize,
        registry: &ObjectRegistry,
        slots: &SpawnSlots,
        worlds: &mut ShadowWorlds,
        freeze_on_block: bool,
    ) -> Vec<Tracked> {
        let mut halted = Vec::new();
        for mode in SpatialMode::ALL {
            let Some((backend, shadow_world)) = worlds.get_with_backend_mut(mode) else {
                continue;
            };
            let world = shadow_world.world_mut();
            let events = world
                .get_resource_mut::<CollisionEvents>()
                .map(|mut events| events.drain())
                .unwrap_or_default();

            let tracked = self.tracked_in(mode, registry, slots);
            let mut blocked: Vec<Tracked> = Vec::new();
            for event in events.iter().filter(|e| e.kind == ContactKind::Started) {
                for entry in &tracked {
                    let Some(record) = self.collision(step, mode, entry, event, registry, slots)
                    else {
                        continue;
                    };
                    let timeline = self.timelines.entry(entry.tracked).or_default();
                    if timeline.is_halted() {
                        continue;
                    }
                    let blocker = record.blocker;
                    if entry.settings.collisions {
                        trace!(tracked = ?entry.tracked, target = ?record.record.target, step, "Collision");
                        timeline.add_collision(record.record);
                    }
                    if entry.settings.stop_on_blocker && blocker && !blocked.contains(&entry.tracked)
                    {
                        blocked.push(entry.tracked);
                    }
                }
            }

            for entry in &tracked {
                let Ok(shadow) = world.get_entity(entry.shadow.entity) else {
                    warn!(tracked = ?entry.tracked, "Cannot record: the shadow entity does not exist");
                    continue;
                };
                let Some(snapshot) = backend.read_state(&shadow).map(Snapshot::from) else {
                    warn!(tracked = ?entry.tracked, "Cannot record: the shadow entity has no position");
                    continue;
                };
                self.timelines
                    .entry(entry.tracked)
                    .or_default()
                    .push(snapshot);
            }

            for entry in tracked.iter().filter(|e| blocked.contains(&e.tracked)) {
                if let Some(timeline) = self.timelines.get_mut(&entry.tracked) {
                    timeline.halt();
                }
                if freeze_on_block && let Ok(mut shadow) = world.get_entity_mut(entry.shadow.entity) {
                    shadow.insert(Frozen);
                }
                debug!(tracked = ?entry.tracked, step, "Recording halted by a blocker");
                halted.push(entry.tracked);
            }
        }
        halted
    }

    /// Put the spawn slot instances back to sleep. Timelines stay readable until the next run.
    pub(crate) fn finish(&mut self, slots: &SpawnSlots, worlds: &mut ShadowWorlds) {
        slots.deactivate(worlds);
        trace!("Recorder finished");
    }

    /// The shadows of `mode` that are recorded during this run, that are not halted yet
    fn tracked_in(
        &self,
        mode: SpatialMode,
        registry: &ObjectRegistry,
        slots: &SpawnSlots,
    ) -> Vec<TrackedShadow> {
        let objects = registry
            .iter()
            .filter(|pair| pair.shadow.mode == mode)
            .filter_map(|pair| {
                let settings = pair.capabilities.recorder?;
                Some((Tracked::Object(pair.original), pair.shadow, settings))
            });
        let instances = slots
            .iter()
            .filter(|(_, slot)| slot.instance.mode == mode)
            .map(|(id, slot)| {
                let settings = slot.capabilities.recorder.unwrap_or_default();
                (Tracked::Slot(id), slot.instance, settings)
            });
        objects
            .chain(instances)
            .filter(|(tracked, _, _)| {
                self.timelines
                    .get(tracked)
                    .is_none_or(|timeline| !timeline.is_halted())
            })
            .map(|(tracked, shadow, settings)| TrackedShadow {
                tracked,
                shadow,
                settings,
            })
            .collect()
    }

    /// Convert a contact event into a collision record for `entry`, if `entry` is part of the contact.
    fn collision(
        &self,
        step: usize,
        mode: SpatialMode,
        entry: &TrackedShadow,
        event: &ContactEvent,
        registry: &ObjectRegistry,
        slots: &SpawnSlots,
    ) -> Option<ResolvedCollision> {
        let other = event.other(entry.shadow.entity)?;
        let other_handle = ShadowHandle::new(mode, other);
        let (target, capabilities) = if let Some(pair) = registry
            .original_of(other_handle)
            .and_then(|original| registry.get(original))
        {
            (CollisionTarget::Object(pair.original), pair.capabilities)
        } else if let Some((id, slot)) = slots
            .slot_of(other_handle)
            .and_then(|id| slots.get(id).map(|slot| (id, slot)))
        {
            (CollisionTarget::Slot(id), slot.capabilities)
        } else {
            warn!(tracked = ?entry.tracked, ?other, ?mode, "Skipping contact with an unknown shadow entity");
            return None;
        };
        // the event is expressed from entity1 to entity2; flip it if the recorded body is entity2
        let flip = event.entity2 == entry.shadow.entity;
        let sign = if flip { -1.0 } else { 1.0 };
        let contacts = event
            .contacts
            .iter()
            .map(|contact| ContactPoint {
                normal: contact.normal * sign,
                ..*contact
            })
            .collect();
        Some(ResolvedCollision {
            blocker: capabilities.blocker,
            record: CollisionRecord {
                step,
                target,
                contacts,
                impulse: event.impulse * -sign,
                relative_velocity: event.relative_velocity * sign,
            },
        })
    }
}

struct ResolvedCollision {
    /// The other body is a blocker
    blocker: bool,
    record: CollisionRecord,
}
