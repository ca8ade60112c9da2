//! Contact events produced by the physics step of a shadow world
use alloc::vec::Vec;
use bevy_ecs::entity::Entity;
use bevy_ecs::resource::Resource;
use bevy_math::Vec3;
use bevy_platform::collections::HashSet;
use foresight_core::contact::ContactManifold;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    /// The two bodies were not touching during the previous step
    Started,
    /// The two bodies were already touching during the previous step
    Persisted,
}

/// A contact between two shadow entities during one step
#[derive(Debug, Clone, PartialEq)]
pub struct ContactEvent {
    pub entity1: Entity,
    pub entity2: Entity,
    pub kind: ContactKind,
    /// Normals point from `entity1` towards `entity2`
    pub contacts: ContactManifold,
    /// Impulse applied to `entity2` to resolve the contact. `entity1` received the opposite impulse.
    pub impulse: Vec3,
    /// Velocity of `entity2` minus velocity of `entity1`, before the contact was resolved
    pub relative_velocity: Vec3,
}

impl ContactEvent {
    pub fn involves(&self, entity: Entity) -> bool {
        self.entity1 == entity || self.entity2 == entity
    }

    /// Returns the entity that `entity` is in contact with, if it is part of this contact
    pub fn other(&self, entity: Entity) -> Option<Entity> {
        if self.entity1 == entity {
            Some(self.entity2)
        } else if self.entity2 == entity {
            Some(self.entity1)
        } else {
            None
        }
    }
}

/// Collects the contact events of a shadow world.
///
/// Events accumulate until they are drained. The pairs touching during the previous step are kept
/// to tell apart contacts that just started from contacts that persist.
#[derive(Resource, Debug, Default)]
pub struct CollisionEvents {
    events: Vec<ContactEvent>,
    previous_pairs: HashSet<(Entity, Entity)>,
    current_pairs: HashSet<(Entity, Entity)>,
}

fn normalize_pair(a: Entity, b: Entity) -> (Entity, Entity) {
    if a <= b { (a, b) } else { (b, a) }
}

impl CollisionEvents {
    /// Must be called by the backend at the start of every step, before reporting contacts
    pub fn begin_step(&mut self) {
        core::mem::swap(&mut self.previous_pairs, &mut self.current_pairs);
        self.current_pairs.clear();
    }

    /// Report a contact between two entities for the current step
    pub fn report(
        &mut self,
        entity1: Entity,
        entity2: Entity,
        contacts: ContactManifold,
        impulse: Vec3,
        relative_velocity: Vec3,
    ) {
        let pair = normalize_pair(entity1, entity2);
        self.current_pairs.insert(pair);
        let kind = if self.previous_pairs.contains(&pair) {
            ContactKind::Persisted
        } else {
            ContactKind::Started
        };
        self.events.push(ContactEvent {
            entity1,
            entity2,
            kind,
            contacts,
            impulse,
            relative_velocity,
        });
    }

    /// Returns true if the two entities were touching during the last step
    pub fn is_touching(&self, a: Entity, b: Entity) -> bool {
        self.current_pairs.contains(&normalize_pair(a, b))
    }

    pub fn events(&self) -> &[ContactEvent] {
        &self.events
    }

    /// Iterate over the contacts that started since the events were last drained
    pub fn started(&self) -> impl Iterator<Item = &ContactEvent> {
        self.events
            .iter()
            .filter(|e| e.kind == ContactKind::Started)
    }

    pub fn drain(&mut self) -> Vec<ContactEvent> {
        core::mem::take(&mut self.events)
    }

    /// Drop pending events and forget which pairs are touching
    pub fn reset(&mut self) {
        self.events.clear();
        self.previous_pairs.clear();
        self.current_pairs.clear();
    }
}
