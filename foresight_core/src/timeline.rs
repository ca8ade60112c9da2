use crate::contact::ContactManifold;
use crate::shadow::SpawnSlotId;
use crate::state::Snapshot;
use alloc::vec::Vec;
use bevy_ecs::entity::Entity;
use bevy_math::Vec3;
use core::fmt::Debug;
use tracing::{debug, trace};

/// Identifies the authoritative side of a shadow entity that was involved in a collision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionTarget {
    /// A registered authoritative entity
    Object(Entity),
    /// The instance of a spawn slot
    Slot(SpawnSlotId),
}

/// A contact that started on a tracked shadow body during a prediction run
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionRecord {
    /// Index of the step (in the [`Timeline`]) during which the contact started
    pub step: usize,
    /// The authoritative counterpart of the shadow body that was hit
    pub target: CollisionTarget,
    /// Contact points, with normals pointing away from the recorded body
    pub contacts: ContactManifold,
    /// Impulse applied to the recorded body to resolve the contact
    pub impulse: Vec3,
    /// Velocity of the other body relative to the recorded body, before the contact was resolved
    pub relative_velocity: Vec3,
}

/// Timeline stores the pose of one shadow entity at every step of a prediction run,
/// along with the collisions it went through.
///
/// Index 0 is the state right after the first step following anchoring.
/// The timeline is cleared at the start of every run, and stays untouched between runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    // Ordered from the first step (front) to the most recent step (back).
    pub(crate) snapshots: Vec<Snapshot>,
    pub(crate) collisions: Vec<CollisionRecord>,
    // Step at which the recording was halted by a blocker.
    pub(crate) halted_at: Option<usize>,
}

impl Timeline {
    /// Number of recorded steps
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Snapshot of the first step
    pub fn first(&self) -> Option<&Snapshot> {
        self.snapshots.first()
    }

    /// Most recent snapshot
    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// Snapshot at the given step
    pub fn get(&self, step: usize) -> Option<&Snapshot> {
        self.snapshots.get(step)
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn collisions(&self) -> &[CollisionRecord] {
        &self.collisions
    }

    /// Iterate over the recorded positions, from the first step to the last
    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.snapshots.iter().map(|s| s.position)
    }

    /// Step at which the recording was stopped by contact with a blocker
    pub fn halted_at(&self) -> Option<usize> {
        self.halted_at
    }

    /// Returns true if no more snapshots will be recorded during this run
    pub fn is_halted(&self) -> bool {
        self.halted_at.is_some()
    }

    /// Reset the timeline for a new run
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.collisions.clear();
        self.halted_at = None;
    }

    /// Record the pose for the next step.
    ///
    /// Does nothing if the timeline was halted.
    pub fn push(&mut self, snapshot: Snapshot) {
        if self.is_halted() {
            trace!("Skipping snapshot for halted timeline");
            return;
        }
        self.snapshots.push(snapshot);
    }

    pub fn add_collision(&mut self, record: CollisionRecord) {
        self.collisions.push(record);
    }

    /// Stop recording. The last recorded snapshot becomes the final pose of the run.
    pub fn halt(&mut self) {
        if self.halted_at.is_none() {
            let step = self.snapshots.len().saturating_sub(1);
            debug!(?step, "Timeline halted");
            self.halted_at = Some(step);
        }
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a Snapshot;
    type IntoIter = core::slice::Iter<'a, Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshots.iter()
    }
}
