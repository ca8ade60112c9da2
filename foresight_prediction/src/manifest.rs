//! Declares which components are copied from an authoritative entity to its shadow counterpart.
//!
//! Components that are not part of the [`ComponentManifest`] are stripped from shadows.
use alloc::boxed::Box;
use alloc::vec::Vec;
use bevy_ecs::component::Component;
use bevy_ecs::entity::Entity;
use bevy_ecs::world::{EntityRef, EntityWorldMut};
use core::any::{TypeId, type_name};
use tracing::trace;

/// [`ComponentKind`] is an internal wrapper around the type of the component
#[derive(Debug, Eq, Hash, Copy, Clone, PartialEq)]
pub struct ComponentKind(pub TypeId);

impl ComponentKind {
    pub fn of<C: 'static>() -> Self {
        Self(TypeId::of::<C>())
    }
}

impl From<TypeId> for ComponentKind {
    fn from(type_id: TypeId) -> Self {
        Self(type_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Required for the shadow to be simulated. Always copied.
    Essential,
    /// Registered by the user. Always copied.
    Persistent,
    /// Copied only if the persistence predicate accepts it
    Optional,
}

/// Copies the component from `source` to `target`. Returns false if `source` doesn't have it.
pub type CloneFn = fn(&EntityRef, &mut EntityWorldMut) -> bool;

pub type PersistencePredicate = Box<dyn Fn(Entity, ComponentKind) -> bool + Send + Sync>;

pub fn clone_component<C: Component + Clone>(
    source: &EntityRef,
    target: &mut EntityWorldMut,
) -> bool {
    let Some(component) = source.get::<C>() else {
        return false;
    };
    target.insert(component.clone());
    true
}

#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub kind: ComponentKind,
    pub name: &'static str,
    pub persistence: Persistence,
    pub clone: CloneFn,
}

pub struct ComponentManifest {
    entries: Vec<ManifestEntry>,
    predicate: Option<PersistencePredicate>,
}

impl core::fmt::Debug for ComponentManifest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ComponentManifest")
            .field("entries", &self.entries)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

/// Register the components that make up an avian body, for the 2D or the 3D engine
macro_rules! add_avian_essentials {
    ($manifest:ident, $avian:ident) => {{
        use $avian::prelude::{
            AngularDamping, Collider, Friction, GravityScale, LinearDamping, LockedAxes, Mass,
            Restitution, RigidBody,
        };
        $manifest.add_essential::<RigidBody>();
        $manifest.add_essential::<Collider>();
        $manifest.add_essential::<Mass>();
        $manifest.add_essential::<GravityScale>();
        $manifest.add_essential::<Restitution>();
        $manifest.add_essential::<Friction>();
        $manifest.add_essential::<LinearDamping>();
        $manifest.add_essential::<AngularDamping>();
        $manifest.add_essential::<LockedAxes>();
    }};
}

impl Default for ComponentManifest {
    /// Every physics component needed to simulate avian2d and avian3d bodies.
    ///
    /// Position, rotation and velocities are not listed: they are written by anchoring.
    fn default() -> Self {
        let mut manifest = Self::empty();
        add_avian_essentials!(manifest, avian3d);
        add_avian_essentials!(manifest, avian2d);
        manifest
    }
}

impl ComponentManifest {
    /// A manifest without any component. Shadows created with it only get their
    /// [`BodyState`](foresight_core::state::BodyState), so they are not simulated.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            predicate: None,
        }
    }

    fn add<C: Component + Clone>(&mut self, persistence: Persistence) {
        let kind = ComponentKind::of::<C>();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.kind == kind) {
            // essential components can't be downgraded
            if entry.persistence != Persistence::Essential {
                entry.persistence = persistence;
            }
            return;
        }
        self.entries.push(ManifestEntry {
            kind,
            name: type_name::<C>(),
            persistence,
            clone: clone_component::<C>,
        });
    }

    pub(crate) fn add_essential<C: Component + Clone>(&mut self) {
        self.add::<C>(Persistence::Essential);
    }

    /// Always copy `C` to shadows
    pub fn add_persistent<C: Component + Clone>(&mut self) -> &mut Self {
        self.add::<C>(Persistence::Persistent);
        self
    }

    /// Copy `C` to shadows only if the persistence predicate returns true
    pub fn add_optional<C: Component + Clone>(&mut self) -> &mut Self {
        self.add::<C>(Persistence::Optional);
        self
    }

    /// Set the predicate that decides whether an [`Persistence::Optional`] component is copied.
    ///
    /// Without a predicate, optional components are never copied.
    pub fn set_predicate(
        &mut self,
        predicate: impl Fn(Entity, ComponentKind) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    pub fn persistence<C: 'static>(&self) -> Option<Persistence> {
        let kind = ComponentKind::of::<C>();
        self.entries
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.persistence)
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Copy every component of the manifest that `source` has onto `target`.
    ///
    /// Returns the number of components copied.
    pub fn apply(&self, source: &EntityRef, target: &mut EntityWorldMut) -> usize {
        let mut copied = 0;
        for entry in &self.entries {
            if entry.persistence == Persistence::Optional
                && !self
                    .predicate
                    .as_ref()
                    .is_some_and(|predicate| predicate(source.id(), entry.kind))
            {
                continue;
            }
            if (entry.clone)(source, target) {
                trace!(component = entry.name, source = ?source.id(), "Copied component to shadow");
                copied += 1;
            }
        }
        copied
    }
}
