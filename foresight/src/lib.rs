//! # Foresight
//!
//! Predict the future of physics entities without touching them.
//!
//! Entities marked with [`PredictionObject`](prelude::PredictionObject) get a shadow copy in an isolated
//! physics world (one per [`SpatialMode`](prelude::SpatialMode)). A prediction run anchors every shadow to
//! its authoritative entity, steps the shadow worlds a given number of times and records a [`Timeline`](prelude::Timeline)
//! of poses and collisions for every tracked shadow. Typical uses are trajectory lines and aim assistance.
//!
//! Shadow worlds are simulated with avian: entities use the avian2d or avian3d components.
//!
//! ```rust,ignore
//! use avian3d::prelude::*;
//! use bevy::prelude::*;
//! use foresight::prelude::*;
//!
//! fn setup(mut commands: Commands) {
//!     commands.spawn((
//!         Position(Vec3::new(0.0, 2.0, 0.0)),
//!         LinearVelocity(Vec3::new(3.0, 5.0, 0.0)),
//!         RigidBody::Dynamic,
//!         Collider::sphere(0.2),
//!         PredictionObject::default(),
//!         PredictionRecorder::default(),
//!     ));
//!     commands.simulate_prediction(60);
//! }
//! ```
#![cfg_attr(not(feature = "std"), no_std)]

pub use foresight_core as shared;
pub use foresight_physics as physics;
pub use foresight_prediction as prediction;

pub mod prelude {
    pub use foresight_core::prelude::*;
    pub use foresight_physics::prelude::*;
    pub use foresight_prediction::prelude::*;
}
