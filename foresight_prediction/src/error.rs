use bevy_ecs::entity::Entity;
use foresight_core::mode::SpatialMode;
use foresight_physics::world::ShadowWorldError;

/// Errors returned by the prediction engine.
///
/// Anomalies that happen during a run (missing entities, unknown contacts) are not errors:
/// they are logged and the affected entity is skipped.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    #[error("the {0} shadow world is already loaded")]
    AlreadyLoaded(SpatialMode),
    #[error("cannot determine the spatial mode of entity {0:?}: it has no collider and no fallback mode is configured")]
    UnknownSpatialMode(Entity),
    #[error("entity {0:?} has no rigid body")]
    MissingBody(Entity),
    #[error("entity {0:?} has no position")]
    MissingTransform(Entity),
    #[error("entity {0:?} does not exist")]
    EntityNotFound(Entity),
    #[error("a prediction run is already in progress")]
    RunInProgress,
    #[error("the PredictionContext resource is missing. Did you add the PredictionPlugin?")]
    MissingContext,
}

impl From<ShadowWorldError> for PredictionError {
    fn from(value: ShadowWorldError) -> Self {
        match value {
            ShadowWorldError::AlreadyLoaded(mode) => PredictionError::AlreadyLoaded(mode),
        }
    }
}
