use bevy_reflect::Reflect;
use core::time::Duration;
use foresight_core::mode::SpatialMode;
use serde::{Deserialize, Serialize};

/// Default duration of one prediction step
pub const DEFAULT_TIMESTEP: Duration = Duration::from_micros(15_625);

/// Settings of the prediction engine
#[derive(Debug, Clone, PartialEq, Reflect, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Duration of one step of a prediction run.
    ///
    /// When running under the [`PredictionPlugin`](crate::plugin::PredictionPlugin), this is
    /// kept in sync with the timestep of `Time<Fixed>`.
    pub timestep: Duration,
    /// Mode used for entities that don't have a collider from which the mode can be inferred
    pub fallback_mode: Option<SpatialMode>,
    /// Freeze bodies at their last recorded pose when they hit a blocker
    pub freeze_on_block: bool,
    /// Anchor every shadow to its original once per frame, outside of prediction runs
    pub anchor_between_runs: bool,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            timestep: DEFAULT_TIMESTEP,
            fallback_mode: Some(SpatialMode::Physics3d),
            freeze_on_block: true,
            anchor_between_runs: true,
        }
    }
}

impl PredictionConfig {
    pub fn with_timestep(mut self, timestep: Duration) -> Self {
        self.timestep = timestep;
        self
    }

    pub fn with_fallback_mode(mut self, mode: Option<SpatialMode>) -> Self {
        self.fallback_mode = mode;
        self
    }
}
