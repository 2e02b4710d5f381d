//! Tunable solver constants

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SetupError;

/// Solver constants. The defaults are the empirically chosen reference values;
/// none of them is physically derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Dissipation applied to the upstream sample during advection.
    pub decay: f32,
    /// Gain on `dt` for the advection blend toward the upstream sample.
    pub rate: f32,
    /// Divergence-relaxation passes per step.
    pub relax_iterations: u32,
    /// Scale of the stencil correction added in each relaxation pass.
    pub relax_weight: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            decay: 0.999,
            rate: 20.0,
            relax_iterations: 20,
            relax_weight: 0.125,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), SetupError> {
        if !(self.decay > 0.0 && self.decay <= 1.0) {
            return Err(SetupError::InvalidConfig(format!(
                "decay must be in (0, 1], got {}",
                self.decay
            )));
        }
        if !(self.rate > 0.0 && self.rate.is_finite()) {
            return Err(SetupError::InvalidConfig(format!(
                "rate must be positive, got {}",
                self.rate
            )));
        }
        if self.relax_iterations == 0 {
            return Err(SetupError::InvalidConfig(
                "relax_iterations must be at least 1".to_string(),
            ));
        }
        // Above 0.125 the stencil amplifies its highest-frequency mode.
        if !(self.relax_weight > 0.0 && self.relax_weight <= 0.125) {
            return Err(SetupError::InvalidConfig(format!(
                "relax_weight must be in (0, 0.125], got {}",
                self.relax_weight
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, SetupError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, SetupError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Draws issued by one step: one advection plus every relaxation pass.
    pub fn passes_per_step(&self) -> u32 {
        1 + self.relax_iterations
    }
}
