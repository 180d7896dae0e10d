//! Viewer configuration
//!
//! Zoom limits, the zoom step table, and input scaling. A config is owned by a
//! single viewer and shared with the items it creates, so independent viewers
//! never see each other's settings.

use serde::{Deserialize, Serialize};

use crate::error::ViewerError;
use crate::transform::{DEFAULT_ZOOM_STEPS, MAX_SCALE, MIN_SCALE};

/// Raw wheel delta that corresponds to one unit of free zoom
pub const DEFAULT_WHEEL_STEP: f32 = 120.0;

/// Scale limits for free zoom and the table walked by step zoom
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ZoomConfig {
    pub min_scale: f32,
    pub max_scale: f32,
    pub steps: Vec<f32>,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min_scale: MIN_SCALE,
            max_scale: MAX_SCALE,
            steps: DEFAULT_ZOOM_STEPS.to_vec(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    pub zoom: ZoomConfig,
    /// Divisor applied to raw wheel deltas before they reach `Viewer::zoom`
    pub wheel_step: f32,
}

impl ViewerConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ViewerError> {
        let config: ViewerConfig =
            serde_json::from_str(json).map_err(|e| ViewerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ViewerError> {
        let zoom = &self.zoom;
        if zoom.steps.is_empty() {
            return Err(ViewerError::InvalidConfig("zoom step table is empty".to_string()));
        }
        let all_scales = zoom.steps.iter().chain([&zoom.min_scale, &zoom.max_scale]);
        if let Some(bad) = all_scales.copied().find(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ViewerError::InvalidConfig(format!("scale {} is not a positive number", bad)));
        }
        if zoom.min_scale > zoom.max_scale {
            return Err(ViewerError::InvalidConfig(format!(
                "minScale {} exceeds maxScale {}",
                zoom.min_scale, zoom.max_scale
            )));
        }
        if !self.wheel_step.is_finite() || self.wheel_step <= 0.0 {
            return Err(ViewerError::InvalidConfig(format!(
                "wheelStep {} must be positive",
                self.wheel_step
            )));
        }
        Ok(())
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            zoom: ZoomConfig::default(),
            wheel_step: DEFAULT_WHEEL_STEP,
        }
    }
}
