use serde::{Deserialize, Serialize};

use crate::error::LoadError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ModelManagerConfig {
    /// Aspect ratio baked into model cameras.
    pub camera_aspect_ratio: f32,
    /// Sequence index an animator starts playing.
    pub initial_sequence: usize,
    /// Multiplier applied to every animator's delta time.
    pub playback_speed: f32,
}
impl Default for ModelManagerConfig {
    fn default() -> Self {
        Self {
            camera_aspect_ratio: 1.0,
            initial_sequence: 0,
            playback_speed: 1.0,
        }
    }
}
impl ModelManagerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        serde_json::from_str(json).map_err(|err| LoadError::json("<config>", err))
    }
}
