use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::data::model::Axis;

// ---------------------------------------------------------------------------
// Viewer configuration
// ---------------------------------------------------------------------------

/// Slider bounds for one clip axis, in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipRange {
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisClipRanges {
    pub x: ClipRange,
    pub y: ClipRange,
    pub z: ClipRange,
}

impl Default for AxisClipRanges {
    fn default() -> Self {
        Self {
            x: ClipRange { min: 1, max: 250 },
            y: ClipRange { min: 1, max: 250 },
            z: ClipRange { min: 1, max: 270 },
        }
    }
}

impl AxisClipRanges {
    pub fn get(&self, axis: Axis) -> ClipRange {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Fixed lower box bounds: one below each configured minimum.
    pub fn lower_bounds(&self) -> [f64; 3] {
        Axis::ALL.map(|a| (self.get(a).min - 1) as f64)
    }

    pub fn maxima(&self) -> [i32; 3] {
        Axis::ALL.map(|a| self.get(a).max)
    }
}

/// A named surface used when no params file is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TissuePreset {
    pub name: String,
    pub value: i32,
    /// Channels in `[0, 1]`.
    pub color: [f32; 3],
}

impl TissuePreset {
    fn new(name: &str, value: i32, rgb: [u8; 3]) -> Self {
        Self {
            name: name.to_string(),
            value,
            color: rgb.map(|c| c as f32 / 255.0),
        }
    }

    pub fn rgb(&self) -> Rgb {
        let [r, g, b] = self.color;
        Rgb::new(r, g, b)
    }
}

/// Everything the viewer used to keep in module-level tables.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window_size: [f32; 2],
    pub background: [u8; 3],
    pub axis_clips: AxisClipRanges,
    pub presets: Vec<TissuePreset>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window_size: [640.0, 480.0],
            background: [128, 128, 128],
            axis_clips: AxisClipRanges::default(),
            presets: vec![
                TissuePreset::new("skin", 400, [229, 181, 161]),
                TissuePreset::new("muscle", 1010, [171, 54, 54]),
                TissuePreset::new("bone", 1135, [229, 229, 229]),
            ],
        }
    }
}

impl ViewerConfig {
    /// Read a JSON config; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: ViewerConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        log::info!("Loaded viewer config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_head_ct_layout() {
        let config = ViewerConfig::default();
        assert_eq!(config.axis_clips.maxima(), [250, 250, 270]);
        assert_eq!(config.axis_clips.lower_bounds(), [0.0, 0.0, 0.0]);
        let values: Vec<i32> = config.presets.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![400, 1010, 1135]);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "axis_clips": {{ "z": {{ "min": 5, "max": 300 }} }}, "background": [0, 0, 0] }}"#
        )
        .unwrap();
        let config = ViewerConfig::load(file.path()).unwrap();
        assert_eq!(config.background, [0, 0, 0]);
        assert_eq!(config.axis_clips.z, ClipRange { min: 5, max: 300 });
        assert_eq!(config.axis_clips.x, ClipRange { min: 1, max: 250 });
        assert_eq!(config.window_size, [640.0, 480.0]);
        assert_eq!(config.presets.len(), 3);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = ViewerConfig::load(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }
}
