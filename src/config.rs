use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
const DEFAULT_MAX_OBJECTS: usize = 10;
const DEFAULT_IOU_THRESHOLD: f32 = 0.3;
const DEFAULT_FRAME_CAP_HZ: f32 = 24.0;
const DEFAULT_OVERLAY_MARGIN: f32 = 10.0;
const DEFAULT_LABEL_THRESHOLD: f32 = 40.0;
const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_SOURCE_URL: &str = "stub://camera";
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;

const THRESHOLD_RANGE: (f32, f32) = (0.1, 0.9);
const MAX_FRAME_CAP_HZ: f32 = 240.0;

#[derive(Debug, Deserialize, Default)]
struct LensConfigFile {
    frame_cap_hz: Option<f32>,
    detection: Option<DetectionConfigFile>,
    overlay: Option<OverlayConfigFile>,
    classifier: Option<ClassifierConfigFile>,
    source: Option<SourceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    min_confidence: Option<f32>,
    max_objects: Option<usize>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    margin: Option<f32>,
    label_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifierConfigFile {
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct LensConfig {
    pub frame_cap_hz: f32,
    pub detection: DetectionSettings,
    pub overlay: OverlaySettings,
    pub classifier: ClassifierSettings,
    pub source: SourceSettings,
}

/// Parameters forwarded to the detection model on every call.
/// Adjustable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    pub min_confidence: f32,
    pub max_objects: usize,
    /// Informational; passed through to the model's suppression step.
    pub iou_threshold: f32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_objects: DEFAULT_MAX_OBJECTS,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

impl DetectionSettings {
    pub fn validate(&self) -> Result<()> {
        check_range("min_confidence", self.min_confidence, THRESHOLD_RANGE)?;
        check_range("iou_threshold", self.iou_threshold, THRESHOLD_RANGE)?;
        if self.max_objects == 0 {
            return Err(anyhow!("max_objects must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlaySettings {
    /// Minimum distance in pixels between a box and the container edge.
    pub margin: f32,
    /// Boxes whose top is closer than this to the container top get their
    /// label inside the box instead of above it.
    pub label_threshold: f32,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            margin: DEFAULT_OVERLAY_MARGIN,
            label_threshold: DEFAULT_LABEL_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// Softmax temperature applied to per-class similarities.
    pub temperature: f32,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            frame_cap_hz: DEFAULT_FRAME_CAP_HZ,
            detection: DetectionSettings::default(),
            overlay: OverlaySettings::default(),
            classifier: ClassifierSettings::default(),
            source: SourceSettings {
                url: DEFAULT_SOURCE_URL.to_string(),
                width: DEFAULT_SOURCE_WIDTH,
                height: DEFAULT_SOURCE_HEIGHT,
            },
        }
    }
}

impl LensConfig {
    /// Load from `LENS_CONFIG` (JSON, or TOML for `.toml` paths), then apply
    /// `LENS_*` environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LENS_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: LensConfigFile) -> Self {
        let defaults = Self::default();
        let detection = file.detection.unwrap_or_default();
        let overlay = file.overlay.unwrap_or_default();
        let source = file.source.unwrap_or_default();
        Self {
            frame_cap_hz: file.frame_cap_hz.unwrap_or(defaults.frame_cap_hz),
            detection: DetectionSettings {
                min_confidence: detection
                    .min_confidence
                    .unwrap_or(defaults.detection.min_confidence),
                max_objects: detection
                    .max_objects
                    .unwrap_or(defaults.detection.max_objects),
                iou_threshold: detection
                    .iou_threshold
                    .unwrap_or(defaults.detection.iou_threshold),
            },
            overlay: OverlaySettings {
                margin: overlay.margin.unwrap_or(defaults.overlay.margin),
                label_threshold: overlay
                    .label_threshold
                    .unwrap_or(defaults.overlay.label_threshold),
            },
            classifier: ClassifierSettings {
                temperature: file
                    .classifier
                    .and_then(|c| c.temperature)
                    .unwrap_or(defaults.classifier.temperature),
            },
            source: SourceSettings {
                url: source.url.unwrap_or(defaults.source.url),
                width: source.width.unwrap_or(defaults.source.width),
                height: source.height.unwrap_or(defaults.source.height),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_parse::<f32>("LENS_MIN_CONFIDENCE")? {
            self.detection.min_confidence = v;
        }
        if let Some(v) = env_parse::<usize>("LENS_MAX_OBJECTS")? {
            self.detection.max_objects = v;
        }
        if let Some(v) = env_parse::<f32>("LENS_IOU_THRESHOLD")? {
            self.detection.iou_threshold = v;
        }
        if let Some(v) = env_parse::<f32>("LENS_FRAME_CAP_HZ")? {
            self.frame_cap_hz = v;
        }
        if let Some(v) = env_parse::<f32>("LENS_OVERLAY_MARGIN")? {
            self.overlay.margin = v;
        }
        if let Ok(url) = std::env::var("LENS_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.detection.validate()?;
        validate_frame_cap(self.frame_cap_hz)?;
        if !(self.overlay.margin.is_finite() && self.overlay.margin >= 0.0) {
            return Err(anyhow!("overlay margin must be a non-negative number"));
        }
        if !(self.overlay.label_threshold.is_finite() && self.overlay.label_threshold >= 0.0) {
            return Err(anyhow!("overlay label_threshold must be a non-negative number"));
        }
        if !(self.classifier.temperature.is_finite() && self.classifier.temperature > 0.0) {
            return Err(anyhow!("classifier temperature must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source dimensions must be non-zero"));
        }
        Ok(())
    }
}

/// Accepts `(0, 240]` frames per second.
pub fn validate_frame_cap(hz: f32) -> Result<()> {
    if !(hz.is_finite() && hz > 0.0 && hz <= MAX_FRAME_CAP_HZ) {
        return Err(anyhow!(
            "frame_cap_hz must be in (0, {}], got {}",
            MAX_FRAME_CAP_HZ,
            hz
        ));
    }
    Ok(())
}

fn check_range(name: &str, value: f32, (lo, hi): (f32, f32)) -> Result<()> {
    if !(value.is_finite() && value >= lo && value <= hi) {
        return Err(anyhow!("{} must be in [{}, {}], got {}", name, lo, hi, value));
    }
    Ok(())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} has an invalid value '{}'", key, raw)),
        _ => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<LensConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = LensConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.detection.max_objects, 10);
        assert_eq!(cfg.frame_cap_hz, 24.0);
        assert_eq!(cfg.overlay.margin, 10.0);
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        let mut settings = DetectionSettings::default();
        settings.min_confidence = 0.95;
        assert!(settings.validate().is_err());
        settings.min_confidence = 0.5;
        settings.iou_threshold = 0.05;
        assert!(settings.validate().is_err());
        settings.iou_threshold = 0.3;
        settings.max_objects = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn frame_cap_bounds() {
        assert!(validate_frame_cap(24.0).is_ok());
        assert!(validate_frame_cap(0.0).is_err());
        assert!(validate_frame_cap(f32::INFINITY).is_err());
        assert!(validate_frame_cap(500.0).is_err());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file: LensConfigFile =
            serde_json::from_str(r#"{"detection": {"max_objects": 3}}"#).unwrap();
        let cfg = LensConfig::from_file(file);
        assert_eq!(cfg.detection.max_objects, 3);
        assert_eq!(cfg.detection.min_confidence, 0.5);
        assert_eq!(cfg.source.url, "stub://camera");
    }
}
