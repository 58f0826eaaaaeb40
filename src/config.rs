use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::ConfigError;

pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.65;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 300;
pub const DEFAULT_COUNTDOWN_TICK_MS: u64 = 100;
pub const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_SLOT_COUNT: usize = 5;
/// Longest effect a template may announce. Keeps every deadline representable.
pub const MAX_DURATION_SECONDS: f64 = 3_600.0;

/// Positive, finite and no longer than [`MAX_DURATION_SECONDS`].
pub(crate) fn is_valid_duration(seconds: f64) -> bool {
    seconds > 0.0
        && seconds <= MAX_DURATION_SECONDS
        && Duration::try_from_secs_f64(seconds).is_ok()
}

/// Screen rectangle sampled on every tick, in physical pixels of the primary display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRegion {
    pub top: u32,
    pub left: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureRegion {
    fn default() -> Self {
        Self {
            top: 800,
            left: 600,
            width: 800,
            height: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSpec {
    pub key: String,
    pub display_name: String,
    pub duration_seconds: f64,
    pub image_path: PathBuf,
}

impl TemplateSpec {
    fn new(file: &str, display_name: &str, duration_seconds: f64) -> Self {
        Self {
            key: file.into(),
            display_name: display_name.into(),
            duration_seconds,
            image_path: Path::new("ults").join(file),
        }
    }
}

/// Where slot anchors sit on the overlay: a vertical column starting at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotLayout {
    pub origin_x: i32,
    pub origin_y: i32,
    pub spacing: i32,
}

impl Default for SlotLayout {
    fn default() -> Self {
        // Centered 250px-wide widgets on a 1920px-wide display.
        Self {
            origin_x: 960 - 125,
            origin_y: 50,
            spacing: 110,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    pub templates: Vec<TemplateSpec>,
    pub match_threshold: f32,
    /// Detection cadence. Lower values cut latency at the cost of CPU.
    pub poll_interval_ms: u64,
    pub capture_region: CaptureRegion,
    pub slot_count: usize,
    pub slot_layout: SlotLayout,
    pub countdown_tick_ms: u64,
    pub capture_timeout_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            templates: vec![
                TemplateSpec::new("luna_ult.png", "Luna Snow", 9.0),
                TemplateSpec::new("cloak_ult.png", "Cloak & Dagger", 12.0),
                TemplateSpec::new("invisible_ult.png", "Invisible Woman", 7.5),
                TemplateSpec::new("mantis_ult.png", "Mantis", 7.0),
            ],
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            capture_region: CaptureRegion::default(),
            slot_count: DEFAULT_SLOT_COUNT,
            slot_layout: SlotLayout::default(),
            countdown_tick_ms: DEFAULT_COUNTDOWN_TICK_MS,
            capture_timeout_ms: DEFAULT_CAPTURE_TIMEOUT_MS,
        }
    }
}

impl TrackerConfig {
    /// Reads a JSON config. Relative template paths are resolved against the
    /// directory holding the config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: TrackerConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::ParseConfig {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(base) = path.parent() {
            for template in &mut config.templates {
                if template.image_path.is_relative() {
                    template.image_path = base.join(&template.image_path);
                }
            }
        }

        Ok(config)
    }

    /// Falls back to the built-in defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.match_threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }
        if self.countdown_tick_ms == 0 {
            return Err(ConfigError::InvalidCountdownTick);
        }
        if self.capture_timeout_ms == 0 {
            return Err(ConfigError::InvalidCaptureTimeout);
        }
        let region = self.capture_region;
        if region.width == 0 || region.height == 0 {
            return Err(ConfigError::InvalidRegion {
                width: region.width,
                height: region.height,
            });
        }
        if self.slot_count == 0 {
            return Err(ConfigError::InvalidSlotCount);
        }
        if self.templates.is_empty() {
            return Err(ConfigError::EmptyLibrary);
        }

        let mut keys = HashSet::new();
        let mut names = HashSet::new();
        for template in &self.templates {
            if !keys.insert(template.key.as_str()) {
                return Err(ConfigError::DuplicateKey(template.key.clone()));
            }
            // Cooldowns are keyed by display name, so names must be unique too.
            if !names.insert(template.display_name.as_str()) {
                return Err(ConfigError::DuplicateName(template.display_name.clone()));
            }
            let duration = template.duration_seconds;
            if !is_valid_duration(duration) {
                return Err(ConfigError::InvalidDuration {
                    key: template.key.clone(),
                    duration,
                });
            }
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.templates.len(), 4);
        assert_eq!(config.poll_interval(), Duration::from_millis(300));
    }

    #[test]
    fn threshold_bounds_are_exclusive() {
        for threshold in [0.0, 1.0, -0.2, f32::NAN] {
            let config = TrackerConfig {
                match_threshold: threshold,
                ..TrackerConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidThreshold(_))
            ));
        }
    }

    #[test]
    fn rejects_zero_sized_region_and_slots() {
        let config = TrackerConfig {
            capture_region: CaptureRegion {
                width: 0,
                ..CaptureRegion::default()
            },
            ..TrackerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRegion { .. })
        ));

        let config = TrackerConfig {
            slot_count: 0,
            ..TrackerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSlotCount)));
    }

    #[test]
    fn rejects_duplicate_names_and_bad_durations() {
        let mut config = TrackerConfig::default();
        config.templates[1].display_name = "Luna Snow".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateName(name)) if name == "Luna Snow"
        ));

        let mut config = TrackerConfig::default();
        config.templates[0].duration_seconds = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn rejects_durations_too_large_for_a_deadline() {
        for duration in [1e19, 1e20, f64::INFINITY, MAX_DURATION_SECONDS + 1.0] {
            let mut config = TrackerConfig::default();
            config.templates[2].duration_seconds = duration;
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidDuration { .. })),
                "{duration} accepted"
            );
        }

        let mut config = TrackerConfig::default();
        config.templates[2].duration_seconds = MAX_DURATION_SECONDS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn huge_duration_in_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        fs::write(
            &path,
            r#"{
                "templates": [
                    { "key": "x", "displayName": "X", "durationSeconds": 1e19, "imagePath": "x.png" }
                ]
            }"#,
        )
        .unwrap();

        let config = TrackerConfig::from_file(&path).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDuration { key, .. }) if key == "x"
        ));
    }

    #[test]
    fn file_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        fs::write(
            &path,
            r#"{
                "templates": [
                    { "key": "x", "displayName": "X", "durationSeconds": 9, "imagePath": "icons/x.png" }
                ],
                "matchThreshold": 0.7,
                "slotCount": 2
            }"#,
        )
        .unwrap();

        let config = TrackerConfig::from_file(&path).unwrap();
        assert_eq!(config.templates[0].image_path, dir.path().join("icons/x.png"));
        assert_eq!(config.slot_count, 2);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn example_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/tracker.example.json");
        let example = TrackerConfig::from_file(&path).unwrap();
        let defaults = TrackerConfig::default();

        assert!(example.validate().is_ok());
        assert_eq!(example.capture_region, defaults.capture_region);
        assert_eq!(example.slot_layout, defaults.slot_layout);
        assert_eq!(example.match_threshold, defaults.match_threshold);
        let names: Vec<_> = example.templates.iter().map(|t| &t.display_name).collect();
        let default_names: Vec<_> = defaults.templates.iter().map(|t| &t.display_name).collect();
        assert_eq!(names, default_names);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            TrackerConfig::from_file(&path),
            Err(ConfigError::ParseConfig { .. })
        ));
        assert!(matches!(
            TrackerConfig::from_file(&dir.path().join("missing.json")),
            Err(ConfigError::ReadConfig { .. })
        ));
    }
}
