use image::GrayImage;
use std::time::Duration;

use crate::config::{is_valid_duration, CaptureRegion, TemplateSpec};
use crate::error::ConfigError;

use super::matcher::PreparedTemplate;

/// One reference icon and the length of the effect it announces.
#[derive(Debug, Clone)]
pub struct TemplateEntry {
    pub key: String,
    pub display_name: String,
    pub duration_seconds: f64,
    pub image: GrayImage,
    prepared: PreparedTemplate,
}

impl TemplateEntry {
    pub fn new(
        key: impl Into<String>,
        display_name: impl Into<String>,
        duration_seconds: f64,
        image: GrayImage,
    ) -> Result<Self, ConfigError> {
        let key = key.into();
        if !is_valid_duration(duration_seconds) {
            return Err(ConfigError::InvalidDuration {
                key,
                duration: duration_seconds,
            });
        }
        let prepared = PreparedTemplate::new(&image)
            .ok_or_else(|| ConfigError::FlatTemplate { key: key.clone() })?;

        Ok(Self {
            key,
            display_name: display_name.into(),
            duration_seconds,
            image,
            prepared,
        })
    }

    /// The single canonical interval used for both the cooldown and the countdown.
    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration_seconds).unwrap_or(Duration::MAX)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub(crate) fn prepared(&self) -> &PreparedTemplate {
        &self.prepared
    }
}

/// Immutable set of templates, in configuration order.
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    entries: Vec<TemplateEntry>,
}

impl TemplateLibrary {
    /// Loads every configured template as grayscale. A single missing or
    /// unreadable image fails the whole library.
    pub fn load(specs: &[TemplateSpec], region: CaptureRegion) -> Result<Self, ConfigError> {
        let mut entries = Vec::with_capacity(specs.len());
        for spec in specs {
            let image = image::open(&spec.image_path)
                .map_err(|source| ConfigError::TemplateImage {
                    key: spec.key.clone(),
                    path: spec.image_path.clone(),
                    source,
                })?
                .to_luma8();
            log::info!(
                "Loaded template {} ({}x{}) from {}",
                spec.key,
                image.width(),
                image.height(),
                spec.image_path.display()
            );
            entries.push(TemplateEntry::new(
                spec.key.clone(),
                spec.display_name.clone(),
                spec.duration_seconds,
                image,
            )?);
        }
        Self::from_entries(entries, region)
    }

    pub fn from_entries(
        entries: Vec<TemplateEntry>,
        region: CaptureRegion,
    ) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptyLibrary);
        }
        for entry in &entries {
            if entry.width() > region.width || entry.height() > region.height {
                return Err(ConfigError::TemplateTooLarge {
                    key: entry.key.clone(),
                    template_width: entry.width(),
                    template_height: entry.height(),
                    region_width: region.width,
                    region_height: region.height,
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = &TemplateEntry> {
        self.entries.iter()
    }

    pub fn get(&self, key: &str) -> Option<&TemplateEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use std::path::PathBuf;

    fn checker(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            Luma([if (x / 2 + y / 2) % 2 == 0 { 230 } else { 20 }])
        })
    }

    fn region(width: u32, height: u32) -> CaptureRegion {
        CaptureRegion {
            top: 0,
            left: 0,
            width,
            height,
        }
    }

    #[test]
    fn loads_templates_from_disk_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let luna = dir.path().join("luna.png");
        let mantis = dir.path().join("mantis.png");
        checker(8, 8).save(&luna).unwrap();
        checker(6, 4).save(&mantis).unwrap();

        let specs = vec![
            TemplateSpec {
                key: "luna.png".into(),
                display_name: "Luna Snow".into(),
                duration_seconds: 9.0,
                image_path: luna,
            },
            TemplateSpec {
                key: "mantis.png".into(),
                display_name: "Mantis".into(),
                duration_seconds: 7.0,
                image_path: mantis,
            },
        ];

        let library = TemplateLibrary::load(&specs, region(40, 20)).unwrap();
        let names: Vec<_> = library.iter().map(|e| e.display_name.as_str()).collect();
        assert_eq!(names, ["Luna Snow", "Mantis"]);
        assert_eq!(library.get("mantis.png").unwrap().width(), 6);
        assert_eq!(library.get("luna.png").unwrap().duration(), Duration::from_secs(9));
    }

    #[test]
    fn missing_image_refuses_to_load() {
        let specs = vec![TemplateSpec {
            key: "ghost.png".into(),
            display_name: "Ghost".into(),
            duration_seconds: 5.0,
            image_path: PathBuf::from("/nonexistent/ghost.png"),
        }];
        assert!(matches!(
            TemplateLibrary::load(&specs, region(40, 20)),
            Err(ConfigError::TemplateImage { key, .. }) if key == "ghost.png"
        ));
    }

    #[test]
    fn template_larger_than_region_is_rejected() {
        let entry = TemplateEntry::new("big", "Big", 3.0, checker(50, 10)).unwrap();
        assert!(matches!(
            TemplateLibrary::from_entries(vec![entry], region(40, 20)),
            Err(ConfigError::TemplateTooLarge { .. })
        ));
    }

    #[test]
    fn oversized_duration_is_rejected() {
        for duration in [1e20, f64::NAN, -1.0] {
            assert!(matches!(
                TemplateEntry::new("luna", "Luna Snow", duration, checker(4, 4)),
                Err(ConfigError::InvalidDuration { .. })
            ));
        }
    }

    #[test]
    fn flat_template_is_rejected() {
        let flat = GrayImage::from_pixel(4, 4, Luma([128]));
        assert!(matches!(
            TemplateEntry::new("flat", "Flat", 3.0, flat),
            Err(ConfigError::FlatTemplate { .. })
        ));
    }
}
