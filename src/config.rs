//! Configuration persistence for snaptext settings

use std::path::PathBuf;
use std::time::Duration;

use cosmic::cosmic_config::{self, CosmicConfigEntry, cosmic_config_derive::CosmicConfigEntry};
use serde::{Deserialize, Serialize};

use crate::capture::camera::{CameraAccess, CaptureOptions};
use crate::capture::ocr::TesseractRecognizer;

/// Which part of a recognition result is shown on the capture screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextOutput {
    /// Raw text of the last block that produced at least one line
    #[default]
    LastBlock,
    /// Every recognized line, blocks separated by a blank line
    FullText,
}

impl TextOutput {
    /// Get the next output mode in the cycle
    pub fn next(self) -> Self {
        match self {
            TextOutput::LastBlock => TextOutput::FullText,
            TextOutput::FullText => TextOutput::LastBlock,
        }
    }
}

/// Application configuration persisted between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, CosmicConfigEntry)]
#[version = 1]
pub struct SnapTextConfig {
    /// What the capture screen shows after a successful recognition
    pub text_output: TextOutput,
    /// Tesseract language code(s), e.g. "eng" or "eng+deu"
    pub ocr_language: String,
    /// Tesseract page segmentation mode
    pub page_segmentation_mode: u32,
    /// Tesseract OCR engine mode
    pub engine_mode: u32,
    /// Longest side of the captured thumbnail in pixels
    pub thumbnail_max_dimension: u32,
    /// V4L2 device node to read directly (None = camera portal)
    pub camera_device: Option<String>,
    /// Frames dropped before the still is taken, lets auto exposure settle
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: u32,
    /// Seconds to wait for a camera frame
    #[serde(default = "default_capture_timeout_secs")]
    pub capture_timeout_secs: u64,
    /// How long a notice stays on screen
    #[serde(default = "default_notice_duration_ms")]
    pub notice_duration_ms: u64,
}

fn default_warmup_frames() -> u32 {
    5
}

fn default_capture_timeout_secs() -> u64 {
    10
}

fn default_notice_duration_ms() -> u64 {
    // Matches a short toast
    2000
}

impl SnapTextConfig {
    /// Configuration ID for cosmic-config
    pub const ID: &'static str = "io.github.hojjatabdollahi.snaptext";

    /// Load configuration from disk, or return defaults if unavailable
    pub fn load() -> Self {
        match cosmic_config::Config::new(Self::ID, Self::VERSION) {
            Ok(config) => match Self::get_entry(&config) {
                Ok(entry) => entry,
                Err((errs, entry)) => {
                    log::warn!("Error loading config, using defaults: {:?}", errs);
                    entry
                }
            },
            Err(err) => {
                log::warn!("Could not create config handler: {:?}", err);
                Self::default()
            }
        }
    }

    /// Save configuration to disk
    pub fn save(&self) {
        match cosmic_config::Config::new(Self::ID, Self::VERSION) {
            Ok(config) => {
                if let Err(err) = self.write_entry(&config) {
                    log::error!("Failed to save config: {:?}", err);
                }
            }
            Err(err) => {
                log::error!("Could not create config handler for saving: {:?}", err);
            }
        }
    }

    /// How the camera is reached, portal unless a device node is configured
    pub fn camera_access(&self) -> CameraAccess {
        match self.camera_device.as_deref().map(str::trim) {
            Some(device) if !device.is_empty() => CameraAccess::Device(PathBuf::from(device)),
            _ => CameraAccess::Portal,
        }
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            thumbnail_max_dimension: self.thumbnail_max_dimension.max(1),
            warmup_frames: self.warmup_frames,
            timeout: Duration::from_secs(self.capture_timeout_secs.max(1)),
        }
    }

    pub fn recognizer(&self) -> TesseractRecognizer {
        let language = match self.ocr_language.trim() {
            "" => "eng".to_string(),
            lang => lang.to_string(),
        };
        TesseractRecognizer {
            language,
            page_segmentation_mode: self.page_segmentation_mode,
            engine_mode: self.engine_mode,
        }
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }
}

impl Default for SnapTextConfig {
    fn default() -> Self {
        Self {
            text_output: TextOutput::LastBlock,
            ocr_language: "eng".to_string(),
            // Fully automatic page segmentation
            page_segmentation_mode: 11,
            // Default OCR engine mode
            engine_mode: 3,
            // A camera-app sized thumbnail, not the full sensor resolution
            thumbnail_max_dimension: 640,
            camera_device: None,
            warmup_frames: default_warmup_frames(),
            capture_timeout_secs: default_capture_timeout_secs(),
            notice_duration_ms: default_notice_duration_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shows_last_block() {
        assert_eq!(SnapTextConfig::default().text_output, TextOutput::LastBlock);
        assert_eq!(TextOutput::LastBlock.next(), TextOutput::FullText);
        assert_eq!(TextOutput::FullText.next(), TextOutput::LastBlock);
    }

    #[test]
    fn test_camera_access_defaults_to_portal() {
        let mut config = SnapTextConfig::default();
        assert_eq!(config.camera_access(), CameraAccess::Portal);

        config.camera_device = Some("   ".to_string());
        assert_eq!(config.camera_access(), CameraAccess::Portal);

        config.camera_device = Some("/dev/video2".to_string());
        assert_eq!(
            config.camera_access(),
            CameraAccess::Device(PathBuf::from("/dev/video2"))
        );
    }

    #[test]
    fn test_capture_options_clamp_zero_values() {
        let config = SnapTextConfig {
            thumbnail_max_dimension: 0,
            capture_timeout_secs: 0,
            ..Default::default()
        };
        let options = config.capture_options();
        assert_eq!(options.thumbnail_max_dimension, 1);
        assert_eq!(options.timeout, Duration::from_secs(1));
        assert_eq!(options.warmup_frames, 5);
    }

    #[test]
    fn test_recognizer_falls_back_to_english() {
        let config = SnapTextConfig {
            ocr_language: " ".to_string(),
            ..Default::default()
        };
        let recognizer = config.recognizer();
        assert_eq!(recognizer.language, "eng");
        assert_eq!(recognizer.page_segmentation_mode, 11);
        assert_eq!(recognizer.engine_mode, 3);
    }
}
