//! Operator-editable pipeline settings
//!
//! The settings document is the wire contract between the dashboard
//! settings form and the daemon: GET returns it, POST replaces it, and
//! the daemon persists it as JSON. Field names are fixed; the dashboard
//! coerces text inputs to numbers but does no further validation.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// Full settings document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SettingsDoc {
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(default)]
    pub network: NetworkSettings,
    #[serde(default)]
    pub detection: DetectionSettings,
}

/// Logging and run-mode flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralSettings {
    /// Write a persistent log file.
    #[serde(default = "default_true")]
    pub log: bool,
    /// Mirror log lines to the terminal.
    #[serde(default = "default_true")]
    pub print_terminal: bool,
    /// Record per-detection diagnostic output.
    #[serde(default)]
    pub detection_logging: bool,
    /// Run against recorded data instead of live producers.
    #[serde(default)]
    pub simulation_mode: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log: true,
            print_terminal: true,
            detection_logging: false,
            simulation_mode: false,
        }
    }
}

/// Pose producer connection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettings {
    #[serde(default = "default_server_address")]
    pub server_address: String,
    #[serde(default = "default_position_key")]
    pub robot_position_key: String,
    #[serde(default = "default_rotation_key")]
    pub robot_rotation_key: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            server_address: default_server_address(),
            robot_position_key: default_position_key(),
            robot_rotation_key: default_rotation_key(),
        }
    }
}

/// Object detection tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Model input edge length in pixels.
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_confidence")]
    pub confidence_threshold: f64,
    /// Distance under which overlapping detections merge, millimeters.
    #[serde(default = "default_combined")]
    pub combined_threshold: f64,
    /// Detections farther than this are discarded, millimeters.
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            input_size: default_input_size(),
            confidence_threshold: default_confidence(),
            combined_threshold: default_combined(),
            max_distance: default_max_distance(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_server_address() -> String {
    "10.0.0.2".to_string()
}

fn default_position_key() -> String {
    "robot_position".to_string()
}

fn default_rotation_key() -> String {
    "robot_rotation".to_string()
}

fn default_input_size() -> u32 {
    640
}

fn default_confidence() -> f64 {
    0.5
}

fn default_combined() -> f64 {
    500.0
}

fn default_max_distance() -> f64 {
    8000.0
}

impl SettingsDoc {
    /// Load from a JSON file, falling back to defaults when the file does
    /// not exist yet.
    pub fn load(path: &Path) -> io::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Persist as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let doc = SettingsDoc::default();
        assert!(doc.general.log);
        assert!(doc.general.print_terminal);
        assert!(!doc.general.simulation_mode);
        assert_eq!(doc.detection.input_size, 640);
        assert_eq!(doc.network.robot_position_key, "robot_position");
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let doc: SettingsDoc =
            serde_json::from_str(r#"{"detection":{"input_size":320}}"#).unwrap();
        assert_eq!(doc.detection.input_size, 320);
        assert_eq!(doc.detection.confidence_threshold, 0.5);
        assert!(doc.general.log);
    }

    #[test]
    fn test_json_round_trip() {
        let mut doc = SettingsDoc::default();
        doc.general.detection_logging = true;
        doc.network.server_address = "10.41.3.2".to_string();
        doc.detection.max_distance = 6000.0;
        let text = serde_json::to_string(&doc).unwrap();
        let back: SettingsDoc = serde_json::from_str(&text).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        // Missing file yields defaults.
        let doc = SettingsDoc::load(&path).unwrap();
        assert_eq!(doc, SettingsDoc::default());

        let mut doc = SettingsDoc::default();
        doc.detection.confidence_threshold = 0.75;
        doc.save(&path).unwrap();
        assert_eq!(SettingsDoc::load(&path).unwrap(), doc);
    }
}
