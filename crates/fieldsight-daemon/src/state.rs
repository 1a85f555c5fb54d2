//! Application state management

use anyhow::Result;
use fieldsight_core::{PosePayload, SettingsDoc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::config::Config;

/// One selectable field package, as presented to the viewer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInfo {
    pub name: String,
    /// Primary model path relative to the server root
    pub model_path: String,
    /// Fiducial layout document path, when the package ships one
    pub layout_path: Option<String>,
}

/// Shared application state
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Operator settings document
    settings: RwLock<SettingsDoc>,
    /// Pose broadcast for WebSocket clients
    pub events: broadcast::Sender<PosePayload>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let settings_path = Path::new(&config.settings.path);
        let settings = SettingsDoc::load(settings_path)?;
        info!(path = %settings_path.display(), "Settings loaded");

        // Create event channel
        let (events, _) = broadcast::channel(100);

        Ok(Arc::new(Self {
            config,
            settings: RwLock::new(settings),
            events,
        }))
    }

    /// Subscribe to the pose broadcast
    pub fn subscribe(&self) -> broadcast::Receiver<PosePayload> {
        self.events.subscribe()
    }

    /// Fan a validated pose update out to all connected clients
    pub fn publish_pose(&self, payload: PosePayload) {
        // No receivers is fine; the next client catches the next pose
        let _ = self.events.send(payload);
    }

    /// Current settings document
    pub async fn settings(&self) -> SettingsDoc {
        self.settings.read().await.clone()
    }

    /// Replace and persist the settings document
    pub async fn save_settings(&self, doc: SettingsDoc) -> Result<()> {
        doc.save(Path::new(&self.config.settings.path))?;
        *self.settings.write().await = doc;
        info!("Settings saved");
        Ok(())
    }

    /// Enumerate field packages under the configured fields root.
    ///
    /// A package is a subdirectory containing `models/<name>.glb`; a
    /// sibling `layout.json` is picked up as the fiducial layout.
    pub fn field_catalog(&self) -> Vec<FieldInfo> {
        scan_fields(Path::new(&self.config.assets.fields_path))
    }
}

fn scan_fields(root: &Path) -> Vec<FieldInfo> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %root.display(), error = %e, "Fields directory unavailable");
            return Vec::new();
        }
    };

    let mut fields: Vec<FieldInfo> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter_map(|e| field_info(root, &e.path()))
        .collect();
    fields.sort_by(|a, b| a.name.cmp(&b.name));
    fields
}

fn field_info(root: &Path, dir: &Path) -> Option<FieldInfo> {
    let name = dir.file_name()?.to_str()?.to_string();

    let models_dir = dir.join("models");
    let model = std::fs::read_dir(&models_dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .find(|p| p.extension().and_then(|e| e.to_str()) == Some("glb"))?;

    let layout = dir.join("layout.json");
    let layout_path = if layout.exists() {
        served_path(root, &layout)
    } else {
        None
    };
    Some(FieldInfo {
        name,
        model_path: served_path(root, &model)?,
        layout_path,
    })
}

/// Path under the fields root as the viewer requests it from the server
fn served_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut served = PathBuf::from("fields");
    served.push(rel);
    Some(served.to_str()?.replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsight_core::RawMatrix;

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.settings.path = dir.join("settings.json").display().to_string();
        config.assets.fields_path = dir.join("fields").display().to_string();
        config
    }

    #[test]
    fn test_settings_round_trip_through_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(test_config(dir.path())).unwrap();

        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            let mut doc = state.settings().await;
            assert_eq!(doc, SettingsDoc::default());

            doc.detection.input_size = 320;
            state.save_settings(doc.clone()).await.unwrap();
            assert_eq!(state.settings().await, doc);
        });

        // A fresh state re-reads the persisted document
        let state = AppState::new(test_config(dir.path())).unwrap();
        rt.block_on(async {
            assert_eq!(state.settings().await.detection.input_size, 320);
        });
    }

    #[test]
    fn test_pose_fan_out() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(test_config(dir.path())).unwrap();

        let mut rx_a = state.subscribe();
        let mut rx_b = state.subscribe();

        let matrix: RawMatrix = [
            [1.0, 0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0, 2.0],
            [0.0, 0.0, 1.0, 3.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        state.publish_pose(PosePayload::Matrix {
            transform_matrix: matrix,
        });

        let expected = PosePayload::Matrix {
            transform_matrix: matrix,
        };
        assert_eq!(rx_a.try_recv().unwrap(), expected);
        assert_eq!(rx_b.try_recv().unwrap(), expected);
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(test_config(dir.path())).unwrap();
        state.publish_pose(PosePayload::Point {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        });
    }

    #[test]
    fn test_field_catalog_scan() {
        let dir = tempfile::tempdir().unwrap();
        let fields = dir.path().join("fields");
        let models = fields.join("frc2025/models");
        std::fs::create_dir_all(&models).unwrap();
        std::fs::write(models.join("frc2025-field.glb"), b"glb").unwrap();
        std::fs::write(fields.join("frc2025/layout.json"), b"{}").unwrap();
        // A directory without a model is not a package
        std::fs::create_dir_all(fields.join("empty")).unwrap();

        let state = AppState::new(test_config(dir.path())).unwrap();
        let catalog = state.field_catalog();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].name, "frc2025");
        assert_eq!(catalog[0].model_path, "fields/frc2025/models/frc2025-field.glb");
        assert_eq!(
            catalog[0].layout_path.as_deref(),
            Some("fields/frc2025/layout.json")
        );
    }

    #[test]
    fn test_missing_fields_dir_yields_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(test_config(dir.path())).unwrap();
        assert!(state.field_catalog().is_empty());
    }
}
