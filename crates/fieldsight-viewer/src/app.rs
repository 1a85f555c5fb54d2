//! Bevy application setup

use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use bevy_picking::{prelude::MeshPickingPlugin, DefaultPickingPlugins};
use fieldsight_core::FieldCalibration;

use crate::field::FieldPlugin;
use crate::marker::MarkerPlugin;
use crate::network::NetworkPlugin;
use crate::pacing::PacingPlugin;
use crate::scene::ScenePlugin;
use crate::ui::UiPlugin;

/// One selectable field package from the backend
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct FieldInfo {
    pub name: String,
    /// Primary model path as served by the daemon (e.g. "fields/2025/models/frc2025-field.glb")
    pub model_path: String,
    /// Fiducial layout document path, when the package ships one
    #[serde(default)]
    pub layout_path: Option<String>,
}

/// Fields available on the backend
#[derive(Debug, Clone, Resource, Default)]
pub struct FieldCatalog {
    pub fields: Vec<FieldInfo>,
    pub loading: bool,
}

/// Currently selected field package
#[derive(Debug, Clone, Resource, Default)]
pub struct SelectedField(pub Option<FieldInfo>);

/// Operator toggles shared between the UI and the scene systems
#[derive(Debug, Clone, Copy, Resource)]
pub struct ViewToggles {
    pub shadows_enabled: bool,
    pub accessory_visible: bool,
    pub show_stats: bool,
}

impl Default for ViewToggles {
    fn default() -> Self {
        Self {
            shadows_enabled: true,
            accessory_visible: true,
            show_stats: true,
        }
    }
}

/// Source-to-render frame calibration used by the pose path
#[derive(Debug, Clone, Copy, Resource, Default)]
pub struct Calibration(pub FieldCalibration);

/// Monotonic scene session counter.
///
/// Bumped on every field switch; asset loads started under an older
/// generation are discarded when they resolve, so a torn-down scene is
/// never mutated by a late load.
#[derive(Debug, Clone, Copy, Resource, Default)]
pub struct SessionGeneration(pub u64);

/// Camera controller settings (render units are millimeters)
#[derive(Debug, Clone, Resource)]
pub struct CameraSettings {
    pub distance: f32,
    pub target_distance: f32, // For smooth zoom
    pub azimuth: f32,
    pub elevation: f32,
    pub target: Vec3,
    pub sensitivity: f32,
    pub zoom_speed: f32,
    pub smooth_factor: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            distance: 10_000.0,
            target_distance: 10_000.0,
            azimuth: 1.2,
            elevation: 0.5, // Slightly elevated view
            target: Vec3::ZERO,
            sensitivity: 0.005,
            zoom_speed: 0.1,
            smooth_factor: 0.15,
        }
    }
}

/// Operator-visible failure banner (settings persistence, asset errors)
#[derive(Debug, Clone, Resource, Default)]
pub struct StatusBanner {
    pub error: Option<String>,
}

/// Run the Bevy application
pub fn run() {
    App::new()
        .insert_resource(ClearColor(Color::srgb(0.12, 0.12, 0.14))) // Dark gray background
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "Fieldsight - Robot Pose Visualization".to_string(),
                        canvas: Some("#fieldsight-canvas".to_string()),
                        fit_canvas_to_parent: true,
                        prevent_default_event_handling: false,
                        ..default()
                    }),
                    ..default()
                })
                .set(AssetPlugin {
                    // Load assets from root (daemon serves /fields directly)
                    file_path: "".to_string(),
                    // Don't look for .meta files - server doesn't have them
                    meta_check: bevy::asset::AssetMetaCheck::Never,
                    ..default()
                })
                // Fiducial tag textures are pixel art; nearest keeps them crisp
                .set(ImagePlugin::default_nearest()),
        )
        // Add bevy_picking from the crate (required for bevy_egui picking feature)
        // These must be added BEFORE EguiPlugin so it can detect PickingPlugin
        .add_plugins(DefaultPickingPlugins)
        .add_plugins(MeshPickingPlugin)
        .add_plugins(EguiPlugin::default())
        .init_resource::<FieldCatalog>()
        .init_resource::<SelectedField>()
        .init_resource::<ViewToggles>()
        .init_resource::<Calibration>()
        .init_resource::<SessionGeneration>()
        .init_resource::<CameraSettings>()
        .init_resource::<StatusBanner>()
        .add_plugins(NetworkPlugin)
        .add_plugins(ScenePlugin)
        .add_plugins(FieldPlugin)
        .add_plugins(MarkerPlugin)
        .add_plugins(PacingPlugin)
        .add_plugins(UiPlugin)
        .run();
}
