//! UI overlays using bevy_egui

use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};

use crate::app::{FieldCatalog, SelectedField, StatusBanner, ViewToggles};
use crate::network::{
    post_settings, ChannelStatus, DaemonConfig, PendingSaveResult, SettingsState,
};
use crate::pacing::{Pacing, StatsDisplay};

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SettingsForm>()
            // Main UI system runs in EguiPrimaryContextPass for proper input handling (bevy_egui 0.38+)
            .add_systems(EguiPrimaryContextPass, ui_system);
    }
}

/// Text buffers backing the numeric settings inputs.
///
/// Numbers are edited as text and coerced on save; a failed parse keeps
/// the previous value, matching how the form has always behaved.
#[derive(Resource, Default)]
pub struct SettingsForm {
    pub input_size: String,
    pub confidence_threshold: String,
    pub combined_threshold: String,
    pub max_distance: String,
    /// Buffers have been filled from a fetched document
    pub synced: bool,
}

impl SettingsForm {
    fn sync_from(&mut self, doc: &fieldsight_core::SettingsDoc) {
        self.input_size = doc.detection.input_size.to_string();
        self.confidence_threshold = doc.detection.confidence_threshold.to_string();
        self.combined_threshold = doc.detection.combined_threshold.to_string();
        self.max_distance = doc.detection.max_distance.to_string();
        self.synced = true;
    }

    fn apply_to(&self, doc: &mut fieldsight_core::SettingsDoc) {
        if let Ok(v) = self.input_size.parse() {
            doc.detection.input_size = v;
        }
        if let Ok(v) = self.confidence_threshold.parse() {
            doc.detection.confidence_threshold = v;
        }
        if let Ok(v) = self.combined_threshold.parse() {
            doc.detection.combined_threshold = v;
        }
        if let Ok(v) = self.max_distance.parse() {
            doc.detection.max_distance = v;
        }
    }
}

fn ui_system(
    mut contexts: EguiContexts,
    channel: Res<ChannelStatus>,
    catalog: Res<FieldCatalog>,
    mut selected: ResMut<SelectedField>,
    mut toggles: ResMut<ViewToggles>,
    mut pacing: ResMut<Pacing>,
    stats: Res<StatsDisplay>,
    mut settings: ResMut<SettingsState>,
    mut form: ResMut<SettingsForm>,
    banner: Res<StatusBanner>,
    daemon_config: Res<DaemonConfig>,
    pending_save: Res<PendingSaveResult>,
) {
    // Get the egui context - early return if not available
    let Ok(ctx) = contexts.ctx_mut() else { return };

    egui::SidePanel::left("control_panel")
        .default_width(260.0)
        .show(ctx, |ui| {
            ui.heading("Fieldsight");
            ui.separator();

            // Connection status
            let status_color = if channel.connected {
                egui::Color32::GREEN
            } else {
                egui::Color32::RED
            };
            ui.horizontal(|ui| {
                ui.colored_label(status_color, "●");
                ui.label(if channel.connected {
                    "Pose channel connected"
                } else {
                    "Pose channel offline"
                });
            });

            if let Some(ref error) = banner.error {
                ui.colored_label(egui::Color32::LIGHT_RED, error);
            }
            ui.separator();

            // Field selector
            ui.label("Field");
            if catalog.loading {
                ui.label("Loading fields...");
            } else {
                let current_name = selected
                    .0
                    .as_ref()
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| "none".to_string());
                egui::ComboBox::from_id_salt("field_select")
                    .selected_text(current_name)
                    .show_ui(ui, |ui| {
                        for field in &catalog.fields {
                            let is_selected = selected.0.as_ref() == Some(field);
                            if ui.selectable_label(is_selected, &field.name).clicked()
                                && !is_selected
                            {
                                selected.0 = Some(field.clone());
                            }
                        }
                    });
            }
            ui.separator();

            // View toggles
            ui.checkbox(&mut toggles.shadows_enabled, "Shadows");
            ui.checkbox(&mut toggles.accessory_visible, "Game pieces");
            ui.checkbox(&mut toggles.show_stats, "Performance stats");

            let mut target_fps = pacing.target_fps;
            ui.horizontal(|ui| {
                ui.label("Target FPS");
                if ui
                    .add(egui::DragValue::new(&mut target_fps).range(10..=120))
                    .changed()
                {
                    pacing.target_fps = target_fps;
                    pacing.clock.set_target_fps(target_fps);
                }
            });

            if toggles.show_stats {
                ui.label(format!("Verts: {} | FPS: {}", stats.vertices, stats.fps));
            }
            ui.separator();

            // Settings form
            egui::CollapsingHeader::new("Settings")
                .default_open(false)
                .show(ui, |ui| {
                    if settings.loading {
                        ui.label("Loading settings...");
                        return;
                    }
                    let Some(doc) = settings.doc.as_mut() else {
                        ui.label("Settings unavailable");
                        return;
                    };
                    if !form.synced {
                        let snapshot = doc.clone();
                        form.sync_from(&snapshot);
                    }

                    ui.label("Logging");
                    ui.checkbox(&mut doc.general.log, "Log to file");
                    ui.checkbox(&mut doc.general.print_terminal, "Print to terminal");
                    ui.checkbox(&mut doc.general.detection_logging, "Detection logging");
                    ui.checkbox(&mut doc.general.simulation_mode, "Simulation mode");

                    ui.label("Network");
                    ui.horizontal(|ui| {
                        ui.label("Server");
                        ui.text_edit_singleline(&mut doc.network.server_address);
                    });
                    ui.horizontal(|ui| {
                        ui.label("Position key");
                        ui.text_edit_singleline(&mut doc.network.robot_position_key);
                    });
                    ui.horizontal(|ui| {
                        ui.label("Rotation key");
                        ui.text_edit_singleline(&mut doc.network.robot_rotation_key);
                    });

                    ui.label("Detection");
                    ui.horizontal(|ui| {
                        ui.label("Input size");
                        ui.text_edit_singleline(&mut form.input_size);
                    });
                    ui.horizontal(|ui| {
                        ui.label("Confidence");
                        ui.text_edit_singleline(&mut form.confidence_threshold);
                    });
                    ui.horizontal(|ui| {
                        ui.label("Combine dist");
                        ui.text_edit_singleline(&mut form.combined_threshold);
                    });
                    ui.horizontal(|ui| {
                        ui.label("Max dist");
                        ui.text_edit_singleline(&mut form.max_distance);
                    });

                    ui.add_space(4.0);
                    let save_label = if settings.save_in_flight {
                        "Saving..."
                    } else {
                        "Save"
                    };
                    if ui
                        .add_enabled(!settings.save_in_flight, egui::Button::new(save_label))
                        .clicked()
                    {
                        form.apply_to(doc);
                        let doc = doc.clone();
                        settings.save_in_flight = true;
                        post_settings(&daemon_config, &doc, &pending_save);
                    }
                    if let Some(ref e) = settings.save_error {
                        ui.colored_label(egui::Color32::LIGHT_RED, e);
                    }
                });
        });
}
