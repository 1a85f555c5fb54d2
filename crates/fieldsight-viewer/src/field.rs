//! Field package loading
//!
//! A field package is a primary glTF model plus two optional companions
//! derived from it: an accessory model (loose scoring elements) and a
//! fiducial layout document. Each load is independent; one failing leaves
//! its slot empty and never blocks the others or the render loop.
//!
//! Switching fields tears the previous scene down completely and bumps
//! the session generation, so loads still in flight for the old field are
//! discarded when they resolve.

use bevy::asset::LoadState;
use bevy::gltf::Gltf;
use bevy::prelude::*;
use fieldsight_core::{accessory_path_for, tag_texture_name};

use crate::app::{SelectedField, SessionGeneration, ViewToggles};
use crate::network::{fetch_layout, DaemonConfig, PendingLayout};

pub struct FieldPlugin;

impl Plugin for FieldPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SceneSlots>()
            .add_systems(
                Update,
                (
                    begin_field_load,
                    poll_loads.after(begin_field_load),
                    spawn_fiducials.after(begin_field_load),
                    update_accessory_visibility.after(poll_loads),
                ),
            );
    }
}

/// Marker component for the primary field model root
#[derive(Component)]
pub struct FieldEntity;

/// Marker component for the accessory model root
#[derive(Component)]
pub struct AccessoryEntity;

/// Marker component for a fiducial plane
#[derive(Component)]
pub struct FiducialEntity {
    pub id: u32,
}

/// One in-flight asset fetch
#[derive(Default)]
pub enum LoadSlot {
    #[default]
    Idle,
    Pending(Handle<Gltf>),
    Loaded,
    Failed,
}

/// Load state for the current field package
#[derive(Resource, Default)]
pub struct SceneSlots {
    /// Session generation these slots belong to
    pub generation: u64,
    pub primary: LoadSlot,
    pub accessory: LoadSlot,
}

impl SceneSlots {
    /// A resolved load may only touch the scene while its generation is
    /// still the live one.
    pub fn is_current(&self, session: &SessionGeneration) -> bool {
        self.generation == session.0
    }
}

/// Source models are Z-up; stand them up in the Y-up render frame.
fn model_transform() -> Transform {
    Transform::from_rotation(Quat::from_rotation_x(std::f32::consts::FRAC_PI_2))
}

/// Tear down the previous scene and start loads for the newly selected
/// field.
fn begin_field_load(
    mut commands: Commands,
    selected: Res<SelectedField>,
    mut session: ResMut<SessionGeneration>,
    mut slots: ResMut<SceneSlots>,
    asset_server: Res<AssetServer>,
    daemon_config: Res<DaemonConfig>,
    pending_layout: Res<PendingLayout>,
    old_scene: Query<
        Entity,
        Or<(With<FieldEntity>, With<AccessoryEntity>, With<FiducialEntity>)>,
    >,
) {
    if !selected.is_changed() {
        return;
    }
    let Some(field) = selected.0.as_ref() else {
        return;
    };

    // Full teardown: despawning the roots releases their mesh and
    // material handles with them.
    for entity in old_scene.iter() {
        commands.entity(entity).despawn();
    }
    if let Ok(mut slot) = pending_layout.0.lock() {
        *slot = None;
    }

    session.0 += 1;
    tracing::info!(
        "Loading field '{}' (session {})",
        field.name,
        session.0
    );

    let primary: Handle<Gltf> = asset_server.load(field.model_path.clone());
    let accessory = match accessory_path_for(&field.model_path) {
        Some(path) => LoadSlot::Pending(asset_server.load(path)),
        None => {
            tracing::warn!("No accessory path derivable from {}", field.model_path);
            LoadSlot::Failed
        }
    };

    *slots = SceneSlots {
        generation: session.0,
        primary: LoadSlot::Pending(primary),
        accessory,
    };

    if let Some(ref layout_path) = field.layout_path {
        fetch_layout(&daemon_config, layout_path, &pending_layout);
    }
}

/// Check loading state and spawn resolved models
fn poll_loads(
    mut commands: Commands,
    mut slots: ResMut<SceneSlots>,
    session: Res<SessionGeneration>,
    asset_server: Res<AssetServer>,
    gltf_assets: Res<Assets<Gltf>>,
    toggles: Res<ViewToggles>,
) {
    let current = slots.is_current(&session);

    let primary = poll_slot(
        std::mem::take(&mut slots.primary),
        &asset_server,
        &gltf_assets,
        "field model",
    );
    slots.primary = match primary {
        SlotPoll::Resolved(scene_handle) => {
            if current {
                commands.spawn((
                    SceneRoot(scene_handle),
                    model_transform(),
                    Visibility::default(),
                    FieldEntity,
                ));
                LoadSlot::Loaded
            } else {
                tracing::debug!("Discarding stale field model load");
                LoadSlot::Idle
            }
        }
        SlotPoll::Keep(slot) => slot,
    };

    let accessory = poll_slot(
        std::mem::take(&mut slots.accessory),
        &asset_server,
        &gltf_assets,
        "accessory model",
    );
    slots.accessory = match accessory {
        SlotPoll::Resolved(scene_handle) => {
            if current {
                commands.spawn((
                    SceneRoot(scene_handle),
                    model_transform(),
                    // Adopt the current toggle value, not the spawn default
                    accessory_visibility(&toggles),
                    AccessoryEntity,
                ));
                LoadSlot::Loaded
            } else {
                tracing::debug!("Discarding stale accessory model load");
                LoadSlot::Idle
            }
        }
        SlotPoll::Keep(slot) => slot,
    };
}

enum SlotPoll {
    /// Load finished; spawn this scene
    Resolved(Handle<Scene>),
    /// Slot stays in this state
    Keep(LoadSlot),
}

fn poll_slot(
    slot: LoadSlot,
    asset_server: &AssetServer,
    gltf_assets: &Assets<Gltf>,
    label: &str,
) -> SlotPoll {
    let LoadSlot::Pending(handle) = slot else {
        return SlotPoll::Keep(slot);
    };

    match asset_server.get_load_state(handle.id()) {
        Some(LoadState::Loaded) => {
            if let Some(gltf) = gltf_assets.get(&handle) {
                if let Some(scene_handle) = gltf.default_scene.clone() {
                    tracing::info!("Loaded {}", label);
                    return SlotPoll::Resolved(scene_handle);
                } else if !gltf.scenes.is_empty() {
                    // Use first scene if no default
                    tracing::info!("Loaded {} (first scene)", label);
                    return SlotPoll::Resolved(gltf.scenes[0].clone());
                }
            }
            tracing::error!("Loaded {} contains no scenes", label);
            SlotPoll::Keep(LoadSlot::Failed)
        }
        Some(LoadState::Failed(e)) => {
            // The other slot and the render loop keep going
            tracing::error!("Failed to load {}: {}", label, e);
            SlotPoll::Keep(LoadSlot::Failed)
        }
        _ => SlotPoll::Keep(LoadSlot::Pending(handle)),
    }
}

/// Visibility an accessory entity should carry under the current toggle
fn accessory_visibility(toggles: &ViewToggles) -> Visibility {
    if toggles.accessory_visible {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    }
}

/// Apply the accessory toggle to all accessory entities
fn update_accessory_visibility(
    toggles: Res<ViewToggles>,
    mut accessories: Query<&mut Visibility, With<AccessoryEntity>>,
) {
    let wanted = accessory_visibility(&toggles);
    for mut visibility in accessories.iter_mut() {
        if *visibility != wanted {
            *visibility = wanted;
        }
    }
}

/// Spawn textured planes for a fetched fiducial layout
fn spawn_fiducials(
    mut commands: Commands,
    pending: Res<PendingLayout>,
    session: Res<SessionGeneration>,
    slots: Res<SceneSlots>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    asset_server: Res<AssetServer>,
) {
    let layout = {
        let Ok(mut slot) = pending.0.lock() else {
            return;
        };
        let Some(layout) = slot.take() else {
            return;
        };
        layout
    };

    // A layout fetched for a torn-down session must not touch the scene
    if !slots.is_current(&session) {
        tracing::debug!("Discarding stale fiducial layout");
        return;
    }

    for fiducial in &layout.fiducials {
        let texture = asset_server.load(format!("apriltags/{}", tag_texture_name(fiducial.id)));
        let material = materials.add(StandardMaterial {
            base_color_texture: Some(texture),
            ..default()
        });

        let half = (fiducial.size / 2.0) as f32;
        let mesh = meshes.add(Plane3d::new(Vec3::Z, Vec2::splat(half)));

        commands.spawn((
            Mesh3d(mesh),
            MeshMaterial3d(material),
            fiducial_transform(&fiducial.render_transform()),
            FiducialEntity { id: fiducial.id },
        ));
    }
}

/// Place a fiducial plane from its row-major layout transform.
///
/// The layout convention needs the same quarter turn as the rest of the
/// scene, plus a yaw so the tag face points along the marker's normal,
/// and a 1mm lift along that normal to avoid z-fighting with the field
/// surface underneath.
fn fiducial_transform(row_major: &[f64; 16]) -> Transform {
    let cols: [f32; 16] = std::array::from_fn(|i| row_major[i] as f32);
    let m = Mat4::from_cols_array(&cols).transpose();
    let m = Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2)
        * m
        * Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2);

    let normal = (m * Vec4::Z).truncate().normalize_or_zero();
    let mut transform = Transform::from_matrix(m);
    transform.translation += normal;
    transform
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_generation_is_not_current() {
        let slots = SceneSlots {
            generation: 1,
            ..default()
        };
        assert!(slots.is_current(&SessionGeneration(1)));
        // The view was torn down and rebuilt since these loads started
        assert!(!slots.is_current(&SessionGeneration(2)));
    }

    #[test]
    fn test_accessory_spawn_adopts_current_toggle() {
        // A load finishing after the operator hid game pieces must spawn
        // hidden, not with the default visibility.
        let hidden = ViewToggles {
            accessory_visible: false,
            ..default()
        };
        assert_eq!(accessory_visibility(&hidden), Visibility::Hidden);
        assert_eq!(
            accessory_visibility(&ViewToggles::default()),
            Visibility::Inherited
        );
    }

    #[test]
    fn test_fiducial_transform_lifts_along_normal() {
        // Identity layout transform: after the scene quarter turn the
        // plane normal points along -Y, and the lift follows it.
        let identity = [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let t = fiducial_transform(&identity);
        assert!((t.translation.length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_fiducial_transform_scales_translation() {
        let mut m = [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        m[3] = 2000.0; // already render-scaled translation
        let t = fiducial_transform(&m);
        // Quarter turn about X keeps the X component in place
        assert!((t.translation.x - 2000.0).abs() < 1.5);
    }
}
