//! 3D scene management
//!
//! Render units are millimeters with Y up; the field model sits centered
//! on the origin. Camera is a simple orbit controller around the field.

use bevy::input::mouse::{MouseMotion, MouseWheel};
use bevy::pbr::{NotShadowCaster, NotShadowReceiver};
use bevy::prelude::*;

use crate::app::{CameraSettings, ViewToggles};

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_scene)
            .add_systems(Update, (update_camera, sync_shadow_toggle));
    }
}

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Marker component for the scene sun
#[derive(Component)]
pub struct SceneLight;

fn setup_scene(mut commands: Commands) {
    // Camera starts on a high diagonal looking at the field center
    commands.spawn((
        Camera3d { ..default() },
        Projection::Perspective(PerspectiveProjection {
            fov: 75.0_f32.to_radians(),
            near: 100.0,
            far: 40_000.0,
            ..default()
        }),
        Transform::from_xyz(4000.0, 4000.0, 4000.0).looking_at(Vec3::ZERO, Vec3::Y),
        MainCamera,
    ));

    // Low ambient so the sun carries the contrast
    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 100.0,
        ..default()
    });

    // Directional light high above the field, the only shadow caster
    commands.spawn((
        DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4_000.0, 8_000.0, 8_000.0).looking_at(Vec3::ZERO, Vec3::Y),
        SceneLight,
    ));
}

fn update_camera(
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
    mut settings: ResMut<CameraSettings>,
    mut mouse_motion: EventReader<MouseMotion>,
    mut mouse_wheel: EventReader<MouseWheel>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    time: Res<Time>,
    mut contexts: bevy_egui::EguiContexts,
) {
    // Check if egui wants the mouse - if so, don't process camera controls
    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input())
        .unwrap_or(false);

    let mut total_motion = Vec2::ZERO;
    for motion in mouse_motion.read() {
        total_motion += motion.delta;
    }

    // Orbit with left mouse drag (only when UI doesn't want pointer)
    if mouse_button.pressed(MouseButton::Left) && !egui_wants_pointer {
        settings.azimuth -= total_motion.x * settings.sensitivity;
        settings.elevation =
            (settings.elevation + total_motion.y * settings.sensitivity).clamp(-1.5, 1.5);
    }

    // Zoom with scroll - smooth zoom using target_distance
    if !egui_wants_pointer {
        for scroll in mouse_wheel.read() {
            let zoom_factor = 1.0 - scroll.y * settings.zoom_speed * 0.3;
            settings.target_distance =
                (settings.target_distance * zoom_factor).clamp(500.0, 30_000.0);
        }
    } else {
        // Drain the scroll events even if we're not using them
        for _ in mouse_wheel.read() {}
    }

    // Smooth interpolation for zoom
    let dt = time.delta_secs();
    let lerp_factor = 1.0 - (-settings.smooth_factor * 60.0 * dt).exp();
    settings.distance =
        settings.distance + (settings.target_distance - settings.distance) * lerp_factor;

    // Update camera position (Y is up)
    if let Ok(mut transform) = camera_query.single_mut() {
        let x = settings.distance * settings.azimuth.cos() * settings.elevation.cos();
        let z = settings.distance * settings.azimuth.sin() * settings.elevation.cos();
        let y = settings.distance * settings.elevation.sin();

        transform.translation = settings.target + Vec3::new(x, y, z);
        transform.look_at(settings.target, Vec3::Y);
    }
}

/// Synchronize the shadow toggle to the light and every mesh entity.
///
/// Applied immediately on flip, and every frame thereafter so meshes
/// spawned by a load that finishes later pick up the current flag rather
/// than the spawn-time default.
fn sync_shadow_toggle(
    mut commands: Commands,
    toggles: Res<ViewToggles>,
    mut lights: Query<&mut DirectionalLight, With<SceneLight>>,
    casting: Query<Entity, (With<Mesh3d>, Without<NotShadowCaster>)>,
    muted: Query<Entity, (With<Mesh3d>, With<NotShadowCaster>)>,
) {
    for mut light in lights.iter_mut() {
        if light.shadows_enabled != toggles.shadows_enabled {
            light.shadows_enabled = toggles.shadows_enabled;
        }
    }

    if toggles.shadows_enabled {
        for entity in muted.iter() {
            commands
                .entity(entity)
                .remove::<(NotShadowCaster, NotShadowReceiver)>();
        }
    } else {
        for entity in casting.iter() {
            commands
                .entity(entity)
                .insert((NotShadowCaster, NotShadowReceiver));
        }
    }
}
