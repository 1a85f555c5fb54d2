//! Tracked pose marker
//!
//! One wireframe frustum per view session shows the latest robot camera
//! pose. Geometry and material are fixed at creation; pose updates only
//! mutate the transform. The marker is rebuilt from scratch when the
//! view session changes.

use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use bevy::render::render_resource::PrimitiveTopology;
use fieldsight_core::RenderPose;

use crate::app::SessionGeneration;
use crate::network::LatestPose;
use crate::pacing::FramePulse;

/// Frustum footprint, render units
const MARKER_SIZE: f32 = 300.0;
const MARKER_DEPTH: f32 = 600.0;

pub struct MarkerPlugin;

impl Plugin for MarkerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MarkerState>()
            .add_systems(
                Update,
                (rebuild_on_session_change, apply_pose)
                    .chain()
                    // Pose application keys off the pulse set this tick
                    .after(crate::pacing::tick_clock),
            );
    }
}

/// Marker component for the tracked pose entity
#[derive(Component)]
pub struct TrackedMarker;

/// Handle to the single live marker
#[derive(Resource, Default)]
pub struct MarkerState {
    pub entity: Option<Entity>,
    /// Session the marker belongs to
    pub generation: u64,
}

/// Line-list vertices for a wireframe frustum: a square face of side
/// `2 * size` at the origin plane and an apex `depth` behind it.
fn frustum_lines(size: f32, depth: f32) -> Vec<[f32; 3]> {
    let ftl = [-size, size, 0.0];
    let ftr = [size, size, 0.0];
    let fbr = [size, -size, 0.0];
    let fbl = [-size, -size, 0.0];
    let apex = [0.0, 0.0, -depth];

    vec![
        // Front rectangle (4 lines)
        ftl, ftr, ftr, fbr, fbr, fbl, fbl, ftl,
        // Lines from corners to the apex (4 lines)
        ftl, apex, ftr, apex, fbr, apex, fbl, apex,
    ]
}

fn frustum_mesh() -> Mesh {
    let positions = frustum_lines(MARKER_SIZE, MARKER_DEPTH);
    let count = positions.len();
    Mesh::new(
        PrimitiveTopology::LineList,
        RenderAssetUsages::RENDER_WORLD,
    )
    .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
    // The material is unlit; flat normals just satisfy the vertex layout
    .with_inserted_attribute(Mesh::ATTRIBUTE_NORMAL, vec![[0.0, 0.0, 1.0]; count])
}

/// Create the marker if this session doesn't have one yet. Calling this
/// again within a session is a no-op; there is exactly one marker alive.
pub fn ensure_created(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    state: &mut MarkerState,
    generation: u64,
) -> Entity {
    if let Some(entity) = state.entity {
        if state.generation == generation {
            return entity;
        }
    }

    let mesh = meshes.add(frustum_mesh());
    let material = materials.add(StandardMaterial {
        base_color: Color::srgb(1.0, 0.0, 0.0),
        unlit: true,
        ..default()
    });

    let entity = commands
        .spawn((
            Mesh3d(mesh),
            MeshMaterial3d(material),
            Transform::IDENTITY,
            TrackedMarker,
        ))
        .id();
    state.entity = Some(entity);
    state.generation = generation;
    entity
}

/// Tear down the old session's marker and create the new one
fn rebuild_on_session_change(
    mut commands: Commands,
    session: Res<SessionGeneration>,
    mut state: ResMut<MarkerState>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if session.0 == 0 || state.generation == session.0 {
        return;
    }
    if let Some(entity) = state.entity.take() {
        commands.entity(entity).despawn();
    }
    ensure_created(
        &mut commands,
        &mut meshes,
        &mut materials,
        &mut state,
        session.0,
    );
}

/// Fold a render pose into the marker transform.
///
/// A full transform replaces rotation and translation; a bare point moves
/// the marker and leaves its orientation alone.
fn pose_transform(pose: &RenderPose, previous: &Transform) -> Transform {
    match pose {
        RenderPose::Transform(m) => {
            let cols: [f32; 16] = std::array::from_fn(|i| m[i / 4][i % 4] as f32);
            Transform::from_matrix(Mat4::from_cols_array(&cols).transpose())
        }
        RenderPose::Position(p) => previous
            .with_translation(Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32)),
    }
}

/// Apply the newest pose at frame boundaries
fn apply_pose(
    pulse: Res<FramePulse>,
    latest: Res<LatestPose>,
    state: Res<MarkerState>,
    mut markers: Query<&mut Transform, With<TrackedMarker>>,
) {
    if !pulse.due {
        return;
    }
    let Some(pose) = latest.take() else {
        return;
    };

    let Some(entity) = state.entity else {
        // Pose arrived before any view session started; drop it
        tracing::warn!("Tracked marker not initialized yet");
        return;
    };
    let Ok(mut transform) = markers.get_mut(entity) else {
        tracing::warn!("Tracked marker not initialized yet");
        return;
    };

    let updated = pose_transform(&pose, &transform);
    *transform = updated;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::world::CommandQueue;

    #[test]
    fn test_ensure_created_is_idempotent_per_session() {
        let mut world = World::new();
        let mut queue = CommandQueue::default();
        let mut commands = Commands::new(&mut queue, &world);
        let mut meshes = Assets::<Mesh>::default();
        let mut materials = Assets::<StandardMaterial>::default();
        let mut state = MarkerState::default();

        let first = ensure_created(&mut commands, &mut meshes, &mut materials, &mut state, 1);
        let again = ensure_created(&mut commands, &mut meshes, &mut materials, &mut state, 1);
        assert_eq!(first, again);
        assert_eq!(meshes.len(), 1);

        // A new session gets a fresh marker entity
        let rebuilt = ensure_created(&mut commands, &mut meshes, &mut materials, &mut state, 2);
        assert_ne!(first, rebuilt);
        assert_eq!(state.generation, 2);
        queue.apply(&mut world);
    }

    #[test]
    fn test_frustum_geometry() {
        let verts = frustum_lines(300.0, 600.0);
        // 8 line segments, two vertices each
        assert_eq!(verts.len(), 16);
        assert!(verts.contains(&[-300.0, 300.0, 0.0]));
        assert!(verts.contains(&[0.0, 0.0, -600.0]));
    }

    #[test]
    fn test_matrix_pose_replaces_transform() {
        let pose = RenderPose::Transform([
            [1.0, 0.0, 0.0, 10.0],
            [0.0, 1.0, 0.0, 20.0],
            [0.0, 0.0, 1.0, 30.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let t = pose_transform(&pose, &Transform::IDENTITY);
        assert_eq!(t.translation, Vec3::new(10.0, 20.0, 30.0));
        assert_eq!(t.rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_point_pose_keeps_orientation() {
        let previous = Transform::from_rotation(Quat::from_rotation_y(1.0));
        let pose = RenderPose::Position([5.0, 6.0, 7.0]);
        let t = pose_transform(&pose, &previous);
        assert_eq!(t.translation, Vec3::new(5.0, 6.0, 7.0));
        assert_eq!(t.rotation, previous.rotation);
    }
}
