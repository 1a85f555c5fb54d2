//! Frame pacing and render statistics
//!
//! The pose path is paced to a target rate: each Update banks the elapsed
//! time into the frame clock, and downstream systems (marker pose apply,
//! statistics) only act on ticks where a frame is due. Asset loading and
//! UI are not paced.

use bevy::prelude::*;
use fieldsight_core::{FrameClock, RenderStats};

pub struct PacingPlugin;

impl Plugin for PacingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Pacing>()
            .init_resource::<FramePulse>()
            .init_resource::<StatsDisplay>()
            .add_systems(Update, tick_clock);
    }
}

const DEFAULT_TARGET_FPS: u32 = 60;

/// Frame clock state
#[derive(Resource)]
pub struct Pacing {
    pub clock: FrameClock,
    pub target_fps: u32,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            clock: FrameClock::new(DEFAULT_TARGET_FPS),
            target_fps: DEFAULT_TARGET_FPS,
        }
    }
}

/// Whether a paced frame is due this Update
#[derive(Resource, Default)]
pub struct FramePulse {
    pub due: bool,
}

/// Last completed per-second statistics window
#[derive(Resource, Default)]
pub struct StatsDisplay {
    pub fps: u32,
    pub vertices: u64,
    stats: RenderStats,
}

pub(crate) fn tick_clock(
    time: Res<Time>,
    mut pacing: ResMut<Pacing>,
    mut pulse: ResMut<FramePulse>,
    mut display: ResMut<StatsDisplay>,
    mesh_entities: Query<&Mesh3d>,
    meshes: Res<Assets<Mesh>>,
) {
    pulse.due = pacing.clock.advance(time.delta());
    if !pulse.due {
        return;
    }

    let vertices: u64 = mesh_entities
        .iter()
        .filter_map(|m| meshes.get(&m.0))
        .map(|mesh| mesh.count_vertices() as u64)
        .sum();

    if let Some(sample) = display.stats.record_frame(time.elapsed(), vertices) {
        display.fps = sample.fps;
        display.vertices = sample.vertices;
    }
}
