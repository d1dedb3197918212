use bevy_ecs::prelude::Resource;

/// Simulation clock shared by systems.
#[derive(Resource, Clone, Copy, Debug)]
pub struct WorldTime {
    pub elapsed: f32,
    /// Scaled delta of the current frame in seconds
    pub delta: f32,
    pub time_scale: f32,
    /// Frames stepped so far, drives animation ticks
    pub frame: u64,
}

impl Default for WorldTime {
    fn default() -> Self {
        WorldTime {
            elapsed: 0.0,
            delta: 0.0,
            time_scale: 1.0,
            frame: 0,
        }
    }
}
