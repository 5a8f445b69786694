//! Fixed per-world limits. Every exported tensor shape is a function of these
//! and the configured world count.

/// Maximum agents (hiders + seekers) per world.
pub const MAX_AGENTS: usize = 6;
/// Maximum movable boxes per world.
pub const MAX_BOXES: usize = 9;
/// Maximum ramps per world.
pub const MAX_RAMPS: usize = 2;
/// Lidar rays per agent, evenly spaced over a full turn.
pub const NUM_LIDAR_SAMPLES: usize = 30;
/// Maximum lidar range in world units. Misses report this value.
pub const LIDAR_RANGE: f32 = 20.0;

/// Values per agent action: move x, move y, rotate, grab, lock.
pub const ACTION_DIMS: usize = 5;
/// Discrete buckets for the three movement axes. Bucket 5 is "no motion".
pub const MOVE_BUCKETS: i32 = 11;

/// Ticks per episode before `done` is raised.
pub const EPISODE_LEN: u32 = 240;
/// Ticks at the start of an episode during which seekers are frozen.
pub const PREP_PERIOD: u32 = 96;

/// Half-extent of the square arena in world units.
pub const ARENA_HALF_EXTENT: f32 = 18.0;
/// Simulation timestep in seconds.
pub const DELTA_T: f32 = 0.05;

/// Hiders/seekers spawned when a reset request leaves the count at zero.
pub const DEFAULT_HIDERS: u32 = 2;
pub const DEFAULT_SEEKERS: u32 = 2;

/// Slots in the physics loader's object storage.
pub const MAX_PHYSICS_OBJECTS: usize = 10;
