//! One hide & seek world and its fixed per-tick graph.
//!
//! The arena is a walled square on the ground plane. Hiders and seekers are
//! cylinders, movable boxes and ramps are oriented boxes on the floor. A tick
//! runs reset, action, physics, episode bookkeeping, observation and reward
//! in that order, reading `reset`/`action` and writing every other export.

use crate::exports::WorldExports;
use crate::geometry::{closest_point_obb, ray_circle, ray_obb, rotate};
use crate::init::WorldInit;
use crate::rng::{splitmix64, Rng};
use crate::KernelError;
use glam::Vec2;
use hideseek_assets::ObjectStore;
use hideseek_common::consts::{
    ACTION_DIMS, ARENA_HALF_EXTENT, DEFAULT_HIDERS, DEFAULT_SEEKERS, DELTA_T, EPISODE_LEN,
    LIDAR_RANGE, MAX_AGENTS, MAX_BOXES, MAX_RAMPS, MOVE_BUCKETS, NUM_LIDAR_SAMPLES, PREP_PERIOD,
};
use hideseek_common::ObjectId;
use std::f32::consts::{PI, TAU};

/// Agent speed at full deflection, units per second.
const MOVE_SPEED: f32 = 4.0;
/// Agent turn rate at full deflection, radians per second.
const TURN_SPEED: f32 = PI;
/// Reach for grab and lock, measured from the agent's surface.
const INTERACT_RANGE: f32 = 1.5;
/// Half of the field of view.
const VIEW_HALF_ANGLE: f32 = 67.5 * PI / 180.0;
/// Velocity decay of free bodies per unit of dynamic friction.
const FRICTION_RATE: f32 = 4.0;
/// Spawn margin from the arena walls.
const SPAWN_MARGIN: f32 = 2.0;
/// Minimum gap between spawned footprints.
const SPAWN_CLEARANCE: f32 = 1.0;
/// Probability that a spawned box is the elongated variant.
const ELONGATED_CHANCE: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum Team {
    #[default]
    Hider = 0,
    Seeker = 1,
}

/// Reference to a scene entity by kind and index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Wall(usize),
    Box(usize),
    Ramp(usize),
    Agent(usize),
}

/// Nearest intersection of a ray with the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub distance: f32,
    pub entity: EntityRef,
    /// Catalog object the entity was spawned from.
    pub object: ObjectId,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Agent {
    pub pos: Vec2,
    pub vel: Vec2,
    pub yaw: f32,
    pub team: Team,
    pub active: bool,
    pub grabbed: Option<EntityRef>,
}

/// A box, ramp or wall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub object: ObjectId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub yaw: f32,
    pub half: Vec2,
    pub inv_mass: f32,
    pub mu_d: f32,
    /// Team that locked the body. Locks last until the episode ends.
    pub locked: Option<Team>,
}

impl Body {
    fn movable(&self) -> bool {
        self.inv_mass > 0.0 && self.locked.is_none()
    }

    /// Radius of the circle enclosing the footprint.
    fn bounding_radius(&self) -> f32 {
        self.half.length()
    }
}

#[derive(Debug, Clone, Copy)]
struct BodyShape {
    object: ObjectId,
    half: Vec2,
    inv_mass: f32,
    mu_d: f32,
}

impl BodyShape {
    fn from_store(objects: &ObjectStore, object: ObjectId) -> Result<Self, KernelError> {
        let obj = objects.get(object).ok_or(KernelError::MissingObject(object))?;
        let half = obj.aabb.half_extents();
        Ok(Self {
            object,
            half: Vec2::new(half.x, half.y),
            inv_mass: obj.metadata.inv_mass,
            mu_d: obj.metadata.mu_d,
        })
    }

    fn spawn(&self, pos: Vec2, yaw: f32) -> Body {
        Body {
            object: self.object,
            pos,
            vel: Vec2::ZERO,
            yaw,
            half: self.half,
            inv_mass: self.inv_mass,
            mu_d: self.mu_d,
            locked: None,
        }
    }
}

/// Footprints of every spawnable object, read from the object storage.
#[derive(Debug, Clone, Copy)]
struct Shapes {
    agent_radius: f32,
    cube: BodyShape,
    elongated: BodyShape,
    ramp: BodyShape,
    wall: BodyShape,
}

impl Shapes {
    fn from_store(objects: &ObjectStore) -> Result<Self, KernelError> {
        let agent = BodyShape::from_store(objects, ObjectId::CYLINDER)?;
        Ok(Self {
            agent_radius: agent.half.x,
            cube: BodyShape::from_store(objects, ObjectId::CUBE)?,
            elongated: BodyShape::from_store(objects, ObjectId::ELONGATED_BOX)?,
            ramp: BodyShape::from_store(objects, ObjectId::RAMP)?,
            wall: BodyShape::from_store(objects, ObjectId::WALL)?,
        })
    }

    /// The four outer walls. Their inner faces sit on the arena boundary.
    fn walls(&self) -> [Body; 4] {
        let t = self.wall.half.y;
        let e = ARENA_HALF_EXTENT + t;
        let shape = BodyShape {
            half: Vec2::new(ARENA_HALF_EXTENT + 2.0 * t, t),
            ..self.wall
        };
        [
            shape.spawn(Vec2::new(0.0, e), 0.0),
            shape.spawn(Vec2::new(0.0, -e), 0.0),
            shape.spawn(Vec2::new(e, 0.0), PI / 2.0),
            shape.spawn(Vec2::new(-e, 0.0), PI / 2.0),
        ]
    }
}

/// Hiders and seekers for a reset request. Non-positive counts take the
/// defaults; the total is capped at [`MAX_AGENTS`], hiders first.
pub fn team_sizes(hiders: i32, seekers: i32) -> (usize, usize) {
    let pick = |requested: i32, default: u32| {
        if requested > 0 {
            requested as usize
        } else {
            default as usize
        }
    };
    let hiders = pick(hiders, DEFAULT_HIDERS).min(MAX_AGENTS);
    let seekers = pick(seekers, DEFAULT_SEEKERS).min(MAX_AGENTS - hiders);
    (hiders, seekers)
}

/// Map an action bucket to [-1, 1]. Out-of-range buckets are clamped.
pub fn bucket_axis(bucket: i32) -> f32 {
    let center = MOVE_BUCKETS / 2;
    (bucket.clamp(0, MOVE_BUCKETS - 1) - center) as f32 / center as f32
}

/// Random pose clear of everything in `placed`, which it then joins. Gives
/// up on clearance after a bounded number of draws.
fn spawn_pose(rng: &mut Rng, radius: f32, placed: &mut Vec<(Vec2, f32)>) -> (Vec2, f32) {
    const ATTEMPTS: usize = 64;
    let limit = ARENA_HALF_EXTENT - SPAWN_MARGIN;
    let mut pos = Vec2::ZERO;
    for _ in 0..ATTEMPTS {
        pos = Vec2::new(rng.range_f32(-limit, limit), rng.range_f32(-limit, limit));
        let clear = placed
            .iter()
            .all(|&(p, r)| p.distance(pos) > r + radius + SPAWN_CLEARANCE);
        if clear {
            break;
        }
    }
    placed.push((pos, radius));
    (pos, rng.range_f32(-PI, PI))
}

fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}

/// State of one world.
#[derive(Debug, Clone)]
pub struct Sim {
    init: WorldInit,
    shapes: Shapes,
    rng: Rng,
    episode: u32,
    step: u32,
    agents: [Agent; MAX_AGENTS],
    boxes: Vec<Body>,
    ramps: Vec<Body>,
    walls: [Body; 4],
}

impl Sim {
    /// Build a world and start its first episode, writing the initial
    /// observations. Team sizes come from the `reset` row if already set.
    pub fn new(init: WorldInit, io: &mut WorldExports<'_>) -> Result<Self, KernelError> {
        let shapes = Shapes::from_store(&init.objects)?;
        let mut sim = Self {
            walls: shapes.walls(),
            init,
            shapes,
            rng: Rng::new(0),
            episode: 0,
            step: 0,
            agents: [Agent::default(); MAX_AGENTS],
            boxes: Vec::with_capacity(MAX_BOXES),
            ramps: Vec::with_capacity(MAX_RAMPS),
        };
        sim.start_episode(io.reset[1], io.reset[2]);
        io.reset[0] = 0;
        io.reward.fill(0.0);
        sim.write_counters(io);
        sim.observe(io);
        Ok(sim)
    }

    /// Advance one tick.
    pub fn tick(&mut self, io: &mut WorldExports<'_>) {
        self.reset_stage(io);
        self.action_stage(io);
        self.physics_stage();
        self.step += 1;
        self.write_counters(io);
        self.observe(io);
        self.reward_stage(io);
    }

    pub fn episode(&self) -> u32 {
        self.episode
    }

    /// Ticks since the current episode started.
    pub fn step_count(&self) -> u32 {
        self.step
    }

    pub fn agents(&self) -> &[Agent; MAX_AGENTS] {
        &self.agents
    }

    pub fn boxes(&self) -> &[Body] {
        &self.boxes
    }

    pub fn ramps(&self) -> &[Body] {
        &self.ramps
    }

    pub fn walls(&self) -> &[Body; 4] {
        &self.walls
    }

    pub fn agent_radius(&self) -> f32 {
        self.shapes.agent_radius
    }

    pub fn body(&self, entity: EntityRef) -> Option<&Body> {
        match entity {
            EntityRef::Wall(i) => self.walls.get(i),
            EntityRef::Box(i) => self.boxes.get(i),
            EntityRef::Ramp(i) => self.ramps.get(i),
            EntityRef::Agent(_) => None,
        }
    }

    fn body_mut(&mut self, entity: EntityRef) -> Option<&mut Body> {
        match entity {
            EntityRef::Wall(i) => self.walls.get_mut(i),
            EntityRef::Box(i) => self.boxes.get_mut(i),
            EntityRef::Ramp(i) => self.ramps.get_mut(i),
            EntityRef::Agent(_) => None,
        }
    }

    fn entity_pos(&self, entity: EntityRef) -> Option<Vec2> {
        match entity {
            EntityRef::Agent(i) => self.agents.get(i).filter(|a| a.active).map(|a| a.pos),
            other => self.body(other).map(|b| b.pos),
        }
    }

    /// Nearest hit along a unit-length ray within `max_distance`, ignoring
    /// `skip` and inactive agents.
    pub fn raycast(&self, origin: Vec2, dir: Vec2, max_distance: f32, skip: Option<EntityRef>) -> Option<Hit> {
        let mut best: Option<Hit> = None;
        let mut consider = |entity: EntityRef, object: ObjectId, t: Option<f32>| {
            if skip == Some(entity) {
                return;
            }
            if let Some(t) = t {
                if t <= max_distance && best.is_none_or(|b| t < b.distance) {
                    best = Some(Hit {
                        distance: t,
                        entity,
                        object,
                    });
                }
            }
        };

        let bodies = self
            .walls
            .iter()
            .enumerate()
            .map(|(i, b)| (EntityRef::Wall(i), b))
            .chain(self.boxes.iter().enumerate().map(|(i, b)| (EntityRef::Box(i), b)))
            .chain(self.ramps.iter().enumerate().map(|(i, b)| (EntityRef::Ramp(i), b)));
        for (entity, body) in bodies {
            consider(entity, body.object, ray_obb(origin, dir, body.pos, body.half, body.yaw));
        }
        for (i, agent) in self.agents.iter().enumerate().filter(|(_, a)| a.active) {
            consider(
                EntityRef::Agent(i),
                ObjectId::CYLINDER,
                ray_circle(origin, dir, agent.pos, self.shapes.agent_radius),
            );
        }
        best
    }

    /// Whether `observer` has `target` inside its view cone with nothing in
    /// between.
    pub fn can_see(&self, observer: usize, target: EntityRef) -> bool {
        let Some(obs) = self.agents.get(observer).filter(|a| a.active) else {
            return false;
        };
        let Some(target_pos) = self.entity_pos(target) else {
            return false;
        };
        let delta = target_pos - obs.pos;
        let dist = delta.length();
        if dist < 1e-4 {
            return true;
        }
        let dir = delta / dist;
        if Vec2::from_angle(obs.yaw).dot(dir) < VIEW_HALF_ANGLE.cos() {
            return false;
        }
        match self.raycast(obs.pos, dir, dist, Some(EntityRef::Agent(observer))) {
            None => true,
            Some(hit) => hit.entity == target,
        }
    }

    fn reset_stage(&mut self, io: &mut WorldExports<'_>) {
        if io.reset[0] != 0 || self.step >= EPISODE_LEN {
            io.reset[0] = 0;
            self.start_episode(io.reset[1], io.reset[2]);
        }
    }

    fn start_episode(&mut self, hiders: i32, seekers: i32) {
        self.episode = self.init.episodes.next_episode();
        self.rng = Rng::new(splitmix64(self.episode as u64));
        self.step = 0;

        let (num_hiders, num_seekers) = team_sizes(hiders, seekers);
        let num_entities = self
            .rng
            .range_u32(self.init.min_entities, self.init.max_entities)
            .min((MAX_BOXES + MAX_RAMPS) as u32) as usize;
        let num_ramps = (num_entities / 3).min(MAX_RAMPS);
        let num_boxes = num_entities - num_ramps;

        let mut placed: Vec<(Vec2, f32)> = Vec::with_capacity(num_entities + MAX_AGENTS);

        self.boxes.clear();
        for _ in 0..num_boxes {
            let shape = if self.rng.next_f32() < ELONGATED_CHANCE {
                self.shapes.elongated
            } else {
                self.shapes.cube
            };
            let (pos, yaw) = spawn_pose(&mut self.rng, shape.half.length(), &mut placed);
            self.boxes.push(shape.spawn(pos, yaw));
        }
        self.ramps.clear();
        for _ in 0..num_ramps {
            let shape = self.shapes.ramp;
            let (pos, yaw) = spawn_pose(&mut self.rng, shape.half.length(), &mut placed);
            self.ramps.push(shape.spawn(pos, yaw));
        }
        for i in 0..MAX_AGENTS {
            let active = i < num_hiders + num_seekers;
            let (pos, yaw) = if active {
                spawn_pose(&mut self.rng, self.shapes.agent_radius, &mut placed)
            } else {
                (Vec2::ZERO, 0.0)
            };
            self.agents[i] = Agent {
                pos,
                yaw,
                team: if i < num_hiders { Team::Hider } else { Team::Seeker },
                active,
                ..Agent::default()
            };
        }

        tracing::trace!(
            episode = self.episode,
            hiders = num_hiders,
            seekers = num_seekers,
            boxes = num_boxes,
            ramps = num_ramps,
            "episode start"
        );
    }

    fn action_stage(&mut self, io: &WorldExports<'_>) {
        let prep = self.step < PREP_PERIOD;
        for (i, action) in io.action.chunks_exact(ACTION_DIMS).enumerate() {
            let agent = &mut self.agents[i];
            if !agent.active {
                continue;
            }
            if prep && agent.team == Team::Seeker {
                agent.vel = Vec2::ZERO;
                agent.grabbed = None;
                continue;
            }
            let local = Vec2::new(bucket_axis(action[0]), bucket_axis(action[1]));
            agent.vel = rotate(local, agent.yaw) * MOVE_SPEED;
            agent.yaw = wrap_angle(agent.yaw + bucket_axis(action[2]) * TURN_SPEED * DELTA_T);

            let (grab, lock) = (action[3] != 0, action[4] != 0);
            if !grab {
                self.agents[i].grabbed = None;
            } else if self.agents[i].grabbed.is_none() {
                self.try_grab(i);
            }
            if lock {
                self.try_lock(i);
            }
        }
    }

    /// Nearest box or ramp in front of agent `i` within reach.
    fn interactable(&self, i: usize) -> Option<EntityRef> {
        let agent = &self.agents[i];
        let facing = Vec2::from_angle(agent.yaw);
        let bodies = self
            .boxes
            .iter()
            .enumerate()
            .map(|(k, b)| (EntityRef::Box(k), b))
            .chain(self.ramps.iter().enumerate().map(|(k, b)| (EntityRef::Ramp(k), b)));

        bodies
            .filter(|(_, b)| (b.pos - agent.pos).dot(facing) > 0.0)
            .map(|(e, b)| {
                let surface = closest_point_obb(agent.pos, b.pos, b.half, b.yaw);
                (e, agent.pos.distance(surface) - self.shapes.agent_radius)
            })
            .filter(|(_, d)| *d <= INTERACT_RANGE)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(e, _)| e)
    }

    fn held_by_anyone(&self, entity: EntityRef) -> bool {
        self.agents.iter().any(|a| a.grabbed == Some(entity))
    }

    fn try_grab(&mut self, i: usize) {
        let Some(entity) = self.interactable(i) else {
            return;
        };
        let free = self.body(entity).is_some_and(|b| b.movable());
        if free && !self.held_by_anyone(entity) {
            self.agents[i].grabbed = Some(entity);
        }
    }

    fn try_lock(&mut self, i: usize) {
        let Some(entity) = self.interactable(i) else {
            return;
        };
        let held_by_other = self
            .agents
            .iter()
            .enumerate()
            .any(|(k, a)| k != i && a.grabbed == Some(entity));
        if held_by_other {
            return;
        }
        let team = self.agents[i].team;
        if let Some(body) = self.body_mut(entity) {
            if body.locked.is_none() {
                body.locked = Some(team);
                body.vel = Vec2::ZERO;
            }
        }
        if self.agents[i].grabbed == Some(entity) {
            self.agents[i].grabbed = None;
        }
    }

    fn physics_stage(&mut self) {
        for i in 0..MAX_AGENTS {
            let Agent {
                active, grabbed, vel, ..
            } = self.agents[i];
            if let (true, Some(entity)) = (active, grabbed) {
                if let Some(body) = self.body_mut(entity) {
                    body.vel = vel;
                }
            }
        }

        for agent in self.agents.iter_mut().filter(|a| a.active) {
            agent.pos += agent.vel * DELTA_T;
        }
        for body in self.boxes.iter_mut().chain(self.ramps.iter_mut()) {
            if !body.movable() {
                body.vel = Vec2::ZERO;
                continue;
            }
            body.pos += body.vel * DELTA_T;
            body.vel *= (1.0 - body.mu_d * FRICTION_RATE * DELTA_T).max(0.0);
        }

        self.resolve_agent_body_contacts();
        self.resolve_agent_agent_contacts();
        self.confine_to_arena();
    }

    /// Agents shove free bodies out of their way and are stopped by locked
    /// ones.
    fn resolve_agent_body_contacts(&mut self) {
        let radius = self.shapes.agent_radius;
        for i in 0..MAX_AGENTS {
            let Agent {
                active, grabbed, mut pos, ..
            } = self.agents[i];
            if !active {
                continue;
            }
            let bodies = self
                .boxes
                .iter_mut()
                .enumerate()
                .map(|(k, b)| (EntityRef::Box(k), b))
                .chain(self.ramps.iter_mut().enumerate().map(|(k, b)| (EntityRef::Ramp(k), b)));
            for (entity, body) in bodies {
                if grabbed == Some(entity) {
                    continue;
                }
                let closest = closest_point_obb(pos, body.pos, body.half, body.yaw);
                let offset = pos - closest;
                let dist = offset.length();
                if dist >= radius {
                    continue;
                }
                let normal = if dist > 1e-6 {
                    offset / dist
                } else {
                    (pos - body.pos).normalize_or(Vec2::X)
                };
                let depth = radius - dist;
                if body.movable() {
                    body.pos -= normal * depth;
                } else {
                    pos += normal * depth;
                }
            }
            self.agents[i].pos = pos;
        }
    }

    fn resolve_agent_agent_contacts(&mut self) {
        let min_dist = 2.0 * self.shapes.agent_radius;
        for i in 0..MAX_AGENTS {
            for j in (i + 1)..MAX_AGENTS {
                let (a, b) = (self.agents[i], self.agents[j]);
                if !(a.active && b.active) {
                    continue;
                }
                let offset = b.pos - a.pos;
                let dist = offset.length();
                if dist >= min_dist {
                    continue;
                }
                let normal = offset.normalize_or(Vec2::X);
                let push = normal * (min_dist - dist) * 0.5;
                self.agents[i].pos -= push;
                self.agents[j].pos += push;
            }
        }
    }

    fn confine_to_arena(&mut self) {
        let agent_limit = ARENA_HALF_EXTENT - self.shapes.agent_radius;
        for agent in self.agents.iter_mut().filter(|a| a.active) {
            agent.pos = agent.pos.clamp(Vec2::splat(-agent_limit), Vec2::splat(agent_limit));
        }
        for body in self.boxes.iter_mut().chain(self.ramps.iter_mut()) {
            let limit = (ARENA_HALF_EXTENT - body.bounding_radius()).max(0.0);
            body.pos = body.pos.clamp(Vec2::splat(-limit), Vec2::splat(limit));
        }
    }

    fn write_counters(&self, io: &mut WorldExports<'_>) {
        io.done[0] = i32::from(self.step >= EPISODE_LEN);
        io.prep_counter[0] = PREP_PERIOD.saturating_sub(self.step) as i32;
    }

    fn observe(&self, io: &mut WorldExports<'_>) {
        for (i, agent) in self.agents.iter().enumerate() {
            io.agent_type[i] = agent.team as i32;
            io.agent_mask[i] = if agent.active { 1.0 } else { 0.0 };
        }

        io.global_positions.fill(0.0);
        let global = io.global_positions.chunks_exact_mut(2);
        let slots = self
            .boxes
            .iter()
            .map(|b| Some(b.pos))
            .chain(std::iter::repeat(None))
            .take(MAX_BOXES)
            .chain(self.ramps.iter().map(|r| Some(r.pos)).chain(std::iter::repeat(None)).take(MAX_RAMPS))
            .chain(self.agents.iter().map(|a| a.active.then_some(a.pos)));
        for (out, pos) in global.zip(slots) {
            if let Some(pos) = pos {
                out.copy_from_slice(&pos.to_array());
            }
        }

        let rows = io
            .agent_data
            .chunks_exact_mut((MAX_AGENTS - 1) * 4)
            .zip(io.visible_agents_mask.chunks_exact_mut(MAX_AGENTS - 1))
            .zip(io.box_data.chunks_exact_mut(MAX_BOXES * 7))
            .zip(io.visible_boxes_mask.chunks_exact_mut(MAX_BOXES))
            .zip(io.ramp_data.chunks_exact_mut(MAX_RAMPS * 5))
            .zip(io.visible_ramps_mask.chunks_exact_mut(MAX_RAMPS))
            .zip(io.lidar.chunks_exact_mut(NUM_LIDAR_SAMPLES));

        for (i, ((((((agent_data, agent_vis), box_data), box_vis), ramp_data), ramp_vis), lidar)) in
            rows.enumerate()
        {
            agent_data.fill(0.0);
            agent_vis.fill(0.0);
            box_data.fill(0.0);
            box_vis.fill(0.0);
            ramp_data.fill(0.0);
            ramp_vis.fill(0.0);
            lidar.fill(0.0);

            let obs = self.agents[i];
            if !obs.active {
                continue;
            }
            let local_pos = |p: Vec2| rotate(p - obs.pos, -obs.yaw);
            let local_vel = |v: Vec2| rotate(v - obs.vel, -obs.yaw);
            let local_yaw = |yaw: f32| wrap_angle(yaw - obs.yaw);

            let others = (0..MAX_AGENTS).filter(|&j| j != i);
            for (k, j) in others.enumerate() {
                let other = self.agents[j];
                if !other.active {
                    continue;
                }
                let (p, v) = (local_pos(other.pos), local_vel(other.vel));
                agent_data[k * 4..k * 4 + 4].copy_from_slice(&[p.x, p.y, v.x, v.y]);
                agent_vis[k] = visibility(self.can_see(i, EntityRef::Agent(j)));
            }

            for (k, b) in self.boxes.iter().enumerate() {
                let (p, v) = (local_pos(b.pos), local_vel(b.vel));
                box_data[k * 7..k * 7 + 7]
                    .copy_from_slice(&[p.x, p.y, v.x, v.y, b.half.x, b.half.y, local_yaw(b.yaw)]);
                box_vis[k] = visibility(self.can_see(i, EntityRef::Box(k)));
            }

            for (k, r) in self.ramps.iter().enumerate() {
                let (p, v) = (local_pos(r.pos), local_vel(r.vel));
                ramp_data[k * 5..k * 5 + 5].copy_from_slice(&[p.x, p.y, v.x, v.y, local_yaw(r.yaw)]);
                ramp_vis[k] = visibility(self.can_see(i, EntityRef::Ramp(k)));
            }

            for (k, out) in lidar.iter_mut().enumerate() {
                let angle = obs.yaw + TAU * k as f32 / NUM_LIDAR_SAMPLES as f32;
                *out = self
                    .raycast(obs.pos, Vec2::from_angle(angle), LIDAR_RANGE, Some(EntityRef::Agent(i)))
                    .map_or(LIDAR_RANGE, |hit| hit.distance);
            }
        }
    }

    fn reward_stage(&self, io: &mut WorldExports<'_>) {
        io.reward.fill(0.0);
        if self.step < PREP_PERIOD {
            return;
        }
        let active = |team: Team| {
            self.agents
                .iter()
                .enumerate()
                .filter(move |(_, a)| a.active && a.team == team)
                .map(|(i, _)| i)
        };
        let hider_seen = active(Team::Seeker)
            .any(|s| active(Team::Hider).any(|h| self.can_see(s, EntityRef::Agent(h))));
        let hider_reward = if hider_seen { -1.0 } else { 1.0 };

        for (out, agent) in io.reward.iter_mut().zip(&self.agents) {
            if agent.active {
                *out = match agent.team {
                    Team::Hider => hider_reward,
                    Team::Seeker => -hider_reward,
                };
            }
        }
    }
}

fn visibility(seen: bool) -> f32 {
    if seen { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::EpisodeCounter;
    use crate::exports::HostExports;
    use crate::init::WorldInitTable;
    use hideseek_assets::{AssetCatalog, StorageKind};
    use hideseek_common::config::default_data_dir;
    use std::sync::Arc;

    fn world_init(min: u32, max: u32) -> (WorldInit, Arc<EpisodeCounter>) {
        let catalog = AssetCatalog::load(default_data_dir(), StorageKind::Host).unwrap();
        let episodes = Arc::new(EpisodeCounter::new());
        let mut table = WorldInitTable::build(1, min, max, &episodes, &catalog.objects);
        (table.remove(0), episodes)
    }

    fn bare_sim(exports: &mut HostExports) -> Sim {
        let (init, _) = world_init(0, 0);
        let mut io = exports.world_mut(0).unwrap();
        Sim::new(init, &mut io).unwrap()
    }

    #[test]
    fn team_sizes_default_and_cap() {
        assert_eq!(team_sizes(0, 0), (2, 2));
        assert_eq!(team_sizes(3, 1), (3, 1));
        assert_eq!(team_sizes(5, 4), (5, 1));
        assert_eq!(team_sizes(9, 9), (6, 0));
        assert_eq!(team_sizes(-1, 3), (2, 3));
    }

    #[test]
    fn bucket_axis_is_centered() {
        assert_eq!(bucket_axis(5), 0.0);
        assert_eq!(bucket_axis(0), -1.0);
        assert_eq!(bucket_axis(10), 1.0);
        assert_eq!(bucket_axis(99), 1.0);
        assert_eq!(bucket_axis(-3), -1.0);
    }

    #[test]
    fn construction_writes_initial_state() {
        let mut exports = HostExports::new(1);
        let sim = bare_sim(&mut exports);
        let io = exports.world_mut(0).unwrap();

        assert_eq!(sim.episode(), 0);
        assert_eq!(io.done[0], 0);
        assert_eq!(io.prep_counter[0], PREP_PERIOD as i32);
        assert_eq!(io.agent_mask, &[1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(io.agent_type, &[0, 0, 1, 1, 1, 1]);
        assert!(io.reward.iter().all(|&r| r == 0.0));
        assert!(sim.boxes().is_empty() && sim.ramps().is_empty());
        // Agents 4 and 5 are inactive: their rows stay zero.
        assert!(io.lidar[4 * NUM_LIDAR_SAMPLES..].iter().all(|&d| d == 0.0));
        assert!(io.lidar[..NUM_LIDAR_SAMPLES].iter().all(|&d| d > 0.0 && d <= LIDAR_RANGE));
    }

    #[test]
    fn entity_counts_respect_bounds() {
        let (init, _) = world_init(3, 11);
        let mut exports = HostExports::new(1);
        let mut io = exports.world_mut(0).unwrap();
        let mut sim = Sim::new(init, &mut io).unwrap();
        for _ in 0..20 {
            let n = sim.boxes().len() + sim.ramps().len();
            assert!((3..=11).contains(&n), "{n} entities");
            assert!(sim.boxes().len() <= MAX_BOXES);
            assert!(sim.ramps().len() <= MAX_RAMPS);
            io.reset[0] = 1;
            sim.tick(&mut io);
        }
    }

    #[test]
    fn counters_progress_and_auto_reset() {
        let (init, episodes) = world_init(0, 4);
        let mut exports = HostExports::new(1);
        let mut io = exports.world_mut(0).unwrap();
        let mut sim = Sim::new(init, &mut io).unwrap();

        let mut last_prep = io.prep_counter[0];
        for tick in 1..=EPISODE_LEN {
            sim.tick(&mut io);
            assert_eq!(sim.step_count(), tick);
            assert!(io.prep_counter[0] >= 0 && io.prep_counter[0] <= last_prep);
            last_prep = io.prep_counter[0];
            assert_eq!(io.done[0], i32::from(tick == EPISODE_LEN));
        }
        assert_eq!(episodes.current(), 1);

        sim.tick(&mut io);
        assert_eq!(sim.episode(), 1);
        assert_eq!(sim.step_count(), 1);
        assert_eq!(io.done[0], 0);
        assert_eq!(episodes.current(), 2);
    }

    #[test]
    fn reset_request_is_consumed() {
        let mut exports = HostExports::new(1);
        let mut sim = bare_sim(&mut exports);
        let mut io = exports.world_mut(0).unwrap();
        io.reset.copy_from_slice(&[1, 1, 3]);
        sim.tick(&mut io);
        assert_eq!(io.reset[0], 0);
        assert_eq!(sim.episode(), 1);
        assert_eq!(io.agent_mask, &[1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(io.agent_type[..4], [0, 1, 1, 1]);
    }

    #[test]
    fn seekers_frozen_during_prep() {
        let mut exports = HostExports::new(1);
        let mut sim = bare_sim(&mut exports);
        let mut io = exports.world_mut(0).unwrap();
        io.action.fill(5);
        for agent in io.action.chunks_exact_mut(ACTION_DIMS) {
            agent[0] = 10;
        }
        let before = *sim.agents();
        sim.tick(&mut io);
        let after = sim.agents();
        for i in 0..4 {
            let moved = before[i].pos.distance(after[i].pos) > 1e-4;
            assert_eq!(moved, after[i].team == Team::Hider, "agent {i}");
        }
    }

    #[test]
    fn no_reward_during_prep() {
        let mut exports = HostExports::new(1);
        let mut sim = bare_sim(&mut exports);
        let mut io = exports.world_mut(0).unwrap();
        io.action.fill(5);
        for _ in 0..(PREP_PERIOD - 1) {
            sim.tick(&mut io);
            assert!(io.reward.iter().all(|&r| r == 0.0));
        }
        sim.tick(&mut io);
        for (i, &r) in io.reward.iter().enumerate() {
            if i < 4 {
                assert_eq!(r.abs(), 1.0, "agent {i}");
            } else {
                assert_eq!(r, 0.0);
            }
        }
        assert_eq!(io.reward[0], io.reward[1]);
        assert_eq!(io.reward[0], -io.reward[2]);
    }

    #[test]
    fn agents_stay_inside_arena() {
        let (init, _) = world_init(5, 11);
        let mut exports = HostExports::new(1);
        let mut io = exports.world_mut(0).unwrap();
        let mut sim = Sim::new(init, &mut io).unwrap();
        io.action.fill(10);
        for _ in 0..200 {
            sim.tick(&mut io);
        }
        for agent in sim.agents().iter().filter(|a| a.active) {
            assert!(agent.pos.abs().max_element() <= ARENA_HALF_EXTENT);
        }
        for lidar in io.lidar.chunks_exact(NUM_LIDAR_SAMPLES).take(4) {
            assert!(lidar.iter().all(|&d| d <= LIDAR_RANGE));
        }
    }

    #[test]
    fn raycast_hits_outer_wall() {
        let mut exports = HostExports::new(1);
        let sim = bare_sim(&mut exports);
        let hit = sim
            .raycast(Vec2::new(0.0, 100.0), -Vec2::Y, 1000.0, None)
            .unwrap();
        assert!(matches!(hit.entity, EntityRef::Wall(0)));
        assert_eq!(hit.object, ObjectId::WALL);
        let thickness = sim.walls()[0].half.y * 2.0;
        assert!((hit.distance - (100.0 - ARENA_HALF_EXTENT - thickness)).abs() < 1e-3);
    }

    #[test]
    fn same_episode_id_same_layout() {
        let (init_a, _) = world_init(2, 9);
        let (init_b, _) = world_init(2, 9);
        let mut ea = HostExports::new(1);
        let mut eb = HostExports::new(1);
        let a = Sim::new(init_a, &mut ea.world_mut(0).unwrap()).unwrap();
        let b = Sim::new(init_b, &mut eb.world_mut(0).unwrap()).unwrap();
        assert_eq!(a.boxes(), b.boxes());
        assert_eq!(a.agents(), b.agents());
        let lidar = hideseek_common::ExportSlot::Lidar;
        assert_eq!(ea.slot_bytes(lidar), eb.slot_bytes(lidar));
    }
}
