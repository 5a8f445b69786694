//! Column raycaster over the 2D arena.
//!
//! Each image column casts one ray across the floor plane. Whatever it hits
//! is drawn as an upright slab as tall as that object's render mesh; rows
//! below the slab show floor and rows above it show sky.

use crate::images::ImageRows;
use crate::renderer::{RenderView, Renderer};
use glam::Vec2;
use hideseek_assets::RenderAssetTable;
use hideseek_common::consts::MAX_AGENTS;
use hideseek_common::{CameraMode, ObjectId};
use hideseek_kernel::{EntityRef, Sim};

/// Depth written for sky pixels.
pub const FAR_PLANE: f32 = 100.0;
const SKY: [u8; 4] = [135, 190, 235, 255];
/// Brightness lost per unit of distance.
const FALLOFF: f32 = 0.04;

#[derive(Debug, Clone, Copy)]
struct Material {
    height: f32,
    color: [f32; 4],
}

/// Renderer backed by the render asset table.
#[derive(Debug, Clone)]
pub struct ColumnRaycaster {
    materials: Vec<Material>,
    floor: [f32; 4],
    eye_height: f32,
}

impl ColumnRaycaster {
    pub fn new(assets: &RenderAssetTable, view: &RenderView) -> Self {
        let materials: Vec<Material> = assets
            .assets()
            .iter()
            .map(|a| Material {
                height: a.mesh.height(),
                color: a.base_color,
            })
            .collect();
        let floor = assets
            .get(ObjectId::PLANE)
            .map_or([0.5, 0.5, 0.5, 1.0], |a| a.base_color);
        let agent_height = assets.get(ObjectId::CYLINDER).map_or(2.0, |a| a.mesh.height());

        tracing::debug!(
            materials = materials.len(),
            width = view.width,
            height = view.height,
            "column raycaster ready"
        );
        Self {
            materials,
            floor,
            eye_height: agent_height * view.eye_fraction,
        }
    }

    fn material(&self, object: ObjectId) -> Material {
        self.materials.get(object.index()).copied().unwrap_or(Material {
            height: 2.0,
            color: [1.0, 0.0, 1.0, 1.0],
        })
    }

    fn render_agent(&self, world: &Sim, agent: usize, view: &RenderView, depth: &mut [f32], rgb: &mut [u8]) {
        let Some(obs) = world.agents().get(agent).filter(|a| a.active) else {
            depth.fill(0.0);
            rgb.fill(0);
            return;
        };
        let (w, h) = (view.width, view.height);
        let half_h = (view.fov_degrees.to_radians() * 0.5).tan();
        let half_v = half_h * h as f32 / w as f32;

        for x in 0..w {
            // Screen x to a tangent offset; left of the image is +yaw.
            let sx = half_h * (1.0 - 2.0 * (x as f32 + 0.5) / w as f32);
            let dir = Vec2::from_angle(obs.yaw).rotate(Vec2::new(1.0, sx)).normalize();
            let hit = world.raycast(obs.pos, dir, FAR_PLANE, Some(EntityRef::Agent(agent)));
            // Distance along the view axis, which keeps walls straight.
            let forward = hit.map(|hit| hit.distance / (1.0 + sx * sx).sqrt());

            for y in 0..h {
                let sy = half_v * (1.0 - 2.0 * (y as f32 + 0.5) / h as f32);
                let pixel = y * w + x;
                let (d, color) = self.shade(forward.zip(hit.map(|hit| hit.object)), sy);
                depth[pixel] = d;
                rgb[pixel * 4..pixel * 4 + 4].copy_from_slice(&color);
            }
        }
    }

    /// Depth and color for a pixel whose ray climbs `sy` per unit of forward
    /// distance.
    fn shade(&self, hit: Option<(f32, ObjectId)>, sy: f32) -> (f32, [u8; 4]) {
        if let Some((forward, object)) = hit {
            let material = self.material(object);
            let z = self.eye_height + forward * sy;
            if (0.0..=material.height).contains(&z) {
                let dist = forward * (1.0 + sy * sy).sqrt();
                return (dist, lit(material.color, dist));
            }
        }
        if sy < 0.0 {
            let floor_forward = self.eye_height / -sy;
            if hit.is_none_or(|(forward, _)| floor_forward < forward) {
                let dist = floor_forward * (1.0 + sy * sy).sqrt();
                return (dist, lit(self.floor, dist));
            }
        }
        (FAR_PLANE, SKY)
    }
}

fn lit(color: [f32; 4], dist: f32) -> [u8; 4] {
    let k = 1.0 / (1.0 + FALLOFF * dist);
    let channel = |c: f32, scale: f32| (c * scale).clamp(0.0, 1.0).mul_add(255.0, 0.5) as u8;
    [
        channel(color[0], k),
        channel(color[1], k),
        channel(color[2], k),
        channel(color[3], 1.0),
    ]
}

impl Renderer for ColumnRaycaster {
    fn render(&self, world: &Sim, view: &RenderView, target: &mut ImageRows<'_>) {
        if view.camera == CameraMode::None {
            return;
        }
        let pixels = view.pixels();
        let rows = target
            .depth
            .chunks_exact_mut(pixels)
            .zip(target.rgb.chunks_exact_mut(pixels * 4))
            .take(MAX_AGENTS);
        for (agent, (depth, rgb)) in rows.enumerate() {
            self.render_agent(world, agent, view, depth, rgb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::HostImages;
    use hideseek_assets::{AssetCatalog, StorageKind};
    use hideseek_common::config::default_data_dir;
    use hideseek_kernel::{EpisodeCounter, HostExports, WorldInitTable};
    use std::sync::Arc;

    fn scene() -> (Sim, ColumnRaycaster, RenderView) {
        let catalog = AssetCatalog::load(default_data_dir(), StorageKind::Host).unwrap();
        let episodes = Arc::new(EpisodeCounter::new());
        let init = WorldInitTable::build(1, 0, 0, &episodes, &catalog.objects).remove(0);
        let mut exports = HostExports::new(1);
        let sim = Sim::new(init, &mut exports.world_mut(0).unwrap()).unwrap();
        let view = RenderView::new(16, 16, CameraMode::Perspective);
        let renderer = ColumnRaycaster::new(&catalog.render, &view);
        (sim, renderer, view)
    }

    #[test]
    fn sky_above_floor_below() {
        let (sim, renderer, view) = scene();
        let mut images = HostImages::new(1, view);
        let mut rows = images.worlds_mut();
        renderer.render(&sim, &view, &mut rows[0]);

        let agent0 = &rows[0];
        let (w, h) = (view.width, view.height);
        for x in 0..w {
            assert_eq!(agent0.depth[x], FAR_PLANE, "top row, column {x}");
            assert_eq!(&agent0.rgb[x * 4..x * 4 + 4], &SKY);

            let bottom = (h - 1) * w + x;
            let d = agent0.depth[bottom];
            assert!(d > 0.0 && d < 3.0, "bottom row, column {x}: {d}");
            assert_ne!(&agent0.rgb[bottom * 4..bottom * 4 + 4], &SKY);
        }
    }

    #[test]
    fn inactive_agents_render_blank() {
        let (sim, renderer, view) = scene();
        let mut images = HostImages::new(1, view);
        let mut rows = images.worlds_mut();
        rows[0].depth.fill(7.0);
        renderer.render(&sim, &view, &mut rows[0]);

        let pixels = view.pixels();
        // Default teams leave agents 4 and 5 inactive.
        assert!(rows[0].depth[4 * pixels..].iter().all(|&d| d == 0.0));
        assert!(rows[0].rgb[4 * pixels * 4..].iter().all(|&c| c == 0));
        assert!(rows[0].depth[..pixels].iter().all(|&d| d > 0.0));
    }

    #[test]
    fn camera_none_leaves_targets_untouched() {
        let (sim, renderer, _) = scene();
        let view = RenderView::new(4, 4, CameraMode::None);
        let mut images = HostImages::new(1, view);
        let mut rows = images.worlds_mut();
        renderer.render(&sim, &view, &mut rows[0]);
        assert!(rows[0].depth.iter().all(|&d| d == 0.0));
    }

    #[test]
    fn lighting_fades_with_distance() {
        let near = lit([1.0, 1.0, 1.0, 1.0], 0.0);
        let far = lit([1.0, 1.0, 1.0, 1.0], 50.0);
        assert_eq!(near, [255, 255, 255, 255]);
        assert!(far[0] < near[0]);
        assert_eq!(far[3], 255);
    }
}
