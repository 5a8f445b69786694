//! Host-resident render targets.

use crate::renderer::RenderView;
use hideseek_common::consts::MAX_AGENTS;
use hideseek_common::ImageKind;

/// Depth and color images for every agent of every world.
#[derive(Debug, Clone)]
pub struct HostImages {
    num_worlds: usize,
    view: RenderView,
    depth: Vec<f32>,
    rgb: Vec<u8>,
}

/// One world's rows of the render targets.
#[derive(Debug)]
pub struct ImageRows<'a> {
    /// `[agent, row, column]`.
    pub depth: &'a mut [f32],
    /// `[agent, row, column, rgba]`.
    pub rgb: &'a mut [u8],
}

impl HostImages {
    pub fn new(num_worlds: usize, view: RenderView) -> Self {
        let pixels = num_worlds * MAX_AGENTS * view.pixels();
        Self {
            num_worlds,
            view,
            depth: vec![0.0; pixels * ImageKind::Depth.channels()],
            rgb: vec![0; pixels * ImageKind::Rgb.channels()],
        }
    }

    pub fn num_worlds(&self) -> usize {
        self.num_worlds
    }

    pub fn view(&self) -> &RenderView {
        &self.view
    }

    pub fn depth_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.depth)
    }

    pub fn rgb_bytes(&self) -> &[u8] {
        &self.rgb
    }

    pub fn worlds_mut(&mut self) -> Vec<ImageRows<'_>> {
        let per_world = MAX_AGENTS * self.view.pixels();
        self.depth
            .chunks_mut(per_world * ImageKind::Depth.channels())
            .zip(self.rgb.chunks_mut(per_world * ImageKind::Rgb.channels()))
            .map(|(depth, rgb)| ImageRows { depth, rgb })
            .collect()
    }
}
