use crate::images::ImageRows;
use hideseek_common::CameraMode;
use hideseek_kernel::Sim;

/// Per-agent camera configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    pub width: usize,
    pub height: usize,
    /// Horizontal field of view in degrees.
    pub fov_degrees: f32,
    /// Camera height as a fraction of the agent's render mesh height.
    pub eye_fraction: f32,
    pub camera: CameraMode,
}

impl RenderView {
    pub fn new(width: usize, height: usize, camera: CameraMode) -> Self {
        Self {
            width,
            height,
            camera,
            ..Self::default()
        }
    }

    /// Pixels per agent image.
    pub fn pixels(&self) -> usize {
        self.width * self.height
    }
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            fov_degrees: 90.0,
            eye_fraction: 0.75,
            camera: CameraMode::Perspective,
        }
    }
}

/// Renderer interface. A renderer reads one world and writes every agent's
/// image into that world's rows.
pub trait Renderer {
    fn render(&self, world: &Sim, view: &RenderView, target: &mut ImageRows<'_>);
}
