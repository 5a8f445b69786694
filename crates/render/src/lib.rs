//! Rendering adapter: per-agent depth and color images.
//!
//! # Invariants
//! - Renderers read world state and never mutate it.
//! - Image layout is `[world, agent, row, column, channel]`, matching the
//!   `depth` and `rgb` exports.

mod images;
mod raycast;
mod renderer;

pub use images::{HostImages, ImageRows};
pub use raycast::ColumnRaycaster;
pub use renderer::{RenderView, Renderer};

pub fn crate_info() -> &'static str {
    "hideseek-render v0.1.0"
}
