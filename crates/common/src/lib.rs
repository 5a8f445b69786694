//! Shared types for the hide & seek batch simulator.
//!
//! # Invariants
//! - Export slot indices are the only contract between the manager and the
//!   execution backends. Both backends allocate from [`export::EXPORT_TABLE`].
//! - Per-world maxima in [`consts`] size every exported buffer.

pub mod config;
pub mod consts;
pub mod export;
pub mod types;

pub use config::{Config, ConfigError, ExecMode};
pub use export::{
    resolve, resolve_image, ElementType, ExportEntry, ExportSlot, ImageKind, ShapeDim,
    EXPORT_SCHEMA_VERSION, EXPORT_TABLE, NUM_EXPORTED_BUFFERS,
};
pub use types::{Aabb, CameraMode, ObjectId};

pub fn crate_info() -> &'static str {
    "hideseek-common v0.1.0"
}
