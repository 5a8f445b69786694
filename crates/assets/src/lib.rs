//! Asset catalog: the fixed set of physics objects and render meshes shared by
//! every simulated world.
//!
//! # Invariants
//! - Catalog positions are assigned once, by [`catalog::CATALOG`] order.
//! - Loaded tables are immutable and shared behind `Arc`.
//! - The hull loader is the only source of AABBs for hull shapes.
//!
//! # Layout
//! Collision hulls and render meshes are Wavefront OBJ files in the data
//! directory, named by the catalog rows.

pub mod catalog;
pub mod hull;
pub mod obj;
pub mod physics;
pub mod render_assets;

use std::path::PathBuf;

pub use catalog::{AssetCatalog, CatalogEntry, LoadedCatalog, ShapeSource, CATALOG};
pub use hull::HalfEdgeMesh;
pub use physics::{
    CollisionPrimitive, HullRef, LoadedHull, ObjectStore, PhysicsLoader, PhysicsObject,
    RigidBodyMetadata, StorageKind,
};
pub use render_assets::{RenderAsset, RenderAssetTable, RenderMesh};

/// Errors from asset loading. All of them are construction-time failures.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: {message}")]
    ObjParse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("malformed hull {path}: {reason}")]
    MalformedHull { path: PathBuf, reason: String },
    #[error("render mesh {path} has no triangles")]
    EmptyMesh { path: PathBuf },
    #[error("physics loader already populated")]
    AlreadyLoaded,
    #[error("physics loader holds {capacity} objects, {requested} requested")]
    CapacityExceeded { capacity: usize, requested: usize },
    #[error("hull reference {0} was not loaded by this loader")]
    UnknownHull(u32),
}

pub fn crate_info() -> &'static str {
    "hideseek-assets v0.1.0"
}
