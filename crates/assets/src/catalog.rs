//! The fixed object catalog.
//!
//! [`CATALOG`] is the one place that assigns catalog positions. Rows load in
//! order and a row's position is its [`ObjectId`]; simulation code spawns
//! bodies by those ids, so rows must never be reordered.

use crate::physics::{
    CollisionPrimitive, ObjectStore, PhysicsLoader, PhysicsObject, RigidBodyMetadata, StorageKind,
};
use crate::render_assets::{import_render_mesh, RenderAsset, RenderAssetTable};
use crate::AssetError;
use glam::Vec3;
use hideseek_common::consts::MAX_PHYSICS_OBJECTS;
use hideseek_common::{Aabb, ObjectId};
use std::path::Path;
use std::sync::Arc;

/// Where a row's collision shape comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeSource {
    /// Analytic sphere centred on the origin.
    Sphere { radius: f32 },
    /// Infinite ground plane at z = 0, facing +z.
    Plane,
    /// Convex hull loaded from the data directory.
    Hull { file: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogEntry {
    pub id: ObjectId,
    pub name: &'static str,
    pub metadata: RigidBodyMetadata,
    pub shape: ShapeSource,
    pub render_file: &'static str,
    pub base_color: [f32; 4],
}

const fn body(inv_inertia: Vec3, inv_mass: f32) -> RigidBodyMetadata {
    RigidBodyMetadata {
        inv_inertia,
        inv_mass,
        mu_s: 0.5,
        mu_d: 0.5,
    }
}

const ELONGATED_WIDTH: f32 = 8.0;
const ELONGATED_HEIGHT: f32 = 2.0;
const ELONGATED_DEPTH: f32 = 1.5;

const ELONGATED_INV_INERTIA: Vec3 = Vec3::new(
    12.0 / (ELONGATED_HEIGHT * ELONGATED_HEIGHT + ELONGATED_DEPTH * ELONGATED_DEPTH),
    12.0 / (ELONGATED_HEIGHT * ELONGATED_HEIGHT + ELONGATED_WIDTH * ELONGATED_WIDTH),
    12.0 / (ELONGATED_WIDTH * ELONGATED_WIDTH + ELONGATED_DEPTH * ELONGATED_DEPTH),
);

pub const CATALOG: [CatalogEntry; ObjectId::COUNT] = [
    CatalogEntry {
        id: ObjectId::SPHERE,
        name: "sphere",
        metadata: body(Vec3::splat(2.5), 1.0),
        shape: ShapeSource::Sphere { radius: 1.0 },
        render_file: "sphere.obj",
        base_color: [0.9, 0.3, 0.3, 1.0],
    },
    CatalogEntry {
        id: ObjectId::PLANE,
        name: "plane",
        metadata: body(Vec3::ZERO, 0.0),
        shape: ShapeSource::Plane,
        render_file: "plane.obj",
        base_color: [0.55, 0.5, 0.45, 1.0],
    },
    CatalogEntry {
        id: ObjectId::CUBE,
        name: "cube",
        metadata: body(Vec3::splat(1.5), 1.0),
        shape: ShapeSource::Hull {
            file: "cube_collision.obj",
        },
        render_file: "cube_render.obj",
        base_color: [0.85, 0.6, 0.2, 1.0],
    },
    CatalogEntry {
        id: ObjectId::WALL,
        name: "wall",
        metadata: body(Vec3::ZERO, 0.0),
        shape: ShapeSource::Hull {
            file: "wall_collision.obj",
        },
        render_file: "wall_render.obj",
        base_color: [0.7, 0.7, 0.7, 1.0],
    },
    CatalogEntry {
        id: ObjectId::CYLINDER,
        name: "cylinder",
        // Only the yaw axis is free for agents.
        metadata: body(Vec3::new(0.0, 0.0, 1.0), 1.0),
        shape: ShapeSource::Hull {
            file: "cylinder_collision.obj",
        },
        render_file: "cylinder_render.obj",
        base_color: [0.2, 0.5, 0.9, 1.0],
    },
    CatalogEntry {
        id: ObjectId::RAMP,
        name: "ramp",
        metadata: body(Vec3::splat(1.5), 1.0),
        shape: ShapeSource::Hull {
            file: "ramp_collision.obj",
        },
        render_file: "ramp_render.obj",
        base_color: [0.3, 0.75, 0.35, 1.0],
    },
    CatalogEntry {
        id: ObjectId::ELONGATED_BOX,
        name: "elongated box",
        metadata: body(ELONGATED_INV_INERTIA, 1.0),
        shape: ShapeSource::Hull {
            file: "elongated_collision.obj",
        },
        render_file: "elongated_render.obj",
        base_color: [0.8, 0.45, 0.15, 1.0],
    },
];

/// Shared, immutable outputs of [`AssetCatalog::load`].
#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    pub objects: Arc<ObjectStore>,
    pub render: Arc<RenderAssetTable>,
}

/// Loads the fixed catalog from a data directory.
pub struct AssetCatalog;

impl AssetCatalog {
    /// Load physics objects and render meshes for every [`CATALOG`] row.
    ///
    /// Any missing or malformed file fails the whole load; there is no
    /// partially populated catalog.
    pub fn load(data_dir: impl AsRef<Path>, storage: StorageKind) -> Result<LoadedCatalog, AssetError> {
        let data_dir = data_dir.as_ref();
        let _span = tracing::info_span!("catalog_load", dir = %data_dir.display()).entered();

        let mut loader = PhysicsLoader::new(storage, MAX_PHYSICS_OBJECTS);
        let objects = load_physics_objects(&mut loader, data_dir)?;
        let render = load_render_assets(data_dir)?;

        tracing::info!(
            objects = objects.len(),
            render_assets = render.len(),
            storage = ?storage,
            "asset catalog loaded"
        );
        Ok(LoadedCatalog {
            objects,
            render: Arc::new(render),
        })
    }
}

/// Populate `loader` with every catalog row, in order.
pub fn load_physics_objects(loader: &mut PhysicsLoader, data_dir: &Path) -> Result<Arc<ObjectStore>, AssetError> {
    let mut objects = Vec::with_capacity(CATALOG.len());

    for entry in &CATALOG {
        debug_assert_eq!(entry.id.index(), objects.len());
        let (aabb, primitive) = match entry.shape {
            ShapeSource::Sphere { radius } => (
                Aabb::new(Vec3::splat(-radius), Vec3::splat(radius)),
                CollisionPrimitive::Sphere { radius },
            ),
            ShapeSource::Plane => (
                Aabb::new(Vec3::splat(-f32::MAX), Vec3::new(f32::MAX, f32::MAX, 0.0)),
                CollisionPrimitive::Plane,
            ),
            ShapeSource::Hull { file } => {
                let hull = loader.load_hull_from_disk(data_dir.join(file))?;
                (hull.aabb, CollisionPrimitive::Hull(hull.collision_mesh))
            }
        };
        tracing::debug!(id = entry.id.0, name = entry.name, "catalog object");
        objects.push(PhysicsObject {
            metadata: entry.metadata,
            aabb,
            primitive,
        });
    }

    loader.load_objects(objects)
}

/// Import the render mesh of every catalog row, in order.
pub fn load_render_assets(data_dir: &Path) -> Result<RenderAssetTable, AssetError> {
    let mut table = RenderAssetTable::new();
    for entry in &CATALOG {
        let mesh = import_render_mesh(data_dir.join(entry.render_file))?;
        let id = table.push(RenderAsset {
            name: entry.name.to_string(),
            mesh,
            base_color: entry.base_color,
        });
        debug_assert_eq!(id, entry.id);
    }
    Ok(table)
}
