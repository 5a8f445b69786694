//! Render meshes, parallel to the physics catalog.

use crate::obj::read_obj;
use crate::AssetError;
use glam::Vec3;
use hideseek_common::{Aabb, ObjectId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A triangulated mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderMesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub aabb: Aabb,
}

impl RenderMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertical extent of the mesh.
    pub fn height(&self) -> f32 {
        self.aabb.max.z - self.aabb.min.z
    }
}

/// Render entry for one catalog position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderAsset {
    pub name: String,
    pub mesh: RenderMesh,
    pub base_color: [f32; 4],
}

/// Ordered render assets. Position is the [`ObjectId`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderAssetTable {
    assets: Vec<RenderAsset>,
}

impl RenderAssetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, asset: RenderAsset) -> ObjectId {
        let id = ObjectId(self.assets.len() as u32);
        self.assets.push(asset);
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&RenderAsset> {
        self.assets.get(id.index())
    }

    pub fn assets(&self) -> &[RenderAsset] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Import a render mesh from an OBJ file.
pub fn import_render_mesh(path: impl AsRef<Path>) -> Result<RenderMesh, AssetError> {
    let path = path.as_ref();
    let obj = read_obj(path)?;
    let aabb = Aabb::from_points(&obj.positions).ok_or_else(|| AssetError::EmptyMesh {
        path: path.to_path_buf(),
    })?;
    let indices = obj.triangles();
    if indices.is_empty() {
        return Err(AssetError::EmptyMesh {
            path: path.to_path_buf(),
        });
    }
    Ok(RenderMesh {
        positions: obj.positions,
        indices,
        aabb,
    })
}
