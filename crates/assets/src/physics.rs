//! Physics object storage shared read-only by every world.

use crate::hull::HalfEdgeMesh;
use crate::obj::read_obj;
use crate::AssetError;
use glam::Vec3;
use hideseek_common::{Aabb, ObjectId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;

/// Mass properties and friction of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidBodyMetadata {
    pub inv_inertia: Vec3,
    pub inv_mass: f32,
    /// Static friction coefficient.
    pub mu_s: f32,
    /// Dynamic friction coefficient.
    pub mu_d: f32,
}

/// Index of a hull inside an [`ObjectStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HullRef(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CollisionPrimitive {
    Sphere { radius: f32 },
    Plane,
    Hull(HullRef),
}

impl CollisionPrimitive {
    fn tag(&self) -> u8 {
        match self {
            Self::Sphere { .. } => 0,
            Self::Plane => 1,
            Self::Hull(_) => 2,
        }
    }
}

/// One catalog entry as seen by the physics step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsObject {
    pub metadata: RigidBodyMetadata,
    pub aabb: Aabb,
    pub primitive: CollisionPrimitive,
}

/// Memory space the object storage is prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKind {
    Host,
    /// Mirrored into accelerator memory by the accelerator backend.
    Accelerator,
}

/// A hull registered with the loader, waiting for [`PhysicsLoader::load_objects`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadedHull {
    pub aabb: Aabb,
    pub collision_mesh: HullRef,
}

/// Immutable object table. Position in `objects` is the [`ObjectId`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStore {
    storage: StorageKind,
    objects: Vec<PhysicsObject>,
    hulls: Vec<HalfEdgeMesh>,
}

impl ObjectStore {
    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: ObjectId) -> Option<&PhysicsObject> {
        self.objects.get(id.index())
    }

    pub fn objects(&self) -> &[PhysicsObject] {
        &self.objects
    }

    pub fn hull(&self, hull: HullRef) -> Option<&HalfEdgeMesh> {
        self.hulls.get(hull.0 as usize)
    }

    /// SHA-256 over every descriptor in table order. Two loads of the same
    /// catalog produce the same fingerprint regardless of storage kind.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for obj in &self.objects {
            let m = &obj.metadata;
            for f in [m.inv_inertia.x, m.inv_inertia.y, m.inv_inertia.z, m.inv_mass, m.mu_s, m.mu_d] {
                hasher.update(f.to_le_bytes());
            }
            for v in [obj.aabb.min, obj.aabb.max] {
                for f in v.to_array() {
                    hasher.update(f.to_le_bytes());
                }
            }
            hasher.update([obj.primitive.tag()]);
            match obj.primitive {
                CollisionPrimitive::Sphere { radius } => hasher.update(radius.to_le_bytes()),
                CollisionPrimitive::Plane => {}
                CollisionPrimitive::Hull(h) => {
                    if let Some(mesh) = self.hull(h) {
                        for v in &mesh.vertices {
                            for f in v.to_array() {
                                hasher.update(f.to_le_bytes());
                            }
                        }
                        hasher.update((mesh.half_edges.len() as u32).to_le_bytes());
                    }
                }
            }
        }
        hasher.finalize().into()
    }
}

/// Converts on-disk geometry into collision hulls and seals them, together
/// with the body descriptors, into an [`ObjectStore`]. Populated exactly once.
#[derive(Debug)]
pub struct PhysicsLoader {
    storage: StorageKind,
    capacity: usize,
    pending_hulls: Vec<HalfEdgeMesh>,
    store: Option<Arc<ObjectStore>>,
}

impl PhysicsLoader {
    pub fn new(storage: StorageKind, capacity: usize) -> Self {
        Self {
            storage,
            capacity,
            pending_hulls: Vec::new(),
            store: None,
        }
    }

    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    /// Load an OBJ file as a closed convex hull. The hull's AABB is derived
    /// here and nowhere else.
    pub fn load_hull_from_disk(&mut self, path: impl AsRef<Path>) -> Result<LoadedHull, AssetError> {
        let path = path.as_ref();
        let mesh = read_obj(path)?;
        let malformed = |reason: String| AssetError::MalformedHull {
            path: path.to_path_buf(),
            reason,
        };

        let aabb = Aabb::from_points(&mesh.positions)
            .ok_or_else(|| malformed("no vertices".into()))?;
        let extents = aabb.max - aabb.min;
        if extents.min_element() <= f32::EPSILON {
            return Err(malformed(format!("degenerate extents {extents}")));
        }
        let hull = HalfEdgeMesh::from_polygons(mesh.positions, &mesh.faces).map_err(malformed)?;

        tracing::debug!(
            path = %path.display(),
            vertices = hull.vertices.len(),
            faces = hull.faces.len(),
            "loaded collision hull"
        );

        let id = HullRef(self.pending_hulls.len() as u32);
        self.pending_hulls.push(hull);
        Ok(LoadedHull {
            aabb,
            collision_mesh: id,
        })
    }

    /// Seal the object table. Hull references must point at hulls loaded
    /// through this loader.
    pub fn load_objects(&mut self, objects: Vec<PhysicsObject>) -> Result<Arc<ObjectStore>, AssetError> {
        if self.store.is_some() {
            return Err(AssetError::AlreadyLoaded);
        }
        if objects.len() > self.capacity {
            return Err(AssetError::CapacityExceeded {
                capacity: self.capacity,
                requested: objects.len(),
            });
        }
        for obj in &objects {
            if let CollisionPrimitive::Hull(h) = obj.primitive {
                if h.0 as usize >= self.pending_hulls.len() {
                    return Err(AssetError::UnknownHull(h.0));
                }
            }
        }

        let store = Arc::new(ObjectStore {
            storage: self.storage,
            objects,
            hulls: std::mem::take(&mut self.pending_hulls),
        });
        tracing::debug!(
            objects = store.len(),
            storage = ?self.storage,
            "physics object storage populated"
        );
        self.store = Some(Arc::clone(&store));
        Ok(store)
    }

    pub fn object_store(&self) -> Option<&Arc<ObjectStore>> {
        self.store.as_ref()
    }
}
