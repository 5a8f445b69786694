//! Convex hull collision meshes in half-edge form.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One directed edge of a face loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalfEdge {
    /// Vertex the edge starts at.
    pub origin: u32,
    /// Next half-edge around the same face.
    pub next: u32,
    /// Opposite half-edge on the neighbouring face.
    pub twin: u32,
    pub face: u32,
}

/// Closed polyhedral mesh with explicit adjacency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalfEdgeMesh {
    pub vertices: Vec<Vec3>,
    pub half_edges: Vec<HalfEdge>,
    /// First half-edge of each face.
    pub faces: Vec<u32>,
}

impl HalfEdgeMesh {
    /// Build adjacency from polygon loops.
    ///
    /// The input must describe a closed, consistently wound, genus-zero
    /// surface: every directed edge appears once and has an opposite twin.
    pub fn from_polygons(vertices: Vec<Vec3>, polygons: &[Vec<u32>]) -> Result<Self, String> {
        if vertices.len() < 4 {
            return Err(format!("hull needs at least 4 vertices, got {}", vertices.len()));
        }
        if polygons.len() < 4 {
            return Err(format!("hull needs at least 4 faces, got {}", polygons.len()));
        }

        let mut half_edges = Vec::new();
        let mut faces = Vec::with_capacity(polygons.len());
        let mut by_endpoints: HashMap<(u32, u32), u32> = HashMap::new();

        for (face_idx, poly) in polygons.iter().enumerate() {
            let first = half_edges.len() as u32;
            faces.push(first);
            for (i, &origin) in poly.iter().enumerate() {
                let dest = poly[(i + 1) % poly.len()];
                if origin == dest {
                    return Err(format!("face {face_idx} repeats vertex {origin}"));
                }
                let id = half_edges.len() as u32;
                if by_endpoints.insert((origin, dest), id).is_some() {
                    return Err(format!(
                        "edge {origin}->{dest} used twice (non-manifold or inconsistent winding)"
                    ));
                }
                let next = if i + 1 == poly.len() { first } else { id + 1 };
                half_edges.push(HalfEdge {
                    origin,
                    next,
                    twin: u32::MAX,
                    face: face_idx as u32,
                });
            }
        }

        for i in 0..half_edges.len() {
            let origin = half_edges[i].origin;
            let dest = half_edges[half_edges[i].next as usize].origin;
            match by_endpoints.get(&(dest, origin)) {
                Some(&twin) => half_edges[i].twin = twin,
                None => return Err(format!("edge {origin}->{dest} has no twin, hull is open")),
            }
        }

        let mesh = Self {
            vertices,
            half_edges,
            faces,
        };
        let chi = mesh.euler_characteristic();
        if chi != 2 {
            return Err(format!("Euler characteristic {chi}, expected 2 for a convex hull"));
        }
        Ok(mesh)
    }

    pub fn num_edges(&self) -> usize {
        self.half_edges.len() / 2
    }

    /// V - E + F.
    pub fn euler_characteristic(&self) -> i64 {
        self.vertices.len() as i64 - self.num_edges() as i64 + self.faces.len() as i64
    }

    /// Vertex indices around a face, in winding order.
    pub fn face_vertices(&self, face: usize) -> Vec<u32> {
        let start = self.faces[face];
        let mut out = Vec::new();
        let mut he = start;
        loop {
            let edge = self.half_edges[he as usize];
            out.push(edge.origin);
            he = edge.next;
            if he == start {
                break;
            }
        }
        out
    }
}
