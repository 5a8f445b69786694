//! Wavefront OBJ subset: `v` positions and `f` polygons.
//!
//! Texture coordinates, normals, groups, smoothing and material statements
//! are accepted and ignored. Face indices may use the `v/vt/vn` forms and
//! negative (relative) indices.

use crate::AssetError;
use glam::Vec3;
use std::path::{Path, PathBuf};

/// Positions plus polygon index lists, zero-based.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjMesh {
    pub positions: Vec<Vec3>,
    pub faces: Vec<Vec<u32>>,
}

impl ObjMesh {
    /// Fan-triangulate every polygon.
    pub fn triangles(&self) -> Vec<u32> {
        let mut out = Vec::new();
        for face in &self.faces {
            for i in 1..face.len() - 1 {
                out.extend_from_slice(&[face[0], face[i], face[i + 1]]);
            }
        }
        out
    }
}

/// Read and parse an OBJ file.
pub fn read_obj(path: impl AsRef<Path>) -> Result<ObjMesh, AssetError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_obj(&text, path)
}

/// Parse OBJ text. `path` is only used for diagnostics.
pub fn parse_obj(text: &str, path: &Path) -> Result<ObjMesh, AssetError> {
    let mut mesh = ObjMesh::default();

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };
        let err = |message: String| AssetError::ObjParse {
            path: PathBuf::from(path),
            line: lineno + 1,
            message,
        };

        match keyword {
            "v" => {
                let coords: Vec<f32> = tokens
                    .take(3)
                    .map(|t| t.parse::<f32>())
                    .collect::<Result<_, _>>()
                    .map_err(|e| err(format!("bad vertex coordinate: {e}")))?;
                if coords.len() != 3 {
                    return Err(err("vertex needs three coordinates".into()));
                }
                if coords.iter().any(|c| !c.is_finite()) {
                    return Err(err("non-finite vertex coordinate".into()));
                }
                mesh.positions.push(Vec3::new(coords[0], coords[1], coords[2]));
            }
            "f" => {
                let count = mesh.positions.len() as i64;
                let mut face = Vec::new();
                for token in tokens {
                    let index_str = token.split('/').next().unwrap_or("");
                    let index: i64 = index_str
                        .parse()
                        .map_err(|_| err(format!("bad face index {token:?}")))?;
                    let resolved = if index < 0 { count + index } else { index - 1 };
                    if index == 0 || resolved < 0 || resolved >= count {
                        return Err(err(format!(
                            "face index {index} out of range ({count} vertices)"
                        )));
                    }
                    face.push(resolved as u32);
                }
                if face.len() < 3 {
                    return Err(err("face needs at least three vertices".into()));
                }
                mesh.faces.push(face);
            }
            _ => {}
        }
    }

    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ObjMesh, AssetError> {
        parse_obj(text, Path::new("test.obj"))
    }

    #[test]
    fn parses_vertices_and_faces() {
        let mesh = parse(
            "# a quad\n\
             o quad\n\
             v 0 0 0\n\
             v 1 0 0\n\
             v 1 1 0\n\
             v 0 1 0\n\
             vn 0 0 1\n\
             f 1//1 2//1 3//1 4//1\n",
        )
        .unwrap();
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.faces, vec![vec![0, 1, 2, 3]]);
        assert_eq!(mesh.triangles(), vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn negative_indices_are_relative() {
        let mesh = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n").unwrap();
        assert_eq!(mesh.faces, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn out_of_range_index_reports_line() {
        let err = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n").unwrap_err();
        match err {
            AssetError::ObjParse { line, .. } => assert_eq!(line, 4),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_short_vertex_and_degenerate_face() {
        assert!(parse("v 0 0\n").is_err());
        assert!(parse("v 0 0 0\nv 1 0 0\nf 1 2\n").is_err());
        assert!(parse("v 0 nan 0\n").is_err());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_obj("/definitely/not/here.obj").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.obj"));
    }
}
