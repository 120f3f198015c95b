//! Wavefront OBJ loading.
//!
//! Parses only the statements the forward pass needs: positions, normals,
//! and faces. Vertex color is taken from the normal, which keeps unlit
//! meshes readable without a lighting pass.

use crate::error::RenderError;
use crate::mesh::Vertex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Color for corners that reference no normal.
const DEFAULT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

/// Load a triangulated vertex list from an OBJ file.
pub fn load_vertices(path: &Path) -> Result<Vec<Vertex>, RenderError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => RenderError::NotFound(path.to_path_buf()),
        _ => RenderError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let vertices = parse_vertices(BufReader::new(file))?;
    tracing::info!(
        "Loaded {}: {} vertices",
        path.display(),
        vertices.len()
    );
    Ok(vertices)
}

/// Parse OBJ statements into a flat triangle list.
///
/// Faces with more than three corners are fan-triangulated. Statements the
/// forward pass has no use for (`vt`, `o`, `s`, `mtllib`, ...) are skipped.
pub fn parse_vertices(reader: impl BufRead) -> Result<Vec<Vertex>, RenderError> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut vertices: Vec<Vertex> = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line =
            line.map_err(|e| RenderError::MalformedObj(format!("line {line_number}: {e}")))?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[0] {
            "v" => positions.push(parse_vec3(&parts, line_number)?),
            "vn" => normals.push(parse_vec3(&parts, line_number)?),
            "f" => parse_face(&parts[1..], &positions, &normals, &mut vertices, line_number)?,
            _ => {}
        }
    }

    Ok(vertices)
}

fn parse_vec3(parts: &[&str], line_number: usize) -> Result<[f32; 3], RenderError> {
    if parts.len() < 4 {
        return Err(RenderError::MalformedObj(format!(
            "line {line_number}: `{}` needs three components",
            parts[0]
        )));
    }

    let mut out = [0.0_f32; 3];
    for (slot, raw) in out.iter_mut().zip(&parts[1..4]) {
        *slot = raw.parse().map_err(|_| {
            RenderError::MalformedObj(format!("line {line_number}: bad float `{raw}`"))
        })?;
    }
    Ok(out)
}

fn parse_face(
    corners: &[&str],
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    vertices: &mut Vec<Vertex>,
    line_number: usize,
) -> Result<(), RenderError> {
    if corners.len() < 3 {
        return Err(RenderError::MalformedObj(format!(
            "line {line_number}: face needs at least three corners"
        )));
    }

    let mut face = Vec::with_capacity(corners.len());
    for corner in corners {
        face.push(parse_corner(corner, positions, normals, line_number)?);
    }

    // Fan triangulation around the first corner
    for i in 1..face.len() - 1 {
        vertices.push(face[0]);
        vertices.push(face[i]);
        vertices.push(face[i + 1]);
    }

    Ok(())
}

fn parse_corner(
    corner: &str,
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    line_number: usize,
) -> Result<Vertex, RenderError> {
    let mut refs = corner.split('/');

    let position_index = parse_index(
        refs.next().unwrap_or(""),
        positions.len(),
        "position",
        line_number,
    )?;
    let position = positions[position_index];

    // Texture coordinates are not used
    let _ = refs.next();

    let color = match refs.next() {
        Some(raw) if !raw.is_empty() => {
            let normal_index = parse_index(raw, normals.len(), "normal", line_number)?;
            normals[normal_index]
        }
        _ => DEFAULT_COLOR,
    };

    Ok(Vertex { position, color })
}

fn parse_index(
    raw: &str,
    len: usize,
    what: &str,
    line_number: usize,
) -> Result<usize, RenderError> {
    let index: usize = raw.parse().map_err(|_| {
        RenderError::MalformedObj(format!("line {line_number}: bad {what} index `{raw}`"))
    })?;

    // OBJ indices are 1-based
    index.checked_sub(1).filter(|&i| i < len).ok_or_else(|| {
        RenderError::MalformedObj(format!(
            "line {line_number}: {what} index {index} out of range"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_a_triangle_with_normals() {
        let src = "\
# a single triangle
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vn 0.0 0.0 1.0
f 1//1 2//1 3//1
";
        let vertices = parse_vertices(Cursor::new(src)).unwrap();

        assert_eq!(vertices.len(), 3);
        assert_eq!(vertices[1].position, [1.0, 0.0, 0.0]);
        // Normals become colors
        assert!(vertices.iter().all(|v| v.color == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn quads_are_fan_triangulated() {
        let src = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
f 1 2 3 4
";
        let vertices = parse_vertices(Cursor::new(src)).unwrap();

        assert_eq!(vertices.len(), 6);
        // Both triangles share the first corner
        assert_eq!(vertices[0].position, vertices[3].position);
    }

    #[test]
    fn corners_without_normals_fall_back_to_default_color() {
        let src = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
f 1 2 3
";
        let vertices = parse_vertices(Cursor::new(src)).unwrap();
        assert!(vertices.iter().all(|v| v.color == DEFAULT_COLOR));
    }

    #[test]
    fn empty_input_yields_no_vertices() {
        let vertices = parse_vertices(Cursor::new("")).unwrap();
        assert!(vertices.is_empty());
    }

    #[test]
    fn unknown_statements_are_skipped() {
        let src = "\
mtllib monkey.mtl
o Suzanne
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vt 0.5 0.5
s 1
f 1/1 2/1 3/1
";
        let vertices = parse_vertices(Cursor::new(src)).unwrap();
        assert_eq!(vertices.len(), 3);
    }

    #[test]
    fn bad_floats_are_rejected() {
        let result = parse_vertices(Cursor::new("v one two three\n"));
        assert!(matches!(result, Err(RenderError::MalformedObj(_))));
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let src = "\
v 0.0 0.0 0.0
f 1 2 3
";
        let result = parse_vertices(Cursor::new(src));
        assert!(matches!(result, Err(RenderError::MalformedObj(_))));
    }
}
