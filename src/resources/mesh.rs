use cgmath::InnerSpace;

use crate::{
    data_structures::{model::Vertex, scene_graph::SceneMesh},
    resources::ImportOptions,
};

/// Apply the import-time transforms to a freshly imported mesh.
pub(crate) fn post_process(mesh: &mut SceneMesh, options: &ImportOptions) {
    if options.triangulate {
        triangulate(mesh);
    }
    if options.flip_uvs {
        if let Some(tex_coords) = mesh.tex_coords.as_mut() {
            for uv in tex_coords.iter_mut() {
                uv[1] = 1.0 - uv[1];
            }
        }
    }
    if options.calc_tangent_space && mesh.tangents.is_none() {
        calculate_tangent_space(mesh);
    }
}

/// Fan-triangulate polygons. Points and lines cannot be part of a triangle list and are dropped.
fn triangulate(mesh: &mut SceneMesh) {
    let mut dropped = 0;
    let faces = std::mem::take(&mut mesh.faces);
    for face in faces {
        match face.len() {
            0..=2 => dropped += 1,
            3 => mesh.faces.push(face),
            _ => {
                for i in 1..face.len() - 1 {
                    mesh.faces.push(vec![face[0], face[i], face[i + 1]]);
                }
            }
        }
    }
    if dropped > 0 {
        log::debug!("dropped {dropped} point/line primitives from mesh {}", mesh.name);
    }
}

/**
 * Tangents and bitangents from positions and the first UV channel, averaged over
 * every triangle a vertex belongs to. Meshes without UVs get no tangent space.
 */
fn calculate_tangent_space(mesh: &mut SceneMesh) {
    let Some(tex_coords) = mesh.tex_coords.as_ref() else {
        return;
    };
    let count = mesh.positions.len();
    let mut tangents = vec![cgmath::Vector3::new(0.0f32, 0.0, 0.0); count];
    let mut bitangents = tangents.clone();
    let mut triangles_included = vec![0u32; count];

    for c in mesh.faces.iter().filter(|face| face.len() == 3) {
        let (i0, i1, i2) = (c[0] as usize, c[1] as usize, c[2] as usize);
        if i0 >= count || i1 >= count || i2 >= count {
            continue;
        }
        let pos0: cgmath::Vector3<f32> = mesh.positions[i0].into();
        let pos1: cgmath::Vector3<f32> = mesh.positions[i1].into();
        let pos2: cgmath::Vector3<f32> = mesh.positions[i2].into();

        let uv0: cgmath::Vector2<f32> = tex_coords[i0].into();
        let uv1: cgmath::Vector2<f32> = tex_coords[i1].into();
        let uv2: cgmath::Vector2<f32> = tex_coords[i2].into();

        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        //     delta_pos1 = delta_uv1.x * T + delta_uv1.y * B
        //     delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
        let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if det.abs() <= f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
        let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * r;

        for i in [i0, i1, i2] {
            tangents[i] += tangent;
            bitangents[i] += bitangent;
            triangles_included[i] += 1;
        }
    }

    let normalize = |v: cgmath::Vector3<f32>| {
        if v.magnitude2() > 0.0 { v.normalize() } else { v }
    };
    for (i, n) in triangles_included.into_iter().enumerate() {
        if n > 0 {
            let denom = 1.0 / n as f32;
            tangents[i] = normalize(tangents[i] * denom);
            bitangents[i] = normalize(bitangents[i] * denom);
        }
    }

    mesh.tangents = Some(tangents.into_iter().map(Into::into).collect());
    mesh.bitangents = Some(bitangents.into_iter().map(Into::into).collect());
}

/// Interleave the attributes of `mesh` and flatten its faces into an index list.
///
/// Missing normals, tangents and bitangents become zero vectors, a missing UV
/// channel becomes `(0, 0)`.
pub fn to_vertices(mesh: &SceneMesh) -> (Vec<Vertex>, Vec<u32>) {
    fn attribute<const N: usize>(data: &Option<Vec<[f32; N]>>, i: usize) -> [f32; N] {
        data.as_ref()
            .and_then(|values| values.get(i))
            .copied()
            .unwrap_or([0.0; N])
    }

    let vertices = mesh
        .positions
        .iter()
        .enumerate()
        .map(|(i, position)| Vertex {
            position: *position,
            normal: attribute(&mesh.normals, i),
            tex_coords: attribute(&mesh.tex_coords, i),
            tangent: attribute(&mesh.tangents, i),
            bitangent: attribute(&mesh.bitangents, i),
        })
        .collect();

    let indices = mesh.faces.iter().flatten().copied().collect();
    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> SceneMesh {
        SceneMesh {
            name: "quad".into(),
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            normals: Some(vec![[0.0, 0.0, 1.0]; 4]),
            tex_coords: Some(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]),
            faces: vec![vec![0, 1, 2, 3]],
            ..Default::default()
        }
    }

    #[test]
    fn quads_are_fan_triangulated() {
        let mut mesh = quad();
        triangulate(&mut mesh);
        assert_eq!(mesh.faces, vec![vec![0, 1, 2], vec![0, 2, 3]]);
    }

    #[test]
    fn lines_and_points_are_dropped() {
        let mut mesh = quad();
        mesh.faces = vec![vec![0], vec![0, 1], vec![0, 1, 2]];
        triangulate(&mut mesh);
        assert_eq!(mesh.faces, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn tangent_space_follows_uv_axes() {
        let mut mesh = quad();
        post_process(
            &mut mesh,
            &ImportOptions {
                flip_uvs: false,
                ..Default::default()
            },
        );
        let tangents = mesh.tangents.unwrap();
        let bitangents = mesh.bitangents.unwrap();
        for (t, b) in tangents.iter().zip(&bitangents) {
            assert!((t[0] - 1.0).abs() < 1e-5 && t[1].abs() < 1e-5);
            assert!((b[1] - 1.0).abs() < 1e-5 && b[0].abs() < 1e-5);
        }
    }

    #[test]
    fn flipping_uvs_mirrors_v() {
        let mut mesh = quad();
        post_process(
            &mut mesh,
            &ImportOptions {
                calc_tangent_space: false,
                ..Default::default()
            },
        );
        let uvs = mesh.tex_coords.unwrap();
        assert_eq!(uvs[0], [0.0, 1.0]);
        assert_eq!(uvs[2], [1.0, 0.0]);
    }

    #[test]
    fn missing_uv_channel_defaults_to_origin() {
        let mut mesh = quad();
        mesh.tex_coords = None;
        post_process(&mut mesh, &ImportOptions::default());
        let (vertices, indices) = to_vertices(&mesh);
        assert!(vertices.iter().all(|v| v.tex_coords == [0.0, 0.0]));
        assert!(vertices.iter().all(|v| v.tangent == [0.0; 3]));
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 3]);
    }
}
