//! glTF 2.0 import through the `gltf` crate.

use std::{collections::HashMap, path::Path};

use crate::{
    data_structures::scene_graph::{
        EmbeddedImage, MaterialSlot, Scene, SceneMaterial, SceneMesh, SceneNode,
    },
    error::ImportError,
};

pub fn import(path: &Path) -> Result<Scene, ImportError> {
    let gltf::Gltf { document, blob } = gltf::Gltf::open(path)?;
    let buffers = gltf::import_buffers(&document, path.parent(), blob)?;
    let buffer_data: Vec<&[u8]> = buffers.iter().map(|data| data.0.as_slice()).collect();

    let mut scene = Scene::default();
    let mut image_refs: HashMap<usize, String> = HashMap::new();

    for material in document.materials() {
        let material = to_scene_material(&material, &buffer_data, &mut scene, &mut image_refs);
        scene.materials.push(material);
    }
    // Primitives without a material point at a trailing default one.
    let default_material = scene.materials.len();
    scene.materials.push(SceneMaterial::new("default"));

    // One scene mesh per primitive; keep track of which belong to which glTF mesh.
    let mut primitives_of_mesh: Vec<Vec<usize>> = Vec::new();
    for mesh in document.meshes() {
        let mut indices = Vec::new();
        for primitive in mesh.primitives() {
            let scene_mesh = to_scene_mesh(&mesh, &primitive, &buffer_data, default_material);
            indices.push(scene.meshes.len());
            scene.meshes.push(scene_mesh);
        }
        primitives_of_mesh.push(indices);
    }

    let Some(gltf_scene) = document.default_scene().or_else(|| document.scenes().next()) else {
        scene.incomplete = true;
        return Ok(scene);
    };
    let mut root = SceneNode::new(gltf_scene.name().unwrap_or("root"));
    for node in gltf_scene.nodes() {
        root.children.push(to_scene_node(&node, &primitives_of_mesh));
    }
    scene.root = Some(root);
    Ok(scene)
}

fn to_scene_node(node: &gltf::scene::Node, primitives_of_mesh: &[Vec<usize>]) -> SceneNode {
    let mut scene_node = SceneNode::new(node.name().unwrap_or_default());
    if let Some(mesh) = node.mesh() {
        scene_node
            .meshes
            .extend(primitives_of_mesh[mesh.index()].iter().copied());
    }
    for child in node.children() {
        scene_node
            .children
            .push(to_scene_node(&child, primitives_of_mesh));
    }
    scene_node
}

fn to_scene_mesh(
    mesh: &gltf::Mesh,
    primitive: &gltf::Primitive,
    buffer_data: &[&[u8]],
    default_material: usize,
) -> SceneMesh {
    let reader = primitive.reader(|buffer| buffer_data.get(buffer.index()).copied());

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .map(|positions| positions.collect())
        .unwrap_or_default();
    let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|normals| normals.collect());
    // glTF stores UVs with a top-left origin; scenes carry them bottom-left.
    let tex_coords = reader.read_tex_coords(0).map(|tex_coords| {
        tex_coords
            .into_f32()
            .map(|[u, v]| [u, 1.0 - v])
            .collect::<Vec<_>>()
    });

    let mut tangents = None;
    let mut bitangents = None;
    if let Some(tangent_attribute) = reader.read_tangents() {
        // GLTF represents tangents as vec4 where the 4th elem can be used to calculate the bitangent
        let (t, b): (Vec<[f32; 3]>, Vec<[f32; 3]>) = tangent_attribute
            .enumerate()
            .map(|(i, tangent)| {
                let tangent: cgmath::Vector4<f32> = tangent.into();
                let normal: cgmath::Vector3<f32> = normals
                    .as_ref()
                    .and_then(|normals| normals.get(i))
                    .copied()
                    .unwrap_or([0.0; 3])
                    .into();
                let bitangent = normal.cross(tangent.truncate()) * tangent[3];
                (
                    Into::<[f32; 3]>::into(tangent.truncate()),
                    Into::<[f32; 3]>::into(bitangent),
                )
            })
            .unzip();
        tangents = Some(t);
        bitangents = Some(b);
    }

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    SceneMesh {
        name: mesh.name().unwrap_or_default().to_string(),
        positions,
        normals,
        tex_coords,
        tangents,
        bitangents,
        faces: faces(primitive.mode(), &indices),
        material: primitive.material().index().unwrap_or(default_material),
    }
}

/// Split an index stream into faces according to the primitive topology.
fn faces(mode: gltf::mesh::Mode, indices: &[u32]) -> Vec<Vec<u32>> {
    use gltf::mesh::Mode;
    match mode {
        Mode::Triangles => indices.chunks_exact(3).map(<[u32]>::to_vec).collect(),
        Mode::TriangleStrip => (2..indices.len())
            .map(|i| {
                if i % 2 == 0 {
                    vec![indices[i - 2], indices[i - 1], indices[i]]
                } else {
                    vec![indices[i - 1], indices[i - 2], indices[i]]
                }
            })
            .collect(),
        Mode::TriangleFan => (2..indices.len())
            .map(|i| vec![indices[0], indices[i - 1], indices[i]])
            .collect(),
        Mode::Lines | Mode::LineLoop | Mode::LineStrip => {
            indices.chunks_exact(2).map(<[u32]>::to_vec).collect()
        }
        Mode::Points => indices.iter().map(|i| vec![*i]).collect(),
    }
}

fn to_scene_material(
    material: &gltf::Material,
    buffer_data: &[&[u8]],
    scene: &mut Scene,
    image_refs: &mut HashMap<usize, String>,
) -> SceneMaterial {
    let mut scene_material = SceneMaterial::new(material.name().unwrap_or_default());
    let mut add = |slot: MaterialSlot, texture: gltf::Texture| {
        let reference = image_reference(&texture.source(), buffer_data, scene, image_refs);
        scene_material.add_texture(slot, reference);
    };

    let pbr = material.pbr_metallic_roughness();
    if let Some(info) = pbr.base_color_texture() {
        add(MaterialSlot::Diffuse, info.texture());
    }
    if let Some(specular_glossiness) = material.pbr_specular_glossiness() {
        if let Some(info) = specular_glossiness.diffuse_texture() {
            add(MaterialSlot::Diffuse, info.texture());
        }
        if let Some(info) = specular_glossiness.specular_glossiness_texture() {
            add(MaterialSlot::Specular, info.texture());
        }
    }
    if let Some(normal) = material.normal_texture() {
        add(MaterialSlot::Normals, normal.texture());
    }
    if let Some(occlusion) = material.occlusion_texture() {
        add(MaterialSlot::Lightmap, occlusion.texture());
    }
    if let Some(info) = material.emissive_texture() {
        add(MaterialSlot::Emissive, info.texture());
    }
    scene_material
}

/// The path a texture is loaded from: its percent-decoded URI, or `*<n>` for
/// images stored in a buffer view or a `data:` URI.
fn image_reference(
    image: &gltf::Image,
    buffer_data: &[&[u8]],
    scene: &mut Scene,
    image_refs: &mut HashMap<usize, String>,
) -> String {
    if let Some(reference) = image_refs.get(&image.index()) {
        return reference.clone();
    }
    let embedded = match image.source() {
        gltf::image::Source::Uri { uri, mime_type } => match decode_data_uri(uri) {
            Some((data_mime, data)) => EmbeddedImage {
                data,
                mime_type: mime_type.or(data_mime).map(str::to_string),
            },
            None => {
                return urlencoding::decode(uri)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| uri.to_string());
            }
        },
        gltf::image::Source::View { view, mime_type } => EmbeddedImage {
            data: buffer_data
                .get(view.buffer().index())
                .and_then(|buffer| buffer.get(view.offset()..view.offset() + view.length()))
                .map(<[u8]>::to_vec)
                .unwrap_or_default(),
            mime_type: Some(mime_type.to_string()),
        },
    };
    scene.embedded.push(embedded);
    let reference = format!("*{}", scene.embedded.len() - 1);
    image_refs.insert(image.index(), reference.clone());
    reference
}

/// Split a `data:[<mime>];base64,<payload>` URI into its media type and bytes.
/// Returns `None` for anything that is not a data URI. A payload that fails to
/// decode yields no bytes, so the texture is created without contents.
fn decode_data_uri(uri: &str) -> Option<(Option<&str>, Vec<u8>)> {
    use base64::Engine as _;

    let rest = uri.strip_prefix("data:")?;
    let (media_type, payload) = rest.split_once(";base64,")?;
    let data = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .unwrap_or_else(|e| {
            log::warn!("could not decode embedded image data: {e}");
            Vec::new()
        });
    let media_type = (!media_type.is_empty()).then_some(media_type);
    Some((media_type, data))
}

#[cfg(test)]
mod tests {
    use gltf::mesh::Mode;

    use super::*;

    #[test]
    fn strips_alternate_winding() {
        let faces = faces(Mode::TriangleStrip, &[0, 1, 2, 3]);
        assert_eq!(faces, vec![vec![0, 1, 2], vec![2, 1, 3]]);
    }

    #[test]
    fn fans_share_first_vertex() {
        let faces = faces(Mode::TriangleFan, &[0, 1, 2, 3]);
        assert_eq!(faces, vec![vec![0, 1, 2], vec![0, 2, 3]]);
    }

    #[test]
    fn triangle_lists_split_in_threes() {
        let faces = faces(Mode::Triangles, &[0, 1, 2, 2, 3, 0]);
        assert_eq!(faces, vec![vec![0, 1, 2], vec![2, 3, 0]]);
    }

    #[test]
    fn data_uris_yield_media_type_and_bytes() {
        let (mime, data) = decode_data_uri("data:image/png;base64,AQID").unwrap();
        assert_eq!(mime, Some("image/png"));
        assert_eq!(data, vec![1, 2, 3]);

        let (mime, _) = decode_data_uri("data:;base64,AQID").unwrap();
        assert_eq!(mime, None);
        assert!(decode_data_uri("textures/albedo.png").is_none());
    }
}
