//! Wavefront OBJ/MTL import through `tobj`.

use std::path::Path;

use crate::{
    data_structures::scene_graph::{MaterialSlot, Scene, SceneMaterial, SceneMesh, SceneNode},
    error::ImportError,
};

pub fn import(path: &Path) -> Result<Scene, ImportError> {
    if !path.exists() {
        return Err(ImportError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
    }
    let (models, obj_materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            // Polygons are kept so triangulation stays an import option.
            triangulate: false,
            single_index: true,
            ..Default::default()
        },
    )?;

    let mut scene = Scene::default();
    match obj_materials {
        Ok(materials) => scene
            .materials
            .extend(materials.iter().map(to_scene_material)),
        Err(e) => log::warn!("Materials of {} could not be loaded: {e}", path.display()),
    }
    let default_material = scene.materials.len();
    scene.materials.push(SceneMaterial::new("default"));

    let mut root = SceneNode::new(
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );
    for (i, model) in models.iter().enumerate() {
        let mut mesh = to_scene_mesh(model);
        if mesh.material >= default_material {
            mesh.material = default_material;
        }
        scene.meshes.push(mesh);
        root.children.push(SceneNode::new(model.name.clone()).with_meshes([i]));
    }
    scene.incomplete = scene.meshes.is_empty();
    scene.root = Some(root);
    Ok(scene)
}

fn to_scene_mesh(model: &tobj::Model) -> SceneMesh {
    let m = &model.mesh;
    let positions = m
        .positions
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect::<Vec<_>>();
    let normals = (!m.normals.is_empty()).then(|| {
        m.normals
            .chunks_exact(3)
            .map(|n| [n[0], n[1], n[2]])
            .collect::<Vec<_>>()
    });
    let tex_coords = (!m.texcoords.is_empty()).then(|| {
        m.texcoords
            .chunks_exact(2)
            .map(|t| [t[0], t[1]])
            .collect::<Vec<_>>()
    });

    // An empty arity list means every face is a triangle.
    let faces = if m.face_arities.is_empty() {
        m.indices.chunks_exact(3).map(<[u32]>::to_vec).collect()
    } else {
        let mut start = 0;
        m.face_arities
            .iter()
            .map(|&arity| {
                let end = (start + arity as usize).min(m.indices.len());
                let face = m.indices[start..end].to_vec();
                start = end;
                face
            })
            .collect()
    };

    SceneMesh {
        name: model.name.clone(),
        positions,
        normals,
        tex_coords,
        tangents: None,
        bitangents: None,
        faces,
        material: m.material_id.unwrap_or(usize::MAX),
    }
}

/// `map_Bump` ends up in tobj's normal texture; it is a height map slot for the loader.
fn to_scene_material(material: &tobj::Material) -> SceneMaterial {
    let mut scene_material = SceneMaterial::new(material.name.clone());
    let slots = [
        (MaterialSlot::Diffuse, &material.diffuse_texture),
        (MaterialSlot::Specular, &material.specular_texture),
        (MaterialSlot::Height, &material.normal_texture),
        (MaterialSlot::Ambient, &material.ambient_texture),
        (MaterialSlot::Shininess, &material.shininess_texture),
        (MaterialSlot::Opacity, &material.dissolve_texture),
    ];
    for (slot, texture) in slots {
        if let Some(texture) = texture {
            scene_material.add_texture(slot, texture.clone());
        }
    }
    scene_material
}
