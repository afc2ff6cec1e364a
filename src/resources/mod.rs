use std::path::Path;

use crate::{
    backend::{Backend, WrapMode},
    data_structures::{
        model::{Mesh, Model, TextureKind},
        scene_graph::{MaterialSlot, Scene, SceneMaterial},
    },
    error::ImportError,
    resources::texture::{TextureCache, TextureLoad},
};

/**
 * This module contains all logic for turning model files into a [`Model`]:
 * format importers, per-mesh conversion and texture loading.
 */
pub mod gltf_scene;
pub mod mesh;
pub mod obj_scene;
pub mod texture;

/// Transforms applied while importing a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Split polygons into triangles.
    pub triangulate: bool,
    /// Deliver texture coordinates with a top-left origin.
    pub flip_uvs: bool,
    /// Generate tangents and bitangents for meshes that have none.
    pub calc_tangent_space: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            triangulate: true,
            flip_uvs: true,
            calc_tangent_space: true,
        }
    }
}

/// Which material slots feed which texture kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotMapping {
    /// Normal maps come from the height slot and height maps from the ambient slot.
    #[default]
    Legacy,
    /// Normal maps come from the normals slot (falling back to the height slot),
    /// height maps from the height slot.
    Conventional,
}

impl SlotMapping {
    pub fn slots(&self, kind: TextureKind) -> &'static [MaterialSlot] {
        match (self, kind) {
            (_, TextureKind::Diffuse) => &[MaterialSlot::Diffuse],
            (_, TextureKind::Specular) => &[MaterialSlot::Specular],
            (SlotMapping::Legacy, TextureKind::Normal) => &[MaterialSlot::Height],
            (SlotMapping::Legacy, TextureKind::Height) => &[MaterialSlot::Ambient],
            (SlotMapping::Conventional, TextureKind::Normal) => &[MaterialSlot::Normals],
            (SlotMapping::Conventional, TextureKind::Height) => &[MaterialSlot::Height],
        }
    }

    /// Slots for `kind` in `material`, applying the conventional height fallback.
    fn resolve(&self, material: &SceneMaterial, kind: TextureKind) -> &'static [MaterialSlot] {
        match (self, kind) {
            (SlotMapping::Conventional, TextureKind::Normal)
                if material.textures(MaterialSlot::Normals).is_empty() =>
            {
                &[MaterialSlot::Height]
            }
            (SlotMapping::Conventional, TextureKind::Height)
                if material.textures(MaterialSlot::Normals).is_empty() =>
            {
                // The height slot already served as the normal map.
                &[]
            }
            _ => self.slots(kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoaderConfig {
    pub import: ImportOptions,
    pub slot_mapping: SlotMapping,
    /// Upload diffuse textures in an sRGB format.
    pub gamma: bool,
    pub wrap: WrapMode,
}

/// Import `path` with the importer its extension selects and apply `options`.
pub fn import_scene(path: &Path, options: &ImportOptions) -> Result<Scene, ImportError> {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    let mut scene = match extension.as_deref() {
        Some("gltf") | Some("glb") => gltf_scene::import(path)?,
        Some("obj") => obj_scene::import(path)?,
        _ => return Err(ImportError::UnsupportedFormat(path.to_path_buf())),
    };
    for scene_mesh in scene.meshes.iter_mut() {
        mesh::post_process(scene_mesh, options);
    }
    Ok(scene)
}

impl<B: Backend> Model<B> {
    /// Load a model, logging any failure and returning an empty model instead.
    pub fn load(backend: &mut B, path: impl AsRef<Path>) -> Self {
        Self::load_with(backend, path, &LoaderConfig::default())
    }

    pub fn load_with(backend: &mut B, path: impl AsRef<Path>, config: &LoaderConfig) -> Self {
        let path = path.as_ref();
        match Self::try_load_with(backend, path, config) {
            Ok(model) => model,
            Err(e) => {
                log::error!("ERROR::IMPORT::{}: {e}", path.display());
                Self::empty(directory_of(path), config.gamma)
            }
        }
    }

    pub fn try_load(backend: &mut B, path: impl AsRef<Path>) -> Result<Self, ImportError> {
        Self::try_load_with(backend, path, &LoaderConfig::default())
    }

    pub fn try_load_with(
        backend: &mut B,
        path: impl AsRef<Path>,
        config: &LoaderConfig,
    ) -> Result<Self, ImportError> {
        let path = path.as_ref();
        let scene = import_scene(path, &config.import)?;
        Self::from_scene(backend, &scene, directory_of(path), config)
    }

    /// Build a model from an already imported scene. Textures are resolved against `directory`.
    pub fn from_scene(
        backend: &mut B,
        scene: &Scene,
        directory: &Path,
        config: &LoaderConfig,
    ) -> Result<Self, ImportError> {
        let Some(root) = scene.root.as_ref() else {
            return Err(ImportError::IncompleteScene("scene has no root node".into()));
        };
        if scene.incomplete {
            return Err(ImportError::IncompleteScene(format!(
                "importer flagged {} as incomplete",
                root.name
            )));
        }

        let mut cache = TextureCache::default();
        let mut meshes = Vec::new();
        {
            let mut textures = TextureLoad {
                cache: &mut cache,
                scene,
                directory,
                gamma: config.gamma,
                wrap: config.wrap,
            };
            for index in scene.mesh_order() {
                let Some(scene_mesh) = scene.meshes.get(index) else {
                    log::warn!("{} references missing mesh {index}", root.name);
                    continue;
                };
                meshes.push(process_mesh(
                    backend,
                    scene,
                    scene_mesh,
                    &mut textures,
                    config.slot_mapping,
                ));
            }
        }
        log::info!(
            "loaded {} meshes and {} textures from {}",
            meshes.len(),
            cache.as_slice().len(),
            directory.display()
        );

        Ok(Self {
            meshes,
            textures_loaded: cache,
            directory: directory.to_path_buf(),
            gamma: config.gamma,
        })
    }
}

fn process_mesh<B: Backend>(
    backend: &mut B,
    scene: &Scene,
    scene_mesh: &crate::data_structures::scene_graph::SceneMesh,
    textures: &mut TextureLoad<'_, B>,
    slot_mapping: SlotMapping,
) -> Mesh<B> {
    let (vertices, indices) = mesh::to_vertices(scene_mesh);

    let mut mesh_textures = Vec::new();
    match scene.materials.get(scene_mesh.material) {
        Some(material) => {
            for kind in TextureKind::ALL {
                let slots = slot_mapping.resolve(material, kind);
                mesh_textures.extend(textures.load_material_textures(backend, material, slots, kind));
            }
        }
        None => log::warn!(
            "mesh {} references missing material {}",
            scene_mesh.name,
            scene_mesh.material
        ),
    }

    Mesh::new(backend, &scene_mesh.name, vertices, indices, mesh_textures)
}

fn directory_of(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_mapping_reads_normals_from_height_slot() {
        let mapping = SlotMapping::Legacy;
        assert_eq!(mapping.slots(TextureKind::Normal), &[MaterialSlot::Height]);
        assert_eq!(mapping.slots(TextureKind::Height), &[MaterialSlot::Ambient]);
    }

    #[test]
    fn conventional_mapping_falls_back_to_height_slot() {
        let mapping = SlotMapping::Conventional;
        let bump_only = SceneMaterial::new("m").with_texture(MaterialSlot::Height, "bump.png");
        assert_eq!(
            mapping.resolve(&bump_only, TextureKind::Normal),
            &[MaterialSlot::Height]
        );
        assert!(mapping.resolve(&bump_only, TextureKind::Height).is_empty());

        let both = bump_only.with_texture(MaterialSlot::Normals, "normal.png");
        assert_eq!(
            mapping.resolve(&both, TextureKind::Normal),
            &[MaterialSlot::Normals]
        );
        assert_eq!(
            mapping.resolve(&both, TextureKind::Height),
            &[MaterialSlot::Height]
        );
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        let err = import_scene(Path::new("model.fbx"), &ImportOptions::default()).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }

    #[test]
    fn default_options_request_all_transforms() {
        let options = ImportOptions::default();
        assert!(options.triangulate && options.flip_uvs && options.calc_tangent_space);
    }
}
