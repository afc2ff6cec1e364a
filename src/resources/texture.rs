use std::{collections::HashMap, path::Path};

use image::{DynamicImage, ImageFormat};

use crate::{
    backend::{Backend, PixelFormat, TextureImage, WrapMode},
    data_structures::{
        model::{Texture, TextureKind},
        scene_graph::{MaterialSlot, Scene, SceneMaterial},
    },
    error::TextureError,
};

/// Textures loaded for one model, keyed by canonical path. The first texture
/// loaded for a path wins; load order is kept for reporting.
pub struct TextureCache<B: Backend> {
    textures: Vec<Texture<B>>,
    by_path: HashMap<String, usize>,
}

impl<B: Backend> Default for TextureCache<B> {
    fn default() -> Self {
        Self {
            textures: Vec::new(),
            by_path: HashMap::new(),
        }
    }
}

impl<B: Backend> TextureCache<B> {
    pub fn get(&self, path: &str) -> Option<&Texture<B>> {
        self.by_path
            .get(&canonical_path(path))
            .map(|&index| &self.textures[index])
    }

    /// Insert `texture` unless its path is already cached. Returns the cached entry.
    pub fn insert(&mut self, texture: Texture<B>) -> &Texture<B> {
        let key = canonical_path(&texture.path);
        let index = match self.by_path.get(&key) {
            Some(&index) => index,
            None => {
                self.textures.push(texture);
                self.by_path.insert(key, self.textures.len() - 1);
                self.textures.len() - 1
            }
        };
        &self.textures[index]
    }

    pub fn as_slice(&self) -> &[Texture<B>] {
        &self.textures
    }
}

/// Normalise a material texture reference: backslashes become `/`, empty and
/// `.` components are dropped.
pub fn canonical_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');
    let parts: Vec<&str> = path
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();
    let joined = parts.join("/");
    if absolute { format!("/{joined}") } else { joined }
}

/// Everything texture loading needs besides the backend.
pub(crate) struct TextureLoad<'a, B: Backend> {
    pub cache: &'a mut TextureCache<B>,
    pub scene: &'a Scene,
    pub directory: &'a Path,
    pub gamma: bool,
    pub wrap: WrapMode,
}

impl<B: Backend> TextureLoad<'_, B> {
    /// Resolve every texture of `material` found in `slots` as `kind`,
    /// reusing textures this model already loaded.
    pub fn load_material_textures(
        &mut self,
        backend: &mut B,
        material: &SceneMaterial,
        slots: &[MaterialSlot],
        kind: TextureKind,
    ) -> Vec<Texture<B>> {
        let mut textures = Vec::new();
        for slot in slots {
            for path in material.textures(*slot) {
                if let Some(texture) = self.cache.get(path) {
                    textures.push(texture.clone());
                    continue;
                }
                let handle = self.texture_from_file(backend, path, kind);
                let texture = self.cache.insert(Texture {
                    handle,
                    kind,
                    path: path.clone(),
                });
                textures.push(texture.clone());
            }
        }
        textures
    }

    /// Decode and upload one texture. On failure the texture is still created,
    /// just without contents.
    fn texture_from_file(&self, backend: &mut B, path: &str, kind: TextureKind) -> B::Texture {
        let srgb = self.gamma && kind == TextureKind::Diffuse;
        match load_texture_image(path, self.directory, self.scene, srgb, self.wrap) {
            Ok(image) => backend.create_texture(path, Some(&image)),
            Err(e) => {
                log::error!("Texture failed to load at path: {path}: {e}");
                backend.create_texture(path, None)
            }
        }
    }
}

/// Decode the image `reference` points at: an embedded `*<index>` image or a
/// file relative to `directory`.
pub fn load_texture_image(
    reference: &str,
    directory: &Path,
    scene: &Scene,
    srgb: bool,
    wrap: WrapMode,
) -> Result<TextureImage, TextureError> {
    let img = if reference.starts_with('*') {
        let embedded = scene
            .embedded(reference)
            .ok_or_else(|| TextureError::MissingEmbedded(reference.to_string()))?;
        let decoded = match embedded
            .mime_type
            .as_deref()
            .and_then(ImageFormat::from_mime_type)
        {
            Some(format) => image::load_from_memory_with_format(&embedded.data, format),
            None => image::load_from_memory(&embedded.data),
        };
        decoded.map_err(|source| TextureError::Decode {
            path: reference.to_string(),
            source,
        })?
    } else {
        let file = directory.join(canonical_path(reference));
        image::open(&file).map_err(|source| TextureError::Decode {
            path: file.display().to_string(),
            source,
        })?
    };
    texture_image(img, reference, srgb, wrap)
}

/// Convert a decoded image to 8-bit pixels in the format its channel count maps to.
pub fn texture_image(
    img: DynamicImage,
    path: &str,
    srgb: bool,
    wrap: WrapMode,
) -> Result<TextureImage, TextureError> {
    let channels = img.color().channel_count();
    let format = PixelFormat::from_channels(channels).ok_or_else(|| {
        TextureError::UnsupportedChannels {
            path: path.to_string(),
            channels,
        }
    })?;
    let (width, height) = (img.width(), img.height());
    let pixels = match format {
        PixelFormat::R8 => img.into_luma8().into_raw(),
        PixelFormat::Rgb8 => img.into_rgb8().into_raw(),
        PixelFormat::Rgba8 => img.into_rgba8().into_raw(),
    };
    Ok(TextureImage {
        width,
        height,
        format,
        pixels,
        srgb,
        wrap,
    })
}
