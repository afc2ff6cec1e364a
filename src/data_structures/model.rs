//! Model, mesh and vertex types.
//!
//! A [`Model`] is what the loader in [`crate::resources`] produces: meshes in
//! scene visitation order plus the per-model texture cache. All GPU resources
//! are backend handles and are released when the model is dropped.

use std::{fmt, path::Path};

use crate::{
    backend::{Backend, Handle},
    pipelines::shader::ShaderProgram,
    resources::texture::TextureCache,
};

/// Per-vertex attributes, laid out for direct upload.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Float32x3,
        4 => Float32x3
    ];

    /// Vertex buffer layout: position, normal, uv, tangent, bitangent at locations 0 to 4.
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// What a texture is used for. Also the prefix of its sampler name in shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
    Height,
}

impl TextureKind {
    pub const ALL: [TextureKind; 4] = [
        TextureKind::Diffuse,
        TextureKind::Specular,
        TextureKind::Normal,
        TextureKind::Height,
    ];

    pub fn uniform_prefix(&self) -> &'static str {
        match self {
            TextureKind::Diffuse => "texture_diffuse",
            TextureKind::Specular => "texture_specular",
            TextureKind::Normal => "texture_normal",
            TextureKind::Height => "texture_height",
        }
    }
}

impl fmt::Display for TextureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uniform_prefix())
    }
}

/// A loaded texture: backend handle, kind and the path it was loaded from.
pub struct Texture<B: Backend> {
    pub handle: B::Texture,
    pub kind: TextureKind,
    pub path: String,
}

impl<B: Backend> Texture<B> {
    pub fn id(&self) -> u32 {
        self.handle.id()
    }
}

impl<B: Backend> Clone for Texture<B> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            kind: self.kind,
            path: self.path.clone(),
        }
    }
}

impl<B: Backend> fmt::Debug for Texture<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id())
            .field("kind", &self.kind)
            .field("path", &self.path)
            .finish()
    }
}

/// Geometry plus the textures its material references. Immutable once built.
pub struct Mesh<B: Backend> {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    textures: Vec<Texture<B>>,
    gpu: B::Mesh,
}

impl<B: Backend> Mesh<B> {
    /// Upload the geometry and keep the CPU copy around.
    pub fn new(
        backend: &mut B,
        label: &str,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        textures: Vec<Texture<B>>,
    ) -> Self {
        let gpu = backend.create_mesh(label, &vertices, &indices);
        Self {
            vertices,
            indices,
            textures,
            gpu,
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn textures(&self) -> &[Texture<B>] {
        &self.textures
    }

    pub fn gpu(&self) -> &B::Mesh {
        &self.gpu
    }

    /// Sampler names for this mesh's textures, numbered per kind from 1
    /// (`texture_diffuse1`, `texture_diffuse2`, `texture_specular1`, ...).
    pub fn texture_bindings(&self) -> Vec<(String, &B::Texture)> {
        let mut counters = [0u32; TextureKind::ALL.len()];
        self.textures
            .iter()
            .map(|texture| {
                let slot = TextureKind::ALL
                    .iter()
                    .position(|kind| *kind == texture.kind)
                    .unwrap_or(0);
                counters[slot] += 1;
                (
                    format!("{}{}", texture.kind.uniform_prefix(), counters[slot]),
                    &texture.handle,
                )
            })
            .collect()
    }

    pub fn draw(&self, backend: &mut B, frame: &mut B::Frame<'_>, program: &ShaderProgram<B>) {
        let textures = self.texture_bindings();
        backend.draw(frame, program.handle(), &self.gpu, &textures);
    }
}

impl<B: Backend> fmt::Debug for Mesh<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mesh")
            .field("vertices", &self.vertices.len())
            .field("indices", &self.indices.len())
            .field("textures", &self.textures)
            .finish()
    }
}

/// Meshes of one model file, in scene pre-order, with the textures they share.
pub struct Model<B: Backend> {
    pub(crate) meshes: Vec<Mesh<B>>,
    pub(crate) textures_loaded: TextureCache<B>,
    pub(crate) directory: std::path::PathBuf,
    pub(crate) gamma: bool,
}

impl<B: Backend> Model<B> {
    /// A model with no meshes. What a failed [`Model::load`] returns.
    pub fn empty(directory: &Path, gamma: bool) -> Self {
        Self {
            meshes: Vec::new(),
            textures_loaded: TextureCache::default(),
            directory: directory.to_path_buf(),
            gamma,
        }
    }

    pub fn meshes(&self) -> &[Mesh<B>] {
        &self.meshes
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Every distinct texture this model loaded, in load order.
    pub fn textures_loaded(&self) -> &[Texture<B>] {
        self.textures_loaded.as_slice()
    }

    /// Directory relative texture paths were resolved against.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn gamma_correction(&self) -> bool {
        self.gamma
    }

    pub fn draw(&self, backend: &mut B, frame: &mut B::Frame<'_>, program: &ShaderProgram<B>) {
        for mesh in &self.meshes {
            mesh.draw(backend, frame, program);
        }
    }

    /// Human readable report of the loaded textures.
    pub fn info_string(&self) -> String {
        let mut out = String::from("Loaded textures:\n");
        for texture in self.textures_loaded() {
            out.push_str(&format!(
                "Texture {}\n - Type: {}\n - Path: {}\n\n",
                texture.id(),
                texture.kind,
                texture.path
            ));
        }
        out
    }

    /// Print [`Model::info_string`] to stdout.
    pub fn info(&self) {
        print!("{}", self.info_string());
    }
}

impl<B: Backend> fmt::Debug for Model<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("meshes", &self.meshes)
            .field("directory", &self.directory)
            .field("gamma", &self.gamma)
            .finish()
    }
}
