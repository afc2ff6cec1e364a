//! The seam between model/shader orchestration and the graphics API.
//!
//! Loaders and program builders only talk to a [`Backend`]. [`gpu::WgpuBackend`]
//! is the wgpu implementation; tests plug in their own recording backend.
//!
//! Handles returned by a backend own their GPU resource: dropping the last
//! clone releases it.

use std::fmt;

use crate::{data_structures::model::Vertex, pipelines::uniform::UniformValue};

pub mod gpu;

/// Something a backend hands out that carries a stable integer id.
pub trait Handle {
    fn id(&self) -> u32;
}

/// Graphics API used by the model loader and the shader program builder.
///
/// Every call is synchronous and assumes the backend is only used from the
/// thread that created it.
pub trait Backend {
    type Texture: Handle + Clone + fmt::Debug;
    type Mesh: fmt::Debug;
    type Stage;
    type Program: Handle + fmt::Debug;
    type Frame<'f>;

    /// Create a 2D texture. `None` creates a texture with undefined contents.
    fn create_texture(&mut self, label: &str, image: Option<&TextureImage>) -> Self::Texture;

    /// Upload vertex and index buffers for one mesh.
    fn create_mesh(&mut self, label: &str, vertices: &[Vertex], indices: &[u32]) -> Self::Mesh;

    /// Compile a single shader stage. `Err` carries the backend's diagnostic text.
    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> Result<Self::Stage, String>;

    /// Create an empty, unlinked program object.
    fn create_program(&mut self, label: &str) -> Self::Program;

    /// Link the compiled stages into `program`. The stages are consumed.
    fn link_program(
        &mut self,
        program: &mut Self::Program,
        stages: Vec<Self::Stage>,
    ) -> Result<(), String>;

    /// Upload one uniform value. Unknown names are ignored.
    fn set_uniform(&mut self, program: &Self::Program, name: &str, value: UniformValue);

    /// Draw one mesh with `program`, binding `textures` by uniform name.
    fn draw(
        &mut self,
        frame: &mut Self::Frame<'_>,
        program: &Self::Program,
        mesh: &Self::Mesh,
        textures: &[(String, &Self::Texture)],
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderStage::Vertex => "VERTEX",
            ShaderStage::Fragment => "FRAGMENT",
            ShaderStage::Geometry => "GEOMETRY",
        };
        f.write_str(name)
    }
}

/// Pixel layout of decoded texture data, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    R8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    /// Only single channel, RGB and RGBA images have a matching format.
    pub fn from_channels(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(PixelFormat::R8),
            3 => Some(PixelFormat::Rgb8),
            4 => Some(PixelFormat::Rgba8),
            _ => None,
        }
    }

    pub fn channels(&self) -> u8 {
        match self {
            PixelFormat::R8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    #[default]
    Repeat,
    ClampToEdge,
    MirrorRepeat,
}

/// Decoded pixels ready to be uploaded as the base level of a mipmapped texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
    /// Upload into an sRGB format.
    pub srgb: bool,
    pub wrap: WrapMode,
}
