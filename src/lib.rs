//! flow-model
//!
//! Loads 3D model files into GPU-ready meshes and builds shader programs from
//! GLSL source files. Everything that touches the graphics API goes through
//! the [`backend::Backend`] trait; [`backend::gpu::WgpuBackend`] implements it
//! on top of wgpu.
//!
//! High-level modules
//! - `backend`: the graphics API seam and its wgpu implementation
//! - `context`: headless device/queue with an off-screen render target
//! - `data_structures`: vertices, meshes, models, scenes and GPU textures
//! - `error`: error types of the importers, texture decoding and shaders
//! - `pipelines`: shader programs, GLSL reflection and uniform packing
//! - `resources`: scene importers and the model loader
//!

pub mod backend;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod pipelines;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use backend::{Backend, gpu::WgpuBackend};
pub use data_structures::model::{Mesh, Model, Texture, TextureKind, Vertex};
pub use pipelines::shader::ShaderProgram;
pub use resources::{ImportOptions, LoaderConfig, SlotMapping};
pub use cgmath;
pub use wgpu;
