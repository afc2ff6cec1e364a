//! Data structures shared by the loader, the backends and the renderer.
//!
//! - `model` contains vertices, meshes, textures and the [`model::Model`] itself
//! - `scene_graph` is the format independent scene every importer produces
//! - `texture` contains the wgpu texture handle and creation utilities

pub mod model;
pub mod scene_graph;
pub mod texture;
