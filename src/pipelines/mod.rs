//! Shader programs and the pieces needed to run them on wgpu.
//!
//! - `basic` creates the render pipeline for a linked GLSL program
//! - `reflect` compiles GLSL with naga and checks/merges stage interfaces
//! - `shader` is the backend independent [`shader::ShaderProgram`]
//! - `uniform` describes uniform values and their std140 packing

pub mod basic;
pub mod reflect;
pub mod shader;
pub mod uniform;
