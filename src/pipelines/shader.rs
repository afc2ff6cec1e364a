//! Shader programs built from source files.
//!
//! [`ShaderProgram::build`] never fails: whatever goes wrong is logged and
//! kept in [`ShaderProgram::diagnostics`], and a program handle is returned
//! regardless. [`ShaderProgram::try_build`] turns the first problem into an
//! error instead.

use std::{fmt, path::Path};

use crate::{
    backend::{Backend, Handle, ShaderStage},
    error::ShaderError,
    pipelines::uniform::UniformValue,
};

pub struct ShaderProgram<B: Backend> {
    program: B::Program,
    diagnostics: Vec<ShaderError>,
    linked: bool,
}

impl<B: Backend> ShaderProgram<B> {
    /// Read, compile and link the given stages. Always returns a program.
    pub fn build(
        backend: &mut B,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
        geometry_path: Option<&Path>,
    ) -> Self {
        let vertex_path = vertex_path.as_ref();
        let fragment_path = fragment_path.as_ref();
        let label = vertex_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "shader program".to_string());
        let mut program = backend.create_program(&label);

        let mut paths = vec![
            (ShaderStage::Vertex, vertex_path),
            (ShaderStage::Fragment, fragment_path),
        ];
        if let Some(geometry_path) = geometry_path {
            paths.push((ShaderStage::Geometry, geometry_path));
        }

        let sources = match read_sources(&paths) {
            Ok(sources) => sources,
            Err(e) => {
                log::error!("{e}");
                return Self {
                    program,
                    diagnostics: vec![e],
                    linked: false,
                };
            }
        };

        let mut diagnostics = Vec::new();
        let mut stages = Vec::new();
        for (stage, source) in sources {
            match backend.compile_stage(stage, &source) {
                Ok(compiled) => stages.push(compiled),
                Err(log) => {
                    let e = ShaderError::Compile { stage, log };
                    log::error!("{e}");
                    diagnostics.push(e);
                }
            }
        }

        let linked = match backend.link_program(&mut program, stages) {
            Ok(()) => true,
            Err(log) => {
                let e = ShaderError::Link { log };
                log::error!("{e}");
                diagnostics.push(e);
                false
            }
        };
        if linked {
            log::debug!("linked shader program {} ({label})", program.id());
        }

        Self {
            program,
            diagnostics,
            linked,
        }
    }

    /// Like [`ShaderProgram::build`], but returns the first problem as an error.
    pub fn try_build(
        backend: &mut B,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
        geometry_path: Option<&Path>,
    ) -> Result<Self, ShaderError> {
        let mut program = Self::build(backend, vertex_path, fragment_path, geometry_path);
        if program.diagnostics.is_empty() {
            Ok(program)
        } else {
            Err(program.diagnostics.swap_remove(0))
        }
    }

    pub fn handle(&self) -> &B::Program {
        &self.program
    }

    pub fn id(&self) -> u32 {
        self.program.id()
    }

    /// Whether compile and link succeeded.
    pub fn is_linked(&self) -> bool {
        self.linked && self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[ShaderError] {
        &self.diagnostics
    }

    pub fn set(&self, backend: &mut B, name: &str, value: impl Into<UniformValue>) {
        backend.set_uniform(&self.program, name, value.into());
    }

    /// Uploaded as a 32-bit integer. Uniform blocks cannot hold `bool` members
    /// on the wgpu backend (naga rejects them as not host-shareable), so there
    /// this reaches `int` or `uint` members.
    pub fn set_bool(&self, backend: &mut B, name: &str, value: bool) {
        self.set(backend, name, value);
    }

    pub fn set_int(&self, backend: &mut B, name: &str, value: i32) {
        self.set(backend, name, value);
    }

    pub fn set_float(&self, backend: &mut B, name: &str, value: f32) {
        self.set(backend, name, value);
    }

    pub fn set_vec2(&self, backend: &mut B, name: &str, value: impl Into<[f32; 2]>) {
        self.set(backend, name, UniformValue::Vec2(value.into()));
    }

    pub fn set_vec2_xy(&self, backend: &mut B, name: &str, x: f32, y: f32) {
        self.set(backend, name, UniformValue::Vec2([x, y]));
    }

    pub fn set_vec3(&self, backend: &mut B, name: &str, value: impl Into<[f32; 3]>) {
        self.set(backend, name, UniformValue::Vec3(value.into()));
    }

    pub fn set_vec3_xyz(&self, backend: &mut B, name: &str, x: f32, y: f32, z: f32) {
        self.set(backend, name, UniformValue::Vec3([x, y, z]));
    }

    pub fn set_vec4(&self, backend: &mut B, name: &str, value: impl Into<[f32; 4]>) {
        self.set(backend, name, UniformValue::Vec4(value.into()));
    }

    pub fn set_vec4_xyzw(&self, backend: &mut B, name: &str, x: f32, y: f32, z: f32, w: f32) {
        self.set(backend, name, UniformValue::Vec4([x, y, z, w]));
    }

    /// On the wgpu backend naga refuses `mat2` members inside std140 uniform
    /// blocks, so this only reaches a standalone `uniform mat2`.
    pub fn set_mat2(&self, backend: &mut B, name: &str, value: impl Into<[[f32; 2]; 2]>) {
        self.set(backend, name, UniformValue::Mat2(value.into()));
    }

    pub fn set_mat3(&self, backend: &mut B, name: &str, value: impl Into<[[f32; 3]; 3]>) {
        self.set(backend, name, UniformValue::Mat3(value.into()));
    }

    pub fn set_mat4(&self, backend: &mut B, name: &str, value: impl Into<[[f32; 4]; 4]>) {
        self.set(backend, name, UniformValue::Mat4(value.into()));
    }
}

impl<B: Backend> fmt::Debug for ShaderProgram<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("program", &self.program)
            .field("linked", &self.is_linked())
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

/// Read every stage source. Stops at the first file that cannot be read.
fn read_sources(paths: &[(ShaderStage, &Path)]) -> Result<Vec<(ShaderStage, String)>, ShaderError> {
    paths
        .iter()
        .map(|(stage, path)| {
            std::fs::read_to_string(path)
                .map(|source| (*stage, source))
                .map_err(|e| ShaderError::Read {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
        })
        .collect()
}
