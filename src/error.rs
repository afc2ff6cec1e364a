//! Error types surfaced by the typed loading and building entry points.
//!
//! The best-effort entry points ([`Model::load`](crate::data_structures::model::Model::load),
//! [`ShaderProgram::build`](crate::pipelines::shader::ShaderProgram::build)) log these
//! instead of returning them.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::ShaderStage;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported model format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("glTF import failed: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("OBJ import failed: {0}")]
    Obj(#[from] tobj::LoadError),
    #[error("scene is incomplete: {0}")]
    IncompleteScene(String),
}

#[derive(Error, Debug)]
pub enum TextureError {
    #[error("could not decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("embedded texture {0} does not exist")]
    MissingEmbedded(String),
    #[error("{path} has {channels} channels, no pixel format matches")]
    UnsupportedChannels { path: String, channels: u8 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShaderError {
    #[error("ERROR::SHADER::FILE_NOT_SUCCESFULLY_READ {path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("ERROR::SHADER::{stage}::COMPILATION_FAILED\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("ERROR::SHADER::PROGRAM::LINKING_FAILED\n{log}")]
    Link { log: String },
}
