use std::{
    cell::Cell,
    collections::HashSet,
    path::{Path, PathBuf},
    rc::Rc,
};

use flow_model::{
    Vertex,
    backend::{Backend, Handle, ShaderStage, TextureImage},
    pipelines::uniform::UniformValue,
};

/// Texture record. Bumps the shared drop counter when the last handle goes away.
#[derive(Debug)]
pub struct RecordedTexture {
    pub id: u32,
    pub label: String,
    pub image: Option<TextureImage>,
    drops: Rc<Cell<u32>>,
}

impl Drop for RecordedTexture {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

#[derive(Debug, Clone)]
pub struct TextureHandle(pub Rc<RecordedTexture>);

impl Handle for TextureHandle {
    fn id(&self) -> u32 {
        self.0.id
    }
}

#[derive(Debug)]
pub struct RecordedMesh {
    pub label: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

#[derive(Debug)]
pub struct RecordedProgram {
    pub id: u32,
    pub label: String,
    pub stages: Vec<ShaderStage>,
    pub linked: bool,
}

impl Handle for RecordedProgram {
    fn id(&self) -> u32 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub program: u32,
    pub name: String,
    pub value: UniformValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub program: u32,
    pub mesh: String,
    pub textures: Vec<(String, u32)>,
}

/// Backend that records every call instead of talking to a GPU.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u32,
    pub failing_stages: HashSet<ShaderStage>,
    pub textures: Vec<(String, bool)>,
    pub compiled: Vec<ShaderStage>,
    pub uploads: Vec<Upload>,
    pub texture_drops: Rc<Cell<u32>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiling `stage` reports an error from now on.
    pub fn failing(mut self, stage: ShaderStage) -> Self {
        self.failing_stages.insert(stage);
        self
    }

    /// Textures created with decoded contents.
    pub fn uploads_with_data(&self) -> usize {
        self.textures.iter().filter(|(_, data)| *data).count()
    }

    pub fn dropped_textures(&self) -> u32 {
        self.texture_drops.get()
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl Backend for RecordingBackend {
    type Texture = TextureHandle;
    type Mesh = RecordedMesh;
    type Stage = ShaderStage;
    type Program = RecordedProgram;
    type Frame<'f> = Vec<DrawCall>;

    fn create_texture(&mut self, label: &str, image: Option<&TextureImage>) -> TextureHandle {
        self.textures.push((label.to_string(), image.is_some()));
        TextureHandle(Rc::new(RecordedTexture {
            id: self.next_id(),
            label: label.to_string(),
            image: image.cloned(),
            drops: self.texture_drops.clone(),
        }))
    }

    fn create_mesh(&mut self, label: &str, vertices: &[Vertex], indices: &[u32]) -> RecordedMesh {
        RecordedMesh {
            label: label.to_string(),
            vertices: vertices.to_vec(),
            indices: indices.to_vec(),
        }
    }

    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderStage, String> {
        self.compiled.push(stage);
        if self.failing_stages.contains(&stage) {
            Err(format!("0:1: syntax error in {} bytes", source.len()))
        } else {
            Ok(stage)
        }
    }

    fn create_program(&mut self, label: &str) -> RecordedProgram {
        RecordedProgram {
            id: self.next_id(),
            label: label.to_string(),
            stages: Vec::new(),
            linked: false,
        }
    }

    fn link_program(
        &mut self,
        program: &mut RecordedProgram,
        stages: Vec<ShaderStage>,
    ) -> Result<(), String> {
        program.stages = stages;
        for required in [ShaderStage::Vertex, ShaderStage::Fragment] {
            if !program.stages.contains(&required) {
                return Err(format!("missing {required} stage"));
            }
        }
        program.linked = true;
        Ok(())
    }

    fn set_uniform(&mut self, program: &RecordedProgram, name: &str, value: UniformValue) {
        self.uploads.push(Upload {
            program: program.id,
            name: name.to_string(),
            value,
        });
    }

    fn draw(
        &mut self,
        frame: &mut Vec<DrawCall>,
        program: &RecordedProgram,
        mesh: &RecordedMesh,
        textures: &[(String, &TextureHandle)],
    ) {
        frame.push(DrawCall {
            program: program.id,
            mesh: mesh.label.clone(),
            textures: textures
                .iter()
                .map(|(name, texture)| (name.clone(), texture.id()))
                .collect(),
        });
    }
}

/// Fresh, empty directory under the system temp dir.
pub fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("flow-model-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("failed to create fixture dir");
    dir
}

pub fn write_png(dir: &Path, name: &str, colour: [u8; 3]) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create texture dir");
    }
    image::RgbImage::from_pixel(2, 2, image::Rgb(colour))
        .save(&path)
        .expect("failed to write texture fixture");
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("failed to write fixture");
    path
}

/// A 2x2 PNG of one colour, encoded in memory.
pub fn png_bytes(colour: [u8; 3]) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::RgbImage::from_pixel(2, 2, image::Rgb(colour))
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("failed to encode texture fixture");
    bytes
}
