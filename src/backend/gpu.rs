//! [`Backend`] implementation on top of wgpu.
//!
//! GLSL stages are compiled to naga modules and handed to wgpu directly, so
//! the reflection done at link time describes exactly what the pipeline sees.
//! Every uniform block keeps a CPU copy that setters write into at the
//! member's offset. Each draw uploads a snapshot of those copies, so values set
//! between two draws of one pass only affect the later draw. Bind groups are
//! built per draw from the mesh's textures.

use std::{borrow::Cow, cell::RefCell, collections::HashMap};

use wgpu::util::DeviceExt;

use crate::{
    backend::{Backend, Handle, ShaderStage, TextureImage, WrapMode},
    data_structures::{
        model::Vertex,
        texture::{GpuTexture, create_sampler, fit_to_limit},
    },
    pipelines::{
        basic::{ProgramTarget, mk_render_pipeline},
        reflect::{self, CompiledStage, ProgramLayout, ResourceKind},
        uniform::UniformValue,
    },
};

#[derive(Debug)]
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

#[derive(Debug)]
pub struct GpuProgram {
    id: u32,
    label: String,
    pipeline: Option<wgpu::RenderPipeline>,
    layout: ProgramLayout,
    /// Current contents of every uniform block, keyed by (group, binding).
    uniform_blocks: RefCell<HashMap<(u32, u32), Vec<u8>>>,
}

impl Handle for GpuProgram {
    fn id(&self) -> u32 {
        self.id
    }
}

#[derive(Debug)]
pub struct WgpuBackend {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    target: ProgramTarget,
    next_id: u32,
    fallback: Option<GpuTexture>,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, target: ProgramTarget) -> Self {
        Self {
            device,
            queue,
            target,
            next_id: 1,
            fallback: None,
        }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// 1x1 white texture bound to texture slots a mesh has nothing for.
    fn fallback_texture(&mut self) -> GpuTexture {
        if let Some(texture) = &self.fallback {
            return texture.clone();
        }
        let image = TextureImage {
            width: 1,
            height: 1,
            format: crate::backend::PixelFormat::Rgba8,
            pixels: vec![u8::MAX; 4],
            srgb: false,
            wrap: WrapMode::Repeat,
        };
        let texture = GpuTexture::from_image(&self.device, &self.queue, 0, &image, "fallback texture");
        self.fallback = Some(texture.clone());
        texture
    }
}

impl Backend for WgpuBackend {
    type Texture = GpuTexture;
    type Mesh = GpuMesh;
    type Stage = CompiledStage;
    type Program = GpuProgram;
    type Frame<'f> = wgpu::RenderPass<'f>;

    fn create_texture(&mut self, label: &str, image: Option<&TextureImage>) -> GpuTexture {
        let id = self.next_id();
        let Some(image) = image else {
            return GpuTexture::blank(&self.device, id, label);
        };
        let max_dimension = self.device.limits().max_texture_dimension_2d;
        match fit_to_limit(image, max_dimension) {
            Some(fitted) => {
                log::warn!(
                    "texture {label} is {}x{}, downscaled to {}x{} to fit the device limit of {max_dimension}",
                    image.width,
                    image.height,
                    fitted.width,
                    fitted.height
                );
                GpuTexture::from_image(&self.device, &self.queue, id, &fitted, label)
            }
            None => GpuTexture::from_image(&self.device, &self.queue, id, image, label),
        }
    }

    fn create_mesh(&mut self, label: &str, vertices: &[Vertex], indices: &[u32]) -> GpuMesh {
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Vertex Buffer")),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Index Buffer")),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        GpuMesh {
            vertex_buffer,
            index_buffer,
            num_elements: indices.len() as u32,
        }
    }

    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> Result<CompiledStage, String> {
        reflect::compile_glsl(stage, source)
    }

    fn create_program(&mut self, label: &str) -> GpuProgram {
        GpuProgram {
            id: self.next_id(),
            label: label.to_string(),
            pipeline: None,
            layout: ProgramLayout::default(),
            uniform_blocks: RefCell::new(HashMap::new()),
        }
    }

    fn link_program(
        &mut self,
        program: &mut GpuProgram,
        stages: Vec<CompiledStage>,
    ) -> Result<(), String> {
        let layout = reflect::link(&stages)?;

        // Shaders naga accepts can still be rejected against the render target.
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut vertex_module = None;
        let mut fragment_module = None;
        for stage in stages {
            let module = self
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&format!("{} {}", program.label, stage.stage)),
                    source: wgpu::ShaderSource::Naga(Cow::Owned(stage.module)),
                });
            match stage.stage {
                ShaderStage::Vertex => vertex_module = Some(module),
                ShaderStage::Fragment => fragment_module = Some(module),
                ShaderStage::Geometry => {}
            }
        }
        let (Some(vertex), Some(fragment)) = (vertex_module, fragment_module) else {
            return Err("program needs a vertex and a fragment stage".to_string());
        };

        let pipeline = mk_render_pipeline(&self.device, &program.label, &vertex, &fragment, &self.target);
        if let Some(error) = futures::executor::block_on(scope.pop()) {
            return Err(error.to_string());
        }

        let uniform_blocks = layout
            .resources
            .iter()
            .filter_map(|resource| match &resource.kind {
                ResourceKind::UniformBlock { size, .. } => Some((
                    (resource.group, resource.binding),
                    vec![0; (*size).max(16).next_multiple_of(16) as usize],
                )),
                _ => None,
            })
            .collect();

        program.pipeline = Some(pipeline);
        program.layout = layout;
        program.uniform_blocks = RefCell::new(uniform_blocks);
        Ok(())
    }

    fn set_uniform(&mut self, program: &GpuProgram, name: &str, value: UniformValue) {
        let Some((resource, member)) = program.layout.uniform(name) else {
            log::trace!("program {} has no active uniform {name}", program.id);
            return;
        };
        if member.shape != Some(value.shape()) {
            log::warn!(
                "uniform {name} of program {} does not match a {:?} value",
                program.id,
                value.shape()
            );
            return;
        }
        let mut blocks = program.uniform_blocks.borrow_mut();
        let Some(block) = blocks.get_mut(&(resource.group, resource.binding)) else {
            return;
        };
        let bytes = value.to_bytes();
        let start = member.offset as usize;
        match block.get_mut(start..start + bytes.len()) {
            Some(target) => target.copy_from_slice(&bytes),
            None => log::warn!("uniform {name} of program {} lies outside its block", program.id),
        }
    }

    fn draw(
        &mut self,
        frame: &mut wgpu::RenderPass<'_>,
        program: &GpuProgram,
        mesh: &GpuMesh,
        textures: &[(String, &GpuTexture)],
    ) {
        let Some(pipeline) = &program.pipeline else {
            log::debug!("skipping draw with unlinked program {}", program.id);
            return;
        };
        if mesh.num_elements == 0 {
            return;
        }

        let fallback = self.fallback_texture();
        let default_sampler = textures
            .first()
            .and_then(|(_, texture)| texture.sampler.clone())
            .or_else(|| fallback.sampler.clone())
            .unwrap_or_else(|| create_sampler(&self.device, WrapMode::Repeat));

        let uniform_buffers: HashMap<(u32, u32), wgpu::Buffer> = program
            .uniform_blocks
            .borrow()
            .iter()
            .map(|(&(group, binding), data)| {
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} uniforms {group}:{binding}", program.label)),
                        contents: data,
                        usage: wgpu::BufferUsages::UNIFORM,
                    });
                ((group, binding), buffer)
            })
            .collect();

        frame.set_pipeline(pipeline);
        let last_group = program.layout.groups().last().copied();
        for group in last_group.map_or(0..0, |last| 0..last + 1) {
            let entries: Vec<wgpu::BindGroupEntry> = program
                .layout
                .resources_in(group)
                .filter_map(|resource| {
                    let resource_binding = match &resource.kind {
                        ResourceKind::UniformBlock { .. } => uniform_buffers
                            .get(&(resource.group, resource.binding))?
                            .as_entire_binding(),
                        ResourceKind::Texture => {
                            let texture = textures
                                .iter()
                                .find(|(name, _)| *name == resource.name)
                                .map_or(&fallback, |(_, texture)| *texture);
                            wgpu::BindingResource::TextureView(&texture.view)
                        }
                        ResourceKind::Sampler => wgpu::BindingResource::Sampler(&default_sampler),
                    };
                    Some(wgpu::BindGroupEntry {
                        binding: resource.binding,
                        resource: resource_binding,
                    })
                })
                .collect();
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{} group {group}", program.label)),
                layout: &pipeline.get_bind_group_layout(group),
                entries: &entries,
            });
            frame.set_bind_group(group, &bind_group, &[]);
        }

        frame.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        frame.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        frame.draw_indexed(0..mesh.num_elements, 0, 0..1);
    }
}
