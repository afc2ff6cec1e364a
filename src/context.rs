use std::{iter, time::Duration};

use anyhow::Context as _;

use crate::{
    backend::gpu::WgpuBackend,
    data_structures::texture::GpuTexture,
    pipelines::basic::ProgramTarget,
};

/// Format of the off-screen color target.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Headless wgpu device plus an off-screen color and depth target.
#[derive(Debug)]
pub struct Context {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub width: u32,
    pub height: u32,
    color: wgpu::Texture,
    depth_texture: GpuTexture,
}

impl Context {
    pub async fn new(width: u32, height: u32) -> anyhow::Result<Self> {
        let (width, height) = (width.max(1), height.max(1));
        log::debug!("WGPU setup");
        let instance = wgpu::Instance::default();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable graphics adapter")?;
        log::info!("using adapter {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("flow-model device"),
                ..Default::default()
            })
            .await
            .context("failed to create device")?;

        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Off-screen color target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_texture =
            GpuTexture::create_depth_texture(&device, [width, height], "depth_texture");

        Ok(Self {
            device,
            queue,
            width,
            height,
            color,
            depth_texture,
        })
    }

    /// A backend whose programs render into this context's targets.
    pub fn backend(&self) -> WgpuBackend {
        WgpuBackend::new(
            self.device.clone(),
            self.queue.clone(),
            ProgramTarget {
                color_format: COLOR_FORMAT,
                depth_format: Some(GpuTexture::DEPTH_FORMAT),
            },
        )
    }

    /// Clear the targets, record `draw` into a render pass and read the color target back.
    pub async fn render_to_image<F>(
        &self,
        clear: wgpu::Color,
        draw: F,
    ) -> anyhow::Result<image::RgbaImage>
    where
        F: FnOnce(&mut wgpu::RenderPass<'_>),
    {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        let view = self
            .color
            .create_view(&wgpu::TextureViewDescriptor::default());
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            draw(&mut render_pass);
        }

        // Rows of a texture copy have to be 256 byte aligned.
        let unpadded_bytes_per_row = 4 * self.width;
        let bytes_per_row = unpadded_bytes_per_row.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            size: u64::from(bytes_per_row) * u64::from(self.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            label: Some("Readback buffer"),
            mapped_at_creation: false,
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &self.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(iter::once(encoder.finish()));

        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let buffer_slice = output_buffer.slice(..);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(Duration::from_secs(3)),
            })
            .context("device lost while waiting for readback")?;
        rx.receive()
            .await
            .context("readback was cancelled")?
            .context("failed to map readback buffer")?;

        let pixels = {
            let data = buffer_slice.get_mapped_range();
            data.chunks(bytes_per_row as usize)
                .flat_map(|row| &row[..unpadded_bytes_per_row as usize])
                .copied()
                .collect::<Vec<u8>>()
        };
        output_buffer.unmap();

        image::RgbaImage::from_raw(self.width, self.height, pixels)
            .context("readback does not match the target size")
    }
}
