//! GPU textures and texture creation utilities.
//!
//! This module provides [`GpuTexture`], the wgpu backend's texture handle, and
//! helpers for creating depth textures, blank placeholders and mipmapped
//! textures from decoded image data.

use image::{ImageBuffer, Luma, Rgb, Rgba, imageops::FilterType};

use crate::backend::{Handle, PixelFormat, TextureImage, WrapMode};

/// A GPU texture with a view and optional sampler.
///
/// Cloning shares the underlying GPU resources; they are released once the
/// last clone is dropped.
#[derive(Clone, Debug)]
pub struct GpuTexture {
    pub id: u32,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Handle for GpuTexture {
    fn id(&self) -> u32 {
        self.id
    }
}

impl GpuTexture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// # Arguments
    ///
    /// * `size` is [width, height] of the texture in pixels
    /// * `label` is used as a debug label for the GPU resource
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            id: 0,
            texture,
            view,
            sampler: None,
        }
    }

    /// A 1x1 texture that never receives any data. Stands in for textures
    /// that failed to decode.
    pub fn blank(device: &wgpu::Device, id: u32, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            id,
            texture,
            view,
            sampler: Some(create_sampler(device, WrapMode::Repeat)),
        }
    }

    /// Upload `image` with a full mip chain and a linear, mipmapped sampler.
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        id: u32,
        image: &TextureImage,
        label: &str,
    ) -> Self {
        let format = texture_format(image.format, image.srgb);
        let levels = mip_chain(image);
        let width = image.width.max(1);
        let height = image.height.max(1);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: levels.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let bytes_per_pixel = upload_channels(image.format);
        for (mip_level, level) in levels.iter().enumerate() {
            let size = wgpu::Extent3d {
                width: level.width,
                height: level.height,
                depth_or_array_layers: 1,
            };
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &texture,
                    mip_level: mip_level as u32,
                    origin: wgpu::Origin3d::ZERO,
                },
                &level.pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_pixel * level.width),
                    rows_per_image: Some(level.height),
                },
                size,
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            id,
            texture,
            view,
            sampler: Some(create_sampler(device, image.wrap)),
        }
    }
}

pub fn create_sampler(device: &wgpu::Device, wrap: WrapMode) -> wgpu::Sampler {
    let address_mode = match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
    };
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Linear,
        ..Default::default()
    })
}

/// There is no 3 channel 8-bit format on the GPU, so RGB data is padded to RGBA.
pub fn texture_format(format: PixelFormat, srgb: bool) -> wgpu::TextureFormat {
    match (format, srgb) {
        (PixelFormat::R8, _) => wgpu::TextureFormat::R8Unorm,
        (PixelFormat::Rgb8 | PixelFormat::Rgba8, true) => wgpu::TextureFormat::Rgba8UnormSrgb,
        (PixelFormat::Rgb8 | PixelFormat::Rgba8, false) => wgpu::TextureFormat::Rgba8Unorm,
    }
}

fn upload_channels(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::R8 => 1,
        PixelFormat::Rgb8 | PixelFormat::Rgba8 => 4,
    }
}

/// Downscale `image` so that neither side exceeds `max_dimension`, keeping the
/// aspect ratio. Returns `None` when the image already fits.
pub fn fit_to_limit(image: &TextureImage, max_dimension: u32) -> Option<TextureImage> {
    let (width, height) = (image.width.max(1), image.height.max(1));
    let largest = width.max(height);
    if largest <= max_dimension {
        return None;
    }
    let scale = |side: u32| {
        (u64::from(side) * u64::from(max_dimension) / u64::from(largest)).max(1) as u32
    };
    let (fitted_width, fitted_height) = (scale(width), scale(height));
    let pixels = match image.format {
        PixelFormat::R8 => resize_raw::<Luma<u8>>(image, fitted_width, fitted_height),
        PixelFormat::Rgb8 => resize_raw::<Rgb<u8>>(image, fitted_width, fitted_height),
        PixelFormat::Rgba8 => resize_raw::<Rgba<u8>>(image, fitted_width, fitted_height),
    };
    Some(TextureImage {
        width: fitted_width,
        height: fitted_height,
        format: image.format,
        pixels,
        srgb: image.srgb,
        wrap: image.wrap,
    })
}

fn resize_raw<P>(image: &TextureImage, width: u32, height: u32) -> Vec<u8>
where
    P: image::Pixel<Subpixel = u8> + 'static,
{
    let base = ImageBuffer::<P, &[u8]>::from_raw(
        image.width.max(1),
        image.height.max(1),
        image.pixels.as_slice(),
    );
    match base {
        Some(base) => image::imageops::resize(&base, width, height, FilterType::Triangle).into_raw(),
        None => vec![0; (width * height) as usize * usize::from(P::CHANNEL_COUNT)],
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Base level plus every downscaled level down to 1x1, in upload layout.
pub fn mip_chain(image: &TextureImage) -> Vec<MipLevel> {
    let (width, height) = (image.width.max(1), image.height.max(1));
    match image.format {
        PixelFormat::R8 => {
            let base = ImageBuffer::<Luma<u8>, _>::from_raw(width, height, image.pixels.clone())
                .unwrap_or_else(|| ImageBuffer::new(width, height));
            downscale(base)
        }
        PixelFormat::Rgb8 => {
            let rgba: Vec<u8> = image
                .pixels
                .chunks_exact(3)
                .flat_map(|pixel| [pixel[0], pixel[1], pixel[2], u8::MAX])
                .collect();
            let base = ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba)
                .unwrap_or_else(|| ImageBuffer::new(width, height));
            downscale(base)
        }
        PixelFormat::Rgba8 => {
            let base = ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, image.pixels.clone())
                .unwrap_or_else(|| ImageBuffer::new(width, height));
            downscale(base)
        }
    }
}

fn downscale<P>(base: ImageBuffer<P, Vec<u8>>) -> Vec<MipLevel>
where
    P: image::Pixel<Subpixel = u8> + 'static,
{
    let mut levels = Vec::new();
    let (mut width, mut height) = base.dimensions();
    let mut current = base;
    loop {
        let next_size = (width.div_ceil(2).max(1), height.div_ceil(2).max(1));
        let done = width == 1 && height == 1;
        let next = (!done)
            .then(|| image::imageops::resize(&current, next_size.0, next_size.1, FilterType::Triangle));
        levels.push(MipLevel {
            width,
            height,
            pixels: current.into_raw(),
        });
        match next {
            Some(next) => {
                (width, height) = next_size;
                current = next;
            }
            None => break,
        }
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(width: u32, height: u32, format: PixelFormat) -> TextureImage {
        TextureImage {
            width,
            height,
            format,
            pixels: vec![200; (width * height * format.channels() as u32) as usize],
            srgb: false,
            wrap: WrapMode::Repeat,
        }
    }

    #[test]
    fn mip_chain_reaches_one_pixel() {
        let levels = mip_chain(&image(8, 4, PixelFormat::Rgba8));
        let sizes: Vec<_> = levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, vec![(8, 4), (4, 2), (2, 1), (1, 1)]);
    }

    #[test]
    fn rgb_levels_are_padded_to_rgba() {
        let levels = mip_chain(&image(2, 2, PixelFormat::Rgb8));
        assert_eq!(levels[0].pixels.len(), 16);
        assert_eq!(levels[0].pixels[3], u8::MAX);
    }

    #[test]
    fn single_channel_stays_single_channel() {
        let levels = mip_chain(&image(4, 4, PixelFormat::R8));
        assert_eq!(levels[0].pixels.len(), 16);
        assert_eq!(levels.last().unwrap().pixels.len(), 1);
        assert_eq!(texture_format(PixelFormat::R8, true), wgpu::TextureFormat::R8Unorm);
    }

    #[test]
    fn gamma_selects_srgb_formats() {
        assert_eq!(
            texture_format(PixelFormat::Rgb8, true),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
        assert_eq!(
            texture_format(PixelFormat::Rgba8, false),
            wgpu::TextureFormat::Rgba8Unorm
        );
    }

    #[test]
    fn oversized_images_are_fitted_to_the_limit() {
        let fitted = fit_to_limit(&image(40, 10, PixelFormat::Rgb8), 16).unwrap();
        assert_eq!((fitted.width, fitted.height), (16, 4));
        assert_eq!(fitted.pixels.len(), 16 * 4 * 3);
        assert_eq!(fitted.format, PixelFormat::Rgb8);

        let thin = fit_to_limit(&image(40, 1, PixelFormat::R8), 16).unwrap();
        assert_eq!((thin.width, thin.height), (16, 1));
        assert!(fit_to_limit(&image(16, 16, PixelFormat::Rgba8), 16).is_none());
    }
}
