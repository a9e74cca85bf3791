use crate::gpu::GpuContext;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures while decoding or uploading a texture.
#[derive(Debug, Error)]
pub enum TextureError {
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("cube face {face} is {got:?}, expected {expected:?}")]
    FaceSize {
        face: usize,
        got: (u32, u32),
        expected: (u32, u32),
    },
    #[error("cube face {face} is not square ({width}x{height})")]
    NotSquare { face: usize, width: u32, height: u32 },
}

/// How a texture is stored and sampled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureOptions {
    /// Store as sRGB so sampling returns linear values. Off for data textures like noise.
    pub srgb: bool,
    pub wrap: wgpu::AddressMode,
    pub filter: wgpu::FilterMode,
}

impl TextureOptions {
    /// Images tiled across the screen and composited as stored (paper).
    pub const TILED: Self = Self {
        srgb: false,
        wrap: wgpu::AddressMode::Repeat,
        filter: wgpu::FilterMode::Linear,
    };

    /// Linear data tiled across the screen (noise).
    pub const DATA: Self = Self {
        srgb: false,
        wrap: wgpu::AddressMode::Repeat,
        filter: wgpu::FilterMode::Linear,
    };

    /// Cube map faces.
    pub const CUBE: Self = Self {
        srgb: true,
        wrap: wgpu::AddressMode::ClampToEdge,
        filter: wgpu::FilterMode::Linear,
    };

    fn format(&self) -> wgpu::TextureFormat {
        if self.srgb {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        }
    }
}

/// A GPU texture that can be bound to shaders: a 2D image or a cube map.
#[derive(Debug)]
pub struct Texture {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Create a 2D texture from raw RGBA data.
    pub fn from_rgba(
        gpu: &GpuContext,
        data: &[u8],
        width: u32,
        height: u32,
        label: &str,
        options: TextureOptions,
    ) -> Self {
        Self::upload(&gpu.device, &gpu.queue, data, width, height, 1, label, options)
    }

    #[allow(clippy::too_many_arguments)]
    fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &[u8],
        width: u32,
        height: u32,
        layers: u32,
        label: &str,
        options: TextureOptions,
    ) -> Self {
        use wgpu::util::DeviceExt;

        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: layers,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: options.format(),
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(if layers == 6 {
                wgpu::TextureViewDimension::Cube
            } else {
                wgpu::TextureViewDimension::D2
            }),
            ..Default::default()
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{} Sampler", label)),
            address_mode_u: options.wrap,
            address_mode_v: options.wrap,
            address_mode_w: options.wrap,
            mag_filter: options.filter,
            min_filter: options.filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            width,
            height,
        }
    }

    /// Upload a decoded image.
    pub fn from_image(
        gpu: &GpuContext,
        img: &image::RgbaImage,
        label: &str,
        options: TextureOptions,
    ) -> Self {
        Self::image_on(&gpu.device, &gpu.queue, img, label, options)
    }

    /// Upload a decoded image through a bare device and queue, for loader threads.
    pub(crate) fn image_on(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &image::RgbaImage,
        label: &str,
        options: TextureOptions,
    ) -> Self {
        let (width, height) = img.dimensions();
        Self::upload(device, queue, img, width, height, 1, label, options)
    }

    /// Load a texture from an image file.
    pub fn from_file(
        gpu: &GpuContext,
        path: impl AsRef<Path>,
        options: TextureOptions,
    ) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let img = image::open(path)?.to_rgba8();
        Ok(Self::from_image(gpu, &img, &path.display().to_string(), options))
    }

    /// Load a texture from embedded bytes.
    pub fn from_bytes(
        gpu: &GpuContext,
        bytes: &[u8],
        label: &str,
        options: TextureOptions,
    ) -> Result<Self, TextureError> {
        let img = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self::from_image(gpu, &img, label, options))
    }

    /// Build a cube map from six square faces ordered +X, -X, +Y, -Y, +Z, -Z.
    pub fn cube_from_faces(
        gpu: &GpuContext,
        faces: &[image::RgbaImage; 6],
        label: &str,
    ) -> Result<Self, TextureError> {
        Self::cube_on(&gpu.device, &gpu.queue, faces, label)
    }

    pub(crate) fn cube_on(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        faces: &[image::RgbaImage; 6],
        label: &str,
    ) -> Result<Self, TextureError> {
        let expected = check_cube_faces(faces)?;
        let data: Vec<u8> = faces.iter().flat_map(|f| f.as_raw().iter().copied()).collect();
        Ok(Self::upload(
            device,
            queue,
            &data,
            expected.0,
            expected.1,
            6,
            label,
            TextureOptions::CUBE,
        ))
    }

    /// Load the six faces of a cube map from files.
    pub fn cube_from_files(
        gpu: &GpuContext,
        paths: &[PathBuf; 6],
        label: &str,
    ) -> Result<Self, TextureError> {
        Self::cube_from_faces(gpu, &decode_faces(paths)?, label)
    }

    /// A 1x1 cube map of a single color, bound when no environment is loaded.
    pub fn solid_cube(gpu: &GpuContext, rgba: [u8; 4]) -> Self {
        let data: Vec<u8> = rgba.iter().copied().cycle().take(24).collect();
        Self::upload(
            &gpu.device,
            &gpu.queue,
            &data,
            1,
            1,
            6,
            "Solid Cube",
            TextureOptions::CUBE,
        )
    }

    /// A 1x1 texture of a single color.
    pub fn solid(gpu: &GpuContext, rgba: [u8; 4], label: &str) -> Self {
        Self::from_rgba(gpu, &rgba, 1, 1, label, TextureOptions::TILED)
    }

    /// Generate a tiling value-noise texture.
    pub fn noise(gpu: &GpuContext, size: u32, seed: u32) -> Self {
        let img = noise_image(size, seed);
        Self::from_image(gpu, &img, "Noise Texture", TextureOptions::DATA)
    }
}

/// Decode six cube faces from disk.
pub(crate) fn decode_faces(paths: &[PathBuf; 6]) -> Result<[image::RgbaImage; 6], TextureError> {
    let mut faces: [image::RgbaImage; 6] = Default::default();
    for (face, path) in faces.iter_mut().zip(paths) {
        *face = image::open(path)?.to_rgba8();
    }
    Ok(faces)
}

/// Faces must be square and share one size, returned as `(width, height)`.
fn check_cube_faces(faces: &[image::RgbaImage; 6]) -> Result<(u32, u32), TextureError> {
    let expected = faces[0].dimensions();
    for (face, img) in faces.iter().enumerate() {
        let (width, height) = img.dimensions();
        if width != height {
            return Err(TextureError::NotSquare {
                face,
                width,
                height,
            });
        }
        if (width, height) != expected {
            return Err(TextureError::FaceSize {
                face,
                got: (width, height),
                expected,
            });
        }
    }
    Ok(expected)
}

/// Per-texel hashed noise in every channel, the lattice that bilinear sampling smooths.
pub fn noise_image(size: u32, seed: u32) -> image::RgbaImage {
    let size = size.max(1);
    image::RgbaImage::from_fn(size, size, |x, y| {
        let r = (hash(x, y, seed) & 0xff) as u8;
        let g = (hash(x, y, seed.wrapping_add(1)) & 0xff) as u8;
        let b = (hash(x, y, seed.wrapping_add(2)) & 0xff) as u8;
        image::Rgba([r, g, b, 255])
    })
}

fn hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_add(x.wrapping_mul(374761393));
    h = h.wrapping_add(y.wrapping_mul(668265263));
    h ^= h >> 13;
    h = h.wrapping_mul(1274126177);
    h ^= h >> 16;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_is_deterministic() {
        assert_eq!(noise_image(16, 7), noise_image(16, 7));
        assert_ne!(noise_image(16, 7), noise_image(16, 8));
    }

    #[test]
    fn noise_covers_the_value_range() {
        let img = noise_image(64, 1);
        let (min, max) = img
            .pixels()
            .fold((255u8, 0u8), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
        assert!(min < 16, "min red {min}");
        assert!(max > 240, "max red {max}");
        assert!(img.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn cube_faces_must_match() {
        let mut faces: [image::RgbaImage; 6] =
            std::array::from_fn(|_| image::RgbaImage::new(4, 4));
        assert_eq!(check_cube_faces(&faces).unwrap(), (4, 4));

        faces[3] = image::RgbaImage::new(8, 8);
        assert!(matches!(
            check_cube_faces(&faces),
            Err(TextureError::FaceSize { face: 3, .. })
        ));

        faces[3] = image::RgbaImage::new(4, 2);
        assert!(matches!(
            check_cube_faces(&faces),
            Err(TextureError::NotSquare { face: 3, .. })
        ));
    }

    #[test]
    fn noise_size_is_at_least_one() {
        assert_eq!(noise_image(0, 3).dimensions(), (1, 1));
    }
}
