//! Offscreen render targets and the per-frame render context.

use crate::gpu::GpuContext;
use thiserror::Error;

/// Failures while recording or presenting a frame.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to acquire surface texture: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("target '{label}' is {found:?}, the pass draws {expected:?}")]
    IncompatibleTarget {
        label: String,
        expected: wgpu::TextureFormat,
        found: wgpu::TextureFormat,
    },
    #[error("target '{0}' has no depth attachment")]
    MissingDepth(String),
}

/// Allocation settings of a [`RenderTarget`], preserved across resizes.
///
/// The texel data type is part of the wgpu format (`Rgba8Unorm` is 8-bit RGBA).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetConfig {
    pub format: wgpu::TextureFormat,
    pub wrap_u: wgpu::AddressMode,
    pub wrap_v: wgpu::AddressMode,
    pub min_filter: wgpu::FilterMode,
    pub mag_filter: wgpu::FilterMode,
    pub depth: bool,
    pub stencil: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            format: wgpu::TextureFormat::Rgba8Unorm,
            wrap_u: wgpu::AddressMode::ClampToEdge,
            wrap_v: wgpu::AddressMode::ClampToEdge,
            min_filter: wgpu::FilterMode::Linear,
            mag_filter: wgpu::FilterMode::Linear,
            depth: true,
            stencil: false,
        }
    }
}

impl TargetConfig {
    pub fn with_format(mut self, format: wgpu::TextureFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_depth(mut self, depth: bool) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_stencil(mut self, stencil: bool) -> Self {
        self.stencil = stencil;
        self
    }

    pub fn with_filter(mut self, filter: wgpu::FilterMode) -> Self {
        self.min_filter = filter;
        self.mag_filter = filter;
        self
    }

    pub fn with_wrap(mut self, wrap: wgpu::AddressMode) -> Self {
        self.wrap_u = wrap;
        self.wrap_v = wrap;
        self
    }

    /// Depth attachment format, if any. A stencil request implies a depth buffer.
    pub fn depth_format(&self) -> Option<wgpu::TextureFormat> {
        match (self.depth, self.stencil) {
            (_, true) => Some(wgpu::TextureFormat::Depth24PlusStencil8),
            (true, false) => Some(wgpu::TextureFormat::Depth32Float),
            (false, false) => None,
        }
    }
}

/// Clamp a requested size to a valid extent of at least 1x1.
///
/// Transient zero or negative sizes (a minimized window, a collapsed layout) must never
/// reach wgpu, which rejects empty textures.
pub fn clamp_extent(width: i64, height: i64) -> (u32, u32) {
    let clamp = |v: i64| v.clamp(1, u32::MAX as i64) as u32;
    (clamp(width), clamp(height))
}

/// An offscreen color surface with an optional depth/stencil attachment.
///
/// Rendered into as a color attachment and sampled by later passes. [`resize`](Self::resize)
/// swaps the GPU storage in place; the owner keeps the same `RenderTarget` value and
/// [`generation`](Self::generation) tells dependents the views changed.
pub struct RenderTarget {
    label: String,
    config: TargetConfig,
    width: u32,
    height: u32,
    generation: u64,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    depth_view: Option<wgpu::TextureView>,
    sampler: wgpu::Sampler,
}

impl RenderTarget {
    /// Allocate a target of at least 1x1 pixels.
    pub fn new(gpu: &GpuContext, label: &str, width: u32, height: u32, config: TargetConfig) -> Self {
        let (width, height) = clamp_extent(width as i64, height as i64);
        let (texture, view, depth_view) = Self::allocate(gpu, label, width, height, &config);

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{label} Sampler")),
            address_mode_u: config.wrap_u,
            address_mode_v: config.wrap_v,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: config.mag_filter,
            min_filter: config.min_filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            label: label.to_string(),
            config,
            width,
            height,
            generation: 0,
            texture,
            view,
            depth_view,
            sampler,
        }
    }

    fn allocate(
        gpu: &GpuContext,
        label: &str,
        width: u32,
        height: u32,
        config: &TargetConfig,
    ) -> (wgpu::Texture, wgpu::TextureView, Option<wgpu::TextureView>) {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: config.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let depth_view = config.depth_format().map(|format| {
            let depth = gpu.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&format!("{label} Depth")),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            depth.create_view(&wgpu::TextureViewDescriptor::default())
        });

        (texture, view, depth_view)
    }

    /// Reallocate storage at a new size, keeping every other setting.
    ///
    /// Sizes clamp to 1x1. Resizing to the current size is a no-op.
    pub fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        let (width, height) = clamp_extent(width as i64, height as i64);
        if (width, height) == (self.width, self.height) {
            return;
        }

        let (texture, view, depth_view) =
            Self::allocate(gpu, &self.label, width, height, &self.config);
        self.texture = texture;
        self.view = view;
        self.depth_view = depth_view;
        self.width = width;
        self.height = height;
        self.generation += 1;

        log::debug!("resized target '{}' to {}x{}", self.label, width, height);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    /// Incremented on every reallocation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn depth_view(&self) -> Option<&wgpu::TextureView> {
        self.depth_view.as_ref()
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }
}

/// Resources for recording one frame.
///
/// `screen` is the view the final pass presents into: the acquired surface texture, or a
/// [`RenderTarget`] view when rendering headless. Passes append to `encoder`; the caller
/// submits it once every pass has been recorded, which keeps them in program order.
pub struct RenderContext<'a> {
    pub gpu: &'a GpuContext,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub screen: &'a wgpu::TextureView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_valid_sizes() {
        assert_eq!(clamp_extent(800, 600), (800, 600));
        assert_eq!(clamp_extent(1, 1), (1, 1));
    }

    #[test]
    fn clamp_raises_degenerate_sizes() {
        for (w, h) in [(0, 0), (-5, 10), (10, -5), (0, 600), (i64::MIN, 0)] {
            let (cw, ch) = clamp_extent(w, h);
            assert_eq!(cw, w.max(1) as u32);
            assert_eq!(ch, h.max(1) as u32);
        }
    }

    #[test]
    fn default_config_is_compositing_safe() {
        let config = TargetConfig::default();
        assert_eq!(config.format, wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(config.wrap_u, wgpu::AddressMode::ClampToEdge);
        assert_eq!(config.mag_filter, wgpu::FilterMode::Linear);
        assert!(config.depth);
        assert!(!config.stencil);
        assert_eq!(config.depth_format(), Some(wgpu::TextureFormat::Depth32Float));
    }

    #[test]
    fn stencil_selects_combined_depth_format() {
        let config = TargetConfig::default().with_depth(false).with_stencil(true);
        assert_eq!(config.depth_format(), Some(wgpu::TextureFormat::Depth24PlusStencil8));
        assert_eq!(TargetConfig::default().with_depth(false).depth_format(), None);
    }
}
