//! CPU evaluation of `shaders/hatch.wgsl`.
//!
//! Every function here has a WGSL counterpart of the same name and operation order, so a
//! frame rendered with [`render_frame`] is what the GPU pass draws for the same inputs, up to
//! texture filtering precision. Textures are read through [`Sampler2d`], which samples like
//! `textureSampleLevel` on a linear sampler.

use super::HatchParams;
use glam::{Mat2, Vec2, Vec3, Vec4};
use image::RgbaImage;
use std::f32::consts::TAU;

pub const LEVELS: u32 = 10;

/// Half-width of the soft step used for edge masks.
pub const AA_WIDTH: f32 = 0.05;

/// Paper texels per output pixel.
pub const PAPER_SCALE: f32 = 0.00025;

pub trait Sampler2d {
    /// Filtered RGBA at normalized `uv`, `(0, 0)` top-left.
    fn sample(&self, uv: Vec2) -> Vec4;

    /// Texture size in texels.
    fn size(&self) -> Vec2;
}

/// A texture of one color.
#[derive(Clone, Copy, Debug)]
pub struct Solid(pub Vec4);

impl Sampler2d for Solid {
    fn sample(&self, _uv: Vec2) -> Vec4 {
        self.0
    }

    fn size(&self) -> Vec2 {
        Vec2::ONE
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wrap {
    Clamp,
    Repeat,
}

/// Bilinear sampling of an 8-bit image, channels read as `0..=1` without color conversion.
pub struct ImageSampler {
    pub image: RgbaImage,
    pub wrap: Wrap,
}

impl ImageSampler {
    pub fn new(image: RgbaImage, wrap: Wrap) -> Self {
        Self { image, wrap }
    }

    fn texel(&self, x: i64, y: i64) -> Vec4 {
        let (w, h) = (self.image.width() as i64, self.image.height() as i64);
        let (x, y) = match self.wrap {
            Wrap::Clamp => (x.clamp(0, w - 1), y.clamp(0, h - 1)),
            Wrap::Repeat => (x.rem_euclid(w), y.rem_euclid(h)),
        };
        let [r, g, b, a] = self.image.get_pixel(x as u32, y as u32).0;
        Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0
    }
}

impl Sampler2d for ImageSampler {
    fn sample(&self, uv: Vec2) -> Vec4 {
        let p = uv * self.size() - 0.5;
        let base = p.floor();
        let t = p - base;
        let (x, y) = (base.x as i64, base.y as i64);

        let top = lerp(self.texel(x, y), self.texel(x + 1, y), t.x);
        let bottom = lerp(self.texel(x, y + 1), self.texel(x + 1, y + 1), t.x);
        lerp(top, bottom, t.y)
    }

    fn size(&self) -> Vec2 {
        Vec2::new(self.image.width() as f32, self.image.height() as f32)
    }
}

/// The four textures the hatch pass reads.
pub struct HatchInputs<'a> {
    pub color: &'a dyn Sampler2d,
    pub normal: &'a dyn Sampler2d,
    pub paper: &'a dyn Sampler2d,
    pub noise: &'a dyn Sampler2d,
}

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: Vec4, b: Vec4, t: f32) -> Vec4 {
    a + (b - a) * t
}

fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Rec. 709 luma.
pub fn luma(rgb: Vec3) -> f32 {
    rgb.dot(Vec3::new(0.2126, 0.7152, 0.0722))
}

/// Round to the nearest of the hatch levels.
pub fn quantize(l: f32) -> f32 {
    (l * LEVELS as f32 + 0.5).floor() / LEVELS as f32
}

pub fn aastep(threshold: f32, value: f32) -> f32 {
    smoothstep(threshold - AA_WIDTH, threshold + AA_WIDTH, value)
}

/// `base` darkened toward `blend` by `opacity`.
pub fn blend_darken(base: Vec3, blend: Vec3, opacity: f32) -> Vec3 {
    base.min(blend) * opacity + base * (1.0 - opacity)
}

fn simplex(noise: &dyn Sampler2d, v: Vec2) -> f32 {
    2.0 * noise.sample(v / 32.0).x - 1.0
}

/// Three octaves of the noise texture, in `-1..=1`.
pub fn fbm3(noise: &dyn Sampler2d, v: Vec2) -> f32 {
    let mut result = simplex(noise, v);
    result += simplex(noise, v * 2.0) / 2.0;
    result += simplex(noise, v * 4.0) / 4.0;
    result / 1.75
}

pub fn noise_offset(noise: &dyn Sampler2d, uv: Vec2, scale: f32, amount: f32) -> Vec2 {
    let p = scale * uv;
    amount * Vec2::new(fbm3(noise, p), fbm3(noise, Vec2::new(p.y, p.x)))
}

/// Per-channel Sobel gradient magnitude with taps `width` texels apart.
pub fn sobel(src: &dyn Sampler2d, uv: Vec2, size: Vec2, width: f32) -> Vec3 {
    let d = Vec2::splat(width) / size;
    let tap = |x: f32, y: f32| src.sample(uv + Vec2::new(x * d.x, y * d.y)).truncate();

    let h = -tap(-1.0, -1.0) - 2.0 * tap(-1.0, 0.0) - tap(-1.0, 1.0)
        + tap(1.0, -1.0)
        + 2.0 * tap(1.0, 0.0)
        + tap(1.0, 1.0);
    let v = -tap(-1.0, -1.0) - 2.0 * tap(0.0, -1.0) - tap(1.0, -1.0)
        + tap(-1.0, 1.0)
        + 2.0 * tap(0.0, 1.0)
        + tap(1.0, 1.0);

    Vec3::new(h.x.hypot(v.x), h.y.hypot(v.y), h.z.hypot(v.z))
}

/// Soft mask of normal discontinuities at `uv`.
pub fn edge(normal: &dyn Sampler2d, uv: Vec2, size: Vec2, width: f32) -> f32 {
    aastep(0.5, sobel(normal, uv, size, width).length())
}

/// One stripe pattern: 1 on paper, 0 on a line.
pub fn lines(l: f32, p: Vec2, resolution: Vec2, thickness: f32) -> f32 {
    let uv = p * resolution;
    let c = 0.5 + 0.5 * (uv.x * 0.5).sin();
    smoothstep(0.49, 0.51, (c + thickness) * l)
}

/// Shaded and edge-darkened luma at `uv0`, in `0..=1`.
pub fn tone(inputs: &HatchInputs, params: &HatchParams, uv0: Vec2, size: Vec2) -> f32 {
    let uv = uv0 + noise_offset(inputs.noise, uv0, params.noise_scale, params.noisiness);

    let l = quantize(luma(inputs.color.sample(uv).truncate()));
    let contour = edge(inputs.normal, uv, size, 3.0 * params.contour);
    (l * (1.0 - contour) * 2.0).clamp(0.0, 1.0)
}

/// The hatch accumulator at `uv0`: 1 where the paper shows, 0 under full ink.
pub fn hatch(inputs: &HatchInputs, params: &HatchParams, uv0: Vec2) -> f32 {
    let size = inputs.color.size();
    let l = tone(inputs, params, uv0, size);

    let mut h = 1.0;
    for i in 0..LEVELS {
        let f = i as f32 / LEVELS as f32;
        if l > f {
            continue;
        }

        let ss = params.noise_scale * mix(1.0, 4.0, f);
        let p = uv0 + noise_offset(inputs.noise, uv0, ss, params.noisiness);

        let a = params.angle + params.divergence * mix(0.0, 3.2 * TAU, f);
        let (s, c) = a.sin_cos();
        let rot = Mat2::from_cols(Vec2::new(c, -s), Vec2::new(s, c));
        let p = rot * (p - 0.5) + 0.5;

        let w = if f == 0.0 { 0.0 } else { l / f };
        h *= lines(w, params.scale * mix(5.0, 1.0, f) * p, size, w * (1.0 - params.thickness));
    }
    h
}

/// Final RGBA of one pixel.
pub fn shade_pixel(inputs: &HatchInputs, params: &HatchParams, uv0: Vec2) -> Vec4 {
    let size = inputs.color.size();
    let h = hatch(inputs, params, uv0);

    let paper = inputs.paper.sample(PAPER_SCALE * uv0 * size).truncate();
    let ink = Vec3::from_array(params.ink_color) / 255.0;
    let mut rgb = blend_darken(paper, ink, 1.0 - h);

    if params.edge_overlay {
        let euv = uv0 + noise_offset(inputs.noise, uv0, params.noise_scale, params.edge_noisiness);
        let e = edge(inputs.normal, euv, size, 3.0 * params.edge_thickness);
        rgb = blend_darken(rgb, Vec3::from_array(params.edge_color) / 255.0, e);
    }

    rgb.extend(1.0)
}

/// Shade every pixel center of a `width` x `height` frame.
pub fn render_frame(inputs: &HatchInputs, params: &HatchParams, width: u32, height: u32) -> RgbaImage {
    let size = Vec2::new(width as f32, height as f32);
    RgbaImage::from_fn(width, height, |x, y| {
        let uv = (Vec2::new(x as f32, y as f32) + 0.5) / size;
        let rgba = shade_pixel(inputs, params, uv);
        image::Rgba(rgba.to_array().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAPER: Vec4 = Vec4::new(0.95, 0.92, 0.85, 1.0);

    fn flat_inputs<'a>(color: &'a Solid, normal: &'a Solid, paper: &'a Solid, noise: &'a Solid) -> HatchInputs<'a> {
        HatchInputs {
            color,
            normal,
            paper,
            noise,
        }
    }

    #[test]
    fn quantize_is_stable_on_levels() {
        for k in 0..=LEVELS {
            let level = k as f32 / LEVELS as f32;
            assert_eq!(quantize(level), quantize(level));
            assert!((quantize(level) - level).abs() < 1e-6);
        }
        assert_eq!(quantize(0.04), 0.0);
        assert_eq!(quantize(0.06), 0.1);
    }

    #[test]
    fn black_frame_is_solid_ink() {
        let (color, normal) = (Solid(Vec4::new(0.0, 0.0, 0.0, 1.0)), Solid(Vec4::new(0.5, 0.5, 1.0, 1.0)));
        let (paper, noise) = (Solid(PAPER), Solid(Vec4::splat(0.5)));
        let inputs = flat_inputs(&color, &normal, &paper, &noise);
        let params = HatchParams::default();

        for uv in [Vec2::new(0.1, 0.2), Vec2::new(0.5, 0.5), Vec2::new(0.9, 0.7)] {
            assert_eq!(hatch(&inputs, &params, uv), 0.0);

            let expected = blend_darken(PAPER.truncate(), Vec3::from_array(params.ink_color) / 255.0, 1.0);
            let got = shade_pixel(&inputs, &params, uv);
            assert!((got.truncate() - expected).abs().max_element() < 1e-6);
            assert_eq!(got.w, 1.0);
        }
    }

    #[test]
    fn white_frame_is_bare_paper() {
        let (color, normal) = (Solid(Vec4::ONE), Solid(Vec4::ONE));
        let (paper, noise) = (Solid(PAPER), Solid(Vec4::splat(0.5)));
        let inputs = flat_inputs(&color, &normal, &paper, &noise);

        let got = shade_pixel(&inputs, &HatchParams::default(), Vec2::new(0.3, 0.6));
        assert!((got - PAPER).abs().max_element() < 1e-6);
    }

    /// A flat 0.4 grey frame: tone 0.8, so bands 0.8 and 0.9 draw lines.
    fn grey_frame() -> ImageSampler {
        ImageSampler::new(
            RgbaImage::from_pixel(200, 100, image::Rgba([102, 102, 102, 255])),
            Wrap::Clamp,
        )
    }

    fn pattern_sum(inputs: &HatchInputs, params: &HatchParams) -> f32 {
        (0..64)
            .map(|k| {
                let uv = (Vec2::new((k % 8) as f32, (k / 8) as f32) + 0.5) / 8.0;
                hatch(inputs, params, uv)
            })
            .sum()
    }

    #[test]
    fn mid_tone_draws_rotated_bands() {
        let color = grey_frame();
        let (normal, paper, noise) = (
            Solid(Vec4::new(0.5, 0.5, 1.0, 1.0)),
            Solid(PAPER),
            Solid(Vec4::splat(0.5)),
        );
        let inputs = HatchInputs {
            color: &color,
            normal: &normal,
            paper: &paper,
            noise: &noise,
        };
        let params = HatchParams::default();
        let size = Vec2::new(200.0, 100.0);
        assert_eq!(tone(&inputs, &params, Vec2::new(0.3, 0.7), size), 0.8);

        let band = |uv: Vec2, f: f32| {
            let a = params.angle + params.divergence * 3.2 * TAU * f;
            let (s, c) = a.sin_cos();
            let d = uv - 0.5;
            let p = Vec2::new(c * d.x + s * d.y, -s * d.x + c * d.y) + 0.5;
            let w = 0.8 / f;
            lines(w, params.scale * (5.0 - 4.0 * f) * p, size, w * (1.0 - params.thickness))
        };

        for (uv, paper_shows) in [(Vec2::new(0.3, 0.7), true), (Vec2::new(0.6, 0.2), false)] {
            let expected = band(uv, 0.8) * band(uv, 0.9);
            let got = hatch(&inputs, &params, uv);
            assert!((got - expected).abs() < 1e-3, "{uv}: {got} vs {expected}");
            let want = if paper_shows { 1.0 } else { 0.0 };
            assert!((got - want).abs() < 1e-3, "{uv}: {got}");
        }
    }

    #[test]
    fn line_parameters_change_the_pattern() {
        let color = grey_frame();
        let (normal, paper, noise) = (
            Solid(Vec4::new(0.5, 0.5, 1.0, 1.0)),
            Solid(PAPER),
            Solid(Vec4::splat(0.5)),
        );
        let inputs = HatchInputs {
            color: &color,
            normal: &normal,
            paper: &paper,
            noise: &noise,
        };
        let base = HatchParams::default();
        let base_sum = pattern_sum(&inputs, &base);
        // partly inked, partly paper
        assert!(base_sum > 10.0 && base_sum < 54.0, "{base_sum}");

        let variants = [
            HatchParams { angle: 0.5, ..base.clone() },
            HatchParams { divergence: 0.3, ..base.clone() },
            HatchParams { scale: 1.3, ..base.clone() },
            HatchParams { thickness: 0.2, ..base.clone() },
        ];
        for params in &variants {
            let sum = pattern_sum(&inputs, params);
            assert!((sum - base_sum).abs() > 0.1, "{params:?}: {sum} vs {base_sum}");
        }
    }

    #[test]
    fn mid_noise_leaves_uv_in_place() {
        let noise = Solid(Vec4::splat(0.5));
        assert_eq!(fbm3(&noise, Vec2::new(3.0, 7.0)), 0.0);
        assert_eq!(noise_offset(&noise, Vec2::new(0.2, 0.8), 0.72, 0.007), Vec2::ZERO);
    }

    #[test]
    fn sobel_finds_a_vertical_step() {
        let image = RgbaImage::from_fn(16, 16, |x, _| {
            if x < 8 {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([128, 128, 255, 255])
            }
        });
        let sampler = ImageSampler::new(image, Wrap::Clamp);
        let size = sampler.size();

        let on_step = Vec2::new(8.0 / 16.0, 8.5 / 16.0);
        assert_eq!(edge(&sampler, on_step, size, 1.2), 1.0);

        let flat = Vec2::new(3.5 / 16.0, 8.5 / 16.0);
        assert_eq!(sobel(&sampler, flat, size, 1.2), Vec3::ZERO);
        assert_eq!(edge(&sampler, flat, size, 1.2), 0.0);
    }

    #[test]
    fn bilinear_hits_texel_centers() {
        let image = RgbaImage::from_fn(4, 2, |x, _| image::Rgba([(x * 60) as u8, 0, 0, 255]));
        let sampler = ImageSampler::new(image, Wrap::Repeat);
        assert_eq!(sampler.sample(Vec2::new(2.5 / 4.0, 0.25)).x, 120.0 / 255.0);
        assert!((sampler.sample(Vec2::new(0.5, 0.25)).x - 90.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn darken_only_darkens() {
        let base = Vec3::new(0.9, 0.2, 0.5);
        let blend = Vec3::new(0.1, 0.8, 0.5);
        assert_eq!(blend_darken(base, blend, 1.0), Vec3::new(0.1, 0.2, 0.5));
        assert_eq!(blend_darken(base, blend, 0.0), base);
    }
}
