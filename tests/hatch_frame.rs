//! A full frame through the CPU hatch evaluator: a dark box on a white background, the way
//! the color and normal passes leave it for an ambient-lit cube seen face-on.

use crosshatch::hatch::reference::{HatchInputs, ImageSampler, Solid, Wrap, render_frame};
use crosshatch::{HatchParams, Lighting, Vec4};
use image::{Rgba, RgbaImage};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;
const PAPER: [f32; 3] = [0.95, 0.92, 0.85];

fn inside_box(x: u32, y: u32) -> bool {
    (300..500).contains(&x) && (200..400).contains(&y)
}

fn to_byte(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Color pass: white clear, box shaded by ambient light alone.
fn color_pass() -> RgbaImage {
    let albedo = 0.05;
    let shade = Lighting::ambient([1.0, 1.0, 1.0], 0.35)
        .ambient_radiance()
        .map(|c| to_byte(c * albedo));
    RgbaImage::from_fn(WIDTH, HEIGHT, |x, y| {
        if inside_box(x, y) {
            Rgba([shade[0], shade[1], shade[2], 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    })
}

/// Normal pass: white clear, the box's front face pointing at the camera.
fn normal_pass() -> RgbaImage {
    RgbaImage::from_fn(WIDTH, HEIGHT, |x, y| {
        if inside_box(x, y) {
            Rgba([128, 128, 255, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    })
}

fn render(params: &HatchParams) -> RgbaImage {
    let color = ImageSampler::new(color_pass(), Wrap::Clamp);
    let normal = ImageSampler::new(normal_pass(), Wrap::Clamp);
    let paper = Solid(Vec4::new(PAPER[0], PAPER[1], PAPER[2], 1.0));
    let noise = Solid(Vec4::splat(0.5));
    let inputs = HatchInputs {
        color: &color,
        normal: &normal,
        paper: &paper,
        noise: &noise,
    };
    render_frame(&inputs, params, WIDTH, HEIGHT)
}

fn assert_rgb(frame: &RgbaImage, x: u32, y: u32, expected: [u8; 3]) {
    let got = frame.get_pixel(x, y).0;
    for (channel, (g, e)) in got.iter().zip(expected).enumerate() {
        assert!(
            g.abs_diff(e) <= 1,
            "pixel ({x}, {y}) channel {channel}: got {got:?}, expected {expected:?}"
        );
    }
    assert_eq!(got[3], 255);
}

#[test]
fn box_is_inked_outlined_and_surrounded_by_paper() {
    let params = HatchParams::default();
    let frame = render(&params);

    let paper = PAPER.map(to_byte);
    let ink = params.ink_color.map(|c| c as u8);
    let edge = params.edge_color.map(|c| c as u8);

    for (x, y) in [(10, 10), (790, 590), (100, 300), (700, 100), (400, 550)] {
        assert_rgb(&frame, x, y, paper);
    }
    for (x, y) in [(400, 300), (350, 250), (450, 350)] {
        assert_rgb(&frame, x, y, ink);
    }
    for (x, y) in [(300, 300), (400, 200), (499, 300)] {
        assert_rgb(&frame, x, y, edge);
    }
}

#[test]
fn without_overlay_the_silhouette_is_plain_ink() {
    let params = HatchParams {
        edge_overlay: false,
        ..HatchParams::default()
    };
    let frame = render(&params);

    assert_rgb(&frame, 300, 300, params.ink_color.map(|c| c as u8));
    assert_rgb(&frame, 10, 10, PAPER.map(to_byte));
}
