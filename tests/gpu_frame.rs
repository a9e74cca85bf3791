//! Frames through the real GPU passes. Needs an adapter, so run with `cargo test -- --ignored`.

use crosshatch::*;
use std::sync::Arc;

fn frame(gpu: &GpuContext, post: &mut HatchPost, scene: &mut Scene, screen: &RenderTarget) {
    let camera = PerspectiveCamera::default();
    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Test Frame"),
        });
    let mut ctx = RenderContext {
        gpu,
        encoder: &mut encoder,
        screen: screen.view(),
    };
    post.render(&mut ctx, scene, &camera).unwrap();
    gpu.queue.submit([encoder.finish()]);
}

#[test]
#[ignore = "needs a GPU adapter"]
fn headless_frames_survive_resize_and_paper_swap() {
    let gpu = GpuContext::headless(64, 48).unwrap();
    assert_eq!(gpu.output_format(), wgpu::TextureFormat::Rgba8Unorm);

    let mut scene = Scene::new();
    let cube = scene.add_mesh(&gpu, &MeshData::cube());
    scene.spawn(cube, StandardMaterial::default().into(), Transform::new());

    let noise = Arc::new(Texture::noise(&gpu, 32, 1));
    let mut post = HatchPost::new(&gpu, 64, 48, HatchParams::default(), noise);
    let config = TargetConfig::default().with_depth(false);
    let mut screen = RenderTarget::new(&gpu, "Test Screen", 64, 48, config);

    gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

    frame(&gpu, &mut post, &mut scene, &screen);
    frame(&gpu, &mut post, &mut scene, &screen);

    post.set_size(&gpu, 32, 24);
    screen.resize(&gpu, 32, 24);
    assert_eq!(post.color_target().generation(), 1);
    assert_eq!(post.normal_target().generation(), 1);
    frame(&gpu, &mut post, &mut scene, &screen);

    post.set_paper(Arc::new(Texture::solid(&gpu, [240, 230, 210, 255], "Test Paper")));
    frame(&gpu, &mut post, &mut scene, &screen);

    let error = pollster::block_on(gpu.device.pop_error_scope());
    assert!(error.is_none(), "{error:?}");
}
