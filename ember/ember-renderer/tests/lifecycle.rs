mod common;

use common::{context, recorder, recorder_mut};
use ember_renderer::{
    Capabilities, ClearFlags, Components, Context, EmberError, ElementType, PixelFormat, TextureFlags, Topology,
};
use render_api::{Call, GpuExecutor, RecordingExecutor, Released, RenderTarget};

fn release_rank(r: &Released) -> u8 {
    match r {
        Released::Texture(_) => 0,
        Released::Buffer(_) => 1,
        Released::Program(_) => 2,
        Released::State(_) => 3,
    }
}

#[test]
fn create_binds_the_new_device() {
    let (ctx, handle) = context(320, 240);
    assert_eq!(handle, 1);
    assert_eq!(ctx.bound_device(), 1);
    assert!(ctx.current_pass().is_none());
    assert!(recorder(&ctx).live_resources() > 0);
}

#[test]
fn failed_creation_leaves_nothing_bound() {
    for n in [0, 3, 10, 25] {
        let mut ctx = Context::new();
        let handle = ctx.create(Box::new(RecordingExecutor::new(64, 64).fail_creations_after(n)));
        assert_eq!(handle, 0);
        assert_eq!(ctx.bound_device(), 0);
        assert!(matches!(ctx.error(), Some(EmberError::Gpu(_))));
    }
}

#[test]
fn calls_without_a_device_are_noops() {
    let mut ctx = Context::new();
    ctx.begin(Topology::Triangles);
    ctx.position3(0.0, 0.0, 0.0);
    ctx.end();
    ctx.translate(1.0, 0.0, 0.0);
    ctx.swap();
    assert!(!ctx.batch_open());
    assert_eq!(ctx.matrix_depth(), 0);
    assert_eq!(ctx.error(), Some(&EmberError::NoDevice));
}

#[test]
fn destroy_releases_everything_in_teardown_order() {
    let (mut ctx, handle) = context(128, 128);
    let texture = ctx.create_texture_2d(2, 2, &[255; 16], PixelFormat::RGBA8, TextureFlags::empty());
    ctx.enable(Capabilities::BLEND);
    ctx.begin(Topology::Triangles);
    for i in 0..3 {
        ctx.position3(i as f32, 0.0, 0.0);
    }
    ctx.end();
    assert_eq!(texture, 1);

    let exec = ctx.destroy_into_executor(handle).expect("device destroyed");
    let exec = exec.as_any().downcast_ref::<RecordingExecutor>().expect("recording executor");
    assert_eq!(exec.live_resources(), 0);
    let ranks: Vec<u8> = exec.released().iter().map(release_rank).collect();
    assert!(ranks.windows(2).all(|w| w[0] <= w[1]), "release order {ranks:?}");
    assert!(matches!(exec.released()[0], Released::Texture(_)));
    assert_eq!(ctx.bound_device(), 0);
    assert!(ctx.device(handle).is_none());
}

#[test]
fn destroy_during_batch_is_rejected() {
    let (mut ctx, handle) = context(64, 64);
    let texture = ctx.create_texture_2d(1, 1, &[1, 2, 3, 4], PixelFormat::RGBA8, TextureFlags::empty());
    ctx.begin(Topology::Triangles);
    ctx.destroy(handle);

    assert_eq!(ctx.error(), Some(&EmberError::BatchOpen("destroy")));
    assert_eq!(ctx.bound_device(), handle);
    assert!(ctx.batch_open());
    assert_eq!(ctx.texture_count(), 1);
    assert_eq!(texture, 1);
    ctx.end();
}

#[test]
fn invalid_handles_are_rejected() {
    let (mut ctx, handle) = context(64, 64);
    ctx.bind(7);
    assert_eq!(ctx.error(), Some(&EmberError::InvalidDevice(7)));
    assert_eq!(ctx.bound_device(), handle);
    ctx.destroy(0);
    assert_eq!(ctx.error(), Some(&EmberError::InvalidDevice(0)));
    ctx.clear_error();
    assert!(ctx.error().is_none());
}

#[test]
fn bind_switches_devices_but_not_mid_batch() {
    let mut ctx = Context::new();
    let a = ctx.create(Box::new(RecordingExecutor::new(64, 64)));
    let b = ctx.create(Box::new(RecordingExecutor::new(32, 32)));
    assert_eq!((a, b), (1, 2));
    assert_eq!(ctx.bound_device(), b);

    ctx.begin(Topology::Points);
    ctx.bind(a);
    assert_eq!(ctx.bound_device(), b);
    assert_eq!(ctx.error(), Some(&EmberError::BatchOpen("bind")));
    ctx.end();

    ctx.bind(a);
    assert_eq!(ctx.bound_device(), a);
    assert_eq!(recorder(&ctx).back_buffer_size(), (64, 64));
}

#[test]
fn destroyed_slot_is_reused() {
    let mut ctx = Context::new();
    let a = ctx.create(Box::new(RecordingExecutor::new(16, 16)));
    ctx.destroy(a);
    let b = ctx.create(Box::new(RecordingExecutor::new(16, 16)));
    assert_eq!(a, b);
}

#[test]
fn swap_presents_and_resets_stacks() {
    let (mut ctx, _) = context(64, 64);
    ctx.push();
    ctx.push();
    ctx.state_push();
    ctx.swap();
    assert_eq!(ctx.matrix_depth(), 0);
    assert_eq!(ctx.state_depth(), 0);
    assert_eq!(recorder(&ctx).presents(), 1);
}

#[test]
fn swap_mid_batch_is_rejected() {
    let (mut ctx, _) = context(64, 64);
    ctx.begin(Topology::Points);
    ctx.swap();
    assert_eq!(recorder(&ctx).presents(), 0);
    assert_eq!(ctx.error(), Some(&EmberError::BatchOpen("swap")));
    ctx.end();
}

#[test]
fn swap_recreates_targets_after_resize() {
    let (mut ctx, _) = context(64, 64);
    ctx.begin(Topology::Points);
    ctx.end();
    recorder_mut(&mut ctx).resize(128, 96);
    ctx.swap();
    assert!(ctx.current_pass().is_none());
    let created = recorder(&ctx).count(|c| matches!(c, Call::CreateRenderTarget { width: 128, height: 96, .. }));
    assert!(created >= 6, "{created} full-size targets");
}

#[test]
fn clear_targets_follow_flags() {
    let (mut ctx, _) = context(64, 64);
    recorder_mut(&mut ctx).clear_log();
    ctx.clear_color(0.25, 0.5, 0.75, 1.0);
    ctx.clear(ClearFlags::COLOR);
    let exec = recorder(&ctx);
    assert_eq!(exec.count(|c| matches!(c, Call::ClearRenderTarget { .. })), 2);
    assert!(exec.calls().iter().any(|c| matches!(
        c,
        Call::ClearRenderTarget { target: RenderTarget::BackBuffer, color } if *color == [0.25, 0.5, 0.75, 1.0]
    )));

    recorder_mut(&mut ctx).clear_log();
    ctx.clear(ClearFlags::ALL);
    let exec = recorder(&ctx);
    assert_eq!(exec.count(|c| matches!(c, Call::ClearRenderTarget { .. })), 6);
    assert_eq!(exec.count(|c| matches!(c, Call::ClearDepthStencil { .. })), 1);
}

#[test]
fn zero_width_texture_creates_nothing() {
    let (mut ctx, _) = context(64, 64);
    recorder_mut(&mut ctx).clear_log();
    let handle = ctx.create_texture_2d(0, 10, &[0; 40], PixelFormat::RGBA8, TextureFlags::empty());
    assert_eq!(handle, 0);
    assert_eq!(recorder(&ctx).count(|c| matches!(c, Call::CreateTexture { .. })), 0);
    assert_eq!(ctx.error(), Some(&EmberError::EmptyTexture { width: 0, height: 10 }));
    assert_eq!(ctx.texture_count(), 0);
}

#[test]
fn oversized_texture_returns_no_handle() {
    let (mut ctx, _) = context(64, 64);
    recorder_mut(&mut ctx).clear_log();
    let handle = ctx.create_texture_2d(u32::MAX, u32::MAX, &[0; 16], PixelFormat::RGBA8, TextureFlags::empty());
    assert_eq!(handle, 0);
    assert_eq!(recorder(&ctx).count(|c| matches!(c, Call::CreateTexture { .. })), 0);
    assert!(matches!(ctx.error(), Some(EmberError::TextureTooLarge { .. })));
    assert_eq!(ctx.texture_count(), 0);
}

#[test]
fn texture_upload_converts_and_builds_mips() {
    let (mut ctx, _) = context(64, 64);
    let data: Vec<u8> = (0..4u16).flat_map(|v| (v * 0x4000).to_ne_bytes()).collect();
    let format = PixelFormat::new(Components::R, ElementType::U16);
    let handle = ctx.create_texture_2d(2, 2, &data, format, TextureFlags::GENERATE_MIPS);
    assert_eq!(handle, 1);

    ctx.bind_diffuse(handle);
    ctx.begin(Topology::Points);
    ctx.position3(0.0, 0.0, 0.0);
    ctx.end();

    let exec = recorder(&ctx);
    let id = exec.draws()[0].resources[0].expect("diffuse bound");
    let levels = exec.texture_levels(id).unwrap();
    assert_eq!(levels.len(), 2);
    assert_eq!(levels[0], vec![0, 0, 0, 255, 0x40, 0, 0, 255, 0x80, 0, 0, 255, 0xC0, 0, 0, 255]);
    assert_eq!(levels[1], vec![0x60, 0, 0, 255]);
}

#[test]
fn unknown_texture_binding_is_rejected() {
    let (mut ctx, _) = context(64, 64);
    ctx.bind_normal(3);
    assert_eq!(ctx.error(), Some(&EmberError::InvalidTexture(3)));
    ctx.destroy_texture(3);
    ctx.bind_material(0);
}
