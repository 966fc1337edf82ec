//! Runs only where an adapter is available; otherwise each test returns early.

use ember_bridge::{BridgeConfig, WgpuExecutor};
use ember_renderer::{ClearFlags, Context, Topology};

fn headless(width: u32, height: u32) -> Option<WgpuExecutor> {
    match WgpuExecutor::headless(width, height, BridgeConfig::default()) {
        Ok(exec) => Some(exec),
        Err(e) => {
            eprintln!("skipping: {e}");
            None
        }
    }
}

#[test]
fn cleared_back_buffer_reads_back() {
    let Some(exec) = headless(16, 8) else { return };
    let mut ctx = Context::new();
    let handle = ctx.create(Box::new(exec));
    assert_eq!(handle, 1, "{:?}", ctx.error());
    ctx.clear_color(0.0, 1.0, 0.0, 1.0);
    ctx.clear(ClearFlags::COLOR);
    ctx.swap();

    let exec = ctx.executor_as_mut::<WgpuExecutor>().expect("wgpu executor");
    assert_eq!(exec.frames_presented(), 1);
    let pixels = exec.read_back_buffer().expect("read back");
    assert_eq!(pixels.len(), 16 * 8 * 4);
    assert!(pixels.chunks_exact(4).all(|p| p == [0, 255, 0, 255]));
}

#[test]
fn frame_builds_pipelines_for_each_pass() {
    let Some(exec) = headless(64, 64) else { return };
    let mut ctx = Context::new();
    ctx.create(Box::new(exec));
    ctx.clear(ClearFlags::ALL);
    ctx.set_2d_view_proj(-1.0, 1.0);
    ctx.begin(Topology::Quads);
    ctx.position2(0.0, 0.0);
    ctx.position2(64.0, 0.0);
    ctx.position2(64.0, 64.0);
    ctx.position2(0.0, 64.0);
    ctx.end();
    ctx.begin(Topology::Ambients);
    ctx.position2(0.0, 0.0);
    ctx.end();
    ctx.post_process();
    ctx.swap();

    assert!(ctx.error().is_none(), "{:?}", ctx.error());
    let exec = ctx.executor_as::<WgpuExecutor>().expect("wgpu executor");
    assert!(exec.pipeline_count() >= 3);
}

#[test]
fn resize_is_seen_by_the_core() {
    let Some(mut exec) = headless(32, 32) else { return };
    exec.resize(48, 24);
    let mut ctx = Context::new();
    ctx.create(Box::new(exec));
    let exec = ctx.executor_as::<WgpuExecutor>().expect("wgpu executor");
    assert_eq!(render_api::GpuExecutor::back_buffer_size(exec), (48, 24));
}
