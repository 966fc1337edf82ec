#![allow(dead_code)]

use ember_renderer::{Context, EmberConfig, Vertex};
use render_api::{DrawRecord, RecordingExecutor};

pub fn context(width: u32, height: u32) -> (Context, u32) {
    context_with(EmberConfig::default(), width, height)
}

pub fn context_with(config: EmberConfig, width: u32, height: u32) -> (Context, u32) {
    let mut ctx = Context::with_config(config);
    let handle = ctx.create(Box::new(RecordingExecutor::new(width, height)));
    assert_ne!(handle, 0, "device creation failed: {:?}", ctx.error());
    (ctx, handle)
}

pub fn recorder(ctx: &Context) -> &RecordingExecutor {
    ctx.executor_as::<RecordingExecutor>().expect("bound recording executor")
}

pub fn recorder_mut(ctx: &mut Context) -> &mut RecordingExecutor {
    ctx.executor_as_mut::<RecordingExecutor>().expect("bound recording executor")
}

pub fn vertices(draw: &DrawRecord) -> Vec<Vertex> {
    Vertex::decode_all(&draw.vertex_bytes)
}

/// First position component of each drawn vertex, used as a vertex id.
pub fn ids(draw: &DrawRecord) -> Vec<usize> {
    vertices(draw).iter().map(|v| v.position[0] as usize).collect()
}
