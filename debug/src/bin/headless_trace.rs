//! Runs one frame against the recording executor and prints the command stream.
//! No GPU needed. Run: cargo run -p debug --bin headless_trace

use std::collections::BTreeMap;

use ember_renderer::{Capabilities, ClearFlags, Context, Topology};
use render_api::{Call, RecordingExecutor};

fn call_name(call: &Call) -> String {
    let debug = format!("{call:?}");
    debug.split([' ', '(', '{']).next().unwrap_or_default().to_string()
}

fn main() -> anyhow::Result<()> {
    debug::init_logging();
    let mut ctx = Context::new();
    if ctx.create(Box::new(RecordingExecutor::new(320, 240))) == 0 {
        debug::check(&ctx)?;
    }
    let setup_calls = ctx.executor_as::<RecordingExecutor>().map_or(0, |e| e.calls().len());

    ctx.clear(ClearFlags::ALL);
    ctx.set_3d_view_proj([0.0, 2.0, -5.0], [0.0; 3], [0.0, 1.0, 0.0], 60.0, 0.1, 100.0);
    ctx.enable(Capabilities::LIGHTING | Capabilities::DEPTH_TEST | Capabilities::DEPTH_WRITE);
    ctx.color3(0.8, 0.3, 0.2);
    ctx.sphere(1.0, 12, 6, 1.0);
    ctx.begin(Topology::Ambients);
    ctx.color3(0.1, 0.1, 0.1);
    ctx.position2(0.0, 0.0);
    ctx.end();
    ctx.radius(6.0);
    ctx.color3(1.0, 1.0, 1.0);
    ctx.begin(Topology::Omnis);
    ctx.position3(2.0, 2.0, -2.0);
    ctx.end();
    ctx.enable(Capabilities::HDR | Capabilities::BLOOM);
    ctx.post_process();
    ctx.swap();
    debug::check(&ctx)?;

    let exec = ctx.executor_as::<RecordingExecutor>().ok_or_else(|| anyhow::anyhow!("no recording executor"))?;
    let frame = &exec.calls()[setup_calls..];
    let mut histogram: BTreeMap<String, usize> = BTreeMap::new();
    for call in frame {
        *histogram.entry(call_name(call)).or_default() += 1;
    }
    log::info!("device setup issued {setup_calls} calls, the frame {}", frame.len());
    for (name, count) in &histogram {
        println!("{count:>5}  {name}");
    }
    for (i, draw) in exec.draws().iter().enumerate() {
        println!(
            "draw {i:>2}: {:>5} vertices  {:?}  -> {} target(s)",
            draw.vertex_count,
            draw.programs.map(|p| p.1),
            draw.targets.len()
        );
    }
    Ok(())
}
