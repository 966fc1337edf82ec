//! Screen-space drawing: colored quads, a fan, line strips and points in pixel coordinates.
//! Run: cargo run -p debug --bin immediate_2d [-- --headless out.png]

use ember_renderer::{BlendFactor, Capabilities, ClearFlags, Context, Topology};

struct Immediate2d {
    blur: bool,
}

impl Immediate2d {
    fn checker(ctx: &mut Context, w: f32, h: f32) {
        let cell = 40.0;
        ctx.begin(Topology::Quads);
        let (cols, rows) = ((w / cell) as i32 + 1, (h / cell) as i32 + 1);
        for row in 0..rows {
            for col in 0..cols {
                let shade = if (row + col) % 2 == 0 { 0.18 } else { 0.24 };
                ctx.color3(shade, shade, shade + 0.04);
                let (x, y) = (col as f32 * cell, row as f32 * cell);
                ctx.position2(x, y);
                ctx.position2(x + cell, y);
                ctx.position2(x + cell, y + cell);
                ctx.position2(x, y + cell);
            }
        }
        ctx.end();
    }

    fn flower(ctx: &mut Context, cx: f32, cy: f32, radius: f32, t: f32) {
        let petals = 64;
        ctx.begin(Topology::TriangleFan);
        ctx.color4(1.0, 0.9, 0.3, 1.0);
        ctx.position2(cx, cy);
        for i in 0..=petals {
            let a = i as f32 / petals as f32 * std::f32::consts::TAU;
            let r = radius * (0.75 + 0.25 * (6.0 * a + t).sin());
            ctx.color4(0.9, 0.2 + 0.4 * (a + t).cos().abs(), 0.3, 0.6);
            ctx.position2(cx + r * a.cos(), cy + r * a.sin());
        }
        ctx.end();
    }
}

impl debug::Scene for Immediate2d {
    fn frame(&mut self, ctx: &mut Context, (w, h): (u32, u32), t: f32) {
        let (w, h) = (w as f32, h as f32);
        ctx.viewport(0.0, 0.0, w, h);
        ctx.clear_color(0.05, 0.05, 0.08, 1.0);
        ctx.clear(ClearFlags::ALL);
        ctx.set_2d_view_proj(-1.0, 1.0);

        Self::checker(ctx, w, h);

        ctx.state_push();
        ctx.enable(Capabilities::BLEND);
        ctx.blend_func(BlendFactor::SrcAlpha, BlendFactor::InvSrcAlpha);
        Self::flower(ctx, w * 0.5, h * 0.5, h * 0.3, t);
        ctx.state_pop();

        ctx.begin(Topology::LineStrip);
        ctx.color3(0.3, 0.9, 1.0);
        for i in 0..=200 {
            let x = i as f32 / 200.0 * w;
            ctx.position2(x, h * 0.85 + 30.0 * (x * 0.02 + t * 3.0).sin());
        }
        ctx.end();

        ctx.begin(Topology::LineLoop);
        ctx.color3(1.0, 1.0, 1.0);
        for (x, y) in [(20.0, 20.0), (w - 20.0, 20.0), (w - 20.0, h - 20.0), (20.0, h - 20.0)] {
            ctx.position2(x, y);
        }
        ctx.end();

        ctx.begin(Topology::Points);
        ctx.color3(1.0, 0.4, 0.4);
        for i in 0..50 {
            let a = i as f32 * 0.7 + t;
            ctx.position2(w * 0.5 + a.cos() * (40.0 + i as f32 * 4.0), h * 0.5 + a.sin() * (40.0 + i as f32 * 4.0));
        }
        ctx.end();

        ctx.state_push();
        if self.blur {
            ctx.enable(Capabilities::BLUR);
            ctx.blur(6.0 + 4.0 * t.sin().abs());
        }
        ctx.enable(Capabilities::VIGNETTE);
        ctx.post_process();
        ctx.state_pop();
    }

    fn key(&mut self, key: &str) {
        if key == "b" {
            self.blur = !self.blur;
            log::info!("blur {}", if self.blur { "on" } else { "off" });
        }
    }
}

fn main() -> anyhow::Result<()> {
    debug::init_logging();
    let scene = Immediate2d { blur: false };
    match debug::headless_output() {
        Some(path) => debug::run_headless(scene, (800, 600), 1, path.as_ref()),
        None => debug::run_windowed("Ember immediate 2D (b: blur)", scene),
    }
}
