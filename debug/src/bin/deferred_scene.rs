//! Lit 3D scene from the built-in primitives: ambient plus orbiting omni lights, with HDR,
//! bloom and blur toggles.
//! Run: cargo run -p debug --bin deferred_scene [-- --headless out.png]
//! Keys: h HDR, l bloom, b blur, w wireframe.

use ember_renderer::{Capabilities, ClearFlags, Context, Topology};

struct DeferredScene {
    caps: Capabilities,
}

const LIGHTS: [[f32; 3]; 3] = [[1.0, 0.4, 0.3], [0.3, 1.0, 0.4], [0.4, 0.5, 1.0]];

impl DeferredScene {
    fn toggle(&mut self, cap: Capabilities, name: &str) {
        self.caps.toggle(cap);
        log::info!("{name} {}", if self.caps.contains(cap) { "on" } else { "off" });
    }

    fn floor(ctx: &mut Context) {
        ctx.color3(0.7, 0.7, 0.7);
        ctx.normal(0.0, 1.0, 0.0);
        ctx.begin(Topology::Quads);
        ctx.position3(-8.0, 0.0, 8.0);
        ctx.position3(8.0, 0.0, 8.0);
        ctx.position3(8.0, 0.0, -8.0);
        ctx.position3(-8.0, 0.0, -8.0);
        ctx.end();
    }

    fn objects(ctx: &mut Context, t: f32) {
        ctx.push();
        ctx.translate(-2.5, 1.0, 0.0);
        ctx.rotate(0.0, t * 40.0, 0.0);
        ctx.color3(0.9, 0.9, 0.9);
        ctx.cube(1.0);
        ctx.pop();

        ctx.push();
        ctx.translate(0.0, 1.2, 0.0);
        ctx.color3(0.8, 0.6, 0.3);
        ctx.sphere(1.2, 32, 16, 2.0);
        ctx.pop();

        ctx.push();
        ctx.translate(2.5, 0.0, 0.0);
        ctx.color3(0.4, 0.7, 0.9);
        ctx.cylinder(0.8, 0.4, 2.0, 24, 1.0);
        ctx.pop();

        ctx.push();
        ctx.translate(0.0, 0.0, 3.0);
        ctx.color3(0.9, 0.4, 0.6);
        ctx.tube(1.0, 0.6, 0.5, 32, 1.0);
        ctx.pop();
    }

    fn lights(ctx: &mut Context, t: f32) {
        ctx.begin(Topology::Ambients);
        ctx.color3(0.08, 0.08, 0.1);
        ctx.multiply(1.0);
        ctx.position2(0.0, 0.0);
        ctx.end();

        for (i, color) in LIGHTS.iter().enumerate() {
            let a = t * 0.8 + i as f32 * std::f32::consts::TAU / LIGHTS.len() as f32;
            ctx.color3_v(color);
            ctx.radius(7.0);
            ctx.multiply(2.5);
            ctx.begin(Topology::Omnis);
            ctx.position3(4.0 * a.cos(), 2.0 + 0.5 * (t + i as f32).sin(), 4.0 * a.sin());
            ctx.end();
        }
    }
}

impl debug::Scene for DeferredScene {
    fn frame(&mut self, ctx: &mut Context, (w, h): (u32, u32), t: f32) {
        ctx.viewport(0.0, 0.0, w as f32, h as f32);
        ctx.clear_color(0.0, 0.0, 0.0, 1.0);
        ctx.clear(ClearFlags::ALL);
        let eye = [8.0 * (t * 0.1).sin(), 5.0, -8.0 * (t * 0.1).cos()];
        ctx.set_3d_view_proj(eye, [0.0, 0.5, 0.0], [0.0, 1.0, 0.0], 60.0, 0.1, 100.0);

        ctx.state_push();
        ctx.enable(Capabilities::LIGHTING | Capabilities::DEPTH_TEST | Capabilities::DEPTH_WRITE | Capabilities::CULL);
        if self.caps.contains(Capabilities::WIREFRAME) {
            ctx.enable(Capabilities::WIREFRAME);
        }
        ctx.identity();
        Self::floor(ctx);
        Self::objects(ctx, t);
        ctx.state_pop();

        ctx.identity();
        Self::lights(ctx, t);

        ctx.state_push();
        ctx.enable(self.caps & (Capabilities::HDR | Capabilities::BLOOM | Capabilities::BLUR));
        ctx.blur(10.0);
        ctx.post_process();
        ctx.state_pop();
    }

    fn key(&mut self, key: &str) {
        match key {
            "h" => self.toggle(Capabilities::HDR, "hdr"),
            "l" => self.toggle(Capabilities::BLOOM, "bloom"),
            "b" => self.toggle(Capabilities::BLUR, "blur"),
            "w" => self.toggle(Capabilities::WIREFRAME, "wireframe"),
            _ => {}
        }
    }
}

fn main() -> anyhow::Result<()> {
    debug::init_logging();
    let scene = DeferredScene { caps: Capabilities::HDR };
    match debug::headless_output() {
        Some(path) => debug::run_headless(scene, (800, 600), 1, path.as_ref()),
        None => debug::run_windowed("Ember deferred scene", scene),
    }
}
