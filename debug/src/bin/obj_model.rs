//! OBJ viewer: loads a mesh with tobj and an optional diffuse texture with image, then draws it
//! as one immediate-mode triangle batch lit by two omni lights.
//! Run: cargo run -p debug --bin obj_model -- model.obj [diffuse.png] [--headless out.png]

use std::path::Path;

use anyhow::Context as _;
use ember_renderer::{Capabilities, ClearFlags, Components, Context, ElementType, PixelFormat, TextureFlags, Topology};

struct Corner {
    position: [f32; 3],
    normal: Option<[f32; 3]>,
    texcoord: [f32; 2],
}

struct ObjModel {
    corners: Vec<Corner>,
    center: [f32; 3],
    scale: f32,
    texture_path: Option<String>,
    diffuse: u32,
}

fn load_obj(path: &Path) -> anyhow::Result<Vec<Corner>> {
    let (models, _) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).with_context(|| format!("loading {}", path.display()))?;
    let mut corners = Vec::new();
    for model in models {
        let mesh = model.mesh;
        for &index in &mesh.indices {
            let i = index as usize;
            let position = [mesh.positions[3 * i], mesh.positions[3 * i + 1], mesh.positions[3 * i + 2]];
            let normal = mesh.normals.get(3 * i..3 * i + 3).map(|n| [n[0], n[1], n[2]]);
            // OBJ texcoords are bottom-up
            let texcoord = mesh.texcoords.get(2 * i..2 * i + 2).map_or([0.0; 2], |t| [t[0], 1.0 - t[1]]);
            corners.push(Corner { position, normal, texcoord });
        }
    }
    anyhow::ensure!(!corners.is_empty(), "{} has no triangles", path.display());
    Ok(corners)
}

/// Center of the bounding box and the scale that fits it into a 4-unit cube.
fn fit(corners: &[Corner]) -> ([f32; 3], f32) {
    let mut lo = [f32::MAX; 3];
    let mut hi = [f32::MIN; 3];
    for c in corners {
        for k in 0..3 {
            lo[k] = lo[k].min(c.position[k]);
            hi[k] = hi[k].max(c.position[k]);
        }
    }
    let center = [(lo[0] + hi[0]) * 0.5, (lo[1] + hi[1]) * 0.5, (lo[2] + hi[2]) * 0.5];
    let extent = (0..3).map(|k| hi[k] - lo[k]).fold(0.0f32, f32::max);
    (center, if extent > 0.0 { 4.0 / extent } else { 1.0 })
}

fn face_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    [u[1] * v[2] - u[2] * v[1], u[2] * v[0] - u[0] * v[2], u[0] * v[1] - u[1] * v[0]]
}

impl debug::Scene for ObjModel {
    fn setup(&mut self, ctx: &mut Context) -> anyhow::Result<()> {
        let Some(path) = &self.texture_path else { return Ok(()) };
        let image = image::open(path).with_context(|| format!("loading {path}"))?.to_rgba8();
        let (w, h) = image.dimensions();
        let format = PixelFormat::new(Components::Rgba, ElementType::U8);
        self.diffuse = ctx.create_texture_2d(w, h, image.as_raw(), format, TextureFlags::GENERATE_MIPS);
        debug::check(ctx)?;
        log::info!("diffuse {path}: {w}x{h}");
        Ok(())
    }

    fn frame(&mut self, ctx: &mut Context, (w, h): (u32, u32), t: f32) {
        ctx.viewport(0.0, 0.0, w as f32, h as f32);
        ctx.clear_color(0.02, 0.02, 0.03, 1.0);
        ctx.clear(ClearFlags::ALL);
        ctx.set_3d_view_proj([0.0, 2.0, -7.0], [0.0; 3], [0.0, 1.0, 0.0], 50.0, 0.1, 100.0);

        ctx.state_push();
        ctx.enable(
            Capabilities::LIGHTING
                | Capabilities::DEPTH_TEST
                | Capabilities::DEPTH_WRITE
                | Capabilities::GENERATE_TANGENT_BINORMAL,
        );
        ctx.bind_diffuse(self.diffuse);
        ctx.identity();
        ctx.rotate(0.0, t * 25.0, 0.0);
        ctx.scale(self.scale, self.scale, self.scale);
        ctx.translate(-self.center[0], -self.center[1], -self.center[2]);
        ctx.color3(1.0, 1.0, 1.0);
        ctx.begin(Topology::Triangles);
        for tri in self.corners.chunks_exact(3) {
            let flat = face_normal(tri[0].position, tri[1].position, tri[2].position);
            for c in tri {
                ctx.normal_v(&c.normal.unwrap_or(flat));
                ctx.tex_coord_v(&c.texcoord);
                ctx.position3_v(&c.position);
            }
        }
        ctx.end();
        ctx.bind_diffuse(0);
        ctx.state_pop();

        ctx.identity();
        ctx.begin(Topology::Ambients);
        ctx.color3(0.15, 0.15, 0.18);
        ctx.position2(0.0, 0.0);
        ctx.end();
        ctx.radius(12.0);
        ctx.multiply(1.5);
        ctx.begin(Topology::Omnis);
        ctx.color3(1.0, 0.95, 0.85);
        ctx.position3(4.0, 4.0, -4.0);
        ctx.color3(0.4, 0.5, 1.0);
        ctx.position3(-4.0, 1.0, 3.0);
        ctx.end();

        ctx.state_push();
        ctx.enable(Capabilities::HDR | Capabilities::VIGNETTE);
        ctx.post_process();
        ctx.state_pop();
    }
}

fn main() -> anyhow::Result<()> {
    debug::init_logging();
    let positional: Vec<String> = std::env::args().skip(1).take_while(|a| a != "--headless").collect();
    let obj = positional.first().context("usage: obj_model <model.obj> [diffuse image] [--headless out.png]")?;
    let corners = load_obj(Path::new(obj))?;
    let (center, scale) = fit(&corners);
    log::info!("{obj}: {} triangles", corners.len() / 3);
    let scene = ObjModel { corners, center, scale, texture_path: positional.get(1).cloned(), diffuse: 0 };
    match debug::headless_output() {
        Some(path) => debug::run_headless(scene, (800, 600), 1, path.as_ref()),
        None => debug::run_windowed("Ember OBJ model", scene),
    }
}
