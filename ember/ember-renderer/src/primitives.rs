//! Solid primitives built on the batch API. Every face is wound clockwise seen from outside and
//! carries outward normals and texcoords; the current vertex attributes are restored afterwards.

use std::f32::consts::{PI, TAU};

use crate::batch::Topology;
use crate::context::Context;
use crate::error::EmberError;
use crate::math::{cross, dot, normalize, scale3, sub, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Corner {
    position: Vec3,
    normal: Vec3,
    texcoord: [f32; 2],
}

/// Whether `a b c d` is clockwise seen from the side `outward` points to.
fn faces_outward(corners: &[Corner; 4], outward: Vec3) -> bool {
    let [a, b, c, d] = corners;
    let area = cross(sub(c.position, a.position), sub(d.position, b.position));
    dot(area, outward) >= 0.0
}

fn ring(angle: f32) -> (f32, f32) {
    (angle.cos(), angle.sin())
}

impl Context {
    /// Opens a primitive batch; refuses to nest inside a caller's open batch.
    fn begin_primitive(&mut self, topology: Topology) -> bool {
        if self.batch_open() {
            log::warn!("primitive rejected: a batch is already open");
            self.set_error(EmberError::BatchOpen("primitive"));
            return false;
        }
        self.begin(topology);
        self.batch_open()
    }

    fn emit(&mut self, c: &Corner) {
        self.normal_v(&c.normal);
        self.tex_coord_v(&c.texcoord);
        self.position3_v(&c.position);
    }

    fn quad(&mut self, mut corners: [Corner; 4], outward: Vec3) {
        if !faces_outward(&corners, outward) {
            corners.reverse();
        }
        for c in &corners {
            self.emit(c);
        }
    }

    /// Runs `body` inside a `topology` batch, keeping the caller's vertex attributes.
    fn primitive(&mut self, topology: Topology, body: impl FnOnce(&mut Self)) {
        let saved = self.attributes();
        if !self.begin_primitive(topology) {
            return;
        }
        body(self);
        self.end();
        if let Some(attrs) = saved {
            self.set_attributes(attrs);
        }
    }

    /// Axis-aligned cube of edge `size` centered on the origin.
    pub fn cube(&mut self, size: f32) {
        if !(size.is_finite() && size > 0.0) {
            return;
        }
        let h = size * 0.5;
        let axes: [(Vec3, Vec3, Vec3); 6] = [
            ([0.0, 0.0, -1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, 1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ];
        self.primitive(Topology::Quads, |ctx| {
            for (n, u, v) in axes {
                let corner = |su: f32, sv: f32, texcoord: [f32; 2]| Corner {
                    position: [
                        (n[0] + u[0] * su + v[0] * sv) * h,
                        (n[1] + u[1] * su + v[1] * sv) * h,
                        (n[2] + u[2] * su + v[2] * sv) * h,
                    ],
                    normal: n,
                    texcoord,
                };
                let corners = [
                    corner(-1.0, 1.0, [0.0, 0.0]),
                    corner(1.0, 1.0, [1.0, 0.0]),
                    corner(1.0, -1.0, [1.0, 1.0]),
                    corner(-1.0, -1.0, [0.0, 1.0]),
                ];
                ctx.quad(corners, n);
            }
        });
    }

    /// UV sphere. `s_factor` scales the s texcoord around the circumference.
    pub fn sphere(&mut self, radius: f32, slices: u32, stacks: u32, s_factor: f32) {
        if slices < 3 || stacks < 2 || !(radius >= 0.0) {
            return;
        }
        let point = |i: u32, j: u32| {
            let theta = PI * i as f32 / stacks as f32;
            let (cp, sp) = ring(TAU * j as f32 / slices as f32);
            let normal = [theta.sin() * cp, theta.cos(), theta.sin() * sp];
            Corner {
                position: scale3(normal, radius),
                normal,
                texcoord: [s_factor * j as f32 / slices as f32, i as f32 / stacks as f32],
            }
        };
        self.primitive(Topology::Quads, |ctx| {
            for i in 0..stacks {
                for j in 0..slices {
                    let corners = [point(i, j), point(i, j + 1), point(i + 1, j + 1), point(i + 1, j)];
                    let outward = normalize(corners.iter().fold([0.0; 3], |acc, c| {
                        [acc[0] + c.normal[0], acc[1] + c.normal[1], acc[2] + c.normal[2]]
                    }));
                    ctx.quad(corners, outward);
                }
            }
        });
    }

    /// Capped cylinder (or cone) standing on y = 0. A zero radius leaves that end open.
    pub fn cylinder(&mut self, bottom_radius: f32, top_radius: f32, height: f32, slices: u32, s_factor: f32) {
        if slices < 3 || !(bottom_radius >= 0.0 && top_radius >= 0.0) || !(height.is_finite() && height > 0.0) {
            return;
        }
        if bottom_radius == 0.0 && top_radius == 0.0 {
            return;
        }
        self.primitive(Topology::Quads, |ctx| {
            ctx.wall(bottom_radius, top_radius, height, slices, s_factor, 1.0);
        });
        if bottom_radius > 0.0 {
            self.cap(bottom_radius, 0.0, slices, -1.0);
        }
        if top_radius > 0.0 {
            self.cap(top_radius, height, slices, 1.0);
        }
    }

    /// Hollow cylinder with closed annular ends.
    pub fn tube(&mut self, outer_radius: f32, inner_radius: f32, height: f32, slices: u32, s_factor: f32) {
        if slices < 3 || !(inner_radius >= 0.0 && outer_radius > inner_radius) || !(height.is_finite() && height > 0.0) {
            return;
        }
        self.primitive(Topology::Quads, |ctx| {
            ctx.wall(outer_radius, outer_radius, height, slices, s_factor, 1.0);
            ctx.wall(inner_radius, inner_radius, height, slices, s_factor, -1.0);
            for (y, up) in [(0.0, -1.0), (height, 1.0)] {
                let normal = [0.0, up, 0.0];
                for j in 0..slices {
                    let edge = |r: f32, k: u32| {
                        let (c, s) = ring(TAU * k as f32 / slices as f32);
                        Corner {
                            position: [r * c, y, r * s],
                            normal,
                            texcoord: [0.5 + 0.5 * c * r / outer_radius, 0.5 + 0.5 * s * r / outer_radius],
                        }
                    };
                    let corners = [
                        edge(outer_radius, j),
                        edge(outer_radius, j + 1),
                        edge(inner_radius, j + 1),
                        edge(inner_radius, j),
                    ];
                    ctx.quad(corners, normal);
                }
            }
        });
    }

    /// Reserved: accepted, emits nothing.
    pub fn torus(&mut self, _outer_radius: f32, _inner_radius: f32, _slices: u32, _stacks: u32, _s_factor: f32) {}

    /// Side wall from y = 0 to `height`; `facing` -1 turns it inward.
    fn wall(&mut self, bottom: f32, top: f32, height: f32, slices: u32, s_factor: f32, facing: f32) {
        let point = |j: u32, r: f32, y: f32, t: f32| {
            let (c, s) = ring(TAU * j as f32 / slices as f32);
            let normal = scale3(normalize([height * c, bottom - top, height * s]), facing);
            Corner { position: [r * c, y, r * s], normal, texcoord: [s_factor * j as f32 / slices as f32, t] }
        };
        for j in 0..slices {
            let corners = [
                point(j, top, height, 0.0),
                point(j + 1, top, height, 0.0),
                point(j + 1, bottom, 0.0, 1.0),
                point(j, bottom, 0.0, 1.0),
            ];
            let (c, s) = ring(TAU * (j as f32 + 0.5) / slices as f32);
            let outward = scale3([c, 0.0, s], facing);
            self.quad(corners, outward);
        }
    }

    /// Disc of `radius` at `y` drawn as a fan; `up` is +1 for a cap facing +y.
    fn cap(&mut self, radius: f32, y: f32, slices: u32, up: f32) {
        let normal = [0.0, up, 0.0];
        self.primitive(Topology::TriangleFan, |ctx| {
            ctx.emit(&Corner { position: [0.0, y, 0.0], normal, texcoord: [0.5, 0.5] });
            for k in 0..=slices {
                // increasing angle winds clockwise seen from -y
                let step = if up > 0.0 { slices - k } else { k };
                let (c, s) = ring(TAU * step as f32 / slices as f32);
                ctx.emit(&Corner {
                    position: [radius * c, y, radius * s],
                    normal,
                    texcoord: [0.5 + 0.5 * c, 0.5 + 0.5 * s],
                });
            }
        });
    }
}
