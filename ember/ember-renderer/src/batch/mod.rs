//! Immediate-mode batching: topology expansion into GPU primitives, capacity-transparent flushing.
//!
//! Vertices submitted between `begin` and `end` pass through an [`Expander`], which yields 0-2
//! duplicates followed by the vertex itself, so fans, quads and quad strips reach the GPU as
//! triangle lists. The [`Batch`] buffer is reused across spans; when it fills up mid-span the
//! longest prefix of whole primitives is drawn and the remainder carried to the front.

pub mod tangent;

use render_api::PrimitiveTopology;

use crate::device::Device;
use crate::error::{EmberError, EmberResult};
use crate::math::Vec3;
use crate::pass::Pass;
use crate::vertex::Vertex;

/// Primitive type passed to `begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Points,
    Lines,
    LineStrip,
    /// Line strip closed back to its first vertex on the final flush.
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Polygon,
    /// Four corners per face, wound around the face.
    Quads,
    /// The first four vertices wind around the first quad; each following pair extends the
    /// strip from the edge formed by the previous pair.
    QuadStrip,
    /// Each position is a point light drawn immediately.
    Omnis,
    /// Each position draws an ambient term with the current color.
    Ambients,
    /// Reserved: enters the spot pass, positions are discarded.
    Spots,
    /// Reserved: positions are discarded.
    Directionals,
    /// Reserved: positions are discarded.
    Sprites,
}

/// What a topology does with submitted positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Geometry(PrimitiveTopology),
    Ambient,
    Omni,
    Discard,
}

impl Topology {
    pub fn kind(self) -> BatchKind {
        use PrimitiveTopology as P;
        match self {
            Topology::Points => BatchKind::Geometry(P::PointList),
            Topology::Lines => BatchKind::Geometry(P::LineList),
            Topology::LineStrip | Topology::LineLoop => BatchKind::Geometry(P::LineStrip),
            Topology::Triangles | Topology::TriangleFan | Topology::Polygon | Topology::Quads | Topology::QuadStrip => {
                BatchKind::Geometry(P::TriangleList)
            }
            Topology::TriangleStrip => BatchKind::Geometry(P::TriangleStrip),
            Topology::Ambients => BatchKind::Ambient,
            Topology::Omnis => BatchKind::Omni,
            Topology::Spots | Topology::Directionals | Topology::Sprites => BatchKind::Discard,
        }
    }

    /// Pass entered by `begin`; `None` leaves the current pass alone.
    pub fn pass(self) -> Option<Pass> {
        match self {
            Topology::Ambients => Some(Pass::Ambient),
            Topology::Omnis => Some(Pass::Omni),
            Topology::Spots => Some(Pass::Spot),
            Topology::Directionals | Topology::Sprites => None,
            _ => Some(Pass::Geometry),
        }
    }

    fn rule(self) -> Rule {
        match self {
            Topology::TriangleFan | Topology::Polygon => Rule::Fan,
            Topology::Quads => Rule::Quads,
            Topology::QuadStrip => Rule::QuadStrip,
            _ => Rule::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    None,
    Fan,
    Quads,
    QuadStrip,
}

/// Up to two duplicates followed by the submitted vertex.
#[derive(Debug, Clone)]
pub struct Expansion {
    items: [Vertex; 3],
    len: usize,
    next: usize,
}

impl Iterator for Expansion {
    type Item = Vertex;

    fn next(&mut self) -> Option<Vertex> {
        if self.next < self.len {
            self.next += 1;
            Some(self.items[self.next - 1])
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.len - self.next;
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for Expansion {}

/// Expansion state machine over the logical stream of emitted vertices (duplicates included).
#[derive(Debug, Clone)]
pub struct Expander {
    rule: Rule,
    emitted: usize,
    first: Option<Vertex>,
    /// `recent[0]` is the last emitted vertex.
    recent: [Vertex; 3],
}

impl Expander {
    pub fn new(topology: Topology) -> Self {
        Self { rule: topology.rule(), emitted: 0, first: None, recent: [Vertex::default(); 3] }
    }

    /// Vertices emitted so far, duplicates included.
    pub fn emitted(&self) -> usize { self.emitted }

    /// First vertex of the span.
    pub fn first(&self) -> Option<Vertex> { self.first }

    fn duplicates(&self) -> ([Vertex; 2], usize) {
        let n = self.emitted;
        let [last, second, third] = self.recent;
        match self.rule {
            Rule::Fan if n >= 3 => ([self.first.unwrap_or(last), last], 2),
            Rule::Quads if n % 6 == 3 => ([third, last], 2),
            Rule::QuadStrip if n == 3 => ([third, last], 2),
            Rule::QuadStrip if n >= 6 && (n - 6) % 2 == 0 => ([last, second], 2),
            Rule::QuadStrip if n >= 6 => ([third, last], 2),
            _ => ([last, last], 0),
        }
    }

    fn record(&mut self, v: Vertex) {
        if self.emitted == 0 {
            self.first = Some(v);
        }
        self.recent = [v, self.recent[0], self.recent[1]];
        self.emitted += 1;
    }

    pub fn expand(&mut self, v: Vertex) -> Expansion {
        let (dups, count) = self.duplicates();
        let mut items = [v; 3];
        items[..count].copy_from_slice(&dups[..count]);
        for item in &items[..=count] {
            self.record(*item);
        }
        Expansion { items, len: count + 1, next: 0 }
    }
}

/// Vertices kept at the front of the buffer after a capacity flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carry {
    None,
    /// The last `n` vertices.
    Tail(usize),
    /// Triangle strip continuing on an odd triangle: `[v[c-2], v[c-2], v[c-1]]` keeps winding parity.
    StripPad,
}

/// Reusable vertex buffer for one begin/end span at a time.
pub struct Batch {
    vertices: Vec<Vertex>,
    count: usize,
    topology: Topology,
    open: bool,
    /// Whether `begin` managed to push a state layer that `end` must pop.
    pushed_state: bool,
    expander: Expander,
}

impl Batch {
    pub fn new(capacity: usize) -> Self {
        Self {
            vertices: vec![Vertex::default(); capacity],
            count: 0,
            topology: Topology::Points,
            open: false,
            pushed_state: false,
            expander: Expander::new(Topology::Points),
        }
    }

    pub fn capacity(&self) -> usize { self.vertices.len() }
    pub fn len(&self) -> usize { self.count }
    pub fn is_empty(&self) -> bool { self.count == 0 }
    pub fn is_full(&self) -> bool { self.count >= self.vertices.len() }
    pub fn is_open(&self) -> bool { self.open }
    pub fn topology(&self) -> Topology { self.topology }
    pub fn vertices(&self) -> &[Vertex] { &self.vertices[..self.count] }

    pub fn open(&mut self, topology: Topology, pushed_state: bool) {
        self.topology = topology;
        self.count = 0;
        self.expander = Expander::new(topology);
        self.open = true;
        self.pushed_state = pushed_state;
    }

    /// Closes the span; returns whether its state layer still needs popping.
    pub fn close(&mut self) -> bool {
        self.open = false;
        self.count = 0;
        std::mem::take(&mut self.pushed_state)
    }

    pub fn expand(&mut self, v: Vertex) -> Expansion {
        self.expander.expand(v)
    }

    /// Appends one vertex. Callers flush first when the batch is full.
    pub fn push(&mut self, v: Vertex) {
        debug_assert!(!self.is_full());
        self.vertices[self.count] = v;
        self.count += 1;
    }

    /// Closing vertex for a line loop, if this batch is one.
    pub fn loop_closure(&self) -> Option<Vertex> {
        match self.topology {
            Topology::LineLoop if self.expander.emitted() >= 2 => self.expander.first(),
            _ => None,
        }
    }

    /// Number of leading vertices to draw now, and what to keep for the rest of the span.
    pub fn split(&self, final_flush: bool) -> (usize, Carry) {
        let c = self.count;
        if final_flush {
            return (c, Carry::None);
        }
        let BatchKind::Geometry(prim) = self.topology.kind() else {
            return (c, Carry::None);
        };
        match prim {
            PrimitiveTopology::PointList => (c, Carry::None),
            PrimitiveTopology::LineList => (c - c % 2, Carry::Tail(c % 2)),
            PrimitiveTopology::LineStrip => (c, Carry::Tail(c.min(1))),
            PrimitiveTopology::TriangleList => (c - c % 3, Carry::Tail(c % 3)),
            PrimitiveTopology::TriangleStrip if c >= 3 && (c - 2) % 2 == 1 => (c, Carry::StripPad),
            PrimitiveTopology::TriangleStrip => (c, Carry::Tail(c.min(2))),
        }
    }

    /// Moves the buffer out for drawing; hand it back with [`Batch::restore`].
    pub fn take_vertices(&mut self) -> Vec<Vertex> {
        std::mem::take(&mut self.vertices)
    }

    /// Puts the buffer back and applies the carry.
    pub fn restore(&mut self, vertices: Vec<Vertex>, carry: Carry) {
        self.vertices = vertices;
        let c = self.count;
        match carry {
            Carry::None => self.count = 0,
            Carry::Tail(n) => {
                self.vertices.copy_within(c - n..c, 0);
                self.count = n;
            }
            Carry::StripPad => {
                let (a, b) = (self.vertices[c - 2], self.vertices[c - 1]);
                self.vertices[..3].copy_from_slice(&[a, a, b]);
                self.count = 3;
            }
        }
    }
}

impl Device {
    pub(crate) fn begin(&mut self, topology: Topology) -> EmberResult<()> {
        if self.batch.is_open() {
            return Err(EmberError::BatchOpen("begin"));
        }
        let depth = self.state.depth();
        self.state.push();
        let pushed = self.state.depth() > depth;
        if let Some(pass) = topology.pass() {
            if let Err(e) = self.enter_pass(pass) {
                if pushed {
                    self.state.pop();
                }
                return Err(e);
            }
        }
        self.batch.open(topology, pushed);
        Ok(())
    }

    pub(crate) fn end(&mut self) -> EmberResult<()> {
        if !self.batch.is_open() {
            return Ok(());
        }
        let flushed = match self.batch.topology().kind() {
            BatchKind::Geometry(_) => self.flush_batch(true),
            _ => Ok(()),
        };
        if self.batch.close() {
            self.state.pop();
        }
        let resolved = match self.pass {
            Some(Pass::Geometry) => self.state.resolve(self.gpu.as_mut(), &self.resources.programs),
            _ => Ok(()),
        };
        flushed.and(resolved)
    }

    /// Submits a position with the current attributes. No-op outside a batch.
    pub(crate) fn emit_position(&mut self, position: Vec3) -> EmberResult<()> {
        if !self.batch.is_open() {
            return Ok(());
        }
        match self.batch.topology().kind() {
            BatchKind::Geometry(_) => {
                let vertex = Vertex { position, ..self.attrs.vertex };
                for v in self.batch.expand(vertex) {
                    self.append(v)?;
                }
                Ok(())
            }
            BatchKind::Ambient => self.draw_ambient(),
            BatchKind::Omni => self.draw_omni(position),
            BatchKind::Discard => Ok(()),
        }
    }

    fn append(&mut self, v: Vertex) -> EmberResult<()> {
        if self.batch.is_full() {
            log::debug!("batch full at {} vertices, flushing", self.batch.len());
            self.flush_batch(false)?;
        }
        self.batch.push(v);
        Ok(())
    }

    /// Draws the batch (a whole-primitive prefix unless `final_flush`). No-op when closed or empty.
    fn flush_batch(&mut self, final_flush: bool) -> EmberResult<()> {
        if !self.batch.is_open() {
            return Ok(());
        }
        if final_flush {
            if let Some(first) = self.batch.loop_closure() {
                self.append(first)?;
            }
        }
        if self.batch.is_empty() {
            return Ok(());
        }
        let BatchKind::Geometry(prim) = self.batch.topology().kind() else {
            return Ok(());
        };
        let (count, carry) = self.batch.split(final_flush);
        let mut vertices = self.batch.take_vertices();
        let drawn = self.draw_batch(&mut vertices[..count], prim);
        self.batch.restore(vertices, carry);
        drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(i: usize) -> Vertex {
        Vertex { position: [i as f32, 0.0, 0.0], ..Vertex::default() }
    }

    fn ids(verts: &[Vertex]) -> Vec<usize> {
        verts.iter().map(|v| v.position[0] as usize).collect()
    }

    fn run(topology: Topology, n: usize) -> Vec<usize> {
        let mut e = Expander::new(topology);
        let out: Vec<Vertex> = (0..n).flat_map(|i| e.expand(v(i))).collect();
        ids(&out)
    }

    #[test]
    fn quads_expand_to_two_triangles() {
        assert_eq!(run(Topology::Quads, 4), vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(run(Topology::Quads, 8), vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);
    }

    #[test]
    fn fan_shares_first_vertex() {
        assert_eq!(run(Topology::TriangleFan, 5), vec![0, 1, 2, 0, 2, 3, 0, 3, 4]);
        assert_eq!(run(Topology::Polygon, 4), vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn quad_strip_extends_by_pairs() {
        assert_eq!(
            run(Topology::QuadStrip, 8),
            vec![0, 1, 2, 0, 2, 3, 3, 2, 4, 3, 4, 5, 5, 4, 6, 5, 6, 7]
        );
    }

    #[test]
    fn plain_topologies_do_not_expand() {
        assert_eq!(run(Topology::Triangles, 5), vec![0, 1, 2, 3, 4]);
        assert_eq!(run(Topology::TriangleStrip, 4), vec![0, 1, 2, 3]);
        assert_eq!(run(Topology::LineLoop, 3), vec![0, 1, 2]);
    }

    #[test]
    fn expansion_is_exact_size() {
        let mut e = Expander::new(Topology::Quads);
        for i in 0..3 {
            assert_eq!(e.expand(v(i)).len(), 1);
        }
        assert_eq!(e.expand(v(3)).len(), 3);
    }

    fn filled(topology: Topology, n: usize) -> Batch {
        let mut b = Batch::new(16);
        b.open(topology, false);
        for i in 0..n {
            b.push(v(i));
        }
        b
    }

    fn carry_after_split(topology: Topology, n: usize) -> (usize, Vec<usize>) {
        let mut b = filled(topology, n);
        let (count, carry) = b.split(false);
        let verts = b.take_vertices();
        b.restore(verts, carry);
        (count, ids(b.vertices()))
    }

    #[test]
    fn list_topologies_carry_partial_primitive() {
        assert_eq!(carry_after_split(Topology::Triangles, 16), (15, vec![15]));
        assert_eq!(carry_after_split(Topology::Quads, 14), (12, vec![12, 13]));
        assert_eq!(carry_after_split(Topology::Lines, 15), (14, vec![14]));
        assert_eq!(carry_after_split(Topology::Points, 16), (16, vec![]));
    }

    #[test]
    fn strips_carry_continuation() {
        assert_eq!(carry_after_split(Topology::LineStrip, 16), (16, vec![15]));
        // 16 vertices = 14 triangles, next triangle index is even
        assert_eq!(carry_after_split(Topology::TriangleStrip, 16), (16, vec![14, 15]));
        // 15 vertices = 13 triangles, pad to keep the odd winding
        assert_eq!(carry_after_split(Topology::TriangleStrip, 15), (15, vec![13, 13, 14]));
    }

    #[test]
    fn final_split_draws_everything() {
        let b = filled(Topology::Triangles, 7);
        assert_eq!(b.split(true), (7, Carry::None));
    }

    #[test]
    fn line_loop_closes_on_first_vertex() {
        let mut b = Batch::new(16);
        b.open(Topology::LineLoop, false);
        for i in 0..3 {
            for out in b.expand(v(i)) {
                b.push(out);
            }
        }
        assert_eq!(b.loop_closure().map(|c| c.position[0]), Some(0.0));
        let mut strip = Batch::new(16);
        strip.open(Topology::LineStrip, false);
        assert!(strip.loop_closure().is_none());
    }

    #[test]
    fn topology_families() {
        assert_eq!(Topology::Quads.kind(), BatchKind::Geometry(PrimitiveTopology::TriangleList));
        assert_eq!(Topology::LineLoop.kind(), BatchKind::Geometry(PrimitiveTopology::LineStrip));
        assert_eq!(Topology::Omnis.pass(), Some(Pass::Omni));
        assert_eq!(Topology::Sprites.pass(), None);
        assert_eq!(Topology::Spots.kind(), BatchKind::Discard);
    }
}
