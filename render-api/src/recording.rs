//! In-memory executor that records every call. Used by tests (call-count spy, draw snapshots,
//! leak checks) and by the headless trace binary.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use crate::backend::GpuExecutor;
use crate::error::GpuError;
use crate::types::{
    BlendDesc, BufferDesc, BufferId, DepthDesc, PrimitiveTopology, ProgramId, ProgramKind, RasterDesc,
    RenderTarget, RenderTargetDesc, SamplerDesc, ScissorRect, StateDesc, StateId, TextureDesc,
    TextureFormat, TextureId, Viewport, MAX_SHADER_RESOURCES,
};

/// One executor call, in issue order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CompileProgram(ProgramKind),
    ReleaseProgram(ProgramId),
    BindPrograms { vertex: ProgramId, pixel: ProgramId },
    CreateState(StateDesc),
    BindState(StateId),
    ReleaseState(StateId),
    CreateBuffer { size: u64 },
    WriteBuffer { id: BufferId, len: usize },
    BindConstantBuffer { slot: u32, id: BufferId },
    BindVertexBuffer(BufferId),
    ReleaseBuffer(BufferId),
    CreateTexture { width: u32, height: u32, levels: usize },
    CreateRenderTarget { width: u32, height: u32, format: TextureFormat },
    ReleaseTexture(TextureId),
    BindRenderTargets { colors: Vec<RenderTarget>, depth: bool },
    BindShaderResources { first_slot: u32, textures: Vec<Option<TextureId>> },
    ClearRenderTarget { target: RenderTarget, color: [f32; 4] },
    ClearDepthStencil { depth: f32, stencil: u8 },
    SetViewport(Viewport),
    SetScissor(ScissorRect),
    SetTopology(PrimitiveTopology),
    Draw { vertex_count: u32, first_vertex: u32 },
    Present,
}

impl Call {
    /// True for calls that change what the next draw sees (everything except creation, writes and releases).
    pub fn is_binding(&self) -> bool {
        matches!(
            self,
            Call::BindPrograms { .. }
                | Call::BindState(_)
                | Call::BindConstantBuffer { .. }
                | Call::BindVertexBuffer(_)
                | Call::BindRenderTargets { .. }
                | Call::BindShaderResources { .. }
                | Call::SetViewport(_)
                | Call::SetScissor(_)
                | Call::SetTopology(_)
        )
    }
}

/// A released resource, in release order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    Program(ProgramId),
    State(StateId),
    Buffer(BufferId),
    Texture(TextureId),
}

/// Everything bound at the time of a draw.
#[derive(Debug, Clone)]
pub struct DrawRecord {
    pub vertex_count: u32,
    pub first_vertex: u32,
    pub topology: Option<PrimitiveTopology>,
    /// Contents of the bound vertex buffer (the bytes of its last write).
    pub vertex_bytes: Vec<u8>,
    pub vertex_buffer: Option<BufferId>,
    pub programs: Option<(ProgramKind, ProgramKind)>,
    pub targets: Vec<RenderTarget>,
    pub depth_attached: bool,
    pub resources: [Option<TextureId>; MAX_SHADER_RESOURCES],
    pub depth: Option<DepthDesc>,
    pub blend: Option<BlendDesc>,
    pub raster: Option<RasterDesc>,
    pub sampler: Option<SamplerDesc>,
    pub viewport: Option<Viewport>,
    /// Contents of each bound constant buffer, by slot.
    pub constants: BTreeMap<u32, Vec<u8>>,
}

#[derive(Debug, Clone)]
struct TextureEntry {
    width: u32,
    height: u32,
    format: TextureFormat,
    render_target: bool,
    levels: Vec<Vec<u8>>,
}

#[derive(Debug, Clone)]
struct BufferEntry {
    size: u64,
    contents: Vec<u8>,
}

#[derive(Debug, Default, Clone)]
struct Bindings {
    programs: Option<(ProgramId, ProgramId)>,
    depth: Option<StateId>,
    blend: Option<StateId>,
    raster: Option<StateId>,
    sampler: Option<StateId>,
    vertex_buffer: Option<BufferId>,
    constants: BTreeMap<u32, BufferId>,
    targets: Vec<RenderTarget>,
    depth_attached: bool,
    resources: [Option<TextureId>; MAX_SHADER_RESOURCES],
    viewport: Option<Viewport>,
    topology: Option<PrimitiveTopology>,
}

pub struct RecordingExecutor {
    width: u32,
    height: u32,
    next_id: u32,
    creations: usize,
    fail_after: Option<usize>,
    calls: Vec<Call>,
    draws: Vec<DrawRecord>,
    released: Vec<Released>,
    programs: HashMap<ProgramId, ProgramKind>,
    states: HashMap<StateId, StateDesc>,
    buffers: HashMap<BufferId, BufferEntry>,
    textures: HashMap<TextureId, TextureEntry>,
    bound: Bindings,
    presents: usize,
}

impl RecordingExecutor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            next_id: 1,
            creations: 0,
            fail_after: None,
            calls: Vec::new(),
            draws: Vec::new(),
            released: Vec::new(),
            programs: HashMap::new(),
            states: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            bound: Bindings::default(),
            presents: 0,
        }
    }

    /// Every creation after the first `n` successful ones fails.
    pub fn fail_creations_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn set_fail_creations_after(&mut self, n: Option<usize>) {
        self.fail_after = n.map(|n| self.creations + n);
    }

    /// Changes the reported back buffer size, as a window resize would.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn calls(&self) -> &[Call] { &self.calls }
    pub fn draws(&self) -> &[DrawRecord] { &self.draws }
    pub fn released(&self) -> &[Released] { &self.released }
    pub fn presents(&self) -> usize { self.presents }

    /// Forget recorded calls and draws; live resources and bindings are kept.
    pub fn clear_log(&mut self) {
        self.calls.clear();
        self.draws.clear();
        self.released.clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }

    pub fn live_programs(&self) -> usize { self.programs.len() }
    pub fn live_states(&self) -> usize { self.states.len() }
    pub fn live_buffers(&self) -> usize { self.buffers.len() }
    pub fn live_textures(&self) -> usize { self.textures.len() }

    pub fn live_resources(&self) -> usize {
        self.live_programs() + self.live_states() + self.live_buffers() + self.live_textures()
    }

    /// Sampled textures created from pixel data (render targets excluded).
    pub fn live_data_textures(&self) -> usize {
        self.textures.values().filter(|t| !t.render_target).count()
    }

    pub fn program_kind(&self, id: ProgramId) -> Option<ProgramKind> {
        self.programs.get(&id).copied()
    }

    pub fn state_desc(&self, id: StateId) -> Option<StateDesc> {
        self.states.get(&id).copied()
    }

    pub fn buffer_contents(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(&id).map(|b| b.contents.as_slice())
    }

    pub fn buffer_size(&self, id: BufferId) -> Option<u64> {
        self.buffers.get(&id).map(|b| b.size)
    }

    pub fn texture_size(&self, id: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&id).map(|t| (t.width, t.height))
    }

    pub fn texture_format(&self, id: TextureId) -> Option<TextureFormat> {
        self.textures.get(&id).map(|t| t.format)
    }

    /// Mip levels uploaded for a data texture; empty for render targets.
    pub fn texture_levels(&self, id: TextureId) -> Option<&[Vec<u8>]> {
        self.textures.get(&id).map(|t| t.levels.as_slice())
    }

    pub fn bound_state(&self) -> (Option<DepthDesc>, Option<BlendDesc>, Option<RasterDesc>, Option<SamplerDesc>) {
        (self.bound_depth(), self.bound_blend(), self.bound_raster(), self.bound_sampler())
    }

    pub fn bound_blend(&self) -> Option<BlendDesc> {
        match self.bound.blend.and_then(|id| self.states.get(&id)) {
            Some(StateDesc::Blend(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn bound_depth(&self) -> Option<DepthDesc> {
        match self.bound.depth.and_then(|id| self.states.get(&id)) {
            Some(StateDesc::Depth(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn bound_raster(&self) -> Option<RasterDesc> {
        match self.bound.raster.and_then(|id| self.states.get(&id)) {
            Some(StateDesc::Raster(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn bound_sampler(&self) -> Option<SamplerDesc> {
        match self.bound.sampler.and_then(|id| self.states.get(&id)) {
            Some(StateDesc::Sampler(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn bound_programs(&self) -> Option<(ProgramKind, ProgramKind)> {
        let (vs, ps) = self.bound.programs?;
        Some((self.program_kind(vs)?, self.program_kind(ps)?))
    }

    pub fn bound_targets(&self) -> &[RenderTarget] {
        &self.bound.targets
    }

    fn allocate(&mut self, kind: &'static str) -> Result<u32, GpuError> {
        if let Some(limit) = self.fail_after {
            if self.creations >= limit {
                return Err(GpuError::creation(kind, "injected failure"));
            }
        }
        self.creations += 1;
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }
}

impl GpuExecutor for RecordingExecutor {
    fn back_buffer_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn compile_program(&mut self, kind: ProgramKind) -> Result<ProgramId, GpuError> {
        self.calls.push(Call::CompileProgram(kind));
        let id = ProgramId(self.allocate("program")?);
        self.programs.insert(id, kind);
        Ok(id)
    }

    fn release_program(&mut self, id: ProgramId) {
        self.calls.push(Call::ReleaseProgram(id));
        if self.programs.remove(&id).is_some() {
            self.released.push(Released::Program(id));
        } else {
            log::warn!("release of unknown {id}");
        }
    }

    fn bind_programs(&mut self, vertex: ProgramId, pixel: ProgramId) {
        self.calls.push(Call::BindPrograms { vertex, pixel });
        self.bound.programs = Some((vertex, pixel));
    }

    fn create_state(&mut self, desc: &StateDesc) -> Result<StateId, GpuError> {
        self.calls.push(Call::CreateState(*desc));
        let id = StateId(self.allocate(desc.kind())?);
        self.states.insert(id, *desc);
        Ok(id)
    }

    fn bind_state(&mut self, id: StateId) {
        self.calls.push(Call::BindState(id));
        match self.states.get(&id) {
            Some(StateDesc::Depth(_)) => self.bound.depth = Some(id),
            Some(StateDesc::Blend(_)) => self.bound.blend = Some(id),
            Some(StateDesc::Raster(_)) => self.bound.raster = Some(id),
            Some(StateDesc::Sampler(_)) => self.bound.sampler = Some(id),
            None => log::warn!("bind of unknown {id}"),
        }
    }

    fn release_state(&mut self, id: StateId) {
        self.calls.push(Call::ReleaseState(id));
        if self.states.remove(&id).is_some() {
            self.released.push(Released::State(id));
        } else {
            log::warn!("release of unknown {id}");
        }
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferId, GpuError> {
        self.calls.push(Call::CreateBuffer { size: desc.size });
        let id = BufferId(self.allocate("buffer")?);
        self.buffers.insert(id, BufferEntry { size: desc.size, contents: Vec::new() });
        Ok(id)
    }

    fn write_buffer(&mut self, id: BufferId, data: &[u8]) -> Result<(), GpuError> {
        self.calls.push(Call::WriteBuffer { id, len: data.len() });
        let entry = self
            .buffers
            .get_mut(&id)
            .ok_or(GpuError::UnknownResource { kind: "buffer", id: id.0 })?;
        if data.len() as u64 > entry.size {
            return Err(GpuError::BufferOverflow { id: id.0, len: data.len(), size: entry.size });
        }
        entry.contents.clear();
        entry.contents.extend_from_slice(data);
        Ok(())
    }

    fn bind_constant_buffer(&mut self, slot: u32, id: BufferId) {
        self.calls.push(Call::BindConstantBuffer { slot, id });
        self.bound.constants.insert(slot, id);
    }

    fn bind_vertex_buffer(&mut self, id: BufferId) {
        self.calls.push(Call::BindVertexBuffer(id));
        self.bound.vertex_buffer = Some(id);
    }

    fn release_buffer(&mut self, id: BufferId) {
        self.calls.push(Call::ReleaseBuffer(id));
        if self.buffers.remove(&id).is_some() {
            self.released.push(Released::Buffer(id));
        } else {
            log::warn!("release of unknown {id}");
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc, levels: &[Vec<u8>]) -> Result<TextureId, GpuError> {
        self.calls.push(Call::CreateTexture { width: desc.width, height: desc.height, levels: levels.len() });
        if desc.width == 0 || desc.height == 0 || levels.is_empty() {
            return Err(GpuError::creation("texture", format!("invalid extent {}x{}", desc.width, desc.height)));
        }
        let expected = desc.width as usize * desc.height as usize * desc.format.bytes_per_pixel();
        if levels[0].len() < expected {
            return Err(GpuError::creation("texture", format!("{} bytes for {expected}", levels[0].len())));
        }
        let id = TextureId(self.allocate("texture")?);
        self.textures.insert(
            id,
            TextureEntry {
                width: desc.width,
                height: desc.height,
                format: desc.format,
                render_target: false,
                levels: levels.to_vec(),
            },
        );
        Ok(id)
    }

    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<TextureId, GpuError> {
        self.calls.push(Call::CreateRenderTarget { width: desc.width, height: desc.height, format: desc.format });
        let id = TextureId(self.allocate("render target")?);
        self.textures.insert(
            id,
            TextureEntry {
                width: desc.width,
                height: desc.height,
                format: desc.format,
                render_target: true,
                levels: Vec::new(),
            },
        );
        Ok(id)
    }

    fn release_texture(&mut self, id: TextureId) {
        self.calls.push(Call::ReleaseTexture(id));
        if self.textures.remove(&id).is_some() {
            self.released.push(Released::Texture(id));
        } else {
            log::warn!("release of unknown {id}");
        }
    }

    fn bind_render_targets(&mut self, colors: &[RenderTarget], depth: bool) {
        self.calls.push(Call::BindRenderTargets { colors: colors.to_vec(), depth });
        self.bound.targets = colors.to_vec();
        self.bound.depth_attached = depth;
    }

    fn bind_shader_resources(&mut self, first_slot: u32, textures: &[Option<TextureId>]) {
        self.calls.push(Call::BindShaderResources { first_slot, textures: textures.to_vec() });
        for (i, tex) in textures.iter().enumerate() {
            if let Some(slot) = self.bound.resources.get_mut(first_slot as usize + i) {
                *slot = *tex;
            }
        }
    }

    fn clear_render_target(&mut self, target: RenderTarget, color: [f32; 4]) {
        self.calls.push(Call::ClearRenderTarget { target, color });
    }

    fn clear_depth_stencil(&mut self, depth: f32, stencil: u8) {
        self.calls.push(Call::ClearDepthStencil { depth, stencil });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.calls.push(Call::SetViewport(viewport));
        self.bound.viewport = Some(viewport);
    }

    fn set_scissor(&mut self, rect: ScissorRect) {
        self.calls.push(Call::SetScissor(rect));
    }

    fn set_topology(&mut self, topology: PrimitiveTopology) {
        self.calls.push(Call::SetTopology(topology));
        self.bound.topology = Some(topology);
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<(), GpuError> {
        self.calls.push(Call::Draw { vertex_count, first_vertex });
        let vb = self.bound.vertex_buffer.ok_or_else(|| GpuError::Draw("no vertex buffer bound".into()))?;
        let vertex_bytes = self
            .buffers
            .get(&vb)
            .map(|b| b.contents.clone())
            .ok_or(GpuError::UnknownResource { kind: "buffer", id: vb.0 })?;
        let constants = self
            .bound
            .constants
            .iter()
            .filter_map(|(slot, id)| self.buffers.get(id).map(|b| (*slot, b.contents.clone())))
            .collect();
        let record = DrawRecord {
            vertex_count,
            first_vertex,
            topology: self.bound.topology,
            vertex_bytes,
            vertex_buffer: Some(vb),
            programs: self.bound_programs(),
            targets: self.bound.targets.clone(),
            depth_attached: self.bound.depth_attached,
            resources: self.bound.resources,
            depth: self.bound_depth(),
            blend: self.bound_blend(),
            raster: self.bound_raster(),
            sampler: self.bound_sampler(),
            viewport: self.bound.viewport,
            constants,
        };
        self.draws.push(record);
        Ok(())
    }

    fn present(&mut self) -> Result<(), GpuError> {
        self.calls.push(Call::Present);
        self.presents += 1;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferUsage, CompareFunc};

    #[test]
    fn injected_failure_after_n_creations() {
        let mut exec = RecordingExecutor::new(4, 4).fail_creations_after(2);
        assert!(exec.compile_program(ProgramKind::GeometryVertex).is_ok());
        assert!(exec.compile_program(ProgramKind::FullScreenVertex).is_ok());
        let err = exec.compile_program(ProgramKind::AmbientPixel).unwrap_err();
        assert!(matches!(err, GpuError::Creation { kind: "program", .. }));
        assert_eq!(exec.live_programs(), 2);
    }

    #[test]
    fn write_past_buffer_size_is_rejected() {
        let mut exec = RecordingExecutor::new(4, 4);
        let id = exec
            .create_buffer(&BufferDesc { label: "cb", size: 8, usage: BufferUsage::CONSTANT })
            .unwrap();
        assert!(exec.write_buffer(id, &[0u8; 8]).is_ok());
        assert_eq!(
            exec.write_buffer(id, &[0u8; 9]),
            Err(GpuError::BufferOverflow { id: id.0, len: 9, size: 8 })
        );
        assert!(exec.write_buffer(BufferId(999), &[0]).is_err());
    }

    #[test]
    fn draw_snapshots_bound_state() {
        let mut exec = RecordingExecutor::new(4, 4);
        let vs = exec.compile_program(ProgramKind::GeometryVertex).unwrap();
        let ps = exec.compile_program(ProgramKind::GeometryPixel(Some(CompareFunc::Greater))).unwrap();
        let blend = exec.create_state(&StateDesc::Blend(BlendDesc::ADDITIVE)).unwrap();
        let vb = exec
            .create_buffer(&BufferDesc { label: "vb", size: 16, usage: BufferUsage::VERTEX })
            .unwrap();
        exec.write_buffer(vb, &[1, 2, 3, 4]).unwrap();
        exec.bind_programs(vs, ps);
        exec.bind_state(blend);
        exec.bind_vertex_buffer(vb);
        exec.bind_render_targets(&[RenderTarget::BackBuffer], false);
        exec.set_topology(PrimitiveTopology::TriangleList);
        exec.draw(3, 0).unwrap();

        let draw = &exec.draws()[0];
        assert_eq!(draw.vertex_bytes, vec![1, 2, 3, 4]);
        assert_eq!(draw.blend, Some(BlendDesc::ADDITIVE));
        assert_eq!(draw.depth, None);
        assert_eq!(
            draw.programs,
            Some((ProgramKind::GeometryVertex, ProgramKind::GeometryPixel(Some(CompareFunc::Greater))))
        );
        assert_eq!(draw.targets, vec![RenderTarget::BackBuffer]);
        assert_eq!(draw.topology, Some(PrimitiveTopology::TriangleList));
    }

    #[test]
    fn draw_without_vertex_buffer_fails() {
        let mut exec = RecordingExecutor::new(4, 4);
        assert!(matches!(exec.draw(3, 0), Err(GpuError::Draw(_))));
    }

    #[test]
    fn release_order_is_recorded() {
        let mut exec = RecordingExecutor::new(4, 4);
        let rt = exec
            .create_render_target(&RenderTargetDesc {
                label: "rt",
                width: 4,
                height: 4,
                format: TextureFormat::Rgba16Float,
            })
            .unwrap();
        let ps = exec.compile_program(ProgramKind::PassThroughPixel).unwrap();
        exec.release_texture(rt);
        exec.release_program(ps);
        exec.release_program(ps);
        assert_eq!(exec.released(), &[Released::Texture(rt), Released::Program(ps)]);
        assert_eq!(exec.live_resources(), 0);
    }

    #[test]
    fn shader_resources_bind_from_first_slot() {
        let mut exec = RecordingExecutor::new(4, 4);
        exec.bind_shader_resources(1, &[Some(TextureId(7)), Some(TextureId(8))]);
        exec.bind_shader_resources(2, &[None]);
        exec.bind_shader_resources(3, &[Some(TextureId(9)), Some(TextureId(10))]);
        assert_eq!(exec.bound.resources, [None, Some(TextureId(7)), None, Some(TextureId(9))]);
    }
}
