//! Resource ids and descriptors passed across the executor boundary.

use std::fmt;

/// Number of shader-resource slots an executor must expose to pixel programs.
pub const MAX_SHADER_RESOURCES: usize = 4;

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

resource_id!(
    /// 2D texture or render target (render targets are always sampleable).
    TextureId
);
resource_id!(
    /// Constant or vertex buffer.
    BufferId
);
resource_id!(
    /// Depth, blend, raster or sampler state object.
    StateId
);
resource_id!(
    /// Compiled vertex or pixel program.
    ProgramId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba16Float,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::Rgba8Unorm => 4,
            TextureFormat::Rgba16Float => 8,
        }
    }
}

/// Sampled texture created from CPU pixel data. Mip level data is passed separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Render target + shader resource view pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargetDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Color attachment: the executor's swap target or a render target texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    BackBuffer,
    Texture(TextureId),
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const CONSTANT = 1 << 0;
        const VERTEX = 1 << 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    pub label: &'static str,
    pub size: u64,
    pub usage: BufferUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunc {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunc {
    pub const ALL: [CompareFunc; 8] = [
        CompareFunc::Never,
        CompareFunc::Less,
        CompareFunc::Equal,
        CompareFunc::LessEqual,
        CompareFunc::Greater,
        CompareFunc::NotEqual,
        CompareFunc::GreaterEqual,
        CompareFunc::Always,
    ];

    pub fn index(self) -> usize {
        match self {
            CompareFunc::Never => 0,
            CompareFunc::Less => 1,
            CompareFunc::Equal => 2,
            CompareFunc::LessEqual => 3,
            CompareFunc::Greater => 4,
            CompareFunc::NotEqual => 5,
            CompareFunc::GreaterEqual => 6,
            CompareFunc::Always => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DstColor,
    InvDstColor,
    DstAlpha,
    InvDstAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Point,
    #[default]
    Bilinear,
    Trilinear,
    Anisotropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    Wrap,
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthDesc {
    pub test: bool,
    pub write: bool,
    pub func: CompareFunc,
    pub stencil: bool,
}

impl DepthDesc {
    pub const DISABLED: DepthDesc =
        DepthDesc { test: false, write: false, func: CompareFunc::Always, stencil: false };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendDesc {
    pub enabled: bool,
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendDesc {
    pub const OPAQUE: BlendDesc =
        BlendDesc { enabled: false, src: BlendFactor::One, dst: BlendFactor::Zero };
    pub const ADDITIVE: BlendDesc =
        BlendDesc { enabled: true, src: BlendFactor::One, dst: BlendFactor::One };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterDesc {
    pub cull: bool,
    pub front_face: FrontFace,
    pub wireframe: bool,
    pub scissor: bool,
}

impl RasterDesc {
    pub const FULL_SCREEN: RasterDesc =
        RasterDesc { cull: false, front_face: FrontFace::Clockwise, wireframe: false, scissor: false };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub filter: FilterMode,
    pub address: AddressMode,
}

impl SamplerDesc {
    pub const POINT_CLAMP: SamplerDesc =
        SamplerDesc { filter: FilterMode::Point, address: AddressMode::Clamp };
    pub const LINEAR_CLAMP: SamplerDesc =
        SamplerDesc { filter: FilterMode::Bilinear, address: AddressMode::Clamp };
}

/// Fixed-function state object. Each variant is created, bound and released independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateDesc {
    Depth(DepthDesc),
    Blend(BlendDesc),
    Raster(RasterDesc),
    Sampler(SamplerDesc),
}

impl StateDesc {
    pub fn kind(&self) -> &'static str {
        match self {
            StateDesc::Depth(_) => "depth state",
            StateDesc::Blend(_) => "blend state",
            StateDesc::Raster(_) => "raster state",
            StateDesc::Sampler(_) => "sampler state",
        }
    }
}

/// Programs the core asks an executor to compile. Shader source is owned by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Transforms batch vertices by model/view/projection.
    GeometryVertex,
    /// Passes clip-space quad vertices straight through.
    FullScreenVertex,
    /// Writes the G-Buffer; `Some(op)` discards fragments whose alpha fails `op` against the reference.
    GeometryPixel(Option<CompareFunc>),
    AmbientPixel,
    OmniPixel,
    PassThroughPixel,
    LdrSubtractPixel,
    ToneMapPixel,
    BlurHorizontalPixel,
    BlurVerticalPixel,
}

impl ProgramKind {
    pub fn is_vertex(self) -> bool {
        matches!(self, ProgramKind::GeometryVertex | ProgramKind::FullScreenVertex)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height, min_depth: 0.0, max_depth: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}
