//! render-api descriptors to wgpu types.

use render_api::{
    AddressMode, BlendDesc, BlendFactor, CompareFunc, FilterMode, FrontFace, PrimitiveTopology, SamplerDesc,
    TextureFormat,
};

pub fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
    }
}

pub fn compare(func: CompareFunc) -> wgpu::CompareFunction {
    match func {
        CompareFunc::Never => wgpu::CompareFunction::Never,
        CompareFunc::Less => wgpu::CompareFunction::Less,
        CompareFunc::Equal => wgpu::CompareFunction::Equal,
        CompareFunc::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunc::Greater => wgpu::CompareFunction::Greater,
        CompareFunc::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunc::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunc::Always => wgpu::CompareFunction::Always,
    }
}

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::InvSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::InvDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::InvDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
    }
}

/// Same factors for color and alpha; `None` when blending is off.
pub fn blend_state(desc: BlendDesc) -> Option<wgpu::BlendState> {
    if !desc.enabled {
        return None;
    }
    let component = wgpu::BlendComponent {
        src_factor: blend_factor(desc.src),
        dst_factor: blend_factor(desc.dst),
        operation: wgpu::BlendOperation::Add,
    };
    Some(wgpu::BlendState { color: component, alpha: component })
}

pub fn front_face(face: FrontFace) -> wgpu::FrontFace {
    match face {
        FrontFace::Clockwise => wgpu::FrontFace::Cw,
        FrontFace::CounterClockwise => wgpu::FrontFace::Ccw,
    }
}

pub fn topology(topology: PrimitiveTopology) -> wgpu::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => wgpu::PrimitiveTopology::PointList,
        PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
        PrimitiveTopology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

pub fn sampler_descriptor(desc: SamplerDesc) -> wgpu::SamplerDescriptor<'static> {
    let address = match desc.address {
        AddressMode::Wrap => wgpu::AddressMode::Repeat,
        AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
    };
    let (filter, mipmap, anisotropy) = match desc.filter {
        FilterMode::Point => (wgpu::FilterMode::Nearest, wgpu::FilterMode::Nearest, 1),
        FilterMode::Bilinear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Nearest, 1),
        FilterMode::Trilinear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Linear, 1),
        FilterMode::Anisotropic => (wgpu::FilterMode::Linear, wgpu::FilterMode::Linear, 16),
    };
    wgpu::SamplerDescriptor {
        label: Some("ember_sampler"),
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: mipmap,
        anisotropy_clamp: anisotropy,
        ..Default::default()
    }
}
