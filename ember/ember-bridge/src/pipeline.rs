//! Shader modules, the shared bind group layout and the render pipeline cache.
//!
//! Every program uses one bind group: uniforms at 0 (object), 1 (light), 2 (post), textures at
//! 3..=6 and a sampler at 7. Pipelines are built on first use for each combination of programs,
//! fixed-function state, topology and attachment formats.

use std::collections::HashMap;

use render_api::{BlendDesc, CompareFunc, DepthDesc, PrimitiveTopology, ProgramKind, RasterDesc, MAX_SHADER_RESOURCES};

use crate::convert;

const GEOMETRY_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/geometry.wgsl"));
const LIGHTS_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/lights.wgsl"));
const POST_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/post.wgsl"));

pub const UNIFORM_SLOTS: u32 = 3;
pub const FIRST_TEXTURE_BINDING: u32 = UNIFORM_SLOTS;
pub const SAMPLER_BINDING: u32 = FIRST_TEXTURE_BINDING + MAX_SHADER_RESOURCES as u32;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;
/// Size of the zeroed buffer bound to unbound uniform slots; covers the largest block (object constants).
pub const FALLBACK_UNIFORM_SIZE: u64 = 512;

const VERTEX_STRIDE: u64 = 72;
const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x3,
    3 => Float32x3,
    4 => Float32x2,
    5 => Float32x4,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Module {
    Geometry,
    Lights,
    Post,
}

/// Module and entry point implementing `kind`.
pub fn entry_point(kind: ProgramKind) -> (Module, &'static str) {
    match kind {
        ProgramKind::GeometryVertex => (Module::Geometry, "vs_geometry"),
        ProgramKind::FullScreenVertex => (Module::Post, "vs_fullscreen"),
        ProgramKind::GeometryPixel(None) => (Module::Geometry, "fs_geometry"),
        ProgramKind::GeometryPixel(Some(func)) => (Module::Geometry, alpha_test_entry(func)),
        ProgramKind::AmbientPixel => (Module::Lights, "fs_ambient"),
        ProgramKind::OmniPixel => (Module::Lights, "fs_omni"),
        ProgramKind::PassThroughPixel => (Module::Post, "fs_pass_through"),
        ProgramKind::LdrSubtractPixel => (Module::Post, "fs_ldr_subtract"),
        ProgramKind::ToneMapPixel => (Module::Post, "fs_tone_map"),
        ProgramKind::BlurHorizontalPixel => (Module::Post, "fs_blur_horizontal"),
        ProgramKind::BlurVerticalPixel => (Module::Post, "fs_blur_vertical"),
    }
}

fn alpha_test_entry(func: CompareFunc) -> &'static str {
    match func {
        CompareFunc::Never => "fs_geometry_never",
        CompareFunc::Less => "fs_geometry_less",
        CompareFunc::Equal => "fs_geometry_equal",
        CompareFunc::LessEqual => "fs_geometry_less_equal",
        CompareFunc::Greater => "fs_geometry_greater",
        CompareFunc::NotEqual => "fs_geometry_not_equal",
        CompareFunc::GreaterEqual => "fs_geometry_greater_equal",
        CompareFunc::Always => "fs_geometry_always",
    }
}

/// Everything that selects a distinct `wgpu::RenderPipeline`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub vertex: ProgramKind,
    pub pixel: ProgramKind,
    pub blend: BlendDesc,
    pub depth: DepthDesc,
    pub raster: RasterDesc,
    pub topology: PrimitiveTopology,
    pub targets: Vec<wgpu::TextureFormat>,
    pub depth_attached: bool,
}

pub struct Shaders {
    geometry: wgpu::ShaderModule,
    lights: wgpu::ShaderModule,
    post: wgpu::ShaderModule,
}

impl Shaders {
    pub fn new(device: &wgpu::Device) -> Self {
        let module = |label: &'static str, source: &'static str| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        };
        Self {
            geometry: module("ember_geometry_shader", GEOMETRY_SHADER),
            lights: module("ember_lights_shader", LIGHTS_SHADER),
            post: module("ember_post_shader", POST_SHADER),
        }
    }

    pub fn module(&self, which: Module) -> &wgpu::ShaderModule {
        match which {
            Module::Geometry => &self.geometry,
            Module::Lights => &self.lights,
            Module::Post => &self.post,
        }
    }
}

pub fn create_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let mut entries = Vec::new();
    for binding in 0..UNIFORM_SLOTS {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }
    for slot in 0..MAX_SHADER_RESOURCES as u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: FIRST_TEXTURE_BINDING + slot,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: SAMPLER_BINDING,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    });
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("ember_bind_group_layout"),
        entries: &entries,
    })
}

pub struct PipelineCache {
    layout: wgpu::PipelineLayout,
    shaders: Shaders,
    polygon_line: bool,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub fn new(device: &wgpu::Device, bind_group_layout: &wgpu::BindGroupLayout, polygon_line: bool) -> Self {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ember_pipeline_layout"),
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        });
        Self { layout, shaders: Shaders::new(device), polygon_line, pipelines: HashMap::new() }
    }

    pub fn shaders(&self) -> &Shaders {
        &self.shaders
    }

    pub fn layout(&self) -> &wgpu::PipelineLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn get(&mut self, device: &wgpu::Device, key: &PipelineKey) -> &wgpu::RenderPipeline {
        if !self.pipelines.contains_key(key) {
            let pipeline = self.build(device, key);
            log::debug!("ember: built pipeline {:?}/{:?} ({} cached)", key.vertex, key.pixel, self.pipelines.len() + 1);
            self.pipelines.insert(key.clone(), pipeline);
        }
        &self.pipelines[key]
    }

    fn build(&self, device: &wgpu::Device, key: &PipelineKey) -> wgpu::RenderPipeline {
        let (vs_module, vs_entry) = entry_point(key.vertex);
        let (fs_module, fs_entry) = entry_point(key.pixel);
        let blend = convert::blend_state(key.blend);
        let targets: Vec<Option<wgpu::ColorTargetState>> = key
            .targets
            .iter()
            .map(|&format| Some(wgpu::ColorTargetState { format, blend, write_mask: wgpu::ColorWrites::ALL }))
            .collect();
        let polygon_mode = if key.raster.wireframe && self.polygon_line {
            wgpu::PolygonMode::Line
        } else {
            wgpu::PolygonMode::Fill
        };
        let depth_stencil = key.depth_attached.then(|| wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: key.depth.test && key.depth.write,
            depth_compare: if key.depth.test { convert::compare(key.depth.func) } else { wgpu::CompareFunction::Always },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("ember_pipeline"),
            layout: Some(&self.layout),
            vertex: wgpu::VertexState {
                module: self.shaders.module(vs_module),
                entry_point: Some(vs_entry),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: VERTEX_STRIDE,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &VERTEX_ATTRIBUTES,
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: self.shaders.module(fs_module),
                entry_point: Some(fs_entry),
                targets: &targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: convert::topology(key.topology),
                strip_index_format: None,
                front_face: convert::front_face(key.raster.front_face),
                cull_mode: key.raster.cull.then_some(wgpu::Face::Back),
                unclipped_depth: false,
                polygon_mode,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }
}
