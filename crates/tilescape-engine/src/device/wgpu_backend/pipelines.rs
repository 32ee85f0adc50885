use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use crate::device::{Program, StencilOp, StencilState, Vertex};

pub(super) const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
pub(super) const STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) enum ProgramKind {
    Textured,
    ColorMatrix,
    Blur,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) enum StencilKey {
    Disabled,
    Increment,
    Decrement,
    Replace,
    TestEqual,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) struct PipelineKey {
    pub program: ProgramKind,
    pub stencil: StencilKey,
    pub format: wgpu::TextureFormat,
}

impl PipelineKey {
    pub fn new(program: &Program, stencil: StencilState, format: wgpu::TextureFormat) -> Self {
        let program = match program {
            Program::Textured => ProgramKind::Textured,
            Program::ColorMatrix(_) => ProgramKind::ColorMatrix,
            Program::Blur { .. } => ProgramKind::Blur,
        };
        let stencil = match stencil {
            StencilState::Disabled => StencilKey::Disabled,
            StencilState::Write { op: StencilOp::Increment, .. } => StencilKey::Increment,
            StencilState::Write { op: StencilOp::Decrement, .. } => StencilKey::Decrement,
            StencilState::Write { op: StencilOp::Replace, .. } => StencilKey::Replace,
            StencilState::TestEqual(_) => StencilKey::TestEqual,
        };
        Self { program, stencil, format }
    }
}

pub(super) fn stencil_reference(state: StencilState) -> u32 {
    match state {
        StencilState::Disabled => 0,
        StencilState::Write { reference, .. } | StencilState::TestEqual(reference) => reference,
    }
}

/// Per-draw uniform block, mirrored by `DrawUniform` in `quad.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct DrawUniform {
    pub area: [f32; 4],
    pub translate: [f32; 2],
    pub direction: [f32; 2],
    pub matrix: [[f32; 4]; 5],
}

impl DrawUniform {
    pub fn new(area: [f32; 4], translate: [f32; 2], program: &Program) -> Self {
        let mut u = Self {
            area,
            translate,
            direction: [0.0; 2],
            matrix: [[0.0; 4]; 5],
        };
        match program {
            Program::Textured => {}
            Program::Blur { direction } => u.direction = *direction,
            Program::ColorMatrix(m) => {
                // Row-major 4x5 into five columns.
                for (col, out) in u.matrix.iter_mut().enumerate() {
                    *out = [m[col], m[5 + col], m[10 + col], m[15 + col]];
                }
            }
        }
        u
    }
}

const VERTEX_ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    0 => Float32x2, // position
    1 => Float32x2, // tex_coord
    2 => Float32x4, // frame
    3 => Float32x4, // color
    4 => Float32    // page
];

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRS,
    }
}

fn premul_alpha_blend() -> wgpu::BlendState {
    let c = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState { color: c, alpha: c }
}

fn stencil_state(key: StencilKey) -> wgpu::StencilState {
    let (compare, pass_op) = match key {
        StencilKey::Disabled => (wgpu::CompareFunction::Always, wgpu::StencilOperation::Keep),
        StencilKey::Increment => (wgpu::CompareFunction::Equal, wgpu::StencilOperation::IncrementClamp),
        StencilKey::Decrement => (wgpu::CompareFunction::Equal, wgpu::StencilOperation::DecrementClamp),
        StencilKey::Replace => (wgpu::CompareFunction::Always, wgpu::StencilOperation::Replace),
        StencilKey::TestEqual => (wgpu::CompareFunction::Equal, wgpu::StencilOperation::Keep),
    };
    let face = wgpu::StencilFaceState {
        compare,
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op,
    };
    wgpu::StencilState {
        front: face,
        back: face,
        read_mask: 0xFF,
        write_mask: 0xFF,
    }
}

/// Shader module, layouts and every pipeline variant built so far.
pub(super) struct Pipelines {
    shader: wgpu::ShaderModule,
    pub uniform_layout: wgpu::BindGroupLayout,
    pub texture_layout: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
    cache: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl Pipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tilescape quad shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/quad.wgsl").into()),
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tilescape draw uniform bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<DrawUniform>() as u64
                    ),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tilescape texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tilescape pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            immediate_size: 0,
        });

        Self {
            shader,
            uniform_layout,
            texture_layout,
            layout,
            cache: HashMap::new(),
        }
    }

    pub fn ensure(&mut self, device: &wgpu::Device, key: PipelineKey) {
        if self.cache.contains_key(&key) {
            return;
        }
        let pipeline = self.build(device, key);
        log::debug!("built pipeline {key:?}");
        self.cache.insert(key, pipeline);
    }

    pub fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.cache.get(key)
    }

    fn build(&self, device: &wgpu::Device, key: PipelineKey) -> wgpu::RenderPipeline {
        let fragment_entry = match key.program {
            ProgramKind::Textured => "fs_textured",
            ProgramKind::ColorMatrix => "fs_color_matrix",
            ProgramKind::Blur => "fs_blur",
        };
        let write_mask = match key.stencil {
            StencilKey::Increment | StencilKey::Decrement | StencilKey::Replace => {
                wgpu::ColorWrites::empty()
            }
            StencilKey::Disabled | StencilKey::TestEqual => wgpu::ColorWrites::ALL,
        };

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("tilescape quad pipeline"),
            layout: Some(&self.layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[vertex_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some(fragment_entry),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend: Some(premul_alpha_blend()),
                    write_mask,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: STENCIL_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: stencil_state(key.stencil),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_matrix_is_stored_column_wise() {
        let mut m = [0.0; 20];
        m[0] = 1.0; // r <- r
        m[4] = 0.25; // r offset
        m[18] = 1.0; // a <- a
        let u = DrawUniform::new([0.0; 4], [0.0; 2], &Program::ColorMatrix(m));
        assert_eq!(u.matrix[0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(u.matrix[3], [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(u.matrix[4], [0.25, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn draw_uniform_size_matches_shader_block() {
        assert_eq!(std::mem::size_of::<DrawUniform>(), 112);
    }
}
