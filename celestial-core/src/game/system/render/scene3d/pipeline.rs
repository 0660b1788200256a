use std::borrow::Cow;

use anyhow::anyhow;
use wgpu;

use crate::resource::AssetBundle;

use super::super::{resource_io, texture};
use super::{DRAW_UNIFORM_FLOATS, SCENE3D_DEPTH_FORMAT};

const SCENE3D_SHADER: &str = "shaders/scene3d.wgsl";

/// 按目标格式缓存的 3D 管线组。
#[derive(Default)]
pub(in crate::game::system::render) struct Scene3DPipelineCache {
    pipelines: Option<Scene3DPipelines>,
}

impl Scene3DPipelineCache {
    pub(in crate::game::system::render) fn ensure(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        bundle: &AssetBundle,
    ) -> anyhow::Result<&Scene3DPipelines> {
        let needs_rebuild = self
            .pipelines
            .as_ref()
            .map(|pipelines| pipelines.format != format)
            .unwrap_or(true);

        if needs_rebuild {
            self.pipelines = Some(Scene3DPipelines::new(device, format, bundle)?);
        }

        self.pipelines
            .as_ref()
            .ok_or_else(|| anyhow!("Scene3D pipelines missing after initialization"))
    }
}

/// 不透明与半透明两条管线，共用绑定组布局。
pub(in crate::game::system::render) struct Scene3DPipelines {
    pub(in crate::game::system::render) opaque: wgpu::RenderPipeline,
    pub(in crate::game::system::render) transparent: wgpu::RenderPipeline,
    pub(in crate::game::system::render) scene_layout: wgpu::BindGroupLayout,
    pub(in crate::game::system::render) material_layout: wgpu::BindGroupLayout,
    pub(in crate::game::system::render) draw_layout: wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
}

impl Scene3DPipelines {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        bundle: &AssetBundle,
    ) -> anyhow::Result<Self> {
        let source = resource_io::load_shader_source(bundle, SCENE3D_SHADER)?;
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene3D Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
        });

        let scene_layout = texture::uniform_layout(
            device,
            "Scene3D Uniform Layout",
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            None,
        );
        let material_layout = texture::texture_layout(device, "Scene3D Material Layout");
        let draw_layout = texture::uniform_layout(
            device,
            "Scene3D Draw Layout",
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            Some((DRAW_UNIFORM_FLOATS * std::mem::size_of::<f32>()) as u64),
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene3D Pipeline Layout"),
            bind_group_layouts: &[&scene_layout, &material_layout, &draw_layout],
            push_constant_ranges: &[],
        });

        let opaque = Self::create_pipeline(
            device,
            &pipeline_layout,
            &module,
            format,
            "Scene3D Opaque Pipeline",
            true,
            wgpu::BlendState::REPLACE,
        );
        // 半透明物体已按从远到近排序，只做深度测试不写深度
        let transparent = Self::create_pipeline(
            device,
            &pipeline_layout,
            &module,
            format,
            "Scene3D Transparent Pipeline",
            false,
            wgpu::BlendState::ALPHA_BLENDING,
        );

        Ok(Self {
            opaque,
            transparent,
            scene_layout,
            material_layout,
            draw_layout,
            format,
        })
    }

    fn create_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        module: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
        label: &str,
        depth_write_enabled: bool,
        blend: wgpu::BlendState,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: &[SCENE3D_VERTEX_LAYOUT],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // 圆环与星点从内外两侧都可见
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: SCENE3D_DEPTH_FORMAT,
                depth_write_enabled,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        })
    }
}

const SCENE3D_VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] = [
    wgpu::VertexAttribute {
        offset: 0,
        shader_location: 0,
        format: wgpu::VertexFormat::Float32x3,
    },
    wgpu::VertexAttribute {
        offset: (std::mem::size_of::<f32>() * 3) as u64,
        shader_location: 1,
        format: wgpu::VertexFormat::Float32x3,
    },
    wgpu::VertexAttribute {
        offset: (std::mem::size_of::<f32>() * 6) as u64,
        shader_location: 2,
        format: wgpu::VertexFormat::Float32x2,
    },
];

/// 每个顶点：位置 3 + 法线 3 + UV 2。
pub(in crate::game::system::render) const SCENE3D_VERTEX_FLOATS: usize = 8;

const SCENE3D_VERTEX_LAYOUT: wgpu::VertexBufferLayout = wgpu::VertexBufferLayout {
    array_stride: (std::mem::size_of::<f32>() * SCENE3D_VERTEX_FLOATS) as u64,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &SCENE3D_VERTEX_ATTRIBUTES,
};
