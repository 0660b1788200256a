use std::{borrow::Cow, collections::HashMap};

use anyhow::anyhow;
use nalgebra::Vector2;
use tracing::{debug, warn};
use wgpu::{self, util::DeviceExt};

use crate::{
    game::overlay::{DrawItem, DrawTexture, TextRequest},
    resource::{AssetBundle, ResourcePath},
    text::{Font, TextStyleOptions, rasterize_label},
};

use super::{
    RenderSystem,
    cache::RenderContext,
    resource_io,
    texture::{self, TextureBinding},
    util,
};

const OVERLAY_SHADER: &str = "shaders/overlay.wgsl";
/// 每个顶点：位置 2 + UV 2 + 局部坐标 2 + 尺寸 2 + 颜色 4 + 参数 4。
const OVERLAY_VERTEX_FLOATS: usize = 16;
const OVERLAY_VERTICES_PER_ITEM: usize = 6;

#[derive(Default)]
pub(in crate::game::system::render) struct OverlayPipelineCache {
    pipeline: Option<OverlayPipeline>,
}

impl OverlayPipelineCache {
    fn ensure(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        bundle: &AssetBundle,
    ) -> anyhow::Result<&OverlayPipeline> {
        let needs_rebuild = self
            .pipeline
            .as_ref()
            .map(|pipeline| pipeline.format != format)
            .unwrap_or(true);
        if needs_rebuild {
            self.pipeline = Some(OverlayPipeline::new(device, format, bundle)?);
        }
        self.pipeline
            .as_ref()
            .ok_or_else(|| anyhow!("overlay pipeline missing after initialization"))
    }
}

struct OverlayPipeline {
    pipeline: wgpu::RenderPipeline,
    frame_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
}

impl OverlayPipeline {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        bundle: &AssetBundle,
    ) -> anyhow::Result<Self> {
        let source = resource_io::load_shader_source(bundle, OVERLAY_SHADER)?;
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Overlay Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
        });

        let frame_layout = texture::uniform_layout(
            device,
            "Overlay Frame Layout",
            wgpu::ShaderStages::VERTEX,
            None,
        );
        let texture_layout = texture::texture_layout(device, "Overlay Texture Layout");
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Overlay Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Overlay Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[OVERLAY_VERTEX_LAYOUT],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            pipeline,
            frame_layout,
            texture_layout,
            format,
        })
    }
}

struct CachedText {
    binding: Option<TextureBinding>,
    used: bool,
}

/// 界面层纹理缓存。
///
/// 图片按资源路径缓存且常驻；文字纹理按排版参数缓存，一帧未使用即淘汰。
/// 失败的条目记为 `None`，只告警一次，对应元素不绘制。
#[derive(Default)]
pub(in crate::game::system::render) struct OverlayTextureCache {
    sampler: Option<wgpu::Sampler>,
    white: Option<TextureBinding>,
    images: HashMap<ResourcePath, Option<TextureBinding>>,
    texts: HashMap<String, CachedText>,
}

impl OverlayTextureCache {
    pub(in crate::game::system::render) fn begin_frame(&mut self) {
        for text in self.texts.values_mut() {
            text.used = false;
        }
    }

    pub(in crate::game::system::render) fn end_frame(&mut self) {
        self.texts.retain(|_, text| text.used);
    }

    fn ensure_sampler(&mut self, device: &wgpu::Device) -> wgpu::Sampler {
        self.sampler
            .get_or_insert_with(|| {
                texture::linear_sampler(device, "Overlay Sampler", wgpu::AddressMode::ClampToEdge)
            })
            .clone()
    }

    fn prepare(
        &mut self,
        context: &TexturePrepareContext<'_>,
        items: &[DrawItem],
    ) -> anyhow::Result<()> {
        let TexturePrepareContext {
            device,
            queue,
            layout,
            bundle,
            scale,
        } = *context;

        if self.white.is_none() {
            let sampler = self.ensure_sampler(device);
            self.white = Some(TextureBinding::white(device, queue, layout, &sampler, "Overlay White")?);
        }

        for item in items {
            match &item.texture {
                None => {}
                Some(DrawTexture::Image(path)) => {
                    if self.images.contains_key(path) {
                        continue;
                    }
                    let sampler = self.ensure_sampler(device);
                    let loaded = resource_io::load_image(bundle, path).and_then(|image| {
                        TextureBinding::from_rgba(
                            device,
                            queue,
                            layout,
                            &sampler,
                            "Overlay Image",
                            image.rgba,
                            (image.width, image.height),
                        )
                    });
                    let entry = match loaded {
                        Ok(binding) => Some(binding),
                        Err(error) => {
                            warn!(
                                target: "celestial-core",
                                image = %path,
                                error = %error,
                                "failed to load overlay image, element skipped"
                            );
                            None
                        }
                    };
                    self.images.insert(path.clone(), entry);
                }
                Some(DrawTexture::Text(request)) => {
                    let key = request.cache_key(scale);
                    if let Some(cached) = self.texts.get_mut(&key) {
                        cached.used = true;
                        continue;
                    }
                    let sampler = self.ensure_sampler(device);
                    let binding = match rasterize_text(request, scale).and_then(|raster| {
                        TextureBinding::from_rgba(
                            device,
                            queue,
                            layout,
                            &sampler,
                            "Overlay Text",
                            raster.rgba,
                            (raster.width, raster.height),
                        )
                    }) {
                        Ok(binding) => Some(binding),
                        Err(error) => {
                            warn!(
                                target: "celestial-core",
                                text = %request.label.text,
                                error = %error,
                                "failed to rasterize overlay text"
                            );
                            None
                        }
                    };
                    self.texts.insert(
                        key,
                        CachedText {
                            binding,
                            used: true,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    /// 元素对应的绑定组；贴图不可用时返回 `None`。
    fn bind_group(&self, item: &DrawItem, scale: f32) -> Option<&wgpu::BindGroup> {
        let binding = match &item.texture {
            None => self.white.as_ref(),
            Some(DrawTexture::Image(path)) => self.images.get(path).and_then(Option::as_ref),
            Some(DrawTexture::Text(request)) => self
                .texts
                .get(&request.cache_key(scale))
                .and_then(|cached| cached.binding.as_ref()),
        };
        binding.map(|binding| &binding.bind_group)
    }
}

#[derive(Clone, Copy)]
struct TexturePrepareContext<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    layout: &'a wgpu::BindGroupLayout,
    bundle: &'a AssetBundle,
    scale: f32,
}

fn rasterize_text(
    request: &TextRequest,
    scale: f32,
) -> anyhow::Result<crate::text::RasterizedText> {
    let label = &request.label;
    let options = TextStyleOptions {
        font: Font::System(label.font.clone()),
        size: label.size,
        color: label.color,
        lines: label.lines,
        alignment: label.alignment,
    };
    let size_px = (
        (request.width * scale).ceil().max(1.0) as u32,
        (request.height * scale).ceil().max(1.0) as u32,
    );
    rasterize_label(&label.text, &options, size_px, scale)
}

/// 点到像素的比例。
fn canvas_scale(canvas: Vector2<f32>, framebuffer_size: (u32, u32)) -> f32 {
    if canvas.x <= 0.0 {
        return 1.0;
    }
    framebuffer_size.0.max(1) as f32 / canvas.x
}

/// 把绘制项展开为三角形顶点（每项两个三角形）。
fn overlay_vertices(items: &[DrawItem], format: wgpu::TextureFormat) -> Vec<f32> {
    let mut data = Vec::with_capacity(items.len() * OVERLAY_VERTICES_PER_ITEM * OVERLAY_VERTEX_FLOATS);
    for item in items {
        let color = util::target_color(item.color, format);
        let (w, h) = (item.size.x, item.size.y);
        let locals = [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]];
        let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        for corner in [0usize, 1, 2, 0, 2, 3] {
            let position = item.corners[corner];
            data.extend_from_slice(&[position.x, position.y]);
            data.extend_from_slice(&uvs[corner]);
            data.extend_from_slice(&locals[corner]);
            data.extend_from_slice(&[w, h]);
            data.extend_from_slice(&color);
            data.extend_from_slice(&[item.corner_radius, item.border_width, item.opacity, 0.0]);
        }
    }
    data
}

impl RenderSystem {
    /// 在 3D 画面之上绘制界面层。
    pub(in crate::game::system::render) fn render_overlay(
        items: &[DrawItem],
        canvas: Vector2<f32>,
        context: &mut RenderContext<'_, '_>,
    ) {
        if items.is_empty() {
            return;
        }
        if let Err(error) = Self::try_render_overlay(items, canvas, context) {
            warn!(
                target: "celestial-core",
                error = %error,
                "skip overlay rendering"
            );
        }
    }

    fn try_render_overlay(
        items: &[DrawItem],
        canvas: Vector2<f32>,
        context: &mut RenderContext<'_, '_>,
    ) -> anyhow::Result<()> {
        let device = context.device;
        let caches = &mut *context.caches;
        let pipeline = caches
            .overlay
            .ensure(device, context.surface_format, context.bundle)?;
        let scale = canvas_scale(canvas, context.framebuffer_size);

        caches.overlay_textures.prepare(
            &TexturePrepareContext {
                device,
                queue: context.queue,
                layout: &pipeline.texture_layout,
                bundle: context.bundle,
                scale,
            },
            items,
        )?;

        let frame_data = [canvas.x, canvas.y, 0.0, 0.0];
        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Overlay Frame Buffer"),
            contents: util::cast_slice_f32(&frame_data),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Overlay Frame Bind Group"),
            layout: &pipeline.frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let vertex_data = overlay_vertices(items, context.surface_format);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Overlay Vertex Buffer"),
            contents: util::cast_slice_f32(&vertex_data),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let mut pass = context
            .encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Overlay"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: context.target_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

        pass.set_pipeline(&pipeline.pipeline);
        pass.set_bind_group(0, &frame_bind_group, &[]);
        pass.set_vertex_buffer(0, vertex_buffer.slice(..));

        let mut drawn = 0usize;
        for (index, item) in items.iter().enumerate() {
            let Some(bind_group) = caches.overlay_textures.bind_group(item, scale) else {
                continue;
            };
            let first = (index * OVERLAY_VERTICES_PER_ITEM) as u32;
            pass.set_bind_group(1, bind_group, &[]);
            pass.draw(first..first + OVERLAY_VERTICES_PER_ITEM as u32, 0..1);
            drawn += 1;
        }

        debug!(
            target: "celestial-core",
            items = items.len(),
            drawn,
            "overlay rendered"
        );
        Ok(())
    }
}

const OVERLAY_VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 6] = [
    wgpu::VertexAttribute {
        offset: 0,
        shader_location: 0,
        format: wgpu::VertexFormat::Float32x2,
    },
    wgpu::VertexAttribute {
        offset: (std::mem::size_of::<f32>() * 2) as u64,
        shader_location: 1,
        format: wgpu::VertexFormat::Float32x2,
    },
    wgpu::VertexAttribute {
        offset: (std::mem::size_of::<f32>() * 4) as u64,
        shader_location: 2,
        format: wgpu::VertexFormat::Float32x2,
    },
    wgpu::VertexAttribute {
        offset: (std::mem::size_of::<f32>() * 6) as u64,
        shader_location: 3,
        format: wgpu::VertexFormat::Float32x2,
    },
    wgpu::VertexAttribute {
        offset: (std::mem::size_of::<f32>() * 8) as u64,
        shader_location: 4,
        format: wgpu::VertexFormat::Float32x4,
    },
    wgpu::VertexAttribute {
        offset: (std::mem::size_of::<f32>() * 12) as u64,
        shader_location: 5,
        format: wgpu::VertexFormat::Float32x4,
    },
];

const OVERLAY_VERTEX_LAYOUT: wgpu::VertexBufferLayout = wgpu::VertexBufferLayout {
    array_stride: (std::mem::size_of::<f32>() * OVERLAY_VERTEX_FLOATS) as u64,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &OVERLAY_VERTEX_ATTRIBUTES,
};
