use std::collections::HashMap;

use anyhow::anyhow;
use tracing::warn;
use wgpu;

use crate::resource::{AssetBundle, ResourcePath};

use super::super::{resource_io, texture::{self, TextureBinding}};

/// 3D 材质贴图缓存，按资源路径索引。
///
/// 读取或解码失败的贴图记为 `None`，只告警一次，之后用白色默认贴图代替。
#[derive(Default)]
pub(in crate::game::system::render) struct Scene3DMaterialCache {
    sampler: Option<wgpu::Sampler>,
    default: Option<TextureBinding>,
    textures: HashMap<ResourcePath, Option<TextureBinding>>,
}

impl Scene3DMaterialCache {
    fn ensure_sampler(&mut self, device: &wgpu::Device) -> wgpu::Sampler {
        self.sampler
            .get_or_insert_with(|| {
                texture::linear_sampler(device, "Scene3D Material Sampler", wgpu::AddressMode::Repeat)
            })
            .clone()
    }

    fn ensure_default(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
    ) -> anyhow::Result<()> {
        if self.default.is_none() {
            let sampler = self.ensure_sampler(device);
            self.default = Some(TextureBinding::white(
                device,
                queue,
                layout,
                &sampler,
                "Scene3D Default Material",
            )?);
        }
        Ok(())
    }

    /// 准备本帧要用到的贴图（含默认白色贴图）。
    pub(in crate::game::system::render) fn prepare<'p>(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        bundle: &AssetBundle,
        paths: impl IntoIterator<Item = &'p ResourcePath>,
    ) -> anyhow::Result<()> {
        self.ensure_default(device, queue, layout)?;

        for path in paths {
            if self.textures.contains_key(path) {
                continue;
            }
            let sampler = self.ensure_sampler(device);
            let loaded = resource_io::load_image(bundle, path).and_then(|image| {
                TextureBinding::from_rgba(
                    device,
                    queue,
                    layout,
                    &sampler,
                    "Scene3D Material Texture",
                    image.rgba,
                    (image.width, image.height),
                )
            });
            let entry = match loaded {
                Ok(binding) => Some(binding),
                Err(error) => {
                    warn!(
                        target: "celestial-core",
                        texture = %path,
                        error = %error,
                        "failed to prepare 3D material texture, fallback to white"
                    );
                    None
                }
            };
            self.textures.insert(path.clone(), entry);
        }
        Ok(())
    }

    /// 取得已准备好的绑定组；没有贴图或贴图失败时返回默认白色贴图。
    pub(in crate::game::system::render) fn bind_group(
        &self,
        path: Option<&ResourcePath>,
    ) -> anyhow::Result<&wgpu::BindGroup> {
        path.and_then(|path| self.textures.get(path))
            .and_then(Option::as_ref)
            .or(self.default.as_ref())
            .map(|binding| &binding.bind_group)
            .ok_or_else(|| anyhow!("default 3D material texture not prepared"))
    }
}
