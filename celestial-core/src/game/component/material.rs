use crate::{color::Color, resource::ResourcePath};

/// 漫反射来源。
#[derive(Debug, Clone, PartialEq)]
pub enum Diffuse {
    /// 纯色（alpha < 1 时按半透明绘制）。
    Color(Color),
    /// 资源包内的图片，按形状 UV 采样。
    Texture(ResourcePath),
}

/// 光照模型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightingModel {
    /// 漫反射（受点光源与环境光影响）。
    #[default]
    Lambert,
    /// 不受光照影响，直接输出漫反射颜色。
    Constant,
}

/// 表面材质。
///
/// 纹理加载失败时渲染路径会退化为白色并记录一次警告。
///
/// # 示例
///
/// ```no_run
/// use celestial_core::{color::Color, game::component::material::Material};
///
/// let ring = Material::color(Color::rgba(0.98, 0.98, 0.98, 0.4));
/// assert!(ring.is_transparent());
///
/// let earth = Material::texture("Textures/earth.jpg");
/// assert!(!earth.is_transparent());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    diffuse: Diffuse,
    lighting: LightingModel,
}

impl Default for Material {
    fn default() -> Self {
        Self::color(Color::WHITE)
    }
}

impl Material {
    pub fn color(color: Color) -> Self {
        Self {
            diffuse: Diffuse::Color(color),
            lighting: LightingModel::Lambert,
        }
    }

    pub fn texture(path: impl Into<ResourcePath>) -> Self {
        Self {
            diffuse: Diffuse::Texture(path.into()),
            lighting: LightingModel::Lambert,
        }
    }

    pub fn with_lighting(mut self, lighting: LightingModel) -> Self {
        self.lighting = lighting;
        self
    }

    pub fn diffuse(&self) -> &Diffuse {
        &self.diffuse
    }

    pub fn set_diffuse(&mut self, diffuse: Diffuse) {
        self.diffuse = diffuse;
    }

    pub fn lighting(&self) -> LightingModel {
        self.lighting
    }

    /// 顶点色：纯色材质为其颜色，纹理材质为白色（由纹理决定最终颜色）。
    pub fn tint(&self) -> Color {
        match &self.diffuse {
            Diffuse::Color(color) => *color,
            Diffuse::Texture(_) => Color::WHITE,
        }
    }

    pub fn texture_path(&self) -> Option<&ResourcePath> {
        match &self.diffuse {
            Diffuse::Texture(path) => Some(path),
            Diffuse::Color(_) => None,
        }
    }

    /// 是否需要走半透明绘制路径。
    pub fn is_transparent(&self) -> bool {
        !self.tint().is_opaque()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_material_uses_white_tint() {
        let material = Material::texture("Textures/sun.jpg");
        assert_eq!(material.tint(), Color::WHITE);
        assert_eq!(
            material.texture_path().map(ToString::to_string).as_deref(),
            Some("Textures/sun.jpg")
        );
    }

    #[test]
    fn constant_lighting_is_kept() {
        let material = Material::color(Color::WHITE).with_lighting(LightingModel::Constant);
        assert_eq!(material.lighting(), LightingModel::Constant);
        assert!(material.texture_path().is_none());
    }
}
