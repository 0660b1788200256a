use crate::color::Color;

/// 光源类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    /// 点光源：位置取自节点的世界矩阵，向四周均匀发光。
    Omni,
    /// 环境光：与位置无关，均匀照亮所有受光照的表面。
    Ambient,
}

/// 挂在场景节点上的光源。
///
/// `lightness` 会被限制为非负有限数，最终贡献为 `color × lightness`。
///
/// # 示例
///
/// ```no_run
/// use celestial_core::{color::Color, game::component::light::Light};
///
/// let omni = Light::omni();
/// let ambient = Light::ambient(Color::DARK_GRAY);
/// assert!(omni.lightness() > 0.0 && ambient.lightness() > 0.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    kind: LightKind,
    color: Color,
    lightness: f32,
}

impl Light {
    /// 白色点光源。
    pub fn omni() -> Self {
        Self::new(LightKind::Omni, Color::WHITE)
    }

    pub fn ambient(color: Color) -> Self {
        Self::new(LightKind::Ambient, color)
    }

    pub fn new(kind: LightKind, color: Color) -> Self {
        Self {
            kind,
            color,
            lightness: 1.0,
        }
    }

    pub fn kind(&self) -> LightKind {
        self.kind
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// 获取光照强度。
    pub fn lightness(&self) -> f32 {
        self.lightness
    }

    /// 设置光照强度。
    ///
    /// - 非有限值会被忽略。
    /// - 负数会被 clamp 到 0。
    pub fn set_lightness(&mut self, value: f32) {
        if value.is_finite() {
            self.lightness = value.max(0.0);
        }
    }

    /// 光照贡献（线性缩放后的 RGB）。
    pub fn radiance(&self) -> [f32; 3] {
        [
            self.color.r * self.lightness,
            self.color.g * self.lightness,
            self.color.b * self.lightness,
        ]
    }
}
