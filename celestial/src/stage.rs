//! 各画面共用的布景：摄像机、灯光与界面元素的固定样式。

use nalgebra::{Point2, Vector3};

use celestial_core::{
    color::Color,
    game::{
        component::{camera::Camera, light::Light, node::Node, node::NodeId, transform::Transform},
        overlay::{ButtonContent, Element, LabelContent, Rect},
        scene::Scene,
    },
    text::FontDescriptor,
};

/// 画布尺寸（点）。
pub const CANVAS_WIDTH: f32 = 1000.0;
pub const CANVAS_HEIGHT: f32 = 800.0;

pub const POPUP_WINDOW: &str = "Icons/popup-window.png";
pub const POPUP_FRAME: Rect = Rect::new(70.0, 175.0, 640.0, 400.0);
/// 弹窗内正文相对弹窗的位置。
pub const POPUP_TEXT_FRAME: Rect = Rect::new(20.0, 20.0, 610.0, 350.0);
pub const POPUP_TEXT_SIZE: f32 = 20.0;

/// 底部居中的大号文字按钮（Explore / Back）。
pub const BOTTOM_BUTTON_FRAME: Rect = Rect::new(307.5, 630.0, 180.0, 90.0);
const BOTTOM_BUTTON_TEXT_SIZE: f32 = 45.0;

pub const FADE_DURATION: f32 = 1.5;

const CAMERA_POSITION: [f32; 3] = [4.0, 0.0, 30.0];
const LIGHT_POSITION: [f32; 3] = [0.0, 10.0, 10.0];

/// 在根节点下放置摄像机（位于 (4, 0, 30)，朝 -Z）并设为视点。
pub fn place_camera(scene: &mut Scene) -> anyhow::Result<NodeId> {
    let root = scene.root();
    let camera = scene.add_node(
        root,
        Node::new("camera")?
            .with_camera(Camera::new())
            .with_transform(Transform::at(Vector3::from(CAMERA_POSITION))),
    )?;
    scene.set_point_of_view(camera)?;
    Ok(camera)
}

/// 位于 (0, 10, 10) 的白色点光源。
pub fn add_light(scene: &mut Scene) -> anyhow::Result<NodeId> {
    let root = scene.root();
    let light = scene.add_node(
        root,
        Node::new("omni_light")?
            .with_light(Light::omni())
            .with_transform(Transform::at(Vector3::from(LIGHT_POSITION))),
    )?;
    Ok(light)
}

/// 深灰色环境光。
pub fn add_ambient_light(scene: &mut Scene) -> anyhow::Result<NodeId> {
    let root = scene.root();
    let light = scene.add_node(
        root,
        Node::new("ambient_light")?.with_light(Light::ambient(Color::DARK_GRAY)),
    )?;
    Ok(light)
}

/// 白色细体标签，初始透明。
pub fn thin_label(frame: Rect, text: &str, size: f32) -> Element {
    Element::label(
        frame,
        LabelContent::new(text)
            .font(FontDescriptor::thin(), size)
            .color(Color::WHITE),
    )
    .with_alpha(0.0)
}

/// 底部白框文字按钮，初始透明且不可点击。
pub fn bottom_button(title: &str, border_width: f32) -> Element {
    Element::button(
        BOTTOM_BUTTON_FRAME,
        ButtonContent::titled(title, FontDescriptor::thin(), BOTTOM_BUTTON_TEXT_SIZE)
            .border(border_width, Color::WHITE),
    )
    .with_alpha(0.0)
}

/// 弹窗正文：系统字体 20 点，最多 `lines` 行。
pub fn popup_text(text: &str, lines: usize) -> Element {
    Element::label(
        POPUP_TEXT_FRAME,
        LabelContent::new(text)
            .font(FontDescriptor::system(), POPUP_TEXT_SIZE)
            .lines(lines),
    )
}

/// 指引线的固定起点（画面中心附近）。
pub fn pointer_origin() -> Point2<f32> {
    Point2::new(405.0, 400.0)
}

/// 从固定起点指向 `frame` 中心下方 20 点处。
pub fn pointer_target(frame: Rect) -> Point2<f32> {
    let center = frame.center();
    Point2::new(center.x, center.y + 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_nodes_are_placed() {
        let mut scene = Scene::new();
        let camera = place_camera(&mut scene).expect("应能放置摄像机");
        let light = add_light(&mut scene).expect("应能添加点光源");
        add_ambient_light(&mut scene).expect("应能添加环境光");

        assert_eq!(scene.point_of_view(), Some(camera));
        assert_eq!(
            scene.node(light).map(|n| n.transform.position()),
            Some(Vector3::new(0.0, 10.0, 10.0))
        );
        assert_eq!(scene.lights().len(), 2);
        assert!((scene.ambient()[0] - 1.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn pointer_targets_below_label_center() {
        let target = pointer_target(Rect::new(200.0, 200.0, 300.0, 300.0));
        assert_eq!(target, Point2::new(350.0, 370.0));
    }
}
