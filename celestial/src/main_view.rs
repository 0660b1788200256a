//! 太阳系主画面。

use anyhow::Result;
use async_trait::async_trait;
use nalgebra::{Point2, Vector3};
use tracing::{debug, info, warn};

use celestial_core::{
    color::Color,
    event::{Event, Gesture},
    game::{
        component::{
            material::{LightingModel, Material},
            node::{Node, NodeId},
            shape::Shape,
        },
        overlay::{ButtonContent, Element, ElementId, Rect},
        scene::Scene,
        system::logic::{AppContext, Transition, View, ViewController},
    },
};

use crate::{
    stage::{self, FADE_DURATION, POPUP_FRAME, POPUP_WINDOW},
    structure::StructureController,
    universe::{PlanetarySystem, SOLAR_PLANETS, SOLAR_SYSTEM},
};

const INFO_BUTTON: &str = "Icons/info-button.png";
const INFO_BUTTON_FRAME: Rect = Rect::new(675.0, 50.0, 50.0, 50.0);
const CREDITS: &str = "Textures: www.solarsystemscope.com\nBackground music: Nicolai Heidlas (Pulsar)\nSound effects: drzhnn";
const CREDITS_LINES: usize = 4;

/// 相对默认机位的偏移，让整个行星系略微俯视地落在画面里。
const CAMERA_OFFSET: [f32; 3] = [1.0, 10.0, 7.0];
const CAMERA_PITCH: f32 = -0.225;

const STAR_COUNT: usize = 1200;
const STAR_INNER_RADIUS: f32 = 150.0;
const STAR_OUTER_RADIUS: f32 = 400.0;
const STAR_SEED: u64 = 0x5EED_57A2;
/// 远裁剪面要覆盖整个星空球壳。
const CAMERA_NEAR: f32 = 0.1;
const CAMERA_FAR: f32 = STAR_OUTER_RADIUS * 1.25;

#[derive(Debug, Clone, Copy)]
struct MainViews {
    info_button: ElementId,
    info_window: ElementId,
}

/// 太阳系主画面：可旋转缩放的场景，点击行星查看其内部结构。
pub struct MainController {
    system: Option<PlanetarySystem>,
    views: Option<MainViews>,
}

impl Default for MainController {
    fn default() -> Self {
        Self::new()
    }
}

impl MainController {
    pub fn new() -> Self {
        Self {
            system: None,
            views: None,
        }
    }

    /// 点击位置最近的命中节点若是行星，则呈现它的结构画面。
    fn handle_tap(&self, view: &View, position: Point2<f32>) -> Option<Transition> {
        let hits = match view.hit_test(position) {
            Ok(hits) => hits,
            Err(err) => {
                warn!(target: "celestial", error = %err, "hit test failed");
                return None;
            }
        };
        let nearest = hits.first()?;
        let body = self.system.as_ref()?.body_for(nearest.node)?;

        info!(target: "celestial", planet = body.name(), "show planet structure");
        Some(Transition::Present(Box::new(StructureController::new(
            body.clone(),
        ))))
    }

    fn toggle_info(view: &mut View, views: MainViews) {
        let Some(window) = view.overlay.element(views.info_window) else {
            return;
        };
        let target = if window.alpha() == 0.0 { 1.0 } else { 0.0 };
        debug!(target: "celestial", visible = target > 0.0, "toggle info window");
        view.overlay
            .animate(FADE_DURATION, |o| o.set_alpha(views.info_window, target));
    }
}

/// 随摄像机移动的星空背景，不参与拾取、不受光照。
fn add_star_field(scene: &mut Scene, camera: NodeId) -> Result<NodeId> {
    let stars = Node::new("stars")?
        .with_shape(Shape::star_field(
            STAR_COUNT,
            STAR_INNER_RADIUS,
            STAR_OUTER_RADIUS,
            STAR_SEED,
        ))
        .with_material(Material::color(Color::WHITE).with_lighting(LightingModel::Constant))
        .not_pickable();
    Ok(scene.add_node(camera, stars)?)
}

#[async_trait]
impl ViewController for MainController {
    fn name(&self) -> &str {
        "main"
    }

    async fn load(&mut self, view: &mut View, context: &AppContext) -> Result<()> {
        let scene = &mut view.scene;
        let camera = stage::place_camera(scene)?;
        if let Some(node) = scene.node_mut(camera) {
            node.transform.translate(Vector3::from(CAMERA_OFFSET));
            node.transform.rotate(Vector3::new(CAMERA_PITCH, 0.0, 0.0));
            if let Some(lens) = node.camera_mut() {
                lens.set_clip_planes(CAMERA_NEAR, CAMERA_FAR)?;
            }
        }
        stage::add_light(scene)?;
        stage::add_ambient_light(scene)?;
        add_star_field(scene, camera)?;

        view.background = Color::BLACK;
        view.set_allows_camera_control(true);

        let system = PlanetarySystem::build(SOLAR_SYSTEM, SOLAR_PLANETS, &mut view.scene)?;
        debug!(
            target: "celestial",
            system = system.name(),
            planets = system.planets().len(),
            sun = %system.sun(),
            "planetary system built"
        );

        // 纹理在后台预读，加载失败时由渲染器退化为白色
        let textures: Vec<String> = system
            .planets()
            .iter()
            .map(String::as_str)
            .chain(["moon", "sun"])
            .map(|name| format!("Textures/{name}.jpg"))
            .collect();
        for (path, result) in context.bundle.preload(textures).await {
            if let Err(err) = result {
                debug!(target: "celestial", %path, error = %err, "texture not preloaded");
            }
        }
        self.system = Some(system);

        let info_button = view
            .overlay
            .add(Element::button(INFO_BUTTON_FRAME, ButtonContent::image(INFO_BUTTON)));
        view.overlay.set_enabled(info_button, true);
        let info_window = view
            .overlay
            .add(Element::image(POPUP_FRAME, POPUP_WINDOW).with_alpha(0.0));
        view.overlay
            .add_child(info_window, stage::popup_text(CREDITS, CREDITS_LINES))?;
        self.views = Some(MainViews {
            info_button,
            info_window,
        });
        Ok(())
    }

    fn on_event(
        &mut self,
        view: &mut View,
        event: &Event,
        _context: &AppContext,
    ) -> Result<Option<Transition>> {
        match event {
            Event::ButtonPressed(button) => {
                if let Some(views) = self.views
                    && *button == views.info_button
                {
                    Self::toggle_info(view, views);
                }
                Ok(None)
            }
            Event::Gesture(Gesture::Tap { position }) => Ok(self.handle_tap(view, *position)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use celestial_core::{
        audio::AudioPlayer,
        game::component::{camera::Camera, transform::Transform},
        resource::AssetBundle,
    };
    use nalgebra::{Point3, Vector2};

    fn context() -> AppContext {
        AppContext::new(AssetBundle::in_memory(), AudioPlayer::silent())
    }

    async fn loaded() -> (MainController, View) {
        let mut controller = MainController::new();
        let mut view = View::new(Vector2::new(stage::CANVAS_WIDTH, stage::CANVAS_HEIGHT));
        controller
            .load(&mut view, &context())
            .await
            .expect("主画面应能加载");
        (controller, view)
    }

    /// 世界坐标点投影到画布坐标。
    fn project(view: &View, world: Point3<f32>) -> Point2<f32> {
        let scene = &view.scene;
        let camera_id = scene.point_of_view().expect("应有摄像机");
        let camera: &Camera = scene
            .node(camera_id)
            .and_then(|n| n.camera())
            .expect("摄像机组件");
        let camera_world = scene.world_matrix(camera_id).expect("摄像机矩阵");
        let canvas = view.overlay.canvas_size();
        let projection = camera
            .projection_matrix(canvas.x / canvas.y)
            .expect("投影矩阵");
        let clip = projection * Camera::view_matrix(&camera_world) * world.to_homogeneous();
        let ndc = clip.xyz() / clip.w;
        Point2::new(
            (ndc.x + 1.0) * 0.5 * canvas.x,
            (1.0 - ndc.y) * 0.5 * canvas.y,
        )
    }

    fn world_position(view: &View, node: NodeId) -> Point3<f32> {
        let world = view.scene.world_matrix(node).expect("节点矩阵");
        Point3::from(Transform::translation_from_matrix(&world))
    }

    #[tokio::test]
    async fn camera_is_raised_and_pitched() {
        let (_controller, view) = loaded().await;
        let camera = view.scene.point_of_view().expect("应有摄像机");
        let transform = view.scene.node(camera).expect("摄像机节点").transform.clone();
        assert_eq!(transform.position(), Vector3::new(5.0, 10.0, 37.0));
        assert!((transform.rotation().x - CAMERA_PITCH).abs() < 1e-6);
        assert!(view.allows_camera_control());
        let lens = view.scene.node(camera).and_then(|n| n.camera()).expect("摄像机组件");
        assert_eq!(lens.far_plane(), CAMERA_FAR);
        assert!(lens.far_plane() > STAR_OUTER_RADIUS);
        assert_eq!(view.background, Color::BLACK);

        let stars = view.scene.node(camera).expect("摄像机节点").children()[0];
        assert!(!view.scene.node(stars).expect("星空节点").is_pickable());
    }

    #[tokio::test]
    async fn tapping_a_planet_presents_its_structure() {
        let (mut controller, mut view) = loaded().await;
        let system = controller.system.as_ref().expect("应已搭建太阳系");
        let jupiter = system.node_of("jupiter").expect("木星节点");
        let target = project(&view, world_position(&view, jupiter));

        let transition = controller
            .on_event(
                &mut view,
                &Event::Gesture(Gesture::Tap { position: target }),
                &context(),
            )
            .expect("事件处理不应失败");
        match transition {
            Some(Transition::Present(next)) => assert_eq!(next.name(), "structure"),
            other => panic!("应呈现结构画面，实际为 {other:?}"),
        }
    }

    #[tokio::test]
    async fn tapping_the_sun_or_empty_space_does_nothing() {
        let (mut controller, mut view) = loaded().await;
        let sun = controller.system.as_ref().expect("应已搭建太阳系").sun();
        let sun_center = project(&view, world_position(&view, sun));

        for position in [sun_center, Point2::new(5.0, 5.0)] {
            let transition = controller
                .on_event(
                    &mut view,
                    &Event::Gesture(Gesture::Tap { position }),
                    &context(),
                )
                .expect("事件处理不应失败");
            assert!(transition.is_none());
        }
    }

    #[tokio::test]
    async fn info_button_toggles_credits() {
        let (mut controller, mut view) = loaded().await;
        let views = controller.views.expect("应已搭建界面");
        let alpha = |view: &View| view.overlay.element(views.info_window).expect("信息窗口").alpha();
        assert_eq!(alpha(&view), 0.0);

        let press = Event::ButtonPressed(views.info_button);
        controller.on_event(&mut view, &press, &context()).expect("应能处理按钮");
        assert_eq!(alpha(&view), 1.0);
        let window = view.overlay.element(views.info_window).expect("信息窗口");
        assert!(window.is_animating(), "应在 1.5 秒内淡入");

        view.overlay.advance(FADE_DURATION);
        controller.on_event(&mut view, &press, &context()).expect("应能处理按钮");
        assert_eq!(alpha(&view), 0.0);
    }

    #[tokio::test]
    async fn info_button_wins_over_scene_tap() {
        let (controller, view) = loaded().await;
        let views = controller.views.expect("应已搭建界面");
        let hit = view.overlay.hit_test(INFO_BUTTON_FRAME.center());
        assert_eq!(hit, Some(views.info_button));
    }
}
