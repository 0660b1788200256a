use anyhow::{Context, Result};
use async_trait::async_trait;
use nalgebra::{Point2, Point3, Vector2};
use tracing::{debug, warn};

use crate::{
    audio::AudioPlayer,
    color::Color,
    event::{Event, Gesture},
    game::{
        camera_control::OrbitCameraControl,
        overlay::Overlay,
        picking::{HitResult, PickError},
        scene::Scene,
    },
    resource::AssetBundle,
};

/// 控制器可以访问的共享服务。克隆开销很小。
#[derive(Clone, Debug)]
pub struct AppContext {
    pub bundle: AssetBundle,
    pub audio: AudioPlayer,
}

impl AppContext {
    pub fn new(bundle: AssetBundle, audio: AudioPlayer) -> Self {
        Self { bundle, audio }
    }
}

/// 一个控制器管理的画面：3D 场景 + 叠加的界面层。
#[derive(Debug)]
pub struct View {
    pub scene: Scene,
    pub overlay: Overlay,
    pub background: Color,
    allows_camera_control: bool,
    orbit: Option<OrbitCameraControl>,
    viewport: Vector2<f32>,
}

impl View {
    /// `canvas` 为界面层画布尺寸（点），同时作为视口尺寸的初值。
    pub fn new(canvas: Vector2<f32>) -> Self {
        Self {
            scene: Scene::new(),
            overlay: Overlay::new(canvas.x, canvas.y),
            background: Color::BLACK,
            allows_camera_control: false,
            orbit: None,
            viewport: canvas,
        }
    }

    /// 允许用手势操作当前摄像机。
    pub fn set_allows_camera_control(&mut self, allows: bool) {
        self.allows_camera_control = allows;
        if !allows {
            self.orbit = None;
        }
    }

    pub fn allows_camera_control(&self) -> bool {
        self.allows_camera_control
    }

    /// 渲染目标的像素尺寸。
    pub fn viewport(&self) -> Vector2<f32> {
        self.viewport
    }

    pub(crate) fn set_viewport(&mut self, viewport: Vector2<f32>) {
        if viewport.x > 0.0 && viewport.y > 0.0 {
            self.viewport = viewport;
        }
    }

    /// 以画布坐标拾取 3D 场景，结果从近到远。
    pub fn hit_test(&self, point: Point2<f32>) -> Result<Vec<HitResult>, PickError> {
        let canvas = self.overlay.canvas_size();
        let pixel = Point2::new(
            point.x / canvas.x * self.viewport.x,
            point.y / canvas.y * self.viewport.y,
        );
        self.scene
            .hit_test(pixel, (self.viewport.x, self.viewport.y))
    }

    /// 把手势应用到摄像机。未开启摄像机控制或场景没有摄像机时返回 `false`。
    ///
    /// 第一次操作时以摄像机当前姿态、对准原点附近的视线点建立轨道控制。
    pub fn apply_camera_gesture(&mut self, gesture: &Gesture) -> bool {
        if !self.allows_camera_control || matches!(gesture, Gesture::Tap { .. }) {
            return false;
        }
        let Some(camera) = self.scene.point_of_view() else {
            return false;
        };
        let Some(node) = self.scene.node_mut(camera) else {
            return false;
        };

        let orbit = self
            .orbit
            .get_or_insert_with(|| OrbitCameraControl::looking_from(&node.transform, Point3::origin()));
        if !orbit.handle(gesture) {
            return false;
        }
        orbit.apply(&mut node.transform);
        true
    }
}

/// 控制器请求的画面切换。
pub enum Transition {
    /// 在当前控制器之上呈现新控制器。
    Present(Box<dyn ViewController>),
    /// 关闭当前控制器，回到下一层。
    Dismiss,
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::Present(_) => write!(f, "Present"),
            Transition::Dismiss => write!(f, "Dismiss"),
        }
    }
}

/// 视图控制器：负责一个画面的搭建、逐帧编排与输入处理。
///
/// - `load`：呈现前调用一次（异步），在这里搭建场景与界面、预读资源。
/// - `update`：每帧调用一次，`delta` 为秒。
/// - `on_event`：收到事件时调用。
///
/// 只有栈顶控制器会收到 `update` 与 `on_event`。
#[async_trait]
pub trait ViewController: Send {
    /// 控制器名称，用于日志。
    fn name(&self) -> &str;

    async fn load(&mut self, view: &mut View, context: &AppContext) -> Result<()>;

    /// 默认不做任何事。
    fn update(
        &mut self,
        _view: &mut View,
        _delta: f32,
        _context: &AppContext,
    ) -> Result<Option<Transition>> {
        Ok(None)
    }

    /// 默认不做任何事。
    fn on_event(
        &mut self,
        _view: &mut View,
        _event: &Event,
        _context: &AppContext,
    ) -> Result<Option<Transition>> {
        Ok(None)
    }
}

struct Presented {
    controller: Box<dyn ViewController>,
    view: View,
}

/// 控制器栈。
pub struct ViewStack {
    canvas: Vector2<f32>,
    viewport: Vector2<f32>,
    entries: Vec<Presented>,
}

impl ViewStack {
    pub fn new(canvas: Vector2<f32>) -> Self {
        Self {
            canvas,
            viewport: canvas,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn canvas(&self) -> Vector2<f32> {
        self.canvas
    }

    pub fn top(&self) -> Option<&View> {
        self.entries.last().map(|entry| &entry.view)
    }

    pub fn top_mut(&mut self) -> Option<&mut View> {
        self.entries.last_mut().map(|entry| &mut entry.view)
    }

    pub fn top_name(&self) -> Option<&str> {
        self.entries.last().map(|entry| entry.controller.name())
    }

    /// 更新渲染目标尺寸（像素）。
    pub fn set_viewport(&mut self, viewport: Vector2<f32>) {
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return;
        }
        self.viewport = viewport;
        for entry in &mut self.entries {
            entry.view.set_viewport(viewport);
        }
    }

    /// 加载并压入控制器。加载失败时不入栈。
    pub async fn present(
        &mut self,
        mut controller: Box<dyn ViewController>,
        context: &AppContext,
    ) -> Result<()> {
        let mut view = View::new(self.canvas);
        view.set_viewport(self.viewport);
        controller
            .load(&mut view, context)
            .await
            .with_context(|| format!("failed to load view controller {}", controller.name()))?;

        debug!(target: "celestial-core", controller = controller.name(), depth = self.entries.len() + 1, "present");
        self.entries.push(Presented { controller, view });
        Ok(())
    }

    /// 弹出栈顶控制器。最底层的控制器不能被关闭。
    pub fn dismiss(&mut self) -> bool {
        if self.entries.len() <= 1 {
            warn!(target: "celestial-core", "ignore dismiss of the root view controller");
            return false;
        }
        if let Some(entry) = self.entries.pop() {
            debug!(target: "celestial-core", controller = entry.controller.name(), "dismiss");
        }
        true
    }

    /// 推进栈顶画面的动作与动画，再调用其 `update`。
    pub async fn update(&mut self, delta: f32, context: &AppContext) -> Result<()> {
        let transition = {
            let Some(entry) = self.entries.last_mut() else {
                return Ok(());
            };
            entry.view.scene.advance(delta);
            entry.view.overlay.advance(delta);
            entry.controller.update(&mut entry.view, delta, context)?
        };
        self.apply(transition, context).await
    }

    /// 把事件交给栈顶控制器。
    pub async fn dispatch(&mut self, event: &Event, context: &AppContext) -> Result<()> {
        let transition = {
            let Some(entry) = self.entries.last_mut() else {
                return Ok(());
            };
            entry.controller.on_event(&mut entry.view, event, context)?
        };
        self.apply(transition, context).await
    }

    /// 处理手势（画布坐标）。
    ///
    /// 点击优先命中界面层按钮，命中时只派发 [`Event::ButtonPressed`]；
    /// 其余手势先交给摄像机控制，再派发给控制器。
    pub async fn handle_gesture(&mut self, gesture: Gesture, context: &AppContext) -> Result<()> {
        let event = {
            let Some(view) = self.top_mut() else {
                return Ok(());
            };
            match gesture {
                Gesture::Tap { position } => match view.overlay.hit_test(position) {
                    Some(button) => Event::ButtonPressed(button),
                    None => Event::Gesture(gesture),
                },
                _ => {
                    view.apply_camera_gesture(&gesture);
                    Event::Gesture(gesture)
                }
            }
        };
        self.dispatch(&event, context).await
    }

    async fn apply(&mut self, transition: Option<Transition>, context: &AppContext) -> Result<()> {
        match transition {
            None => Ok(()),
            Some(Transition::Present(controller)) => self.present(controller, context).await,
            Some(Transition::Dismiss) => {
                self.dismiss();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{
        component::{camera::Camera, node::Node, transform::Transform},
        overlay::{ButtonContent, Element, Rect},
    };
    use nalgebra::Vector3;
    use std::sync::{Arc, Mutex as StdMutex};

    type Log = Arc<StdMutex<Vec<String>>>;

    struct Recording {
        name: &'static str,
        log: Log,
        next: Option<Box<dyn FnOnce() -> Transition + Send>>,
        button: Option<crate::game::overlay::ElementId>,
    }

    impl Recording {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: Arc::clone(log),
                next: None,
                button: None,
            }
        }
    }

    #[async_trait]
    impl ViewController for Recording {
        fn name(&self) -> &str {
            self.name
        }

        async fn load(&mut self, view: &mut View, _context: &AppContext) -> Result<()> {
            self.log.lock().unwrap().push(format!("{}:load", self.name));
            let root = view.scene.root();
            let camera = view.scene.add_node(
                root,
                Node::new("camera")
                    .expect("合法名称")
                    .with_camera(Camera::new())
                    .with_transform(Transform::at(Vector3::new(0.0, 0.0, 30.0))),
            )?;
            view.scene.set_point_of_view(camera)?;
            view.set_allows_camera_control(true);

            let button = view.overlay.add(Element::button(
                Rect::new(0.0, 0.0, 100.0, 100.0),
                ButtonContent::image("Icons/next-button.png"),
            ));
            view.overlay.set_enabled(button, true);
            self.button = Some(button);
            Ok(())
        }

        fn update(
            &mut self,
            _view: &mut View,
            _delta: f32,
            _context: &AppContext,
        ) -> Result<Option<Transition>> {
            Ok(self.next.take().map(|make| make()))
        }

        fn on_event(
            &mut self,
            _view: &mut View,
            event: &Event,
            _context: &AppContext,
        ) -> Result<Option<Transition>> {
            let entry = match event {
                Event::ButtonPressed(id) if Some(*id) == self.button => "button".to_string(),
                Event::Gesture(Gesture::Tap { .. }) => "tap".to_string(),
                Event::Gesture(_) => "gesture".to_string(),
                other => format!("{other:?}"),
            };
            self.log.lock().unwrap().push(format!("{}:{}", self.name, entry));
            Ok(None)
        }
    }

    struct Failing;

    #[async_trait]
    impl ViewController for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn load(&mut self, _view: &mut View, _context: &AppContext) -> Result<()> {
            anyhow::bail!("load failed")
        }
    }

    fn context() -> AppContext {
        AppContext::new(AssetBundle::in_memory(), AudioPlayer::silent())
    }

    fn canvas() -> Vector2<f32> {
        Vector2::new(1000.0, 800.0)
    }

    #[tokio::test]
    async fn present_and_dismiss_follow_stack_order() {
        let log: Log = Arc::default();
        let ctx = context();
        let mut stack = ViewStack::new(canvas());

        let mut first = Recording::new("first", &log);
        let second_log = Arc::clone(&log);
        first.next = Some(Box::new(move || {
            Transition::Present(Box::new(Recording::new("second", &second_log)))
        }));
        stack.present(Box::new(first), &ctx).await.expect("应能呈现");
        stack.update(0.016, &ctx).await.expect("应能更新");

        assert_eq!(stack.len(), 2);
        assert_eq!(stack.top_name(), Some("second"));
        assert!(stack.dismiss());
        assert_eq!(stack.top_name(), Some("first"));
        assert!(!stack.dismiss(), "最底层控制器不能被关闭");
        assert_eq!(
            log.lock().unwrap().as_slice(),
            &["first:load".to_string(), "second:load".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_load_is_not_pushed() {
        let mut stack = ViewStack::new(canvas());
        let err = stack
            .present(Box::new(Failing), &context())
            .await
            .expect_err("加载失败应返回错误");
        assert!(format!("{err:#}").contains("load failed"));
        assert!(stack.is_empty());
    }

    #[tokio::test]
    async fn tap_on_button_takes_priority_over_scene() {
        let log: Log = Arc::default();
        let ctx = context();
        let mut stack = ViewStack::new(canvas());
        stack
            .present(Box::new(Recording::new("main", &log)), &ctx)
            .await
            .expect("应能呈现");

        stack
            .handle_gesture(Gesture::Tap { position: Point2::new(50.0, 50.0) }, &ctx)
            .await
            .expect("应能处理点击");
        stack
            .handle_gesture(Gesture::Tap { position: Point2::new(500.0, 400.0) }, &ctx)
            .await
            .expect("应能处理点击");

        let log = log.lock().unwrap();
        assert_eq!(&log[1..], &["main:button".to_string(), "main:tap".to_string()]);
    }

    #[tokio::test]
    async fn pan_moves_camera_when_control_allowed() {
        let log: Log = Arc::default();
        let ctx = context();
        let mut stack = ViewStack::new(canvas());
        stack
            .present(Box::new(Recording::new("main", &log)), &ctx)
            .await
            .expect("应能呈现");

        stack
            .handle_gesture(Gesture::Pan { delta: Vector2::new(80.0, 0.0) }, &ctx)
            .await
            .expect("应能处理拖动");

        let view = stack.top().expect("栈顶应存在");
        let camera = view.scene.point_of_view().expect("应有摄像机");
        let position = view.scene.node(camera).expect("摄像机节点应存在").transform.position();
        assert!(position.x.abs() > 1.0, "拖动后摄像机应绕原点移动");
        assert!((position.norm() - 30.0).abs() < 1e-3);
        assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("main:gesture"));
    }

    #[test]
    fn view_hit_test_maps_canvas_to_viewport() {
        let mut view = View::new(canvas());
        let root = view.scene.root();
        let camera = view
            .scene
            .add_node(
                root,
                Node::new("camera")
                    .expect("合法名称")
                    .with_camera(Camera::new())
                    .with_transform(Transform::at(Vector3::new(0.0, 0.0, 30.0))),
            )
            .expect("应能添加摄像机");
        view.scene.set_point_of_view(camera).expect("摄像机存在");
        let planet = view
            .scene
            .add_node(
                root,
                Node::geometry(
                    crate::game::component::shape::Shape::sphere(1.0),
                    crate::game::component::material::Material::default(),
                ),
            )
            .expect("应能添加节点");

        view.set_viewport(Vector2::new(2000.0, 1600.0));
        let hits = view.hit_test(Point2::new(500.0, 400.0)).expect("应能拾取");
        assert_eq!(hits.first().map(|h| h.node), Some(planet));
    }
}
