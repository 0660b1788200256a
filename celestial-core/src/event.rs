use std::{any::Any, fmt::Debug, sync::Arc};

use nalgebra::{Point2, Vector2};
pub use winit::{
    event::{DeviceEvent, ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    keyboard::{Key, KeyCode, NamedKey, PhysicalKey},
};

use crate::game::overlay::ElementId;

/// 手势（由原始鼠标/触控板事件归纳而来）。
///
/// 坐标与位移均为窗口物理像素；运行时在分发前会换算为画布坐标。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// 按下与抬起位置足够接近的一次点击。
    Tap { position: Point2<f32> },
    /// 主键拖动（轨道旋转）。
    Pan { delta: Vector2<f32> },
    /// 副键拖动（平移）。
    SecondaryPan { delta: Vector2<f32> },
    /// 缩放：`factor > 1` 表示拉远。
    Zoom { factor: f32 },
    /// 绕视线旋转（弧度）。
    Rotate { radians: f32 },
}

/// 引擎事件。
///
/// `Gesture` 与 `ButtonPressed` 由运行时产生；`Custom` 允许游戏侧把任意类型作为事件载荷。
///
/// # 示例：自定义事件载荷
///
/// ```
/// #[derive(Debug, PartialEq, Eq)]
/// struct MyEvent {
///     id: u32,
/// }
///
/// let e = ::celestial_core::event::Event::custom(MyEvent { id: 1 });
/// assert_eq!(e.downcast_ref::<MyEvent>().unwrap().id, 1);
/// ```
#[derive(Clone)]
pub enum Event {
    CloseRequested,
    Gesture(Gesture),
    /// 画布上的某个按钮被点击（只会发给当前最上层的控制器）。
    ButtonPressed(ElementId),
    /// 自定义事件：使用 `Arc<dyn Any + Send + Sync>` 承载任意用户载荷。
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Event {
    /// 从任意自定义类型构造事件。
    pub fn custom<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self::Custom(Arc::new(value))
    }

    /// 尝试把 `Custom` 事件的载荷按类型借用出来。
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Custom(payload) => payload.as_ref().downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CloseRequested => write!(f, "CloseRequested"),
            Self::Gesture(gesture) => f.debug_tuple("Gesture").field(gesture).finish(),
            Self::ButtonPressed(id) => f.debug_tuple("ButtonPressed").field(id).finish(),
            Self::Custom(arg) => f.debug_tuple("Custom").field(arg).finish(),
        }
    }
}

/// 将 `winit` 的窗口/设备事件映射为引擎事件。
///
/// # 示例：用闭包实现映射器
///
/// ```
/// use ::celestial_core::event::{Event, EventMapper, WindowEvent};
///
/// let mut mapper = |evt: &WindowEvent| {
///     let _ = evt;
///     Some(Event::custom("hello".to_string()))
/// };
///
/// let _ = EventMapper::map_window_event(&mut mapper, &WindowEvent::Focused(true));
/// ```
pub trait EventMapper: Send + Sync {
    /// 将 `winit::WindowEvent` 转换为引擎 [`Event`]。
    ///
    /// 返回 `None` 表示忽略该事件。
    fn map_window_event(&mut self, _event: &WindowEvent) -> Option<Event> {
        None
    }

    /// 将 `winit::DeviceEvent` 转换为引擎 [`Event`]。默认忽略。
    fn map_device_event(&mut self, _event: &DeviceEvent) -> Option<Event> {
        None
    }
}

impl<F> EventMapper for F
where
    F: FnMut(&WindowEvent) -> Option<Event> + Send + Sync,
{
    fn map_window_event(&mut self, event: &WindowEvent) -> Option<Event> {
        (self)(event)
    }
}

/// 点击判定的最大位移（像素）。
const TAP_SLOP_PX: f32 = 6.0;
/// 一“行”滚轮对应的缩放比例。
const ZOOM_PER_LINE: f32 = 0.1;
/// 一像素触控板滚动对应的缩放比例。
const ZOOM_PER_PIXEL: f32 = 0.0025;

#[derive(Debug, Clone, Copy)]
struct PressState {
    button: MouseButton,
    origin: Point2<f32>,
    last: Point2<f32>,
    dragging: bool,
}

/// 默认映射器：把鼠标与触控板输入归纳为 [`Gesture`]。
///
/// - 左键按下后移动不超过阈值再抬起 → `Tap`
/// - 左键拖动 → `Pan`；右键拖动 → `SecondaryPan`
/// - 滚轮 / 触控板捏合 → `Zoom`；触控板旋转 → `Rotate`
#[derive(Debug, Default)]
pub struct GestureRecognizer {
    cursor: Option<Point2<f32>>,
    press: Option<PressState>,
}

impl GestureRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn cursor_moved(&mut self, position: Point2<f32>) -> Option<Gesture> {
        let previous = self.cursor.replace(position);
        let press = self.press.as_mut()?;

        if !press.dragging && (position - press.origin).norm() > TAP_SLOP_PX {
            press.dragging = true;
        }
        let delta = position - press.last;
        press.last = position;

        if !press.dragging || previous.is_none() {
            return None;
        }

        match press.button {
            MouseButton::Left => Some(Gesture::Pan { delta }),
            MouseButton::Right | MouseButton::Middle => Some(Gesture::SecondaryPan { delta }),
            _ => None,
        }
    }

    fn button(&mut self, state: ElementState, button: MouseButton) -> Option<Gesture> {
        let position = self.cursor?;
        match state {
            ElementState::Pressed => {
                self.press = Some(PressState {
                    button,
                    origin: position,
                    last: position,
                    dragging: false,
                });
                None
            }
            ElementState::Released => {
                let press = self.press.take()?;
                if press.button != button {
                    return None;
                }
                (button == MouseButton::Left && !press.dragging)
                    .then_some(Gesture::Tap { position })
            }
        }
    }

    fn scroll(delta: &MouseScrollDelta) -> Option<Gesture> {
        let amount = match delta {
            MouseScrollDelta::LineDelta(_, y) => *y * ZOOM_PER_LINE,
            MouseScrollDelta::PixelDelta(position) => position.y as f32 * ZOOM_PER_PIXEL,
        };
        if amount == 0.0 {
            return None;
        }
        // 向上滚动拉近
        Some(Gesture::Zoom {
            factor: (1.0 - amount).clamp(0.5, 1.5),
        })
    }
}

impl EventMapper for GestureRecognizer {
    fn map_window_event(&mut self, event: &WindowEvent) -> Option<Event> {
        let gesture = match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_moved(Point2::new(position.x as f32, position.y as f32))
            }
            WindowEvent::CursorLeft { .. } => {
                self.press = None;
                None
            }
            WindowEvent::MouseInput { state, button, .. } => self.button(*state, *button),
            WindowEvent::MouseWheel { delta, .. } => Self::scroll(delta),
            WindowEvent::PinchGesture { delta, .. } => Some(Gesture::Zoom {
                factor: (1.0 - *delta as f32).clamp(0.5, 1.5),
            }),
            WindowEvent::RotationGesture { delta, .. } => Some(Gesture::Rotate {
                radians: delta.to_radians(),
            }),
            _ => None,
        };
        gesture.map(Event::Gesture)
    }
}
