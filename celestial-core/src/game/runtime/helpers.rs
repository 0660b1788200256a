use std::time::Duration;

use nalgebra::{Point2, Vector2};

use crate::event::Gesture;

/// 物理像素到画布点的比例。
pub(super) fn canvas_scale(canvas: Vector2<f32>, framebuffer_size: (u32, u32)) -> Vector2<f32> {
    Vector2::new(
        canvas.x / framebuffer_size.0.max(1) as f32,
        canvas.y / framebuffer_size.1.max(1) as f32,
    )
}

/// 把以物理像素表示的手势换算为画布坐标。缩放与旋转与单位无关，保持不变。
pub(super) fn gesture_to_canvas(gesture: Gesture, scale: Vector2<f32>) -> Gesture {
    match gesture {
        Gesture::Tap { position } => Gesture::Tap {
            position: Point2::new(position.x * scale.x, position.y * scale.y),
        },
        Gesture::Pan { delta } => Gesture::Pan {
            delta: delta.component_mul(&scale),
        },
        Gesture::SecondaryPan { delta } => Gesture::SecondaryPan {
            delta: delta.component_mul(&scale),
        },
        other => other,
    }
}

/// 本帧推进的秒数，不超过 `max_ms`。
pub(super) fn clamp_frame_delta(elapsed: Duration, max_ms: u64) -> f32 {
    elapsed.min(Duration::from_millis(max_ms)).as_secs_f32()
}
