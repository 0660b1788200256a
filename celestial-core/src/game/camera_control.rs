use std::f32::consts::FRAC_PI_2;

use nalgebra::{Point3, Rotation3, Vector2, Vector3};

use super::component::transform::Transform;
use crate::event::Gesture;

/// 每拖动一个画布点对应的轨道旋转角（弧度）。
const ORBIT_RADIANS_PER_POINT: f32 = 0.005;
/// 平移速度与当前距离的比例。
const PAN_PER_POINT_PER_DISTANCE: f32 = 0.0015;
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;
const DEFAULT_MIN_DISTANCE: f32 = 2.0;
const DEFAULT_MAX_DISTANCE: f32 = 200.0;

/// 轨道式摄像机控制：拖动绕目标点旋转，缩放改变距离，旋转手势绕视线滚转，副键拖动平移目标点。
///
/// 摄像机姿态 = 绕 Y 的偏航 × 绕 X 的俯仰 × 绕 Z 的滚转；位置位于目标点沿该姿态 +Z 方向 `distance` 处。
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCameraControl {
    target: Point3<f32>,
    distance: f32,
    yaw: f32,
    pitch: f32,
    roll: f32,
    min_distance: f32,
    max_distance: f32,
}

impl OrbitCameraControl {
    /// 从摄像机当前姿态构造，保持朝向不变。
    ///
    /// 目标点取视线上离 `focus` 最近的点，因此首次手势不会让画面跳变。
    pub fn looking_from(transform: &Transform, focus: Point3<f32>) -> Self {
        let basis = Transform::basis_from_matrix(&transform.matrix());
        let position = Point3::from(transform.position());

        let along = (focus - position).dot(&basis.forward).max(DEFAULT_MIN_DISTANCE);
        let target = position + basis.forward * along;

        // 摄像机到目标点的反方向即姿态的 +Z
        let back = -basis.forward;
        let pitch = (-back.y).clamp(-1.0, 1.0).asin();
        let yaw = back.x.atan2(back.z);

        // 滚转：姿态去掉偏航与俯仰后剩余的绕 Z 旋转
        let without_roll = Rotation3::from_axis_angle(&Vector3::y_axis(), yaw)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), pitch);
        let up_without_roll = without_roll * Vector3::y();
        let right_without_roll = without_roll * Vector3::x();
        let roll = basis
            .up
            .dot(&-right_without_roll)
            .atan2(basis.up.dot(&up_without_roll));

        Self {
            target,
            distance: along,
            yaw,
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            roll,
            min_distance: DEFAULT_MIN_DISTANCE,
            max_distance: DEFAULT_MAX_DISTANCE,
        }
    }

    pub fn target(&self) -> Point3<f32> {
        self.target
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn roll(&self) -> f32 {
        self.roll
    }

    fn orientation(&self) -> Rotation3<f32> {
        Rotation3::from_axis_angle(&Vector3::y_axis(), self.yaw)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), self.pitch)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), self.roll)
    }

    /// 处理一个手势（位移单位为画布点）。`Tap` 不影响摄像机，返回 `false`。
    pub fn handle(&mut self, gesture: &Gesture) -> bool {
        match *gesture {
            Gesture::Tap { .. } => false,
            Gesture::Pan { delta } => {
                self.orbit(delta);
                true
            }
            Gesture::SecondaryPan { delta } => {
                self.pan(delta);
                true
            }
            Gesture::Zoom { factor } => {
                self.zoom(factor);
                true
            }
            Gesture::Rotate { radians } => {
                self.roll += radians;
                true
            }
        }
    }

    pub fn orbit(&mut self, delta: Vector2<f32>) {
        self.yaw -= delta.x * ORBIT_RADIANS_PER_POINT;
        self.pitch = (self.pitch - delta.y * ORBIT_RADIANS_PER_POINT).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// 在视平面内移动目标点，画面跟随手指。
    pub fn pan(&mut self, delta: Vector2<f32>) {
        let orientation = self.orientation();
        let right = orientation * Vector3::x();
        let up = orientation * Vector3::y();
        let scale = self.distance * PAN_PER_POINT_PER_DISTANCE;
        self.target += (-right * delta.x + up * delta.y) * scale;
    }

    /// `factor > 1` 拉远。
    pub fn zoom(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.distance = (self.distance * factor).clamp(self.min_distance, self.max_distance);
        }
    }

    /// 把当前控制状态写回摄像机变换（保留缩放）。
    pub fn apply(&self, transform: &mut Transform) {
        let orientation = self.orientation();
        let position = self.target + orientation * Vector3::new(0.0, 0.0, self.distance);
        let (x, y, z) = orientation.euler_angles();
        transform.set_position(position.coords);
        transform.set_rotation(Vector3::new(x, y, z));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec(actual: Vector3<f32>, expected: Vector3<f32>) {
        assert!(
            (actual - expected).norm() < 1e-3,
            "期望 {expected:?}，实际 {actual:?}"
        );
    }

    #[test]
    fn looking_from_keeps_current_pose() {
        let mut transform = Transform::at(Vector3::new(5.0, 10.0, 37.0));
        transform.set_rotation(Vector3::new(-0.225, 0.0, 0.0));
        let before = transform.matrix();

        let control = OrbitCameraControl::looking_from(&transform, Point3::origin());
        control.apply(&mut transform);

        let after = transform.matrix();
        assert!((before - after).norm() < 1e-3, "首次应用不应改变姿态");
        assert!((control.pitch() + 0.225).abs() < 1e-4);
    }

    #[test]
    fn orbit_keeps_distance_to_target() {
        let mut transform = Transform::at(Vector3::new(0.0, 0.0, 30.0));
        let mut control = OrbitCameraControl::looking_from(&transform, Point3::origin());
        assert_vec(control.target().coords, Vector3::zeros());

        control.handle(&Gesture::Pan {
            delta: Vector2::new(-100.0, 40.0),
        });
        control.apply(&mut transform);

        assert!((transform.position().norm() - 30.0).abs() < 1e-3);
        let forward = Transform::basis_from_matrix(&transform.matrix()).forward;
        assert_vec(forward, -transform.position().normalize());
    }

    #[test]
    fn pitch_is_clamped() {
        let transform = Transform::at(Vector3::new(0.0, 0.0, 30.0));
        let mut control = OrbitCameraControl::looking_from(&transform, Point3::origin());
        control.orbit(Vector2::new(0.0, -10_000.0));
        assert!((control.pitch() - PITCH_LIMIT).abs() < 1e-6);
    }

    #[test]
    fn zoom_is_clamped() {
        let transform = Transform::at(Vector3::new(0.0, 0.0, 30.0));
        let mut control = OrbitCameraControl::looking_from(&transform, Point3::origin());
        control.zoom(0.5);
        assert!((control.distance() - 15.0).abs() < 1e-4);
        control.zoom(0.0001);
        assert_eq!(control.distance(), DEFAULT_MIN_DISTANCE);
        control.zoom(1.0e6);
        assert_eq!(control.distance(), DEFAULT_MAX_DISTANCE);
        control.zoom(-1.0);
        assert_eq!(control.distance(), DEFAULT_MAX_DISTANCE, "非法比例应被忽略");
    }

    #[test]
    fn pan_moves_target_in_view_plane() {
        let transform = Transform::at(Vector3::new(0.0, 0.0, 30.0));
        let mut control = OrbitCameraControl::looking_from(&transform, Point3::origin());
        control.handle(&Gesture::SecondaryPan {
            delta: Vector2::new(100.0, 0.0),
        });
        let target = control.target();
        assert!(target.x < 0.0, "向右拖动画面，目标点左移");
        assert!(target.y.abs() < 1e-5 && target.z.abs() < 1e-5);
    }

    #[test]
    fn rotate_gesture_rolls() {
        let mut transform = Transform::at(Vector3::new(0.0, 0.0, 30.0));
        let mut control = OrbitCameraControl::looking_from(&transform, Point3::origin());
        assert!(control.roll().abs() < 1e-6);
        assert!(control.handle(&Gesture::Rotate { radians: 0.3 }));
        assert!(!control.handle(&Gesture::Tap {
            position: nalgebra::Point2::new(0.0, 0.0)
        }));
        control.apply(&mut transform);
        assert!((transform.rotation().z - 0.3).abs() < 1e-4);
        assert_vec(transform.position(), Vector3::new(0.0, 0.0, 30.0));
    }
}
