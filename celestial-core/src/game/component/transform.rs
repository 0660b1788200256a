use nalgebra::{Matrix4, Rotation3, Translation3, Vector3};

use super::camera::CameraBasis;

/// 变换（平移/旋转/缩放）。
///
/// `Transform` 描述节点在**局部空间（相对父节点）**中的位置、旋转（欧拉角，弧度制，按 X-Y-Z 顺序）与缩放。
///
/// - 根节点下的变换等价于世界变换。
/// - 场景会沿父链做矩阵叠乘得到世界矩阵，见 [`Scene::world_matrix`](crate::game::scene::Scene::world_matrix)。
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    position: Vector3<f32>,
    rotation: Vector3<f32>,
    scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform {
    /// 创建一个默认的变换，位置为原点、旋转为零（弧度），缩放为单位向量。
    pub fn new() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: Vector3::zeros(),
            scale: Vector3::repeat(1.0),
        }
    }

    /// 使用指定的位置、旋转（弧度制欧拉角，按 X-Y-Z 顺序）与缩放创建变换。
    pub fn with_components(
        position: Vector3<f32>,
        rotation: Vector3<f32>,
        scale: Vector3<f32>,
    ) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// 仅指定位置。
    pub fn at(position: Vector3<f32>) -> Self {
        Self {
            position,
            ..Self::new()
        }
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
    }

    /// 按增量平移。
    pub fn translate(&mut self, delta: Vector3<f32>) {
        self.position += delta;
    }

    /// 当前旋转（弧度制欧拉角，按 X-Y-Z 顺序）。
    pub fn rotation(&self) -> Vector3<f32> {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Vector3<f32>) {
        self.rotation = rotation;
    }

    /// 按增量旋转（弧度制）。
    pub fn rotate(&mut self, delta: Vector3<f32>) {
        self.rotation += delta;
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.scale = scale;
    }

    /// 计算齐次变换矩阵：平移 × 旋转 × 缩放。
    pub fn matrix(&self) -> Matrix4<f32> {
        let translation = Translation3::from(self.position);
        let rotation =
            Rotation3::from_euler_angles(self.rotation.x, self.rotation.y, self.rotation.z);
        let scale = Matrix4::new_nonuniform_scaling(&self.scale);
        translation.to_homogeneous() * rotation.to_homogeneous() * scale
    }

    /// 从 world matrix 提取平移分量。
    pub fn translation_from_matrix(matrix: &Matrix4<f32>) -> Vector3<f32> {
        Vector3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)])
    }

    /// 从 world matrix 提取相机/朝向用的正交基底（忽略缩放）。
    ///
    /// 默认朝向为 -Z。
    pub fn basis_from_matrix(matrix: &Matrix4<f32>) -> CameraBasis {
        let x = Vector3::new(matrix[(0, 0)], matrix[(1, 0)], matrix[(2, 0)]);
        let y = Vector3::new(matrix[(0, 1)], matrix[(1, 1)], matrix[(2, 1)]);
        let z = Vector3::new(matrix[(0, 2)], matrix[(1, 2)], matrix[(2, 2)]);

        let right = x.try_normalize(1.0e-6).unwrap_or(Vector3::x());
        let up = y.try_normalize(1.0e-6).unwrap_or(Vector3::y());
        // +Z 轴对应列向量 z；默认 forward 为 -Z。
        let forward = (-z)
            .try_normalize(1.0e-6)
            .unwrap_or(Vector3::new(0.0, 0.0, -1.0));

        CameraBasis { forward, up, right }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Rotation3, Translation3, Vector3, Vector4};
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn transform_defaults_to_identity() {
        let transform = Transform::new();
        assert_eq!(transform.position(), Vector3::zeros());
        assert_eq!(transform.rotation(), Vector3::zeros());
        assert_eq!(transform.scale(), Vector3::repeat(1.0));
        assert_eq!(transform.matrix(), Matrix4::identity());
    }

    #[test]
    fn transform_mutators_update_components() {
        let mut transform = Transform::new();
        transform.translate(Vector3::new(1.0, 2.0, 3.0));
        transform.rotate(Vector3::new(0.1, -0.2, 0.3));
        transform.set_scale(Vector3::new(2.0, 1.0, 0.5));

        assert_eq!(transform.position(), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(transform.rotation(), Vector3::new(0.1, -0.2, 0.3));
        assert_eq!(transform.scale(), Vector3::new(2.0, 1.0, 0.5));
    }

    #[test]
    fn transform_matrix_combines_components() {
        let transform = Transform::with_components(
            Vector3::new(3.0, -2.0, 5.0),
            Vector3::new(0.0, 0.0, FRAC_PI_2),
            Vector3::new(2.0, 1.0, 1.0),
        );
        let matrix = transform.matrix();

        // 按平移 × 旋转 × 缩放的顺序显式计算期望值。
        let vector = Vector4::new(1.0, 0.0, 0.0, 1.0);
        let result = matrix * vector;

        let rotation = Rotation3::from_euler_angles(0.0, 0.0, FRAC_PI_2);
        let scaled = Vector3::new(1.0, 0.0, 0.0).component_mul(&transform.scale());
        let rotated = rotation * scaled;
        let translation = Translation3::from(transform.position());
        let expected = translation.vector + rotated;

        assert!((result.x - expected.x).abs() < 1e-5);
        assert!((result.y - expected.y).abs() < 1e-5);
        assert!((result.z - expected.z).abs() < 1e-5);
        assert!((result.w - 1.0).abs() < 1e-5);

        let point = Point3::new(0.0, 1.0, 0.0);
        let transformed_h = matrix * point.to_homogeneous();
        let transformed = Point3::from_homogeneous(transformed_h).expect("齐次坐标 w 不应为 0");

        let scaled_point = point.coords.component_mul(&transform.scale());
        let rotated_point = rotation * scaled_point;
        let expected_point = translation.vector + rotated_point;

        assert!((transformed.x - expected_point.x).abs() < 1e-5);
        assert!((transformed.y - expected_point.y).abs() < 1e-5);
        assert!((transformed.z - expected_point.z).abs() < 1e-5);
    }

    #[test]
    fn basis_from_matrix_defaults_to_negative_z() {
        let basis = Transform::basis_from_matrix(&Transform::at(Vector3::new(1.0, 2.0, 3.0)).matrix());
        assert!((basis.forward - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-6);
        assert!((basis.up - Vector3::y()).norm() < 1e-6);
        assert!((basis.right - Vector3::x()).norm() < 1e-6);
    }
}
