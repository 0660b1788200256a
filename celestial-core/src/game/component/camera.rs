use nalgebra::{Matrix4, Perspective3, Point2, Point3, Unit, Vector3};

use super::transform::Transform;

/// 摄像机的默认垂直视场（以弧度表示）。
const DEFAULT_VERTICAL_FOV: f32 = 60.0_f32.to_radians();
/// 摄像机默认的近裁剪面距离。
const DEFAULT_NEAR_PLANE: f32 = 0.1;
/// 摄像机默认的远裁剪面距离（视距）。
const DEFAULT_FAR_PLANE: f32 = 500.0;

/// 3D 摄像机。
///
/// 摄像机只描述视锥参数（FOV、近/远裁剪面），位置与朝向取自所在节点的世界矩阵。
/// 场景通过 [`Scene::set_point_of_view`](crate::game::scene::Scene::set_point_of_view) 选定当前摄像机。
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    vertical_fov: f32,
    near_plane: f32,
    far_plane: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    /// 使用默认参数创建摄像机。
    pub fn new() -> Self {
        Self {
            vertical_fov: DEFAULT_VERTICAL_FOV,
            near_plane: DEFAULT_NEAR_PLANE,
            far_plane: DEFAULT_FAR_PLANE,
        }
    }

    pub fn vertical_fov(&self) -> f32 {
        self.vertical_fov
    }

    /// 获取摄像机的垂直半视场角（弧度制），即 `vertical_fov / 2`。
    pub fn vertical_half_fov(&self) -> f32 {
        0.5 * self.vertical_fov
    }

    pub fn set_clip_planes(
        &mut self,
        near_plane: f32,
        far_plane: f32,
    ) -> Result<(), CameraPropertyError> {
        if near_plane <= 0.0 {
            return Err(CameraPropertyError::InvalidClipPlaneDistance(near_plane));
        }
        if far_plane <= near_plane {
            return Err(CameraPropertyError::InvalidClipPlaneRange {
                near: near_plane,
                far: far_plane,
            });
        }
        self.near_plane = near_plane;
        self.far_plane = far_plane;
        Ok(())
    }

    pub fn near_plane(&self) -> f32 {
        self.near_plane
    }

    pub fn far_plane(&self) -> f32 {
        self.far_plane
    }

    /// 视图矩阵：世界矩阵的逆（忽略缩放）。
    pub fn view_matrix(world: &Matrix4<f32>) -> Matrix4<f32> {
        let eye = Point3::from(Transform::translation_from_matrix(world));
        let basis = Transform::basis_from_matrix(world);
        Matrix4::look_at_rh(&eye, &(eye + basis.forward), &basis.up)
    }

    /// OpenGL 约定（NDC z ∈ [-1, 1]）的透视投影矩阵。
    pub fn projection_matrix(&self, aspect_ratio: f32) -> Result<Matrix4<f32>, CameraViewportError> {
        if !(aspect_ratio.is_finite() && aspect_ratio > 0.0) {
            return Err(CameraViewportError::InvalidAspectRatio(aspect_ratio));
        }
        Ok(Perspective3::new(aspect_ratio, self.vertical_fov, self.near_plane, self.far_plane)
            .to_homogeneous())
    }

    /// 从摄像机位置出发、穿过视口内某点的世界空间射线。
    ///
    /// `point` 以视口左上角为原点，`viewport` 为视口尺寸（与 `point` 同单位）。
    pub fn screen_ray(
        &self,
        world: &Matrix4<f32>,
        point: Point2<f32>,
        viewport: (f32, f32),
    ) -> Result<Ray, CameraViewportError> {
        let (width, height) = viewport;
        if width <= 0.0 || height <= 0.0 {
            return Err(CameraViewportError::InvalidViewport { width, height });
        }

        let ndc_x = 2.0 * point.x / width - 1.0;
        let ndc_y = 1.0 - 2.0 * point.y / height;
        let tan_half = self.vertical_half_fov().tan();
        let aspect = width / height;

        let basis = Transform::basis_from_matrix(world).normalize();
        let direction = basis.forward
            + basis.right * (ndc_x * tan_half * aspect)
            + basis.up * (ndc_y * tan_half);

        Ok(Ray {
            origin: Point3::from(Transform::translation_from_matrix(world)),
            direction: Unit::new_normalize(direction),
        })
    }
}

/// 世界空间射线。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Unit<Vector3<f32>>,
}

impl Ray {
    pub fn at(&self, distance: f32) -> Point3<f32> {
        self.origin + self.direction.into_inner() * distance
    }
}

/// 摄像机观察空间的三个正交基向量。
#[derive(Debug, Clone, Copy)]
pub struct CameraBasis {
    pub forward: Vector3<f32>,
    pub up: Vector3<f32>,
    pub right: Vector3<f32>,
}

impl CameraBasis {
    pub fn normalize(self) -> Self {
        let forward = Unit::new_normalize(self.forward);
        let up = Unit::new_normalize(self.up);
        let right = Unit::new_normalize(self.right);
        Self {
            forward: *forward,
            up: *up,
            right: *right,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum CameraPropertyError {
    InvalidClipPlaneDistance(f32),
    InvalidClipPlaneRange { near: f32, far: f32 },
}

impl std::fmt::Display for CameraPropertyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraPropertyError::InvalidClipPlaneDistance(distance) => {
                write!(f, "裁剪面距离必须为正值，收到 {}", distance)
            }
            CameraPropertyError::InvalidClipPlaneRange { near, far } => {
                write!(f, "远裁剪面 ({}) 必须大于近裁剪面 ({})", far, near)
            }
        }
    }
}

impl std::error::Error for CameraPropertyError {}

#[derive(Debug, PartialEq)]
pub enum CameraViewportError {
    InvalidViewport { width: f32, height: f32 },
    InvalidAspectRatio(f32),
}

impl std::fmt::Display for CameraViewportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraViewportError::InvalidViewport { width, height } => write!(
                f,
                "无效的视口尺寸: 宽度 {}、高度 {} 必须大于零",
                width, height
            ),
            CameraViewportError::InvalidAspectRatio(ratio) => {
                write!(f, "无效的宽高比: {}", ratio)
            }
        }
    }
}

impl std::error::Error for CameraViewportError {}
