//! 场景拾取：从摄像机发出射线，与可拾取节点的世界空间三角面求交。

use std::fmt;

use nalgebra::{Matrix4, Point2, Point3, Vector3};

use super::{
    component::{
        camera::{CameraViewportError, Ray},
        node::NodeId,
        shape::Shape,
    },
    scene::Scene,
};

const PARALLEL_EPSILON: f32 = 1.0e-7;

/// 一次命中。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    pub node: NodeId,
    /// 沿射线到命中点的距离。
    pub distance: f32,
    pub point: Point3<f32>,
}

#[derive(Debug, PartialEq)]
pub enum PickError {
    /// 场景中没有可用的摄像机节点。
    NoCamera,
    Viewport(CameraViewportError),
}

impl fmt::Display for PickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PickError::NoCamera => write!(f, "场景中没有可用于拾取的摄像机"),
            PickError::Viewport(err) => write!(f, "拾取视口无效：{}", err),
        }
    }
}

impl std::error::Error for PickError {}

impl From<CameraViewportError> for PickError {
    fn from(value: CameraViewportError) -> Self {
        PickError::Viewport(value)
    }
}

impl Scene {
    /// 以当前摄像机穿过视口内 `point` 的射线拾取节点，结果按距离从近到远排列。
    ///
    /// `point` 以视口左上角为原点，`viewport` 为视口尺寸（与 `point` 同单位）。
    pub fn hit_test(
        &self,
        point: Point2<f32>,
        viewport: (f32, f32),
    ) -> Result<Vec<HitResult>, PickError> {
        let camera_id = self.point_of_view().ok_or(PickError::NoCamera)?;
        let camera = self
            .node(camera_id)
            .and_then(|node| node.camera())
            .ok_or(PickError::NoCamera)?;
        let world = self.world_matrix(camera_id).ok_or(PickError::NoCamera)?;
        let ray = camera.screen_ray(&world, point, viewport)?;
        Ok(self.ray_test(&ray))
    }

    /// 射线与全部可拾取几何节点求交；每个节点只保留最近的一次命中。
    pub fn ray_test(&self, ray: &Ray) -> Vec<HitResult> {
        let mut hits: Vec<HitResult> = self
            .drawables()
            .into_iter()
            .filter(|drawable| {
                self.node(drawable.node)
                    .is_some_and(|node| node.is_pickable())
            })
            .filter_map(|drawable| {
                let distance = nearest_triangle_hit(ray, &drawable.shape, &drawable.world)?;
                Some(HitResult {
                    node: drawable.node,
                    distance,
                    point: ray.at(distance),
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}

fn nearest_triangle_hit(ray: &Ray, shape: &Shape, world: &Matrix4<f32>) -> Option<f32> {
    if !ray_hits_bounding_sphere(ray, shape, world) {
        return None;
    }

    let to_world = |v: &Vector3<f32>| world.transform_point(&Point3::from(*v));
    shape
        .triangles()
        .filter_map(|(a, b, c)| ray_triangle(ray, &to_world(a), &to_world(b), &to_world(c)))
        .min_by(f32::total_cmp)
}

/// 粗检：世界空间包围球。
fn ray_hits_bounding_sphere(ray: &Ray, shape: &Shape, world: &Matrix4<f32>) -> bool {
    let center = world.transform_point(&Point3::origin());
    let max_scale = (0..3)
        .map(|i| world.fixed_view::<3, 1>(0, i).norm())
        .fold(0.0, f32::max);
    let radius = shape.bounding_radius() * max_scale;

    let to_center = center - ray.origin;
    let along = to_center.dot(&ray.direction);
    let closest_sq = to_center.norm_squared() - along * along;
    if closest_sq > radius * radius {
        return false;
    }
    // 球完全在射线起点之后
    along >= -radius
}

/// Möller–Trumbore 射线三角形求交，返回正的命中距离。双面。
fn ray_triangle(ray: &Ray, a: &Point3<f32>, b: &Point3<f32>, c: &Point3<f32>) -> Option<f32> {
    let edge1 = b - a;
    let edge2 = c - a;
    let p = ray.direction.cross(&edge2);
    let det = edge1.dot(&p);
    if det.abs() < PARALLEL_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;

    let t_vec = ray.origin - a;
    let u = t_vec.dot(&p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = t_vec.cross(&edge1);
    let v = ray.direction.dot(&q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(&q) * inv_det;
    (t > PARALLEL_EPSILON).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::component::{
        camera::Camera, material::Material, node::Node, transform::Transform,
    };
    use nalgebra::Unit;

    fn ray_towards(origin: Point3<f32>, direction: Vector3<f32>) -> Ray {
        Ray {
            origin,
            direction: Unit::new_normalize(direction),
        }
    }

    fn scene_with_camera(position: Vector3<f32>) -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let root = scene.root();
        let camera = scene
            .add_node(
                root,
                Node::new("camera")
                    .expect("合法名称")
                    .with_camera(Camera::new())
                    .with_transform(Transform::at(position)),
            )
            .expect("应能添加摄像机");
        (scene, camera)
    }

    #[test]
    fn triangle_hit_reports_distance() {
        let ray = ray_towards(Point3::new(0.2, 0.2, 5.0), -Vector3::z());
        let hit = ray_triangle(
            &ray,
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
        )
        .expect("应命中三角形");
        assert!((hit - 5.0).abs() < 1e-5);

        let miss = ray_towards(Point3::new(2.0, 2.0, 5.0), -Vector3::z());
        assert!(
            ray_triangle(
                &miss,
                &Point3::new(0.0, 0.0, 0.0),
                &Point3::new(1.0, 0.0, 0.0),
                &Point3::new(0.0, 1.0, 0.0),
            )
            .is_none()
        );
    }

    #[test]
    fn triangle_behind_ray_is_ignored() {
        let ray = ray_towards(Point3::new(0.2, 0.2, -5.0), -Vector3::z());
        assert!(
            ray_triangle(
                &ray,
                &Point3::new(0.0, 0.0, 0.0),
                &Point3::new(1.0, 0.0, 0.0),
                &Point3::new(0.0, 1.0, 0.0),
            )
            .is_none()
        );
    }

    #[test]
    fn center_tap_hits_nearest_sphere_first() {
        let (mut scene, _) = scene_with_camera(Vector3::new(0.0, 0.0, 30.0));
        let root = scene.root();
        let near = scene
            .add_node(
                root,
                Node::geometry(Shape::sphere(1.0), Material::default())
                    .with_transform(Transform::at(Vector3::new(0.0, 0.0, 10.0))),
            )
            .expect("应能添加节点");
        let far = scene
            .add_node(root, Node::geometry(Shape::sphere(2.0), Material::default()))
            .expect("应能添加节点");

        let hits = scene
            .hit_test(Point2::new(500.0, 400.0), (1000.0, 800.0))
            .expect("应能拾取");
        let nodes: Vec<NodeId> = hits.iter().map(|h| h.node).collect();
        assert_eq!(nodes, vec![near, far]);
        assert!((hits[0].distance - 19.0).abs() < 0.05);
        assert!((hits[1].distance - 28.0).abs() < 0.05);
    }

    #[test]
    fn off_axis_tap_misses() {
        let (mut scene, _) = scene_with_camera(Vector3::new(0.0, 0.0, 30.0));
        let root = scene.root();
        scene
            .add_node(root, Node::geometry(Shape::sphere(1.0), Material::default()))
            .expect("应能添加节点");

        let hits = scene
            .hit_test(Point2::new(10.0, 10.0), (1000.0, 800.0))
            .expect("应能拾取");
        assert!(hits.is_empty());
    }

    #[test]
    fn child_inherits_parent_transform() {
        let (mut scene, _) = scene_with_camera(Vector3::new(3.0, 0.0, 30.0));
        let root = scene.root();
        let ring = scene
            .add_node(
                root,
                Node::geometry(Shape::torus(3.0, 0.03), Material::default()),
            )
            .expect("应能添加轨道");
        let planet = scene
            .add_node(
                ring,
                Node::geometry(Shape::sphere(0.5), Material::default())
                    .with_transform(Transform::at(Vector3::new(3.0, 0.0, 0.0))),
            )
            .expect("应能添加行星");

        let hits = scene
            .hit_test(Point2::new(500.0, 400.0), (1000.0, 800.0))
            .expect("应能拾取");
        assert_eq!(hits.first().map(|h| h.node), Some(planet));
    }

    #[test]
    fn non_pickable_nodes_are_skipped() {
        let (mut scene, _) = scene_with_camera(Vector3::new(0.0, 0.0, 30.0));
        let root = scene.root();
        scene
            .add_node(
                root,
                Node::geometry(Shape::sphere(1.0), Material::default()).not_pickable(),
            )
            .expect("应能添加节点");

        let hits = scene
            .hit_test(Point2::new(500.0, 400.0), (1000.0, 800.0))
            .expect("应能拾取");
        assert!(hits.is_empty());
    }

    #[test]
    fn hit_test_without_camera_fails() {
        let scene = Scene::new();
        assert_eq!(
            scene.hit_test(Point2::new(0.0, 0.0), (100.0, 100.0)),
            Err(PickError::NoCamera)
        );
    }
}
