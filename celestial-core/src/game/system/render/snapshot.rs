use std::sync::Arc;

use nalgebra::{Matrix4, Point3, Vector2};
use tracing::warn;

use crate::{
    color::Color,
    game::{
        component::{
            camera::Camera, light::LightKind, material::LightingModel, shape::Shape,
            transform::Transform,
        },
        overlay::DrawItem,
        system::logic::View,
    },
    resource::ResourcePath,
};

use super::util;

pub(in crate::game::system::render) const MAX_OMNI_LIGHTS: usize = 8;

/// 一个几何节点在本帧的绘制参数。
#[derive(Debug, Clone)]
pub(crate) struct MeshDraw {
    pub(crate) shape: Arc<Shape>,
    pub(crate) model: Matrix4<f32>,
    pub(crate) color: Color,
    pub(crate) texture: Option<ResourcePath>,
    pub(crate) lit: bool,
    /// 到摄像机的视线深度，用于半透明物体排序。
    pub(crate) depth: f32,
}

#[derive(Debug, Clone)]
pub(crate) struct Scene3DSnapshot {
    /// OpenGL 约定的投影 × 视图矩阵（由渲染器转换到 wgpu 深度范围）。
    pub(crate) view_projection: Matrix4<f32>,
    pub(crate) ambient: [f32; 3],
    pub(crate) omni_lights: Vec<([f32; 3], [f32; 3])>,
    pub(crate) opaque: Vec<MeshDraw>,
    /// 已按从远到近排序。
    pub(crate) transparent: Vec<MeshDraw>,
}

/// 一帧要绘制的全部内容。
#[derive(Debug, Clone)]
pub(crate) struct FrameSnapshot {
    pub(crate) background: Color,
    pub(crate) scene: Option<Scene3DSnapshot>,
    pub(crate) overlay: Vec<DrawItem>,
    pub(crate) canvas: Vector2<f32>,
}

impl FrameSnapshot {
    pub(crate) fn empty(canvas: Vector2<f32>) -> Self {
        Self {
            background: Color::BLACK,
            scene: None,
            overlay: Vec::new(),
            canvas,
        }
    }

    /// 从画面采集快照。`framebuffer_size` 决定投影的宽高比。
    pub(crate) fn capture(view: &View, framebuffer_size: (u32, u32)) -> Self {
        Self {
            background: view.background,
            scene: capture_scene(view, framebuffer_size),
            overlay: view.overlay.draw_list(),
            canvas: view.overlay.canvas_size(),
        }
    }
}

fn capture_scene(view: &View, framebuffer_size: (u32, u32)) -> Option<Scene3DSnapshot> {
    let scene = &view.scene;
    let camera_id = scene.point_of_view()?;
    let camera: &Camera = scene.node(camera_id)?.camera()?;
    let camera_world = scene.world_matrix(camera_id)?;

    let aspect = framebuffer_size.0.max(1) as f32 / framebuffer_size.1.max(1) as f32;
    let projection = match camera.projection_matrix(aspect) {
        Ok(projection) => projection,
        Err(err) => {
            warn!(target: "celestial-core", error = %err, "skip 3D scene: invalid projection");
            return None;
        }
    };
    let view_matrix = Camera::view_matrix(&camera_world);
    let camera_position = Point3::from(Transform::translation_from_matrix(&camera_world));
    let forward = Transform::basis_from_matrix(&camera_world).forward;

    let mut opaque = Vec::new();
    let mut transparent = Vec::new();
    for drawable in scene.drawables() {
        let center = drawable.world.transform_point(&Point3::origin());
        let draw = MeshDraw {
            shape: drawable.shape,
            model: drawable.world,
            color: drawable.material.tint(),
            texture: drawable.material.texture_path().cloned(),
            lit: drawable.material.lighting() == LightingModel::Lambert,
            depth: (center - camera_position).dot(&forward),
        };
        if drawable.material.is_transparent() {
            transparent.push(draw);
        } else {
            opaque.push(draw);
        }
    }
    transparent.sort_by(|a, b| b.depth.total_cmp(&a.depth));

    let omni_lights: Vec<([f32; 3], [f32; 3])> = scene
        .lights()
        .into_iter()
        .filter(|l| l.light.kind() == LightKind::Omni)
        .map(|l| {
            let p = Transform::translation_from_matrix(&l.world);
            ([p.x, p.y, p.z], l.light.radiance())
        })
        .take(MAX_OMNI_LIGHTS)
        .collect();

    Some(Scene3DSnapshot {
        view_projection: util::opengl_to_wgpu_matrix() * projection * view_matrix,
        ambient: scene.ambient(),
        omni_lights,
        opaque,
        transparent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::component::{
        light::Light, material::Material, node::Node,
    };
    use nalgebra::Vector3;

    fn view_with_camera() -> View {
        let mut view = View::new(Vector2::new(1000.0, 800.0));
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
        view
    }

    #[test]
    fn scene_without_camera_has_no_3d_pass() {
        let view = View::new(Vector2::new(1000.0, 800.0));
        let snapshot = FrameSnapshot::capture(&view, (1000, 800));
        assert!(snapshot.scene.is_none());
        assert_eq!(snapshot.background, Color::BLACK);
    }

    #[test]
    fn transparent_meshes_sorted_far_to_near() {
        let mut view = view_with_camera();
        let root = view.scene.root();
        let ring = Material::color(Color::rgba(0.98, 0.98, 0.98, 0.4));
        for z in [5.0, -10.0, 0.0] {
            view.scene
                .add_node(
                    root,
                    Node::geometry(Shape::torus(1.0, 0.05), ring.clone())
                        .with_transform(Transform::at(Vector3::new(0.0, 0.0, z))),
                )
                .expect("应能添加节点");
        }
        view.scene
            .add_node(root, Node::geometry(Shape::sphere(1.0), Material::default()))
            .expect("应能添加节点");

        let scene = FrameSnapshot::capture(&view, (1000, 800))
            .scene
            .expect("应有 3D 场景");
        assert_eq!(scene.opaque.len(), 1);
        let depths: Vec<f32> = scene.transparent.iter().map(|d| d.depth).collect();
        assert_eq!(depths, vec![40.0, 30.0, 25.0]);
    }

    #[test]
    fn lights_are_collected() {
        let mut view = view_with_camera();
        let root = view.scene.root();
        view.scene
            .add_node(
                root,
                Node::unnamed()
                    .with_light(Light::omni())
                    .with_transform(Transform::at(Vector3::new(0.0, 10.0, 10.0))),
            )
            .expect("应能添加光源");
        view.scene
            .add_node(root, Node::unnamed().with_light(Light::ambient(Color::DARK_GRAY)))
            .expect("应能添加光源");

        let scene = FrameSnapshot::capture(&view, (1000, 800))
            .scene
            .expect("应有 3D 场景");
        assert_eq!(scene.omni_lights.len(), 1);
        assert_eq!(scene.omni_lights[0].0, [0.0, 10.0, 10.0]);
        assert!((scene.ambient[0] - 1.0 / 3.0).abs() < 1e-5);
    }
}
