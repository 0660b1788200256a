//! 天体数据表与行星系的场景图搭建。

use std::{collections::HashMap, fmt};

use nalgebra::Vector3;

use celestial_core::{
    color::Color,
    game::{
        action::Action,
        component::{
            material::Material,
            node::{Node, NodeHierarchyError, NodeId, NodeNameError},
            shape::Shape,
            transform::Transform,
        },
        scene::Scene,
    },
};

/// 太阳系的八大行星，按轨道由内到外。
pub const SOLAR_PLANETS: [&str; 8] = [
    "mercury", "venus", "earth", "mars", "jupiter", "saturn", "uranus", "neptune",
];

pub const SOLAR_SYSTEM: &str = "Solar system";

const ORBIT_COLOR: Color = Color::rgba(0.98, 0.98, 0.98, 0.4);
const ORBIT_PIPE_RADIUS: f32 = 0.03;
const SATELLITE_PIPE_RADIUS: f32 = 0.05;

const MOON_DISTANCE: f32 = 0.7;
const MOON_SIZE: f32 = 0.2;
const MOON_RING_VELOCITY: f32 = 3.2;

const SATURN_RING_RADIUS: f32 = 0.9;
const SATURN_RING_COLOR: Color = Color::rgb(0.94, 0.85, 0.67);

const SUN_SIZE: f32 = 2.0;
const SUN_ROTATION: f32 = 0.2;

/// 轨道上下浮动一次（单程）的时长。
const BOB_DURATION: f32 = 4.0;
const RING_BOB_HEIGHT: f32 = 0.6;
const PLANET_BOB_HEIGHT: f32 = 0.1;

/// 天体内部的一层球壳。
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub color: Color,
}

impl Layer {
    pub fn new(name: impl Into<String>, color: Color) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }
}

/// 一个天体：显示尺寸、自转速度（弧度/秒）与由内到外的内部分层。
#[derive(Debug, Clone, PartialEq)]
pub struct CelestialBody {
    name: String,
    size: f32,
    rotation: f32,
    layers: Vec<Layer>,
}

impl CelestialBody {
    /// 按名称查表。未知名称得到尺寸 0、不自转、没有分层的天体。
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let (size, rotation, layers) = match name.as_str() {
            "mercury" => (
                0.2,
                0.8,
                vec![
                    Layer::new("Core", Color::rgb(0.96, 0.76, 0.15)),
                    Layer::new("Mantle", Color::rgb(0.84, 0.29, 0.11)),
                    Layer::new("Crust", Color::rgb(0.47, 0.56, 0.62)),
                ],
            ),
            "venus" => (
                0.4,
                0.45,
                vec![
                    Layer::new("Core", Color::rgb(1.00, 1.00, 0.44)),
                    Layer::new("Mantle", Color::rgb(0.99, 0.67, 0.29)),
                    Layer::new("Crust", Color::rgb(0.91, 0.29, 0.00)),
                ],
            ),
            "earth" => (
                0.5,
                0.6,
                vec![
                    Layer::new("Inner Core", Color::rgb(1.00, 1.00, 0.80)),
                    Layer::new("Outer Core", Color::rgb(1.00, 0.80, 0.00)),
                    Layer::new("Mantle", Color::rgb(1.00, 0.40, 0.20)),
                    Layer::new("Crust", Color::rgb(0.60, 0.40, 0.20)),
                ],
            ),
            "mars" => (
                0.4,
                0.4,
                vec![
                    Layer::new("Core", Color::rgb(0.83, 0.27, 0.08)),
                    Layer::new("Mantle", Color::rgb(0.48, 0.46, 0.36)),
                    Layer::new("Crust", Color::rgb(0.80, 0.56, 0.29)),
                ],
            ),
            "jupiter" => (0.9, 0.65, gas_giant_layers()),
            "saturn" => (0.7, 0.1, gas_giant_layers()),
            "uranus" => (0.5, 0.2, ice_giant_layers()),
            "neptune" => (0.4, 0.4, ice_giant_layers()),
            _ => (0.0, 0.0, Vec::new()),
        };

        Self {
            name,
            size,
            rotation,
            layers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// 由内到外。
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// 资源包中的表面纹理路径。
    pub fn texture_path(&self) -> String {
        texture_path(&self.name)
    }

    /// 首字母大写的显示名，例如 `Earth`。
    pub fn display_name(&self) -> String {
        capitalized(&self.name)
    }
}

fn gas_giant_layers() -> Vec<Layer> {
    vec![
        Layer::new("Core", Color::rgb(0.35, 0.22, 0.02)),
        Layer::new("Metallic hydrogen", Color::rgb(0.32, 0.33, 0.42)),
        Layer::new("Molecular hydrogen", Color::rgb(0.56, 0.56, 0.56)),
    ]
}

fn ice_giant_layers() -> Vec<Layer> {
    vec![
        Layer::new("Core", Color::rgb(0.35, 0.22, 0.02)),
        Layer::new("Mantle", Color::rgb(0.65, 0.64, 0.78)),
        Layer::new("Crust", Color::rgb(0.54, 0.59, 0.90)),
    ]
}

fn texture_path(name: &str) -> String {
    format!("Textures/{name}.jpg")
}

/// 每个空白分隔的单词首字母大写，其余小写。
pub fn capitalized(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 环形轨道：半径与绕 Y 轴的角速度（弧度/秒）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ring {
    pub radius: f32,
    pub velocity: f32,
}

impl Ring {
    pub fn new(radius: f32, velocity: f32) -> Self {
        Self { radius, velocity }
    }
}

/// 行星系的轨道坐标：第 `i` 颗行星的轨道半径与角速度。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoordinateSystem {
    orbit_distances: Vec<f32>,
    velocities: Vec<f32>,
}

impl CoordinateSystem {
    /// 未知的行星系没有任何轨道。
    pub fn of_system(name: &str) -> Self {
        match name {
            SOLAR_SYSTEM => Self {
                orbit_distances: vec![3.0, 4.2, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0],
                velocities: vec![0.6, 0.4, 0.25, 0.2, 0.45, 0.35, 0.25, 0.2],
            },
            _ => Self::default(),
        }
    }

    /// 第 `index` 条轨道；距离与速度必须同时存在。
    pub fn orbit(&self, index: usize) -> Option<Ring> {
        let radius = *self.orbit_distances.get(index)?;
        let velocity = *self.velocities.get(index)?;
        Some(Ring::new(radius, velocity))
    }
}

/// 搭建行星系时的错误。
#[derive(Debug, PartialEq)]
pub enum UniverseError {
    /// 坐标系中没有第 `index` 颗行星的轨道。
    MissingOrbit {
        system: String,
        planet: String,
        index: usize,
    },
    NodeName(NodeNameError),
    Hierarchy(NodeHierarchyError),
}

impl fmt::Display for UniverseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniverseError::MissingOrbit {
                system,
                planet,
                index,
            } => write!(f, "行星系 {system} 中没有第 {index} 条轨道（行星 {planet}）"),
            UniverseError::NodeName(err) => write!(f, "天体节点名称无效: {err}"),
            UniverseError::Hierarchy(err) => write!(f, "天体节点挂载失败: {err}"),
        }
    }
}

impl std::error::Error for UniverseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UniverseError::MissingOrbit { .. } => None,
            UniverseError::NodeName(err) => Some(err),
            UniverseError::Hierarchy(err) => Some(err),
        }
    }
}

impl From<NodeNameError> for UniverseError {
    fn from(err: NodeNameError) -> Self {
        UniverseError::NodeName(err)
    }
}

impl From<NodeHierarchyError> for UniverseError {
    fn from(err: NodeHierarchyError) -> Self {
        UniverseError::Hierarchy(err)
    }
}

/// 已经挂进场景的行星系。
///
/// 记录每个行星节点对应的天体，供点击拾取后查询。
#[derive(Debug)]
pub struct PlanetarySystem {
    name: String,
    planets: Vec<String>,
    planet_nodes: HashMap<NodeId, CelestialBody>,
    sun: NodeId,
}

impl PlanetarySystem {
    /// 在 `scene` 根节点下搭建行星系：每颗行星一条轨道环，行星挂在环上，最后放置中心恒星。
    ///
    /// 轨道环与行星都会开始永久自转和上下浮动；地球带一颗卫星，土星带一圈光环。
    pub fn build<I, S>(name: &str, planets: I, scene: &mut Scene) -> Result<Self, UniverseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let coordinates = CoordinateSystem::of_system(name);
        let planets: Vec<String> = planets.into_iter().map(Into::into).collect();
        let mut planet_nodes = HashMap::with_capacity(planets.len());
        let root = scene.root();

        for (index, planet_name) in planets.iter().enumerate() {
            let body = CelestialBody::named(planet_name.as_str());
            let ring = coordinates
                .orbit(index)
                .ok_or_else(|| UniverseError::MissingOrbit {
                    system: name.to_string(),
                    planet: planet_name.clone(),
                    index,
                })?;

            let ring_node = add_ring(
                scene,
                root,
                &format!("orbit_{planet_name}"),
                ring.radius,
                ORBIT_PIPE_RADIUS,
                ORBIT_COLOR,
            )?;
            let planet_node = add_body(scene, ring_node, planet_name, body.size(), ring.radius)?;

            scene.run_action(ring_node, spin(ring.velocity))?;
            scene.run_action(planet_node, spin(body.rotation()))?;
            scene.run_action(ring_node, bob(RING_BOB_HEIGHT))?;
            scene.run_action(planet_node, bob(PLANET_BOB_HEIGHT))?;

            match body.name() {
                "earth" => {
                    let moon_ring = add_ring(
                        scene,
                        planet_node,
                        "moon_orbit",
                        MOON_DISTANCE,
                        SATELLITE_PIPE_RADIUS,
                        ORBIT_COLOR,
                    )?;
                    add_body(scene, moon_ring, "moon", MOON_SIZE, MOON_DISTANCE)?;
                    scene.run_action(moon_ring, spin(MOON_RING_VELOCITY))?;
                }
                "saturn" => {
                    add_ring(
                        scene,
                        planet_node,
                        "saturn_ring",
                        SATURN_RING_RADIUS,
                        SATELLITE_PIPE_RADIUS,
                        SATURN_RING_COLOR,
                    )?;
                }
                _ => {}
            }

            planet_nodes.insert(planet_node, body);
        }

        let sun = add_body(scene, root, "sun", SUN_SIZE, 0.0)?;
        scene.run_action(sun, spin(SUN_ROTATION))?;

        Ok(Self {
            name: name.to_string(),
            planets,
            planet_nodes,
            sun,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn planets(&self) -> &[String] {
        &self.planets
    }

    pub fn sun(&self) -> NodeId {
        self.sun
    }

    /// 节点对应的行星；卫星、轨道环与恒星返回 `None`。
    pub fn body_for(&self, node: NodeId) -> Option<&CelestialBody> {
        self.planet_nodes.get(&node)
    }

    /// 行星名称对应的节点。
    #[cfg(test)]
    pub fn node_of(&self, planet: &str) -> Option<NodeId> {
        self.planet_nodes
            .iter()
            .find_map(|(node, body)| (body.name() == planet).then_some(*node))
    }
}

fn add_ring(
    scene: &mut Scene,
    parent: NodeId,
    name: &str,
    radius: f32,
    pipe_radius: f32,
    color: Color,
) -> Result<NodeId, UniverseError> {
    let node = Node::new(name)?
        .with_shape(Shape::torus(radius, pipe_radius))
        .with_material(Material::color(color));
    Ok(scene.add_node(parent, node)?)
}

fn add_body(
    scene: &mut Scene,
    parent: NodeId,
    name: &str,
    size: f32,
    distance: f32,
) -> Result<NodeId, UniverseError> {
    let node = Node::new(name)?
        .with_shape(Shape::sphere(size))
        .with_material(Material::texture(texture_path(name)))
        .with_transform(Transform::at(Vector3::new(distance, 0.0, 0.0)));
    Ok(scene.add_node(parent, node)?)
}

/// 绕 Y 轴每秒转 `velocity` 弧度，永不停止。
pub fn spin(velocity: f32) -> Action {
    Action::repeat_forever(Action::rotate_by(Vector3::new(0.0, velocity, 0.0), 1.0))
}

fn bob(height: f32) -> Action {
    let rise = Action::move_by(Vector3::new(0.0, height, 0.0), BOB_DURATION);
    let fall = rise.reversed();
    Action::repeat_forever(Action::sequence([rise, fall]))
}
