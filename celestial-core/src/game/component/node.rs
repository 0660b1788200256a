use std::{fmt, sync::Arc};

use uuid::Uuid;

use super::{camera::Camera, light::Light, material::Material, shape::Shape, transform::Transform};
use crate::game::action::RunningAction;

/// 场景节点标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Uuid);

impl NodeId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// 场景节点：变换、可选的几何/材质/光源/摄像机，以及正在执行的动作。
///
/// 父子关系由 [`Scene`](crate::game::scene::Scene) 维护；节点本身只记录父节点与子节点列表。
///
/// 名称约束如下：
/// - 不能为空字符串；
/// - 不得包含空白字符；
/// - 不得包含字符 `/`。
#[derive(Clone)]
pub struct Node {
    name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub transform: Transform,
    shape: Option<Arc<Shape>>,
    material: Option<Material>,
    light: Option<Light>,
    camera: Option<Camera>,
    pickable: bool,
    pub(crate) actions: Vec<RunningAction>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("transform", &self.transform)
            .field("shape", &self.shape.as_ref().map(|s| s.triangle_count()))
            .field("material", &self.material)
            .field("light", &self.light)
            .field("camera", &self.camera.is_some())
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::unnamed()
    }
}

impl Node {
    /// 构造节点并校验名称规则。
    pub fn new(name: impl Into<String>) -> Result<Self, NodeNameError> {
        let name = name.into();
        Self::validate_name(&name)?;
        Ok(Self::with_valid_name(name))
    }

    /// 使用自动生成的名称构造节点。
    pub fn unnamed() -> Self {
        Self::with_valid_name(format!("node_{}", &Uuid::new_v4().simple().to_string()[..8]))
    }

    pub(crate) fn root() -> Self {
        Self::with_valid_name(String::from("root"))
    }

    fn with_valid_name(name: String) -> Self {
        Self {
            name,
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            shape: None,
            material: None,
            light: None,
            camera: None,
            pickable: true,
            actions: Vec::new(),
        }
    }

    /// 带几何与材质的节点。
    pub fn geometry(shape: impl Into<Arc<Shape>>, material: Material) -> Self {
        Self::unnamed().with_shape(shape).with_material(material)
    }

    pub fn with_shape(mut self, shape: impl Into<Arc<Shape>>) -> Self {
        self.shape = Some(shape.into());
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_light(mut self, light: Light) -> Self {
        self.light = Some(light);
        self
    }

    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// 不参与点击拾取（如星空背景）。
    pub fn not_pickable(mut self) -> Self {
        self.pickable = false;
        self
    }

    /// 返回节点名称。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 返回父节点（若存在）。
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// 返回子节点列表的只读视图。
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn shape(&self) -> Option<&Arc<Shape>> {
        self.shape.as_ref()
    }

    pub fn material(&self) -> Option<&Material> {
        self.material.as_ref()
    }

    pub fn material_mut(&mut self) -> Option<&mut Material> {
        self.material.as_mut()
    }

    pub fn light(&self) -> Option<&Light> {
        self.light.as_ref()
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        self.camera.as_mut()
    }

    pub fn is_pickable(&self) -> bool {
        self.pickable
    }

    /// 正在执行的动作数量。
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub(crate) fn validate_name(name: &str) -> Result<(), NodeNameError> {
        if name.is_empty() {
            return Err(NodeNameError::Empty);
        }
        if name.contains('/') {
            return Err(NodeNameError::ContainsSlash);
        }
        if name.chars().any(char::is_whitespace) {
            return Err(NodeNameError::ContainsWhitespace);
        }
        Ok(())
    }
}

/// 节点名称格式错误。
#[derive(Debug, PartialEq, Eq)]
pub enum NodeNameError {
    Empty,
    ContainsSlash,
    ContainsWhitespace,
}

impl fmt::Display for NodeNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeNameError::Empty => write!(f, "节点名称不能为空"),
            NodeNameError::ContainsSlash => write!(f, "节点名称不能包含 '/'"),
            NodeNameError::ContainsWhitespace => write!(f, "节点名称不能包含空白字符"),
        }
    }
}

impl std::error::Error for NodeNameError {}

/// 节点关系维护中的错误类型。
#[derive(Debug, PartialEq, Eq)]
pub enum NodeHierarchyError {
    /// 指定节点不在场景中。
    MissingNode(NodeId),
    /// 尝试将节点挂载到自身。
    SelfAttachment(NodeId),
    /// 操作会导致祖先/后代之间形成环。
    HierarchyCycle {
        ancestor: NodeId,
        descendant: NodeId,
    },
    /// 根节点不能被移除或重新挂载。
    RootNode(NodeId),
}

impl std::fmt::Display for NodeHierarchyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeHierarchyError::MissingNode(id) => {
                write!(f, "节点 {} 不在场景中", id)
            }
            NodeHierarchyError::SelfAttachment(id) => {
                write!(f, "节点 {} 不能挂载到自身", id)
            }
            NodeHierarchyError::HierarchyCycle {
                ancestor,
                descendant,
            } => {
                write!(f, "将节点 {} 挂载到 {} 会导致层级循环", descendant, ancestor)
            }
            NodeHierarchyError::RootNode(id) => {
                write!(f, "节点 {} 是根节点，不能移除或重新挂载", id)
            }
        }
    }
}

impl std::error::Error for NodeHierarchyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_name_validation() {
        assert_eq!(Node::new("").unwrap_err(), NodeNameError::Empty);
        assert_eq!(Node::new("a/b").unwrap_err(), NodeNameError::ContainsSlash);
        assert_eq!(
            Node::new("two words").unwrap_err(),
            NodeNameError::ContainsWhitespace
        );
        assert_eq!(Node::new("earth").expect("合法名称").name(), "earth");
    }

    #[test]
    fn unnamed_node_has_valid_name() {
        let node = Node::unnamed();
        assert!(Node::validate_name(node.name()).is_ok());
        assert!(node.is_pickable());
        assert!(node.parent().is_none());
    }

    #[test]
    fn builder_sets_components() {
        let node = Node::geometry(Shape::sphere(1.0), Material::default())
            .with_light(Light::omni())
            .not_pickable();
        assert!(node.shape().is_some());
        assert!(node.material().is_some());
        assert!(node.light().is_some());
        assert!(node.camera().is_none());
        assert!(!node.is_pickable());
    }
}
