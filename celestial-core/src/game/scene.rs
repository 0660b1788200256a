//! 3D 场景图。
//!
//! [`Scene`] 以 [`NodeId`] 为键持有全部节点，并维护严格的树形父子关系：
//! 每个节点最多一个父节点，不允许自挂载与环。根节点在创建时生成，不能被移除。

use std::{collections::HashMap, ops::ControlFlow, sync::Arc};

use nalgebra::Matrix4;
use tracing::debug;

use super::{
    action::{Action, RunningAction},
    component::{
        light::{Light, LightKind},
        material::Material,
        node::{Node, NodeHierarchyError, NodeId},
        shape::Shape,
    },
};

/// 一个可绘制节点在当前帧的快照。
#[derive(Debug, Clone)]
pub struct Drawable {
    pub node: NodeId,
    pub world: Matrix4<f32>,
    pub shape: Arc<Shape>,
    pub material: Material,
}

/// 一个光源在当前帧的快照。
#[derive(Debug, Clone)]
pub struct SceneLight {
    pub world: Matrix4<f32>,
    pub light: Light,
}

#[derive(Debug)]
pub struct Scene {
    root: NodeId,
    nodes: HashMap<NodeId, Node>,
    point_of_view: Option<NodeId>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let root = NodeId::new();
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::root());
        Self {
            root,
            nodes,
            point_of_view: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// 把新节点挂到 `parent` 下并返回其标识。
    pub fn add_node(&mut self, parent: NodeId, mut node: Node) -> Result<NodeId, NodeHierarchyError> {
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or(NodeHierarchyError::MissingNode(parent))?;

        let id = NodeId::new();
        parent_node.children.push(id);
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// 把已有节点 `child` 重新挂到 `parent` 下。
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), NodeHierarchyError> {
        if child == parent {
            return Err(NodeHierarchyError::SelfAttachment(child));
        }
        if child == self.root {
            return Err(NodeHierarchyError::RootNode(child));
        }
        self.ensure_exists(parent)?;
        self.ensure_exists(child)?;

        if self.is_ancestor(child, parent)? {
            return Err(NodeHierarchyError::HierarchyCycle {
                ancestor: parent,
                descendant: child,
            });
        }

        let previous_parent = self.nodes.get(&child).and_then(Node::parent);
        if previous_parent == Some(parent) {
            return Ok(());
        }

        if let Some(old_parent) = previous_parent {
            let old = self
                .nodes
                .get_mut(&old_parent)
                .ok_or(NodeHierarchyError::MissingNode(old_parent))?;
            old.children.retain(|existing| *existing != child);
        }

        if let Some(parent_node) = self.nodes.get_mut(&parent)
            && !parent_node.children.contains(&child)
        {
            parent_node.children.push(child);
        }
        if let Some(child_node) = self.nodes.get_mut(&child) {
            child_node.parent = Some(parent);
        }
        Ok(())
    }

    /// 移除节点及其整棵子树，返回被移除的节点数量。
    pub fn remove(&mut self, id: NodeId) -> Result<usize, NodeHierarchyError> {
        if id == self.root {
            return Err(NodeHierarchyError::RootNode(id));
        }
        self.ensure_exists(id)?;

        if let Some(parent) = self.nodes.get(&id).and_then(Node::parent)
            && let Some(parent_node) = self.nodes.get_mut(&parent)
        {
            parent_node.children.retain(|existing| *existing != id);
        }

        let subtree = self.descendants(id);
        for removed in &subtree {
            self.nodes.remove(removed);
            if self.point_of_view == Some(*removed) {
                self.point_of_view = None;
            }
        }
        debug!(target: "celestial-core", node = %id, removed = subtree.len(), "scene subtree removed");
        Ok(subtree.len())
    }

    /// 深度优先、先序遍历 `id` 及其全部后代。
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// 计算节点的世界矩阵（沿父链叠乘：`world = parent_world * local`）。
    pub fn world_matrix(&self, id: NodeId) -> Option<Matrix4<f32>> {
        let mut world = Matrix4::identity();
        let found = self
            .walk_ancestor_chain(Some(id), id, |_, node| {
                world = node.transform.matrix() * world;
                Ok(ControlFlow::<(), _>::Continue(node.parent))
            })
            .ok()?;
        debug_assert!(found.is_none());
        Some(world)
    }

    /// 构建从根节点开始的路径表示，例如 `root/ring_3/earth`。
    pub fn path(&self, id: NodeId) -> Result<String, NodeHierarchyError> {
        let mut segments = Vec::new();
        self.walk_ancestor_chain::<(), _>(Some(id), id, |_, node| {
            segments.push(node.name().to_owned());
            Ok(ControlFlow::Continue(node.parent))
        })?;
        segments.reverse();
        Ok(segments.join("/"))
    }

    /// 在节点上开始执行一个动作；同一节点上的多个动作并行推进。
    pub fn run_action(&mut self, id: NodeId, action: Action) -> Result<(), NodeHierarchyError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(NodeHierarchyError::MissingNode(id))?;
        node.actions.push(RunningAction::new(action));
        Ok(())
    }

    /// 推进所有节点上的动作，已完成的动作会被移除。
    pub fn advance(&mut self, delta: f32) {
        if delta <= 0.0 {
            return;
        }
        for node in self.nodes.values_mut() {
            if node.actions.is_empty() {
                continue;
            }
            let Node {
                actions, transform, ..
            } = node;
            for running in actions.iter_mut() {
                running.step(delta).apply(transform);
            }
            actions.retain(|running| !running.is_finished());
        }
    }

    /// 指定渲染与拾取所用的摄像机节点。
    pub fn set_point_of_view(&mut self, id: NodeId) -> Result<(), NodeHierarchyError> {
        self.ensure_exists(id)?;
        self.point_of_view = Some(id);
        Ok(())
    }

    /// 当前摄像机节点：优先使用显式指定的节点，否则取遍历顺序中第一个带摄像机的节点。
    pub fn point_of_view(&self) -> Option<NodeId> {
        self.point_of_view
            .filter(|id| self.nodes.get(id).is_some_and(|n| n.camera().is_some()))
            .or_else(|| {
                self.descendants(self.root)
                    .into_iter()
                    .find(|id| self.nodes.get(id).is_some_and(|n| n.camera().is_some()))
            })
    }

    /// 所有带几何与材质的节点（遍历顺序）。
    pub fn drawables(&self) -> Vec<Drawable> {
        self.descendants(self.root)
            .into_iter()
            .filter_map(|id| {
                let node = self.nodes.get(&id)?;
                let shape = node.shape()?.clone();
                let material = node.material().cloned().unwrap_or_default();
                Some(Drawable {
                    node: id,
                    world: self.world_matrix(id)?,
                    shape,
                    material,
                })
            })
            .collect()
    }

    pub fn lights(&self) -> Vec<SceneLight> {
        self.descendants(self.root)
            .into_iter()
            .filter_map(|id| {
                let node = self.nodes.get(&id)?;
                let light = node.light()?.clone();
                Some(SceneLight {
                    world: self.world_matrix(id)?,
                    light,
                })
            })
            .collect()
    }

    /// 所有环境光颜色之和。
    pub fn ambient(&self) -> [f32; 3] {
        self.lights()
            .iter()
            .filter(|l| l.light.kind() == LightKind::Ambient)
            .fold([0.0; 3], |acc, l| {
                let r = l.light.radiance();
                [acc[0] + r[0], acc[1] + r[1], acc[2] + r[2]]
            })
    }

    fn ensure_exists(&self, id: NodeId) -> Result<(), NodeHierarchyError> {
        if self.nodes.contains_key(&id) {
            Ok(())
        } else {
            Err(NodeHierarchyError::MissingNode(id))
        }
    }

    /// `candidate` 是否为 `id` 本身或其祖先。
    fn is_ancestor(&self, candidate: NodeId, id: NodeId) -> Result<bool, NodeHierarchyError> {
        let found = self.walk_ancestor_chain(Some(id), id, |node_id, node| {
            if node_id == candidate {
                return Ok(ControlFlow::Break(()));
            }
            Ok(ControlFlow::Continue(node.parent))
        })?;
        Ok(found.is_some())
    }

    fn walk_ancestor_chain<R, F>(
        &self,
        start: Option<NodeId>,
        descendant: NodeId,
        mut step: F,
    ) -> Result<Option<R>, NodeHierarchyError>
    where
        F: FnMut(NodeId, &Node) -> Result<ControlFlow<R, Option<NodeId>>, NodeHierarchyError>,
    {
        let mut hops = 0usize;
        let mut current = start;
        while let Some(id) = current {
            hops += 1;
            if hops > self.nodes.len() {
                return Err(NodeHierarchyError::HierarchyCycle {
                    ancestor: id,
                    descendant,
                });
            }
            let node = self
                .nodes
                .get(&id)
                .ok_or(NodeHierarchyError::MissingNode(id))?;
            match step(id, node)? {
                ControlFlow::Break(result) => return Ok(Some(result)),
                ControlFlow::Continue(next) => current = next,
            }
        }
        Ok(None)
    }
}
