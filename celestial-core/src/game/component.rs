//! 场景节点的组成部分。
//!
//! 一个 [`node::Node`] 持有一份 [`transform::Transform`]，并可选地挂载：
//! - [`shape::Shape`] + [`material::Material`]：可见几何
//! - [`camera::Camera`]：可作为场景视点
//! - [`light::Light`]：点光源或环境光
//!
//! 组件都是普通值类型，由 [`Scene`](crate::game::scene::Scene) 通过节点统一持有与查询。

pub mod camera;
pub mod light;
pub mod material;
pub mod node;
pub mod shape;
pub mod transform;
