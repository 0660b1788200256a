//! 场景、界面与运行时。
//!
//! - [`scene`] / [`component`]：3D 场景图与节点组件
//! - [`action`] / [`timeline`]：节点动作与定时编排
//! - [`overlay`]：叠加在场景上的 2D 界面层及其动画
//! - [`picking`] / [`camera_control`]：点击拾取与手势控制摄像机
//! - [`system`]：视图控制器与渲染

pub mod action;
pub mod camera_control;
pub mod component;
pub mod overlay;
pub mod picking;
pub mod scene;
pub mod system;
pub mod timeline;

mod runtime;

pub use runtime::Game;
