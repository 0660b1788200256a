//! 引擎系统模块。
//!
//! - [`logic`]：视图控制器抽象与控制器栈（`ViewController` / `ViewStack`）
//! - [`render`]：渲染系统（3D 场景 + 界面层）

pub mod logic;
pub mod render;
