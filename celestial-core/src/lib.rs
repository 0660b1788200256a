//! Celestial 的核心库（`celestial-core`）。
//!
//! 该 crate 提供运行时（[`Game`]）、事件与手势（[`event`]）、资源包（[`resource`]）、
//! 音频（[`audio`]）、文字栅格化（[`text`]）以及场景/界面/控制器模块（[`game`]）。
//!
//! 应用通常只需要：
//! - 实现 [`game::system::logic::ViewController`]，在 `load` 中搭建 [`game::scene::Scene`] 与 [`game::overlay::Overlay`]
//! - 用根控制器创建 [`Game`] 并运行主循环

pub mod audio;
pub mod color;
pub mod config;
pub mod event;
pub mod game;
pub mod logger;
pub mod resource;
pub mod text;
mod window;

pub use game::Game;
