//! Mini Native - 脚本驱动的原生 UI 渲染引擎
//! 接收脚本提交的节点树，与已挂载的原生控件树协调，最小化控件变更

mod color;
mod geometry;

pub use color::Color;
pub use geometry::{Insets, Rect};

// 配置与错误
pub mod config;
pub mod error;

pub use config::{EngineConfig, UpdateStrategy};
pub use error::{EngineError, ImageError, TreeError};

// 节点树解析
pub mod parser;

// 原生控件模型
pub mod native;

// 协调引擎
pub mod renderer;

pub use renderer::Engine;

// Taffy 布局
pub mod layout;

// JS 引擎绑定
pub mod js;

// 应用运行时
pub mod runtime;

// 单元测试
#[cfg(test)]
mod tests;
