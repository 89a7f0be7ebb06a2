//! 布局 - 使用 Taffy 计算控件树的 Flexbox 布局

mod taffy_layout;

pub use taffy_layout::{compute_frames, MeasureContext};
