//! 渲染器 - 节点树协调、样式解析、图片与事件

pub mod animation;
mod engine;
pub mod event_registry;
pub mod fonts;
pub mod image_cache;
pub mod image_loader;
pub mod style_resolver;

pub use animation::{Animation, AnimationKind, AnimationSpec};
pub use engine::{widget_kind_for, Engine, EngineRequest, RenderStats};
pub use event_registry::{DispatchOutcome, EventRegistry, Handler, RoutedEvent};
pub use fonts::FontRegistry;
pub use image_cache::{Bitmap, ImageCache};
pub use image_loader::{CompletedLoad, ImageLoader, LoadOutcome};
