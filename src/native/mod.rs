//! 原生控件层 - 引擎驱动的保留式控件树

mod tree;
mod widget;

pub use tree::WidgetTree;
pub use widget::{
    Background, FontFace, Gravity, ImageSlot, InputType, LayoutParams, Listeners, Orientation,
    SizeSpec, Stroke, TextAlign, TextAttrs, Transform, Widget, WidgetId, WidgetKind, WidgetState,
};
