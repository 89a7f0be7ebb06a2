//! 控件树 -> Taffy 节点树，计算后展开为绝对坐标

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::geometry::Rect;
use crate::native::{Gravity, Orientation, SizeSpec, Widget, WidgetId, WidgetKind, WidgetTree};
use crate::renderer::FontRegistry;
use std::collections::HashMap;
use taffy::prelude::*;
use taffy::geometry::Point;
use taffy::style::Overflow;

const CHAR_WIDTH_FACTOR: f32 = 0.55;
const LINE_HEIGHT_FACTOR: f32 = 1.2;
const CHECKBOX_BOX_DP: f32 = 32.0;
const PROGRESS_DP: f32 = 48.0;
const EDIT_MIN_HEIGHT_DP: f32 = 48.0;

/// 叶子控件的测量上下文
#[derive(Debug, Clone)]
pub struct MeasureContext {
    pub kind: WidgetKind,
    pub text: String,
    pub size_px: f32,
    pub face: crate::native::FontFace,
    /// 已加载位图的尺寸
    pub bitmap: Option<(u32, u32)>,
}

impl MeasureContext {
    fn from_widget(widget: &Widget, config: &EngineConfig) -> Self {
        let state = widget.state();
        let text = if state.text.is_empty() && widget.kind() == WidgetKind::EditText {
            state.hint.clone()
        } else {
            state.text.clone()
        };
        Self {
            kind: widget.kind(),
            text,
            size_px: config.dp_f(state.text_attrs.size_sp),
            face: state.text_attrs.face.clone(),
            bitmap: state.image.bitmap.as_ref().map(|b| (b.width, b.height)),
        }
    }
}

fn measure_text(ctx: &MeasureContext, fonts: &FontRegistry, max_width: Option<f32>) -> taffy::Size<f32> {
    let (width, line_height) = match fonts.typeface(&ctx.face) {
        Some(tf) => tf.measure(&ctx.text, ctx.size_px),
        None => (
            ctx.text.chars().count() as f32 * ctx.size_px * CHAR_WIDTH_FACTOR,
            ctx.size_px * LINE_HEIGHT_FACTOR,
        ),
    };
    match max_width {
        Some(max) if max > 0.0 && width > max => {
            let lines = (width / max).ceil();
            taffy::Size { width: max, height: line_height * lines }
        }
        _ => taffy::Size { width, height: line_height },
    }
}

fn measure_leaf(
    known: taffy::Size<Option<f32>>,
    available: taffy::Size<AvailableSpace>,
    ctx: Option<&mut MeasureContext>,
    fonts: &FontRegistry,
    config: &EngineConfig,
) -> taffy::Size<f32> {
    let Some(ctx) = ctx else {
        return taffy::Size::ZERO;
    };
    let max_width = known.width.or(match available.width {
        AvailableSpace::Definite(w) => Some(w),
        _ => None,
    });

    let measured = match ctx.kind {
        WidgetKind::ImageView => match ctx.bitmap {
            Some((w, h)) => taffy::Size { width: w as f32, height: h as f32 },
            None => taffy::Size::ZERO,
        },
        WidgetKind::ProgressBar => {
            let side = config.dp_f(PROGRESS_DP);
            taffy::Size { width: side, height: side }
        }
        WidgetKind::CheckBox => {
            let box_px = config.dp_f(CHECKBOX_BOX_DP);
            let text = measure_text(ctx, fonts, max_width.map(|w| (w - box_px).max(0.0)));
            taffy::Size { width: text.width + box_px, height: text.height.max(box_px) }
        }
        WidgetKind::EditText => {
            let text = measure_text(ctx, fonts, max_width);
            taffy::Size { width: text.width, height: text.height.max(config.dp_f(EDIT_MIN_HEIGHT_DP)) }
        }
        _ => measure_text(ctx, fonts, max_width),
    };

    taffy::Size {
        width: known.width.unwrap_or(measured.width),
        height: known.height.unwrap_or(measured.height),
    }
}

fn main_axis_is_row(parent: &Widget) -> bool {
    match parent.kind() {
        WidgetKind::Layout => parent.state().orientation == Orientation::Horizontal,
        _ => false,
    }
}

fn dimension(spec: SizeSpec) -> Dimension {
    match spec {
        SizeSpec::Exact(px) => length(px as f32),
        SizeSpec::Percent(pct) => percent(pct / 100.0),
        SizeSpec::Match | SizeSpec::Wrap => auto(),
    }
}

/// 把控件的布局参数映射为 Flexbox 样式；row 表示父容器主轴为水平方向
fn widget_style(widget: &Widget, parent_row: bool) -> Style {
    let state = widget.state();
    let params = state.layout;
    let (main, cross) = if parent_row { (params.width, params.height) } else { (params.height, params.width) };

    let mut style = Style {
        display: Display::Flex,
        flex_direction: match (widget.kind(), state.orientation) {
            (WidgetKind::HorizontalScroll, _) => FlexDirection::Row,
            (_, Orientation::Horizontal) => FlexDirection::Row,
            (_, Orientation::Vertical) => FlexDirection::Column,
        },
        size: Size { width: dimension(params.width), height: dimension(params.height) },
        flex_shrink: 0.0,
        align_self: Some(match cross {
            SizeSpec::Match => AlignSelf::Stretch,
            _ => AlignSelf::FlexStart,
        }),
        ..Default::default()
    };

    if main == SizeSpec::Match {
        style.flex_grow = 1.0;
    }

    let m = params.margins;
    let horizontal_auto = matches!(params.gravity, Some(Gravity::CenterHorizontal | Gravity::Center));
    let vertical_auto = matches!(params.gravity, Some(Gravity::CenterVertical | Gravity::Center));
    let edge = |value: i32, centered: bool| -> LengthPercentageAuto {
        if centered {
            auto()
        } else {
            length(value as f32)
        }
    };
    style.margin = taffy::Rect {
        top: edge(m.top, vertical_auto),
        right: edge(m.right, horizontal_auto),
        bottom: edge(m.bottom, vertical_auto),
        left: edge(m.left, horizontal_auto),
    };

    let p = state.padding;
    style.padding = taffy::Rect {
        top: length(p.top as f32),
        right: length(p.right as f32),
        bottom: length(p.bottom as f32),
        left: length(p.left as f32),
    };

    if let Some(stroke) = state.background.and_then(|b| b.stroke) {
        let w = length(stroke.width.max(0) as f32);
        style.border = taffy::Rect { top: w, right: w, bottom: w, left: w };
    }

    if widget.kind() == WidgetKind::HorizontalScroll {
        style.overflow = Point { x: Overflow::Scroll, y: Overflow::Visible };
    }
    style
}

struct Builder<'a> {
    tree: &'a WidgetTree,
    config: &'a EngineConfig,
    taffy: TaffyTree<MeasureContext>,
    nodes: Vec<(WidgetId, NodeId)>,
}

impl Builder<'_> {
    fn build(&mut self, id: WidgetId, parent_row: bool) -> Result<NodeId, EngineError> {
        let tree = self.tree;
        let widget = tree.widget(id)?;
        let style = widget_style(widget, parent_row);

        let created = if widget.kind().is_container() {
            let row = widget.kind() == WidgetKind::HorizontalScroll || main_axis_is_row(widget);
            let mut children = Vec::with_capacity(widget.children().len());
            for child in widget.children() {
                children.push(self.build(*child, row)?);
            }
            self.taffy.new_with_children(style, &children)
        } else {
            self.taffy
                .new_leaf_with_context(style, MeasureContext::from_widget(widget, self.config))
        };
        let node = created.map_err(|e| EngineError::Layout(e.to_string()))?;

        self.nodes.push((id, node));
        Ok(node)
    }
}

/// 计算 host 下所有控件的绝对坐标（像素）
pub fn compute_frames(
    tree: &WidgetTree,
    host: WidgetId,
    fonts: &FontRegistry,
    config: &EngineConfig,
) -> Result<HashMap<WidgetId, Rect>, EngineError> {
    let mut builder = Builder { tree, config, taffy: TaffyTree::new(), nodes: Vec::new() };

    let viewport = config.dp_f(config.viewport_width as f32);
    let host_widget = tree.widget(host)?;
    let mut roots = Vec::with_capacity(host_widget.children().len());
    for child in host_widget.children() {
        roots.push(builder.build(*child, false)?);
    }
    let root_style = Style {
        flex_direction: FlexDirection::Column,
        size: Size { width: length(viewport), height: auto() },
        ..Default::default()
    };
    let mut taffy = builder.taffy;
    let root = taffy
        .new_with_children(root_style, &roots)
        .map_err(|e| EngineError::Layout(e.to_string()))?;

    let available = Size { width: AvailableSpace::Definite(viewport), height: AvailableSpace::MaxContent };
    taffy
        .compute_layout_with_measure(root, available, |known, available, _node, ctx| {
            measure_leaf(known, available, ctx, fonts, config)
        })
        .map_err(|e| EngineError::Layout(e.to_string()))?;

    let ids: HashMap<NodeId, WidgetId> = builder.nodes.into_iter().map(|(w, n)| (n, w)).collect();
    let mut frames = HashMap::with_capacity(ids.len() + 1);
    let host_layout = taffy.layout(root).map_err(|e| EngineError::Layout(e.to_string()))?;
    frames.insert(host, Rect::new(0.0, 0.0, host_layout.size.width, host_layout.size.height));
    collect(&taffy, root, 0.0, 0.0, &ids, &mut frames)?;
    Ok(frames)
}

fn collect(
    taffy: &TaffyTree<MeasureContext>,
    node: NodeId,
    offset_x: f32,
    offset_y: f32,
    ids: &HashMap<NodeId, WidgetId>,
    frames: &mut HashMap<WidgetId, Rect>,
) -> Result<(), EngineError> {
    let children = taffy.children(node).map_err(|e| EngineError::Layout(e.to_string()))?;
    for child in children {
        let layout = taffy.layout(child).map_err(|e| EngineError::Layout(e.to_string()))?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;
        if let Some(id) = ids.get(&child) {
            frames.insert(*id, Rect::new(x, y, layout.size.width, layout.size.height));
        }
        collect(taffy, child, x, y, ids, frames)?;
    }
    Ok(())
}
