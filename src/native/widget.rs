//! 原生控件定义

use crate::geometry::Insets;
use crate::renderer::{Animation, Bitmap};
use crate::Color;
use std::sync::Arc;

/// 控件 ID，单调递增且从不复用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub u64);

/// 原生控件种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    /// 引擎挂载点（纵向滚动容器）
    ScrollHost,
    Layout,
    HorizontalScroll,
    Label,
    Button,
    EditText,
    ImageView,
    ProgressBar,
    CheckBox,
}

impl WidgetKind {
    pub fn is_container(self) -> bool {
        matches!(
            self,
            WidgetKind::ScrollHost | WidgetKind::Layout | WidgetKind::HorizontalScroll
        )
    }
}

/// 尺寸规格
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeSpec {
    Match,
    Wrap,
    /// 像素
    Exact(i32),
    Percent(f32),
}

/// 在父容器中的对齐
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    CenterHorizontal,
    CenterVertical,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub width: SizeSpec,
    pub height: SizeSpec,
    pub margins: Insets,
    pub gravity: Option<Gravity>,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            width: SizeSpec::Match,
            height: SizeSpec::Wrap,
            margins: Insets::ZERO,
            gravity: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub width: i32,
    pub color: Color,
}

/// 背景绘制（纯色 + 圆角 + 描边）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Background {
    pub color: Color,
    pub corner_radius: Option<f32>,
    pub stroke: Option<Stroke>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// 已解析的字体
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FontFace {
    /// 字体资源名
    Named(String),
    /// 进程默认字体
    #[default]
    SystemDefault,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextAttrs {
    pub size_sp: f32,
    pub color: Option<Color>,
    pub align: TextAlign,
    pub weight: Option<u16>,
    pub face: FontFace,
}

impl Default for TextAttrs {
    fn default() -> Self {
        Self {
            size_sp: 14.0,
            color: None,
            align: TextAlign::Left,
            weight: None,
            face: FontFace::SystemDefault,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputType {
    #[default]
    Text,
    Password,
    Email,
    Number,
    Phone,
    Url,
    Multiline,
    Date,
}

impl InputType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "password" => InputType::Password,
            "email" => InputType::Email,
            "number" => InputType::Number,
            "phone" | "tel" => InputType::Phone,
            "url" => InputType::Url,
            "multiline" | "textarea" => InputType::Multiline,
            "date" => InputType::Date,
            _ => InputType::Text,
        }
    }
}

/// 图片槽：挂起的加载由槽位持有，generation 变化即作废
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageSlot {
    pub source: Option<String>,
    pub generation: u64,
    pub bitmap: Option<Arc<Bitmap>>,
}

/// 变换属性（动画写入）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub alpha: f32,
    pub translation_y: f32,
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self { alpha: 1.0, translation_y: 0.0, scale: 1.0 }
    }
}

/// 交互监听器，值为事件 id
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Listeners {
    pub click: Option<u32>,
    pub checked_change: Option<u32>,
    /// 文本监听器只能追加，重复绑定会累积
    pub text_watchers: Vec<u32>,
}

/// 控件的可观察状态
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WidgetState {
    pub text: String,
    pub hint: String,
    pub checked: bool,
    pub input_type: InputType,
    pub orientation: Orientation,
    pub layout: LayoutParams,
    pub padding: Insets,
    pub background: Option<Background>,
    /// 圆角裁剪半径（px）
    pub clip_radius: Option<f32>,
    pub text_attrs: TextAttrs,
    pub transform: Transform,
    pub animation: Option<Animation>,
    pub anim_signature: Option<String>,
    pub animations_started: u32,
    pub image: ImageSlot,
    pub listeners: Listeners,
    pub href: Option<String>,
    pub indeterminate: bool,
    /// 产生事件时带上的标签名；复选框统一为 checkbox
    pub event_tag: String,
}

/// 原生控件
#[derive(Debug, Clone)]
pub struct Widget {
    pub(crate) id: WidgetId,
    pub(crate) kind: WidgetKind,
    pub(crate) parent: Option<WidgetId>,
    pub(crate) children: Vec<WidgetId>,
    pub(crate) state: WidgetState,
    pub(crate) mutations: u64,
}

impl Widget {
    pub(crate) fn new(id: WidgetId, kind: WidgetKind) -> Self {
        Self {
            id,
            kind,
            parent: None,
            children: Vec::new(),
            state: WidgetState::default(),
            mutations: 0,
        }
    }

    pub fn id(&self) -> WidgetId {
        self.id
    }

    pub fn kind(&self) -> WidgetKind {
        self.kind
    }

    pub fn parent(&self) -> Option<WidgetId> {
        self.parent
    }

    pub fn children(&self) -> &[WidgetId] {
        &self.children
    }

    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    /// 实际发生的写入次数
    pub fn mutations(&self) -> u64 {
        self.mutations
    }

    /// 比较后写入，值未变化时不计数
    pub fn set<T: PartialEq>(&mut self, field: impl FnOnce(&mut WidgetState) -> &mut T, value: T) -> bool {
        let slot = field(&mut self.state);
        if *slot == value {
            return false;
        }
        *slot = value;
        self.mutations += 1;
        true
    }

    pub fn add_text_watcher(&mut self, event_id: u32) {
        self.state.listeners.text_watchers.push(event_id);
        self.mutations += 1;
    }

    pub(crate) fn touch(&mut self) {
        self.mutations += 1;
    }
}
