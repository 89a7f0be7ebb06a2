//! 样式解析器 - 将样式字典解析为盒模型、绘制与文字属性

use super::fonts::FontRegistry;
use crate::config::EngineConfig;
use crate::geometry::Insets;
use crate::native::{Background, Gravity, LayoutParams, SizeSpec, Stroke, TextAlign, TextAttrs, Widget};
use crate::parser::{value_as_string, PropMap};
use crate::Color;
use serde_json::Value;

/// 外边距解析结果（dp）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedMargins {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
    pub auto_horizontal: bool,
    pub auto_vertical: bool,
}

impl ResolvedMargins {
    pub fn insets(&self) -> Insets {
        Insets::new(self.top, self.right, self.bottom, self.left)
    }

    pub fn gravity(&self) -> Option<Gravity> {
        match (self.auto_horizontal, self.auto_vertical) {
            (true, true) => Some(Gravity::Center),
            (true, false) => Some(Gravity::CenterHorizontal),
            (false, true) => Some(Gravity::CenterVertical),
            (false, false) => None,
        }
    }
}

pub fn style_string(style: &PropMap, key: &str) -> Option<String> {
    value_as_string(style.get(key))
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace("px", "").trim().parse::<f64>().ok()
}

/// 整数样式值；缺失或无法解析时取 fallback
pub fn style_int(style: &PropMap, key: &str, fallback: i32) -> i32 {
    style_string(style, key)
        .and_then(|raw| parse_number(&raw))
        .map_or(fallback, |v| v as i32)
}

pub fn style_float(style: &PropMap, key: &str, fallback: f32) -> f32 {
    style_string(style, key)
        .and_then(|raw| parse_number(&raw))
        .map_or(fallback, |v| v as f32)
}

/// CSS 盒模型简写展开为 [top, right, bottom, left]
pub fn parse_box_shorthand(value: &str) -> Vec<String> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    let picked = match tokens.as_slice() {
        [] => return Vec::new(),
        [all] => [*all, *all, *all, *all],
        [v, h] => [*v, *h, *v, *h],
        [t, h, b] => [*t, *h, *b, *h],
        [t, r, b, l, ..] => [*t, *r, *b, *l],
    };
    picked.iter().map(|s| s.to_string()).collect()
}

/// `auto` 与无法解析的值返回 None
pub fn parse_px_value(value: Option<&str>) -> Option<i32> {
    let value = value?.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("auto") {
        return None;
    }
    parse_number(value).map(|v| v as i32)
}

fn is_auto(raw: Option<&Value>) -> bool {
    value_as_string(raw).is_some_and(|s| s.trim().eq_ignore_ascii_case("auto"))
}

pub fn resolve_margins(style: &PropMap) -> ResolvedMargins {
    let raw = style_string(style, "margin").unwrap_or_default();
    let tokens = parse_box_shorthand(raw.trim());
    let token = |i: usize| tokens.get(i).map(String::as_str);
    let token_is_auto = |i: usize| token(i).is_some_and(|t| t.eq_ignore_ascii_case("auto"));

    let mut sides = [0; 4];
    let mut autos = [false; 4];
    for i in 0..4 {
        sides[i] = parse_px_value(token(i)).unwrap_or(0);
        autos[i] = token_is_auto(i);
    }

    for (i, key) in ["marginTop", "marginRight", "marginBottom", "marginLeft"].iter().enumerate() {
        if !style.contains_key(*key) {
            continue;
        }
        autos[i] = is_auto(style.get(*key));
        sides[i] = if autos[i] { 0 } else { style_int(style, key, sides[i]) };
    }

    ResolvedMargins {
        top: sides[0],
        right: sides[1],
        bottom: sides[2],
        left: sides[3],
        auto_horizontal: autos[3] && autos[1],
        auto_vertical: autos[0] && autos[2],
    }
}

/// 内边距（dp）：简写 -> paddingHorizontal/Vertical -> 单边
pub fn resolve_padding(style: &PropMap) -> Insets {
    let raw = style_string(style, "padding").unwrap_or_default();
    let tokens = parse_box_shorthand(raw.trim());
    let side = |i: usize| parse_px_value(tokens.get(i).map(String::as_str)).unwrap_or(0);

    let mut top = side(0);
    let mut right = side(1);
    let mut bottom = side(2);
    let mut left = side(3);

    if style.contains_key("paddingHorizontal") {
        left = style_int(style, "paddingHorizontal", left);
        right = style_int(style, "paddingHorizontal", right);
    }
    if style.contains_key("paddingVertical") {
        top = style_int(style, "paddingVertical", top);
        bottom = style_int(style, "paddingVertical", bottom);
    }

    Insets::new(
        style_int(style, "paddingTop", top),
        style_int(style, "paddingRight", right),
        style_int(style, "paddingBottom", bottom),
        style_int(style, "paddingLeft", left),
    )
}

/// width/height 关键字解析
pub fn size_from_style(style: &PropMap, key: &str, fallback: SizeSpec, config: &EngineConfig) -> SizeSpec {
    let Some(raw) = style_string(style, key) else {
        return fallback;
    };
    let value = raw.trim();
    match value {
        "match" | "100%" => return SizeSpec::Match,
        "wrap" | "auto" => return SizeSpec::Wrap,
        _ => {}
    }
    if let Some(pct) = value.strip_suffix('%').and_then(|p| p.trim().parse::<f32>().ok()) {
        return SizeSpec::Percent(pct);
    }
    let base = if fallback == SizeSpec::Match { 0 } else { 44 };
    SizeSpec::Exact(config.dp(style_int(style, key, base)))
}

pub fn parse_border_width(border: &str) -> i32 {
    border
        .split_whitespace()
        .find_map(|token| parse_px_value(Some(token)))
        .unwrap_or(0)
}

/// 取最后一个像颜色的 token；没有时为黑色
pub fn parse_border_color(border: &str) -> Color {
    if border.trim().is_empty() {
        return Color::TRANSPARENT;
    }
    border
        .split_whitespace()
        .rev()
        .find_map(Color::parse)
        .unwrap_or(Color::BLACK)
}

/// 背景：纯色、圆角、描边；显式 borderWidth/borderColor 优先于 border 简写
pub fn resolve_background(style: &PropMap, config: &EngineConfig) -> Option<Background> {
    let border = style_string(style, "border").unwrap_or_default();
    let border = border.trim();

    let has_radius = style.contains_key("borderRadius");
    let has_background = style.contains_key("backgroundColor");
    let has_border = style.contains_key("borderWidth") || style.contains_key("borderColor") || !border.is_empty();
    if !has_radius && !has_background && !has_border {
        return None;
    }

    let color = Color::parse_or_transparent(&style_string(style, "backgroundColor").unwrap_or_default());
    let corner_radius = has_radius.then(|| config.dp_f(style_float(style, "borderRadius", 0.0)));
    let stroke = has_border.then(|| {
        let width = if style.contains_key("borderWidth") {
            style_int(style, "borderWidth", 0)
        } else {
            parse_border_width(border)
        };
        let color = if style.contains_key("borderColor") {
            Color::parse_or_transparent(&style_string(style, "borderColor").unwrap_or_default())
        } else if !border.is_empty() {
            parse_border_color(border)
        } else {
            Color::BLACK
        };
        Stroke { width: config.dp(width), color }
    });

    Some(Background { color, corner_radius, stroke })
}

/// 圆角同时裁剪控件边界
pub fn resolve_clip(style: &PropMap, config: &EngineConfig) -> Option<f32> {
    style
        .contains_key("borderRadius")
        .then(|| config.dp_f(style_float(style, "borderRadius", 0.0)))
}

pub fn resolve_layout_params(style: &PropMap, config: &EngineConfig) -> LayoutParams {
    let margins = resolve_margins(style);
    LayoutParams {
        width: size_from_style(style, "width", SizeSpec::Match, config),
        height: size_from_style(style, "height", SizeSpec::Wrap, config),
        margins: margins.insets().map(|v| config.dp(v)),
        gravity: margins.gravity(),
    }
}

/// 数字 100-900，或 normal/regular/bold
pub fn parse_font_weight(raw: Option<&Value>) -> Option<u16> {
    match raw? {
        Value::Number(n) => n.as_f64().map(|v| (v as i64).clamp(100, 900) as u16),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "normal" | "regular" => Some(400),
            "bold" => Some(700),
            other => other.parse::<i64>().ok().map(|v| v.clamp(100, 900) as u16),
        },
        _ => None,
    }
}

pub fn parse_text_align(raw: Option<&str>) -> TextAlign {
    match raw.map(str::trim) {
        Some("center") => TextAlign::Center,
        Some("right") => TextAlign::Right,
        _ => TextAlign::Left,
    }
}

/// 文字属性；base 为标签默认值
pub fn resolve_text_attrs(style: &PropMap, fonts: &FontRegistry, base: TextAttrs) -> TextAttrs {
    let family = style_string(style, "fontFamily");
    TextAttrs {
        size_sp: if style.contains_key("fontSize") {
            style_int(style, "fontSize", 16) as f32
        } else {
            base.size_sp
        },
        color: match style_string(style, "color") {
            Some(raw) => Some(Color::parse_or_transparent(&raw)),
            None => base.color,
        },
        align: parse_text_align(style_string(style, "textAlign").as_deref()),
        weight: parse_font_weight(style.get("fontWeight")),
        face: fonts.resolve(family.as_deref()),
    }
}

/// 盒模型与绘制属性写入控件
pub fn apply_base_style(widget: &mut Widget, style: &PropMap, config: &EngineConfig) {
    widget.set(|s| &mut s.background, resolve_background(style, config));
    widget.set(|s| &mut s.layout, resolve_layout_params(style, config));
    widget.set(|s| &mut s.clip_radius, resolve_clip(style, config));
    widget.set(|s| &mut s.padding, resolve_padding(style).map(|v| config.dp(v)));
}

pub fn apply_text_style(widget: &mut Widget, style: &PropMap, fonts: &FontRegistry, base: TextAttrs) {
    widget.set(|s| &mut s.text_attrs, resolve_text_attrs(style, fonts, base));
}

/// 复制样式并补上缺省字体族
pub fn with_default_family(style: &PropMap, family: &str) -> PropMap {
    let mut merged = style.clone();
    if !merged.contains_key("fontFamily") {
        merged.insert("fontFamily".to_string(), Value::String(family.to_string()));
    }
    merged
}
