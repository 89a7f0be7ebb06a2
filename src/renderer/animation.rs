//! 入场动画 - 按签名幂等地应用

use super::style_resolver::{style_float, style_int, style_string};
use crate::config::EngineConfig;
use crate::native::{Transform, Widget};
use crate::parser::PropMap;

pub const DEFAULT_DURATION_MS: u64 = 280;
pub const DEFAULT_DISTANCE_DP: i32 = 18;
const ZOOM_FROM_SCALE: f32 = 0.92;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationKind {
    Fade,
    SlideUp,
    SlideDown,
    ZoomIn,
}

impl AnimationKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fade" | "fadein" => Some(AnimationKind::Fade),
            "slideup" => Some(AnimationKind::SlideUp),
            "slidedown" => Some(AnimationKind::SlideDown),
            "zoomin" => Some(AnimationKind::ZoomIn),
            _ => None,
        }
    }
}

/// 从样式中提取的动画参数
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationSpec {
    pub animation_type: String,
    pub duration_ms: u64,
    pub delay_ms: u64,
    /// 像素
    pub distance: f32,
    pub target_opacity: f32,
}

impl AnimationSpec {
    pub fn from_style(style: &PropMap, config: &EngineConfig) -> Self {
        let animation_type = style_string(style, "animation")
            .or_else(|| style_string(style, "animationType"))
            .unwrap_or_default()
            .trim()
            .to_string();
        Self {
            animation_type,
            duration_ms: style_int(style, "animationDuration", DEFAULT_DURATION_MS as i32).max(0) as u64,
            delay_ms: style_int(style, "animationDelay", 0).max(0) as u64,
            distance: config.dp(style_int(style, "animationDistance", DEFAULT_DISTANCE_DP)) as f32,
            target_opacity: style_float(style, "opacity", 1.0).clamp(0.0, 1.0),
        }
    }

    /// 动画相关样式的签名
    pub fn signature(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.animation_type, self.duration_ms, self.delay_ms, self.distance, self.target_opacity
        )
    }

    pub fn kind(&self) -> Option<AnimationKind> {
        AnimationKind::parse(&self.animation_type)
    }
}

/// 一次正在进行的过渡
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub kind: AnimationKind,
    pub from: Transform,
    pub to: Transform,
    pub duration_ms: u64,
    pub delay_ms: u64,
}

impl Animation {
    fn new(kind: AnimationKind, spec: &AnimationSpec) -> Self {
        let to = Transform { alpha: spec.target_opacity, translation_y: 0.0, scale: 1.0 };
        let from = match kind {
            AnimationKind::Fade => Transform { alpha: 0.0, ..to },
            AnimationKind::SlideUp => Transform { alpha: 0.0, translation_y: spec.distance, ..to },
            AnimationKind::SlideDown => Transform { alpha: 0.0, translation_y: -spec.distance, ..to },
            AnimationKind::ZoomIn => Transform { alpha: 0.0, scale: ZOOM_FROM_SCALE, ..to },
        };
        Self { kind, from, to, duration_ms: spec.duration_ms, delay_ms: spec.delay_ms }
    }

    /// 开始后 elapsed_ms 时刻的变换（先加速后减速）
    pub fn sample(&self, elapsed_ms: u64) -> Transform {
        if elapsed_ms <= self.delay_ms {
            return self.from;
        }
        let t = if self.duration_ms == 0 {
            1.0
        } else {
            ((elapsed_ms - self.delay_ms) as f32 / self.duration_ms as f32).min(1.0)
        };
        let eased = ((t + 1.0) * std::f32::consts::PI).cos() / 2.0 + 0.5;
        let lerp = |a: f32, b: f32| a + (b - a) * eased;
        Transform {
            alpha: lerp(self.from.alpha, self.to.alpha),
            translation_y: lerp(self.from.translation_y, self.to.translation_y),
            scale: lerp(self.from.scale, self.to.scale),
        }
    }

    pub fn is_finished(&self, elapsed_ms: u64) -> bool {
        elapsed_ms >= self.delay_ms + self.duration_ms
    }
}

/// 签名未变化时什么都不做；返回是否启动了新动画
pub fn apply_animation(widget: &mut Widget, spec: &AnimationSpec) -> bool {
    let signature = spec.signature();
    if widget.state().anim_signature.as_deref() == Some(signature.as_str()) {
        return false;
    }
    widget.set(|s| &mut s.anim_signature, Some(signature));

    let resting = Transform { alpha: spec.target_opacity, translation_y: 0.0, scale: 1.0 };
    widget.set(|s| &mut s.transform, resting);

    match spec.kind() {
        Some(kind) => {
            widget.set(|s| &mut s.animation, Some(Animation::new(kind, spec)));
            let started = widget.state().animations_started + 1;
            widget.set(|s| &mut s.animations_started, started);
            true
        }
        None => {
            widget.set(|s| &mut s.animation, None);
            false
        }
    }
}
