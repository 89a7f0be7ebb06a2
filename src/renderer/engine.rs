//! 协调引擎 - 比较新旧节点树，复用或重建原生控件
//!
//! 所有树变更都在持有引擎的线程上执行；图片的后台结果通过 [`Engine::pump`]
//! 回到该线程后才会写入控件。

use super::animation::{apply_animation, AnimationSpec};
use super::event_registry::{event_payload, DispatchOutcome, EventRegistry, RoutedEvent};
use super::fonts::FontRegistry;
use super::image_loader::{CompletedLoad, ImageLoader, LoadOutcome};
use super::style_resolver::{apply_base_style, apply_text_style, style_string, with_default_family};
use crate::config::{EngineConfig, UpdateStrategy};
use crate::error::{EngineError, TreeError};
use crate::geometry::Rect;
use crate::native::{InputType, Orientation, TextAttrs, WidgetId, WidgetKind, WidgetTree};
use crate::parser::{ElementKind, Node, PropMap};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tracing::{debug, info, warn};

const LINK_COLOR: &str = "#0B5DFF";
const LINK_FAMILY: &str = "myfont";
const ICON_FAMILY: &str = "Font Awesome 6 Free";

/// 引擎发给宿主的请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineRequest {
    OpenUrl(String),
}

/// 渲染统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub mounts: u64,
    pub reconciles: u64,
    /// 协调失败后整树重建的次数
    pub fallbacks: u64,
    pub rejected: u64,
}

#[derive(Debug)]
struct MountedTree {
    node: Node,
    root: WidgetId,
}

/// 节点对应的原生控件种类
pub fn widget_kind_for(node: &Node) -> WidgetKind {
    match node.kind {
        ElementKind::Container => {
            let scrolls = style_string(&node.style, "overflowX").is_some_and(|v| v == "scroll");
            if scrolls {
                WidgetKind::HorizontalScroll
            } else {
                WidgetKind::Layout
            }
        }
        ElementKind::Text | ElementKind::Link | ElementKind::Icon => WidgetKind::Label,
        ElementKind::Button => WidgetKind::Button,
        ElementKind::Input => WidgetKind::EditText,
        ElementKind::Image => WidgetKind::ImageView,
        ElementKind::Checkbox => WidgetKind::CheckBox,
        ElementKind::ActivityIndicator => WidgetKind::ProgressBar,
    }
}

fn normalize_url(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    }
}

/// 树协调与原生绑定引擎，每个宿主界面一个实例
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    tree: WidgetTree,
    host: WidgetId,
    mounted: Option<MountedTree>,
    events: EventRegistry,
    /// 当前挂载树对应的事件表代次
    mounted_generation: u64,
    render_pass: u64,
    images: ImageLoader,
    fonts: FontRegistry,
    outbox: Vec<RoutedEvent>,
    requests: Vec<EngineRequest>,
    stats: RenderStats,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let mut tree = WidgetTree::new();
        let host = tree.create(WidgetKind::ScrollHost);
        let images = ImageLoader::new(&config);
        let fonts = FontRegistry::new(config.font_dir.clone());
        Self {
            config,
            tree,
            host,
            mounted: None,
            events: EventRegistry::new(),
            mounted_generation: 0,
            render_pass: 0,
            images,
            fonts,
            outbox: Vec::new(),
            requests: Vec::new(),
            stats: RenderStats::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tree(&self) -> &WidgetTree {
        &self.tree
    }

    #[cfg(test)]
    pub(crate) fn tree_mut(&mut self) -> &mut WidgetTree {
        &mut self.tree
    }

    /// 挂载点
    pub fn host(&self) -> WidgetId {
        self.host
    }

    /// 当前挂载的根控件
    pub fn root(&self) -> Option<WidgetId> {
        self.mounted.as_ref().map(|m| m.root)
    }

    pub fn mounted_tree(&self) -> Option<&Node> {
        self.mounted.as_ref().map(|m| &m.node)
    }

    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventRegistry {
        &mut self.events
    }

    pub fn images(&self) -> &ImageLoader {
        &self.images
    }

    pub fn fonts(&self) -> &FontRegistry {
        &self.fonts
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn render_pass(&self) -> u64 {
        self.render_pass
    }

    /// 接收脚本层提交的序列化树；解析失败时保留当前界面
    pub fn submit(&mut self, json: &str) -> Result<WidgetId, EngineError> {
        match Node::parse(json) {
            Ok(node) => self.update(node),
            Err(err) => {
                warn!(%err, "rejected malformed tree, keeping previous UI");
                self.stats.rejected += 1;
                Err(err)
            }
        }
    }

    /// 用新树更新界面：协调失败时整树重建
    pub fn update(&mut self, node: Node) -> Result<WidgetId, EngineError> {
        self.render_pass += 1;
        self.mounted_generation = self.events.generation();

        let mounted = match (self.config.strategy, self.mounted.take()) {
            (UpdateStrategy::Reconcile, Some(mounted)) => mounted,
            _ => return self.mount_fresh(node),
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let root = self.reconcile(&mounted.node, mounted.root, &node)?;
            if root != mounted.root {
                self.splice_root(root)?;
            }
            Ok::<_, TreeError>(root)
        }));

        match outcome {
            Ok(Ok(root)) => {
                self.stats.reconciles += 1;
                self.mounted = Some(MountedTree { node, root });
                Ok(root)
            }
            Ok(Err(err)) => {
                warn!(%err, "reconciliation failed, remounting fresh tree");
                self.remount(node)
            }
            Err(_) => {
                warn!("reconciliation panicked, remounting fresh tree");
                self.remount(node)
            }
        }
    }

    /// 回退路径：中途新建但未挂上的控件也一并销毁
    fn remount(&mut self, node: Node) -> Result<WidgetId, EngineError> {
        self.stats.fallbacks += 1;
        self.tree.clear_children(self.host)?;
        let swept = self.tree.retain_reachable(self.host);
        if swept > 0 {
            debug!(swept, "destroyed detached widgets left by failed reconciliation");
        }
        self.mount_fresh(node)
    }

    /// 丢弃旧树，从零构建
    pub fn mount_fresh(&mut self, node: Node) -> Result<WidgetId, EngineError> {
        self.tree.clear_children(self.host)?;
        let root = self.render_node(&node)?;
        self.tree.append_child(self.host, root)?;
        debug!(nodes = node.count(), widgets = self.tree.len(), "mounted fresh tree");
        self.stats.mounts += 1;
        self.mounted = Some(MountedTree { node, root });
        Ok(root)
    }

    fn splice_root(&mut self, root: WidgetId) -> Result<(), TreeError> {
        if self.tree.children(self.host)?.is_empty() {
            self.tree.append_child(self.host, root)
        } else {
            self.tree.replace_child_at(self.host, 0, root)
        }
    }

    /// 返回该位置更新后应占据的控件：原控件（已重新绑定）或新建控件。
    /// 返回值与 current 不同时由调用方替换到父容器的同一位置。
    pub fn reconcile(&mut self, old: &Node, current: WidgetId, new: &Node) -> Result<WidgetId, TreeError> {
        let existing = self.tree.widget(current)?.kind();
        if old.kind != new.kind || widget_kind_for(new) != existing {
            return self.render_node(new);
        }

        let props_changed = old.serialized_props() != new.serialized_props();

        // 输入框的文本监听器只能追加，属性变化时重建以免重复监听
        if new.kind.is_editable() && props_changed {
            return self.render_node(new);
        }

        if !props_changed && old.is_leaf() && new.is_leaf() {
            return Ok(current);
        }

        self.bind(current, new)?;

        if existing.is_container() {
            let content = self.content_of(current)?;
            let old_len = old.children.len();
            let new_len = new.children.len();

            for i in 0..old_len.min(new_len) {
                let Some(child) = self.tree.child_at(content, i) else {
                    return self.render_node(new);
                };
                let updated = self.reconcile(&old.children[i], child, &new.children[i])?;
                if updated != child {
                    self.tree.replace_child_at(content, i, updated)?;
                }
            }

            if new_len > old_len {
                for child in &new.children[old_len..] {
                    let widget = self.render_node(child)?;
                    self.tree.append_child(content, widget)?;
                }
            } else {
                for i in (new_len..old_len).rev() {
                    self.tree.remove_child_at(content, i)?;
                }
            }
        }

        Ok(current)
    }

    /// 子节点实际所在的容器；横向滚动容器的子节点在内部的行容器里
    fn content_of(&self, id: WidgetId) -> Result<WidgetId, TreeError> {
        let widget = self.tree.widget(id)?;
        if widget.kind() != WidgetKind::HorizontalScroll {
            return Ok(id);
        }
        widget
            .children()
            .first()
            .copied()
            .ok_or(TreeError::ChildIndex { parent: id, index: 0, len: 0 })
    }

    /// 新建节点对应的控件子树（未挂载）
    pub fn render_node(&mut self, node: &Node) -> Result<WidgetId, TreeError> {
        let kind = widget_kind_for(node);
        let id = self.tree.create(kind);

        let content = if kind == WidgetKind::HorizontalScroll {
            let row = self.tree.create(WidgetKind::Layout);
            self.tree.widget_mut(row)?.set(|s| &mut s.orientation, Orientation::Horizontal);
            self.tree.append_child(id, row)?;
            row
        } else {
            id
        };
        if kind == WidgetKind::ProgressBar {
            self.tree.widget_mut(id)?.set(|s| &mut s.indeterminate, true);
        }

        self.bind(id, node)?;

        if kind.is_container() {
            for child in &node.children {
                let widget = self.render_node(child)?;
                self.tree.append_child(content, widget)?;
            }
        }
        Ok(id)
    }

    /// 把节点属性写到控件上；所有写入先比较
    fn bind(&mut self, id: WidgetId, node: &Node) -> Result<(), TreeError> {
        let widget = self.tree.widget_mut(id)?;
        let fonts = &self.fonts;
        let text_defaults = |size_sp: f32| TextAttrs { size_sp, ..TextAttrs::default() };

        // 复选框不论写成 input 还是 checkbox，事件里都报 checkbox
        let event_tag = match node.kind {
            ElementKind::Checkbox => node.kind.name().to_string(),
            _ => node.tag.clone(),
        };
        widget.set(|s| &mut s.event_tag, event_tag);

        match node.kind {
            ElementKind::Checkbox => {
                let label = node.prop_string("label", "");
                widget.set(|s| &mut s.text, node.prop_string("textContent", &label));
                let checked = if node.has_prop("checked") {
                    node.prop_bool("checked").unwrap_or(false)
                } else {
                    node.prop_string("value", "false").eq_ignore_ascii_case("true")
                };
                widget.set(|s| &mut s.checked, checked);
                apply_text_style(widget, &node.style, fonts, TextAttrs::default());
                widget.set(|s| &mut s.listeners.checked_change, node.event_id("change"));
                widget.set(|s| &mut s.listeners.click, node.event_id("click"));
            }
            ElementKind::Icon => {
                widget.set(|s| &mut s.text, node.prop_string("textContent", ""));
                let style = with_default_family(&node.style, ICON_FAMILY);
                apply_text_style(widget, &style, fonts, text_defaults(20.0));
                widget.set(|s| &mut s.listeners.click, node.event_id("click"));
            }
            ElementKind::Button => {
                widget.set(|s| &mut s.text, node.prop_string("textContent", ""));
                apply_text_style(widget, &node.style, fonts, TextAttrs::default());
                widget.set(|s| &mut s.listeners.click, node.event_id("click"));
            }
            ElementKind::Text => {
                widget.set(|s| &mut s.text, node.prop_string("textContent", ""));
                apply_text_style(widget, &node.style, fonts, text_defaults(18.0));
                widget.set(|s| &mut s.listeners.click, node.event_id("click"));
            }
            ElementKind::Link => {
                let href = node.prop_string("href", "");
                let label = node.prop_string("label", &href);
                widget.set(|s| &mut s.text, node.prop_string("textContent", &label));
                let mut style: PropMap = with_default_family(&node.style, LINK_FAMILY);
                style
                    .entry("color")
                    .or_insert_with(|| Value::String(LINK_COLOR.to_string()));
                apply_text_style(widget, &style, fonts, text_defaults(16.0));
                let href = Some(href.trim().to_string()).filter(|h| !h.is_empty());
                widget.set(|s| &mut s.href, href);
                widget.set(|s| &mut s.listeners.click, node.event_id("click"));
            }
            ElementKind::Input => {
                widget.set(|s| &mut s.input_type, InputType::parse(&node.prop_string("type", "text")));
                widget.set(|s| &mut s.hint, node.prop_string("placeholder", ""));
                widget.set(|s| &mut s.text, node.prop_string("value", ""));
                apply_text_style(widget, &node.style, fonts, TextAttrs::default());
                if let Some(change) = node.event_id("change") {
                    widget.add_text_watcher(change);
                }
                widget.set(|s| &mut s.listeners.click, node.event_id("click"));
            }
            ElementKind::Image => {
                let src = node.prop_string("src", "");
                if widget.state().image.source.as_deref() != Some(src.as_str()) {
                    let generation = widget.state().image.generation + 1;
                    widget.set(|s| &mut s.image.generation, generation);
                    widget.set(|s| &mut s.image.source, Some(src.clone()));
                    if let LoadOutcome::Ready(bitmap) = self.images.load(id, generation, &src) {
                        widget.set(|s| &mut s.image.bitmap, Some(bitmap));
                    }
                }
                widget.set(|s| &mut s.listeners.click, node.event_id("click"));
            }
            ElementKind::ActivityIndicator => {
                widget.set(|s| &mut s.listeners.click, node.event_id("click"));
            }
            ElementKind::Container => {
                let row = style_string(&node.style, "flexDirection").is_some_and(|d| d == "row");
                let orientation = if row { Orientation::Horizontal } else { Orientation::Vertical };
                if widget.kind() == WidgetKind::Layout {
                    widget.set(|s| &mut s.orientation, orientation);
                }
                widget.set(|s| &mut s.listeners.click, node.event_id("click"));
            }
        }

        apply_base_style(widget, &node.style, &self.config);
        apply_animation(widget, &AnimationSpec::from_style(&node.style, &self.config));
        Ok(())
    }

    /// 把后台完成的图片写回控件，返回实际应用的数量
    pub fn pump(&mut self) -> usize {
        let done = self.images.completed();
        done.into_iter().filter(|load| self.apply_image(load)).count()
    }

    /// 阻塞等待至多一个图片结果
    pub fn pump_wait(&mut self, timeout: Duration) -> usize {
        let mut applied = 0;
        if let Some(load) = self.images.wait_completed(timeout) {
            applied += usize::from(self.apply_image(&load));
        }
        applied + self.pump()
    }

    /// 目标控件仍存在、槽位代次与地址都未变化时才写入
    fn apply_image(&mut self, load: &CompletedLoad) -> bool {
        let Ok(widget) = self.tree.widget_mut(load.widget) else {
            debug!(source = %load.source, "image target no longer mounted");
            return false;
        };
        let slot = &widget.state().image;
        if slot.generation != load.generation || slot.source.as_deref().map(str::trim) != Some(load.source.as_str()) {
            debug!(source = %load.source, "dropping stale image result");
            return false;
        }
        widget.set(|s| &mut s.image.bitmap, Some(load.bitmap.clone()))
    }

    fn emit(&mut self, id: WidgetId, event_type: &str, event_id: u32, extra: impl FnOnce(&mut serde_json::Map<String, Value>)) -> Result<(), TreeError> {
        let tag = self.tree.widget(id)?.state().event_tag.clone();
        let payload = event_payload(event_type, &tag, &self.config.platform, extra);
        self.outbox.push(RoutedEvent { id: event_id, payload, pass: self.render_pass });
        Ok(())
    }

    /// 模拟点击；返回是否产生了事件或请求
    pub fn click(&mut self, id: WidgetId) -> Result<bool, EngineError> {
        let state = self.tree.widget(id)?.state();
        let click = state.listeners.click;
        let href = state.href.clone().filter(|_| state.event_tag == "a" || state.event_tag == "link");
        if click.is_none() && href.is_none() {
            return Ok(false);
        }
        if let Some(href) = &href {
            self.requests.push(EngineRequest::OpenUrl(normalize_url(href)));
        }
        if let Some(event_id) = click {
            self.emit(id, "click", event_id, |p| {
                if let Some(href) = href {
                    p.insert("href".into(), Value::String(href));
                }
            })?;
        }
        Ok(true)
    }

    /// 用户输入文本：写入控件并通知每个文本监听器
    pub fn input_text(&mut self, id: WidgetId, value: &str) -> Result<usize, EngineError> {
        let widget = self.tree.widget_mut(id)?;
        if widget.kind() != WidgetKind::EditText {
            return Ok(0);
        }
        widget.set(|s| &mut s.text, value.to_string());
        let watchers = widget.state().listeners.text_watchers.clone();
        for event_id in &watchers {
            self.emit(id, "change", *event_id, |p| {
                p.insert("value".into(), Value::String(value.to_string()));
            })?;
        }
        Ok(watchers.len())
    }

    /// 用户切换复选框
    pub fn set_checked(&mut self, id: WidgetId, checked: bool) -> Result<bool, EngineError> {
        let widget = self.tree.widget_mut(id)?;
        if widget.kind() != WidgetKind::CheckBox || !widget.set(|s| &mut s.checked, checked) {
            return Ok(false);
        }
        let Some(event_id) = widget.state().listeners.checked_change else {
            return Ok(false);
        };
        self.emit(id, "change", event_id, |p| {
            p.insert("checked".into(), Value::Bool(checked));
            p.insert("value".into(), Value::Bool(checked));
        })?;
        Ok(true)
    }

    pub fn drain_events(&mut self) -> Vec<RoutedEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn drain_requests(&mut self) -> Vec<EngineRequest> {
        std::mem::take(&mut self.requests)
    }

    /// 事件是否仍属于当前挂载树及其事件表
    pub fn is_current(&self, event: &RoutedEvent) -> bool {
        event.pass == self.render_pass
    }

    /// 用本地事件表分发所有待处理事件
    pub fn dispatch_pending(&mut self) -> Vec<DispatchOutcome> {
        let pending = self.drain_events();
        pending
            .iter()
            .map(|event| {
                if !self.is_current(event) {
                    debug!(event_id = event.id, "dropping event from a replaced tree");
                    return DispatchOutcome::Stale;
                }
                self.events.dispatch_checked(event, self.mounted_generation)
            })
            .collect()
    }

    /// 计算当前控件树的布局
    pub fn layout(&self) -> Result<HashMap<WidgetId, Rect>, EngineError> {
        let frames = crate::layout::compute_frames(&self.tree, self.host, &self.fonts, &self.config)?;
        Ok(frames)
    }

    pub fn dump(&self) -> String {
        self.tree.dump(self.host)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.images.in_flight() > 0 {
            info!(in_flight = self.images.in_flight(), "engine torn down with image loads in flight");
        }
    }
}
