//! 原生控件树（arena）

use super::widget::{Widget, WidgetId, WidgetKind};
use crate::error::TreeError;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

/// 控件树，拥有全部控件
#[derive(Debug, Default)]
pub struct WidgetTree {
    widgets: HashMap<WidgetId, Widget>,
    next_id: u64,
}

impl WidgetTree {
    pub fn new() -> Self {
        Self { widgets: HashMap::new(), next_id: 1 }
    }

    /// 创建一个未挂载的控件
    pub fn create(&mut self, kind: WidgetKind) -> WidgetId {
        let id = WidgetId(self.next_id);
        self.next_id += 1;
        self.widgets.insert(id, Widget::new(id, kind));
        id
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.widgets.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn get(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.get(&id)
    }

    pub fn widget(&self, id: WidgetId) -> Result<&Widget, TreeError> {
        self.widgets.get(&id).ok_or(TreeError::UnknownWidget(id))
    }

    pub fn widget_mut(&mut self, id: WidgetId) -> Result<&mut Widget, TreeError> {
        self.widgets.get_mut(&id).ok_or(TreeError::UnknownWidget(id))
    }

    pub fn children(&self, id: WidgetId) -> Result<&[WidgetId], TreeError> {
        Ok(self.widget(id)?.children())
    }

    pub fn child_at(&self, parent: WidgetId, index: usize) -> Option<WidgetId> {
        self.get(parent)?.children.get(index).copied()
    }

    fn container_mut(&mut self, id: WidgetId) -> Result<&mut Widget, TreeError> {
        let widget = self.widget_mut(id)?;
        if !widget.kind.is_container() {
            return Err(TreeError::NotAContainer(id));
        }
        Ok(widget)
    }

    pub fn append_child(&mut self, parent: WidgetId, child: WidgetId) -> Result<(), TreeError> {
        let len = self.widget(parent)?.children.len();
        self.insert_child(parent, len, child)
    }

    pub fn insert_child(&mut self, parent: WidgetId, index: usize, child: WidgetId) -> Result<(), TreeError> {
        self.widget(child)?;
        let container = self.container_mut(parent)?;
        let len = container.children.len();
        if index > len {
            return Err(TreeError::ChildIndex { parent, index, len });
        }
        container.children.insert(index, child);
        container.touch();
        self.widget_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// 移除并销毁 index 处的子树
    pub fn remove_child_at(&mut self, parent: WidgetId, index: usize) -> Result<WidgetId, TreeError> {
        let container = self.container_mut(parent)?;
        let len = container.children.len();
        if index >= len {
            return Err(TreeError::ChildIndex { parent, index, len });
        }
        let removed = container.children.remove(index);
        container.touch();
        self.destroy(removed);
        Ok(removed)
    }

    /// 用 replacement 替换 index 处的子树
    pub fn replace_child_at(
        &mut self,
        parent: WidgetId,
        index: usize,
        replacement: WidgetId,
    ) -> Result<(), TreeError> {
        self.remove_child_at(parent, index)?;
        self.insert_child(parent, index, replacement)
    }

    /// 移除全部子树
    pub fn clear_children(&mut self, parent: WidgetId) -> Result<(), TreeError> {
        let container = self.container_mut(parent)?;
        if container.children.is_empty() {
            return Ok(());
        }
        let children = std::mem::take(&mut container.children);
        container.touch();
        for child in children {
            self.destroy(child);
        }
        Ok(())
    }

    /// 递归销毁子树，之后所有相关 id 失效
    pub fn destroy(&mut self, id: WidgetId) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(widget) = self.widgets.remove(&next) {
                stack.extend(widget.children);
            }
        }
    }

    /// 销毁所有从 root 不可达的控件，返回销毁数量
    pub fn retain_reachable(&mut self, root: WidgetId) -> usize {
        let mut reachable = HashSet::new();
        let mut stack = vec![root];
        while let Some(next) = stack.pop() {
            if let Some(widget) = self.widgets.get(&next) {
                if reachable.insert(next) {
                    stack.extend(widget.children.iter().copied());
                }
            }
        }
        let before = self.widgets.len();
        self.widgets.retain(|id, _| reachable.contains(id));
        before - self.widgets.len()
    }

    /// 子树内全部写入次数
    pub fn subtree_mutations(&self, root: WidgetId) -> u64 {
        let Some(widget) = self.get(root) else {
            return 0;
        };
        widget.mutations
            + widget
                .children
                .iter()
                .map(|c| self.subtree_mutations(*c))
                .sum::<u64>()
    }

    /// 调试输出
    pub fn dump(&self, root: WidgetId) -> String {
        let mut out = String::new();
        self.dump_into(root, 0, &mut out);
        out
    }

    fn dump_into(&self, id: WidgetId, depth: usize, out: &mut String) {
        let Some(widget) = self.get(id) else {
            return;
        };
        let state = &widget.state;
        let _ = write!(out, "{}{:?}#{}", "  ".repeat(depth), widget.kind, id.0);
        if !state.text.is_empty() {
            let _ = write!(out, " text={:?}", state.text);
        }
        if let Some(src) = &state.image.source {
            let _ = write!(out, " src={:?} loaded={}", src, state.image.bitmap.is_some());
        }
        if let Some(bg) = &state.background {
            let _ = write!(out, " bg={}", bg.color.to_hex_string());
        }
        if let Some(id) = state.listeners.click {
            let _ = write!(out, " click={}", id);
        }
        out.push('\n');
        for child in &widget.children {
            self.dump_into(*child, depth + 1, out);
        }
    }
}
