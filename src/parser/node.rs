//! 节点模型 - 脚本层提交的 UI 树

use crate::error::EngineError;
use serde_json::{Map, Value};

/// 有序属性表
pub type PropMap = Map<String, Value>;

/// 元素种类（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Container,
    Text,
    Button,
    Link,
    Input,
    Image,
    Checkbox,
    Icon,
    ActivityIndicator,
}

impl ElementKind {
    /// 根据标签名解析；未知标签按容器处理
    pub fn from_tag(tag: &str, props: &PropMap) -> Self {
        match tag {
            "text" => ElementKind::Text,
            "button" => ElementKind::Button,
            "a" | "link" => ElementKind::Link,
            "input" => {
                let is_checkbox = props
                    .get("type")
                    .and_then(Value::as_str)
                    .is_some_and(|t| t.eq_ignore_ascii_case("checkbox"));
                if is_checkbox {
                    ElementKind::Checkbox
                } else {
                    ElementKind::Input
                }
            }
            "image" | "img" => ElementKind::Image,
            "checkbox" => ElementKind::Checkbox,
            "icon" => ElementKind::Icon,
            "activityIndicator" | "activity-indicator" => ElementKind::ActivityIndicator,
            _ => ElementKind::Container,
        }
    }

    pub fn is_editable(self) -> bool {
        matches!(self, ElementKind::Input)
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Container => "container",
            ElementKind::Text => "text",
            ElementKind::Button => "button",
            ElementKind::Link => "link",
            ElementKind::Input => "input",
            ElementKind::Image => "image",
            ElementKind::Checkbox => "checkbox",
            ElementKind::Icon => "icon",
            ElementKind::ActivityIndicator => "activity-indicator",
        }
    }
}

/// UI 节点
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub tag: String,
    pub kind: ElementKind,
    pub props: PropMap,
    pub style: PropMap,
    pub children: Vec<Node>,
    /// props 的序列化文本，用于逐字节比较
    props_json: String,
}

impl Node {
    /// 解析一次渲染提交的 JSON
    pub fn parse(json: &str) -> Result<Node, EngineError> {
        let raw: Value = serde_json::from_str(json)?;
        Node::from_value(&raw).ok_or(EngineError::NotAnObject)
    }

    /// 非对象返回 None；子节点中的非对象条目被跳过
    pub fn from_value(raw: &Value) -> Option<Node> {
        let obj = raw.as_object()?;

        let tag = match obj.get("tag").and_then(Value::as_str) {
            Some(t) if !t.trim().is_empty() => t.trim().to_string(),
            _ => "div".to_string(),
        };
        let props = obj
            .get("props")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let style = props
            .get("style")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let children = obj
            .get("children")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Node::from_value).collect())
            .unwrap_or_default();

        let kind = ElementKind::from_tag(&tag, &props);
        let props_json = Value::Object(props.clone()).to_string();

        Some(Node { tag, kind, props, style, children, props_json })
    }

    pub fn serialized_props(&self) -> &str {
        &self.props_json
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// 读取字符串属性：数字和布尔值转成文本，null 与缺失取默认值
    pub fn prop_string(&self, key: &str, fallback: &str) -> String {
        value_as_string(self.props.get(key)).unwrap_or_else(|| fallback.to_string())
    }

    pub fn has_prop(&self, key: &str) -> bool {
        self.props.contains_key(key)
    }

    pub fn prop_bool(&self, key: &str) -> Option<bool> {
        match self.props.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => Some(s.eq_ignore_ascii_case("true")),
            Value::Number(n) => Some(n.as_f64().is_some_and(|v| v != 0.0)),
            _ => None,
        }
    }

    /// 事件 id，非正数视为未绑定
    pub fn event_id(&self, name: &str) -> Option<u32> {
        let id = self.props.get("events")?.as_object()?.get(name)?.as_i64()?;
        u32::try_from(id).ok().filter(|id| *id > 0)
    }

    /// 子树节点总数
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Node::count).sum::<usize>()
    }
}

/// JSON 值转文本：null 视为缺失，数字与布尔值转为字面文本
pub fn value_as_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
