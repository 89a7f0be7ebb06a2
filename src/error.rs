//! 错误类型

use crate::native::WidgetId;
use thiserror::Error;

/// 引擎对外错误
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed tree payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("tree payload must be a JSON object")]
    NotAnObject,

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("script error: {0}")]
    Script(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("layout error: {0}")]
    Layout(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 控件树操作错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("unknown widget {0:?}")]
    UnknownWidget(WidgetId),

    #[error("widget {0:?} cannot hold children")]
    NotAContainer(WidgetId),

    #[error("child index {index} out of range for {parent:?} ({len} children)")]
    ChildIndex {
        parent: WidgetId,
        index: usize,
        len: usize,
    },
}

/// 图片加载错误，只在加载器内部记录日志
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("network: {0}")]
    Network(String),

    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("decode: {0}")]
    Decode(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
