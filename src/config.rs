//! 引擎配置

use crate::error::EngineError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// 更新策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStrategy {
    /// 逐节点协调
    #[default]
    Reconcile,
    /// 每次提交都整树重建
    Remount,
}

/// engine.json 配置结构
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// dp -> px 的缩放系数
    pub density: f32,
    /// 事件 payload 中的 platform 字段
    pub platform: String,
    pub strategy: UpdateStrategy,
    pub image_max_width: u32,
    pub image_max_height: u32,
    /// 显式缓存上限（字节），缺省时按 heap_hint_bytes / 8 计算
    pub image_cache_bytes: Option<usize>,
    pub heap_hint_bytes: usize,
    pub asset_root: PathBuf,
    pub font_dir: Option<PathBuf>,
    pub fetch_timeout_secs: u64,
    pub max_download_bytes: u64,
    /// 布局计算的视口宽度（dp）
    pub viewport_width: f32,
}

const MIN_CACHE_BYTES: usize = 1024 * 1024;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            density: 1.0,
            platform: std::env::consts::OS.to_string(),
            strategy: UpdateStrategy::Reconcile,
            image_max_width: 1080,
            image_max_height: 720,
            image_cache_bytes: None,
            heap_hint_bytes: 256 * 1024 * 1024,
            asset_root: PathBuf::from("assets"),
            font_dir: None,
            fetch_timeout_secs: 10,
            max_download_bytes: 10 * 1024 * 1024,
            viewport_width: 375.0,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// 图片缓存预算：显式值优先，否则取堆提示的 1/8，且不低于 1 MiB
    pub fn cache_budget(&self) -> usize {
        match self.image_cache_bytes {
            Some(bytes) => bytes,
            None => (self.heap_hint_bytes / 8).max(MIN_CACHE_BYTES),
        }
    }

    /// dp 转像素，结果截断取整
    pub fn dp(&self, value: i32) -> i32 {
        (value as f32 * self.density) as i32
    }

    pub fn dp_f(&self, value: f32) -> f32 {
        value * self.density
    }
}
