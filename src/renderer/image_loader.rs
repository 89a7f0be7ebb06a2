//! 图片加载器 - 后台线程下载/解码，结果交回 UI 线程
//!
//! 网络地址（http/https）用 ureq 下载；其它地址按候选路径在资源目录中查找。
//! 所有失败都只记录日志，目标控件保持原状。

use super::image_cache::{decode_sampled, normalize_source, Bitmap, ImageCache};
use crate::config::EngineConfig;
use crate::error::ImageError;
use crate::native::WidgetId;
use std::io::Read;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 发起加载的结果
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// 缓存命中，同步返回
    Ready(Arc<Bitmap>),
    /// 已交给后台线程
    Pending,
    /// 空地址
    Ignored,
}

/// 后台完成的加载，已写入缓存
#[derive(Debug, Clone)]
pub struct CompletedLoad {
    pub widget: WidgetId,
    pub generation: u64,
    pub source: String,
    pub bitmap: Arc<Bitmap>,
}

struct WorkerResult {
    widget: WidgetId,
    generation: u64,
    source: String,
    bitmap: Result<Bitmap, ImageError>,
}

#[derive(Debug, Clone)]
struct LoaderSettings {
    asset_root: PathBuf,
    max_width: u32,
    max_height: u32,
    timeout: Duration,
    max_bytes: u64,
}

/// 图片加载器
pub struct ImageLoader {
    cache: ImageCache,
    settings: Arc<LoaderSettings>,
    tx: Sender<WorkerResult>,
    rx: Receiver<WorkerResult>,
    in_flight: usize,
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("cache", &self.cache)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl ImageLoader {
    pub fn new(config: &EngineConfig) -> Self {
        let (tx, rx) = channel();
        Self {
            cache: ImageCache::new(config.cache_budget()),
            settings: Arc::new(LoaderSettings {
                asset_root: config.asset_root.clone(),
                max_width: config.image_max_width,
                max_height: config.image_max_height,
                timeout: Duration::from_secs(config.fetch_timeout_secs),
                max_bytes: config.max_download_bytes,
            }),
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// 命中缓存立即返回，否则在后台线程加载
    pub fn load(&mut self, widget: WidgetId, generation: u64, source: &str) -> LoadOutcome {
        let source = normalize_source(source);
        if source.is_empty() {
            return LoadOutcome::Ignored;
        }
        if let Some(bitmap) = self.cache.get(source) {
            return LoadOutcome::Ready(bitmap);
        }

        let tx = self.tx.clone();
        let settings = Arc::clone(&self.settings);
        let source = source.to_string();
        let spawned = std::thread::Builder::new()
            .name("image-loader".into())
            .spawn(move || {
                let bitmap = fetch_and_decode(&settings, &source);
                // 接收端已销毁说明宿主已经拆除
                let _ = tx.send(WorkerResult { widget, generation, source, bitmap });
            });
        match spawned {
            Ok(_) => {
                self.in_flight += 1;
                LoadOutcome::Pending
            }
            Err(err) => {
                debug!(%err, "failed to spawn image worker");
                LoadOutcome::Ignored
            }
        }
    }

    /// 取出所有已完成的加载（不阻塞）
    pub fn completed(&mut self) -> Vec<CompletedLoad> {
        let mut done = Vec::new();
        while let Ok(result) = self.rx.try_recv() {
            if let Some(load) = self.accept(result) {
                done.push(load);
            }
        }
        done
    }

    /// 阻塞等待下一个完成的加载
    pub fn wait_completed(&mut self, timeout: Duration) -> Option<CompletedLoad> {
        while self.in_flight > 0 {
            match self.rx.recv_timeout(timeout) {
                Ok(result) => {
                    if let Some(load) = self.accept(result) {
                        return Some(load);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
        None
    }

    /// 在 UI 线程写缓存
    fn accept(&mut self, result: WorkerResult) -> Option<CompletedLoad> {
        self.in_flight = self.in_flight.saturating_sub(1);
        match result.bitmap {
            Ok(bitmap) => {
                let bitmap = Arc::new(bitmap);
                self.cache.insert(&result.source, Arc::clone(&bitmap));
                Some(CompletedLoad {
                    widget: result.widget,
                    generation: result.generation,
                    source: result.source,
                    bitmap,
                })
            }
            Err(err) => {
                debug!(source = %result.source, %err, "image load failed");
                None
            }
        }
    }
}

pub fn is_network_source(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn fetch_and_decode(settings: &LoaderSettings, source: &str) -> Result<Bitmap, ImageError> {
    if is_network_source(source) {
        let bytes = fetch_url(settings, source)?;
        return decode_sampled(&bytes, settings.max_width, settings.max_height);
    }
    load_asset(settings, source)
}

fn fetch_url(settings: &LoaderSettings, url: &str) -> Result<Vec<u8>, ImageError> {
    let response = ureq::get(url)
        .timeout(settings.timeout)
        .call()
        .map_err(|e| ImageError::Network(e.to_string()))?;

    let mut bytes = Vec::new();
    response.into_reader().take(settings.max_bytes).read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// 本地资源的候选路径，按顺序尝试
pub fn asset_candidates(source: &str) -> Vec<String> {
    let stripped = source.strip_prefix("./").unwrap_or(source);
    let mut candidates = vec![source.to_string(), stripped.to_string()];
    if source.starts_with("images/") {
        candidates.push(format!("app/{source}"));
    }
    if source.starts_with("./images/") {
        candidates.push(format!("app/{stripped}"));
    }
    if let Some(rest) = source.strip_prefix("app/") {
        candidates.push(rest.to_string());
    }

    let mut unique: Vec<String> = Vec::with_capacity(candidates.len());
    for c in candidates {
        if !c.trim().is_empty() && !unique.contains(&c) {
            unique.push(c);
        }
    }
    unique
}

fn load_asset(settings: &LoaderSettings, source: &str) -> Result<Bitmap, ImageError> {
    for candidate in asset_candidates(source) {
        let path = settings.asset_root.join(&candidate);
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        match decode_sampled(&bytes, settings.max_width, settings.max_height) {
            Ok(bitmap) => return Ok(bitmap),
            Err(err) => debug!(path = %path.display(), %err, "asset candidate failed to decode"),
        }
    }
    Err(ImageError::NotFound(source.to_string()))
}
