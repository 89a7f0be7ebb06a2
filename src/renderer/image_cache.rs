//! 图片缓存 - 按解码后字节数限额的 LRU

use crate::error::ImageError;
use image::imageops::FilterType;
use lru::LruCache;
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// 解码后的 RGBA 位图
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

/// 最大的 2 的幂采样率，使采样后仍不小于目标尺寸
pub fn calculate_sample_size(width: u32, height: u32, req_width: u32, req_height: u32) -> u32 {
    let mut sample = 1;
    if height > req_height || width > req_width {
        let half_height = height / 2;
        let half_width = width / 2;
        while half_height / sample >= req_height && half_width / sample >= req_width {
            sample *= 2;
        }
    }
    sample.max(1)
}

/// 先读尺寸再按采样率缩小解码
pub fn decode_sampled(bytes: &[u8], req_width: u32, req_height: u32) -> Result<Bitmap, ImageError> {
    let (width, height) = image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    let sample = calculate_sample_size(width, height, req_width, req_height);

    let mut decoded = image::load_from_memory(bytes)?;
    if sample > 1 {
        decoded = decoded.resize_exact((width / sample).max(1), (height / sample).max(1), FilterType::Triangle);
    }
    let rgba = decoded.to_rgba8();
    Ok(Bitmap { width: rgba.width(), height: rgba.height(), pixels: rgba.into_raw() })
}

/// 缓存键为去掉首尾空白的 source
pub fn normalize_source(source: &str) -> &str {
    source.trim()
}

/// 有界图片缓存
#[derive(Debug)]
pub struct ImageCache {
    entries: LruCache<String, Arc<Bitmap>>,
    resident: usize,
    budget: usize,
}

impl ImageCache {
    pub fn new(budget: usize) -> Self {
        Self { entries: LruCache::unbounded(), resident: 0, budget }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn resident_bytes(&self) -> usize {
        self.resident
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, source: &str) -> bool {
        self.entries.contains(normalize_source(source))
    }

    /// 命中时刷新为最近使用
    pub fn get(&mut self, source: &str) -> Option<Arc<Bitmap>> {
        self.entries.get(normalize_source(source)).cloned()
    }

    /// 插入并按 LRU 淘汰到预算以内，返回被淘汰的键
    pub fn insert(&mut self, source: &str, bitmap: Arc<Bitmap>) -> Vec<String> {
        let key = normalize_source(source).to_string();
        if let Some(old) = self.entries.pop(key.as_str()) {
            self.resident -= old.byte_size();
        }

        let size = bitmap.byte_size();
        if size > self.budget {
            debug!(source = %key, size, budget = self.budget, "bitmap larger than cache budget, not cached");
            return Vec::new();
        }

        self.entries.put(key, bitmap);
        self.resident += size;

        let mut evicted = Vec::new();
        while self.resident > self.budget {
            let Some((k, v)) = self.entries.pop_lru() else {
                break;
            };
            self.resident -= v.byte_size();
            evicted.push(k);
        }
        if !evicted.is_empty() {
            debug!(count = evicted.len(), resident = self.resident, "evicted cached bitmaps");
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.resident = 0;
    }
}
