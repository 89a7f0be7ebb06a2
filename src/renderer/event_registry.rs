//! 事件注册表 - 整数 id 与回调之间的路由表

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

pub type HandlerError = Box<dyn std::error::Error>;

/// 事件回调
pub type Handler = Rc<dyn Fn(&Value) -> Result<(), HandlerError>>;

/// 原生交互产生、等待路由的事件
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedEvent {
    pub id: u32,
    pub payload: Value,
    /// 产生事件时所挂载树的渲染轮次
    pub pass: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    /// 回调出错或 panic，已记录并吞掉
    HandlerFailed,
    Unknown,
    /// 来自已被重置的旧表
    Stale,
}

/// 事件 payload：{type, tag, platform, timestamp, ...extra}
pub fn event_payload(event_type: &str, tag: &str, platform: &str, extra: impl FnOnce(&mut Map<String, Value>)) -> Value {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64);
    let mut payload = Map::new();
    payload.insert("type".into(), Value::from(event_type));
    payload.insert("tag".into(), Value::from(tag));
    payload.insert("platform".into(), Value::from(platform));
    extra(&mut payload);
    payload.insert("timestamp".into(), Value::from(timestamp));
    Value::Object(payload)
}

/// 一个引擎实例独占的事件表
pub struct EventRegistry {
    handlers: HashMap<u32, Handler>,
    ids: HashMap<usize, u32>,
    next_id: u32,
    generation: u64,
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("handlers", &self.handlers.len())
            .field("next_id", &self.next_id)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRegistry {
    pub fn new() -> Self {
        Self { handlers: HashMap::new(), ids: HashMap::new(), next_id: 1, generation: 0 }
    }

    /// 同一个回调实例在一轮渲染中总是得到同一个 id
    pub fn register_once(&mut self, handler: &Handler) -> u32 {
        let key = Rc::as_ptr(handler).cast::<()>() as usize;
        if let Some(id) = self.ids.get(&key) {
            return *id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.handlers.insert(id, Rc::clone(handler));
        self.ids.insert(key, id);
        id
    }

    /// 每轮完整渲染开始时调用一次
    pub fn reset(&mut self) {
        self.handlers.clear();
        self.ids.clear();
        self.next_id = 1;
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.handlers.contains_key(&id)
    }

    /// 调用回调；回调的错误和 panic 都不会向外传播
    pub fn dispatch(&self, id: u32, payload: &Value) -> DispatchOutcome {
        let Some(handler) = self.handlers.get(&id) else {
            warn!(event_id = id, "no handler found for event id");
            return DispatchOutcome::Unknown;
        };
        match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
            Ok(Ok(())) => DispatchOutcome::Handled,
            Ok(Err(err)) => {
                warn!(event_id = id, %err, "event handler failed");
                DispatchOutcome::HandlerFailed
            }
            Err(_) => {
                warn!(event_id = id, "event handler panicked");
                DispatchOutcome::HandlerFailed
            }
        }
    }

    /// 只在表代次一致时分发
    pub fn dispatch_checked(&self, event: &RoutedEvent, table_generation: u64) -> DispatchOutcome {
        if table_generation != self.generation {
            debug!(event_id = event.id, "dropping event from a reset event table");
            return DispatchOutcome::Stale;
        }
        self.dispatch(event.id, &event.payload)
    }
}
