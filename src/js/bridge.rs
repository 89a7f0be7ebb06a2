//! JS 与 Native 桥接层
//!
//! 脚本侧维护自己的事件表：每次整树渲染前重置，序列化节点时把回调换成整数 id，
//! 然后通过 `__native_submit_tree` 把 JSON 交给原生侧。原生交互再通过
//! `__venjsDispatchNativeEvent(id, payload)` 回到脚本。

use super::JsRuntime;
use crate::error::EngineError;
use crate::renderer::RoutedEvent;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// 脚本侧运行时
const PRELUDE: &str = r#"
var window = globalThis;
var console = {
  log: function () { __native_log('log', Array.prototype.slice.call(arguments).map(String).join(' ')); },
  info: function () { __native_log('log', Array.prototype.slice.call(arguments).map(String).join(' ')); },
  warn: function () { __native_log('warn', Array.prototype.slice.call(arguments).map(String).join(' ')); },
  error: function () { __native_log('error', Array.prototype.slice.call(arguments).map(String).join(' ')); }
};

var venjs = {
  _handlers: {},
  _handlerIds: new Map(),
  _seed: 1,
  _root: null,
  _eventContext: null,

  _register: function (handler) {
    if (venjs._handlerIds.has(handler)) return venjs._handlerIds.get(handler);
    var id = venjs._seed++;
    venjs._handlers[id] = handler;
    venjs._handlerIds.set(handler, id);
    return id;
  },

  _reset: function () {
    venjs._handlers = {};
    venjs._handlerIds = new Map();
    venjs._seed = 1;
  },

  _dispatch: function (id, payload) {
    var handler = venjs._handlers[id];
    if (typeof handler !== 'function') {
      console.warn('no handler found for event id ' + id);
      return;
    }
    var prev = venjs._eventContext;
    venjs._eventContext = payload && payload.type ? String(payload.type) : null;
    try {
      handler(payload);
    } catch (e) {
      console.error('event handler failed: ' + e);
    } finally {
      venjs._eventContext = prev;
    }
  },

  _children: function (children) {
    var list = Array.isArray(children) ? children : [children];
    var out = [];
    list.forEach(function (child) {
      if (Array.isArray(child)) { out.push.apply(out, venjs._children(child)); return; }
      if (child === null || child === undefined || child === false) return;
      if (typeof child === 'string' || typeof child === 'number') {
        out.push({ tag: 'text', props: { textContent: String(child) }, children: [] });
        return;
      }
      out.push(child);
    });
    return out;
  },

  _serialize: function (node) {
    if (!node || typeof node !== 'object') return node;
    var props = Object.assign({}, node.props || {});
    var events = {};
    var source = props.events && typeof props.events === 'object' ? props.events : {};
    if (typeof props.onClick === 'function') events.click = venjs._register(props.onClick);
    if (typeof props.onPress === 'function') events.click = venjs._register(props.onPress);
    if (typeof props.onChange === 'function') events.change = venjs._register(props.onChange);
    Object.keys(source).forEach(function (name) {
      if (typeof source[name] === 'function') events[name] = venjs._register(source[name]);
      else if (typeof source[name] === 'number') events[name] = source[name];
    });
    delete props.onClick;
    delete props.onPress;
    delete props.onChange;
    delete props.events;
    if (Object.keys(events).length > 0) props.events = events;
    return {
      tag: node.tag,
      props: props,
      children: venjs._children(node.children || []).map(venjs._serialize)
    };
  },

  _render: function () {
    if (typeof venjs._root !== 'function') throw new Error('no root component mounted');
    venjs._reset();
    __native_submit_tree(JSON.stringify(venjs._serialize(venjs._root())));
  },

  h: function (tag, props) {
    return { tag: tag, props: props || {}, children: venjs._children(Array.prototype.slice.call(arguments, 2)) };
  },

  state: function (initial) {
    var value = initial;
    return {
      get: function () { return value; },
      set: function (next) {
        value = typeof next === 'function' ? next(value) : next;
        // 输入过程中不重渲染，保持原生输入框状态
        if (venjs._eventContext !== 'change' && typeof venjs._root === 'function') venjs._render();
        return value;
      }
    };
  },

  rerender: function () { venjs._render(); },

  mount: function (component) {
    if (typeof component !== 'function') throw new Error('mount requires a component function');
    venjs._root = component;
    venjs._render();
  }
};

window.venjs = venjs;
window.__venjsDispatchNativeEvent = function (id, payload) {
  venjs._dispatch(Number(id), payload || {});
};
"#;

/// 脚本发给原生侧的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// 序列化后的节点树
    SubmitTree(String),
    ConsoleLog(String),
    ConsoleWarn(String),
    ConsoleError(String),
}

/// 脚本桥接器
#[derive(Debug)]
pub struct ScriptBridge {
    runtime: JsRuntime,
    event_queue: Rc<RefCell<Vec<BridgeEvent>>>,
}

impl ScriptBridge {
    /// 创建运行时并注入 native 函数与脚本侧运行时
    pub fn new() -> Result<Self, EngineError> {
        let bridge = Self { runtime: JsRuntime::new()?, event_queue: Rc::new(RefCell::new(Vec::new())) };
        bridge.register_native_functions()?;
        bridge.runtime.eval(PRELUDE)?;
        debug!("script bridge initialized");
        Ok(bridge)
    }

    fn register_native_functions(&self) -> Result<(), EngineError> {
        let q = Rc::clone(&self.event_queue);
        self.runtime.register_function("__native_submit_tree", move |args| {
            if let Some(json) = args.into_iter().next() {
                q.borrow_mut().push(BridgeEvent::SubmitTree(json));
            }
            "undefined".to_string()
        })?;

        let q = Rc::clone(&self.event_queue);
        self.runtime.register_function("__native_log", move |args| {
            let level = args.first().cloned().unwrap_or_default();
            let message = args.get(1).cloned().unwrap_or_default();
            let event = match level.as_str() {
                "warn" => BridgeEvent::ConsoleWarn(message),
                "error" => BridgeEvent::ConsoleError(message),
                _ => BridgeEvent::ConsoleLog(message),
            };
            q.borrow_mut().push(event);
            "undefined".to_string()
        })?;
        Ok(())
    }

    pub fn runtime(&self) -> &JsRuntime {
        &self.runtime
    }

    /// 执行应用脚本
    pub fn load_script(&self, code: &str) -> Result<String, EngineError> {
        self.runtime.eval(code)
    }

    /// 取出并清空消息队列；控制台输出顺便写入日志
    pub fn drain_events(&self) -> Vec<BridgeEvent> {
        let events = std::mem::take(&mut *self.event_queue.borrow_mut());
        for event in &events {
            match event {
                BridgeEvent::ConsoleLog(msg) => info!(target: "script", "{msg}"),
                BridgeEvent::ConsoleWarn(msg) => warn!(target: "script", "{msg}"),
                BridgeEvent::ConsoleError(msg) => warn!(target: "script", error = true, "{msg}"),
                BridgeEvent::SubmitTree(_) => {}
            }
        }
        events
    }

    /// 把原生事件交给脚本侧事件表
    pub fn dispatch(&self, event: &RoutedEvent) -> Result<(), EngineError> {
        let payload = serde_json::to_string(&event.payload)?;
        self.runtime
            .eval(&format!("__venjsDispatchNativeEvent({}, {payload})", event.id))?;
        Ok(())
    }
}
