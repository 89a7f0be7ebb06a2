//! QuickJS 引擎绑定

pub mod bridge;
mod runtime;

pub use bridge::{BridgeEvent, ScriptBridge};
pub use runtime::JsRuntime;
