//! QuickJS 运行时

use crate::error::EngineError;
use rquickjs::convert::Coerced;
use rquickjs::function::Rest;
use rquickjs::{Context, Ctx, Function, Runtime, Value};

/// JS 运行时，只能在创建它的线程上使用
pub struct JsRuntime {
    // context 依赖 runtime，字段顺序保证先销毁 context
    context: Context,
    _runtime: Runtime,
}

impl std::fmt::Debug for JsRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsRuntime").finish_non_exhaustive()
    }
}

fn script_error(ctx: &Ctx<'_>, err: rquickjs::Error) -> EngineError {
    if let rquickjs::Error::Exception = err {
        let exception = ctx.catch();
        let message = exception
            .as_exception()
            .and_then(|e| e.message())
            .unwrap_or_else(|| value_to_string(&exception));
        return EngineError::Script(message);
    }
    EngineError::Script(err.to_string())
}

impl JsRuntime {
    pub fn new() -> Result<Self, EngineError> {
        let runtime = Runtime::new().map_err(|e| EngineError::Script(e.to_string()))?;
        let context = Context::full(&runtime).map_err(|e| EngineError::Script(e.to_string()))?;
        Ok(Self { context, _runtime: runtime })
    }

    /// 执行 JS 代码，返回结果的字符串形式
    pub fn eval(&self, code: &str) -> Result<String, EngineError> {
        self.context.with(|ctx| match ctx.eval::<Value, _>(code) {
            Ok(val) => Ok(value_to_string(&val)),
            Err(err) => Err(script_error(&ctx, err)),
        })
    }

    /// 注册全局函数，参数统一转换为字符串
    pub fn register_function<F>(&self, name: &str, func: F) -> Result<(), EngineError>
    where
        F: Fn(Vec<String>) -> String + 'static,
    {
        self.context.with(|ctx| {
            let js_func = Function::new(ctx.clone(), move |args: Rest<Coerced<String>>| -> String {
                func(args.0.into_iter().map(|a| a.0).collect())
            })
            .map_err(|e| script_error(&ctx, e))?;
            ctx.globals().set(name, js_func).map_err(|e| script_error(&ctx, e))
        })
    }
}

/// 将 JS Value 转换为字符串
fn value_to_string(val: &Value) -> String {
    if val.is_undefined() {
        "undefined".to_string()
    } else if val.is_null() {
        "null".to_string()
    } else if let Some(s) = val.as_string() {
        s.to_string().unwrap_or_default()
    } else if let Some(n) = val.as_int() {
        n.to_string()
    } else if let Some(n) = val.as_float() {
        n.to_string()
    } else if let Some(b) = val.as_bool() {
        b.to_string()
    } else {
        "[object]".to_string()
    }
}
