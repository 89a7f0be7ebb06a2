//! 脚本桥接测试
//! 脚本挂载组件、原生事件回到脚本、脚本重渲染

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::js::{BridgeEvent, ScriptBridge};
use crate::native::WidgetId;
use crate::runtime::Surface;

const COUNTER_APP: &str = r#"
var count = venjs.state(0);
var name = venjs.state('');
venjs.mount(function () {
  return venjs.h('div', { style: { padding: '12' } },
    venjs.h('text', { textContent: 'count ' + count.get() }),
    venjs.h('button', { textContent: '+', onClick: function () { count.set(count.get() + 1); } }),
    venjs.h('input', { placeholder: 'name', onChange: function (e) { name.set(e.value); } }),
    venjs.h('button', { textContent: 'boom', onClick: function () { throw new Error('handler failed'); } })
  );
});
"#;

const TOGGLE_APP: &str = r#"
var on = venjs.state(false);
var danger = venjs.state(0);
venjs.mount(function () {
  return venjs.h('div', {},
    venjs.h('text', { textContent: 'danger ' + danger.get() }),
    on.get() ? venjs.h('button', { textContent: 'danger', onClick: function () { danger.set(danger.get() + 1); } }) : null,
    venjs.h('button', { textContent: 'toggle', onClick: function () { on.set(!on.get()); } })
  );
});
"#;

/// 创建已加载计数器应用的界面
fn counter_surface() -> Surface {
    let mut surface = Surface::new(EngineConfig::default()).unwrap();
    let report = surface.load_script(COUNTER_APP).unwrap();
    assert_eq!(report.submissions, 1);
    surface
}

fn child(surface: &Surface, i: usize) -> WidgetId {
    let engine = surface.engine();
    let root = engine.root().unwrap();
    engine.tree().children(root).unwrap()[i]
}

fn text_of(surface: &Surface, id: WidgetId) -> String {
    surface.engine().tree().widget(id).unwrap().state().text.clone()
}

/// 测试脚本挂载后生成原生控件，回调被换成事件 id
#[test]
fn test_mount_from_script() {
    let surface = counter_surface();
    let engine = surface.engine();
    let root = engine.root().unwrap();
    assert_eq!(engine.tree().children(root).unwrap().len(), 4);
    assert_eq!(text_of(&surface, child(&surface, 0)), "count 0");

    let node = engine.mounted_tree().unwrap();
    assert_eq!(node.children[1].event_id("click"), Some(1));
    assert_eq!(node.children[2].event_id("change"), Some(2));
    assert!(!node.children[1].has_prop("onClick"));
}

/// 测试点击回到脚本，脚本更新状态并重渲染
#[test]
fn test_click_round_trip() {
    let mut surface = counter_surface();
    let label = child(&surface, 0);
    let button = child(&surface, 1);

    surface.engine_mut().click(button).unwrap();
    let report = surface.pump();
    assert_eq!(report.events, 1);
    assert_eq!(report.submissions, 1);
    assert_eq!(text_of(&surface, label), "count 1");
    // 协调后控件被复用
    assert_eq!(child(&surface, 0), label);
    assert_eq!(child(&surface, 1), button);
}

/// 测试输入过程中不触发重渲染
#[test]
fn test_change_event_does_not_rerender() {
    let mut surface = counter_surface();
    let input = child(&surface, 2);

    surface.engine_mut().input_text(input, "ann").unwrap();
    let report = surface.pump();
    assert_eq!(report.events, 1);
    assert_eq!(report.submissions, 0);
    assert_eq!(text_of(&surface, input), "ann");
}

/// 测试脚本回调抛错不会影响宿主
#[test]
fn test_handler_error_is_contained() {
    let mut surface = counter_surface();
    let boom = child(&surface, 3);

    surface.engine_mut().click(boom).unwrap();
    let report = surface.pump();
    assert_eq!(report.events, 1);
    assert_eq!(text_of(&surface, child(&surface, 0)), "count 0");
}

/// 测试重渲染之后才送达的旧事件被丢弃
#[test]
fn test_event_across_rerender_is_dropped() {
    let mut surface = counter_surface();
    let button = child(&surface, 1);

    surface.engine_mut().click(button).unwrap();
    surface.bridge().load_script("venjs.rerender()").unwrap();
    let report = surface.pump();
    assert_eq!(report.stale_events, 1);
    assert_eq!(report.events, 0);
    assert_eq!(text_of(&surface, child(&surface, 0)), "count 0");
}

/// 测试同一批事件里前一个回调触发重渲染后，后面的事件不会落到新树的回调上
#[test]
fn test_batched_event_after_rerender_is_dropped() {
    let mut surface = Surface::new(EngineConfig::default()).unwrap();
    surface.load_script(TOGGLE_APP).unwrap();
    let toggle = child(&surface, 1);
    assert_eq!(surface.engine().mounted_tree().unwrap().children[1].event_id("click"), Some(1));

    surface.engine_mut().click(toggle).unwrap();
    surface.engine_mut().click(toggle).unwrap();
    let report = surface.pump();
    assert_eq!(report.events, 1);
    assert_eq!(report.stale_events, 1);
    assert_eq!(report.submissions, 1);

    // 新树里 id 1 属于 danger 按钮，它不能被旧的点击触发
    let engine = surface.engine();
    let root = engine.root().unwrap();
    assert_eq!(engine.tree().children(root).unwrap().len(), 3);
    assert_eq!(engine.mounted_tree().unwrap().children[1].event_id("click"), Some(1));
    assert_eq!(text_of(&surface, child(&surface, 0)), "danger 0");
}

/// 测试脚本提交格式错误的树
#[test]
fn test_rejected_submission_counted() {
    let mut surface = counter_surface();
    let report = surface.load_script("__native_submit_tree('{oops')").unwrap();
    assert_eq!(report.rejected, 1);
    assert_eq!(text_of(&surface, child(&surface, 0)), "count 0");
}

/// 测试控制台输出被捕获
#[test]
fn test_console_capture() {
    let bridge = ScriptBridge::new().unwrap();
    bridge.load_script("console.warn('careful', 1); console.log('hi')").unwrap();
    assert_eq!(
        bridge.drain_events(),
        vec![BridgeEvent::ConsoleWarn("careful 1".into()), BridgeEvent::ConsoleLog("hi".into())]
    );
    assert!(bridge.drain_events().is_empty());
}

/// 测试脚本异常带回消息
#[test]
fn test_script_exception_message() {
    let bridge = ScriptBridge::new().unwrap();
    match bridge.load_script("throw new Error('bad things')") {
        Err(EngineError::Script(msg)) => assert!(msg.contains("bad things")),
        other => panic!("expected script error, got {other:?}"),
    }
    assert_eq!(bridge.load_script("1 + 2").unwrap(), "3");
}

/// 测试链接点击产生打开地址请求
#[test]
fn test_open_url_request_reported() {
    let mut surface = Surface::new(EngineConfig::default()).unwrap();
    surface
        .load_script("venjs.mount(function () { return venjs.h('div', {}, venjs.h('a', { href: 'http://example.com' })); });")
        .unwrap();
    let link = child(&surface, 0);

    surface.engine_mut().click(link).unwrap();
    let report = surface.pump();
    assert_eq!(report.events, 0);
    assert_eq!(report.requests, vec![crate::renderer::EngineRequest::OpenUrl("http://example.com".into())]);
}
