//! 协调引擎测试
//! 覆盖挂载、复用、重建、交互事件、图片回写与回退

use crate::config::{EngineConfig, UpdateStrategy};
use crate::native::{FontFace, InputType, Orientation, WidgetId, WidgetKind};
use crate::renderer::event_registry::HandlerError;
use crate::renderer::{DispatchOutcome, Engine, EngineRequest, Handler};
use crate::Color;
use serde_json::{json, Value};
use std::cell::Cell;
use std::io::Cursor;
use std::rc::Rc;
use std::time::Duration;

/// 创建测试用的引擎
fn engine() -> Engine {
    Engine::new(EngineConfig { platform: "test-os".into(), ..EngineConfig::default() })
}

/// 辅助函数：提交 json! 值
fn submit(engine: &mut Engine, tree: Value) -> WidgetId {
    engine.submit(&tree.to_string()).unwrap()
}

/// 辅助函数：根控件的第 i 个子控件
fn child(engine: &Engine, parent: WidgetId, i: usize) -> WidgetId {
    engine.tree().children(parent).unwrap()[i]
}

fn text_of(engine: &Engine, id: WidgetId) -> String {
    engine.tree().widget(id).unwrap().state().text.clone()
}

/// 辅助函数：编码一张纯色 PNG
fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 0, 0, 255]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

/// 辅助函数：等待所有图片加载结束并回写
fn drain_images(engine: &mut Engine) {
    for _ in 0..20 {
        if engine.images().in_flight() == 0 {
            break;
        }
        engine.pump_wait(Duration::from_secs(5));
    }
    engine.pump();
}

fn sample_tree(label: &str) -> Value {
    json!({
        "tag": "div",
        "props": {"style": {"padding": "8", "backgroundColor": "#FFFFFF"}},
        "children": [
            {"tag": "text", "props": {"textContent": label}},
            {"tag": "button", "props": {"textContent": "Go", "events": {"click": 1}}},
            {"tag": "input", "props": {"placeholder": "name", "events": {"change": 2}}},
            {"tag": "image", "props": {"src": ""}}
        ]
    })
}

/// 测试首次提交挂载到宿主
#[test]
fn test_first_submit_mounts() {
    let mut engine = engine();
    let root = submit(&mut engine, sample_tree("hello"));

    assert_eq!(engine.tree().children(engine.host()).unwrap(), &[root]);
    assert_eq!(engine.root(), Some(root));
    assert_eq!(engine.tree().widget(root).unwrap().kind(), WidgetKind::Layout);
    assert_eq!(engine.tree().children(root).unwrap().len(), 4);
    assert_eq!(text_of(&engine, child(&engine, root, 0)), "hello");
    assert_eq!(engine.stats().mounts, 1);
}

/// 测试相同的树重复提交不产生任何控件写入
#[test]
fn test_identical_resubmit_is_noop() {
    let mut engine = engine();
    let root = submit(&mut engine, sample_tree("hello"));
    let before = engine.tree().subtree_mutations(engine.host());
    let widgets = engine.tree().len();

    let again = submit(&mut engine, sample_tree("hello"));
    assert_eq!(again, root);
    assert_eq!(engine.tree().subtree_mutations(engine.host()), before);
    assert_eq!(engine.tree().len(), widgets);
    assert_eq!(engine.stats().reconciles, 1);
    assert_eq!(engine.stats().mounts, 1);
}

/// 测试文本变化时原地更新
#[test]
fn test_text_change_updates_in_place() {
    let mut engine = engine();
    let root = submit(&mut engine, sample_tree("hello"));
    let label = child(&engine, root, 0);
    let button = child(&engine, root, 1);

    submit(&mut engine, sample_tree("world"));
    assert_eq!(child(&engine, root, 0), label);
    assert_eq!(child(&engine, root, 1), button);
    assert_eq!(text_of(&engine, label), "world");
}

/// 测试标签变化时替换控件，旧控件被销毁
#[test]
fn test_tag_change_replaces_widget() {
    let mut engine = engine();
    let root = submit(&mut engine, json!({"tag": "div", "children": [{"tag": "text", "props": {"textContent": "a"}}]}));
    let old = child(&engine, root, 0);

    submit(&mut engine, json!({"tag": "div", "children": [{"tag": "button", "props": {"textContent": "a"}}]}));
    let new = child(&engine, root, 0);
    assert_ne!(new, old);
    assert!(!engine.tree().contains(old));
    assert_eq!(engine.tree().widget(new).unwrap().kind(), WidgetKind::Button);
}

/// 测试一个子节点换类型时兄弟节点不受影响
#[test]
fn test_tag_change_leaves_siblings_untouched() {
    let mut engine = engine();
    let row = |middle: &str| {
        json!({"tag": "div", "children": [
            {"tag": "text", "props": {"textContent": "a"}},
            {"tag": middle, "props": {"textContent": "b"}},
            {"tag": "text", "props": {"textContent": "c"}}
        ]})
    };
    let root = submit(&mut engine, row("text"));
    let first = child(&engine, root, 0);
    let last = child(&engine, root, 2);
    let before = [first, last].map(|id| engine.tree().subtree_mutations(id));
    let root_writes = engine.tree().widget(root).unwrap().mutations();

    submit(&mut engine, row("button"));
    assert_eq!(child(&engine, root, 0), first);
    assert_eq!(child(&engine, root, 2), last);
    assert_eq!([first, last].map(|id| engine.tree().subtree_mutations(id)), before);
    assert_eq!(engine.tree().widget(root).unwrap().mutations(), root_writes);
    assert_eq!(engine.tree().widget(child(&engine, root, 1)).unwrap().kind(), WidgetKind::Button);
}

/// 测试未变化的叶子跳过绑定后，状态与全新构建的控件一致
#[test]
fn test_leaf_short_circuit_matches_fresh_render() {
    let mut engine = engine();
    let leaf = json!({"tag": "text", "props": {
        "textContent": "static",
        "style": {"color": "#FF0000", "fontSize": 14, "margin": "4 8", "animationType": "fadeIn"}
    }});
    let tree = |title: &str| json!({"tag": "div", "props": {"title": title}, "children": [leaf.clone()]});

    let root = submit(&mut engine, tree("one"));
    let label = child(&engine, root, 0);
    let writes = engine.tree().widget(label).unwrap().mutations();
    submit(&mut engine, tree("two"));
    assert_eq!(child(&engine, root, 0), label);
    assert_eq!(engine.tree().widget(label).unwrap().mutations(), writes);

    let node = crate::parser::Node::parse(&leaf.to_string()).unwrap();
    let fresh = engine.render_node(&node).unwrap();
    assert_eq!(engine.tree().widget(label).unwrap().state(), engine.tree().widget(fresh).unwrap().state());
}

/// 测试子节点追加与从尾部截断
#[test]
fn test_children_append_and_truncate() {
    let mut engine = engine();
    let items = |n: usize| {
        let children: Vec<Value> = (0..n)
            .map(|i| json!({"tag": "text", "props": {"textContent": format!("item {i}")}}))
            .collect();
        json!({"tag": "div", "children": children})
    };

    let root = submit(&mut engine, items(2));
    let first = child(&engine, root, 0);

    submit(&mut engine, items(4));
    assert_eq!(engine.tree().children(root).unwrap().len(), 4);
    assert_eq!(child(&engine, root, 0), first);
    assert_eq!(text_of(&engine, child(&engine, root, 3)), "item 3");

    let removed = child(&engine, root, 2);
    submit(&mut engine, items(1));
    assert_eq!(engine.tree().children(root).unwrap(), &[first]);
    assert!(!engine.tree().contains(removed));
}

/// 测试输入框属性变化时重建，避免重复文本监听
#[test]
fn test_input_props_change_recreates() {
    let mut engine = engine();
    let tree = |value: &str| {
        json!({"tag": "div", "children": [
            {"tag": "input", "props": {"value": value, "type": "password", "events": {"change": 4}}}
        ]})
    };

    let root = submit(&mut engine, tree("a"));
    let first = child(&engine, root, 0);
    let state = engine.tree().widget(first).unwrap().state();
    assert_eq!(state.input_type, InputType::Password);
    assert_eq!(state.listeners.text_watchers, vec![4]);

    submit(&mut engine, tree("a"));
    assert_eq!(child(&engine, root, 0), first);

    submit(&mut engine, tree("ab"));
    let second = child(&engine, root, 0);
    assert_ne!(second, first);
    let state = engine.tree().widget(second).unwrap().state();
    assert_eq!(state.text, "ab");
    assert_eq!(state.listeners.text_watchers, vec![4]);
}

/// 测试根节点种类变化时替换宿主中的根控件
#[test]
fn test_root_change_splices_host() {
    let mut engine = engine();
    let old = submit(&mut engine, json!({"tag": "div"}));
    let new = submit(&mut engine, json!({"tag": "text", "props": {"textContent": "only"}}));

    assert_ne!(old, new);
    assert_eq!(engine.tree().children(engine.host()).unwrap(), &[new]);
    assert!(!engine.tree().contains(old));
    assert_eq!(engine.root(), Some(new));
}

/// 测试格式错误的提交保留当前界面
#[test]
fn test_malformed_submit_keeps_ui() {
    let mut engine = engine();
    let root = submit(&mut engine, sample_tree("hello"));
    let before = engine.tree().subtree_mutations(engine.host());

    assert!(engine.submit("{\"tag\": ").is_err());
    assert!(engine.submit("42").is_err());
    assert_eq!(engine.root(), Some(root));
    assert_eq!(engine.tree().subtree_mutations(engine.host()), before);
    assert_eq!(engine.stats().rejected, 2);
}

/// 测试整树重建策略
#[test]
fn test_remount_strategy() {
    let mut engine = Engine::new(EngineConfig { strategy: UpdateStrategy::Remount, ..EngineConfig::default() });
    let first = submit(&mut engine, sample_tree("hello"));
    let second = submit(&mut engine, sample_tree("hello"));

    assert_ne!(first, second);
    assert!(!engine.tree().contains(first));
    assert_eq!(engine.stats().mounts, 2);
    assert_eq!(engine.stats().reconciles, 0);
}

/// 测试协调出错时回退为整树重建
#[test]
fn test_reconcile_error_falls_back_to_fresh_mount() {
    let mut engine = engine();
    let root = submit(&mut engine, sample_tree("hello"));

    // 模拟原生侧控件丢失
    engine.tree_mut().destroy(root);
    let rebuilt = submit(&mut engine, sample_tree("world"));

    assert_ne!(rebuilt, root);
    assert_eq!(engine.stats().fallbacks, 1);
    assert_eq!(engine.tree().children(engine.host()).unwrap(), &[rebuilt]);
    assert_eq!(text_of(&engine, child(&engine, rebuilt, 0)), "world");
}

/// 测试回退重建时销毁未挂上树的控件
#[test]
fn test_fallback_destroys_detached_widgets() {
    let mut engine = engine();
    let root = submit(&mut engine, sample_tree("hello"));

    // 协调中途新建、还没挂上父容器的控件
    let detached = engine.tree_mut().create(WidgetKind::Layout);
    let nested = engine.tree_mut().create(WidgetKind::Label);
    engine.tree_mut().append_child(detached, nested).unwrap();
    engine.tree_mut().destroy(root);

    let rebuilt = submit(&mut engine, sample_tree("world"));
    assert_eq!(engine.stats().fallbacks, 1);
    assert!(!engine.tree().contains(detached));
    assert!(!engine.tree().contains(nested));
    // 宿主 + 根 + 四个子控件
    assert_eq!(engine.tree().len(), 6);
    assert_eq!(engine.tree().children(engine.host()).unwrap(), &[rebuilt]);
}

/// 测试点击事件 payload
#[test]
fn test_click_emits_event() {
    let mut engine = engine();
    let root = submit(&mut engine, sample_tree("hello"));
    let button = child(&engine, root, 1);

    assert!(engine.click(button).unwrap());
    assert!(!engine.click(child(&engine, root, 0)).unwrap());

    let events = engine.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, 1);
    assert_eq!(events[0].payload["type"], "click");
    assert_eq!(events[0].payload["tag"], "button");
    assert_eq!(events[0].payload["platform"], "test-os");
    assert!(engine.drain_events().is_empty());
}

/// 测试链接：默认样式、打开地址请求与点击事件
#[test]
fn test_link_defaults_and_open_url() {
    let mut engine = engine();
    let root = submit(&mut engine, json!({"tag": "div", "children": [
        {"tag": "a", "props": {"href": "example.com/docs", "events": {"click": 9}}}
    ]}));
    let link = child(&engine, root, 0);
    let state = engine.tree().widget(link).unwrap().state();
    assert_eq!(state.text, "example.com/docs");
    assert_eq!(state.text_attrs.color, Some(Color::rgb(0x0B, 0x5D, 0xFF)));
    assert_eq!(state.text_attrs.size_sp, 16.0);

    engine.click(link).unwrap();
    assert_eq!(engine.drain_requests(), vec![EngineRequest::OpenUrl("https://example.com/docs".into())]);
    let events = engine.drain_events();
    assert_eq!(events[0].payload["href"], "example.com/docs");
}

/// 测试输入文本通知监听器
#[test]
fn test_input_text_notifies_watchers() {
    let mut engine = engine();
    let root = submit(&mut engine, sample_tree("hello"));
    let input = child(&engine, root, 2);
    assert_eq!(engine.tree().widget(input).unwrap().state().hint, "name");

    assert_eq!(engine.input_text(input, "bob").unwrap(), 1);
    assert_eq!(text_of(&engine, input), "bob");
    let events = engine.drain_events();
    assert_eq!(events[0].id, 2);
    assert_eq!(events[0].payload["type"], "change");
    assert_eq!(events[0].payload["value"], "bob");
}

/// 测试复选框切换
#[test]
fn test_checkbox_toggle() {
    let mut engine = engine();
    let root = submit(&mut engine, json!({"tag": "div", "children": [
        {"tag": "input", "props": {"type": "checkbox", "label": "Agree", "checked": true, "events": {"change": 6}}}
    ]}));
    let checkbox = child(&engine, root, 0);
    let state = engine.tree().widget(checkbox).unwrap().state();
    assert_eq!(engine.tree().widget(checkbox).unwrap().kind(), WidgetKind::CheckBox);
    assert!(state.checked);
    assert_eq!(state.text, "Agree");

    assert!(engine.set_checked(checkbox, false).unwrap());
    assert!(!engine.set_checked(checkbox, false).unwrap());
    let events = engine.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload["checked"], false);
    assert_eq!(events[0].payload["value"], false);
    assert_eq!(events[0].payload["tag"], "checkbox");
}

/// 测试新一轮渲染后，旧树产生的事件被丢弃
#[test]
fn test_events_from_replaced_tree_are_stale() {
    let mut engine = engine();
    let clicks = Rc::new(Cell::new(0));
    let counter = Rc::clone(&clicks);
    let handler: Handler = Rc::new(move |_: &Value| -> Result<(), HandlerError> {
        counter.set(counter.get() + 1);
        Ok(())
    });
    let id = engine.events_mut().register_once(&handler);
    let tree = json!({"tag": "div", "children": [
        {"tag": "button", "props": {"textContent": "+", "events": {"click": id}}}
    ]});

    let root = submit(&mut engine, tree.clone());
    let button = child(&engine, root, 0);
    engine.click(button).unwrap();
    submit(&mut engine, tree);
    assert_eq!(engine.dispatch_pending(), vec![DispatchOutcome::Stale]);
    assert_eq!(clicks.get(), 0);

    engine.click(button).unwrap();
    assert_eq!(engine.dispatch_pending(), vec![DispatchOutcome::Handled]);
    assert_eq!(clicks.get(), 1);

    // 事件表重置后，挂载树上的 id 不再有效
    engine.click(button).unwrap();
    engine.events_mut().reset();
    assert_eq!(engine.dispatch_pending(), vec![DispatchOutcome::Stale]);
    assert_eq!(clicks.get(), 1);
}

/// 测试重新绑定不会重启动画
#[test]
fn test_animation_not_restarted_on_rebind() {
    let mut engine = engine();
    let tree = |label: &str| {
        json!({"tag": "div", "props": {"style": {"animation": "fade"}}, "children": [
            {"tag": "text", "props": {"textContent": label, "style": {"animation": "slideUp"}}}
        ]})
    };

    let root = submit(&mut engine, tree("a"));
    submit(&mut engine, tree("b"));
    let label = child(&engine, root, 0);
    assert_eq!(engine.tree().widget(root).unwrap().state().animations_started, 1);
    assert_eq!(engine.tree().widget(label).unwrap().state().animations_started, 1);
    assert_eq!(text_of(&engine, label), "b");
}

/// 测试横向滚动容器包裹一个横向行容器
#[test]
fn test_horizontal_scroll_wraps_row() {
    let mut engine = engine();
    let tree = |n: usize| {
        let children: Vec<Value> = (0..n).map(|i| json!({"tag": "text", "props": {"textContent": i}})).collect();
        json!({"tag": "div", "props": {"style": {"overflowX": "scroll"}}, "children": children})
    };

    let scroll = submit(&mut engine, tree(2));
    assert_eq!(engine.tree().widget(scroll).unwrap().kind(), WidgetKind::HorizontalScroll);
    let row = child(&engine, scroll, 0);
    assert_eq!(engine.tree().widget(row).unwrap().state().orientation, Orientation::Horizontal);
    assert_eq!(engine.tree().children(row).unwrap().len(), 2);

    let again = submit(&mut engine, tree(3));
    assert_eq!(again, scroll);
    assert_eq!(engine.tree().children(scroll).unwrap(), &[row]);
    assert_eq!(engine.tree().children(row).unwrap().len(), 3);

    // 去掉 overflowX 后种类不同，必须重建
    let plain = submit(&mut engine, json!({"tag": "div"}));
    assert_ne!(plain, scroll);
    assert_eq!(engine.tree().widget(plain).unwrap().kind(), WidgetKind::Layout);
}

/// 测试标签默认样式：图标字体与字号、加载指示器
#[test]
fn test_tag_defaults() {
    let mut engine = engine();
    let root = submit(&mut engine, json!({"tag": "div", "children": [
        {"tag": "icon", "props": {"textContent": "\u{f00c}"}},
        {"tag": "activityIndicator"},
        {"tag": "text", "props": {"textContent": "t"}}
    ]}));

    let icon = engine.tree().widget(child(&engine, root, 0)).unwrap().state();
    assert_eq!(icon.text_attrs.size_sp, 20.0);
    // 没有字体目录时回退到系统默认字体
    assert_eq!(icon.text_attrs.face, FontFace::SystemDefault);

    let spinner = engine.tree().widget(child(&engine, root, 1)).unwrap();
    assert_eq!(spinner.kind(), WidgetKind::ProgressBar);
    assert!(spinner.state().indeterminate);

    let text = engine.tree().widget(child(&engine, root, 2)).unwrap().state();
    assert_eq!(text.text_attrs.size_sp, 18.0);
}

/// 测试图片：旧请求的结果不会覆盖新地址，缓存命中同步返回
#[test]
fn test_image_results_respect_latest_source() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.png"), png_bytes(2, 2)).unwrap();
    std::fs::write(dir.path().join("b.png"), png_bytes(3, 3)).unwrap();
    let mut engine = Engine::new(EngineConfig { asset_root: dir.path().to_path_buf(), ..EngineConfig::default() });
    let tree = |src: &str| json!({"tag": "div", "children": [{"tag": "image", "props": {"src": src}}]});

    let root = submit(&mut engine, tree("a.png"));
    let image = child(&engine, root, 0);
    submit(&mut engine, tree("b.png"));
    assert_eq!(child(&engine, root, 0), image);

    drain_images(&mut engine);
    let slot = &engine.tree().widget(image).unwrap().state().image;
    assert_eq!(slot.source.as_deref(), Some("b.png"));
    assert_eq!(slot.generation, 2);
    assert_eq!(slot.bitmap.as_ref().map(|b| b.width), Some(3));

    // a.png 已在缓存中
    submit(&mut engine, tree("a.png"));
    let slot = &engine.tree().widget(image).unwrap().state().image;
    assert_eq!(slot.bitmap.as_ref().map(|b| b.width), Some(2));
    assert_eq!(engine.images().in_flight(), 0);
}

/// 测试图片控件在加载完成前被移除
#[test]
fn test_image_result_for_removed_widget_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.png"), png_bytes(2, 2)).unwrap();
    let mut engine = Engine::new(EngineConfig { asset_root: dir.path().to_path_buf(), ..EngineConfig::default() });

    let root = submit(&mut engine, json!({"tag": "div", "children": [{"tag": "image", "props": {"src": "a.png"}}]}));
    let image = child(&engine, root, 0);
    submit(&mut engine, json!({"tag": "div"}));
    assert!(!engine.tree().contains(image));

    drain_images(&mut engine);
    assert_eq!(engine.images().in_flight(), 0);
    assert_eq!(engine.tree().children(root).unwrap().len(), 0);
}
