//! 单元测试模块
//! 覆盖节点解析、样式解析、协调引擎、图片、事件、动画、布局与脚本桥接

pub mod bridge_tests;
pub mod engine_tests;
