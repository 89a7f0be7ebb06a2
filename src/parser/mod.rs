//! 节点树解析

pub mod node;

pub use node::{value_as_string, ElementKind, Node, PropMap};
