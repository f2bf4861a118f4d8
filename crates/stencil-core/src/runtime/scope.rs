//! Variable scopes.
//!
//! A render holds a stack of scope frames: the root frame carries the
//! variables assigned through the template API, and every include or
//! function call pushes a child frame. Lookup walks from the innermost
//! frame outwards. Assignments land per [`AssignScope`]. Variables
//! assigned inside a nocache region are tainted so later reads of them
//! re-evaluate on every request even when the page is cached.

use crate::ir::AssignScope;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Loop bookkeeping exposed through `$smarty.foreach.<name>.*` and
/// `$item@prop` accessors.
#[derive(Debug, Clone, Default)]
pub struct LoopProps {
    pub index: i64,
    pub iteration: i64,
    pub first: bool,
    pub last: bool,
    pub total: i64,
    pub show: bool,
}

impl LoopProps {
    pub fn get(&self, prop: &str) -> Option<Value> {
        match prop {
            "index" => Some(Value::from(self.index)),
            "iteration" => Some(Value::from(self.iteration)),
            "rownum" => Some(Value::from(self.iteration)),
            "first" => Some(Value::Bool(self.first)),
            "last" => Some(Value::Bool(self.last)),
            "total" => Some(Value::from(self.total)),
            "show" => Some(Value::Bool(self.show)),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Scopes {
    frames: Vec<HashMap<String, Value>>,
    captures: HashMap<String, String>,
    /// Foreach props, keyed by both the `name=` attribute and the item
    /// variable name; section props by section name.
    loops: HashMap<String, LoopProps>,
    sections: HashMap<String, LoopProps>,
    tainted: HashSet<String>,
}

impl Scopes {
    pub fn new() -> Self {
        Scopes {
            frames: vec![HashMap::new()],
            ..Scopes::default()
        }
    }

    /// Root scope seeded with assigned variables.
    pub fn with_root(vars: HashMap<String, Value>) -> Self {
        Scopes {
            frames: vec![vars],
            ..Scopes::default()
        }
    }

    pub fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Innermost binding wins.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Set in the current frame.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value);
        }
    }

    pub fn assign(&mut self, name: &str, value: Value, scope: AssignScope) {
        let index = match scope {
            AssignScope::Local => self.frames.len() - 1,
            AssignScope::Parent => self.frames.len().saturating_sub(2),
            AssignScope::Root => 0,
        };
        self.frames[index].insert(name.to_string(), value);
    }

    /// Append to a variable, promoting non-arrays to a one-element array
    /// first. With an index the target is treated as an object key.
    pub fn append(&mut self, name: &str, value: Value, index: Option<String>) {
        let current = self.get(name).cloned();
        let next = match index {
            Some(key) => {
                let mut map = match current {
                    Some(Value::Object(map)) => map,
                    _ => serde_json::Map::new(),
                };
                map.insert(key, value);
                Value::Object(map)
            }
            None => {
                let mut items = match current {
                    Some(Value::Array(items)) => items,
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => vec![other],
                };
                items.push(value);
                Value::Array(items)
            }
        };
        self.set(name, next);
    }

    pub fn taint(&mut self, name: &str) {
        self.tainted.insert(name.to_string());
    }

    pub fn is_tainted(&self, name: &str) -> bool {
        self.tainted.contains(name)
    }

    pub fn set_capture(&mut self, name: impl Into<String>, text: String) {
        self.captures.insert(name.into(), text);
    }

    pub fn capture(&self, name: &str) -> Option<&str> {
        self.captures.get(name).map(String::as_str)
    }

    pub fn set_loop(&mut self, name: impl Into<String>, props: LoopProps) {
        self.loops.insert(name.into(), props);
    }

    pub fn loop_props(&self, name: &str) -> Option<&LoopProps> {
        self.loops.get(name)
    }

    pub fn set_section(&mut self, name: impl Into<String>, props: LoopProps) {
        self.sections.insert(name.into(), props);
    }

    pub fn section_props(&self, name: &str) -> Option<&LoopProps> {
        self.sections.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inner_frame_shadows_outer() {
        let mut scopes = Scopes::new();
        scopes.set("x", json!(1));
        scopes.push_frame();
        assert_eq!(scopes.get("x"), Some(&json!(1)));
        scopes.set("x", json!(2));
        assert_eq!(scopes.get("x"), Some(&json!(2)));
        scopes.pop_frame();
        assert_eq!(scopes.get("x"), Some(&json!(1)));
    }

    #[test]
    fn assign_scopes_target_the_right_frame() {
        let mut scopes = Scopes::new();
        scopes.push_frame();
        scopes.push_frame();
        scopes.assign("a", json!("local"), AssignScope::Local);
        scopes.assign("b", json!("parent"), AssignScope::Parent);
        scopes.assign("c", json!("root"), AssignScope::Root);
        scopes.pop_frame();
        assert_eq!(scopes.get("a"), None);
        assert_eq!(scopes.get("b"), Some(&json!("parent")));
        scopes.pop_frame();
        assert_eq!(scopes.get("b"), None);
        assert_eq!(scopes.get("c"), Some(&json!("root")));
    }

    #[test]
    fn append_promotes_scalars() {
        let mut scopes = Scopes::new();
        scopes.set("list", json!("first"));
        scopes.append("list", json!("second"), None);
        assert_eq!(scopes.get("list"), Some(&json!(["first", "second"])));
        scopes.append("map", json!(10), Some("k".to_string()));
        assert_eq!(scopes.get("map"), Some(&json!({"k": 10})));
    }

    #[test]
    fn root_frame_is_never_popped() {
        let mut scopes = Scopes::new();
        scopes.set("keep", json!(true));
        scopes.pop_frame();
        assert_eq!(scopes.get("keep"), Some(&json!(true)));
    }
}
