//! Compiled template representation.
//!
//! Compilation lowers a template to a tree of [`Op`] nodes instead of
//! generated source text. The tree is serialized into the compiled artifact
//! and interpreted at render time, so a template compiles once and renders
//! many times without re-lexing.

use crate::parser::Expr;
use serde::{Deserialize, Serialize};

/// Sentinel markers bracketing nocache fragments in rendered output.
///
/// A full marker pair is `/*%%StencilNocache:<hash>:<unit>%%*/` ...
/// `/*/%%StencilNocache:<hash>:<unit>%%*/` where `<hash>` is the compile
/// pass's nocache hash and `<unit>` the nocache unit id. The hash keeps
/// literal template text that happens to contain marker-like substrings
/// from being mistaken for a marker emitted by this compile pass.
pub mod markers {
    pub const OPEN_PREFIX: &str = "/*%%StencilNocache:";
    pub const CLOSE_PREFIX: &str = "/*/%%StencilNocache:";
    pub const END: &str = "%%*/";

    pub fn open(hash: &str, unit: usize) -> String {
        format!("{}{}:{}{}", OPEN_PREFIX, hash, unit, END)
    }

    pub fn close(hash: &str, unit: usize) -> String {
        format!("{}{}:{}{}", CLOSE_PREFIX, hash, unit, END)
    }
}

/// Scope an assignment lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignScope {
    #[default]
    Local,
    Parent,
    Root,
}

/// A `{function}` definition hoisted out of the op stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    /// Parameter defaults; call-site attributes override them.
    pub params: Vec<(String, Expr)>,
    pub body: Vec<Op>,
    pub nocache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Verbatim template text.
    Text(String),
    /// Zero-width separator keeping adjacent text runs from coalescing
    /// where the junction would spell an output marker.
    Sep,
    /// Evaluate and print an expression.
    Emit { expr: Expr, line: usize },
    Assign {
        var: String,
        value: Expr,
        scope: AssignScope,
    },
    /// Append to a variable, promoting scalars to arrays.
    Append {
        var: String,
        value: Expr,
        index: Option<Expr>,
    },
    If {
        branches: Vec<(Expr, Vec<Op>)>,
        otherwise: Vec<Op>,
    },
    While {
        cond: Expr,
        body: Vec<Op>,
    },
    /// `{for $i=start to end step n}`
    ForRange {
        var: String,
        start: Expr,
        end: Expr,
        step: Option<Expr>,
        body: Vec<Op>,
        else_body: Vec<Op>,
    },
    Foreach {
        from: Expr,
        item: String,
        key: Option<String>,
        /// `name=` attribute exposing `$smarty.foreach.<name>.*`.
        name: Option<String>,
        body: Vec<Op>,
        else_body: Vec<Op>,
    },
    Section {
        name: String,
        from: Expr,
        start: Option<Expr>,
        step: Option<Expr>,
        max: Option<Expr>,
        body: Vec<Op>,
        else_body: Vec<Op>,
    },
    /// Buffer body output into a named capture instead of the stream.
    Capture {
        name: Expr,
        assign: Option<String>,
        append: Option<String>,
        body: Vec<Op>,
    },
    /// Render a sub-template at this point.
    Include {
        target: Expr,
        vars: Vec<(String, Expr)>,
        /// Capture the sub-template output into a variable instead of
        /// printing it.
        assign: Option<String>,
        line: usize,
    },
    /// Invoke a `{function}` definition.
    CallFunction {
        name: String,
        args: Vec<(String, Expr)>,
        assign: Option<String>,
        line: usize,
    },
    /// Invoke a registered function plugin.
    CallPlugin {
        name: String,
        args: Vec<(String, Expr)>,
        line: usize,
    },
    /// Invoke a registered block plugin over its rendered body.
    BlockPlugin {
        name: String,
        args: Vec<(String, Expr)>,
        body: Vec<Op>,
        line: usize,
    },
    /// Body must re-evaluate on every request even when the page is cached.
    Nocache { body: Vec<Op> },
}

impl Op {
    /// Whether any op in the tree forces per-request evaluation.
    pub fn has_nocache(ops: &[Op]) -> bool {
        ops.iter().any(|op| match op {
            Op::Nocache { .. } => true,
            Op::If {
                branches,
                otherwise,
            } => {
                branches.iter().any(|(_, body)| Op::has_nocache(body))
                    || Op::has_nocache(otherwise)
            }
            Op::While { body, .. } => Op::has_nocache(body),
            Op::ForRange {
                body, else_body, ..
            }
            | Op::Foreach {
                body, else_body, ..
            }
            | Op::Section {
                body, else_body, ..
            } => Op::has_nocache(body) || Op::has_nocache(else_body),
            Op::Capture { body, .. } | Op::BlockPlugin { body, .. } => Op::has_nocache(body),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Expr, Literal};

    #[test]
    fn nocache_detection_descends_into_branches() {
        let ops = vec![Op::If {
            branches: vec![(
                Expr::Literal(Literal::Bool(true)),
                vec![Op::Nocache {
                    body: vec![Op::Text("x".to_string())],
                }],
            )],
            otherwise: vec![],
        }];
        assert!(Op::has_nocache(&ops));
        assert!(!Op::has_nocache(&[Op::Text("y".to_string())]));
    }

    #[test]
    fn ops_round_trip_through_json() {
        let ops = vec![
            Op::Text("hello ".to_string()),
            Op::Emit {
                expr: Expr::Var {
                    name: "name".to_string(),
                    path: vec![],
                },
                line: 1,
            },
        ];
        let json = serde_json::to_string(&ops).expect("serialize failure");
        let back: Vec<Op> = serde_json::from_str(&json).expect("deserialize failure");
        assert_eq!(back, ops);
    }
}
