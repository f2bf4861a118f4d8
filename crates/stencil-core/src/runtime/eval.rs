//! Expression evaluation.
//!
//! Evaluates the expression AST against the scope stack. Arithmetic is
//! numeric with integer collapse, comparisons are loose unless the
//! identity operators are used, and `$smarty.*` specials read engine
//! state (delimiters, time, captures, loop properties).

use crate::config::EngineConfig;
use crate::error::{Result, StencilError};
use crate::parser::{Accessor, BinaryOp, Expr, Literal, UnaryOp};
use crate::runtime::modifiers::ModifierRegistry;
use crate::runtime::scope::Scopes;
use crate::runtime::value::{
    as_integer, as_number, compare, loose_eq, number, strict_eq, stringify, truthy,
};
use serde_json::Value;
use std::cmp::Ordering;

pub struct EvalEnv<'r> {
    pub config: &'r EngineConfig,
    pub scopes: &'r Scopes,
    pub modifiers: &'r ModifierRegistry,
}

impl EvalEnv<'_> {
    pub fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(lit) => Ok(literal_value(lit)),
            Expr::Var { name, path } => self.eval_var(name, path),
            Expr::Special { path } => self.eval_special(path),
            Expr::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    out.push_str(&stringify(&self.eval(part)?));
                }
                Ok(Value::String(out))
            }
            Expr::Unary { op, expr } => {
                let value = self.eval(expr)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                    UnaryOp::Neg => {
                        let n = as_number(&value).ok_or_else(|| {
                            StencilError::RenderType("cannot negate a non-numeric value".to_string())
                        })?;
                        Ok(number(-n))
                    }
                }
            }
            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs),
            Expr::DivBy { lhs, rhs, negated } => {
                let dividend = self.int_operand(lhs, "is div by")?;
                let divisor = self.int_operand(rhs, "is div by")?;
                if divisor == 0 {
                    return Err(StencilError::RenderType(
                        "'is div by' divisor is zero".to_string(),
                    ));
                }
                Ok(Value::Bool((dividend % divisor == 0) != *negated))
            }
            Expr::Parity {
                expr,
                even,
                negated,
                by,
            } => {
                let mut n = self.int_operand(expr, "parity test")?;
                if let Some(by) = by {
                    let step = self.int_operand(by, "parity test")?;
                    if step == 0 {
                        return Err(StencilError::RenderType(
                            "parity divisor is zero".to_string(),
                        ));
                    }
                    n /= step;
                }
                let is_even = n % 2 == 0;
                Ok(Value::Bool((is_even == *even) != *negated))
            }
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                if truthy(&self.eval(cond)?) {
                    self.eval(then_expr)
                } else {
                    self.eval(else_expr)
                }
            }
            Expr::Modifier { input, name, args } => {
                let value = self.eval(input)?;
                let mut evaled = Vec::with_capacity(args.len());
                for arg in args {
                    evaled.push(self.eval(arg)?);
                }
                let f = self
                    .modifiers
                    .get(name)
                    .ok_or_else(|| StencilError::RenderUndefinedModifier(name.clone()))?;
                f(value, &evaled)
            }
            Expr::ArrayLit(entries) => self.eval_array(entries),
        }
    }

    fn eval_var(&self, name: &str, path: &[Accessor]) -> Result<Value> {
        let mut current = match self.scopes.get(name) {
            Some(value) => value.clone(),
            None if self.config.error_on_unassigned => {
                return Err(StencilError::RenderUnassignedVar(name.to_string()))
            }
            None => Value::Null,
        };
        for accessor in path {
            current = match accessor {
                Accessor::Key(key) => index_value(&current, &Value::String(key.clone()), self),
                Accessor::Index(expr) => {
                    let idx = self.eval(expr)?;
                    index_value(&current, &idx, self)
                }
                Accessor::Prop(prop) => self
                    .scopes
                    .loop_props(name)
                    .and_then(|props| props.get(prop))
                    .unwrap_or(Value::Null),
            };
        }
        Ok(current)
    }

    fn eval_special(&self, path: &[String]) -> Result<Value> {
        let head = path.first().map(String::as_str).unwrap_or("");
        match (head, path.get(1), path.get(2)) {
            ("now", _, _) => Ok(Value::from(chrono::Utc::now().timestamp())),
            ("ldelim", _, _) => Ok(Value::String(self.config.left_delimiter.clone())),
            ("rdelim", _, _) => Ok(Value::String(self.config.right_delimiter.clone())),
            ("capture", Some(name), _) => Ok(self
                .scopes
                .capture(name)
                .map(|text| Value::String(text.to_string()))
                .unwrap_or(Value::Null)),
            ("foreach", Some(name), Some(prop)) => Ok(self
                .scopes
                .loop_props(name)
                .and_then(|props| props.get(prop))
                .unwrap_or(Value::Null)),
            ("section", Some(name), Some(prop)) => Ok(self
                .scopes
                .section_props(name)
                .and_then(|props| props.get(prop))
                .unwrap_or(Value::Null)),
            _ => Ok(Value::Null),
        }
    }

    fn eval_binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value> {
        // short-circuit logic before evaluating the right side
        match op {
            BinaryOp::And => {
                return Ok(Value::Bool(
                    truthy(&self.eval(lhs)?) && truthy(&self.eval(rhs)?),
                ))
            }
            BinaryOp::Or => {
                return Ok(Value::Bool(
                    truthy(&self.eval(lhs)?) || truthy(&self.eval(rhs)?),
                ))
            }
            _ => {}
        }
        let left = self.eval(lhs)?;
        let right = self.eval(rhs)?;
        match op {
            BinaryOp::Eq => Ok(Value::Bool(loose_eq(&left, &right))),
            BinaryOp::Ne => Ok(Value::Bool(!loose_eq(&left, &right))),
            BinaryOp::Identity => Ok(Value::Bool(strict_eq(&left, &right))),
            BinaryOp::NonIdentity => Ok(Value::Bool(!strict_eq(&left, &right))),
            BinaryOp::Gt => Ok(Value::Bool(compare(&left, &right) == Ordering::Greater)),
            BinaryOp::Lt => Ok(Value::Bool(compare(&left, &right) == Ordering::Less)),
            BinaryOp::Ge => Ok(Value::Bool(compare(&left, &right) != Ordering::Less)),
            BinaryOp::Le => Ok(Value::Bool(compare(&left, &right) != Ordering::Greater)),
            BinaryOp::Xor => Ok(Value::Bool(truthy(&left) ^ truthy(&right))),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                let a = numeric(&left)?;
                let b = numeric(&right)?;
                let result = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => {
                        if b == 0.0 {
                            return Err(StencilError::RenderType(
                                "division by zero".to_string(),
                            ));
                        }
                        a / b
                    }
                    _ => unreachable!(),
                };
                Ok(number(result))
            }
            BinaryOp::Mod => {
                let a = as_integer(&left).ok_or_else(|| non_numeric("modulo"))?;
                let b = as_integer(&right).ok_or_else(|| non_numeric("modulo"))?;
                if b == 0 {
                    return Err(StencilError::RenderType("modulo by zero".to_string()));
                }
                Ok(Value::from(a % b))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn eval_array(&self, entries: &[(Option<Expr>, Expr)]) -> Result<Value> {
        let keyed = entries.iter().any(|(key, _)| key.is_some());
        if !keyed {
            let mut items = Vec::with_capacity(entries.len());
            for (_, value) in entries {
                items.push(self.eval(value)?);
            }
            return Ok(Value::Array(items));
        }
        let mut map = serde_json::Map::new();
        let mut auto_index = 0i64;
        for (key, value) in entries {
            let key = match key {
                Some(expr) => stringify(&self.eval(expr)?),
                None => {
                    let k = auto_index.to_string();
                    auto_index += 1;
                    k
                }
            };
            map.insert(key, self.eval(value)?);
        }
        Ok(Value::Object(map))
    }

    fn int_operand(&self, expr: &Expr, context: &str) -> Result<i64> {
        let value = self.eval(expr)?;
        as_integer(&value).ok_or_else(|| non_numeric(context))
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::from(*i),
        Literal::Float(f) => number(*f),
        Literal::Str(s) => Value::String(s.clone()),
    }
}

fn numeric(value: &Value) -> Result<f64> {
    as_number(value).ok_or_else(|| non_numeric("arithmetic"))
}

fn non_numeric(context: &str) -> StencilError {
    StencilError::RenderType(format!("non-numeric operand in {}", context))
}

/// Member/index access on a value. A string index into an array resolves
/// through an active `{section}` of that name, so `$arr[idx]` inside
/// `{section name=idx ...}` reads the current row.
fn index_value(base: &Value, index: &Value, env: &EvalEnv) -> Value {
    match base {
        Value::Object(map) => map.get(&stringify(index)).cloned().unwrap_or(Value::Null),
        Value::Array(items) => {
            let idx = match index {
                Value::String(name) => match env.scopes.section_props(name) {
                    Some(props) => Some(props.index),
                    None => as_integer(index),
                },
                other => as_integer(other),
            };
            idx.and_then(|i| usize::try_from(i).ok())
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::{parse_expr, TokenCursor};
    use serde_json::json;

    fn eval_str(expr_text: &str, scopes: &Scopes) -> Result<Value> {
        let config = EngineConfig::new("templates", "compiled", "cache");
        let template = format!("{{{}}}", expr_text);
        let mut lexer = Lexer::new(&template, &config);
        let mut tokens = Vec::new();
        loop {
            match lexer.next_token().expect("lex failure") {
                Some(token) => tokens.push(token),
                None => break,
            }
        }
        // strip the surrounding delimiters
        let body = &tokens[1..tokens.len() - 1];
        let mut cursor = TokenCursor::new(body, 1);
        let expr = parse_expr(&mut cursor).expect("parse failure");
        let modifiers = ModifierRegistry::with_builtins();
        let env = EvalEnv {
            config: &config,
            scopes,
            modifiers: &modifiers,
        };
        env.eval(&expr)
    }

    fn ok(expr_text: &str, scopes: &Scopes) -> Value {
        eval_str(expr_text, scopes).expect("eval failure")
    }

    #[test]
    fn arithmetic_collapses_to_integers() {
        let scopes = Scopes::new();
        assert_eq!(ok("2 + 3 * 4", &scopes), json!(14));
        assert_eq!(ok("7 / 2", &scopes), json!(3.5));
        assert_eq!(ok("10 mod 3", &scopes), json!(1));
        assert_eq!(ok("-5 + 1", &scopes), json!(-4));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let scopes = Scopes::new();
        assert!(matches!(
            eval_str("1 / 0", &scopes),
            Err(StencilError::RenderType(_))
        ));
    }

    #[test]
    fn variable_paths_walk_members_and_indexes() {
        let mut scopes = Scopes::new();
        scopes.set("user", json!({"name": "ada", "tags": ["a", "b"]}));
        assert_eq!(ok("$user.name", &scopes), json!("ada"));
        assert_eq!(ok("$user.tags[1]", &scopes), json!("b"));
        assert_eq!(ok("$user.missing", &scopes), Value::Null);
    }

    #[test]
    fn unassigned_is_null_unless_strict() {
        let scopes = Scopes::new();
        assert_eq!(ok("$nope", &scopes), Value::Null);

        let mut config = EngineConfig::new("t", "c", "k");
        config.error_on_unassigned = true;
        let modifiers = ModifierRegistry::with_builtins();
        let env = EvalEnv {
            config: &config,
            scopes: &scopes,
            modifiers: &modifiers,
        };
        let expr = Expr::Var {
            name: "nope".to_string(),
            path: vec![],
        };
        assert!(matches!(
            env.eval(&expr),
            Err(StencilError::RenderUnassignedVar(_))
        ));
    }

    #[test]
    fn loose_and_strict_equality_differ() {
        let mut scopes = Scopes::new();
        scopes.set("n", json!("1"));
        assert_eq!(ok("$n == 1", &scopes), json!(true));
        assert_eq!(ok("$n === 1", &scopes), json!(false));
        assert_eq!(ok("$n !== 1", &scopes), json!(true));
    }

    #[test]
    fn word_operators_and_parity() {
        let mut scopes = Scopes::new();
        scopes.set("i", json!(6));
        assert_eq!(ok("$i is even", &scopes), json!(true));
        assert_eq!(ok("$i is odd", &scopes), json!(false));
        assert_eq!(ok("$i is div by 3", &scopes), json!(true));
        assert_eq!(ok("$i is not div by 4", &scopes), json!(true));
        assert_eq!(ok("$i gt 5 and $i le 6", &scopes), json!(true));
    }

    #[test]
    fn ternary_and_concat() {
        let mut scopes = Scopes::new();
        scopes.set("name", json!("ada"));
        assert_eq!(ok("$name ? 'yes' : 'no'", &scopes), json!("yes"));
        assert_eq!(ok("\"hi $name\"", &scopes), json!("hi ada"));
    }

    #[test]
    fn modifier_pipeline_applies_left_to_right() {
        let mut scopes = Scopes::new();
        scopes.set("word", json!("hello"));
        assert_eq!(ok("$word|upper", &scopes), json!("HELLO"));
        assert_eq!(ok("$missing|default:'fallback'|upper", &scopes), json!("FALLBACK"));
        assert!(matches!(
            eval_str("$word|no_such_modifier", &scopes),
            Err(StencilError::RenderUndefinedModifier(_))
        ));
    }

    #[test]
    fn specials_read_engine_state() {
        let mut scopes = Scopes::new();
        scopes.set_capture("head", "captured".to_string());
        assert_eq!(ok("$smarty.ldelim", &scopes), json!("{"));
        assert_eq!(ok("$smarty.capture.head", &scopes), json!("captured"));
        let now = ok("$smarty.now", &scopes);
        assert!(as_integer(&now).unwrap() > 1_500_000_000);
    }

    #[test]
    fn array_literals_build_arrays_and_maps() {
        let scopes = Scopes::new();
        assert_eq!(ok("[1, 2, 3]", &scopes), json!([1, 2, 3]));
        assert_eq!(ok("['a' => 1, 'b' => 2]", &scopes), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn section_index_resolves_bare_array_subscripts() {
        let mut scopes = Scopes::new();
        scopes.set("rows", json!(["zero", "one", "two"]));
        scopes.set_section(
            "i",
            crate::runtime::scope::LoopProps {
                index: 2,
                iteration: 3,
                first: false,
                last: true,
                total: 3,
                show: true,
            },
        );
        assert_eq!(ok("$rows[i]", &scopes), json!("two"));
    }
}
