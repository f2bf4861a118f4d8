//! Modifier pipeline.
//!
//! Modifiers transform a value inside an expression: `{$name|upper}`,
//! `{$text|truncate:30:'...'}`. The registry ships the common built-ins
//! and accepts user registrations under any name; an unknown modifier at
//! render time is a fatal error raised by the evaluator.

use crate::error::Result;
use crate::runtime::value::{count, stringify, truthy};
use serde_json::Value;
use std::collections::HashMap;

pub type ModifierFn = Box<dyn Fn(Value, &[Value]) -> Result<Value> + Send + Sync>;

pub struct ModifierRegistry {
    entries: HashMap<String, ModifierFn>,
}

impl ModifierRegistry {
    pub fn with_builtins() -> Self {
        let mut registry = ModifierRegistry {
            entries: HashMap::new(),
        };
        registry.register("upper", |value, _| {
            Ok(Value::String(stringify(&value).to_uppercase()))
        });
        registry.register("lower", |value, _| {
            Ok(Value::String(stringify(&value).to_lowercase()))
        });
        registry.register("capitalize", |value, _| {
            Ok(Value::String(capitalize(&stringify(&value))))
        });
        registry.register("default", |value, args| {
            if truthy(&value) {
                Ok(value)
            } else {
                Ok(args.first().cloned().unwrap_or(Value::String(String::new())))
            }
        });
        registry.register("escape", |value, args| {
            let mode = args.first().map(stringify).unwrap_or_default();
            Ok(Value::String(escape(&stringify(&value), &mode)))
        });
        registry.register("count", |value, _| Ok(Value::from(count(&value) as i64)));
        registry.register("nl2br", |value, _| {
            Ok(Value::String(stringify(&value).replace('\n', "<br />\n")))
        });
        registry.register("cat", |value, args| {
            let mut out = stringify(&value);
            for arg in args {
                out.push_str(&stringify(arg));
            }
            Ok(Value::String(out))
        });
        registry.register("replace", |value, args| {
            let search = args.first().map(stringify).unwrap_or_default();
            let replace = args.get(1).map(stringify).unwrap_or_default();
            if search.is_empty() {
                return Ok(value);
            }
            Ok(Value::String(stringify(&value).replace(&search, &replace)))
        });
        registry.register("truncate", |value, args| {
            let text = stringify(&value);
            let length = args
                .first()
                .and_then(|a| crate::runtime::value::as_integer(a))
                .unwrap_or(80)
                .max(0) as usize;
            let etc = args.get(1).map(stringify).unwrap_or_else(|| "...".to_string());
            let break_words = args.get(2).map(truthy).unwrap_or(false);
            Ok(Value::String(truncate(&text, length, &etc, break_words)))
        });
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    ) {
        self.entries.insert(name.into(), Box::new(f));
    }

    pub fn get(&self, name: &str) -> Option<&ModifierFn> {
        self.entries.get(name)
    }
}

fn capitalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if at_word_start {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = ch.is_whitespace();
    }
    out
}

fn escape(text: &str, mode: &str) -> String {
    match mode {
        "" | "html" => {
            let mut out = String::with_capacity(text.len());
            for ch in text.chars() {
                match ch {
                    '&' => out.push_str("&amp;"),
                    '<' => out.push_str("&lt;"),
                    '>' => out.push_str("&gt;"),
                    '"' => out.push_str("&quot;"),
                    '\'' => out.push_str("&#039;"),
                    other => out.push(other),
                }
            }
            out
        }
        "url" => {
            let mut out = String::with_capacity(text.len());
            for byte in text.bytes() {
                match byte {
                    b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                        out.push(byte as char)
                    }
                    other => out.push_str(&format!("%{:02X}", other)),
                }
            }
            out
        }
        "quotes" => text.replace('\'', "\\'"),
        // unknown escape modes pass the text through unchanged
        _ => text.to_string(),
    }
}

fn truncate(text: &str, length: usize, etc: &str, break_words: bool) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= length {
        return text.to_string();
    }
    let etc_len = etc.chars().count().min(length);
    let keep = length - etc_len;
    let mut cut: String = chars[..keep].iter().collect();
    if !break_words {
        if let Some(pos) = cut.rfind(char::is_whitespace) {
            cut.truncate(pos);
        }
    }
    cut.push_str(etc);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn apply(name: &str, value: Value, args: &[Value]) -> Value {
        let registry = ModifierRegistry::with_builtins();
        registry.get(name).expect("builtin missing")(value, args).expect("modifier failure")
    }

    #[test]
    fn case_modifiers() {
        assert_eq!(apply("upper", json!("abc"), &[]), json!("ABC"));
        assert_eq!(apply("lower", json!("AbC"), &[]), json!("abc"));
        assert_eq!(
            apply("capitalize", json!("hello wide world"), &[]),
            json!("Hello Wide World")
        );
    }

    #[test]
    fn default_replaces_falsy_values() {
        assert_eq!(apply("default", json!(""), &[json!("n/a")]), json!("n/a"));
        assert_eq!(apply("default", json!("x"), &[json!("n/a")]), json!("x"));
        assert_eq!(apply("default", Value::Null, &[json!(0)]), json!(0));
    }

    #[test]
    fn escape_html_and_url() {
        assert_eq!(
            apply("escape", json!("<a href=\"x\">"), &[]),
            json!("&lt;a href=&quot;x&quot;&gt;")
        );
        assert_eq!(
            apply("escape", json!("a b&c"), &[json!("url")]),
            json!("a%20b%26c")
        );
    }

    #[test]
    fn count_handles_collections_and_strings() {
        assert_eq!(apply("count", json!([1, 2, 3]), &[]), json!(3));
        assert_eq!(apply("count", json!({"a": 1}), &[]), json!(1));
        assert_eq!(apply("count", json!("abcd"), &[]), json!(4));
    }

    #[test]
    fn truncate_respects_word_boundaries() {
        let text = json!("the quick brown fox jumped");
        assert_eq!(
            apply("truncate", text.clone(), &[json!(15)]),
            json!("the quick...")
        );
        assert_eq!(
            apply("truncate", text, &[json!(15), json!("~"), json!(true)]),
            json!("the quick brow~")
        );
    }

    #[test]
    fn user_registration_overrides_builtin() {
        let mut registry = ModifierRegistry::with_builtins();
        registry.register("upper", |_, _| Ok(json!("custom")));
        let out = registry.get("upper").unwrap()(json!("x"), &[]).unwrap();
        assert_eq!(out, json!("custom"));
    }
}
