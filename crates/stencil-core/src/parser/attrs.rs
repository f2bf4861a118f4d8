//! Tag attribute lists and their validation.
//!
//! Attributes are `name=value` pairs after the tag name, plus bare option
//! flags such as `nocache`. Each tag compiler declares which names are
//! required, optional and flag-like; anything else is rejected unless the
//! tag accepts arbitrary pass-through attributes.

use crate::error::{Result, StencilError};
use crate::lexer::TokenKind;
use crate::parser::expr::{parse_expr, Expr, Literal, TokenCursor};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub name: String,
    pub value: Expr,
    /// True when the attribute appeared bare (`{include file=... nocache}`).
    pub bare: bool,
    pub line: usize,
}

/// Parse the attribute list occupying the rest of a tag.
pub fn parse_attrs(cursor: &mut TokenCursor) -> Result<Vec<Attr>> {
    let mut attrs = Vec::new();
    while !cursor.at_end() {
        let line = cursor.line();
        let name = match cursor.peek() {
            Some(TokenKind::Ident(name)) => name.clone(),
            _ => return Err(cursor.unexpected("attribute name")),
        };
        cursor.next();
        if cursor.eat(&TokenKind::Equal) {
            let value = parse_expr(cursor)?;
            attrs.push(Attr {
                name,
                value,
                bare: false,
                line,
            });
        } else {
            attrs.push(Attr {
                name,
                value: Expr::Literal(Literal::Bool(true)),
                bare: true,
                line,
            });
        }
    }
    Ok(attrs)
}

/// Declared attribute shape for one tag compiler.
#[derive(Debug, Clone, Copy)]
pub struct AttrSpec {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
    /// Boolean option flags. `nocache` is a flag on every tag that caches.
    pub flags: &'static [&'static str],
    /// Accept attributes outside the declared lists (passed through to the
    /// tag, e.g. `{include}` extra variables).
    pub pass_through: bool,
}

impl AttrSpec {
    pub const fn new() -> Self {
        AttrSpec {
            required: &[],
            optional: &[],
            flags: &["nocache"],
            pass_through: false,
        }
    }
}

impl Default for AttrSpec {
    fn default() -> Self {
        AttrSpec::new()
    }
}

/// Attributes after validation against an [`AttrSpec`].
#[derive(Debug, Default)]
pub struct ValidatedAttrs {
    values: HashMap<String, Expr>,
    flags: HashMap<String, bool>,
    pub extra: Vec<(String, Expr)>,
}

impl ValidatedAttrs {
    pub fn get(&self, name: &str) -> Option<&Expr> {
        self.values.get(name)
    }

    pub fn take(&mut self, name: &str) -> Option<Expr> {
        self.values.remove(name)
    }

    pub fn require(&mut self, tag: &str, name: &str, line: usize) -> Result<Expr> {
        self.take(name).ok_or_else(|| StencilError::TagMissingAttr {
            tag: tag.to_string(),
            attr: name.to_string(),
            line,
        })
    }

    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }
}

pub fn validate_attrs(
    tag: &str,
    line: usize,
    attrs: Vec<Attr>,
    spec: &AttrSpec,
) -> Result<ValidatedAttrs> {
    let mut out = ValidatedAttrs::default();
    for attr in attrs {
        if spec.flags.contains(&attr.name.as_str()) {
            let value = flag_value(&attr).ok_or_else(|| StencilError::TagIllegalValue {
                tag: tag.to_string(),
                attr: attr.name.clone(),
                line: attr.line,
                reason: "expected a boolean".to_string(),
            })?;
            out.flags.insert(attr.name, value);
            continue;
        }
        if attr.bare {
            return Err(StencilError::TagUnexpectedAttr {
                tag: tag.to_string(),
                attr: attr.name,
                line: attr.line,
            });
        }
        let declared = spec.required.contains(&attr.name.as_str())
            || spec.optional.contains(&attr.name.as_str());
        if declared {
            out.values.insert(attr.name, attr.value);
        } else if spec.pass_through {
            out.extra.push((attr.name, attr.value));
        } else {
            return Err(StencilError::TagUnexpectedAttr {
                tag: tag.to_string(),
                attr: attr.name,
                line: attr.line,
            });
        }
    }
    for required in spec.required {
        if !out.values.contains_key(*required) {
            return Err(StencilError::TagMissingAttr {
                tag: tag.to_string(),
                attr: required.to_string(),
                line,
            });
        }
    }
    Ok(out)
}

/// Flags accept bare form plus the usual boolean spellings.
fn flag_value(attr: &Attr) -> Option<bool> {
    if attr.bare {
        return Some(true);
    }
    match &attr.value {
        Expr::Literal(Literal::Bool(value)) => Some(*value),
        Expr::Literal(Literal::Int(n)) => match n {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        },
        Expr::Literal(Literal::Str(text)) => match text.as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
