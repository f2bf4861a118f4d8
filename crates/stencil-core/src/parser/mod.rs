//! Tag parsing
//!
//! The lexer hands the compiler the tokens between a tag open and its
//! matching close delimiter. This module classifies that token run as a
//! print tag, a named tag call or a closing tag. Named tags keep their raw
//! body tokens; each tag compiler owns its body grammar (an expression for
//! `{if}`, an attribute list for `{include}`, both for `{foreach}`).

pub mod attrs;
pub mod expr;

#[cfg(test)]
mod tests;

pub use attrs::{parse_attrs, validate_attrs, Attr, AttrSpec, ValidatedAttrs};
pub use expr::{
    parse_expr, Accessor, BinaryOp, Expr, Literal, TokenCursor, UnaryOp,
};

use crate::error::{Result, StencilError};
use crate::lexer::{Token, TokenKind};

#[derive(Debug)]
pub enum ParsedTag {
    /// `{$expr|mods attr=...}` output tag.
    Print {
        expr: Expr,
        attrs: Vec<Attr>,
        line: usize,
    },
    /// `{name ...}` tag call, body tokens left for the tag compiler.
    Call {
        name: String,
        line: usize,
        body: Vec<Token>,
    },
    /// `{/name}` closing tag.
    Close { name: String, line: usize },
}

/// Classify the token run of one tag. `closing` is set when the tag opened
/// with `{/`.
pub fn parse_tag(tokens: Vec<Token>, line: usize, closing: bool) -> Result<ParsedTag> {
    if closing {
        let mut cursor = TokenCursor::new(&tokens, line);
        let name = match cursor.next().map(|t| &t.kind) {
            Some(TokenKind::Ident(name)) => name.clone(),
            _ => return Err(cursor.unexpected("tag name")),
        };
        if !cursor.at_end() {
            return Err(cursor.unexpected("tag close"));
        }
        return Ok(ParsedTag::Close { name, line });
    }
    match tokens.first().map(|t| &t.kind) {
        Some(TokenKind::Ident(name)) => {
            let name = name.clone();
            Ok(ParsedTag::Call {
                name,
                line,
                body: tokens[1..].to_vec(),
            })
        }
        Some(_) => {
            let mut cursor = TokenCursor::new(&tokens, line);
            let expr = parse_expr(&mut cursor)?;
            let attrs = parse_attrs(&mut cursor)?;
            Ok(ParsedTag::Print { expr, attrs, line })
        }
        None => Err(StencilError::ParseSyntax {
            line,
            message: "empty tag".to_string(),
        }),
    }
}
