//! Expression AST and parser
//!
//! Expressions live inside tags: variable references with member/index
//! accessors, literals, quoted strings with embedded tags (reduced to a
//! concatenation), operators in symbol and word form, modifier pipelines,
//! ternaries and array literals.

use crate::error::{Result, StencilError};
use crate::lexer::{Token, TokenKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// One step of a variable access path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Accessor {
    /// `.name` member access
    Key(String),
    /// `[expr]` index access
    Index(Box<Expr>),
    /// `@prop` loop property access (`$item@index`)
    Prop(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    Ne,
    Identity,
    NonIdentity,
    Ge,
    Le,
    Gt,
    Lt,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    Var {
        name: String,
        path: Vec<Accessor>,
    },
    /// `$smarty.*` special accessor path.
    Special {
        path: Vec<String>,
    },
    Concat(Vec<Expr>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `is [not] div by` divisibility test.
    DivBy {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        negated: bool,
    },
    /// `is [not] even/odd [by]` parity test.
    Parity {
        expr: Box<Expr>,
        even: bool,
        negated: bool,
        by: Option<Box<Expr>>,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Modifier {
        input: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    /// `[a, b, 'k' => v]`
    ArrayLit(Vec<(Option<Expr>, Expr)>),
}

impl Expr {
    pub fn str(text: impl Into<String>) -> Expr {
        Expr::Literal(Literal::Str(text.into()))
    }

    /// Collect the names of all scope variables this expression reads.
    /// Used for implicit nocache taint detection at render time.
    pub fn collect_vars(&self, out: &mut Vec<String>) {
        match self {
            Expr::Literal(_) | Expr::Special { .. } => {}
            Expr::Var { name, path } => {
                out.push(name.clone());
                for accessor in path {
                    if let Accessor::Index(inner) = accessor {
                        inner.collect_vars(out);
                    }
                }
            }
            Expr::Concat(parts) => parts.iter().for_each(|p| p.collect_vars(out)),
            Expr::Unary { expr, .. } => expr.collect_vars(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_vars(out);
                rhs.collect_vars(out);
            }
            Expr::DivBy { lhs, rhs, .. } => {
                lhs.collect_vars(out);
                rhs.collect_vars(out);
            }
            Expr::Parity { expr, by, .. } => {
                expr.collect_vars(out);
                if let Some(by) = by {
                    by.collect_vars(out);
                }
            }
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                cond.collect_vars(out);
                then_expr.collect_vars(out);
                else_expr.collect_vars(out);
            }
            Expr::Modifier { input, args, .. } => {
                input.collect_vars(out);
                args.iter().for_each(|a| a.collect_vars(out));
            }
            Expr::ArrayLit(entries) => {
                for (key, value) in entries {
                    if let Some(key) = key {
                        key.collect_vars(out);
                    }
                    value.collect_vars(out);
                }
            }
        }
    }
}

/// Cursor over the token slice of a single tag.
pub struct TokenCursor<'t> {
    tokens: &'t [Token],
    pos: usize,
    line: usize,
}

impl<'t> TokenCursor<'t> {
    pub fn new(tokens: &'t [Token], line: usize) -> Self {
        TokenCursor {
            tokens,
            pos: 0,
            line,
        }
    }

    pub fn peek(&self) -> Option<&'t TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    pub fn peek_at(&self, offset: usize) -> Option<&'t TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    pub fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if let Some(token) = token {
            self.pos += 1;
            self.line = token.line;
        }
        token
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.line)
            .unwrap_or(self.line)
    }

    /// Consume the next token if it equals `kind`.
    pub fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    pub fn unexpected(&self, expected: &str) -> StencilError {
        let found = self
            .peek()
            .map(|k| k.describe())
            .unwrap_or_else(|| "end of tag".to_string());
        StencilError::ParseExpected {
            line: self.line(),
            found,
            expected: expected.to_string(),
        }
    }
}

/// Parse a full expression (ternary precedence level).
pub fn parse_expr(cursor: &mut TokenCursor) -> Result<Expr> {
    let cond = parse_or(cursor)?;
    if cursor.eat(&TokenKind::Qmark) {
        let then_expr = parse_expr(cursor)?;
        cursor.expect(&TokenKind::Colon, "':'")?;
        let else_expr = parse_expr(cursor)?;
        return Ok(Expr::Ternary {
            cond: Box::new(cond),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        });
    }
    Ok(cond)
}

fn parse_or(cursor: &mut TokenCursor) -> Result<Expr> {
    let mut lhs = parse_and(cursor)?;
    loop {
        let op = match cursor.peek() {
            Some(TokenKind::Or) => BinaryOp::Or,
            Some(TokenKind::Xor) => BinaryOp::Xor,
            _ => break,
        };
        cursor.next();
        let rhs = parse_and(cursor)?;
        lhs = Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    Ok(lhs)
}

fn parse_and(cursor: &mut TokenCursor) -> Result<Expr> {
    let mut lhs = parse_comparison(cursor)?;
    while cursor.eat(&TokenKind::And) {
        let rhs = parse_comparison(cursor)?;
        lhs = Expr::Binary {
            op: BinaryOp::And,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    Ok(lhs)
}

fn parse_comparison(cursor: &mut TokenCursor) -> Result<Expr> {
    let lhs = parse_additive(cursor)?;
    let op = match cursor.peek() {
        Some(TokenKind::Identity) => Some(BinaryOp::Identity),
        Some(TokenKind::NonIdentity) => Some(BinaryOp::NonIdentity),
        Some(TokenKind::Eq) => Some(BinaryOp::Eq),
        Some(TokenKind::Ne) => Some(BinaryOp::Ne),
        Some(TokenKind::Ge) => Some(BinaryOp::Ge),
        Some(TokenKind::Le) => Some(BinaryOp::Le),
        Some(TokenKind::Gt) => Some(BinaryOp::Gt),
        Some(TokenKind::Lt) => Some(BinaryOp::Lt),
        _ => None,
    };
    if let Some(op) = op {
        cursor.next();
        let rhs = parse_additive(cursor)?;
        return Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        });
    }
    // `is ...` family
    match cursor.peek() {
        Some(TokenKind::IsDivBy) | Some(TokenKind::IsNotDivBy) => {
            let negated = matches!(cursor.peek(), Some(TokenKind::IsNotDivBy));
            cursor.next();
            let rhs = parse_additive(cursor)?;
            Ok(Expr::DivBy {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                negated,
            })
        }
        Some(TokenKind::IsEven) | Some(TokenKind::IsNotEven) | Some(TokenKind::IsOdd)
        | Some(TokenKind::IsNotOdd) => {
            let (even, negated) = match cursor.peek() {
                Some(TokenKind::IsEven) => (true, false),
                Some(TokenKind::IsNotEven) => (true, true),
                Some(TokenKind::IsOdd) => (false, false),
                _ => (false, true),
            };
            cursor.next();
            Ok(Expr::Parity {
                expr: Box::new(lhs),
                even,
                negated,
                by: None,
            })
        }
        Some(TokenKind::IsEvenBy) | Some(TokenKind::IsNotEvenBy) | Some(TokenKind::IsOddBy)
        | Some(TokenKind::IsNotOddBy) => {
            let (even, negated) = match cursor.peek() {
                Some(TokenKind::IsEvenBy) => (true, false),
                Some(TokenKind::IsNotEvenBy) => (true, true),
                Some(TokenKind::IsOddBy) => (false, false),
                _ => (false, true),
            };
            cursor.next();
            let by = parse_additive(cursor)?;
            Ok(Expr::Parity {
                expr: Box::new(lhs),
                even,
                negated,
                by: Some(Box::new(by)),
            })
        }
        _ => Ok(lhs),
    }
}

fn parse_additive(cursor: &mut TokenCursor) -> Result<Expr> {
    let mut lhs = parse_multiplicative(cursor)?;
    loop {
        let op = match cursor.peek() {
            Some(TokenKind::Plus) => BinaryOp::Add,
            Some(TokenKind::Minus) => BinaryOp::Sub,
            _ => break,
        };
        cursor.next();
        let rhs = parse_multiplicative(cursor)?;
        lhs = Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    Ok(lhs)
}

fn parse_multiplicative(cursor: &mut TokenCursor) -> Result<Expr> {
    let mut lhs = parse_unary(cursor)?;
    loop {
        let op = match cursor.peek() {
            Some(TokenKind::Star) => BinaryOp::Mul,
            Some(TokenKind::Slash) => BinaryOp::Div,
            Some(TokenKind::Percent) => BinaryOp::Mod,
            _ => break,
        };
        cursor.next();
        let rhs = parse_unary(cursor)?;
        lhs = Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    Ok(lhs)
}

fn parse_unary(cursor: &mut TokenCursor) -> Result<Expr> {
    if cursor.eat(&TokenKind::Not) {
        let expr = parse_unary(cursor)?;
        return Ok(Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        });
    }
    if cursor.eat(&TokenKind::Minus) {
        let expr = parse_unary(cursor)?;
        return Ok(Expr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(expr),
        });
    }
    parse_postfix(cursor)
}

/// Primary expression plus trailing modifier pipeline.
fn parse_postfix(cursor: &mut TokenCursor) -> Result<Expr> {
    let mut expr = parse_primary(cursor)?;
    while cursor.eat(&TokenKind::Vert) {
        let name = match cursor.next().map(|t| &t.kind) {
            Some(TokenKind::Ident(name)) => name.clone(),
            _ => return Err(cursor.unexpected("modifier name")),
        };
        let mut args = Vec::new();
        while cursor.eat(&TokenKind::Colon) {
            args.push(parse_modifier_arg(cursor)?);
        }
        expr = Expr::Modifier {
            input: Box::new(expr),
            name,
            args,
        };
    }
    Ok(expr)
}

/// Modifier arguments sit between colons, so they stop below the ternary
/// level (a colon would be ambiguous).
fn parse_modifier_arg(cursor: &mut TokenCursor) -> Result<Expr> {
    parse_or(cursor)
}

fn parse_primary(cursor: &mut TokenCursor) -> Result<Expr> {
    match cursor.peek() {
        Some(TokenKind::Dollar) => parse_variable(cursor),
        Some(TokenKind::SingleString(_)) => {
            let text = match cursor.next().map(|t| &t.kind) {
                Some(TokenKind::SingleString(s)) => s.clone(),
                _ => unreachable!(),
            };
            Ok(Expr::str(text))
        }
        Some(TokenKind::QuoteStart) => parse_double_quoted(cursor),
        Some(TokenKind::Integer(_)) | Some(TokenKind::Float(_)) | Some(TokenKind::Hex(_)) => {
            parse_number(cursor)
        }
        Some(TokenKind::Ident(word)) => {
            let expr = match word.as_str() {
                "true" => Some(Expr::Literal(Literal::Bool(true))),
                "false" => Some(Expr::Literal(Literal::Bool(false))),
                "null" => Some(Expr::Literal(Literal::Null)),
                _ => None,
            };
            match expr {
                Some(expr) => {
                    cursor.next();
                    Ok(expr)
                }
                // a bare word is a string constant, matching the original
                None => {
                    let text = word.clone();
                    cursor.next();
                    Ok(Expr::str(text))
                }
            }
        }
        Some(TokenKind::OpenP) => {
            cursor.next();
            let expr = parse_expr(cursor)?;
            cursor.expect(&TokenKind::CloseP, "')'")?;
            Ok(expr)
        }
        Some(TokenKind::OpenB) => parse_array_literal(cursor),
        _ => Err(cursor.unexpected("expression")),
    }
}

fn parse_number(cursor: &mut TokenCursor) -> Result<Expr> {
    let line = cursor.line();
    match cursor.next().map(|t| t.kind.clone()) {
        Some(TokenKind::Integer(text)) => {
            text.parse::<i64>()
                .map(|n| Expr::Literal(Literal::Int(n)))
                .map_err(|_| StencilError::ParseSyntax {
                    line,
                    message: format!("integer '{}' out of range", text),
                })
        }
        Some(TokenKind::Float(text)) => {
            text.parse::<f64>()
                .map(|n| Expr::Literal(Literal::Float(n)))
                .map_err(|_| StencilError::ParseSyntax {
                    line,
                    message: format!("malformed number '{}'", text),
                })
        }
        Some(TokenKind::Hex(text)) => i64::from_str_radix(&text[2..], 16)
            .map(|n| Expr::Literal(Literal::Int(n)))
            .map_err(|_| StencilError::ParseSyntax {
                line,
                message: format!("hex literal '{}' out of range", text),
            }),
        _ => unreachable!("caller checked a number token"),
    }
}

fn parse_variable(cursor: &mut TokenCursor) -> Result<Expr> {
    cursor.expect(&TokenKind::Dollar, "'$'")?;
    let name = match cursor.next().map(|t| &t.kind) {
        Some(TokenKind::Ident(name)) => name.clone(),
        _ => return Err(cursor.unexpected("variable name")),
    };
    if name == "smarty" {
        return parse_special(cursor);
    }
    let mut path = Vec::new();
    loop {
        match cursor.peek() {
            Some(TokenKind::Dot) => {
                cursor.next();
                match cursor.next().map(|t| &t.kind) {
                    Some(TokenKind::Ident(key)) => path.push(Accessor::Key(key.clone())),
                    Some(TokenKind::Integer(n)) => path.push(Accessor::Key(n.clone())),
                    Some(TokenKind::Dollar) => {
                        // `$a.$b` — dynamic member via nested variable
                        let inner = parse_variable_tail(cursor)?;
                        path.push(Accessor::Index(Box::new(inner)));
                    }
                    _ => return Err(cursor.unexpected("member name")),
                }
            }
            Some(TokenKind::OpenB) => {
                cursor.next();
                let index = parse_expr(cursor)?;
                cursor.expect(&TokenKind::CloseB, "']'")?;
                path.push(Accessor::Index(Box::new(index)));
            }
            Some(TokenKind::At) => {
                cursor.next();
                match cursor.next().map(|t| &t.kind) {
                    Some(TokenKind::Ident(prop)) => path.push(Accessor::Prop(prop.clone())),
                    _ => return Err(cursor.unexpected("loop property name")),
                }
            }
            _ => break,
        }
    }
    Ok(Expr::Var { name, path })
}

/// Variable whose `$` has already been consumed (dynamic member position).
fn parse_variable_tail(cursor: &mut TokenCursor) -> Result<Expr> {
    let name = match cursor.next().map(|t| &t.kind) {
        Some(TokenKind::Ident(name)) => name.clone(),
        _ => return Err(cursor.unexpected("variable name")),
    };
    Ok(Expr::Var {
        name,
        path: Vec::new(),
    })
}

fn parse_special(cursor: &mut TokenCursor) -> Result<Expr> {
    let mut path = Vec::new();
    while cursor.eat(&TokenKind::Dot) {
        match cursor.next().map(|t| &t.kind) {
            Some(TokenKind::Ident(part)) => path.push(part.clone()),
            Some(TokenKind::Integer(part)) => path.push(part.clone()),
            _ => return Err(cursor.unexpected("special variable component")),
        }
    }
    if path.is_empty() {
        return Err(cursor.unexpected("'$smarty.' component"));
    }
    Ok(Expr::Special { path })
}

/// `"...text {$embedded} more `$expr` text..."`
///
/// The string reduces to a single expression by concatenating its literal
/// and tag-evaluated parts.
fn parse_double_quoted(cursor: &mut TokenCursor) -> Result<Expr> {
    cursor.expect(&TokenKind::QuoteStart, "'\"'")?;
    let mut parts: Vec<Expr> = Vec::new();
    loop {
        match cursor.peek() {
            Some(TokenKind::QuoteEnd) => {
                cursor.next();
                break;
            }
            Some(TokenKind::QuotedLiteral(_)) => {
                if let Some(TokenKind::QuotedLiteral(text)) = cursor.next().map(|t| &t.kind) {
                    parts.push(Expr::str(text.clone()));
                }
            }
            Some(TokenKind::DollarIdInString(_)) => {
                if let Some(TokenKind::DollarIdInString(name)) = cursor.next().map(|t| &t.kind) {
                    parts.push(Expr::Var {
                        name: name.clone(),
                        path: Vec::new(),
                    });
                }
            }
            Some(TokenKind::Backtick) => {
                cursor.next();
                let expr = parse_expr(cursor)?;
                cursor.expect(&TokenKind::Backtick, "'`'")?;
                parts.push(expr);
            }
            Some(TokenKind::Ldel) => {
                cursor.next();
                let expr = parse_expr(cursor)?;
                cursor.expect(&TokenKind::Rdel, "tag close")?;
                parts.push(expr);
            }
            _ => return Err(cursor.unexpected("string content or '\"'")),
        }
    }
    match parts.len() {
        0 => Ok(Expr::str("")),
        1 => Ok(parts.into_iter().next().unwrap_or_else(|| Expr::str(""))),
        _ => Ok(Expr::Concat(parts)),
    }
}

fn parse_array_literal(cursor: &mut TokenCursor) -> Result<Expr> {
    cursor.expect(&TokenKind::OpenB, "'['")?;
    let mut entries = Vec::new();
    if cursor.eat(&TokenKind::CloseB) {
        return Ok(Expr::ArrayLit(entries));
    }
    loop {
        let first = parse_expr(cursor)?;
        if cursor.eat(&TokenKind::Aptr) {
            let value = parse_expr(cursor)?;
            entries.push((Some(first), value));
        } else {
            entries.push((None, first));
        }
        if cursor.eat(&TokenKind::Comma) {
            continue;
        }
        cursor.expect(&TokenKind::CloseB, "']' or ','")?;
        break;
    }
    Ok(Expr::ArrayLit(entries))
}
