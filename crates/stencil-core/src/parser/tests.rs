use super::attrs::{parse_attrs, validate_attrs, AttrSpec};
use super::expr::{parse_expr, Accessor, BinaryOp, Expr, Literal, TokenCursor};
use super::{parse_tag, ParsedTag};
use crate::config::EngineConfig;
use crate::error::StencilError;
use crate::lexer::{Lexer, Token, TokenKind};

fn test_config() -> EngineConfig {
    EngineConfig::new("templates", "compiled", "cache")
}

/// Lex `{...}` source and return the tokens between the delimiters.
fn tag_body(src: &str) -> Vec<Token> {
    let config = test_config();
    let mut lexer = Lexer::new(src, &config);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token().expect("lex failure") {
        tokens.push(token);
    }
    assert!(
        matches!(
            tokens.first().map(|t| &t.kind),
            Some(TokenKind::Ldel) | Some(TokenKind::LdelSlash)
        ),
        "expected a tag open, got {:?}",
        tokens.first()
    );
    assert!(matches!(
        tokens.last().map(|t| &t.kind),
        Some(TokenKind::Rdel)
    ));
    tokens[1..tokens.len() - 1].to_vec()
}

fn expr_of(src: &str) -> Expr {
    let tokens = tag_body(src);
    let mut cursor = TokenCursor::new(&tokens, 1);
    let expr = parse_expr(&mut cursor).expect("parse failure");
    assert!(cursor.at_end(), "trailing tokens after expression");
    expr
}

#[test]
fn parses_simple_variable() {
    assert_eq!(
        expr_of("{$name}"),
        Expr::Var {
            name: "name".to_string(),
            path: vec![],
        }
    );
}

#[test]
fn parses_member_and_index_path() {
    let expr = expr_of("{$user.address[0].city}");
    match expr {
        Expr::Var { name, path } => {
            assert_eq!(name, "user");
            assert_eq!(path.len(), 3);
            assert_eq!(path[0], Accessor::Key("address".to_string()));
            assert!(matches!(path[1], Accessor::Index(_)));
            assert_eq!(path[2], Accessor::Key("city".to_string()));
        }
        other => panic!("expected variable, got {:?}", other),
    }
}

#[test]
fn numeric_member_is_a_key() {
    let expr = expr_of("{$row.5}");
    assert_eq!(
        expr,
        Expr::Var {
            name: "row".to_string(),
            path: vec![Accessor::Key("5".to_string())],
        }
    );
}

#[test]
fn at_prop_accessor() {
    let expr = expr_of("{$item@index}");
    assert_eq!(
        expr,
        Expr::Var {
            name: "item".to_string(),
            path: vec![Accessor::Prop("index".to_string())],
        }
    );
}

#[test]
fn arithmetic_precedence() {
    let expr = expr_of("{$a + $b * 2}");
    match expr {
        Expr::Binary { op, rhs, .. } => {
            assert_eq!(op, BinaryOp::Add);
            assert!(matches!(
                *rhs,
                Expr::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            ));
        }
        other => panic!("expected binary add, got {:?}", other),
    }
}

#[test]
fn comparison_word_forms() {
    let expr = expr_of("{$a gt 3 and $b ne 'x'}");
    match expr {
        Expr::Binary { op, lhs, rhs } => {
            assert_eq!(op, BinaryOp::And);
            assert!(matches!(
                *lhs,
                Expr::Binary {
                    op: BinaryOp::Gt,
                    ..
                }
            ));
            assert!(matches!(
                *rhs,
                Expr::Binary {
                    op: BinaryOp::Ne,
                    ..
                }
            ));
        }
        other => panic!("expected and, got {:?}", other),
    }
}

#[test]
fn is_div_by_negated() {
    let expr = expr_of("{$n is not div by 4}");
    match expr {
        Expr::DivBy { negated, .. } => assert!(negated),
        other => panic!("expected divisibility test, got {:?}", other),
    }
}

#[test]
fn is_odd_by_carries_operand() {
    let expr = expr_of("{$n is odd by 2}");
    match expr {
        Expr::Parity {
            even, negated, by, ..
        } => {
            assert!(!even);
            assert!(!negated);
            assert!(by.is_some());
        }
        other => panic!("expected parity test, got {:?}", other),
    }
}

#[test]
fn ternary_expression() {
    let expr = expr_of("{$ok ? 'yes' : 'no'}");
    match expr {
        Expr::Ternary {
            then_expr,
            else_expr,
            ..
        } => {
            assert_eq!(*then_expr, Expr::str("yes"));
            assert_eq!(*else_expr, Expr::str("no"));
        }
        other => panic!("expected ternary, got {:?}", other),
    }
}

#[test]
fn modifier_pipeline_with_args() {
    let expr = expr_of("{$title|truncate:30:'...'|upper}");
    match expr {
        Expr::Modifier { input, name, args } => {
            assert_eq!(name, "upper");
            assert!(args.is_empty());
            match *input {
                Expr::Modifier { name, args, .. } => {
                    assert_eq!(name, "truncate");
                    assert_eq!(args.len(), 2);
                    assert_eq!(args[0], Expr::Literal(Literal::Int(30)));
                }
                other => panic!("expected inner modifier, got {:?}", other),
            }
        }
        other => panic!("expected modifier, got {:?}", other),
    }
}

#[test]
fn double_quoted_string_concatenates_parts() {
    let expr = expr_of("{\"hello {$name}!\"}");
    match expr {
        Expr::Concat(parts) => {
            assert_eq!(parts.len(), 3);
            assert_eq!(parts[0], Expr::str("hello "));
            assert!(matches!(parts[1], Expr::Var { .. }));
            assert_eq!(parts[2], Expr::str("!"));
        }
        other => panic!("expected concat, got {:?}", other),
    }
}

#[test]
fn all_literal_double_quoted_string_collapses() {
    assert_eq!(expr_of("{\"plain\"}"), Expr::str("plain"));
}

#[test]
fn special_variable_path() {
    let expr = expr_of("{$smarty.foreach.outer.index}");
    assert_eq!(
        expr,
        Expr::Special {
            path: vec![
                "foreach".to_string(),
                "outer".to_string(),
                "index".to_string()
            ],
        }
    );
}

#[test]
fn array_literal_with_keyed_entries() {
    let expr = expr_of("{['a' => 1, 2, 'b' => $x]}");
    match expr {
        Expr::ArrayLit(entries) => {
            assert_eq!(entries.len(), 3);
            assert!(entries[0].0.is_some());
            assert!(entries[1].0.is_none());
            assert!(matches!(entries[2].1, Expr::Var { .. }));
        }
        other => panic!("expected array literal, got {:?}", other),
    }
}

#[test]
fn hex_literal_parses_as_int() {
    assert_eq!(expr_of("{0x1F}"), Expr::Literal(Literal::Int(31)));
}

#[test]
fn negation_and_not() {
    let expr = expr_of("{not -$x}");
    match expr {
        Expr::Unary { op, expr } => {
            assert_eq!(op, super::UnaryOp::Not);
            assert!(matches!(
                *expr,
                Expr::Unary {
                    op: super::UnaryOp::Neg,
                    ..
                }
            ));
        }
        other => panic!("expected unary, got {:?}", other),
    }
}

#[test]
fn dangling_operator_reports_expected() {
    let tokens = tag_body("{$a +}");
    let mut cursor = TokenCursor::new(&tokens, 1);
    match parse_expr(&mut cursor) {
        Err(StencilError::ParseExpected { expected, .. }) => {
            assert_eq!(expected, "expression");
        }
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn print_tag_with_nocache_flag() {
    let tokens = tag_body("{$x|upper nocache}");
    match parse_tag(tokens, 1, false).expect("parse failure") {
        ParsedTag::Print { expr, attrs, .. } => {
            assert!(matches!(expr, Expr::Modifier { .. }));
            assert_eq!(attrs.len(), 1);
            assert_eq!(attrs[0].name, "nocache");
            assert!(attrs[0].bare);
        }
        other => panic!("expected print tag, got {:?}", other),
    }
}

#[test]
fn named_tag_keeps_body_tokens() {
    let tokens = tag_body("{include file='page.tpl' title=$t}");
    match parse_tag(tokens, 1, false).expect("parse failure") {
        ParsedTag::Call { name, body, .. } => {
            assert_eq!(name, "include");
            assert!(!body.is_empty());
        }
        other => panic!("expected tag call, got {:?}", other),
    }
}

#[test]
fn closing_tag_rejects_trailing_tokens() {
    let tokens = tag_body("{/if $x}");
    assert!(parse_tag(tokens, 1, true).is_err());
}

#[test]
fn attr_validation_rejects_undeclared() {
    let tokens = tag_body("{x file='a' bogus='b'}");
    let mut cursor = TokenCursor::new(&tokens[1..], 1);
    let attrs = parse_attrs(&mut cursor).expect("parse failure");
    let spec = AttrSpec {
        required: &["file"],
        optional: &[],
        flags: &["nocache"],
        pass_through: false,
    };
    match validate_attrs("x", 1, attrs, &spec) {
        Err(StencilError::TagUnexpectedAttr { attr, .. }) => assert_eq!(attr, "bogus"),
        other => panic!("expected unexpected-attribute error, got {:?}", other),
    }
}

#[test]
fn attr_validation_reports_missing_required() {
    let tokens = tag_body("{x nocache}");
    let mut cursor = TokenCursor::new(&tokens[1..], 1);
    let attrs = parse_attrs(&mut cursor).expect("parse failure");
    let spec = AttrSpec {
        required: &["file"],
        optional: &[],
        flags: &["nocache"],
        pass_through: false,
    };
    match validate_attrs("x", 1, attrs, &spec) {
        Err(StencilError::TagMissingAttr { attr, .. }) => assert_eq!(attr, "file"),
        other => panic!("expected missing-attribute error, got {:?}", other),
    }
}

#[test]
fn flag_accepts_boolean_spellings() {
    let tokens = tag_body("{x nocache=off}");
    let mut cursor = TokenCursor::new(&tokens[1..], 1);
    let attrs = parse_attrs(&mut cursor).expect("parse failure");
    let spec = AttrSpec::new();
    let validated = validate_attrs("x", 1, attrs, &spec).expect("validate failure");
    assert!(!validated.flag("nocache"));
}

#[test]
fn pass_through_collects_extra_attrs() {
    let tokens = tag_body("{x file='a' title='b'}");
    let mut cursor = TokenCursor::new(&tokens[1..], 1);
    let attrs = parse_attrs(&mut cursor).expect("parse failure");
    let spec = AttrSpec {
        required: &["file"],
        optional: &[],
        flags: &["nocache"],
        pass_through: true,
    };
    let validated = validate_attrs("x", 1, attrs, &spec).expect("validate failure");
    assert_eq!(validated.extra.len(), 1);
    assert_eq!(validated.extra[0].0, "title");
}
