use super::*;
use crate::config::EngineConfig;

fn config() -> EngineConfig {
    EngineConfig::new("/tmp/t", "/tmp/c", "/tmp/k")
}

fn lex_all(src: &str) -> Vec<TokenKind> {
    let cfg = config();
    let mut lexer = Lexer::new(src, &cfg);
    let mut out = Vec::new();
    while let Some(token) = lexer.next_token().unwrap() {
        out.push(token.kind);
    }
    out
}

#[test]
fn test_plain_text_single_token() {
    assert_eq!(lex_all("hello world"), vec![TokenKind::Text("hello world".into())]);
}

#[test]
fn test_simple_variable_tag() {
    let tokens = lex_all("Hi {$name}!");
    assert_eq!(
        tokens,
        vec![
            TokenKind::Text("Hi ".into()),
            TokenKind::Ldel,
            TokenKind::Dollar,
            TokenKind::Ident("name".into()),
            TokenKind::Rdel,
            TokenKind::Text("!".into()),
        ]
    );
}

#[test]
fn test_auto_literal_space_after_delimiter() {
    let tokens = lex_all("a { b } c");
    // `{ ` is literal text under auto-literal, so no tag tokens appear
    assert!(tokens.iter().all(|t| !matches!(t, TokenKind::Ldel)));
}

#[test]
fn test_auto_literal_disabled() {
    let mut cfg = config();
    cfg.auto_literal = false;
    let mut lexer = Lexer::new("{ $x }", &cfg);
    let first = lexer.next_token().unwrap().unwrap();
    assert_eq!(first.kind, TokenKind::Ldel);
}

#[test]
fn test_comment_dropped() {
    assert_eq!(
        lex_all("a{* not seen *}b"),
        vec![TokenKind::Text("a".into()), TokenKind::Text("b".into())]
    );
}

#[test]
fn test_unterminated_comment_is_lex_error() {
    let cfg = config();
    let mut lexer = Lexer::new("x{* oops", &cfg);
    lexer.next_token().unwrap();
    let err = lexer.next_token().unwrap_err();
    assert!(err.to_string().starts_with("LEX_UNEXPECTED_INPUT"));
}

#[test]
fn test_closing_tag_opens_with_slash() {
    let tokens = lex_all("{if $a}x{/if}");
    assert!(tokens.contains(&TokenKind::LdelSlash));
}

#[test]
fn test_operators_word_and_symbol_forms() {
    let symbol = lex_all("{if $a == 1 && $b gt 2}{/if}");
    assert!(symbol.contains(&TokenKind::Eq));
    assert!(symbol.contains(&TokenKind::And));
    assert!(symbol.contains(&TokenKind::Gt));
}

#[test]
fn test_is_div_by_multiword() {
    let tokens = lex_all("{if $n is div by 3}{/if}");
    assert!(tokens.contains(&TokenKind::IsDivBy));
}

#[test]
fn test_is_not_even_multiword() {
    let tokens = lex_all("{if $n is not even}{/if}");
    assert!(tokens.contains(&TokenKind::IsNotEven));
}

#[test]
fn test_reserved_word_after_dollar_is_plain_name() {
    let tokens = lex_all("{$not}");
    assert!(tokens.contains(&TokenKind::Ident("not".into())));
}

#[test]
fn test_float_vs_member_access() {
    let float = lex_all("{$x + 1.5}");
    assert!(float.contains(&TokenKind::Float("1.5".into())));

    let member = lex_all("{$row.5}");
    assert!(member.contains(&TokenKind::Dot));
    assert!(member.contains(&TokenKind::Integer("5".into())));
}

#[test]
fn test_hex_literal() {
    let tokens = lex_all("{$x = 0xFF}");
    assert!(tokens.contains(&TokenKind::Hex("0xFF".into())));
}

#[test]
fn test_single_quoted_string_decodes_escapes() {
    let tokens = lex_all(r"{assign var=x value='it\'s'}");
    assert!(tokens.contains(&TokenKind::SingleString("it's".into())));
}

#[test]
fn test_double_quoted_string_with_embedded_tag() {
    let tokens = lex_all(r#"{assign var=x value="a {$b} c"}"#);
    let quote_starts = tokens
        .iter()
        .filter(|t| matches!(t, TokenKind::QuoteStart))
        .count();
    assert_eq!(quote_starts, 1);
    assert!(tokens.contains(&TokenKind::QuotedLiteral("a ".into())));
    assert!(tokens.contains(&TokenKind::Ident("b".into())));
    assert!(tokens.contains(&TokenKind::QuotedLiteral(" c".into())));
    assert!(tokens.contains(&TokenKind::QuoteEnd));
}

#[test]
fn test_double_quoted_dollar_id() {
    let tokens = lex_all(r#"{assign var=x value="hi $name!"}"#);
    assert!(tokens.contains(&TokenKind::DollarIdInString("name".into())));
}

#[test]
fn test_double_quoted_backtick_expression() {
    let tokens = lex_all(r#"{assign var=x value="v=`$a.b`"}"#);
    let backticks = tokens
        .iter()
        .filter(|t| matches!(t, TokenKind::Backtick))
        .count();
    assert_eq!(backticks, 2);
}

#[test]
fn test_unterminated_double_quote() {
    let cfg = config();
    let mut lexer = Lexer::new(r#"{assign var=x value="oops}"#, &cfg);
    let result = loop {
        match lexer.next_token() {
            Ok(Some(_)) => continue,
            other => break other,
        }
    };
    assert!(result.is_err());
}

#[test]
fn test_literal_block_passes_tags_verbatim() {
    let tokens = lex_all("{literal}{$x}{/literal}");
    assert_eq!(
        tokens,
        vec![
            TokenKind::LiteralStart,
            TokenKind::Literal("{$x}".into()),
            TokenKind::LiteralEnd,
        ]
    );
}

#[test]
fn test_nested_literal_blocks() {
    let tokens = lex_all("{literal}a{literal}b{/literal}c{/literal}");
    let starts = tokens
        .iter()
        .filter(|t| matches!(t, TokenKind::LiteralStart))
        .count();
    let ends = tokens
        .iter()
        .filter(|t| matches!(t, TokenKind::LiteralEnd))
        .count();
    assert_eq!(starts, 2);
    assert_eq!(ends, 2);
}

#[test]
fn test_unclosed_literal_is_fatal() {
    let cfg = config();
    let mut lexer = Lexer::new("{literal}stuck", &cfg);
    lexer.next_token().unwrap(); // LiteralStart
    lexer.next_token().unwrap(); // Literal("stuck")
    let err = lexer.next_token().unwrap_err();
    assert!(err.to_string().starts_with("LEX_UNCLOSED_LITERAL"));
}

#[test]
fn test_strip_suppresses_linebreaks() {
    let tokens = lex_all("a\n{strip}b\n  c{/strip}\nd");
    // the linebreak between b and c is stripped, the outer ones are not
    let linebreaks = tokens
        .iter()
        .filter(|t| matches!(t, TokenKind::Linebreak(_)))
        .count();
    assert_eq!(linebreaks, 2);
}

#[test]
fn test_linebreak_run_swallows_surrounding_indent() {
    let tokens = lex_all("a  \n\t b");
    assert_eq!(
        tokens,
        vec![
            TokenKind::Text("a".into()),
            TokenKind::Linebreak("  \n\t ".into()),
            TokenKind::Text("b".into()),
        ]
    );
}

#[test]
fn test_raw_passthrough_classification() {
    let tokens = lex_all("a<?php echo 1; ?>b");
    assert!(tokens.contains(&TokenKind::RawPassthrough("<?php".into())));
    assert!(tokens.contains(&TokenKind::RawPassthrough("?>".into())));
}

#[test]
fn test_block_child_marker() {
    let tokens = lex_all("x{$smarty.block.child}y");
    assert!(tokens.contains(&TokenKind::BlockChild));
}

#[test]
fn test_line_tracking() {
    let cfg = config();
    let mut lexer = Lexer::new("a\nb\n{$x}", &cfg);
    let mut last_line = 0;
    while let Some(token) = lexer.next_token().unwrap() {
        last_line = token.line;
    }
    assert_eq!(last_line, 3);
}

#[test]
fn test_lex_error_carries_line_and_excerpt() {
    let cfg = config();
    let mut lexer = Lexer::new("\n\n{if \u{7f}}", &cfg);
    let err = loop {
        match lexer.next_token() {
            Ok(Some(_)) => continue,
            Ok(None) => panic!("expected lex error"),
            Err(e) => break e,
        }
    };
    let msg = err.to_string();
    assert!(msg.contains("line 3"), "{}", msg);
}

#[test]
fn test_custom_delimiters() {
    let mut cfg = config();
    cfg.left_delimiter = "<%".into();
    cfg.right_delimiter = "%>".into();
    let mut lexer = Lexer::new("a<%$x%>b", &cfg);
    let mut kinds = Vec::new();
    while let Some(token) = lexer.next_token().unwrap() {
        kinds.push(token.kind);
    }
    assert_eq!(
        kinds,
        vec![
            TokenKind::Text("a".into()),
            TokenKind::Ldel,
            TokenKind::Dollar,
            TokenKind::Ident("x".into()),
            TokenKind::Rdel,
            TokenKind::Text("b".into()),
        ]
    );
}
