//! Template lexer
//!
//! Hand-rolled forward-only scanner over the whole remaining input, driven by
//! an explicit mode stack. Each mode owns an ordered set of match attempts
//! (longest match first); a position no rule matches is a fatal lex error
//! carrying the line number and a source excerpt.
//!
//! Modes:
//! - `Text` — outside tags: tag/comment/literal/strip recognition, raw
//!   passthrough runs, linebreak runs, plain text.
//! - `Tag` — inside a tag: expression tokens, strings, operators.
//! - `Literal` — verbatim until the matching literal close, aware of nested
//!   literal openers and raw passthrough sequences.
//! - `DoubleQuote` — string scanning that re-enters `Tag` for embedded tags.

mod token;

pub use token::{Token, TokenKind};

#[cfg(test)]
mod tests;

use crate::config::EngineConfig;
use crate::error::{Result, StencilError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Text,
    Tag,
    Literal,
    DoubleQuote,
}

/// Kind of the previously emitted tag-mode token, used to disambiguate `.`
/// between member access and a float literal, and to keep reserved words
/// usable as variable and member names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prev {
    None,
    Dollar,
    Dot,
    Ptr,
    At,
    ValueLike, // identifier, number, `)`, `]` — things an accessor may follow
    Other,
}

pub struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
    modes: Vec<Mode>,
    strip: bool,
    ldel: String,
    rdel: String,
    auto_literal: bool,
    prev: Prev,
    literal_line: usize,
    quote_line: usize,
}

enum Lexed {
    Tok(Token),
    Skip,
    Eof,
}

impl<'s> Lexer<'s> {
    pub fn new(src: &'s str, config: &EngineConfig) -> Self {
        Lexer {
            src,
            pos: 0,
            line: 1,
            modes: vec![Mode::Text],
            strip: false,
            ldel: config.left_delimiter.clone(),
            rdel: config.right_delimiter.clone(),
            auto_literal: config.auto_literal,
            prev: Prev::None,
            literal_line: 1,
            quote_line: 1,
        }
    }

    /// Current line (1-based).
    pub fn line(&self) -> usize {
        self.line
    }

    /// True when the lexer is back at the outermost text mode. The compiler
    /// checks this at end of input to detect unterminated constructs.
    pub fn at_text_mode(&self) -> bool {
        self.modes.len() == 1
    }

    /// Byte offset of the next unconsumed input.
    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            let lexed = match *self.modes.last().unwrap_or(&Mode::Text) {
                Mode::Text => self.lex_text()?,
                Mode::Tag => self.lex_tag()?,
                Mode::Literal => self.lex_literal()?,
                Mode::DoubleQuote => self.lex_double_quote()?,
            };
            match lexed {
                Lexed::Tok(t) => return Ok(Some(t)),
                Lexed::Skip => continue,
                Lexed::Eof => return Ok(None),
            }
        }
    }

    // --- text mode ---

    fn lex_text(&mut self) -> Result<Lexed> {
        if self.rest().is_empty() {
            return Ok(Lexed::Eof);
        }
        let line = self.line;

        // {$smarty.block.child}
        let block_child = format!("{}$smarty.block.child{}", self.ldel, self.rdel);
        if self.rest().starts_with(&block_child) {
            self.advance(block_child.len());
            return Ok(Lexed::Tok(Token::new(TokenKind::BlockChild, line)));
        }

        // {* comment *}
        if let Some(after) = self.rest().strip_prefix(self.ldel.as_str()) {
            if let Some(body) = after.strip_prefix('*') {
                let closer = format!("*{}", self.rdel);
                match body.find(&closer) {
                    Some(end) => {
                        let total = self.ldel.len() + 1 + end + closer.len();
                        self.advance(total);
                        return Ok(Lexed::Skip);
                    }
                    None => {
                        return Err(self.unexpected_input("unterminated comment"));
                    }
                }
            }
        }

        // linebreak run: [\t ]*[\r\n]+[\t ]*
        if let Some(0) = self.linebreak_run_start() {
            let run = self.take_linebreak_run();
            if self.strip {
                return Ok(Lexed::Skip);
            }
            return Ok(Lexed::Tok(Token::new(TokenKind::Linebreak(run), line)));
        }

        // {strip} / {/strip}
        if let Some(len) = self.match_word_tag("strip", false) {
            self.advance(len);
            self.strip = true;
            return Ok(Lexed::Skip);
        }
        if let Some(len) = self.match_word_tag("/strip", false) {
            self.advance(len);
            self.strip = false;
            return Ok(Lexed::Skip);
        }

        // {literal}
        if let Some(len) = self.match_word_tag("literal", true) {
            self.advance(len);
            self.literal_line = line;
            self.modes.push(Mode::Literal);
            return Ok(Lexed::Tok(Token::new(TokenKind::LiteralStart, line)));
        }

        // tag open
        if self.rest().starts_with(self.ldel.as_str()) {
            return self.lex_tag_open(line);
        }

        // raw passthrough sequences
        if let Some(run) = self.match_raw_passthrough() {
            self.advance(run.len());
            return Ok(Lexed::Tok(Token::new(TokenKind::RawPassthrough(run), line)));
        }

        // plain text up to the next boundary
        let end = self.text_boundary();
        let text = self.rest()[..end].to_string();
        self.advance(end);
        Ok(Lexed::Tok(Token::new(TokenKind::Text(text), line)))
    }

    /// Classify the characters right after an opening delimiter.
    fn lex_tag_open(&mut self, line: usize) -> Result<Lexed> {
        let after = &self.rest()[self.ldel.len()..];
        if after.starts_with('/') {
            self.advance(self.ldel.len() + 1);
            self.modes.push(Mode::Tag);
            self.prev = Prev::None;
            return Ok(Lexed::Tok(Token::new(TokenKind::LdelSlash, line)));
        }
        let next = after.chars().next();
        let literal_follow = match next {
            None => true,
            Some(c) => c.is_whitespace(),
        };
        if self.auto_literal && literal_follow {
            // auto-literal: `{ ` is text, not a tag
            let ldel = self.ldel.clone();
            self.advance(ldel.len());
            return Ok(Lexed::Tok(Token::new(TokenKind::Text(ldel), line)));
        }
        self.advance(self.ldel.len());
        self.modes.push(Mode::Tag);
        self.prev = Prev::None;
        Ok(Lexed::Tok(Token::new(TokenKind::Ldel, line)))
    }

    // --- literal mode ---

    fn lex_literal(&mut self) -> Result<Lexed> {
        if self.rest().is_empty() {
            return Err(StencilError::LexUnclosedLiteral(self.literal_line));
        }
        let line = self.line;

        if let Some(len) = self.match_word_tag("literal", true) {
            self.advance(len);
            self.literal_line = line;
            self.modes.push(Mode::Literal);
            return Ok(Lexed::Tok(Token::new(TokenKind::LiteralStart, line)));
        }
        if let Some(len) = self.match_word_tag("/literal", true) {
            self.advance(len);
            self.modes.pop();
            return Ok(Lexed::Tok(Token::new(TokenKind::LiteralEnd, line)));
        }
        if let Some(run) = self.match_raw_passthrough() {
            self.advance(run.len());
            return Ok(Lexed::Tok(Token::new(TokenKind::RawPassthrough(run), line)));
        }

        // verbatim run up to the next literal-relevant boundary
        let rest = self.rest();
        let mut end = rest.len();
        for probe in 1..rest.len() {
            if !rest.is_char_boundary(probe) {
                continue;
            }
            let tail = &rest[probe..];
            if tail.starts_with(self.ldel.as_str()) || tail.starts_with("<?") || tail.starts_with("<%")
            {
                end = probe;
                break;
            }
        }
        let run = rest[..end].to_string();
        self.advance(end);
        Ok(Lexed::Tok(Token::new(TokenKind::Literal(run), line)))
    }

    // --- tag mode ---

    fn lex_tag(&mut self) -> Result<Lexed> {
        self.skip_tag_whitespace();
        if self.rest().is_empty() {
            return Err(self.unexpected_input("end of input inside tag"));
        }
        let line = self.line;
        let rest = self.rest();

        // single-quoted string
        if rest.starts_with('\'') {
            let (decoded, consumed) = self.scan_single_quoted()?;
            self.advance(consumed);
            self.prev = Prev::ValueLike;
            return Ok(Lexed::Tok(Token::new(TokenKind::SingleString(decoded), line)));
        }

        // nested tag open
        if rest.starts_with(self.ldel.as_str()) {
            let after = &rest[self.ldel.len()..];
            let closing = after.starts_with('/');
            self.advance(self.ldel.len() + usize::from(closing));
            self.modes.push(Mode::Tag);
            self.prev = Prev::None;
            let kind = if closing {
                TokenKind::LdelSlash
            } else {
                TokenKind::Ldel
            };
            return Ok(Lexed::Tok(Token::new(kind, line)));
        }

        // tag close
        if rest.starts_with(self.rdel.as_str()) {
            self.advance(self.rdel.len());
            self.modes.pop();
            self.prev = Prev::None;
            return Ok(Lexed::Tok(Token::new(TokenKind::Rdel, line)));
        }

        // multi-character operators, longest first
        let fixed: &[(&str, TokenKind, Prev)] = &[
            ("===", TokenKind::Identity, Prev::Other),
            ("!==", TokenKind::NonIdentity, Prev::Other),
            ("==", TokenKind::Eq, Prev::Other),
            ("!=", TokenKind::Ne, Prev::Other),
            ("<>", TokenKind::Ne, Prev::Other),
            (">=", TokenKind::Ge, Prev::Other),
            ("<=", TokenKind::Le, Prev::Other),
            ("->", TokenKind::Ptr, Prev::Ptr),
            ("=>", TokenKind::Aptr, Prev::Other),
            ("&&", TokenKind::And, Prev::Other),
            ("||", TokenKind::Or, Prev::Other),
            (">", TokenKind::Gt, Prev::Other),
            ("<", TokenKind::Lt, Prev::Other),
            ("!", TokenKind::Not, Prev::Other),
            ("(", TokenKind::OpenP, Prev::Other),
            (")", TokenKind::CloseP, Prev::ValueLike),
            ("[", TokenKind::OpenB, Prev::Other),
            ("]", TokenKind::CloseB, Prev::ValueLike),
            ("=", TokenKind::Equal, Prev::Other),
            ("+", TokenKind::Plus, Prev::Other),
            ("-", TokenKind::Minus, Prev::Other),
            ("*", TokenKind::Star, Prev::Other),
            ("/", TokenKind::Slash, Prev::Other),
            ("%", TokenKind::Percent, Prev::Other),
            (",", TokenKind::Comma, Prev::Other),
            (":", TokenKind::Colon, Prev::Other),
            (";", TokenKind::Semicolon, Prev::Other),
            ("@", TokenKind::At, Prev::At),
            ("?", TokenKind::Qmark, Prev::Other),
            ("|", TokenKind::Vert, Prev::Other),
            ("$", TokenKind::Dollar, Prev::Dollar),
        ];
        if rest.starts_with('.') {
            // `.` between two numbers is part of a float, handled in the
            // number rule; standalone it is a member accessor
            self.advance(1);
            self.prev = Prev::Dot;
            return Ok(Lexed::Tok(Token::new(TokenKind::Dot, line)));
        }
        if rest.starts_with('"') {
            self.advance(1);
            self.quote_line = line;
            self.modes.push(Mode::DoubleQuote);
            self.prev = Prev::None;
            return Ok(Lexed::Tok(Token::new(TokenKind::QuoteStart, line)));
        }
        if rest.starts_with('`') {
            // closes an embedded expression inside a double-quoted string
            self.advance(1);
            self.modes.pop();
            self.prev = Prev::None;
            return Ok(Lexed::Tok(Token::new(TokenKind::Backtick, line)));
        }
        for (pat, kind, prev) in fixed {
            if rest.starts_with(pat) {
                self.advance(pat.len());
                self.prev = *prev;
                return Ok(Lexed::Tok(Token::new(kind.clone(), line)));
            }
        }

        // numbers
        if rest.starts_with("0x") || rest.starts_with("0X") {
            let digits: usize = rest[2..]
                .chars()
                .take_while(|c| c.is_ascii_hexdigit())
                .count();
            if digits > 0 {
                let text = rest[..2 + digits].to_string();
                self.advance(text.len());
                self.prev = Prev::ValueLike;
                return Ok(Lexed::Tok(Token::new(TokenKind::Hex(text), line)));
            }
        }
        if rest.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return Ok(Lexed::Tok(self.scan_number(line)));
        }

        // identifiers and word operators
        if rest
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        {
            return Ok(Lexed::Tok(self.scan_word(line)));
        }

        Err(self.unexpected_input("no rule matched"))
    }

    fn scan_number(&mut self, line: usize) -> Token {
        let rest = self.rest();
        let int_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        let tail = &rest[int_len..];
        // a fraction only when `.` is not acting as a member accessor
        let fractional = self.prev != Prev::Dot
            && tail.starts_with('.')
            && tail[1..].chars().next().is_some_and(|c| c.is_ascii_digit());
        let len = if fractional {
            let frac = tail[1..].chars().take_while(|c| c.is_ascii_digit()).count();
            int_len + 1 + frac
        } else {
            int_len
        };
        let text = rest[..len].to_string();
        self.advance(len);
        self.prev = Prev::ValueLike;
        if fractional {
            Token::new(TokenKind::Float(text), line)
        } else {
            Token::new(TokenKind::Integer(text), line)
        }
    }

    fn scan_word(&mut self, line: usize) -> Token {
        let rest = self.rest();
        let len = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .count();
        let word = &rest[..len];
        // after `$`, `.`, `->` or `@` a word is always a plain name
        let name_position = matches!(self.prev, Prev::Dollar | Prev::Dot | Prev::Ptr | Prev::At);
        if !name_position {
            if let Some((kind, consumed)) = self.match_word_operator(word, len) {
                self.advance(consumed);
                self.prev = Prev::Other;
                return Token::new(kind, line);
            }
        }
        let text = word.to_string();
        self.advance(len);
        self.prev = Prev::ValueLike;
        Token::new(TokenKind::Ident(text), line)
    }

    /// Reserved-word operators, including the multi-word `is ...` family.
    /// Returns the token and the total byte length consumed.
    fn match_word_operator(&self, word: &str, len: usize) -> Option<(TokenKind, usize)> {
        let simple = match word.to_ascii_lowercase().as_str() {
            "eq" => Some(TokenKind::Eq),
            "ne" | "neq" => Some(TokenKind::Ne),
            "ge" | "gte" => Some(TokenKind::Ge),
            "le" | "lte" => Some(TokenKind::Le),
            "gt" => Some(TokenKind::Gt),
            "lt" => Some(TokenKind::Lt),
            "mod" => Some(TokenKind::Percent),
            "not" => Some(TokenKind::Not),
            "and" => Some(TokenKind::And),
            "or" => Some(TokenKind::Or),
            "xor" => Some(TokenKind::Xor),
            "as" => Some(TokenKind::As),
            "to" => Some(TokenKind::To),
            "step" => Some(TokenKind::Step),
            _ => None,
        };
        if let Some(kind) = simple {
            return Some((kind, len));
        }
        if !word.eq_ignore_ascii_case("is") {
            return None;
        }
        // `is [not] (div|even|odd) [by]`
        let rest = &self.rest()[len..];
        let mut consumed = len;
        let mut words: Vec<(String, usize)> = Vec::new();
        let mut cursor = rest;
        for _ in 0..3 {
            let ws = cursor.len() - cursor.trim_start().len();
            let trimmed = cursor.trim_start();
            let wlen = trimmed
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .count();
            if wlen == 0 {
                break;
            }
            words.push((trimmed[..wlen].to_ascii_lowercase(), ws + wlen));
            cursor = &trimmed[wlen..];
        }
        let mut idx = 0;
        let negated = words.first().is_some_and(|(w, _)| w == "not");
        if negated {
            consumed += words[0].1;
            idx = 1;
        }
        let parity = match words.get(idx).map(|(w, _)| w.as_str()) {
            Some("div") => "div",
            Some("even") => "even",
            Some("odd") => "odd",
            _ => return None,
        };
        consumed += words[idx].1;
        let by = words.get(idx + 1).is_some_and(|(w, _)| w == "by");
        if by {
            consumed += words[idx + 1].1;
        }
        let kind = match (parity, negated, by) {
            ("div", false, true) => TokenKind::IsDivBy,
            ("div", true, true) => TokenKind::IsNotDivBy,
            ("div", _, false) => return None,
            ("even", false, false) => TokenKind::IsEven,
            ("even", true, false) => TokenKind::IsNotEven,
            ("even", false, true) => TokenKind::IsEvenBy,
            ("even", true, true) => TokenKind::IsNotEvenBy,
            ("odd", false, false) => TokenKind::IsOdd,
            ("odd", true, false) => TokenKind::IsNotOdd,
            ("odd", false, true) => TokenKind::IsOddBy,
            ("odd", true, true) => TokenKind::IsNotOddBy,
            _ => return None,
        };
        Some((kind, consumed))
    }

    // --- double-quoted string mode ---

    fn lex_double_quote(&mut self) -> Result<Lexed> {
        if self.rest().is_empty() {
            return Err(StencilError::LexUnterminatedString(self.quote_line));
        }
        let line = self.line;
        let rest = self.rest();

        if rest.starts_with('"') {
            self.advance(1);
            self.modes.pop();
            self.prev = Prev::ValueLike;
            return Ok(Lexed::Tok(Token::new(TokenKind::QuoteEnd, line)));
        }
        if rest.starts_with(self.ldel.as_str()) {
            let after = &rest[self.ldel.len()..];
            if after.starts_with('/') {
                self.advance(self.ldel.len() + 1);
                self.modes.push(Mode::Tag);
                self.prev = Prev::None;
                return Ok(Lexed::Tok(Token::new(TokenKind::LdelSlash, line)));
            }
            let ws_follow = after.chars().next().map_or(true, |c| c.is_whitespace());
            if !(self.auto_literal && ws_follow) {
                self.advance(self.ldel.len());
                self.modes.push(Mode::Tag);
                self.prev = Prev::None;
                return Ok(Lexed::Tok(Token::new(TokenKind::Ldel, line)));
            }
            // falls through into the literal run below
        }
        if rest.starts_with('`') {
            self.advance(1);
            self.modes.push(Mode::Tag);
            self.prev = Prev::None;
            return Ok(Lexed::Tok(Token::new(TokenKind::Backtick, line)));
        }
        if rest.starts_with('$') {
            let name_len = rest[1..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .count();
            let starts_alpha = rest[1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
            if starts_alpha {
                let name = rest[1..1 + name_len].to_string();
                self.advance(1 + name_len);
                return Ok(Lexed::Tok(Token::new(
                    TokenKind::DollarIdInString(name),
                    line,
                )));
            }
        }

        // literal run with escape processing
        let mut out = String::new();
        let mut consumed = 0usize;
        let bytes = rest.as_bytes();
        while consumed < rest.len() {
            if !rest.is_char_boundary(consumed) {
                consumed += 1;
                continue;
            }
            let tail = &rest[consumed..];
            if consumed > 0
                && (tail.starts_with('"')
                    || tail.starts_with('$')
                    || tail.starts_with('`')
                    || tail.starts_with(self.ldel.as_str()))
            {
                break;
            }
            if bytes[consumed] == b'\\' && consumed + 1 < rest.len() {
                let escaped = bytes[consumed + 1];
                let replacement = match escaped {
                    b'"' => Some('"'),
                    b'\\' => Some('\\'),
                    b'$' => Some('$'),
                    b'`' => Some('`'),
                    b'n' => Some('\n'),
                    b't' => Some('\t'),
                    _ => None,
                };
                if let Some(c) = replacement {
                    out.push(c);
                    consumed += 2;
                    continue;
                }
            }
            let c = tail.chars().next().unwrap_or('\0');
            out.push(c);
            consumed += c.len_utf8();
        }
        self.advance(consumed);
        Ok(Lexed::Tok(Token::new(TokenKind::QuotedLiteral(out), line)))
    }

    // --- shared helpers ---

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn advance(&mut self, len: usize) {
        let consumed = &self.src[self.pos..self.pos + len];
        self.line += consumed.matches('\n').count();
        self.pos += len;
    }

    fn skip_tag_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        let ws = self.rest().len() - trimmed.len();
        if ws > 0 {
            self.advance(ws);
        }
    }

    fn unexpected_input(&self, _context: &str) -> StencilError {
        let excerpt: String = self.rest().chars().take(16).collect();
        StencilError::LexUnexpectedInput {
            line: self.line,
            excerpt: if excerpt.is_empty() {
                "<end of input>".to_string()
            } else {
                excerpt
            },
        }
    }

    /// Byte offset (from `pos`) where a linebreak run starts, if the very
    /// next characters are `[\t ]*[\r\n]`.
    fn linebreak_run_start(&self) -> Option<usize> {
        let rest = self.rest();
        let lead = rest.chars().take_while(|c| *c == ' ' || *c == '\t').count();
        match rest[lead..].chars().next() {
            Some('\n') | Some('\r') => Some(0),
            _ => None,
        }
    }

    fn take_linebreak_run(&mut self) -> String {
        let rest = self.rest();
        let mut len = rest.chars().take_while(|c| *c == ' ' || *c == '\t').count();
        len += rest[len..]
            .chars()
            .take_while(|c| *c == '\n' || *c == '\r')
            .count();
        len += rest[len..]
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .count();
        let run = rest[..len].to_string();
        self.advance(len);
        run
    }

    /// Match `ldel [ws] word [ws] rdel`. The spaced form is only recognized
    /// when `spaces` is allowed (literal tags) or auto-literal is disabled.
    fn match_word_tag(&self, word: &str, spaces: bool) -> Option<usize> {
        let rest = self.rest();
        let after = rest.strip_prefix(self.ldel.as_str())?;
        let allow_spaces = spaces || !self.auto_literal;
        let trimmed = if allow_spaces { after.trim_start() } else { after };
        let body = trimmed.strip_prefix(word)?;
        let body = if allow_spaces { body.trim_start() } else { body };
        if !body.starts_with(self.rdel.as_str()) {
            return None;
        }
        Some((rest.len() - body.len()) + self.rdel.len())
    }

    /// `<?...`, `?>`, `<%`, `%>` recognition (raw passthrough).
    fn match_raw_passthrough(&self) -> Option<String> {
        let rest = self.rest();
        if let Some(after) = rest.strip_prefix("<?") {
            let tail = if after.starts_with('=') {
                1
            } else {
                after
                    .chars()
                    .take_while(|c| c.is_ascii_alphabetic())
                    .count()
            };
            return Some(rest[..2 + tail].to_string());
        }
        for pat in ["?>", "<%", "%>"] {
            if rest.starts_with(pat) {
                return Some(pat.to_string());
            }
        }
        None
    }

    /// End of the current plain-text run: the earliest following boundary
    /// (tag delimiter, linebreak run, raw passthrough marker).
    fn text_boundary(&self) -> usize {
        let rest = self.rest();
        let mut end = rest.len();
        let mut probe = 0usize;
        while probe < rest.len() {
            if !rest.is_char_boundary(probe) {
                probe += 1;
                continue;
            }
            if probe > 0 {
                let tail = &rest[probe..];
                if tail.starts_with(self.ldel.as_str())
                    || tail.starts_with("<?")
                    || tail.starts_with("?>")
                    || tail.starts_with("<%")
                    || tail.starts_with("%>")
                {
                    end = probe;
                    break;
                }
                // a linebreak run swallows the horizontal whitespace before it
                if tail.starts_with('\n') || tail.starts_with('\r') {
                    let mut start = probe;
                    while start > 0 {
                        let b = rest.as_bytes()[start - 1];
                        if b == b' ' || b == b'\t' {
                            start -= 1;
                        } else {
                            break;
                        }
                    }
                    end = start.max(1);
                    break;
                }
            }
            probe += 1;
        }
        end
    }

    fn scan_single_quoted(&mut self) -> Result<(String, usize)> {
        let rest = self.rest();
        let mut out = String::new();
        let mut i = 1usize; // past the opening quote
        let bytes = rest.as_bytes();
        while i < rest.len() {
            match bytes[i] {
                b'\'' => return Ok((out, i + 1)),
                b'\\' if i + 1 < rest.len() && (bytes[i + 1] == b'\'' || bytes[i + 1] == b'\\') => {
                    out.push(bytes[i + 1] as char);
                    i += 2;
                }
                _ => {
                    let c = rest[i..].chars().next().unwrap_or('\0');
                    out.push(c);
                    i += c.len_utf8();
                }
            }
        }
        Err(StencilError::LexUnterminatedString(self.line))
    }
}
