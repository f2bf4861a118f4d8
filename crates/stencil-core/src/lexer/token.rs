//! Token types produced by the template lexer

/// A single lexed token with the line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize) -> Self {
        Token { kind, line }
    }

    /// Short human-readable description used in parse error messages.
    pub fn describe(&self) -> String {
        self.kind.describe()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // --- text mode ---
    /// Literal output text run.
    Text(String),
    /// Whitespace run containing at least one newline (dropped under strip).
    Linebreak(String),
    /// The `{$smarty.block.child}` insertion marker.
    BlockChild,
    /// `<?`/`?>`/`<%`/`%>` runs, re-emitted as inert literal text.
    RawPassthrough(String),
    LiteralStart,
    LiteralEnd,
    /// Verbatim run inside a literal block.
    Literal(String),

    // --- tag boundaries ---
    /// Opening delimiter of a tag.
    Ldel,
    /// Opening delimiter of a closing tag (`{/`).
    LdelSlash,
    /// Closing delimiter of a tag.
    Rdel,

    // --- tag mode ---
    Ident(String),
    Dollar,
    Integer(String),
    Float(String),
    Hex(String),
    SingleString(String),

    // --- double-quoted string mode ---
    QuoteStart,
    QuoteEnd,
    QuotedLiteral(String),
    /// Bare `$name` inside a double-quoted string.
    DollarIdInString(String),
    /// Backtick bracketing an embedded expression in a string.
    Backtick,

    // --- operators ---
    Identity,    // ===
    NonIdentity, // !==
    Eq,          // == eq
    Ne,          // != <> ne neq
    Ge,          // >= ge gte
    Le,          // <= le lte
    Gt,          // > gt
    Lt,          // < lt
    Not,         // ! not
    And,         // && and
    Or,          // || or
    Xor,         // xor
    IsDivBy,
    IsNotDivBy,
    IsEven,
    IsNotEven,
    IsEvenBy,
    IsNotEvenBy,
    IsOdd,
    IsNotOdd,
    IsOddBy,
    IsNotOddBy,
    As,
    To,
    Step,

    // --- punctuation ---
    OpenP,
    CloseP,
    OpenB,
    CloseB,
    Ptr,  // ->
    Aptr, // =>
    Equal,
    Plus,
    Minus,
    Star,
    Slash,
    Percent, // % mod
    Dot,
    Comma,
    Colon,
    Semicolon,
    At,
    Qmark,
    Vert,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Text(_) => "text".to_string(),
            TokenKind::Linebreak(_) => "newline".to_string(),
            TokenKind::BlockChild => "block child marker".to_string(),
            TokenKind::RawPassthrough(s) => format!("'{}'", s),
            TokenKind::LiteralStart => "literal start".to_string(),
            TokenKind::LiteralEnd => "literal close".to_string(),
            TokenKind::Literal(_) => "literal text".to_string(),
            TokenKind::Ldel => "tag open".to_string(),
            TokenKind::LdelSlash => "closing tag open".to_string(),
            TokenKind::Rdel => "tag close".to_string(),
            TokenKind::Ident(s) => format!("identifier '{}'", s),
            TokenKind::Dollar => "'$'".to_string(),
            TokenKind::Integer(s) | TokenKind::Float(s) | TokenKind::Hex(s) => {
                format!("number '{}'", s)
            }
            TokenKind::SingleString(_) => "string".to_string(),
            TokenKind::QuoteStart | TokenKind::QuoteEnd => "'\"'".to_string(),
            TokenKind::QuotedLiteral(_) => "string text".to_string(),
            TokenKind::DollarIdInString(s) => format!("'${}'", s),
            TokenKind::Backtick => "'`'".to_string(),
            TokenKind::Identity => "'==='".to_string(),
            TokenKind::NonIdentity => "'!=='".to_string(),
            TokenKind::Eq => "'==' or 'eq'".to_string(),
            TokenKind::Ne => "'!=' or 'ne'".to_string(),
            TokenKind::Ge => "'>=' or 'ge'".to_string(),
            TokenKind::Le => "'<=' or 'le'".to_string(),
            TokenKind::Gt => "'>' or 'gt'".to_string(),
            TokenKind::Lt => "'<' or 'lt'".to_string(),
            TokenKind::Not => "'!' or 'not'".to_string(),
            TokenKind::And => "'&&' or 'and'".to_string(),
            TokenKind::Or => "'||' or 'or'".to_string(),
            TokenKind::Xor => "'xor'".to_string(),
            TokenKind::IsDivBy => "'is div by'".to_string(),
            TokenKind::IsNotDivBy => "'is not div by'".to_string(),
            TokenKind::IsEven => "'is even'".to_string(),
            TokenKind::IsNotEven => "'is not even'".to_string(),
            TokenKind::IsEvenBy => "'is even by'".to_string(),
            TokenKind::IsNotEvenBy => "'is not even by'".to_string(),
            TokenKind::IsOdd => "'is odd'".to_string(),
            TokenKind::IsNotOdd => "'is not odd'".to_string(),
            TokenKind::IsOddBy => "'is odd by'".to_string(),
            TokenKind::IsNotOddBy => "'is not odd by'".to_string(),
            TokenKind::As => "'as'".to_string(),
            TokenKind::To => "'to'".to_string(),
            TokenKind::Step => "'step'".to_string(),
            TokenKind::OpenP => "'('".to_string(),
            TokenKind::CloseP => "')'".to_string(),
            TokenKind::OpenB => "'['".to_string(),
            TokenKind::CloseB => "']'".to_string(),
            TokenKind::Ptr => "'->'".to_string(),
            TokenKind::Aptr => "'=>'".to_string(),
            TokenKind::Equal => "'='".to_string(),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Slash => "'/'".to_string(),
            TokenKind::Percent => "'%' or 'mod'".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::Semicolon => "';'".to_string(),
            TokenKind::At => "'@'".to_string(),
            TokenKind::Qmark => "'?'".to_string(),
            TokenKind::Vert => "'|'".to_string(),
        }
    }
}
