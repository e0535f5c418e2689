/// Lexer tokens for pipeline scripts

use crate::ast::Span;

/// Raw piece of an interpolating string, before interpolations are parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringPart {
    Text(String),
    /// Source text of a `${...}` or `$name` interpolation, with its position
    Interpolation(String, Span),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Package,
    Import,
    Static,
    As,
    Class,
    Extends,
    Implements,
    Def,
    Return,
    If,
    Else,
    New,
    True,
    False,
    Null,
    Try,
    Catch,
    Finally,
    Throw,
    For,
    In,
    While,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Instanceof,
    Assert,

    // Literals
    Identifier(String),
    Integer(i64),
    Decimal(f64),
    /// Single-quoted, triple-single-quoted, or interpolation-free string
    String(String),
    /// Double-quoted or slashy string with interpolations
    GString(Vec<StringPart>),

    // Multi-character operators
    Arrow,
    SafeDot,
    Elvis,
    Range,
    RangeExclusive,
    Eq,
    Neq,
    Lte,
    Gte,
    Compare,
    FindMatch,
    ExactMatch,
    AndAnd,
    OrOr,
    PlusPlus,
    MinusMinus,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    LeftShift,
    Power,

    // Punctuation
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Colon,
    At,
    Dot,

    // Single-character operators
    Assign,
    Lt,
    Gt,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Question,
    Tilde,
    Ampersand,
    Pipe,
    Caret,

    End,
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("package", TokenKind::Package),
    ("import", TokenKind::Import),
    ("static", TokenKind::Static),
    ("as", TokenKind::As),
    ("class", TokenKind::Class),
    ("extends", TokenKind::Extends),
    ("implements", TokenKind::Implements),
    ("def", TokenKind::Def),
    ("return", TokenKind::Return),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("new", TokenKind::New),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
    ("null", TokenKind::Null),
    ("try", TokenKind::Try),
    ("catch", TokenKind::Catch),
    ("finally", TokenKind::Finally),
    ("throw", TokenKind::Throw),
    ("for", TokenKind::For),
    ("in", TokenKind::In),
    ("while", TokenKind::While),
    ("switch", TokenKind::Switch),
    ("case", TokenKind::Case),
    ("default", TokenKind::Default),
    ("break", TokenKind::Break),
    ("continue", TokenKind::Continue),
    ("instanceof", TokenKind::Instanceof),
    ("assert", TokenKind::Assert),
];

impl TokenKind {
    /// Map an identifier-shaped word to its keyword, if it is one
    pub fn keyword(word: &str) -> Option<TokenKind> {
        KEYWORDS
            .iter()
            .find(|(text, _)| *text == word)
            .map(|(_, kind)| kind.clone())
    }

    /// The word for identifiers and keywords. Property names and map keys may
    /// be any word: `params.default`, `[in: 1]`.
    pub fn word(&self) -> Option<&str> {
        match self {
            TokenKind::Identifier(name) => Some(name.as_str()),
            other => KEYWORDS
                .iter()
                .find(|(_, kind)| kind == other)
                .map(|(text, _)| *text),
        }
    }

    /// Whether the token can end an operand, so that a following `/` divides
    /// instead of opening a slashy string
    pub fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier(_)
                | TokenKind::Integer(_)
                | TokenKind::Decimal(_)
                | TokenKind::String(_)
                | TokenKind::GString(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line break separates this token from the previous one
    pub newline_before: bool,
}
