//! Tokenization of pipeline scripts using `nom`.
//!
//! Produces a flat token vector. Whitespace and comments are dropped, but each
//! token remembers whether a line break preceded it so the parser can find
//! statement boundaries. Double-quoted and slashy strings are split into text
//! and raw interpolation source, which the parser parses recursively.

use nom::{
    IResult, Offset, Parser,
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, digit1, hex_digit1, line_ending, not_line_ending, one_of, satisfy},
    combinator::{map, opt, recognize, value},
    multi::many0,
    sequence::{delimited, preceded},
};

use crate::ast::Span;
use crate::token::{StringPart, Token, TokenKind};

/// Error type for the lexer and parser
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    LexerError { message: String, span: Span },
    UnexpectedToken { expected: String, found: String, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::LexerError { span, .. } => *span,
            ParseError::UnexpectedToken { span, .. } => *span,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ParseError::LexerError { message, span } => {
                write!(f, "Lexer error at {}: {}", span, message)
            }
            ParseError::UnexpectedToken { expected, found, span } => {
                write!(f, "Unexpected token at {}: expected {}, found {}", span, expected, found)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// String piece as sliced from the source, before its position is known
enum RawPart<'a> {
    Text(String),
    Interpolation(&'a str),
}

/// What a single token combinator recognized
enum Lexeme<'a> {
    Token(TokenKind),
    GString(Vec<RawPart<'a>>),
}

fn unterminated(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Char))
}

/// `#!/usr/bin/env groovy` on the first line
fn shebang(input: &str) -> IResult<&str, &str> {
    preceded(tag("#!"), not_line_ending).parse(input)
}

/// Skippable items: whitespace, comments and line continuations.
/// Yields whether a line break was crossed.
fn skip_trivia(input: &str) -> IResult<&str, bool> {
    let newline = value(true, line_ending);
    let space = value(false, take_while1(|c: char| c.is_whitespace() && c != '\n'));
    let continuation = value(false, preceded(char('\\'), line_ending));
    let line_comment = value(false, preceded(tag("//"), not_line_ending));
    let block_comment = map(delimited(tag("/*"), take_until("*/"), tag("*/")), |body: &str| {
        body.contains('\n')
    });
    let (input, crossed) =
        many0(alt((newline, space, continuation, line_comment, block_comment))).parse(input)?;
    Ok((input, crossed.contains(&true)))
}

fn escape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'b' => '\u{8}',
        'f' => '\u{c}',
        '0' => '\0',
        other => other,
    }
}

/// `'text'` or `'''text'''`, never interpolated
fn single_quoted(input: &str) -> IResult<&str, Lexeme<'_>> {
    let (input, delimiter) = alt((tag("'''"), tag("'"))).parse(input)?;
    let triple = delimiter.len() == 3;
    let mut text = String::new();
    let mut chars = input.char_indices();
    loop {
        match chars.next() {
            Some((idx, '\'')) if !triple || input[idx..].starts_with(delimiter) => {
                let remaining = &input[idx + delimiter.len()..];
                return Ok((remaining, Lexeme::Token(TokenKind::String(text))));
            }
            Some((_, '\n')) if !triple => return Err(unterminated(input)),
            Some((_, '\\')) => match chars.next() {
                Some((_, c)) => text.push(escape(c)),
                None => return Err(unterminated(input)),
            },
            Some((_, c)) => text.push(c),
            None => return Err(unterminated(input)),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Identifier word. Letters are any Unicode letters: `größe`, `résumé`.
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize((satisfy(is_ident_start), take_while(is_ident_continue))).parse(input)
}

/// Body of `${...}` up to its closing brace, skipping braces inside nested
/// blocks and quoted strings
fn braced_source(input: &str) -> IResult<&str, &str> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = input.char_indices();
    while let Some((idx, c)) = chars.next() {
        match (quote, c) {
            (Some(_), '\\') => {
                chars.next();
            }
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '{') => depth += 1,
            (None, '}') if depth == 0 => return Ok((&input[idx + 1..], &input[..idx])),
            (None, '}') => depth -= 1,
            _ => {}
        }
    }
    Err(unterminated(input))
}

/// `${expr}` or `$name.prop` inside an interpolating string, yielding the
/// expression source. A `$` followed by anything else is plain text.
fn interpolation(input: &str) -> IResult<&str, &str> {
    let dotted_name = recognize((identifier, many0(preceded(char('.'), identifier))));
    preceded(char('$'), alt((preceded(char('{'), braced_source), dotted_name))).parse(input)
}

/// Content of an interpolating string up to `delimiter`. Slashy strings only
/// treat `\/` as an escape so regular expressions keep their backslashes.
fn interpolated_body<'a>(
    input: &'a str,
    delimiter: &str,
    multiline: bool,
    slashy: bool,
) -> IResult<&'a str, Lexeme<'a>> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut rest = input;
    loop {
        if let Some(after) = rest.strip_prefix(delimiter) {
            rest = after;
            break;
        }
        let Some(c) = rest.chars().next() else {
            return Err(unterminated(input));
        };
        match c {
            '\n' if !multiline => return Err(unterminated(input)),
            '\\' if slashy => {
                if rest[1..].starts_with('/') {
                    text.push('/');
                    rest = &rest[2..];
                } else {
                    text.push('\\');
                    rest = &rest[1..];
                }
            }
            '\\' => match rest[1..].chars().next() {
                Some(escaped) => {
                    text.push(escape(escaped));
                    rest = &rest[1 + escaped.len_utf8()..];
                }
                None => return Err(unterminated(input)),
            },
            '$' => match interpolation(rest) {
                Ok((after, source)) => {
                    if !text.is_empty() {
                        parts.push(RawPart::Text(std::mem::take(&mut text)));
                    }
                    parts.push(RawPart::Interpolation(source));
                    rest = after;
                }
                Err(nom::Err::Error(_)) => {
                    text.push('$');
                    rest = &rest[1..];
                }
                Err(e) => return Err(e),
            },
            _ => {
                text.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    if parts.is_empty() {
        return Ok((rest, Lexeme::Token(TokenKind::String(text))));
    }
    if !text.is_empty() {
        parts.push(RawPart::Text(text));
    }
    Ok((rest, Lexeme::GString(parts)))
}

/// `"text ${expr}"` or `"""text"""`
fn double_quoted(input: &str) -> IResult<&str, Lexeme<'_>> {
    let (input, delimiter) = alt((tag("\"\"\""), tag("\""))).parse(input)?;
    interpolated_body(input, delimiter, delimiter.len() == 3, false)
}

/// `/pattern/`, only where an operand may start
fn slashy_string(input: &str) -> IResult<&str, Lexeme<'_>> {
    let (input, _) = char('/')(input)?;
    interpolated_body(input, "/", true, true)
}

fn hex_digits(input: &str) -> IResult<&str, &str> {
    preceded(alt((tag("0x"), tag("0X"))), hex_digit1).parse(input)
}

/// Integer or decimal literal with optional `_` separators and type suffix
fn number(input: &str) -> IResult<&str, TokenKind> {
    let invalid = || nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Digit));

    if let Ok((rest, digits)) = hex_digits(input) {
        let parsed = i64::from_str_radix(digits, 16).map_err(|_| invalid())?;
        let (rest, _) = opt(one_of("lLgGiI")).parse(rest)?;
        return Ok((rest, TokenKind::Integer(parsed)));
    }

    let (rest, whole) =
        recognize((digit1, take_while(|c: char| c.is_ascii_digit() || c == '_'))).parse(input)?;
    let (rest, fraction) = opt(recognize((char('.'), digit1))).parse(rest)?;
    let (rest, exponent) = opt(recognize((one_of("eE"), opt(one_of("+-")), digit1))).parse(rest)?;
    let (rest, suffix) = opt(one_of("lLgGiIdDfF")).parse(rest)?;

    let text = [Some(whole), fraction, exponent]
        .into_iter()
        .flatten()
        .collect::<String>()
        .replace('_', "");
    let is_decimal = fraction.is_some()
        || exponent.is_some()
        || matches!(suffix, Some('d' | 'D' | 'f' | 'F'));
    let kind = if is_decimal {
        text.parse::<f64>().map(TokenKind::Decimal).map_err(|_| invalid())?
    } else {
        text.parse::<i64>().map(TokenKind::Integer).map_err(|_| invalid())?
    };
    Ok((rest, kind))
}

fn identifier_or_keyword(input: &str) -> IResult<&str, TokenKind> {
    let (input, word) = identifier(input)?;
    let kind = TokenKind::keyword(word).unwrap_or_else(|| TokenKind::Identifier(word.to_string()));
    Ok((input, kind))
}

/// Multi-character operators, longest first
fn operator(input: &str) -> IResult<&str, TokenKind> {
    alt((
        alt((
            value(TokenKind::ExactMatch, tag("==~")),
            value(TokenKind::Compare, tag("<=>")),
            value(TokenKind::RangeExclusive, tag("..<")),
        )),
        alt((
            value(TokenKind::Arrow, tag("->")),
            value(TokenKind::SafeDot, tag("?.")),
            value(TokenKind::Elvis, tag("?:")),
            value(TokenKind::Range, tag("..")),
            value(TokenKind::Eq, tag("==")),
            value(TokenKind::Neq, tag("!=")),
            value(TokenKind::Lte, tag("<=")),
            value(TokenKind::Gte, tag(">=")),
            value(TokenKind::FindMatch, tag("=~")),
            value(TokenKind::AndAnd, tag("&&")),
            value(TokenKind::OrOr, tag("||")),
            value(TokenKind::PlusPlus, tag("++")),
            value(TokenKind::MinusMinus, tag("--")),
            value(TokenKind::PlusAssign, tag("+=")),
            value(TokenKind::MinusAssign, tag("-=")),
            value(TokenKind::StarAssign, tag("*=")),
            value(TokenKind::SlashAssign, tag("/=")),
            value(TokenKind::PercentAssign, tag("%=")),
            value(TokenKind::LeftShift, tag("<<")),
            value(TokenKind::Power, tag("**")),
        )),
    ))
    .parse(input)
}

fn punctuation(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::LBrace, char('{')),
        value(TokenKind::RBrace, char('}')),
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::LBracket, char('[')),
        value(TokenKind::RBracket, char(']')),
        value(TokenKind::Semicolon, char(';')),
        value(TokenKind::Comma, char(',')),
        value(TokenKind::Colon, char(':')),
        value(TokenKind::At, char('@')),
        value(TokenKind::Dot, char('.')),
        value(TokenKind::Assign, char('=')),
        value(TokenKind::Lt, char('<')),
        value(TokenKind::Gt, char('>')),
        value(TokenKind::Plus, char('+')),
        value(TokenKind::Minus, char('-')),
        value(TokenKind::Star, char('*')),
        value(TokenKind::Slash, char('/')),
        value(TokenKind::Percent, char('%')),
        value(TokenKind::Bang, char('!')),
        alt((
            value(TokenKind::Question, char('?')),
            value(TokenKind::Tilde, char('~')),
            value(TokenKind::Ampersand, char('&')),
            value(TokenKind::Pipe, char('|')),
            value(TokenKind::Caret, char('^')),
        )),
    ))
    .parse(input)
}

/// Parses a single token (after trivia has been skipped).
fn single_token(input: &str) -> IResult<&str, Lexeme<'_>> {
    alt((
        single_quoted,
        double_quoted,
        map(
            alt((number, identifier_or_keyword, operator, punctuation)),
            Lexeme::Token,
        ),
    ))
    .parse(input)
}

/// Tokenizer over one source text. Interpolations are lexed again later as
/// fragments that start somewhere inside the enclosing source.
pub struct Lexer<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
    origin: Span,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_position(source, Span::new(1, 1))
    }

    /// Lex a fragment that starts at `origin` in some enclosing source
    pub fn with_position(source: &'a str, origin: Span) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        Self { source, line_starts, origin }
    }

    /// Position of `rest`, a suffix or slice of the source
    fn span_at(&self, rest: &str) -> Span {
        let offset = self.source.offset(rest);
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let column = self.source[self.line_starts[line]..offset].chars().count();
        if line == 0 {
            Span::new(self.origin.line, self.origin.column + column)
        } else {
            Span::new(self.origin.line + line, column + 1)
        }
    }

    fn error_at(&self, rest: &str) -> ParseError {
        let message = if rest.starts_with("/*") {
            "unterminated block comment".to_string()
        } else {
            match rest.chars().next() {
                Some('\'' | '"') => "unterminated string literal".to_string(),
                Some(c) if c.is_ascii_digit() => "invalid number literal".to_string(),
                Some(c) => format!("unexpected character '{}'", c),
                None => "unexpected end of input".to_string(),
            }
        };
        ParseError::LexerError { message, span: self.span_at(rest) }
    }

    /// Tokenize the whole input. The last token is always `End`.
    pub fn tokenize(self) -> Result<Vec<Token>, ParseError> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut remaining = self.source;
        if let Ok((rest, _)) = shebang(remaining) {
            remaining = rest;
        }

        loop {
            let (rest, newline_before) =
                skip_trivia(remaining).map_err(|_| self.error_at(remaining))?;
            remaining = rest;
            let span = self.span_at(remaining);

            if remaining.is_empty() {
                tokens.push(Token { kind: TokenKind::End, span, newline_before });
                return Ok(tokens);
            }
            if remaining.starts_with("/*") {
                return Err(self.error_at(remaining));
            }

            let divides = matches!(tokens.last(), Some(t) if t.kind.ends_operand());
            let slashy = if !divides && remaining.starts_with('/') {
                slashy_string(remaining).ok()
            } else {
                None
            };
            let (rest, lexeme) = match slashy {
                Some(found) => found,
                None => single_token(remaining).map_err(|_| self.error_at(remaining))?,
            };

            let kind = match lexeme {
                Lexeme::Token(kind) => kind,
                Lexeme::GString(parts) => TokenKind::GString(
                    parts
                        .into_iter()
                        .map(|part| match part {
                            RawPart::Text(text) => StringPart::Text(text),
                            RawPart::Interpolation(source) => {
                                StringPart::Interpolation(source.to_string(), self.span_at(source))
                            }
                        })
                        .collect(),
                ),
            };
            tokens.push(Token { kind, span, newline_before });
            remaining = rest;
        }
    }
}

/// Tokenize a complete source text
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(input).tokenize()
}
