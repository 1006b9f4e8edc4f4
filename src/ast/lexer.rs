//! Tokenizer for Eidos scripts. Token kinds are produced by a generated
//! [`logos`] lexer; [`tokenize`] wraps them with the source text they span
//! and with byte and UTF-16 offsets, both computed here and never derived
//! later.

use core::fmt;

use logos::Logos;

use crate::global::termination::{EidosError, EidosResult, SourceSpan};

fn unescape(raw: &str, quote: char) -> Option<String> {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            _ => return None,
        }
    }
    let _ = quote;
    Some(out)
}

fn parse_integer(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
// single line comments
#[logos(skip r"//[^\n]*")]
// multiline comments
#[logos(skip r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/")]
#[rustfmt::skip]
pub enum TokenKind {
    // Operators & separators
    #[token("(")] LeftParen,
    #[token(")")] RightParen,
    #[token("[")] LeftBracket,
    #[token("]")] RightBracket,
    #[token("{")] LeftBrace,
    #[token("}")] RightBrace,

    #[token("=")] Assign,
    #[token("==")] Equal,
    #[token("!=")] NotEqual,
    #[token("<")] Less,
    #[token("<=")] LessEqual,
    #[token(">")] Greater,
    #[token(">=")] GreaterEqual,

    #[token("+")] Plus,
    #[token("-")] Minus,
    #[token("*")] Star,
    #[token("/")] Slash,
    #[token("%")] Percent,
    #[token("^")] Caret,
    #[token("!")] Not,
    #[token("&")] Ampersand,
    #[token("|")] Pipe,
    #[token(":")] Colon,
    #[token(".")] Dot,
    #[token(",")] Comma,
    #[token(";")] Semicolon,
    #[token("?")] Question,

    // Keywords
    #[token("if")] If,
    #[token("else")] Else,
    #[token("do")] Do,
    #[token("while")] While,
    #[token("for")] For,
    #[token("in")] In,
    #[token("next")] Next,
    #[token("break")] Break,
    #[token("return")] Return,
    #[token("function")] Function,

    // Literals
    #[regex(r"[0-9]+\.[0-9]*(?:[eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    FloatLiteral(f64),

    #[regex(r"0[xX][0-9a-fA-F]+", |lex| parse_integer(lex.slice()))]
    #[regex(r"[0-9]+", |lex| parse_integer(lex.slice()))]
    IntegerLiteral(i64),

    #[regex(r#""(?:\\.|[^\\"])*""#, |lex| unescape(lex.slice(), '"'))]
    #[regex(r#"'(?:\\.|[^\\'])*'"#, |lex| unescape(lex.slice(), '\''))]
    StringLiteral(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned(), priority = 1)]
    Identifier(String),

    /// Synthetic end-of-input marker appended by [`tokenize`].
    Eof,
}

impl TokenKind {
    pub fn is_keyword(text: &str) -> bool {
        matches!(
            text,
            "if" | "else" | "do" | "while" | "for" | "in" | "next" | "break" | "return"
                | "function"
        )
    }

    /// Short description used in parse diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Identifier(name) => format!("identifier \"{name}\""),
            TokenKind::IntegerLiteral(x) => format!("integer literal {x}"),
            TokenKind::FloatLiteral(x) => format!("float literal {x}"),
            TokenKind::StringLiteral(s) => format!("string literal \"{s}\""),
            TokenKind::Eof => "end of script".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::Assign => "=",
            TokenKind::Equal => "==",
            TokenKind::NotEqual => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Caret => "^",
            TokenKind::Not => "!",
            TokenKind::Ampersand => "&",
            TokenKind::Pipe => "|",
            TokenKind::Colon => ":",
            TokenKind::Dot => ".",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Question => "?",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Do => "do",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Next => "next",
            TokenKind::Break => "break",
            TokenKind::Return => "return",
            TokenKind::Function => "function",
            _ => "?",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// A lexed token: kind, the exact source text it spans, and its position in
/// both byte and UTF-16 offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: SourceSpan,
}

impl Token {
    pub fn eof(span: SourceSpan) -> Self {
        Token {
            kind: TokenKind::Eof,
            text: String::new(),
            span,
        }
    }
}

/// Tracks the UTF-16 offset corresponding to a monotonically advancing byte
/// offset in the source.
struct Utf16Cursor<'a> {
    source: &'a str,
    byte: usize,
    utf16: usize,
}

impl<'a> Utf16Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Utf16Cursor {
            source,
            byte: 0,
            utf16: 0,
        }
    }

    fn advance_to(&mut self, byte_offset: usize) -> usize {
        debug_assert!(byte_offset >= self.byte);
        self.utf16 += self.source[self.byte..byte_offset]
            .chars()
            .map(char::len_utf16)
            .sum::<usize>();
        self.byte = byte_offset;
        self.utf16
    }
}

fn lex_error_message(slice: &str) -> String {
    let mut chars = slice.chars();
    match chars.next() {
        Some('"') | Some('\'') => {
            if slice.len() >= 2 && slice.ends_with(['"', '\'']) {
                format!("illegal escape sequence in string literal {slice}")
            } else {
                "unterminated string literal".to_string()
            }
        }
        Some(c) if c.is_ascii_digit() => format!("malformed numeric literal \"{slice}\""),
        Some(c) => format!("unrecognized character '{c}'"),
        None => "unexpected end of script".to_string(),
    }
}

/// Lexes a whole script into tokens, appending a synthetic EOF token. The
/// first lex failure is reported with its source span.
pub fn tokenize(source: &str) -> EidosResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut cursor = Utf16Cursor::new(source);
    let mut lexer = TokenKind::lexer(source);
    while let Some(result) = lexer.next() {
        let bytes = lexer.span();
        let utf16_start = cursor.advance_to(bytes.start);
        let utf16_end = cursor.advance_to(bytes.end);
        let span = SourceSpan::new(bytes.clone(), utf16_start..utf16_end);
        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                text: source[bytes].to_string(),
                span,
            }),
            Err(()) => {
                return Err(
                    EidosError::lex("tokenize", lex_error_message(lexer.slice())).with_span(span),
                );
            }
        }
    }
    let end_utf16 = cursor.advance_to(source.len());
    tokens.push(Token::eof(SourceSpan::new(
        source.len()..source.len(),
        end_utf16..end_utf16,
    )));
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn basic_expression() {
        assert_eq!(
            kinds("x = 1 + 2;"),
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Assign,
                TokenKind::IntegerLiteral(1),
                TokenKind::Plus,
                TokenKind::IntegerLiteral(2),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn float_and_integer_literals() {
        assert_eq!(
            kinds("1.5 2. 3e2 0x1F 42"),
            vec![
                TokenKind::FloatLiteral(1.5),
                TokenKind::FloatLiteral(2.0),
                TokenKind::FloatLiteral(300.0),
                TokenKind::IntegerLiteral(31),
                TokenKind::IntegerLiteral(42),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("for x in while_"),
            vec![
                TokenKind::For,
                TokenKind::Identifier("x".into()),
                TokenKind::In,
                TokenKind::Identifier("while_".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\tb" 'c\'d'"#),
            vec![
                TokenKind::StringLiteral("a\tb".into()),
                TokenKind::StringLiteral("c'd".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 // trailing\n/* block\ncomment */ 2"),
            vec![
                TokenKind::IntegerLiteral(1),
                TokenKind::IntegerLiteral(2),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn two_character_operators_win() {
        assert_eq!(
            kinds("a<=b!=c==d"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::LessEqual,
                TokenKind::Identifier("b".into()),
                TokenKind::NotEqual,
                TokenKind::Identifier("c".into()),
                TokenKind::Equal,
                TokenKind::Identifier("d".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn spans_cover_source_text() {
        let tokens = tokenize("x = 10;").unwrap();
        assert_eq!(tokens[2].text, "10");
        assert_eq!(tokens[2].span.bytes, 4..6);
        assert_eq!(tokens[2].span.utf16, 4..6);
    }

    #[test]
    fn utf16_offsets_differ_for_multibyte_source() {
        // 𝛑 is one code point, four UTF-8 bytes, two UTF-16 units.
        let tokens = tokenize("s = \"\u{1D6D1}\"; t = 1;").unwrap();
        let string_token = &tokens[2];
        assert_eq!(string_token.span.bytes, 4..10);
        assert_eq!(string_token.span.utf16, 4..8);
        let t_token = &tokens[4];
        assert_eq!(t_token.text, "t");
        assert_eq!(t_token.span.bytes, 12..13);
        assert_eq!(t_token.span.utf16, 10..11);
    }

    #[test]
    fn unterminated_string_is_a_lex_error() {
        let err = tokenize("x = \"abc").unwrap_err();
        assert_eq!(err.kind, crate::global::termination::ErrorKind::Lex);
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn bad_escape_is_a_lex_error() {
        let err = tokenize(r#"x = "a\qb";"#).unwrap_err();
        assert_eq!(err.kind, crate::global::termination::ErrorKind::Lex);
    }

    #[test]
    fn unrecognized_character_is_a_lex_error() {
        let err = tokenize("x = 1 @ 2;").unwrap_err();
        assert!(err.message.contains("unrecognized character"));
        assert_eq!(err.span.unwrap().bytes, 6..7);
    }
}
