//! Logos-derived lexer for the CEL surface syntax.
//!
//! String and bytes literals are captured whole (prefixes and quotes
//! included); classification and unescaping happen in [`crate::escape`].

use logos::Logos;
use std::ops::Range;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip(r"//[^\n]*", allow_greedy = true))]
pub enum Token<'src> {
    #[token("&&")]
    AndAnd,

    #[token("||")]
    OrOr,

    #[token("<=")]
    LessEq,

    #[token("<")]
    Less,

    #[token(">=")]
    GreaterEq,

    #[token(">")]
    Greater,

    #[token("==")]
    EqEq,

    #[token("!=")]
    NotEq,

    #[token("!")]
    Bang,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("?")]
    Question,

    #[token(":")]
    Colon,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(",")]
    Comma,

    #[token(".")]
    Dot,

    #[token("true", priority = 10)]
    True,

    #[token("false", priority = 10)]
    False,

    #[token("null", priority = 10)]
    Null,

    #[token("in", priority = 10)]
    In,

    #[regex(r"[_a-zA-Z][_a-zA-Z0-9]*")]
    Ident(&'src str),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?|[0-9]+[eE][+-]?[0-9]+|\.[0-9]+([eE][+-]?[0-9]+)?")]
    FloatLit(&'src str),

    #[regex(r"0[xX][0-9a-fA-F]+[uU]")]
    HexUintLit(&'src str),

    #[regex(r"0[xX][0-9a-fA-F]+")]
    HexIntLit(&'src str),

    #[regex(r"[0-9]+[uU]")]
    UintLit(&'src str),

    #[regex(r"[0-9]+")]
    IntLit(&'src str),

    #[regex(r#"[rRbB]*"""([^"]|"[^"]|""[^"])*""""#)]
    #[regex(r"[rRbB]*'''([^']|'[^']|''[^'])*'''")]
    #[regex(r#"[rRbB]*"([^"\\\n\r]|\\[^\n\r])*""#)]
    #[regex(r"[rRbB]*'([^'\\\n\r]|\\[^\n\r])*'")]
    StringLit(&'src str),
}

/// One token with its byte span in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexed<'src> {
    pub token: Token<'src>,
    pub span: Range<usize>,
}

/// A span the lexer could not tokenize.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Range<usize>,
    pub message: String,
}

/// Tokenize the whole input, collecting unrecognized spans as errors.
///
/// Adjacent unrecognized bytes are merged into a single error so an
/// unterminated string reports once, not per character.
pub fn tokenize(text: &str) -> (Vec<Lexed<'_>>, Vec<LexError>) {
    let mut tokens = Vec::new();
    let mut errors: Vec<LexError> = Vec::new();
    let mut lexer = Token::lexer(text);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push(Lexed { token, span }),
            Err(()) => {
                if let Some(last) = errors.last_mut()
                    && last.span.end == span.start
                {
                    last.span.end = span.end;
                } else {
                    let fragment = &text[span.clone()];
                    let message = if fragment.starts_with('"') || fragment.starts_with('\'') {
                        "unterminated string literal".to_owned()
                    } else {
                        format!("unexpected character {fragment:?}")
                    };
                    errors.push(LexError { span, message });
                }
            }
        }
    }

    (tokens, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<Token<'_>> {
        let (tokens, errors) = tokenize(text);
        assert!(errors.is_empty(), "lex errors: {errors:?}");
        tokens.into_iter().map(|l| l.token).collect()
    }

    #[test]
    fn operators_and_punctuation() {
        assert_eq!(
            kinds("a && b || !c"),
            vec![
                Token::Ident("a"),
                Token::AndAnd,
                Token::Ident("b"),
                Token::OrOr,
                Token::Bang,
                Token::Ident("c"),
            ]
        );
    }

    #[test]
    fn relation_tokens_prefer_longest() {
        assert_eq!(
            kinds("a <= b >= c != d"),
            vec![
                Token::Ident("a"),
                Token::LessEq,
                Token::Ident("b"),
                Token::GreaterEq,
                Token::Ident("c"),
                Token::NotEq,
                Token::Ident("d"),
            ]
        );
    }

    #[test]
    fn keywords_beat_identifiers() {
        assert_eq!(
            kinds("true false null in insider"),
            vec![
                Token::True,
                Token::False,
                Token::Null,
                Token::In,
                Token::Ident("insider"),
            ]
        );
    }

    #[test]
    fn numeric_literals() {
        assert_eq!(
            kinds("42 42u 0x2A 0x2Au 1.5 1e3 .25"),
            vec![
                Token::IntLit("42"),
                Token::UintLit("42u"),
                Token::HexIntLit("0x2A"),
                Token::HexUintLit("0x2Au"),
                Token::FloatLit("1.5"),
                Token::FloatLit("1e3"),
                Token::FloatLit(".25"),
            ]
        );
    }

    #[test]
    fn string_forms() {
        assert_eq!(
            kinds(r#""hi" 'there' r"\d+" b"abc" """triple "quoted" body""""#),
            vec![
                Token::StringLit(r#""hi""#),
                Token::StringLit("'there'"),
                Token::StringLit(r#"r"\d+""#),
                Token::StringLit(r#"b"abc""#),
                Token::StringLit(r#""""triple "quoted" body""""#),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("a // trailing comment\n+ b"),
            vec![Token::Ident("a"), Token::Plus, Token::Ident("b")]
        );
    }

    #[test]
    fn unterminated_string_reports_once() {
        let (_, errors) = tokenize(r#"a == "oops"#);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "unterminated string literal");
    }
}
