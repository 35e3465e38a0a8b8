//! Classification and unescaping of string and bytes literals.
//!
//! The lexer hands over the whole literal text: optional `r`/`b` prefixes
//! (either order, at most one of each), then a single-, double-, or
//! triple-quoted body. Raw literals skip escape processing; bytes literals
//! produce raw bytes for `\x` and octal escapes.

use celang_core::ast::Constant;

/// Unescaping failure with a byte offset into the raw literal text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct EscapeError {
    pub message: String,
    pub offset: usize,
}

fn err(message: impl Into<String>, offset: usize) -> EscapeError {
    EscapeError {
        message: message.into(),
        offset,
    }
}

/// Decode a raw literal (as captured by the lexer) into a string or bytes
/// constant.
pub fn parse_string_literal(raw: &str) -> Result<Constant, EscapeError> {
    let mut is_raw = false;
    let mut is_bytes = false;
    let mut rest = raw;
    let mut consumed = 0usize;

    loop {
        let Some(c) = rest.chars().next() else {
            return Err(err("empty literal", 0));
        };
        match c {
            'r' | 'R' if !is_raw => is_raw = true,
            'b' | 'B' if !is_bytes => is_bytes = true,
            '\'' | '"' => break,
            _ => return Err(err(format!("invalid literal prefix {c:?}"), consumed)),
        }
        rest = &rest[1..];
        consumed += 1;
    }

    let quote = rest.as_bytes()[0] as char;
    let (body, quote_len) = if rest.len() >= 6 && rest.starts_with(&quote.to_string().repeat(3)) {
        (&rest[3..rest.len() - 3], 3)
    } else if rest.len() >= 2 {
        (&rest[1..rest.len() - 1], 1)
    } else {
        return Err(err("unterminated literal", consumed));
    };
    let body_offset = consumed + quote_len;

    if is_raw {
        return Ok(if is_bytes {
            Constant::Bytes(body.as_bytes().to_vec())
        } else {
            Constant::String(body.to_owned())
        });
    }

    let mut bytes: Vec<u8> = Vec::with_capacity(body.len());
    let mut chars = body.char_indices().peekable();

    while let Some((at, c)) = chars.next() {
        if c != '\\' {
            push_char(&mut bytes, c);
            continue;
        }
        let offset = body_offset + at;
        let Some((_, esc)) = chars.next() else {
            return Err(err("trailing backslash", offset));
        };
        match esc {
            'n' => bytes.push(b'\n'),
            'r' => bytes.push(b'\r'),
            't' => bytes.push(b'\t'),
            'a' => bytes.push(0x07),
            'b' => bytes.push(0x08),
            'f' => bytes.push(0x0C),
            'v' => bytes.push(0x0B),
            '\\' => bytes.push(b'\\'),
            '\'' => bytes.push(b'\''),
            '"' => bytes.push(b'"'),
            '`' => bytes.push(b'`'),
            '?' => bytes.push(b'?'),
            'x' | 'X' => {
                let value = take_hex(&mut chars, 2, offset)?;
                if is_bytes {
                    bytes.push(value as u8);
                } else {
                    push_code_point(&mut bytes, value, offset)?;
                }
            }
            'u' => {
                let value = take_hex(&mut chars, 4, offset)?;
                push_code_point(&mut bytes, value, offset)?;
            }
            'U' => {
                let value = take_hex(&mut chars, 8, offset)?;
                push_code_point(&mut bytes, value, offset)?;
            }
            '0'..='3' => {
                let mut value = esc as u32 - '0' as u32;
                for _ in 0..2 {
                    match chars.next() {
                        Some((_, d)) if d.is_digit(8) => {
                            value = value * 8 + d.to_digit(8).unwrap();
                        }
                        _ => return Err(err("octal escape needs three digits", offset)),
                    }
                }
                if is_bytes {
                    bytes.push(value as u8);
                } else {
                    push_code_point(&mut bytes, value, offset)?;
                }
            }
            other => return Err(err(format!("invalid escape sequence \\{other}"), offset)),
        }
    }

    Ok(if is_bytes {
        Constant::Bytes(bytes)
    } else {
        // Non-raw string bodies only ever receive valid UTF-8 pushes.
        Constant::String(String::from_utf8(bytes).map_err(|_| {
            err("string literal is not valid UTF-8", body_offset)
        })?)
    })
}

fn push_char(bytes: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

fn push_code_point(bytes: &mut Vec<u8>, value: u32, offset: usize) -> Result<(), EscapeError> {
    let c = char::from_u32(value)
        .ok_or_else(|| err(format!("invalid code point U+{value:04X}"), offset))?;
    push_char(bytes, c);
    Ok(())
}

fn take_hex(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    count: usize,
    offset: usize,
) -> Result<u32, EscapeError> {
    let mut value = 0u32;
    for _ in 0..count {
        match chars.next() {
            Some((_, d)) if d.is_ascii_hexdigit() => {
                value = value * 16 + d.to_digit(16).unwrap();
            }
            _ => return Err(err("invalid hex escape", offset)),
        }
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(raw: &str) -> String {
        match parse_string_literal(raw).unwrap() {
            Constant::String(s) => s,
            other => panic!("expected string, got {other:?}"),
        }
    }

    fn bytes(raw: &str) -> Vec<u8> {
        match parse_string_literal(raw).unwrap() {
            Constant::Bytes(b) => b,
            other => panic!("expected bytes, got {other:?}"),
        }
    }

    #[test]
    fn plain_strings() {
        assert_eq!(string(r#""hello""#), "hello");
        assert_eq!(string("'hello'"), "hello");
        assert_eq!(string(r#""""say "hi"""""#), r#"say "hi""#);
    }

    #[test]
    fn common_escapes() {
        assert_eq!(string(r#""a\nb\tc""#), "a\nb\tc");
        assert_eq!(string(r#""quote: \" back: \\""#), "quote: \" back: \\");
        assert_eq!(string(r#""\a\b\f\v""#), "\u{7}\u{8}\u{c}\u{b}");
    }

    #[test]
    fn unicode_escapes() {
        assert_eq!(string(r#""é""#), "é");
        assert_eq!(string(r#""\U0001F600""#), "😀");
        assert_eq!(string(r#""\x41""#), "A");
        assert_eq!(string(r#""\101""#), "A");
    }

    #[test]
    fn raw_strings_skip_escapes() {
        assert_eq!(string(r#"r"\d+""#), "\\d+");
        assert_eq!(string(r#"R"\n""#), "\\n");
    }

    #[test]
    fn bytes_literals() {
        assert_eq!(bytes(r#"b"abc""#), b"abc");
        assert_eq!(bytes(r#"b"\xff\x00""#), vec![0xFF, 0x00]);
        assert_eq!(bytes(r#"B'\377'"#), vec![0xFF]);
        assert_eq!(bytes(r#"rb"\xff""#), b"\\xff".to_vec());
    }

    #[test]
    fn invalid_escapes_error() {
        assert!(parse_string_literal(r#""\q""#).is_err());
        assert!(parse_string_literal(r#""\uD800""#).is_err());
        assert!(parse_string_literal(r#""\x4""#).is_err());
        assert!(parse_string_literal(r#""\12""#).is_err());
    }
}
