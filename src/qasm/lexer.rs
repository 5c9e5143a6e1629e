//! Tokenizer for OpenQASM 2.0 source text.

use crate::executor::{ExecError, ExecResult};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Int(u64),
    Real(f64),
    Str(String),
    Semi,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Arrow,
    EqEq,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "'{s}'"),
            TokenKind::Int(n) => write!(f, "'{n}'"),
            TokenKind::Real(x) => write!(f, "'{x}'"),
            TokenKind::Str(s) => write!(f, "\"{s}\""),
            TokenKind::Semi => write!(f, "';'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::Arrow => write!(f, "'->'"),
            TokenKind::EqEq => write!(f, "'=='"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::Caret => write!(f, "'^'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

pub(crate) fn tokenize(source: &str) -> ExecResult<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start = line;
                i += 2;
                loop {
                    match chars.get(i) {
                        None => return Err(ExecError::parse(start, "unterminated comment")),
                        Some('*') if chars.get(i + 1) == Some(&'/') => {
                            i += 2;
                            break;
                        }
                        Some('\n') => {
                            line += 1;
                            i += 1;
                        }
                        Some(_) => i += 1,
                    }
                }
            }
            '"' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != '"' && chars[end] != '\n' {
                    end += 1;
                }
                if chars.get(end) != Some(&'"') {
                    return Err(ExecError::parse(line, "unterminated string"));
                }
                tokens.push(Token {
                    kind: TokenKind::Str(chars[start..end].iter().collect()),
                    line,
                });
                i = end + 1;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(chars[start..i].iter().collect()),
                    line,
                });
            }
            c if c.is_ascii_digit() || (c == '.' && next_is_digit(&chars, i)) => {
                let (kind, next) = number(&chars, i, line)?;
                tokens.push(Token { kind, line });
                i = next;
            }
            _ => {
                let (kind, width) = match (c, chars.get(i + 1)) {
                    ('-', Some('>')) => (TokenKind::Arrow, 2),
                    ('=', Some('=')) => (TokenKind::EqEq, 2),
                    (';', _) => (TokenKind::Semi, 1),
                    (',', _) => (TokenKind::Comma, 1),
                    ('(', _) => (TokenKind::LParen, 1),
                    (')', _) => (TokenKind::RParen, 1),
                    ('[', _) => (TokenKind::LBracket, 1),
                    (']', _) => (TokenKind::RBracket, 1),
                    ('{', _) => (TokenKind::LBrace, 1),
                    ('}', _) => (TokenKind::RBrace, 1),
                    ('+', _) => (TokenKind::Plus, 1),
                    ('-', _) => (TokenKind::Minus, 1),
                    ('*', _) => (TokenKind::Star, 1),
                    ('/', _) => (TokenKind::Slash, 1),
                    ('^', _) => (TokenKind::Caret, 1),
                    _ => return Err(ExecError::parse(line, format!("unexpected character '{c}'"))),
                };
                tokens.push(Token { kind, line });
                i += width;
            }
        }
    }

    Ok(tokens)
}

fn next_is_digit(chars: &[char], i: usize) -> bool {
    chars.get(i + 1).is_some_and(char::is_ascii_digit)
}

fn number(chars: &[char], start: usize, line: usize) -> ExecResult<(TokenKind, usize)> {
    let mut i = start;
    let mut real = false;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if chars.get(i) == Some(&'.') {
        real = true;
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if matches!(chars.get(i), Some('e' | 'E')) {
        let mut j = i + 1;
        if matches!(chars.get(j), Some('+' | '-')) {
            j += 1;
        }
        if chars.get(j).is_some_and(char::is_ascii_digit) {
            real = true;
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let text: String = chars[start..i].iter().collect();
    let kind = if real {
        text.parse()
            .map(TokenKind::Real)
            .map_err(|_| ExecError::parse(line, format!("invalid number '{text}'")))?
    } else {
        text.parse()
            .map(TokenKind::Int)
            .map_err(|_| ExecError::parse(line, format!("integer out of range '{text}'")))?
    };
    Ok((kind, i))
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
    fn test_header_tokens() {
        assert_eq!(
            kinds("OPENQASM 2.0;"),
            vec![
                TokenKind::Ident("OPENQASM".into()),
                TokenKind::Real(2.0),
                TokenKind::Semi
            ]
        );
    }

    #[test]
    fn test_measure_arrow_and_index() {
        assert_eq!(
            kinds("measure q[1] -> c[0];"),
            vec![
                TokenKind::Ident("measure".into()),
                TokenKind::Ident("q".into()),
                TokenKind::LBracket,
                TokenKind::Int(1),
                TokenKind::RBracket,
                TokenKind::Arrow,
                TokenKind::Ident("c".into()),
                TokenKind::LBracket,
                TokenKind::Int(0),
                TokenKind::RBracket,
                TokenKind::Semi,
            ]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let tokens = tokenize("// header\nh q; /* a\nb */ x q;").unwrap();
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[3].kind, TokenKind::Ident("x".into()));
        assert_eq!(tokens[3].line, 3);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("3 0.5 .25 1e-3 2E2"),
            vec![
                TokenKind::Int(3),
                TokenKind::Real(0.5),
                TokenKind::Real(0.25),
                TokenKind::Real(0.001),
                TokenKind::Real(200.0),
            ]
        );
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(
            kinds("include \"qelib1.inc\";")[1],
            TokenKind::Str("qelib1.inc".into())
        );
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("h q;\nx q @").unwrap_err();
        assert_eq!(err, ExecError::parse(2, "unexpected character '@'"));
    }

    #[test]
    fn test_unterminated_comment() {
        assert!(tokenize("/* never closed").is_err());
    }
}
