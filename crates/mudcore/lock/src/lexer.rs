//! Lexer: tokenizes a single lock expression
//!
//! Works on the expression part of a clause (the text after `access_type:`).
//! Words are maximal runs of anything that is not whitespace, a parenthesis,
//! a comma or a quote, so `#12`, `>=` and `can_fly` are all single words.

use crate::error::{LockError, LockResult};

/// A token produced by the lexer
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw text (unquoted for string literals)
    pub text: String,
    /// Byte offset into the expression
    pub offset: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            offset,
        }
    }

    /// Whether this is a bare word equal to `keyword`, ignoring case
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Quoted,
    OpenParen,
    CloseParen,
    Comma,
    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Word => write!(f, "word"),
            Self::Quoted => write!(f, "quoted string"),
            Self::OpenParen => write!(f, "'('"),
            Self::CloseParen => write!(f, "')'"),
            Self::Comma => write!(f, "','"),
            Self::Eof => write!(f, "end of expression"),
        }
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub fn tokenize(mut self) -> LockResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(ch) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, "", self.pos));
                break;
            };
            let start = self.pos;
            let token = match ch {
                '(' => {
                    self.bump(ch);
                    Token::new(TokenKind::OpenParen, "(", start)
                }
                ')' => {
                    self.bump(ch);
                    Token::new(TokenKind::CloseParen, ")", start)
                }
                ',' => {
                    self.bump(ch);
                    Token::new(TokenKind::Comma, ",", start)
                }
                '"' | '\'' => self.read_quoted(ch)?,
                _ => self.read_word(),
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self, ch: char) {
        self.pos += ch.len_utf8();
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.bump(ch);
        }
    }

    fn read_quoted(&mut self, quote: char) -> LockResult<Token> {
        let start = self.pos;
        self.bump(quote);
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            self.bump(ch);
            if ch == quote {
                return Ok(Token::new(TokenKind::Quoted, text, start));
            }
            text.push(ch);
        }
        Err(LockError::parse(self.input, start, "unterminated string"))
    }

    fn read_word(&mut self) -> Token {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || matches!(ch, '(' | ')' | ',' | '"' | '\'') {
                break;
            }
            self.bump(ch);
        }
        Token::new(TokenKind::Word, &self.input[start..self.pos], start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_call_tokens() {
        assert_eq!(
            kinds("perm(Builder)"),
            vec![
                TokenKind::Word,
                TokenKind::OpenParen,
                TokenKind::Word,
                TokenKind::CloseParen,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_words_keep_symbols() {
        let tokens = Lexer::new("id(#12) or attr_gt(str, >=5)").tokenize().unwrap();
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["id", "(", "#12", ")", "or", "attr_gt", "(", "str", ",", ">=5", ")", ""]
        );
        assert!(tokens[4].is_keyword("OR"));
    }

    #[test]
    fn test_quoted_strings() {
        let tokens = Lexer::new(r#"attr(title, "Lord of, the (rings)")"#)
            .tokenize()
            .unwrap();
        assert_eq!(tokens[4].kind, TokenKind::Quoted);
        assert_eq!(tokens[4].text, "Lord of, the (rings)");
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("attr(title, 'oops)").tokenize().unwrap_err();
        assert!(matches!(err, LockError::Parse { offset: 12, .. }));
    }
}
