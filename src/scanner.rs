//! Lazy scanner: turns a source buffer into a forward-only stream of
//! tokens, tracking the current line for the parser's diagnostics.
//!
//! Malformed integer and character literals are reported but do not stop
//! scanning — the offending lexeme is dropped and the next token is
//! produced as if it had never been there, per §7.

use crate::diagnostics::LexError;
use crate::token::{Token, TokenKind};

const MAX_INT: i128 = 2_147_483_647;

pub struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Scanner {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    /// The line of the most recently produced token (or the current
    /// scanning position if nothing has been produced yet).
    pub fn line(&self) -> usize {
        self.line
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    /// Skip whitespace and `(* ... *)` comments. Comments are not
    /// nestable: the first `*)` ends the comment, even if an inner `(*`
    /// was seen along the way.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('(') if self.peek2() == Some('*') => {
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            None => break,
                            Some('*') if self.peek2() == Some(')') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_ident(&mut self, start_line: usize) -> Token {
        let mut lexeme = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                lexeme.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = TokenKind::keyword(&lexeme).unwrap_or(TokenKind::Ident);
        Token::new(kind, lexeme, start_line)
    }

    fn scan_integer(&mut self, start_line: usize) -> Result<Token, LexError> {
        let mut lexeme = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                lexeme.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match lexeme.parse::<i128>() {
            Ok(value) if value <= MAX_INT => Ok(Token::new(TokenKind::IntConst, lexeme, start_line)),
            _ => Err(LexError::InvalidInteger(lexeme)),
        }
    }

    fn scan_char_const(&mut self, start_line: usize) -> Result<Token, LexError> {
        self.advance(); // opening quote

        if self.peek() == Some('\'') {
            self.advance();
            return Err(LexError::InvalidCharacter("''".to_string()));
        }

        let content = match self.advance() {
            Some(c) => c,
            None => return Err(LexError::InvalidCharacter("'".to_string())),
        };

        if self.peek() == Some('\'') {
            self.advance();
            return Ok(Token::new(
                TokenKind::CharConst,
                format!("'{}'", content),
                start_line,
            ));
        }

        // Malformed: not a single character between quotes. Capture a
        // best-effort lexeme for the diagnostic and resynchronize at the
        // next whitespace, closing quote, or end of input.
        let mut lexeme = String::new();
        lexeme.push('\'');
        lexeme.push(content);
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                break;
            }
            lexeme.push(c);
            self.advance();
            if c == '\'' {
                break;
            }
        }
        Err(LexError::InvalidCharacter(lexeme))
    }

    fn scan_punctuator(&mut self, start_line: usize) -> Option<Token> {
        let c = self.peek()?;
        let (kind, len) = match c {
            '.' if self.peek2() == Some('.') => (TokenKind::DotDot, 2),
            ':' if self.peek2() == Some('=') => (TokenKind::Assign, 2),
            '<' if self.peek2() == Some('=') => (TokenKind::Le, 2),
            '<' if self.peek2() == Some('>') => (TokenKind::Ne, 2),
            '>' if self.peek2() == Some('=') => (TokenKind::Ge, 2),
            '(' => (TokenKind::LParen, 1),
            ')' => (TokenKind::RParen, 1),
            '*' => (TokenKind::Mult, 1),
            '+' => (TokenKind::Plus, 1),
            ',' => (TokenKind::Comma, 1),
            '-' => (TokenKind::Minus, 1),
            '.' => (TokenKind::Dot, 1),
            ':' => (TokenKind::Colon, 1),
            ';' => (TokenKind::SColon, 1),
            '<' => (TokenKind::Lt, 1),
            '=' => (TokenKind::Eq, 1),
            '>' => (TokenKind::Gt, 1),
            '[' => (TokenKind::LBrack, 1),
            ']' => (TokenKind::RBrack, 1),
            _ => return None,
        };
        let mut lexeme = String::new();
        for _ in 0..len {
            lexeme.push(self.advance().expect("checked by peek above"));
        }
        Some(Token::new(kind, lexeme, start_line))
    }
}

impl Iterator for Scanner {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.skip_trivia();
            let start_line = self.line;
            let c = self.peek()?;

            if c.is_alphabetic() || c == '_' {
                return Some(Ok(self.scan_ident(start_line)));
            }
            if c.is_ascii_digit() {
                return Some(self.scan_integer(start_line));
            }
            if c == '\'' {
                return Some(self.scan_char_const(start_line));
            }
            if let Some(tok) = self.scan_punctuator(start_line) {
                return Some(Ok(tok));
            }

            // UNKNOWN: not diagnosed, not traced, simply dropped.
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Scanner::new(src)
            .filter_map(|r| r.ok())
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn keywords_are_folded() {
        assert_eq!(
            kinds("program begin end."),
            vec![
                TokenKind::Program,
                TokenKind::Begin,
                TokenKind::End,
                TokenKind::Dot
            ]
        );
    }

    #[test]
    fn comments_are_not_nestable() {
        // The inner "(*" has no special meaning; the comment ends at the
        // first "*)", leaving a stray "*)" to tokenize afterwards.
        let toks: Vec<_> = Scanner::new("(* (* *) *) x").collect();
        let lexemes: Vec<_> = toks
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(|t| t.lexeme.as_str())
            .collect();
        assert_eq!(lexemes, vec!["*", ")", "x"]);
    }

    #[test]
    fn comment_spans_lines() {
        let mut scanner = Scanner::new("(* line one\nline two *)\nx");
        let tok = scanner.find_map(|r| r.ok()).unwrap();
        assert_eq!(tok.lexeme, "x");
        assert_eq!(tok.line, 3);
    }

    #[test]
    fn integer_overflow_is_dropped_not_fatal() {
        let mut scanner = Scanner::new("99999999999 42");
        let first = scanner.next().unwrap();
        assert!(matches!(first, Err(LexError::InvalidInteger(_))));
        let second = scanner.next().unwrap().unwrap();
        assert_eq!(second.lexeme, "42");
    }

    #[test]
    fn empty_char_const_is_invalid() {
        let result = Scanner::new("''").next().unwrap();
        assert_eq!(result, Err(LexError::InvalidCharacter("''".to_string())));
    }

    #[test]
    fn valid_char_const() {
        let tok = Scanner::new("'x'").next().unwrap().unwrap();
        assert_eq!(tok.kind, TokenKind::CharConst);
        assert_eq!(tok.lexeme, "'x'");
    }

    #[test]
    fn longest_match_punctuators() {
        assert_eq!(
            kinds(":= <= <> >= .."),
            vec![
                TokenKind::Assign,
                TokenKind::Le,
                TokenKind::Ne,
                TokenKind::Ge,
                TokenKind::DotDot
            ]
        );
    }

    #[test]
    fn unknown_character_is_silently_dropped() {
        assert_eq!(kinds("x @ y"), vec![TokenKind::Ident, TokenKind::Ident]);
    }

    #[test]
    fn tokenization_round_trips_on_concatenated_lexemes() {
        let src = "program p ; begin x := 1 end .";
        let first: Vec<_> = Scanner::new(src).filter_map(|r| r.ok()).collect();
        let rejoined = first
            .iter()
            .map(|t| t.lexeme.clone())
            .collect::<Vec<_>>()
            .join(" ");
        let second: Vec<TokenKind> = Scanner::new(&rejoined).filter_map(|r| r.ok().map(|t| t.kind)).collect();
        let first_kinds: Vec<TokenKind> = first.iter().map(|t| t.kind).collect();
        assert_eq!(first_kinds, second);
    }
}
