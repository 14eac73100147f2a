//! Turns script text into tokens

use log::debug;
use ordered_float::OrderedFloat;

use std::iter::Peekable;
use std::str::{Chars, FromStr};
use std::sync::Arc;

use crate::compiler::{lexical_error, CompilationError, Result};
use crate::core::*;
use crate::utils;

/// Splits `source` into tokens. The last token is always [`TokenKind::Eof`].
/// `starting_line` is the line number of the first line of `source`.
pub fn tokenize(
    source: &str,
    source_name: Option<Arc<str>>,
    starting_line: usize,
) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        chars: source.chars().peekable(),
        source: source_name,
        line: starting_line,
        column: 1,
        tokens: vec![],
    };
    lexer.run()?;
    debug!(
        "tokenized {} into {} tokens",
        lexer.location(),
        lexer.tokens.len()
    );
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    source: Option<Arc<str>>,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    /// location of the next character
    fn location(&self) -> Location {
        Location::new(self.source.clone(), self.line, self.column)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// consumes the next character if it is `expected`
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn push(&mut self, kind: TokenKind, location: Location) {
        self.tokens.push(Token::new(kind, location));
    }

    fn run(&mut self) -> Result<()> {
        while let Some(c) = self.peek() {
            let location = self.location();
            match c {
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' => {
                    self.bump();
                    if self.eat('/') {
                        self.skip_line_comment();
                    } else if self.eat('*') {
                        self.skip_block_comment(&location)?;
                    } else {
                        self.operator_or_set(BinaryOperator::Div, location);
                    }
                }
                '"' => self.string(location)?,
                '0'..='9' | '.' => self.number(location)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.word(location),
                _ => {
                    self.bump();
                    self.symbol(c, location)?;
                }
            }
        }
        let eof_location = Location::new(self.source.clone(), self.line + 1, 1);
        self.push(TokenKind::Eof, eof_location);
        Ok(())
    }

    /// handles everything that starts with the already consumed character `c`
    fn symbol(&mut self, c: char, location: Location) -> Result<()> {
        use BinaryOperator::*;
        let kind = match c {
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '#' => TokenKind::Pound,
            '\\' => TokenKind::Backslash,
            '(' => TokenKind::ParOpen,
            ')' => TokenKind::ParClose,
            '{' => TokenKind::CubOpen,
            '}' => TokenKind::CubClose,
            '+' if self.eat('+') => TokenKind::Adjust(1),
            '-' if self.eat('-') => TokenKind::Adjust(-1),
            '+' => return Ok(self.operator_or_set(Add, location)),
            '-' => return Ok(self.operator_or_set(Sub, location)),
            '*' => return Ok(self.operator_or_set(Mul, location)),
            '%' => return Ok(self.operator_or_set(Mod, location)),
            '^' => return Ok(self.operator_or_set(BitXor, location)),
            '=' if self.eat('=') => TokenKind::Operator(Eq),
            '=' => TokenKind::Set(None),
            '!' if self.eat('=') => TokenKind::Operator(Neq),
            '!' => TokenKind::Unary(UnaryOperator::Not),
            '<' if self.eat('=') => TokenKind::Operator(Lte),
            '<' if self.eat('<') => TokenKind::Operator(Shl),
            '<' => TokenKind::Operator(Lt),
            '>' if self.eat('=') => TokenKind::Operator(Gte),
            '>' if self.eat('>') => TokenKind::Operator(Shr),
            '>' => TokenKind::Operator(Gt),
            '&' if self.eat('&') => TokenKind::Operator(And),
            '&' => return Ok(self.operator_or_set(BitAnd, location)),
            '|' if self.eat('|') => TokenKind::Operator(Or),
            '|' => return Ok(self.operator_or_set(BitOr, location)),
            other => lexical_error!(location, "Unexpected character '{}'.", other.escape_debug()),
        };
        self.push(kind, location);
        Ok(())
    }

    /// `op` or `op=`, the operator character itself was consumed already
    fn operator_or_set(&mut self, op: BinaryOperator, location: Location) {
        let kind = if self.eat('=') {
            TokenKind::Set(Some(op))
        } else {
            TokenKind::Operator(op)
        };
        self.push(kind, location);
    }

    /// the terminating newline stays, it's just whitespace
    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self, start: &Location) -> Result<()> {
        loop {
            match self.bump() {
                Some('*') if self.eat('/') => return Ok(()),
                Some(_) => {}
                None => lexical_error!(start, "Unterminated block comment."),
            }
        }
    }

    fn string(&mut self, location: Location) -> Result<()> {
        self.bump();
        let mut raw = String::new();
        let mut escaped = false;
        loop {
            match self.bump() {
                Some('"') if !escaped => break,
                Some(c) => {
                    escaped = !escaped && c == '\\';
                    raw.push(c);
                }
                None => lexical_error!(location, "Unterminated string literal."),
            }
        }
        self.push(TokenKind::Str(utils::unescape(&raw)), location);
        Ok(())
    }

    /// A number with at most one decimal point. A lone `.` is a period.
    fn number(&mut self, location: Location) -> Result<()> {
        let mut text = String::new();
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c == '.' && !seen_dot {
                seen_dot = true;
            } else if !c.is_ascii_digit() {
                break;
            }
            text.push(c);
            self.bump();
        }
        if text == "." {
            self.push(TokenKind::Period, location);
            return Ok(());
        }
        let value = f64::from_str(&text).map_err(|_| CompilationError::Lexical {
            location: location.clone(),
            message: format!("Invalid number '{}'.", text),
        })?;
        self.push(TokenKind::Number(OrderedFloat(value)), location);
        Ok(())
    }

    fn word(&mut self, location: Location) {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                break;
            }
            word.push(c);
            self.bump();
        }
        let kind = match word.as_str() {
            "true" => TokenKind::Number(OrderedFloat(1.0)),
            "false" => TokenKind::Number(OrderedFloat(0.0)),
            "var" => return,
            _ => match Keyword::from_str(&word) {
                Ok(keyword) => TokenKind::Keyword(keyword),
                Err(_) => TokenKind::Identifier(word),
            },
        };
        self.push(kind, location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, None, 1)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Identifier(name.into())
    }

    fn num(n: f64) -> TokenKind {
        TokenKind::Number(OrderedFloat(n))
    }

    #[test]
    fn test_operators() {
        use BinaryOperator::*;
        assert_eq!(
            kinds("a += b++ << 2 != c-- && !d |= e"),
            vec![
                ident("a"),
                TokenKind::Set(Some(Add)),
                ident("b"),
                TokenKind::Adjust(1),
                TokenKind::Operator(Shl),
                num(2.0),
                TokenKind::Operator(Neq),
                ident("c"),
                TokenKind::Adjust(-1),
                TokenKind::Operator(And),
                TokenKind::Unary(UnaryOperator::Not),
                ident("d"),
                TokenKind::Set(Some(BitOr)),
                ident("e"),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("x = y == z"),
            vec![
                ident("x"),
                TokenKind::Set(None),
                ident("y"),
                TokenKind::Operator(Eq),
                ident("z"),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_keywords_and_literals() {
        assert_eq!(
            kinds("var x = true; if false return null"),
            vec![
                ident("x"),
                TokenKind::Set(None),
                num(1.0),
                TokenKind::Semicolon,
                TokenKind::Keyword(Keyword::If),
                num(0.0),
                TokenKind::Keyword(Keyword::Return),
                TokenKind::Keyword(Keyword::Null),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers_and_periods() {
        assert_eq!(
            kinds("1.5 .5 1.2.3 a.b"),
            vec![
                num(1.5),
                num(0.5),
                num(1.2),
                num(0.3),
                ident("a"),
                TokenKind::Period,
                ident("b"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            kinds(r#""say \"hi\"\n" "a\\""#),
            vec![
                TokenKind::Str("say \"hi\"\n".into()),
                TokenKind::Str("a\\".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_comments_and_locations() {
        let tokens = tokenize("a // one\n/* two\nthree */ b", Some("s.twn".into()), 10).unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].location.line, 10);
        assert_eq!(tokens[1].kind, ident("b"));
        assert_eq!(tokens[1].location.line, 12);
        assert_eq!(tokens[1].location.column, 10);
        assert_eq!(tokens[1].location.to_string(), "s.twn:12:10");
        assert_eq!(tokens[2].kind, TokenKind::Eof);
        assert_eq!(tokens[2].location.line, 13);
    }

    #[test]
    fn test_errors() {
        let err = tokenize("x = \"open", None, 1).unwrap_err();
        assert!(err.to_string().contains("Unterminated string literal"));
        assert_eq!(err.location().column, 5);

        let err = tokenize("a /* never closed", None, 1).unwrap_err();
        assert!(err.to_string().contains("Unterminated block comment"));

        let err = tokenize("a\n  @", None, 1).unwrap_err();
        assert!(matches!(err, CompilationError::Lexical { .. }));
        assert_eq!(err.location().line, 2);
        assert_eq!(err.location().column, 3);
    }
}
