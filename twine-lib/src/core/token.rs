use ordered_float::OrderedFloat;
use strum_macros::EnumString;

use std::fmt;

use crate::core::{BinaryOperator, Location, UnaryOperator};

/// Reserved words. `true`, `false` and `var` are handled by the lexer directly and never
/// show up as keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    If,
    Else,
    Return,
    While,
    Do,
    For,
    Break,
    Continue,
    Label,
    Jump,
    Call,
    Back,
    Select,
    Switch,
    Case,
    Default,
    Function,
    Null,
    New,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Semicolon,
    Colon,
    Comma,
    Period,
    Pound,
    Backslash,
    ParOpen,
    ParClose,
    CubOpen,
    CubClose,
    Operator(BinaryOperator),
    Unary(UnaryOperator),
    /// `=` carries `None`, the compound forms like `+=` carry their operator
    Set(Option<BinaryOperator>),
    /// `++` and `--`
    Adjust(i8),
    Number(OrderedFloat<f64>),
    Str(String),
    Identifier(String),
    Keyword(Keyword),
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

impl Token {
    pub fn new(kind: TokenKind, location: Location) -> Self {
        Self { kind, location }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    /// returns the name if this is an identifier
    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;
        match self {
            Semicolon => write!(f, ";"),
            Colon => write!(f, ":"),
            Comma => write!(f, ","),
            Period => write!(f, "."),
            Pound => write!(f, "#"),
            Backslash => write!(f, "\\"),
            ParOpen => write!(f, "("),
            ParClose => write!(f, ")"),
            CubOpen => write!(f, "{{"),
            CubClose => write!(f, "}}"),
            Operator(op) => write!(f, "{}", op),
            Unary(op) => write!(f, "{}", op),
            Set(None) => write!(f, "="),
            Set(Some(op)) => write!(f, "{}=", op),
            Adjust(delta) if *delta > 0 => write!(f, "++"),
            Adjust(_) => write!(f, "--"),
            Number(n) => write!(f, "{}", n),
            Str(s) => write!(f, "{:?}", s),
            Identifier(name) => write!(f, "{}", name),
            Keyword(kw) => write!(f, "{}", kw),
            Eof => write!(f, "end of file"),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}
