//! Tokens: the flat form every statement passes through on its way to text.
//!
//! Expressions and queries push tokens into a [`TokenStream`]. Only
//! [`TokenStream::serialize`] looks at the [`Dialect`], so the same stream
//! can be rendered more than once.

use std::fmt;

use super::dialect::Dialect;
use super::expr::{BinaryOperator, Literal};

/// Reserved words. Multi-word clauses (`GROUP BY`, `LEFT JOIN`) are one keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Select,
    From,
    LeftJoin,
    On,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Offset,
    As,
    And,
    Or,
    Not,
    In,
    Any,
    IsNull,
    IsNotNull,
    Asc,
    Desc,
    Distinct,
    Case,
    When,
    Then,
    Else,
    End,
    Array,
    Exclude,
    Filter,
    Over,
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::From => "FROM",
            Self::LeftJoin => "LEFT JOIN",
            Self::On => "ON",
            Self::Where => "WHERE",
            Self::GroupBy => "GROUP BY",
            Self::Having => "HAVING",
            Self::OrderBy => "ORDER BY",
            Self::Limit => "LIMIT",
            Self::Offset => "OFFSET",
            Self::As => "AS",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::In => "IN",
            Self::Any => "ANY",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
            Self::Asc => "ASC",
            Self::Desc => "DESC",
            Self::Distinct => "DISTINCT",
            Self::Case => "CASE",
            Self::When => "WHEN",
            Self::Then => "THEN",
            Self::Else => "ELSE",
            Self::End => "END",
            Self::Array => "ARRAY",
            Self::Exclude => "EXCLUDE",
            Self::Filter => "FILTER",
            Self::Over => "OVER",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Keyword(Keyword),
    Operator(BinaryOperator),
    /// One of `,` `.` `*` `(` `)` `[` `]`.
    Punct(char),
    Space,
    Newline,
    /// Two spaces per level.
    Indent(usize),
    Ident(Ident),
    Literal(Literal),
    /// Function name, spelled by the dialect.
    Function(String),
    /// Emitted verbatim. Carries schema-authored SQL and generated numbers;
    /// filter values always travel as [`Token::Literal`].
    Raw(String),
}

impl Token {
    fn write_to(&self, out: &mut String, dialect: Dialect) {
        match self {
            Token::Keyword(keyword) => out.push_str(keyword.as_str()),
            Token::Operator(op) => out.push_str(op.as_str()),
            Token::Punct(c) => out.push(*c),
            Token::Space => out.push(' '),
            Token::Newline => out.push('\n'),
            Token::Indent(depth) => out.push_str(&"  ".repeat(*depth)),
            Token::Ident(ident) => out.push_str(&ident.render(dialect)),
            Token::Literal(literal) => literal.write_to(out, dialect),
            Token::Function(name) => out.push_str(&dialect.function_name(name)),
            Token::Raw(sql) => out.push_str(sql),
        }
    }

    pub fn serialize(&self, dialect: Dialect) -> String {
        let mut out = String::new();
        self.write_to(&mut out, dialect);
        out
    }
}

/// An identifier together with its quoting decision.
///
/// Generated names (`orders__amount`, `__row_id`, schema names) stay bare so
/// the output reads like hand-written SQL. Human labels and dot-notation
/// names are quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident {
    pub value: String,
    pub quoted: bool,
}

impl Ident {
    pub fn quoted(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: true,
        }
    }

    pub fn bare(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: false,
        }
    }

    pub fn render(&self, dialect: Dialect) -> String {
        if self.quoted {
            dialect.quote_identifier(&self.value)
        } else {
            self.value.clone()
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Dialect::default()))
    }
}

/// Tokens in output order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream(Vec<Token>);

impl TokenStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: Token) -> &mut Self {
        self.0.push(token);
        self
    }

    pub fn keyword(&mut self, keyword: Keyword) -> &mut Self {
        self.push(Token::Keyword(keyword))
    }

    /// ` KEYWORD `
    pub fn spaced(&mut self, keyword: Keyword) -> &mut Self {
        self.space().keyword(keyword).space()
    }

    pub fn punct(&mut self, c: char) -> &mut Self {
        self.push(Token::Punct(c))
    }

    pub fn ident(&mut self, ident: &Ident) -> &mut Self {
        self.push(Token::Ident(ident.clone()))
    }

    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }

    pub fn newline(&mut self) -> &mut Self {
        self.push(Token::Newline)
    }

    pub fn indent(&mut self, depth: usize) -> &mut Self {
        self.push(Token::Indent(depth))
    }

    /// Push `items` separated by `, `.
    pub fn comma_list<T>(&mut self, items: &[T], mut each: impl FnMut(&mut Self, &T)) -> &mut Self {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.punct(',').space();
            }
            each(self, item);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn serialize(&self, dialect: Dialect) -> String {
        let mut out = String::new();
        for token in &self.0 {
            token.write_to(&mut out, dialect);
        }
        out
    }
}
