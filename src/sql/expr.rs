//! Expression AST and the fluent helpers used to build it.

use std::fmt::Write as _;

use super::dialect::Dialect;
use super::query::SelectExpr;
use super::token::{Ident, Keyword, Token, TokenStream};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `column` or `table.column`
    Column {
        table: Option<Ident>,
        column: Ident,
    },
    Literal(Literal),
    Binary {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },
    /// Searched CASE: `CASE WHEN c THEN v ... ELSE e END`
    Case {
        branches: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },
    InList {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },
    /// `value = ANY(SELECT list)`
    AnySelect { value: Box<Expr>, list: Box<Expr> },
    IsNull { expr: Box<Expr>, negated: bool },
    /// `*`, `table.*` or `* EXCLUDE (a, b)`
    Star {
        table: Option<Ident>,
        exclude: Vec<Ident>,
    },
    Paren(Box<Expr>),
    /// `ARRAY[a, b]`
    Array(Vec<Expr>),
    /// List literal `[a, b]`
    List(Vec<Expr>),
    /// `agg(...) FILTER (WHERE condition)`
    FilteredAggregate {
        aggregate: Box<Expr>,
        condition: Box<Expr>,
    },
    /// `function OVER (ORDER BY ...)`
    Window {
        function: Box<Expr>,
        order_by: Vec<OrderByExpr>,
    },
    /// Schema-authored SQL, emitted as is. Never built from filter values.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

impl Literal {
    /// Panics on NaN and infinities, which have no SQL literal.
    pub(crate) fn write_to(&self, out: &mut String, dialect: Dialect) {
        match self {
            Literal::Int(n) => {
                let _ = write!(out, "{}", n);
            }
            Literal::Float(f) => {
                assert!(f.is_finite(), "Cannot serialize {} to SQL", f);
                out.push_str(ryu::Buffer::new().format_finite(*f));
            }
            Literal::String(s) => out.push_str(&dialect.quote_string(s)),
            Literal::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Literal::Null => out.push_str("NULL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
    /// Case-insensitive LIKE, `~~*`
    ILike,
    /// `!~~`
    NotLike,
    /// List overlap, `&&`
    Overlap,
}

impl BinaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Lte => "<=",
            Self::Gte => ">=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::ILike => "~~*",
            Self::NotLike => "!~~",
            Self::Overlap => "&&",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    fn keyword(self) -> Keyword {
        match self {
            SortDir::Asc => Keyword::Asc,
            SortDir::Desc => Keyword::Desc,
        }
    }
}

/// Sort key of an ORDER BY clause or a window. No direction means the
/// engine default.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: Option<SortDir>,
}

impl OrderByExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, dir: None }
    }

    pub fn asc(expr: Expr) -> Self {
        Self::new(expr).with_dir(SortDir::Asc)
    }

    pub fn desc(expr: Expr) -> Self {
        Self::new(expr).with_dir(SortDir::Desc)
    }

    pub fn with_dir(mut self, dir: SortDir) -> Self {
        self.dir = Some(dir);
        self
    }

    pub(crate) fn write(&self, ts: &mut TokenStream) {
        self.expr.write(ts);
        if let Some(dir) = self.dir {
            ts.space().keyword(dir.keyword());
        }
    }
}

impl Expr {
    /// Append this expression's tokens to `ts`.
    pub fn write(&self, ts: &mut TokenStream) {
        match self {
            Expr::Column { table, column } => {
                if let Some(table) = table {
                    ts.ident(table).punct('.');
                }
                ts.ident(column);
            }
            Expr::Literal(literal) => {
                ts.push(Token::Literal(literal.clone()));
            }
            Expr::Binary { left, op, right } => {
                left.write(ts);
                ts.space().push(Token::Operator(*op)).space();
                right.write(ts);
            }
            Expr::Not(inner) => {
                ts.keyword(Keyword::Not).space();
                inner.write(ts);
            }
            Expr::Function {
                name,
                args,
                distinct,
            } => {
                ts.push(Token::Function(name.clone())).punct('(');
                if *distinct {
                    ts.keyword(Keyword::Distinct).space();
                }
                ts.comma_list(args, |ts, arg| arg.write(ts)).punct(')');
            }
            Expr::Case {
                branches,
                otherwise,
            } => {
                ts.keyword(Keyword::Case);
                for (condition, value) in branches {
                    ts.spaced(Keyword::When);
                    condition.write(ts);
                    ts.spaced(Keyword::Then);
                    value.write(ts);
                }
                if let Some(otherwise) = otherwise {
                    ts.spaced(Keyword::Else);
                    otherwise.write(ts);
                }
                ts.space().keyword(Keyword::End);
            }
            // `x IN ()` does not parse; an empty list is constant.
            Expr::InList {
                values, negated, ..
            } if values.is_empty() => {
                ts.push(Token::Literal(Literal::Bool(*negated)));
            }
            Expr::InList {
                expr,
                values,
                negated,
            } => {
                expr.write(ts);
                if *negated {
                    ts.space().keyword(Keyword::Not);
                }
                ts.spaced(Keyword::In).punct('(');
                ts.comma_list(values, |ts, value| value.write(ts)).punct(')');
            }
            Expr::AnySelect { value, list } => {
                value.write(ts);
                ts.space().push(Token::Operator(BinaryOperator::Eq)).space();
                ts.keyword(Keyword::Any).punct('(').keyword(Keyword::Select).space();
                list.write(ts);
                ts.punct(')');
            }
            Expr::IsNull { expr, negated } => {
                expr.write(ts);
                ts.space().keyword(if *negated {
                    Keyword::IsNotNull
                } else {
                    Keyword::IsNull
                });
            }
            Expr::Star { table, exclude } => {
                if let Some(table) = table {
                    ts.ident(table).punct('.');
                }
                ts.punct('*');
                if !exclude.is_empty() {
                    ts.spaced(Keyword::Exclude).punct('(');
                    ts.comma_list(exclude, |ts, ident| {
                        ts.ident(ident);
                    })
                    .punct(')');
                }
            }
            Expr::Paren(inner) => {
                ts.punct('(');
                inner.write(ts);
                ts.punct(')');
            }
            Expr::Array(items) => {
                ts.keyword(Keyword::Array);
                write_brackets(ts, items);
            }
            Expr::List(items) => write_brackets(ts, items),
            Expr::FilteredAggregate {
                aggregate,
                condition,
            } => {
                aggregate.write(ts);
                ts.spaced(Keyword::Filter)
                    .punct('(')
                    .keyword(Keyword::Where)
                    .space();
                condition.write(ts);
                ts.punct(')');
            }
            Expr::Window { function, order_by } => {
                function.write(ts);
                ts.spaced(Keyword::Over).punct('(');
                if !order_by.is_empty() {
                    ts.keyword(Keyword::OrderBy).space();
                    ts.comma_list(order_by, |ts, key| key.write(ts));
                }
                ts.punct(')');
            }
            Expr::Raw(sql) => {
                ts.push(Token::Raw(sql.clone()));
            }
        }
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut ts = TokenStream::new();
        self.write(&mut ts);
        ts.serialize(dialect)
    }
}

fn write_brackets(ts: &mut TokenStream, items: &[Expr]) {
    ts.punct('[');
    ts.comma_list(items, |ts, item| item.write(ts)).punct(']');
}

// Constructors

pub fn col(column: Ident) -> Expr {
    Expr::Column {
        table: None,
        column,
    }
}

pub fn table_col(table: Ident, column: Ident) -> Expr {
    Expr::Column {
        table: Some(table),
        column,
    }
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

pub fn lit_float(f: f64) -> Expr {
    Expr::Literal(Literal::Float(f))
}

pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.to_string()))
}

pub fn lit_bool(b: bool) -> Expr {
    Expr::Literal(Literal::Bool(b))
}

pub fn lit_null() -> Expr {
    Expr::Literal(Literal::Null)
}

pub fn star() -> Expr {
    star_exclude(Vec::new())
}

pub fn table_star(table: Ident) -> Expr {
    Expr::Star {
        table: Some(table),
        exclude: Vec::new(),
    }
}

pub fn star_exclude(exclude: Vec<Ident>) -> Expr {
    Expr::Star {
        table: None,
        exclude,
    }
}

pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.to_string(),
        args,
        distinct: false,
    }
}

/// Trusted schema SQL only.
pub fn raw_sql(sql: &str) -> Expr {
    Expr::Raw(sql.to_string())
}

/// `CASE WHEN condition THEN value ELSE otherwise END`
pub fn case_when(condition: Expr, value: Expr, otherwise: Expr) -> Expr {
    Expr::Case {
        branches: vec![(condition, value)],
        otherwise: Some(Box::new(otherwise)),
    }
}

pub fn max(expr: Expr) -> Expr {
    func("MAX", vec![expr])
}

pub fn coalesce(args: Vec<Expr>) -> Expr {
    func("COALESCE", args)
}

pub fn array_agg_distinct(expr: Expr) -> Expr {
    Expr::Function {
        name: "ARRAY_AGG".to_string(),
        args: vec![expr],
        distinct: true,
    }
}

pub fn unnest(expr: Expr) -> Expr {
    func("UNNEST", vec![expr])
}

/// List length.
pub fn len(expr: Expr) -> Expr {
    func("LEN", vec![expr])
}

pub fn row_number() -> Expr {
    func("ROW_NUMBER", Vec::new())
}

/// Fluent operators on [`Expr`].
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn binary(self, op: BinaryOperator, rhs: impl Into<Expr>) -> Expr {
        Expr::Binary {
            left: Box::new(self.into_expr()),
            op,
            right: Box::new(rhs.into()),
        }
    }

    fn eq(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Eq, rhs)
    }

    fn ne(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Ne, rhs)
    }

    fn gt(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Gt, rhs)
    }

    fn gte(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Gte, rhs)
    }

    fn lt(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Lt, rhs)
    }

    fn lte(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Lte, rhs)
    }

    fn and(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::And, rhs)
    }

    fn or(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Or, rhs)
    }

    fn ilike(self, pattern: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::ILike, pattern)
    }

    fn not_like(self, pattern: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::NotLike, pattern)
    }

    fn overlaps(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Overlap, rhs)
    }

    fn not(self) -> Expr {
        Expr::Not(Box::new(self.into_expr()))
    }

    fn paren(self) -> Expr {
        Expr::Paren(Box::new(self.into_expr()))
    }

    fn eq_any(self, list: impl Into<Expr>) -> Expr {
        Expr::AnySelect {
            value: Box::new(self.into_expr()),
            list: Box::new(list.into()),
        }
    }

    fn filter_where(self, condition: impl Into<Expr>) -> Expr {
        Expr::FilteredAggregate {
            aggregate: Box::new(self.into_expr()),
            condition: Box::new(condition.into()),
        }
    }

    fn over(self, order_by: Vec<OrderByExpr>) -> Expr {
        Expr::Window {
            function: Box::new(self.into_expr()),
            order_by,
        }
    }

    #[allow(clippy::wrong_self_convention)]
    fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: false,
        }
    }

    #[allow(clippy::wrong_self_convention)]
    fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: true,
        }
    }

    fn in_list(self, values: Vec<Expr>) -> Expr {
        Expr::InList {
            expr: Box::new(self.into_expr()),
            values,
            negated: false,
        }
    }

    fn not_in_list(self, values: Vec<Expr>) -> Expr {
        Expr::InList {
            expr: Box::new(self.into_expr()),
            values,
            negated: true,
        }
    }

    fn alias(self, name: Ident) -> SelectExpr {
        SelectExpr::new(self.into_expr()).with_alias(name)
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit_int(n)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit_str(s)
    }
}
