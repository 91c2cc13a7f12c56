//! SELECT statements.
//!
//! Every clause starts on its own line and select items are indented one
//! level. A subquery source renders as `(\n<query>\n) AS alias`.

use std::fmt;

use super::dialect::Dialect;
use super::expr::{star, Expr, ExprExt, OrderByExpr};
use super::token::{Ident, Keyword, Token, TokenStream};

/// A select-list item.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<Ident>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: Ident) -> Self {
        self.alias = Some(alias);
        self
    }

    fn write(&self, ts: &mut TokenStream) {
        self.expr.write(ts);
        write_alias(ts, self.alias.as_ref());
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    Subquery(Box<Query>),
    /// Schema-authored SQL, wrapped in parentheses.
    Raw(String),
}

/// A FROM or JOIN item.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub source: TableSource,
    pub alias: Option<Ident>,
}

impl TableRef {
    pub fn subquery(query: Query) -> Self {
        Self {
            source: TableSource::Subquery(Box::new(query)),
            alias: None,
        }
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            source: TableSource::Raw(sql.into()),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: Ident) -> Self {
        self.alias = Some(alias);
        self
    }

    fn write(&self, ts: &mut TokenStream) {
        ts.punct('(');
        match &self.source {
            TableSource::Subquery(query) => {
                ts.newline();
                query.write(ts);
                ts.newline();
            }
            TableSource::Raw(sql) => {
                ts.push(Token::Raw(sql.clone()));
            }
        }
        ts.punct(')');
        write_alias(ts, self.alias.as_ref());
    }
}

fn write_alias(ts: &mut TokenStream, alias: Option<&Ident>) {
    if let Some(alias) = alias {
        ts.spaced(Keyword::As).ident(alias);
    }
}

/// `LEFT JOIN table ON condition`. Joins are always left joins.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: TableRef,
    pub on: Expr,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "a Query does nothing until rendered with to_sql()"]
pub struct Query {
    pub select: Vec<SelectExpr>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, items: Vec<impl Into<SelectExpr>>) -> Self {
        self.select = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    pub fn left_join(mut self, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join { table, on });
        self
    }

    /// AND `condition` onto the WHERE clause.
    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.group_by = exprs;
        self
    }

    pub fn having(mut self, condition: Expr) -> Self {
        self.having = Some(condition);
        self
    }

    pub fn order_by(mut self, keys: Vec<OrderByExpr>) -> Self {
        self.order_by = keys;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Append this statement's tokens to `ts`.
    pub fn write(&self, ts: &mut TokenStream) {
        ts.keyword(Keyword::Select);
        let items = if self.select.is_empty() {
            vec![SelectExpr::new(star())]
        } else {
            Vec::new()
        };
        for (i, item) in self.select.iter().chain(&items).enumerate() {
            if i > 0 {
                ts.punct(',');
            }
            ts.newline().indent(1);
            item.write(ts);
        }

        if let Some(from) = &self.from {
            ts.newline().keyword(Keyword::From).space();
            from.write(ts);
        }
        for join in &self.joins {
            ts.newline().keyword(Keyword::LeftJoin).space();
            join.table.write(ts);
            ts.spaced(Keyword::On);
            join.on.write(ts);
        }
        if let Some(condition) = &self.where_clause {
            ts.newline().keyword(Keyword::Where).space();
            condition.write(ts);
        }
        if !self.group_by.is_empty() {
            ts.newline().keyword(Keyword::GroupBy).space();
            ts.comma_list(&self.group_by, |ts, expr| expr.write(ts));
        }
        if let Some(condition) = &self.having {
            ts.newline().keyword(Keyword::Having).space();
            condition.write(ts);
        }
        if !self.order_by.is_empty() {
            ts.newline().keyword(Keyword::OrderBy).space();
            ts.comma_list(&self.order_by, |ts, key| key.write(ts));
        }

        let paging = [(Keyword::Limit, self.limit), (Keyword::Offset, self.offset)];
        let mut first = true;
        for (keyword, value) in paging {
            let Some(value) = value else { continue };
            if first {
                ts.newline();
                first = false;
            } else {
                ts.space();
            }
            ts.keyword(keyword).space().push(Token::Raw(value.to_string()));
        }
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut ts = TokenStream::new();
        self.write(&mut ts);
        ts.serialize(dialect)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql(Dialect::default()))
    }
}
