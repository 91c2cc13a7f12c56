//! Projection rewrites for array-typed dimensions.

use crate::model::MemberDef;
use crate::sql::{case_when, coalesce, len, lit_int, lit_null, unnest, Expr, ExprExt};

/// How a dimension's projection is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayModifier {
    /// Projected as declared; arrays group by whole-array equality.
    None,
    /// `ARRAY[UNNEST(col)]`: one group per element.
    UnnestGroupBy,
    /// One row per element, null or empty arrays keep a single NULL row.
    Flatten,
}

impl ArrayModifier {
    /// Pick the rewrite for a selected dimension.
    ///
    /// Only array members are rewritten. Flatten wins over unnest-group-by,
    /// which needs at least one measure in the query.
    pub fn for_selected(def: &MemberDef, has_measures: bool) -> Self {
        if !def.member_type.is_array() {
            return ArrayModifier::None;
        }
        if def.should_flatten_array() {
            ArrayModifier::Flatten
        } else if def.should_unnest_group_by() && has_measures {
            ArrayModifier::UnnestGroupBy
        } else {
            ArrayModifier::None
        }
    }

    pub fn is_none(self) -> bool {
        self == ArrayModifier::None
    }

    pub fn apply(self, expr: Expr) -> Expr {
        match self {
            ArrayModifier::None => expr,
            ArrayModifier::UnnestGroupBy => Expr::Array(vec![unnest(expr)]),
            ArrayModifier::Flatten => flatten_array(expr),
        }
    }
}

/// `UNNEST(CASE WHEN e IS NULL OR LEN(COALESCE(e, [])) = 0 THEN [NULL] ELSE e END)`
pub fn flatten_array(expr: Expr) -> Expr {
    let empty = len(coalesce(vec![expr.clone(), Expr::List(vec![])])).eq(lit_int(0));
    let condition = expr.clone().is_null().or(empty);
    unnest(case_when(condition, Expr::List(vec![lit_null()]), expr))
}
