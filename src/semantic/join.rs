//! Join planning.
//!
//! Schemas declare join predicates (`orders.customer_id = customers.id`).
//! The predicates of the schemas a query uses form a directed graph: an edge
//! runs from the declaring table to the other table and is keyed by the
//! declaring side's column. A plan is either taken from the query's explicit
//! join paths, validated against that graph, or found breadth-first.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use sqlparser::ast::{BinaryOperator as SqlBinaryOperator, Expr as SqlExpr};
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;

use crate::compile::{CompileError, CompileResult};
use crate::model::{JoinEdge, TableSchema};

/// Edge payload: the declaring side's column and the predicate text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCondition {
    pub on: String,
    pub sql: String,
}

/// One `LEFT JOIN` of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    pub left: String,
    pub right: String,
    /// Predicate emitted after `ON`.
    pub sql: String,
}

/// A left-deep join chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPlan {
    pub start: String,
    pub steps: Vec<JoinStep>,
}

impl JoinPlan {
    pub fn single(table: impl Into<String>) -> Self {
        Self {
            start: table.into(),
            steps: vec![],
        }
    }

    pub fn is_single(&self) -> bool {
        self.steps.is_empty()
    }

    /// Tables in join order, starting table first.
    pub fn tables(&self) -> Vec<&str> {
        std::iter::once(self.start.as_str())
            .chain(self.steps.iter().map(|s| s.right.as_str()))
            .collect()
    }
}

/// A column reference side of a join predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
struct JoinSide {
    table: String,
    column: String,
}

/// Parse `a.x = b.y`.
fn parse_join_predicate(sql: &str) -> CompileResult<(JoinSide, JoinSide)> {
    let invalid = |reason: &str| CompileError::InvalidJoin {
        sql: sql.to_string(),
        reason: reason.to_string(),
    };

    let expr = Parser::new(&DuckDbDialect {})
        .try_with_sql(sql)
        .and_then(|mut parser| parser.parse_expr())
        .map_err(|e| invalid(&e.to_string()))?;

    fn side(expr: &SqlExpr) -> Option<JoinSide> {
        match expr {
            SqlExpr::Nested(inner) => side(inner),
            SqlExpr::CompoundIdentifier(parts) if parts.len() == 2 => Some(JoinSide {
                table: parts[0].value.clone(),
                column: parts[1].value.clone(),
            }),
            _ => None,
        }
    }

    let mut expr = &expr;
    while let SqlExpr::Nested(inner) = expr {
        expr = inner.as_ref();
    }

    match expr {
        SqlExpr::BinaryOp {
            left,
            op: SqlBinaryOperator::Eq,
            right,
        } => match (side(left), side(right)) {
            (Some(l), Some(r)) => Ok((l, r)),
            _ => Err(invalid("both sides must be table.column references")),
        },
        _ => Err(invalid("expected an equality between two columns")),
    }
}

/// Declared joins among the schemas a query uses.
#[derive(Debug, Default)]
pub struct JoinGraph {
    graph: DiGraph<String, JoinCondition>,
    node_indices: HashMap<String, NodeIndex>,
}

impl JoinGraph {
    /// Build the graph over `schemas`.
    ///
    /// Predicates naming a table outside `schemas` are ignored.
    pub fn build(schemas: &[&TableSchema]) -> CompileResult<Self> {
        let mut graph = JoinGraph::default();
        for schema in schemas {
            graph.add_node(&schema.name);
        }

        for schema in schemas {
            for join in &schema.joins {
                let (a, b) = parse_join_predicate(&join.sql)?;
                if a.table == b.table {
                    return Err(CompileError::InvalidJoin {
                        sql: join.sql.clone(),
                        reason: "a table cannot join itself".into(),
                    });
                }
                let (from, to) = if a.table == schema.name {
                    (a, b)
                } else if b.table == schema.name {
                    (b, a)
                } else {
                    return Err(CompileError::InvalidJoin {
                        sql: join.sql.clone(),
                        reason: format!("predicate does not reference table '{}'", schema.name),
                    });
                };

                let Some(&to_idx) = graph.node_indices.get(&to.table) else {
                    log::trace!("skipping join {} to unused table {}", join.sql, to.table);
                    continue;
                };
                let from_idx = graph.node_indices[&from.table];

                if graph.edge(&from.table, &to.table, &from.column).is_some() {
                    return Err(CompileError::InvalidJoin {
                        sql: join.sql.clone(),
                        reason: "join declared twice".into(),
                    });
                }
                graph.graph.add_edge(
                    from_idx,
                    to_idx,
                    JoinCondition {
                        on: from.column,
                        sql: join.sql.clone(),
                    },
                );
            }
        }

        Ok(graph)
    }

    fn add_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.node_indices.insert(name.to_string(), idx);
        idx
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// The declared join `left -> right` on `left.on`.
    pub fn edge(&self, left: &str, right: &str, on: &str) -> Option<&JoinCondition> {
        let left_idx = *self.node_indices.get(left)?;
        let right_idx = *self.node_indices.get(right)?;
        self.graph
            .edges(left_idx)
            .find(|e| e.target() == right_idx && e.weight().on == on)
            .map(|e| e.weight())
    }

    /// Outgoing edges of `idx` in declaration order.
    fn ordered_edges(&self, idx: NodeIndex) -> Vec<(NodeIndex, &JoinCondition)> {
        let mut edges: Vec<_> = self.graph.edges(idx).collect();
        edges.sort_by_key(|e| e.id().index());
        edges.into_iter().map(|e| (e.target(), e.weight())).collect()
    }

    /// Plan how to join `used` (in caller order).
    pub fn plan(
        &self,
        used: &[&str],
        join_paths: Option<&[Vec<JoinEdge>]>,
    ) -> CompileResult<JoinPlan> {
        let Some(first) = used.first() else {
            return Err(CompileError::InvalidQuery {
                reason: "query references no table".into(),
            });
        };
        if used.len() == 1 {
            return Ok(JoinPlan::single(*first));
        }

        let plan = match join_paths {
            Some(paths) => self.plan_explicit(used, paths)?,
            None => self.plan_breadth_first(used)?,
        };
        log::debug!("join plan: {}", plan.tables().join(" -> "));
        Ok(plan)
    }

    fn plan_explicit(&self, used: &[&str], paths: &[Vec<JoinEdge>]) -> CompileResult<JoinPlan> {
        let Some(start) = paths.iter().find_map(|p| p.first()).map(|e| e.left.clone()) else {
            return Err(CompileError::MissingJoinPath {
                table: used[1].to_string(),
            });
        };

        for path in paths {
            let Some(head) = path.first() else { continue };
            if head.left != start {
                return Err(CompileError::JoinPathStartMismatch {
                    expected: start.clone(),
                    found: head.left.clone(),
                });
            }
            let mut seen: HashSet<&str> = HashSet::from([head.left.as_str()]);
            for edge in path {
                if let Some(right) = &edge.right {
                    if !seen.insert(right.as_str()) {
                        return Err(CompileError::JoinLoop {
                            table: right.clone(),
                        });
                    }
                }
            }
        }

        let mut reached: HashSet<&str> = HashSet::from([start.as_str()]);
        let mut parents: HashMap<&str, &str> = HashMap::new();
        let mut steps = Vec::new();

        for edge in paths.iter().flatten() {
            let Some(right) = edge.right.as_deref() else {
                continue;
            };
            match parents.get(right) {
                Some(parent) if *parent == edge.left => continue,
                Some(_) => {
                    return Err(CompileError::AmbiguousJoinPath {
                        table: right.to_string(),
                    })
                }
                None if right == start => {
                    return Err(CompileError::AmbiguousJoinPath {
                        table: right.to_string(),
                    })
                }
                None => {}
            }

            let on = edge.on.as_deref().unwrap_or_default();
            let condition = self.edge(&edge.left, right, on).ok_or_else(|| {
                CompileError::JoinNotDeclared {
                    left: edge.left.clone(),
                    right: right.to_string(),
                    on: on.to_string(),
                }
            })?;
            if !reached.contains(edge.left.as_str()) {
                return Err(CompileError::InvalidJoin {
                    sql: condition.sql.clone(),
                    reason: format!("'{}' is joined before it is reached", edge.left),
                });
            }

            parents.insert(right, edge.left.as_str());
            reached.insert(right);
            steps.push(JoinStep {
                left: edge.left.clone(),
                right: right.to_string(),
                sql: condition.sql.clone(),
            });
        }

        if let Some(missing) = used.iter().find(|t| !reached.contains(**t)) {
            return Err(CompileError::MissingJoinPath {
                table: missing.to_string(),
            });
        }

        Ok(JoinPlan { start, steps })
    }

    /// Walk declared edges from the first used table that reaches all others.
    fn plan_breadth_first(&self, used: &[&str]) -> CompileResult<JoinPlan> {
        let mut unreachable_from_first = used[1];
        for start in used {
            let Some(&start_idx) = self.node_indices.get(*start) else {
                continue;
            };

            let mut visited: HashSet<NodeIndex> = HashSet::from([start_idx]);
            let mut queue: VecDeque<NodeIndex> = VecDeque::from([start_idx]);
            let mut steps = Vec::new();

            while let Some(current) = queue.pop_front() {
                for (target, condition) in self.ordered_edges(current) {
                    if !visited.insert(target) {
                        continue;
                    }
                    steps.push(JoinStep {
                        left: self.graph[current].clone(),
                        right: self.graph[target].clone(),
                        sql: condition.sql.clone(),
                    });
                    queue.push_back(target);
                }
            }

            let missing = used.iter().find(|t| {
                self.node_indices
                    .get(**t)
                    .map_or(true, |idx| !visited.contains(idx))
            });
            match missing {
                None => {
                    return Ok(JoinPlan {
                        start: start.to_string(),
                        steps,
                    })
                }
                Some(table) if start == &used[0] => unreachable_from_first = *table,
                Some(_) => {}
            }
        }

        Err(CompileError::MissingJoinPath {
            table: unreachable_from_first.to_string(),
        })
    }
}
