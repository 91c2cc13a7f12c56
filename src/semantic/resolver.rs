//! Member resolution: `table.member` references to schema declarations.

use std::collections::HashMap;

use crate::compile::{CompileError, CompileResult};
use crate::model::{MemberDef, MemberType, TableSchema};

/// Whether a member aggregates (measure) or groups (dimension).
///
/// Measures filter in HAVING, dimensions in WHERE; only dimensions are
/// grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Measure,
    Dimension,
}

/// Split a member reference on its first dot.
///
/// The member part may itself contain dots: `orders.meta.region` is
/// member `meta.region` of table `orders`.
pub fn split_member_ref(reference: &str) -> CompileResult<(&str, &str)> {
    match reference.split_once('.') {
        Some((table, member)) if !table.is_empty() && !member.is_empty() => Ok((table, member)),
        _ => Err(CompileError::InvalidMemberRef {
            member: reference.to_string(),
        }),
    }
}

/// A member reference resolved against its schema.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedMember<'a> {
    pub reference: &'a str,
    pub table: &'a TableSchema,
    pub def: &'a MemberDef,
    pub kind: MemberKind,
}

impl ResolvedMember<'_> {
    pub fn member_type(&self) -> MemberType {
        self.def.member_type
    }

    pub fn is_measure(&self) -> bool {
        self.kind == MemberKind::Measure
    }
}

/// Looks members up by table name, measures first.
#[derive(Debug)]
pub struct MemberResolver<'a> {
    schemas: HashMap<&'a str, &'a TableSchema>,
}

impl<'a> MemberResolver<'a> {
    pub fn new(schemas: &'a [TableSchema]) -> Self {
        Self {
            schemas: schemas.iter().map(|s| (s.name.as_str(), s)).collect(),
        }
    }

    pub fn schema(&self, table: &str) -> CompileResult<&'a TableSchema> {
        self.schemas
            .get(table)
            .copied()
            .ok_or_else(|| CompileError::SchemaNotFound {
                table: table.to_string(),
            })
    }

    pub fn resolve<'r>(&self, reference: &'r str) -> CompileResult<ResolvedMember<'r>>
    where
        'a: 'r,
    {
        let (table_name, member_name) = split_member_ref(reference)?;
        let table = self.schema(table_name)?;

        let (def, kind) = if let Some(def) = table.measure(member_name) {
            (def, MemberKind::Measure)
        } else if let Some(def) = table.dimension(member_name) {
            (def, MemberKind::Dimension)
        } else {
            return Err(CompileError::MemberNotFound {
                member: reference.to_string(),
            });
        };

        Ok(ResolvedMember {
            reference,
            table,
            def,
            kind,
        })
    }
}
