//! Output column naming.
//!
//! Every projected member gets one stable name per compiled query:
//!
//! - underscore notation: `orders__customer_id`, unquoted, with dots in the
//!   member replaced by `__`
//! - dot notation: `"orders.customer_id"`, always quoted
//!
//! A member's custom `alias` wins unless it collides with another member's
//! generated name, with a custom alias already handed out, or with the raw
//! column another referenced member reads.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::sql::Ident;

static RAW_COLUMN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\{MEERKAT\}\.|[A-Za-z_][A-Za-z0-9_]*\.)?([A-Za-z_][A-Za-z0-9_]*)$").unwrap()
});

/// The source column a member's SQL names directly, as in `order_id`,
/// `orders.order_id` or `{MEERKAT}.order_id`.
fn raw_column(sql: &str) -> Option<&str> {
    RAW_COLUMN_RE
        .captures(sql.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Naming scheme for generated aliases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AliasNotation {
    #[default]
    Underscore,
    Dot,
}

impl AliasNotation {
    pub fn from_dot_notation(use_dot_notation: bool) -> Self {
        if use_dot_notation {
            AliasNotation::Dot
        } else {
            AliasNotation::Underscore
        }
    }
}

/// `orders.meta.region` -> `orders__meta__region`
pub fn safe_key(reference: &str) -> String {
    reference.replace('.', "__")
}

fn generated_text(notation: AliasNotation, reference: &str) -> String {
    match notation {
        AliasNotation::Underscore => safe_key(reference),
        AliasNotation::Dot => reference.to_string(),
    }
}

fn notation_ident(notation: AliasNotation, text: String) -> Ident {
    match notation {
        AliasNotation::Underscore => Ident::bare(text),
        AliasNotation::Dot => Ident::quoted(text),
    }
}

/// The alias a member gets when no custom alias applies.
pub fn generated_alias(notation: AliasNotation, reference: &str) -> Ident {
    notation_ident(notation, generated_text(notation, reference))
}

/// Alias of the unmodified copy of an array dimension.
pub fn unmodified_alias(notation: AliasNotation, reference: &str) -> Ident {
    notation_ident(
        notation,
        format!("{}__unmodified", generated_text(notation, reference)),
    )
}

/// Assigns output names for one compiled query.
#[derive(Debug, Clone, Default)]
pub struct AliasNamer {
    notation: AliasNotation,
    names: HashMap<String, Ident>,
}

impl AliasNamer {
    /// Name `members`, given as `(reference, custom alias, sql)` in projection order.
    pub fn new<'m>(
        notation: AliasNotation,
        members: impl IntoIterator<Item = (&'m str, Option<&'m str>, &'m str)>,
    ) -> Self {
        let members: Vec<_> = members.into_iter().collect();
        let generated: HashSet<String> = members
            .iter()
            .map(|(reference, _, _)| generated_text(notation, reference))
            .collect();
        let raw_columns: Vec<(&str, &str)> = members
            .iter()
            .filter_map(|(reference, _, sql)| raw_column(sql).map(|column| (*reference, column)))
            .collect();

        let mut claimed: HashSet<&str> = HashSet::new();
        let mut names = HashMap::with_capacity(members.len());

        for (reference, custom, _) in members {
            if names.contains_key(reference) {
                continue;
            }
            let own = generated_text(notation, reference);
            let shadows_column = |custom: &str| {
                raw_columns
                    .iter()
                    .any(|(other, column)| *other != reference && *column == custom)
            };
            let ident = match custom {
                Some(custom)
                    if !claimed.contains(custom)
                        && (custom == own || !generated.contains(custom))
                        && !shadows_column(custom) =>
                {
                    claimed.insert(custom);
                    Ident::quoted(custom)
                }
                Some(custom) => {
                    log::debug!(
                        "alias '{}' of {} collides, using generated name",
                        custom,
                        reference
                    );
                    notation_ident(notation, own)
                }
                None => notation_ident(notation, own),
            };
            names.insert(reference.to_string(), ident);
        }

        Self { notation, names }
    }

    /// Output name of `reference`. Unknown references get their generated name.
    pub fn alias(&self, reference: &str) -> Ident {
        self.names
            .get(reference)
            .cloned()
            .unwrap_or_else(|| generated_alias(self.notation, reference))
    }

    pub fn generated(&self, reference: &str) -> Ident {
        generated_alias(self.notation, reference)
    }

    pub fn unmodified(&self, reference: &str) -> Ident {
        unmodified_alias(self.notation, reference)
    }
}
