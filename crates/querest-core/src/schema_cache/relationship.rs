//! Relationship types and cardinality derivation.

use super::introspect::{ForeignKeyRow, KeyRow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The shape of a relationship between two tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    /// Many-to-one: the source holds the foreign key.
    M2o,
    /// One-to-many: mirror of an FK held by the target.
    O2m,
    /// One-to-one: the FK columns are covered by a unique key.
    O2o,
    /// Many-to-many through a junction table.
    M2m,
}

/// Junction descriptor for an m2m relationship.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Junction {
    pub schema: String,
    pub table: String,
    /// (parent column, junction column) pairs.
    pub source_columns: Vec<(String, String)>,
    /// (junction column, target column) pairs.
    pub target_columns: Vec<(String, String)>,
    /// FK constraint from the junction to the source table.
    pub source_constraint: String,
    /// FK constraint from the junction to the target table.
    pub target_constraint: String,
}

/// A relationship from a source table to a target table.
///
/// `source_columns` and `target_columns` pair by position. For `M2m` the
/// junction descriptor is present and carries the column pairings through
/// the junction table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub constraint: String,
    pub source_schema: String,
    pub source_table: String,
    pub source_columns: Vec<String>,
    pub target_schema: String,
    pub target_table: String,
    pub target_columns: Vec<String>,
    pub cardinality: Cardinality,
    pub junction: Option<Junction>,
}

impl Relationship {
    /// Does this relationship embed at most one row?
    pub fn is_to_one(&self) -> bool {
        matches!(self.cardinality, Cardinality::M2o | Cardinality::O2o)
    }

    /// Does a hint name this relationship?
    ///
    /// Hints match the constraint name, either junction constraint name,
    /// or any column on either side.
    pub fn matches_hint(&self, hint: &str) -> bool {
        if self.constraint == hint {
            return true;
        }
        if let Some(junction) = &self.junction {
            if junction.source_constraint == hint || junction.target_constraint == hint {
                return true;
            }
        }
        self.source_columns.iter().any(|c| c == hint)
            || self.target_columns.iter().any(|c| c == hint)
    }
}

/// Map of (schema, table) to the relationships rooted there.
pub type RelationshipsMap = HashMap<(String, String), Vec<Relationship>>;

/// Derive the relationship map from raw foreign-key and key rows.
///
/// Each FK produces an `m2o` relationship and its mirror; the FK is
/// `o2o` when its source columns are covered by a unique key on the
/// source table. A table with two FKs whose combined source columns
/// cover one of its keys is a junction and produces an `m2m` pair.
pub fn derive_relationships(fks: &[ForeignKeyRow], keys: &[KeyRow]) -> RelationshipsMap {
    let mut map: RelationshipsMap = HashMap::new();

    for fk in fks {
        let unique = covers_key_subset(&fk.source_schema, &fk.source_table, &fk.source_columns, keys);

        let forward = Relationship {
            constraint: fk.constraint.clone(),
            source_schema: fk.source_schema.clone(),
            source_table: fk.source_table.clone(),
            source_columns: fk.source_columns.clone(),
            target_schema: fk.target_schema.clone(),
            target_table: fk.target_table.clone(),
            target_columns: fk.target_columns.clone(),
            cardinality: if unique { Cardinality::O2o } else { Cardinality::M2o },
            junction: None,
        };

        let mirror = Relationship {
            constraint: fk.constraint.clone(),
            source_schema: fk.target_schema.clone(),
            source_table: fk.target_table.clone(),
            source_columns: fk.target_columns.clone(),
            target_schema: fk.source_schema.clone(),
            target_table: fk.source_table.clone(),
            target_columns: fk.source_columns.clone(),
            cardinality: if unique { Cardinality::O2o } else { Cardinality::O2m },
            junction: None,
        };

        map.entry((forward.source_schema.clone(), forward.source_table.clone()))
            .or_default()
            .push(forward);
        map.entry((mirror.source_schema.clone(), mirror.source_table.clone()))
            .or_default()
            .push(mirror);
    }

    derive_junctions(fks, keys, &mut map);

    map
}

/// Are the FK columns a subset of some primary/unique key on the table?
fn covers_key_subset(schema: &str, table: &str, fk_cols: &[String], keys: &[KeyRow]) -> bool {
    keys.iter().any(|k| {
        k.schema == schema
            && k.table == table
            && fk_cols.iter().all(|c| k.columns.contains(c))
    })
}

fn derive_junctions(fks: &[ForeignKeyRow], keys: &[KeyRow], map: &mut RelationshipsMap) {
    // Group FKs by owning table.
    let mut by_table: HashMap<(&str, &str), Vec<&ForeignKeyRow>> = HashMap::new();
    for fk in fks {
        by_table
            .entry((fk.source_schema.as_str(), fk.source_table.as_str()))
            .or_default()
            .push(fk);
    }

    for ((schema, table), table_fks) in &by_table {
        for (i, fk_a) in table_fks.iter().enumerate() {
            for fk_b in &table_fks[i + 1..] {
                let combined: Vec<String> = fk_a
                    .source_columns
                    .iter()
                    .chain(fk_b.source_columns.iter())
                    .cloned()
                    .collect();

                let is_junction = keys.iter().any(|k| {
                    k.schema == *schema
                        && k.table == *table
                        && k.columns.iter().all(|c| combined.contains(c))
                });
                if !is_junction {
                    continue;
                }

                push_m2m(map, fk_a, fk_b);
                push_m2m(map, fk_b, fk_a);
            }
        }
    }
}

/// Register one m2m relationship from `fk_source`'s target towards
/// `fk_target`'s target, through their shared junction table.
fn push_m2m(map: &mut RelationshipsMap, fk_source: &ForeignKeyRow, fk_target: &ForeignKeyRow) {
    let junction = Junction {
        schema: fk_source.source_schema.clone(),
        table: fk_source.source_table.clone(),
        source_columns: fk_source
            .target_columns
            .iter()
            .cloned()
            .zip(fk_source.source_columns.iter().cloned())
            .collect(),
        target_columns: fk_target
            .source_columns
            .iter()
            .cloned()
            .zip(fk_target.target_columns.iter().cloned())
            .collect(),
        source_constraint: fk_source.constraint.clone(),
        target_constraint: fk_target.constraint.clone(),
    };

    let rel = Relationship {
        constraint: fk_source.constraint.clone(),
        source_schema: fk_source.target_schema.clone(),
        source_table: fk_source.target_table.clone(),
        source_columns: fk_source.target_columns.clone(),
        target_schema: fk_target.target_schema.clone(),
        target_table: fk_target.target_table.clone(),
        target_columns: fk_target.target_columns.clone(),
        cardinality: Cardinality::M2m,
        junction: Some(junction),
    };

    map.entry((rel.source_schema.clone(), rel.source_table.clone()))
        .or_default()
        .push(rel);
}
