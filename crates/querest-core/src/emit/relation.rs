//! Relation embedding.
//!
//! Each relation or spread item in the projection becomes one
//! `LEFT JOIN LATERAL` subquery returning the embedded rows as JSON (or,
//! for spreads, as individual columns), plus the matching outer
//! projection columns. Synthetic aliases come from one monotonically
//! increasing counter per query, so every subquery alias is unique.

use super::{projection_sql, EmbedContext};
use crate::ast::SelectItem;
use crate::error::Result;
use crate::schema_cache::Relationship;
use querest_sql::{escape_ident, QualifiedIdentifier};

/// The parent side of an embedding: how to reference it in join
/// conditions, and which table to resolve relationships against.
pub(crate) struct ParentRef {
    pub sql_ref: String,
    pub table: String,
}

/// One emitted embedding.
pub(crate) struct EmbedSql {
    pub join: String,
    pub outer_columns: Vec<String>,
    pub tables: Vec<String>,
}

/// Build the lateral join and outer projection for one embedded item.
pub(crate) fn build_embed(
    ctx: &EmbedContext<'_>,
    parent: &ParentRef,
    item: &SelectItem,
    seq: &mut usize,
) -> Result<EmbedSql> {
    let (name, alias, hint, children, is_spread) = match item {
        SelectItem::Relation {
            name,
            alias,
            hint,
            children,
        } => (name, alias, hint, children, false),
        SelectItem::Spread {
            name,
            alias,
            hint,
            children,
        } => (name, alias, hint, children, true),
        SelectItem::Field { .. } => unreachable!("fields are not embedded"),
    };

    let rel = match hint {
        Some(hint) => ctx.cache.find_relationship_with_hint(
            ctx.tenant,
            ctx.schema,
            &parent.table,
            name,
            hint,
        )?,
        None => ctx
            .cache
            .find_relationship(ctx.tenant, ctx.schema, &parent.table, name)?,
    };

    let index = *seq;
    *seq += 1;
    let rel_alias = format!("{}_{}", alias_stem(name), index);
    let agg_alias = format!("{}_agg", rel_alias);
    let output = alias.as_deref().unwrap_or(name.as_str());

    let mut tables = vec![rel.target_table.clone()];
    if let Some(junction) = &rel.junction {
        tables.push(junction.table.clone());
    }

    // Inner projection: child columns qualified by the relation alias,
    // plus lateral joins for nested embeddings.
    let mut inner_cols: Vec<String> = Vec::new();
    let mut inner_outputs: Vec<String> = Vec::new();
    let mut nested_joins: Vec<String> = Vec::new();

    for child in children {
        match child {
            SelectItem::Field { name, alias, hint } => {
                // JSON-path and cast expressions need an explicit output
                // name so the aggregated objects keep usable keys.
                let inner_alias = match alias {
                    Some(a) => Some(a.as_str()),
                    None if hint.is_some() => Some(name.as_str()),
                    None => None,
                };
                inner_cols.push(projection_sql(Some(&rel_alias), name, inner_alias, hint)?);
                inner_outputs.push(alias.clone().unwrap_or_else(|| name.clone()));
            }
            SelectItem::Relation { .. } | SelectItem::Spread { .. } => {
                let nested_parent = ParentRef {
                    sql_ref: rel_alias.clone(),
                    table: rel.target_table.clone(),
                };
                let nested = build_embed(ctx, &nested_parent, child, seq)?;
                inner_cols.extend(nested.outer_columns);
                nested_joins.push(nested.join);
                tables.extend(nested.tables);
                inner_outputs.push(embed_output_name(child));
            }
        }
    }

    // An empty child list, or a bare `*`, embeds the whole row.
    let whole_row = nested_joins.is_empty()
        && (children.is_empty()
            || (children.len() == 1
                && matches!(&children[0], SelectItem::Field { name, .. } if name == "*")));

    let target_qi = QualifiedIdentifier::new(&rel.target_schema, &rel.target_table);
    let join_cond = parent_join_condition(&parent.sql_ref, &rel, &rel_alias);

    let inner = match (&rel.junction, is_spread, whole_row) {
        // Plain relation against the target table.
        (None, false, true) => format!(
            "SELECT {agg_fn}({alias}) AS {alias} FROM {target} AS {alias} WHERE {cond}{limit}",
            agg_fn = agg_fn(&rel),
            alias = rel_alias,
            target = target_qi.to_sql(),
            cond = join_cond,
            limit = limit_one(&rel),
        ),
        (None, false, false) => format!(
            "SELECT {agg_fn}({alias}) AS {alias} FROM ( SELECT {cols} FROM {target} AS {alias}{nested} WHERE {cond}{limit} ) AS {alias}",
            agg_fn = agg_fn(&rel),
            alias = rel_alias,
            cols = inner_cols.join(", "),
            target = target_qi.to_sql(),
            nested = joined(&nested_joins),
            cond = join_cond,
            limit = limit_one(&rel),
        ),
        // Spread: the subquery provides the columns individually.
        (None, true, true) => format!(
            "SELECT {alias}.* FROM {target} AS {alias}{nested} WHERE {cond}{limit}",
            alias = rel_alias,
            target = target_qi.to_sql(),
            nested = joined(&nested_joins),
            cond = join_cond,
            limit = limit_one(&rel),
        ),
        (None, true, false) => format!(
            "SELECT {cols} FROM {target} AS {alias}{nested} WHERE {cond}{limit}",
            cols = inner_cols.join(", "),
            target = target_qi.to_sql(),
            alias = rel_alias,
            nested = joined(&nested_joins),
            cond = join_cond,
            limit = limit_one(&rel),
        ),
        // Junction forms.
        (Some(_), false, true) => format!(
            "SELECT json_agg({alias}.*) AS {alias} FROM {junction_from} WHERE {cond}",
            alias = rel_alias,
            junction_from = junction_from(&rel, &rel_alias, index),
            cond = junction_where(&parent.sql_ref, &rel, index),
        ),
        (Some(_), false, false) => format!(
            "SELECT json_agg({alias}) AS {alias} FROM ( SELECT {cols} FROM {junction_from}{nested} WHERE {cond} ) AS {alias}",
            alias = rel_alias,
            cols = inner_cols.join(", "),
            junction_from = junction_from(&rel, &rel_alias, index),
            nested = joined(&nested_joins),
            cond = junction_where(&parent.sql_ref, &rel, index),
        ),
        (Some(_), true, true) => format!(
            "SELECT {alias}.* FROM {junction_from}{nested} WHERE {cond}",
            alias = rel_alias,
            junction_from = junction_from(&rel, &rel_alias, index),
            nested = joined(&nested_joins),
            cond = junction_where(&parent.sql_ref, &rel, index),
        ),
        (Some(_), true, false) => format!(
            "SELECT {cols} FROM {junction_from}{nested} WHERE {cond}",
            cols = inner_cols.join(", "),
            junction_from = junction_from(&rel, &rel_alias, index),
            nested = joined(&nested_joins),
            cond = junction_where(&parent.sql_ref, &rel, index),
        ),
    };

    let join = format!(
        "LEFT JOIN LATERAL ( {} ) AS {} ON true",
        inner, agg_alias
    );

    let outer_columns = if is_spread {
        if whole_row {
            vec![format!("{}.*", agg_alias)]
        } else {
            inner_outputs
                .iter()
                .map(|out| format!("{}.{} AS {}", agg_alias, escape_ident(out), escape_ident(out)))
                .collect()
        }
    } else {
        vec![format!(
            "{}.{} AS {}",
            agg_alias,
            rel_alias,
            escape_ident(output)
        )]
    };

    Ok(EmbedSql {
        join,
        outer_columns,
        tables,
    })
}

/// Reduce a relation name to text that is safe to splice bare after
/// `AS`. Synthetic aliases are referenced back in quoted form, so the
/// stem must also survive PostgreSQL's lowercase folding: only
/// `[a-z0-9_]` may remain, and the first character may not be a digit.
fn alias_stem(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            stem.push(c.to_ascii_lowercase());
        } else {
            stem.push('_');
        }
    }
    if stem.is_empty() || stem.starts_with(|c: char| c.is_ascii_digit()) {
        stem.insert(0, '_');
    }
    stem
}

/// The output column name an embedded child contributes.
fn embed_output_name(item: &SelectItem) -> String {
    match item {
        SelectItem::Field { name, alias, .. }
        | SelectItem::Relation { name, alias, .. }
        | SelectItem::Spread { name, alias, .. } => {
            alias.clone().unwrap_or_else(|| name.clone())
        }
    }
}

fn agg_fn(rel: &Relationship) -> &'static str {
    if rel.is_to_one() {
        "row_to_json"
    } else {
        "json_agg"
    }
}

fn limit_one(rel: &Relationship) -> &'static str {
    if rel.is_to_one() {
        " LIMIT 1"
    } else {
        ""
    }
}

fn joined(nested: &[String]) -> String {
    nested
        .iter()
        .map(|j| format!(" {}", j))
        .collect::<String>()
}

/// Pair source and target columns positionally into an AND-joined
/// equality list against the embedded alias.
fn parent_join_condition(parent_ref: &str, rel: &Relationship, rel_alias: &str) -> String {
    rel.source_columns
        .iter()
        .zip(rel.target_columns.iter())
        .map(|(src, tgt)| {
            format!(
                "{}.{} = {}.{}",
                escape_ident(parent_ref),
                escape_ident(src),
                escape_ident(rel_alias),
                escape_ident(tgt)
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// `"junction_schema"."junction_table" AS junction_n JOIN target AS alias
/// ON <junction→target equalities>`.
fn junction_from(rel: &Relationship, rel_alias: &str, index: usize) -> String {
    let junction = rel.junction.as_ref().expect("m2m carries a junction");
    let junction_alias = format!("junction_{}", index);
    let junction_qi = QualifiedIdentifier::new(&junction.schema, &junction.table);
    let target_qi = QualifiedIdentifier::new(&rel.target_schema, &rel.target_table);

    let on = junction
        .target_columns
        .iter()
        .map(|(jcol, tcol)| {
            format!(
                "{}.{} = {}.{}",
                escape_ident(&junction_alias),
                escape_ident(jcol),
                escape_ident(rel_alias),
                escape_ident(tcol)
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ");

    format!(
        "{} AS {} JOIN {} AS {} ON {}",
        junction_qi.to_sql(),
        junction_alias,
        target_qi.to_sql(),
        rel_alias,
        on
    )
}

/// `<parent→junction equalities>` for the junction WHERE clause.
fn junction_where(parent_ref: &str, rel: &Relationship, index: usize) -> String {
    let junction = rel.junction.as_ref().expect("m2m carries a junction");
    let junction_alias = format!("junction_{}", index);

    junction
        .source_columns
        .iter()
        .map(|(pcol, jcol)| {
            format!(
                "{}.{} = {}.{}",
                escape_ident(parent_ref),
                escape_ident(pcol),
                escape_ident(&junction_alias),
                escape_ident(jcol)
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}
