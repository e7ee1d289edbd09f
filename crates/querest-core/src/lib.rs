//! Querest Core - PostgREST-style query strings compiled to PostgreSQL.
//!
//! # Architecture
//!
//! The compilation pipeline:
//!
//! 1. **Decomposition & dispatch** (`parse`) - split the query string and
//!    route each key to a sublanguage parser
//! 2. **Sublanguage parsers** (`parse::{filter, logic, select, order}`) -
//!    produce the [`ParsedParams`] AST
//! 3. **SQL emission** (`emit`) - lower the AST to a parameterized
//!    statement, embedding relations through the schema cache
//!
//! The schema cache (`schema_cache`) is the only stateful component:
//! tenant-scoped metadata refreshed from the database catalogs and read
//! concurrently by emitters.
//!
//! # Example
//!
//! ```
//! use querest_core::query_string_to_sql;
//!
//! let result = query_string_to_sql(
//!     "users",
//!     "select=id,name&age=gte.18&order=created_at.desc&limit=10",
//! )
//! .unwrap();
//!
//! assert!(result.sql.starts_with("SELECT"));
//! assert!(result.sql.contains("WHERE \"age\" >= $1"));
//! assert_eq!(result.tables, vec!["users"]);
//! ```

pub mod ast;
pub mod emit;
pub mod error;
pub mod parse;
pub mod schema_cache;

pub use ast::{
    Condition, Direction, Field, FieldHint, Filter, FilterOperator, FilterValue, JsonStep,
    LogicOperator, LogicTree, NullsOrder, OrderTerm, ParsedParams, Quantifier, SelectItem,
};
pub use emit::{FilterClause, QueryResult, SqlEmitter};
pub use error::{Error, ErrorKind, Result};
pub use parse::{parse_query_string, parse_params};
pub use schema_cache::{
    Cardinality, Column, ForeignKeyRow, Junction, KeyRow, PgIntrospector, Relationship,
    SchemaCache, SchemaIntrospector, Table,
};

use emit::EmbedContext;
use std::collections::HashMap;

/// Compile parsed parameters to SQL without relation embedding.
///
/// Relation and spread items in the projection are skipped; use
/// [`to_sql_with_relations`] to embed them.
pub fn to_sql(table: &str, params: &ParsedParams) -> Result<QueryResult> {
    SqlEmitter::new().emit_select(table, params)
}

/// Compile parsed parameters to SQL, embedding relations against the
/// schema cache.
pub fn to_sql_with_relations(
    tenant: &str,
    schema: &str,
    table: &str,
    params: &ParsedParams,
    cache: &SchemaCache,
) -> Result<QueryResult> {
    SqlEmitter::with_embedding(EmbedContext {
        cache,
        tenant,
        schema,
    })
    .emit_select(table, params)
}

/// Parse a query string and compile it, without embedding.
pub fn query_string_to_sql(table: &str, query_string: &str) -> Result<QueryResult> {
    let params = parse_query_string(query_string)?;
    to_sql(table, &params)
}

/// Parse a query string and compile it with relation embedding.
pub fn query_string_to_sql_with_relations(
    tenant: &str,
    schema: &str,
    table: &str,
    query_string: &str,
    cache: &SchemaCache,
) -> Result<QueryResult> {
    let params = parse_query_string(query_string)?;
    to_sql_with_relations(tenant, schema, table, &params, cache)
}

/// Compile only a WHERE body from filter pairs, for subscription filters.
///
/// Reserved keys are ignored; logic keys and filter keys contribute
/// conditions. Keys are processed in sorted order.
pub fn build_filter_clause(pairs: &HashMap<String, String>) -> Result<FilterClause> {
    let mut sorted: Vec<(&String, &String)> = pairs.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut conditions = Vec::new();
    for (key, value) in sorted {
        if parse::reserved_key(key) {
            continue;
        }
        if parse::logic_key(key) {
            conditions.push(Condition::Logic(parse::parse_logic(key, value)?));
        } else {
            conditions.push(Condition::Filter(parse::parse_filter(key, value)?));
        }
    }

    SqlEmitter::new().emit_where_body(&conditions)
}

/// Prelude for common imports.
pub mod prelude {
    pub use super::ast::{Condition, Field, Filter, FilterOperator, ParsedParams, SelectItem};
    pub use super::emit::{FilterClause, QueryResult};
    pub use super::error::{Error, Result};
    pub use super::schema_cache::{SchemaCache, SchemaIntrospector};
    pub use super::{
        build_filter_clause, parse_params, parse_query_string, query_string_to_sql,
        query_string_to_sql_with_relations, to_sql, to_sql_with_relations,
    };
}
