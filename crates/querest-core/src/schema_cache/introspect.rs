//! Schema introspection.
//!
//! The cache consumes raw rows through [`SchemaIntrospector`], so tests
//! (and non-sqlx embeddings) can feed fixture rows while production uses
//! [`PgIntrospector`] against the PostgreSQL catalogs.

use super::table::{Column, Table};
use crate::error::{Error, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

/// One foreign-key constraint, column lists paired by position.
#[derive(Clone, Debug, PartialEq)]
pub struct ForeignKeyRow {
    pub constraint: String,
    pub source_schema: String,
    pub source_table: String,
    pub source_columns: Vec<String>,
    pub target_schema: String,
    pub target_table: String,
    pub target_columns: Vec<String>,
}

/// One primary or unique key.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyRow {
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
}

/// Source of raw schema metadata for a refresh.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    async fn tables(&self) -> Result<Vec<Table>>;
    async fn foreign_keys(&self) -> Result<Vec<ForeignKeyRow>>;
    async fn table_keys(&self) -> Result<Vec<KeyRow>>;
}

/// Catalog-backed introspector.
pub struct PgIntrospector<'a> {
    pool: &'a PgPool,
    schemas: Vec<String>,
}

impl<'a> PgIntrospector<'a> {
    pub fn new(pool: &'a PgPool, schemas: &[String]) -> Self {
        Self {
            pool,
            schemas: schemas.to_vec(),
        }
    }
}

#[async_trait]
impl SchemaIntrospector for PgIntrospector<'_> {
    async fn tables(&self) -> Result<Vec<Table>> {
        let table_rows = sqlx::query(
            r#"
            SELECT
                t.table_schema,
                t.table_name,
                t.table_type,
                COALESCE(
                    (SELECT array_agg(a.attname ORDER BY array_position(i.indkey, a.attnum))
                    FROM pg_index i
                    JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
                    WHERE i.indrelid = (quote_ident(t.table_schema) || '.' || quote_ident(t.table_name))::regclass
                      AND i.indisprimary),
                    ARRAY[]::text[]
                ) AS pk_cols
            FROM information_schema.tables t
            WHERE t.table_schema = ANY($1)
              AND t.table_type IN ('BASE TABLE', 'VIEW')
            ORDER BY t.table_schema, t.table_name
            "#,
        )
        .bind(&self.schemas)
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::SchemaRefresh(e.to_string()))?;

        let column_rows = sqlx::query(
            r#"
            SELECT
                c.table_schema,
                c.table_name,
                c.column_name,
                c.ordinal_position,
                c.is_nullable,
                c.data_type
            FROM information_schema.columns c
            WHERE c.table_schema = ANY($1)
            ORDER BY c.table_schema, c.table_name, c.ordinal_position
            "#,
        )
        .bind(&self.schemas)
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::SchemaRefresh(e.to_string()))?;

        let mut columns_by_table: HashMap<(String, String), Vec<Column>> = HashMap::new();
        for row in column_rows {
            let schema: String = row.get("table_schema");
            let table: String = row.get("table_name");
            let is_nullable: String = row.get("is_nullable");
            columns_by_table
                .entry((schema, table))
                .or_default()
                .push(Column {
                    name: row.get("column_name"),
                    data_type: row.get("data_type"),
                    nullable: is_nullable == "YES",
                    position: row.get("ordinal_position"),
                    is_pk: false,
                });
        }

        let mut tables = Vec::with_capacity(table_rows.len());
        for row in table_rows {
            let schema: String = row.get("table_schema");
            let name: String = row.get("table_name");
            let table_type: String = row.get("table_type");
            let pk_cols: Vec<String> = row.get("pk_cols");

            let mut columns = columns_by_table
                .remove(&(schema.clone(), name.clone()))
                .unwrap_or_default();
            for column in &mut columns {
                column.is_pk = pk_cols.contains(&column.name);
            }

            tables.push(Table {
                schema,
                name,
                is_view: table_type == "VIEW",
                pk_cols,
                columns,
            });
        }

        Ok(tables)
    }

    async fn foreign_keys(&self) -> Result<Vec<ForeignKeyRow>> {
        let rows = sqlx::query(
            r#"
            SELECT
                c.conname AS constraint_name,
                ns1.nspname AS source_schema,
                t1.relname AS source_table,
                ns2.nspname AS target_schema,
                t2.relname AS target_table,
                array_agg(a1.attname ORDER BY array_position(c.conkey, a1.attnum)) AS source_columns,
                array_agg(a2.attname ORDER BY array_position(c.confkey, a2.attnum)) AS target_columns
            FROM pg_constraint c
            JOIN pg_class t1 ON t1.oid = c.conrelid
            JOIN pg_namespace ns1 ON ns1.oid = t1.relnamespace
            JOIN pg_class t2 ON t2.oid = c.confrelid
            JOIN pg_namespace ns2 ON ns2.oid = t2.relnamespace
            JOIN pg_attribute a1 ON a1.attrelid = c.conrelid AND a1.attnum = ANY(c.conkey)
            JOIN pg_attribute a2 ON a2.attrelid = c.confrelid AND a2.attnum = ANY(c.confkey)
            WHERE c.contype = 'f'
              AND ns1.nspname = ANY($1)
            GROUP BY c.conname, ns1.nspname, t1.relname, ns2.nspname, t2.relname,
                     c.conrelid, c.conkey
            "#,
        )
        .bind(&self.schemas)
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::SchemaRefresh(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| ForeignKeyRow {
                constraint: row.get("constraint_name"),
                source_schema: row.get("source_schema"),
                source_table: row.get("source_table"),
                source_columns: row.get("source_columns"),
                target_schema: row.get("target_schema"),
                target_table: row.get("target_table"),
                target_columns: row.get("target_columns"),
            })
            .collect())
    }

    async fn table_keys(&self) -> Result<Vec<KeyRow>> {
        let rows = sqlx::query(
            r#"
            SELECT
                ns.nspname AS table_schema,
                t.relname AS table_name,
                array_agg(a.attname ORDER BY array_position(i.indkey, a.attnum)) AS columns
            FROM pg_index i
            JOIN pg_class t ON t.oid = i.indrelid
            JOIN pg_namespace ns ON ns.oid = t.relnamespace
            JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
            WHERE (i.indisprimary OR i.indisunique)
              AND ns.nspname = ANY($1)
            GROUP BY ns.nspname, t.relname, i.indexrelid
            "#,
        )
        .bind(&self.schemas)
        .fetch_all(self.pool)
        .await
        .map_err(|e| Error::SchemaRefresh(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| KeyRow {
                schema: row.get("table_schema"),
                table: row.get("table_name"),
                columns: row.get("columns"),
            })
            .collect())
    }
}
