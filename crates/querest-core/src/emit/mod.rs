//! SQL emission.
//!
//! Lowers a [`ParsedParams`] plus a target table into a parameterized
//! SELECT statement. Identifiers are always escaped, values always travel
//! as `$n` parameters, and negation is applied algebraically per
//! operator.

pub mod relation;

use crate::ast::{
    Condition, Field, FieldHint, Filter, FilterOperator, FilterValue, JsonStep, OrderTerm,
    ParsedParams, SelectItem,
};
use crate::error::{Error, Result};
use crate::schema_cache::SchemaCache;
use querest_sql::{escape_ident, quote_literal, SqlFragment, SqlParam};
use serde::Serialize;

/// A compiled statement: SQL text, positional parameters, and the tables
/// the statement touches.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub sql: String,
    pub params: Vec<SqlParam>,
    pub tables: Vec<String>,
}

/// A compiled WHERE body for subscription filters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterClause {
    pub clause: String,
    pub params: Vec<SqlParam>,
}

/// Schema context for relation embedding.
pub(crate) struct EmbedContext<'a> {
    pub cache: &'a SchemaCache,
    pub tenant: &'a str,
    pub schema: &'a str,
}

/// Lowers one request to SQL. One emitter per statement.
pub struct SqlEmitter<'a> {
    frag: SqlFragment,
    tables: Vec<String>,
    embed: Option<EmbedContext<'a>>,
    alias_seq: usize,
}

impl<'a> SqlEmitter<'a> {
    /// An emitter without embedding support; relation items are skipped.
    pub fn new() -> Self {
        Self {
            frag: SqlFragment::new(),
            tables: Vec::new(),
            embed: None,
            alias_seq: 0,
        }
    }

    pub(crate) fn with_embedding(ctx: EmbedContext<'a>) -> Self {
        Self {
            frag: SqlFragment::new(),
            tables: Vec::new(),
            embed: Some(ctx),
            alias_seq: 0,
        }
    }

    /// Emit the full SELECT statement.
    pub fn emit_select(mut self, table: &str, params: &ParsedParams) -> Result<QueryResult> {
        if table.is_empty() {
            return Err(Error::EmptyFieldName);
        }
        self.tables.push(table.to_string());

        let mut columns: Vec<String> = Vec::new();
        let mut joins: Vec<String> = Vec::new();

        match &params.select {
            None => columns.push("*".to_string()),
            Some(items) => {
                for item in items {
                    match item {
                        SelectItem::Field { name, alias, hint } => {
                            columns.push(projection_sql(None, name, alias.as_deref(), hint)?);
                        }
                        SelectItem::Relation { .. } | SelectItem::Spread { .. } => {
                            if let Some(ctx) = &self.embed {
                                let parent = relation::ParentRef {
                                    sql_ref: table.to_string(),
                                    table: table.to_string(),
                                };
                                let embed = relation::build_embed(
                                    ctx,
                                    &parent,
                                    item,
                                    &mut self.alias_seq,
                                )?;
                                columns.extend(embed.outer_columns);
                                joins.push(embed.join);
                                self.tables.extend(embed.tables);
                            }
                        }
                    }
                }
                if columns.is_empty() {
                    columns.push("*".to_string());
                }
            }
        }

        self.frag.push("SELECT ");
        self.frag.push(&columns.join(", "));
        self.frag.push(" FROM ");
        self.frag.push(&escape_ident(table));

        for join in &joins {
            self.frag.push(" ");
            self.frag.push(join);
        }

        if !params.filters.is_empty() {
            self.frag.push(" WHERE ");
            self.emit_conditions(&params.filters)?;
        }

        if !params.order.is_empty() {
            self.frag.push(" ORDER BY ");
            self.emit_order(&params.order);
        }

        if let Some(limit) = params.limit {
            self.frag.push(" LIMIT ");
            self.frag.bind(limit);
        }
        if let Some(offset) = params.offset {
            self.frag.push(" OFFSET ");
            self.frag.bind(offset);
        }

        let (sql, params) = self.frag.into_parts();
        Ok(QueryResult {
            sql,
            params,
            tables: self.tables,
        })
    }

    /// Emit only a WHERE body (no `WHERE` keyword, no statement around it).
    pub fn emit_where_body(mut self, conditions: &[Condition]) -> Result<FilterClause> {
        self.emit_conditions(conditions)?;
        let (clause, params) = self.frag.into_parts();
        Ok(FilterClause { clause, params })
    }

    fn emit_conditions(&mut self, conditions: &[Condition]) -> Result<()> {
        for (i, condition) in conditions.iter().enumerate() {
            if i > 0 {
                self.frag.push(" AND ");
            }
            self.emit_condition(condition)?;
        }
        Ok(())
    }

    fn emit_condition(&mut self, condition: &Condition) -> Result<()> {
        match condition {
            Condition::Filter(filter) => self.emit_filter(filter),
            Condition::Logic(tree) => {
                if tree.negated {
                    self.frag.push("NOT ");
                }
                self.frag.push("(");
                for (i, child) in tree.conditions.iter().enumerate() {
                    if i > 0 {
                        self.frag.push(tree.operator.to_sql());
                    }
                    self.emit_condition(child)?;
                }
                self.frag.push(")");
                Ok(())
            }
        }
    }

    fn emit_filter(&mut self, filter: &Filter) -> Result<()> {
        use FilterOperator::*;

        let field = field_sql(&filter.field);

        // A quantifier turns the binary operator into `op ANY($n)`/`op
        // ALL($n)`; negation prefixes NOT.
        if let Some(quantifier) = filter.quantifier {
            if filter.negated {
                self.frag.push("NOT ");
            }
            self.frag.push(&field);
            self.frag.push(" ");
            self.frag.push(binary_op_sql(filter.operator));
            self.frag.push(" ");
            self.frag.push(quantifier.to_sql());
            self.frag.push("(");
            self.push_value(filter);
            self.frag.push(")");
            return Ok(());
        }

        match filter.operator {
            Eq | Neq | Gt | Gte | Lt | Lte => {
                self.frag.push(&field);
                self.frag.push(" ");
                self.frag
                    .push(comparison_sql(filter.operator, filter.negated));
                self.frag.push(" ");
                self.push_value(filter);
            }
            Like | Ilike => {
                self.frag.push(&field);
                if filter.negated {
                    self.frag.push(" NOT");
                }
                self.frag
                    .push(if filter.operator == Like { " LIKE " } else { " ILIKE " });
                self.push_value(filter);
            }
            Match => {
                self.frag.push(&field);
                self.frag.push(if filter.negated { " !~ " } else { " ~ " });
                self.push_value(filter);
            }
            Imatch => {
                self.frag.push(&field);
                self.frag.push(if filter.negated { " !~* " } else { " ~* " });
                self.push_value(filter);
            }
            In => {
                self.frag.push(&field);
                if filter.negated {
                    self.frag.push(" NOT");
                }
                self.frag.push(" = ANY(");
                self.push_value(filter);
                self.frag.push(")");
            }
            Cs => self.emit_prefixed_binary(&field, "@>", filter),
            Cd => self.emit_prefixed_binary(&field, "<@", filter),
            Ov => self.emit_prefixed_binary(&field, "&&", filter),
            Sl => self.emit_prefixed_binary(&field, "<<", filter),
            Sr => self.emit_prefixed_binary(&field, ">>", filter),
            Nxl => self.emit_prefixed_binary(&field, "&<", filter),
            Nxr => self.emit_prefixed_binary(&field, "&>", filter),
            Adj => self.emit_prefixed_binary(&field, "-|-", filter),
            Fts | Plfts | Phfts | Wfts => {
                if filter.negated {
                    self.frag.push("NOT ");
                }
                self.frag.push(&field);
                self.frag.push(" @@ ");
                self.frag.push(filter.operator.fts_function());
                self.frag.push("(");
                if let Some(language) = &filter.language {
                    self.frag.push(&quote_literal(language));
                    self.frag.push(", ");
                }
                self.push_value(filter);
                self.frag.push(")");
            }
            Is => {
                let payload = match &filter.value {
                    FilterValue::Scalar(s) => s.as_str(),
                    FilterValue::List(_) => {
                        return Err(Error::InvalidFilter("is".to_string()))
                    }
                };
                self.frag.push(&field);
                self.frag.push(" ");
                self.frag.push(is_sql(payload, filter.negated)?);
            }
        }

        Ok(())
    }

    /// Operators whose negated form prefixes `NOT` before the whole
    /// comparison.
    fn emit_prefixed_binary(&mut self, field: &str, op: &str, filter: &Filter) {
        if filter.negated {
            self.frag.push("NOT ");
        }
        self.frag.push(field);
        self.frag.push(" ");
        self.frag.push(op);
        self.frag.push(" ");
        self.push_value(filter);
    }

    fn push_value(&mut self, filter: &Filter) {
        match &filter.value {
            FilterValue::Scalar(s) => self.frag.bind(SqlParam::coerce(s)),
            FilterValue::List(items) => self.frag.bind(SqlParam::coerce_list(items)),
        };
    }

    fn emit_order(&mut self, terms: &[OrderTerm]) {
        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                self.frag.push(", ");
            }
            self.frag.push(&field_sql(&term.field));
            self.frag.push(" ");
            self.frag.push(term.direction.to_sql());
            if let Some(nulls) = term.nulls {
                self.frag.push(" ");
                self.frag.push(nulls.to_sql());
            }
        }
    }
}

impl Default for SqlEmitter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a field reference: escaped name, JSON path steps, cast.
pub(crate) fn field_sql(field: &Field) -> String {
    let mut sql = escape_ident(&field.name);
    for step in &field.json_path {
        push_step(&mut sql, step);
    }
    if let Some(cast) = &field.cast {
        sql.push_str("::");
        sql.push_str(&cast_sql(cast));
    }
    sql
}

fn push_step(sql: &mut String, step: &JsonStep) {
    match step {
        JsonStep::Arrow(key) => {
            sql.push_str("->");
            sql.push_str(&quote_literal(key));
        }
        JsonStep::DoubleArrow(key) => {
            sql.push_str("->>");
            sql.push_str(&quote_literal(key));
        }
        JsonStep::ArrayIndex(idx) => {
            sql.push_str("->");
            sql.push_str(&idx.to_string());
        }
    }
}

// Cast targets from the strict grammar are plain identifiers; anything
// the permissive fallback let through gets quoted.
fn cast_sql(cast: &str) -> String {
    if !cast.is_empty()
        && cast
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        cast.to_string()
    } else {
        escape_ident(cast)
    }
}

/// Render one projected column, optionally qualified by a synthetic alias.
pub(crate) fn projection_sql(
    qualifier: Option<&str>,
    name: &str,
    alias: Option<&str>,
    hint: &Option<FieldHint>,
) -> Result<String> {
    if name == "*" {
        return Ok(match qualifier {
            Some(q) => format!("{}.*", q),
            None => "*".to_string(),
        });
    }

    let mut sql = match qualifier {
        Some(q) => format!("{}.{}", q, escape_ident(name)),
        None => escape_ident(name),
    };

    match hint {
        None => {}
        Some(FieldHint::JsonPath(steps)) => {
            for step in steps {
                push_step(&mut sql, step);
            }
        }
        Some(FieldHint::Cast(cast)) => {
            sql.push_str("::");
            sql.push_str(&cast_sql(cast));
        }
        Some(FieldHint::JsonPathCast(steps, cast)) => {
            for step in steps {
                push_step(&mut sql, step);
            }
            sql.push_str("::");
            sql.push_str(&cast_sql(cast));
        }
    }

    if let Some(alias) = alias {
        sql.push_str(" AS ");
        sql.push_str(&escape_ident(alias));
    }

    Ok(sql)
}

fn comparison_sql(op: FilterOperator, negated: bool) -> &'static str {
    use FilterOperator::*;
    match (op, negated) {
        (Eq, false) | (Neq, true) => "=",
        (Eq, true) | (Neq, false) => "<>",
        (Gt, false) => ">",
        (Gt, true) => "<=",
        (Gte, false) => ">=",
        (Gte, true) => "<",
        (Lt, false) => "<",
        (Lt, true) => ">=",
        (Lte, false) => "<=",
        (Lte, true) => ">",
        _ => unreachable!("not a comparison operator"),
    }
}

/// The positive binary spelling, used under a quantifier.
fn binary_op_sql(op: FilterOperator) -> &'static str {
    use FilterOperator::*;
    match op {
        Eq => "=",
        Neq => "<>",
        Gt => ">",
        Gte => ">=",
        Lt => "<",
        Lte => "<=",
        Like => "LIKE",
        Ilike => "ILIKE",
        Match => "~",
        Imatch => "~*",
        _ => unreachable!("operator does not take a quantifier"),
    }
}

fn is_sql(payload: &str, negated: bool) -> Result<&'static str> {
    Ok(match (payload, negated) {
        ("null", false) => "IS NULL",
        ("null", true) => "IS NOT NULL",
        ("not_null", false) => "IS NOT NULL",
        ("not_null", true) => "IS NULL",
        ("true", false) => "IS TRUE",
        ("true", true) => "IS NOT TRUE",
        ("false", false) => "IS FALSE",
        ("false", true) => "IS NOT FALSE",
        ("unknown", false) => "IS UNKNOWN",
        ("unknown", true) => "IS NOT UNKNOWN",
        _ => return Err(Error::InvalidFilter(format!("is.{}", payload))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FilterValue, Quantifier};
    use pretty_assertions::assert_eq;

    fn filter(field: &str, op: FilterOperator, value: &str) -> Filter {
        Filter::new(Field::new(field), op, FilterValue::Scalar(value.into()))
    }

    fn emit_one(f: Filter) -> (String, Vec<SqlParam>) {
        let clause = SqlEmitter::new()
            .emit_where_body(&[Condition::Filter(f)])
            .unwrap();
        (clause.clause, clause.params)
    }

    #[test]
    fn test_comparison_lowering() {
        let (sql, params) = emit_one(filter("age", FilterOperator::Gt, "18"));
        assert_eq!(sql, "\"age\" > $1");
        assert_eq!(params, vec![SqlParam::Int(18)]);

        let (sql, _) = emit_one(filter("age", FilterOperator::Lte, "65"));
        assert_eq!(sql, "\"age\" <= $1");
    }

    #[test]
    fn test_comparison_negation_algebra() {
        let (sql, _) = emit_one(filter("age", FilterOperator::Gt, "18").negated());
        assert_eq!(sql, "\"age\" <= $1");

        let (sql, _) = emit_one(filter("status", FilterOperator::Eq, "x").negated());
        assert_eq!(sql, "\"status\" <> $1");

        let (sql, _) = emit_one(filter("status", FilterOperator::Neq, "x").negated());
        assert_eq!(sql, "\"status\" = $1");
    }

    #[test]
    fn test_pattern_lowering() {
        let (sql, _) = emit_one(filter("name", FilterOperator::Like, "J%"));
        assert_eq!(sql, "\"name\" LIKE $1");

        let (sql, _) = emit_one(filter("name", FilterOperator::Ilike, "j%").negated());
        assert_eq!(sql, "\"name\" NOT ILIKE $1");

        let (sql, _) = emit_one(filter("name", FilterOperator::Match, "^J"));
        assert_eq!(sql, "\"name\" ~ $1");

        let (sql, _) = emit_one(filter("name", FilterOperator::Imatch, "^j").negated());
        assert_eq!(sql, "\"name\" !~* $1");
    }

    #[test]
    fn test_in_lowering() {
        let f = Filter::new(
            Field::new("id"),
            FilterOperator::In,
            FilterValue::List(vec!["1".into(), "2".into()]),
        );
        let (sql, params) = emit_one(f.clone());
        assert_eq!(sql, "\"id\" = ANY($1)");
        assert_eq!(
            params,
            vec![SqlParam::Array(vec![SqlParam::Int(1), SqlParam::Int(2)])]
        );

        let (sql, _) = emit_one(f.negated());
        assert_eq!(sql, "\"id\" NOT = ANY($1)");
    }

    #[test]
    fn test_set_and_range_lowering() {
        let (sql, _) = emit_one(filter("tags", FilterOperator::Cs, "{a}"));
        assert_eq!(sql, "\"tags\" @> $1");

        let (sql, _) = emit_one(filter("tags", FilterOperator::Cd, "{a}").negated());
        assert_eq!(sql, "NOT \"tags\" <@ $1");

        let (sql, _) = emit_one(filter("r", FilterOperator::Sl, "[1,2)"));
        assert_eq!(sql, "\"r\" << $1");

        let (sql, _) = emit_one(filter("r", FilterOperator::Adj, "[1,2)").negated());
        assert_eq!(sql, "NOT \"r\" -|- $1");
    }

    #[test]
    fn test_quantifier_lowering() {
        let f = Filter::new(
            Field::new("id"),
            FilterOperator::Eq,
            FilterValue::List(vec!["1".into(), "2".into(), "3".into()]),
        )
        .with_quantifier(Quantifier::Any);
        let (sql, params) = emit_one(f.clone());
        assert_eq!(sql, "\"id\" = ANY($1)");
        assert_eq!(
            params,
            vec![SqlParam::Array(vec![
                SqlParam::Int(1),
                SqlParam::Int(2),
                SqlParam::Int(3)
            ])]
        );

        let (sql, _) = emit_one(f.negated());
        assert_eq!(sql, "NOT \"id\" = ANY($1)");

        let f = Filter::new(
            Field::new("name"),
            FilterOperator::Like,
            FilterValue::List(vec!["a%".into()]),
        )
        .with_quantifier(Quantifier::All);
        let (sql, _) = emit_one(f);
        assert_eq!(sql, "\"name\" LIKE ALL($1)");
    }

    #[test]
    fn test_fts_lowering() {
        let (sql, _) = emit_one(filter("content", FilterOperator::Fts, "term"));
        assert_eq!(sql, "\"content\" @@ to_tsquery($1)");

        let f = filter("content", FilterOperator::Plfts, "term").with_language("english");
        let (sql, _) = emit_one(f);
        assert_eq!(sql, "\"content\" @@ plainto_tsquery('english', $1)");

        let (sql, _) = emit_one(filter("content", FilterOperator::Wfts, "term").negated());
        assert_eq!(sql, "NOT \"content\" @@ websearch_to_tsquery($1)");
    }

    #[test]
    fn test_is_lowering() {
        let (sql, params) = emit_one(filter("deleted_at", FilterOperator::Is, "null"));
        assert_eq!(sql, "\"deleted_at\" IS NULL");
        assert!(params.is_empty());

        let (sql, _) = emit_one(filter("deleted_at", FilterOperator::Is, "not_null").negated());
        assert_eq!(sql, "\"deleted_at\" IS NULL");

        let (sql, _) = emit_one(filter("active", FilterOperator::Is, "true").negated());
        assert_eq!(sql, "\"active\" IS NOT TRUE");

        let (sql, _) = emit_one(filter("active", FilterOperator::Is, "unknown"));
        assert_eq!(sql, "\"active\" IS UNKNOWN");
    }

    #[test]
    fn test_is_rejects_bad_payload() {
        let result = SqlEmitter::new().emit_where_body(&[Condition::Filter(filter(
            "x",
            FilterOperator::Is,
            "banana",
        ))]);
        assert_eq!(result.unwrap_err(), Error::InvalidFilter("is.banana".into()));
    }

    #[test]
    fn test_json_path_field_sql() {
        let field = Field::new("data").with_json_path(vec![
            JsonStep::Arrow("a".into()),
            JsonStep::DoubleArrow("b".into()),
        ]);
        assert_eq!(field_sql(&field), "\"data\"->'a'->>'b'");

        let field = Field::new("items").with_json_path(vec![JsonStep::ArrayIndex(2)]);
        assert_eq!(field_sql(&field), "\"items\"->2");
    }

    #[test]
    fn test_json_key_quote_escaped() {
        let field = Field::new("data").with_json_path(vec![JsonStep::Arrow("o'key".into())]);
        assert_eq!(field_sql(&field), "\"data\"->'o''key'");
    }

    #[test]
    fn test_field_sql_cast() {
        let field = Field::new("price").with_cast("numeric");
        assert_eq!(field_sql(&field), "\"price\"::numeric");

        let field = Field::new("price").with_cast("bad;type");
        assert_eq!(field_sql(&field), "\"price\"::\"bad;type\"");
    }

    #[test]
    fn test_projection_sql() {
        assert_eq!(projection_sql(None, "*", None, &None).unwrap(), "*");
        assert_eq!(projection_sql(None, "id", None, &None).unwrap(), "\"id\"");
        assert_eq!(
            projection_sql(None, "id", Some("key"), &None).unwrap(),
            "\"id\" AS \"key\""
        );
        assert_eq!(
            projection_sql(
                None,
                "data",
                Some("name"),
                &Some(FieldHint::JsonPath(vec![JsonStep::DoubleArrow(
                    "name".into()
                )]))
            )
            .unwrap(),
            "\"data\"->>'name' AS \"name\""
        );
        assert_eq!(
            projection_sql(
                None,
                "price",
                None,
                &Some(FieldHint::JsonPathCast(
                    vec![JsonStep::Arrow("usd".into())],
                    "numeric".into()
                ))
            )
            .unwrap(),
            "\"price\"->'usd'::numeric"
        );
        assert_eq!(
            projection_sql(Some("orders_0"), "id", None, &None).unwrap(),
            "orders_0.\"id\""
        );
        assert_eq!(
            projection_sql(Some("orders_0"), "*", None, &None).unwrap(),
            "orders_0.*"
        );
    }

    #[test]
    fn test_logic_tree_emission() {
        use crate::ast::{LogicOperator, LogicTree};

        let tree = LogicTree::new(
            LogicOperator::And,
            vec![
                Condition::Filter(filter("a", FilterOperator::Eq, "1")),
                Condition::Logic(LogicTree::new(
                    LogicOperator::Or,
                    vec![
                        Condition::Filter(filter("b", FilterOperator::Lt, "2")),
                        Condition::Filter(filter("c", FilterOperator::Gt, "3")),
                    ],
                )),
            ],
        );

        let clause = SqlEmitter::new()
            .emit_where_body(&[Condition::Logic(tree)])
            .unwrap();
        assert_eq!(clause.clause, "(\"a\" = $1 AND (\"b\" < $2 OR \"c\" > $3))");
        assert_eq!(
            clause.params,
            vec![SqlParam::Int(1), SqlParam::Int(2), SqlParam::Int(3)]
        );
    }

    #[test]
    fn test_negated_logic_tree() {
        use crate::ast::{LogicOperator, LogicTree};

        let tree = LogicTree::new(
            LogicOperator::Or,
            vec![
                Condition::Filter(filter("a", FilterOperator::Eq, "1")),
                Condition::Filter(filter("b", FilterOperator::Eq, "2")),
            ],
        )
        .negated();

        let clause = SqlEmitter::new()
            .emit_where_body(&[Condition::Logic(tree)])
            .unwrap();
        assert_eq!(clause.clause, "NOT (\"a\" = $1 OR \"b\" = $2)");
    }
}
