//! AST produced by the query-string parsers.
//!
//! Every parsing stage yields values from this closed set. Values are
//! immutable once built; the emitter only reads them.

use serde::{Deserialize, Serialize};

// ============================================================================
// Fields and JSON paths
// ============================================================================

/// One step of a JSON path on a column.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JsonStep {
    /// Object key access returning JSON: `->key`
    Arrow(String),
    /// Object key access returning text: `->>key`
    DoubleArrow(String),
    /// Array element access: `->2`
    ArrayIndex(i64),
}

/// A column reference with optional JSON path and type cast.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub json_path: Vec<JsonStep>,
    pub cast: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            json_path: Vec::new(),
            cast: None,
        }
    }

    pub fn with_json_path(mut self, json_path: Vec<JsonStep>) -> Self {
        self.json_path = json_path;
        self
    }

    pub fn with_cast(mut self, cast: impl Into<String>) -> Self {
        self.cast = Some(cast.into());
        self
    }
}

// ============================================================================
// Filter operators
// ============================================================================

/// The closed set of twenty-two filter operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    /// `eq` - Equal
    Eq,
    /// `neq` - Not equal
    Neq,
    /// `gt` - Greater than
    Gt,
    /// `gte` - Greater than or equal
    Gte,
    /// `lt` - Less than
    Lt,
    /// `lte` - Less than or equal
    Lte,
    /// `like` - LIKE pattern match
    Like,
    /// `ilike` - Case-insensitive LIKE
    Ilike,
    /// `match` - POSIX regex (~)
    Match,
    /// `imatch` - Case-insensitive regex (~*)
    Imatch,
    /// `in` - Value in list
    In,
    /// `cs` - Contains (array/range)
    Cs,
    /// `cd` - Contained by (array/range)
    Cd,
    /// `ov` - Overlaps
    Ov,
    /// `fts` - to_tsquery
    Fts,
    /// `plfts` - plainto_tsquery
    Plfts,
    /// `phfts` - phraseto_tsquery
    Phfts,
    /// `wfts` - websearch_to_tsquery
    Wfts,
    /// `sl` - Strictly left of (range)
    Sl,
    /// `sr` - Strictly right of (range)
    Sr,
    /// `nxl` - Does not extend to the left of (range)
    Nxl,
    /// `nxr` - Does not extend to the right of (range)
    Nxr,
    /// `adj` - Adjacent to (range)
    Adj,
    /// `is` - Null/boolean test
    Is,
}

impl FilterOperator {
    /// Look an operator up by its query-string name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "eq" => Self::Eq,
            "neq" => Self::Neq,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "like" => Self::Like,
            "ilike" => Self::Ilike,
            "match" => Self::Match,
            "imatch" => Self::Imatch,
            "in" => Self::In,
            "cs" => Self::Cs,
            "cd" => Self::Cd,
            "ov" => Self::Ov,
            "fts" => Self::Fts,
            "plfts" => Self::Plfts,
            "phfts" => Self::Phfts,
            "wfts" => Self::Wfts,
            "sl" => Self::Sl,
            "sr" => Self::Sr,
            "nxl" => Self::Nxl,
            "nxr" => Self::Nxr,
            "adj" => Self::Adj,
            "is" => Self::Is,
            _ => return None,
        })
    }

    /// The query-string spelling.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::Ilike => "ilike",
            Self::Match => "match",
            Self::Imatch => "imatch",
            Self::In => "in",
            Self::Cs => "cs",
            Self::Cd => "cd",
            Self::Ov => "ov",
            Self::Fts => "fts",
            Self::Plfts => "plfts",
            Self::Phfts => "phfts",
            Self::Wfts => "wfts",
            Self::Sl => "sl",
            Self::Sr => "sr",
            Self::Nxl => "nxl",
            Self::Nxr => "nxr",
            Self::Adj => "adj",
            Self::Is => "is",
        }
    }

    /// Operators that accept an `(any)`/`(all)` quantifier.
    pub fn supports_quantifier(&self) -> bool {
        matches!(
            self,
            Self::Eq
                | Self::Neq
                | Self::Gt
                | Self::Gte
                | Self::Lt
                | Self::Lte
                | Self::Like
                | Self::Ilike
                | Self::Match
                | Self::Imatch
        )
    }

    /// Full-text search operators, which accept a `(language)` modifier.
    pub fn is_fts(&self) -> bool {
        matches!(self, Self::Fts | Self::Plfts | Self::Phfts | Self::Wfts)
    }

    /// Operators whose payload is a parenthesized list.
    pub fn takes_list(&self) -> bool {
        matches!(self, Self::In | Self::Ov)
    }

    /// The PostgreSQL tsquery constructor for an FTS operator.
    pub fn fts_function(&self) -> &'static str {
        match self {
            Self::Fts => "to_tsquery",
            Self::Plfts => "plainto_tsquery",
            Self::Phfts => "phraseto_tsquery",
            Self::Wfts => "websearch_to_tsquery",
            _ => unreachable!("not an FTS operator"),
        }
    }
}

/// Quantifier modifier for comparison and pattern operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantifier {
    Any,
    All,
}

impl Quantifier {
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::All => "ALL",
        }
    }
}

/// A filter's right-hand side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterValue {
    /// One opaque scalar, bound as a single parameter.
    Scalar(String),
    /// A flat list, bound as a single array parameter.
    List(Vec<String>),
}

/// One comparison against a field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: Field,
    pub operator: FilterOperator,
    pub quantifier: Option<Quantifier>,
    /// FTS language, only on `fts`/`plfts`/`phfts`/`wfts`.
    pub language: Option<String>,
    pub negated: bool,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(field: Field, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            field,
            operator,
            quantifier: None,
            language: None,
            negated: false,
            value,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negated = true;
        self
    }

    pub fn with_quantifier(mut self, quantifier: Quantifier) -> Self {
        self.quantifier = Some(quantifier);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

// ============================================================================
// Logic trees
// ============================================================================

/// Boolean combinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicOperator {
    And,
    Or,
}

impl LogicOperator {
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
        }
    }
}

/// A condition inside a logic tree, or at the top level of the request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Filter(Filter),
    Logic(LogicTree),
}

/// A boolean combinator over conditions, nesting arbitrarily.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogicTree {
    pub operator: LogicOperator,
    pub negated: bool,
    pub conditions: Vec<Condition>,
}

impl LogicTree {
    pub fn new(operator: LogicOperator, conditions: Vec<Condition>) -> Self {
        Self {
            operator,
            negated: false,
            conditions,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negated = true;
        self
    }
}

// ============================================================================
// Select items
// ============================================================================

/// Shape information on a projected field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldHint {
    JsonPath(Vec<JsonStep>),
    Cast(String),
    JsonPathCast(Vec<JsonStep>, String),
}

/// An item in the select list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    /// Project a column.
    Field {
        name: String,
        alias: Option<String>,
        hint: Option<FieldHint>,
    },
    /// Embed a related table as a nested JSON column.
    Relation {
        name: String,
        alias: Option<String>,
        /// Disambiguation hint after `!` (constraint or column name).
        hint: Option<String>,
        children: Vec<SelectItem>,
    },
    /// Inline a related table's columns into the parent row.
    Spread {
        name: String,
        alias: Option<String>,
        hint: Option<String>,
        children: Vec<SelectItem>,
    },
}

impl SelectItem {
    /// Create a plain field projection.
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field {
            name: name.into(),
            alias: None,
            hint: None,
        }
    }

    /// Create a relation embedding with the given children.
    pub fn relation(name: impl Into<String>, children: Vec<SelectItem>) -> Self {
        Self::Relation {
            name: name.into(),
            alias: None,
            hint: None,
            children,
        }
    }

    pub fn is_embed(&self) -> bool {
        matches!(self, Self::Relation { .. } | Self::Spread { .. })
    }
}

// ============================================================================
// Ordering
// ============================================================================

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// NULL placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::First => "NULLS FIRST",
            Self::Last => "NULLS LAST",
        }
    }
}

/// One ORDER BY term.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub field: Field,
    pub direction: Direction,
    pub nulls: Option<NullsOrder>,
}

impl OrderTerm {
    pub fn new(field: Field) -> Self {
        Self {
            field,
            direction: Direction::Asc,
            nulls: None,
        }
    }

    pub fn desc(mut self) -> Self {
        self.direction = Direction::Desc;
        self
    }

    pub fn with_nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }
}

// ============================================================================
// Parsed request
// ============================================================================

/// The root AST for one request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedParams {
    /// Projection; `None` means `*`.
    pub select: Option<Vec<SelectItem>>,
    /// Top-level filters and logic trees, AND-joined.
    pub filters: Vec<Condition>,
    pub order: Vec<OrderTerm>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl ParsedParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_select(mut self, select: Vec<SelectItem>) -> Self {
        self.select = Some(select);
        self
    }

    pub fn with_filters(mut self, filters: Vec<Condition>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_order(mut self, order: Vec<OrderTerm>) -> Self {
        self.order = order;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn has_select(&self) -> bool {
        self.select.is_some()
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.select.is_none()
            && self.filters.is_empty()
            && self.order.is_empty()
            && self.limit.is_none()
            && self.offset.is_none()
    }
}
