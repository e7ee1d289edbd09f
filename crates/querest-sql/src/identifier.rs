//! Identifier and literal quoting.
//!
//! Every name that lands in SQL text goes through [`escape_ident`]. The
//! only literal ever inlined is the full-text search language, via
//! [`quote_literal`].

/// Quote an identifier for splicing into SQL text.
///
/// The name is wrapped in double quotes and every embedded double quote
/// is doubled, so the result always reads as a single identifier.
///
/// # Examples
///
/// ```
/// use querest_sql::escape_ident;
///
/// assert_eq!(escape_ident("orders"), r#""orders""#);
/// assert_eq!(escape_ident(r#"o"rders"#), r#""o""rders""#);
/// ```
pub fn escape_ident(name: &str) -> String {
    quote_with(name, '"')
}

/// Quote a string literal, doubling embedded single quotes.
///
/// Values are bound as parameters everywhere; this exists for the one
/// SQL position that cannot take a parameter, the tsquery language
/// argument.
///
/// # Examples
///
/// ```
/// use querest_sql::quote_literal;
///
/// assert_eq!(quote_literal("english"), "'english'");
/// assert_eq!(quote_literal("l'anglais"), "'l''anglais'");
/// ```
pub fn quote_literal(value: &str) -> String {
    quote_with(value, '\'')
}

fn quote_with(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
    out
}

/// A schema-qualified table name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QualifiedIdentifier {
    pub schema: String,
    pub name: String,
}

impl QualifiedIdentifier {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Render with both parts quoted; an empty schema leaves the name
    /// bare to the search path.
    ///
    /// # Examples
    ///
    /// ```
    /// use querest_sql::QualifiedIdentifier;
    ///
    /// let qi = QualifiedIdentifier::new("public", "orders");
    /// assert_eq!(qi.to_sql(), r#""public"."orders""#);
    /// ```
    pub fn to_sql(&self) -> String {
        if self.schema.is_empty() {
            return escape_ident(&self.name);
        }
        let mut out = escape_ident(&self.schema);
        out.push('.');
        out.push_str(&escape_ident(&self.name));
        out
    }
}
