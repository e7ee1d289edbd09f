//! SQL text assembly with positional parameters.

use crate::param::SqlParam;

/// SQL text under construction, together with the values bound to its
/// `$n` placeholders.
///
/// Placeholders are allocated by [`bind`](Self::bind) in text order, so
/// the parameter list always lines up with a left-to-right scan of the
/// finished statement.
#[derive(Clone, Debug, Default)]
pub struct SqlFragment {
    text: String,
    params: Vec<SqlParam>,
}

impl SqlFragment {
    /// Start an empty fragment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append trusted SQL text.
    ///
    /// Only fixed syntax and already-escaped identifiers belong here;
    /// values go through [`bind`](Self::bind).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.text.push_str(sql);
        self
    }

    /// Bind a value: appends the next `$n` placeholder and records the
    /// value for that position.
    pub fn bind(&mut self, value: impl Into<SqlParam>) -> &mut Self {
        self.text.push('$');
        self.text.push_str(&(self.params.len() + 1).to_string());
        self.params.push(value.into());
        self
    }

    /// Splice another fragment onto this one, shifting its placeholders
    /// past the ones already allocated here.
    pub fn extend(&mut self, tail: SqlFragment) -> &mut Self {
        let shifted = shift_placeholders(&tail.text, self.params.len());
        self.text.push_str(&shifted);
        self.params.extend(tail.params);
        self
    }

    /// The SQL text so far.
    pub fn sql(&self) -> &str {
        &self.text
    }

    /// The values bound so far, in placeholder order.
    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Finish, yielding the SQL text and its parameters.
    pub fn into_parts(self) -> (String, Vec<SqlParam>) {
        (self.text, self.params)
    }
}

/// Add `offset` to every `$n` placeholder in `text`. A `$` with no
/// digits after it passes through untouched.
fn shift_placeholders(text: &str, offset: usize) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut rest = text;

    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        out.push('$');
        rest = &rest[dollar + 1..];

        let digits = rest
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map_or(rest.len(), |(i, _)| i);
        if let Ok(n) = rest[..digits].parse::<usize>() {
            out.push_str(&(n + offset).to_string());
        }
        rest = &rest[digits..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bind_allocates_placeholders_in_text_order() {
        let mut frag = SqlFragment::new();
        frag.push("status = ").bind("open").push(" AND retries < ").bind(3i64);

        assert_eq!(frag.sql(), "status = $1 AND retries < $2");
        assert_eq!(frag.params(), &[SqlParam::text("open"), SqlParam::Int(3)]);
    }

    #[test]
    fn extend_shifts_the_tail_placeholders() {
        let mut head = SqlFragment::new();
        head.push("tenant = ").bind("acme");

        let mut tail = SqlFragment::new();
        tail.push(" AND seq BETWEEN ").bind(10i64).push(" AND ").bind(20i64);

        head.extend(tail);
        assert_eq!(head.sql(), "tenant = $1 AND seq BETWEEN $2 AND $3");
        assert_eq!(head.params().len(), 3);
    }

    #[test]
    fn into_parts_hands_back_text_and_values() {
        let mut frag = SqlFragment::new();
        frag.push("level >= ").bind(2i64);

        let (sql, params) = frag.into_parts();
        assert_eq!(sql, "level >= $1");
        assert_eq!(params, vec![SqlParam::Int(2)]);
    }

    #[test]
    fn shift_placeholders_offsets_every_number() {
        assert_eq!(shift_placeholders("$1 OR $2", 3), "$4 OR $5");
        assert_eq!(shift_placeholders("$12", 1), "$13");
        assert_eq!(shift_placeholders("plain text", 9), "plain text");
    }

    #[test]
    fn shift_placeholders_ignores_bare_dollars() {
        assert_eq!(shift_placeholders("cost$ = $1", 1), "cost$ = $2");
        assert_eq!(shift_placeholders("$", 5), "$");
    }

    #[test]
    fn empty_fragment() {
        let frag = SqlFragment::new();
        assert!(frag.is_empty());
        assert!(frag.params().is_empty());
    }
}
