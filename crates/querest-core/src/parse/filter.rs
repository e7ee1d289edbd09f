//! Filter expression parsing.
//!
//! A filter arrives as one key/value pair: the key is a field expression,
//! the value has the shape `(not.)?op(modifier)?.payload`.

use super::lexeme;
use crate::ast::{Field, Filter, FilterOperator, FilterValue, Quantifier};
use crate::error::{Error, Result};

const PAREN_LIST_SHAPE: &str = "(item1,item2,...)";
const BRACE_LIST_SHAPE: &str = "{item1,item2,...}";

/// Keys claimed by the dispatcher rather than the filter parser.
pub fn reserved_key(key: &str) -> bool {
    matches!(
        key,
        "select" | "order" | "limit" | "offset" | "on_conflict" | "columns"
    )
}

/// Parse one key/value pair into a [`Filter`].
pub fn parse_filter(key: &str, value: &str) -> Result<Filter> {
    if key.trim().is_empty() {
        return Err(Error::FieldMustBeString);
    }
    let field = lexeme::parse_field(key)?;
    parse_op_expr(field, value)
}

/// Parse the value side against an already-parsed field.
///
/// Also used by the logic parser, which extracts the field itself.
pub(crate) fn parse_op_expr(field: Field, value: &str) -> Result<Filter> {
    let (value, negated) = match value.strip_prefix("not.") {
        Some(rest) => (rest, true),
        None => (value, false),
    };

    let op_end = value
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(value.len());
    let op_name = &value[..op_end];
    if op_name.is_empty() {
        return Err(Error::MissingOperator);
    }

    let operator = FilterOperator::from_name(op_name)
        .ok_or_else(|| Error::UnknownOperator(op_name.to_string()))?;

    let rest = &value[op_end..];
    let (quantifier, language, rest) = parse_modifier(operator, rest)?;

    let payload = rest.strip_prefix('.').ok_or(Error::MissingOperator)?;

    let value = if operator.takes_list() {
        FilterValue::List(parse_delimited_list(payload, '(', ')', PAREN_LIST_SHAPE)?)
    } else if quantifier.is_some() {
        FilterValue::List(parse_delimited_list(payload, '{', '}', BRACE_LIST_SHAPE)?)
    } else {
        FilterValue::Scalar(payload.to_string())
    };

    Ok(Filter {
        field,
        operator,
        quantifier,
        language,
        negated,
        value,
    })
}

/// Parse an optional `(modifier)` between operator and payload.
///
/// `(any)`/`(all)` quantify comparison and pattern operators; anything
/// else names a full-text search language on the FTS operators.
fn parse_modifier<'a>(
    operator: FilterOperator,
    rest: &'a str,
) -> Result<(Option<Quantifier>, Option<String>, &'a str)> {
    let Some(inner) = rest.strip_prefix('(') else {
        return Ok((None, None, rest));
    };

    let close = inner.find(')').ok_or(Error::MissingOperator)?;
    let modifier = &inner[..close];
    let after = &inner[close + 1..];

    if operator.is_fts() {
        // An FTS language spelled "any"/"all" is a quantifier smuggled
        // onto an operator that cannot take one.
        if modifier == "any" || modifier == "all" {
            return Err(Error::QuantifierNotSupported(operator.name().to_string()));
        }
        return Ok((None, Some(modifier.to_string()), after));
    }

    match modifier {
        "any" | "all" => {
            if !operator.supports_quantifier() {
                return Err(Error::QuantifierNotSupported(operator.name().to_string()));
            }
            let quantifier = if modifier == "any" {
                Quantifier::Any
            } else {
                Quantifier::All
            };
            Ok((Some(quantifier), None, after))
        }
        _ => Err(Error::InvalidFilter(format!(
            "{}({})",
            operator.name(),
            modifier
        ))),
    }
}

fn parse_delimited_list(
    payload: &str,
    open: char,
    close: char,
    shape: &'static str,
) -> Result<Vec<String>> {
    let inner = payload
        .strip_prefix(open)
        .and_then(|s| s.strip_suffix(close))
        .ok_or(Error::ExpectedListFormat(shape))?;
    Ok(split_list_items(inner))
}

/// Split list items at top-level commas, honoring double-quoted items
/// with `\"` escapes. An empty list yields one empty-string item.
fn split_list_items(inner: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in inner.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                items.push(unquote_item(&inner[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(unquote_item(&inner[start..]));
    items
}

fn unquote_item(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        let inner = &trimmed[1..trimmed.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(c);
            }
        }
        out
    } else {
        trimmed.to_string()
    }
}
