//! Shared lexing primitives for the sublanguage parsers.
//!
//! The structured shapes (identifier, JSON path, cast) are nom parsers,
//! mirroring the strict grammar. Field parsing first tries the strict
//! grammar over the whole input and then falls back to a permissive scan
//! that preserves names containing characters outside `[A-Za-z0-9_]`
//! (for example dotted names like `schema.table.column`).

use crate::ast::{Field, JsonStep};
use crate::error::{Error, Result};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    combinator::{all_consuming, map, opt},
    multi::many0,
    sequence::{preceded, tuple},
    IResult,
};

/// Identifier over the strict alphabet.
pub fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

/// One JSON path step. `->>` must be tried before `->`.
pub fn json_step(input: &str) -> IResult<&str, JsonStep> {
    alt((
        preceded(tag("->>"), map(identifier, classify_segment)),
        preceded(tag("->"), map(identifier, classify_segment_arrow)),
    ))(input)
}

/// Zero or more JSON path steps.
pub fn json_path(input: &str) -> IResult<&str, Vec<JsonStep>> {
    many0(json_step)(input)
}

/// A `::type` cast suffix.
pub fn type_cast(input: &str) -> IResult<&str, &str> {
    preceded(tag("::"), identifier)(input)
}

// Digit-only segments address array elements regardless of arrow kind.
fn classify_segment(seg: &str) -> JsonStep {
    match seg.parse::<i64>() {
        Ok(idx) => JsonStep::ArrayIndex(idx),
        Err(_) => JsonStep::DoubleArrow(seg.to_string()),
    }
}

fn classify_segment_arrow(seg: &str) -> JsonStep {
    match seg.parse::<i64>() {
        Ok(idx) => JsonStep::ArrayIndex(idx),
        Err(_) => JsonStep::Arrow(seg.to_string()),
    }
}

/// Strict field grammar: `name(->|->>)*(::cast)?`.
fn field_strict(input: &str) -> IResult<&str, Field> {
    map(
        tuple((identifier, json_path, opt(type_cast))),
        |(name, path, cast)| {
            let mut field = Field::new(name).with_json_path(path);
            if let Some(c) = cast {
                field = field.with_cast(c);
            }
            field
        },
    )(input)
}

/// Parse a field expression, strict first, permissive on failure.
pub fn parse_field(input: &str) -> Result<Field> {
    if input.is_empty() {
        return Err(Error::FieldMustBeString);
    }

    if let Ok((_, field)) = all_consuming(field_strict)(input) {
        return Ok(field);
    }

    parse_field_lenient(input)
}

/// Permissive fallback: everything up to the first `::` is the base
/// expression; within it, the prefix before the first `->` is the name
/// and the JSON steps are re-extracted by pairing arrow tokens with
/// their following segments.
fn parse_field_lenient(input: &str) -> Result<Field> {
    let (expr, cast) = match input.find("::") {
        Some(i) => (&input[..i], Some(input[i + 2..].to_string())),
        None => (input, None),
    };

    let (name, steps) = match expr.find("->") {
        Some(0) => return Err(Error::InvalidFieldName(input.to_string())),
        Some(i) => (&expr[..i], extract_steps(&expr[i..])?),
        None => (expr, Vec::new()),
    };

    if name.is_empty() {
        return Err(Error::EmptyFieldName);
    }

    let mut field = Field::new(name).with_json_path(steps);
    field.cast = cast;
    Ok(field)
}

fn extract_steps(mut rest: &str) -> Result<Vec<JsonStep>> {
    let mut steps = Vec::new();

    while !rest.is_empty() {
        let (text_returning, after) = if let Some(r) = rest.strip_prefix("->>") {
            (true, r)
        } else if let Some(r) = rest.strip_prefix("->") {
            (false, r)
        } else {
            return Err(Error::InvalidJsonPath);
        };

        let seg_end = after.find("->").unwrap_or(after.len());
        let seg = &after[..seg_end];
        if seg.is_empty() {
            return Err(Error::InvalidJsonPath);
        }

        steps.push(match seg.parse::<i64>() {
            Ok(idx) => JsonStep::ArrayIndex(idx),
            Err(_) if text_returning => JsonStep::DoubleArrow(seg.to_string()),
            Err(_) => JsonStep::Arrow(seg.to_string()),
        });

        rest = &after[seg_end..];
    }

    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("name rest"), Ok((" rest", "name")));
        assert_eq!(identifier("a_1b"), Ok(("", "a_1b")));
        assert!(identifier("->x").is_err());
    }

    #[test]
    fn test_parse_field_simple() {
        let field = parse_field("name").unwrap();
        assert_eq!(field, Field::new("name"));
    }

    #[test]
    fn test_parse_field_json_path() {
        let field = parse_field("data->profile->>email").unwrap();
        assert_eq!(field.name, "data");
        assert_eq!(
            field.json_path,
            vec![
                JsonStep::Arrow("profile".into()),
                JsonStep::DoubleArrow("email".into())
            ]
        );
    }

    #[test]
    fn test_parse_field_array_index() {
        let field = parse_field("items->2->>name").unwrap();
        assert_eq!(
            field.json_path,
            vec![
                JsonStep::ArrayIndex(2),
                JsonStep::DoubleArrow("name".into())
            ]
        );
    }

    #[test]
    fn test_parse_field_cast() {
        let field = parse_field("price::numeric").unwrap();
        assert_eq!(field.cast.as_deref(), Some("numeric"));

        let field = parse_field("data->>amount::int").unwrap();
        assert_eq!(field.name, "data");
        assert_eq!(field.cast.as_deref(), Some("int"));
    }

    #[test]
    fn test_parse_field_dotted_name_fallback() {
        let field = parse_field("schema.table.column").unwrap();
        assert_eq!(field.name, "schema.table.column");
        assert!(field.json_path.is_empty());
    }

    #[test]
    fn test_parse_field_fallback_with_path() {
        let field = parse_field("my col->>key").unwrap();
        assert_eq!(field.name, "my col");
        assert_eq!(field.json_path, vec![JsonStep::DoubleArrow("key".into())]);
    }

    #[test]
    fn test_parse_field_errors() {
        assert_eq!(parse_field(""), Err(Error::FieldMustBeString));
        assert_eq!(parse_field("data->"), Err(Error::InvalidJsonPath));
        assert_eq!(
            parse_field("->key"),
            Err(Error::InvalidFieldName("->key".into()))
        );
    }
}
