//! Order expression parsing.
//!
//! Comma-separated terms of `field[.direction][.nulls-option]`. Suffixes
//! are recognized from the right; any dots left over belong to the field
//! name itself.

use super::lexeme;
use crate::ast::{Direction, NullsOrder, OrderTerm};
use crate::error::{Error, Result};

/// Parse the `order` value into an ordered term list.
pub fn parse_order(input: &str) -> Result<Vec<OrderTerm>> {
    input
        .split(',')
        .map(|term| parse_order_term(term.trim()))
        .collect()
}

/// Parse one order term.
pub fn parse_order_term(term: &str) -> Result<OrderTerm> {
    if term.is_empty() {
        return Err(Error::EmptyFieldName);
    }

    let mut rest = term;
    let mut direction = None;
    let mut nulls = None;

    if let Some((head, tail)) = rest.rsplit_once('.') {
        if let Some(n) = nulls_option(tail) {
            nulls = Some(n);
            rest = head;
        }
    }

    if let Some((head, tail)) = rest.rsplit_once('.') {
        if let Some(d) = direction_option(tail) {
            direction = Some(d);
            rest = head;
        }
    }

    // Direction must precede the nulls option when both appear; a
    // direction or nulls keyword still dangling here is misordered or
    // duplicated.
    if let Some((_, tail)) = rest.rsplit_once('.') {
        if direction_option(tail).is_some() || nulls_option(tail).is_some() {
            let options = &term[rest.len() - tail.len() - 1..];
            return Err(Error::InvalidOrderOptions(options.trim_start_matches('.').to_string()));
        }
    }

    // A bare keyword is an option with no field to order by.
    if direction_option(rest).is_some() || nulls_option(rest).is_some() {
        return Err(Error::EmptyFieldName);
    }

    let mut field = lexeme::parse_field(rest)?;
    // Casts have no meaning in ORDER BY terms.
    field.cast = None;

    Ok(OrderTerm {
        field,
        direction: direction.unwrap_or_default(),
        nulls,
    })
}

fn direction_option(s: &str) -> Option<Direction> {
    match s {
        "asc" => Some(Direction::Asc),
        "desc" => Some(Direction::Desc),
        _ => None,
    }
}

fn nulls_option(s: &str) -> Option<NullsOrder> {
    match s {
        "nullsfirst" => Some(NullsOrder::First),
        "nullslast" => Some(NullsOrder::Last),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Field, JsonStep};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bare_field() {
        let terms = parse_order("name").unwrap();
        assert_eq!(terms, vec![OrderTerm::new(Field::new("name"))]);
    }

    #[test]
    fn test_direction() {
        let terms = parse_order("name.asc,age.desc").unwrap();
        assert_eq!(terms[0].direction, Direction::Asc);
        assert_eq!(terms[1].direction, Direction::Desc);
    }

    #[test]
    fn test_nulls_only() {
        let terms = parse_order("age.nullsfirst").unwrap();
        assert_eq!(terms[0].direction, Direction::Asc);
        assert_eq!(terms[0].nulls, Some(NullsOrder::First));
    }

    #[test]
    fn test_direction_and_nulls() {
        let terms = parse_order("age.desc.nullslast").unwrap();
        assert_eq!(terms[0].direction, Direction::Desc);
        assert_eq!(terms[0].nulls, Some(NullsOrder::Last));
    }

    #[test]
    fn test_nulls_before_direction_rejected() {
        assert_eq!(
            parse_order("age.nullsfirst.desc"),
            Err(Error::InvalidOrderOptions("nullsfirst.desc".into()))
        );
    }

    #[test]
    fn test_duplicate_direction_rejected() {
        assert_eq!(
            parse_order("age.asc.desc"),
            Err(Error::InvalidOrderOptions("asc.desc".into()))
        );
    }

    #[test]
    fn test_dotted_field_name() {
        let terms = parse_order("schema.table.column.desc").unwrap();
        assert_eq!(terms[0].field.name, "schema.table.column");
        assert_eq!(terms[0].direction, Direction::Desc);
    }

    #[test]
    fn test_json_path_field() {
        let terms = parse_order("data->>age.desc").unwrap();
        assert_eq!(terms[0].field.name, "data");
        assert_eq!(
            terms[0].field.json_path,
            vec![JsonStep::DoubleArrow("age".into())]
        );
        assert_eq!(terms[0].direction, Direction::Desc);
    }

    #[test]
    fn test_cast_ignored() {
        let terms = parse_order("price::numeric.desc").unwrap();
        assert_eq!(terms[0].field.name, "price");
        assert_eq!(terms[0].field.cast, None);
        assert_eq!(terms[0].direction, Direction::Desc);
    }

    #[test]
    fn test_bare_keyword_rejected() {
        assert_eq!(parse_order("desc"), Err(Error::EmptyFieldName));
        assert_eq!(parse_order(""), Err(Error::EmptyFieldName));
    }

    #[test]
    fn test_multiple_terms() {
        let terms = parse_order("name.asc,created_at.desc.nullslast,id").unwrap();
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[2].direction, Direction::Asc);
        assert_eq!(terms[2].nulls, None);
    }
}
