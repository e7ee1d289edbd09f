//! Select projection parsing.
//!
//! A recursive grammar with balanced-paren tracking, scanned by hand:
//!
//! ```text
//! items    := item ("," item)* ","?
//! item     := ("...")? (alias ":")? core children?
//! core     := "*" | field-expr | relation ("!" hint)?
//! children := "(" items? ")"
//! ```

use super::lexeme;
use crate::ast::{FieldHint, SelectItem};
use crate::error::{Error, Result};

/// Parse the `select` value into an ordered item list.
pub fn parse_select(input: &str) -> Result<Vec<SelectItem>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let mut scanner = Scanner { src: input, pos: 0 };
    let items = scanner.parse_items()?;
    if !scanner.at_end() {
        // Only a stray closing paren can stop the scanner early.
        return Err(Error::UnexpectedToken);
    }
    Ok(items)
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn parse_items(&mut self) -> Result<Vec<SelectItem>> {
        let mut items = Vec::new();

        loop {
            if self.at_end() || self.peek() == Some(b')') {
                break;
            }

            items.push(self.parse_item()?);

            if self.peek() == Some(b',') {
                self.pos += 1;
                // A trailing comma before the end or a closing paren is fine.
                if self.at_end() || self.peek() == Some(b')') {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(items)
    }

    fn parse_item(&mut self) -> Result<SelectItem> {
        let src = self.src;
        let spread = src[self.pos..].starts_with("...");
        if spread {
            self.pos += 3;
        }

        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, b',' | b'(' | b')') {
                break;
            }
            self.pos += 1;
        }
        let name_part = &src[start..self.pos];

        if self.peek() == Some(b'(') {
            self.pos += 1;
            let children = self.parse_items()?;
            if self.peek() != Some(b')') {
                return Err(Error::UnclosedParenthesis);
            }
            self.pos += 1;
            if let Some(c) = self.peek() {
                if !matches!(c, b',' | b')') {
                    return Err(Error::UnexpectedToken);
                }
            }

            let (alias, name, hint) = parse_relation_name(name_part)?;
            return Ok(if spread {
                SelectItem::Spread {
                    name,
                    alias,
                    hint,
                    children,
                }
            } else {
                SelectItem::Relation {
                    name,
                    alias,
                    hint,
                    children,
                }
            });
        }

        if spread {
            // Spread without a child block keeps an empty child list.
            let (alias, name, hint) = parse_relation_name(name_part)?;
            return Ok(SelectItem::Spread {
                name,
                alias,
                hint,
                children: Vec::new(),
            });
        }

        parse_field_item(name_part)
    }
}

/// Split `alias:name!hint` on a relation or spread item.
fn parse_relation_name(raw: &str) -> Result<(Option<String>, String, Option<String>)> {
    if raw.is_empty() {
        return Err(Error::EmptyFieldName);
    }

    let (alias, rest) = match raw.find(':') {
        Some(i) if !raw[i + 1..].starts_with(':') => {
            (Some(raw[..i].to_string()), &raw[i + 1..])
        }
        _ => (None, raw),
    };

    let (name, hint) = match rest.split_once('!') {
        Some((name, hint)) => (name, Some(hint.to_string())),
        None => (rest, None),
    };

    if name.is_empty() {
        return Err(Error::EmptyFieldName);
    }

    Ok((alias, name.to_string(), hint))
}

/// Parse a field item, extracting alias, cast, and JSON path hints.
///
/// Aliasing is cast-aware: `price::text:price_str` aliases after the
/// cast, `nick:name` aliases before the field.
fn parse_field_item(raw: &str) -> Result<SelectItem> {
    if raw.is_empty() {
        return Err(Error::EmptyFieldName);
    }
    if raw == "*" {
        return Ok(SelectItem::field("*"));
    }

    if let Some(ci) = raw.find("::") {
        let expr = &raw[..ci];
        let rest = &raw[ci + 2..];
        let (cast, alias) = match rest.find(':') {
            Some(ai) => (&rest[..ai], Some(rest[ai + 1..].to_string())),
            None => (rest, None),
        };
        if cast.is_empty() {
            return Err(Error::InvalidFieldName(raw.to_string()));
        }

        let field = lexeme::parse_field(expr)?;
        let hint = if field.json_path.is_empty() {
            FieldHint::Cast(cast.to_string())
        } else {
            FieldHint::JsonPathCast(field.json_path, cast.to_string())
        };
        return Ok(SelectItem::Field {
            name: field.name,
            alias,
            hint: Some(hint),
        });
    }

    let (alias, expr) = match raw.find(':') {
        Some(ai) => {
            if ai == 0 {
                return Err(Error::EmptyFieldName);
            }
            (Some(raw[..ai].to_string()), &raw[ai + 1..])
        }
        None => (None, raw),
    };

    let field = lexeme::parse_field(expr)?;
    let hint = if field.json_path.is_empty() {
        None
    } else {
        Some(FieldHint::JsonPath(field.json_path))
    };

    Ok(SelectItem::Field {
        name: field.name,
        alias,
        hint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::JsonStep;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_select("").unwrap(), vec![]);
        assert_eq!(parse_select("  ").unwrap(), vec![]);
    }

    #[test]
    fn test_simple_fields() {
        let items = parse_select("id,name,email").unwrap();
        assert_eq!(
            items,
            vec![
                SelectItem::field("id"),
                SelectItem::field("name"),
                SelectItem::field("email")
            ]
        );
    }

    #[test]
    fn test_star() {
        let items = parse_select("*").unwrap();
        assert_eq!(items, vec![SelectItem::field("*")]);
    }

    #[test]
    fn test_trailing_comma() {
        let items = parse_select("id,name,").unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_consecutive_commas() {
        assert_eq!(parse_select("id,,name"), Err(Error::EmptyFieldName));
    }

    #[test]
    fn test_alias() {
        let items = parse_select("full_name:name").unwrap();
        assert_eq!(
            items,
            vec![SelectItem::Field {
                name: "name".into(),
                alias: Some("full_name".into()),
                hint: None,
            }]
        );
    }

    #[test]
    fn test_cast_hint() {
        let items = parse_select("price::text").unwrap();
        assert_eq!(
            items,
            vec![SelectItem::Field {
                name: "price".into(),
                alias: None,
                hint: Some(FieldHint::Cast("text".into())),
            }]
        );
    }

    #[test]
    fn test_alias_after_cast() {
        let items = parse_select("price::text:price_str").unwrap();
        assert_eq!(
            items,
            vec![SelectItem::Field {
                name: "price".into(),
                alias: Some("price_str".into()),
                hint: Some(FieldHint::Cast("text".into())),
            }]
        );
    }

    #[test]
    fn test_json_path_hint() {
        let items = parse_select("data->>name").unwrap();
        assert_eq!(
            items,
            vec![SelectItem::Field {
                name: "data".into(),
                alias: None,
                hint: Some(FieldHint::JsonPath(vec![JsonStep::DoubleArrow(
                    "name".into()
                )])),
            }]
        );
    }

    #[test]
    fn test_json_path_cast_hint() {
        let items = parse_select("data->age::int").unwrap();
        assert_eq!(
            items,
            vec![SelectItem::Field {
                name: "data".into(),
                alias: None,
                hint: Some(FieldHint::JsonPathCast(
                    vec![JsonStep::Arrow("age".into())],
                    "int".into()
                )),
            }]
        );
    }

    #[test]
    fn test_relation() {
        let items = parse_select("id,orders(id,total)").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[1],
            SelectItem::Relation {
                name: "orders".into(),
                alias: None,
                hint: None,
                children: vec![SelectItem::field("id"), SelectItem::field("total")],
            }
        );
    }

    #[test]
    fn test_relation_empty_children() {
        let items = parse_select("orders()").unwrap();
        assert_eq!(
            items,
            vec![SelectItem::Relation {
                name: "orders".into(),
                alias: None,
                hint: None,
                children: vec![],
            }]
        );
    }

    #[test]
    fn test_relation_alias_and_hint() {
        let items = parse_select("history:orders!orders_customer_id_fkey(id)").unwrap();
        assert_eq!(
            items,
            vec![SelectItem::Relation {
                name: "orders".into(),
                alias: Some("history".into()),
                hint: Some("orders_customer_id_fkey".into()),
                children: vec![SelectItem::field("id")],
            }]
        );
    }

    #[test]
    fn test_nested_relations() {
        let items = parse_select("id,orders(id,items(sku,qty))").unwrap();
        let SelectItem::Relation { children, .. } = &items[1] else {
            panic!("expected relation");
        };
        assert_eq!(
            children[1],
            SelectItem::Relation {
                name: "items".into(),
                alias: None,
                hint: None,
                children: vec![SelectItem::field("sku"), SelectItem::field("qty")],
            }
        );
    }

    #[test]
    fn test_spread() {
        let items = parse_select("...supplier(name,phone)").unwrap();
        assert_eq!(
            items,
            vec![SelectItem::Spread {
                name: "supplier".into(),
                alias: None,
                hint: None,
                children: vec![SelectItem::field("name"), SelectItem::field("phone")],
            }]
        );
    }

    #[test]
    fn test_spread_without_children() {
        let items = parse_select("...supplier").unwrap();
        assert_eq!(
            items,
            vec![SelectItem::Spread {
                name: "supplier".into(),
                alias: None,
                hint: None,
                children: vec![],
            }]
        );
    }

    #[test]
    fn test_field_bang_stays_in_name() {
        let items = parse_select("col!weird").unwrap();
        assert_eq!(items, vec![SelectItem::field("col!weird")]);
    }

    #[test]
    fn test_unclosed_paren() {
        assert_eq!(parse_select("orders(id"), Err(Error::UnclosedParenthesis));
        assert_eq!(
            parse_select("orders(id,items(sku)"),
            Err(Error::UnclosedParenthesis)
        );
    }

    #[test]
    fn test_stray_closing_paren() {
        assert_eq!(parse_select("id)"), Err(Error::UnexpectedToken));
        assert_eq!(parse_select("orders(id))"), Err(Error::UnexpectedToken));
    }

    #[test]
    fn test_garbage_after_children() {
        assert_eq!(parse_select("orders(id)x"), Err(Error::UnexpectedToken));
    }

    #[test]
    fn test_relation_with_empty_name() {
        assert_eq!(parse_select("(id)"), Err(Error::EmptyFieldName));
    }
}
