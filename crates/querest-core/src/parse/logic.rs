//! Boolean logic tree parsing.
//!
//! Rooted at a key of `and`, `or`, `not.and`, or `not.or`; the value is a
//! parenthesized comma list of conditions. Commas split only at depth
//! zero because filter payloads may themselves contain commas inside
//! `(…)` or `{…}`.

use super::filter;
use super::lexeme;
use crate::ast::{Condition, FilterOperator, LogicOperator, LogicTree};
use crate::error::{Error, Result};

/// Is this key a logic combinator root?
pub fn logic_key(key: &str) -> bool {
    matches!(key, "and" | "or" | "not.and" | "not.or")
}

/// Parse a logic key and its parenthesized value into a tree.
pub fn parse_logic(key: &str, value: &str) -> Result<LogicTree> {
    let (negated, operator) = match key {
        "and" => (false, LogicOperator::And),
        "or" => (false, LogicOperator::Or),
        "not.and" => (true, LogicOperator::And),
        "not.or" => (true, LogicOperator::Or),
        _ => return Err(Error::InvalidNestedLogic(key.to_string())),
    };

    let inner = value
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or(Error::LogicNotParenthesized)?;

    let conditions = split_conditions(inner)?
        .into_iter()
        .map(parse_condition)
        .collect::<Result<Vec<_>>>()?;

    let mut tree = LogicTree::new(operator, conditions);
    tree.negated = negated;
    Ok(tree)
}

/// Split a condition list at depth-zero commas.
fn split_conditions(input: &str) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(Error::UnexpectedClosingParenthesis)?;
            }
            ',' if depth == 0 => {
                parts.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(Error::UnclosedLogicParenthesis);
    }

    parts.push(input[start..].trim());
    Ok(parts)
}

/// Parse one condition: a nested combinator, an equals-notation filter,
/// or a dot-notation filter.
fn parse_condition(cond: &str) -> Result<Condition> {
    for kw in ["not.and", "not.or", "and", "or"] {
        if let Some(rest) = cond.strip_prefix(kw) {
            if rest.starts_with('(') {
                let tree = parse_logic(kw, rest)
                    .map_err(|_| Error::InvalidNestedLogic(cond.to_string()))?;
                return Ok(Condition::Logic(tree));
            }
        }
    }

    // Equals notation, accepted for parity with top-level filter syntax.
    if let Some((key, value)) = cond.split_once('=') {
        if !key.is_empty() && value_side_valid(value) {
            return Ok(Condition::Filter(filter::parse_filter(key, value)?));
        }
    }

    // Dot notation: the first dot whose right side reads as an operator
    // expression separates the field from the rest.
    for (i, c) in cond.char_indices() {
        if c != '.' || i == 0 {
            continue;
        }
        let rest = &cond[i + 1..];
        if value_side_valid(rest) {
            let field = lexeme::parse_field(&cond[..i])?;
            return Ok(Condition::Filter(filter::parse_op_expr(field, rest)?));
        }
    }

    Err(Error::InvalidFilter(cond.to_string()))
}

/// Does this text start with `(not.)?op` followed by `.` or `(`?
fn value_side_valid(value: &str) -> bool {
    let value = value.strip_prefix("not.").unwrap_or(value);
    let op_end = value
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(value.len());
    if FilterOperator::from_name(&value[..op_end]).is_none() {
        return false;
    }
    matches!(value[op_end..].chars().next(), Some('.') | Some('('))
}
