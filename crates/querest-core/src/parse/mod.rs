//! Query-string decomposition and per-key dispatch.
//!
//! Each key routes to one sublanguage parser: `select`, `order`,
//! `limit`/`offset`, the logic combinators, or the filter parser as the
//! fallthrough. `on_conflict` and `columns` are recognized as reserved
//! and carry no parser behavior here.

pub mod filter;
pub mod lexeme;
pub mod logic;
pub mod order;
pub mod select;

pub use filter::{parse_filter, reserved_key};
pub use lexeme::parse_field;
pub use logic::{logic_key, parse_logic};
pub use order::{parse_order, parse_order_term};
pub use select::parse_select;

use crate::ast::{Condition, ParsedParams};
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Parse a raw query string into [`ParsedParams`].
///
/// Keys and values are decoded as `application/x-www-form-urlencoded`
/// (percent-decoding, `+` → space). Repeated keys are permitted; each
/// occurrence contributes a filter.
pub fn parse_query_string(query_string: &str) -> Result<ParsedParams> {
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query_string.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    parse_pairs(&pairs)
}

/// Parse already-decoded query parameters.
///
/// Keys are processed in sorted order so the emitted SQL is deterministic
/// regardless of map iteration order.
pub fn parse_params(params: &HashMap<String, String>) -> Result<ParsedParams> {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    parse_pairs(&pairs)
}

/// Dispatch each key/value pair to its sublanguage parser.
pub fn parse_pairs(pairs: &[(String, String)]) -> Result<ParsedParams> {
    let mut params = ParsedParams::new();

    for (key, value) in pairs {
        match key.as_str() {
            "select" => {
                let items = select::parse_select(value)?;
                if !items.is_empty() {
                    params.select = Some(items);
                }
            }
            "order" => {
                params.order = order::parse_order(value)?;
            }
            "limit" => {
                params.limit = Some(value.parse::<u64>().map_err(|_| Error::InvalidLimit)?);
            }
            "offset" => {
                params.offset = Some(value.parse::<u64>().map_err(|_| Error::InvalidOffset)?);
            }
            "on_conflict" | "columns" => {
                // Reserved for the embedding application.
            }
            key if logic::logic_key(key) => {
                params
                    .filters
                    .push(Condition::Logic(logic::parse_logic(key, value)?));
            }
            key => {
                params
                    .filters
                    .push(Condition::Filter(filter::parse_filter(key, value)?));
            }
        }
    }

    Ok(params)
}
