//! Parameter-safe SQL building blocks for Querest.
//!
//! Everything user-supplied travels either through [`escape_ident`] (names)
//! or through a [`SqlParam`] bound to a `$n` placeholder (values). SQL text
//! is assembled from trusted literals only.

pub mod builder;
pub mod identifier;
pub mod param;

pub use builder::SqlFragment;
pub use identifier::{escape_ident, quote_literal, QualifiedIdentifier};
pub use param::SqlParam;
