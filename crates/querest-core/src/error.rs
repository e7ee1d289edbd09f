//! Error types for Querest.
//!
//! Message strings are user-facing and part of the public contract; the
//! pipeline short-circuits at the first failing stage and hands the error
//! back to the caller. Every error fails one compilation, never the
//! process.

use thiserror::Error;

/// Result type for Querest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Querest.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ========================================================================
    // Input format errors
    // ========================================================================
    #[error("missing operator or value")]
    MissingOperator,

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("field must be a string")]
    FieldMustBeString,

    #[error("invalid JSON path syntax")]
    InvalidJsonPath,

    #[error("expected list format: {0}")]
    ExpectedListFormat(&'static str),

    #[error("unclosed parenthesis")]
    UnclosedParenthesis,

    #[error("unexpected closing parenthesis")]
    UnexpectedClosingParenthesis,

    #[error("unexpected token")]
    UnexpectedToken,

    #[error("empty field name")]
    EmptyFieldName,

    #[error("invalid field name: {0}")]
    InvalidFieldName(String),

    #[error("logic expression must be wrapped in parentheses")]
    LogicNotParenthesized,

    #[error("unclosed parenthesis in logic expression")]
    UnclosedLogicParenthesis,

    #[error("invalid nested logic: {0}")]
    InvalidNestedLogic(String),

    #[error("invalid filter format: {0}")]
    InvalidFilter(String),

    #[error("invalid order options: {0}")]
    InvalidOrderOptions(String),

    // ========================================================================
    // Semantic errors
    // ========================================================================
    #[error("limit must be a non-negative integer")]
    InvalidLimit,

    #[error("offset must be a non-negative integer")]
    InvalidOffset,

    #[error("operator {0} does not support quantifiers")]
    QuantifierNotSupported(String),

    // ========================================================================
    // Relational errors
    // ========================================================================
    #[error("relationship '{0}' not found")]
    RelationshipNotFound(String),

    #[error("relationship '{0}' is ambiguous, use hint")]
    RelationshipAmbiguous(String),

    // ========================================================================
    // Schema cache errors
    // ========================================================================
    #[error("schema refresh failed: {0}")]
    SchemaRefresh(String),

    #[error("schema refresh timed out")]
    SchemaRefreshTimeout,
}

impl Error {
    /// Coarse grouping of the taxonomy, handy for callers that map errors
    /// onto a transport.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidLimit
            | Self::InvalidOffset
            | Self::QuantifierNotSupported(_) => ErrorKind::Semantic,
            Self::RelationshipNotFound(_) | Self::RelationshipAmbiguous(_) => {
                ErrorKind::Relational
            }
            Self::SchemaRefresh(_) | Self::SchemaRefreshTimeout => ErrorKind::SchemaCache,
            _ => ErrorKind::InputFormat,
        }
    }
}

/// The error groups of the taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InputFormat,
    Semantic,
    Relational,
    SchemaCache,
}
