//! Error types for parsing user-supplied units and component references

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unknown unit '{0}' (expected kg, g, l, ml, pz or unit)")]
    UnknownUnit(String),

    #[error("invalid component '{0}' (expected <kind>:<id>=<quantity>)")]
    InvalidComponent(String),

    #[error("unknown component kind '{0}' (expected ingredient, prep or item)")]
    UnknownComponentKind(String),

    #[error("invalid quantity '{0}'")]
    InvalidQuantity(String),

    #[error(transparent)]
    Regex(#[from] regex::Error),
}
