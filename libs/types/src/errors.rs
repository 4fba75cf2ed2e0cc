//! Error types for shared market-data types
//!
//! Comprehensive error taxonomy using thiserror

use rust_decimal::Decimal;
use thiserror::Error;

/// Price construction errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PriceError {
    #[error("Price must be positive, got {0}")]
    NotPositive(Decimal),

    #[error("Unparseable price: {0}")]
    Unparseable(String),
}

/// Identifier construction errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdError {
    #[error("Symbol must not be empty")]
    EmptySymbol,

    #[error("ExchangeCode must not be empty")]
    EmptyExchangeCode,
}
