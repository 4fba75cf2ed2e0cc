//! Identifier types for instruments and venues
//!
//! Symbols and exchange codes are normalised to upper case on construction so
//! that map lookups and topic names agree regardless of how a provider or a
//! subscriber spelled them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::IdError;

/// Instrument symbol (e.g., "AAPL", "RELIANCE")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Create a new Symbol, trimming whitespace and upper-casing.
    ///
    /// # Panics
    /// Panics if the symbol is empty after trimming
    pub fn new(symbol: impl AsRef<str>) -> Self {
        Self::try_new(symbol).expect("Symbol must not be empty")
    }

    /// Try to create a Symbol, returning None if empty
    pub fn try_new(symbol: impl AsRef<str>) -> Option<Self> {
        let s = symbol.as_ref().trim();
        if s.is_empty() {
            None
        } else {
            Some(Self(s.to_ascii_uppercase()))
        }
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_new(s).ok_or(IdError::EmptySymbol)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

/// Exchange (venue) code, e.g. "NASDAQ", "NSE"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExchangeCode(String);

impl ExchangeCode {
    /// # Panics
    /// Panics if the code is empty after trimming
    pub fn new(code: impl AsRef<str>) -> Self {
        Self::try_new(code).expect("ExchangeCode must not be empty")
    }

    pub fn try_new(code: impl AsRef<str>) -> Option<Self> {
        let s = code.as_ref().trim();
        if s.is_empty() {
            None
        } else {
            Some(Self(s.to_ascii_uppercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExchangeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExchangeCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl TryFrom<String> for ExchangeCode {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_new(s).ok_or(IdError::EmptyExchangeCode)
    }
}

impl From<ExchangeCode> for String {
    fn from(code: ExchangeCode) -> Self {
        code.0
    }
}

/// Asset class of an instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetClass {
    Equity,
    Etf,
    Index,
    Commodity,
    Currency,
    Crypto,
}

impl AssetClass {
    /// Upper-case label, used as a configuration key.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Equity => "EQUITY",
            AssetClass::Etf => "ETF",
            AssetClass::Index => "INDEX",
            AssetClass::Commodity => "COMMODITY",
            AssetClass::Currency => "CURRENCY",
            AssetClass::Crypto => "CRYPTO",
        }
    }
}

impl Default for AssetClass {
    fn default() -> Self {
        AssetClass::Equity
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
