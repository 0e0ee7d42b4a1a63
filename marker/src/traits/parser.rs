//! Parser Trait
//!
//! This module defines the [`Parser`] trait, a generic interface for turning raw exercise
//! configuration into strongly-typed Rust structures. Implementations validate the input
//! and return detailed errors on failure.
//!
//! # Example
//!
//! ```rust
//! use marker::error::MarkerError;
//! use marker::traits::parser::Parser;
//!
//! struct Upper;
//!
//! impl<'a> Parser<&'a str, String> for Upper {
//!     fn parse(&self, raw: &'a str) -> Result<String, MarkerError> {
//!         Ok(raw.to_uppercase())
//!     }
//! }
//!
//! assert_eq!(Upper.parse("abc").unwrap(), "ABC");
//! ```

use crate::error::MarkerError;

/// A generic trait for parsing data into a strongly-typed Rust structure.
///
/// # Type Parameters
///
/// * `Input` - The input type to be parsed.
/// * `Output` - The output type produced by the parser.
pub trait Parser<Input, Output> {
    /// Parse an input value into the target type.
    ///
    /// # Errors
    ///
    /// Returns a [`MarkerError`] if the input does not conform to the expected schema
    /// or cannot be parsed.
    fn parse(&self, input: Input) -> Result<Output, MarkerError>;
}
