//! # Parsers
//!
//! Parsers that turn exercise configuration into typed values. Each implements the
//! [`Parser`](crate::traits::parser::Parser) trait.
//!
//! - [`expectation_parser`]: expectation sets, from JSON text or an already-parsed value.

pub mod expectation_parser;
