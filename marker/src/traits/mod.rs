//!
//! Traits Module
//!
//! Core traits used throughout the marker system for extensibility.
//!
//! - [`comparator`]: How expected patterns are checked against captured output.
//! - [`feedback`]: How marking results become learner feedback.
//! - [`parser`]: How raw exercise configuration is parsed into typed values.

pub mod comparator;
pub mod feedback;
pub mod parser;
