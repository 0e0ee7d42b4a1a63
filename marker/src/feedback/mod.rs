//! # Feedback Strategies Module
//!
//! Pluggable feedback strategies for the marker system. Each strategy implements the
//! [`Feedback`](crate::traits::feedback::Feedback) trait and produces one entry per
//! marked check.
//!
//! ## Available Strategies
//!
//! - [`auto_feedback`]: Template feedback from matched and missed patterns.

pub mod auto_feedback;
