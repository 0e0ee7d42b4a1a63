//! # Expectation Parser
//!
//! Parses and validates an [`ExpectationSet`]. Deserialisation alone accepts some sets that
//! cannot be marked meaningfully, so the parser additionally rejects:
//!
//! - an empty `expectations` list,
//! - entries with a blank `name`,
//! - `output` checks without patterns,
//! - `regex` patterns that do not compile and `numeric` patterns that are not numbers,
//! - blank variable or function names.

use serde::Deserialize;
use serde_json::Value;

use crate::error::MarkerError;
use crate::expectations::{Expectation, ExpectationEntry, ExpectationSet, MatchScheme};
use crate::predicates::compile_pattern;
use crate::traits::parser::Parser;

pub struct ExpectationParser;

impl<'a> Parser<&'a str, ExpectationSet> for ExpectationParser {
    fn parse(&self, raw: &'a str) -> Result<ExpectationSet, MarkerError> {
        let set: ExpectationSet = serde_json::from_str(raw)?;
        validate(&set)?;
        Ok(set)
    }
}

impl<'a> Parser<&'a Value, ExpectationSet> for ExpectationParser {
    fn parse(&self, raw: &'a Value) -> Result<ExpectationSet, MarkerError> {
        let set = from_value(raw)?;
        validate(&set)?;
        Ok(set)
    }
}

fn from_value(raw: &Value) -> Result<ExpectationSet, MarkerError> {
    if !raw.is_object() {
        return Err(MarkerError::InvalidJson(
            "expectation set must be a JSON object".to_string(),
        ));
    }
    Ok(ExpectationSet::deserialize(raw)?)
}

fn validate(set: &ExpectationSet) -> Result<(), MarkerError> {
    if set.expectations.is_empty() {
        return Err(MarkerError::MissingField("expectations".to_string()));
    }
    set.expectations.iter().try_for_each(validate_entry)
}

fn validate_entry(entry: &ExpectationEntry) -> Result<(), MarkerError> {
    if entry.name.trim().is_empty() {
        return Err(MarkerError::MissingField("name".to_string()));
    }

    match &entry.check {
        Expectation::Output { patterns, scheme } => {
            if patterns.is_empty() {
                return Err(MarkerError::MissingField(format!(
                    "patterns for '{}'",
                    entry.name
                )));
            }
            match scheme {
                MatchScheme::Regex => {
                    for pattern in patterns {
                        compile_pattern(pattern)?;
                    }
                }
                MatchScheme::Numeric { .. } => {
                    if let Some(bad) = patterns.iter().find(|p| p.trim().parse::<f64>().is_err()) {
                        return Err(MarkerError::InvalidPattern(format!(
                            "'{bad}' in '{}' is not a number",
                            entry.name
                        )));
                    }
                }
                MatchScheme::Contains => {}
            }
        }
        Expectation::DeclaresVariable { variable }
        | Expectation::UsesVariable { variable }
        | Expectation::BindingEquals { variable, .. } => require(variable, "variable", entry)?,
        Expectation::FunctionSignature { function, .. }
        | Expectation::FunctionReturns { function, .. } => require(function, "function", entry)?,
        Expectation::RunsSuccessfully
        | Expectation::PromptRequested
        | Expectation::CallCount { .. } => {}
    }
    Ok(())
}

fn require(value: &str, field: &str, entry: &ExpectationEntry) -> Result<(), MarkerError> {
    if value.trim().is_empty() {
        return Err(MarkerError::MissingField(format!(
            "{field} for '{}'",
            entry.name
        )));
    }
    Ok(())
}
