//! Interception Layer
//!
//! [`ObservedGlobals`] records which top-level names a fragment declared and
//! which of them it read. The engine compares the global scope before and
//! after a run: every name that appears or changes is a fragment binding and
//! goes through [`ObservedGlobals::record_declared`]. Reads come from the
//! source scan in [`scan`], so a binding only counts as accessed when the
//! fragment's own code reads it.
//!
//! Host bindings (mocks, placeholders, intrinsics) are never recorded unless
//! the fragment replaces them. Names starting with `__` are reserved for
//! plumbing and are never recorded at all.

pub(crate) mod scan;

use std::collections::BTreeSet;

use crate::result::ObservedIdentifiers;

const INTERNAL_PREFIX: &str = "__";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedGlobals {
    /// Fragment bindings in order of first appearance in the source.
    order: Vec<String>,
    declared: BTreeSet<String>,
    accessed: BTreeSet<String>,
}

impl ObservedGlobals {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_declared(&mut self, name: &str) {
        if name.starts_with(INTERNAL_PREFIX) {
            return;
        }
        if self.declared.insert(name.to_string()) {
            self.order.push(name.to_string());
        }
    }

    /// Reads only count for names the fragment itself declared.
    pub(crate) fn record_access(&mut self, name: &str) {
        if self.declared.contains(name) {
            self.accessed.insert(name.to_string());
        }
    }

    /// Snapshot of the recorded identifier sets.
    pub(crate) fn observed(&self) -> ObservedIdentifiers {
        ObservedIdentifiers {
            declared: self.declared.clone(),
            accessed: self.accessed.clone(),
        }
    }

    pub(crate) fn fragment_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub(crate) fn is_fragment(&self, name: &str) -> bool {
        self.declared.contains(name)
    }
}
