//! Command-line `name=value` definition collector.
//!
//! Accepts strings like `"foo=123"` or `"cpu=mpc8548"`, splits them at
//! the first `=`, and records them for installation as root-scope
//! constants before any source declaration is processed. A bare name
//! with no `=` (or with an empty value) records a constant with no
//! bound value.

use tracing::{debug, warn};

/// One collected name/optional-value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvPair {
    /// Constant name
    pub name: String,
    /// Optional value text; resolved later by the evaluator's
    /// number-or-string guessing rule
    pub value: Option<String>,
}

/// Ordered collection of command-line definitions.
///
/// Duplicate names are warned about and ignored: the first definition
/// wins.
#[derive(Debug, Clone, Default)]
pub struct NvList {
    pairs: Vec<NvPair>,
}

impl NvList {
    /// Creates an empty list.
    pub fn new() -> Self {
        NvList::default()
    }

    /// Records one `name[=value]` definition string.
    ///
    /// Returns `false` if the string was empty or a duplicate.
    pub fn note_define(&mut self, defstr: &str) -> bool {
        if defstr.is_empty() {
            return false;
        }

        let (name, value) = match defstr.split_once('=') {
            Some((name, "")) => (name, None),
            Some((name, value)) => (name, Some(value.to_string())),
            None => (defstr, None),
        };

        if name.is_empty() {
            return false;
        }

        if self.is_present(name) {
            warn!(name, ?value, "ignored duplicate command-line definition");
            return false;
        }

        debug!(name, ?value, "recorded command-line definition");
        self.pairs.push(NvPair {
            name: name.to_string(),
            value,
        });
        true
    }

    /// True if a definition with this name was already recorded.
    pub fn is_present(&self, name: &str) -> bool {
        self.pairs.iter().any(|nv| nv.name == name)
    }

    /// Definitions in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = &NvPair> {
        self.pairs.iter()
    }

    /// Number of recorded definitions.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
