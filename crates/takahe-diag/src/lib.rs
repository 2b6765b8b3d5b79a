//! Error reporting for the Takahē solver.
//!
//! Errors are data, not control flow: the solver returns them and callers
//! pattern-match on the category. There are exactly two categories, and that
//! distinction is the only machine-visible contract; messages and help text
//! are for humans and may change freely.

use std::fmt;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Why a solve failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// The equational relaxation of the constraints has no unifier: a
    /// structural clash (distinct head constructors forced together) or an
    /// occurs-check violation. No subtype solution can exist either.
    NoWeakUnifier,
    /// The constraints are weakly unifiable but not solvable: an equality
    /// failed to unify, a subtype related distinct constructors, a base pair
    /// fell outside the order, a cycle mixed incompatible atoms, or variable
    /// bounds were missing or incompatible.
    NoUnify,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::NoWeakUnifier, Category::NoUnify];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::NoWeakUnifier => "no_weak_unifier",
            Category::NoUnify => "no_unify",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Category::NoWeakUnifier => "T0001",
            Category::NoUnify => "T0002",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::NoWeakUnifier => {
                "The constraints clash structurally even when subtype direction is ignored."
            }
            Category::NoUnify => {
                "The constraints are structurally consistent but admit no subtype solution."
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Solver error
// ---------------------------------------------------------------------------

/// A solver failure with a category and a human-readable message.
///
/// The message names the offending constraint or bound where the failing
/// stage knows it. Optional help text suggests a fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveError {
    pub category: Category,
    pub message: String,
    pub help: Option<String>,
}

impl SolveError {
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            help: None,
        }
    }

    /// Shorthand for a [`Category::NoWeakUnifier`] error.
    pub fn no_weak_unifier(message: impl Into<String>) -> Self {
        Self::new(Category::NoWeakUnifier, message)
    }

    /// Shorthand for a [`Category::NoUnify`] error.
    pub fn no_unify(message: impl Into<String>) -> Self {
        Self::new(Category::NoUnify, message)
    }

    /// Attach help text suggesting how to fix the problem.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.category.code(), self.category, self.message)?;
        if let Some(help) = &self.help {
            write!(f, "\n  help: {help}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SolveError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_stay_distinguishable() {
        assert_ne!(Category::NoWeakUnifier, Category::NoUnify);
        let codes: Vec<_> = Category::ALL.iter().map(|c| c.code()).collect();
        assert_eq!(codes.len(), 2);
        assert_ne!(codes[0], codes[1]);
    }

    #[test]
    fn display_includes_code_and_help() {
        let err = SolveError::no_unify("no common upper bound for t3")
            .with_help("relate the base types in the table");
        let rendered = err.to_string();
        assert!(rendered.contains("T0002"));
        assert!(rendered.contains("no_unify"));
        assert!(rendered.contains("help:"));
    }
}
