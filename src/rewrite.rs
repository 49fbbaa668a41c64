//! Query rewriting with a static synonym table.
//!
//! Employees ask about "PTO" and "pay periods"; the handbook talks about
//! "vacation" accruing "monthly". Each [`SynonymRule`] appends handbook
//! vocabulary to the query when any of its trigger terms appears in the
//! lowercased question, so the query embedding lands nearer the right
//! passages. The rewritten text is only used for search; the model still
//! sees the question as asked.

use serde::Deserialize;

/// Append `append` to the query when any of `triggers` occurs in it.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SynonymRule {
    /// Lowercase substrings matched against the lowercased question.
    pub triggers: Vec<String>,
    pub append: Vec<String>,
}

impl SynonymRule {
    pub fn new<T, A>(triggers: T, append: A) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            triggers: triggers.into_iter().map(Into::into).collect(),
            append: append.into_iter().map(Into::into).collect(),
        }
    }

    /// Leave-accrual questions.
    pub fn accrual() -> Self {
        Self::new(
            ["pto", "accrual", "accrue", "pay period"],
            ["vacation", "accrual", "monthly", "hours"],
        )
    }

    fn matches(&self, lowered: &str) -> bool {
        self.triggers
            .iter()
            .any(|t| lowered.contains(t.to_lowercase().as_str()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryRewriter {
    rules: Vec<SynonymRule>,
}

impl QueryRewriter {
    pub fn new(rules: Vec<SynonymRule>) -> Self {
        Self { rules }
    }

    /// Return the search text for `question`.
    ///
    /// The result always starts with the unmodified question; matching rules
    /// append their terms in table order.
    pub fn rewrite(&self, question: &str) -> String {
        let lowered = question.to_lowercase();
        let mut query = question.to_string();
        for rule in self.rules.iter().filter(|r| r.matches(&lowered)) {
            if rule.append.is_empty() {
                continue;
            }
            query.push(' ');
            query.push_str(&rule.append.join(" "));
        }
        if query.len() != question.len() {
            tracing::debug!(question, query = %query, "rewrote query with synonyms");
        }
        query
    }
}
