//! Core entity structures for the financial analysis domain.

use crate::{AgentCategory, DocumentType, Direction, Mode, QueryType, StatementKind, Timestamp, UploadId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An immutable bank transaction record.
///
/// Identity for deduplication is the `(date, amount, description)` triple —
/// two transactions with the same day, signed amount, and free-text
/// description are the same transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Day-precision date.
    pub date: chrono::NaiveDate,
    pub description: String,
    /// Signed amount in SAR: positive for credits, negative for debits.
    pub amount: f64,
    pub balance: Option<f64>,
    pub direction: Direction,
    pub category: Option<String>,
    pub reference: Option<String>,
}

impl Transaction {
    /// The dedup identity triple.
    pub fn identity(&self) -> (chrono::NaiveDate, i64, &str) {
        (self.date, (self.amount * 100.0).round() as i64, &self.description)
    }

    /// Absolute value of the amount, regardless of direction.
    pub fn magnitude(&self) -> f64 {
        self.amount.abs()
    }
}

/// One named measurement drawn from a parsed financial statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialLineItem {
    pub name: String,
    pub statement_kind: StatementKind,
    /// Dotted section tag, e.g. `assets.current`.
    pub section: String,
    pub current: f64,
    pub prior: f64,
    /// Precomputed at index time: `(current - prior) / prior * 100`, `None`
    /// when `prior` is zero (division by zero is never produced as `NaN`
    /// or `Infinity`, only as an absent value).
    pub percent_change: Option<f64>,
}

impl FinancialLineItem {
    pub fn new(name: impl Into<String>, statement_kind: StatementKind, section: impl Into<String>, current: f64, prior: f64) -> Self {
        let percent_change = if prior == 0.0 {
            None
        } else {
            Some((current - prior) / prior * 100.0)
        };
        Self {
            name: name.into(),
            statement_kind,
            section: section.into(),
            current,
            prior,
            percent_change,
        }
    }
}

/// Workspace scoping carried by every indexed document.
///
/// `upload_id` is the strong isolation key: retrieval must always pin
/// it so a session holding multiple uploads cannot cross-contaminate
/// answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceTag {
    pub session_id: crate::SessionId,
    pub upload_id: UploadId,
    pub document_type: DocumentType,
}

/// Up to N exemplar records surfaced alongside an agent's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceRecord {
    Transaction(Transaction),
    LineItem(FinancialLineItem),
}

/// The result of one agent run.
///
/// `thinking` is never surfaced to end users and must never be serialized
/// into a response body or logged at info level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub final_answer: String,
    /// Structured, domain-specific reduction (see each agent's module).
    pub analysis: serde_json::Value,
    /// Hidden reasoning from the thinking call. `None` in chat mode.
    #[serde(skip_serializing, default)]
    pub thinking: Option<String>,
    pub mode: Mode,
    pub used_cache: bool,
    pub sources: Vec<SourceRecord>,
    pub statistics: HashMap<String, f64>,
}

impl AgentResult {
    /// Construct the `AgentFailure` placeholder slot used when a single
    /// agent fails during an insights run.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            final_answer: message.into(),
            analysis: serde_json::json!({ "error": "agent_failure" }),
            thinking: None,
            mode: Mode::Insights,
            used_cache: false,
            sources: Vec::new(),
            statistics: HashMap::new(),
        }
    }

    /// `true` for an `AgentFailure` placeholder slot: present in the cache
    /// map but not a usable analysis for a later chat turn.
    pub fn is_failure(&self) -> bool {
        self.analysis.get("error").and_then(|v| v.as_str()) == Some("agent_failure")
    }
}

/// Per `(session_id, document_type)` cache entry: every agent-category's
/// result from the most recent insights run, plus lifetime bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedInsights {
    pub results: HashMap<AgentCategory, AgentResult>,
    pub generated_at: Timestamp,
    pub expires_at: Timestamp,
}

impl CachedInsights {
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// A date range, half-open: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
}

impl DateRange {
    /// Expand a single date into the one-day half-open range `[d, d+1)`.
    pub fn single_day(d: chrono::NaiveDate) -> Self {
        Self { start: d, end: d + chrono::Duration::days(1) }
    }

    pub fn contains(&self, d: chrono::NaiveDate) -> bool {
        d >= self.start && d < self.end
    }

    /// `true` when `end <= start` — an inverted range, which the Router
    /// must reject as `InvalidQuery`.
    pub fn is_inverted(&self) -> bool {
        self.end <= self.start
    }
}

/// An inclusive amount interval, in SAR.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: f64,
    pub max: f64,
}

impl AmountRange {
    /// An exact-match amount, expanded to `±1` SAR tolerance.
    pub fn around(amount: f64) -> Self {
        Self { min: amount - 1.0, max: amount + 1.0 }
    }

    pub fn contains(&self, amount: f64) -> bool {
        amount >= self.min && amount <= self.max
    }

    pub fn is_inverted(&self) -> bool {
        self.max < self.min
    }
}

/// Filters extracted from a free-text query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilters {
    pub date_range: Option<DateRange>,
    pub amount_range: Option<AmountRange>,
    pub merchants: Vec<String>,
    pub keywords: Vec<String>,
    pub direction: Option<Direction>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.date_range.is_none()
            && self.amount_range.is_none()
            && self.merchants.is_empty()
            && self.keywords.is_empty()
            && self.direction.is_none()
    }
}

/// The structured output of the Query Understander.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryIntent {
    pub query_type: QueryType,
    pub filters: QueryFilters,
    pub upload_id: UploadId,
    pub primary_agent: AgentCategory,
    pub secondary_agent: Option<AgentCategory>,
    pub confidence: f32,
    pub search_terms: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn around_always_contains_its_own_center(amount in -1_000_000.0f64..1_000_000.0) {
            prop_assert!(AmountRange::around(amount).contains(amount));
        }

        #[test]
        fn around_never_produces_an_inverted_range(amount in -1_000_000.0f64..1_000_000.0) {
            prop_assert!(!AmountRange::around(amount).is_inverted());
        }
    }
}
