//! Embedding-backed document store for transactions and financial line
//! items, with workspace-tagged filtered retrieval.
//!
//! Every stored document carries a `WorkspaceTag`; a search must always pin
//! `upload_id`, enforced here by making it a required constructor argument
//! on `SearchQuery` rather than an optional filter field — there is no way
//! to build an unscoped query.

mod memory;

pub use memory::InMemorySemanticStore;

use async_trait::async_trait;
use finsight_core::{
    AmountRange, DateRange, Direction, FinancialLineItem, SessionId, SourceRecord, StatementKind,
    StoreError, Transaction, UploadId, WorkspaceTag,
};

/// Discriminates the three kinds of document the store holds, used by the
/// `doc_type` search filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocKind {
    Transaction,
    LineItem,
    Ratio,
}

impl DocKind {
    fn for_line_item(statement_kind: StatementKind) -> Self {
        match statement_kind {
            StatementKind::Ratio => DocKind::Ratio,
            _ => DocKind::LineItem,
        }
    }
}

/// Conjunctive filter set applied during `Search`.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub direction: Option<Direction>,
    pub amount_range: Option<AmountRange>,
    pub date_range: Option<DateRange>,
    pub doc_type: Option<Vec<DocKind>>,
}

/// A retrieval request. `upload_id` must be supplied at construction —
/// there is deliberately no `Default` and no way to mutate it afterward,
/// so an unscoped query cannot be built.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    upload_id: UploadId,
    query_text: Option<String>,
    filters: SearchFilters,
    limit: usize,
}

impl SearchQuery {
    pub fn new(upload_id: UploadId) -> Self {
        Self {
            upload_id,
            query_text: None,
            filters: SearchFilters::default(),
            limit: 10,
        }
    }

    pub fn with_text(mut self, query_text: impl Into<String>) -> Self {
        self.query_text = Some(query_text.into());
        self
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn upload_id(&self) -> UploadId {
        self.upload_id
    }
}

/// A document returned from `Search`, carrying its canonical text rendering
/// and the original record so callers can rehydrate sources for an
/// `AgentResult`.
#[derive(Debug, Clone)]
pub struct RetrievedDocument {
    pub tag: WorkspaceTag,
    pub text: String,
    pub record: SourceRecord,
    pub doc_kind: DocKind,
}

/// Embedding-backed document store. Implementations must treat
/// embedder-initialization failure as fatal at construction time and
/// surface per-call failures as `StoreError::Unavailable`.
#[async_trait]
pub trait SemanticStore: Send + Sync {
    async fn index_transactions(
        &self,
        session_id: SessionId,
        upload_id: UploadId,
        transactions: &[Transaction],
    ) -> Result<(), StoreError>;

    /// `company`/`period` are free-text labels folded into the canonical
    /// text rendering; they do not participate in filtering.
    async fn index_financial_data(
        &self,
        session_id: SessionId,
        upload_id: UploadId,
        company: &str,
        period: &str,
        line_items: &[FinancialLineItem],
    ) -> Result<(), StoreError>;

    async fn search(&self, query: SearchQuery) -> Result<Vec<RetrievedDocument>, StoreError>;

    /// Removes all documents tagged with `session_id` by reading the full
    /// document set and filtering in memory, rather than trusting a
    /// backend's own filtered-delete. Passing `None` clears everything.
    /// Returns the number of documents removed.
    async fn clear(&self, session_id: Option<SessionId>) -> Result<usize, StoreError>;
}

/// Deterministic canonical text rendering for one transaction:
/// `"{date} {description} {signed-amount} {type}"`.
pub fn render_transaction_text(transaction: &Transaction) -> String {
    format!(
        "{} {} {:.2} {}",
        transaction.date,
        transaction.description,
        transaction.amount,
        transaction.direction,
    )
}

/// Deterministic canonical text rendering for one financial line item:
/// `"{company} {period}: {statement_kind} - {section} - {item}: Current
/// {v}, Prior {p}, Change {d}%"`.
pub fn render_line_item_text(company: &str, period: &str, item: &FinancialLineItem) -> String {
    let change = item
        .percent_change
        .map(|d| format!("{d:.2}"))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "{company} {period}: {} - {} - {}: Current {:.2}, Prior {:.2}, Change {change}%",
        item.statement_kind, item.section, item.name, item.current, item.prior,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn transaction_rendering_is_deterministic() {
        let t = Transaction {
            date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            description: "GOSI PAYMENT".to_string(),
            amount: -1200.0,
            balance: None,
            direction: Direction::Debit,
            category: None,
            reference: None,
        };
        assert_eq!(render_transaction_text(&t), render_transaction_text(&t));
        assert!(render_transaction_text(&t).contains("GOSI PAYMENT"));
    }

    #[test]
    fn line_item_rendering_shows_na_when_prior_is_zero() {
        let item = FinancialLineItem::new("Revenue", StatementKind::IncomeStatement, "income.revenue", 1000.0, 0.0);
        let text = render_line_item_text("Acme Co", "2026-Q1", &item);
        assert!(text.contains("Change n/a%"));
    }
}
