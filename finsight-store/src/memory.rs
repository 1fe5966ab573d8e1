//! In-process semantic store. Ranking is a deterministic token-overlap
//! score rather than a real embedding similarity — there is no embedding
//! model to call locally in this layer, and the invariant that matters
//! here is deterministic text rendering for dedup, not any particular
//! similarity metric.

use crate::{
    render_line_item_text, render_transaction_text, DocKind, RetrievedDocument, SearchFilters,
    SearchQuery, SemanticStore,
};
use async_trait::async_trait;
use finsight_core::{
    FinancialLineItem, SessionId, SourceRecord, StoreError, Transaction, UploadId, WorkspaceTag,
};
use std::collections::HashSet;
use tokio::sync::RwLock;

struct StoredDocument {
    tag: WorkspaceTag,
    text: String,
    record: SourceRecord,
    doc_kind: DocKind,
}

/// In-memory, process-local implementation of [`SemanticStore`]. Safe for
/// concurrent use: all mutation goes through a single `RwLock`.
#[derive(Default)]
pub struct InMemorySemanticStore {
    documents: RwLock<Vec<StoredDocument>>,
}

impl InMemorySemanticStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(document: &StoredDocument, query: &SearchQuery) -> bool {
        if document.tag.upload_id != query.upload_id {
            return false;
        }
        let filters = &query.filters;
        if let Some(direction) = filters.direction {
            let doc_direction = match &document.record {
                SourceRecord::Transaction(t) => Some(t.direction),
                SourceRecord::LineItem(_) => None,
            };
            if doc_direction != Some(direction) {
                return false;
            }
        }
        if let Some(range) = filters.amount_range {
            // Ranges come from magnitude-oriented phrasing ("over 15000"),
            // and debits are stored as negative amounts, so match against
            // the unsigned magnitude rather than the signed amount.
            let amount = match &document.record {
                SourceRecord::Transaction(t) => Some(t.magnitude()),
                SourceRecord::LineItem(item) => Some(item.current.abs()),
            };
            match amount {
                Some(amount) if range.contains(amount) => {}
                _ => return false,
            }
        }
        if let Some(range) = filters.date_range {
            match &document.record {
                SourceRecord::Transaction(t) if range.contains(t.date) => {}
                SourceRecord::Transaction(_) => return false,
                // Financial line items carry no date; a date filter never
                // matches them.
                SourceRecord::LineItem(_) => return false,
            }
        }
        if let Some(doc_types) = &filters.doc_type {
            if !doc_types.contains(&document.doc_kind) {
                return false;
            }
        }
        true
    }

    /// Token-overlap score against `query_text`; `None` ranks every match
    /// equally (insertion order preserved).
    fn score(document: &StoredDocument, query_text: &Option<String>) -> u32 {
        let Some(query_text) = query_text else {
            return 0;
        };
        let query_tokens: HashSet<String> = query_text
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let doc_tokens: HashSet<String> = document
            .text
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        query_tokens.intersection(&doc_tokens).count() as u32
    }
}

#[async_trait]
impl SemanticStore for InMemorySemanticStore {
    async fn index_transactions(
        &self,
        session_id: SessionId,
        upload_id: UploadId,
        transactions: &[Transaction],
    ) -> Result<(), StoreError> {
        let mut guard = self.documents.write().await;
        for transaction in transactions {
            guard.push(StoredDocument {
                tag: WorkspaceTag {
                    session_id,
                    upload_id,
                    document_type: finsight_core::DocumentType::Transactions,
                },
                text: render_transaction_text(transaction),
                record: SourceRecord::Transaction(transaction.clone()),
                doc_kind: DocKind::Transaction,
            });
        }
        Ok(())
    }

    async fn index_financial_data(
        &self,
        session_id: SessionId,
        upload_id: UploadId,
        company: &str,
        period: &str,
        line_items: &[FinancialLineItem],
    ) -> Result<(), StoreError> {
        let mut guard = self.documents.write().await;
        for item in line_items {
            guard.push(StoredDocument {
                tag: WorkspaceTag {
                    session_id,
                    upload_id,
                    document_type: finsight_core::DocumentType::Financial,
                },
                text: render_line_item_text(company, period, item),
                doc_kind: DocKind::for_line_item(item.statement_kind),
                record: SourceRecord::LineItem(item.clone()),
            });
        }
        Ok(())
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<RetrievedDocument>, StoreError> {
        let guard = self.documents.read().await;
        let mut matches: Vec<(u32, usize)> = guard
            .iter()
            .enumerate()
            .filter(|(_, doc)| Self::matches(doc, &query))
            .map(|(i, doc)| (Self::score(doc, &query.query_text), i))
            .collect();
        // Stable sort descending by score; ties keep insertion order.
        matches.sort_by(|a, b| b.0.cmp(&a.0));
        matches.truncate(query.limit);

        Ok(matches
            .into_iter()
            .map(|(_, i)| {
                let doc = &guard[i];
                RetrievedDocument {
                    tag: doc.tag,
                    text: doc.text.clone(),
                    record: doc.record.clone(),
                    doc_kind: doc.doc_kind,
                }
            })
            .collect())
    }

    async fn clear(&self, session_id: Option<SessionId>) -> Result<usize, StoreError> {
        let mut guard = self.documents.write().await;
        let before = guard.len();
        match session_id {
            Some(session_id) => guard.retain(|doc| doc.tag.session_id != session_id),
            None => guard.clear(),
        }
        Ok(before - guard.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use finsight_core::{Direction, EntityIdType};

    fn sample_transaction(amount: f64) -> Transaction {
        Transaction {
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            description: "SALARY TRANSFER".to_string(),
            amount,
            balance: None,
            direction: if amount >= 0.0 { Direction::Credit } else { Direction::Debit },
            category: None,
            reference: None,
        }
    }

    #[tokio::test]
    async fn search_never_crosses_upload_boundary() {
        let store = InMemorySemanticStore::new();
        let session = SessionId::new_v4();
        let upload_a = UploadId::new_v4();
        let upload_b = UploadId::new_v4();

        store
            .index_transactions(session, upload_a, &[sample_transaction(500.0)])
            .await
            .unwrap();
        store
            .index_transactions(session, upload_b, &[sample_transaction(-500.0)])
            .await
            .unwrap();

        let results = store.search(SearchQuery::new(upload_a)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tag.upload_id, upload_a);
    }

    #[tokio::test]
    async fn clear_by_session_reads_then_filters_in_memory() {
        let store = InMemorySemanticStore::new();
        let session_a = SessionId::new_v4();
        let session_b = SessionId::new_v4();
        let upload = UploadId::new_v4();

        store
            .index_transactions(session_a, upload, &[sample_transaction(10.0)])
            .await
            .unwrap();
        store
            .index_transactions(session_b, UploadId::new_v4(), &[sample_transaction(10.0)])
            .await
            .unwrap();

        let removed = store.clear(Some(session_a)).await.unwrap();
        assert_eq!(removed, 1);

        let remaining = store.search(SearchQuery::new(upload)).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn amount_filter_respects_range() {
        let store = InMemorySemanticStore::new();
        let session = SessionId::new_v4();
        let upload = UploadId::new_v4();
        store
            .index_transactions(
                session,
                upload,
                &[sample_transaction(100.0), sample_transaction(900.0)],
            )
            .await
            .unwrap();

        let filters = SearchFilters {
            amount_range: Some(finsight_core::AmountRange { min: 50.0, max: 150.0 }),
            ..Default::default()
        };
        let results = store
            .search(SearchQuery::new(upload).with_filters(filters))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn amount_filter_matches_debits_by_magnitude_not_sign() {
        let store = InMemorySemanticStore::new();
        let session = SessionId::new_v4();
        let upload = UploadId::new_v4();
        store
            .index_transactions(
                session,
                upload,
                &[sample_transaction(-19_000.0), sample_transaction(-500.0)],
            )
            .await
            .unwrap();

        // "over 15000" — a magnitude-oriented range with no upper bound.
        let filters = SearchFilters {
            amount_range: Some(finsight_core::AmountRange { min: 15_000.0, max: f64::MAX }),
            ..Default::default()
        };
        let results = store
            .search(SearchQuery::new(upload).with_filters(filters))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        match &results[0].record {
            SourceRecord::Transaction(t) => assert_eq!(t.amount, -19_000.0),
            SourceRecord::LineItem(_) => panic!("expected a transaction"),
        }
    }
}
