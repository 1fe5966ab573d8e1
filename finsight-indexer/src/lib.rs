//! Bridges parsed records from external file parsers into the Semantic
//! Store. Owns validation (required fields, date parsing, credit/debit
//! sign handling) and the `Clear`-then-`Index*` sequencing that keeps a
//! session from accumulating documents across re-uploads.

mod raw;

pub use raw::{RawCompanyInfo, RawFinancialStatement, RawPeriods, RawTransaction};

use chrono::NaiveDate;
use finsight_core::{
    Direction, FinancialLineItem, IndexError, SessionId, StatementKind, Transaction, UploadId,
};
use finsight_store::SemanticStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, IndexError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| IndexError::InvalidDate {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn parse_direction(value: &str) -> Result<Direction, IndexError> {
    match value {
        "credit" => Ok(Direction::Credit),
        "debit" => Ok(Direction::Debit),
        other => Err(IndexError::InvalidDirection { value: other.to_string() }),
    }
}

/// Validates one inbound record and normalizes its amount sign to match
/// `direction`: credits positive, debits negative, regardless of the
/// sign the source system used.
fn parse_transaction(raw: &RawTransaction) -> Result<Transaction, IndexError> {
    if raw.description.trim().is_empty() {
        return Err(IndexError::MissingField { field: "description".to_string() });
    }
    let date = parse_date("date", &raw.date)?;
    let direction = parse_direction(&raw.kind)?;
    let magnitude = raw.amount.abs();
    let amount = match direction {
        Direction::Credit => magnitude,
        Direction::Debit => -magnitude,
    };
    Ok(Transaction {
        date,
        description: raw.description.clone(),
        amount,
        balance: raw.balance,
        direction,
        category: raw.category.clone(),
        reference: raw.reference.clone(),
    })
}

/// Flattens the nested `{statement -> section -> item -> {current, prior}}`
/// shape into the flat line-item list the Semantic Store indexes, sorted
/// for a deterministic document order.
fn flatten_statement(statement: &RawFinancialStatement) -> Vec<FinancialLineItem> {
    let sections: [(StatementKind, &HashMap<String, HashMap<String, raw::RawLeaf>>); 4] = [
        (StatementKind::BalanceSheet, &statement.balance_sheet),
        (StatementKind::IncomeStatement, &statement.income_statement),
        (StatementKind::CashFlow, &statement.cash_flow),
        (StatementKind::Ratio, &statement.ratios),
    ];
    let mut items: Vec<FinancialLineItem> = sections
        .into_iter()
        .flat_map(|(kind, section_map)| {
            section_map.iter().flat_map(move |(section, item_map)| {
                item_map
                    .iter()
                    .map(move |(name, leaf)| FinancialLineItem::new(name.clone(), kind, section.clone(), leaf.current, leaf.prior))
            })
        })
        .collect();
    items.sort_by(|a, b| (&a.section, &a.name).cmp(&(&b.section, &b.name)));
    items
}

/// Stateless bridge between a parser's output and a [`SemanticStore`].
pub struct Indexer {
    store: Arc<dyn SemanticStore>,
}

impl Indexer {
    pub fn new(store: Arc<dyn SemanticStore>) -> Self {
        Self { store }
    }

    /// Clears any documents already indexed for `session_id` first, so a
    /// re-upload for the same session never accumulates stale
    /// transactions.
    #[instrument(skip(self, records), fields(session_id = %session_id, upload_id = %upload_id, count = records.len()))]
    pub async fn index_transactions(
        &self,
        session_id: SessionId,
        upload_id: UploadId,
        records: &[RawTransaction],
    ) -> Result<usize, finsight_core::FinsightError> {
        let transactions = records
            .iter()
            .map(parse_transaction)
            .collect::<Result<Vec<_>, _>>()?;
        self.store.clear(Some(session_id)).await?;
        self.store.index_transactions(session_id, upload_id, &transactions).await?;
        Ok(transactions.len())
    }

    #[instrument(skip(self, statement), fields(session_id = %session_id, upload_id = %upload_id))]
    pub async fn index_financial_data(
        &self,
        session_id: SessionId,
        upload_id: UploadId,
        statement: &RawFinancialStatement,
    ) -> Result<usize, finsight_core::FinsightError> {
        let line_items = flatten_statement(statement);
        self.store.clear(Some(session_id)).await?;
        self.store
            .index_financial_data(session_id, upload_id, &statement.company_info.name, &statement.periods.current, &line_items)
            .await?;
        Ok(line_items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_core::EntityIdType;
    use finsight_store::InMemorySemanticStore;

    fn raw_transaction(date: &str, description: &str, amount: f64, kind: &str) -> RawTransaction {
        RawTransaction {
            date: date.to_string(),
            description: description.to_string(),
            amount,
            balance: None,
            kind: kind.to_string(),
            category: None,
            reference: None,
        }
    }

    #[test]
    fn debit_amount_is_normalized_to_negative_regardless_of_input_sign() {
        let parsed = parse_transaction(&raw_transaction("2024-01-10", "GOSI Monthly", 19_000.0, "debit")).unwrap();
        assert_eq!(parsed.amount, -19_000.0);
        assert_eq!(parsed.direction, Direction::Debit);
    }

    #[test]
    fn credit_amount_is_normalized_to_positive() {
        let parsed = parse_transaction(&raw_transaction("2024-02-01", "Client INV-7", -520_000.0, "credit")).unwrap();
        assert_eq!(parsed.amount, 520_000.0);
    }

    #[test]
    fn missing_description_is_rejected() {
        let err = parse_transaction(&raw_transaction("2024-02-01", "", 100.0, "credit")).unwrap_err();
        assert!(matches!(err, IndexError::MissingField { .. }));
    }

    #[test]
    fn malformed_date_is_rejected() {
        let err = parse_transaction(&raw_transaction("not-a-date", "Fee", 10.0, "debit")).unwrap_err();
        assert!(matches!(err, IndexError::InvalidDate { .. }));
    }

    #[test]
    fn unrecognized_transaction_type_is_rejected() {
        let err = parse_transaction(&raw_transaction("2024-02-01", "Fee", 10.0, "refund")).unwrap_err();
        assert!(matches!(err, IndexError::InvalidDirection { .. }));
    }

    #[tokio::test]
    async fn a_second_upload_for_the_same_session_replaces_rather_than_accumulates() {
        let store: Arc<dyn SemanticStore> = Arc::new(InMemorySemanticStore::new());
        let indexer = Indexer::new(store.clone());
        let session_id = SessionId::now_v7();
        let upload_a = UploadId::now_v7();
        let upload_b = UploadId::now_v7();

        indexer
            .index_transactions(session_id, upload_a, &[raw_transaction("2024-01-10", "GOSI Monthly", 19_000.0, "debit")])
            .await
            .unwrap();
        let count = indexer
            .index_transactions(
                session_id,
                upload_b,
                &[
                    raw_transaction("2024-02-10", "GOSI Monthly", 19_000.0, "debit"),
                    raw_transaction("2024-02-15", "Office Rent", 85_000.0, "debit"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(count, 2);

        let remaining_a = store.search(finsight_store::SearchQuery::new(upload_a)).await.unwrap();
        assert!(remaining_a.is_empty(), "first upload's documents should have been cleared");

        let remaining_b = store.search(finsight_store::SearchQuery::new(upload_b)).await.unwrap();
        assert_eq!(remaining_b.len(), 2);
    }

    #[tokio::test]
    async fn financial_statement_flattens_into_line_items_with_dotted_sections() {
        let store: Arc<dyn SemanticStore> = Arc::new(InMemorySemanticStore::new());
        let indexer = Indexer::new(store.clone());
        let session_id = SessionId::now_v7();
        let upload_id = UploadId::now_v7();

        let statement: RawFinancialStatement = serde_json::from_value(serde_json::json!({
            "company_info": { "name": "Example Co" },
            "periods": { "current": "FY2024", "prior": "FY2023" },
            "balance_sheet": {
                "assets.current": {
                    "Total Current Assets": { "current": 450000.0, "prior": 400000.0 }
                }
            },
            "income_statement": {
                "income.net": {
                    "Net Income": { "current": 90000.0, "prior": 0.0 }
                }
            }
        }))
        .unwrap();

        let count = indexer.index_financial_data(session_id, upload_id, &statement).await.unwrap();
        assert_eq!(count, 2);

        let documents = store.search(finsight_store::SearchQuery::new(upload_id)).await.unwrap();
        let net_income = documents
            .iter()
            .find_map(|doc| match &doc.record {
                finsight_core::SourceRecord::LineItem(item) if item.name == "Net Income" => Some(item),
                _ => None,
            })
            .unwrap();
        // prior == 0.0 must not produce NaN/Infinity, only an absent value.
        assert_eq!(net_income.percent_change, None);
    }
}
