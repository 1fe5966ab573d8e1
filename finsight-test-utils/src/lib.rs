//! Test infrastructure shared across the finsight workspace: a scripted
//! fake LLM client, transaction/financial-statement fixtures, and a
//! handful of custom assertions.

use async_trait::async_trait;
use finsight_core::{Direction, FinancialLineItem, HealthCheck, LlmError, StatementKind, Transaction};
use finsight_llm::{GenerateRequest, LlmClient};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A fake [`LlmClient`] that plays back a scripted sequence of responses,
/// one per call, looping the last entry once the script is exhausted.
/// Every observed prompt is recorded so a test can assert on what was
/// asked for, without ever touching the network.
pub struct ScriptedLlmClient {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    last_response: Mutex<Result<String, LlmError>>,
    observed_prompts: Mutex<Vec<String>>,
}

impl ScriptedLlmClient {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.to_string())).collect()),
            last_response: Mutex::new(Ok(String::new())),
            observed_prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every call past the end of the script returns this error instead of
    /// repeating the last response.
    pub fn failing_after_script() -> Self {
        let client = Self::new(Vec::new());
        *client.last_response.lock().unwrap() = Err(LlmError::RequestFailed { reason: "script exhausted".to_string() });
        client
    }

    pub fn prompts_seen(&self) -> Vec<String> {
        self.observed_prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn generate(&self, request: GenerateRequest, _timeout: Duration) -> Result<String, LlmError> {
        self.observed_prompts.lock().unwrap().push(request.prompt.clone());
        let mut queue = self.responses.lock().unwrap();
        match queue.pop_front() {
            Some(response) => {
                if let Ok(text) = &response {
                    *self.last_response.lock().unwrap() = Ok(text.clone());
                }
                response
            }
            None => self.last_response.lock().unwrap().clone(),
        }
    }

    async fn health_check(&self) -> HealthCheck {
        HealthCheck::healthy("scripted_test_client")
    }
}

/// A fake [`LlmClient`] that succeeds with a fixed answer unless the
/// prompt contains one of `fail_markers`, in which case it fails. Used to
/// simulate a single agent category failing during a fan-out run without
/// needing to coordinate call ordering across concurrent agents.
pub struct SelectiveFailureLlmClient {
    fail_markers: Vec<String>,
    success_text: String,
}

impl SelectiveFailureLlmClient {
    pub fn new(fail_markers: Vec<&str>) -> Self {
        Self {
            fail_markers: fail_markers.into_iter().map(str::to_string).collect(),
            success_text: "ok".to_string(),
        }
    }
}

#[async_trait]
impl LlmClient for SelectiveFailureLlmClient {
    async fn generate(&self, request: GenerateRequest, _timeout: Duration) -> Result<String, LlmError> {
        if self.fail_markers.iter().any(|marker| request.prompt.contains(marker.as_str())) {
            Err(LlmError::RequestFailed { reason: "selective test failure".to_string() })
        } else {
            Ok(self.success_text.clone())
        }
    }

    async fn health_check(&self) -> HealthCheck {
        HealthCheck::healthy("selective_failure_test_client")
    }
}

pub mod fixtures {
    //! Deterministic sample data mirroring the workspace's literal
    //! end-to-end scenarios.
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn debit(y: i32, m: u32, d: u32, description: &str, amount: f64) -> Transaction {
        Transaction {
            date: date(y, m, d),
            description: description.to_string(),
            amount: -amount.abs(),
            balance: None,
            direction: Direction::Debit,
            category: None,
            reference: None,
        }
    }

    fn credit(y: i32, m: u32, d: u32, description: &str, amount: f64) -> Transaction {
        Transaction {
            date: date(y, m, d),
            description: description.to_string(),
            amount: amount.abs(),
            balance: None,
            direction: Direction::Credit,
            category: None,
            reference: None,
        }
    }

    /// GOSI/rent/income set: two GOSI debits, one office rent debit, one
    /// client credit. Total debits 123,000 SAR, government_compliance
    /// share 38,000, operational share 85,000.
    pub fn gosi_transaction_set() -> Vec<Transaction> {
        vec![
            debit(2024, 1, 10, "GOSI Monthly", 19_000.0),
            debit(2024, 2, 10, "GOSI Monthly", 19_000.0),
            debit(2024, 2, 15, "Office Rent", 85_000.0),
            credit(2024, 2, 1, "Client INV-7", 520_000.0),
        ]
    }

    /// A small recurring-fee set: three identical SAR 25 monthly fees plus
    /// one irregular one-off expense.
    pub fn recurring_fee_transaction_set() -> Vec<Transaction> {
        vec![
            debit(2024, 1, 5, "Monthly Service Fee", 25.0),
            debit(2024, 2, 5, "Monthly Service Fee", 25.0),
            debit(2024, 3, 5, "Monthly Service Fee", 25.0),
            debit(2024, 1, 20, "Equipment Repair", 4_300.0),
        ]
    }

    /// A balance sheet and income statement pair covering the ratios the
    /// financial agents compute, with a zero prior-period line to exercise
    /// the safe-division path.
    pub fn sample_line_items() -> Vec<FinancialLineItem> {
        vec![
            FinancialLineItem::new("Total Current Assets", StatementKind::BalanceSheet, "assets.current", 450_000.0, 400_000.0),
            FinancialLineItem::new("Total Current Liabilities", StatementKind::BalanceSheet, "liabilities.current", 300_000.0, 280_000.0),
            FinancialLineItem::new("Inventory", StatementKind::BalanceSheet, "assets.current.inventory", 120_000.0, 100_000.0),
            FinancialLineItem::new("Total Assets", StatementKind::BalanceSheet, "assets.total", 900_000.0, 820_000.0),
            FinancialLineItem::new("Total Liabilities", StatementKind::BalanceSheet, "liabilities.total", 600_000.0, 540_000.0),
            FinancialLineItem::new("Total Equity", StatementKind::BalanceSheet, "equity.total", 300_000.0, 280_000.0),
            FinancialLineItem::new("Total Revenue", StatementKind::IncomeStatement, "income.revenue", 1_200_000.0, 1_050_000.0),
            FinancialLineItem::new("Net Income", StatementKind::IncomeStatement, "income.net", 90_000.0, 0.0),
            FinancialLineItem::new("Gross Profit", StatementKind::IncomeStatement, "income.gross_profit", 480_000.0, 410_000.0),
            FinancialLineItem::new("Operating Income", StatementKind::IncomeStatement, "income.operating", 150_000.0, 120_000.0),
            FinancialLineItem::new("Interest Expense", StatementKind::IncomeStatement, "expense.interest", 20_000.0, 18_000.0),
            FinancialLineItem::new("Cost of Goods Sold", StatementKind::IncomeStatement, "expense.cogs", 720_000.0, 640_000.0),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_llm::GenerateRequest;

    #[tokio::test]
    async fn scripted_client_plays_back_responses_in_order() {
        let client = ScriptedLlmClient::new(vec!["first", "second"]);
        let a = client.generate(GenerateRequest::new("m", "p1"), Duration::from_secs(1)).await.unwrap();
        let b = client.generate(GenerateRequest::new("m", "p2"), Duration::from_secs(1)).await.unwrap();
        assert_eq!(a, "first");
        assert_eq!(b, "second");
        assert_eq!(client.prompts_seen(), vec!["p1".to_string(), "p2".to_string()]);
    }

    #[tokio::test]
    async fn scripted_client_repeats_the_last_response_past_the_script() {
        let client = ScriptedLlmClient::new(vec!["only"]);
        let _ = client.generate(GenerateRequest::new("m", "p1"), Duration::from_secs(1)).await.unwrap();
        let repeated = client.generate(GenerateRequest::new("m", "p2"), Duration::from_secs(1)).await.unwrap();
        assert_eq!(repeated, "only");
    }

    #[test]
    fn gosi_fixture_totals_match_the_literal_scenario() {
        let items = fixtures::gosi_transaction_set();
        let total_debits: f64 = items.iter().filter(|t| t.amount < 0.0).map(|t| t.magnitude()).sum();
        assert_eq!(total_debits, 123_000.0);
    }
}
