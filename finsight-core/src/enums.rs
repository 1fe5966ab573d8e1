//! Closed vocabularies used at the ABI boundary and internally.
//!
//! Agent category and query-type identifiers are a fixed set, not open
//! strings, so routing tables and match arms stay exhaustive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two independent namespaces an upload's documents live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Transactions,
    Financial,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentType::Transactions => write!(f, "transactions"),
            DocumentType::Financial => write!(f, "financial"),
        }
    }
}

/// Direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Credit,
    Debit,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Credit => write!(f, "credit"),
            Direction::Debit => write!(f, "debit"),
        }
    }
}

/// Which statement a financial line item was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    BalanceSheet,
    IncomeStatement,
    CashFlow,
    Ratio,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementKind::BalanceSheet => write!(f, "balance_sheet"),
            StatementKind::IncomeStatement => write!(f, "income_statement"),
            StatementKind::CashFlow => write!(f, "cash_flow"),
            StatementKind::Ratio => write!(f, "ratio"),
        }
    }
}

/// Mode of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Two-call deep analysis; populates the session cache.
    Insights,
    /// Single-call, cache-backed, optionally filtered by retrieval.
    Chat,
}

/// Closed set of agent-category identifiers.
///
/// `TransactionSearch` is the internal name for the wire identifier
/// `"transaction"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCategory {
    Expense,
    Income,
    Fee,
    Budget,
    Trend,
    #[serde(rename = "transaction")]
    TransactionSearch,
    Ratio,
    Profitability,
    Liquidity,
    FinancialTrend,
    Risk,
    Efficiency,
}

impl AgentCategory {
    /// The six agents that run over transaction data.
    pub const TRANSACTION_AGENTS: [AgentCategory; 6] = [
        AgentCategory::Expense,
        AgentCategory::Income,
        AgentCategory::Fee,
        AgentCategory::Budget,
        AgentCategory::Trend,
        AgentCategory::TransactionSearch,
    ];

    /// The six agents that run over financial statement data.
    pub const FINANCIAL_AGENTS: [AgentCategory; 6] = [
        AgentCategory::Ratio,
        AgentCategory::Profitability,
        AgentCategory::Liquidity,
        AgentCategory::FinancialTrend,
        AgentCategory::Risk,
        AgentCategory::Efficiency,
    ];

    /// All agents registered for a document type, in canonical
    /// (deterministic) order — the order `GenerateInsights` assembles
    /// results in regardless of completion order.
    pub fn for_document_type(document_type: DocumentType) -> &'static [AgentCategory; 6] {
        match document_type {
            DocumentType::Transactions => &Self::TRANSACTION_AGENTS,
            DocumentType::Financial => &Self::FINANCIAL_AGENTS,
        }
    }

    /// The stable wire identifier for this category.
    pub fn wire_name(&self) -> &'static str {
        match self {
            AgentCategory::Expense => "expense",
            AgentCategory::Income => "income",
            AgentCategory::Fee => "fee",
            AgentCategory::Budget => "budget",
            AgentCategory::Trend => "trend",
            AgentCategory::TransactionSearch => "transaction",
            AgentCategory::Ratio => "ratio",
            AgentCategory::Profitability => "profitability",
            AgentCategory::Liquidity => "liquidity",
            AgentCategory::FinancialTrend => "financial_trend",
            AgentCategory::Risk => "risk",
            AgentCategory::Efficiency => "efficiency",
        }
    }
}

impl fmt::Display for AgentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// Closed set of query-type identifiers the Query Understander can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    RatioAnalysis,
    ProfitabilityAnalysis,
    LiquidityAnalysis,
    RiskAssessment,
    EfficiencyAnalysis,
    TrendAnalysis,
    MultiStatement,
    SpecificLineItem,
    GeneralOverview,
    Expense,
    Income,
    Fee,
    Budget,
    TransactionSearch,
}

impl QueryType {
    /// The conservative default primary agent for a document type,
    /// used when routing confidence is below the floor.
    pub fn conservative_default(document_type: DocumentType) -> AgentCategory {
        match document_type {
            DocumentType::Transactions => AgentCategory::Expense,
            DocumentType::Financial => AgentCategory::Ratio,
        }
    }

    /// The routing table entry: intent.query_type -> primary agent-category.
    pub fn primary_agent(&self) -> AgentCategory {
        match self {
            QueryType::RatioAnalysis => AgentCategory::Ratio,
            QueryType::ProfitabilityAnalysis => AgentCategory::Profitability,
            QueryType::LiquidityAnalysis => AgentCategory::Liquidity,
            QueryType::RiskAssessment => AgentCategory::Risk,
            QueryType::EfficiencyAnalysis => AgentCategory::Efficiency,
            QueryType::TrendAnalysis => AgentCategory::Trend,
            QueryType::MultiStatement => AgentCategory::Ratio,
            QueryType::SpecificLineItem => AgentCategory::Ratio,
            QueryType::GeneralOverview => AgentCategory::Ratio,
            QueryType::Expense => AgentCategory::Expense,
            QueryType::Income => AgentCategory::Income,
            QueryType::Fee => AgentCategory::Fee,
            QueryType::Budget => AgentCategory::Budget,
            QueryType::TransactionSearch => AgentCategory::TransactionSearch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_and_financial_agent_sets_are_disjoint_and_cover_six_each() {
        assert_eq!(AgentCategory::TRANSACTION_AGENTS.len(), 6);
        assert_eq!(AgentCategory::FINANCIAL_AGENTS.len(), 6);
        for a in AgentCategory::TRANSACTION_AGENTS {
            assert!(!AgentCategory::FINANCIAL_AGENTS.contains(&a));
        }
    }

    #[test]
    fn conservative_default_picks_the_safe_agent_per_document_type() {
        assert_eq!(
            QueryType::conservative_default(DocumentType::Transactions),
            AgentCategory::Expense
        );
        assert_eq!(
            QueryType::conservative_default(DocumentType::Financial),
            AgentCategory::Ratio
        );
    }

    #[test]
    fn transaction_search_wire_name_is_transaction() {
        assert_eq!(AgentCategory::TransactionSearch.wire_name(), "transaction");
    }
}
