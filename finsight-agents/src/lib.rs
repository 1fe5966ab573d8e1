//! The twelve analytical agents: a uniform contract shared by every agent,
//! with per-category behavior supplied by a [`Reduction`] implementation.

mod contract;
mod financial;
pub mod math;
mod transactions;

pub use contract::{Agent, AgentContext, PreRetrieved, Reduction, ReductionAgent};
pub use financial::{
    EfficiencyReduction, FinancialTrendReduction, LiquidityReduction, ProfitabilityReduction,
    RatioReduction, RiskReduction,
};
pub use transactions::{
    detect_anomalies, BudgetReduction, ExpenseReduction, FeeReduction, IncomeReduction,
    TransactionSearchReduction, TrendReduction,
};

use chrono::NaiveDate;
use finsight_core::AgentCategory;
use std::collections::HashMap;

/// Builds every transaction agent, keyed by category, in the canonical
/// order `AgentCategory::TRANSACTION_AGENTS`. Deterministic result
/// ordering is enforced by the caller assembling results from this map's
/// keys in that fixed order, not by map iteration order.
pub fn transaction_agents(search_terms: Vec<String>, reference_date: NaiveDate) -> HashMap<AgentCategory, Box<dyn Agent>> {
    let mut agents: HashMap<AgentCategory, Box<dyn Agent>> = HashMap::new();
    agents.insert(AgentCategory::Expense, Box::new(ReductionAgent::new(ExpenseReduction)));
    agents.insert(AgentCategory::Income, Box::new(ReductionAgent::new(IncomeReduction)));
    agents.insert(AgentCategory::Fee, Box::new(ReductionAgent::new(FeeReduction)));
    agents.insert(AgentCategory::Budget, Box::new(ReductionAgent::new(BudgetReduction)));
    agents.insert(AgentCategory::Trend, Box::new(ReductionAgent::new(TrendReduction)));
    agents.insert(
        AgentCategory::TransactionSearch,
        Box::new(ReductionAgent::new(TransactionSearchReduction { search_terms, reference_date })),
    );
    agents
}

/// Builds every financial agent, keyed by category.
pub fn financial_agents() -> HashMap<AgentCategory, Box<dyn Agent>> {
    let mut agents: HashMap<AgentCategory, Box<dyn Agent>> = HashMap::new();
    agents.insert(AgentCategory::Ratio, Box::new(ReductionAgent::new(RatioReduction)));
    agents.insert(AgentCategory::Profitability, Box::new(ReductionAgent::new(ProfitabilityReduction)));
    agents.insert(AgentCategory::Liquidity, Box::new(ReductionAgent::new(LiquidityReduction)));
    agents.insert(AgentCategory::FinancialTrend, Box::new(ReductionAgent::new(FinancialTrendReduction)));
    agents.insert(AgentCategory::Risk, Box::new(ReductionAgent::new(RiskReduction)));
    agents.insert(AgentCategory::Efficiency, Box::new(ReductionAgent::new(EfficiencyReduction)));
    agents
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn transaction_agents_cover_all_six_categories() {
        let agents = transaction_agents(Vec::new(), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        for category in AgentCategory::TRANSACTION_AGENTS {
            assert!(agents.contains_key(&category));
        }
    }

    #[test]
    fn financial_agents_cover_all_six_categories() {
        let agents = financial_agents();
        for category in AgentCategory::FINANCIAL_AGENTS {
            assert!(agents.contains_key(&category));
        }
    }
}
