//! The six agents that run over financial statements.
//!
//! Line items are looked up by name (case-insensitive) rather than by a
//! fixed schema, since `FinancialLineItem` carries a free-text `name` and
//! a dotted `section` rather than a closed statement shape. Any ratio that
//! needs an item the upload didn't include, or whose denominator is zero,
//! resolves to `null` — never `NaN`/`Infinity`.

use crate::contract::{AgentContext, Reduction};
use crate::math::{clip, safe_div};
use finsight_core::{AgentCategory, FinancialLineItem};
use serde_json::{json, Value};

fn items(ctx: &AgentContext) -> &[FinancialLineItem] {
    ctx.pre_retrieved.as_line_items()
}

fn find<'a>(items: &'a [FinancialLineItem], name: &str) -> Option<&'a FinancialLineItem> {
    items.iter().find(|i| i.name.eq_ignore_ascii_case(name))
}

fn current_of(items: &[FinancialLineItem], name: &str) -> Option<f64> {
    find(items, name).map(|i| i.current)
}

fn prior_of(items: &[FinancialLineItem], name: &str) -> Option<f64> {
    find(items, name).map(|i| i.prior)
}

fn opt_div(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => safe_div(a, b),
        _ => None,
    }
}

// ---------------------------------------------------------------------
// ratio
// ---------------------------------------------------------------------

pub struct RatioReduction;

impl Reduction for RatioReduction {
    fn category(&self) -> AgentCategory {
        AgentCategory::Ratio
    }

    fn reduce(&self, ctx: &AgentContext) -> Value {
        let items = items(ctx);
        let current_assets = current_of(items, "Current Assets");
        let current_liabilities = current_of(items, "Current Liabilities");
        let inventory = current_of(items, "Inventory");
        let cash = current_of(items, "Cash");
        let total_debt = current_of(items, "Total Liabilities");
        let total_equity = current_of(items, "Total Equity");
        let net_income = current_of(items, "Net Income");
        let total_assets = current_of(items, "Total Assets");
        let ebit = current_of(items, "EBIT");
        let interest_expense = current_of(items, "Interest Expense");
        let revenue = current_of(items, "Revenue");

        json!({
            "current_ratio": opt_div(current_assets, current_liabilities),
            "quick_ratio": opt_div(
                current_assets.zip(inventory).map(|(a, i)| a - i),
                current_liabilities,
            ),
            "cash_ratio": opt_div(cash, current_liabilities),
            "debt_to_equity": opt_div(total_debt, total_equity),
            "return_on_assets": opt_div(net_income, total_assets),
            "return_on_equity": opt_div(net_income, total_equity),
            "interest_coverage": opt_div(ebit, interest_expense),
            "asset_turnover": opt_div(revenue, total_assets),
        })
    }
}

// ---------------------------------------------------------------------
// profitability
// ---------------------------------------------------------------------

pub struct ProfitabilityReduction;

impl Reduction for ProfitabilityReduction {
    fn category(&self) -> AgentCategory {
        AgentCategory::Profitability
    }

    fn reduce(&self, ctx: &AgentContext) -> Value {
        let items = items(ctx);
        let revenue = current_of(items, "Revenue");
        let cogs = current_of(items, "COGS");
        let operating_income = current_of(items, "Operating Income");
        let ebitda = current_of(items, "EBITDA");
        let net_income = current_of(items, "Net Income");
        let prior_net_income = prior_of(items, "Net Income");

        let gross_margin = opt_div(revenue.zip(cogs).map(|(r, c)| r - c), revenue);
        let operating_margin = opt_div(operating_income, revenue);
        let ebitda_margin = opt_div(ebitda, revenue);
        let net_margin = opt_div(net_income, revenue);

        let yoy_growth = match (net_income, prior_net_income) {
            (Some(n), Some(p)) if p != 0.0 => Some((n - p) / p * 100.0),
            _ => None,
        };

        let thresholds = [
            gross_margin.is_some_and(|m| m >= 0.40),
            operating_margin.is_some_and(|m| m >= 0.15),
            ebitda_margin.is_some_and(|m| m >= 0.20),
            net_margin.is_some_and(|m| m >= 0.10),
        ];
        let margin_health = thresholds.iter().filter(|t| **t).count();

        json!({
            "gross_margin": gross_margin,
            "operating_margin": operating_margin,
            "ebitda_margin": ebitda_margin,
            "net_margin": net_margin,
            "yoy_net_income_growth_percent": yoy_growth,
            "margin_health": margin_health,
        })
    }
}

// ---------------------------------------------------------------------
// liquidity
// ---------------------------------------------------------------------

pub struct LiquidityReduction;

impl Reduction for LiquidityReduction {
    fn category(&self) -> AgentCategory {
        AgentCategory::Liquidity
    }

    fn reduce(&self, ctx: &AgentContext) -> Value {
        let items = items(ctx);
        let current_assets = current_of(items, "Current Assets");
        let current_liabilities = current_of(items, "Current Liabilities");
        let working_capital = current_assets.zip(current_liabilities).map(|(a, l)| a - l);

        let dio = days_metric(items, "Inventory", "COGS");
        let dso = days_metric(items, "Accounts Receivable", "Revenue");
        let dpo = days_metric(items, "Accounts Payable", "COGS");
        let cash_conversion_cycle = match (dio, dso, dpo) {
            (Some(dio), Some(dso), Some(dpo)) => Some(dio + dso - dpo),
            _ => None,
        };

        let current_ratio = opt_div(current_assets, current_liabilities);
        let status = match current_ratio {
            Some(r) if r >= 2.0 => "excellent",
            Some(r) if r >= 1.5 => "good",
            Some(r) if r >= 1.0 => "fair",
            Some(_) => "poor",
            None => "unknown",
        };

        json!({
            "working_capital": working_capital,
            "current_ratio": current_ratio,
            "days_inventory_outstanding": dio,
            "days_sales_outstanding": dso,
            "days_payable_outstanding": dpo,
            "cash_conversion_cycle_days": cash_conversion_cycle,
            "status": status,
        })
    }
}

fn days_metric(items: &[FinancialLineItem], balance_item: &str, flow_item: &str) -> Option<f64> {
    opt_div(current_of(items, balance_item), current_of(items, flow_item)).map(|ratio| ratio * 365.0)
}

// ---------------------------------------------------------------------
// financial_trend
// ---------------------------------------------------------------------

pub struct FinancialTrendReduction;

impl Reduction for FinancialTrendReduction {
    fn category(&self) -> AgentCategory {
        AgentCategory::FinancialTrend
    }

    fn reduce(&self, ctx: &AgentContext) -> Value {
        let items = items(ctx);
        let revenue_growth = opt_growth(items, "Revenue");
        let net_income_growth = opt_growth(items, "Net Income");

        let seasonal_tags: Vec<&'static str> = Vec::new();

        json!({
            "revenue_yoy_growth_percent": revenue_growth,
            "net_income_yoy_growth_percent": net_income_growth,
            "seasonal_tags": seasonal_tags,
            // `FinancialLineItem` only carries current/prior (two periods);
            // CAGR needs >=3 to be meaningful, so it is always
            // unavailable from this shape alone.
            "cagr_percent": Value::Null,
        })
    }
}

fn opt_growth(items: &[FinancialLineItem], name: &str) -> Option<f64> {
    let item = find(items, name)?;
    if item.prior == 0.0 {
        None
    } else {
        Some((item.current - item.prior) / item.prior * 100.0)
    }
}

// ---------------------------------------------------------------------
// risk
// ---------------------------------------------------------------------

pub struct RiskReduction;

impl Reduction for RiskReduction {
    fn category(&self) -> AgentCategory {
        AgentCategory::Risk
    }

    fn reduce(&self, ctx: &AgentContext) -> Value {
        let items = items(ctx);
        let debt_to_equity = opt_div(current_of(items, "Total Liabilities"), current_of(items, "Total Equity"));
        let interest_coverage = opt_div(current_of(items, "EBIT"), current_of(items, "Interest Expense"));
        let current_ratio = opt_div(current_of(items, "Current Assets"), current_of(items, "Current Liabilities"));

        let mut score = 1.0;
        let mut early_warnings = Vec::new();

        if let Some(d) = debt_to_equity {
            if d > 2.0 {
                score += 4.0;
                early_warnings.push("debt_to_equity_above_2.0");
            } else if d > 1.0 {
                score += 2.0;
            }
        }
        if let Some(c) = interest_coverage {
            if c < 1.5 {
                score += 3.0;
                early_warnings.push("interest_coverage_below_1.5");
            } else if c < 3.0 {
                score += 1.0;
            }
        }
        if let Some(r) = current_ratio {
            if r < 1.0 {
                score += 2.0;
                early_warnings.push("current_ratio_below_1.0");
            }
        }

        let compliance_checklist = json!({
            "has_debt_to_equity": debt_to_equity.is_some(),
            "has_interest_coverage": interest_coverage.is_some(),
            "has_current_ratio": current_ratio.is_some(),
        });

        json!({
            "risk_score": clip(score, 1.0, 10.0),
            "debt_to_equity": debt_to_equity,
            "interest_coverage": interest_coverage,
            "current_ratio": current_ratio,
            "early_warning_indicators": early_warnings,
            "compliance_checklist": compliance_checklist,
        })
    }
}

// ---------------------------------------------------------------------
// efficiency
// ---------------------------------------------------------------------

pub struct EfficiencyReduction;

impl Reduction for EfficiencyReduction {
    fn category(&self) -> AgentCategory {
        AgentCategory::Efficiency
    }

    fn reduce(&self, ctx: &AgentContext) -> Value {
        let items = items(ctx);
        let asset_turnover = opt_div(current_of(items, "Revenue"), current_of(items, "Total Assets"));
        let dso = days_metric(items, "Accounts Receivable", "Revenue");
        let dio = days_metric(items, "Inventory", "COGS");
        let dpo = days_metric(items, "Accounts Payable", "COGS");

        // Targets are illustrative industry-neutral midpoints; the
        // bottleneck is whichever tracked component sits farthest (in
        // absolute days) from its own target.
        let targets = [("dso", dso, 45.0), ("dio", dio, 60.0), ("dpo", dpo, 45.0)];
        let bottleneck = targets
            .iter()
            .filter_map(|(name, value, target)| value.map(|v| (*name, (v - target).abs())))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .map(|(name, _)| name);

        let components_present = targets.iter().filter(|(_, v, _)| v.is_some()).count() + usize::from(asset_turnover.is_some());
        let score = if components_present == 0 {
            0.0
        } else {
            clip(asset_turnover.unwrap_or(0.0) * 25.0, 0.0, 100.0)
        };

        json!({
            "asset_turnover": asset_turnover,
            "days_sales_outstanding": dso,
            "days_inventory_outstanding": dio,
            "days_payable_outstanding": dpo,
            "efficiency_score": score,
            "bottleneck": bottleneck,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::PreRetrieved;
    use finsight_core::{EntityIdType, StatementKind, UploadId};

    fn ctx(items: Vec<FinancialLineItem>) -> AgentContext {
        AgentContext {
            upload_id: UploadId::new_v4(),
            pre_retrieved: PreRetrieved::Financial {
                company: "Acme Co".to_string(),
                period: "2026-Q1".to_string(),
                line_items: items,
            },
            cached_analysis: None,
            retrieval_was_filtered: false,
        }
    }

    #[test]
    fn ratio_reduction_returns_null_not_infinity_on_zero_denominator() {
        let items = vec![FinancialLineItem::new(
            "Current Assets",
            StatementKind::BalanceSheet,
            "assets.current",
            1000.0,
            900.0,
        )];
        let reduction = RatioReduction.reduce(&ctx(items));
        assert_eq!(reduction["current_ratio"], Value::Null);
    }

    #[test]
    fn risk_score_is_clipped_to_1_through_10() {
        let items = vec![
            FinancialLineItem::new("Total Liabilities", StatementKind::BalanceSheet, "liabilities", 900.0, 800.0),
            FinancialLineItem::new("Total Equity", StatementKind::BalanceSheet, "equity", 100.0, 100.0),
        ];
        let reduction = RiskReduction.reduce(&ctx(items));
        let score = reduction["risk_score"].as_f64().unwrap();
        assert!((1.0..=10.0).contains(&score));
    }

    #[test]
    fn financial_trend_has_no_cagr_with_only_two_periods() {
        let reduction = FinancialTrendReduction.reduce(&ctx(Vec::new()));
        assert_eq!(reduction["cagr_percent"], Value::Null);
    }
}
