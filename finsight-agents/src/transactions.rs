//! The six agents that run over transaction data.

use crate::contract::{AgentContext, PreRetrieved, Reduction};
use crate::math::{clip, coefficient_of_variation, linear_fit, z_scores};
use chrono::NaiveDate;
use finsight_core::{keywords, AgentCategory, Direction, Transaction};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

fn transactions(ctx: &AgentContext) -> &[Transaction] {
    ctx.pre_retrieved.as_transactions()
}

// ---------------------------------------------------------------------
// expense
// ---------------------------------------------------------------------

pub struct ExpenseReduction;

impl Reduction for ExpenseReduction {
    fn category(&self) -> AgentCategory {
        AgentCategory::Expense
    }

    fn reduce(&self, ctx: &AgentContext) -> Value {
        let debits: Vec<&Transaction> = transactions(ctx)
            .iter()
            .filter(|t| t.direction == Direction::Debit)
            .collect();

        let mut by_category: HashMap<&'static str, f64> = HashMap::new();
        for t in &debits {
            let category = keywords::categorize(&t.description);
            *by_category.entry(category).or_insert(0.0) += t.magnitude();
        }
        let total: f64 = by_category.values().sum();

        let mut categories = Map::new();
        for (name, sum) in &by_category {
            let percent = if total == 0.0 { 0.0 } else { sum / total * 100.0 };
            categories.insert(
                name.to_string(),
                json!({ "total": round2(*sum), "percent_of_total": round2(percent) }),
            );
        }
        let categories = Value::Object(categories);

        json!({
            "total": round2(total),
            "transaction_count": debits.len(),
            "categories": categories,
        })
    }
}

// ---------------------------------------------------------------------
// income
// ---------------------------------------------------------------------

pub struct IncomeReduction;

impl Reduction for IncomeReduction {
    fn category(&self) -> AgentCategory {
        AgentCategory::Income
    }

    fn reduce(&self, ctx: &AgentContext) -> Value {
        let credits: Vec<&Transaction> = transactions(ctx)
            .iter()
            .filter(|t| t.direction == Direction::Credit)
            .collect();
        let total: f64 = credits.iter().map(|t| t.amount).sum();

        let salary_events = detect_salary_events(&credits);
        let monthly_totals = monthly_totals(&credits);
        let stability_score = coefficient_of_variation(&monthly_totals)
            .map(|cv| clip(100.0 * (1.0 - cv), 0.0, 100.0))
            .unwrap_or(0.0);

        json!({
            "total": round2(total),
            "transaction_count": credits.len(),
            "salary_events": salary_events,
            "stability_score": round2(stability_score),
        })
    }
}

fn detect_salary_events(credits: &[&Transaction]) -> Vec<Value> {
    let mut events = Vec::new();
    let mut sorted = credits.to_vec();
    sorted.sort_by_key(|t| t.date);
    for window in sorted.windows(2) {
        let (a, b) = (window[0], window[1]);
        if (a.amount - b.amount).abs() < 0.01 {
            let days = (b.date - a.date).num_days();
            let cadence = if (25..=35).contains(&days) {
                Some("monthly")
            } else if days == 14 {
                Some("biweekly")
            } else {
                None
            };
            if let Some(cadence) = cadence {
                events.push(json!({
                    "amount": round2(a.amount),
                    "first_date": a.date,
                    "second_date": b.date,
                    "cadence": cadence,
                }));
            }
        }
    }
    events
}

fn monthly_totals(credits: &[&Transaction]) -> Vec<f64> {
    let mut by_month: HashMap<(i32, u32), f64> = HashMap::new();
    for t in credits {
        use chrono::Datelike;
        *by_month.entry((t.date.year(), t.date.month())).or_insert(0.0) += t.amount;
    }
    let mut months: Vec<(i32, u32)> = by_month.keys().copied().collect();
    months.sort();
    months.into_iter().map(|m| by_month[&m]).collect()
}

// ---------------------------------------------------------------------
// fee
// ---------------------------------------------------------------------

pub struct FeeReduction;

impl Reduction for FeeReduction {
    fn category(&self) -> AgentCategory {
        AgentCategory::Fee
    }

    fn reduce(&self, ctx: &AgentContext) -> Value {
        let fees: Vec<&Transaction> = transactions(ctx).iter().filter(|t| is_fee(t)).collect();
        let total: f64 = fees.iter().map(|t| t.magnitude()).sum();

        // Recurring monthly fee signature: equal magnitude seen on >=2
        // occurrences with ~30-day spacing, same as the income agent's
        // salary detector but over the fee subset.
        let mut sorted = fees.clone();
        sorted.sort_by_key(|t| t.date);
        let mut recurring_monthly_total = 0.0;
        for window in sorted.windows(2) {
            let (a, b) = (window[0], window[1]);
            if (a.magnitude() - b.magnitude()).abs() < 0.01 {
                let days = (b.date - a.date).num_days();
                if (25..=35).contains(&days) {
                    recurring_monthly_total += a.magnitude();
                }
            }
        }
        let annualized_savings = recurring_monthly_total * 12.0;

        let owned_fees: Vec<Transaction> = fees.iter().map(|t| (*t).clone()).collect();
        let anomaly_indices = detect_anomalies(&owned_fees);
        let anomalies: Vec<Value> = anomaly_indices
            .iter()
            .map(|&i| {
                json!({
                    "date": owned_fees[i].date.to_string(),
                    "description": owned_fees[i].description,
                    "amount": round2(owned_fees[i].magnitude()),
                })
            })
            .collect();

        json!({
            "total": round2(total),
            "fee_count": fees.len(),
            "annualized_savings_if_eliminated": round2(annualized_savings),
            "anomalies": anomalies,
        })
    }
}

fn is_fee(t: &Transaction) -> bool {
    let description = t.description.to_lowercase();
    let has_fee_keyword = description.contains("fee") || description.contains("charge");
    let is_typical_amount = keywords::TYPICAL_FEE_AMOUNTS
        .iter()
        .any(|amount| (t.magnitude() - *amount).abs() <= keywords::TYPICAL_FEE_TOLERANCE);
    let is_known_bank = keywords::contains_any(&t.description, keywords::KNOWN_BANK_TOKENS);
    has_fee_keyword || (is_typical_amount && is_known_bank)
}

// ---------------------------------------------------------------------
// budget
// ---------------------------------------------------------------------

pub struct BudgetReduction;

impl Reduction for BudgetReduction {
    fn category(&self) -> AgentCategory {
        AgentCategory::Budget
    }

    fn reduce(&self, ctx: &AgentContext) -> Value {
        let items = transactions(ctx);
        let credits: f64 = items.iter().filter(|t| t.direction == Direction::Credit).map(|t| t.amount).sum();
        let debits: f64 = items
            .iter()
            .filter(|t| t.direction == Direction::Debit)
            .map(|t| t.magnitude())
            .sum();
        let net = credits - debits;
        let savings_rate = if credits == 0.0 { 0.0 } else { net / credits };
        let expense_ratio = if credits == 0.0 { 0.0 } else { debits / credits };

        let category_bands = budget_category_bands(items);
        let score = budget_health_score(savings_rate, expense_ratio, &category_bands);

        json!({
            "net": round2(net),
            "credits": round2(credits),
            "debits": round2(debits),
            "savings_rate": round2(savings_rate * 100.0),
            "expense_ratio": round2(expense_ratio * 100.0),
            "category_bands": category_bands,
            "health_score": score,
        })
    }
}

/// Bands each expense category by its share of total debits: `excellent`
/// (<10%), `good` (<20%), `warning` (<35%), `critical` (>=35%).
fn budget_category_bands(items: &[Transaction]) -> HashMap<&'static str, &'static str> {
    let debits: Vec<&Transaction> = items.iter().filter(|t| t.direction == Direction::Debit).collect();
    let total: f64 = debits.iter().map(|t| t.magnitude()).sum();
    let mut by_category: HashMap<&'static str, f64> = HashMap::new();
    for t in &debits {
        *by_category.entry(keywords::categorize(&t.description)).or_insert(0.0) += t.magnitude();
    }
    by_category
        .into_iter()
        .map(|(category, sum)| {
            let share = if total == 0.0 { 0.0 } else { sum / total };
            let band = if share < 0.10 {
                "excellent"
            } else if share < 0.20 {
                "good"
            } else if share < 0.35 {
                "warning"
            } else {
                "critical"
            };
            (category, band)
        })
        .collect()
}

/// The budget health-score ladder: base 50, additive/subtractive rules,
/// clipped to `[0, 100]`.
fn budget_health_score(savings_rate: f64, expense_ratio: f64, bands: &HashMap<&'static str, &'static str>) -> f64 {
    let mut score = 50.0;

    if savings_rate >= 0.20 {
        score += 30.0;
    } else if savings_rate >= 0.10 {
        score += 20.0;
    } else if savings_rate >= 0.05 {
        score += 10.0;
    } else if savings_rate < 0.0 {
        score -= 20.0;
    }

    if expense_ratio <= 0.70 {
        score += 20.0;
    } else if expense_ratio <= 0.85 {
        score += 10.0;
    } else if expense_ratio > 1.0 {
        score -= 10.0;
    }

    for band in bands.values() {
        match *band {
            "excellent" | "good" => score += 7.0,
            "warning" => score += 3.0,
            _ => {}
        }
    }

    clip(score, 0.0, 100.0)
}

// ---------------------------------------------------------------------
// trend
// ---------------------------------------------------------------------

pub struct TrendReduction;

impl Reduction for TrendReduction {
    fn category(&self) -> AgentCategory {
        AgentCategory::Trend
    }

    fn reduce(&self, ctx: &AgentContext) -> Value {
        let items = transactions(ctx);
        if items.len() < 2 {
            return json!({
                "direction": "insufficient_data",
                "monthly_totals": [],
                "slope_sar_per_month": null,
            });
        }

        let debits: Vec<&Transaction> = items.iter().filter(|t| t.direction == Direction::Debit).collect();
        let mut by_month: HashMap<(i32, u32), f64> = HashMap::new();
        for t in &debits {
            use chrono::Datelike;
            *by_month.entry((t.date.year(), t.date.month())).or_insert(0.0) += t.magnitude();
        }
        let mut months: Vec<(i32, u32)> = by_month.keys().copied().collect();
        months.sort();
        let totals: Vec<f64> = months.iter().map(|m| by_month[m]).collect();

        if totals.len() < 2 {
            return json!({
                "direction": "insufficient_data",
                "monthly_totals": totals.iter().map(|v| round2(*v)).collect::<Vec<_>>(),
                "slope_sar_per_month": null,
            });
        }

        let (slope, _intercept) = linear_fit(&totals).unwrap();
        let direction = if slope > 100.0 {
            "increasing"
        } else if slope < -100.0 {
            "decreasing"
        } else {
            "stable"
        };

        json!({
            "direction": direction,
            "monthly_totals": totals.iter().map(|v| round2(*v)).collect::<Vec<_>>(),
            "slope_sar_per_month": round2(slope),
        })
    }
}

// ---------------------------------------------------------------------
// transaction_search
// ---------------------------------------------------------------------

pub struct TransactionSearchReduction {
    /// The search terms extracted by the Router; empty when none were
    /// recognized, in which case relevance ranking degrades to recency.
    pub search_terms: Vec<String>,
    pub reference_date: NaiveDate,
}

impl Reduction for TransactionSearchReduction {
    fn category(&self) -> AgentCategory {
        AgentCategory::TransactionSearch
    }

    fn reduce(&self, ctx: &AgentContext) -> Value {
        let items = transactions(ctx);
        let mut scored: Vec<(f64, &Transaction)> = items
            .iter()
            .map(|t| (self.relevance(t), t))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());

        let ranked: Vec<Value> = scored
            .iter()
            .take(20)
            .map(|(score, t)| {
                json!({
                    "date": t.date,
                    "description": t.description,
                    "amount": round2(t.amount),
                    "relevance": round2(*score),
                })
            })
            .collect();

        json!({ "matches": ranked, "match_count": scored.len() })
    }
}

impl TransactionSearchReduction {
    /// Relevance score: `+50 exact, +½·token_ratio, +20 recent (<7d)`,
    /// plus an amount-within-±1 bonus.
    fn relevance(&self, t: &Transaction) -> f64 {
        if self.search_terms.is_empty() {
            return 0.0;
        }
        let description = t.description.to_lowercase();
        let mut score = 0.0;

        let exact_match = self
            .search_terms
            .iter()
            .any(|term| description.contains(&term.to_lowercase()));
        if exact_match {
            score += 50.0;
        }

        let token_ratio = token_overlap_ratio(&description, &self.search_terms);
        score += 0.5 * token_ratio * 100.0;

        for term in &self.search_terms {
            if let Ok(amount) = term.parse::<f64>() {
                if (t.magnitude() - amount).abs() <= 1.0 {
                    score += 20.0;
                }
            }
        }

        let days_old = (self.reference_date - t.date).num_days();
        if (0..7).contains(&days_old) {
            score += 20.0;
        }

        score
    }
}

fn token_overlap_ratio(description: &str, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let desc_tokens: std::collections::HashSet<&str> = description.split_whitespace().collect();
    let matches = terms
        .iter()
        .filter(|term| desc_tokens.contains(term.to_lowercase().as_str()))
        .count();
    matches as f64 / terms.len() as f64
}

/// Anomaly detection shared helper: flags transactions whose magnitude
/// has a z-score above 2.5 within the full transaction set.
pub fn detect_anomalies(items: &[Transaction]) -> Vec<usize> {
    let magnitudes: Vec<f64> = items.iter().map(|t| t.magnitude()).collect();
    z_scores(&magnitudes)
        .into_iter()
        .enumerate()
        .filter(|(_, z)| *z > 2.5)
        .map(|(i, _)| i)
        .collect()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_core::{EntityIdType, SessionId, UploadId};

    fn transaction(date: (i32, u32, u32), description: &str, amount: f64) -> Transaction {
        Transaction {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            description: description.to_string(),
            amount,
            balance: None,
            direction: if amount >= 0.0 { Direction::Credit } else { Direction::Debit },
            category: None,
            reference: None,
        }
    }

    fn ctx(items: Vec<Transaction>) -> AgentContext {
        AgentContext {
            upload_id: UploadId::new_v4(),
            pre_retrieved: PreRetrieved::Transactions(items),
            cached_analysis: None,
            retrieval_was_filtered: false,
        }
    }
    #[allow(dead_code)]
    fn unused_session() -> SessionId {
        SessionId::new_v4()
    }

    #[test]
    fn expense_reduction_matches_the_gosi_scenario() {
        let items = vec![
            transaction((2024, 1, 10), "GOSI Monthly", -19000.0),
            transaction((2024, 2, 10), "GOSI Monthly", -19000.0),
            transaction((2024, 2, 15), "Office Rent", -85000.0),
            transaction((2024, 2, 1), "Client INV-7", 520000.0),
        ];
        let reduction = ExpenseReduction.reduce(&ctx(items));
        assert_eq!(reduction["total"], json!(123000.0));
        assert_eq!(reduction["categories"]["government_compliance"]["total"], json!(38000.0));
        assert_eq!(reduction["categories"]["operational"]["total"], json!(85000.0));
    }

    #[test]
    fn trend_reduction_reports_insufficient_data_for_a_single_transaction() {
        let items = vec![transaction((2024, 1, 10), "GOSI Monthly", -19000.0)];
        let reduction = TrendReduction.reduce(&ctx(items));
        assert_eq!(reduction["direction"], json!("insufficient_data"));
    }

    #[test]
    fn income_reduction_classifies_exact_30_day_spacing_as_monthly() {
        let items = vec![
            transaction((2024, 1, 1), "Salary", 10000.0),
            transaction((2024, 1, 31), "Salary", 10000.0),
        ];
        let reduction = IncomeReduction.reduce(&ctx(items));
        let events = reduction["salary_events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["cadence"], json!("monthly"));
    }

    #[test]
    fn income_reduction_classifies_14_day_spacing_as_biweekly() {
        let items = vec![
            transaction((2024, 1, 1), "Payroll", 5000.0),
            transaction((2024, 1, 15), "Payroll", 5000.0),
        ];
        let reduction = IncomeReduction.reduce(&ctx(items));
        let events = reduction["salary_events"].as_array().unwrap();
        assert_eq!(events[0]["cadence"], json!("biweekly"));
    }

    #[test]
    fn budget_health_score_clips_to_the_0_100_range() {
        let score = budget_health_score(0.30, 0.60, &HashMap::new());
        assert!(score <= 100.0);
    }

    #[test]
    fn fee_reduction_flags_an_unusually_large_fee_as_an_anomaly() {
        let mut items: Vec<Transaction> = (0..7)
            .map(|i| transaction((2024, 1, 1 + i), "Service Fee", -50.0))
            .collect();
        items.push(transaction((2024, 6, 1), "Service Fee", -5000.0));

        let reduction = FeeReduction.reduce(&ctx(items));
        let anomalies = reduction["anomalies"].as_array().unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0]["amount"], json!(5000.0));
        assert_eq!(anomalies[0]["description"], json!("Service Fee"));
    }

    #[test]
    fn empty_transaction_set_produces_zeros_not_errors() {
        let reduction = ExpenseReduction.reduce(&ctx(Vec::new()));
        assert_eq!(reduction["total"], json!(0.0));
        assert_eq!(reduction["transaction_count"], json!(0));
    }
}
