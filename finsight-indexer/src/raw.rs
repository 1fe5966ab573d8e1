//! Wire shapes accepted from external parsers. These are intentionally
//! loose (plain strings for dates, an open `type` discriminator) —
//! validation and normalization happen once, in [`super::Indexer`], not
//! here.

use serde::Deserialize;
use std::collections::HashMap;

/// One parsed bank transaction record, prior to validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    /// RFC3339 day, e.g. `"2024-01-10"`.
    pub date: String,
    pub description: String,
    pub amount: f64,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCompanyInfo {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPeriods {
    pub current: String,
    pub prior: String,
}

/// A single measured line item before it is resolved into a
/// [`finsight_core::FinancialLineItem`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawLeaf {
    pub current: f64,
    pub prior: f64,
}

/// A parsed financial statement: `section -> item name -> {current, prior}`
/// within each of the four statement kinds.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFinancialStatement {
    pub company_info: RawCompanyInfo,
    pub periods: RawPeriods,
    #[serde(default)]
    pub balance_sheet: HashMap<String, HashMap<String, RawLeaf>>,
    #[serde(default)]
    pub income_statement: HashMap<String, HashMap<String, RawLeaf>>,
    #[serde(default)]
    pub cash_flow: HashMap<String, HashMap<String, RawLeaf>>,
    #[serde(default)]
    pub ratios: HashMap<String, HashMap<String, RawLeaf>>,
}
