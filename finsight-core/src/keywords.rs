//! Domain vocabulary, externalized as data rather than code.
//!
//! These tables back both the Router's keyword-filter extraction and the
//! expense/fee agents' categorization reductions. The exact category
//! boundaries and "typical fee" amounts are an explicit implementer
//! choice — see DESIGN.md for the rationale.

/// Closed vocabulary of domain terms the Router recognizes as keyword
/// filters.
pub const DOMAIN_KEYWORDS: &[&str] = &[
    "payroll", "gosi", "qiwa", "sadad", "swift", "atm", "salary", "rent", "zakat", "vat",
    "utilities", "electricity", "water", "internet", "insurance", "loan", "installment",
];

/// One named expense/fee bucket and the keywords (case-insensitive,
/// substring match) that assign a transaction description to it.
pub struct CategoryRule {
    pub category: &'static str,
    pub keywords: &'static [&'static str],
}

/// Expense-agent categorization table. Checked in order; the first
/// matching rule wins. Anything matching none of these is the
/// `uncategorized` residual bucket.
pub const EXPENSE_CATEGORIES: &[CategoryRule] = &[
    CategoryRule {
        category: "government_compliance",
        keywords: &["gosi", "qiwa", "sadad", "zakat", "vat"],
    },
    CategoryRule {
        category: "operational",
        keywords: &["rent", "office", "utilities", "electricity", "water", "internet", "supplies"],
    },
    CategoryRule {
        category: "payroll",
        keywords: &["salary", "payroll"],
    },
    CategoryRule {
        category: "banking_fees",
        keywords: &["fee", "charge", "swift", "atm"],
    },
    CategoryRule {
        category: "debt_service",
        keywords: &["loan", "installment"],
    },
];

/// The residual bucket name for debits matching no `EXPENSE_CATEGORIES`
/// rule.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Amounts (SAR, absolute value) treated as "typical" bank/processing fees
/// for the `fee` agent's heuristic: `keyword OR (amount ∈ typical-fee-set
/// AND known-bank token)`. Chosen to match common local transfer/card/ATM
/// fee tiers.
pub const TYPICAL_FEE_AMOUNTS: &[f64] = &[5.0, 10.0, 15.0, 25.0, 50.0, 75.0, 100.0];

/// Tolerance (SAR) used when matching a transaction amount against
/// `TYPICAL_FEE_AMOUNTS`.
pub const TYPICAL_FEE_TOLERANCE: f64 = 1.0;

/// Tokens that identify a description as bank/processor-originated, used
/// alongside `TYPICAL_FEE_AMOUNTS` in the `fee` agent's heuristic.
pub const KNOWN_BANK_TOKENS: &[&str] = &[
    "swift", "atm", "bank", "snb", "al rajhi", "riyad bank", "sabb", "alinma", "anb",
];

/// Case-insensitive substring match helper shared by the categorization
/// tables above.
pub fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let haystack = haystack.to_lowercase();
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Categorize a free-text description using `EXPENSE_CATEGORIES`, falling
/// back to [`UNCATEGORIZED`].
pub fn categorize(description: &str) -> &'static str {
    for rule in EXPENSE_CATEGORIES {
        if contains_any(description, rule.keywords) {
            return rule.category;
        }
    }
    UNCATEGORIZED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gosi_is_government_compliance() {
        assert_eq!(categorize("GOSI Monthly"), "government_compliance");
    }

    #[test]
    fn office_rent_is_operational() {
        assert_eq!(categorize("Office Rent"), "operational");
    }

    #[test]
    fn unrecognized_description_is_uncategorized() {
        assert_eq!(categorize("Client INV-7"), UNCATEGORIZED);
    }
}
