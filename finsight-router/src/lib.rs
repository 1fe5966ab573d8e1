//! Query Understander & Router: turns a free-text query
//! into a `QueryIntent`, combining a small classifier model with a
//! deterministic keyword/regex fallback.

mod filters;

use chrono::NaiveDate;
use finsight_core::{
    AgentCategory, DocumentType, QueryFilters, QueryIntent, QueryType, RouterError, UploadId,
};
use finsight_llm::{GenerateRequest, LlmClient};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Raw shape the classifier model is asked to emit.
#[derive(Debug, Clone, Deserialize)]
struct ClassifierOutput {
    query_type: QueryType,
    confidence: f32,
    #[serde(default)]
    search_terms: Vec<String>,
}

/// Scans `raw` for the first balanced `{...}` span — tracking brace depth
/// and stopping at the close that brings it back to zero — rather than
/// greedily spanning to the last `}` in the string, which would swallow
/// any brace-delimited text the model appended after the JSON object.
fn first_balanced_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in raw[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&raw[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Scans `raw` for the first balanced JSON object and attempts to decode
/// it as a [`ClassifierOutput`].
fn coerce_classifier_output(raw: &str) -> Option<ClassifierOutput> {
    let candidate = first_balanced_json_object(raw)?;
    serde_json::from_str(candidate).ok()
}

/// Deterministic fallback used when the classifier's output cannot be
/// coerced into JSON: matches domain keywords against each `QueryType`'s
/// own vocabulary. Confidence is always pinned to `0.5`.
fn keyword_fallback_query_type(query: &str, document_type: DocumentType) -> QueryType {
    let lower = query.to_lowercase();
    let hits: &[(&str, QueryType)] = match document_type {
        DocumentType::Transactions => &[
            ("gosi", QueryType::Expense),
            ("qiwa", QueryType::Expense),
            ("sadad", QueryType::Expense),
            ("rent", QueryType::Expense),
            ("fee", QueryType::Fee),
            ("charge", QueryType::Fee),
            ("salary", QueryType::Income),
            ("income", QueryType::Income),
            ("budget", QueryType::Budget),
            ("saving", QueryType::Budget),
            ("trend", QueryType::TrendAnalysis),
            ("find", QueryType::TransactionSearch),
            ("search", QueryType::TransactionSearch),
            ("show me", QueryType::TransactionSearch),
        ],
        DocumentType::Financial => &[
            ("ratio", QueryType::RatioAnalysis),
            ("leverage", QueryType::RiskAssessment),
            ("overleveraged", QueryType::RiskAssessment),
            ("risk", QueryType::RiskAssessment),
            ("profit", QueryType::ProfitabilityAnalysis),
            ("margin", QueryType::ProfitabilityAnalysis),
            ("liquidity", QueryType::LiquidityAnalysis),
            ("cash", QueryType::LiquidityAnalysis),
            ("efficiency", QueryType::EfficiencyAnalysis),
            ("turnover", QueryType::EfficiencyAnalysis),
            ("trend", QueryType::TrendAnalysis),
            ("growth", QueryType::TrendAnalysis),
        ],
    };
    hits.iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, query_type)| *query_type)
        .unwrap_or_else(|| match document_type {
            DocumentType::Transactions => QueryType::Expense,
            DocumentType::Financial => QueryType::RatioAnalysis,
        })
}

/// Stateless per call.
pub struct QueryUnderstander {
    llm: Arc<dyn LlmClient>,
    router_model_id: String,
    classifier_timeout: Duration,
    confidence_floor: f32,
}

impl QueryUnderstander {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        router_model_id: impl Into<String>,
        classifier_timeout: Duration,
        confidence_floor: f32,
    ) -> Self {
        Self {
            llm,
            router_model_id: router_model_id.into(),
            classifier_timeout,
            confidence_floor,
        }
    }

    /// Transforms `query` into a `QueryIntent`. `reference_date` anchors
    /// relative date extraction and `today`/`yesterday`/`last month` should
    /// be computed from the caller's notion of "now".
    pub async fn understand(
        &self,
        query: &str,
        document_type: DocumentType,
        upload_id: UploadId,
        reference_date: NaiveDate,
    ) -> Result<QueryIntent, RouterError> {
        let request = GenerateRequest::new(self.router_model_id.clone(), classifier_prompt(query, document_type))
            .with_think(false)
            .with_max_tokens(256)
            .with_temperature(0.0);

        let (query_type, confidence, search_terms) =
            match self.llm.generate(request, self.classifier_timeout).await {
                Ok(raw) => match coerce_classifier_output(&raw) {
                    Some(output) => (output.query_type, output.confidence, output.search_terms),
                    None => (keyword_fallback_query_type(query, document_type), 0.5, Vec::new()),
                },
                // An unreachable classifier is not fatal to routing: the
                // keyword fallback is authoritative.
                Err(_) => (keyword_fallback_query_type(query, document_type), 0.5, Vec::new()),
            };

        let filters = self.extract_filters(query, reference_date)?;

        let primary_agent = if confidence < self.confidence_floor {
            QueryType::conservative_default(document_type)
        } else {
            query_type.primary_agent()
        };

        Ok(QueryIntent {
            query_type,
            filters,
            upload_id,
            primary_agent,
            secondary_agent: None,
            confidence,
            search_terms,
        })
    }

    fn extract_filters(&self, query: &str, reference_date: NaiveDate) -> Result<QueryFilters, RouterError> {
        let date_range = filters::extract_date_range(query, reference_date);
        if let Some(range) = date_range {
            if range.is_inverted() {
                return Err(RouterError::InvertedRange { field: "date_range".to_string() });
            }
        }
        let amount_range = filters::extract_amount_range(query);
        if let Some(range) = amount_range {
            if range.is_inverted() {
                return Err(RouterError::InvertedRange { field: "amount_range".to_string() });
            }
        }
        let merchants = filters::extract_merchants(query);
        let keywords = filters::extract_keywords(query);

        Ok(QueryFilters {
            date_range,
            amount_range,
            merchants,
            keywords,
            direction: None,
        })
    }
}

fn classifier_prompt(query: &str, document_type: DocumentType) -> String {
    format!(
        "Classify the following {document_type} query into one of the known query types. \
         Respond with a single JSON object: {{\"query_type\": string, \"confidence\": number, \"search_terms\": [string]}}.\n\nQuery: {query}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_a_json_object_embedded_in_prose() {
        let raw = "Sure, here you go: {\"query_type\": \"expense\", \"confidence\": 0.91, \"search_terms\": [\"gosi\"]} thanks!";
        let output = coerce_classifier_output(raw).unwrap();
        assert_eq!(output.query_type, QueryType::Expense);
        assert!((output.confidence - 0.91).abs() < 1e-6);
    }

    #[test]
    fn stops_at_the_first_balanced_close_even_with_a_trailing_brace_fragment() {
        let raw = "{\"query_type\": \"expense\", \"confidence\": 0.91, \"search_terms\": [\"gosi\"]} \
                   by the way here's an example object too: {\"not\": \"this one\"}";
        let output = coerce_classifier_output(raw).unwrap();
        assert_eq!(output.query_type, QueryType::Expense);
        assert!((output.confidence - 0.91).abs() < 1e-6);
    }

    #[test]
    fn unparseable_output_falls_back_to_keyword_match() {
        assert_eq!(
            keyword_fallback_query_type("show me GOSI payments", DocumentType::Transactions),
            QueryType::Expense
        );
    }

    #[test]
    fn overleveraged_falls_back_to_risk_assessment() {
        assert_eq!(
            keyword_fallback_query_type("Am I overleveraged?", DocumentType::Financial),
            QueryType::RiskAssessment
        );
    }
}
