//! The uniform agent contract: shared two-call insights pattern and
//! one-call chat pattern, with per-agent behavior supplied by a
//! [`Reduction`] implementation rather than a subclass — a table from
//! agent-category to an implementation, with shared behavior living in a
//! single reducer and prompt-template helper.

use async_trait::async_trait;
use finsight_core::{AgentCategory, AgentResult, FinancialLineItem, LlmConfig, LlmError, Mode, SourceRecord, Transaction, UploadId};
use finsight_llm::{GenerateRequest, LlmClient};
use serde_json::Value;
use std::collections::HashMap;

/// The data an agent runs over, already scoped to a single upload by the
/// time it reaches the agent (retrieval happened in the Orchestrator or
/// the Router's filtered-search step).
#[derive(Debug, Clone)]
pub enum PreRetrieved {
    Transactions(Vec<Transaction>),
    Financial {
        company: String,
        period: String,
        line_items: Vec<FinancialLineItem>,
    },
}

impl PreRetrieved {
    pub fn as_transactions(&self) -> &[Transaction] {
        match self {
            PreRetrieved::Transactions(t) => t,
            PreRetrieved::Financial { .. } => &[],
        }
    }

    pub fn as_line_items(&self) -> &[FinancialLineItem] {
        match self {
            PreRetrieved::Financial { line_items, .. } => line_items,
            PreRetrieved::Transactions(_) => &[],
        }
    }
}

/// Everything an agent needs beyond the query text itself.
pub struct AgentContext {
    pub upload_id: UploadId,
    pub pre_retrieved: PreRetrieved,
    /// Chat mode only; the most recent insights run's reduction for this
    /// agent's category, used as background when no filters narrowed
    /// retrieval.
    pub cached_analysis: Option<Value>,
    /// Chat mode only: `true` when the Router's filters produced a
    /// narrower `pre_retrieved` slice than the full cached context, in
    /// which case the prompt must instruct the model to answer from the
    /// filtered subset rather than the cached analysis.
    pub retrieval_was_filtered: bool,
}

/// Per-agent behavior: category identity, the deterministic reduction, and
/// the three prompt templates the shared executor calls into.
pub trait Reduction: Send + Sync {
    fn category(&self) -> AgentCategory;

    /// Deterministic, language-native computation over `ctx.pre_retrieved`.
    /// Must be byte-identical across runs given the same input slice.
    fn reduce(&self, ctx: &AgentContext) -> Value;

    /// Up to 5 exemplar records surfaced alongside an agent's answer.
    fn sources(&self, ctx: &AgentContext) -> Vec<SourceRecord> {
        match &ctx.pre_retrieved {
            PreRetrieved::Transactions(items) => {
                items.iter().take(5).cloned().map(SourceRecord::Transaction).collect()
            }
            PreRetrieved::Financial { line_items, .. } => {
                line_items.iter().take(5).cloned().map(SourceRecord::LineItem).collect()
            }
        }
    }

    /// Step 1 of insights mode: the structured thinking prompt (seven
    /// aspects).
    fn thinking_prompt(&self, query: &str, ctx: &AgentContext) -> String {
        format!(
            "You are the {category} financial analysis agent. Think deeply about the \
             following request before answering. Consider: (1) the relevant time period, \
             (2) relevant categories, (3) the type of analysis required, (4) business \
             context, (5) what data is required to answer well, (6) open questions you \
             cannot resolve from the data alone, (7) the shape of a useful output.\n\n\
             Request: {query}\n\nRecord count available: {count}",
            category = self.category(),
            count = record_count(ctx),
        )
    }

    /// Step 3 of insights mode: the final narrative prompt, given both the
    /// hidden reasoning and the reduction's tabular summary.
    fn final_prompt(&self, query: &str, thinking: &str, reduction: &Value) -> String {
        format!(
            "Using your own prior reasoning and the computed summary below, write a clear, \
             user-facing answer to: {query}\n\nPrior reasoning:\n{thinking}\n\nComputed \
             summary (JSON):\n{reduction}"
        )
    }

    /// Chat mode's single prompt. `filtered` mirrors
    /// `ctx.retrieval_was_filtered`.
    fn chat_prompt(&self, query: &str, ctx: &AgentContext) -> String {
        if ctx.retrieval_was_filtered {
            format!(
                "Answer strictly from the filtered data below; the cached analysis is \
                 background only.\n\nQuestion: {query}\n\nFiltered data: {data}\n\nCached \
                 analysis (background): {cached}",
                data = filtered_records_json(ctx),
                cached = ctx.cached_analysis.clone().unwrap_or(Value::Null),
            )
        } else {
            format!(
                "Answer using the cached analysis as authoritative context.\n\nQuestion: \
                 {query}\n\nCached analysis: {cached}",
                cached = ctx.cached_analysis.clone().unwrap_or(Value::Null),
            )
        }
    }
}

fn record_count(ctx: &AgentContext) -> usize {
    match &ctx.pre_retrieved {
        PreRetrieved::Transactions(t) => t.len(),
        PreRetrieved::Financial { line_items, .. } => line_items.len(),
    }
}

/// The actual filtered records, not just their count, so the chat-mode
/// call can answer strictly from what retrieval narrowed down to.
fn filtered_records_json(ctx: &AgentContext) -> Value {
    match &ctx.pre_retrieved {
        PreRetrieved::Transactions(t) => serde_json::to_value(t).unwrap_or(Value::Null),
        PreRetrieved::Financial { line_items, .. } => serde_json::to_value(line_items).unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use finsight_core::{Direction, EntityIdType, UploadId};

    struct DummyReduction;
    impl Reduction for DummyReduction {
        fn category(&self) -> AgentCategory {
            AgentCategory::Expense
        }
        fn reduce(&self, _ctx: &AgentContext) -> Value {
            Value::Null
        }
    }

    #[test]
    fn filtered_chat_prompt_carries_the_actual_records_not_just_a_count() {
        let ctx = AgentContext {
            upload_id: UploadId::nil(),
            pre_retrieved: PreRetrieved::Transactions(vec![Transaction {
                date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                description: "GOSI Monthly".to_string(),
                amount: -19_000.0,
                balance: None,
                direction: Direction::Debit,
                category: None,
                reference: None,
            }]),
            cached_analysis: None,
            retrieval_was_filtered: true,
        };

        let prompt = DummyReduction.chat_prompt("show me GOSI payments over 15000", &ctx);
        assert!(prompt.contains("GOSI Monthly"));
        assert!(prompt.contains("-19000") || prompt.contains("-19000.0"));
        assert!(!prompt.contains("Filtered data: 1"));
    }
}

/// Runs the uniform contract for any [`Reduction`]:
/// `Execute(query, mode, upload_id, ctx) -> AgentResult`.
#[async_trait]
pub trait Agent: Send + Sync {
    fn category(&self) -> AgentCategory;

    async fn execute(
        &self,
        query: &str,
        mode: Mode,
        ctx: &AgentContext,
        llm: &dyn LlmClient,
        config: &LlmConfig,
    ) -> Result<AgentResult, LlmError>;
}

/// Generic executor shared by every agent: drives the two-call insights
/// pattern or the one-call chat pattern against a [`Reduction`].
pub struct ReductionAgent<R: Reduction> {
    pub reduction: R,
}

impl<R: Reduction> ReductionAgent<R> {
    pub fn new(reduction: R) -> Self {
        Self { reduction }
    }
}

#[async_trait]
impl<R: Reduction> Agent for ReductionAgent<R> {
    fn category(&self) -> AgentCategory {
        self.reduction.category()
    }

    async fn execute(
        &self,
        query: &str,
        mode: Mode,
        ctx: &AgentContext,
        llm: &dyn LlmClient,
        config: &LlmConfig,
    ) -> Result<AgentResult, LlmError> {
        match mode {
            Mode::Insights => {
                let thinking_timeout = std::time::Duration::from_secs(config.thinking_timeout_seconds);
                let thinking_request = GenerateRequest::new(config.reasoning_model_id.clone(), self.reduction.thinking_prompt(query, ctx))
                    .with_think(true)
                    .with_max_tokens(2048);
                let thinking = llm.generate(thinking_request, thinking_timeout).await?;

                let analysis = self.reduction.reduce(ctx);

                let final_request = GenerateRequest::new(
                    config.reasoning_model_id.clone(),
                    self.reduction.final_prompt(query, &thinking, &analysis),
                )
                .with_think(true)
                .with_max_tokens(1024);
                let final_answer = llm.generate(final_request, thinking_timeout).await?;

                Ok(AgentResult {
                    final_answer,
                    analysis,
                    thinking: Some(thinking),
                    mode: Mode::Insights,
                    used_cache: false,
                    sources: self.reduction.sources(ctx),
                    statistics: HashMap::new(),
                })
            }
            Mode::Chat => {
                let chat_timeout = std::time::Duration::from_secs(config.chat_timeout_seconds);
                let request = GenerateRequest::new(config.reasoning_model_id.clone(), self.reduction.chat_prompt(query, ctx))
                    .with_think(false)
                    .with_max_tokens(512);
                let final_answer = llm.generate(request, chat_timeout).await?;

                Ok(AgentResult {
                    final_answer,
                    analysis: ctx.cached_analysis.clone().unwrap_or(Value::Null),
                    thinking: None,
                    mode: Mode::Chat,
                    used_cache: true,
                    sources: self.reduction.sources(ctx),
                    statistics: HashMap::new(),
                })
            }
        }
    }
}
