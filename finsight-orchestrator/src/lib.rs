//! The Orchestrator: entry point for every analytical request. Decides
//! between insights mode (full cold analysis, writes the cache) and chat
//! mode (cached context plus optional targeted retrieval), fans agents
//! out, and never surfaces hidden reasoning.

use chrono::Utc;
use finsight_agents::{financial_agents, transaction_agents, Agent, AgentContext, PreRetrieved};
use finsight_cache::SessionCache;
use finsight_core::{
    AgentCategory, AgentResult, CacheError, DocumentType, FinsightConfig, FinsightError,
    FinsightResult, Mode, SessionId, SourceRecord, UploadId,
};
use finsight_llm::LlmClient;
use finsight_router::QueryUnderstander;
use finsight_store::{SearchFilters, SearchQuery, SemanticStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// A full retrieval pass, large enough to capture every document for one
/// upload in the in-memory store's current scale.
const RETRIEVAL_LIMIT: usize = 100_000;

/// `GenerateInsights` response.
#[derive(Debug, Clone)]
pub struct InsightsOutcome {
    pub results: HashMap<AgentCategory, AgentResult>,
    pub cache_expires: chrono::DateTime<Utc>,
}

/// ABI-facing view of a chat turn:
/// `process_chat_query(...) -> {response, agent_used, metadata}`.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub response: String,
    pub agent_used: AgentCategory,
    pub metadata: serde_json::Value,
}

impl ChatResponse {
    fn from_result(agent_used: AgentCategory, result: AgentResult) -> Self {
        Self {
            response: result.final_answer,
            agent_used,
            metadata: result.analysis,
        }
    }
}

pub struct Orchestrator {
    store: Arc<dyn SemanticStore>,
    cache: Arc<SessionCache>,
    llm: Arc<dyn LlmClient>,
    router: QueryUnderstander,
    config: FinsightConfig,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn SemanticStore>, cache: Arc<SessionCache>, llm: Arc<dyn LlmClient>, config: FinsightConfig) -> Self {
        let router = QueryUnderstander::new(
            llm.clone(),
            config.llm.router_model_id.clone(),
            Duration::from_secs(config.llm.chat_timeout_seconds),
            config.router_confidence_floor,
        );
        Self { store, cache, llm, router, config }
    }

    /// `GenerateInsights(session_id, upload_id, document_type) ->
    /// {agent_category: AgentResult}`.
    #[instrument(skip(self), fields(session_id = %session_id, upload_id = %upload_id, document_type = %document_type))]
    pub async fn generate_insights(
        &self,
        session_id: SessionId,
        upload_id: UploadId,
        document_type: DocumentType,
    ) -> FinsightResult<InsightsOutcome> {
        let run = self.run_insights(upload_id, document_type);
        let timeout = Duration::from_secs(self.config.insights_run_timeout_seconds);

        let (results, all_failed) = match tokio::time::timeout(timeout, run).await {
            Ok(outcome) => outcome?,
            Err(_) => {
                tracing::warn!("insights run exceeded the hard timeout; discarding partial results");
                return Err(FinsightError::AllAgentsFailed);
            }
        };

        if all_failed {
            return Err(FinsightError::AllAgentsFailed);
        }

        let now = Utc::now();
        let cached = self.cache.put(session_id, document_type, results.clone(), now).await;

        Ok(InsightsOutcome { results, cache_expires: cached.expires_at })
    }

    async fn run_insights(
        &self,
        upload_id: UploadId,
        document_type: DocumentType,
    ) -> FinsightResult<(HashMap<AgentCategory, AgentResult>, bool)> {
        let (pre_retrieved_by_category, search_terms) = match document_type {
            DocumentType::Transactions => {
                let transactions = self.retrieve_transactions(upload_id).await?;
                (PreRetrieved::Transactions(transactions), Vec::new())
            }
            DocumentType::Financial => {
                let (company, period, line_items) = self.retrieve_financial(upload_id).await?;
                (PreRetrieved::Financial { company, period, line_items }, Vec::new())
            }
        };

        let agents = match document_type {
            DocumentType::Transactions => transaction_agents(search_terms, Utc::now().date_naive()),
            DocumentType::Financial => financial_agents(),
        };

        let ctx = Arc::new(pre_retrieved_by_category);
        let categories = AgentCategory::for_document_type(document_type);

        // The agents run concurrently; the LLM client's own semaphore
        // bounds how many generations are in flight at once.
        let mut futures = Vec::new();
        for category in categories {
            let category = *category;
            let agent = agents.get(&category).expect("every category has a registered agent");
            let ctx = ctx.clone();
            let llm = self.llm.clone();
            let llm_config = self.config.llm.clone();
            futures.push(async move {
                let result = run_agent_insights(agent.as_ref(), upload_id, &ctx, llm.as_ref(), &llm_config).await;
                (category, result)
            });
        }
        let completed = futures_util::future::join_all(futures).await;

        // Assemble in canonical category order regardless of completion
        // order, regardless of fan-out completion order.
        let mut results = HashMap::new();
        let mut any_succeeded = false;
        for category in categories {
            if let Some((_, result)) = completed.iter().find(|(c, _)| c == category) {
                match result {
                    Ok(agent_result) => {
                        any_succeeded = true;
                        results.insert(*category, agent_result.clone());
                    }
                    Err(reason) => {
                        tracing::warn!(agent_category = %category, "agent failed during insights run");
                        results.insert(*category, AgentResult::failure(reason.clone()));
                    }
                }
            }
        }

        Ok((results, !any_succeeded))
    }

    /// `ProcessChatQuery(session_id, upload_id, document_type, query) ->
    /// AgentResult`. Never falls back to insights-mode
    /// compute when the cache is missing.
    #[instrument(skip(self, query), fields(session_id = %session_id, upload_id = %upload_id, document_type = %document_type))]
    pub async fn process_chat_query(
        &self,
        session_id: SessionId,
        upload_id: UploadId,
        document_type: DocumentType,
        query: &str,
    ) -> FinsightResult<ChatResponse> {
        let now = Utc::now();
        let intent = self
            .router
            .understand(query, document_type, upload_id, now.date_naive())
            .await?;

        let cached = self
            .cache
            .get(session_id, document_type, now)
            .await
            .ok_or(CacheError::Missing { document_type })?;

        let cached_result = cached
            .results
            .get(&intent.primary_agent)
            .filter(|result| !result.is_failure())
            .ok_or(CacheError::Missing { document_type })?;
        let cached_analysis = cached_result.analysis.clone();

        let (pre_retrieved, retrieval_was_filtered) = if intent.filters.is_empty() {
            (empty_pre_retrieved(document_type), false)
        } else {
            let filtered = self.filtered_retrieval(upload_id, document_type, &intent.filters).await?;
            (filtered, true)
        };

        let agents = match document_type {
            DocumentType::Transactions => transaction_agents(intent.search_terms.clone(), now.date_naive()),
            DocumentType::Financial => financial_agents(),
        };
        let agent = agents
            .get(&intent.primary_agent)
            .expect("every category has a registered agent");

        let ctx = AgentContext {
            upload_id,
            pre_retrieved,
            cached_analysis: Some(cached_analysis),
            retrieval_was_filtered,
        };

        let result = agent
            .execute(query, Mode::Chat, &ctx, self.llm.as_ref(), &self.config.llm)
            .await
            .map_err(FinsightError::from)?;

        Ok(ChatResponse::from_result(intent.primary_agent, result))
    }

    /// `InvalidateCache(session_id, document_type?)`.
    pub async fn invalidate_cache(&self, session_id: SessionId, document_type: Option<DocumentType>) {
        self.cache.clear(session_id, document_type).await;
    }

    /// `cache_status(session_id) -> {has_transaction_insights,
    /// has_financial_insights, …_expires_at}`.
    pub async fn cache_status(&self, session_id: SessionId) -> finsight_cache::SessionCacheStatus {
        self.cache.status(session_id, Utc::now()).await
    }

    /// `verify_upload_ingested(upload_id) -> bool`: `true` once
    /// at least one document has been indexed under `upload_id`.
    pub async fn verify_upload_ingested(&self, upload_id: UploadId) -> FinsightResult<bool> {
        let probe = SearchQuery::new(upload_id).with_limit(1);
        let documents = self.store.search(probe).await.map_err(FinsightError::from)?;
        Ok(!documents.is_empty())
    }

    async fn retrieve_transactions(&self, upload_id: UploadId) -> FinsightResult<Vec<finsight_core::Transaction>> {
        let documents = self.search_with_retry(SearchQuery::new(upload_id).with_limit(RETRIEVAL_LIMIT)).await?;
        Ok(documents
            .into_iter()
            .filter_map(|doc| match doc.record {
                SourceRecord::Transaction(t) => Some(t),
                SourceRecord::LineItem(_) => None,
            })
            .collect())
    }

    async fn retrieve_financial(
        &self,
        upload_id: UploadId,
    ) -> FinsightResult<(String, String, Vec<finsight_core::FinancialLineItem>)> {
        let documents = self.search_with_retry(SearchQuery::new(upload_id).with_limit(RETRIEVAL_LIMIT)).await?;
        let line_items: Vec<finsight_core::FinancialLineItem> = documents
            .into_iter()
            .filter_map(|doc| match doc.record {
                SourceRecord::LineItem(item) => Some(item),
                SourceRecord::Transaction(_) => None,
            })
            .collect();
        // Company/period labels are carried in the canonical text
        // rendering only, not surfaced back out of the store; the
        // reductions do not need them, only the rendering did.
        Ok(("this workspace".to_string(), "current period".to_string(), line_items))
    }

    async fn filtered_retrieval(
        &self,
        upload_id: UploadId,
        document_type: DocumentType,
        filters: &finsight_core::QueryFilters,
    ) -> FinsightResult<PreRetrieved> {
        let search_filters = SearchFilters {
            direction: filters.direction,
            amount_range: filters.amount_range,
            date_range: filters.date_range,
            doc_type: None,
        };
        let query = SearchQuery::new(upload_id).with_filters(search_filters).with_limit(self.config.store.retrieval_k);
        let documents = self.search_with_retry(query).await?;

        Ok(match document_type {
            DocumentType::Transactions => PreRetrieved::Transactions(
                documents
                    .into_iter()
                    .filter_map(|doc| match doc.record {
                        SourceRecord::Transaction(t) => Some(t),
                        SourceRecord::LineItem(_) => None,
                    })
                    .collect(),
            ),
            DocumentType::Financial => PreRetrieved::Financial {
                company: "this workspace".to_string(),
                period: "current period".to_string(),
                line_items: documents
                    .into_iter()
                    .filter_map(|doc| match doc.record {
                        SourceRecord::LineItem(item) => Some(item),
                        SourceRecord::Transaction(_) => None,
                    })
                    .collect(),
            },
        })
    }

    /// Retrieval failures are retried once with an unfiltered fallback
    /// query.
    async fn search_with_retry(&self, query: SearchQuery) -> FinsightResult<Vec<finsight_store::RetrievedDocument>> {
        let upload_id = query.upload_id();
        match self.store.search(query).await {
            Ok(documents) => Ok(documents),
            Err(_) => {
                tracing::warn!(%upload_id, "retrieval failed; retrying once unfiltered");
                self.store
                    .search(SearchQuery::new(upload_id).with_limit(RETRIEVAL_LIMIT))
                    .await
                    .map_err(FinsightError::from)
            }
        }
    }
}

fn empty_pre_retrieved(document_type: DocumentType) -> PreRetrieved {
    match document_type {
        DocumentType::Transactions => PreRetrieved::Transactions(Vec::new()),
        DocumentType::Financial => PreRetrieved::Financial {
            company: String::new(),
            period: String::new(),
            line_items: Vec::new(),
        },
    }
}

async fn run_agent_insights(
    agent: &dyn Agent,
    upload_id: UploadId,
    pre_retrieved: &PreRetrieved,
    llm: &dyn LlmClient,
    llm_config: &finsight_core::LlmConfig,
) -> Result<AgentResult, String> {
    let ctx = AgentContext {
        upload_id,
        pre_retrieved: pre_retrieved.clone(),
        cached_analysis: None,
        retrieval_was_filtered: false,
    };
    agent
        .execute("Generate a full analysis of this data.", Mode::Insights, &ctx, llm, llm_config)
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_core::EntityIdType;
    use finsight_store::InMemorySemanticStore;
    use finsight_test_utils::{fixtures, ScriptedLlmClient, SelectiveFailureLlmClient};

    fn orchestrator(llm: Arc<dyn LlmClient>, store: Arc<dyn SemanticStore>) -> Orchestrator {
        Orchestrator::new(store, Arc::new(SessionCache::new(FinsightConfig::default().cache)), llm, FinsightConfig::default())
    }

    #[tokio::test]
    async fn generate_insights_covers_all_six_categories_and_caches_them() {
        let store: Arc<dyn SemanticStore> = Arc::new(InMemorySemanticStore::new());
        let session_id = SessionId::now_v7();
        let upload_id = UploadId::now_v7();
        store.index_transactions(session_id, upload_id, &fixtures::gosi_transaction_set()).await.unwrap();

        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(vec!["analysis text"]));
        let orchestrator = orchestrator(llm, store);

        let outcome = orchestrator
            .generate_insights(session_id, upload_id, DocumentType::Transactions)
            .await
            .unwrap();

        for category in AgentCategory::TRANSACTION_AGENTS {
            assert!(outcome.results.contains_key(&category));
        }
        let expense = &outcome.results[&AgentCategory::Expense];
        assert_eq!(expense.analysis["total"], serde_json::json!(123_000.0));
    }

    #[tokio::test]
    async fn chat_without_prior_insights_reports_cache_missing() {
        let store: Arc<dyn SemanticStore> = Arc::new(InMemorySemanticStore::new());
        let session_id = SessionId::now_v7();
        let upload_id = UploadId::now_v7();
        store.index_transactions(session_id, upload_id, &fixtures::gosi_transaction_set()).await.unwrap();

        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(vec!["{\"query_type\": \"expense\", \"confidence\": 0.9}"]));
        let orchestrator = orchestrator(llm, store);

        let result = orchestrator
            .process_chat_query(session_id, upload_id, DocumentType::Transactions, "how much on GOSI?")
            .await;

        assert!(matches!(result, Err(FinsightError::Cache(CacheError::Missing { .. }))));
    }

    #[tokio::test]
    async fn a_single_failed_agent_still_caches_the_rest() {
        let store: Arc<dyn SemanticStore> = Arc::new(InMemorySemanticStore::new());
        let session_id = SessionId::now_v7();
        let upload_id = UploadId::now_v7();
        store.index_transactions(session_id, upload_id, &fixtures::gosi_transaction_set()).await.unwrap();

        let llm: Arc<dyn LlmClient> = Arc::new(SelectiveFailureLlmClient::new(vec!["the fee financial analysis agent"]));
        let orchestrator = orchestrator(llm, store);

        let outcome = orchestrator
            .generate_insights(session_id, upload_id, DocumentType::Transactions)
            .await
            .unwrap();

        assert_eq!(outcome.results[&AgentCategory::Fee].analysis["error"], serde_json::json!("agent_failure"));
        assert_eq!(outcome.results[&AgentCategory::Expense].analysis["total"], serde_json::json!(123_000.0));
    }

    #[tokio::test]
    async fn a_chat_query_for_a_failed_category_slot_also_reports_cache_missing() {
        let store: Arc<dyn SemanticStore> = Arc::new(InMemorySemanticStore::new());
        let session_id = SessionId::now_v7();
        let upload_id = UploadId::now_v7();
        store.index_transactions(session_id, upload_id, &fixtures::gosi_transaction_set()).await.unwrap();

        // The classifier routes every call to `fee` with high confidence;
        // the agent call itself fails only when the prompt names the fee
        // agent, so both the insights run's fee slot and a later fee chat
        // turn hit the same failure path.
        let llm: Arc<dyn LlmClient> = Arc::new(SelectiveFailureLlmClient::new(vec!["the fee financial analysis agent"]));
        let orchestrator = orchestrator(llm, store);

        let outcome = orchestrator
            .generate_insights(session_id, upload_id, DocumentType::Transactions)
            .await
            .unwrap();
        assert!(outcome.results[&AgentCategory::Fee].is_failure());

        let result = orchestrator
            .process_chat_query(session_id, upload_id, DocumentType::Transactions, "any fee charges this month?")
            .await;

        assert!(matches!(result, Err(FinsightError::Cache(CacheError::Missing { .. }))));
    }

    #[tokio::test]
    async fn workspace_isolation_holds_at_the_orchestrator_level() {
        let store: Arc<dyn SemanticStore> = Arc::new(InMemorySemanticStore::new());
        let session_id = SessionId::now_v7();
        let upload_a = UploadId::now_v7();
        let upload_b = UploadId::now_v7();
        store.index_transactions(session_id, upload_a, &fixtures::gosi_transaction_set()).await.unwrap();
        store.index_transactions(session_id, upload_b, &[]).await.unwrap();

        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(vec!["analysis text"]));
        let orchestrator = orchestrator(llm, store);

        let outcome = orchestrator
            .generate_insights(session_id, upload_b, DocumentType::Transactions)
            .await
            .unwrap();

        assert_eq!(outcome.results[&AgentCategory::Expense].analysis["total"], serde_json::json!(0.0));
    }

    #[tokio::test]
    async fn an_overleveraged_question_routes_to_the_risk_agent_for_financial_documents() {
        let store: Arc<dyn SemanticStore> = Arc::new(InMemorySemanticStore::new());
        let session_id = SessionId::now_v7();
        let upload_id = UploadId::now_v7();
        store
            .index_financial_data(session_id, upload_id, "Example Co", "FY2024", &fixtures::sample_line_items())
            .await
            .unwrap();

        // The classifier call fails outright, so routing falls back to the
        // deterministic keyword table, which sends "overleveraged" to risk;
        // the agent calls themselves still succeed.
        let llm: Arc<dyn LlmClient> = Arc::new(SelectiveFailureLlmClient::new(vec!["Classify the following"]));
        let orchestrator = orchestrator(llm, store);

        orchestrator
            .generate_insights(session_id, upload_id, DocumentType::Financial)
            .await
            .unwrap();

        let chat = orchestrator
            .process_chat_query(session_id, upload_id, DocumentType::Financial, "Am I overleveraged?")
            .await
            .unwrap();

        assert_eq!(chat.agent_used, AgentCategory::Risk);
    }

    #[tokio::test]
    async fn cache_status_and_upload_verification_reflect_orchestrator_state() {
        let store: Arc<dyn SemanticStore> = Arc::new(InMemorySemanticStore::new());
        let session_id = SessionId::now_v7();
        let upload_id = UploadId::now_v7();
        store.index_transactions(session_id, upload_id, &fixtures::gosi_transaction_set()).await.unwrap();

        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(vec!["analysis text"]));
        let orchestrator = orchestrator(llm, store);

        assert!(orchestrator.verify_upload_ingested(upload_id).await.unwrap());
        assert!(!orchestrator.verify_upload_ingested(UploadId::now_v7()).await.unwrap());

        let status_before = orchestrator.cache_status(session_id).await;
        assert!(!status_before.has_transaction_insights);

        orchestrator.generate_insights(session_id, upload_id, DocumentType::Transactions).await.unwrap();

        let status_after = orchestrator.cache_status(session_id).await;
        assert!(status_after.has_transaction_insights);
    }
}
