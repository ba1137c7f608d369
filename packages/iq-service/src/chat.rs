use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
	CandidateResult, EnrichmentPipeline, Error, IqService, RerankFallback, RerankerService,
	Result, SummaryGenerator, Turn, TurnRole, rewrite,
};

pub const NO_RESULTS_SUMMARY: &str = "No matching candidates found. Try broadening your search.";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
	pub query: String,
	#[serde(default)]
	pub conversation_id: Option<String>,
	#[serde(default)]
	pub top_k: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
	pub conversation_id: String,
	pub query: String,
	pub candidates: Vec<CandidateResult>,
	pub summary: String,
	#[serde(with = "crate::time_serde")]
	pub timestamp: OffsetDateTime,
}

impl IqService {
	pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
		self.chat_with_cancel(req, &CancellationToken::new()).await
	}

	/// Rewrite, embed, search, rerank, enrich, summarize. The conversation history is appended
	/// only when at least one candidate was returned.
	pub async fn chat_with_cancel(
		&self,
		req: ChatRequest,
		cancel: &CancellationToken,
	) -> Result<ChatResponse> {
		let query = req.query.trim().to_string();

		if query.is_empty() {
			return Err(Error::invalid_field("query", "query must be non-empty."));
		}

		let top_k = req.top_k.unwrap_or(self.cfg.chat.default_top_k);

		if top_k == 0 || top_k > self.cfg.chat.max_top_k {
			return Err(Error::invalid_field(
				"top_k",
				format!("top_k must be between 1 and {}.", self.cfg.chat.max_top_k),
			));
		}

		self.ensure_indexed().await?;

		let conversation_id = req
			.conversation_id
			.map(|id| id.trim().to_string())
			.filter(|id| !id.is_empty())
			.unwrap_or_else(|| Uuid::new_v4().to_string());
		let history = self.sessions.history(&conversation_id);

		tracing::info!(
			conversation_id = %conversation_id,
			turns = history.len(),
			top_k,
			"Chat request accepted."
		);

		let completion = self.completion_client();
		let rewritten = rewrite::rewrite_query(completion, &query, &history).await;

		tracing::debug!(original = %query, rewritten = %rewritten, "Query rewritten.");

		let vector = self.embedding_client().embed_one(&rewritten).await?;
		let breadth = top_k.saturating_mul(self.cfg.chat.candidate_multiplier);
		let raw = self.index_client().search(&vector, breadth, None).await?;
		let results = RerankerService::new(completion)
			.rerank(&query, raw, top_k as usize, RerankFallback::InputOrder)
			.await;

		if results.is_empty() {
			tracing::info!(conversation_id = %conversation_id, "Chat found no candidates.");

			return Ok(ChatResponse {
				conversation_id,
				query,
				candidates: Vec::new(),
				summary: NO_RESULTS_SUMMARY.to_string(),
				timestamp: OffsetDateTime::now_utc(),
			});
		}

		let enriched = EnrichmentPipeline::new(completion).enrich(&query, results, cancel).await;
		let summary = SummaryGenerator::new(completion).summarize(&query, &enriched).await;

		self.sessions.append(
			&conversation_id,
			[Turn::new(TurnRole::User, query.clone()), Turn::new(TurnRole::Assistant, summary.clone())],
		);

		tracing::info!(
			conversation_id = %conversation_id,
			candidates = enriched.len(),
			"Chat complete."
		);

		Ok(ChatResponse {
			conversation_id,
			query,
			candidates: enriched.iter().map(CandidateResult::from).collect(),
			summary,
			timestamp: OffsetDateTime::now_utc(),
		})
	}
}
