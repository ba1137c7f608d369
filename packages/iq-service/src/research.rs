use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use crate::{
	AgentIterationLog, AgentRunState, CandidateResult, Error, FunnelAgentLoop, IqService,
	LlmOracle, RerankFallback, RerankerService, Result, StopReason, rerank,
};
use iq_config::MAX_AGENT_ITERATIONS;

#[derive(Debug, Clone, Deserialize)]
pub struct ResearchRequest {
	pub query: String,
	#[serde(default)]
	pub max_iterations: Option<u32>,
	#[serde(default)]
	pub min_results: Option<u32>,
	#[serde(default)]
	pub top_k: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchResponse {
	pub query: String,
	pub candidates: Vec<CandidateResult>,
	/// Distinct candidates collected across all iterations.
	pub total_found: usize,
	pub iterations_ran: u32,
	pub stop_reason: StopReason,
	pub trace: Vec<AgentIterationLog>,
	#[serde(with = "crate::time_serde")]
	pub timestamp: OffsetDateTime,
}

impl IqService {
	pub async fn research(&self, req: ResearchRequest) -> Result<ResearchResponse> {
		self.research_with_cancel(req, &CancellationToken::new()).await
	}

	/// Runs the funnel agent, then reranks the pooled candidates by relevance.
	pub async fn research_with_cancel(
		&self,
		req: ResearchRequest,
		cancel: &CancellationToken,
	) -> Result<ResearchResponse> {
		let query = req.query.trim().to_string();

		if query.is_empty() {
			return Err(Error::invalid_field("query", "query must be non-empty."));
		}

		let min_results = req.min_results.unwrap_or(self.cfg.agent.default_min_results);

		if min_results == 0 {
			return Err(Error::invalid_field("min_results", "min_results must be at least 1."));
		}

		let top_k = req.top_k.unwrap_or(self.cfg.agent.default_top_k);

		if top_k == 0 || top_k > self.cfg.chat.max_top_k {
			return Err(Error::invalid_field(
				"top_k",
				format!("top_k must be between 1 and {}.", self.cfg.chat.max_top_k),
			));
		}

		self.ensure_indexed().await?;

		let state = AgentRunState::new(
			query.clone(),
			req.max_iterations.unwrap_or(MAX_AGENT_ITERATIONS),
			min_results as usize,
		);
		let completion = self.completion_client();
		let oracle = LlmOracle::new(completion);
		let agent = FunnelAgentLoop {
			oracle: &oracle,
			embedder: self.embedding_client(),
			index: self.index_client(),
			search_breadth: self.cfg.agent.search_breadth,
		};

		tracing::info!(
			max_iterations = state.max_iterations,
			min_results,
			top_k,
			"Research run started."
		);

		let state = agent.run(state, cancel).await;
		let stop_reason = state.stop_reason.clone().unwrap_or(StopReason::MaxIterationsReached);

		match stop_reason {
			StopReason::DependencyUnavailable => {
				let message = state
					.log
					.last()
					.map(|entry| entry.observation.clone())
					.unwrap_or_else(|| "Vector index unavailable.".to_string());

				return Err(Error::DependencyUnavailable { message });
			},
			StopReason::AgentError => {
				tracing::warn!(
					iterations_ran = state.iteration,
					collected = state.pool.len(),
					"Research stopped on a decision oracle failure."
				);
			},
			_ => {},
		}

		let total_found = state.pool.len();
		// A cancelled run makes no further external calls.
		let ranked = if cancel.is_cancelled() {
			rerank::apply_fallback(state.pool.into_values(), top_k as usize, RerankFallback::ByScore)
		} else {
			RerankerService::new(completion)
				.rerank(&query, state.pool.into_values(), top_k as usize, RerankFallback::ByScore)
				.await
		};

		tracing::info!(
			iterations_ran = state.iteration,
			total_found,
			returned = ranked.len(),
			stop_reason = stop_reason.as_str(),
			"Research complete."
		);

		Ok(ResearchResponse {
			query,
			candidates: ranked.iter().map(CandidateResult::from).collect(),
			total_found,
			iterations_ran: state.iteration,
			stop_reason,
			trace: state.log,
			timestamp: OffsetDateTime::now_utc(),
		})
	}
}
