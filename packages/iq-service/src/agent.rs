//! Funnel retrieval agent. `AgentRunState` holds the pure transitions; `FunnelAgentLoop` performs
//! the I/O between them.

use serde::{Serialize, Serializer};
use tokio_util::sync::CancellationToken;

use crate::{
	EmbeddingClient, IndexClient,
	oracle::{AgentAction, AgentDecision, DecisionOracle, OracleContext},
};
use iq_config::MAX_AGENT_ITERATIONS;
use iq_domain::{CandidateMatch, CandidatePool};

pub const DEFAULT_STOP_REASON: &str = "agent_decided_to_stop";

const MAX_OBSERVED_DESCRIPTORS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
	SufficientResults,
	MaxIterationsReached,
	/// The oracle chose to stop; carries its stated reason.
	AgentStopped(String),
	AgentError,
	Cancelled,
	DependencyUnavailable,
}
impl StopReason {
	pub fn as_str(&self) -> &str {
		match self {
			Self::SufficientResults => "sufficient_results",
			Self::MaxIterationsReached => "max_iterations_reached",
			Self::AgentStopped(reason) => reason.as_str(),
			Self::AgentError => "agent_error",
			Self::Cancelled => "cancelled",
			Self::DependencyUnavailable => "dependency_unavailable",
		}
	}
}
impl Serialize for StopReason {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(self.as_str())
	}
}

/// Advisory broadening stage. Tracked and logged; the oracle prompt carries the policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FunnelLevel {
	#[default]
	Strict,
	LocationRelaxed,
	RoleRelaxed,
	IndustryRelaxed,
}
impl FunnelLevel {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Strict => "strict",
			Self::LocationRelaxed => "location-relaxed",
			Self::RoleRelaxed => "role-relaxed",
			Self::IndustryRelaxed => "industry-relaxed",
		}
	}

	pub fn broadened(self) -> Self {
		match self {
			Self::Strict => Self::LocationRelaxed,
			Self::LocationRelaxed => Self::RoleRelaxed,
			Self::RoleRelaxed | Self::IndustryRelaxed => Self::IndustryRelaxed,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentIterationLog {
	pub iteration: u32,
	pub thought: String,
	pub action: String,
	pub action_input: String,
	pub observation: String,
	pub funnel_level: FunnelLevel,
}

/// Result of executing one `search` action.
#[derive(Debug)]
pub enum SearchOutcome {
	Found(Vec<CandidateMatch>),
	EmbeddingFailed(String),
	IndexFailed(String),
}

#[derive(Debug)]
pub struct AgentRunState {
	pub query: String,
	pub max_iterations: u32,
	pub min_results: usize,
	pub pool: CandidatePool,
	pub log: Vec<AgentIterationLog>,
	pub iteration: u32,
	pub stop_reason: Option<StopReason>,
	pub funnel_level: FunnelLevel,
}
impl AgentRunState {
	/// `requested_max` is clamped into `1..=MAX_AGENT_ITERATIONS`.
	pub fn new(query: impl Into<String>, requested_max: u32, min_results: usize) -> Self {
		Self {
			query: query.into(),
			max_iterations: requested_max.clamp(1, MAX_AGENT_ITERATIONS),
			min_results,
			pool: CandidatePool::new(),
			log: Vec::new(),
			iteration: 0,
			stop_reason: None,
			funnel_level: FunnelLevel::Strict,
		}
	}

	pub fn is_finished(&self) -> bool {
		self.stop_reason.is_some()
	}

	/// Advances the counter, or finishes with `max_iterations_reached` when the budget is spent.
	pub fn begin_iteration(&mut self) -> Option<u32> {
		if self.is_finished() {
			return None;
		}
		if self.iteration >= self.max_iterations {
			self.finish(StopReason::MaxIterationsReached);

			return None;
		}

		self.iteration += 1;

		Some(self.iteration)
	}

	pub fn oracle_context(&self) -> OracleContext<'_> {
		OracleContext {
			query: &self.query,
			history: &self.log,
			collected: self.pool.len(),
			min_results: self.min_results,
			iteration: self.iteration,
			max_iterations: self.max_iterations,
			funnel_level: self.funnel_level,
		}
	}

	/// Applies an oracle decision. Returns the query to search for, or `None` when the run
	/// stopped.
	pub fn apply_decision(&mut self, decision: AgentDecision) -> Option<String> {
		match decision.action {
			AgentAction::Stop => {
				let reason = match decision.action_input.trim() {
					"" => DEFAULT_STOP_REASON.to_string(),
					reason => reason.to_string(),
				};

				self.push_log(
					decision.thought,
					AgentAction::Stop,
					reason.clone(),
					"Agent halted the search loop.".to_string(),
				);
				self.finish(StopReason::AgentStopped(reason));

				None
			},
			AgentAction::Search => {
				let query = match decision.action_input.trim() {
					"" => self.query.clone(),
					query => query.to_string(),
				};

				Some(query)
			},
		}
	}

	pub fn apply_search_outcome(&mut self, thought: String, query: String, outcome: SearchOutcome) {
		match outcome {
			SearchOutcome::Found(matches) => {
				let returned = matches.len();
				let added = self.pool.merge(matches);
				let observation = describe_new_matches(&self.pool, returned, added);

				self.push_log(thought, AgentAction::Search, query, observation);

				self.funnel_level = self.funnel_level.broadened();

				if self.pool.len() >= self.min_results {
					self.finish(StopReason::SufficientResults);
				}
			},
			SearchOutcome::EmbeddingFailed(message) => {
				self.push_log(
					thought,
					AgentAction::Search,
					query,
					format!("Embedding failed: {message} Nothing was merged."),
				);
			},
			SearchOutcome::IndexFailed(message) => {
				self.push_log(
					thought,
					AgentAction::Search,
					query,
					format!("Vector search failed: {message}"),
				);
				self.finish(StopReason::DependencyUnavailable);
			},
		}
	}

	/// Logs the terminal iteration and stops with `agent_error`.
	pub fn apply_oracle_failure(&mut self, message: &str) {
		self.push_log(
			String::new(),
			AgentAction::Stop,
			StopReason::AgentError.as_str().to_string(),
			format!("Decision oracle failed: {message}"),
		);
		self.finish(StopReason::AgentError);
	}

	/// Sets the terminal reason. The first reason wins.
	pub fn finish(&mut self, reason: StopReason) {
		if self.stop_reason.is_none() {
			self.stop_reason = Some(reason);
		}
	}

	fn push_log(
		&mut self,
		thought: String,
		action: AgentAction,
		action_input: String,
		observation: String,
	) {
		self.log.push(AgentIterationLog {
			iteration: self.iteration,
			thought,
			action: action.as_str().to_string(),
			action_input,
			observation,
			funnel_level: self.funnel_level,
		});
	}
}

/// Drives `AgentRunState` through oracle calls, embeddings, and index searches.
pub struct FunnelAgentLoop<'a> {
	pub oracle: &'a dyn DecisionOracle,
	pub embedder: EmbeddingClient<'a>,
	pub index: IndexClient<'a>,
	pub search_breadth: u32,
}
impl FunnelAgentLoop<'_> {
	/// Always returns a finished state; failures become stop reasons.
	pub async fn run(&self, mut state: AgentRunState, cancel: &CancellationToken) -> AgentRunState {
		loop {
			if cancel.is_cancelled() {
				tracing::info!(iteration = state.iteration, "Research run cancelled.");

				state.finish(StopReason::Cancelled);
			}

			let Some(iteration) = state.begin_iteration() else {
				break;
			};
			let decision = match self.oracle.decide(state.oracle_context()).await {
				Ok(decision) => decision,
				Err(err) => {
					tracing::warn!(iteration, error = %err, "Decision oracle failed.");

					state.apply_oracle_failure(&err.to_string());

					break;
				},
			};

			tracing::info!(
				iteration,
				action = decision.action.as_str(),
				action_input = %decision.action_input,
				funnel_level = state.funnel_level.as_str(),
				"Agent decided next action."
			);

			let thought = decision.thought.clone();
			let Some(query) = state.apply_decision(decision) else {
				break;
			};
			let outcome = self.search(&query).await;

			state.apply_search_outcome(thought, query, outcome);

			tracing::info!(
				iteration,
				pool_size = state.pool.len(),
				min_results = state.min_results,
				"Agent iteration complete."
			);
		}

		tracing::info!(
			iterations_ran = state.iteration,
			stop_reason = state.stop_reason.as_ref().map(StopReason::as_str).unwrap_or_default(),
			pool_size = state.pool.len(),
			"Research loop finished."
		);

		state
	}

	async fn search(&self, query: &str) -> SearchOutcome {
		let vector = match self.embedder.embed_one(query).await {
			Ok(vector) => vector,
			Err(err) => {
				tracing::warn!(error = %err, "Agent search embedding failed.");

				return SearchOutcome::EmbeddingFailed(err.to_string());
			},
		};

		match self.index.search(&vector, self.search_breadth, None).await {
			Ok(matches) => SearchOutcome::Found(matches),
			Err(err) => {
				tracing::error!(error = %err, "Agent vector search failed.");

				SearchOutcome::IndexFailed(err.to_string())
			},
		}
	}
}

fn describe_new_matches(pool: &CandidatePool, returned: usize, added: usize) -> String {
	if added == 0 {
		return format!("Search returned {returned} matches; none were new.");
	}

	let values = pool.values();
	let descriptors = values[values.len() - added..]
		.iter()
		.take(MAX_OBSERVED_DESCRIPTORS)
		.map(CandidateMatch::descriptor)
		.collect::<Vec<_>>()
		.join("; ");

	format!("Found {added} new candidates ({} total): {descriptors}.", pool.len())
}
