use serde::Deserialize;

use crate::{
	BoxFuture, CompletionClient, CompletionRequest, Error, Result,
	agent::{AgentIterationLog, FunnelLevel},
	llm_json::{self, ModelReply},
};

const ORACLE_MAX_TOKENS: u32 = 300;
const ORACLE_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentAction {
	Search,
	Stop,
}
impl AgentAction {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Search => "search",
			Self::Stop => "stop",
		}
	}
}

/// One reply of the decision oracle.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentDecision {
	#[serde(default)]
	pub thought: String,
	pub action: AgentAction,
	#[serde(default)]
	pub action_input: String,
}
impl AgentDecision {
	pub fn search(thought: impl Into<String>, query: impl Into<String>) -> Self {
		Self { thought: thought.into(), action: AgentAction::Search, action_input: query.into() }
	}

	pub fn stop(thought: impl Into<String>, reason: impl Into<String>) -> Self {
		Self { thought: thought.into(), action: AgentAction::Stop, action_input: reason.into() }
	}
}

/// Everything the oracle sees before choosing the next action.
#[derive(Debug, Clone, Copy)]
pub struct OracleContext<'a> {
	pub query: &'a str,
	pub history: &'a [AgentIterationLog],
	pub collected: usize,
	pub min_results: usize,
	pub iteration: u32,
	pub max_iterations: u32,
	pub funnel_level: FunnelLevel,
}

pub trait DecisionOracle
where
	Self: Send + Sync,
{
	fn decide<'a>(&'a self, ctx: OracleContext<'a>) -> BoxFuture<'a, Result<AgentDecision>>;
}

/// Oracle backed by the completion service.
pub struct LlmOracle<'a> {
	client: CompletionClient<'a>,
}
impl<'a> LlmOracle<'a> {
	pub fn new(client: CompletionClient<'a>) -> Self {
		Self { client }
	}
}
impl DecisionOracle for LlmOracle<'_> {
	fn decide<'a>(&'a self, ctx: OracleContext<'a>) -> BoxFuture<'a, Result<AgentDecision>> {
		Box::pin(async move {
			let request =
				CompletionRequest::new(build_oracle_prompt(&ctx), ORACLE_MAX_TOKENS, ORACLE_TEMPERATURE);
			let raw = self.client.complete(&request).await?;

			match llm_json::parse_reply::<AgentDecision>(&raw) {
				ModelReply::Parsed(decision) => Ok(decision),
				ModelReply::Fallback { reason } => Err(Error::MalformedModelOutput { message: reason }),
			}
		})
	}
}

pub fn build_oracle_prompt(ctx: &OracleContext<'_>) -> String {
	let history = if ctx.history.is_empty() {
		"(no searches yet)".to_string()
	} else {
		ctx.history
			.iter()
			.map(|entry| {
				format!(
					"Iteration {}\nThought: {}\nAction: {} \"{}\"\nObservation: {}",
					entry.iteration,
					entry.thought,
					entry.action,
					entry.action_input,
					entry.observation
				)
			})
			.collect::<Vec<_>>()
			.join("\n\n")
	};

	format!(
		"You are a research agent finding candidates in an expert network.
Work like a funnel: start with the narrowest query that keeps every constraint of the request.
When a search returns too few new candidates, relax exactly one constraint per step, in this order:
1. location (city, then country, then region)
2. role (exact title, then adjacent titles)
3. industry (exact industry, then related industries)
Never relax two constraints in the same step. Stop once enough candidates are collected or further
broadening would drift away from the request.

Original request: \"{query}\"
Iteration {iteration} of {max_iterations}. Candidates collected so far: {collected} (target {min_results}).
Current funnel stage: {level}.

History:
{history}

Reply with JSON only:
{{\"thought\": \"<short reasoning>\", \"action\": \"search\" | \"stop\", \"action_input\": \"<search query, or the reason for stopping>\"}}",
		query = ctx.query,
		iteration = ctx.iteration,
		max_iterations = ctx.max_iterations,
		collected = ctx.collected,
		min_results = ctx.min_results,
		level = ctx.funnel_level.as_str(),
	)
}
