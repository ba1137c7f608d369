use std::{
	collections::VecDeque,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use tokio_util::sync::CancellationToken;

use super::{ScriptedCompletion, StubEmbedding, StubIndex, candidate, ids, service_with, test_config};
use iq_service::{
	AgentDecision, AgentRunState, BoxFuture, DecisionOracle, EmbeddingClient, Error,
	FunnelAgentLoop, IndexClient, OracleContext, ResearchRequest, Result, StopReason,
};

fn search_reply(thought: &str, query: &str) -> String {
	serde_json::json!({ "thought": thought, "action": "search", "action_input": query }).to_string()
}

fn research_request(max_iterations: u32, min_results: u32) -> ResearchRequest {
	ResearchRequest {
		query: "regulatory affairs manager Saudi Arabia".to_string(),
		max_iterations: Some(max_iterations),
		min_results: Some(min_results),
		top_k: Some(10),
	}
}

struct ScriptedOracle {
	decisions: Mutex<VecDeque<AgentDecision>>,
	calls: AtomicUsize,
	cancel_on_call: Option<CancellationToken>,
}
impl ScriptedOracle {
	fn new(decisions: Vec<AgentDecision>) -> Self {
		Self { decisions: Mutex::new(decisions.into()), calls: AtomicUsize::new(0), cancel_on_call: None }
	}
}
impl DecisionOracle for ScriptedOracle {
	fn decide<'a>(&'a self, _ctx: OracleContext<'a>) -> BoxFuture<'a, Result<AgentDecision>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		if let Some(token) = &self.cancel_on_call {
			token.cancel();
		}

		let next = self.decisions.lock().expect("decisions lock").pop_front();

		Box::pin(async move {
			next.ok_or_else(|| Error::MalformedModelOutput { message: "Script exhausted.".to_string() })
		})
	}
}

#[tokio::test]
async fn funnel_stops_once_enough_candidates_are_pooled() {
	let index = Arc::new(
		StubIndex::new(100)
			.script(Ok(vec![
				candidate("a", "Ahmed Al-Harbi", 0.91),
				candidate("b", "Bana Qahtani", 0.88),
				candidate("c", "Carim Said", 0.85),
			]))
			.script(Ok(vec![
				candidate("c", "Carim Said", 0.79),
				candidate("d", "Dalia Nasser", 0.77),
				candidate("e", "Essa Mutairi", 0.74),
			])),
	);
	let completion = Arc::new(
		ScriptedCompletion {
			rerank: Some("[5, 4, 3, 2, 1]".to_string()),
			..ScriptedCompletion::new()
		}
		.with_oracle([
			search_reply("Start narrow.", "regulatory affairs manager Riyadh"),
			search_reply("Relax location.", "regulatory affairs manager Saudi Arabia"),
			search_reply("Relax role.", "regulatory affairs Saudi Arabia"),
		]),
	);
	let embedding = Arc::new(StubEmbedding::new());
	let service = service_with(index.clone(), embedding.clone(), completion.clone());
	let response = service.research(research_request(4, 5)).await.expect("Research failed.");

	assert_eq!(response.stop_reason, StopReason::SufficientResults);
	assert_eq!(response.iterations_ran, 2);
	assert_eq!(response.total_found, 5);
	assert_eq!(ids(&response.candidates), ["e", "d", "c", "b", "a"]);
	assert_eq!(response.trace.len(), 2);
	assert_eq!(response.trace[0].action_input, "regulatory affairs manager Riyadh");
	assert!(response.trace[1].observation.starts_with("Found 2 new candidates (5 total)"));
	assert_eq!(index.searches(), 2);
	assert_eq!(*index.breadths.lock().expect("breadths lock"), vec![20, 20]);
	assert_eq!(embedding.count(), 2);
	assert_eq!(completion.oracle.lock().expect("oracle lock").len(), 1);

	let json = serde_json::to_value(&response).expect("Failed to serialize response.");

	assert_eq!(json["stop_reason"], "sufficient_results");
	assert_eq!(json["trace"][0]["funnel_level"], "strict");
	assert_eq!(json["trace"][1]["funnel_level"], "location-relaxed");
}

#[tokio::test]
async fn iterations_never_exceed_five() {
	let index = Arc::new(StubIndex::with_results(
		100,
		vec![candidate("a", "Ahmed", 0.6), candidate("b", "Bana", 0.9)],
	));
	let completion = Arc::new(
		ScriptedCompletion::new()
			.with_oracle((0..10).map(|i| search_reply("Keep going.", &format!("query {i}")))),
	);
	let service = service_with(index.clone(), Arc::new(StubEmbedding::new()), completion.clone());
	let response = service.research(research_request(9, 50)).await.expect("Research failed.");

	assert_eq!(response.stop_reason, StopReason::MaxIterationsReached);
	assert_eq!(response.iterations_ran, 5);
	assert_eq!(response.trace.len(), 5);
	assert_eq!(completion.prompts_containing("You are a research agent").len(), 5);
	assert!(response.trace[1].observation.contains("none were new"));
	// Reranker has no reply configured, so the final order falls back to score.
	assert_eq!(ids(&response.candidates), ["b", "a"]);
}

#[tokio::test]
async fn malformed_oracle_reply_stops_with_agent_error() {
	let index = Arc::new(StubIndex::with_results(100, vec![candidate("a", "Ahmed", 0.8)]));
	let completion = Arc::new(ScriptedCompletion::new().with_oracle([
		search_reply("Start narrow.", "regulatory affairs Riyadh"),
		"I think we should keep searching.".to_string(),
	]));
	let service = service_with(index, Arc::new(StubEmbedding::new()), completion);
	let response = service.research(research_request(4, 5)).await.expect("Research failed.");

	assert_eq!(response.stop_reason, StopReason::AgentError);
	assert_eq!(response.iterations_ran, 2);
	assert_eq!(response.trace.len(), 2);
	assert_eq!(response.trace[1].action, "stop");
	assert!(response.trace[1].observation.starts_with("Decision oracle failed"));
	assert_eq!(ids(&response.candidates), ["a"]);
}

#[tokio::test]
async fn oracle_failure_on_first_iteration_still_returns_the_trace() {
	let index = Arc::new(StubIndex::with_results(100, vec![candidate("a", "Ahmed", 0.8)]));
	let completion = Arc::new(ScriptedCompletion::new().with_oracle(["not json"]));
	let service = service_with(index.clone(), Arc::new(StubEmbedding::new()), completion.clone());
	let response = service.research(research_request(4, 5)).await.expect("Research failed.");

	assert_eq!(response.stop_reason, StopReason::AgentError);
	assert!(response.candidates.is_empty());
	assert_eq!(response.total_found, 0);
	assert_eq!(response.iterations_ran, 1);
	assert_eq!(response.trace.len(), 1);
	assert_eq!(response.trace[0].action, "stop");
	assert_eq!(response.trace[0].action_input, "agent_error");
	assert!(response.trace[0].observation.starts_with("Decision oracle failed"));
	assert_eq!(index.searches(), 0);
	assert!(completion.prompts_containing("You are ranking candidates").is_empty());

	let json = serde_json::to_value(&response).expect("Failed to serialize response.");

	assert_eq!(json["stop_reason"], "agent_error");
}

#[tokio::test]
async fn unknown_oracle_action_stops_with_agent_error() {
	let index = Arc::new(StubIndex::with_results(100, vec![candidate("a", "Ahmed", 0.8)]));
	let completion = Arc::new(ScriptedCompletion::new().with_oracle([serde_json::json!({
		"thought": "?",
		"action": "browse",
		"action_input": "regulatory"
	})
	.to_string()]));
	let service = service_with(index.clone(), Arc::new(StubEmbedding::new()), completion);
	let response = service.research(research_request(4, 5)).await.expect("Research failed.");

	assert_eq!(response.stop_reason, StopReason::AgentError);
	assert_eq!(response.trace.len(), 1);
	assert_eq!(index.searches(), 0);
}

#[tokio::test]
async fn cancelled_research_orders_by_score_without_a_rerank_call() {
	let cancel = CancellationToken::new();
	let index = Arc::new(StubIndex::with_results(
		100,
		vec![candidate("a", "Ahmed", 0.6), candidate("b", "Bana", 0.9)],
	));
	let embedding =
		Arc::new(StubEmbedding { cancel_on_call: Some(cancel.clone()), ..StubEmbedding::new() });
	let completion = Arc::new(
		ScriptedCompletion { rerank: Some("[1, 2]".to_string()), ..ScriptedCompletion::new() }
			.with_oracle([
				search_reply("Start narrow.", "regulatory affairs manager Riyadh"),
				search_reply("Relax location.", "regulatory affairs manager"),
			]),
	);
	let service = service_with(index, embedding, completion.clone());
	let response = service
		.research_with_cancel(research_request(4, 5), &cancel)
		.await
		.expect("Research failed.");

	assert_eq!(response.stop_reason, StopReason::Cancelled);
	assert_eq!(response.iterations_ran, 1);
	assert_eq!(ids(&response.candidates), ["b", "a"]);
	assert!(completion.prompts_containing("You are ranking candidates").is_empty());
	assert_eq!(completion.prompts_containing("You are a research agent").len(), 1);
}

#[tokio::test]
async fn embedding_failure_inside_the_loop_is_not_fatal() {
	let index = Arc::new(StubIndex::with_results(100, vec![candidate("a", "Ahmed", 0.8)]));
	let completion = Arc::new(ScriptedCompletion::new().with_oracle([
		search_reply("Try this.", "FAIL regulatory"),
		search_reply("Try again.", "regulatory affairs Riyadh"),
	]));
	let service = service_with(index.clone(), Arc::new(StubEmbedding::failing_on("FAIL")), completion);
	let response = service.research(research_request(4, 1)).await.expect("Research failed.");

	assert_eq!(response.stop_reason, StopReason::SufficientResults);
	assert_eq!(response.iterations_ran, 2);
	assert!(response.trace[0].observation.starts_with("Embedding failed"));
	assert_eq!(index.searches(), 1);
	assert_eq!(response.total_found, 1);
}

#[tokio::test]
async fn oracle_stop_without_reason_uses_default_reason() {
	let index = Arc::new(StubIndex::new(100));
	let completion = Arc::new(ScriptedCompletion::new().with_oracle([serde_json::json!({
		"thought": "Nothing to do.",
		"action": "stop",
		"action_input": ""
	})
	.to_string()]));
	let service = service_with(index, Arc::new(StubEmbedding::new()), completion);
	let response = service.research(research_request(4, 5)).await.expect("Research failed.");

	assert_eq!(response.stop_reason.as_str(), "agent_decided_to_stop");
	assert_eq!(response.iterations_ran, 1);
	assert!(response.candidates.is_empty());
	assert_eq!(
		serde_json::to_value(&response.stop_reason).expect("serialize"),
		serde_json::json!("agent_decided_to_stop")
	);
}

#[tokio::test]
async fn index_failure_surfaces_as_dependency_unavailable() {
	let index = Arc::new(StubIndex::new(100).script(Err("Qdrant: connection reset".to_string())));
	let completion = Arc::new(
		ScriptedCompletion::new().with_oracle([search_reply("Start.", "regulatory affairs Riyadh")]),
	);
	let service = service_with(index, Arc::new(StubEmbedding::new()), completion);
	let err = service.research(research_request(4, 5)).await.expect_err("Expected failure.");

	assert!(matches!(err, Error::DependencyUnavailable { .. }), "Unexpected error: {err:?}");
}

#[tokio::test]
async fn research_on_empty_index_makes_no_model_calls() {
	let embedding = Arc::new(StubEmbedding::new());
	let completion = Arc::new(ScriptedCompletion::new());
	let service = service_with(Arc::new(StubIndex::new(0)), embedding.clone(), completion.clone());
	let err = service.research(research_request(4, 5)).await.expect_err("Expected failure.");

	assert!(matches!(err, Error::NoCandidatesIndexed));
	assert_eq!(embedding.count(), 0);
	assert_eq!(completion.count(), 0);
}

#[tokio::test]
async fn invalid_research_requests_are_rejected() {
	let service = service_with(
		Arc::new(StubIndex::new(10)),
		Arc::new(StubEmbedding::new()),
		Arc::new(ScriptedCompletion::new()),
	);
	let blank = ResearchRequest { query: "   ".to_string(), ..research_request(3, 5) };
	let zero_min = research_request(3, 0);

	assert!(matches!(service.research(blank).await, Err(Error::InvalidRequest { .. })));
	assert!(matches!(service.research(zero_min).await, Err(Error::InvalidRequest { .. })));
}

#[tokio::test]
async fn cancelled_run_stops_at_the_next_iteration_boundary() {
	let cfg = test_config();
	let embedding = StubEmbedding::new();
	let index = StubIndex::with_results(100, vec![candidate("a", "Ahmed", 0.8)]);
	let cancel = CancellationToken::new();
	let oracle = ScriptedOracle {
		cancel_on_call: Some(cancel.clone()),
		..ScriptedOracle::new(vec![
			AgentDecision::search("Start.", "regulatory affairs"),
			AgentDecision::search("Again.", "regulatory affairs KSA"),
		])
	};
	let agent = FunnelAgentLoop {
		oracle: &oracle,
		embedder: EmbeddingClient::new(&embedding, &cfg.providers.embedding, Duration::from_secs(1)),
		index: IndexClient::new(&index, Duration::from_secs(1)),
		search_breadth: 20,
	};
	let state = agent.run(AgentRunState::new("regulatory affairs", 5, 10), &cancel).await;

	assert_eq!(state.stop_reason, Some(StopReason::Cancelled));
	assert_eq!(state.iteration, 1);
	assert_eq!(state.log.len(), 1);
	assert_eq!(state.pool.len(), 1);
	assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn already_cancelled_run_never_consults_the_oracle() {
	let cfg = test_config();
	let embedding = StubEmbedding::new();
	let index = StubIndex::new(100);
	let oracle = ScriptedOracle::new(vec![AgentDecision::search("Start.", "q")]);
	let cancel = CancellationToken::new();

	cancel.cancel();

	let agent = FunnelAgentLoop {
		oracle: &oracle,
		embedder: EmbeddingClient::new(&embedding, &cfg.providers.embedding, Duration::from_secs(1)),
		index: IndexClient::new(&index, Duration::from_secs(1)),
		search_breadth: 20,
	};
	let state = agent.run(AgentRunState::new("q", 5, 10), &cancel).await;

	assert_eq!(state.stop_reason, Some(StopReason::Cancelled));
	assert_eq!(state.iteration, 0);
	assert!(state.log.is_empty());
	assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
}
