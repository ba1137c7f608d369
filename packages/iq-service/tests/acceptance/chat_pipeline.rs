use std::{sync::Arc, sync::atomic::Ordering, time::Duration};

use super::{ScriptedCompletion, StubEmbedding, StubIndex, candidate, ids, service_with};
use iq_domain::CandidateMatch;
use iq_service::{ChatRequest, ENRICHMENT_CONCURRENCY, Error, chat::NO_RESULTS_SUMMARY};

const EXPLANATION: &str = r#"```json
{"why_match": "Leads SFDA submissions in Riyadh.", "highlights": ["SFDA", "", "8 years"]}
```"#;

fn pool(size: usize) -> Vec<CandidateMatch> {
	(0..size)
		.map(|i| candidate(&format!("c{i}"), &format!("Candidate {i}"), 0.9 - i as f32 * 0.01))
		.collect()
}

fn chat_request(top_k: u32) -> ChatRequest {
	ChatRequest {
		query: "regulatory affairs manager Saudi Arabia".to_string(),
		conversation_id: None,
		top_k: Some(top_k),
	}
}

#[tokio::test]
async fn chat_on_empty_index_short_circuits_before_any_model_call() {
	let embedding = Arc::new(StubEmbedding::new());
	let completion = Arc::new(ScriptedCompletion::new());
	let index = Arc::new(StubIndex::new(0));
	let service = service_with(index.clone(), embedding.clone(), completion.clone());
	let err = service.chat(chat_request(5)).await.expect_err("Expected failure.");

	assert!(matches!(err, Error::NoCandidatesIndexed));
	assert_eq!(embedding.count(), 0);
	assert_eq!(completion.count(), 0);
	assert_eq!(index.searches(), 0);
	assert!(service.sessions.is_empty());
}

#[tokio::test]
async fn chat_reranks_enriches_and_records_the_exchange() {
	let index = Arc::new(StubIndex::with_results(40, pool(8)));
	let completion = Arc::new(ScriptedCompletion {
		rewrite: Some("regulatory affairs manager SFDA pharma Riyadh Jeddah KSA".to_string()),
		rerank: Some("[3, 1, 3, 42]".to_string()),
		explain: Some(EXPLANATION.to_string()),
		summary: Some("Both candidates lead regulatory work in KSA.".to_string()),
		..ScriptedCompletion::new()
	});
	let embedding = Arc::new(StubEmbedding::new());
	let service = service_with(index.clone(), embedding.clone(), completion.clone());
	let response = service.chat(chat_request(2)).await.expect("Chat failed.");

	assert_eq!(ids(&response.candidates), ["c2", "c0"]);
	assert_eq!(response.summary, "Both candidates lead regulatory work in KSA.");
	assert_eq!(
		response.candidates[0].why_match.as_deref(),
		Some("Leads SFDA submissions in Riyadh.")
	);
	assert_eq!(response.candidates[0].highlights, ["SFDA", "8 years"]);
	assert_eq!(response.candidates[0].location.as_deref(), Some("Riyadh, Saudi Arabia"));
	assert_eq!(*index.breadths.lock().expect("breadths lock"), vec![8]);
	assert_eq!(
		*embedding.texts.lock().expect("texts lock"),
		vec!["regulatory affairs manager SFDA pharma Riyadh Jeddah KSA".to_string()]
	);

	let history = service.sessions.history(&response.conversation_id);

	assert_eq!(history.len(), 2);
	assert_eq!(history[0].content, "regulatory affairs manager Saudi Arabia");
	assert_eq!(history[1].content, response.summary);
}

#[tokio::test]
async fn follow_up_turns_see_conversation_history() {
	let index = Arc::new(StubIndex::with_results(40, pool(3)));
	let completion = Arc::new(ScriptedCompletion {
		rewrite: Some("rewritten".to_string()),
		summary: Some("Three regulatory leads.".to_string()),
		..ScriptedCompletion::new()
	});
	let service = service_with(index, Arc::new(StubEmbedding::new()), completion.clone());
	let first = service.chat(chat_request(3)).await.expect("Chat failed.");
	let follow_up = ChatRequest {
		query: "only Arabic speakers".to_string(),
		conversation_id: Some(first.conversation_id.clone()),
		top_k: Some(3),
	};
	let second = service.chat(follow_up).await.expect("Chat failed.");

	assert_eq!(second.conversation_id, first.conversation_id);

	let rewrites = completion.prompts_containing("Rewrite this candidate search query");

	assert_eq!(rewrites.len(), 2);
	assert!(!rewrites[0].contains("Conversation history"));
	assert!(rewrites[1].contains(
		"USER: regulatory affairs manager Saudi Arabia\nASSISTANT: Three regulatory leads."
	));
	assert_eq!(service.sessions.history(&first.conversation_id).len(), 4);
}

#[tokio::test]
async fn malformed_rerank_reply_keeps_the_first_candidates() {
	let index = Arc::new(StubIndex::with_results(40, pool(6)));
	let completion = Arc::new(ScriptedCompletion {
		rerank: Some("The best ones are 2 and 5.".to_string()),
		..ScriptedCompletion::new()
	});
	let service = service_with(index, Arc::new(StubEmbedding::new()), completion);
	let response = service.chat(chat_request(3)).await.expect("Chat failed.");

	assert_eq!(ids(&response.candidates), ["c0", "c1", "c2"]);
}

#[tokio::test]
async fn failed_explanations_use_the_deterministic_fallback() {
	let mut top = candidate("c0", "Candidate 0", 0.9);

	top.attributes.top_skills = "Go, Rust".to_string();
	top.attributes.current_title = "Backend Engineer".to_string();
	top.attributes.industry = "Fintech".to_string();
	top.attributes.skills = "Go, Rust, Kafka, ".repeat(10);

	let index = Arc::new(StubIndex::with_results(40, vec![top]));
	let service =
		service_with(index, Arc::new(StubEmbedding::new()), Arc::new(ScriptedCompletion::new()));
	let response = service.chat(chat_request(1)).await.expect("Chat failed.");
	let result = &response.candidates[0];

	assert_eq!(result.why_match.as_deref(), Some("Relevant based on Go, Rust."));
	assert_eq!(
		result.highlights,
		vec![
			"Backend Engineer".to_string(),
			"Fintech".to_string(),
			"Go, Rust, Kafka, ".repeat(10).chars().take(80).collect::<String>(),
		]
	);
	assert_eq!(response.summary, "Found 1 candidates matching your search.");
}

#[tokio::test]
async fn enrichment_keeps_at_most_three_calls_in_flight_and_preserves_order() {
	let index = Arc::new(StubIndex::with_results(40, pool(10)));
	// Earlier candidates in the ranked order take longer, so calls finish out of order.
	let explain_delays =
		(0..10).map(|i| (format!("Candidate {i}"), Duration::from_millis(10 + i as u64 * 15))).collect();
	let completion = Arc::new(ScriptedCompletion {
		rerank: Some("[10, 9, 8, 7, 6, 5, 4, 3, 2, 1]".to_string()),
		echo_explain: true,
		explain_delays,
		..ScriptedCompletion::new()
	});
	let service = service_with(index, Arc::new(StubEmbedding::new()), completion.clone());
	let response = service.chat(chat_request(10)).await.expect("Chat failed.");
	let max_in_flight = completion.max_in_flight.load(Ordering::SeqCst);
	let ranked = ["c9", "c8", "c7", "c6", "c5", "c4", "c3", "c2", "c1", "c0"];
	let finished = completion.explain_finished.lock().expect("finished lock").clone();

	assert_eq!(finished.len(), 10);
	assert_ne!(finished[0], "Candidate 9", "Calls finished in input order.");
	assert_eq!(ids(&response.candidates), ranked);

	for (result, id) in response.candidates.iter().zip(ranked) {
		let name = format!("Candidate {}", &id[1..]);

		assert_eq!(result.why_match.as_deref(), Some(format!("Matched {name}.").as_str()));
		assert_eq!(result.highlights, vec![name]);
	}

	assert!(max_in_flight <= ENRICHMENT_CONCURRENCY, "Saw {max_in_flight} concurrent calls.");
	assert!(max_in_flight >= 2, "Enrichment did not run concurrently.");
	assert_eq!(completion.prompts_containing("You are writing search results").len(), 10);
}

#[tokio::test]
async fn embedding_failure_fails_the_chat_request() {
	let completion = Arc::new(ScriptedCompletion {
		rewrite: Some("FAIL rewritten".to_string()),
		..ScriptedCompletion::new()
	});
	let index = Arc::new(StubIndex::with_results(40, pool(3)));
	let service = service_with(index.clone(), Arc::new(StubEmbedding::failing_on("FAIL")), completion);
	let err = service.chat(chat_request(3)).await.expect_err("Expected failure.");

	assert!(matches!(err, Error::Embedding { .. }), "Unexpected error: {err:?}");
	assert_eq!(index.searches(), 0);
}

#[tokio::test]
async fn no_matches_returns_fixed_summary_without_recording_history() {
	let completion = Arc::new(ScriptedCompletion::new());
	let service =
		service_with(Arc::new(StubIndex::new(40)), Arc::new(StubEmbedding::new()), completion.clone());
	let response = service.chat(chat_request(5)).await.expect("Chat failed.");

	assert!(response.candidates.is_empty());
	assert_eq!(response.summary, NO_RESULTS_SUMMARY);
	assert!(service.sessions.history(&response.conversation_id).is_empty());
	assert!(completion.prompts_containing("You are ranking candidates").is_empty());
}

#[tokio::test]
async fn top_k_outside_range_is_rejected() {
	let service = service_with(
		Arc::new(StubIndex::new(40)),
		Arc::new(StubEmbedding::new()),
		Arc::new(ScriptedCompletion::new()),
	);

	assert!(matches!(service.chat(chat_request(0)).await, Err(Error::InvalidRequest { .. })));
	assert!(matches!(service.chat(chat_request(51)).await, Err(Error::InvalidRequest { .. })));
}
