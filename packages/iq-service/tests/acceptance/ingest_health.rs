use std::sync::{Arc, atomic::Ordering};

use super::{
	ScriptedCompletion, StubEmbedding, StubIndex, StubSource, build_service, test_config,
};
use iq_domain::CandidateProfile;
use iq_service::{Error, HealthStatus, IngestRequest, IngestStatus};

fn profiles(count: usize) -> Vec<CandidateProfile> {
	(0..count)
		.map(|i| CandidateProfile {
			id: format!("c{i}"),
			name: format!("Candidate {i}"),
			skills: Some("Regulatory Strategy".to_string()),
			..Default::default()
		})
		.collect()
}

#[tokio::test]
async fn ingest_embeds_in_batches_and_counts_failed_batches() {
	let mut candidates = profiles(130);

	candidates[70].name = "FAIL Candidate".to_string();

	let index = Arc::new(StubIndex::new(0));
	let embedding = Arc::new(StubEmbedding::failing_on("FAIL"));
	let service = build_service(
		test_config(),
		Arc::new(StubSource::with(candidates)),
		index.clone(),
		embedding.clone(),
		Arc::new(ScriptedCompletion::new()),
	);
	let response = service.ingest(IngestRequest::default()).await.expect("Ingest failed.");

	assert_eq!(response.status, IngestStatus::Partial);
	assert_eq!(response.total_processed, 66);
	assert_eq!(response.message, "Indexed 66 candidates. 64 failed. Check logs.");
	assert_eq!(embedding.count(), 3);

	let upserted = index.upserted.lock().expect("upserted lock");

	assert_eq!(upserted.len(), 66);
	assert_eq!(upserted[0], "c0");
	assert_eq!(upserted[64], "c128");
	assert_eq!(index.wipes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn forced_ingest_wipes_first_and_reports_done() {
	let index = Arc::new(StubIndex::new(0));
	let embedding = Arc::new(StubEmbedding::new());
	let service = build_service(
		test_config(),
		Arc::new(StubSource::with(profiles(3))),
		index.clone(),
		embedding.clone(),
		Arc::new(ScriptedCompletion::new()),
	);

	service.ingest(IngestRequest::default()).await.expect("Ingest failed.");

	let response =
		service.ingest(IngestRequest { force_reingest: true }).await.expect("Ingest failed.");

	assert_eq!(response.status, IngestStatus::Done);
	assert_eq!(response.total_processed, 3);
	assert_eq!(response.message, "Indexed 3 candidates successfully.");
	assert_eq!(index.wipes.load(Ordering::SeqCst), 1);
	assert_eq!(index.upserted.lock().expect("upserted lock").len(), 3);

	let texts = embedding.texts.lock().expect("texts lock");

	assert_eq!(texts[0], "Candidate 0. Skills: Regulatory Strategy");
}

#[tokio::test]
async fn ingest_errors_are_classified() {
	let empty = build_service(
		test_config(),
		Arc::new(StubSource::with(Vec::new())),
		Arc::new(StubIndex::new(0)),
		Arc::new(StubEmbedding::new()),
		Arc::new(ScriptedCompletion::new()),
	);
	let unreachable = build_service(
		test_config(),
		Arc::new(StubSource::unreachable()),
		Arc::new(StubIndex::new(0)),
		Arc::new(StubEmbedding::new()),
		Arc::new(ScriptedCompletion::new()),
	);
	let wipe_fails = build_service(
		test_config(),
		Arc::new(StubSource::with(profiles(1))),
		Arc::new(StubIndex { fail_wipe: true, ..StubIndex::new(5) }),
		Arc::new(StubEmbedding::new()),
		Arc::new(ScriptedCompletion::new()),
	);

	assert!(matches!(
		empty.ingest(IngestRequest::default()).await,
		Err(Error::NotFound { .. })
	));
	assert!(matches!(
		unreachable.ingest(IngestRequest::default()).await,
		Err(Error::DependencyUnavailable { .. })
	));
	assert!(matches!(
		wipe_fails.ingest(IngestRequest { force_reingest: true }).await,
		Err(Error::DependencyUnavailable { .. })
	));
}

#[tokio::test]
async fn health_reports_counts_and_database_errors() {
	let healthy = build_service(
		test_config(),
		Arc::new(StubSource::with(profiles(4))),
		Arc::new(StubIndex::new(3)),
		Arc::new(StubEmbedding::new()),
		Arc::new(ScriptedCompletion::new()),
	);
	let broken = build_service(
		test_config(),
		Arc::new(StubSource::unreachable()),
		Arc::new(StubIndex::new(3)),
		Arc::new(StubEmbedding::new()),
		Arc::new(ScriptedCompletion::new()),
	);
	let ok = healthy.health().await;
	let failing = broken.health().await;

	assert_eq!(ok.status, HealthStatus::Ok);
	assert_eq!(ok.candidates_in_db, 4);
	assert_eq!(ok.candidates_indexed, 3);
	assert_eq!(failing.status, HealthStatus::DbError);
	assert_eq!(failing.candidates_in_db, 0);
	assert_eq!(failing.candidates_indexed, 3);
	assert_eq!(
		serde_json::to_value(&failing).expect("serialize")["status"],
		serde_json::json!("db_error")
	);
}
