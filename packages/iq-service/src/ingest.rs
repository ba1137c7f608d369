use serde::{Deserialize, Serialize};

use crate::{Error, IqService, Result, clients};
use iq_domain::text::build_candidate_text;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestRequest {
	#[serde(default)]
	pub force_reingest: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
	Done,
	Partial,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
	pub status: IngestStatus,
	pub total_processed: usize,
	pub message: String,
}

impl IqService {
	/// Embeds every candidate from the source of record into the vector index. A failed batch
	/// is counted and skipped; the run continues with the next one.
	pub async fn ingest(&self, req: IngestRequest) -> Result<IngestResponse> {
		tracing::info!(force_reingest = req.force_reingest, "Ingest started.");

		let index = self.index_client();

		if req.force_reingest {
			index.wipe().await.inspect_err(|err| {
				tracing::error!(error = %err, "Failed to wipe the vector index.");
			})?;

			tracing::info!("Vector index wiped.");
		}

		let fetched = clients::fetch_candidates(self.source.as_ref(), self.call_timeout())
			.await
			.inspect_err(|err| {
				tracing::error!(error = %err, "Failed to fetch candidates.");
			})?;

		if !fetched.skipped.is_empty() {
			tracing::warn!(
				skipped = fetched.skipped.len(),
				ids = ?fetched.skipped,
				"Skipped malformed candidate rows."
			);
		}

		let candidates = fetched.candidates;

		if candidates.is_empty() {
			return Err(Error::NotFound { message: "No candidates found in database.".to_string() });
		}

		tracing::info!(count = candidates.len(), "Fetched candidates.");

		let embedder = self.embedding_client();
		let batch_size = (self.cfg.ingest.batch_size as usize).max(1);
		let mut processed = 0;
		let mut failed = 0;

		for (batch_index, batch) in candidates.chunks(batch_size).enumerate() {
			let texts = batch.iter().map(build_candidate_text).collect::<Vec<_>>();
			let result = match embedder.embed(&texts).await {
				Ok(vectors) => index.upsert(batch, vectors).await,
				Err(err) => Err(err),
			};

			match result {
				Ok(()) => {
					processed += batch.len();

					tracing::info!(processed, total = candidates.len(), "Ingested batch.");
				},
				Err(err) => {
					failed += batch.len();

					tracing::error!(
						batch_start = batch_index * batch_size,
						error = %err,
						"Failed to embed or upsert batch."
					);
				},
			}
		}

		tracing::info!(processed, failed, "Ingest complete.");

		let (status, message) = if failed == 0 {
			(IngestStatus::Done, format!("Indexed {processed} candidates successfully."))
		} else {
			(
				IngestStatus::Partial,
				format!("Indexed {processed} candidates. {failed} failed. Check logs."),
			)
		};

		Ok(IngestResponse { status, total_processed: processed, message })
	}
}
