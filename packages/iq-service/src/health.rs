use serde::Serialize;

use crate::{IqService, clients};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
	Ok,
	DbError,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
	pub status: HealthStatus,
	pub candidates_in_db: u64,
	pub candidates_indexed: u64,
}

impl IqService {
	/// Never fails. An unreachable source of record is reported through `status`.
	pub async fn health(&self) -> HealthResponse {
		let (status, candidates_in_db) =
			match clients::count_candidates(self.source.as_ref(), self.call_timeout()).await {
				Ok(count) => (HealthStatus::Ok, count),
				Err(err) => {
					tracing::error!(error = %err, "Health check could not reach Postgres.");

					(HealthStatus::DbError, 0)
				},
			};
		let candidates_indexed = self.index_client().count().await.unwrap_or_else(|err| {
			tracing::warn!(error = %err, "Health check could not count indexed vectors.");

			0
		});

		HealthResponse { status, candidates_in_db, candidates_indexed }
	}
}
