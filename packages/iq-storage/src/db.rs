use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
	Result,
	models::{CandidateRow, FetchedCandidates},
	queries,
};

pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &iq_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	pub fn from_pool(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Reads every candidate, newest first. Malformed rows are reported, not returned.
	pub async fn fetch_all_candidates(&self) -> Result<FetchedCandidates> {
		let rows: Vec<CandidateRow> =
			sqlx::query_as(queries::FETCH_ALL_CANDIDATES).fetch_all(&self.pool).await?;
		let mut fetched = FetchedCandidates::default();

		for row in rows {
			let id = row.id.clone().unwrap_or_default();

			match row.into_profile() {
				Some(profile) => fetched.candidates.push(profile),
				None => fetched.skipped.push(id),
			}
		}

		Ok(fetched)
	}

	pub async fn count_candidates(&self) -> Result<u64> {
		let count: i64 = sqlx::query_scalar(queries::COUNT_CANDIDATES).fetch_one(&self.pool).await?;

		Ok(u64::try_from(count).unwrap_or(0))
	}
}
