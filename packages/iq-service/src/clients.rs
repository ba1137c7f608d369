//! Timeout-bounded handles over the external collaborators. A call that runs past the service
//! call timeout fails the same way the underlying call would.

use std::time::Duration;

use tokio::time;

use crate::{
	CandidateSource, CompletionProvider, EmbeddingProvider, Error, Result, VectorIndex,
};
use iq_config::{EmbeddingProviderConfig, LlmProviderConfig};
use iq_domain::{CandidateMatch, CandidateProfile, SearchFilter};
use iq_storage::models::FetchedCandidates;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
	pub prompt: String,
	pub max_tokens: u32,
	pub temperature: f32,
}
impl CompletionRequest {
	pub fn new(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
		Self { prompt: prompt.into(), max_tokens, temperature }
	}
}

#[derive(Clone, Copy)]
pub struct CompletionClient<'a> {
	provider: &'a dyn CompletionProvider,
	cfg: &'a LlmProviderConfig,
	timeout: Duration,
}
impl<'a> CompletionClient<'a> {
	pub fn new(
		provider: &'a dyn CompletionProvider,
		cfg: &'a LlmProviderConfig,
		timeout: Duration,
	) -> Self {
		Self { provider, cfg, timeout }
	}

	pub async fn complete(&self, request: &CompletionRequest) -> Result<String> {
		match time::timeout(self.timeout, self.provider.complete(self.cfg, request)).await {
			Ok(Ok(text)) => Ok(text),
			Ok(Err(err)) => Err(Error::Completion { message: err.to_string() }),
			Err(_) => Err(Error::Completion { message: "Completion call timed out.".to_string() }),
		}
	}
}

#[derive(Clone, Copy)]
pub struct EmbeddingClient<'a> {
	provider: &'a dyn EmbeddingProvider,
	cfg: &'a EmbeddingProviderConfig,
	timeout: Duration,
}
impl<'a> EmbeddingClient<'a> {
	pub fn new(
		provider: &'a dyn EmbeddingProvider,
		cfg: &'a EmbeddingProviderConfig,
		timeout: Duration,
	) -> Self {
		Self { provider, cfg, timeout }
	}

	pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		let vectors = match time::timeout(self.timeout, self.provider.embed(self.cfg, texts)).await
		{
			Ok(Ok(vectors)) => vectors,
			Ok(Err(err)) => return Err(Error::Embedding { message: err.to_string() }),
			Err(_) =>
				return Err(Error::Embedding { message: "Embedding call timed out.".to_string() }),
		};

		if vectors.len() != texts.len() {
			return Err(Error::Embedding {
				message: format!("Expected {} vectors, got {}.", texts.len(), vectors.len()),
			});
		}
		if let Some(vector) =
			vectors.iter().find(|vector| vector.len() != self.cfg.dimensions as usize)
		{
			return Err(Error::Embedding {
				message: format!(
					"Embedding has {} dimensions, expected {}.",
					vector.len(),
					self.cfg.dimensions
				),
			});
		}

		Ok(vectors)
	}

	pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
		let mut vectors = self.embed(&[text.to_string()]).await?;

		vectors.pop().ok_or_else(|| Error::Embedding {
			message: "Embedding provider returned no vectors.".to_string(),
		})
	}
}

#[derive(Clone, Copy)]
pub struct IndexClient<'a> {
	index: &'a dyn VectorIndex,
	timeout: Duration,
}
impl<'a> IndexClient<'a> {
	pub fn new(index: &'a dyn VectorIndex, timeout: Duration) -> Self {
		Self { index, timeout }
	}

	pub async fn search(
		&self,
		vector: &[f32],
		top_k: u32,
		filter: Option<&SearchFilter>,
	) -> Result<Vec<CandidateMatch>> {
		bounded(self.timeout, "Vector search", self.index.search(vector, top_k, filter)).await
	}

	pub async fn count(&self) -> Result<u64> {
		bounded(self.timeout, "Vector count", self.index.count()).await
	}

	pub async fn upsert(&self, profiles: &[CandidateProfile], vectors: Vec<Vec<f32>>) -> Result<()> {
		bounded(self.timeout, "Vector upsert", self.index.upsert(profiles, vectors)).await
	}

	pub async fn wipe(&self) -> Result<()> {
		bounded(self.timeout, "Vector wipe", self.index.wipe()).await
	}
}

pub(crate) async fn fetch_candidates(
	source: &dyn CandidateSource,
	timeout: Duration,
) -> Result<FetchedCandidates> {
	bounded(timeout, "Candidate fetch", source.fetch_all()).await
}

pub(crate) async fn count_candidates(source: &dyn CandidateSource, timeout: Duration) -> Result<u64> {
	bounded(timeout, "Candidate count", source.count()).await
}

async fn bounded<T, F>(timeout: Duration, label: &str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	match time::timeout(timeout, fut).await {
		Ok(result) => result,
		Err(_) => Err(Error::DependencyUnavailable { message: format!("{label} timed out.") }),
	}
}
