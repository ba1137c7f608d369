pub mod agent;
pub mod chat;
pub mod clients;
pub mod enrich;
pub mod health;
pub mod ingest;
pub mod limiter;
pub mod llm_json;
pub mod oracle;
pub mod rerank;
pub mod research;
pub mod results;
pub mod rewrite;
pub mod session;
pub mod summary;
pub mod time_serde;

mod error;

pub use agent::{
	AgentIterationLog, AgentRunState, FunnelAgentLoop, FunnelLevel, SearchOutcome, StopReason,
};
pub use chat::{ChatRequest, ChatResponse};
pub use clients::{CompletionClient, CompletionRequest, EmbeddingClient, IndexClient};
pub use enrich::{ENRICHMENT_CONCURRENCY, EnrichmentPipeline};
pub use error::{Error, Result};
pub use health::{HealthResponse, HealthStatus};
pub use ingest::{IngestRequest, IngestResponse, IngestStatus};
pub use limiter::ConcurrencyLimiter;
pub use oracle::{AgentAction, AgentDecision, DecisionOracle, LlmOracle, OracleContext};
pub use rerank::{RerankFallback, RerankerService};
pub use research::{ResearchRequest, ResearchResponse};
pub use results::CandidateResult;
pub use session::{SessionStore, Turn, TurnRole};
pub use summary::SummaryGenerator;

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use iq_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use iq_domain::{CandidateMatch, CandidateProfile, SearchFilter};
use iq_providers::{completion, embedding};
use iq_storage::{db::Db, models::FetchedCandidates, qdrant::QdrantStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: &'a CompletionRequest,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

/// Similarity index over candidate vectors.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	/// Most similar first. Empty when nothing is indexed; never repeats an id within one call.
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		top_k: u32,
		filter: Option<&'a SearchFilter>,
	) -> BoxFuture<'a, Result<Vec<CandidateMatch>>>;

	fn count(&self) -> BoxFuture<'_, Result<u64>>;

	fn upsert<'a>(
		&'a self,
		profiles: &'a [CandidateProfile],
		vectors: Vec<Vec<f32>>,
	) -> BoxFuture<'a, Result<()>>;

	fn wipe(&self) -> BoxFuture<'_, Result<()>>;
}

/// Source of record for candidate profiles.
pub trait CandidateSource
where
	Self: Send + Sync,
{
	fn fetch_all(&self) -> BoxFuture<'_, Result<FetchedCandidates>>;

	fn count(&self) -> BoxFuture<'_, Result<u64>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub completion: Arc<dyn CompletionProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		completion: Arc<dyn CompletionProvider>,
	) -> Self {
		Self { embedding, completion }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), completion: provider }
	}
}

pub struct IqService {
	pub cfg: Config,
	pub source: Arc<dyn CandidateSource>,
	pub index: Arc<dyn VectorIndex>,
	pub providers: Providers,
	pub sessions: SessionStore,
}
impl IqService {
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Self {
		Self::with_parts(cfg, Arc::new(db), Arc::new(qdrant), Providers::default())
	}

	pub fn with_parts(
		cfg: Config,
		source: Arc<dyn CandidateSource>,
		index: Arc<dyn VectorIndex>,
		providers: Providers,
	) -> Self {
		let sessions = SessionStore::from_config(&cfg.sessions);

		Self { cfg, source, index, providers, sessions }
	}

	pub fn call_timeout(&self) -> Duration {
		Duration::from_millis(self.cfg.service.call_timeout_ms)
	}

	pub fn completion_client(&self) -> CompletionClient<'_> {
		CompletionClient::new(
			self.providers.completion.as_ref(),
			&self.cfg.providers.llm,
			self.call_timeout(),
		)
	}

	pub fn embedding_client(&self) -> EmbeddingClient<'_> {
		EmbeddingClient::new(
			self.providers.embedding.as_ref(),
			&self.cfg.providers.embedding,
			self.call_timeout(),
		)
	}

	pub fn index_client(&self) -> IndexClient<'_> {
		IndexClient::new(self.index.as_ref(), self.call_timeout())
	}

	/// Fails with `NoCandidatesIndexed` before any model is consulted.
	pub(crate) async fn ensure_indexed(&self) -> Result<u64> {
		let indexed = self.index_client().count().await?;

		if indexed == 0 {
			tracing::warn!("Vector index is empty.");

			return Err(Error::NoCandidatesIndexed);
		}

		Ok(indexed)
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}
impl CompletionProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: &'a CompletionRequest,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(completion::complete(
			cfg,
			&request.prompt,
			request.max_tokens,
			request.temperature,
		))
	}
}

impl VectorIndex for QdrantStore {
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		top_k: u32,
		filter: Option<&'a SearchFilter>,
	) -> BoxFuture<'a, Result<Vec<CandidateMatch>>> {
		Box::pin(async move { Ok(QdrantStore::search(self, vector, top_k, filter).await?) })
	}

	fn count(&self) -> BoxFuture<'_, Result<u64>> {
		Box::pin(async move { Ok(QdrantStore::count(self).await?) })
	}

	fn upsert<'a>(
		&'a self,
		profiles: &'a [CandidateProfile],
		vectors: Vec<Vec<f32>>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(QdrantStore::upsert(self, profiles, vectors).await?) })
	}

	fn wipe(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move { Ok(QdrantStore::wipe(self).await?) })
	}
}

impl CandidateSource for Db {
	fn fetch_all(&self) -> BoxFuture<'_, Result<FetchedCandidates>> {
		Box::pin(async move { Ok(self.fetch_all_candidates().await?) })
	}

	fn count(&self) -> BoxFuture<'_, Result<u64>> {
		Box::pin(async move { Ok(self.count_candidates().await?) })
	}
}
