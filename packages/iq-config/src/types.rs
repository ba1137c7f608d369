use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub agent: Agent,
	#[serde(default)]
	pub chat: Chat,
	#[serde(default)]
	pub sessions: Sessions,
	#[serde(default)]
	pub ingest: Ingest,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Upper bound for any single call to an external dependency. A call that runs past it is
	/// handled exactly like a failed call.
	#[serde(default = "default_call_timeout_ms")]
	pub call_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	#[serde(default = "default_qdrant_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Agent {
	/// Number of candidates requested from the vector index on every search turn.
	pub search_breadth: u32,
	pub default_min_results: u32,
	pub default_top_k: u32,
}
impl Default for Agent {
	fn default() -> Self {
		Self { search_breadth: 20, default_min_results: 10, default_top_k: 10 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Chat {
	pub default_top_k: u32,
	pub max_top_k: u32,
	/// Vector search over-fetches `top_k * candidate_multiplier` before reranking.
	pub candidate_multiplier: u32,
}
impl Default for Chat {
	fn default() -> Self {
		Self { default_top_k: 5, max_top_k: 50, candidate_multiplier: 4 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Sessions {
	pub max_turns: u32,
	pub max_sessions: u32,
	pub ttl_seconds: u64,
}
impl Default for Sessions {
	fn default() -> Self {
		Self { max_turns: 20, max_sessions: 1_024, ttl_seconds: 3_600 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ingest {
	pub batch_size: u32,
}
impl Default for Ingest {
	fn default() -> Self {
		Self { batch_size: 64 }
	}
}

fn default_call_timeout_ms() -> u64 {
	30_000
}

fn default_qdrant_timeout_ms() -> u64 {
	10_000
}
