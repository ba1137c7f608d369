mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Agent, Chat, Config, EmbeddingProviderConfig, Ingest, LlmProviderConfig, Postgres, Providers,
	Qdrant, Service, Sessions, Storage,
};

use std::{fs, path::Path};

/// Hard ceiling on research iterations. Requests may ask for fewer, never more.
pub const MAX_AGENT_ITERATIONS: u32 = 5;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.call_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "service.call_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}

	for (label, key) in
		[("embedding", &cfg.providers.embedding.api_key), ("llm", &cfg.providers.llm.api_key)]
	{
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}
	for (label, timeout_ms) in [
		("providers.embedding.timeout_ms", cfg.providers.embedding.timeout_ms),
		("providers.llm.timeout_ms", cfg.providers.llm.timeout_ms),
		("storage.qdrant.timeout_ms", cfg.storage.qdrant.timeout_ms),
	] {
		if timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if cfg.agent.search_breadth == 0 {
		return Err(Error::Validation {
			message: "agent.search_breadth must be greater than zero.".to_string(),
		});
	}
	if cfg.agent.default_min_results == 0 {
		return Err(Error::Validation {
			message: "agent.default_min_results must be greater than zero.".to_string(),
		});
	}
	if cfg.agent.default_top_k == 0 {
		return Err(Error::Validation {
			message: "agent.default_top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.chat.max_top_k == 0 {
		return Err(Error::Validation {
			message: "chat.max_top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.chat.default_top_k == 0 || cfg.chat.default_top_k > cfg.chat.max_top_k {
		return Err(Error::Validation {
			message: "chat.default_top_k must be between 1 and chat.max_top_k.".to_string(),
		});
	}
	if cfg.chat.candidate_multiplier == 0 {
		return Err(Error::Validation {
			message: "chat.candidate_multiplier must be greater than zero.".to_string(),
		});
	}
	if cfg.sessions.max_turns == 0 {
		return Err(Error::Validation {
			message: "sessions.max_turns must be greater than zero.".to_string(),
		});
	}
	if cfg.sessions.max_sessions == 0 {
		return Err(Error::Validation {
			message: "sessions.max_sessions must be greater than zero.".to_string(),
		});
	}
	if cfg.sessions.ttl_seconds == 0 {
		return Err(Error::Validation {
			message: "sessions.ttl_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.ingest.batch_size == 0 {
		return Err(Error::Validation {
			message: "ingest.batch_size must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}

	for api_base in [&mut cfg.providers.embedding.api_base, &mut cfg.providers.llm.api_base] {
		let trimmed = api_base.trim().trim_end_matches('/').to_string();

		*api_base = trimmed;
	}
}
