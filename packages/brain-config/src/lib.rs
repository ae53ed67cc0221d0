mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Clustering, Config, EmbeddingProviderConfig, Passages, Providers, Search, Signals,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn normalize(cfg: &mut Config) {
	let embedding = &mut cfg.providers.embedding;

	embedding.provider_id = embedding.provider_id.trim().to_string();
	embedding.api_base = embedding.api_base.trim().trim_end_matches('/').to_string();
	embedding.path = embedding.path.trim().to_string();
	cfg.clustering.algorithm = cfg.clustering.algorithm.trim().to_string();
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.clustering.max_seeds == 0 || cfg.clustering.max_seeds > 200 {
		return Err(Error::Validation {
			message: "clustering.max_seeds must be between 1 and 200.".to_string(),
		});
	}
	if cfg.clustering.max_cluster_size < 2 {
		return Err(Error::Validation {
			message: "clustering.max_cluster_size must be at least 2.".to_string(),
		});
	}
	if cfg.clustering.max_neighbors == 0 {
		return Err(Error::Validation {
			message: "clustering.max_neighbors must be greater than zero.".to_string(),
		});
	}
	if !cfg.clustering.similarity_threshold.is_finite()
		|| cfg.clustering.similarity_threshold < 0.0
		|| cfg.clustering.similarity_threshold > 1.0
	{
		return Err(Error::Validation {
			message: "clustering.similarity_threshold must be a finite number in [0, 1]."
				.to_string(),
		});
	}
	if cfg.clustering.algorithm.is_empty() {
		return Err(Error::Validation {
			message: "clustering.algorithm must be non-empty.".to_string(),
		});
	}
	if cfg.search.top_k == 0 || cfg.search.top_k > 200 {
		return Err(Error::Validation {
			message: "search.top_k must be between 1 and 200.".to_string(),
		});
	}
	if cfg.search.max_episodes > 200 {
		return Err(Error::Validation {
			message: "search.max_episodes must be at most 200.".to_string(),
		});
	}
	if cfg.search.expand_depth > 3 {
		return Err(Error::Validation {
			message: "search.expand_depth must be at most 3.".to_string(),
		});
	}
	if cfg.search.max_nodes == 0 || cfg.search.max_nodes > 1_000 {
		return Err(Error::Validation {
			message: "search.max_nodes must be between 1 and 1000.".to_string(),
		});
	}
	if cfg.search.edge_fetch_limit == 0 {
		return Err(Error::Validation {
			message: "search.edge_fetch_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.passages.per_node_chars == 0 {
		return Err(Error::Validation {
			message: "passages.per_node_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.passages.total_chars < cfg.passages.per_node_chars {
		return Err(Error::Validation {
			message: "passages.total_chars must be at least passages.per_node_chars.".to_string(),
		});
	}
	if cfg.signals.max_per_source == 0 {
		return Err(Error::Validation {
			message: "signals.max_per_source must be greater than zero.".to_string(),
		});
	}

	let embedding = &cfg.providers.embedding;

	if embedding.provider_id.is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.provider_id must be non-empty.".to_string(),
		});
	}
	if embedding.api_base.is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.api_base must be non-empty.".to_string(),
		});
	}
	if embedding.path.is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.path must be non-empty.".to_string(),
		});
	}
	if embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}
