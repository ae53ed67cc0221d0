use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub clustering: Clustering,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub passages: Passages,
	#[serde(default)]
	pub signals: Signals,
	pub providers: Providers,
}

#[derive(Debug, Deserialize)]
pub struct Clustering {
	/// Seeds considered per run before clamping against the request.
	#[serde(default = "default_max_seeds")]
	pub max_seeds: u32,
	#[serde(default = "default_max_cluster_size")]
	pub max_cluster_size: u32,
	/// Per-seed nearest-neighbor fan-out cap.
	#[serde(default = "default_max_neighbors")]
	pub max_neighbors: u32,
	/// Neighbors scoring below this are rejected; the boundary itself is admitted.
	#[serde(default = "default_similarity_threshold")]
	pub similarity_threshold: f32,
	#[serde(default = "default_algorithm")]
	pub algorithm: String,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	#[serde(default = "default_top_k")]
	pub top_k: u32,
	#[serde(default = "default_max_episodes")]
	pub max_episodes: u32,
	#[serde(default = "default_expand_depth")]
	pub expand_depth: u32,
	#[serde(default = "default_max_nodes")]
	pub max_nodes: u32,
	/// Edge rows fetched per node and direction during graph expansion.
	#[serde(default = "default_edge_fetch_limit")]
	pub edge_fetch_limit: u32,
	#[serde(default = "default_enforce_secured")]
	pub enforce_secured: bool,
}

#[derive(Debug, Deserialize)]
pub struct Passages {
	#[serde(default = "default_per_node_chars")]
	pub per_node_chars: u32,
	#[serde(default = "default_total_chars")]
	pub total_chars: u32,
}

#[derive(Debug, Deserialize)]
pub struct Signals {
	#[serde(default = "default_max_per_source")]
	pub max_per_source: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

impl Default for Clustering {
	fn default() -> Self {
		Self {
			max_seeds: default_max_seeds(),
			max_cluster_size: default_max_cluster_size(),
			max_neighbors: default_max_neighbors(),
			similarity_threshold: default_similarity_threshold(),
			algorithm: default_algorithm(),
		}
	}
}

impl Default for Search {
	fn default() -> Self {
		Self {
			top_k: default_top_k(),
			max_episodes: default_max_episodes(),
			expand_depth: default_expand_depth(),
			max_nodes: default_max_nodes(),
			edge_fetch_limit: default_edge_fetch_limit(),
			enforce_secured: default_enforce_secured(),
		}
	}
}

impl Default for Passages {
	fn default() -> Self {
		Self { per_node_chars: default_per_node_chars(), total_chars: default_total_chars() }
	}
}

impl Default for Signals {
	fn default() -> Self {
		Self { max_per_source: default_max_per_source() }
	}
}

fn default_max_seeds() -> u32 {
	25
}

fn default_max_cluster_size() -> u32 {
	5
}

fn default_max_neighbors() -> u32 {
	16
}

fn default_similarity_threshold() -> f32 {
	0.35
}

fn default_algorithm() -> String {
	"vector-knn-v1".to_string()
}

fn default_top_k() -> u32 {
	20
}

fn default_max_episodes() -> u32 {
	10
}

fn default_expand_depth() -> u32 {
	1
}

fn default_max_nodes() -> u32 {
	200
}

fn default_edge_fetch_limit() -> u32 {
	64
}

fn default_enforce_secured() -> bool {
	true
}

fn default_per_node_chars() -> u32 {
	2_000
}

fn default_total_chars() -> u32 {
	30_000
}

fn default_max_per_source() -> u32 {
	8
}
