pub mod brain_search;
pub mod cluster_build;
pub mod cluster_read;
pub mod episode;
pub mod prompt;
pub mod time_serde;
pub mod vector_search;

use std::{future::Future, pin::Pin, sync::Arc};

use brain_config::{Config, EmbeddingProviderConfig};
use brain_domain::{entity::Entity, profile::ProfileRegistry, scope::Scope};
use brain_store::{GraphStore, IndexProfileStore, SignalStore, VectorIndexStore};

pub use brain_search::{
	BrainSearchFilter, BrainSearchOptions, BrainSearchRequest, BrainSearchResponse, EpisodeHit,
	GraphEdgeOut, GraphNodeOut, Passage,
};
pub use cluster_build::{BuildClustersRequest, BuildClustersResponse};
pub use cluster_read::ClusterRow;
pub use episode::{
	Episode, EpisodeMember, EpisodeSignal, ListEpisodesRequest, ListEpisodesResponse, MemberKind,
};
pub use prompt::{Citation, PromptPack};
pub use vector_search::{SearchHit, VectorSearchRequest};

pub type ServiceResult<T> = Result<T, ServiceError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		model: &'a str,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

#[derive(Debug)]
pub enum ServiceError {
	Validation { message: String },
	ProfileNotFound { profile_id: String },
	ScopeMismatch { node_id: String },
	Provider { message: String },
	Store { message: String },
}

impl std::fmt::Display for ServiceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Validation { message } => write!(f, "Invalid request: {message}"),
			Self::ProfileNotFound { profile_id } => {
				write!(f, "Unknown index profile: {profile_id}.")
			},
			Self::ScopeMismatch { node_id } => {
				write!(f, "Node {node_id} is outside the requested tenant/project scope.")
			},
			Self::Provider { message } => write!(f, "Provider error: {message}"),
			Self::Store { message } => write!(f, "Store error: {message}"),
		}
	}
}

impl std::error::Error for ServiceError {}

impl From<brain_store::Error> for ServiceError {
	fn from(err: brain_store::Error) -> Self {
		Self::Store { message: err.to_string() }
	}
}

impl From<color_eyre::Report> for ServiceError {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

#[derive(Clone)]
pub struct Stores {
	pub graph: Arc<dyn GraphStore>,
	pub vectors: Arc<dyn VectorIndexStore>,
	pub profiles: Arc<dyn IndexProfileStore>,
	pub signals: Arc<dyn SignalStore>,
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		model: &'a str,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(brain_providers::embedding::embed(cfg, model, texts))
	}
}

impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { embedding }
	}
}

impl Default for Providers {
	fn default() -> Self {
		Self { embedding: Arc::new(DefaultProviders) }
	}
}

pub struct BrainService {
	pub cfg: Config,
	pub stores: Stores,
	pub providers: Providers,
	registry: ProfileRegistry,
}

impl BrainService {
	/// Resolves the profile registry once; the registry stays fixed for the
	/// service's lifetime.
	pub async fn new(cfg: Config, stores: Stores) -> ServiceResult<Self> {
		Self::with_providers(cfg, stores, Providers::default()).await
	}

	pub async fn with_providers(
		cfg: Config,
		stores: Stores,
		providers: Providers,
	) -> ServiceResult<Self> {
		let profiles = stores.profiles.list_profiles().await?;
		let registry = ProfileRegistry::new(profiles);

		Ok(Self { cfg, stores, providers, registry })
	}

	pub fn registry(&self) -> &ProfileRegistry {
		&self.registry
	}
}

pub(crate) fn require_scope(tenant_id: &str, project_key: &str) -> ServiceResult<Scope> {
	let tenant_id = tenant_id.trim();
	let project_key = project_key.trim();

	if tenant_id.is_empty() || project_key.is_empty() {
		return Err(ServiceError::Validation {
			message: "tenant_id and project_key are required.".to_string(),
		});
	}

	Ok(Scope::new(tenant_id, project_key))
}

/// Recency sort shared by seed selection and cluster listing: newest first,
/// missing timestamps last, ties kept in store order.
pub(crate) fn sort_by_recency_desc(entities: &mut [Entity]) {
	entities.sort_by(|a, b| match (a.recency(), b.recency()) {
		(Some(a_ts), Some(b_ts)) => b_ts.cmp(&a_ts),
		(Some(_), None) => std::cmp::Ordering::Less,
		(None, Some(_)) => std::cmp::Ordering::Greater,
		(None, None) => std::cmp::Ordering::Equal,
	});
}
