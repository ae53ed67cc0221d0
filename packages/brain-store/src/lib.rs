//! Collaborator contracts for the brain core. The storage engines behind
//! these traits live elsewhere; this crate fixes the interfaces the core
//! algorithms are written against.

mod error;
pub mod models;

pub use error::{Error, Result};

use std::{future::Future, pin::Pin};

use brain_domain::{
	entity::{Edge, Entity},
	profile::IndexProfile,
	scope::ScopeFilter,
};
use models::{
	EdgeFilter, EntityFilter, SignalDefinition, SignalInstance, VectorEntry, VectorHit,
	VectorQueryFilter,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistent entity/edge graph.
pub trait GraphStore
where
	Self: Send + Sync,
{
	/// Fetches one entity by id. The scope is a routing hint: implementations
	/// return the row whose id matches even when its recorded scope differs,
	/// because scope enforcement (ScopeMismatch vs silent exclusion) is the
	/// caller's responsibility.
	fn get_entity<'a>(
		&'a self,
		id: &'a str,
		scope: &'a ScopeFilter,
	) -> BoxFuture<'a, Result<Option<Entity>>>;

	/// Lists entities whose recorded scope matches the filter.
	fn list_entities<'a>(
		&'a self,
		filter: &'a EntityFilter,
		scope: &'a ScopeFilter,
	) -> BoxFuture<'a, Result<Vec<Entity>>>;

	fn list_edges<'a>(
		&'a self,
		filter: &'a EdgeFilter,
		scope: &'a ScopeFilter,
	) -> BoxFuture<'a, Result<Vec<Edge>>>;

	/// Idempotent on entity id.
	fn upsert_entity<'a>(&'a self, entity: &'a Entity) -> BoxFuture<'a, Result<()>>;

	/// Idempotent on `(edge_type, source_id, target_id)`.
	fn upsert_edge<'a>(&'a self, edge: &'a Edge) -> BoxFuture<'a, Result<()>>;
}

/// Nearest-neighbor index partitioned by profile.
pub trait VectorIndexStore
where
	Self: Send + Sync,
{
	fn upsert_entries<'a>(&'a self, entries: &'a [VectorEntry]) -> BoxFuture<'a, Result<()>>;

	fn query<'a>(
		&'a self,
		profile_id: &'a str,
		embedding: &'a [f32],
		top_k: usize,
		filter: &'a VectorQueryFilter,
	) -> BoxFuture<'a, Result<Vec<VectorHit>>>;
}

pub trait IndexProfileStore
where
	Self: Send + Sync,
{
	fn list_profiles(&self) -> BoxFuture<'_, Result<Vec<IndexProfile>>>;

	fn get_profile<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<IndexProfile>>>;
}

/// Alert/finding store consumed for enrichment only.
pub trait SignalStore
where
	Self: Send + Sync,
{
	fn get_definition<'a>(
		&'a self,
		id: &'a str,
	) -> BoxFuture<'a, Result<Option<SignalDefinition>>>;

	fn get_instance<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<SignalInstance>>>;
}
