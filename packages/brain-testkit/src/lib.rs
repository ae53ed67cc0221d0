//! In-memory collaborator implementations and fixtures for exercising the
//! brain core without real backends. The vector index scores by dot
//! product, so tests script exact similarities with one-hot query vectors.

use std::{
	collections::BTreeMap,
	sync::Mutex,
};

use serde_json::{Map, Value};
use time::OffsetDateTime;

use brain_config::{Config, EmbeddingProviderConfig};
use brain_domain::{
	entity::{ENTITY_TYPE_DOC, ENTITY_TYPE_WORK, Edge, Entity},
	profile::{IndexProfile, ProfileKind},
	scope::{Scope, ScopeFilter},
};
use brain_store::{
	BoxFuture, GraphStore, IndexProfileStore, Result, SignalStore, VectorIndexStore,
	models::{
		EdgeFilter, EntityFilter, SignalDefinition, SignalInstance, VectorEntry, VectorHit,
		VectorQueryFilter,
	},
};

#[derive(Default)]
pub struct MemoryGraphStore {
	entities: Mutex<BTreeMap<String, Entity>>,
	edges: Mutex<BTreeMap<(String, String, String), Edge>>,
}

impl MemoryGraphStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert_entity(&self, entity: Entity) {
		let mut entities = lock(&self.entities);

		entities.insert(entity.id.clone(), entity);
	}

	pub fn insert_edge(&self, edge: Edge) {
		let mut edges = lock(&self.edges);
		let (edge_type, source_id, target_id) = edge.logical_key();

		edges.insert(
			(edge_type.to_string(), source_id.to_string(), target_id.to_string()),
			edge,
		);
	}

	pub fn entity(&self, id: &str) -> Option<Entity> {
		lock(&self.entities).get(id).cloned()
	}

	pub fn edges_of_type(&self, edge_type: &str) -> Vec<Edge> {
		lock(&self.edges)
			.values()
			.filter(|edge| edge.edge_type == edge_type)
			.cloned()
			.collect()
	}

	pub fn entity_count(&self) -> usize {
		lock(&self.entities).len()
	}
}

impl GraphStore for MemoryGraphStore {
	// Returns the row whose id matches regardless of scope; enforcement is
	// the caller's job, which is what the scope-mismatch tests exercise.
	fn get_entity<'a>(
		&'a self,
		id: &'a str,
		_scope: &'a ScopeFilter,
	) -> BoxFuture<'a, Result<Option<Entity>>> {
		let entity = self.entity(id);

		Box::pin(async move { Ok(entity) })
	}

	fn list_entities<'a>(
		&'a self,
		filter: &'a EntityFilter,
		scope: &'a ScopeFilter,
	) -> BoxFuture<'a, Result<Vec<Entity>>> {
		let entities: Vec<Entity> = lock(&self.entities)
			.values()
			.filter(|entity| filter.admits(&entity.entity_type) && scope.matches(&entity.scope))
			.cloned()
			.collect();

		Box::pin(async move { Ok(entities) })
	}

	fn list_edges<'a>(
		&'a self,
		filter: &'a EdgeFilter,
		_scope: &'a ScopeFilter,
	) -> BoxFuture<'a, Result<Vec<Edge>>> {
		let mut edges: Vec<Edge> = lock(&self.edges)
			.values()
			.filter(|edge| {
				(filter.edge_types.is_empty()
					|| filter.edge_types.iter().any(|t| *t == edge.edge_type))
					&& filter.source_id.as_deref().is_none_or(|id| id == edge.source_id)
					&& filter.target_id.as_deref().is_none_or(|id| id == edge.target_id)
			})
			.cloned()
			.collect();

		if let Some(limit) = filter.limit {
			edges.truncate(limit);
		}

		Box::pin(async move { Ok(edges) })
	}

	fn upsert_entity<'a>(&'a self, entity: &'a Entity) -> BoxFuture<'a, Result<()>> {
		self.insert_entity(entity.clone());

		Box::pin(async move { Ok(()) })
	}

	fn upsert_edge<'a>(&'a self, edge: &'a Edge) -> BoxFuture<'a, Result<()>> {
		self.insert_edge(edge.clone());

		Box::pin(async move { Ok(()) })
	}
}

#[derive(Default)]
pub struct MemoryVectorIndex {
	entries: Mutex<Vec<VectorEntry>>,
}

impl MemoryVectorIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, entry: VectorEntry) {
		let mut entries = lock(&self.entries);

		entries
			.retain(|row| !(row.profile_id == entry.profile_id && row.node_id == entry.node_id));
		entries.push(entry);
	}
}

impl VectorIndexStore for MemoryVectorIndex {
	fn upsert_entries<'a>(&'a self, entries: &'a [VectorEntry]) -> BoxFuture<'a, Result<()>> {
		for entry in entries {
			self.insert(entry.clone());
		}

		Box::pin(async move { Ok(()) })
	}

	fn query<'a>(
		&'a self,
		profile_id: &'a str,
		embedding: &'a [f32],
		top_k: usize,
		filter: &'a VectorQueryFilter,
	) -> BoxFuture<'a, Result<Vec<VectorHit>>> {
		let mut hits: Vec<VectorHit> = lock(&self.entries)
			.iter()
			.filter(|entry| {
				entry.profile_id == profile_id
					&& entry.tenant_id == filter.tenant_id
					&& filter
						.project_key_in
						.as_deref()
						.is_none_or(|projects| projects.iter().any(|p| *p == entry.project_key))
					&& filter
						.profile_kind_in
						.as_deref()
						.is_none_or(|kinds| kinds.contains(&entry.profile_kind))
			})
			.map(|entry| VectorHit {
				node_id: entry.node_id.clone(),
				score: dot(embedding, &entry.embedding),
				metadata: entry.metadata.clone(),
			})
			.collect();

		hits.sort_by(|a, b| {
			b.score
				.partial_cmp(&a.score)
				.unwrap_or(std::cmp::Ordering::Equal)
				.then_with(|| a.node_id.cmp(&b.node_id))
		});
		hits.truncate(top_k);

		Box::pin(async move { Ok(hits) })
	}
}

pub struct MemoryProfileStore {
	profiles: Vec<IndexProfile>,
}

impl MemoryProfileStore {
	pub fn new(profiles: Vec<IndexProfile>) -> Self {
		Self { profiles }
	}
}

impl IndexProfileStore for MemoryProfileStore {
	fn list_profiles(&self) -> BoxFuture<'_, Result<Vec<IndexProfile>>> {
		let profiles = self.profiles.clone();

		Box::pin(async move { Ok(profiles) })
	}

	fn get_profile<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<IndexProfile>>> {
		let profile = self.profiles.iter().find(|profile| profile.id == id).cloned();

		Box::pin(async move { Ok(profile) })
	}
}

#[derive(Default)]
pub struct MemorySignalStore {
	definitions: Mutex<BTreeMap<String, SignalDefinition>>,
	instances: Mutex<BTreeMap<String, SignalInstance>>,
}

impl MemorySignalStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert_definition(&self, definition: SignalDefinition) {
		lock(&self.definitions).insert(definition.id.clone(), definition);
	}

	pub fn insert_instance(&self, instance: SignalInstance) {
		lock(&self.instances).insert(instance.id.clone(), instance);
	}
}

impl SignalStore for MemorySignalStore {
	fn get_definition<'a>(
		&'a self,
		id: &'a str,
	) -> BoxFuture<'a, Result<Option<SignalDefinition>>> {
		let definition = lock(&self.definitions).get(id).cloned();

		Box::pin(async move { Ok(definition) })
	}

	fn get_instance<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<SignalInstance>>> {
		let instance = lock(&self.instances).get(id).cloned();

		Box::pin(async move { Ok(instance) })
	}
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub const EMBEDDING_DIM: u32 = 4;

pub fn test_config() -> Config {
	Config {
		clustering: Default::default(),
		search: Default::default(),
		passages: Default::default(),
		signals: Default::default(),
		providers: brain_config::Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "stub".to_string(),
				api_base: "http://localhost:9".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/embeddings".to_string(),
				dimensions: EMBEDDING_DIM,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
	}
}

pub fn scope(tenant_id: &str, project_key: &str) -> Scope {
	Scope::new(tenant_id, project_key)
}

pub fn ts(secs: i64) -> OffsetDateTime {
	OffsetDateTime::from_unix_timestamp(secs).expect("Valid unix timestamp.")
}

pub fn work_profile() -> IndexProfile {
	IndexProfile {
		id: "profile-work".to_string(),
		entity_type: ENTITY_TYPE_WORK.to_string(),
		kind: ProfileKind::Work,
		embedding_model: "embed-small".to_string(),
		text_fields: vec!["summary".to_string(), "description".to_string()],
	}
}

pub fn doc_profile() -> IndexProfile {
	IndexProfile {
		id: "profile-doc".to_string(),
		entity_type: ENTITY_TYPE_DOC.to_string(),
		kind: ProfileKind::Doc,
		embedding_model: "embed-small".to_string(),
		text_fields: vec!["title".to_string(), "summary".to_string()],
	}
}

pub fn work_entity(id: &str, scope: &Scope, summary: &str, updated: OffsetDateTime) -> Entity {
	let mut props = Map::new();

	props.insert("summary".to_string(), Value::String(summary.to_string()));

	Entity {
		id: id.to_string(),
		entity_type: ENTITY_TYPE_WORK.to_string(),
		scope: scope.clone(),
		props,
		created_at: Some(updated),
		updated_at: Some(updated),
	}
}

pub fn doc_entity(id: &str, scope: &Scope, title: &str, updated: OffsetDateTime) -> Entity {
	let mut props = Map::new();

	props.insert("title".to_string(), Value::String(title.to_string()));

	Entity {
		id: id.to_string(),
		entity_type: ENTITY_TYPE_DOC.to_string(),
		scope: scope.clone(),
		props,
		created_at: Some(updated),
		updated_at: Some(updated),
	}
}

/// A one-kind vector entry scoring `score` against the all-ones query
/// direction on axis zero.
pub fn vector_entry(
	node_id: &str,
	profile: &IndexProfile,
	scope: &Scope,
	score: f32,
) -> VectorEntry {
	let mut embedding = vec![0.0; EMBEDDING_DIM as usize];

	embedding[0] = score;

	VectorEntry {
		node_id: node_id.to_string(),
		profile_id: profile.id.clone(),
		profile_kind: profile.kind,
		tenant_id: scope.tenant_id.clone(),
		project_key: scope.project_key.clone(),
		embedding,
		metadata: Map::new(),
	}
}
