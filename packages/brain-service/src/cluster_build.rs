use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;
use time::OffsetDateTime;
use tracing::{info, warn};

use brain_domain::{
	cluster::{ClusterKey, ClusterNode},
	entity::{EDGE_IN_CLUSTER, ENTITY_TYPE_DOC, ENTITY_TYPE_WORK, Edge, Entity},
	profile::{self, ProfileKind},
	scope::{Scope, ScopeFilter},
	window::Window,
};
use brain_store::models::{EntityFilter, VectorQueryFilter};

use crate::{BrainService, ServiceResult, require_scope, sort_by_recency_desc};

const MAX_SEEDS_CAP: u32 = 200;
const NEIGHBOR_KINDS: [ProfileKind; 2] = [ProfileKind::Work, ProfileKind::Doc];

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BuildClustersRequest {
	pub tenant_id: String,
	pub project_key: String,
	#[serde(default, with = "crate::time_serde::option")]
	pub window_start: Option<OffsetDateTime>,
	#[serde(default, with = "crate::time_serde::option")]
	pub window_end: Option<OffsetDateTime>,
	pub max_seeds: Option<u32>,
	pub max_cluster_size: Option<u32>,
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct BuildClustersResponse {
	pub clusters_created: u32,
	pub members_linked: u32,
}

/// A candidate cluster before persistence. Two seeds producing the same
/// member set collapse into one draft: the seed sets union and the score
/// keeps the max.
struct DraftCluster {
	key: ClusterKey,
	seed_ids: BTreeSet<String>,
	score: f32,
}

impl BrainService {
	/// Batch clustering for one tenant+project. Content-addressed cluster
	/// identity makes reruns converge: an unchanged graph yields
	/// `clusters_created = 0` the second time.
	pub async fn build_clusters(
		&self,
		req: BuildClustersRequest,
	) -> ServiceResult<BuildClustersResponse> {
		let scope = require_scope(&req.tenant_id, &req.project_key)?;
		let window = Window::new(req.window_start, req.window_end);
		let max_seeds =
			req.max_seeds.unwrap_or(self.cfg.clustering.max_seeds).clamp(1, MAX_SEEDS_CAP)
				as usize;
		let max_cluster_size =
			req.max_cluster_size.unwrap_or(self.cfg.clustering.max_cluster_size).max(2) as usize;
		let neighbor_k =
			(self.cfg.clustering.max_neighbors as usize).min(max_cluster_size - 1).max(1);
		let threshold = self.cfg.clustering.similarity_threshold;
		let seeds = self.load_seeds(&scope, &window, max_seeds).await?;
		let mut resolved: AHashMap<String, Option<Entity>> = AHashMap::new();
		let mut drafts: BTreeMap<String, DraftCluster> = BTreeMap::new();

		for seed in &seeds {
			let Some(seed_profile) = self.registry().for_entity_type(&seed.entity_type) else {
				warn!(
					entity_id = %seed.id,
					entity_type = %seed.entity_type,
					"No index profile for seed entity type; skipping seed."
				);

				continue;
			};
			let query = profile::query_text(seed, seed_profile).to_string();
			let profiles = self.resolve_profile_set(&seed_profile.id, Some(&NEIGHBOR_KINDS))?;
			let filter = VectorQueryFilter {
				tenant_id: scope.tenant_id.clone(),
				project_key_in: Some(vec![scope.project_key.clone()]),
				profile_kind_in: Some(NEIGHBOR_KINDS.to_vec()),
			};
			let hits = self.search_profiles(&profiles, &query, neighbor_k, &filter).await?;
			let mut members = vec![seed.id.clone()];
			let mut score = 0.0_f32;

			for hit in &hits {
				if hit.node_id == seed.id {
					continue;
				}
				if hit.score > score {
					score = hit.score;
				}
				// Inclusive boundary: a score equal to the threshold is admitted.
				if hit.score < threshold {
					continue;
				}
				if members.len() >= max_cluster_size {
					break;
				}

				let entity = match resolved.get(&hit.node_id) {
					Some(cached) => cached.clone(),
					None => {
						let fetched = self
							.stores
							.graph
							.get_entity(&hit.node_id, &ScopeFilter::from(&scope))
							.await?;

						resolved.insert(hit.node_id.clone(), fetched.clone());

						fetched
					},
				};
				let Some(entity) = entity else {
					warn!(node_id = %hit.node_id, "Neighbor not found in graph; skipping.");

					continue;
				};

				if entity.scope != scope || !entity.kind().is_clusterable() {
					continue;
				}

				members.push(entity.id.clone());
			}

			if members.len() < 2 {
				continue;
			}

			let key = ClusterKey::new(&scope, &window, members);
			let canonical = key.canonical();

			match drafts.get_mut(&canonical) {
				Some(draft) => {
					draft.seed_ids.insert(seed.id.clone());

					if score > draft.score {
						draft.score = score;
					}
				},
				None => {
					let mut seed_ids = BTreeSet::new();

					seed_ids.insert(seed.id.clone());
					drafts.insert(canonical, DraftCluster { key, seed_ids, score });
				},
			}
		}

		let response = self.persist_drafts(&scope, drafts).await?;

		info!(
			tenant_id = %scope.tenant_id,
			project_key = %scope.project_key,
			seeds = seeds.len(),
			clusters_created = response.clusters_created,
			members_linked = response.members_linked,
			"Cluster build finished."
		);

		Ok(response)
	}

	async fn load_seeds(
		&self,
		scope: &Scope,
		window: &Window,
		max_seeds: usize,
	) -> ServiceResult<Vec<Entity>> {
		let filter = EntityFilter::of_types([ENTITY_TYPE_WORK, ENTITY_TYPE_DOC]);
		let mut entities =
			self.stores.graph.list_entities(&filter, &ScopeFilter::from(scope)).await?;

		// An untimestamped entity cannot be proven inside a bounded window.
		entities.retain(|entity| match entity.recency() {
			Some(ts) => window.contains(ts),
			None => window.is_open(),
		});
		sort_by_recency_desc(&mut entities);
		entities.truncate(max_seeds);

		Ok(entities)
	}

	async fn persist_drafts(
		&self,
		scope: &Scope,
		drafts: BTreeMap<String, DraftCluster>,
	) -> ServiceResult<BuildClustersResponse> {
		let now = OffsetDateTime::now_utc();
		let scope_filter = ScopeFilter::from(scope);
		let mut clusters_created = 0_u32;
		let mut members_linked = 0_u32;

		for draft in drafts.values() {
			let cluster_id = draft.key.node_id();
			let existing = self.stores.graph.get_entity(&cluster_id, &scope_filter).await?;
			let created_at = existing.as_ref().and_then(|entity| entity.created_at).unwrap_or(now);

			if existing.is_none() {
				clusters_created += 1;
			}

			let node = ClusterNode {
				key: &draft.key,
				seed_ids: draft.seed_ids.iter().cloned().collect(),
				similarity: draft.score,
				algorithm: &self.cfg.clustering.algorithm,
				created_at,
				updated_at: now,
			};

			self.stores.graph.upsert_entity(&node.into_entity()).await?;

			for member_id in draft.key.member_ids() {
				let edge = Edge::link(EDGE_IN_CLUSTER, member_id.as_str(), cluster_id.as_str());

				self.stores.graph.upsert_edge(&edge).await?;

				members_linked += 1;
			}
		}

		Ok(BuildClustersResponse { clusters_created, members_linked })
	}
}
