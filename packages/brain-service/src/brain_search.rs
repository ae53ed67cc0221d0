use std::collections::{BTreeMap, BTreeSet, VecDeque};

use ahash::{AHashMap, AHashSet};
use tracing::warn;

use brain_domain::{
	entity::{EDGE_HAS_SIGNAL, EDGE_IN_CLUSTER, Entity, EntityKind},
	profile::{self, ProfileKind},
	scope::ScopeFilter,
};
use brain_store::models::{EdgeFilter, VectorQueryFilter};

use crate::{
	BrainService, SearchHit, ServiceError, ServiceResult,
	prompt::{self, PromptPack},
	vector_search::TOP_K_CAP,
};

const MAX_EPISODES_CAP: u32 = 200;
const EXPAND_DEPTH_CAP: u32 = 3;
const MAX_NODES_CAP: u32 = 1_000;
const DEFAULT_PROFILE_KINDS: [ProfileKind; 2] = [ProfileKind::Work, ProfileKind::Doc];

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BrainSearchRequest {
	pub query: String,
	pub filter: BrainSearchFilter,
	#[serde(default)]
	pub options: BrainSearchOptions,
	/// Authenticated caller; required unless secured filtering is disabled.
	pub actor_id: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BrainSearchFilter {
	pub tenant_id: String,
	pub project_key: Option<String>,
	pub profile_kind_in: Option<Vec<ProfileKind>>,
	/// `Some(false)` disables secured-entity filtering and the actor
	/// requirement; anything else leaves enforcement on.
	pub secured: Option<bool>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BrainSearchOptions {
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default)]
	pub max_episodes: Option<u32>,
	#[serde(default)]
	pub expand_depth: Option<u32>,
	#[serde(default)]
	pub max_nodes: Option<u32>,
	#[serde(default = "default_include")]
	pub include_episodes: bool,
	#[serde(default = "default_include")]
	pub include_signals: bool,
	#[serde(default = "default_include")]
	pub include_clusters: bool,
}

fn default_include() -> bool {
	true
}

impl Default for BrainSearchOptions {
	fn default() -> Self {
		Self {
			top_k: None,
			max_episodes: None,
			expand_depth: None,
			max_nodes: None,
			include_episodes: true,
			include_signals: true,
			include_clusters: true,
		}
	}
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BrainSearchResponse {
	pub hits: Vec<SearchHit>,
	pub episodes: Vec<EpisodeHit>,
	pub nodes: Vec<GraphNodeOut>,
	pub edges: Vec<GraphEdgeOut>,
	pub passages: Vec<Passage>,
	pub prompt_pack: PromptPack,
}

/// A cluster scored by the sum of its members' hit scores.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EpisodeHit {
	pub cluster_node_id: String,
	pub score: f32,
	pub member_node_ids: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphNodeOut {
	pub node_id: String,
	pub entity_type: String,
	pub title: Option<String>,
	pub depth: u32,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphEdgeOut {
	pub edge_type: String,
	pub source_id: String,
	pub target_id: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Passage {
	pub node_id: String,
	pub field: String,
	pub text: String,
}

struct ExpandArgs<'a> {
	hits: &'a [SearchHit],
	scope: &'a ScopeFilter,
	depth_cap: u32,
	max_nodes: usize,
	edge_limit: usize,
	include_signals: bool,
	include_clusters: bool,
	secured_enforced: bool,
}

impl BrainService {
	/// Hybrid query: vector search, bounded graph expansion, episode
	/// scoring, passage extraction, and deterministic prompt assembly.
	pub async fn brain_search(
		&self,
		req: BrainSearchRequest,
	) -> ServiceResult<BrainSearchResponse> {
		let tenant_id = req.filter.tenant_id.trim();

		if tenant_id.is_empty() {
			return Err(ServiceError::Validation {
				message: "filter.tenant_id is required.".to_string(),
			});
		}

		let secured_enforced = req.filter.secured.unwrap_or(self.cfg.search.enforce_secured);

		if secured_enforced
			&& req.actor_id.as_deref().map(str::trim).filter(|actor| !actor.is_empty()).is_none()
		{
			return Err(ServiceError::Validation {
				message: "An authenticated actor is required unless secured filtering is disabled."
					.to_string(),
			});
		}

		let options = &req.options;
		let top_k = options.top_k.unwrap_or(self.cfg.search.top_k).clamp(1, TOP_K_CAP) as usize;
		let max_episodes =
			options.max_episodes.unwrap_or(self.cfg.search.max_episodes).min(MAX_EPISODES_CAP)
				as usize;
		let depth_cap =
			options.expand_depth.unwrap_or(self.cfg.search.expand_depth).min(EXPAND_DEPTH_CAP);
		let max_nodes =
			options.max_nodes.unwrap_or(self.cfg.search.max_nodes).clamp(1, MAX_NODES_CAP)
				as usize;
		let edge_limit = self.cfg.search.edge_fetch_limit as usize;
		let scope = ScopeFilter {
			tenant_id: tenant_id.to_string(),
			project_key: req.filter.project_key.clone(),
		};
		let kinds =
			req.filter.profile_kind_in.clone().unwrap_or_else(|| DEFAULT_PROFILE_KINDS.to_vec());
		let profiles = self.registry().of_kinds(&kinds);
		let vector_filter = VectorQueryFilter {
			tenant_id: tenant_id.to_string(),
			project_key_in: req.filter.project_key.clone().map(|project| vec![project]),
			profile_kind_in: Some(kinds.clone()),
		};
		let ranked = self.search_profiles(&profiles, &req.query, top_k, &vector_filter).await?;
		let mut cache: AHashMap<String, Option<Entity>> = AHashMap::new();
		let mut hits = Vec::with_capacity(ranked.len());

		for mut hit in ranked {
			let Some(entity) = self.fetch_cached(&hit.node_id, &scope, &mut cache).await? else {
				warn!(node_id = %hit.node_id, "Vector hit has no graph entity; dropping.");

				continue;
			};

			if !scope.matches(&entity.scope) {
				continue;
			}
			if secured_enforced && entity.flag_prop("secured") {
				continue;
			}
			if hit.title.is_none() {
				hit.title = entity.display_name().map(str::to_string);
			}

			hits.push(hit);
		}

		let (nodes, edges) = self
			.expand_graph(
				ExpandArgs {
					hits: &hits,
					scope: &scope,
					depth_cap,
					max_nodes,
					edge_limit,
					include_signals: options.include_signals,
					include_clusters: options.include_clusters,
					secured_enforced,
				},
				&mut cache,
			)
			.await?;
		let episodes = if options.include_episodes && max_episodes > 0 {
			self.score_episodes(&hits, &scope, edge_limit, max_episodes, &mut cache).await?
		} else {
			Vec::new()
		};
		let passages = extract_passages(
			&hits,
			&cache,
			self.cfg.passages.per_node_chars as usize,
			self.cfg.passages.total_chars as usize,
		);
		let prompt_pack = prompt::build_prompt_pack(&req.query, &hits, &episodes, &passages);

		Ok(BrainSearchResponse { hits, episodes, nodes, edges, passages, prompt_pack })
	}

	async fn fetch_cached(
		&self,
		node_id: &str,
		scope: &ScopeFilter,
		cache: &mut AHashMap<String, Option<Entity>>,
	) -> ServiceResult<Option<Entity>> {
		if let Some(cached) = cache.get(node_id) {
			return Ok(cached.clone());
		}

		let fetched = self.stores.graph.get_entity(node_id, scope).await?;

		cache.insert(node_id.to_string(), fetched.clone());

		Ok(fetched)
	}

	/// Breadth-first expansion from the hit entities, bounded by depth and
	/// node budget. Terminates deterministically once the caps are hit.
	async fn expand_graph(
		&self,
		args: ExpandArgs<'_>,
		cache: &mut AHashMap<String, Option<Entity>>,
	) -> ServiceResult<(Vec<GraphNodeOut>, Vec<GraphEdgeOut>)> {
		let ExpandArgs {
			hits,
			scope,
			depth_cap,
			max_nodes,
			edge_limit,
			include_signals,
			include_clusters,
			secured_enforced,
		} = args;
		let mut admitted: AHashMap<String, u32> = AHashMap::new();
		let mut queue: VecDeque<(String, u32)> = VecDeque::new();
		let mut collected: BTreeSet<(String, String, String)> = BTreeSet::new();

		for hit in hits {
			if admitted.len() >= max_nodes {
				break;
			}
			if admitted.contains_key(&hit.node_id) {
				continue;
			}

			admitted.insert(hit.node_id.clone(), 0);
			queue.push_back((hit.node_id.clone(), 0));
		}

		while let Some((node_id, depth)) = queue.pop_front() {
			if depth >= depth_cap {
				continue;
			}

			let outbound = EdgeFilter::from_source(node_id.as_str()).limited(edge_limit);
			let inbound = EdgeFilter::to_target(node_id.as_str()).limited(edge_limit);
			let mut edges = self.stores.graph.list_edges(&outbound, scope).await?;

			edges.extend(self.stores.graph.list_edges(&inbound, scope).await?);

			for edge in edges {
				if edge.edge_type == EDGE_HAS_SIGNAL && !include_signals {
					continue;
				}
				if edge.edge_type == EDGE_IN_CLUSTER && !include_clusters {
					continue;
				}

				let other = if edge.source_id == node_id {
					edge.target_id.clone()
				} else {
					edge.source_id.clone()
				};

				if !admitted.contains_key(&other) {
					if admitted.len() >= max_nodes {
						continue;
					}

					let Some(entity) = self.fetch_cached(&other, scope, cache).await? else {
						continue;
					};

					if !scope.matches(&entity.scope) {
						continue;
					}
					if secured_enforced && entity.flag_prop("secured") {
						continue;
					}

					admitted.insert(other.clone(), depth + 1);
					queue.push_back((other, depth + 1));
				}

				collected.insert((edge.edge_type, edge.source_id, edge.target_id));
			}
		}

		let mut nodes = Vec::with_capacity(admitted.len());

		for (node_id, depth) in &admitted {
			let entity = cache.get(node_id).and_then(|cached| cached.as_ref());
			let (entity_type, title) = match entity {
				Some(entity) => (
					entity.entity_type.clone(),
					entity.display_name().map(str::to_string),
				),
				None => (String::new(), None),
			};

			nodes.push(GraphNodeOut {
				node_id: node_id.clone(),
				entity_type,
				title,
				depth: *depth,
			});
		}

		nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));

		let edges = collected
			.into_iter()
			.filter(|(_, source, target)| {
				admitted.contains_key(source) && admitted.contains_key(target)
			})
			.map(|(edge_type, source_id, target_id)| GraphEdgeOut {
				edge_type,
				source_id,
				target_id,
			})
			.collect();

		Ok((nodes, edges))
	}

	/// Episode score = sum of the hit scores of members that are also hits.
	/// Reads membership straight off the hit nodes so it also works at
	/// expansion depth zero.
	async fn score_episodes(
		&self,
		hits: &[SearchHit],
		scope: &ScopeFilter,
		edge_limit: usize,
		max_episodes: usize,
		cache: &mut AHashMap<String, Option<Entity>>,
	) -> ServiceResult<Vec<EpisodeHit>> {
		let mut scores: BTreeMap<String, (f32, Vec<String>)> = BTreeMap::new();
		let mut counted: AHashSet<(String, String)> = AHashSet::new();

		for hit in hits {
			let filter = EdgeFilter::from_source(hit.node_id.as_str())
				.of_types([EDGE_IN_CLUSTER])
				.limited(edge_limit);
			let edges = self.stores.graph.list_edges(&filter, scope).await?;

			for edge in edges {
				if !counted.insert((edge.target_id.clone(), hit.node_id.clone())) {
					continue;
				}

				let entry = scores.entry(edge.target_id).or_insert_with(|| (0.0, Vec::new()));

				entry.0 += hit.score;
				entry.1.push(hit.node_id.clone());
			}
		}

		let mut episodes = Vec::new();

		for (cluster_node_id, (score, mut member_node_ids)) in scores {
			if score <= 0.0 {
				continue;
			}

			let Some(cluster) = self.fetch_cached(&cluster_node_id, scope, cache).await? else {
				continue;
			};

			if cluster.kind() != EntityKind::Cluster || !scope.matches(&cluster.scope) {
				continue;
			}

			member_node_ids.sort();
			episodes.push(EpisodeHit { cluster_node_id, score, member_node_ids });
		}

		episodes.sort_by(|a, b| {
			b.score
				.partial_cmp(&a.score)
				.unwrap_or(std::cmp::Ordering::Equal)
				.then_with(|| a.cluster_node_id.cmp(&b.cluster_node_id))
		});
		episodes.truncate(max_episodes);

		Ok(episodes)
	}
}

/// First non-empty text field per hit, truncated per node and bounded by the
/// global budget. Budgets count chars, so truncation never splits a code
/// point.
fn extract_passages(
	hits: &[SearchHit],
	cache: &AHashMap<String, Option<Entity>>,
	per_node_chars: usize,
	total_chars: usize,
) -> Vec<Passage> {
	let mut passages = Vec::new();
	let mut used = 0_usize;

	for hit in hits {
		if used >= total_chars {
			break;
		}

		let Some(Some(entity)) = cache.get(&hit.node_id) else {
			continue;
		};
		let Some((field, text)) = profile::passage_text(entity) else {
			continue;
		};
		let budget = per_node_chars.min(total_chars - used);
		let text = truncate_chars(text, budget);

		if text.is_empty() {
			continue;
		}

		used += text.chars().count();
		passages.push(Passage {
			node_id: hit.node_id.clone(),
			field: field.to_string(),
			text,
		});
	}

	passages
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
	match text.char_indices().nth(max_chars) {
		Some((byte_index, _)) => text[..byte_index].to_string(),
		None => text.to_string(),
	}
}
