use ahash::{AHashMap, AHashSet};
use time::OffsetDateTime;
use tracing::warn;

use brain_domain::{
	cluster::{PROP_ALGORITHM, PROP_SIMILARITY},
	entity::{DocProps, EDGE_HAS_SIGNAL, Entity, EntityKind, WorkItemProps},
	scope::{Scope, ScopeFilter},
	window::Window,
};
use brain_store::models::{EdgeFilter, SignalSeverity, SignalStatus};

use crate::{BrainService, ServiceError, ServiceResult, cluster_read, require_scope};

const DEFAULT_PAGE_LIMIT: u32 = 20;
const PAGE_LIMIT_CAP: u32 = 200;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ListEpisodesRequest {
	pub tenant_id: String,
	pub project_key: String,
	#[serde(default, with = "crate::time_serde::option")]
	pub window_start: Option<OffsetDateTime>,
	#[serde(default, with = "crate::time_serde::option")]
	pub window_end: Option<OffsetDateTime>,
	pub offset: Option<u32>,
	pub limit: Option<u32>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ListEpisodesResponse {
	pub episodes: Vec<Episode>,
	/// Size of the full scoped set, not the page.
	pub total_count: u32,
}

/// Read-only projection of a persisted cluster, rebuilt on every read.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Episode {
	pub cluster_node_id: String,
	pub cluster_kind: String,
	pub member_count: u32,
	pub similarity: Option<f32>,
	pub algorithm: Option<String>,
	pub members: Vec<EpisodeMember>,
	pub signals: Vec<EpisodeSignal>,
	#[serde(default, with = "crate::time_serde::option")]
	pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
	Work,
	Doc,
	Other,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EpisodeMember {
	pub node_id: String,
	pub kind: MemberKind,
	pub title: String,
	pub summary: Option<String>,
	pub work_key: Option<String>,
	pub doc_url: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EpisodeSignal {
	pub signal_id: String,
	pub definition_slug: String,
	pub severity: SignalSeverity,
	pub status: SignalStatus,
	pub source_node_id: String,
}

impl BrainService {
	/// Direct by-id hydration. A cluster recorded under a different
	/// tenant/project fails with ScopeMismatch; listing excludes such rows
	/// silently instead.
	pub async fn get_episode(
		&self,
		tenant_id: &str,
		project_key: &str,
		cluster_node_id: &str,
	) -> ServiceResult<Episode> {
		let scope = require_scope(tenant_id, project_key)?;
		let Some(cluster) = self
			.stores
			.graph
			.get_entity(cluster_node_id, &ScopeFilter::from(&scope))
			.await?
		else {
			return Err(ServiceError::Validation {
				message: format!("Unknown cluster: {cluster_node_id}."),
			});
		};

		if cluster.kind() != EntityKind::Cluster {
			return Err(ServiceError::Validation {
				message: format!("Node {cluster_node_id} is not a cluster."),
			});
		}
		if cluster.scope != scope {
			return Err(ServiceError::ScopeMismatch { node_id: cluster_node_id.to_string() });
		}

		let mut slug_cache = AHashMap::new();

		self.hydrate_episode(&cluster, &scope, &mut slug_cache).await
	}

	pub async fn list_episodes(
		&self,
		req: ListEpisodesRequest,
	) -> ServiceResult<ListEpisodesResponse> {
		let scope = require_scope(&req.tenant_id, &req.project_key)?;
		let window = Window::new(req.window_start, req.window_end);
		let offset = req.offset.unwrap_or(0) as usize;
		let limit = req.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, PAGE_LIMIT_CAP) as usize;
		let mut clusters = self.load_scoped_clusters(&scope, &window).await?;

		// The scoped listing already filters by scope; a row whose recorded
		// scope still disagrees is excluded rather than failing the list.
		clusters.retain(|cluster| cluster.scope == scope);

		let total_count = clusters.len() as u32;
		let mut episodes = Vec::new();
		let mut slug_cache = AHashMap::new();

		for cluster in clusters.into_iter().skip(offset).take(limit) {
			episodes.push(self.hydrate_episode(&cluster, &scope, &mut slug_cache).await?);
		}

		Ok(ListEpisodesResponse { episodes, total_count })
	}

	async fn hydrate_episode(
		&self,
		cluster: &Entity,
		scope: &Scope,
		slug_cache: &mut AHashMap<String, String>,
	) -> ServiceResult<Episode> {
		let scope_filter = ScopeFilter::from(scope);
		let member_ids = self.load_member_ids(&cluster.id, scope).await?;
		let mut members = Vec::with_capacity(member_ids.len());
		let mut member_entities = Vec::with_capacity(member_ids.len());

		for member_id in &member_ids {
			let Some(entity) =
				self.stores.graph.get_entity(member_id, &scope_filter).await?
			else {
				warn!(node_id = %member_id, cluster = %cluster.id, "Cluster member missing; skipping.");

				continue;
			};

			if entity.scope != *scope {
				continue;
			}

			members.push(member_summary(&entity));
			member_entities.push(entity);
		}

		let signals = self.collect_signals(cluster, &member_entities, scope, slug_cache).await?;

		Ok(Episode {
			cluster_node_id: cluster.id.clone(),
			cluster_kind: cluster_read::cluster_kind(cluster),
			member_count: members.len() as u32,
			similarity: cluster.number_prop(PROP_SIMILARITY).map(|value| value as f32),
			algorithm: cluster.text_prop(PROP_ALGORITHM).map(str::to_string),
			members,
			signals,
			updated_at: cluster.updated_at,
		})
	}

	/// Signals linked from every member and from the cluster itself, capped
	/// per source. Definition slugs resolve through a request-scoped cache.
	async fn collect_signals(
		&self,
		cluster: &Entity,
		members: &[Entity],
		scope: &Scope,
		slug_cache: &mut AHashMap<String, String>,
	) -> ServiceResult<Vec<EpisodeSignal>> {
		let scope_filter = ScopeFilter::from(scope);
		let cap = self.cfg.signals.max_per_source as usize;
		let mut signals = Vec::new();
		let mut seen: AHashSet<String> = AHashSet::new();

		for source in members.iter().chain(std::iter::once(cluster)) {
			let filter = EdgeFilter::from_source(source.id.as_str())
				.of_types([EDGE_HAS_SIGNAL])
				.limited(cap);
			let edges = self.stores.graph.list_edges(&filter, &scope_filter).await?;

			for edge in edges {
				if !seen.insert(edge.target_id.clone()) {
					continue;
				}

				let Some(instance) = self.stores.signals.get_instance(&edge.target_id).await?
				else {
					warn!(signal_id = %edge.target_id, "Linked signal instance missing; skipping.");

					continue;
				};
				let slug = match slug_cache.get(&instance.definition_id) {
					Some(slug) => slug.clone(),
					None => {
						let slug = self
							.stores
							.signals
							.get_definition(&instance.definition_id)
							.await?
							.map(|definition| definition.slug)
							.unwrap_or_else(|| instance.definition_id.clone());

						slug_cache.insert(instance.definition_id.clone(), slug.clone());

						slug
					},
				};

				signals.push(EpisodeSignal {
					signal_id: instance.id,
					definition_slug: slug,
					severity: instance.severity.unwrap_or_default(),
					status: instance.status.unwrap_or_default(),
					source_node_id: source.id.clone(),
				});
			}
		}

		Ok(signals)
	}
}

fn member_summary(entity: &Entity) -> EpisodeMember {
	let kind;
	let title;
	let summary;
	let mut work_key = None;
	let mut doc_url = None;

	match entity.kind() {
		EntityKind::Work => {
			let props = WorkItemProps(entity);

			kind = MemberKind::Work;
			title = props.summary().or_else(|| entity.text_prop("title"));
			summary = props.description();
			work_key = props.work_key().map(str::to_string);
		},
		EntityKind::Doc => {
			let props = DocProps(entity);

			kind = MemberKind::Doc;
			title = props.title().or_else(|| entity.text_prop("summary"));
			summary = entity.text_prop("description");
			doc_url = props.doc_url().map(str::to_string);
		},
		_ => {
			kind = MemberKind::Other;
			title = entity.text_prop("title").or_else(|| entity.text_prop("summary"));
			summary = entity.text_prop("description");
		},
	}

	EpisodeMember {
		node_id: entity.id.clone(),
		kind,
		title: title.or_else(|| entity.display_name()).unwrap_or(&entity.id).to_string(),
		summary: summary.map(str::to_string),
		work_key,
		doc_url,
	}
}
