use brain_domain::{
	cluster::{CLUSTER_KIND_SEMANTIC, PROP_CLUSTER_KIND},
	entity::{EDGE_IN_CLUSTER, ENTITY_TYPE_CLUSTER, Entity},
	scope::{Scope, ScopeFilter},
	window::Window,
};
use brain_store::models::{EdgeFilter, EntityFilter};

use crate::{BrainService, ServiceResult, require_scope, sort_by_recency_desc};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClusterRow {
	pub cluster_node_id: String,
	pub cluster_kind: String,
	pub member_node_ids: Vec<String>,
}

impl BrainService {
	/// Persisted clusters for a project, newest first, each with its
	/// deduplicated sorted member-id set recovered from membership edges.
	pub async fn list_clusters_for_project(
		&self,
		tenant_id: &str,
		project_key: &str,
		window: Window,
	) -> ServiceResult<Vec<ClusterRow>> {
		let scope = require_scope(tenant_id, project_key)?;
		let clusters = self.load_scoped_clusters(&scope, &window).await?;
		let mut rows = Vec::with_capacity(clusters.len());

		for cluster in &clusters {
			rows.push(ClusterRow {
				cluster_node_id: cluster.id.clone(),
				cluster_kind: cluster_kind(cluster),
				member_node_ids: self.load_member_ids(&cluster.id, &scope).await?,
			});
		}

		Ok(rows)
	}

	/// Scoped `kg.cluster` entities within the window, sorted by recency.
	pub(crate) async fn load_scoped_clusters(
		&self,
		scope: &Scope,
		window: &Window,
	) -> ServiceResult<Vec<Entity>> {
		let filter = EntityFilter::of_types([ENTITY_TYPE_CLUSTER]);
		let mut clusters =
			self.stores.graph.list_entities(&filter, &ScopeFilter::from(scope)).await?;

		clusters.retain(|cluster| match cluster.recency() {
			Some(ts) => window.contains(ts),
			None => window.is_open(),
		});
		sort_by_recency_desc(&mut clusters);

		Ok(clusters)
	}

	pub(crate) async fn load_member_ids(
		&self,
		cluster_node_id: &str,
		scope: &Scope,
	) -> ServiceResult<Vec<String>> {
		let filter = EdgeFilter::to_target(cluster_node_id).of_types([EDGE_IN_CLUSTER]);
		let edges = self.stores.graph.list_edges(&filter, &ScopeFilter::from(scope)).await?;
		let mut member_ids: Vec<String> =
			edges.into_iter().map(|edge| edge.source_id).collect();

		member_ids.sort();
		member_ids.dedup();

		Ok(member_ids)
	}
}

pub(crate) fn cluster_kind(cluster: &Entity) -> String {
	cluster.text_prop(PROP_CLUSTER_KIND).unwrap_or(CLUSTER_KIND_SEMANTIC).to_string()
}
