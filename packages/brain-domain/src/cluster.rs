use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::{
	entity::{ENTITY_TYPE_CLUSTER, Entity},
	scope::Scope,
	window::Window,
};

pub const CLUSTER_KIND_SEMANTIC: &str = "semantic";

pub const PROP_TENANT_ID: &str = "tenant_id";
pub const PROP_PROJECT_KEY: &str = "project_key";
pub const PROP_CLUSTER_KIND: &str = "cluster_kind";
pub const PROP_SEED_IDS: &str = "seed_ids";
pub const PROP_MEMBER_COUNT: &str = "member_count";
pub const PROP_SIMILARITY: &str = "similarity";
pub const PROP_ALGORITHM: &str = "algorithm";
pub const PROP_WINDOW_START: &str = "window_start";
pub const PROP_WINDOW_END: &str = "window_end";

const CLUSTER_ID_PREFIX: &str = "kgc_";
const CLUSTER_ID_HEX_CHARS: usize = 16;

/// Content address of a cluster: scope, window, and the sorted member set.
/// The same members under the same scope and window always hash to the same
/// node id, which is what makes rebuilds idempotent.
#[derive(Debug, Clone)]
pub struct ClusterKey {
	scope: Scope,
	window: Window,
	member_ids: Vec<String>,
}

impl ClusterKey {
	pub fn new(scope: &Scope, window: &Window, members: impl IntoIterator<Item = String>) -> Self {
		let mut member_ids: Vec<String> = members.into_iter().collect();

		member_ids.sort();
		member_ids.dedup();

		Self { scope: scope.clone(), window: *window, member_ids }
	}

	pub fn member_ids(&self) -> &[String] {
		&self.member_ids
	}

	pub fn member_count(&self) -> usize {
		self.member_ids.len()
	}

	pub fn canonical(&self) -> String {
		format!(
			"{}|{}|{}|{}",
			self.scope.tenant_id,
			self.scope.project_key,
			self.window.label(),
			self.member_ids.join(",")
		)
	}

	pub fn node_id(&self) -> String {
		let digest = blake3::hash(self.canonical().as_bytes()).to_hex();

		format!("{CLUSTER_ID_PREFIX}{}", &digest.as_str()[..CLUSTER_ID_HEX_CHARS])
	}
}

/// Materializes the cluster node persisted by a build run. `created_at` must
/// carry the original creation time when the node already exists.
pub struct ClusterNode<'a> {
	pub key: &'a ClusterKey,
	pub seed_ids: Vec<String>,
	pub similarity: f32,
	pub algorithm: &'a str,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

impl ClusterNode<'_> {
	pub fn into_entity(self) -> Entity {
		let ClusterNode { key, seed_ids, similarity, algorithm, created_at, updated_at } = self;
		let mut props = Map::new();

		props.insert(PROP_TENANT_ID.to_string(), Value::String(key.scope.tenant_id.clone()));
		props.insert(PROP_PROJECT_KEY.to_string(), Value::String(key.scope.project_key.clone()));
		props.insert(
			PROP_CLUSTER_KIND.to_string(),
			Value::String(CLUSTER_KIND_SEMANTIC.to_string()),
		);
		props.insert(
			PROP_SEED_IDS.to_string(),
			Value::Array(seed_ids.into_iter().map(Value::String).collect()),
		);
		props.insert(PROP_MEMBER_COUNT.to_string(), Value::from(key.member_count() as u64));
		if let Some(similarity) = serde_json::Number::from_f64(f64::from(similarity)) {
			props.insert(PROP_SIMILARITY.to_string(), Value::Number(similarity));
		}
		props.insert(PROP_ALGORITHM.to_string(), Value::String(algorithm.to_string()));
		if let Some(start) = key.window.start {
			props.insert(PROP_WINDOW_START.to_string(), Value::from(start.unix_timestamp()));
		}
		if let Some(end) = key.window.end {
			props.insert(PROP_WINDOW_END.to_string(), Value::from(end.unix_timestamp()));
		}

		Entity {
			id: key.node_id(),
			entity_type: ENTITY_TYPE_CLUSTER.to_string(),
			scope: key.scope.clone(),
			props,
			created_at: Some(created_at),
			updated_at: Some(updated_at),
		}
	}
}
