use serde_json::{Map, Value};

use brain_domain::profile::ProfileKind;

#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
	/// Empty means every type.
	pub entity_types: Vec<String>,
}

impl EntityFilter {
	pub fn of_types(entity_types: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self { entity_types: entity_types.into_iter().map(Into::into).collect() }
	}

	pub fn admits(&self, entity_type: &str) -> bool {
		self.entity_types.is_empty() || self.entity_types.iter().any(|t| t == entity_type)
	}
}

#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
	/// Empty means every type.
	pub edge_types: Vec<String>,
	pub source_id: Option<String>,
	pub target_id: Option<String>,
	pub limit: Option<usize>,
}

impl EdgeFilter {
	pub fn from_source(source_id: impl Into<String>) -> Self {
		Self { source_id: Some(source_id.into()), ..Default::default() }
	}

	pub fn to_target(target_id: impl Into<String>) -> Self {
		Self { target_id: Some(target_id.into()), ..Default::default() }
	}

	pub fn of_types(mut self, edge_types: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.edge_types = edge_types.into_iter().map(Into::into).collect();

		self
	}

	pub fn limited(mut self, limit: usize) -> Self {
		self.limit = Some(limit);

		self
	}
}

/// Row written into the vector index for one entity under one profile.
#[derive(Debug, Clone)]
pub struct VectorEntry {
	pub node_id: String,
	pub profile_id: String,
	pub profile_kind: ProfileKind,
	pub tenant_id: String,
	pub project_key: String,
	pub embedding: Vec<f32>,
	/// Display fields surfaced on hits without a graph round-trip.
	pub metadata: Map<String, Value>,
}

/// Ranked nearest-neighbor result; higher score means more similar.
#[derive(Debug, Clone)]
pub struct VectorHit {
	pub node_id: String,
	pub score: f32,
	pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
pub struct VectorQueryFilter {
	pub tenant_id: String,
	pub project_key_in: Option<Vec<String>>,
	pub profile_kind_in: Option<Vec<ProfileKind>>,
}

#[derive(Debug, Clone)]
pub struct SignalDefinition {
	pub id: String,
	pub slug: String,
	pub title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SignalInstance {
	pub id: String,
	pub definition_id: String,
	pub severity: Option<SignalSeverity>,
	pub status: Option<SignalStatus>,
	pub title: Option<String>,
}

#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalSeverity {
	#[default]
	Info,
	Warning,
	Critical,
}

#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
	#[default]
	Open,
	Acknowledged,
	Resolved,
}
