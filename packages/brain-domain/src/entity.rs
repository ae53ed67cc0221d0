use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::scope::Scope;

pub const ENTITY_TYPE_WORK: &str = "work.item";
pub const ENTITY_TYPE_DOC: &str = "doc.item";
pub const ENTITY_TYPE_CLUSTER: &str = "kg.cluster";

/// Member-to-cluster membership edge.
pub const EDGE_IN_CLUSTER: &str = "IN_CLUSTER";
/// Entity-to-signal enrichment edge; the target id resolves through the
/// signal store, not the graph.
pub const EDGE_HAS_SIGNAL: &str = "HAS_SIGNAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
	Work,
	Doc,
	Cluster,
	Other,
}

impl EntityKind {
	pub fn from_type_tag(tag: &str) -> Self {
		match tag {
			ENTITY_TYPE_WORK => Self::Work,
			ENTITY_TYPE_DOC => Self::Doc,
			ENTITY_TYPE_CLUSTER => Self::Cluster,
			_ => Self::Other,
		}
	}

	pub fn is_clusterable(self) -> bool {
		matches!(self, Self::Work | Self::Doc)
	}
}

/// A graph node. Properties are an open string-keyed bag because upstream
/// sources vary; typed accessors below cover the fields this core reads.
#[derive(Debug, Clone)]
pub struct Entity {
	pub id: String,
	pub entity_type: String,
	pub scope: Scope,
	pub props: Map<String, Value>,
	pub created_at: Option<OffsetDateTime>,
	pub updated_at: Option<OffsetDateTime>,
}

impl Entity {
	pub fn kind(&self) -> EntityKind {
		EntityKind::from_type_tag(&self.entity_type)
	}

	pub fn recency(&self) -> Option<OffsetDateTime> {
		self.updated_at.or(self.created_at)
	}

	/// Non-empty trimmed string property, or None.
	pub fn text_prop(&self, field: &str) -> Option<&str> {
		self.props
			.get(field)
			.and_then(Value::as_str)
			.map(str::trim)
			.filter(|text| !text.is_empty())
	}

	pub fn flag_prop(&self, field: &str) -> bool {
		self.props.get(field).and_then(Value::as_bool).unwrap_or(false)
	}

	pub fn number_prop(&self, field: &str) -> Option<f64> {
		self.props.get(field).and_then(Value::as_f64)
	}

	pub fn display_name(&self) -> Option<&str> {
		self.text_prop("name").or_else(|| self.text_prop("display_name"))
	}
}

/// Typed view over a work item's property bag.
pub struct WorkItemProps<'a>(pub &'a Entity);

impl<'a> WorkItemProps<'a> {
	pub fn work_key(&self) -> Option<&'a str> {
		self.0.text_prop("issue_key").or_else(|| self.0.text_prop("key"))
	}

	pub fn summary(&self) -> Option<&'a str> {
		self.0.text_prop("summary")
	}

	pub fn description(&self) -> Option<&'a str> {
		self.0.text_prop("description")
	}
}

/// Typed view over a document's property bag.
pub struct DocProps<'a>(pub &'a Entity);

impl<'a> DocProps<'a> {
	pub fn doc_url(&self) -> Option<&'a str> {
		self.0.text_prop("url").or_else(|| self.0.text_prop("source_url"))
	}

	pub fn title(&self) -> Option<&'a str> {
		self.0.text_prop("title")
	}
}

#[derive(Debug, Clone)]
pub struct Edge {
	pub id: String,
	pub edge_type: String,
	pub source_id: String,
	pub target_id: String,
	pub metadata: Map<String, Value>,
}

impl Edge {
	/// Builds an edge whose id is derived from its logical key, so repeated
	/// upserts of the same link converge on one row.
	pub fn link(
		edge_type: impl Into<String>,
		source_id: impl Into<String>,
		target_id: impl Into<String>,
	) -> Self {
		let edge_type = edge_type.into();
		let source_id = source_id.into();
		let target_id = target_id.into();
		let id = format!("{edge_type}:{source_id}->{target_id}");

		Self { id, edge_type, source_id, target_id, metadata: Map::new() }
	}

	pub fn logical_key(&self) -> (&str, &str, &str) {
		(&self.edge_type, &self.source_id, &self.target_id)
	}
}
