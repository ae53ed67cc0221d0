use std::collections::HashMap;

use crate::entity::Entity;

/// Semantic kind of an index profile. Profiles, not type-tag prefixes, are
/// the dispatch point: every entity type is bound to exactly one profile in
/// the registry resolved at service construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
	Work,
	Doc,
}

impl ProfileKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Work => "work",
			Self::Doc => "doc",
		}
	}
}

/// Binds an entity type to an embedding model, a text-extraction rule, and a
/// semantic kind tag.
#[derive(Debug, Clone)]
pub struct IndexProfile {
	pub id: String,
	pub entity_type: String,
	pub kind: ProfileKind,
	pub embedding_model: String,
	/// Property fields tried in order when extracting query text.
	pub text_fields: Vec<String>,
}

/// Profile lookup table, resolved once at startup. First registration wins
/// on duplicate ids or entity types.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
	profiles: Vec<IndexProfile>,
	by_id: HashMap<String, usize>,
	by_entity_type: HashMap<String, usize>,
}

impl ProfileRegistry {
	pub fn new(profiles: Vec<IndexProfile>) -> Self {
		let mut registry = Self::default();

		for profile in profiles {
			if registry.by_id.contains_key(&profile.id) {
				continue;
			}

			let index = registry.profiles.len();

			registry.by_id.insert(profile.id.clone(), index);
			registry.by_entity_type.entry(profile.entity_type.clone()).or_insert(index);
			registry.profiles.push(profile);
		}

		registry
	}

	pub fn all(&self) -> &[IndexProfile] {
		&self.profiles
	}

	pub fn get(&self, id: &str) -> Option<&IndexProfile> {
		self.by_id.get(id).map(|index| &self.profiles[*index])
	}

	pub fn for_entity_type(&self, entity_type: &str) -> Option<&IndexProfile> {
		self.by_entity_type.get(entity_type).map(|index| &self.profiles[*index])
	}

	pub fn of_kinds<'a>(&'a self, kinds: &'a [ProfileKind]) -> Vec<&'a IndexProfile> {
		self.profiles.iter().filter(|profile| kinds.contains(&profile.kind)).collect()
	}
}

/// Query text for a seed entity: the profile's field priority, then the
/// display name, then the id.
pub fn query_text<'a>(entity: &'a Entity, profile: &IndexProfile) -> &'a str {
	for field in &profile.text_fields {
		if let Some(text) = entity.text_prop(field) {
			return text;
		}
	}

	entity.display_name().unwrap_or(&entity.id)
}

/// Field priority for passage extraction during search.
pub const PASSAGE_FIELDS: [&str; 5] = ["content", "body", "description", "summary", "title"];

pub fn passage_text(entity: &Entity) -> Option<(&'static str, &str)> {
	PASSAGE_FIELDS
		.iter()
		.find_map(|field| entity.text_prop(field).map(|text| (*field, text)))
}
