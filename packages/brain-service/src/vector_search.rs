use ahash::AHashMap;

use brain_domain::profile::{IndexProfile, ProfileKind};
use brain_store::models::{VectorHit, VectorQueryFilter};

use crate::{BrainService, ServiceError, ServiceResult};

pub(crate) const TOP_K_CAP: u32 = 200;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VectorSearchRequest {
	pub profile_id: String,
	pub query: String,
	pub top_k: Option<u32>,
	pub tenant_id: String,
	pub project_key_in: Option<Vec<String>>,
	pub profile_kind_in: Option<Vec<ProfileKind>>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchHit {
	pub node_id: String,
	pub profile_id: String,
	pub profile_kind: ProfileKind,
	pub score: f32,
	pub title: Option<String>,
	pub url: Option<String>,
}

impl BrainService {
	/// Ranked nearest-neighbor search across one or more profiles, merged by
	/// max score per node.
	pub async fn vector_search(&self, req: VectorSearchRequest) -> ServiceResult<Vec<SearchHit>> {
		let tenant_id = req.tenant_id.trim();

		if tenant_id.is_empty() {
			return Err(ServiceError::Validation {
				message: "tenant_id is required.".to_string(),
			});
		}

		let top_k = req.top_k.unwrap_or(self.cfg.search.top_k).clamp(1, TOP_K_CAP) as usize;
		let profiles = self.resolve_profile_set(&req.profile_id, req.profile_kind_in.as_deref())?;
		let filter = VectorQueryFilter {
			tenant_id: tenant_id.to_string(),
			project_key_in: req.project_key_in.clone(),
			profile_kind_in: req.profile_kind_in.clone(),
		};

		self.search_profiles(&profiles, &req.query, top_k, &filter).await
	}

	/// The explicit profile, broadened to every registered profile whose kind
	/// matches `kind_in`.
	pub(crate) fn resolve_profile_set(
		&self,
		profile_id: &str,
		kind_in: Option<&[ProfileKind]>,
	) -> ServiceResult<Vec<&IndexProfile>> {
		let Some(primary) = self.registry().get(profile_id) else {
			return Err(ServiceError::ProfileNotFound { profile_id: profile_id.to_string() });
		};
		let mut profiles = vec![primary];

		if let Some(kinds) = kind_in {
			for profile in self.registry().all() {
				if kinds.contains(&profile.kind)
					&& profiles.iter().all(|existing| existing.id != profile.id)
				{
					profiles.push(profile);
				}
			}
		}

		Ok(profiles)
	}

	/// Fan-out over `profiles`, embedding the query once per distinct model,
	/// then a max-score merge per node id. The returned hits are sorted
	/// descending by score; ties keep merge order.
	pub(crate) async fn search_profiles(
		&self,
		profiles: &[&IndexProfile],
		query: &str,
		top_k: usize,
		filter: &VectorQueryFilter,
	) -> ServiceResult<Vec<SearchHit>> {
		let mut by_model: AHashMap<&str, Vec<f32>> = AHashMap::new();

		for profile in profiles {
			if by_model.contains_key(profile.embedding_model.as_str()) {
				continue;
			}

			let vector = self.embed_query(&profile.embedding_model, query).await?;

			by_model.insert(profile.embedding_model.as_str(), vector);
		}

		let mut merged: AHashMap<String, usize> = AHashMap::new();
		let mut hits: Vec<SearchHit> = Vec::new();

		for profile in profiles {
			let embedding = &by_model[profile.embedding_model.as_str()];
			let results = self.stores.vectors.query(&profile.id, embedding, top_k, filter).await?;

			for result in results {
				match merged.get(&result.node_id) {
					Some(&index) =>
						if result.score > hits[index].score {
							hits[index] = to_hit(result, profile);
						},
					None => {
						merged.insert(result.node_id.clone(), hits.len());
						hits.push(to_hit(result, profile));
					},
				}
			}
		}

		hits.sort_by(|a, b| {
			b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
		});
		hits.truncate(top_k);

		Ok(hits)
	}

	pub(crate) async fn embed_query(&self, model: &str, query: &str) -> ServiceResult<Vec<f32>> {
		let embeddings = self
			.providers
			.embedding
			.embed(
				&self.cfg.providers.embedding,
				model,
				std::slice::from_ref(&query.to_string()),
			)
			.await?;
		let vector = embeddings.into_iter().next().ok_or_else(|| ServiceError::Provider {
			message: "Embedding provider returned no vectors.".to_string(),
		})?;

		if vector.len() != self.cfg.providers.embedding.dimensions as usize {
			return Err(ServiceError::Provider {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		Ok(vector)
	}
}

fn to_hit(result: VectorHit, profile: &IndexProfile) -> SearchHit {
	let title = metadata_text(&result, "title");
	let url = metadata_text(&result, "url");

	SearchHit {
		node_id: result.node_id,
		profile_id: profile.id.clone(),
		profile_kind: profile.kind,
		score: result.score,
		title,
		url,
	}
}

fn metadata_text(result: &VectorHit, key: &str) -> Option<String> {
	result
		.metadata
		.get(key)
		.and_then(serde_json::Value::as_str)
		.map(str::trim)
		.filter(|text| !text.is_empty())
		.map(str::to_string)
}
