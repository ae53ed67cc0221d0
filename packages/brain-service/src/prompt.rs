//! Prompt-pack assembly. Everything here is a pure function of its inputs:
//! no clocks, no randomness, no map-iteration order. Identical inputs must
//! produce byte-identical markdown.

use crate::{
	SearchHit,
	brain_search::{EpisodeHit, Passage},
};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PromptPack {
	pub context_markdown: String,
	/// One citation per hit, in hit order.
	pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Citation {
	/// 1-based, matching the `[n]` markers in the markdown.
	pub index: u32,
	pub node_id: String,
	pub title: String,
	pub url: Option<String>,
}

pub(crate) fn build_prompt_pack(
	query: &str,
	hits: &[SearchHit],
	episodes: &[EpisodeHit],
	passages: &[Passage],
) -> PromptPack {
	let citations: Vec<Citation> = hits
		.iter()
		.enumerate()
		.map(|(index, hit)| Citation {
			index: index as u32 + 1,
			node_id: hit.node_id.clone(),
			title: hit_title(hit).to_string(),
			url: hit.url.clone(),
		})
		.collect();
	let mut out = String::new();

	out.push_str("# Knowledge context\n\n");
	out.push_str("## Query\n\n");
	out.push_str(query.trim());
	out.push_str("\n\n");

	out.push_str("## Episodes\n\n");
	if episodes.is_empty() {
		out.push_str("(none)\n");
	} else {
		for episode in episodes {
			out.push_str(&format!(
				"- {} (score {:.4}) members: {}\n",
				episode.cluster_node_id,
				episode.score,
				episode.member_node_ids.join(", ")
			));
		}
	}
	out.push('\n');

	out.push_str("## Hits\n\n");
	if hits.is_empty() {
		out.push_str("(none)\n");
	} else {
		for (index, hit) in hits.iter().enumerate() {
			out.push_str(&format!(
				"- [{}] {} ({}, score {:.4})",
				index + 1,
				hit_title(hit),
				hit.profile_kind.as_str(),
				hit.score
			));
			if let Some(url) = &hit.url {
				out.push_str(&format!(" <{url}>"));
			}
			out.push('\n');
		}
	}
	out.push('\n');

	out.push_str("## Passages\n");
	if passages.is_empty() {
		out.push_str("\n(none)\n");
	} else {
		for passage in passages {
			let marker = citations
				.iter()
				.find(|citation| citation.node_id == passage.node_id)
				.map(|citation| citation.index)
				.unwrap_or(0);

			out.push_str(&format!(
				"\n### [{}] {}\n\n{}\n",
				marker,
				citation_title(&citations, &passage.node_id),
				passage.text
			));
		}
	}

	PromptPack { context_markdown: out, citations }
}

fn hit_title(hit: &SearchHit) -> &str {
	hit.title.as_deref().unwrap_or(&hit.node_id)
}

fn citation_title<'a>(citations: &'a [Citation], node_id: &'a str) -> &'a str {
	citations
		.iter()
		.find(|citation| citation.node_id == node_id)
		.map(|citation| citation.title.as_str())
		.unwrap_or(node_id)
}
