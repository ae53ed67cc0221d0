use serde_json::{Map, Value};
use time::OffsetDateTime;

use brain_domain::{
	entity::{EDGE_IN_CLUSTER, ENTITY_TYPE_CLUSTER, Edge, Entity},
	profile::ProfileKind,
	scope::Scope,
};
use brain_service::{
	BrainSearchFilter, BrainSearchRequest, ServiceError, VectorSearchRequest,
};
use brain_testkit::{
	doc_entity, doc_profile, scope, test_config, ts, vector_entry, work_entity, work_profile,
};

use super::{harness, harness_with};

fn search_request(tenant_id: &str, query: &str) -> BrainSearchRequest {
	BrainSearchRequest {
		query: query.to_string(),
		filter: BrainSearchFilter {
			tenant_id: tenant_id.to_string(),
			project_key: Some("alpha".to_string()),
			profile_kind_in: None,
			secured: None,
		},
		options: Default::default(),
		actor_id: Some("actor-1".to_string()),
	}
}

fn cluster_node(id: &str, scope: &Scope, updated: OffsetDateTime) -> Entity {
	Entity {
		id: id.to_string(),
		entity_type: ENTITY_TYPE_CLUSTER.to_string(),
		scope: scope.clone(),
		props: Map::new(),
		created_at: Some(updated),
		updated_at: Some(updated),
	}
}

#[tokio::test]
async fn missing_tenant_id_fails_fast() {
	let h = harness().await;
	let err = h
		.service
		.brain_search(search_request("  ", "outage"))
		.await
		.expect_err("Expected a validation error.");

	assert!(matches!(err, ServiceError::Validation { .. }));
}

#[tokio::test]
async fn secured_search_requires_an_actor() {
	let h = harness().await;
	let mut request = search_request("acme", "outage");

	request.actor_id = None;

	let err = h.service.brain_search(request).await.expect_err("Expected a validation error.");

	assert!(matches!(err, ServiceError::Validation { .. }));

	let mut relaxed = search_request("acme", "outage");

	relaxed.actor_id = None;
	relaxed.filter.secured = Some(false);

	assert!(h.service.brain_search(relaxed).await.is_ok());
}

#[tokio::test]
async fn hits_rank_descending_with_stable_ties() {
	let h = harness().await;
	let scope = scope("acme", "alpha");

	h.graph.insert_entity(work_entity("work-1", &scope, "Primary", ts(300)));
	h.graph.insert_entity(work_entity("work-2", &scope, "Secondary", ts(200)));
	h.graph.insert_entity(doc_entity("doc-1", &scope, "Tied doc", ts(100)));
	h.vectors.insert(vector_entry("work-1", &work_profile(), &scope, 0.9));
	h.vectors.insert(vector_entry("work-2", &work_profile(), &scope, 0.7));
	h.vectors.insert(vector_entry("doc-1", &doc_profile(), &scope, 0.7));

	let response =
		h.service.brain_search(search_request("acme", "outage")).await.expect("Search failed.");
	let ids: Vec<&str> = response.hits.iter().map(|hit| hit.node_id.as_str()).collect();

	// Work profiles merge before doc profiles, so the 0.7 tie keeps work-2
	// ahead of doc-1.
	assert_eq!(ids, ["work-1", "work-2", "doc-1"]);
}

#[tokio::test]
async fn secured_entities_are_dropped_unless_disabled() {
	let h = harness().await;
	let scope = scope("acme", "alpha");
	let mut secret = work_entity("work-2", &scope, "Restricted", ts(200));

	secret.props.insert("secured".to_string(), Value::Bool(true));
	h.graph.insert_entity(work_entity("work-1", &scope, "Open", ts(300)));
	h.graph.insert_entity(secret);
	h.vectors.insert(vector_entry("work-1", &work_profile(), &scope, 0.9));
	h.vectors.insert(vector_entry("work-2", &work_profile(), &scope, 0.8));

	let enforced =
		h.service.brain_search(search_request("acme", "outage")).await.expect("Search failed.");

	assert_eq!(enforced.hits.len(), 1);
	assert_eq!(enforced.hits[0].node_id, "work-1");

	let mut relaxed = search_request("acme", "outage");

	relaxed.filter.secured = Some(false);

	let relaxed = h.service.brain_search(relaxed).await.expect("Search failed.");

	assert_eq!(relaxed.hits.len(), 2);
}

#[tokio::test]
async fn depth_zero_returns_only_hit_nodes() {
	let h = harness().await;
	let scope = scope("acme", "alpha");

	h.graph.insert_entity(work_entity("work-1", &scope, "Primary", ts(300)));
	h.graph.insert_entity(doc_entity("doc-9", &scope, "Neighbor", ts(100)));
	h.graph.insert_edge(Edge::link("RELATES_TO", "work-1", "doc-9"));
	h.vectors.insert(vector_entry("work-1", &work_profile(), &scope, 0.9));

	let mut request = search_request("acme", "outage");

	request.options.expand_depth = Some(0);

	let response = h.service.brain_search(request).await.expect("Search failed.");

	assert_eq!(response.nodes.len(), 1);
	assert_eq!(response.nodes[0].node_id, "work-1");
	assert_eq!(response.nodes[0].depth, 0);
	assert!(response.edges.is_empty());
}

#[tokio::test]
async fn max_nodes_caps_the_expansion() {
	let h = harness().await;
	let scope = scope("acme", "alpha");

	h.graph.insert_entity(work_entity("work-1", &scope, "Primary", ts(300)));
	h.vectors.insert(vector_entry("work-1", &work_profile(), &scope, 0.9));

	for index in 0..5 {
		let id = format!("doc-{index}");

		h.graph.insert_entity(doc_entity(&id, &scope, "Neighbor", ts(100 + index)));
		h.graph.insert_edge(Edge::link("RELATES_TO", "work-1", id.as_str()));
	}

	let mut request = search_request("acme", "outage");

	request.options.max_nodes = Some(3);

	let response = h.service.brain_search(request).await.expect("Search failed.");

	assert_eq!(response.nodes.len(), 3);
	// Edges only connect admitted endpoints.
	assert!(response.edges.len() <= 2);
}

#[tokio::test]
async fn episode_score_sums_only_member_hit_scores() {
	let h = harness().await;
	let scope = scope("acme", "alpha");

	h.graph.insert_entity(work_entity("work-a", &scope, "Hit A", ts(300)));
	h.graph.insert_entity(work_entity("work-b", &scope, "Hit B", ts(200)));
	h.graph.insert_entity(work_entity("work-c", &scope, "Not a hit", ts(100)));
	h.graph.insert_entity(cluster_node("kgc_a", &scope, ts(400)));
	h.graph.insert_edge(Edge::link(EDGE_IN_CLUSTER, "work-a", "kgc_a"));
	h.graph.insert_edge(Edge::link(EDGE_IN_CLUSTER, "work-b", "kgc_a"));
	h.graph.insert_edge(Edge::link(EDGE_IN_CLUSTER, "work-c", "kgc_a"));
	h.vectors.insert(vector_entry("work-a", &work_profile(), &scope, 0.6));
	h.vectors.insert(vector_entry("work-b", &work_profile(), &scope, 0.4));

	let response =
		h.service.brain_search(search_request("acme", "outage")).await.expect("Search failed.");

	assert_eq!(response.episodes.len(), 1);

	let episode = &response.episodes[0];

	assert_eq!(episode.cluster_node_id, "kgc_a");
	assert!((episode.score - 1.0).abs() < 1e-6);
	assert_eq!(episode.member_node_ids, ["work-a", "work-b"]);
}

#[tokio::test]
async fn episodes_are_skipped_when_disabled() {
	let h = harness().await;
	let scope = scope("acme", "alpha");

	h.graph.insert_entity(work_entity("work-a", &scope, "Hit A", ts(300)));
	h.graph.insert_entity(cluster_node("kgc_a", &scope, ts(400)));
	h.graph.insert_edge(Edge::link(EDGE_IN_CLUSTER, "work-a", "kgc_a"));
	h.vectors.insert(vector_entry("work-a", &work_profile(), &scope, 0.6));

	let mut request = search_request("acme", "outage");

	request.options.include_episodes = false;

	let response = h.service.brain_search(request).await.expect("Search failed.");

	assert!(response.episodes.is_empty());
}

#[tokio::test]
async fn prompt_pack_is_byte_deterministic() {
	let h = harness().await;
	let scope = scope("acme", "alpha");
	let mut work = work_entity("work-a", &scope, "Hit A", ts(300));

	work.props.insert(
		"description".to_string(),
		Value::String("The pager fired at 03:00 and the database was saturated.".to_string()),
	);
	h.graph.insert_entity(work);
	h.graph.insert_entity(work_entity("work-b", &scope, "Hit B", ts(200)));
	h.graph.insert_entity(cluster_node("kgc_a", &scope, ts(400)));
	h.graph.insert_edge(Edge::link(EDGE_IN_CLUSTER, "work-a", "kgc_a"));
	h.vectors.insert(vector_entry("work-a", &work_profile(), &scope, 0.6));
	h.vectors.insert(vector_entry("work-b", &work_profile(), &scope, 0.4));

	let first =
		h.service.brain_search(search_request("acme", "outage")).await.expect("Search failed.");
	let second =
		h.service.brain_search(search_request("acme", "outage")).await.expect("Search failed.");

	assert_eq!(first.prompt_pack.context_markdown, second.prompt_pack.context_markdown);

	let first_ids: Vec<&str> =
		first.prompt_pack.citations.iter().map(|citation| citation.node_id.as_str()).collect();
	let second_ids: Vec<&str> =
		second.prompt_pack.citations.iter().map(|citation| citation.node_id.as_str()).collect();

	assert_eq!(first_ids, second_ids);
	assert_eq!(first_ids, ["work-a", "work-b"]);
}

#[tokio::test]
async fn passage_budgets_truncate_per_node_and_globally() {
	let mut cfg = test_config();

	cfg.passages.per_node_chars = 10;
	cfg.passages.total_chars = 15;

	let h = harness_with(cfg).await;
	let scope = scope("acme", "alpha");
	let mut first = work_entity("work-1", &scope, "First", ts(300));
	let mut second = work_entity("work-2", &scope, "Second", ts(200));

	first.props.insert("description".to_string(), Value::String("abcdefghijKLMNOP".to_string()));
	second.props.insert("description".to_string(), Value::String("0123456789".to_string()));
	h.graph.insert_entity(first);
	h.graph.insert_entity(second);
	h.vectors.insert(vector_entry("work-1", &work_profile(), &scope, 0.9));
	h.vectors.insert(vector_entry("work-2", &work_profile(), &scope, 0.8));

	let response =
		h.service.brain_search(search_request("acme", "outage")).await.expect("Search failed.");

	assert_eq!(response.passages.len(), 2);
	assert_eq!(response.passages[0].text, "abcdefghij");
	assert_eq!(response.passages[1].text, "01234");
}

#[tokio::test]
async fn gateway_rejects_unknown_profiles() {
	let h = harness().await;
	let err = h
		.service
		.vector_search(VectorSearchRequest {
			profile_id: "profile-missing".to_string(),
			query: "outage".to_string(),
			top_k: None,
			tenant_id: "acme".to_string(),
			project_key_in: None,
			profile_kind_in: None,
		})
		.await
		.expect_err("Expected a profile error.");

	assert!(matches!(err, ServiceError::ProfileNotFound { .. }));
}

#[tokio::test]
async fn gateway_merges_profiles_by_max_score() {
	let h = harness().await;
	let scope = scope("acme", "alpha");

	// The same node indexed under both profiles with different scores.
	h.vectors.insert(vector_entry("node-1", &work_profile(), &scope, 0.5));
	h.vectors.insert(vector_entry("node-1", &doc_profile(), &scope, 0.8));

	let hits = h
		.service
		.vector_search(VectorSearchRequest {
			profile_id: "profile-work".to_string(),
			query: "outage".to_string(),
			top_k: None,
			tenant_id: "acme".to_string(),
			project_key_in: Some(vec!["alpha".to_string()]),
			profile_kind_in: Some(vec![ProfileKind::Doc]),
		})
		.await
		.expect("Search failed.");

	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].node_id, "node-1");
	assert!((hits[0].score - 0.8).abs() < 1e-6);
	assert_eq!(hits[0].profile_kind, ProfileKind::Doc);
}
