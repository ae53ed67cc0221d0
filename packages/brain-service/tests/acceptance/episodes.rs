use serde_json::{Map, Value};
use time::OffsetDateTime;

use brain_domain::{
	entity::{EDGE_HAS_SIGNAL, EDGE_IN_CLUSTER, ENTITY_TYPE_CLUSTER, Edge, Entity},
	scope::Scope,
	window::Window,
};
use brain_service::{BuildClustersRequest, ListEpisodesRequest, MemberKind, ServiceError};
use brain_store::models::{SignalDefinition, SignalInstance, SignalSeverity, SignalStatus};
use brain_testkit::{
	doc_entity, doc_profile, scope, test_config, ts, vector_entry, work_entity, work_profile,
};

use super::{Harness, harness, harness_with};

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

fn list_request(scope: &Scope, offset: Option<u32>, limit: Option<u32>) -> ListEpisodesRequest {
	ListEpisodesRequest {
		tenant_id: scope.tenant_id.clone(),
		project_key: scope.project_key.clone(),
		window_start: None,
		window_end: None,
		offset,
		limit,
	}
}

/// Builds one persisted cluster over work-1 and doc-1 and returns its id.
async fn built_cluster() -> (Harness, Scope, String) {
	let mut cfg = test_config();

	cfg.clustering.similarity_threshold = 0.0;

	let h = harness_with(cfg).await;
	let scope = scope("acme", "alpha");
	let mut work = work_entity("work-1", &scope, "Investigate outage", ts(200));

	work.props.insert("issue_key".to_string(), Value::String("OPS-12".to_string()));
	work.props.insert("description".to_string(), Value::String("Pager fired at 03:00.".to_string()));

	let mut doc = doc_entity("doc-1", &scope, "Outage doc", ts(100));

	doc.props.insert("url".to_string(), Value::String("https://kb.example.com/outage".to_string()));

	h.graph.insert_entity(work);
	h.graph.insert_entity(doc);
	h.vectors.insert(vector_entry("work-1", &work_profile(), &scope, 0.90));
	h.vectors.insert(vector_entry("doc-1", &doc_profile(), &scope, 0.95));
	h.service
		.build_clusters(BuildClustersRequest {
			tenant_id: scope.tenant_id.clone(),
			project_key: scope.project_key.clone(),
			window_start: None,
			window_end: None,
			max_seeds: None,
			max_cluster_size: None,
		})
		.await
		.expect("Build failed.");

	let rows = h
		.service
		.list_clusters_for_project(&scope.tenant_id, &scope.project_key, Window::default())
		.await
		.expect("List failed.");
	let cluster_id = rows[0].cluster_node_id.clone();

	(h, scope, cluster_id)
}

#[tokio::test]
async fn hydrates_typed_members_and_linked_signals() {
	let (h, scope, cluster_id) = built_cluster().await;

	h.graph.insert_edge(Edge::link(EDGE_HAS_SIGNAL, "work-1", "sig-1"));
	h.signals.insert_instance(SignalInstance {
		id: "sig-1".to_string(),
		definition_id: "def-1".to_string(),
		severity: None,
		status: None,
		title: None,
	});
	h.signals.insert_definition(SignalDefinition {
		id: "def-1".to_string(),
		slug: "outage-alerts".to_string(),
		title: Some("Outage alerts".to_string()),
	});

	let episode = h
		.service
		.get_episode(&scope.tenant_id, &scope.project_key, &cluster_id)
		.await
		.expect("Episode lookup failed.");

	assert_eq!(episode.cluster_node_id, cluster_id);
	assert_eq!(episode.member_count, 2);

	let work = episode
		.members
		.iter()
		.find(|member| member.node_id == "work-1")
		.expect("Work member missing.");
	let doc = episode
		.members
		.iter()
		.find(|member| member.node_id == "doc-1")
		.expect("Doc member missing.");

	assert_eq!(work.kind, MemberKind::Work);
	assert_eq!(work.title, "Investigate outage");
	assert_eq!(work.work_key.as_deref(), Some("OPS-12"));
	assert_eq!(work.summary.as_deref(), Some("Pager fired at 03:00."));
	assert_eq!(doc.kind, MemberKind::Doc);
	assert_eq!(doc.title, "Outage doc");
	assert_eq!(doc.doc_url.as_deref(), Some("https://kb.example.com/outage"));

	assert_eq!(episode.signals.len(), 1);

	let signal = &episode.signals[0];

	assert_eq!(signal.signal_id, "sig-1");
	assert_eq!(signal.definition_slug, "outage-alerts");
	assert_eq!(signal.severity, SignalSeverity::Info);
	assert_eq!(signal.status, SignalStatus::Open);
	assert_eq!(signal.source_node_id, "work-1");
}

#[tokio::test]
async fn foreign_scope_lookup_fails_with_scope_mismatch() {
	let (h, _scope, cluster_id) = built_cluster().await;
	let err = h
		.service
		.get_episode("umbra", "alpha", &cluster_id)
		.await
		.expect_err("Expected a scope mismatch.");

	assert!(matches!(err, ServiceError::ScopeMismatch { .. }));
}

#[tokio::test]
async fn unknown_cluster_id_is_a_validation_error() {
	let h = harness().await;
	let err = h
		.service
		.get_episode("acme", "alpha", "kgc_ffffffffffffffff")
		.await
		.expect_err("Expected an error.");

	assert!(matches!(err, ServiceError::Validation { .. }));
}

#[tokio::test]
async fn listing_pages_over_the_scoped_set() {
	let h = harness().await;
	let scope = scope("acme", "alpha");
	let foreign = brain_testkit::scope("umbra", "alpha");

	h.graph.insert_entity(cluster_node("kgc_a", &scope, ts(100)));
	h.graph.insert_entity(cluster_node("kgc_b", &scope, ts(200)));
	h.graph.insert_entity(cluster_node("kgc_c", &scope, ts(300)));
	h.graph.insert_entity(cluster_node("kgc_x", &foreign, ts(400)));

	let page = h
		.service
		.list_episodes(list_request(&scope, None, Some(2)))
		.await
		.expect("List failed.");

	assert_eq!(page.total_count, 3);
	assert_eq!(page.episodes.len(), 2);
	// Newest first; the foreign-tenant cluster is silently absent.
	assert_eq!(page.episodes[0].cluster_node_id, "kgc_c");
	assert_eq!(page.episodes[1].cluster_node_id, "kgc_b");

	let rest = h
		.service
		.list_episodes(list_request(&scope, Some(2), Some(2)))
		.await
		.expect("List failed.");

	assert_eq!(rest.total_count, 3);
	assert_eq!(rest.episodes.len(), 1);
	assert_eq!(rest.episodes[0].cluster_node_id, "kgc_a");
}

#[tokio::test]
async fn missing_members_are_skipped_silently() {
	let h = harness().await;
	let scope = scope("acme", "alpha");

	h.graph.insert_entity(cluster_node("kgc_a", &scope, ts(100)));
	h.graph.insert_entity(work_entity("work-1", &scope, "Investigate outage", ts(50)));
	h.graph.insert_edge(Edge::link(EDGE_IN_CLUSTER, "work-1", "kgc_a"));
	h.graph.insert_edge(Edge::link(EDGE_IN_CLUSTER, "ghost-1", "kgc_a"));

	let episode = h
		.service
		.get_episode(&scope.tenant_id, &scope.project_key, "kgc_a")
		.await
		.expect("Episode lookup failed.");

	assert_eq!(episode.member_count, 1);
	assert_eq!(episode.members[0].node_id, "work-1");
}

#[tokio::test]
async fn out_of_scope_members_are_excluded() {
	let h = harness().await;
	let scope = scope("acme", "alpha");
	let foreign = brain_testkit::scope("umbra", "alpha");

	h.graph.insert_entity(cluster_node("kgc_a", &scope, ts(100)));
	h.graph.insert_entity(work_entity("work-1", &scope, "In scope", ts(50)));
	h.graph.insert_entity(work_entity("work-2", &foreign, "Out of scope", ts(60)));
	h.graph.insert_edge(Edge::link(EDGE_IN_CLUSTER, "work-1", "kgc_a"));
	h.graph.insert_edge(Edge::link(EDGE_IN_CLUSTER, "work-2", "kgc_a"));

	let episode = h
		.service
		.get_episode(&scope.tenant_id, &scope.project_key, "kgc_a")
		.await
		.expect("Episode lookup failed.");

	assert_eq!(episode.member_count, 1);
	assert_eq!(episode.members[0].node_id, "work-1");
}
