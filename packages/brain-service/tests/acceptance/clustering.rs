use brain_domain::{entity::EDGE_IN_CLUSTER, scope::Scope, window::Window};
use brain_service::BuildClustersRequest;
use brain_testkit::{
	doc_entity, doc_profile, scope, test_config, ts, vector_entry, work_entity, work_profile,
};

use super::{Harness, harness, harness_with};

fn build_request(scope: &Scope) -> BuildClustersRequest {
	BuildClustersRequest {
		tenant_id: scope.tenant_id.clone(),
		project_key: scope.project_key.clone(),
		window_start: None,
		window_end: None,
		max_seeds: None,
		max_cluster_size: None,
	}
}

async fn outage_harness(threshold: f32) -> (Harness, Scope) {
	let mut cfg = test_config();

	cfg.clustering.similarity_threshold = threshold;

	let h = harness_with(cfg).await;
	let scope = scope("acme", "alpha");

	h.graph.insert_entity(work_entity("work-1", &scope, "Investigate outage", ts(200)));
	h.graph.insert_entity(doc_entity("doc-1", &scope, "Outage doc", ts(100)));
	h.vectors.insert(vector_entry("work-1", &work_profile(), &scope, 0.90));
	h.vectors.insert(vector_entry("doc-1", &doc_profile(), &scope, 0.95));

	(h, scope)
}

#[tokio::test]
async fn overlapping_seed_neighborhoods_merge_into_one_cluster() {
	let (h, scope) = outage_harness(0.0).await;
	let response = h.service.build_clusters(build_request(&scope)).await.expect("Build failed.");

	assert_eq!(response.clusters_created, 1);
	assert_eq!(response.members_linked, 2);

	let edges = h.graph.edges_of_type(EDGE_IN_CLUSTER);
	let mut sources: Vec<&str> = edges.iter().map(|edge| edge.source_id.as_str()).collect();

	sources.sort();

	assert_eq!(sources, ["doc-1", "work-1"]);
	assert!(edges.iter().all(|edge| edge.target_id == edges[0].target_id));

	let cluster = h.graph.entity(&edges[0].target_id).expect("Cluster node missing.");

	assert_eq!(cluster.number_prop("similarity"), Some(f64::from(0.95_f32)));
	assert_eq!(cluster.number_prop("member_count"), Some(2.0));
}

#[tokio::test]
async fn rebuilding_an_unchanged_graph_creates_nothing() {
	let (h, scope) = outage_harness(0.0).await;
	let first = h.service.build_clusters(build_request(&scope)).await.expect("Build failed.");
	let ids_before: Vec<String> = h
		.graph
		.edges_of_type(EDGE_IN_CLUSTER)
		.into_iter()
		.map(|edge| edge.target_id)
		.collect();
	let second = h.service.build_clusters(build_request(&scope)).await.expect("Rebuild failed.");
	let ids_after: Vec<String> = h
		.graph
		.edges_of_type(EDGE_IN_CLUSTER)
		.into_iter()
		.map(|edge| edge.target_id)
		.collect();

	assert_eq!(first.clusters_created, 1);
	assert_eq!(second.clusters_created, 0);
	assert_eq!(second.members_linked, 2);
	assert_eq!(ids_before, ids_after);
}

#[tokio::test]
async fn threshold_boundary_is_inclusive() {
	let h = harness().await;
	let scope = scope("acme", "alpha");

	h.graph.insert_entity(work_entity("work-1", &scope, "Investigate outage", ts(300)));
	h.graph.insert_entity(doc_entity("doc-1", &scope, "Outage doc", ts(200)));
	h.graph.insert_entity(doc_entity("doc-2", &scope, "Unrelated doc", ts(100)));
	h.vectors.insert(vector_entry("work-1", &work_profile(), &scope, 0.90));
	// Exactly at the default 0.35 threshold: admitted.
	h.vectors.insert(vector_entry("doc-1", &doc_profile(), &scope, 0.35));
	h.vectors.insert(vector_entry("doc-2", &doc_profile(), &scope, 0.20));

	let mut request = build_request(&scope);

	request.max_seeds = Some(1);

	let response = h.service.build_clusters(request).await.expect("Build failed.");

	assert_eq!(response.clusters_created, 1);
	assert_eq!(response.members_linked, 2);

	let edges = h.graph.edges_of_type(EDGE_IN_CLUSTER);

	assert!(edges.iter().any(|edge| edge.source_id == "doc-1"));
	assert!(edges.iter().all(|edge| edge.source_id != "doc-2"));
}

#[tokio::test]
async fn clusters_stay_invisible_outside_their_scope() {
	let (h, scope) = outage_harness(0.0).await;

	h.service.build_clusters(build_request(&scope)).await.expect("Build failed.");

	let foreign = h
		.service
		.list_clusters_for_project("umbra", "alpha", Window::default())
		.await
		.expect("List failed.");
	let own = h
		.service
		.list_clusters_for_project("acme", "alpha", Window::default())
		.await
		.expect("List failed.");

	assert!(foreign.is_empty());
	assert_eq!(own.len(), 1);
	assert_eq!(own[0].member_node_ids, ["doc-1", "work-1"]);
}

#[tokio::test]
async fn window_outside_all_seeds_builds_nothing() {
	let (h, scope) = outage_harness(0.0).await;
	let mut request = build_request(&scope);

	request.window_start = Some(ts(300));
	request.window_end = Some(ts(400));

	let response = h.service.build_clusters(request).await.expect("Build failed.");

	assert_eq!(response.clusters_created, 0);
	assert_eq!(response.members_linked, 0);
}

#[tokio::test]
async fn cluster_size_caps_neighbor_admission() {
	let h = harness().await;
	let scope = scope("acme", "alpha");

	// The seed itself is not indexed yet, so every fetched hit is a
	// candidate neighbor.
	h.graph.insert_entity(work_entity("work-1", &scope, "Investigate outage", ts(400)));
	h.graph.insert_entity(doc_entity("doc-1", &scope, "Primary doc", ts(300)));
	h.graph.insert_entity(doc_entity("doc-2", &scope, "Secondary doc", ts(200)));
	h.graph.insert_entity(doc_entity("doc-3", &scope, "Tertiary doc", ts(100)));
	h.vectors.insert(vector_entry("doc-1", &doc_profile(), &scope, 0.90));
	h.vectors.insert(vector_entry("doc-2", &doc_profile(), &scope, 0.80));
	h.vectors.insert(vector_entry("doc-3", &doc_profile(), &scope, 0.70));

	let mut request = build_request(&scope);

	request.max_seeds = Some(1);
	request.max_cluster_size = Some(2);

	let response = h.service.build_clusters(request).await.expect("Build failed.");

	assert_eq!(response.members_linked, 2);

	let edges = h.graph.edges_of_type(EDGE_IN_CLUSTER);
	let mut sources: Vec<&str> = edges.iter().map(|edge| edge.source_id.as_str()).collect();

	sources.sort();

	assert_eq!(sources, ["doc-1", "work-1"]);
}

#[tokio::test]
async fn neighbors_missing_from_the_graph_are_skipped() {
	let h = harness().await;
	let scope = scope("acme", "alpha");

	h.graph.insert_entity(work_entity("work-1", &scope, "Investigate outage", ts(200)));
	h.graph.insert_entity(doc_entity("doc-1", &scope, "Outage doc", ts(100)));
	h.vectors.insert(vector_entry("work-1", &work_profile(), &scope, 0.90));
	h.vectors.insert(vector_entry("doc-1", &doc_profile(), &scope, 0.80));
	// Indexed but never ingested into the graph.
	h.vectors.insert(vector_entry("ghost-1", &doc_profile(), &scope, 0.99));

	let response = h.service.build_clusters(build_request(&scope)).await.expect("Build failed.");

	assert_eq!(response.clusters_created, 1);

	let edges = h.graph.edges_of_type(EDGE_IN_CLUSTER);

	assert!(edges.iter().all(|edge| edge.source_id != "ghost-1"));
}
