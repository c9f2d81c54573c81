use std::sync::Arc;

use sift_config::DiversificationConfig;
use sift_domain::{EmbeddingCollection, SearchResults, SearchType};
use sift_service::{Error, ErrorStatus, Providers, SearchOptions, SearchRequest, SiftService};
use sift_testkit::{CountingStorage, Failure, FailingEmbedder, StaticEmbedder};

const DATASET: &str = "payments";
const QUERY: &str = "payment retries";

fn payments() -> EmbeddingCollection {
	let mut rows: Vec<(String, String, Vec<f32>)> = Vec::new();

	for i in 0..5 {
		let mut vector = vec![0.0; 6];

		vector[0] = 1.0;
		vector[1] = 0.01 * i as f32;
		rows.push((
			format!("dup-{i}"),
			format!("Retry failed payments with exponential backoff, variant {i}"),
			vector,
		));
	}

	let topics = [
		"Refund policy for annual plans",
		"Rotating API keys for merchants",
		"Currency conversion rounding rules",
		"Webhook signature verification",
		"Chargeback dispute timeline",
	];

	for (i, topic) in topics.iter().enumerate() {
		let mut vector = vec![0.0; 6];

		vector[0] = 0.3;
		vector[i + 1] = 1.0;
		rows.push((format!("topic-{i}"), topic.to_string(), vector));
	}

	let rows: Vec<(&str, &str, Vec<f32>)> = rows
		.iter()
		.map(|(id, text, vector)| (id.as_str(), text.as_str(), vector.clone()))
		.collect();

	sift_testkit::collection(DATASET, &rows).expect("collection")
}

struct Harness {
	service: SiftService,
	embedder: Arc<StaticEmbedder>,
	storage: Arc<CountingStorage>,
}

fn harness() -> Harness {
	let embedder =
		Arc::new(StaticEmbedder::new(6).with_vector(QUERY, vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0]));
	let storage = Arc::new(CountingStorage::new());

	storage.insert(payments());

	let service =
		sift_testkit::service(sift_testkit::test_config(), embedder.clone(), storage.clone())
			.expect("service");

	Harness { service, embedder, storage }
}

fn semantic(query: &str, limit: u32) -> SearchRequest {
	SearchRequest::new(query, DATASET).with_limit(limit).with_search_type(SearchType::Semantic)
}

#[tokio::test]
async fn near_duplicates_are_capped() {
	let harness = harness();
	let results = harness.service.search(semantic(QUERY, 5)).await.expect("search");
	let duplicates = results.results.iter().filter(|result| result.id.starts_with("dup-")).count();

	assert_eq!(results.results.len(), 5);
	assert_eq!(results.total_results, results.results.len());
	assert!(duplicates <= 3, "got {duplicates} near-duplicates");
	assert!(results.results.windows(2).all(|pair| pair[0].score >= pair[1].score));
	assert!(results.results.iter().all(|result| (0.0..=1.0).contains(&result.score)));
}

#[tokio::test]
async fn disabling_diversification_keeps_duplicates() {
	let harness = harness();
	let mut req = semantic(QUERY, 5);

	req.options = SearchOptions { diversify: Some(false), ..Default::default() };

	let results = harness.service.search(req).await.expect("search");

	assert!(results.results.iter().all(|result| result.id.starts_with("dup-")));
}

#[tokio::test]
async fn cluster_diversifier_is_selectable_per_request() {
	let harness = harness();
	let mut req = semantic(QUERY, 4);

	req.options = SearchOptions {
		diversification: Some(DiversificationConfig {
			clustering: true,
			clusters: 3,
			..Default::default()
		}),
		..Default::default()
	};

	let results = harness.service.search(req).await.expect("search");

	assert!(!results.results.is_empty());
	assert!(results.results.len() <= 4);
}

async fn rank_people(dynamic_calibration: bool) -> SearchResults {
	let embedder = Arc::new(
		StaticEmbedder::new(3).with_vector("Juan Pérez Madrid", vec![1.0, 0.0, 0.0]),
	);
	let storage = Arc::new(CountingStorage::new());
	let rows = [
		(
			"name",
			"Juan Pérez joined the logistics team last spring as a senior analyst",
			vec![0.2, 0.98, 0.0],
		),
		("related", "Spanish football coach based in the capital city", vec![0.95, 0.0, 0.3122]),
		(
			"unrelated",
			"Quarterly revenue report for the logistics division",
			vec![0.2, -0.6, 0.7746],
		),
	];
	let mut cfg = sift_testkit::test_config();

	cfg.scoring.relevance.enable_dynamic_calibration = dynamic_calibration;
	storage.insert(sift_testkit::collection("people", &rows).expect("collection"));

	let service = sift_testkit::service(cfg, embedder, storage).expect("service");
	let req = SearchRequest::new("Juan Pérez Madrid", "people")
		.with_limit(3)
		.with_search_type(SearchType::Hybrid);
	let results = service.search(req).await.expect("search");

	assert_eq!(results.results.len(), 3);

	results
}

#[tokio::test]
async fn proper_noun_queries_favor_exact_matches() {
	let calibrated = rank_people(true).await.results;
	let uncalibrated = rank_people(false).await.results;

	// Without the proper-noun path the semantically closer row wins.
	assert_eq!(uncalibrated[0].id, "related");
	assert_eq!(uncalibrated[1].id, "name");
	assert_eq!(calibrated[0].id, "name");
	assert_eq!(calibrated[1].id, "related");
	assert!(calibrated[0].score - calibrated[1].score > 0.05);

	let signals = calibrated[0].signals.as_ref().expect("signals");

	assert_eq!(signals.match_count, 2);
}

#[tokio::test]
async fn repeated_query_is_served_from_cache() {
	let harness = harness();
	let first = harness.service.search(semantic(QUERY, 5)).await.expect("first");
	let embed_calls = harness.embedder.calls();
	let loads = harness.storage.loads();
	let second = harness.service.search(semantic(QUERY, 5)).await.expect("second");

	assert!(!first.cache_hit);
	assert!(second.cache_hit);
	assert_eq!(second.results, first.results);
	assert_eq!(harness.embedder.calls(), embed_calls);
	assert_eq!(harness.storage.loads(), loads);
	assert_eq!(harness.service.cache_stats().hits, 1);
}

#[tokio::test]
async fn reordered_query_hits_the_similarity_index() {
	let harness = harness();

	harness.service.search(semantic(QUERY, 5)).await.expect("first");

	let reordered = harness.service.search(semantic("retries payment", 5)).await.expect("second");

	assert!(reordered.cache_hit);
	assert_eq!(harness.embedder.calls(), 1);
	assert_eq!(harness.service.cache_stats().similarity_hits, 1);
}

#[tokio::test]
async fn different_limits_do_not_share_cache_entries() {
	let harness = harness();

	harness.service.search(semantic(QUERY, 5)).await.expect("first");

	let other = harness.service.search(semantic(QUERY, 3)).await.expect("second");

	assert!(!other.cache_hit);
	assert_eq!(other.results.len(), 3);
}

#[tokio::test]
async fn keyword_search_needs_no_embedding() {
	let harness = harness();
	let req = SearchRequest::new("webhook signature", DATASET)
		.with_limit(3)
		.with_search_type(SearchType::Keyword);
	let results = harness.service.search(req).await.expect("search");

	assert_eq!(harness.embedder.calls(), 0);
	assert_eq!(results.results[0].id, "topic-3");
	assert!(results.results.iter().all(|result| result.score > 0.0));
}

#[tokio::test]
async fn balanced_strategy_is_selectable() {
	let harness = harness();
	let mut req = semantic(QUERY, 5);

	req.options = SearchOptions {
		scoring_strategy: Some("balanced".to_string()),
		..Default::default()
	};

	let results = harness.service.search(req).await.expect("search");

	assert!(!results.results.is_empty());
	assert!(results.results.iter().all(|result| (0.0..=1.0).contains(&result.score)));
}

#[tokio::test]
async fn request_validation_errors() {
	let harness = harness();
	let empty = harness.service.search(semantic("   ", 5)).await.expect_err("empty");
	let mut bad_type = semantic(QUERY, 5);

	bad_type.search_type = Some("fuzzy".to_string());

	let bad_type = harness.service.search(bad_type).await.expect_err("type");
	let bad_limit = harness.service.search(semantic(QUERY, 0)).await.expect_err("limit");
	let mut bad_alpha = semantic(QUERY, 5);

	bad_alpha.hybrid_alpha = Some(1.5);

	let bad_alpha = harness.service.search(bad_alpha).await.expect_err("alpha");
	let mut bad_strategy = semantic(QUERY, 5);

	bad_strategy.options.scoring_strategy = Some("magic".to_string());

	let bad_strategy = harness.service.search(bad_strategy).await.expect_err("strategy");

	assert!(matches!(empty, Error::EmptyQuery));
	assert!(matches!(bad_type, Error::InvalidSearchType { .. }));
	assert!(matches!(bad_limit, Error::InvalidRequest { .. }));
	assert!(matches!(bad_alpha, Error::InvalidRequest { .. }));
	assert!(matches!(bad_strategy, Error::InvalidRequest { .. }));
	assert_eq!(empty.status().http_code(), 400);
	assert_eq!(harness.service.get_performance_metrics().error_rate, 1.0);
}

#[tokio::test]
async fn unknown_dataset_is_not_found() {
	let harness = harness();
	let err = harness
		.service
		.search(SearchRequest::new(QUERY, "missing").with_search_type(SearchType::Semantic))
		.await
		.expect_err("missing dataset");

	assert!(matches!(err, Error::DatasetNotFound { .. }));
	assert_eq!(err.status(), ErrorStatus::NotFound);
}

#[tokio::test]
async fn embedding_failures_are_not_masked() {
	for (failure, code) in [
		(Failure::ModelNotFound, "EMBEDDING_MODEL_NOT_FOUND"),
		(Failure::Unavailable, "EMBEDDING_GENERATION_FAILED"),
	] {
		let storage = Arc::new(CountingStorage::new());

		storage.insert(payments());

		let providers = Providers::new(Arc::new(FailingEmbedder::new(failure)), storage);
		let service = SiftService::new(sift_testkit::test_config(), providers).expect("service");
		let err = service.search(semantic(QUERY, 5)).await.expect_err("embedding failure");

		assert_eq!(err.code(), code);
		assert_eq!(service.cache_stats().entries, 0);
	}
}
