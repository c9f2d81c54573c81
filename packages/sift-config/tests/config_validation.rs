use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use sift_config::{Config, DiversificationConfig, ScoringWeights};

const SAMPLE_CONFIG_TOML: &str = r#"
[service]
log_level = "debug"
request_timeout_ms = 5000

[search]
default_limit = 5
default_search_type = "Hybrid"

[scoring.weights]
semantic_similarity = 0.5
term_overlap = 0.3
length_penalty = 0.1
diversity_bonus = 0.1

[diversity]
lambda_param = 0.6
clustering = true

[cache]
ttl_seconds = 120

[providers.embedding]
provider_id = "openai"
api_base = "https://api.example.com/v1/"
api_key = "test-key"
models = ["text-embedding-3-small"]
"#;

fn write_temp_config(payload: &str) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("sift_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: &str) -> sift_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = sift_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

#[test]
fn empty_file_yields_defaults() {
	let cfg = load_payload("").expect("Empty config must load.");

	assert_eq!(cfg.service.log_level, "info");
	assert_eq!(cfg.search.default_limit, 10);
	assert_eq!(cfg.search.default_search_type, "semantic");
	assert_eq!(cfg.scoring.weights, ScoringWeights::default());
	assert_eq!(cfg.diversity, DiversificationConfig::default());
	assert_eq!(cfg.cache.max_entries, 5_000);
	assert!(cfg.providers.embedding.is_none());
}

#[test]
fn sample_config_is_normalized() {
	let cfg = load_payload(SAMPLE_CONFIG_TOML).expect("Sample config must load.");
	let embedding = cfg.providers.embedding.expect("Embedding provider must be present.");

	assert_eq!(cfg.search.default_search_type, "hybrid");
	assert_eq!(embedding.api_base, "https://api.example.com/v1");
	assert_eq!(embedding.path, "/embeddings");
	assert_eq!(embedding.timeout_ms, 30_000);
	assert!(cfg.diversity.clustering);
	assert_eq!(cfg.diversity.similarity_threshold, 0.85);
	assert_eq!(cfg.cache.ttl_seconds, 120);
}

#[test]
fn scoring_weights_must_sum_to_one() {
	let payload = SAMPLE_CONFIG_TOML.replace("diversity_bonus = 0.1", "diversity_bonus = 0.3");
	let err = load_payload(&payload).expect_err("Expected weight sum validation error.");

	assert!(err.to_string().contains("scoring.weights must sum to 1.0"), "Unexpected error: {err}");
}

#[test]
fn scoring_weights_within_tolerance_are_accepted() {
	let weights = ScoringWeights {
		semantic_similarity: 0.6,
		term_overlap: 0.25,
		length_penalty: 0.1,
		diversity_bonus: 0.055,
	};

	assert!(sift_config::validate_scoring_weights(&weights).is_ok());

	let weights = ScoringWeights { diversity_bonus: 0.07, ..weights };

	assert!(sift_config::validate_scoring_weights(&weights).is_err());
}

#[test]
fn diversification_lambda_must_be_in_unit_interval() {
	let cfg = DiversificationConfig { lambda_param: 1.2, ..Default::default() };
	let err = sift_config::validate_diversification(&cfg).expect_err("Expected lambda error.");

	assert!(
		err.to_string().contains("diversity.lambda_param must be between 0 and 1."),
		"Unexpected error: {err}"
	);

	let cfg = DiversificationConfig { similarity_threshold: -0.1, ..Default::default() };

	assert!(sift_config::validate_diversification(&cfg).is_err());
}

#[test]
fn sigmoid_steepness_is_range_checked() {
	let payload = "[scoring.relevance]\nsigmoid_steepness = 80.0\n";
	let err = load_payload(payload).expect_err("Expected steepness validation error.");

	assert!(
		err.to_string().contains("scoring.relevance.sigmoid_steepness must be between 1 and 50."),
		"Unexpected error: {err}"
	);
}

#[test]
fn unknown_search_type_is_rejected() {
	let payload = "[search]\ndefault_search_type = \"fuzzy\"\n";

	assert!(load_payload(payload).is_err());
}

#[test]
fn embedding_provider_requires_api_key() {
	let payload = SAMPLE_CONFIG_TOML.replace("api_key = \"test-key\"", "api_key = \" \"");
	let err = load_payload(&payload).expect_err("Expected api_key validation error.");

	assert!(
		err.to_string().contains("providers.embedding.api_key must be non-empty."),
		"Unexpected error: {err}"
	);
}

#[test]
fn missing_file_reports_read_error() {
	let path = env::temp_dir().join("sift_config_test_missing_file.toml");
	let err = sift_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, sift_config::Error::ReadConfig { .. }));
}
