use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
	pub service: Service,
	pub search: Search,
	pub scoring: Scoring,
	pub diversity: DiversificationConfig,
	pub cache: CacheConfig,
	pub monitor: Monitor,
	pub providers: Providers,
	pub storage: Storage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Service {
	pub log_level: String,
	/// Upper bound for one search, including collaborator calls.
	pub request_timeout_ms: u64,
}
impl Default for Service {
	fn default() -> Self {
		Self { log_level: "info".to_string(), request_timeout_ms: 30_000 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_limit: u32,
	pub max_limit: u32,
	/// Candidates retrieved per requested result before scoring and diversification.
	pub candidate_multiplier: u32,
	pub max_candidates: u32,
	/// One of semantic, keyword, or hybrid.
	pub default_search_type: String,
	/// One of advanced or balanced.
	pub default_strategy: String,
	pub default_hybrid_alpha: f32,
	pub default_embedding_model: String,
	/// Result sets whose overall quality falls below this value are not cached.
	pub min_cache_quality: f32,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			default_limit: 10,
			max_limit: 100,
			candidate_multiplier: 3,
			max_candidates: 100,
			default_search_type: "semantic".to_string(),
			default_strategy: "advanced".to_string(),
			default_hybrid_alpha: 0.5,
			default_embedding_model: "text-embedding-3-small".to_string(),
			min_cache_quality: 0.3,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scoring {
	pub weights: ScoringWeights,
	pub relevance: RelevanceConfig,
}

/// Component weights of the balanced scoring strategy.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringWeights {
	pub semantic_similarity: f32,
	pub term_overlap: f32,
	pub length_penalty: f32,
	pub diversity_bonus: f32,
}
impl ScoringWeights {
	pub fn sum(&self) -> f32 {
		self.semantic_similarity + self.term_overlap + self.length_penalty + self.diversity_bonus
	}
}
impl Default for ScoringWeights {
	fn default() -> Self {
		Self {
			semantic_similarity: 0.6,
			term_overlap: 0.25,
			length_penalty: 0.1,
			diversity_bonus: 0.05,
		}
	}
}

/// Parameters of the advanced multi-stage relevance pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelevanceConfig {
	pub sigmoid_steepness: f32,
	pub sigmoid_midpoint: f32,
	pub exponential_decay_rate: f32,
	pub term_boost_factor: f32,
	pub optimal_length_ratio: f32,
	pub length_variance_tolerance: f32,
	pub length_boost_max: f32,
	pub primary_weight: f32,
	pub alternative_1_weight: f32,
	pub alternative_2_weight: f32,
	pub lexical_boost_max: f32,
	pub global_calibration: f32,
	/// Softness of the `x / (x + (1 - x) * s)` compression after calibration.
	pub compression_softness: f32,
	pub enable_dynamic_calibration: bool,
	/// Share of capitalized query tokens above which a query counts as proper-noun heavy.
	pub proper_nouns_threshold: f32,
	pub semantic_weight_with_proper_nouns: f32,
	pub proper_noun_alpha_reduction: f32,
	pub hybrid_calibration_base: f32,
	pub hybrid_calibration_range: f32,
	pub min_confidence_threshold: f32,
	pub low_confidence_penalty: f32,
	pub multiple_methods_boost: f32,
	pub high_score_compression_threshold: f32,
	pub high_score_compression_factor: f32,
}
impl Default for RelevanceConfig {
	fn default() -> Self {
		Self {
			sigmoid_steepness: 10.0,
			sigmoid_midpoint: 0.5,
			exponential_decay_rate: 2.0,
			term_boost_factor: 0.3,
			optimal_length_ratio: 2.0,
			length_variance_tolerance: 1.5,
			length_boost_max: 0.2,
			primary_weight: 0.5,
			alternative_1_weight: 0.3,
			alternative_2_weight: 0.2,
			lexical_boost_max: 0.15,
			global_calibration: 0.85,
			compression_softness: 0.3,
			enable_dynamic_calibration: true,
			proper_nouns_threshold: 0.3,
			semantic_weight_with_proper_nouns: 0.3,
			proper_noun_alpha_reduction: 0.2,
			hybrid_calibration_base: 0.8,
			hybrid_calibration_range: 0.2,
			min_confidence_threshold: 0.1,
			low_confidence_penalty: 0.5,
			multiple_methods_boost: 0.1,
			high_score_compression_threshold: 0.95,
			high_score_compression_factor: 0.5,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DiversificationConfig {
	pub enabled: bool,
	/// Similarity at or above which two results count as near-duplicates.
	pub similarity_threshold: f32,
	/// Relevance weight of the MMR objective, the rest goes to novelty.
	pub lambda_param: f32,
	/// Largest number of mutually near-duplicate results kept in one result set.
	pub max_similar_results: u32,
	pub clustering: bool,
	pub clusters: u32,
	pub kmeans_iterations: u32,
}
impl Default for DiversificationConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			similarity_threshold: 0.85,
			lambda_param: 0.7,
			max_similar_results: 3,
			clustering: false,
			clusters: 5,
			kmeans_iterations: 20,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
	pub enabled: bool,
	pub max_entries: u32,
	pub ttl_seconds: u64,
	pub similarity_threshold: f32,
	pub enable_similarity_search: bool,
	pub sweep_interval_seconds: u64,
}
impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			max_entries: 5_000,
			ttl_seconds: 3_600,
			similarity_threshold: 0.85,
			enable_similarity_search: true,
			sweep_interval_seconds: 300,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Monitor {
	pub window_size: u32,
	pub history_size: u32,
}
impl Default for Monitor {
	fn default() -> Self {
		Self { window_size: 100, history_size: 1_000 }
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Providers {
	pub embedding: Option<EmbeddingProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	#[serde(default = "default_embedding_path")]
	pub path: String,
	/// Models accepted by the provider. Empty accepts any model.
	#[serde(default)]
	pub models: Vec<String>,
	pub dimensions: Option<u32>,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Storage {
	pub dataset: Option<DatasetStorageConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetStorageConfig {
	pub api_base: String,
	pub api_key: Option<String>,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default = "default_page_limit")]
	pub page_limit: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

fn default_embedding_path() -> String {
	"/embeddings".to_string()
}

fn default_timeout_ms() -> u64 {
	30_000
}

fn default_page_limit() -> u32 {
	5_000
}
