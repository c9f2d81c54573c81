mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	CacheConfig, Config, DatasetStorageConfig, DiversificationConfig, EmbeddingProviderConfig,
	Monitor, Providers, RelevanceConfig, Scoring, ScoringWeights, Search, Service, Storage,
};

use std::{fs, path::Path};

/// Allowed deviation of a weight set from a total of 1.0.
pub const WEIGHT_SUM_TOLERANCE: f32 = 0.01;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.service.request_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "service.request_timeout_ms must be greater than zero.".to_string(),
		});
	}

	validate_search(&cfg.search)?;
	validate_scoring_weights(&cfg.scoring.weights)?;
	validate_relevance(&cfg.scoring.relevance)?;
	validate_diversification(&cfg.diversity)?;

	if cfg.cache.max_entries == 0 {
		return Err(Error::Validation {
			message: "cache.max_entries must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.ttl_seconds == 0 {
		return Err(Error::Validation {
			message: "cache.ttl_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.sweep_interval_seconds == 0 {
		return Err(Error::Validation {
			message: "cache.sweep_interval_seconds must be greater than zero.".to_string(),
		});
	}

	require_unit_interval(cfg.cache.similarity_threshold, "cache.similarity_threshold")?;

	if cfg.monitor.window_size == 0 {
		return Err(Error::Validation {
			message: "monitor.window_size must be greater than zero.".to_string(),
		});
	}
	if cfg.monitor.history_size == 0 {
		return Err(Error::Validation {
			message: "monitor.history_size must be greater than zero.".to_string(),
		});
	}

	if let Some(embedding) = cfg.providers.embedding.as_ref() {
		if embedding.api_base.trim().is_empty() {
			return Err(Error::Validation {
				message: "providers.embedding.api_base must be non-empty.".to_string(),
			});
		}
		if embedding.api_key.trim().is_empty() {
			return Err(Error::Validation {
				message: "providers.embedding.api_key must be non-empty.".to_string(),
			});
		}
		if embedding.dimensions == Some(0) {
			return Err(Error::Validation {
				message: "providers.embedding.dimensions must be greater than zero.".to_string(),
			});
		}
		if embedding.timeout_ms == 0 {
			return Err(Error::Validation {
				message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
			});
		}
	}
	if let Some(dataset) = cfg.storage.dataset.as_ref() {
		if dataset.api_base.trim().is_empty() {
			return Err(Error::Validation {
				message: "storage.dataset.api_base must be non-empty.".to_string(),
			});
		}
		if dataset.timeout_ms == 0 {
			return Err(Error::Validation {
				message: "storage.dataset.timeout_ms must be greater than zero.".to_string(),
			});
		}
		if dataset.page_limit == 0 {
			return Err(Error::Validation {
				message: "storage.dataset.page_limit must be greater than zero.".to_string(),
			});
		}
	}

	Ok(())
}

pub fn validate_scoring_weights(weights: &ScoringWeights) -> Result<()> {
	let values = [
		("scoring.weights.semantic_similarity", weights.semantic_similarity),
		("scoring.weights.term_overlap", weights.term_overlap),
		("scoring.weights.length_penalty", weights.length_penalty),
		("scoring.weights.diversity_bonus", weights.diversity_bonus),
	];

	for (field, value) in values {
		require_unit_interval(value, field)?;
	}

	let sum = weights.sum();

	if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
		return Err(Error::Validation {
			message: format!("scoring.weights must sum to 1.0 (got {sum:.3})."),
		});
	}

	Ok(())
}

pub fn validate_diversification(cfg: &DiversificationConfig) -> Result<()> {
	require_unit_interval(cfg.similarity_threshold, "diversity.similarity_threshold")?;
	require_unit_interval(cfg.lambda_param, "diversity.lambda_param")?;

	if cfg.max_similar_results == 0 {
		return Err(Error::Validation {
			message: "diversity.max_similar_results must be greater than zero.".to_string(),
		});
	}
	if cfg.clusters < 2 {
		return Err(Error::Validation {
			message: "diversity.clusters must be at least 2.".to_string(),
		});
	}
	if cfg.kmeans_iterations == 0 {
		return Err(Error::Validation {
			message: "diversity.kmeans_iterations must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

pub fn validate_relevance(cfg: &RelevanceConfig) -> Result<()> {
	if !(1.0..=50.0).contains(&cfg.sigmoid_steepness) {
		return Err(Error::Validation {
			message: "scoring.relevance.sigmoid_steepness must be between 1 and 50.".to_string(),
		});
	}
	if !(0.1..=1.0).contains(&cfg.global_calibration) {
		return Err(Error::Validation {
			message: "scoring.relevance.global_calibration must be between 0.1 and 1.0."
				.to_string(),
		});
	}
	if !(0.0..=0.5).contains(&cfg.lexical_boost_max) {
		return Err(Error::Validation {
			message: "scoring.relevance.lexical_boost_max must be between 0 and 0.5.".to_string(),
		});
	}
	if !(0.0..=0.5).contains(&cfg.min_confidence_threshold) {
		return Err(Error::Validation {
			message: "scoring.relevance.min_confidence_threshold must be between 0 and 0.5."
				.to_string(),
		});
	}
	if !cfg.exponential_decay_rate.is_finite() || cfg.exponential_decay_rate <= 0.0 {
		return Err(Error::Validation {
			message: "scoring.relevance.exponential_decay_rate must be greater than zero."
				.to_string(),
		});
	}
	if !cfg.length_variance_tolerance.is_finite() || cfg.length_variance_tolerance <= 0.0 {
		return Err(Error::Validation {
			message: "scoring.relevance.length_variance_tolerance must be greater than zero."
				.to_string(),
		});
	}
	if !cfg.compression_softness.is_finite() || cfg.compression_softness <= 0.0 {
		return Err(Error::Validation {
			message: "scoring.relevance.compression_softness must be greater than zero."
				.to_string(),
		});
	}

	let unit_fields = [
		("scoring.relevance.sigmoid_midpoint", cfg.sigmoid_midpoint),
		("scoring.relevance.term_boost_factor", cfg.term_boost_factor),
		("scoring.relevance.length_boost_max", cfg.length_boost_max),
		("scoring.relevance.primary_weight", cfg.primary_weight),
		("scoring.relevance.alternative_1_weight", cfg.alternative_1_weight),
		("scoring.relevance.alternative_2_weight", cfg.alternative_2_weight),
		("scoring.relevance.proper_nouns_threshold", cfg.proper_nouns_threshold),
		(
			"scoring.relevance.semantic_weight_with_proper_nouns",
			cfg.semantic_weight_with_proper_nouns,
		),
		("scoring.relevance.proper_noun_alpha_reduction", cfg.proper_noun_alpha_reduction),
		("scoring.relevance.hybrid_calibration_base", cfg.hybrid_calibration_base),
		("scoring.relevance.hybrid_calibration_range", cfg.hybrid_calibration_range),
		("scoring.relevance.low_confidence_penalty", cfg.low_confidence_penalty),
		("scoring.relevance.multiple_methods_boost", cfg.multiple_methods_boost),
		(
			"scoring.relevance.high_score_compression_threshold",
			cfg.high_score_compression_threshold,
		),
		("scoring.relevance.high_score_compression_factor", cfg.high_score_compression_factor),
	];

	for (field, value) in unit_fields {
		require_unit_interval(value, field)?;
	}

	let blend = cfg.primary_weight + cfg.alternative_1_weight + cfg.alternative_2_weight;

	if (blend - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
		return Err(Error::Validation {
			message: format!(
				"scoring.relevance primary and alternative weights must sum to 1.0 (got {blend:.3})."
			),
		});
	}
	if cfg.hybrid_calibration_base + cfg.hybrid_calibration_range > 1.0 + f32::EPSILON {
		return Err(Error::Validation {
			message: "scoring.relevance.hybrid_calibration_base plus hybrid_calibration_range must not exceed 1.0."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_search(search: &Search) -> Result<()> {
	if search.default_limit == 0 {
		return Err(Error::Validation {
			message: "search.default_limit must be greater than zero.".to_string(),
		});
	}
	if search.max_limit < search.default_limit {
		return Err(Error::Validation {
			message: "search.max_limit must be at least search.default_limit.".to_string(),
		});
	}
	if search.candidate_multiplier == 0 {
		return Err(Error::Validation {
			message: "search.candidate_multiplier must be greater than zero.".to_string(),
		});
	}
	if search.max_candidates == 0 {
		return Err(Error::Validation {
			message: "search.max_candidates must be greater than zero.".to_string(),
		});
	}
	if !matches!(search.default_search_type.as_str(), "semantic" | "keyword" | "hybrid") {
		return Err(Error::Validation {
			message: "search.default_search_type must be one of semantic, keyword, or hybrid."
				.to_string(),
		});
	}
	if !matches!(search.default_strategy.as_str(), "advanced" | "balanced") {
		return Err(Error::Validation {
			message: "search.default_strategy must be one of advanced or balanced.".to_string(),
		});
	}
	if search.default_embedding_model.trim().is_empty() {
		return Err(Error::Validation {
			message: "search.default_embedding_model must be non-empty.".to_string(),
		});
	}

	require_unit_interval(search.default_hybrid_alpha, "search.default_hybrid_alpha")?;
	require_unit_interval(search.min_cache_quality, "search.min_cache_quality")?;

	Ok(())
}

fn require_unit_interval(value: f32, field: &str) -> Result<()> {
	if !value.is_finite() || !(0.0..=1.0).contains(&value) {
		return Err(Error::Validation { message: format!("{field} must be between 0 and 1.") });
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.service.log_level = cfg.service.log_level.trim().to_string();
	cfg.search.default_search_type = cfg.search.default_search_type.trim().to_ascii_lowercase();
	cfg.search.default_strategy = cfg.search.default_strategy.trim().to_ascii_lowercase();

	if let Some(embedding) = cfg.providers.embedding.as_mut() {
		embedding.api_base = embedding.api_base.trim_end_matches('/').to_string();
	}
	if let Some(dataset) = cfg.storage.dataset.as_mut() {
		dataset.api_base = dataset.api_base.trim_end_matches('/').to_string();
	}
}
