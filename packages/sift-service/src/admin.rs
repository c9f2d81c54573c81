use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, Result, SiftService,
	cache::CacheStats,
	monitor::{PerformanceMetrics, QualityTrends, SearchQualityReport},
};
use sift_config::{DiversificationConfig, ScoringWeights};

const DEGRADED_ERROR_RATE: f32 = 0.1;
const DEGRADED_QUALITY: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
	Healthy,
	Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
	pub status: HealthStatus,
	pub loaded_datasets: Vec<String>,
	pub cache_entries: usize,
	pub performance: PerformanceMetrics,
}

impl SiftService {
	pub fn clear_cache(&self) -> usize {
		self.cache.clear()
	}

	/// Drops cached results and the in-memory index of `dataset_id`. In-flight searches may still
	/// finish against the old index.
	pub fn invalidate_cache(&self, dataset_id: &str) -> usize {
		let removed = self.cache.invalidate_dataset(dataset_id);
		let index_dropped = self.indexes.remove(dataset_id);

		tracing::info!(dataset_id, removed, index_dropped, "Dataset invalidated.");

		removed
	}

	pub fn cache_stats(&self) -> CacheStats {
		self.cache.stats()
	}

	pub fn scoring_weights(&self) -> ScoringWeights {
		*self.weights.read()
	}

	/// Replaces the balanced-strategy weights. Cached results scored with the old weights are
	/// dropped.
	pub fn update_scoring_weights(&self, weights: ScoringWeights) -> Result<()> {
		sift_config::validate_scoring_weights(&weights)?;

		*self.weights.write() = weights;

		let removed = self.cache.clear();

		tracing::info!(
			semantic_similarity = weights.semantic_similarity,
			term_overlap = weights.term_overlap,
			length_penalty = weights.length_penalty,
			diversity_bonus = weights.diversity_bonus,
			removed,
			"Scoring weights updated."
		);

		Ok(())
	}

	pub fn diversification_config(&self) -> DiversificationConfig {
		self.diversification.read().clone()
	}

	pub fn update_diversification_config(&self, cfg: DiversificationConfig) -> Result<()> {
		sift_config::validate_diversification(&cfg)?;

		tracing::info!(
			enabled = cfg.enabled,
			similarity_threshold = cfg.similarity_threshold,
			lambda_param = cfg.lambda_param,
			clustering = cfg.clustering,
			"Diversification config updated."
		);

		*self.diversification.write() = cfg;

		Ok(())
	}

	pub fn get_quality_report(&self, search_id: Uuid) -> Result<SearchQualityReport> {
		self.monitor.report(search_id).ok_or(Error::SearchNotFound { search_id })
	}

	pub fn latest_quality_report(&self) -> Option<SearchQualityReport> {
		self.monitor.latest_report()
	}

	pub fn get_performance_metrics(&self) -> PerformanceMetrics {
		self.monitor.metrics()
	}

	pub fn quality_trends(&self, days: u32) -> Option<QualityTrends> {
		self.monitor.trends(OffsetDateTime::now_utc(), days)
	}

	pub fn health(&self) -> HealthReport {
		let performance = self.monitor.metrics();
		let degraded = performance.window_len > 0
			&& (performance.error_rate > DEGRADED_ERROR_RATE
				|| performance.avg_quality_score < DEGRADED_QUALITY);

		HealthReport {
			status: if degraded { HealthStatus::Degraded } else { HealthStatus::Healthy },
			loaded_datasets: self.indexes.dataset_ids(),
			cache_entries: self.cache.len(),
			performance,
		}
	}
}
