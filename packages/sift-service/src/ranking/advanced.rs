use sift_config::RelevanceConfig;
use sift_domain::SearchType;

use super::{
	clamp_unit,
	scoring::{DistanceStats, ScoringContext, ScoringSignals, ScoringStrategy, StrategyKind},
};

/// Multi-stage relevance pipeline. Each stage clamps its output to `[0, 1]` because the next
/// stage assumes that range.
#[derive(Debug, Clone)]
pub struct AdvancedRelevanceStrategy {
	cfg: RelevanceConfig,
}
impl AdvancedRelevanceStrategy {
	pub fn new(cfg: RelevanceConfig) -> Self {
		Self { cfg }
	}

	pub fn config(&self) -> &RelevanceConfig {
		&self.cfg
	}

	pub fn normalized_similarity(&self, distance: f32, stats: Option<DistanceStats>) -> f32 {
		stats.map(|stats| stats.similarity(distance)).unwrap_or(0.0)
	}

	pub fn primary_component(&self, similarity: f32) -> f32 {
		let k = self.cfg.sigmoid_steepness;
		let x0 = self.cfg.sigmoid_midpoint;

		clamp_unit(1.0 / (1.0 + (-k * (similarity - x0)).exp()))
	}

	pub fn term_aware_component(&self, distance: f32, term_match_ratio: f32) -> f32 {
		let base = (-self.cfg.exponential_decay_rate * distance.max(0.0)).exp();

		clamp_unit(base * (1.0 + self.cfg.term_boost_factor * clamp_unit(term_match_ratio)))
	}

	pub fn length_aware_component(&self, distance: f32, length_ratio: f32) -> f32 {
		let base = 1.0 / (1.0 + distance.max(0.0).ln_1p());
		let deviation = length_ratio - self.cfg.optimal_length_ratio;
		let sigma = self.cfg.length_variance_tolerance;
		let length_factor = (-(deviation * deviation) / (2.0 * sigma * sigma)).exp();

		clamp_unit(base * (1.0 + self.cfg.length_boost_max * length_factor))
	}

	pub fn blend(&self, primary: f32, alternative_1: f32, alternative_2: f32) -> f32 {
		clamp_unit(
			self.cfg.primary_weight * clamp_unit(primary)
				+ self.cfg.alternative_1_weight * clamp_unit(alternative_1)
				+ self.cfg.alternative_2_weight * clamp_unit(alternative_2),
		)
	}

	pub fn lexical_boost(&self, score: f32, term_match_ratio: f32) -> f32 {
		clamp_unit(score * (1.0 + clamp_unit(term_match_ratio) * self.cfg.lexical_boost_max))
	}

	/// Global calibration followed by `x / (x + (1 - x) * s)` compression.
	pub fn calibrate(&self, score: f32) -> f32 {
		let x = clamp_unit(score * self.cfg.global_calibration);
		let denominator = x + (1.0 - x) * self.cfg.compression_softness;

		if denominator <= f32::EPSILON {
			return 0.0;
		}

		clamp_unit(x / denominator)
	}

	/// Stages one through seven: distance to calibrated semantic relevance.
	pub fn semantic_score(&self, signals: &ScoringSignals<'_>, context: &ScoringContext<'_>) -> f32 {
		let Some(distance) = signals.distance.filter(|distance| distance.is_finite()) else {
			return 0.0;
		};
		let term_match_ratio = signals.term_match_ratio();
		let similarity = self.normalized_similarity(distance, context.distance_stats);
		let primary = self.primary_component(similarity);
		let alternative_1 = self.term_aware_component(distance, term_match_ratio);
		let alternative_2 = self.length_aware_component(distance, signals.length_ratio());
		let weighted = self.blend(primary, alternative_1, alternative_2);
		let boosted = self.lexical_boost(weighted, term_match_ratio);

		self.calibrate(boosted)
	}

	/// Stage eight: alpha blend with the keyword signal and, for proper-noun heavy queries, a
	/// lower semantic weight plus a factor in `[base, base + range]` that grows with the lexical
	/// share of the evidence.
	pub fn hybrid_score(&self, semantic: f32, keyword: f32, context: &ScoringContext<'_>) -> f32 {
		let semantic = clamp_unit(semantic);
		let keyword = clamp_unit(keyword);
		let mut alpha = clamp_unit(context.hybrid_alpha);
		let proper_nouns = self.cfg.enable_dynamic_calibration
			&& sift_domain::text::proper_noun_ratio(context.query) > self.cfg.proper_nouns_threshold;

		if proper_nouns {
			let reduced = (alpha - self.cfg.proper_noun_alpha_reduction)
				.max(self.cfg.semantic_weight_with_proper_nouns);

			alpha = alpha.min(reduced);
		}

		let blended = clamp_unit(alpha * semantic + (1.0 - alpha) * keyword);

		if !proper_nouns {
			return blended;
		}

		let total = semantic + keyword;
		let lexical_share = if total > f32::EPSILON { keyword / total } else { 0.0 };
		let factor =
			self.cfg.hybrid_calibration_base + self.cfg.hybrid_calibration_range * lexical_share;

		clamp_unit(blended * factor)
	}

	/// Stage nine: confidence floor, multi-method boost, diversity penalty, then top-end
	/// compression. Scores above `high_score_compression_threshold` are pulled toward the
	/// threshold by `high_score_compression_factor` and keep their order, so `1.0` becomes
	/// `0.975` with the defaults.
	pub fn finalize(&self, score: f32, diversity_penalty: f32, multiple_methods: bool) -> f32 {
		let mut score = clamp_unit(score);

		if score < self.cfg.min_confidence_threshold {
			score *= self.cfg.low_confidence_penalty;
		}
		if multiple_methods {
			score *= 1.0 + self.cfg.multiple_methods_boost;
		}

		score = clamp_unit(score * (1.0 - clamp_unit(diversity_penalty)));

		let threshold = self.cfg.high_score_compression_threshold;

		if score > threshold {
			score = threshold + (score - threshold) * self.cfg.high_score_compression_factor;
		}

		clamp_unit(score)
	}
}
impl ScoringStrategy for AdvancedRelevanceStrategy {
	fn kind(&self) -> StrategyKind {
		StrategyKind::Advanced
	}

	fn score(&self, signals: &ScoringSignals<'_>, context: &ScoringContext<'_>) -> f32 {
		let keyword = signals.keyword_score.map(clamp_unit).unwrap_or(0.0);
		let score = match context.search_type {
			SearchType::Keyword => return clamp_unit(keyword),
			SearchType::Semantic => self.semantic_score(signals, context),
			SearchType::Hybrid =>
				self.hybrid_score(self.semantic_score(signals, context), keyword, context),
		};

		self.finalize(score, signals.diversity_penalty, context.found_by_multiple_methods)
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::*;

	fn terms(tokens: &[&str]) -> HashSet<String> {
		tokens.iter().map(|token| token.to_string()).collect()
	}

	fn strategy() -> AdvancedRelevanceStrategy {
		AdvancedRelevanceStrategy::new(RelevanceConfig::default())
	}

	fn context(search_type: SearchType, query: &str) -> ScoringContext<'_> {
		ScoringContext {
			search_type,
			query,
			distance_stats: DistanceStats::from_distances([0.1, 0.9]),
			hybrid_alpha: 0.5,
			found_by_multiple_methods: false,
		}
	}

	#[test]
	fn primary_component_is_monotonic_in_distance() {
		let strategy = strategy();
		let stats = DistanceStats::from_distances([0.0, 2.0]);
		let mut previous = f32::INFINITY;

		for step in 0..=40 {
			let distance = step as f32 * 0.05;
			let primary =
				strategy.primary_component(strategy.normalized_similarity(distance, stats));

			assert!(primary <= previous, "primary increased at distance {distance}");

			previous = primary;
		}
	}

	#[test]
	fn scores_stay_within_unit_interval() {
		let strategy = strategy();
		let query_terms = terms(&["rust", "memory"]);
		let result_sets = [terms(&[]), terms(&["rust"]), terms(&["rust", "memory", "safety"])];
		let distances = [None, Some(0.0), Some(0.1), Some(0.5), Some(0.9), Some(2.0), Some(7.5)];

		for search_type in [SearchType::Semantic, SearchType::Keyword, SearchType::Hybrid] {
			for result_terms in &result_sets {
				for distance in distances {
					for keyword in [None, Some(0.0), Some(0.4), Some(1.0)] {
						for multiple in [false, true] {
							let signals = ScoringSignals {
								distance,
								keyword_score: keyword,
								query_terms: &query_terms,
								result_terms,
								result_length: 12,
								query_length: 2,
								diversity_penalty: 0.0,
							};
							let ctx = ScoringContext {
								found_by_multiple_methods: multiple,
								..context(search_type, "Rust Memory")
							};
							let score = strategy.score(&signals, &ctx);

							assert!((0.0..=1.0).contains(&score), "score {score} out of range");
						}
					}
				}
			}
		}
	}

	#[test]
	fn lexical_overlap_raises_semantic_score() {
		let strategy = strategy();
		let query_terms = terms(&["rust", "memory"]);
		let matching = terms(&["rust", "memory"]);
		let unrelated = terms(&["python"]);
		let ctx = context(SearchType::Semantic, "rust memory");
		let with_overlap = ScoringSignals {
			distance: Some(0.4),
			keyword_score: None,
			query_terms: &query_terms,
			result_terms: &matching,
			result_length: 4,
			query_length: 2,
			diversity_penalty: 0.0,
		};
		let without_overlap = ScoringSignals { result_terms: &unrelated, ..with_overlap };

		assert!(strategy.score(&with_overlap, &ctx) > strategy.score(&without_overlap, &ctx));
	}

	#[test]
	fn proper_noun_queries_favor_lexical_evidence() {
		let strategy = strategy();
		let proper = context(SearchType::Hybrid, "Juan Pérez Madrid");
		let plain = context(SearchType::Hybrid, "juan pérez madrid");
		let semantic_only_proper = strategy.hybrid_score(0.9, 0.0, &proper);
		let semantic_only_plain = strategy.hybrid_score(0.9, 0.0, &plain);
		let lexical_proper = strategy.hybrid_score(0.6, 0.7, &proper);

		assert!(semantic_only_proper < semantic_only_plain);
		assert!(lexical_proper > semantic_only_proper);
		assert!((semantic_only_plain - 0.45).abs() < 1e-6);
	}

	#[test]
	fn final_adjustments_penalize_and_compress() {
		let strategy = strategy();

		assert!((strategy.finalize(0.08, 0.0, false) - 0.04).abs() < 1e-6);
		assert!((strategy.finalize(0.5, 0.0, true) - 0.55).abs() < 1e-6);
		assert!((strategy.finalize(0.5, 0.5, false) - 0.25).abs() < 1e-6);
		assert!((strategy.finalize(1.0, 0.0, false) - 0.975).abs() < 1e-6);
		assert!(strategy.finalize(0.99, 0.0, false) > strategy.finalize(0.96, 0.0, false));
	}

	#[test]
	fn calibration_maps_zero_to_zero_and_stays_bounded() {
		let strategy = strategy();

		assert_eq!(strategy.calibrate(0.0), 0.0);
		assert!(strategy.calibrate(1.0) <= 1.0);
		assert!(strategy.calibrate(0.8) > strategy.calibrate(0.4));
	}
}
