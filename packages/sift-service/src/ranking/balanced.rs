use sift_config::ScoringWeights;
use sift_domain::{SearchType, text};

use super::{
	clamp_unit,
	scoring::{ScoringContext, ScoringSignals, ScoringStrategy, StrategyKind},
};

const DIVERSIFICATION_FACTOR: f32 = 0.2;
const JACCARD_WEIGHT: f32 = 0.7;
const EXACT_MATCH_WEIGHT: f32 = 0.3;

/// Weighted sum of semantic, term, length and diversity components through a moderate sigmoid.
#[derive(Debug, Clone, Copy)]
pub struct BalancedScoringStrategy {
	weights: ScoringWeights,
}
impl BalancedScoringStrategy {
	pub fn new(weights: ScoringWeights) -> Self {
		Self { weights }
	}

	pub fn weights(&self) -> ScoringWeights {
		self.weights
	}

	fn term_score(signals: &ScoringSignals<'_>) -> f32 {
		if let Some(keyword) = signals.keyword_score {
			return clamp_unit(keyword);
		}

		let jaccard = text::jaccard_similarity(signals.query_terms, signals.result_terms);

		clamp_unit(JACCARD_WEIGHT * jaccard + EXACT_MATCH_WEIGHT * signals.term_match_ratio())
	}

	fn length_score(signals: &ScoringSignals<'_>) -> f32 {
		(1.0 - (signals.length_ratio() - 1.0).abs()).max(0.0)
	}

	fn smooth_sigmoid(x: f32) -> f32 {
		1.0 / (1.0 + (-2.0 * x + 1.0).exp())
	}
}
impl ScoringStrategy for BalancedScoringStrategy {
	fn kind(&self) -> StrategyKind {
		StrategyKind::Balanced
	}

	fn score(&self, signals: &ScoringSignals<'_>, context: &ScoringContext<'_>) -> f32 {
		let term = Self::term_score(signals);

		if context.search_type == SearchType::Keyword {
			return term;
		}

		let semantic = signals.distance.map(|distance| clamp_unit(1.0 - distance)).unwrap_or(0.0);
		let diversity_bonus = (DIVERSIFICATION_FACTOR - signals.diversity_penalty).max(0.0);
		let raw = self.weights.semantic_similarity * semantic
			+ self.weights.term_overlap * term
			+ self.weights.length_penalty * Self::length_score(signals)
			+ self.weights.diversity_bonus * diversity_bonus;

		clamp_unit(Self::smooth_sigmoid(raw))
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::*;

	#[test]
	fn closer_candidates_score_higher() {
		let strategy = BalancedScoringStrategy::new(ScoringWeights::default());
		let query_terms: HashSet<String> = ["rust".to_string()].into_iter().collect();
		let result_terms = query_terms.clone();
		let ctx = ScoringContext {
			search_type: SearchType::Semantic,
			query: "rust",
			distance_stats: None,
			hybrid_alpha: 0.5,
			found_by_multiple_methods: false,
		};
		let near = ScoringSignals {
			distance: Some(0.1),
			keyword_score: Some(0.5),
			query_terms: &query_terms,
			result_terms: &result_terms,
			result_length: 1,
			query_length: 1,
			diversity_penalty: 0.0,
		};
		let far = ScoringSignals { distance: Some(0.9), ..near };
		let near_score = strategy.score(&near, &ctx);
		let far_score = strategy.score(&far, &ctx);

		assert!(near_score > far_score);
		assert!((0.0..=1.0).contains(&near_score));
	}

	#[test]
	fn falls_back_to_term_sets_without_keyword_score() {
		let query_terms: HashSet<String> = ["a".to_string(), "b".to_string()].into_iter().collect();
		let result_terms: HashSet<String> = ["a".to_string()].into_iter().collect();
		let signals = ScoringSignals {
			distance: None,
			keyword_score: None,
			query_terms: &query_terms,
			result_terms: &result_terms,
			result_length: 1,
			query_length: 2,
			diversity_penalty: 0.0,
		};

		// Jaccard 0.5 and match ratio 0.5.
		assert!((BalancedScoringStrategy::term_score(&signals) - 0.5).abs() < 1e-6);
		assert_eq!(BalancedScoringStrategy::length_score(&signals), 0.5);
	}
}
