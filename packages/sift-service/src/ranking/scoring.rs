use std::{collections::HashSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use sift_domain::SearchType;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
	#[default]
	Advanced,
	Balanced,
}
impl StrategyKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Advanced => "advanced",
			Self::Balanced => "balanced",
		}
	}
}
impl FromStr for StrategyKind {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"advanced" => Ok(Self::Advanced),
			"balanced" => Ok(Self::Balanced),
			other => Err(format!("Unknown scoring strategy {other:?}.")),
		}
	}
}
impl fmt::Display for StrategyKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Smallest and largest nearest-neighbor distance among the candidates of one query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceStats {
	pub min: f32,
	pub max: f32,
}
impl DistanceStats {
	pub fn from_distances(distances: impl IntoIterator<Item = f32>) -> Option<Self> {
		let mut stats: Option<Self> = None;

		for distance in distances.into_iter().filter(|distance| distance.is_finite()) {
			stats = Some(match stats {
				Some(stats) => Self { min: stats.min.min(distance), max: stats.max.max(distance) },
				None => Self { min: distance, max: distance },
			});
		}

		stats
	}

	/// `1 - (d - min) / (max - min)`, clamped, and `0` when the range is empty.
	pub fn similarity(&self, distance: f32) -> f32 {
		if self.max <= self.min {
			return 0.0;
		}

		super::clamp_unit(1.0 - (distance - self.min) / (self.max - self.min))
	}
}

/// Per-candidate inputs of a scoring strategy.
#[derive(Debug, Clone, Copy)]
pub struct ScoringSignals<'a> {
	/// Nearest-neighbor distance, absent when vector retrieval did not return the candidate.
	pub distance: Option<f32>,
	/// Lexical similarity from the keyword scorer.
	pub keyword_score: Option<f32>,
	pub query_terms: &'a HashSet<String>,
	pub result_terms: &'a HashSet<String>,
	pub result_length: usize,
	pub query_length: usize,
	pub diversity_penalty: f32,
}
impl ScoringSignals<'_> {
	pub fn term_match_ratio(&self) -> f32 {
		sift_domain::text::term_match_ratio(self.query_terms, self.result_terms)
	}

	pub fn length_ratio(&self) -> f32 {
		self.result_length as f32 / self.query_length.max(1) as f32
	}
}

/// Query-level inputs shared by every candidate of one search.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
	pub search_type: SearchType,
	pub query: &'a str,
	pub distance_stats: Option<DistanceStats>,
	pub hybrid_alpha: f32,
	pub found_by_multiple_methods: bool,
}

/// Turns raw retrieval signals into a calibrated relevance score in `[0, 1]`.
pub trait ScoringStrategy
where
	Self: Send + Sync,
{
	fn kind(&self) -> StrategyKind;

	fn score(&self, signals: &ScoringSignals<'_>, context: &ScoringContext<'_>) -> f32;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn distance_stats_normalize_against_observed_range() {
		let stats = DistanceStats::from_distances([0.2, 0.6, 1.0]).expect("stats");

		assert_eq!(stats.similarity(0.2), 1.0);
		assert_eq!(stats.similarity(1.0), 0.0);
		assert!((stats.similarity(0.6) - 0.5).abs() < 1e-6);
		assert_eq!(stats.similarity(1.5), 0.0);
	}

	#[test]
	fn degenerate_distance_range_yields_zero_similarity() {
		let stats = DistanceStats::from_distances([0.4]).expect("stats");

		assert_eq!(stats.similarity(0.4), 0.0);
		assert!(DistanceStats::from_distances([f32::NAN]).is_none());
	}

	#[test]
	fn strategy_kind_parses_case_insensitively() {
		assert_eq!("Balanced".parse::<StrategyKind>(), Ok(StrategyKind::Balanced));
		assert!("fancy".parse::<StrategyKind>().is_err());
	}
}
