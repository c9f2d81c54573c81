use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use sift_domain::{SearchResult, SearchResults};

const RELEVANCE_WEIGHT: f32 = 0.45;
const DIVERSITY_WEIGHT: f32 = 0.30;
const DISTRIBUTION_WEIGHT: f32 = 0.20;
const COMPLETENESS_WEIGHT: f32 = 0.05;
const COMPLETE_RESULT_COUNT: f32 = 10.0;
const CLUSTER_SCORE_DELTA: f32 = 0.01;
const CLUSTER_TOLERATED_RATIO: f32 = 0.3;
const HEALTHY_CV_MIN: f32 = 0.1;
const HEALTHY_CV_MAX: f32 = 0.4;
const COMMON_RECOMMENDATIONS: usize = 5;
const SPECIAL_CHARS: &[char] = &['"', '\'', '(', ')', '[', ']', '{', '}'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityBand {
	Excellent,
	Good,
	Fair,
	Poor,
}
impl QualityBand {
	pub fn from_score(score: f32) -> Self {
		if score >= 0.85 {
			Self::Excellent
		} else if score >= 0.70 {
			Self::Good
		} else if score >= 0.55 {
			Self::Fair
		} else {
			Self::Poor
		}
	}

	fn recommendation(self) -> &'static str {
		match self {
			Self::Excellent => "Excellent search quality.",
			Self::Good => "Good search quality.",
			Self::Fair => "Moderate search quality; some improvements are possible.",
			Self::Poor => "Low search quality; review search parameters and scoring.",
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreStats {
	pub mean: f32,
	pub median: f32,
	pub std: f32,
	pub min: f32,
	pub max: f32,
	pub range: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryComplexity {
	pub word_count: usize,
	pub char_count: usize,
	pub avg_word_length: f32,
	pub has_special_chars: bool,
	pub is_question: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LengthStats {
	pub mean: f32,
	pub median: f32,
	pub std: f32,
	pub min: usize,
	pub max: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityMetadata {
	pub score_stats: Option<ScoreStats>,
	pub query_complexity: QueryComplexity,
	pub result_length_stats: Option<LengthStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQualityReport {
	pub search_id: Uuid,
	pub query: String,
	pub total_results: usize,
	pub quality_score: f32,
	pub relevance_score: f32,
	pub diversity_score: f32,
	pub score_distribution_score: f32,
	pub quality_band: QualityBand,
	pub execution_time_ms: f64,
	pub recommendations: Vec<String>,
	pub metadata: QualityMetadata,
	#[serde(with = "sift_domain::time_serde")]
	pub timestamp: OffsetDateTime,
}

/// Scores a finished result set. Pure: the same input always yields the same report.
pub fn analyze(results: &SearchResults, query: &str, execution_time_ms: f64) -> SearchQualityReport {
	let items = &results.results;
	let query_complexity = query_complexity(query);

	if items.is_empty() {
		return SearchQualityReport {
			search_id: results.search_id,
			query: query.to_string(),
			total_results: 0,
			quality_score: 0.0,
			relevance_score: 0.0,
			diversity_score: 0.0,
			score_distribution_score: 0.0,
			quality_band: QualityBand::Poor,
			execution_time_ms,
			recommendations: vec!["No results found for the query.".to_string()],
			metadata: QualityMetadata { query_complexity, ..Default::default() },
			timestamp: results.timestamp,
		};
	}

	let scores: Vec<f32> = items.iter().map(|result| result.score).collect();
	let relevance_score = relevance_score(&scores);
	let diversity_score = diversity_score(items);
	let score_distribution_score = distribution_score(&scores);
	let completeness = (items.len() as f32 / COMPLETE_RESULT_COUNT).min(1.0);
	let quality_score = (relevance_score * RELEVANCE_WEIGHT
		+ diversity_score * DIVERSITY_WEIGHT
		+ score_distribution_score * DISTRIBUTION_WEIGHT
		+ completeness * COMPLETENESS_WEIGHT)
		.clamp(0.0, 1.0);
	let quality_band = QualityBand::from_score(quality_score);
	let mut recommendations = vec![quality_band.recommendation().to_string()];

	if relevance_score < 0.5 {
		recommendations.push(
			"Low relevance; check the embedding model or query preprocessing.".to_string(),
		);
	}
	if diversity_score < 0.3 {
		recommendations
			.push("Low diversity; enable MMR or cluster-based diversification.".to_string());
	}
	if score_distribution_score < 0.5 {
		recommendations.push(
			"Unhealthy score distribution; review the scoring function for overfitting.".to_string(),
		);
	}
	if items.len() < 3 {
		recommendations
			.push("Few results; consider expanding the query or relaxing filters.".to_string());
	}
	if query_complexity.word_count < 2 {
		recommendations.push("Very short query; results may be too general.".to_string());
	} else if query_complexity.word_count > 10 {
		recommendations.push("Very long query; consider extracting key terms.".to_string());
	}

	tracing::debug!(
		search_id = %results.search_id,
		quality_score,
		relevance_score,
		diversity_score,
		"Search quality analyzed."
	);

	SearchQualityReport {
		search_id: results.search_id,
		query: query.to_string(),
		total_results: items.len(),
		quality_score,
		relevance_score,
		diversity_score,
		score_distribution_score,
		quality_band,
		execution_time_ms,
		recommendations,
		metadata: QualityMetadata {
			score_stats: score_stats(&scores),
			query_complexity,
			result_length_stats: length_stats(items),
		},
		timestamp: results.timestamp,
	}
}

/// Rank-weighted mean score with weight `1 / (rank + 1)`.
fn relevance_score(scores: &[f32]) -> f32 {
	let mut weighted = 0.0;
	let mut total = 0.0;

	for (rank, score) in scores.iter().enumerate() {
		let weight = 1.0 / (rank as f32 + 1.0);

		weighted += score * weight;
		total += weight;
	}

	if total > 0.0 { weighted / total } else { 0.0 }
}

/// Mean pairwise Jaccard distance between whitespace token sets.
fn diversity_score(items: &[SearchResult]) -> f32 {
	if items.len() < 2 {
		return 1.0;
	}

	let token_sets: Vec<HashSet<String>> = items
		.iter()
		.map(|result| result.text.to_lowercase().split_whitespace().map(str::to_string).collect())
		.collect();
	let mut total = 0.0;
	let mut comparisons = 0_u32;

	for (i, lhs) in token_sets.iter().enumerate() {
		for rhs in &token_sets[i + 1..] {
			total += 1.0 - sift_domain::text::jaccard_similarity(lhs, rhs);
			comparisons += 1;
		}
	}

	if comparisons == 0 { 0.0 } else { total / comparisons as f32 }
}

fn distribution_score(scores: &[f32]) -> f32 {
	if scores.len() < 2 {
		return 1.0;
	}

	let mean = mean(scores);
	let std = sample_std(scores, mean);
	let gradient = gradient_score(scores);
	let variance = variance_score(std, mean);
	let clustering = clustering_penalty(scores);

	(gradient * 0.4 + variance * 0.4 + (1.0 - clustering) * 0.2).clamp(0.0, 1.0)
}

/// Fraction of consecutive pairs in non-increasing order.
fn gradient_score(scores: &[f32]) -> f32 {
	if scores.len() < 3 {
		return 1.0;
	}

	let ordered = scores.windows(2).filter(|pair| pair[0] >= pair[1]).count();

	ordered as f32 / (scores.len() - 1) as f32
}

fn variance_score(std: f32, mean: f32) -> f32 {
	if mean == 0.0 {
		return 0.0;
	}

	let cv = std / mean;

	if (HEALTHY_CV_MIN..=HEALTHY_CV_MAX).contains(&cv) {
		1.0
	} else if cv < HEALTHY_CV_MIN {
		0.5
	} else {
		(1.0 - (cv - HEALTHY_CV_MAX) / 0.6).max(0.0)
	}
}

fn clustering_penalty(scores: &[f32]) -> f32 {
	if scores.len() < 5 {
		return 0.0;
	}

	let mut similar = 0_u32;
	let mut total = 0_u32;

	for (i, lhs) in scores.iter().enumerate() {
		for rhs in &scores[i + 1..] {
			total += 1;

			if (lhs - rhs).abs() < CLUSTER_SCORE_DELTA {
				similar += 1;
			}
		}
	}

	let ratio = if total == 0 { 0.0 } else { similar as f32 / total as f32 };

	(ratio - CLUSTER_TOLERATED_RATIO).max(0.0)
}

fn score_stats(scores: &[f32]) -> Option<ScoreStats> {
	let mean = mean(scores);
	let min = scores.iter().copied().reduce(f32::min)?;
	let max = scores.iter().copied().reduce(f32::max)?;

	Some(ScoreStats {
		mean,
		median: median(scores),
		std: sample_std(scores, mean),
		min,
		max,
		range: max - min,
	})
}

fn length_stats(items: &[SearchResult]) -> Option<LengthStats> {
	let lengths: Vec<usize> = items.iter().map(|result| result.text.chars().count()).collect();
	let as_f32: Vec<f32> = lengths.iter().map(|length| *length as f32).collect();
	let mean = mean(&as_f32);

	Some(LengthStats {
		mean,
		median: median(&as_f32),
		std: sample_std(&as_f32, mean),
		min: lengths.iter().copied().min()?,
		max: lengths.iter().copied().max()?,
	})
}

fn query_complexity(query: &str) -> QueryComplexity {
	let words: Vec<&str> = query.split_whitespace().collect();
	let avg_word_length = if words.is_empty() {
		0.0
	} else {
		words.iter().map(|word| word.chars().count()).sum::<usize>() as f32 / words.len() as f32
	};

	QueryComplexity {
		word_count: words.len(),
		char_count: query.chars().count(),
		avg_word_length,
		has_special_chars: query.contains(SPECIAL_CHARS),
		is_question: query.trim_end().ends_with('?'),
	}
}

fn mean(values: &[f32]) -> f32 {
	if values.is_empty() {
		return 0.0;
	}

	values.iter().sum::<f32>() / values.len() as f32
}

fn median(values: &[f32]) -> f32 {
	if values.is_empty() {
		return 0.0;
	}

	let mut sorted = values.to_vec();

	sorted.sort_by(f32::total_cmp);

	let mid = sorted.len() / 2;

	if sorted.len() % 2 == 0 { (sorted[mid - 1] + sorted[mid]) / 2.0 } else { sorted[mid] }
}

fn sample_std(values: &[f32], mean: f32) -> f32 {
	if values.len() < 2 {
		return 0.0;
	}

	let sum_sq: f32 = values.iter().map(|value| (value - mean).powi(2)).sum();

	(sum_sq / (values.len() - 1) as f32).sqrt()
}

/// Second-half mean versus first-half mean, in percent. Needs at least four values.
fn improvement_rate(values: &[f32]) -> f32 {
	if values.len() < 4 {
		return 0.0;
	}

	let (first, second) = values.split_at(values.len() / 2);
	let first_mean = mean(first);

	if first_mean == 0.0 {
		return 0.0;
	}

	(mean(second) - first_mean) / first_mean * 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreTrend {
	pub mean: f32,
	pub median: f32,
	pub std: f32,
	pub improvement_rate: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanTrend {
	pub mean: f32,
	pub improvement_rate: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationCount {
	pub recommendation: String,
	pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityTrends {
	pub period_days: u32,
	pub total_queries: usize,
	pub quality: ScoreTrend,
	pub diversity: MeanTrend,
	pub relevance: MeanTrend,
	pub common_recommendations: Vec<RecommendationCount>,
}

/// Bounded history of quality reports, oldest first.
#[derive(Debug)]
pub struct QualityHistory {
	capacity: usize,
	reports: VecDeque<SearchQualityReport>,
}
impl QualityHistory {
	pub fn new(capacity: usize) -> Self {
		Self { capacity: capacity.max(1), reports: VecDeque::new() }
	}

	pub fn push(&mut self, report: SearchQualityReport) {
		if self.reports.len() == self.capacity {
			self.reports.pop_front();
		}

		self.reports.push_back(report);
	}

	pub fn get(&self, search_id: Uuid) -> Option<&SearchQualityReport> {
		self.reports.iter().rev().find(|report| report.search_id == search_id)
	}

	pub fn latest(&self) -> Option<&SearchQualityReport> {
		self.reports.back()
	}

	pub fn len(&self) -> usize {
		self.reports.len()
	}

	pub fn is_empty(&self) -> bool {
		self.reports.is_empty()
	}

	/// Trends over reports from the last `days` days, `None` when there are none. A window
	/// reaching past the representable time range covers every report.
	pub fn trends(&self, now: OffsetDateTime, days: u32) -> Option<QualityTrends> {
		let cutoff = now.checked_sub(time::Duration::days(days.into()));
		let recent: Vec<&SearchQualityReport> = self
			.reports
			.iter()
			.filter(|report| cutoff.is_none_or(|cutoff| report.timestamp >= cutoff))
			.collect();

		if recent.is_empty() {
			return None;
		}

		let quality: Vec<f32> = recent.iter().map(|report| report.quality_score).collect();
		let diversity: Vec<f32> = recent.iter().map(|report| report.diversity_score).collect();
		let relevance: Vec<f32> = recent.iter().map(|report| report.relevance_score).collect();
		let quality_mean = mean(&quality);

		Some(QualityTrends {
			period_days: days,
			total_queries: recent.len(),
			quality: ScoreTrend {
				mean: quality_mean,
				median: median(&quality),
				std: sample_std(&quality, quality_mean),
				improvement_rate: improvement_rate(&quality),
			},
			diversity: MeanTrend {
				mean: mean(&diversity),
				improvement_rate: improvement_rate(&diversity),
			},
			relevance: MeanTrend {
				mean: mean(&relevance),
				improvement_rate: improvement_rate(&relevance),
			},
			common_recommendations: common_recommendations(&recent),
		})
	}
}

fn common_recommendations(reports: &[&SearchQualityReport]) -> Vec<RecommendationCount> {
	let mut counts: HashMap<&str, usize> = HashMap::new();

	for report in reports {
		for recommendation in &report.recommendations {
			*counts.entry(recommendation.as_str()).or_default() += 1;
		}
	}

	let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();

	ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
	ranked.truncate(COMMON_RECOMMENDATIONS);

	ranked
		.into_iter()
		.map(|(recommendation, count)| RecommendationCount {
			recommendation: recommendation.to_string(),
			count,
		})
		.collect()
}
