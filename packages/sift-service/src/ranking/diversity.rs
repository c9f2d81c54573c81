use std::collections::{HashMap, HashSet};

use sift_config::DiversificationConfig;
use sift_domain::{SearchResult, text, vector};

use super::ClusterDiversifier;

/// Vectors of candidate results, keyed by result id.
pub type EmbeddingsById<'a> = HashMap<&'a str, &'a [f32]>;

/// Selects at most `limit` results from a relevance-ranked list, trading relevance against
/// redundancy. Output keeps the input's relative order.
pub trait Diversifier
where
	Self: Send + Sync,
{
	fn name(&self) -> &'static str;

	fn diversify(
		&self,
		ranked: Vec<SearchResult>,
		embeddings: &EmbeddingsById<'_>,
		limit: usize,
		cfg: &DiversificationConfig,
	) -> Vec<SearchResult>;
}

pub fn select_diversifier(cfg: &DiversificationConfig) -> &'static dyn Diversifier {
	if cfg.clustering { &ClusterDiversifier } else { &MmrDiversifier }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MmrDiversifier;
impl Diversifier for MmrDiversifier {
	fn name(&self) -> &'static str {
		"mmr"
	}

	fn diversify(
		&self,
		ranked: Vec<SearchResult>,
		embeddings: &EmbeddingsById<'_>,
		limit: usize,
		cfg: &DiversificationConfig,
	) -> Vec<SearchResult> {
		if ranked.len() <= limit {
			return ranked;
		}
		if limit == 0 {
			return Vec::new();
		}

		let similarity = PairwiseSimilarity::new(&ranked, embeddings);
		let selected = select_mmr(&ranked, &similarity, limit, cfg);

		keep_positions(ranked, selected)
	}
}

#[derive(Clone, Copy)]
struct DiversityPick {
	remaining_pos: usize,
	mmr_score: f32,
	retrieval_rank: usize,
}
impl DiversityPick {
	fn better_than(self, other: &Self) -> bool {
		self.mmr_score > other.mmr_score
			|| (self.mmr_score == other.mmr_score && self.retrieval_rank < other.retrieval_rank)
	}
}

/// Similarity between candidates in `[0, 1]`: cosine mapped from `[-1, 1]` when both have
/// embeddings, Jaccard of lowercase token sets otherwise.
pub(crate) struct PairwiseSimilarity<'a> {
	vectors: Vec<Option<&'a [f32]>>,
	terms: Vec<HashSet<String>>,
}
impl<'a> PairwiseSimilarity<'a> {
	pub(crate) fn new(ranked: &[SearchResult], embeddings: &EmbeddingsById<'a>) -> Self {
		Self {
			vectors: ranked
				.iter()
				.map(|result| embeddings.get(result.id.as_str()).copied())
				.collect(),
			terms: ranked.iter().map(|result| text::term_set(&result.text)).collect(),
		}
	}

	pub(crate) fn between(&self, lhs: usize, rhs: usize) -> f32 {
		let cosine = match (self.vectors[lhs], self.vectors[rhs]) {
			(Some(l), Some(r)) => vector::cosine_similarity(l, r),
			_ => None,
		};

		match cosine {
			Some(cosine) => ((cosine + 1.0) / 2.0).clamp(0.0, 1.0),
			None => text::jaccard_similarity(&self.terms[lhs], &self.terms[rhs]),
		}
	}
}

/// Greedy MMR over candidate positions. A candidate that already has `max_similar_results`
/// near-duplicates among the selection is never picked.
pub(crate) fn select_mmr(
	ranked: &[SearchResult],
	similarity: &PairwiseSimilarity<'_>,
	limit: usize,
	cfg: &DiversificationConfig,
) -> Vec<usize> {
	let lambda = cfg.lambda_param;
	let max_similar = cfg.max_similar_results.max(1) as usize;
	let mut remaining: Vec<usize> = (1..ranked.len()).collect();
	let mut selected = vec![0_usize];

	while selected.len() < limit && !remaining.is_empty() {
		let mut best: Option<DiversityPick> = None;

		for (remaining_pos, &candidate) in remaining.iter().enumerate() {
			let mut max_similarity = 0.0_f32;
			let mut near_duplicates = 0_usize;

			for &chosen in &selected {
				let value = similarity.between(candidate, chosen);

				max_similarity = max_similarity.max(value);

				if value >= cfg.similarity_threshold {
					near_duplicates += 1;
				}
			}

			if near_duplicates >= max_similar {
				continue;
			}

			let pick = DiversityPick {
				remaining_pos,
				mmr_score: lambda * ranked[candidate].score - (1.0 - lambda) * max_similarity,
				retrieval_rank: candidate,
			};

			if best.map(|current| pick.better_than(&current)).unwrap_or(true) {
				best = Some(pick);
			}
		}

		let Some(pick) = best else {
			tracing::debug!(
				selected = selected.len(),
				remaining = remaining.len(),
				"Remaining candidates exceed the near-duplicate cap."
			);

			break;
		};

		selected.push(remaining.remove(pick.remaining_pos));
	}

	selected
}

/// Keeps the results at `positions`, in their original order.
pub(crate) fn keep_positions(
	ranked: Vec<SearchResult>,
	mut positions: Vec<usize>,
) -> Vec<SearchResult> {
	positions.sort_unstable();

	let mut keep = positions.into_iter().peekable();
	let mut out = Vec::new();

	for (position, result) in ranked.into_iter().enumerate() {
		if keep.peek() == Some(&position) {
			keep.next();
			out.push(result);
		}
	}

	out
}
