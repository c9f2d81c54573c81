use ahash::AHashMap;

use sift_domain::text;

/// TF-IDF vectors of a dataset's texts, scored against a query by cosine similarity.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
	documents: Vec<AHashMap<String, u32>>,
	document_frequency: AHashMap<String, u32>,
	document_norms: Vec<f32>,
}
impl KeywordIndex {
	pub fn build<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
		let mut documents = Vec::new();
		let mut document_frequency: AHashMap<String, u32> = AHashMap::new();

		for text in texts {
			let counts = term_counts(text);

			for term in counts.keys() {
				*document_frequency.entry(term.clone()).or_default() += 1;
			}

			documents.push(counts);
		}

		let mut index = Self { documents, document_frequency, document_norms: Vec::new() };

		index.document_norms = index
			.documents
			.iter()
			.map(|counts| {
				counts
					.iter()
					.map(|(term, count)| {
						let weight = *count as f32 * index.idf(term);

						weight * weight
					})
					.sum::<f32>()
					.sqrt()
			})
			.collect();

		index
	}

	pub fn len(&self) -> usize {
		self.documents.len()
	}

	pub fn is_empty(&self) -> bool {
		self.documents.is_empty()
	}

	/// Smoothed inverse document frequency, `ln((1 + n) / (1 + df)) + 1`.
	pub fn idf(&self, term: &str) -> f32 {
		let n = self.documents.len() as f32;
		let df = self.document_frequency.get(term).copied().unwrap_or(0) as f32;

		((1.0 + n) / (1.0 + df)).ln() + 1.0
	}

	/// Cosine similarity of the query against every document, in document order.
	pub fn score_all(&self, query: &str) -> Vec<f32> {
		let query_counts = term_counts(query);
		let query_weights: Vec<(&String, f32)> = query_counts
			.iter()
			.map(|(term, count)| (term, *count as f32 * self.idf(term)))
			.collect();
		let query_norm =
			query_weights.iter().map(|(_, weight)| weight * weight).sum::<f32>().sqrt();

		if query_norm <= f32::EPSILON {
			return vec![0.0; self.documents.len()];
		}

		self.documents
			.iter()
			.zip(self.document_norms.iter())
			.map(|(counts, norm)| {
				if *norm <= f32::EPSILON {
					return 0.0;
				}

				let dot: f32 = query_weights
					.iter()
					.filter_map(|(term, query_weight)| {
						counts
							.get(term.as_str())
							.map(|count| query_weight * *count as f32 * self.idf(term))
					})
					.sum();

				(dot / (query_norm * norm)).clamp(0.0, 1.0)
			})
			.collect()
	}

	/// Top `k` documents with a positive score, as `(position, score)`, best first.
	pub fn search(&self, query: &str, k: usize) -> Vec<(usize, f32)> {
		rank_positive(&self.score_all(query), k)
	}
}

/// Positions with a positive score, best first, ties broken by position.
pub fn rank_positive(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
	let mut ranked: Vec<(usize, f32)> = scores
		.iter()
		.copied()
		.enumerate()
		.filter(|(_, score)| *score > 0.0)
		.collect();

	ranked.sort_by(|a, b| super::cmp_f32_desc(a.1, b.1).then(a.0.cmp(&b.0)));
	ranked.truncate(k);

	ranked
}

fn term_counts(text: &str) -> AHashMap<String, u32> {
	let mut counts = AHashMap::new();

	for token in text::tokenize(text) {
		*counts.entry(token).or_default() += 1;
	}

	counts
}
