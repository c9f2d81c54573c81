use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result, vector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
	Semantic,
	Keyword,
	Hybrid,
}
impl SearchType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Semantic => "semantic",
			Self::Keyword => "keyword",
			Self::Hybrid => "hybrid",
		}
	}
}
impl FromStr for SearchType {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"semantic" | "vector" => Ok(Self::Semantic),
			"keyword" | "lexical" => Ok(Self::Keyword),
			"hybrid" => Ok(Self::Hybrid),
			_ => Err(Error::UnknownSearchType { value: raw.to_string() }),
		}
	}
}
impl fmt::Display for SearchType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A dataset item with its embedding. The vector is unit-normalized on construction unless its
/// norm is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEmbeddingVector")]
pub struct EmbeddingVector {
	pub id: String,
	pub text: String,
	pub vector: Vec<f32>,
	pub metadata: Map<String, Value>,
}
impl EmbeddingVector {
	pub fn new(
		id: impl Into<String>,
		text: impl Into<String>,
		mut vector: Vec<f32>,
		metadata: Map<String, Value>,
	) -> Self {
		vector::l2_normalize(&mut vector);

		Self { id: id.into(), text: text.into(), vector, metadata }
	}

	pub fn dimension(&self) -> usize {
		self.vector.len()
	}

	/// Copy without the vector payload, for listings that do not ask for vectors.
	pub fn without_vector(&self) -> Self {
		Self {
			id: self.id.clone(),
			text: self.text.clone(),
			vector: Vec::new(),
			metadata: self.metadata.clone(),
		}
	}
}

#[derive(Deserialize)]
struct RawEmbeddingVector {
	id: String,
	text: String,
	vector: Vec<f32>,
	#[serde(default)]
	metadata: Map<String, Value>,
}
impl From<RawEmbeddingVector> for EmbeddingVector {
	fn from(raw: RawEmbeddingVector) -> Self {
		Self::new(raw.id, raw.text, raw.vector, raw.metadata)
	}
}

/// Ordered items of one dataset. The first vector pushed fixes the dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEmbeddingCollection")]
pub struct EmbeddingCollection {
	dataset_id: String,
	dimension: Option<usize>,
	items: Vec<EmbeddingVector>,
}
impl EmbeddingCollection {
	pub fn new(dataset_id: impl Into<String>) -> Self {
		Self { dataset_id: dataset_id.into(), dimension: None, items: Vec::new() }
	}

	pub fn from_items(
		dataset_id: impl Into<String>,
		items: impl IntoIterator<Item = EmbeddingVector>,
	) -> Result<Self> {
		let mut collection = Self::new(dataset_id);

		for item in items {
			collection.push(item)?;
		}

		Ok(collection)
	}

	pub fn push(&mut self, item: EmbeddingVector) -> Result<()> {
		if item.vector.is_empty() {
			return Err(Error::EmptyVector { id: item.id });
		}

		let actual = item.dimension();

		match self.dimension {
			Some(expected) if expected != actual =>
				return Err(Error::DimensionMismatch { id: item.id, expected, actual }),
			Some(_) => {},
			None => self.dimension = Some(actual),
		}

		self.items.push(item);

		Ok(())
	}

	pub fn dataset_id(&self) -> &str {
		&self.dataset_id
	}

	pub fn dimension(&self) -> Option<usize> {
		self.dimension
	}

	pub fn items(&self) -> &[EmbeddingVector] {
		&self.items
	}

	pub fn get(&self, position: usize) -> Option<&EmbeddingVector> {
		self.items.get(position)
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}
}

#[derive(Deserialize)]
struct RawEmbeddingCollection {
	dataset_id: String,
	#[serde(default)]
	items: Vec<EmbeddingVector>,
}
impl TryFrom<RawEmbeddingCollection> for EmbeddingCollection {
	type Error = Error;

	fn try_from(raw: RawEmbeddingCollection) -> Result<Self> {
		Self::from_items(raw.dataset_id, raw.items)
	}
}

/// Raw retrieval signals behind a score, kept for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSignals {
	pub distance: Option<f32>,
	pub term_overlap: f32,
	pub semantic_score: Option<f32>,
	pub keyword_score: Option<f32>,
	/// Number of retrieval methods that returned the item.
	pub match_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
	pub id: String,
	pub text: String,
	pub score: f32,
	#[serde(default)]
	pub metadata: Map<String, Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub signals: Option<ScoreSignals>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
	pub search_id: Uuid,
	pub query: String,
	pub dataset_id: String,
	pub search_type: SearchType,
	pub results: Vec<SearchResult>,
	pub total_results: usize,
	pub execution_time_ms: f64,
	#[serde(with = "crate::time_serde")]
	pub timestamp: OffsetDateTime,
	#[serde(default)]
	pub cache_hit: bool,
}
impl SearchResults {
	pub fn new(
		query: impl Into<String>,
		dataset_id: impl Into<String>,
		search_type: SearchType,
		results: Vec<SearchResult>,
		execution_time_ms: f64,
		timestamp: OffsetDateTime,
	) -> Self {
		Self {
			search_id: Uuid::new_v4(),
			query: query.into(),
			dataset_id: dataset_id.into(),
			search_type,
			total_results: results.len(),
			results,
			execution_time_ms,
			timestamp,
			cache_hit: false,
		}
	}

	pub fn scores(&self) -> Vec<f32> {
		self.results.iter().map(|result| result.score).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn item(id: &str, vector: Vec<f32>) -> EmbeddingVector {
		EmbeddingVector::new(id, format!("text {id}"), vector, Map::new())
	}

	#[test]
	fn collection_dimension_is_first_write_wins() {
		let mut collection = EmbeddingCollection::new("ds");

		collection.push(item("a", vec![1.0, 0.0, 0.0])).expect("first push must succeed");

		let err = collection.push(item("b", vec![1.0, 0.0])).expect_err("mismatch must fail");

		assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2, .. }));
		assert_eq!(collection.dimension(), Some(3));
		assert_eq!(collection.len(), 1);
	}

	#[test]
	fn embedding_vectors_are_normalized_on_deserialize() {
		let json = serde_json::json!({
			"dataset_id": "ds",
			"items": [
				{ "id": "a", "text": "alpha", "vector": [0.0, 2.0] },
				{ "id": "b", "text": "zero", "vector": [0.0, 0.0] }
			]
		});
		let collection: EmbeddingCollection =
			serde_json::from_value(json).expect("collection must deserialize");

		assert_eq!(collection.items()[0].vector, vec![0.0, 1.0]);
		assert_eq!(collection.items()[1].vector, vec![0.0, 0.0]);
		assert!(collection.items()[0].metadata.is_empty());
	}

	#[test]
	fn search_results_count_matches_results() {
		let results = vec![SearchResult {
			id: "a".to_string(),
			text: "alpha".to_string(),
			score: 0.8,
			metadata: Map::new(),
			signals: None,
		}];
		let results = SearchResults::new(
			"alpha",
			"ds",
			SearchType::Keyword,
			results,
			1.5,
			OffsetDateTime::UNIX_EPOCH,
		);

		assert_eq!(results.total_results, results.results.len());
		assert!(!results.cache_hit);
	}

	#[test]
	fn search_type_parses_known_names() {
		assert_eq!("Hybrid".parse::<SearchType>().ok(), Some(SearchType::Hybrid));
		assert_eq!("semantic".parse::<SearchType>().ok(), Some(SearchType::Semantic));
		assert!("fuzzy".parse::<SearchType>().is_err());
	}
}
