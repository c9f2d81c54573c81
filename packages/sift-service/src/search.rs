use std::{
	collections::{HashMap, HashSet},
	time::Instant,
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
	Error, Result, SiftService,
	cache::CacheScope,
	index::DatasetIndex,
	monitor,
	ranking::{
		self, DistanceStats, ScoringContext, ScoringSignals, ScoringStrategy, StrategyKind,
		diversity::EmbeddingsById, keyword,
	},
};
use sift_config::DiversificationConfig;
use sift_domain::{ScoreSignals, SearchResult, SearchResults, SearchType, text, vector};

/// Per-request overrides of the configured search behavior.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
	/// `advanced` or `balanced`; the configured default when absent.
	pub scoring_strategy: Option<String>,
	/// Replaces the runtime diversification config for this request.
	pub diversification: Option<DiversificationConfig>,
	/// Turns diversification off when `Some(false)`.
	pub diversify: Option<bool>,
	/// Skips cache lookup and store when `Some(false)`.
	pub use_cache: Option<bool>,
	pub expand_query: bool,
	pub expansion_terms: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	pub dataset_id: String,
	pub limit: Option<u32>,
	pub search_type: Option<String>,
	pub embedding_model: Option<String>,
	pub hybrid_alpha: Option<f32>,
	#[serde(default)]
	pub options: SearchOptions,
}
impl SearchRequest {
	pub fn new(query: impl Into<String>, dataset_id: impl Into<String>) -> Self {
		Self { query: query.into(), dataset_id: dataset_id.into(), ..Default::default() }
	}

	pub fn with_limit(mut self, limit: u32) -> Self {
		self.limit = Some(limit);

		self
	}

	pub fn with_search_type(mut self, search_type: SearchType) -> Self {
		self.search_type = Some(search_type.as_str().to_string());

		self
	}
}

/// A validated request with every default resolved.
#[derive(Debug, Clone)]
struct SearchPlan {
	query: String,
	keyword_query: String,
	dataset_id: String,
	limit: usize,
	candidate_k: usize,
	search_type: SearchType,
	embedding_model: String,
	hybrid_alpha: f32,
	strategy: StrategyKind,
	diversification: Option<DiversificationConfig>,
	expansion_terms: Vec<String>,
	use_cache: bool,
}
impl SearchPlan {
	fn cache_scope(&self) -> CacheScope {
		CacheScope {
			search_type: self.search_type,
			embedding_model: self.embedding_model.clone(),
			limit: self.limit as u32,
			hybrid_alpha: self.hybrid_alpha,
			strategy: self.strategy,
			diversification: self.diversification.clone(),
			expansion_terms: self.expansion_terms.clone(),
		}
	}
}

/// A retrieved item before scoring.
#[derive(Debug, Clone)]
struct Candidate {
	position: usize,
	distance: Option<f32>,
	keyword_score: Option<f32>,
	match_count: u32,
}

impl SiftService {
	/// Runs one search end to end: cache lookup, retrieval, scoring, diversification, cache
	/// store and monitoring, bounded by the request timeout.
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResults> {
		let started = Instant::now();
		let timed = tokio::time::timeout(self.request_timeout(), self.run_search(req, started)).await;
		let outcome = match timed {
			Ok(outcome) => outcome,
			Err(_) => Err(Error::SearchExecutionFailed {
				message: "Search exceeded the request timeout.".to_string(),
			}),
		};

		if let Err(err) = &outcome {
			self.monitor.record_failure(elapsed_ms(started));

			tracing::warn!(error = %err, code = err.code(), "Search failed.");
		}

		outcome
	}

	async fn run_search(&self, req: SearchRequest, started: Instant) -> Result<SearchResults> {
		let plan = self.plan(req)?;
		let scope = plan.cache_scope();

		if plan.use_cache
			&& let Some(mut cached) = self.cache.get(&plan.query, &plan.dataset_id, &scope)
		{
			cached.cache_hit = true;

			let report = monitor::analyze(&cached, &plan.query, cached.execution_time_ms);

			self.monitor.record_success(report, elapsed_ms(started), true);

			return Ok(cached);
		}

		let index = self.dataset_index(&plan.dataset_id).await?;
		let query_vector = match plan.search_type {
			SearchType::Keyword => None,
			SearchType::Semantic | SearchType::Hybrid => Some(self.embed_query(&plan).await?),
		};
		let candidates = retrieve(&plan, &index, query_vector.as_deref())?;
		let ranked = self.score_candidates(&plan, &index, &candidates);
		let selected = diversify(&plan, &index, ranked);
		let execution_time_ms = elapsed_ms(started);
		let results = SearchResults::new(
			plan.query.clone(),
			plan.dataset_id.clone(),
			plan.search_type,
			selected,
			execution_time_ms,
			OffsetDateTime::now_utc(),
		);
		let report = monitor::analyze(&results, &plan.query, execution_time_ms);

		if plan.use_cache && report.quality_score >= self.cfg.search.min_cache_quality {
			self.cache.put(&plan.query, &plan.dataset_id, &scope, &results);
		}

		tracing::info!(
			search_id = %results.search_id,
			dataset_id = %plan.dataset_id,
			search_type = %plan.search_type,
			candidates = candidates.len(),
			results = results.total_results,
			quality_score = report.quality_score,
			execution_time_ms,
			"Search completed."
		);

		self.monitor.record_success(report, execution_time_ms, false);

		Ok(results)
	}

	fn plan(&self, req: SearchRequest) -> Result<SearchPlan> {
		let search_cfg = &self.cfg.search;
		let query = text::preprocess_query(&req.query);

		if query.is_empty() {
			return Err(Error::EmptyQuery);
		}

		let dataset_id = req.dataset_id.trim().to_string();

		if dataset_id.is_empty() {
			return Err(Error::InvalidRequest {
				message: "dataset_id must be non-empty.".to_string(),
			});
		}

		let limit = req.limit.unwrap_or(search_cfg.default_limit);

		if limit == 0 || limit > search_cfg.max_limit {
			return Err(Error::InvalidRequest {
				message: format!("limit must be between 1 and {}.", search_cfg.max_limit),
			});
		}

		let raw_search_type =
			req.search_type.unwrap_or_else(|| search_cfg.default_search_type.clone());
		let search_type = raw_search_type
			.parse::<SearchType>()
			.map_err(|_| Error::InvalidSearchType { search_type: raw_search_type.clone() })?;
		let hybrid_alpha = req.hybrid_alpha.unwrap_or(search_cfg.default_hybrid_alpha);

		if !(0.0..=1.0).contains(&hybrid_alpha) {
			return Err(Error::InvalidRequest {
				message: "hybrid_alpha must be between 0 and 1.".to_string(),
			});
		}

		let embedding_model = req
			.embedding_model
			.map(|model| model.trim().to_string())
			.unwrap_or_else(|| search_cfg.default_embedding_model.clone());

		if embedding_model.is_empty() {
			return Err(Error::InvalidRequest {
				message: "embedding_model must be non-empty.".to_string(),
			});
		}

		let options = req.options;
		let strategy = options
			.scoring_strategy
			.as_deref()
			.unwrap_or(search_cfg.default_strategy.as_str())
			.parse::<StrategyKind>()
			.map_err(|message| Error::InvalidRequest { message })?;
		let diversification = match options.diversification {
			Some(cfg) => {
				sift_config::validate_diversification(&cfg)
					.map_err(|err| Error::InvalidRequest { message: err.to_string() })?;

				cfg
			},
			None => self.diversification.read().clone(),
		};
		let diversification = (options.diversify.unwrap_or(true) && diversification.enabled)
			.then_some(diversification);
		let expansion_terms: Vec<String> = if options.expand_query {
			options
				.expansion_terms
				.iter()
				.map(|term| text::collapse_whitespace(term))
				.filter(|term| !term.is_empty())
				.collect()
		} else {
			Vec::new()
		};
		let keyword_query = text::expand_query(&query, &expansion_terms);
		let limit = limit as usize;
		let candidate_k = (limit * search_cfg.candidate_multiplier.max(1) as usize)
			.min(search_cfg.max_candidates as usize)
			.max(limit);

		Ok(SearchPlan {
			query,
			keyword_query,
			dataset_id,
			limit,
			candidate_k,
			search_type,
			embedding_model,
			hybrid_alpha,
			strategy,
			diversification,
			expansion_terms,
			use_cache: options.use_cache.unwrap_or(true) && self.cfg.cache.enabled,
		})
	}

	async fn embed_query(&self, plan: &SearchPlan) -> Result<Vec<f32>> {
		let texts = [plan.query.clone()];
		let embedded = tokio::time::timeout(
			self.request_timeout(),
			self.providers.embedding.embed(&plan.embedding_model, &texts),
		)
		.await
		.map_err(|_| Error::EmbeddingGenerationFailed {
			message: "Embedding request timed out.".to_string(),
		})?
		.map_err(crate::embedding_error)?;

		embedded.into_iter().next().filter(|vector| !vector.is_empty()).ok_or_else(|| {
			Error::EmbeddingGenerationFailed {
				message: "Embedding provider returned no vector for the query.".to_string(),
			}
		})
	}

	fn score_candidates(
		&self,
		plan: &SearchPlan,
		index: &DatasetIndex,
		candidates: &[Candidate],
	) -> Vec<SearchResult> {
		let balanced = self.balanced();
		let strategy: &dyn ScoringStrategy = match plan.strategy {
			StrategyKind::Advanced => &self.advanced,
			StrategyKind::Balanced => &balanced,
		};
		let query_terms = text::term_set(&plan.query);
		let query_length = text::word_count(&plan.query);
		let distance_stats = DistanceStats::from_distances(
			candidates.iter().filter_map(|candidate| candidate.distance),
		);
		let mut scored: Vec<(usize, SearchResult)> = Vec::with_capacity(candidates.len());

		for (rank, candidate) in candidates.iter().enumerate() {
			let Some(item) = index.collection.get(candidate.position) else { continue };
			let result_terms = text::term_set(&item.text);
			let signals = ScoringSignals {
				distance: candidate.distance,
				keyword_score: candidate.keyword_score,
				query_terms: &query_terms,
				result_terms: &result_terms,
				result_length: text::word_count(&item.text),
				query_length,
				diversity_penalty: 0.0,
			};
			let context = ScoringContext {
				search_type: plan.search_type,
				query: &plan.query,
				distance_stats,
				hybrid_alpha: plan.hybrid_alpha,
				found_by_multiple_methods: candidate.match_count > 1,
			};
			let score = ranking::clamp_unit(strategy.score(&signals, &context));

			scored.push((
				rank,
				SearchResult {
					id: item.id.clone(),
					text: item.text.clone(),
					score,
					metadata: item.metadata.clone(),
					signals: Some(ScoreSignals {
						distance: candidate.distance,
						term_overlap: signals.term_match_ratio(),
						semantic_score: candidate
							.distance
							.map(|distance| ranking::clamp_unit(1.0 - distance)),
						keyword_score: candidate.keyword_score,
						match_count: candidate.match_count,
					}),
				},
			));
		}

		scored.sort_by(|a, b| ranking::cmp_f32_desc(a.1.score, b.1.score).then(a.0.cmp(&b.0)));

		scored.into_iter().map(|(_, result)| result).collect()
	}
}

fn retrieve(
	plan: &SearchPlan,
	index: &DatasetIndex,
	query_vector: Option<&[f32]>,
) -> Result<Vec<Candidate>> {
	let neighbors = match query_vector {
		Some(query_vector) => index
			.vectors
			.search(query_vector, plan.candidate_k)
			.map_err(|err| Error::EmbeddingGenerationFailed { message: err.to_string() })?,
		None => Vec::new(),
	};

	match plan.search_type {
		SearchType::Semantic => Ok(neighbors
			.into_iter()
			.map(|neighbor| Candidate {
				position: neighbor.position,
				distance: Some(neighbor.distance),
				keyword_score: None,
				match_count: 1,
			})
			.collect()),
		SearchType::Keyword => {
			let scores = index.keywords.score_all(&plan.keyword_query);

			Ok(keyword::rank_positive(&scores, plan.candidate_k)
				.into_iter()
				.map(|(position, score)| Candidate {
					position,
					distance: None,
					keyword_score: Some(score),
					match_count: 1,
				})
				.collect())
		},
		SearchType::Hybrid => {
			let scores = index.keywords.score_all(&plan.keyword_query);
			let lexical = keyword::rank_positive(&scores, plan.candidate_k);
			let mut candidates: Vec<Candidate> = Vec::with_capacity(neighbors.len() + lexical.len());
			let mut by_position: HashMap<usize, usize> = HashMap::new();

			for neighbor in neighbors {
				by_position.insert(neighbor.position, candidates.len());
				candidates.push(Candidate {
					position: neighbor.position,
					distance: Some(neighbor.distance),
					keyword_score: Some(scores.get(neighbor.position).copied().unwrap_or(0.0)),
					match_count: 1,
				});
			}
			for (position, score) in lexical {
				if let Some(&slot) = by_position.get(&position) {
					candidates[slot].match_count += 1;

					continue;
				}

				let distance = query_vector.zip(index.collection.get(position)).and_then(
					|(query_vector, item)| vector::cosine_distance(query_vector, &item.vector),
				);

				candidates.push(Candidate {
					position,
					distance,
					keyword_score: Some(score),
					match_count: 1,
				});
			}

			Ok(candidates)
		},
	}
}

fn diversify(
	plan: &SearchPlan,
	index: &DatasetIndex,
	ranked: Vec<SearchResult>,
) -> Vec<SearchResult> {
	let Some(cfg) = &plan.diversification else {
		let mut ranked = ranked;

		ranked.truncate(plan.limit);

		return ranked;
	};
	let wanted: HashSet<&str> = ranked.iter().map(|result| result.id.as_str()).collect();
	let embeddings: EmbeddingsById<'_> = index
		.collection
		.items()
		.iter()
		.filter(|item| wanted.contains(item.id.as_str()))
		.map(|item| (item.id.as_str(), item.vector.as_slice()))
		.collect();
	let diversifier = ranking::select_diversifier(cfg);
	let before = ranked.len();
	let selected = diversifier.diversify(ranked, &embeddings, plan.limit, cfg);

	tracing::debug!(
		diversifier = diversifier.name(),
		before,
		after = selected.len(),
		"Results diversified."
	);

	selected
}

fn elapsed_ms(started: Instant) -> f64 {
	started.elapsed().as_secs_f64() * 1_000.0
}
