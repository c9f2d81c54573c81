use std::{
	collections::{HashMap, HashSet},
	fs,
	path::{Path, PathBuf},
	sync::Arc,
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use sift_config::Config;
use sift_domain::{EmbeddingCollection, text};
use sift_service::{
	BoxFuture, CacheStats, EmbeddingProvider, HttpEmbeddingProvider, PerformanceMetrics,
	ProviderError, Providers, SearchOptions, SearchQualityReport, SearchRequest, SiftService,
};
use sift_storage::MemoryStore;

#[derive(Debug, Parser)]
#[command(
	version = sift_cli::VERSION,
	rename_all = "kebab",
	styles = sift_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Embedding collection as JSON: `{ "dataset_id": ..., "items": [...] }`.
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
	#[arg(long, short = 'q', value_name = "FILE")]
	pub queries: PathBuf,
	#[arg(long, short = 'o', value_name = "FILE")]
	pub out: Option<PathBuf>,
	#[arg(long, value_name = "N")]
	pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QueryDefaults {
	limit: Option<u32>,
	search_type: Option<String>,
	embedding_model: Option<String>,
	hybrid_alpha: Option<f32>,
	options: Option<SearchOptions>,
}

#[derive(Debug, Deserialize)]
struct QuerySet {
	name: Option<String>,
	#[serde(default)]
	defaults: QueryDefaults,
	queries: Vec<EvalQuery>,
}

#[derive(Debug, Deserialize)]
struct EvalQuery {
	id: Option<String>,
	query: String,
	#[serde(default)]
	expected_ids: Vec<String>,
	/// Precomputed query embedding; the configured provider is used when absent.
	vector: Option<Vec<f32>>,
	limit: Option<u32>,
	search_type: Option<String>,
	hybrid_alpha: Option<f32>,
	options: Option<SearchOptions>,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
	name: String,
	dataset_id: String,
	dataset_items: usize,
	config_path: String,
	summary: EvalSummary,
	queries: Vec<QueryReport>,
	performance: PerformanceMetrics,
	cache: CacheStats,
}

#[derive(Debug, Serialize)]
struct EvalSummary {
	query_count: usize,
	failed_count: usize,
	avg_recall_at_k: f64,
	avg_precision_at_k: f64,
	mean_rr: f64,
	mean_ndcg: f64,
	avg_quality_score: f64,
	latency_ms_p50: f64,
	latency_ms_p95: f64,
}

#[derive(Debug, Serialize)]
struct QueryReport {
	id: String,
	query: String,
	expected_ids: Vec<String>,
	retrieved_ids: Vec<String>,
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	ndcg: f64,
	latency_ms: f64,
	cache_hit: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	quality: Option<SearchQualityReport>,
	#[serde(skip_serializing_if = "Option::is_none")]
	error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Metrics {
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	ndcg: f64,
}

/// Serves precomputed query vectors and defers the rest to the configured provider.
struct EvalEmbedder {
	vectors: HashMap<String, Vec<f32>>,
	fallback: Option<HttpEmbeddingProvider>,
}
impl EmbeddingProvider for EvalEmbedder {
	fn embed<'a>(
		&'a self,
		model: &'a str,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>, ProviderError>> {
		Box::pin(async move {
			let precomputed: Option<Vec<Vec<f32>>> =
				texts.iter().map(|input| self.vectors.get(input).cloned()).collect();

			if let Some(vectors) = precomputed {
				return Ok(vectors);
			}

			match &self.fallback {
				Some(provider) => provider.embed(model, texts).await,
				None => Err(ProviderError::Generation {
					message: "No precomputed vector for the query and no embedding provider is \
					          configured."
						.to_string(),
				}),
			}
		})
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let cfg = sift_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&cfg.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let collection = load_collection(&args.dataset)?;
	let query_set = load_queries(&args.queries)?;
	let output = evaluate(&args, cfg, collection, query_set).await?;
	let json = serde_json::to_string_pretty(&output)?;

	match &args.out {
		Some(path) => {
			fs::write(path, json)?;

			tracing::info!(path = %path.display(), "Evaluation report written.");
		},
		None => println!("{json}"),
	}

	Ok(())
}

fn load_collection(path: &Path) -> color_eyre::Result<EmbeddingCollection> {
	let raw = fs::read_to_string(path)?;

	Ok(serde_json::from_str(&raw)?)
}

fn load_queries(path: &Path) -> color_eyre::Result<QuerySet> {
	let raw = fs::read_to_string(path)?;
	let query_set: QuerySet = serde_json::from_str(&raw)?;

	if query_set.queries.is_empty() {
		return Err(eyre::eyre!("Query set must include at least one query."));
	}

	Ok(query_set)
}

async fn evaluate(
	args: &Args,
	cfg: Config,
	collection: EmbeddingCollection,
	query_set: QuerySet,
) -> color_eyre::Result<EvalOutput> {
	let dataset_id = collection.dataset_id().to_string();
	let dataset_items = collection.len();
	let vectors = query_set
		.queries
		.iter()
		.filter_map(|query| {
			query.vector.clone().map(|vector| (text::preprocess_query(&query.query), vector))
		})
		.collect();
	let embedder = EvalEmbedder {
		vectors,
		fallback: cfg.providers.embedding.clone().map(HttpEmbeddingProvider::new),
	};
	let storage = MemoryStore::new();

	storage.insert(collection);

	let service = SiftService::new(cfg, Providers::new(Arc::new(embedder), Arc::new(storage)))?;
	let defaults = &query_set.defaults;
	let mut reports = Vec::with_capacity(query_set.queries.len());
	let mut latencies = Vec::with_capacity(query_set.queries.len());

	for (idx, query) in query_set.queries.iter().enumerate() {
		let req = SearchRequest {
			query: query.query.clone(),
			dataset_id: dataset_id.clone(),
			limit: args.limit.or(query.limit).or(defaults.limit),
			search_type: query.search_type.clone().or_else(|| defaults.search_type.clone()),
			embedding_model: defaults.embedding_model.clone(),
			hybrid_alpha: query.hybrid_alpha.or(defaults.hybrid_alpha),
			options: query.options.clone().or_else(|| defaults.options.clone()).unwrap_or_default(),
		};
		let id = query.id.clone().unwrap_or_else(|| format!("q{}", idx + 1));
		let report = run_query(&service, id, query, req).await;

		if report.error.is_none() {
			latencies.push(report.latency_ms);
		}

		reports.push(report);
	}

	Ok(EvalOutput {
		name: query_set.name.clone().unwrap_or_else(|| dataset_id.clone()),
		dataset_id,
		dataset_items,
		config_path: args.config.display().to_string(),
		summary: summarize(&reports, &latencies),
		queries: reports,
		performance: service.get_performance_metrics(),
		cache: service.cache_stats(),
	})
}

/// Runs one query and measures its wall-clock latency, cache hits included.
async fn run_query(
	service: &SiftService,
	id: String,
	query: &EvalQuery,
	req: SearchRequest,
) -> QueryReport {
	let expected: HashSet<&str> = query.expected_ids.iter().map(String::as_str).collect();
	let started = Instant::now();
	let outcome = service.search(req).await;
	let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;

	match outcome {
		Ok(results) => {
			let retrieved_ids: Vec<String> =
				results.results.iter().map(|result| result.id.clone()).collect();
			let metrics = compute_metrics(&retrieved_ids, &expected);

			QueryReport {
				id,
				query: query.query.clone(),
				expected_ids: query.expected_ids.clone(),
				retrieved_ids,
				recall_at_k: metrics.recall_at_k,
				precision_at_k: metrics.precision_at_k,
				rr: metrics.rr,
				ndcg: metrics.ndcg,
				latency_ms,
				cache_hit: results.cache_hit,
				quality: service.get_quality_report(results.search_id).ok(),
				error: None,
			}
		},
		Err(err) => {
			tracing::warn!(query_id = %id, error = %err, "Evaluation query failed.");

			QueryReport {
				id,
				query: query.query.clone(),
				expected_ids: query.expected_ids.clone(),
				retrieved_ids: Vec::new(),
				recall_at_k: 0.0,
				precision_at_k: 0.0,
				rr: 0.0,
				ndcg: 0.0,
				latency_ms,
				cache_hit: false,
				quality: None,
				error: Some(format!("{}: {err}", err.code())),
			}
		},
	}
}

fn compute_metrics(retrieved: &[String], expected: &HashSet<&str>) -> Metrics {
	let mut relevant_count = 0_usize;
	let mut dcg = 0.0_f64;
	let mut first_hit: Option<usize> = None;

	for (idx, id) in retrieved.iter().enumerate() {
		if !expected.contains(id.as_str()) {
			continue;
		}

		let rank = idx + 1;

		relevant_count += 1;
		dcg += 1.0 / (rank as f64 + 1.0).log2();
		first_hit.get_or_insert(rank);
	}

	let ideal_hits = expected.len().min(retrieved.len());
	let idcg: f64 = (1..=ideal_hits).map(|rank| 1.0 / (rank as f64 + 1.0).log2()).sum();

	Metrics {
		recall_at_k: if expected.is_empty() {
			0.0
		} else {
			relevant_count as f64 / expected.len() as f64
		},
		precision_at_k: if retrieved.is_empty() {
			0.0
		} else {
			relevant_count as f64 / retrieved.len() as f64
		},
		rr: first_hit.map(|rank| 1.0 / rank as f64).unwrap_or(0.0),
		ndcg: if idcg > 0.0 { dcg / idcg } else { 0.0 },
	}
}

fn summarize(reports: &[QueryReport], latencies_ms: &[f64]) -> EvalSummary {
	let count = reports.len().max(1) as f64;
	let qualities: Vec<f64> = reports
		.iter()
		.filter_map(|report| {
			report.quality.as_ref().map(|quality| f64::from(quality.quality_score))
		})
		.collect();
	let mut sorted = latencies_ms.to_vec();

	sorted.sort_by(f64::total_cmp);

	EvalSummary {
		query_count: reports.len(),
		failed_count: reports.iter().filter(|report| report.error.is_some()).count(),
		avg_recall_at_k: reports.iter().map(|report| report.recall_at_k).sum::<f64>() / count,
		avg_precision_at_k: reports.iter().map(|report| report.precision_at_k).sum::<f64>()
			/ count,
		mean_rr: reports.iter().map(|report| report.rr).sum::<f64>() / count,
		mean_ndcg: reports.iter().map(|report| report.ndcg).sum::<f64>() / count,
		avg_quality_score: if qualities.is_empty() {
			0.0
		} else {
			qualities.iter().sum::<f64>() / qualities.len() as f64
		},
		latency_ms_p50: percentile(&sorted, 0.50),
		latency_ms_p95: percentile(&sorted, 0.95),
	}
}

/// Linear interpolation between closest ranks over ascending values.
fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let pos = percentile.clamp(0.0, 1.0) * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;

		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use sift_domain::EmbeddingVector;

	use super::*;

	const EMBED_DELAY: Duration = Duration::from_millis(200);

	struct SlowEmbedder;
	impl EmbeddingProvider for SlowEmbedder {
		fn embed<'a>(
			&'a self,
			_model: &'a str,
			texts: &'a [String],
		) -> BoxFuture<'a, Result<Vec<Vec<f32>>, ProviderError>> {
			Box::pin(async move {
				tokio::time::sleep(EMBED_DELAY).await;

				Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
			})
		}
	}

	fn ids(values: &[&str]) -> Vec<String> {
		values.iter().map(|value| value.to_string()).collect()
	}

	#[test]
	fn metrics_reward_early_hits() {
		let expected: HashSet<&str> = ["b", "d"].into_iter().collect();
		let metrics = compute_metrics(&ids(&["a", "b", "c", "d"]), &expected);

		assert_eq!(metrics.recall_at_k, 1.0);
		assert_eq!(metrics.precision_at_k, 0.5);
		assert_eq!(metrics.rr, 0.5);
		assert!(metrics.ndcg > 0.0 && metrics.ndcg < 1.0);
	}

	#[test]
	fn metrics_without_hits_are_zero() {
		let expected: HashSet<&str> = ["z"].into_iter().collect();

		assert_eq!(compute_metrics(&ids(&["a"]), &expected), Metrics::default());
		assert_eq!(compute_metrics(&[], &HashSet::new()), Metrics::default());
	}

	#[test]
	fn percentile_interpolates() {
		assert_eq!(percentile(&[10.0, 20.0, 30.0], 0.5), 20.0);
		assert_eq!(percentile(&[10.0, 20.0], 0.5), 15.0);
		assert_eq!(percentile(&[], 0.95), 0.0);
	}

	#[test]
	fn query_sets_parse_with_defaults() {
		let raw = r#"{
			"defaults": { "search_type": "hybrid", "limit": 5 },
			"queries": [
				{ "query": "payment retries", "expected_ids": ["a"], "vector": [1.0, 0.0] }
			]
		}"#;
		let query_set: QuerySet = serde_json::from_str(raw).expect("query set");

		assert_eq!(query_set.defaults.search_type.as_deref(), Some("hybrid"));
		assert_eq!(query_set.defaults.limit, Some(5));
		assert_eq!(query_set.queries[0].vector.as_deref(), Some(&[1.0, 0.0][..]));
	}

	#[tokio::test]
	async fn precomputed_vectors_skip_the_provider() {
		let embedder = EvalEmbedder {
			vectors: HashMap::from([("payment retries".to_string(), vec![1.0, 0.0])]),
			fallback: None,
		};
		let texts = ["payment retries".to_string()];
		let missing = ["unknown".to_string()];

		assert_eq!(embedder.embed("m", &texts).await.expect("vector"), vec![vec![1.0, 0.0]]);
		assert!(matches!(
			embedder.embed("m", &missing).await,
			Err(ProviderError::Generation { .. })
		));
	}

	#[tokio::test]
	async fn cache_hits_report_their_own_latency() {
		let storage = MemoryStore::new();
		let items = vec![
			EmbeddingVector::new("a", "payment retries", vec![1.0, 0.0], Default::default()),
			EmbeddingVector::new("b", "refund policy", vec![0.0, 1.0], Default::default()),
		];

		storage.insert(EmbeddingCollection::from_items("docs", items).expect("collection"));

		let service = SiftService::new(
			Config::default(),
			Providers::new(Arc::new(SlowEmbedder), Arc::new(storage)),
		)
		.expect("service");
		let query = EvalQuery {
			id: None,
			query: "payment retries".to_string(),
			expected_ids: vec!["a".to_string()],
			vector: None,
			limit: Some(2),
			search_type: None,
			hybrid_alpha: None,
			options: None,
		};
		let req = SearchRequest::new("payment retries", "docs").with_limit(2);
		let first = run_query(&service, "q1".to_string(), &query, req.clone()).await;
		let second = run_query(&service, "q2".to_string(), &query, req).await;
		let delay_ms = EMBED_DELAY.as_secs_f64() * 1_000.0;

		assert!(!first.cache_hit);
		assert!(first.latency_ms >= delay_ms);
		assert!(second.cache_hit);
		assert!(second.latency_ms < delay_ms);
		assert_eq!(second.rr, 1.0);
	}
}
