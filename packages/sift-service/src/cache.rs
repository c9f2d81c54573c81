use std::{
	collections::{HashMap, HashSet},
	num::NonZeroUsize,
	sync::Arc,
	time::Duration,
};

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::ranking::StrategyKind;
use sift_config::{CacheConfig, DiversificationConfig};
use sift_domain::{SearchResults, SearchType, text};

const CACHE_SCHEMA_VERSION: i32 = 1;

/// The part of a search request that changes its result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheScope {
	pub search_type: SearchType,
	pub embedding_model: String,
	pub limit: u32,
	pub hybrid_alpha: f32,
	pub strategy: StrategyKind,
	/// Effective diversification, `None` when results are not diversified.
	pub diversification: Option<DiversificationConfig>,
	pub expansion_terms: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
	pub key: String,
	pub normalized_query: String,
	pub dataset_id: String,
	pub scope_fingerprint: String,
	pub results: SearchResults,
	pub created_at: OffsetDateTime,
	pub access_count: u64,
	pub last_accessed: OffsetDateTime,
	/// Query similarity of the most recent near-duplicate hit.
	pub similarity: Option<f32>,
}
impl CacheEntry {
	fn is_expired(&self, now: OffsetDateTime, ttl: Duration) -> bool {
		now - self.created_at > ttl
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
	pub enabled: bool,
	pub entries: usize,
	pub max_entries: usize,
	pub utilization: f32,
	pub hits: u64,
	pub similarity_hits: u64,
	pub misses: u64,
	pub hit_rate: f32,
	pub evictions: u64,
	pub expirations: u64,
	pub invalidations: u64,
	pub query_index_size: usize,
	pub total_accesses: u64,
	pub average_access_count: f32,
}

#[derive(Debug, Default)]
struct CacheCounters {
	hits: u64,
	similarity_hits: u64,
	misses: u64,
	evictions: u64,
	expirations: u64,
	invalidations: u64,
}

#[derive(Debug)]
struct QueryIndexEntry {
	terms: HashSet<String>,
	keys: Vec<String>,
}

struct CacheState {
	entries: LruCache<String, CacheEntry>,
	query_index: HashMap<String, QueryIndexEntry>,
	counters: CacheCounters,
}
impl CacheState {
	fn remove_key(&mut self, key: &str) -> Option<CacheEntry> {
		let entry = self.entries.pop(key)?;

		self.unindex(&entry.normalized_query, key);

		Some(entry)
	}

	fn unindex(&mut self, normalized_query: &str, key: &str) {
		let Some(indexed) = self.query_index.get_mut(normalized_query) else { return };

		indexed.keys.retain(|existing| existing != key);

		if indexed.keys.is_empty() {
			self.query_index.remove(normalized_query);
		}
	}
}

/// Memoizes finished result sets per normalized query, dataset and scope, with a Jaccard
/// near-duplicate lookup over previously cached queries. Concurrent writes to the same key are
/// last-write-wins.
pub struct IntelligentCache {
	cfg: CacheConfig,
	state: Mutex<CacheState>,
}
impl IntelligentCache {
	pub fn new(cfg: CacheConfig) -> Self {
		let capacity = NonZeroUsize::new(cfg.max_entries as usize).unwrap_or(NonZeroUsize::MIN);

		Self {
			cfg,
			state: Mutex::new(CacheState {
				entries: LruCache::new(capacity),
				query_index: HashMap::new(),
				counters: CacheCounters::default(),
			}),
		}
	}

	pub fn config(&self) -> &CacheConfig {
		&self.cfg
	}

	fn ttl(&self) -> Duration {
		Duration::from_secs(self.cfg.ttl_seconds)
	}

	pub fn get(&self, query: &str, dataset_id: &str, scope: &CacheScope) -> Option<SearchResults> {
		self.get_at(query, dataset_id, scope, OffsetDateTime::now_utc())
	}

	pub fn get_at(
		&self,
		query: &str,
		dataset_id: &str,
		scope: &CacheScope,
		now: OffsetDateTime,
	) -> Option<SearchResults> {
		if !self.cfg.enabled {
			return None;
		}

		let normalized = text::normalize_query(query);
		let key = match build_cache_key(&normalized, dataset_id, scope) {
			Ok(key) => key,
			Err(err) => {
				tracing::warn!(error = %err, dataset_id, "Cache key build failed.");

				return None;
			},
		};
		let similarity_inputs = if self.cfg.enable_similarity_search {
			match scope_fingerprint(dataset_id, scope) {
				Ok(fingerprint) => Some((fingerprint, text::term_set(&normalized))),
				Err(err) => {
					tracing::warn!(error = %err, dataset_id, "Cache scope fingerprint failed.");

					None
				},
			}
		} else {
			None
		};
		let ttl = self.ttl();
		let mut state = self.state.lock();
		let mut expired = false;

		if let Some(entry) = state.entries.get_mut(&key) {
			if entry.is_expired(now, ttl) {
				expired = true;
			} else {
				entry.access_count += 1;
				entry.last_accessed = now;
				entry.similarity = None;

				let results = entry.results.clone();

				state.counters.hits += 1;

				tracing::info!(
					dataset_id,
					cache_key_prefix = cache_key_prefix(&key),
					hit = true,
					"Cache hit."
				);

				return Some(results);
			}
		}
		if expired {
			state.remove_key(&key);
			state.counters.expirations += 1;
		}

		if let Some((fingerprint, terms)) = &similarity_inputs
			&& let Some((similar_key, similarity)) =
				self.find_similar(&state, &normalized, terms, dataset_id, fingerprint, now)
			&& let Some(entry) = state.entries.get_mut(&similar_key)
		{
			entry.access_count += 1;
			entry.last_accessed = now;
			entry.similarity = Some(similarity);

			let results = entry.results.clone();

			state.counters.hits += 1;
			state.counters.similarity_hits += 1;

			tracing::info!(
				dataset_id,
				cache_key_prefix = cache_key_prefix(&similar_key),
				similarity,
				hit = true,
				"Cache similarity hit."
			);

			return Some(results);
		}

		state.counters.misses += 1;

		tracing::info!(
			dataset_id,
			cache_key_prefix = cache_key_prefix(&key),
			hit = false,
			"Cache miss."
		);

		None
	}

	fn find_similar(
		&self,
		state: &CacheState,
		normalized: &str,
		terms: &HashSet<String>,
		dataset_id: &str,
		fingerprint: &str,
		now: OffsetDateTime,
	) -> Option<(String, f32)> {
		let ttl = self.ttl();
		let mut best: Option<(String, f32)> = None;

		for (indexed_query, indexed) in &state.query_index {
			if indexed_query == normalized {
				continue;
			}

			let similarity = text::jaccard_similarity(terms, &indexed.terms);

			if similarity < self.cfg.similarity_threshold {
				continue;
			}

			for key in &indexed.keys {
				let Some(entry) = state.entries.peek(key) else { continue };

				if entry.dataset_id != dataset_id
					|| entry.scope_fingerprint != fingerprint
					|| entry.is_expired(now, ttl)
				{
					continue;
				}

				let better = match &best {
					None => true,
					Some((best_key, best_similarity)) =>
						similarity > *best_similarity
							|| (similarity == *best_similarity && key < best_key),
				};

				if better {
					best = Some((key.clone(), similarity));
				}
			}
		}

		best
	}

	pub fn put(&self, query: &str, dataset_id: &str, scope: &CacheScope, results: &SearchResults) {
		self.put_at(query, dataset_id, scope, results, OffsetDateTime::now_utc());
	}

	pub fn put_at(
		&self,
		query: &str,
		dataset_id: &str,
		scope: &CacheScope,
		results: &SearchResults,
		now: OffsetDateTime,
	) {
		if !self.cfg.enabled {
			return;
		}

		let normalized = text::normalize_query(query);
		let keys = build_cache_key(&normalized, dataset_id, scope).and_then(|key| {
			scope_fingerprint(dataset_id, scope).map(|fingerprint| (key, fingerprint))
		});
		let (key, fingerprint) = match keys {
			Ok(keys) => keys,
			Err(err) => {
				tracing::warn!(error = %err, dataset_id, "Cache key build failed.");

				return;
			},
		};
		let entry = CacheEntry {
			key: key.clone(),
			normalized_query: normalized.clone(),
			dataset_id: dataset_id.to_string(),
			scope_fingerprint: fingerprint,
			results: results.clone(),
			created_at: now,
			access_count: 0,
			last_accessed: now,
			similarity: None,
		};
		let mut state = self.state.lock();

		if let Some((evicted_key, evicted)) = state.entries.push(key.clone(), entry) {
			state.unindex(&evicted.normalized_query, &evicted_key);

			if evicted_key != key {
				state.counters.evictions += 1;

				tracing::debug!(
					cache_key_prefix = cache_key_prefix(&evicted_key),
					"Cache entry evicted."
				);
			}
		}

		let indexed = state.query_index.entry(normalized).or_insert_with_key(|normalized| {
			QueryIndexEntry { terms: text::term_set(normalized), keys: Vec::new() }
		});

		if !indexed.keys.contains(&key) {
			indexed.keys.push(key);
		}
	}

	/// Drops every entry cached for `dataset_id` and returns how many were removed.
	pub fn invalidate_dataset(&self, dataset_id: &str) -> usize {
		let mut state = self.state.lock();
		let keys: Vec<String> = state
			.entries
			.iter()
			.filter(|(_, entry)| entry.dataset_id == dataset_id)
			.map(|(key, _)| key.clone())
			.collect();

		for key in &keys {
			state.remove_key(key);
		}

		state.counters.invalidations += keys.len() as u64;

		tracing::info!(dataset_id, removed = keys.len(), "Cache invalidated for dataset.");

		keys.len()
	}

	pub fn clear(&self) -> usize {
		let mut state = self.state.lock();
		let removed = state.entries.len();

		state.entries.clear();
		state.query_index.clear();

		tracing::info!(removed, "Cache cleared.");

		removed
	}

	pub fn purge_expired(&self) -> usize {
		self.purge_expired_at(OffsetDateTime::now_utc())
	}

	pub fn purge_expired_at(&self, now: OffsetDateTime) -> usize {
		let ttl = self.ttl();
		let mut state = self.state.lock();
		let keys: Vec<String> = state
			.entries
			.iter()
			.filter(|(_, entry)| entry.is_expired(now, ttl))
			.map(|(key, _)| key.clone())
			.collect();

		for key in &keys {
			state.remove_key(key);
		}

		state.counters.expirations += keys.len() as u64;

		if !keys.is_empty() {
			tracing::debug!(removed = keys.len(), "Expired cache entries purged.");
		}

		keys.len()
	}

	pub fn len(&self) -> usize {
		self.state.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn stats(&self) -> CacheStats {
		let state = self.state.lock();
		let entries = state.entries.len();
		let max_entries = state.entries.cap().get();
		let total_accesses: u64 = state.entries.iter().map(|(_, entry)| entry.access_count).sum();
		let lookups = state.counters.hits + state.counters.misses;

		CacheStats {
			enabled: self.cfg.enabled,
			entries,
			max_entries,
			utilization: entries as f32 / max_entries as f32,
			hits: state.counters.hits,
			similarity_hits: state.counters.similarity_hits,
			misses: state.counters.misses,
			hit_rate: if lookups == 0 { 0.0 } else { state.counters.hits as f32 / lookups as f32 },
			evictions: state.counters.evictions,
			expirations: state.counters.expirations,
			invalidations: state.counters.invalidations,
			query_index_size: state.query_index.len(),
			total_accesses,
			average_access_count: if entries == 0 {
				0.0
			} else {
				total_accesses as f32 / entries as f32
			},
		}
	}
}

/// Periodically purges expired entries until the returned handle is aborted.
pub fn spawn_sweeper(cache: Arc<IntelligentCache>) -> tokio::task::JoinHandle<()> {
	let period = Duration::from_secs(cache.config().sweep_interval_seconds.max(1));

	tokio::spawn(async move {
		let mut interval = tokio::time::interval(period);

		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		loop {
			interval.tick().await;
			cache.purge_expired();
		}
	})
}

pub fn hash_cache_key(payload: &Value) -> serde_json::Result<String> {
	let raw = serde_json::to_vec(payload)?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

pub fn cache_key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}

pub fn build_cache_key(
	normalized_query: &str,
	dataset_id: &str,
	scope: &CacheScope,
) -> serde_json::Result<String> {
	let payload = serde_json::json!({
		"kind": "search",
		"schema_version": CACHE_SCHEMA_VERSION,
		"query": normalized_query,
		"dataset_id": dataset_id,
		"scope": serde_json::to_value(scope)?,
	});

	hash_cache_key(&payload)
}

fn scope_fingerprint(dataset_id: &str, scope: &CacheScope) -> serde_json::Result<String> {
	let payload = serde_json::json!({
		"kind": "scope",
		"schema_version": CACHE_SCHEMA_VERSION,
		"dataset_id": dataset_id,
		"scope": serde_json::to_value(scope)?,
	});

	hash_cache_key(&payload)
}
