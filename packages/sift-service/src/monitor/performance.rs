use std::{collections::VecDeque, time::Instant};

use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy)]
struct QueryRecord {
	latency_ms: f64,
	cache_hit: bool,
	quality_score: Option<f32>,
	error: bool,
	recorded_at: Instant,
	recorded_wall: OffsetDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
	pub avg_response_time_ms: f64,
	pub p95_response_time_ms: f64,
	pub p99_response_time_ms: f64,
	pub cache_hit_rate: f32,
	pub queries_per_second: f64,
	pub error_rate: f32,
	pub avg_quality_score: f32,
	/// Queries recorded since startup, not only those still in the window.
	pub total_queries: u64,
	pub window_len: usize,
	#[serde(with = "sift_domain::time_serde::option")]
	pub window_started_at: Option<OffsetDateTime>,
	/// Records rejected for a non-finite latency.
	pub dropped_records: u64,
}

/// Sliding window over the most recent queries.
#[derive(Debug)]
pub struct PerformanceMonitor {
	window_size: usize,
	records: VecDeque<QueryRecord>,
	total_queries: u64,
	dropped_records: u64,
}
impl PerformanceMonitor {
	pub fn new(window_size: usize) -> Self {
		Self {
			window_size: window_size.max(1),
			records: VecDeque::new(),
			total_queries: 0,
			dropped_records: 0,
		}
	}

	pub fn record(
		&mut self,
		latency_ms: f64,
		cache_hit: bool,
		quality_score: Option<f32>,
		error: bool,
	) {
		if !latency_ms.is_finite() || latency_ms < 0.0 {
			self.dropped_records += 1;

			tracing::warn!(latency_ms, "Dropping query record with invalid latency.");

			return;
		}
		if self.records.len() == self.window_size {
			self.records.pop_front();
		}

		self.records.push_back(QueryRecord {
			latency_ms,
			cache_hit,
			quality_score: quality_score.filter(|score| score.is_finite()),
			error,
			recorded_at: Instant::now(),
			recorded_wall: OffsetDateTime::now_utc(),
		});
		self.total_queries += 1;
	}

	pub fn metrics(&self) -> PerformanceMetrics {
		let Some(oldest) = self.records.front() else {
			return PerformanceMetrics {
				total_queries: self.total_queries,
				dropped_records: self.dropped_records,
				..Default::default()
			};
		};
		let n = self.records.len();
		let mut latencies: Vec<f64> = self.records.iter().map(|record| record.latency_ms).collect();

		latencies.sort_by(f64::total_cmp);

		let cache_hits = self.records.iter().filter(|record| record.cache_hit).count();
		let errors = self.records.iter().filter(|record| record.error).count();
		let qualities: Vec<f32> =
			self.records.iter().filter_map(|record| record.quality_score).collect();
		let elapsed = oldest.recorded_at.elapsed().as_secs_f64();

		PerformanceMetrics {
			avg_response_time_ms: latencies.iter().sum::<f64>() / n as f64,
			p95_response_time_ms: percentile(&latencies, 0.95),
			p99_response_time_ms: percentile(&latencies, 0.99),
			cache_hit_rate: cache_hits as f32 / n as f32,
			queries_per_second: if elapsed > 0.0 { n as f64 / elapsed } else { 0.0 },
			error_rate: errors as f32 / n as f32,
			avg_quality_score: if qualities.is_empty() {
				0.0
			} else {
				qualities.iter().sum::<f32>() / qualities.len() as f32
			},
			total_queries: self.total_queries,
			window_len: n,
			window_started_at: Some(oldest.recorded_wall),
			dropped_records: self.dropped_records,
		}
	}
}

/// Nearest-rank percentile over ascending values: `sorted[floor(n * q)]`, clamped to the last.
fn percentile(sorted: &[f64], q: f64) -> f64 {
	if sorted.is_empty() {
		return 0.0;
	}

	let position = ((sorted.len() as f64 * q).floor() as usize).min(sorted.len() - 1);

	sorted[position]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_window_reports_zeroes() {
		let metrics = PerformanceMonitor::new(10).metrics();

		assert_eq!(metrics.total_queries, 0);
		assert_eq!(metrics.avg_response_time_ms, 0.0);
		assert!(metrics.window_started_at.is_none());
	}

	#[test]
	fn aggregates_cover_the_window_only() {
		let mut monitor = PerformanceMonitor::new(4);

		monitor.record(1_000.0, false, Some(0.1), true);

		for latency in [10.0, 20.0, 30.0, 40.0] {
			monitor.record(latency, latency > 25.0, Some(0.5), false);
		}

		let metrics = monitor.metrics();

		assert_eq!(metrics.total_queries, 5);
		assert_eq!(metrics.window_len, 4);
		assert_eq!(metrics.avg_response_time_ms, 25.0);
		assert_eq!(metrics.p95_response_time_ms, 40.0);
		assert_eq!(metrics.cache_hit_rate, 0.5);
		assert_eq!(metrics.error_rate, 0.0);
		assert_eq!(metrics.avg_quality_score, 0.5);
	}

	#[test]
	fn errors_without_quality_do_not_skew_quality() {
		let mut monitor = PerformanceMonitor::new(10);

		monitor.record(5.0, false, Some(0.8), false);
		monitor.record(7.0, false, None, true);
		monitor.record(f64::NAN, false, None, false);

		let metrics = monitor.metrics();

		assert_eq!(metrics.avg_quality_score, 0.8);
		assert_eq!(metrics.error_rate, 0.5);
		assert_eq!(metrics.dropped_records, 1);
	}

	#[test]
	fn percentile_uses_nearest_rank() {
		let values: Vec<f64> = (1..=100).map(f64::from).collect();

		assert_eq!(percentile(&values, 0.95), 96.0);
		assert_eq!(percentile(&values, 0.99), 100.0);
		assert_eq!(percentile(&[3.0], 0.99), 3.0);
	}
}
