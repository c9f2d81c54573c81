pub mod performance;
pub mod quality;

pub use performance::{PerformanceMetrics, PerformanceMonitor};
pub use quality::{QualityBand, QualityHistory, QualityTrends, SearchQualityReport, analyze};

use parking_lot::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use sift_config::Monitor;

/// Quality history and performance window shared by every request.
pub struct SearchMonitor {
	quality: Mutex<QualityHistory>,
	performance: Mutex<PerformanceMonitor>,
}
impl SearchMonitor {
	pub fn new(cfg: &Monitor) -> Self {
		Self {
			quality: Mutex::new(QualityHistory::new(cfg.history_size as usize)),
			performance: Mutex::new(PerformanceMonitor::new(cfg.window_size as usize)),
		}
	}

	pub fn record_success(&self, report: SearchQualityReport, latency_ms: f64, cache_hit: bool) {
		let quality = report.quality_score;

		self.quality.lock().push(report);
		self.performance.lock().record(latency_ms, cache_hit, Some(quality), false);
	}

	pub fn record_failure(&self, latency_ms: f64) {
		self.performance.lock().record(latency_ms, false, None, true);
	}

	pub fn report(&self, search_id: Uuid) -> Option<SearchQualityReport> {
		self.quality.lock().get(search_id).cloned()
	}

	pub fn latest_report(&self) -> Option<SearchQualityReport> {
		self.quality.lock().latest().cloned()
	}

	pub fn metrics(&self) -> PerformanceMetrics {
		self.performance.lock().metrics()
	}

	pub fn trends(&self, now: OffsetDateTime, days: u32) -> Option<QualityTrends> {
		self.quality.lock().trends(now, days)
	}
}
