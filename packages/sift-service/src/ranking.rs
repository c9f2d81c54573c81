pub mod advanced;
pub mod balanced;
pub mod cluster;
pub mod diversity;
pub mod keyword;
pub mod scoring;

pub use advanced::AdvancedRelevanceStrategy;
pub use balanced::BalancedScoringStrategy;
pub use cluster::ClusterDiversifier;
pub use diversity::{Diversifier, MmrDiversifier, select_diversifier};
pub use keyword::KeywordIndex;
pub use scoring::{DistanceStats, ScoringContext, ScoringSignals, ScoringStrategy, StrategyKind};

use std::cmp::Ordering;

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

/// Maps NaN to zero and clamps everything else into `[0, 1]`.
pub fn clamp_unit(value: f32) -> f32 {
	if value.is_nan() {
		return 0.0;
	}

	value.clamp(0.0, 1.0)
}
