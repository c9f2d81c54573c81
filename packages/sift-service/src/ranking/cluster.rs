use sift_config::DiversificationConfig;
use sift_domain::{SearchResult, vector};

use super::diversity::{self, Diversifier, EmbeddingsById, MmrDiversifier};

const CONVERGENCE_THRESHOLD: f32 = 1e-6;

/// Groups candidates with k-means over their embeddings and takes members round-robin, best
/// cluster first. Degenerate clusterings fall back to MMR.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterDiversifier;
impl Diversifier for ClusterDiversifier {
	fn name(&self) -> &'static str {
		"cluster"
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

		let Some(points) = collect_points(&ranked, embeddings) else {
			tracing::debug!("Cluster diversification fell back to MMR on missing embeddings.");

			return MmrDiversifier.diversify(ranked, embeddings, limit, cfg);
		};
		let k = (cfg.clusters as usize).min(points.len());
		let assignments = kmeans(&points, k, cfg.kmeans_iterations as usize);
		let clusters = group_by_cluster(&assignments, k);

		if clusters.len() < 2 || clusters.iter().all(|members| members.len() == 1) {
			tracing::debug!(clusters = clusters.len(), "Degenerate clustering fell back to MMR.");

			return MmrDiversifier.diversify(ranked, embeddings, limit, cfg);
		}

		let selected = round_robin(&clusters, limit);

		diversity::keep_positions(ranked, selected)
	}
}

fn collect_points<'a>(
	ranked: &[SearchResult],
	embeddings: &EmbeddingsById<'a>,
) -> Option<Vec<&'a [f32]>> {
	let mut points = Vec::with_capacity(ranked.len());
	let mut dimension = None;

	for result in ranked {
		let point = *embeddings.get(result.id.as_str())?;

		if point.is_empty() || dimension.is_some_and(|dimension| dimension != point.len()) {
			return None;
		}

		dimension = Some(point.len());
		points.push(point);
	}

	Some(points)
}

/// Deterministic k-means. Seeds with the top-ranked point, then repeatedly the point farthest
/// from its nearest seed.
fn kmeans(points: &[&[f32]], k: usize, max_iterations: usize) -> Vec<usize> {
	let mut centroids = init_centroids_farthest_point(points, k);
	let mut assignments = assign_points(points, &centroids);

	for _ in 0..max_iterations {
		let previous = centroids.clone();

		update_centroids(points, &assignments, &mut centroids);

		let next = assign_points(points, &centroids);
		let shift: f32 = previous
			.iter()
			.zip(centroids.iter())
			.map(|(old, new)| vector::squared_euclidean(old, new))
			.sum();
		let changed = next != assignments;

		assignments = next;

		if !changed && shift < CONVERGENCE_THRESHOLD {
			break;
		}
	}

	assignments
}

fn init_centroids_farthest_point(points: &[&[f32]], k: usize) -> Vec<Vec<f32>> {
	let mut centroids: Vec<Vec<f32>> = vec![points[0].to_vec()];
	let mut nearest: Vec<f32> =
		points.iter().map(|point| vector::squared_euclidean(point, points[0])).collect();

	while centroids.len() < k {
		let mut best: Option<(usize, f32)> = None;

		for (idx, distance) in nearest.iter().enumerate() {
			if best.map(|(_, current)| *distance > current).unwrap_or(true) {
				best = Some((idx, *distance));
			}
		}

		let Some((idx, distance)) = best else { break };

		if distance <= f32::EPSILON {
			break;
		}

		centroids.push(points[idx].to_vec());

		for (slot, point) in nearest.iter_mut().zip(points.iter()) {
			*slot = slot.min(vector::squared_euclidean(point, points[idx]));
		}
	}

	centroids
}

fn assign_points(points: &[&[f32]], centroids: &[Vec<f32>]) -> Vec<usize> {
	points
		.iter()
		.map(|point| {
			let mut best = (0_usize, f32::INFINITY);

			for (cluster, centroid) in centroids.iter().enumerate() {
				let distance = vector::squared_euclidean(point, centroid);

				if distance < best.1 {
					best = (cluster, distance);
				}
			}

			best.0
		})
		.collect()
}

fn update_centroids(points: &[&[f32]], assignments: &[usize], centroids: &mut [Vec<f32>]) {
	let dimension = points[0].len();
	let mut sums = vec![vec![0.0_f32; dimension]; centroids.len()];
	let mut counts = vec![0_usize; centroids.len()];

	for (point, &cluster) in points.iter().zip(assignments.iter()) {
		counts[cluster] += 1;

		for (sum, value) in sums[cluster].iter_mut().zip(point.iter()) {
			*sum += value;
		}
	}

	// Empty clusters keep their previous centroid.
	for ((centroid, sum), count) in centroids.iter_mut().zip(sums).zip(counts) {
		if count == 0 {
			continue;
		}

		*centroid = sum.into_iter().map(|value| value / count as f32).collect();
	}
}

/// Non-empty clusters as member positions in rank order, ordered by their best member.
fn group_by_cluster(assignments: &[usize], k: usize) -> Vec<Vec<usize>> {
	let mut clusters = vec![Vec::new(); k];

	for (position, &cluster) in assignments.iter().enumerate() {
		clusters[cluster].push(position);
	}

	clusters.retain(|members| !members.is_empty());
	clusters.sort_by_key(|members| members[0]);

	clusters
}

fn round_robin(clusters: &[Vec<usize>], limit: usize) -> Vec<usize> {
	let mut selected = Vec::with_capacity(limit);
	let mut round = 0;

	while selected.len() < limit {
		let mut progressed = false;

		for members in clusters {
			if selected.len() >= limit {
				break;
			}
			if let Some(&position) = members.get(round) {
				selected.push(position);
				progressed = true;
			}
		}

		if !progressed {
			break;
		}

		round += 1;
	}

	selected
}

#[cfg(test)]
mod tests {
	use serde_json::Map;

	use super::*;

	fn result(id: &str, score: f32) -> SearchResult {
		SearchResult {
			id: id.to_string(),
			text: format!("text of {id}"),
			score,
			metadata: Map::new(),
			signals: None,
		}
	}

	#[test]
	fn picks_one_member_per_cluster_first() {
		let vectors: Vec<(String, Vec<f32>)> = vec![
			("a1".to_string(), vec![1.0, 0.0]),
			("a2".to_string(), vec![0.99, 0.01]),
			("a3".to_string(), vec![0.98, 0.02]),
			("b1".to_string(), vec![0.0, 1.0]),
			("b2".to_string(), vec![0.01, 0.99]),
			("c1".to_string(), vec![-1.0, 0.0]),
		];
		let ranked: Vec<SearchResult> = vectors
			.iter()
			.enumerate()
			.map(|(idx, (id, _))| result(id, 0.9 - idx as f32 * 0.05))
			.collect();
		let embeddings: EmbeddingsById<'_> =
			vectors.iter().map(|(id, vector)| (id.as_str(), vector.as_slice())).collect();
		let cfg = DiversificationConfig { clustering: true, clusters: 3, ..Default::default() };
		let out = ClusterDiversifier.diversify(ranked, &embeddings, 3, &cfg);
		let ids: Vec<&str> = out.iter().map(|result| result.id.as_str()).collect();

		assert_eq!(ids, vec!["a1", "b1", "c1"]);
	}

	#[test]
	fn missing_embeddings_fall_back_to_mmr() {
		let ranked: Vec<SearchResult> =
			(0..4).map(|idx| result(&format!("r{idx}"), 0.9 - idx as f32 * 0.1)).collect();
		let cfg = DiversificationConfig { clustering: true, ..Default::default() };
		let out = ClusterDiversifier.diversify(ranked, &EmbeddingsById::new(), 2, &cfg);

		assert_eq!(out.len(), 2);
		assert_eq!(out[0].id, "r0");
	}

	#[test]
	fn round_robin_respects_limit() {
		let clusters = vec![vec![0, 2, 4], vec![1], vec![3, 5]];

		assert_eq!(round_robin(&clusters, 4), vec![0, 1, 3, 2]);
		assert_eq!(round_robin(&clusters, 10), vec![0, 1, 3, 2, 5, 4]);
	}
}
