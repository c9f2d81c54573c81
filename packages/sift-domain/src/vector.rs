/// Scales `values` to unit length in place. Zero or non-finite norms leave the vector untouched.
pub fn l2_normalize(values: &mut [f32]) -> bool {
	let norm = l2_norm(values);

	if norm <= f32::EPSILON || !norm.is_finite() {
		return false;
	}

	for value in values.iter_mut() {
		*value /= norm;
	}

	true
}

pub fn l2_norm(values: &[f32]) -> f32 {
	values.iter().map(|value| value * value).sum::<f32>().sqrt()
}

pub fn dot(lhs: &[f32], rhs: &[f32]) -> f32 {
	lhs.iter().zip(rhs.iter()).map(|(l, r)| l * r).sum()
}

pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> Option<f32> {
	if lhs.is_empty() || lhs.len() != rhs.len() {
		return None;
	}

	let mut dot = 0.0_f32;
	let mut lhs_norm = 0.0_f32;
	let mut rhs_norm = 0.0_f32;

	for (l, r) in lhs.iter().zip(rhs.iter()) {
		dot += l * r;
		lhs_norm += l * l;
		rhs_norm += r * r;
	}

	if lhs_norm <= f32::EPSILON || rhs_norm <= f32::EPSILON {
		return None;
	}

	Some((dot / (lhs_norm.sqrt() * rhs_norm.sqrt())).clamp(-1.0, 1.0))
}

/// Cosine distance in `[0, 2]`, `None` when either side is degenerate.
pub fn cosine_distance(lhs: &[f32], rhs: &[f32]) -> Option<f32> {
	cosine_similarity(lhs, rhs).map(|similarity| 1.0 - similarity)
}

pub fn squared_euclidean(lhs: &[f32], rhs: &[f32]) -> f32 {
	lhs.iter().zip(rhs.iter()).map(|(l, r)| (l - r) * (l - r)).sum()
}
