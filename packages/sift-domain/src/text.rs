use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

static NON_WORD: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[^\w\s]").ok());

/// Cleans a raw user query: NFKC, trimmed, internal whitespace collapsed to single spaces.
pub fn preprocess_query(raw: &str) -> String {
	let normalized: String = raw.nfkc().collect();

	collapse_whitespace(&normalized)
}

/// Cache-key form of a query: lowercase, punctuation stripped, accents and word characters kept.
pub fn normalize_query(raw: &str) -> String {
	let lowered = preprocess_query(raw).to_lowercase();
	let Some(non_word) = NON_WORD.as_ref() else {
		let stripped: String = lowered
			.chars()
			.map(|ch| if ch.is_alphanumeric() || ch == '_' { ch } else { ' ' })
			.collect();

		return collapse_whitespace(&stripped);
	};

	collapse_whitespace(&non_word.replace_all(&lowered, " "))
}

pub fn collapse_whitespace(raw: &str) -> String {
	raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase Unicode word tokens, in order, with repeats.
pub fn tokenize(text: &str) -> Vec<String> {
	let normalized: String = text.nfkc().collect();

	normalized.unicode_words().map(str::to_lowercase).collect()
}

pub fn term_set(text: &str) -> HashSet<String> {
	tokenize(text).into_iter().collect()
}

/// Whitespace-separated word count of the trimmed text.
pub fn word_count(text: &str) -> usize {
	text.split_whitespace().count()
}

pub fn jaccard_similarity(lhs: &HashSet<String>, rhs: &HashSet<String>) -> f32 {
	let union = lhs.union(rhs).count();

	if union == 0 {
		return 0.0;
	}

	lhs.intersection(rhs).count() as f32 / union as f32
}

/// Share of query terms that also occur in the result, `0` for an empty query.
pub fn term_match_ratio(query_terms: &HashSet<String>, result_terms: &HashSet<String>) -> f32 {
	if query_terms.is_empty() {
		return 0.0;
	}

	query_terms.intersection(result_terms).count() as f32 / query_terms.len() as f32
}

/// Share of whitespace-separated tokens that start with an uppercase letter.
pub fn proper_noun_ratio(query: &str) -> f32 {
	let mut total = 0_usize;
	let mut capitalized = 0_usize;

	for word in query.split_whitespace() {
		total += 1;

		if word.chars().next().is_some_and(char::is_uppercase) {
			capitalized += 1;
		}
	}

	if total == 0 {
		return 0.0;
	}

	capitalized as f32 / total as f32
}

/// Appends expansion terms that the query does not already contain.
pub fn expand_query(query: &str, terms: &[String]) -> String {
	let mut seen = term_set(query);
	let mut out = query.to_string();

	for term in terms {
		let trimmed = collapse_whitespace(term);

		if trimmed.is_empty() {
			continue;
		}

		let tokens = tokenize(&trimmed);

		if tokens.is_empty() || tokens.iter().all(|token| seen.contains(token)) {
			continue;
		}

		seen.extend(tokens);
		out.push(' ');
		out.push_str(&trimmed);
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn set(tokens: &[&str]) -> HashSet<String> {
		tokens.iter().map(|token| token.to_string()).collect()
	}

	#[test]
	fn normalize_query_keeps_accents_and_drops_punctuation() {
		assert_eq!(normalize_query("  Juan  Pérez, Madrid!! "), "juan pérez madrid");
		assert_eq!(normalize_query("What is Rust?"), "what is rust");
	}

	#[test]
	fn preprocess_query_collapses_whitespace() {
		assert_eq!(preprocess_query("\tfoo \n  bar  "), "foo bar");
		assert_eq!(preprocess_query("   "), "");
	}

	#[test]
	fn tokenize_lowercases_unicode_words() {
		assert_eq!(tokenize("Juan Pérez vive en Madrid."), vec![
			"juan", "pérez", "vive", "en", "madrid"
		]);
	}

	#[test]
	fn jaccard_handles_empty_sets() {
		assert_eq!(jaccard_similarity(&set(&[]), &set(&[])), 0.0);
		assert_eq!(jaccard_similarity(&set(&["a", "b"]), &set(&["b", "c"])), 1.0 / 3.0);
	}

	#[test]
	fn proper_noun_ratio_counts_capitalized_tokens() {
		assert_eq!(proper_noun_ratio("Juan Pérez Madrid"), 1.0);
		assert_eq!(proper_noun_ratio("where does Juan live"), 0.25);
		assert_eq!(proper_noun_ratio(""), 0.0);
	}

	#[test]
	fn expand_query_skips_known_terms() {
		let terms = vec!["rust".to_string(), "memory safety".to_string(), " ".to_string()];

		assert_eq!(expand_query("Rust ownership", &terms), "Rust ownership memory safety");
	}

	#[test]
	fn term_match_ratio_is_relative_to_query() {
		assert_eq!(term_match_ratio(&set(&["a", "b"]), &set(&["a", "c", "d"])), 0.5);
		assert_eq!(term_match_ratio(&set(&[]), &set(&["a"])), 0.0);
	}
}
