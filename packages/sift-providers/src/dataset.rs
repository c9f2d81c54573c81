use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{Error, Result};
use sift_config::DatasetStorageConfig;
use sift_domain::{EmbeddingCollection, EmbeddingVector};

#[derive(Debug, Deserialize)]
struct EmbeddingPage {
	items: Vec<EmbeddingRow>,
	#[serde(default)]
	total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
	id: Value,
	text: String,
	#[serde(alias = "embedding")]
	vector: Vec<f32>,
	#[serde(default)]
	metadata: Map<String, Value>,
}

/// Loads every embedding row of a dataset from the remote storage service, page by page.
pub async fn fetch_collection(
	cfg: &DatasetStorageConfig,
	dataset_id: &str,
) -> Result<EmbeddingCollection> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let headers = crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?;
	let url = format!("{}/datasets/{}/embeddings", cfg.api_base, dataset_id);
	let mut collection = EmbeddingCollection::new(dataset_id);
	let mut offset = 0_u64;

	loop {
		let res = client
			.get(&url)
			.headers(headers.clone())
			.query(&[("limit", u64::from(cfg.page_limit)), ("offset", offset)])
			.send()
			.await?;

		if res.status() == StatusCode::NOT_FOUND {
			return Err(Error::DatasetNotFound { dataset_id: dataset_id.to_string() });
		}

		let json: Value = res.error_for_status()?.json().await?;
		let page = parse_embedding_page(json)?;
		let fetched = page.items.len() as u64;

		for row in page.items {
			collection.push(row_to_vector(row)?)?;
		}

		offset += fetched;

		let exhausted = page.total.map(|total| offset >= total).unwrap_or(false);

		if fetched < u64::from(cfg.page_limit) || exhausted {
			break;
		}
	}

	tracing::info!(dataset_id, items = collection.len(), "Fetched dataset embeddings.");

	Ok(collection)
}

fn parse_embedding_page(json: Value) -> Result<EmbeddingPage> {
	if json.get("items").is_none() {
		return Err(Error::InvalidResponse {
			message: "Dataset response is missing items array.".to_string(),
		});
	}

	Ok(serde_json::from_value(json)?)
}

fn row_to_vector(row: EmbeddingRow) -> Result<EmbeddingVector> {
	let id = match row.id {
		Value::String(id) => id,
		Value::Number(id) => id.to_string(),
		other =>
			return Err(Error::InvalidResponse {
				message: format!("Dataset row id must be a string or number, got {other}."),
			}),
	};

	Ok(EmbeddingVector::new(id, row.text, row.vector, row.metadata))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_rows_with_numeric_ids() {
		let json = serde_json::json!({
			"items": [
				{ "id": 7, "text": "seven", "embedding": [3.0, 4.0], "metadata": { "lang": "en" } },
				{ "id": "b", "text": "bee", "vector": [1.0, 0.0] }
			],
			"total": 2
		});
		let page = parse_embedding_page(json).expect("page must parse");

		assert_eq!(page.total, Some(2));

		let rows = page
			.items
			.into_iter()
			.map(row_to_vector)
			.collect::<Result<Vec<_>>>()
			.expect("rows must convert");

		assert_eq!(rows[0].id, "7");
		assert_eq!(rows[0].vector, vec![0.6, 0.8]);
		assert_eq!(rows[0].metadata.get("lang"), Some(&Value::from("en")));
		assert_eq!(rows[1].id, "b");
	}

	#[test]
	fn missing_items_is_an_invalid_response() {
		let json = serde_json::json!({ "rows": [] });

		assert!(matches!(parse_embedding_page(json), Err(Error::InvalidResponse { .. })));
	}

	#[test]
	fn rejects_structured_ids() {
		let row = EmbeddingRow {
			id: serde_json::json!({ "nested": true }),
			text: "x".to_string(),
			vector: vec![1.0],
			metadata: Map::new(),
		};

		assert!(row_to_vector(row).is_err());
	}
}
