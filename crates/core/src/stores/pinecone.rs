use crate::error::VectorStoreError;
use crate::models::{VectorMatch, VectorRecord};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_CONTROL_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";

pub struct PineconeStore {
    host: String,
    api_key: String,
    client: Client,
}

impl PineconeStore {
    /// Resolves the data-plane host of `index_name` through the control plane.
    pub async fn connect(
        control_url: &str,
        api_key: &str,
        index_name: &str,
        client: Client,
    ) -> Result<Self, VectorStoreError> {
        if api_key.trim().is_empty() || index_name.trim().is_empty() {
            return Err(VectorStoreError::NotConfigured(
                "pinecone api key and index name are required".to_string(),
            ));
        }

        let response = client
            .get(format!(
                "{}/indexes/{}",
                control_url.trim_end_matches('/'),
                index_name
            ))
            .header("Api-Key", api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await?;
        let description: Value = ensure_success(response).await?.json().await?;

        let host = description
            .pointer("/host")
            .and_then(Value::as_str)
            .filter(|host| !host.is_empty())
            .ok_or_else(|| VectorStoreError::BackendResponse {
                backend: "pinecone".to_string(),
                details: format!("index {index_name} has no host"),
            })?;

        debug!(index = index_name, host, "resolved pinecone index host");
        Ok(Self::with_host(host, api_key, client))
    }

    pub fn with_host(host: &str, api_key: &str, client: Client) -> Self {
        let host = host.trim_end_matches('/');
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };

        Self {
            host,
            api_key: api_key.to_string(),
            client,
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }
}

async fn ensure_success(response: Response) -> Result<Response, VectorStoreError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(VectorStoreError::BackendResponse {
        backend: "pinecone".to_string(),
        details: format!("{status}: {body}"),
    })
}

fn upsert_body(records: &[VectorRecord]) -> Result<Value, VectorStoreError> {
    let vectors = records
        .iter()
        .map(|record| {
            Ok(json!({
                "id": record.id,
                "values": record.values,
                "metadata": serde_json::to_value(&record.metadata)?,
            }))
        })
        .collect::<Result<Vec<_>, VectorStoreError>>()?;

    Ok(json!({ "vectors": vectors }))
}

fn query_body(vector: &[f32], top_k: usize, chat_id: Option<&str>) -> Value {
    let mut body = json!({
        "vector": vector,
        "topK": top_k,
        "includeMetadata": true,
        "includeValues": false,
    });

    if let Some(chat_id) = chat_id {
        body["filter"] = json!({ "chat_id": { "$eq": chat_id } });
    }

    body
}

// Pinecone stores metadata numbers as floats, so integers come back as `3.0`.
fn parse_matches(parsed: &Value) -> Vec<VectorMatch> {
    let matches = parsed
        .pointer("/matches")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    matches
        .iter()
        .map(|hit| {
            let as_u32 = |pointer: &str| {
                hit.pointer(pointer)
                    .and_then(Value::as_f64)
                    .filter(|value| *value >= 0.0)
                    .map(|value| value as u32)
            };
            let as_string = |pointer: &str| {
                hit.pointer(pointer)
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };

            VectorMatch {
                id: as_string("/id").unwrap_or_default(),
                score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0),
                pdf_id: as_string("/metadata/pdf_id"),
                chunk_id: as_u32("/metadata/chunk_id"),
                page: as_u32("/metadata/page"),
                text: as_string("/metadata/text"),
                chat_id: as_string("/metadata/chat_id"),
            }
        })
        .collect()
}

#[async_trait]
impl VectorIndex for PineconeStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), VectorStoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let response = self
            .post("/vectors/upsert")
            .json(&upsert_body(records)?)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        chat_id: Option<&str>,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        let response = self
            .post("/query")
            .json(&query_body(vector, top_k, chat_id))
            .send()
            .await?;
        let parsed: Value = ensure_success(response).await?.json().await?;
        Ok(parse_matches(&parsed))
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<(), VectorStoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        let response = self
            .post("/vectors/delete")
            .json(&json!({ "ids": ids }))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete_by_chat(&self, chat_id: &str) -> Result<(), VectorStoreError> {
        let response = self
            .post("/vectors/delete")
            .json(&json!({ "filter": { "chat_id": { "$eq": chat_id } } }))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}
