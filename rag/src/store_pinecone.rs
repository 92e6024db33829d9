use std::collections::{BTreeMap, HashMap};
use std::env;
use std::sync::Mutex;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{RagError, Result};
use crate::http::JsonClient;
use crate::vector_index::{IndexSpec, IndexStats, Match, Record, RecordMetadata, VectorIndex};

const API_VERSION: &str = "2024-07";
const UPSERT_BATCH: usize = 100;

/// [`VectorIndex`] backed by Pinecone's REST API.
///
/// Control-plane calls go to `control_plane_url`; data-plane calls go to the
/// per-index host reported by `GET /indexes/{name}`, cached after first use.
pub struct PineconeIndex {
    http: JsonClient,
    control_plane_url: String,
    hosts: Mutex<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexModel>,
}

#[derive(Deserialize)]
struct IndexModel {
    name: String,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Deserialize)]
struct IndexStatus {
    ready: bool,
}

#[derive(Serialize)]
struct CreateIndex<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: ServerlessSpec<'a>,
}

#[derive(Serialize)]
struct ServerlessSpec<'a> {
    serverless: CloudRegion<'a>,
}

#[derive(Serialize)]
struct CloudRegion<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    dimension: usize,
    #[serde(default)]
    total_vector_count: u64,
    #[serde(default)]
    namespaces: BTreeMap<String, NamespaceSummary>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceSummary {
    #[serde(default)]
    vector_count: u64,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [Record],
    namespace: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    delete_all: bool,
    namespace: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<RawMatch>,
}

#[derive(Deserialize)]
struct RawMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<RawMetadata>,
}

// Pinecone hands numeric metadata back as floats.
#[derive(Deserialize)]
struct RawMetadata {
    #[serde(default)]
    text: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    page: Option<f64>,
    #[serde(default)]
    chunk_index: Option<f64>,
}

impl From<RawMetadata> for RecordMetadata {
    fn from(raw: RawMetadata) -> Self {
        RecordMetadata {
            text: raw.text,
            source: raw.source,
            page: raw.page.map(|p| p as usize),
            chunk_index: raw.chunk_index.map(|c| c as usize).unwrap_or(0),
        }
    }
}

impl PineconeIndex {
    pub fn new(api_key: &str, control_plane_url: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|e| RagError::vector_index("connect", format!("invalid api key: {}", e)))?;
        headers.insert(HeaderName::from_static("api-key"), key);
        headers.insert(
            HeaderName::from_static("x-pinecone-api-version"),
            HeaderValue::from_static(API_VERSION),
        );
        let http = JsonClient::with_headers(headers).map_err(|e| RagError::vector_index("connect", e))?;
        Ok(Self {
            http,
            control_plane_url: control_plane_url.into().trim_end_matches('/').to_string(),
            hosts: Mutex::new(HashMap::new()),
        })
    }

    /// Build from config, reading the API key from the environment variable
    /// named by `pinecone.api_key_env`.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let var = &cfg.pinecone.api_key_env;
        let api_key = env::var(var).map_err(|_| RagError::ConfigLoad {
            path: "environment".to_string(),
            message: format!("{} is not set", var),
        })?;
        Self::new(&api_key, cfg.pinecone.control_plane_url.clone())
    }

    fn describe(&self, index: &str) -> Result<IndexModel> {
        let url = format!("{}/indexes/{}", self.control_plane_url, index);
        self.http
            .get_json::<IndexModel>(&url)
            .map_err(|e| RagError::vector_index("describe_index", e))
    }

    fn host(&self, index: &str) -> Result<String> {
        if let Ok(hosts) = self.hosts.lock() {
            if let Some(host) = hosts.get(index) {
                return Ok(host.clone());
            }
        }
        let model = self.describe(index)?;
        let host = model
            .host
            .filter(|h| !h.is_empty())
            .ok_or_else(|| RagError::vector_index("describe_index", format!("index '{}' has no host yet", index)))?;
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{}", host)
        };
        debug!(index, host = %host, "resolved index host");
        if let Ok(mut hosts) = self.hosts.lock() {
            hosts.insert(index.to_string(), host.clone());
        }
        Ok(host)
    }
}

impl VectorIndex for PineconeIndex {
    fn list_indexes(&self) -> Result<Vec<String>> {
        let url = format!("{}/indexes", self.control_plane_url);
        let list = self
            .http
            .get_json::<IndexList>(&url)
            .map_err(|e| RagError::vector_index("list_indexes", e))?;
        Ok(list.indexes.into_iter().map(|i| i.name).collect())
    }

    fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let url = format!("{}/indexes", self.control_plane_url);
        let body = CreateIndex {
            name: &spec.name,
            dimension: spec.dimension,
            metric: &spec.metric,
            spec: ServerlessSpec {
                serverless: CloudRegion { cloud: &spec.cloud, region: &spec.region },
            },
        };
        self.http
            .post_json::<Value, _>(&url, &body)
            .map_err(|e| RagError::IndexProvisioning { index: spec.name.clone(), message: e })?;
        info!(index = %spec.name, dimension = spec.dimension, "requested index creation");
        Ok(())
    }

    fn is_ready(&self, index: &str) -> Result<bool> {
        Ok(self.describe(index)?.status.map(|s| s.ready).unwrap_or(false))
    }

    fn describe_index_stats(&self, index: &str) -> Result<IndexStats> {
        let url = format!("{}/describe_index_stats", self.host(index)?);
        let res = self
            .http
            .post_json::<StatsResponse, _>(&url, &serde_json::json!({}))
            .map_err(|e| RagError::vector_index("describe_index_stats", e))?;
        Ok(IndexStats {
            dimension: res.dimension,
            total_vector_count: res.total_vector_count,
            namespaces: res
                .namespaces
                .into_iter()
                .map(|(name, summary)| (name, summary.vector_count))
                .collect(),
        })
    }

    fn upsert(&self, index: &str, namespace: &str, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let url = format!("{}/vectors/upsert", self.host(index)?);
        for batch in records.chunks(UPSERT_BATCH) {
            let body = UpsertRequest { vectors: batch, namespace };
            self.http
                .post_json::<Value, _>(&url, &body)
                .map_err(|e| RagError::vector_index("upsert", e))?;
        }
        Ok(())
    }

    fn delete_all(&self, index: &str, namespace: &str) -> Result<()> {
        let url = format!("{}/vectors/delete", self.host(index)?);
        let body = DeleteRequest { delete_all: true, namespace };
        self.http
            .post_json::<Value, _>(&url, &body)
            .map_err(|e| RagError::vector_index("delete", e))?;
        Ok(())
    }

    fn query(&self, index: &str, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<Match>> {
        let url = format!("{}/query", self.host(index)?);
        let body = QueryRequest {
            namespace,
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };
        let res = self
            .http
            .post_json::<QueryResponse, _>(&url, &body)
            .map_err(|e| RagError::vector_index("query", e))?;
        Ok(res
            .matches
            .into_iter()
            .map(|m| Match { id: m.id, score: m.score, metadata: m.metadata.map(Into::into) })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_body_uses_camel_case() {
        let body = QueryRequest {
            namespace: "Uploaded document(s)",
            vector: &[0.5, 0.25],
            top_k: 3,
            include_metadata: true,
            include_values: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["topK"], 3);
        assert_eq!(json["includeMetadata"], true);
        assert_eq!(json["namespace"], "Uploaded document(s)");
    }

    #[test]
    fn float_metadata_maps_to_integers() {
        let raw = r#"{"matches":[{"id":"a","score":0.9,"metadata":{"text":"t","source":"s.pdf","page":2.0,"chunk_index":4.0}}]}"#;
        let res: QueryResponse = serde_json::from_str(raw).unwrap();
        let meta: RecordMetadata = res.matches.into_iter().next().unwrap().metadata.unwrap().into();
        assert_eq!(meta.page, Some(2));
        assert_eq!(meta.chunk_index, 4);
    }

    #[test]
    fn stats_parse_namespace_counts() {
        let raw = r#"{"namespaces":{"Uploaded document(s)":{"vectorCount":7}},"dimension":1024,"indexFullness":0.0,"totalVectorCount":7}"#;
        let res: StatsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(res.total_vector_count, 7);
        assert_eq!(res.namespaces["Uploaded document(s)"].vector_count, 7);
    }
}
