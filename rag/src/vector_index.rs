//! The vector index seam.
//!
//! [`VectorIndex`] is the minimal surface the pipelines need from a managed
//! index: provisioning, stats, upsert, namespace purge and k-NN query.
//! [`crate::PineconeIndex`] talks to Pinecone; [`InMemoryIndex`] keeps
//! everything in process and backs the tests and the `--offline` mode.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Logical partition of the index. Entries are never queried across
/// namespaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    Preprocessed,
    Uploaded,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Preprocessed, Namespace::Uploaded];

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Preprocessed => "Pre-processed documents",
            Namespace::Uploaded => "Uploaded document(s)",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Namespace::Preprocessed => Namespace::Uploaded,
            Namespace::Uploaded => Namespace::Preprocessed,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = String;

    /// Accepts the display name or the short forms `preprocessed` and
    /// `uploaded`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "preprocessed" | "pre-processed" => return Ok(Namespace::Preprocessed),
            "uploaded" => return Ok(Namespace::Uploaded),
            _ => {}
        }
        Namespace::ALL
            .into_iter()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| format!("unknown namespace '{}'", s))
    }
}

/// Parameters for creating a serverless index.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    pub cloud: String,
    pub region: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexStats {
    pub dimension: usize,
    pub total_vector_count: u64,
    /// Vector count per namespace. Namespaces that were never written are absent.
    pub namespaces: BTreeMap<String, u64>,
}

impl IndexStats {
    pub fn vector_count(&self, namespace: &str) -> u64 {
        self.namespaces.get(namespace).copied().unwrap_or(0)
    }
}

/// Payload stored next to each vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub text: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    pub chunk_index: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// One k-NN result. Higher score means more similar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<RecordMetadata>,
}

pub trait VectorIndex: Send + Sync {
    fn list_indexes(&self) -> Result<Vec<String>>;

    fn create_index(&self, spec: &IndexSpec) -> Result<()>;

    fn is_ready(&self, index: &str) -> Result<bool>;

    fn describe_index_stats(&self, index: &str) -> Result<IndexStats>;

    fn upsert(&self, index: &str, namespace: &str, records: &[Record]) -> Result<()>;

    /// Delete every entry in `namespace`.
    fn delete_all(&self, index: &str, namespace: &str) -> Result<()>;

    /// Return at most `top_k` matches in descending score order. A namespace
    /// with no entries yields an empty list.
    fn query(&self, index: &str, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<Match>>;

    fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.list_indexes()?.iter().any(|name| name == index))
    }
}

struct MemIndex {
    dimension: usize,
    readiness_polls: usize,
    namespaces: HashMap<String, BTreeMap<String, Record>>,
}

/// An in-process index using cosine similarity.
#[derive(Default)]
pub struct InMemoryIndex {
    indexes: Mutex<HashMap<String, MemIndex>>,
    ready_after: Option<usize>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes created by this store report ready only after `polls` calls
    /// to [`VectorIndex::is_ready`].
    pub fn ready_after(polls: usize) -> Self {
        Self { indexes: Mutex::new(HashMap::new()), ready_after: Some(polls) }
    }

    /// Indexes created by this store never report ready.
    pub fn never_ready() -> Self {
        Self::ready_after(usize::MAX)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, MemIndex>>> {
        self.indexes
            .lock()
            .map_err(|_| RagError::vector_index("lock", "in-memory index mutex poisoned"))
    }

    /// Number of entries in `namespace`, or zero if the index is absent.
    pub fn len(&self, index: &str, namespace: &str) -> usize {
        self.lock()
            .ok()
            .and_then(|indexes| {
                indexes
                    .get(index)
                    .and_then(|idx| idx.namespaces.get(namespace))
                    .map(|records| records.len())
            })
            .unwrap_or(0)
    }

    /// All records in `namespace`, ordered by id.
    pub fn records(&self, index: &str, namespace: &str) -> Vec<Record> {
        self.lock()
            .ok()
            .and_then(|indexes| {
                indexes
                    .get(index)
                    .and_then(|idx| idx.namespaces.get(namespace))
                    .map(|records| records.values().cloned().collect())
            })
            .unwrap_or_default()
    }
}

fn missing_index(operation: &'static str, index: &str) -> RagError {
    RagError::vector_index(operation, format!("index '{}' does not exist", index))
}

/// Cosine similarity; 0.0 when either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorIndex for InMemoryIndex {
    fn list_indexes(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.lock()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let mut indexes = self.lock()?;
        indexes.entry(spec.name.clone()).or_insert_with(|| MemIndex {
            dimension: spec.dimension,
            readiness_polls: 0,
            namespaces: HashMap::new(),
        });
        Ok(())
    }

    fn is_ready(&self, index: &str) -> Result<bool> {
        let mut indexes = self.lock()?;
        let idx = indexes.get_mut(index).ok_or_else(|| missing_index("describe", index))?;
        idx.readiness_polls = idx.readiness_polls.saturating_add(1);
        Ok(match self.ready_after {
            None => true,
            Some(polls) => idx.readiness_polls > polls,
        })
    }

    fn describe_index_stats(&self, index: &str) -> Result<IndexStats> {
        let indexes = self.lock()?;
        let idx = indexes.get(index).ok_or_else(|| missing_index("describe_index_stats", index))?;
        let namespaces: BTreeMap<String, u64> = idx
            .namespaces
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(name, records)| (name.clone(), records.len() as u64))
            .collect();
        Ok(IndexStats {
            dimension: idx.dimension,
            total_vector_count: namespaces.values().sum(),
            namespaces,
        })
    }

    fn upsert(&self, index: &str, namespace: &str, records: &[Record]) -> Result<()> {
        let mut indexes = self.lock()?;
        let idx = indexes.get_mut(index).ok_or_else(|| missing_index("upsert", index))?;
        if let Some(bad) = records.iter().find(|r| r.values.len() != idx.dimension) {
            return Err(RagError::vector_index(
                "upsert",
                format!(
                    "record '{}' has dimension {}, index expects {}",
                    bad.id,
                    bad.values.len(),
                    idx.dimension
                ),
            ));
        }
        let store = idx.namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            store.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    fn delete_all(&self, index: &str, namespace: &str) -> Result<()> {
        let mut indexes = self.lock()?;
        let idx = indexes.get_mut(index).ok_or_else(|| missing_index("delete", index))?;
        idx.namespaces.remove(namespace);
        Ok(())
    }

    fn query(&self, index: &str, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<Match>> {
        let indexes = self.lock()?;
        let idx = indexes.get(index).ok_or_else(|| missing_index("query", index))?;
        let Some(store) = idx.namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<Match> = store
            .values()
            .map(|record| Match {
                id: record.id.clone(),
                score: cosine_similarity(&record.values, vector),
                metadata: Some(record.metadata.clone()),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> IndexSpec {
        IndexSpec {
            name: "idx".to_string(),
            dimension: 2,
            metric: "cosine".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
        }
    }

    fn record(id: &str, values: Vec<f32>) -> Record {
        Record {
            id: id.to_string(),
            values,
            metadata: RecordMetadata {
                text: id.to_string(),
                source: "doc.pdf".to_string(),
                page: Some(1),
                chunk_index: 0,
            },
        }
    }

    #[test]
    fn namespace_round_trips_through_display_names() {
        for ns in Namespace::ALL {
            assert_eq!(ns.as_str().parse::<Namespace>(), Ok(ns));
        }
        assert_eq!("uploaded".parse::<Namespace>(), Ok(Namespace::Uploaded));
        assert_eq!("Preprocessed".parse::<Namespace>(), Ok(Namespace::Preprocessed));
        assert!("elsewhere".parse::<Namespace>().is_err());
        assert_eq!(Namespace::Preprocessed.next(), Namespace::Uploaded);
    }

    #[test]
    fn query_orders_by_similarity_and_respects_namespace() {
        let index = InMemoryIndex::new();
        index.create_index(&spec()).unwrap();
        index
            .upsert("idx", "a", &[record("near", vec![1.0, 0.1]), record("far", vec![0.0, 1.0])])
            .unwrap();
        index.upsert("idx", "b", &[record("other", vec![1.0, 0.0])]).unwrap();

        let hits = index.query("idx", "a", &[1.0, 0.0], 5).unwrap();
        let ids: Vec<&str> = hits.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "far"]);
        assert!(index.query("idx", "missing", &[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn stats_omit_empty_namespaces() {
        let index = InMemoryIndex::new();
        index.create_index(&spec()).unwrap();
        index.upsert("idx", "a", &[record("x", vec![1.0, 0.0])]).unwrap();
        index.delete_all("idx", "a").unwrap();
        let stats = index.describe_index_stats("idx").unwrap();
        assert!(stats.namespaces.is_empty());
        assert_eq!(stats.vector_count("a"), 0);
    }

    #[test]
    fn upsert_rejects_wrong_dimension() {
        let index = InMemoryIndex::new();
        index.create_index(&spec()).unwrap();
        let err = index.upsert("idx", "a", &[record("x", vec![1.0])]).unwrap_err();
        assert!(matches!(err, RagError::VectorIndex { operation: "upsert", .. }));
    }
}
