use std::collections::BTreeMap;
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub mod memory;
pub mod pinecone;
pub mod similarity;

/// One record written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: BTreeMap<String, String>,
}

/// Distance metric an index is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Euclidean,
    Dotproduct,
}

/// Declaration of a serverless index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub cloud: String,
    pub region: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStats {
    #[serde(default)]
    pub vector_count: u64,
}

/// Aggregate statistics reported by the store for a whole index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    #[serde(default)]
    pub namespaces: BTreeMap<String, NamespaceStats>,
    #[serde(default)]
    pub dimension: usize,
    #[serde(default)]
    pub index_fullness: f32,
    #[serde(default)]
    pub total_vector_count: u64,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "dimension: {}", self.dimension)?;
        writeln!(f, "index_fullness: {}", self.index_fullness)?;
        writeln!(f, "total_vector_count: {}", self.total_vector_count)?;
        write!(f, "namespaces:")?;
        if self.namespaces.is_empty() {
            return write!(f, " (none)");
        }
        for (name, stats) in &self.namespaces {
            write!(f, "\n  {}: vector_count={}", name, stats.vector_count)?;
        }
        Ok(())
    }
}

/// A query hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// A vector database bound to a single index.
pub trait VectorStore {
    /// Creates the index. An index that already exists is left untouched.
    #[allow(async_fn_in_trait)]
    async fn create_index(&self, spec: &IndexSpec) -> Result<(), StoreError>;

    /// Inserts or replaces `entries` in `namespace` and returns the accepted count.
    #[allow(async_fn_in_trait)]
    async fn upsert(&self, entries: &[VectorEntry], namespace: &str) -> Result<usize, StoreError>;

    #[allow(async_fn_in_trait)]
    async fn describe_stats(&self) -> Result<IndexStats, StoreError>;

    /// Returns the `top_k` entries closest to `vector`, best first.
    #[allow(async_fn_in_trait)]
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        namespace: &str,
    ) -> Result<Vec<QueryMatch>, StoreError>;
}
