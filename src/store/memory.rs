//! In-process vector store. Used for dry runs and as the store collaborator in tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{similarity, IndexSpec, IndexStats, NamespaceStats, QueryMatch, VectorEntry, VectorStore};
use crate::error::StoreError;

#[derive(Debug)]
struct MemoryIndex {
    spec: IndexSpec,
    namespaces: BTreeMap<String, BTreeMap<String, VectorEntry>>,
}

#[derive(Debug, Default)]
struct State {
    index: Option<MemoryIndex>,
    upsert_calls: usize,
}

/// A vector store holding one index in memory, keyed by entry id per namespace.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    state: Mutex<State>,
}

impl MemoryStore {
    /// A store bound to `name` whose index does not exist yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// A store whose index already exists.
    pub fn with_index(spec: IndexSpec) -> Self {
        Self {
            name: spec.name.clone(),
            state: Mutex::new(State {
                index: Some(MemoryIndex {
                    spec,
                    namespaces: BTreeMap::new(),
                }),
                upsert_calls: 0,
            }),
        }
    }

    /// Number of upsert calls received, including rejected ones.
    pub fn upsert_calls(&self) -> usize {
        self.state().upsert_calls
    }

    /// Entries of `namespace`, ordered by id.
    pub fn entries(&self, namespace: &str) -> Vec<VectorEntry> {
        self.state()
            .index
            .as_ref()
            .and_then(|index| index.namespaces.get(namespace))
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VectorStore for MemoryStore {
    async fn create_index(&self, spec: &IndexSpec) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.index.is_some() {
            tracing::info!(index = %spec.name, "Index already exists");
            return Ok(());
        }
        state.index = Some(MemoryIndex {
            spec: spec.clone(),
            namespaces: BTreeMap::new(),
        });
        Ok(())
    }

    async fn upsert(&self, entries: &[VectorEntry], namespace: &str) -> Result<usize, StoreError> {
        let mut state = self.state();
        state.upsert_calls += 1;

        let index = state
            .index
            .as_mut()
            .ok_or_else(|| StoreError::index_not_found(&self.name))?;

        // Validate the whole batch before touching anything.
        let expected = index.spec.dimension;
        if let Some(bad) = entries.iter().find(|entry| entry.values.len() != expected) {
            return Err(StoreError::DimensionMismatch {
                id: bad.id.clone(),
                expected,
                actual: bad.values.len(),
            });
        }

        let target = index.namespaces.entry(namespace.to_string()).or_default();
        for entry in entries {
            target.insert(entry.id.clone(), entry.clone());
        }
        Ok(entries.len())
    }

    async fn describe_stats(&self) -> Result<IndexStats, StoreError> {
        let state = self.state();
        let index = state
            .index
            .as_ref()
            .ok_or_else(|| StoreError::index_not_found(&self.name))?;

        let namespaces: BTreeMap<String, NamespaceStats> = index
            .namespaces
            .iter()
            .map(|(name, entries)| {
                (
                    name.clone(),
                    NamespaceStats {
                        vector_count: entries.len() as u64,
                    },
                )
            })
            .collect();

        Ok(IndexStats {
            total_vector_count: namespaces.values().map(|ns| ns.vector_count).sum(),
            namespaces,
            dimension: index.spec.dimension,
            index_fullness: 0.0,
        })
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        namespace: &str,
    ) -> Result<Vec<QueryMatch>, StoreError> {
        let state = self.state();
        let index = state
            .index
            .as_ref()
            .ok_or_else(|| StoreError::index_not_found(&self.name))?;

        if vector.len() != index.spec.dimension {
            return Err(StoreError::DimensionMismatch {
                id: "<query>".to_string(),
                expected: index.spec.dimension,
                actual: vector.len(),
            });
        }

        let Some(entries) = index.namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored = entries
            .values()
            .map(|entry| (similarity::score(index.spec.metric, vector, &entry.values), entry))
            .collect::<Vec<_>>();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, entry)| QueryMatch {
                id: entry.id.clone(),
                score,
                metadata: entry.metadata.clone(),
            })
            .collect())
    }
}
