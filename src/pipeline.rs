//! The ingestion pipeline: embed every exercise, assemble entries, write them in one upsert.
//!
//! Everything runs in input order on one task. Nothing reaches the store until every record
//! has been embedded, so a provider failure leaves the store untouched.

use std::collections::HashMap;

use crate::embedding::{check_dimension, Embedder};
use crate::error::{IngestError, ProviderError, StoreError};
use crate::exercise::Exercise;
use crate::store::{VectorEntry, VectorStore};

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub records: usize,
    pub upserted_count: usize,
    pub namespace: String,
}

pub struct Pipeline<'a, E, S> {
    embedder: &'a E,
    store: &'a S,
    namespace: &'a str,
}

impl<'a, E: Embedder, S: VectorStore> Pipeline<'a, E, S> {
    pub fn new(embedder: &'a E, store: &'a S, namespace: &'a str) -> Self {
        Self {
            embedder,
            store,
            namespace,
        }
    }

    /// Embeds `text`, rejecting vectors that disagree with the provider's declared dimension.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let embedding = self.embedder.embed(text).await?;
        check_dimension(&embedding, self.embedder.dimension())?;
        Ok(embedding)
    }

    pub async fn write(&self, entries: &[VectorEntry]) -> Result<usize, StoreError> {
        self.store.upsert(entries, self.namespace).await
    }

    pub async fn run(&self, exercises: &[Exercise]) -> Result<IngestReport, IngestError> {
        let mut entries = Vec::with_capacity(exercises.len());

        for (i, exercise) in exercises.iter().enumerate() {
            tracing::debug!(
                exercise = %exercise.exercise_name,
                "Embedding exercise {} of {}",
                i + 1,
                exercises.len()
            );
            let embedding = self.embed(&exercise.instructions).await?;
            entries.push(assemble(exercise, embedding));
        }

        tracing::info!(namespace = %self.namespace, "Embedded {} exercises", entries.len());

        let entries = collapse_duplicates(entries);
        let upserted_count = self.write(&entries).await?;

        Ok(IngestReport {
            records: exercises.len(),
            upserted_count,
            namespace: self.namespace.to_string(),
        })
    }
}

/// Maps an exercise and its embedding to a store entry keyed by exercise name.
pub fn assemble(exercise: &Exercise, embedding: Vec<f32>) -> VectorEntry {
    VectorEntry {
        id: exercise.exercise_name.clone(),
        values: embedding,
        metadata: exercise.metadata(),
    }
}

/// Keeps one entry per id: the values of the last occurrence, at the position of the first.
fn collapse_duplicates(entries: Vec<VectorEntry>) -> Vec<VectorEntry> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(entries.len());
    let mut unique: Vec<VectorEntry> = Vec::with_capacity(entries.len());

    for entry in entries {
        match positions.get(&entry.id) {
            Some(&position) => unique[position] = entry,
            None => {
                positions.insert(entry.id.clone(), unique.len());
                unique.push(entry);
            }
        }
    }

    unique
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::exercise::{push_up, ExerciseCatalog};
    use crate::store::memory::MemoryStore;
    use crate::store::{IndexSpec, Metric};

    /// Returns the same vector for every text.
    struct FixedEmbedder(Vec<f32>);

    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(self.0.clone())
        }

        fn dimension(&self) -> usize {
            self.0.len()
        }
    }

    /// Derives a vector from the text length; fails on the nth call.
    struct FlakyEmbedder {
        fail_on: usize,
        calls: AtomicUsize,
    }

    impl Embedder for FlakyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.fail_on {
                return Err(ProviderError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            Ok(vec![text.len() as f32, 1.0, 0.0])
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    fn spec(dimension: usize) -> IndexSpec {
        IndexSpec {
            name: "fitness".to_string(),
            dimension,
            metric: Metric::Cosine,
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
        }
    }

    fn exercise(name: &str, instructions: &str) -> Exercise {
        Exercise {
            exercise_name: name.to_string(),
            instructions: instructions.to_string(),
            ..push_up()
        }
    }

    #[tokio::test]
    async fn test_push_up_example() {
        let json = r#"{"fitness":[{"exercise_name":"Push-up","instructions":"Lower and raise your body using your arms.","type_of_activity":"Strength","type_of_equipment":"None","body_part":"Chest","type":"Compound","muscle_groups_activated":"Chest, Triceps"}]}"#;
        let exercises = ExerciseCatalog::from_slice(json.as_bytes())
            .unwrap()
            .into_validated(false)
            .unwrap();

        let embedder = FixedEmbedder(vec![0.1, 0.2, 0.3]);
        let store = MemoryStore::with_index(spec(3));
        let report = Pipeline::new(&embedder, &store, "ns1")
            .run(&exercises)
            .await
            .unwrap();

        assert_eq!(report.upserted_count, 1);
        assert_eq!(report.records, 1);
        assert_eq!(store.upsert_calls(), 1);

        let expected_metadata = BTreeMap::from(
            [
                ("type_of_activity", "Strength"),
                ("type_of_equipment", "None"),
                ("body_part", "Chest"),
                ("type", "Compound"),
                ("muscle_groups_activated", "Chest, Triceps"),
                ("instructions", "Lower and raise your body using your arms."),
            ]
            .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        assert_eq!(
            store.entries("ns1"),
            vec![VectorEntry {
                id: "Push-up".to_string(),
                values: vec![0.1, 0.2, 0.3],
                metadata: expected_metadata,
            }]
        );
    }

    #[test]
    fn test_assemble_keys_by_name() {
        let exercise = push_up();
        let entry = assemble(&exercise, vec![1.0, 2.0]);
        assert_eq!(entry.id, "Push-up");
        assert_eq!(entry.values, vec![1.0, 2.0]);
        assert_eq!(entry.metadata, exercise.metadata());
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let exercises = vec![
            exercise("Push-up", "Lower and raise your body."),
            exercise("Squat", "Sit back and stand up."),
        ];
        let embedder = FlakyEmbedder {
            fail_on: 0,
            calls: AtomicUsize::new(0),
        };
        let store = MemoryStore::with_index(spec(3));
        let pipeline = Pipeline::new(&embedder, &store, "ns1");

        pipeline.run(&exercises).await.unwrap();
        let first = store.entries("ns1");
        let first_stats = store.describe_stats().await.unwrap();

        pipeline.run(&exercises).await.unwrap();
        assert_eq!(store.entries("ns1"), first);
        assert_eq!(store.describe_stats().await.unwrap(), first_stats);
        assert_eq!(first_stats.total_vector_count, 2);
    }

    #[tokio::test]
    async fn test_duplicate_names_last_wins() {
        let exercises = vec![
            exercise("Plank", "Hold."),
            exercise("Squat", "Sit back and stand up."),
            exercise("Plank", "Hold a straight line from head to heels."),
        ];
        let embedder = FlakyEmbedder {
            fail_on: 0,
            calls: AtomicUsize::new(0),
        };
        let store = MemoryStore::with_index(spec(3));
        Pipeline::new(&embedder, &store, "ns1")
            .run(&exercises)
            .await
            .unwrap();

        let planks = store
            .entries("ns1")
            .into_iter()
            .filter(|entry| entry.id == "Plank")
            .collect::<Vec<_>>();
        assert_eq!(planks.len(), 1);
        assert_eq!(planks[0], assemble(&exercises[2], vec![40.0, 1.0, 0.0]));
    }

    #[tokio::test]
    async fn test_duplicate_names_sent_once() {
        let embedder = FixedEmbedder(vec![0.1, 0.2, 0.3]);
        let store = MemoryStore::with_index(spec(3));
        let report = Pipeline::new(&embedder, &store, "ns1")
            .run(&[push_up(), push_up()])
            .await
            .unwrap();

        assert_eq!(report.records, 2);
        assert_eq!(report.upserted_count, 1);
        assert_eq!(report.upserted_count, store.entries("ns1").len());
    }

    #[test]
    fn test_collapse_keeps_first_position_and_last_values() {
        let entries = vec![
            assemble(&exercise("Plank", "Hold."), vec![1.0]),
            assemble(&exercise("Squat", "Sit back."), vec![2.0]),
            assemble(&exercise("Plank", "Hold longer."), vec![3.0]),
        ];
        let collapsed = collapse_duplicates(entries);

        let ids = collapsed.iter().map(|entry| entry.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["Plank", "Squat"]);
        assert_eq!(collapsed[0].values, vec![3.0]);
        assert_eq!(collapsed[0].metadata["instructions"], "Hold longer.");
    }

    #[tokio::test]
    async fn test_provider_failure_writes_nothing() {
        let exercises = vec![
            exercise("Push-up", "Lower and raise your body."),
            exercise("Squat", "Sit back and stand up."),
            exercise("Lunge", "Step forward and drop the back knee."),
        ];
        let embedder = FlakyEmbedder {
            fail_on: 2,
            calls: AtomicUsize::new(0),
        };
        let store = MemoryStore::with_index(spec(3));
        let err = Pipeline::new(&embedder, &store, "ns1")
            .run(&exercises)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::Provider(ProviderError::Status { status: 503, .. })
        ));
        assert_eq!(store.upsert_calls(), 0);
        assert!(store.entries("ns1").is_empty());
    }

    #[tokio::test]
    async fn test_short_vector_is_provider_error() {
        struct LyingEmbedder;

        impl Embedder for LyingEmbedder {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
                Ok(vec![0.1, 0.2])
            }

            fn dimension(&self) -> usize {
                3
            }
        }

        let store = MemoryStore::with_index(spec(3));
        let err = Pipeline::new(&LyingEmbedder, &store, "ns1")
            .run(&[push_up()])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::Provider(ProviderError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert_eq!(store.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_index_is_store_error() {
        let embedder = FixedEmbedder(vec![0.1, 0.2, 0.3]);
        let store = MemoryStore::new("fitness");
        let err = Pipeline::new(&embedder, &store, "ns1")
            .run(&[push_up()])
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Store(StoreError::IndexNotFound(_))));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_store_error() {
        let embedder = FixedEmbedder(vec![0.1, 0.2, 0.3]);
        let store = MemoryStore::with_index(spec(1536));
        let err = Pipeline::new(&embedder, &store, "ns1")
            .run(&[push_up()])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::Store(StoreError::DimensionMismatch {
                expected: 1536,
                actual: 3,
                ..
            })
        ));
        assert!(store.entries("ns1").is_empty());
    }
}
