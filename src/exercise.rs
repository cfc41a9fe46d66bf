use std::collections::BTreeMap;
use std::path::PathBuf;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Metadata key holding the embedded text, kept for display at retrieval time.
pub const INSTRUCTIONS_KEY: &str = "instructions";

pub trait RecordSource {
    #[allow(async_fn_in_trait)]
    async fn load(&self) -> Result<Vec<Exercise>, InputError>;
}

/// One exercise definition from the source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub exercise_name: String,
    pub instructions: String,
    pub type_of_activity: String,
    pub type_of_equipment: String,
    pub body_part: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub muscle_groups_activated: String,
}

impl Exercise {
    /// Descriptive fields plus the instructions text, keyed by their source field names.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("type_of_activity".to_string(), self.type_of_activity.clone()),
            ("type_of_equipment".to_string(), self.type_of_equipment.clone()),
            ("body_part".to_string(), self.body_part.clone()),
            ("type".to_string(), self.kind.clone()),
            (
                "muscle_groups_activated".to_string(),
                self.muscle_groups_activated.clone(),
            ),
            (INSTRUCTIONS_KEY.to_string(), self.instructions.clone()),
        ])
    }
}

/// The source document: a named array of exercises.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseCatalog {
    pub fitness: Vec<Exercise>,
}

impl ExerciseCatalog {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, InputError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Checks every record and returns them in input order.
    ///
    /// Duplicate names are allowed unless `reject_duplicates` is set; the store keeps the
    /// last one written.
    pub fn into_validated(self, reject_duplicates: bool) -> Result<Vec<Exercise>, InputError> {
        for (i, exercise) in self.fitness.iter().enumerate() {
            if exercise.exercise_name.trim().is_empty() {
                return Err(InputError::invalid_record(i + 1, "exercise_name is empty"));
            }
            if exercise.instructions.trim().is_empty() {
                return Err(InputError::invalid_record(
                    i + 1,
                    format!("instructions for {:?} are empty", exercise.exercise_name),
                ));
            }
        }

        let duplicates = self
            .fitness
            .iter()
            .map(|exercise| exercise.exercise_name.as_str())
            .duplicates()
            .join(", ");

        if !duplicates.is_empty() {
            if reject_duplicates {
                return Err(InputError::DuplicateIds(duplicates));
            }
            tracing::warn!(
                duplicates = %duplicates,
                "Duplicate exercise names, the last record for each wins"
            );
        }

        Ok(self.fitness)
    }
}

/// Reads the catalog from a JSON file on disk.
pub struct JsonFileSource {
    path: PathBuf,
    reject_duplicates: bool,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>, reject_duplicates: bool) -> Self {
        Self {
            path: path.into(),
            reject_duplicates,
        }
    }
}

impl RecordSource for JsonFileSource {
    async fn load(&self) -> Result<Vec<Exercise>, InputError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| InputError::Io {
                path: self.path.display().to_string(),
                source,
            })?;

        let exercises = ExerciseCatalog::from_slice(&bytes)?.into_validated(self.reject_duplicates)?;
        tracing::info!(
            path = %self.path.display(),
            "Loaded {} exercises",
            exercises.len()
        );
        Ok(exercises)
    }
}

#[cfg(test)]
pub(crate) fn push_up() -> Exercise {
    Exercise {
        exercise_name: "Push-up".to_string(),
        instructions: "Lower and raise your body using your arms.".to_string(),
        type_of_activity: "Strength".to_string(),
        type_of_equipment: "None".to_string(),
        body_part: "Chest".to_string(),
        kind: "Compound".to_string(),
        muscle_groups_activated: "Chest, Triceps".to_string(),
    }
}
